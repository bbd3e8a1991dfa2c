//! Thin client over the bi-temporal backing document store.
//!
//! Spec.md §1 and §6 treat the store as an external black box reached over
//! HTTP, providing `put`, `get`, `getAsOf`, `history`, and `query`. This
//! module defines that contract as a trait (so the rest of the core never
//! depends on a concrete transport) plus two implementations: an HTTP client
//! for production and an in-memory fake for tests, mirroring the way the
//! sibling crate keeps `ObjectStore` behind a narrow API its callers never
//! bypass.

use crate::error::{CoreError, Result};
use crate::types::ObjectVersion;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// A single committed version as the store hands it back, with its
/// transaction-time stamp (when the store accepted the write) and the
/// caller-supplied valid-time (when the fact became true in the domain).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredVersion {
    pub doc: ObjectVersion,
    #[serde(rename = "txTime")]
    pub tx_time: i64,
    #[serde(rename = "validTime")]
    pub valid_time: i64,
}

/// Required store operations (spec.md §6).
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Commits a document. `valid_time` defaults to "now" when absent. The
    /// contract is `putAndWait`: the write must be visible to subsequent
    /// reads from this same client once the future resolves (a short settle
    /// delay is acceptable per spec.md §6, not modeled here since the fake
    /// and the HTTP client are both immediately consistent from the caller's
    /// point of view).
    async fn put(&self, doc: ObjectVersion, valid_time: Option<i64>) -> Result<StoredVersion>;

    /// Latest version, or `None` if the id is unknown.
    async fn get(&self, id: &str) -> Result<Option<StoredVersion>>;

    /// Version at or before `valid_time`.
    async fn get_as_of(&self, id: &str, valid_time: i64) -> Result<Option<StoredVersion>>;

    /// Ordered version history (oldest first) by transaction time.
    async fn history(&self, id: &str) -> Result<Vec<StoredVersion>>;

    /// Datalog-ish query, used for batch fetch. Our only current use is
    /// "fetch all of these ids"; modeled directly rather than as a string
    /// query language, since spec.md explicitly puts a rich query DSL out of
    /// scope.
    async fn query_ids(&self, ids: &[String]) -> Result<Vec<StoredVersion>>;
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}

/// In-memory store double used by unit and e2e tests. Keeps a transaction
/// log per id so `history`/`get_as_of` behave like a real bi-temporal store
/// without needing one running.
#[derive(Default)]
pub struct FakeStoreClient {
    log: Mutex<HashMap<String, Vec<StoredVersion>>>,
}

impl FakeStoreClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreClient for FakeStoreClient {
    async fn put(&self, doc: ObjectVersion, valid_time: Option<i64>) -> Result<StoredVersion> {
        let tx_time = now_millis();
        let valid_time = valid_time.unwrap_or(tx_time);
        let stored = StoredVersion {
            doc,
            tx_time,
            valid_time,
        };
        let mut log = self.log.lock().expect("fake store mutex poisoned");
        log.entry(stored.doc.envelope.id.clone())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: &str) -> Result<Option<StoredVersion>> {
        let log = self.log.lock().expect("fake store mutex poisoned");
        Ok(log.get(id).and_then(|versions| versions.last().cloned()))
    }

    async fn get_as_of(&self, id: &str, valid_time: i64) -> Result<Option<StoredVersion>> {
        let log = self.log.lock().expect("fake store mutex poisoned");
        Ok(log.get(id).and_then(|versions| {
            versions
                .iter()
                .rev()
                .find(|v| v.valid_time <= valid_time)
                .cloned()
        }))
    }

    async fn history(&self, id: &str) -> Result<Vec<StoredVersion>> {
        let log = self.log.lock().expect("fake store mutex poisoned");
        Ok(log.get(id).cloned().unwrap_or_default())
    }

    async fn query_ids(&self, ids: &[String]) -> Result<Vec<StoredVersion>> {
        let log = self.log.lock().expect("fake store mutex poisoned");
        Ok(ids
            .iter()
            .filter_map(|id| log.get(id).and_then(|versions| versions.last().cloned()))
            .collect())
    }
}

/// HTTP-backed implementation against a running bi-temporal document store.
///
/// Wire format: `PUT {base_url}/objects/{id}`, `GET {base_url}/objects/{id}`,
/// `GET {base_url}/objects/{id}/as-of?validTime=...`,
/// `GET {base_url}/objects/{id}/history`, `POST {base_url}/query` with a
/// `{"ids": [...]}` body. The exact wire shape is the store's contract, not
/// this specification's; this client assumes a JSON REST veneer since the
/// store is described as having "HTTP semantics".
pub struct HttpStoreClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpStoreClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Serialize)]
struct PutRequest {
    doc: ObjectVersion,
    #[serde(rename = "validTime", skip_serializing_if = "Option::is_none")]
    valid_time: Option<i64>,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    ids: &'a [String],
}

#[async_trait]
impl StoreClient for HttpStoreClient {
    async fn put(&self, doc: ObjectVersion, valid_time: Option<i64>) -> Result<StoredVersion> {
        let id = doc.envelope.id.clone();
        let body = PutRequest { doc, valid_time };
        let resp = self
            .http
            .put(self.url(&format!("/objects/{id}")))
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::StoreTransport(e.to_string()))?;
        parse_response(resp).await
    }

    async fn get(&self, id: &str) -> Result<Option<StoredVersion>> {
        let resp = self
            .http
            .get(self.url(&format!("/objects/{id}")))
            .send()
            .await
            .map_err(|e| CoreError::StoreTransport(e.to_string()))?;
        parse_optional_response(resp).await
    }

    async fn get_as_of(&self, id: &str, valid_time: i64) -> Result<Option<StoredVersion>> {
        let resp = self
            .http
            .get(self.url(&format!("/objects/{id}/as-of")))
            .query(&[("validTime", valid_time)])
            .send()
            .await
            .map_err(|e| CoreError::StoreTransport(e.to_string()))?;
        parse_optional_response(resp).await
    }

    async fn history(&self, id: &str) -> Result<Vec<StoredVersion>> {
        let resp = self
            .http
            .get(self.url(&format!("/objects/{id}/history")))
            .send()
            .await
            .map_err(|e| CoreError::StoreTransport(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        resp.error_for_status()
            .map_err(|e| CoreError::StoreTransport(e.to_string()))?
            .json()
            .await
            .map_err(|e| CoreError::StoreTransport(e.to_string()))
    }

    async fn query_ids(&self, ids: &[String]) -> Result<Vec<StoredVersion>> {
        let resp = self
            .http
            .post(self.url("/query"))
            .json(&QueryRequest { ids })
            .send()
            .await
            .map_err(|e| CoreError::StoreTransport(e.to_string()))?;
        resp.error_for_status()
            .map_err(|e| CoreError::StoreTransport(e.to_string()))?
            .json()
            .await
            .map_err(|e| CoreError::StoreTransport(e.to_string()))
    }
}

async fn parse_response(resp: reqwest::Response) -> Result<StoredVersion> {
    resp.error_for_status()
        .map_err(|e| CoreError::StoreTransport(e.to_string()))?
        .json()
        .await
        .map_err(|e| CoreError::StoreTransport(e.to_string()))
}

async fn parse_optional_response(resp: reqwest::Response) -> Result<Option<StoredVersion>> {
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    let version = resp
        .error_for_status()
        .map_err(|e| CoreError::StoreTransport(e.to_string()))?
        .json()
        .await
        .map_err(|e| CoreError::StoreTransport(e.to_string()))?;
    Ok(Some(version))
}
