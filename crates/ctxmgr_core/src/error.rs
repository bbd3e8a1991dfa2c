//! Error types for ctxmgr_core operations.

use thiserror::Error;

/// Core error type for ctxmgr_core operations.
///
/// Facade operations never let these escape as panics; §7 of the
/// specification mandates that every agent-facing call returns a status
/// object instead. This type is what that status object wraps internally.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Object ID unknown locally or in the backing store.
    #[error("not found: {0}")]
    NotFound(String),

    /// Attempt to deactivate/pin/activate an infrastructure object, or any
    /// other operation that requires a content object but was given one that
    /// isn't.
    #[error("object is not a content object: {0}")]
    NotContentObject(String),

    /// Canonical path unreadable at stub activation or during resume.
    #[error("source inaccessible: {0}")]
    SourceInaccessible(String),

    /// Object exists but its current content is null (tombstone, binary).
    #[error("content unavailable for object {0}")]
    ContentUnavailable(String),

    /// Store timeout, HTTP error, or connection failure.
    #[error("store transport error: {0}")]
    StoreTransport(String),

    /// Harness provided an incompatible message-array snapshot.
    ///
    /// Never surfaced to the caller of `transformContext`; this variant
    /// exists so the cursor-reset decision can be logged and tested, per
    /// spec.md §7's "no user-visible error" note.
    #[error("cursor reset")]
    CursorReset,

    /// Invalid hex string while parsing a hash.
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    /// Invalid session-object set mutation (content object not a member of
    /// a prerequisite set, e.g. pinning something outside the metadata
    /// pool).
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error during filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for ctxmgr_core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
