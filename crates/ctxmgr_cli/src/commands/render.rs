//! Prints the assembled context for a session, the way a harness would see
//! it after calling `transform_context`.

use super::open_facade;
use anyhow::Result;

pub async fn show(store_url: &str, session_id: &str, system_prompt: Option<String>) -> Result<()> {
    let mut facade = open_facade(store_url, session_id, system_prompt).await?;
    let messages = facade.transform_context(0, &[]).await?;

    for message in &messages {
        println!("--- {:?} ---", message.role);
        println!("{}", message.content);
        println!();
    }
    println!("{} message(s) total", messages.len());

    facade.close().await;
    Ok(())
}

pub async fn sets(store_url: &str, session_id: &str) -> Result<()> {
    let mut facade = open_facade(store_url, session_id, None).await?;
    let session = facade.session();

    println!("session_index: {:?}", session.session_index_ids());
    println!("metadata_pool: {:?}", session.metadata_pool_ids());
    println!("active_set:    {:?}", session.active_set_ids());

    facade.close().await;
    Ok(())
}

/// Prints every committed version of one object, oldest first. Useful for
/// sanity-checking a resume: a deletion should show as the last version
/// with no content.
pub async fn history(store_url: &str, session_id: &str, id: &str) -> Result<()> {
    let mut facade = open_facade(store_url, session_id, None).await?;
    let versions = facade.history(id).await?;

    for (i, version) in versions.iter().enumerate() {
        println!(
            "[{i}] txTime={} validTime={} objectHash={}",
            version.tx_time, version.valid_time, version.doc.object_hash
        );
        match &version.doc.content {
            Some(content) => println!("    content ({} chars)", content.chars().count()),
            None => println!("    content: <deleted>"),
        }
    }
    println!("{} version(s) total", versions.len());

    facade.close().await;
    Ok(())
}
