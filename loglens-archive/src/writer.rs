//! Saving messages into the archive layout.

use std::path::{Path, PathBuf};

use tokio::fs;

use loglens_core::codec::{klm, text, KLM_EXT, TXT_EXT};
use loglens_core::{Message, Result};

/// Save a message as a binary `.klm` record under
/// `<root>/<topic>/<partition>/<offset>.klm`, creating directories as
/// needed. Returns the written path.
pub async fn save_message(root: &Path, topic: &str, message: &Message) -> Result<PathBuf> {
    let path = message_path(root, topic, message, KLM_EXT);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&path, klm::encode(message)).await?;
    Ok(path)
}

/// Save a whole batch as `.klm` records. Stops at the first failure.
pub async fn save_messages(root: &Path, topic: &str, messages: &[Message]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(messages.len());
    for message in messages {
        paths.push(save_message(root, topic, message).await?);
    }
    Ok(paths)
}

/// Save a message as a human-readable `.txt` record.
pub async fn save_text_message(root: &Path, topic: &str, message: &Message) -> Result<PathBuf> {
    let path = message_path(root, topic, message, TXT_EXT);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&path, text::render(message)).await?;
    Ok(path)
}

fn message_path(root: &Path, topic: &str, message: &Message, ext: &str) -> PathBuf {
    root.join(topic)
        .join(message.partition.to_string())
        .join(format!("{}.{ext}", message.offset))
}
