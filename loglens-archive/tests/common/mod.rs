#![allow(dead_code)] // not every test binary uses every helper

use std::collections::HashMap;
use std::path::Path;

use loglens_core::Message;

/// Build a test message with a readable key/value derived from the offset.
pub fn make_message(partition: i32, offset: i64, epoch_millis: i64) -> Message {
    Message::new(
        epoch_millis,
        HashMap::new(),
        Some(format!("k{offset}").into_bytes()),
        Some(format!("v{offset}").into_bytes()),
        partition,
        offset,
    )
}

/// Write a text-encoded fixture message into the archive layout.
pub async fn write_text(root: &Path, topic: &str, partition: i32, offset: i64, epoch_millis: i64) {
    let message = make_message(partition, offset, epoch_millis);
    loglens_archive::save_text_message(root, topic, &message)
        .await
        .expect("write text fixture");
}

/// Write a binary-encoded fixture message into the archive layout.
pub async fn write_klm(root: &Path, topic: &str, partition: i32, offset: i64, epoch_millis: i64) {
    let message = make_message(partition, offset, epoch_millis);
    loglens_archive::save_message(root, topic, &message)
        .await
        .expect("write klm fixture");
}
