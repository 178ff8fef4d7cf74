use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single message read from a partition. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Publish time in epoch milliseconds.
    pub epoch_millis: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    /// User headers; insertion order is irrelevant.
    pub headers: HashMap<String, Vec<u8>>,
    pub partition: i32,
    pub offset: i64,
}

impl Message {
    pub fn new(
        epoch_millis: i64,
        headers: HashMap<String, Vec<u8>>,
        key: Option<Vec<u8>>,
        value: Option<Vec<u8>>,
        partition: i32,
        offset: i64,
    ) -> Self {
        Self {
            epoch_millis,
            key,
            value,
            headers,
            partition,
            offset,
        }
    }

    /// Best-effort textual view of the key, for display fallback only.
    ///
    /// Printable-ASCII keys are shown verbatim; a 4-byte non-ASCII key is
    /// tried as a big-endian integer; anything else decodes lossily.
    pub fn key_text(&self) -> String {
        match &self.key {
            None => String::new(),
            Some(bytes) => display_text(bytes),
        }
    }

    /// Best-effort textual view of the value, for display fallback only.
    pub fn value_text(&self) -> String {
        match &self.value {
            None => String::new(),
            Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    pub fn size(&self) -> usize {
        self.value.as_ref().map_or(0, |v| v.len())
    }
}

fn display_text(bytes: &[u8]) -> String {
    if bytes.iter().all(|b| (32..=126).contains(b)) {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    if bytes.len() == 4 {
        let int_value = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if int_value != 0 {
            return int_value.to_string();
        }
    }
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_with_key(key: Vec<u8>) -> Message {
        Message::new(0, HashMap::new(), Some(key), None, 0, 0)
    }

    #[test]
    fn ascii_key_shown_verbatim() {
        assert_eq!(message_with_key(b"order-42".to_vec()).key_text(), "order-42");
    }

    #[test]
    fn four_byte_binary_key_decoded_as_big_endian_int() {
        assert_eq!(message_with_key(vec![0, 0, 1, 1]).key_text(), "257");
    }

    #[test]
    fn missing_key_is_empty_text() {
        let msg = Message::new(0, HashMap::new(), None, None, 0, 0);
        assert_eq!(msg.key_text(), "");
        assert_eq!(msg.value_text(), "");
    }
}
