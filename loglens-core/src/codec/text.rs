//! Human-readable message record.
//!
//! Metadata lines (`Key:`, `Timestamp:`, optional `Partition:`/`Offset:`,
//! optional `Headers:` block of indented `Name: value` lines), then a blank
//! line, then the raw body with its trailing newline trimmed. Metadata
//! scanning stops at the first blank line or at the end of the `Headers:`
//! block, whichever comes first.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::message::Message;

pub fn parse(text: &str) -> Message {
    let lines: Vec<&str> = text.lines().collect();

    let mut epoch_millis = 0i64;
    let mut headers: HashMap<String, Vec<u8>> = HashMap::new();
    let mut key: Option<Vec<u8>> = None;
    let mut partition = 0i32;
    let mut offset = 0i64;

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.trim().is_empty() {
            i += 1; // skip the separator line
            break;
        }

        if let Some(rest) = line.strip_prefix("Key: ") {
            key = Some(rest.as_bytes().to_vec());
        } else if let Some(rest) = line.strip_prefix("Timestamp: ") {
            epoch_millis = parse_timestamp(rest).unwrap_or(0);
        } else if let Some(rest) = line.strip_prefix("Partition: ") {
            partition = rest.trim().parse().unwrap_or(0);
        } else if let Some(rest) = line.strip_prefix("Offset: ") {
            offset = rest.trim().parse().unwrap_or(0);
        } else if line.starts_with("Headers:") {
            i += 1;
            while i < lines.len() {
                let header_line = lines[i];
                if header_line.trim().is_empty() {
                    break;
                }
                if let Some((name, value)) = header_line.trim().split_once(": ") {
                    headers.insert(name.to_string(), value.as_bytes().to_vec());
                }
                i += 1;
            }
            i += 1; // past the blank line ending the block
            break;
        }
        i += 1;
    }

    let body = if i < lines.len() {
        lines[i..].join("\n")
    } else {
        String::new()
    };
    let value = Some(body.trim_end().as_bytes().to_vec());

    Message::new(epoch_millis, headers, key, value, partition, offset)
}

pub fn render(message: &Message) -> String {
    let mut out = String::new();
    if message.key.is_some() {
        out.push_str(&format!("Key: {}\n", message.key_text()));
    }
    out.push_str(&format!(
        "Timestamp: {}\n",
        format_timestamp(message.epoch_millis)
    ));
    out.push_str(&format!("Partition: {}\n", message.partition));
    out.push_str(&format!("Offset: {}\n", message.offset));
    if !message.headers.is_empty() {
        out.push_str("Headers:\n");
        let mut names: Vec<&String> = message.headers.keys().collect();
        names.sort();
        for name in names {
            let value = String::from_utf8_lossy(&message.headers[name]);
            out.push_str(&format!("  {name}: {value}\n"));
        }
    }
    out.push('\n');
    out.push_str(&message.value_text());
    out
}

/// Scan metadata lines for the embedded timestamp without building a full
/// `Message`. Returns `None` when no parseable `Timestamp:` line precedes
/// the body.
pub fn peek_timestamp(text: &str) -> Option<i64> {
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("Timestamp: ") {
            return parse_timestamp(rest);
        }
        if line.trim().is_empty() {
            break;
        }
    }
    None
}

/// Parse an ISO-8601 timestamp into epoch milliseconds.
pub fn parse_timestamp(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc).timestamp_millis());
    }
    // timestamps saved without an offset are taken as UTC
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Render epoch milliseconds as RFC 3339 with millisecond precision.
pub fn format_timestamp(epoch_millis: i64) -> String {
    match Utc.timestamp_millis_opt(epoch_millis).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => epoch_millis.to_string(),
    }
}
