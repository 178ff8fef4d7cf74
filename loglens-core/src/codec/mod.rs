//! Per-message encodings for the saved-message archive.
//!
//! Two formats exist side by side in an archive directory: a compact binary
//! record (`.klm`) and a human-readable text record (`.txt`). Both round-trip
//! every `Message` field.

pub mod klm;
pub mod text;

/// File extension of the binary encoding.
pub const KLM_EXT: &str = "klm";
/// File extension of the text encoding.
pub const TXT_EXT: &str = "txt";
