//! LogLens archive backend
//!
//! Serves messages previously saved to a directory tree laid out as
//! `<root>/<topic>/<partition>/<offset>.{klm,txt}`, behind the same
//! `MessageSource` contract as the live-broker backend.

mod index;

mod engine;
pub use engine::ArchiveSource;

mod writer;
pub use writer::{save_message, save_messages, save_text_message};
