//! LogLens core
//!
//! Shared value types and the `MessageSource` contract implemented by
//! the live-broker and saved-message backends.

pub mod codec;

mod position;
pub use position::{distribute_limit, FetchOptions, FetchPosition};

mod topic;
pub use topic::{Partition, Topic};

mod catalog;
pub use catalog::TopicCatalog;

mod message;
pub use message::Message;

mod stream;
pub use stream::MessageStream;

mod source;
pub use source::MessageSource;

pub mod errors;
pub use errors::{Result, SourceError};
