use thiserror::Error;

pub type Result<T> = std::result::Result<T, SourceError>;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("topic not found: {0}")]
    TopicNotFound(String),

    #[error("invalid partition {partition} for topic {topic}")]
    PartitionNotFound { topic: String, partition: i32 },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("watermark resolution failed: {0}")]
    WatermarkResolution(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("unsupported message version: {0}")]
    UnsupportedVersion(u8),
}
