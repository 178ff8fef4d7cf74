//! Directory and file indexing for the archive layout.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::debug;

use loglens_core::codec::{klm, text, KLM_EXT, TXT_EXT};
use loglens_core::{Message, Result, SourceError};

/// A message file within one partition directory, keyed by the offset
/// parsed from its file name.
#[derive(Debug, Clone)]
pub(crate) struct FileEntry {
    pub path: PathBuf,
    pub offset: i64,
}

fn message_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case(KLM_EXT) {
        Some(KLM_EXT)
    } else if ext.eq_ignore_ascii_case(TXT_EXT) {
        Some(TXT_EXT)
    } else {
        None
    }
}

/// List the message files of one partition directory, sorted ascending by
/// the offset encoded in each file name. A missing directory is an empty
/// partition, not an error.
pub(crate) async fn list_partition_files(partition_dir: &Path) -> Result<Vec<FileEntry>> {
    let mut entries = Vec::new();
    let mut dir = match fs::read_dir(partition_dir).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = dir.next_entry().await? {
        let path = entry.path();
        if message_extension(&path).is_none() {
            continue;
        }
        let offset = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse::<i64>().ok())
            .unwrap_or(0);
        entries.push(FileEntry { path, offset });
    }
    entries.sort_by_key(|entry| entry.offset);
    Ok(entries)
}

/// List `(partition_id, partition_dir)` pairs under a topic directory,
/// skipping entries whose name is not a partition number.
pub(crate) async fn list_partition_dirs(topic_dir: &Path) -> Result<Vec<(i32, PathBuf)>> {
    let mut partitions = Vec::new();
    let mut dir = match fs::read_dir(topic_dir).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(partitions),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = dir.next_entry().await? {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        match entry.file_name().to_string_lossy().parse::<i32>() {
            Ok(id) => partitions.push((id, path)),
            Err(_) => {
                debug!(dir = %path.display(), "skipping non-partition directory");
            }
        }
    }
    partitions.sort_by_key(|(id, _)| *id);
    Ok(partitions)
}

/// Load and decode one message file, dispatching on extension.
pub(crate) async fn read_message_file(path: &Path) -> Result<Message> {
    match message_extension(path) {
        Some(KLM_EXT) => {
            let bytes = fs::read(path).await?;
            klm::decode(&bytes)
        }
        Some(TXT_EXT) => {
            let content = fs::read_to_string(path).await?;
            Ok(text::parse(&content))
        }
        _ => Err(SourceError::Decode(format!(
            "unknown message file extension: {}",
            path.display()
        ))),
    }
}

/// Read a file's embedded timestamp as cheaply as the encoding allows: a
/// fixed-size header read for the binary format, a metadata line scan for
/// the text format. Files without a parseable timestamp report 0.
pub(crate) async fn peek_file_timestamp(path: &Path) -> Result<i64> {
    match message_extension(path) {
        Some(KLM_EXT) => {
            let mut file = fs::File::open(path).await?;
            let mut prefix = [0u8; klm::TIMESTAMP_PREFIX_LEN];
            match file.read_exact(&mut prefix).await {
                Ok(_) => klm::peek_timestamp(&prefix),
                // shorter than the header, nothing to read
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(0),
                Err(e) => Err(e.into()),
            }
        }
        Some(TXT_EXT) => {
            let content = fs::read_to_string(path).await?;
            Ok(text::peek_timestamp(&content).unwrap_or(0))
        }
        _ => Ok(0),
    }
}
