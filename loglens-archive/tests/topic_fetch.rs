mod common;

use common::{write_klm, write_text};

use loglens_archive::ArchiveSource;
use loglens_core::{FetchOptions, FetchPosition, MessageSource};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

const TOPIC: &str = "events";

#[tokio::test]
async fn limit_spans_partitions() {
    let dir = tempdir().unwrap();
    for i in 0..10 {
        write_text(dir.path(), TOPIC, 0, i, 1_000 + 2 * i).await;
        write_text(dir.path(), TOPIC, 1, i, 1_001 + 2 * i).await;
    }
    let source = ArchiveSource::new(dir.path());

    let options = FetchOptions::new(FetchPosition::Start, 5);
    let stream = source
        .topic_stream(TOPIC, options, CancellationToken::new())
        .await
        .unwrap();
    stream.finished().await;

    let snapshot = stream.snapshot();
    assert_eq!(snapshot.len(), 5);
    // non-decreasing timestamps across partitions
    for pair in snapshot.windows(2) {
        assert!(pair[0].epoch_millis <= pair[1].epoch_millis);
    }
}

#[tokio::test]
async fn results_are_timestamp_ordered_across_partitions() {
    let dir = tempdir().unwrap();
    write_text(dir.path(), TOPIC, 0, 0, 2_000).await;
    write_text(dir.path(), TOPIC, 1, 0, 1_000).await;
    write_text(dir.path(), TOPIC, 0, 1, 4_000).await;
    write_text(dir.path(), TOPIC, 1, 1, 3_000).await;
    let source = ArchiveSource::new(dir.path());

    let options = FetchOptions::new(FetchPosition::Start, 10);
    let stream = source
        .topic_stream(TOPIC, options, CancellationToken::new())
        .await
        .unwrap();
    stream.finished().await;

    let order: Vec<(i32, i64)> = stream
        .snapshot()
        .iter()
        .map(|m| (m.partition, m.offset))
        .collect();
    assert_eq!(order, vec![(1, 0), (0, 0), (1, 1), (0, 1)]);
}

#[tokio::test]
async fn from_end_selects_newest_but_delivers_ascending() {
    let dir = tempdir().unwrap();
    for offset in 0..10 {
        write_text(dir.path(), TOPIC, 0, offset, 1_000 + offset).await;
    }
    let source = ArchiveSource::new(dir.path());

    let options =
        FetchOptions::new(FetchPosition::Offset(-4), 3).with_end(FetchPosition::Offset(-1));
    let stream = source
        .topic_stream(TOPIC, options, CancellationToken::new())
        .await
        .unwrap();
    stream.finished().await;

    // the limit picks the newest 3 files, delivered timestamp-ascending
    let offsets: Vec<i64> = stream.snapshot().iter().map(|m| m.offset).collect();
    assert_eq!(offsets, vec![7, 8, 9]);
}

#[tokio::test]
async fn timestamp_start_filters_older_files() {
    let dir = tempdir().unwrap();
    for offset in 0..6 {
        write_klm(dir.path(), TOPIC, 0, offset, 1_000 * (offset + 1)).await;
    }
    let source = ArchiveSource::new(dir.path());

    let options = FetchOptions::new(FetchPosition::Timestamp(4_000), 10);
    let stream = source
        .topic_stream(TOPIC, options, CancellationToken::new())
        .await
        .unwrap();
    stream.finished().await;

    let snapshot = stream.snapshot();
    assert_eq!(snapshot.len(), 3);
    assert!(snapshot.iter().all(|m| m.epoch_millis >= 4_000));
}

#[tokio::test]
async fn mixed_encodings_merge_in_one_fetch() {
    let dir = tempdir().unwrap();
    write_klm(dir.path(), TOPIC, 0, 0, 1_000).await;
    write_text(dir.path(), TOPIC, 0, 1, 2_000).await;
    let source = ArchiveSource::new(dir.path());

    let options = FetchOptions::new(FetchPosition::Start, 10);
    let stream = source
        .topic_stream(TOPIC, options, CancellationToken::new())
        .await
        .unwrap();
    stream.finished().await;

    let offsets: Vec<i64> = stream.snapshot().iter().map(|m| m.offset).collect();
    assert_eq!(offsets, vec![0, 1]);
}

#[tokio::test]
async fn missing_topic_yields_empty_completed_stream() {
    let dir = tempdir().unwrap();
    let source = ArchiveSource::new(dir.path());

    let options = FetchOptions::new(FetchPosition::Start, 10);
    let stream = source
        .topic_stream("absent", options, CancellationToken::new())
        .await
        .unwrap();
    stream.finished().await;

    assert!(stream.is_empty());
    assert!(!stream.has_more());
}
