// Integration tests for the cross-context handoff
//
// Direct strategy: object URL + metadata in shared storage.
// Relay strategy: metadata and bytes as two messages, merged by the viewer.

mod common;

use anyhow::Result;
use common::{finished_record, FakeVideoSource, InfiniteMediaLoader, MemoryDownloader};
use std::sync::Arc;
use std::time::Duration;
use stream_clip::handoff::{new_relay_id, PendingRecord};
use stream_clip::{
    BlobReference, BlobRegistry, ChannelViewerLauncher, DeliveryMode, DirectStore, EncodedChunk,
    FileStorage, HandoffStore, HandoffStrategy, LocalRelay, MemoryBlobRegistry, MemoryStorage,
    NatsRelay, PassthroughEncoderFactory, PlatformCapabilities, RecordError, RecordInfo,
    RecordingSession, RelayInbox, RelayMessage, RelayStore, RelayTransport, ResultDelivery,
    SessionConfig, SessionEnv, StopReason, StrategyPreference, StreamInfo,
};
use tempfile::TempDir;

const FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
const CHROME: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

fn chunk(data: &[u8]) -> EncodedChunk {
    EncodedChunk {
        data: data.to_vec(),
        mime_type: "video/webm".to_string(),
        timestamp_ms: 0,
    }
}

fn info_message() -> RelayMessage {
    info_for("relay-1", "foo")
}

fn blob_message() -> RelayMessage {
    blob_for("relay-1", vec![9, 8, 7])
}

fn start_for(recording_id: &str) -> RelayMessage {
    RelayMessage::RecordStart {
        recording_id: recording_id.to_string(),
    }
}

fn info_for(recording_id: &str, streamer: &str) -> RelayMessage {
    RelayMessage::RecordInfo {
        recording_id: recording_id.to_string(),
        record_info: RecordInfo {
            stream_info: StreamInfo::new(streamer, "bar"),
            start_date_time: 1000,
            stop_date_time: 6000,
        },
    }
}

fn blob_for(recording_id: &str, bytes: Vec<u8>) -> RelayMessage {
    RelayMessage::RecordBlob {
        recording_id: recording_id.to_string(),
        result_blob: bytes,
    }
}

#[test]
fn test_strategy_follows_capability_probe() {
    let gecko = PlatformCapabilities::probe(FIREFOX);
    assert_eq!(gecko.select(StrategyPreference::Auto), HandoffStrategy::Relay);

    let chromium = PlatformCapabilities::probe(CHROME);
    assert_eq!(chromium.select(StrategyPreference::Auto), HandoffStrategy::Direct);

    // An explicit preference wins over the probe
    assert_eq!(gecko.select(StrategyPreference::Direct), HandoffStrategy::Direct);
}

#[tokio::test]
async fn test_direct_store_revokes_superseded_urls() -> Result<()> {
    let blobs = Arc::new(MemoryBlobRegistry::new("page"));
    let store = DirectStore::new(Arc::new(MemoryStorage::new()), blobs.clone());

    store
        .begin(&stream_clip::HandoffRecord::stub(StreamInfo::new("foo", "bar"), 1000))
        .await?;
    store.put_blob(&chunk(&[1])).await?;
    let BlobReference::Url(first) = store.load().await?.blob else {
        panic!("Expected an object URL");
    };

    store.put_blob(&chunk(&[1, 2])).await?;
    let BlobReference::Url(second) = store.load().await?.blob else {
        panic!("Expected an object URL");
    };

    assert_ne!(first, second);
    assert!(blobs.fetch(&first).is_none(), "Superseded URL should be revoked");
    assert_eq!(blobs.fetch(&second).unwrap().data.as_slice(), &[1, 2]);
    assert_eq!(blobs.live_count(), 1);

    // Empty chunks never replace real data
    store.put_blob(&chunk(&[])).await?;
    assert_eq!(store.load().await?.blob, BlobReference::Url(second));

    Ok(())
}

#[tokio::test]
async fn test_direct_store_without_record_is_not_found() -> Result<()> {
    let store = DirectStore::new(
        Arc::new(MemoryStorage::new()),
        Arc::new(MemoryBlobRegistry::new("page")),
    );

    assert!(matches!(store.load().await, Err(RecordError::NotFound)));

    Ok(())
}

#[tokio::test]
async fn test_direct_store_survives_in_file_storage() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("handoff").join("storage.json");
    let blobs = Arc::new(MemoryBlobRegistry::new("page"));

    let producer = DirectStore::new(Arc::new(FileStorage::new(&path)), blobs.clone());
    let record = finished_record(BlobReference::Bytes(vec![1, 2, 3]), 1000, 6000);
    producer.save(&record).await?;

    // A second context reading the same storage
    let consumer = DirectStore::new(Arc::new(FileStorage::new(&path)), blobs.clone());
    let loaded = consumer.load().await?;

    assert_eq!(loaded.stream_info, record.stream_info);
    assert_eq!(loaded.start_timestamp, 1000);
    assert_eq!(loaded.stop_timestamp, Some(6000));
    let BlobReference::Url(url) = loaded.blob else {
        panic!("Bytes should be stored as an object URL");
    };
    assert_eq!(blobs.fetch(&url).unwrap().data.as_slice(), &[1, 2, 3]);

    Ok(())
}

#[test]
fn test_relay_merge_is_order_independent() {
    let mut info_first = PendingRecord::default();
    info_first.apply(info_message());
    assert!(!info_first.is_complete());
    info_first.apply(blob_message());

    let mut data_first = PendingRecord::default();
    data_first.apply(blob_message());
    assert!(data_first.record().is_none());
    data_first.apply(info_message());

    assert_eq!(info_first, data_first);
    let record = info_first.record().unwrap();
    assert_eq!(record, data_first.record().unwrap());
    assert_eq!(record.blob, BlobReference::Bytes(vec![9, 8, 7]));
    assert_eq!(record.elapsed_seconds(), Some(5.0));
}

#[test]
fn test_relay_merge_never_mixes_recordings() {
    let mut pending = PendingRecord::default();
    pending.apply(start_for("relay-1"));
    pending.apply(info_for("relay-1", "first"));

    // Bytes of another recording do not complete this one
    pending.apply(blob_for("relay-2", vec![2, 2]));
    assert!(!pending.is_complete());
    assert_eq!(pending.recording_id(), Some("relay-1"));

    // A newer recording starts the merge over
    pending.apply(start_for("relay-2"));
    assert_eq!(pending.recording_id(), Some("relay-2"));
    pending.apply(blob_for("relay-2", vec![2, 2]));
    assert!(pending.record().is_none(), "Info of the older recording must not be reused");

    pending.apply(info_for("relay-2", "second"));
    let record = pending.record().unwrap();
    assert_eq!(record.stream_info.streamer_name, "second");
    assert_eq!(record.blob, BlobReference::Bytes(vec![2, 2]));
}

#[tokio::test]
async fn test_relay_inbox_merges_either_order() -> Result<()> {
    for messages in [
        [info_message(), blob_message()],
        [blob_message(), info_message()],
    ] {
        let relay = LocalRelay::new();
        let mut inbox = RelayInbox::open(&relay).await?;
        assert!(matches!(inbox.load(), Err(RecordError::NotFound)));

        for message in &messages {
            relay.publish(message).await?;
        }

        let record = tokio::time::timeout(Duration::from_secs(5), inbox.wait()).await??;
        assert_eq!(record.stream_info.streamer_name, "foo");
        assert_eq!(record.blob, BlobReference::Bytes(vec![9, 8, 7]));
    }

    Ok(())
}

#[tokio::test]
async fn test_relay_rejects_unfinished_record() -> Result<()> {
    let store = RelayStore::new(Arc::new(LocalRelay::new()));
    let stub = stream_clip::HandoffRecord::stub(StreamInfo::new("foo", "bar"), 1000);

    assert!(matches!(store.save(&stub).await, Err(RecordError::Relay(_))));

    Ok(())
}

#[test]
fn test_relay_message_wire_format() -> Result<()> {
    let json = serde_json::to_value(start_for("relay-1"))?;
    assert_eq!(json["type"], "recordStart");
    assert_eq!(json["recordingId"], "relay-1");

    let json = serde_json::to_value(blob_message())?;
    assert_eq!(json["type"], "recordBlob");
    assert_eq!(json["recordingId"], "relay-1");
    assert_eq!(json["resultBlob"], "CQgH");

    let json = serde_json::to_value(info_message())?;
    assert_eq!(json["type"], "recordInfo");
    assert_eq!(json["recordInfo"]["streamInfo"]["streamerName"], "foo");
    assert_eq!(json["recordInfo"]["stopDateTime"], 6000);

    Ok(())
}

#[test]
fn test_nats_subject_is_unique_per_relay() {
    let first = new_relay_id();
    let second = new_relay_id();
    assert_ne!(first, second);

    let subject = NatsRelay::subject_for(&first);
    assert_eq!(subject, format!("clip.relay.{}", first));
    assert_ne!(subject, NatsRelay::subject_for(&second));
}

#[tokio::test]
async fn test_relay_reconstructs_record_in_viewer_context() -> Result<()> {
    let relay: Arc<dyn RelayTransport> = Arc::new(LocalRelay::new());
    let page_blobs = Arc::new(MemoryBlobRegistry::new("page"));
    let store = Arc::new(RelayStore::new(relay.clone()));
    let env = SessionEnv::new(
        SessionConfig::default(),
        Arc::new(PassthroughEncoderFactory),
        store.clone(),
    );
    let source = FakeVideoSource::new(vec![vec![1, 2], vec![3, 4, 5]]);

    let session = RecordingSession::start(&source, StreamInfo::new("foo", "bar"), &env).await?;
    let outcome = session.stop(StopReason::User).await;
    assert_eq!(outcome.record.blob, BlobReference::Bytes(source.frame_bytes()));

    // The viewer opens after the producer is done
    let mut inbox = RelayInbox::open(relay.as_ref()).await?;
    let record = tokio::time::timeout(Duration::from_secs(5), inbox.wait()).await??;
    assert_eq!(record, outcome.record);

    // Separate context: its own URL table, nothing shared with the page
    let viewer_blobs = Arc::new(MemoryBlobRegistry::new("viewer"));
    let (launcher, _requests) = ChannelViewerLauncher::new();
    let delivery = ResultDelivery::new(
        DeliveryMode::Viewer,
        viewer_blobs.clone(),
        Arc::new(MemoryDownloader::default()),
        Arc::new(launcher),
    )
    .with_media_loader(Arc::new(InfiniteMediaLoader))
    .with_resolver(stream_clip::DurationResolver::new(Duration::ZERO));

    let viewer = delivery.open_viewer(record).await?;
    assert_eq!(viewer.blob().data.as_slice(), source.frame_bytes().as_slice());
    assert!(viewer.url().starts_with("blob:viewer/"));
    assert!(viewer_blobs.fetch(viewer.url()).is_some());
    assert_eq!(page_blobs.live_count(), 0);

    viewer.close();
    assert_eq!(viewer_blobs.live_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_relay_viewer_of_second_recording_waits_for_it() -> Result<()> {
    let relay: Arc<dyn RelayTransport> = Arc::new(LocalRelay::new());
    let store = Arc::new(RelayStore::new(relay.clone()));
    let env = SessionEnv::new(
        SessionConfig::default(),
        Arc::new(PassthroughEncoderFactory),
        store.clone(),
    );

    let first_source = FakeVideoSource::new(vec![vec![1, 1, 1]]);
    let first =
        RecordingSession::start(&first_source, StreamInfo::new("first", "bar"), &env).await?;
    first.stop(StopReason::User).await;

    let second_source = FakeVideoSource::new(vec![vec![2, 2], vec![2]]);
    let second =
        RecordingSession::start(&second_source, StreamInfo::new("second", "bar"), &env).await?;

    // Viewer of the second recording opens while it is still running
    let mut inbox = RelayInbox::open(relay.as_ref()).await?;
    let early = tokio::time::timeout(Duration::from_millis(200), inbox.wait()).await;
    assert!(early.is_err(), "The first recording must not be handed over again");
    assert!(matches!(inbox.load(), Err(RecordError::NotFound)));

    let outcome = second.stop(StopReason::User).await;
    let record = tokio::time::timeout(Duration::from_secs(5), inbox.wait()).await??;

    assert_eq!(record, outcome.record);
    assert_eq!(record.stream_info.streamer_name, "second");
    assert_eq!(record.blob, BlobReference::Bytes(second_source.frame_bytes()));

    // A viewer opened afterwards gets the second recording too
    let mut late = RelayInbox::open(relay.as_ref()).await?;
    let replayed = tokio::time::timeout(Duration::from_secs(5), late.wait()).await??;
    assert_eq!(replayed, outcome.record);

    Ok(())
}
