// Shared fakes for integration tests
//
// Stand-ins for the page, its video element, the media element used for
// duration probing and the download sink.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use stream_clip::{
    Blob, BlobReference, Downloader, EncodedChunk, Encoder, EncoderFactory, EncoderOptions,
    HandoffRecord, HandoffStore, HandoffStrategy, MediaElement, MediaLoader, MediaStream, Page,
    PageLocation, RecordError, RecordResult, StreamInfo, VideoSource,
};
use tokio::sync::mpsc;

/// Video element that yields a fixed set of frames
pub struct FakeVideoSource {
    muted: AtomicBool,
    volume: Mutex<f64>,
    frames: Vec<Vec<u8>>,
    captures: AtomicUsize,
}

impl FakeVideoSource {
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        Self {
            muted: AtomicBool::new(false),
            volume: Mutex::new(1.0),
            frames,
            captures: AtomicUsize::new(0),
        }
    }

    /// Muted with volume at zero, the way a stream page often loads
    pub fn silent(frames: Vec<Vec<u8>>) -> Self {
        let source = Self::new(frames);
        source.muted.store(true, Ordering::SeqCst);
        *source.volume.lock().unwrap() = 0.0;
        source
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn frame_bytes(&self) -> Vec<u8> {
        self.frames.concat()
    }
}

impl VideoSource for FakeVideoSource {
    fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    fn volume(&self) -> f64 {
        *self.volume.lock().unwrap()
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    fn set_volume(&self, volume: f64) {
        *self.volume.lock().unwrap() = volume;
    }

    fn capture_stream(&self) -> Result<MediaStream> {
        self.captures.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(self.frames.len() + 1);
        for frame in &self.frames {
            tx.try_send(frame.clone())?;
        }
        Ok(MediaStream::new("fake", rx))
    }

    fn name(&self) -> &str {
        "fake-video"
    }
}

/// Encoder factory for a platform without the requested codec
pub struct FailingEncoderFactory;

impl EncoderFactory for FailingEncoderFactory {
    fn create(&self, _stream: MediaStream, options: &EncoderOptions) -> Result<Box<dyn Encoder>> {
        bail!("{} is not supported", options.mime_type)
    }
}

/// Encoder factory whose encoders never finish stopping
///
/// Each encoder emits `chunk` once on start, then keeps its channel open.
pub struct HangingEncoderFactory {
    pub chunk: Vec<u8>,
}

impl EncoderFactory for HangingEncoderFactory {
    fn create(&self, stream: MediaStream, options: &EncoderOptions) -> Result<Box<dyn Encoder>> {
        Ok(Box::new(HangingEncoder {
            _stream: stream,
            chunk: self.chunk.clone(),
            mime_type: options.mime_type.clone(),
            chunks: None,
        }))
    }
}

struct HangingEncoder {
    _stream: MediaStream,
    chunk: Vec<u8>,
    mime_type: String,
    chunks: Option<mpsc::Sender<EncodedChunk>>,
}

#[async_trait]
impl Encoder for HangingEncoder {
    async fn start(&mut self) -> Result<mpsc::Receiver<EncodedChunk>> {
        let (tx, rx) = mpsc::channel(4);
        tx.try_send(EncodedChunk {
            data: self.chunk.clone(),
            mime_type: self.mime_type.clone(),
            timestamp_ms: 0,
        })?;
        self.chunks = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }

    fn is_encoding(&self) -> bool {
        self.chunks.is_some()
    }

    fn name(&self) -> &str {
        "hanging"
    }
}

/// Media element with a scripted duration
///
/// Reports `initial` until it has been seeked past `reveal_after`, then
/// reports `revealed`.
pub struct FakeMedia {
    position: f64,
    initial: f64,
    revealed: Option<f64>,
    reveal_after: f64,
    pub seeks: Arc<Mutex<Vec<f64>>>,
}

impl FakeMedia {
    /// Never learns its duration
    pub fn infinite() -> Self {
        Self {
            position: 0.0,
            initial: f64::INFINITY,
            revealed: None,
            reveal_after: f64::MAX,
            seeks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Learns `duration` once seeked far enough
    pub fn revealing(duration: f64) -> Self {
        Self {
            revealed: Some(duration),
            reveal_after: 1e15,
            ..Self::infinite()
        }
    }
}

impl MediaElement for FakeMedia {
    fn set_current_time(&mut self, seconds: f64) {
        self.seeks.lock().unwrap().push(seconds);
        if seconds >= self.reveal_after {
            if let Some(revealed) = self.revealed {
                self.initial = revealed;
            }
        }
        self.position = seconds.min(self.initial);
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn duration(&self) -> f64 {
        self.initial
    }
}

/// Loads every blob as a media element that never learns its duration
pub struct InfiniteMediaLoader;

impl MediaLoader for InfiniteMediaLoader {
    fn load(&self, _blob: &Blob) -> RecordResult<Box<dyn MediaElement>> {
        Ok(Box::new(FakeMedia::infinite()))
    }
}

/// Keeps downloads in memory
#[derive(Default)]
pub struct MemoryDownloader {
    pub downloads: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryDownloader {
    pub fn count(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }
}

#[async_trait]
impl Downloader for MemoryDownloader {
    async fn download(&self, blob: &Blob, file_name: &str) -> Result<PathBuf> {
        self.downloads
            .lock()
            .unwrap()
            .push((file_name.to_string(), blob.data.as_ref().clone()));
        Ok(PathBuf::from(file_name))
    }
}

/// Store wrapper counting finalizations
pub struct CountingStore {
    inner: Arc<dyn HandoffStore>,
    pub saves: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn HandoffStore>) -> Self {
        Self {
            inner,
            saves: AtomicUsize::new(0),
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HandoffStore for CountingStore {
    fn strategy(&self) -> HandoffStrategy {
        self.inner.strategy()
    }

    async fn begin(&self, stub: &HandoffRecord) -> RecordResult<()> {
        self.inner.begin(stub).await
    }

    async fn put_blob(&self, chunk: &EncodedChunk) -> RecordResult<()> {
        self.inner.put_blob(chunk).await
    }

    async fn save(&self, record: &HandoffRecord) -> RecordResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(record).await
    }

    async fn load(&self) -> RecordResult<HandoffRecord> {
        self.inner.load().await
    }
}

/// Store whose every operation fails, like storage that is full
#[derive(Default)]
pub struct FailingStore {
    pub writes: AtomicUsize,
}

impl FailingStore {
    fn fail(&self) -> RecordError {
        self.writes.fetch_add(1, Ordering::SeqCst);
        RecordError::StorageWriteFailure("quota exceeded".to_string())
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HandoffStore for FailingStore {
    fn strategy(&self) -> HandoffStrategy {
        HandoffStrategy::Direct
    }

    async fn begin(&self, _stub: &HandoffRecord) -> RecordResult<()> {
        Err(self.fail())
    }

    async fn put_blob(&self, _chunk: &EncodedChunk) -> RecordResult<()> {
        Err(self.fail())
    }

    async fn save(&self, _record: &HandoffRecord) -> RecordResult<()> {
        Err(self.fail())
    }

    async fn load(&self) -> RecordResult<HandoffRecord> {
        Err(RecordError::StorageWriteFailure("storage unreadable".to_string()))
    }
}

/// A stream page with a navigable location
pub struct FakePage {
    pub source: Option<Arc<FakeVideoSource>>,
    pub streamer: Option<String>,
    pub title: Option<String>,
    location: Mutex<String>,
}

impl FakePage {
    pub fn new(source: Option<Arc<FakeVideoSource>>) -> Self {
        Self {
            source,
            streamer: Some("foo".to_string()),
            title: Some("bar".to_string()),
            location: Mutex::new("https://live.example/foo".to_string()),
        }
    }

    pub fn navigate(&self, to: &str) {
        *self.location.lock().unwrap() = to.to_string();
    }
}

impl PageLocation for FakePage {
    fn href(&self) -> String {
        self.location.lock().unwrap().clone()
    }
}

impl Page for FakePage {
    fn video_source(&self) -> Option<Arc<dyn VideoSource>> {
        self.source.clone().map(|source| source as Arc<dyn VideoSource>)
    }

    fn streamer_name(&self) -> Option<String> {
        self.streamer.clone()
    }

    fn stream_title(&self) -> Option<String> {
        self.title.clone()
    }
}

pub fn finished_record(blob: BlobReference, start: i64, stop: i64) -> HandoffRecord {
    HandoffRecord {
        blob,
        stream_info: StreamInfo::new("foo", "bar"),
        start_timestamp: start,
        stop_timestamp: Some(stop),
    }
}

/// 16-bit mono PCM WAV with `seconds` of silence
pub fn wav(sample_rate: u32, seconds: u32) -> Vec<u8> {
    let data_len = sample_rate * seconds * 2;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(44 + data_len as usize, 0);
    bytes
}

/// EBML element with an 8-byte size field
fn ebml(id: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut bytes = id.to_vec();
    bytes.push(0x01);
    bytes.extend_from_slice(&(payload.len() as u64).to_be_bytes()[1..]);
    bytes.extend_from_slice(payload);
    bytes
}

/// EBML element whose size is left unknown, as a live muxer writes it
fn ebml_open(id: &[u8], children: &[u8]) -> Vec<u8> {
    let mut bytes = id.to_vec();
    bytes.push(0xff);
    bytes.extend_from_slice(children);
    bytes
}

fn ebml_uint(id: &[u8], value: u64) -> Vec<u8> {
    ebml(id, &value.to_be_bytes())
}

/// Live-style WebM: unknown segment and cluster sizes and no duration in
/// the header, like a recorder's output
///
/// One mono 16-bit PCM track of `blocks` blocks, each `block_ms` long.
pub fn live_webm(blocks: u16, block_ms: u16) -> Vec<u8> {
    let header = ebml(
        &[0x1a, 0x45, 0xdf, 0xa3],
        &[
            ebml_uint(&[0x42, 0x86], 1),
            ebml(&[0x42, 0x82], b"webm"),
        ]
        .concat(),
    );

    let info = ebml(&[0x15, 0x49, 0xa9, 0x66], &ebml_uint(&[0x2a, 0xd7, 0xb1], 1_000_000));

    let audio = ebml(
        &[0xe1],
        &[
            ebml(&[0xb5], &8000f64.to_be_bytes()),
            ebml_uint(&[0x9f], 1),
            ebml_uint(&[0x62, 0x64], 16),
        ]
        .concat(),
    );
    let track = ebml(
        &[0xae],
        &[
            ebml_uint(&[0xd7], 1),
            ebml_uint(&[0x73, 0xc5], 1),
            ebml_uint(&[0x83], 2),
            ebml(&[0x86], b"A_PCM/INT/LIT"),
            ebml_uint(&[0x23, 0xe3, 0x83], u64::from(block_ms) * 1_000_000),
            audio,
        ]
        .concat(),
    );
    let tracks = ebml(&[0x16, 0x54, 0xae, 0x6b], &track);

    let mut cluster = ebml_uint(&[0xe7], 0);
    for i in 0..blocks {
        let mut block = vec![0x81];
        block.extend_from_slice(&(i * block_ms).to_be_bytes());
        block.push(0x80);
        block.extend_from_slice(&[0u8; 16]);
        cluster.extend(ebml(&[0xa3], &block));
    }
    let cluster = ebml_open(&[0x1f, 0x43, 0xb6, 0x75], &cluster);

    let segment = ebml_open(&[0x18, 0x53, 0x80, 0x67], &[info, tracks, cluster].concat());
    [header, segment].concat()
}
