use async_trait::async_trait;
use futures::stream::StreamExt;
use std::sync::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use super::relay::RelayMessage;
use crate::error::{RecordError, RecordResult};

/// Message channel between the recording context and the viewer
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn publish(&self, message: &RelayMessage) -> RecordResult<()>;

    /// Receive messages published from now on (and, if the transport
    /// retains them, the latest ones already published)
    async fn subscribe(&self) -> RecordResult<mpsc::Receiver<RelayMessage>>;

    /// Get transport name for logging
    fn name(&self) -> &str;
}

/// In-process relay
///
/// Retains the latest message of each kind for the current recording and
/// replays them to late subscribers, so a viewer opened after the producer
/// stopped still gets the full record. A message for another recording
/// drops everything retained so far.
pub struct LocalRelay {
    sender: broadcast::Sender<RelayMessage>,
    retained: Mutex<Retained>,
}

#[derive(Default)]
struct Retained {
    recording_id: Option<String>,
    messages: Vec<RelayMessage>,
}

impl Retained {
    fn keep(&mut self, message: &RelayMessage) {
        if self.recording_id.as_deref() != Some(message.recording_id()) {
            self.recording_id = Some(message.recording_id().to_string());
            self.messages.clear();
        }
        self.messages.retain(|kept| kept.kind() != message.kind());
        self.messages.push(message.clone());
    }
}

impl LocalRelay {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            sender,
            retained: Mutex::new(Retained::default()),
        }
    }
}

impl Default for LocalRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelayTransport for LocalRelay {
    async fn publish(&self, message: &RelayMessage) -> RecordResult<()> {
        let mut retained = self
            .retained
            .lock()
            .map_err(|_| RecordError::Relay("relay lock poisoned".to_string()))?;

        retained.keep(message);

        // No live subscriber is fine, the message is retained
        let _ = self.sender.send(message.clone());
        Ok(())
    }

    async fn subscribe(&self) -> RecordResult<mpsc::Receiver<RelayMessage>> {
        let (replay, mut live) = {
            let retained = self
                .retained
                .lock()
                .map_err(|_| RecordError::Relay("relay lock poisoned".to_string()))?;
            (retained.messages.clone(), self.sender.subscribe())
        };

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for message in replay {
                if tx.send(message).await.is_err() {
                    return;
                }
            }
            loop {
                match live.recv().await {
                    Ok(message) => {
                        if tx.send(message).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Relay subscriber lagged, {} messages skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        Ok(rx)
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// Relay over NATS
///
/// Messages are JSON with base64 blob bytes. NATS core does not retain
/// messages: the viewer must subscribe before the producer saves.
pub struct NatsRelay {
    client: async_nats::Client,
    subject: String,
}

impl NatsRelay {
    /// Connect to NATS server
    pub async fn connect(url: &str, relay_id: &str) -> RecordResult<Self> {
        info!("Connecting relay to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .map_err(|e| RecordError::Relay(format!("Failed to connect to NATS: {}", e)))?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            subject: Self::subject_for(relay_id),
        })
    }

    pub fn subject_for(relay_id: &str) -> String {
        format!("clip.relay.{}", relay_id)
    }
}

/// Fresh id naming one relay, or one recording on a relay
pub fn new_relay_id() -> String {
    format!("relay-{}", uuid::Uuid::new_v4())
}

#[async_trait]
impl RelayTransport for NatsRelay {
    async fn publish(&self, message: &RelayMessage) -> RecordResult<()> {
        let payload = serde_json::to_vec(message)?;
        let size = payload.len();

        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| RecordError::Relay(format!("Failed to publish {}: {}", message.kind(), e)))?;

        info!("Published {} to {} ({} bytes)", message.kind(), self.subject, size);
        Ok(())
    }

    async fn subscribe(&self) -> RecordResult<mpsc::Receiver<RelayMessage>> {
        info!("Subscribing to relay on {}", self.subject);

        let mut subscriber = self
            .client
            .subscribe(self.subject.clone())
            .await
            .map_err(|e| RecordError::Relay(format!("Failed to subscribe: {}", e)))?;

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<RelayMessage>(&msg.payload) {
                    Ok(message) => {
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to parse relay message: {}", e);
                    }
                }
            }
        });

        Ok(rx)
    }

    fn name(&self) -> &str {
        "nats"
    }
}
