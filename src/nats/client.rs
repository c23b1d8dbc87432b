use anyhow::{Context, Result};
use async_nats::Client;
use tracing::{debug, info};

use super::messages::TranscriptEventMessage;
use crate::continuity::{TranscriptFragment, TranscriptSink};

/// Publishes transcript events to all subscribers of one subject.
///
/// Delivery is per-producer ordered and at-least-once for currently-connected
/// subscribers; join/leave never blocks delivery to others (NATS semantics).
pub struct BroadcastClient {
    client: Client,
    subject: String,
    /// Identifies this relay's transcript stream across recognition restarts
    stream_id: String,
}

impl BroadcastClient {
    /// Connect to the NATS server
    pub async fn connect(url: &str, subject: String) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS, broadcasting on '{}'", subject);

        Ok(Self::with_client(client, subject))
    }

    /// Wrap an existing connection (the recognizer shares it)
    pub fn with_client(client: Client, subject: String) -> Self {
        Self {
            client,
            subject,
            stream_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Publish one transcript event
    pub async fn publish_transcript(&self, fragment: &TranscriptFragment) -> Result<()> {
        let message = TranscriptEventMessage {
            session_id: self.stream_id.clone(),
            timestamp_ms: fragment.timestamp_ms,
            text: fragment.text.clone(),
            partial: !fragment.is_final,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let payload = serde_json::to_vec(&message)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .context("Failed to publish transcript event")?;

        debug!(
            "Published transcript to {} (t={}ms, final={})",
            self.subject, fragment.timestamp_ms, fragment.is_final
        );

        Ok(())
    }
}

#[async_trait::async_trait]
impl TranscriptSink for BroadcastClient {
    async fn publish(&self, fragment: &TranscriptFragment) -> Result<()> {
        self.publish_transcript(fragment).await
    }
}
