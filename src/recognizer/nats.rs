// NATS-backed recognition sessions.
//
// Each session gets a fresh uuid. Opening publishes a session-open control
// message and subscribes to that session's result subject; a forwarder task
// then streams base64 PCM frames out, and a decoder task turns result
// payloads back into SessionEvents. Closing the handle drops the forwarder's
// channel, which makes it publish the end-of-audio marker before exiting.

use anyhow::Result;
use base64::Engine;
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::service::{
    RecognitionResult, RecognitionSession, RecognizerConfig, RecognizerService, SessionEvent,
};
use crate::error::RelayError;
use crate::nats::messages::{AudioFrameMessage, RecognitionResultMessage, SessionOpenMessage};

const OPEN_SUBJECT: &str = "stt.session.open";

pub struct NatsRecognizer {
    client: async_nats::Client,
}

impl NatsRecognizer {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }

    fn audio_subject(session_id: &str) -> String {
        format!("stt.audio.{}", session_id)
    }

    fn result_subject(session_id: &str) -> String {
        format!("stt.result.{}", session_id)
    }
}

#[async_trait::async_trait]
impl RecognizerService for NatsRecognizer {
    async fn open(
        &self,
        config: &RecognizerConfig,
        index: u64,
    ) -> Result<RecognitionSession, RelayError> {
        let session_id = uuid::Uuid::new_v4().to_string();

        // Subscribe before announcing the session so no result can be missed
        let mut results = self
            .client
            .subscribe(Self::result_subject(&session_id))
            .await
            .map_err(|e| RelayError::ServiceConnect(e.to_string()))?;

        let open = SessionOpenMessage {
            session_id: session_id.clone(),
            encoding: config.encoding.clone(),
            sample_rate_hertz: config.sample_rate_hertz,
            language_code: config.language_code.clone(),
            interim_results: config.interim_results,
        };
        let payload =
            serde_json::to_vec(&open).map_err(|e| RelayError::ServiceConnect(e.to_string()))?;

        self.client
            .publish(OPEN_SUBJECT.to_string(), payload.into())
            .await
            .map_err(|e| RelayError::ServiceConnect(e.to_string()))?;

        info!(session_id = %session_id, index, "Recognition session opened");

        let (audio_tx, mut audio_rx) = mpsc::unbounded_channel::<crate::audio::AudioChunk>();
        let (event_tx, event_rx) = mpsc::channel(64);

        // Forwarder: audio chunks out to the service
        let client = self.client.clone();
        let forward_session = session_id.clone();
        let forward_config = config.clone();
        let forward_events = event_tx.clone();
        tokio::spawn(async move {
            let subject = NatsRecognizer::audio_subject(&forward_session);
            let mut sequence: u64 = 0;

            while let Some(chunk) = audio_rx.recv().await {
                let frame = AudioFrameMessage {
                    session_id: forward_session.clone(),
                    sequence,
                    pcm: base64::engine::general_purpose::STANDARD.encode(&chunk.pcm),
                    sample_rate: forward_config.sample_rate_hertz,
                    channels: 1,
                    timestamp: chrono::Utc::now().to_rfc3339(),
                    final_frame: false,
                };
                sequence += 1;

                let payload = match serde_json::to_vec(&frame) {
                    Ok(p) => p,
                    Err(e) => {
                        error!("Failed to encode audio frame: {}", e);
                        continue;
                    }
                };

                if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                    error!(session_id = %forward_session, "Audio publish failed: {}", e);
                    let _ = forward_events
                        .send(SessionEvent::Error(RelayError::ServiceStream(
                            e.to_string(),
                        )))
                        .await;
                    return;
                }
            }

            // Channel closed: the handle was closed. Signal end-of-audio.
            let marker = AudioFrameMessage {
                session_id: forward_session.clone(),
                sequence,
                pcm: String::new(),
                sample_rate: forward_config.sample_rate_hertz,
                channels: 1,
                timestamp: chrono::Utc::now().to_rfc3339(),
                final_frame: true,
            };
            if let Ok(payload) = serde_json::to_vec(&marker) {
                if let Err(e) = client.publish(subject, payload.into()).await {
                    debug!(session_id = %forward_session, "Final frame publish failed: {}", e);
                }
            }
            debug!(session_id = %forward_session, "Audio forwarder finished ({} frames)", sequence);
        });

        // Decoder: service results in as SessionEvents
        let decode_session = session_id;
        tokio::spawn(async move {
            while let Some(msg) = results.next().await {
                match serde_json::from_slice::<RecognitionResultMessage>(&msg.payload) {
                    Ok(result) => {
                        let transcript = result
                            .alternatives
                            .first()
                            .map(|a| a.transcript.clone())
                            .unwrap_or_default();

                        let event = SessionEvent::Result(RecognitionResult {
                            result_end_ms: result.result_end_time.to_millis(),
                            transcript,
                            is_final: result.is_final,
                        });

                        if event_tx.send(event).await.is_err() {
                            // Session handle dropped; stop decoding
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %decode_session, "Failed to parse result message: {}", e);
                    }
                }
            }
            debug!(session_id = %decode_session, "Result decoder finished");
        });

        Ok(RecognitionSession::new(index, audio_tx, event_rx))
    }
}
