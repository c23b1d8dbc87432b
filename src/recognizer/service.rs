use crate::audio::AudioChunk;
use crate::error::RelayError;
use tokio::sync::mpsc;
use tracing::debug;

/// Parameters sent with every open-stream request
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    pub encoding: String,
    pub sample_rate_hertz: u32,
    pub language_code: String,
    pub interim_results: bool,
    /// Hard per-connection duration cap the service enforces
    pub streaming_limit_ms: u64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            encoding: "LINEAR16".to_string(),
            sample_rate_hertz: 16000,
            language_code: "pt-BR".to_string(),
            interim_results: true,
            streaming_limit_ms: 290_000,
        }
    }
}

/// One transcript result from the service, on the session's own clock
/// (starting at zero when the session opens).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    pub result_end_ms: u64,
    pub transcript: String,
    pub is_final: bool,
}

/// Event delivered on a session's event channel.
///
/// Results arrive in non-decreasing `result_end_ms` order within one session;
/// no ordering is guaranteed across a restart boundary without the continuity
/// manager's timeline correction.
#[derive(Debug)]
pub enum SessionEvent {
    Result(RecognitionResult),
    /// The session is dead once this fires
    Error(RelayError),
}

/// Opens bounded-duration streaming connections to the recognition service.
///
/// The continuity manager opens a fresh session at stream start and at every
/// restart boundary; an implementation never retries a failed session itself.
#[async_trait::async_trait]
pub trait RecognizerService: Send + Sync {
    async fn open(
        &self,
        config: &RecognizerConfig,
        index: u64,
    ) -> Result<RecognitionSession, RelayError>;
}

/// Handle to one live recognition stream.
pub struct RecognitionSession {
    /// Restart index: 0 for the first session, incremented per restart
    index: u64,
    audio_tx: Option<mpsc::UnboundedSender<AudioChunk>>,
    events: mpsc::Receiver<SessionEvent>,
}

impl RecognitionSession {
    pub fn new(
        index: u64,
        audio_tx: mpsc::UnboundedSender<AudioChunk>,
        events: mpsc::Receiver<SessionEvent>,
    ) -> Self {
        Self {
            index,
            audio_tx: Some(audio_tx),
            events,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn is_open(&self) -> bool {
        self.audio_tx.is_some()
    }

    /// Forward one audio chunk into the stream.
    ///
    /// Never fails: a write against a closed or mid-teardown session is a
    /// silent no-op, so callers racing a restart need no special casing.
    pub fn write(&self, chunk: AudioChunk) {
        if let Some(tx) = &self.audio_tx {
            if tx.send(chunk).is_err() {
                debug!(index = self.index, "Dropped write to dead session");
            }
        } else {
            debug!(index = self.index, "Dropped write to closed session");
        }
    }

    /// Signal end-of-audio and release the stream. Idempotent.
    pub fn close(&mut self) {
        if self.audio_tx.take().is_some() {
            debug!(index = self.index, "Session closed");
        }
    }

    /// Receive the next event from the service.
    ///
    /// Returns `None` once the service side has shut the stream down and all
    /// pending events were drained.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }
}
