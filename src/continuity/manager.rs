use super::state::{ContinuityState, StreamState};
use crate::audio::AudioChunk;
use crate::recognizer::{RecognitionResult, RecognizerConfig, RecognizerService, SessionEvent};
use crate::recognizer::service::RecognitionSession;
use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// One transcript fragment on the corrected global timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFragment {
    pub timestamp_ms: u64,
    pub text: String,
    pub is_final: bool,
}

/// Consumer of emitted fragments (the broadcaster, or a test channel)
#[async_trait::async_trait]
pub trait TranscriptSink: Send + Sync {
    async fn publish(&self, fragment: &TranscriptFragment) -> Result<()>;
}

/// Counters reported when the pipeline shuts down
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    pub restarts: u64,
    pub chunks_forwarded: u64,
    pub chunks_replayed: u64,
    pub finals_broadcast: u64,
    pub interims_seen: u64,
}

/// Presents an unbounded transcription stream built from a sequence of
/// bounded recognition sessions.
///
/// Owns all continuity state and the live session; runs as a single task so
/// no restart or bridging computation can interleave with chunk ingestion.
pub struct ContinuityManager<R, S> {
    recognizer: R,
    sink: S,
    config: RecognizerConfig,
    publish_interim: bool,

    state: ContinuityState,
    stream_state: StreamState,
    session: Option<RecognitionSession>,
    /// Instant at which the current session hits the service's duration cap
    deadline: Instant,

    /// Chunks captured during the current session, retained for replay
    current_buffer: Vec<AudioChunk>,
    /// Chunks from the immediately preceding session, read-only
    previous_buffer: Vec<AudioChunk>,
    /// Set at restart, cleared on the first chunk written afterwards
    new_stream: bool,

    stats: RelayStats,
}

enum Step {
    Chunk(Option<AudioChunk>),
    Event(Option<SessionEvent>),
    Deadline,
}

impl<R: RecognizerService, S: TranscriptSink> ContinuityManager<R, S> {
    pub fn new(recognizer: R, sink: S, config: RecognizerConfig, publish_interim: bool) -> Self {
        Self {
            recognizer,
            sink,
            config,
            publish_interim,
            state: ContinuityState::new(),
            stream_state: StreamState::Idle,
            session: None,
            deadline: Instant::now(),
            current_buffer: Vec::new(),
            previous_buffer: Vec::new(),
            new_stream: true,
            stats: RelayStats::default(),
        }
    }

    pub fn stream_state(&self) -> StreamState {
        self.stream_state
    }

    /// Drive the pipeline until the audio source ends.
    ///
    /// Consumes chunks from `audio_rx`, feeds the current session, restarts it
    /// at the streaming limit or on stream errors, and emits corrected
    /// transcript fragments to the sink.
    pub async fn run(mut self, mut audio_rx: mpsc::Receiver<AudioChunk>) -> Result<RelayStats> {
        self.open_session().await;

        loop {
            let deadline = self.deadline;
            let step = tokio::select! {
                chunk = audio_rx.recv() => Step::Chunk(chunk),
                event = next_session_event(&mut self.session) => Step::Event(event),
                _ = sleep_until(deadline) => Step::Deadline,
            };

            match step {
                Step::Chunk(Some(chunk)) => self.ingest_chunk(chunk),
                Step::Chunk(None) => {
                    info!("Audio source ended; shutting down");
                    break;
                }
                Step::Event(Some(SessionEvent::Result(result))) => {
                    self.handle_result(result).await;
                }
                Step::Event(Some(SessionEvent::Error(err))) => {
                    if !err.is_restartable() {
                        error!("Fatal session error: {}", err);
                        return Err(err.into());
                    }
                    // Stream failures recover through the restart path; there
                    // is deliberately no backoff (known gap: a persistently
                    // failing service produces an immediate-restart loop).
                    warn!(restarts = self.stats.restarts, "Recognition stream error: {}", err);
                    self.restart("stream error").await;
                }
                Step::Event(None) => {
                    warn!("Recognition stream closed by service");
                    self.restart("stream closed").await;
                }
                Step::Deadline => {
                    self.restart("streaming limit reached").await;
                }
            }
        }

        if let Some(mut session) = self.session.take() {
            session.close();
        }
        self.stream_state = StreamState::Closed;

        info!(
            restarts = self.stats.restarts,
            chunks = self.stats.chunks_forwarded,
            replayed = self.stats.chunks_replayed,
            finals = self.stats.finals_broadcast,
            "Pipeline closed"
        );

        Ok(self.stats)
    }

    /// Forward one live chunk, replaying the previous session's
    /// unacknowledged tail first if this is the first chunk since a restart.
    fn ingest_chunk(&mut self, chunk: AudioChunk) {
        self.current_buffer.push(chunk.clone());

        // Bridging and writes wait for an open session: while Idle or
        // Restarting (a failed open), chunks only accumulate in the buffer and
        // the new_stream flag stays set, so the replay still runs on the first
        // chunk after a session comes up.
        if self.stream_state != StreamState::SessionOpen {
            return;
        }

        if self.new_stream {
            if let Some(plan) = self
                .state
                .bridge_plan(self.previous_buffer.len(), self.config.streaming_limit_ms)
            {
                if let Some(session) = &self.session {
                    for replayed in &self.previous_buffer[plan.replay_from..] {
                        session.write(replayed.clone());
                        self.stats.chunks_replayed += 1;
                    }
                    debug!(
                        replayed = self.previous_buffer.len() - plan.replay_from,
                        skipped = plan.replay_from,
                        "Replayed audio tail across restart boundary"
                    );
                }
            }
            self.new_stream = false;
        }

        if let Some(session) = &self.session {
            session.write(chunk);
        }
        self.stats.chunks_forwarded += 1;
    }

    /// Correct a result onto the global timeline and emit it.
    async fn handle_result(&mut self, result: RecognitionResult) {
        let corrected_ms = self
            .state
            .corrected_time_ms(result.result_end_ms, self.config.streaming_limit_ms)
            .max(0) as u64;

        self.state.observe_result(result.result_end_ms, result.is_final);

        let fragment = TranscriptFragment {
            timestamp_ms: corrected_ms,
            text: result.transcript,
            is_final: result.is_final,
        };

        if fragment.is_final {
            println!("\n{}: {}", corrected_ms, fragment.text);

            if let Err(e) = self.sink.publish(&fragment).await {
                error!("Failed to broadcast final transcript: {}", e);
            } else {
                self.stats.finals_broadcast += 1;
            }
        } else {
            self.stats.interims_seen += 1;

            print!("\r{}: {}", corrected_ms, fragment.text);
            std::io::Write::flush(&mut std::io::stdout()).ok();

            if self.publish_interim {
                if let Err(e) = self.sink.publish(&fragment).await {
                    error!("Failed to broadcast interim transcript: {}", e);
                }
            }
        }
    }

    /// The restart sequence: close the dying session, advance the watermark,
    /// swap the audio buffers, open a replacement, re-arm the timer.
    async fn restart(&mut self, reason: &str) {
        self.stream_state = StreamState::Restarting;

        // Dropping the handle also drops its event receiver, so no stale
        // events from the dying session can reach this loop.
        if let Some(mut session) = self.session.take() {
            session.close();
        }

        self.state.begin_restart();
        self.previous_buffer = std::mem::take(&mut self.current_buffer);
        self.new_stream = true;
        self.stats.restarts += 1;

        info!(
            "{}: restarting recognition stream ({})",
            self.config.streaming_limit_ms * self.state.restart_counter,
            reason
        );

        self.open_session().await;
    }

    /// Open a session for the current restart index and arm its timer.
    ///
    /// A connect failure is logged and leaves the pipeline without a session
    /// (stream state unchanged, Idle or Restarting) until the next restart;
    /// chunks keep accumulating in the current buffer meanwhile, so they are
    /// replayed once a session comes up.
    async fn open_session(&mut self) {
        self.deadline = Instant::now()
            + std::time::Duration::from_millis(self.config.streaming_limit_ms);

        match self
            .recognizer
            .open(&self.config, self.state.restart_counter)
            .await
        {
            Ok(session) => {
                self.session = Some(session);
                self.stream_state = StreamState::SessionOpen;
            }
            Err(e) => {
                error!("Failed to open recognition session: {}", e);
                self.session = None;
            }
        }
    }
}

async fn next_session_event(session: &mut Option<RecognitionSession>) -> Option<SessionEvent> {
    match session {
        Some(s) => s.next_event().await,
        None => std::future::pending().await,
    }
}
