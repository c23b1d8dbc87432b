// Continuity bookkeeping for an unbounded transcription stream built from a
// sequence of bounded recognition sessions.
//
// The recognition service caps the duration of a single streaming connection,
// so the stream is restarted before the cap and the tail of audio the dying
// session never finalized is replayed into the new one. Everything needed to
// splice the timeline back together lives in `ContinuityState`; the math is
// kept as pure methods so it can be tested without a pipeline.

use tracing::debug;

/// Lifecycle of the managed stream.
///
/// Legal transitions:
///   Idle -> SessionOpen          (first session opened)
///   SessionOpen -> Restarting    (streaming limit hit or stream error)
///   Restarting -> SessionOpen    (replacement session opened)
///   SessionOpen -> Closed        (audio source ended or shutdown)
///   Idle -> Closed               (shutdown before start)
///
/// A failed session open is not a transition: the state stays Idle or
/// Restarting until a later open succeeds, and no audio is written meanwhile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    SessionOpen,
    Restarting,
    Closed,
}

/// Replay window for one restart boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgePlan {
    /// Index of the first previous-buffer chunk to resend. Chunks before it
    /// were already acknowledged as finalized by the dying session.
    pub replay_from: usize,
}

/// Mutable continuity state, owned exclusively by one manager.
#[derive(Debug, Clone, Default)]
pub struct ContinuityState {
    /// Number of restarts so far (0 during the first session)
    pub restart_counter: u64,
    /// Correction term for audio resent across the last restart boundary
    pub bridging_offset_ms: i64,
    /// End time of the latest result, on the current session's own clock
    pub result_end_ms: u64,
    /// Watermark: latest audio time known to be safely finalized, cumulative
    /// across sessions
    pub final_request_end_ms: u64,
    /// End time of the latest finalized result in the current session
    pub is_final_end_ms: u64,
    pub last_transcript_was_final: bool,
}

impl ContinuityState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Correct a per-session result end time onto the global timeline.
    ///
    /// Each session's clock starts at zero, so the global position is the
    /// session-local time plus one full streaming window per completed
    /// restart, minus the audio that was sent twice across the last boundary.
    pub fn corrected_time_ms(&self, result_end_ms: u64, streaming_limit_ms: u64) -> i64 {
        result_end_ms as i64 - self.bridging_offset_ms
            + (streaming_limit_ms * self.restart_counter) as i64
    }

    /// Record a result from the current session.
    pub fn observe_result(&mut self, result_end_ms: u64, is_final: bool) {
        self.result_end_ms = result_end_ms;
        if is_final {
            // Only finalized results advance the watermark candidate; interim
            // results can still be revised by the service.
            self.is_final_end_ms = result_end_ms;
            self.last_transcript_was_final = true;
        } else {
            self.last_transcript_was_final = false;
        }
    }

    /// Restart bookkeeping: advance the watermark to the last finalized end
    /// time iff the dying session produced any result, reset the per-session
    /// clock, and count the restart.
    pub fn begin_restart(&mut self) {
        if self.result_end_ms > 0 {
            self.final_request_end_ms = self.is_final_end_ms;
        }
        self.result_end_ms = 0;
        self.restart_counter += 1;
    }

    /// Compute the replay window for the first chunk written after a restart.
    ///
    /// `previous_len` is the number of chunks buffered during the dying
    /// session. Returns `None` when there is nothing to bridge (no previous
    /// audio, or a degenerate chunk duration).
    pub fn bridge_plan(&mut self, previous_len: usize, streaming_limit_ms: u64) -> Option<BridgePlan> {
        if previous_len == 0 {
            return None;
        }

        // Approximate duration of one buffered chunk: the full session window
        // divided by how many chunks were actually captured during it.
        let chunk_time_ms = streaming_limit_ms as f64 / previous_len as f64;
        if chunk_time_ms <= 0.0 {
            return None;
        }

        self.bridging_offset_ms = self
            .bridging_offset_ms
            .clamp(0, self.final_request_end_ms as i64);

        // Chunks the service already acknowledged as finalized can be skipped
        let chunks_from = ((self.final_request_end_ms as i64 - self.bridging_offset_ms) as f64
            / chunk_time_ms)
            .floor() as usize;
        let chunks_from = chunks_from.min(previous_len);

        // The replayed tail is audio counted twice on the global timeline;
        // remember its length for the next correction.
        self.bridging_offset_ms = ((previous_len - chunks_from) as f64 * chunk_time_ms) as i64;

        debug!(
            replay_from = chunks_from,
            replayed = previous_len - chunks_from,
            bridging_offset_ms = self.bridging_offset_ms,
            "Computed restart replay window"
        );

        Some(BridgePlan {
            replay_from: chunks_from,
        })
    }
}
