use serde::{Deserialize, Serialize};

/// Audio frame published to the recognition service
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub session_id: String,
    pub sequence: u64,
    pub pcm: String, // Base64-encoded PCM bytes
    pub sample_rate: u32,
    pub channels: u16,
    pub timestamp: String, // RFC3339 timestamp
    #[serde(rename = "final")]
    pub final_frame: bool,
}

/// Open-stream request published when a session starts
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionOpenMessage {
    pub session_id: String,
    pub encoding: String,
    pub sample_rate_hertz: u32,
    pub language_code: String,
    pub interim_results: bool,
}

/// End-of-result offset as the service reports it
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResultEndTime {
    pub seconds: u64,
    pub nanos: u32,
}

impl ResultEndTime {
    pub fn to_millis(self) -> u64 {
        self.seconds * 1000 + (self.nanos as f64 / 1_000_000.0).round() as u64
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecognitionAlternative {
    pub transcript: String,
}

/// Result message received from the recognition service
#[derive(Debug, Serialize, Deserialize)]
pub struct RecognitionResultMessage {
    pub session_id: String,
    pub result_end_time: ResultEndTime,
    pub is_final: bool,
    pub alternatives: Vec<RecognitionAlternative>,
}

/// Transcript event broadcast to subscribers
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptEventMessage {
    /// Relay stream id, constant across restarts for one relay process
    pub session_id: String,
    /// Position on the corrected global timeline
    pub timestamp_ms: u64,
    pub text: String,
    pub partial: bool,
    pub timestamp: String, // RFC3339 wall-clock time of emission
}
