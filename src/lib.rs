pub mod audio;
pub mod config;
pub mod continuity;
pub mod error;
pub mod nats;
pub mod recognizer;

pub use audio::{AudioCapture, AudioChunk, CaptureConfig, FileCapture, MicCapture};
pub use config::Config;
pub use continuity::{
    BridgePlan, ContinuityManager, ContinuityState, RelayStats, StreamState, TranscriptFragment,
    TranscriptSink,
};
pub use error::RelayError;
pub use nats::{BroadcastClient, TranscriptEventMessage};
pub use recognizer::{
    NatsRecognizer, RecognitionResult, RecognitionSession, RecognizerConfig, RecognizerService,
    SessionEvent,
};
