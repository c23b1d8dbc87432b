pub mod client;
pub mod messages;

pub use client::BroadcastClient;
pub use messages::{
    AudioFrameMessage, RecognitionAlternative, RecognitionResultMessage, ResultEndTime,
    SessionOpenMessage, TranscriptEventMessage,
};
