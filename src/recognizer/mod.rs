pub mod nats;
pub mod service;

pub use nats::NatsRecognizer;
pub use service::{
    RecognitionResult, RecognitionSession, RecognizerConfig, RecognizerService, SessionEvent,
};
