pub mod file;
pub mod mic;
pub mod source;

pub use file::FileCapture;
pub use mic::MicCapture;
pub use source::{AudioCapture, AudioChunk, CaptureConfig};
