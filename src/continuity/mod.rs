pub mod manager;
pub mod state;

pub use manager::{ContinuityManager, RelayStats, TranscriptFragment, TranscriptSink};
pub use state::{BridgePlan, ContinuityState, StreamState};
