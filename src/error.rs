use thiserror::Error;

/// Failure kinds the pipeline distinguishes.
///
/// Everything else flows through `anyhow::Result`; these are the errors the
/// continuity manager needs to match on to pick a recovery path.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The recognition service rejected the open-stream request.
    /// Fatal for that session; recovery is the manager's restart path.
    #[error("recognition service connect failed: {0}")]
    ServiceConnect(String),

    /// An open recognition stream failed mid-session.
    /// Treated identically to a streaming-limit expiry: triggers a restart.
    #[error("recognition stream error: {0}")]
    ServiceStream(String),

    /// Audio capture failed. Fatal to the whole pipeline.
    #[error("audio capture error: {0}")]
    Capture(String),
}

impl RelayError {
    /// Whether the continuity manager can recover by restarting the session.
    pub fn is_restartable(&self) -> bool {
        matches!(self, RelayError::ServiceStream(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_is_restartable() {
        assert!(RelayError::ServiceStream("reset".into()).is_restartable());
    }

    #[test]
    fn test_capture_and_connect_errors_are_fatal() {
        assert!(!RelayError::Capture("device gone".into()).is_restartable());
        assert!(!RelayError::ServiceConnect("refused".into()).is_restartable());
    }
}
