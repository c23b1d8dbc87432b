use anyhow::Result;
use tokio::sync::mpsc;

/// One capture chunk of raw PCM audio (16-bit little-endian, interleaved).
///
/// Chunks are owned byte buffers: the continuity manager keeps copies of every
/// chunk from the current session so it can replay the unacknowledged tail
/// into the next session after a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub pcm: Vec<u8>,
}

impl AudioChunk {
    pub fn new(pcm: Vec<u8>) -> Self {
        Self { pcm }
    }

    pub fn len(&self) -> usize {
        self.pcm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    /// Build a chunk from i16 samples (little-endian encoding)
    pub fn from_samples(samples: &[i16]) -> Self {
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self { pcm }
    }
}

/// Configuration for a capture backend
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate in Hz
    pub sample_rate: u32,
    /// Channel count of the emitted PCM (1 = mono)
    pub channels: u16,
    /// Duration of one emitted chunk in milliseconds
    pub chunk_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // LINEAR16 @ 16kHz, what the recognizer expects
            channels: 1,        // Mono
            chunk_ms: 100,      // 100ms chunks
        }
    }
}

impl CaptureConfig {
    /// Samples per emitted chunk
    pub fn chunk_samples(&self) -> usize {
        (self.sample_rate as u64 * self.chunk_ms / 1000) as usize * self.channels as usize
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - Microphone: cpal input stream (all platforms)
/// - File: WAV playback paced in real time (testing/offline runs)
#[async_trait::async_trait]
pub trait AudioCapture: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive PCM chunks. The channel
    /// closing signals end of input: file exhausted, device torn down, or a
    /// fatal capture error. `stop()` reports any such error.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>>;

    /// Stop capturing audio.
    ///
    /// Returns an error if the capture died on a stream failure rather than
    /// running out of input.
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_from_samples_little_endian() {
        let chunk = AudioChunk::from_samples(&[0x0102, -2]);
        assert_eq!(chunk.pcm, vec![0x02, 0x01, 0xFE, 0xFF]);
    }

    #[test]
    fn test_chunk_samples_for_default_config() {
        let config = CaptureConfig::default();
        // 16000 Hz * 100ms = 1600 samples
        assert_eq!(config.chunk_samples(), 1600);
    }

    #[test]
    fn test_chunk_samples_counts_channels() {
        let config = CaptureConfig {
            sample_rate: 48000,
            channels: 2,
            chunk_ms: 10,
        };
        assert_eq!(config.chunk_samples(), 960);
    }
}
