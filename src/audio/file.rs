use anyhow::{Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::source::{AudioCapture, AudioChunk, CaptureConfig};

/// WAV file played back as a live capture stream.
///
/// Chunks are delivered at their real-time pace so the continuity manager sees
/// the same timing it would from a microphone. The channel closes when the
/// file is exhausted.
pub struct FileCapture {
    path: PathBuf,
    config: CaptureConfig,
    /// When false, chunks are delivered as fast as the channel accepts them
    /// (tests exercise long timelines this way)
    realtime: bool,
    capturing: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl FileCapture {
    pub fn new(path: impl AsRef<Path>, config: CaptureConfig) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config,
            realtime: true,
            capturing: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    pub fn without_pacing(mut self) -> Self {
        self.realtime = false;
        self
    }

    fn load_samples(&self) -> Result<Vec<i16>> {
        let reader = WavReader::open(&self.path)
            .with_context(|| format!("Failed to open WAV file: {}", self.path.display()))?;

        let spec = reader.spec();
        if spec.sample_rate != self.config.sample_rate || spec.channels != self.config.channels {
            anyhow::bail!(
                "WAV format mismatch: expected {}Hz {}ch, got {}Hz {}ch",
                self.config.sample_rate,
                self.config.channels,
                spec.sample_rate,
                spec.channels
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64),
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(samples)
    }
}

#[async_trait::async_trait]
impl AudioCapture for FileCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>> {
        let samples = self.load_samples()?;

        let (tx, rx) = mpsc::channel(64);
        let chunk_samples = self.config.chunk_samples();
        let chunk_ms = self.config.chunk_ms;
        let realtime = self.realtime;
        let capturing = Arc::clone(&self.capturing);
        capturing.store(true, Ordering::SeqCst);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(chunk_ms));

            for window in samples.chunks(chunk_samples) {
                if !capturing.load(Ordering::SeqCst) {
                    break;
                }
                if realtime {
                    ticker.tick().await;
                }
                if tx.send(AudioChunk::from_samples(window)).await.is_err() {
                    warn!("File capture receiver dropped; stopping playback");
                    break;
                }
            }

            capturing.store(false, Ordering::SeqCst);
            info!("File capture finished");
        });

        self.task = Some(task);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "file"
    }
}
