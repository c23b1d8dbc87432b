// Microphone capture via cpal.
//
// The cpal stream handle is not Send, so it lives on a dedicated thread for
// the lifetime of the capture. The audio callback converts device samples to
// 16-bit PCM, slices them into fixed-duration chunks, and hands them to the
// pipeline over a bounded channel. The callback must never block: on channel
// overflow chunks are dropped and counted instead.

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::source::{AudioCapture, AudioChunk, CaptureConfig};
use crate::error::RelayError;

const CHUNK_CHANNEL_CAPACITY: usize = 256;

pub struct MicCapture {
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    dropped_chunks: Arc<AtomicU64>,
    /// First stream failure, if any; reported from stop()
    failure: Arc<Mutex<Option<String>>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl MicCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            dropped_chunks: Arc::new(AtomicU64::new(0)),
            failure: Arc::new(Mutex::new(None)),
            thread: None,
        }
    }

    /// Chunks dropped because the pipeline fell behind
    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl AudioCapture for MicCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>> {
        if self.running.load(Ordering::SeqCst) {
            anyhow::bail!("microphone capture already started");
        }

        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), String>>();

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let dropped = Arc::clone(&self.dropped_chunks);
        let failure = Arc::clone(&self.failure);
        let config = self.config.clone();

        // The stream handle is !Send, so the whole device lifecycle runs on
        // this thread and the handle is kept alive until stop().
        let thread = std::thread::spawn(move || {
            let stream = match build_input_stream(
                &config,
                tx,
                dropped,
                Arc::clone(&running),
                Arc::clone(&failure),
            ) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                error!("Failed to start microphone stream: {}", e);
                record_failure(&failure, e.to_string());
                running.store(false, Ordering::SeqCst);
            }

            while running.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(50));
            }
            // Stream (and the chunk sender inside its callback) drop here,
            // closing the channel.
        });

        // Wait for the stream to come up before reporting success
        let ready = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .context("capture thread setup task failed")?
            .context("capture thread exited before reporting readiness")?;

        if let Err(msg) = ready {
            self.running.store(false, Ordering::SeqCst);
            let _ = thread.join();
            return Err(anyhow!("failed to open microphone: {}", msg));
        }

        self.thread = Some(thread);
        info!(
            "Microphone capture started: {}Hz, {} channels, {}ms chunks",
            self.config.sample_rate, self.config.channels, self.config.chunk_ms
        );

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);

        if let Some(thread) = self.thread.take() {
            let _ = tokio::task::spawn_blocking(move || thread.join()).await;
        }

        let dropped = self.dropped_chunks.load(Ordering::Relaxed);
        if dropped > 0 {
            warn!("Microphone capture dropped {} chunks on overflow", dropped);
        }

        // A stream failure closed the chunk channel exactly like normal end
        // of input did; this is where the caller learns the difference.
        let failure = self.failure.lock().map(|mut f| f.take()).unwrap_or(None);
        if let Some(msg) = failure {
            return Err(RelayError::Capture(msg).into());
        }

        info!("Microphone capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

fn record_failure(failure: &Mutex<Option<String>>, msg: String) {
    if let Ok(mut slot) = failure.lock() {
        // Keep the first failure; later ones are consequences of it
        slot.get_or_insert(msg);
    }
}

fn build_input_stream(
    config: &CaptureConfig,
    tx: mpsc::Sender<AudioChunk>,
    dropped: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<String>>>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("no default input device available")?;

    info!(
        "Using input device: {}",
        device.name().unwrap_or_else(|_| "unknown".to_string())
    );

    let sample_format = device
        .default_input_config()
        .context("failed to query default input config")?
        .sample_format();

    let stream_config = StreamConfig {
        channels: config.channels,
        sample_rate: SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let chunker = Chunker::new(config.chunk_samples(), tx, dropped);

    // Capture stream errors are fatal to the pipeline: record the failure and
    // flag the thread down so the chunk channel closes, the manager drains,
    // and stop() reports the error.
    let err_running = running;
    let err_callback = move |err: cpal::StreamError| {
        error!("Microphone stream error: {}", err);
        record_failure(&failure, err.to_string());
        err_running.store(false, Ordering::SeqCst);
    };

    let stream = match sample_format {
        SampleFormat::I16 => {
            let mut chunker = chunker;
            device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    chunker.push(data);
                },
                err_callback,
                None,
            )?
        }
        SampleFormat::F32 => {
            let mut chunker = chunker;
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let samples: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .collect();
                    chunker.push(&samples);
                },
                err_callback,
                None,
            )?
        }
        other => anyhow::bail!("unsupported input sample format: {:?}", other),
    };

    Ok(stream)
}

/// Accumulates callback samples into fixed-size chunks
struct Chunker {
    chunk_samples: usize,
    pending: Vec<i16>,
    tx: mpsc::Sender<AudioChunk>,
    dropped: Arc<AtomicU64>,
}

impl Chunker {
    fn new(chunk_samples: usize, tx: mpsc::Sender<AudioChunk>, dropped: Arc<AtomicU64>) -> Self {
        Self {
            chunk_samples,
            pending: Vec::with_capacity(chunk_samples),
            tx,
            dropped,
        }
    }

    fn push(&mut self, samples: &[i16]) {
        self.pending.extend_from_slice(samples);

        while self.pending.len() >= self.chunk_samples {
            let rest = self.pending.split_off(self.chunk_samples);
            let chunk = AudioChunk::from_samples(&self.pending);
            self.pending = rest;

            // Audio callback: must not block. Overflow drops the chunk.
            if self.tx.try_send(chunk).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunker_emits_fixed_size_chunks() {
        let (tx, mut rx) = mpsc::channel(8);
        let dropped = Arc::new(AtomicU64::new(0));
        let mut chunker = Chunker::new(4, tx, Arc::clone(&dropped));

        chunker.push(&[1, 2, 3]);
        assert!(rx.try_recv().is_err());

        chunker.push(&[4, 5]);
        let chunk = rx.try_recv().unwrap();
        assert_eq!(chunk, AudioChunk::from_samples(&[1, 2, 3, 4]));
        assert_eq!(chunker.pending, vec![5]);
        assert_eq!(dropped.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_chunker_counts_drops_on_overflow() {
        let (tx, rx) = mpsc::channel(1);
        let dropped = Arc::new(AtomicU64::new(0));
        let mut chunker = Chunker::new(2, tx, Arc::clone(&dropped));

        chunker.push(&[1, 2, 3, 4, 5, 6]);
        // Capacity 1: first chunk queued, the next two dropped
        assert_eq!(dropped.load(Ordering::Relaxed), 2);
        drop(rx);
    }

    #[test]
    fn test_chunker_tolerates_closed_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let dropped = Arc::new(AtomicU64::new(0));
        let mut chunker = Chunker::new(2, tx, Arc::clone(&dropped));

        chunker.push(&[1, 2]);
        assert_eq!(dropped.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_stop_surfaces_stream_failure() {
        let mut capture = MicCapture::new(CaptureConfig::default());
        record_failure(&capture.failure, "device disconnected".to_string());

        let err = capture.stop().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RelayError>(),
            Some(RelayError::Capture(msg)) if msg == "device disconnected"
        ));
    }

    #[tokio::test]
    async fn test_stop_without_failure_is_clean() {
        let mut capture = MicCapture::new(CaptureConfig::default());
        assert!(capture.stop().await.is_ok());
    }

    #[test]
    fn test_record_failure_keeps_first_error() {
        let failure = Mutex::new(None);
        record_failure(&failure, "first".to_string());
        record_failure(&failure, "second".to_string());
        assert_eq!(failure.lock().unwrap().as_deref(), Some("first"));
    }
}
