// Integration tests for the WAV file capture backend.

use anyhow::Result;
use tempfile::TempDir;
use transcript_relay::{AudioCapture, CaptureConfig, FileCapture};

fn write_fixture(dir: &TempDir, name: &str, sample_rate: u32, channels: u16, samples: usize) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..samples {
        writer.write_sample((i % 100) as i16).unwrap();
    }
    writer.finalize().unwrap();
    path
}

#[tokio::test]
async fn test_file_capture_chunks_whole_file() -> Result<()> {
    let dir = TempDir::new()?;
    // 3.25 chunks worth of audio at 16kHz / 100ms chunks
    let path = write_fixture(&dir, "fixture.wav", 16000, 1, 1600 * 3 + 400);

    let mut capture = FileCapture::new(&path, CaptureConfig::default()).without_pacing();
    let mut rx = capture.start().await?;

    let mut chunks = Vec::new();
    while let Some(chunk) = rx.recv().await {
        chunks.push(chunk);
    }

    assert_eq!(chunks.len(), 4);
    // Full chunks are 1600 samples = 3200 bytes; the tail is shorter
    assert_eq!(chunks[0].len(), 3200);
    assert_eq!(chunks[3].len(), 800);
    assert!(!capture.is_capturing());

    Ok(())
}

#[tokio::test]
async fn test_file_capture_rejects_format_mismatch() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_fixture(&dir, "bad.wav", 44100, 2, 1000);

    let mut capture = FileCapture::new(&path, CaptureConfig::default());
    let err = capture.start().await.expect_err("format mismatch accepted");
    assert!(err.to_string().contains("WAV format mismatch"));

    Ok(())
}

#[tokio::test]
async fn test_file_capture_missing_file_errors() {
    let mut capture = FileCapture::new("/nonexistent/audio.wav", CaptureConfig::default());
    assert!(capture.start().await.is_err());
}

#[tokio::test]
async fn test_file_capture_stop_midway() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_fixture(&dir, "long.wav", 16000, 1, 1600 * 50);

    // Real-time pacing: 50 chunks would take 5 seconds; stop after the first
    let mut capture = FileCapture::new(&path, CaptureConfig::default());
    let mut rx = capture.start().await?;

    let first = rx.recv().await.expect("no chunk delivered");
    assert_eq!(first.len(), 3200);

    capture.stop().await?;
    assert!(!capture.is_capturing());

    // Channel drains whatever was in flight, then closes
    while rx.recv().await.is_some() {}

    Ok(())
}
