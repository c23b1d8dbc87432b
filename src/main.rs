use anyhow::Result;
use clap::Parser;
use tracing::info;
use transcript_relay::{
    AudioCapture, BroadcastClient, CaptureConfig, Config, ContinuityManager, FileCapture,
    MicCapture, NatsRecognizer, RecognizerConfig,
};

#[derive(Parser)]
#[command(name = "transcript-relay")]
#[command(about = "Stream live audio to a recognition service and rebroadcast transcripts")]
struct Args {
    /// Config file (config-crate name, extension resolved automatically)
    #[arg(short, long, default_value = "config/transcript-relay")]
    config: String,

    /// Read audio from a WAV file instead of the microphone
    #[arg(short, long)]
    input: Option<String>,

    /// Stop after this many seconds (runs until interrupted when unset)
    #[arg(short, long)]
    duration: Option<u64>,
}

/// Resolves when the requested run duration elapses; never when unlimited
async fn run_deadline(seconds: Option<u64>) {
    match seconds {
        Some(secs) => tokio::time::sleep(std::time::Duration::from_secs(secs)).await,
        None => std::future::pending().await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v0.1.0", cfg.service.name);
    info!(
        "Recognizer: {} LINEAR16 @ {}Hz, streaming limit {}ms",
        cfg.recognizer.language_code,
        cfg.recognizer.sample_rate_hertz,
        cfg.recognizer.streaming_limit_ms
    );

    let broadcaster =
        BroadcastClient::connect(&cfg.nats.url, cfg.broadcast.subject.clone()).await?;
    let recognizer = NatsRecognizer::new(broadcaster.client());

    let capture_config = CaptureConfig {
        sample_rate: cfg.audio.sample_rate,
        channels: cfg.audio.channels,
        chunk_ms: cfg.audio.chunk_ms,
    };
    let mut capture: Box<dyn AudioCapture> = match &args.input {
        Some(path) => {
            info!("Reading audio from {}", path);
            Box::new(FileCapture::new(path, capture_config))
        }
        None => Box::new(MicCapture::new(capture_config)),
    };

    let recognizer_config = RecognizerConfig {
        encoding: "LINEAR16".to_string(),
        sample_rate_hertz: cfg.recognizer.sample_rate_hertz,
        language_code: cfg.recognizer.language_code.clone(),
        interim_results: cfg.recognizer.interim_results,
        streaming_limit_ms: cfg.recognizer.streaming_limit_ms,
    };

    let manager = ContinuityManager::new(
        recognizer,
        broadcaster,
        recognizer_config,
        cfg.broadcast.publish_interim,
    );

    let audio_rx = capture.start().await?;

    info!("Listening, press Ctrl+C to stop.");

    let mut manager_handle = tokio::spawn(manager.run(audio_rx));

    tokio::select! {
        result = &mut manager_handle => {
            let stats = result??;
            capture.stop().await?;
            info!(
                "Done: {} finals broadcast, {} restarts",
                stats.finals_broadcast, stats.restarts
            );
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received; stopping capture");
            capture.stop().await?;
        }
        _ = run_deadline(args.duration) => {
            info!("Run duration elapsed; stopping capture");
            capture.stop().await?;
        }
    }

    // Capture stopped, its channel closes, and the manager drains and exits
    let stats = manager_handle.await??;
    info!(
        "Done: {} finals broadcast, {} restarts",
        stats.finals_broadcast, stats.restarts
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_accept_run_duration() {
        let args =
            Args::try_parse_from(["transcript-relay", "--input", "a.wav", "--duration", "30"])
                .unwrap();
        assert_eq!(args.duration, Some(30));
        assert_eq!(args.input.as_deref(), Some("a.wav"));
    }

    #[test]
    fn test_args_default_to_unlimited_run() {
        let args = Args::try_parse_from(["transcript-relay"]).unwrap();
        assert_eq!(args.duration, None);
        assert_eq!(args.config, "config/transcript-relay");
    }

    #[tokio::test]
    async fn test_run_deadline_elapses() {
        tokio::time::timeout(std::time::Duration::from_secs(1), run_deadline(Some(0)))
            .await
            .unwrap();
    }
}
