use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub recognizer: RecognizerSettings,
    pub audio: AudioSettings,
    pub nats: NatsSettings,
    pub broadcast: BroadcastSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RecognizerSettings {
    /// BCP-47 language tag sent with each session-open request
    #[serde(default = "default_language")]
    pub language_code: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate_hertz: u32,

    /// Hard per-connection duration cap imposed by the recognition service.
    /// Each session is force-restarted when this expires.
    #[serde(default = "default_streaming_limit")]
    pub streaming_limit_ms: u64,

    #[serde(default = "default_true")]
    pub interim_results: bool,
}

#[derive(Debug, Deserialize)]
pub struct AudioSettings {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Duration of one capture chunk in milliseconds
    #[serde(default = "default_chunk_ms")]
    pub chunk_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct NatsSettings {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastSettings {
    /// Subject finalized transcript events are published on
    #[serde(default = "default_subject")]
    pub subject: String,

    /// Whether interim (revisable) fragments are broadcast as well
    #[serde(default = "default_true")]
    pub publish_interim: bool,
}

fn default_language() -> String {
    "pt-BR".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_streaming_limit() -> u64 {
    290_000
}

fn default_channels() -> u16 {
    1
}

fn default_chunk_ms() -> u64 {
    100
}

fn default_subject() -> String {
    "transcript".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
