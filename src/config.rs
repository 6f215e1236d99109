use anyhow::Result;
use serde::Deserialize;

use crate::engine::EngineKind;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub engine: EngineConfig,
    pub tasks: TaskConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Target sample rate for mixed recordings (16kHz for speech models)
    pub sample_rate: u32,
    /// Target channel count (1 = mono)
    pub channels: u16,
    /// Mixing loop tick interval in milliseconds
    pub mix_tick_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub kind: EngineKind,
    /// Base URL of the model server (transcription + diarization endpoints)
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// How long completed/errored tasks stay queryable before eviction
    pub retention_secs: u64,
    /// How often the eviction sweep runs
    pub evict_interval_secs: u64,
}

impl Config {
    /// Load configuration from an optional TOML file, falling back to defaults
    /// for anything the file doesn't set.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "meetscribe")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 8701)?
            .set_default("audio.sample_rate", 16000)?
            .set_default("audio.channels", 1)?
            .set_default("audio.mix_tick_ms", 100)?
            .set_default("engine.kind", "remote")?
            .set_default("engine.base_url", "http://localhost:8000")?
            .set_default("tasks.retention_secs", 600)?
            .set_default("tasks.evict_interval_secs", 60)?
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
