//! Speech engine abstraction.
//!
//! Transcription and diarization are black boxes behind one closed
//! interface; implementations are a fixed set selected by `EngineKind`
//! rather than looked up by name at runtime.

mod energy;
mod remote;

pub use energy::EnergyDiarizer;
pub use remote::RemoteEngine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{Result, ScribeError};

/// Hints passed through to the transcription engine.
#[derive(Debug, Clone, Default)]
pub struct TranscribeOptions {
    pub language: Option<String>,
    pub model_hint: Option<String>,
}

/// Speaker-count bounds for diarization.
#[derive(Debug, Clone)]
pub struct DiarizeOptions {
    pub min_speakers: u32,
    pub max_speakers: u32,
}

impl Default for DiarizeOptions {
    fn default() -> Self {
        Self {
            min_speakers: 1,
            max_speakers: 10,
        }
    }
}

/// Word-level timing inside a transcribed segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start: f64,
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

/// One transcribed span of speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribedSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<WordTiming>>,
}

/// Full transcription engine output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    pub segments: Vec<TranscribedSegment>,
    pub language: String,
}

/// One speaker-labeled time range from diarization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerTurn {
    pub start: f64,
    pub end: f64,
    pub speaker: String,
}

/// Full diarization engine output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diarization {
    pub turns: Vec<SpeakerTurn>,
}

/// Closed set of engine configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Transcription and diarization both served by the remote model server
    Remote,
    /// Remote transcription, local energy-based diarization
    RemoteWithLocalDiarization,
}

/// Interface to the external speech engines. Calls may take seconds to
/// minutes; only the task worker that issued the call blocks on it.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn transcribe(&self, audio: &[u8], opts: &TranscribeOptions) -> Result<Transcription>;
    async fn diarize(&self, audio: &[u8], opts: &DiarizeOptions) -> Result<Diarization>;
}

/// Build the configured engine variant.
pub fn build_engine(config: &EngineConfig) -> Arc<dyn SpeechEngine> {
    match config.kind {
        EngineKind::Remote => Arc::new(RemoteEngine::new(&config.base_url)),
        EngineKind::RemoteWithLocalDiarization => Arc::new(HybridEngine {
            remote: RemoteEngine::new(&config.base_url),
            diarizer: EnergyDiarizer::default(),
        }),
    }
}

/// Remote transcription paired with the local energy diarizer, for setups
/// without a voice-print model on the server.
struct HybridEngine {
    remote: RemoteEngine,
    diarizer: EnergyDiarizer,
}

#[async_trait]
impl SpeechEngine for HybridEngine {
    async fn transcribe(&self, audio: &[u8], opts: &TranscribeOptions) -> Result<Transcription> {
        self.remote.transcribe(audio, opts).await
    }

    async fn diarize(&self, audio: &[u8], _opts: &DiarizeOptions) -> Result<Diarization> {
        let diarizer = self.diarizer.clone();
        let audio = audio.to_vec();
        tokio::task::spawn_blocking(move || diarizer.diarize_wav(&audio))
            .await
            .map_err(|e| ScribeError::Engine(format!("diarizer task failed: {}", e)))?
    }
}
