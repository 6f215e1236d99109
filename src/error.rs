//! Error types for meetscribe.

use thiserror::Error;

/// Pipeline stage that failed, carried on `ScribeError::PipelineStage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcribe,
    Diarize,
    Merge,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Transcribe => write!(f, "transcription"),
            Stage::Diarize => write!(f, "diarization"),
            Stage::Merge => write!(f, "merge"),
        }
    }
}

/// Library-level error type for meetscribe operations.
#[derive(Error, Debug)]
pub enum ScribeError {
    #[error("Device enumeration failed: {0}")]
    DeviceEnumeration(String),

    #[error("Session conflict: {0}")]
    SessionConflict(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Failed to open device: {0}")]
    DeviceOpen(String),

    #[error("Failed to bind listen port {port}: {reason}")]
    NetworkBind { port: u16, reason: String },

    #[error("{stage} failed: {message}")]
    PipelineStage { stage: Stage, message: String },

    #[error("Nothing to capture: no devices requested and no network listen port")]
    NothingToCapture,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for meetscribe operations.
pub type Result<T> = std::result::Result<T, ScribeError>;
