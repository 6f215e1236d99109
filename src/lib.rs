pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod net;
pub mod pipeline;

pub use audio::{
    AudioDeviceInfo, AudioFrame, Capabilities, CaptureConfig, CaptureManager, CaptureStatus,
    DeviceList, DeviceRegistry, SourceBuffer,
};
pub use config::Config;
pub use engine::{
    build_engine, Diarization, DiarizeOptions, EngineKind, SpeakerTurn, SpeechEngine,
    TranscribeOptions, TranscribedSegment, Transcription,
};
pub use error::{Result, ScribeError, Stage};
pub use http::{create_router, AppState};
pub use net::{NetworkFrame, SendConfig, SenderManager};
pub use pipeline::{
    ProcessOptions, ProcessingResult, ProcessingTask, Speaker, TaskRegistry, TaskStatus,
};
