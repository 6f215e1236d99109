use std::sync::Arc;

use crate::audio::CaptureManager;
use crate::config::AudioConfig;
use crate::engine::SpeechEngine;
use crate::net::SenderManager;
use crate::pipeline::TaskRegistry;

/// Shared application state for HTTP handlers. Every subsystem is owned
/// here and passed by handle; there is no ambient global state.
#[derive(Clone)]
pub struct AppState {
    pub capture: Arc<CaptureManager>,
    pub senders: Arc<SenderManager>,
    pub tasks: Arc<TaskRegistry>,
    pub engine: Arc<dyn SpeechEngine>,
    /// Defaults applied when a start request omits audio format fields
    pub audio_defaults: AudioConfig,
}

impl AppState {
    pub fn new(
        capture: Arc<CaptureManager>,
        senders: Arc<SenderManager>,
        tasks: Arc<TaskRegistry>,
        engine: Arc<dyn SpeechEngine>,
        audio_defaults: AudioConfig,
    ) -> Self {
        Self {
            capture,
            senders,
            tasks,
            engine,
            audio_defaults,
        }
    }
}
