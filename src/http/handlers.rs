use super::state::AppState;
use crate::audio::{CaptureConfig, DeviceRegistry};
use crate::error::ScribeError;
use crate::net::SendConfig;
use crate::pipeline::ProcessOptions;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CaptureStartRequest {
    /// Optional session ID (if not provided, generate UUID)
    pub session_id: Option<Uuid>,

    /// Device indices from the current enumeration to capture from
    #[serde(default)]
    pub device_indices: Vec<usize>,

    /// Open the devices in loopback mode (system audio)
    #[serde(default)]
    pub use_loopback: bool,

    /// Port to receive network audio on (0 = ephemeral)
    pub network_listen_port: Option<u16>,

    /// Target sample rate (defaults to the service's audio config)
    pub sample_rate_hz: Option<u32>,

    /// Target channel count (defaults to the service's audio config)
    pub channels: Option<u16>,
}

#[derive(Debug, Serialize)]
pub struct CaptureStartResponse {
    pub session_id: Uuid,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct SendStartRequest {
    /// Optional session ID (if not provided, generate UUID)
    pub session_id: Option<Uuid>,

    pub device_index: usize,
    pub target_host: String,
    pub target_port: u16,

    #[serde(default)]
    pub use_loopback: bool,
}

#[derive(Debug, Serialize)]
pub struct SendStartResponse {
    pub session_id: Uuid,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    /// WAV recording, base64-encoded
    pub audio_base64: String,

    pub language: Option<String>,
    pub model_hint: Option<String>,
    pub min_speakers: Option<u32>,
    pub max_speakers: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub task_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map the error taxonomy onto HTTP statuses.
fn error_status(err: &ScribeError) -> StatusCode {
    match err {
        ScribeError::SessionConflict(_) | ScribeError::NetworkBind { .. } => StatusCode::CONFLICT,
        ScribeError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        ScribeError::NothingToCapture | ScribeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: ScribeError) -> axum::response::Response {
    (
        error_status(&err),
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /devices
/// Enumerate capturable audio endpoints (fresh on every call)
pub async fn list_devices() -> impl IntoResponse {
    match DeviceRegistry::new().list() {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(e) => {
            error!("Device enumeration failed: {}", e);
            error_response(e)
        }
    }
}

/// GET /capabilities
/// Report what capture paths this host supports
pub async fn capabilities() -> impl IntoResponse {
    Json(DeviceRegistry::new().capabilities())
}

/// POST /capture/start
/// Start a new capture session
pub async fn capture_start(
    State(state): State<AppState>,
    Json(req): Json<CaptureStartRequest>,
) -> impl IntoResponse {
    let config = CaptureConfig {
        session_id: req.session_id,
        device_indices: req.device_indices,
        use_loopback: req.use_loopback,
        network_listen_port: req.network_listen_port,
        sample_rate: req.sample_rate_hz.unwrap_or(state.audio_defaults.sample_rate),
        channels: req.channels.unwrap_or(state.audio_defaults.channels),
        mix_tick_ms: state.audio_defaults.mix_tick_ms,
    };

    match state.capture.start(config).await {
        Ok(started) => {
            info!("Capture started for session: {}", started.session_id);
            (
                StatusCode::OK,
                Json(CaptureStartResponse {
                    session_id: started.session_id,
                    status: "recording".to_string(),
                    listen_port: started.listen_port,
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to start capture: {}", e);
            error_response(e)
        }
    }
}

/// POST /capture/stop/:session_id
/// Stop a session and return the recording as a WAV body. The session is
/// destroyed on retrieval.
pub async fn capture_stop(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.capture.stop(session_id).await {
        Ok(wav_bytes) => {
            info!(
                "Capture stopped for session {}: {} bytes",
                session_id,
                wav_bytes.len()
            );
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "audio/wav")],
                wav_bytes,
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to stop capture {}: {}", session_id, e);
            error_response(e)
        }
    }
}

/// GET /capture/status/:session_id
/// Non-blocking snapshot of a recording session
pub async fn capture_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.capture.status(session_id) {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /send/start
/// Start streaming a local device to a remote capture session
pub async fn send_start(
    State(state): State<AppState>,
    Json(req): Json<SendStartRequest>,
) -> impl IntoResponse {
    let config = SendConfig {
        session_id: req.session_id,
        device_index: req.device_index,
        target_host: req.target_host,
        target_port: req.target_port,
        use_loopback: req.use_loopback,
    };

    match state.senders.start(config).await {
        Ok(session_id) => {
            info!("Sender started for session: {}", session_id);
            (
                StatusCode::OK,
                Json(SendStartResponse {
                    session_id,
                    status: "sending".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to start sender: {}", e);
            error_response(e)
        }
    }
}

/// POST /send/stop/:session_id
/// Stop an outbound audio stream
pub async fn send_stop(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.senders.stop(session_id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            error!("Failed to stop sender {}: {}", session_id, e);
            error_response(e)
        }
    }
}

/// POST /process
/// Submit a finished recording for transcription + diarization
pub async fn process_start(
    State(state): State<AppState>,
    Json(req): Json<ProcessRequest>,
) -> impl IntoResponse {
    let audio = match base64::engine::general_purpose::STANDARD.decode(&req.audio_base64) {
        Ok(bytes) => bytes,
        Err(e) => {
            return error_response(ScribeError::InvalidRequest(format!(
                "audio_base64 is not valid base64: {}",
                e
            )));
        }
    };

    let defaults = ProcessOptions::default();
    let options = ProcessOptions {
        language: req.language,
        model_hint: req.model_hint,
        min_speakers: req.min_speakers.unwrap_or(defaults.min_speakers),
        max_speakers: req.max_speakers.unwrap_or(defaults.max_speakers),
    };

    let task_id = state
        .tasks
        .submit(Arc::clone(&state.engine), audio, options);

    (
        StatusCode::OK,
        Json(ProcessResponse {
            task_id,
            status: "processing".to_string(),
        }),
    )
        .into_response()
}

/// GET /process/:task_id
/// Poll a processing task. Unknown ids are a distinguishable 404, never an
/// empty task at 0%.
pub async fn process_status(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.tasks.get(task_id) {
        Some(task) => (StatusCode::OK, Json(task)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Task {} not found", task_id),
            }),
        )
            .into_response(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
