//! HTTP API server for client control.
//!
//! This module provides the REST API the client orchestrator drives:
//! - GET  /devices, /capabilities - capture topology discovery
//! - POST /capture/start, /capture/stop/:id, GET /capture/status/:id
//! - POST /send/start, /send/stop/:id - outbound LAN streaming
//! - POST /process, GET /process/:id - processing pipeline
//! - GET  /health - health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
