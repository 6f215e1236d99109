//! Capture session lifecycle and the tick-driven mixing loop.
//!
//! A `CaptureManager` owns every active session; API entry points hold a
//! handle to the manager rather than reaching into shared globals. Each
//! session runs one mixing task on a fixed tick, draining every registered
//! source (local device streams and network peers), converting each to the
//! session's target format, and summing the results into the accumulated
//! recording buffer. A source that produced nothing for a tick contributes
//! silence; the mix never blocks on a dead source.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::device::{build_capture_stream, DeviceRegistry, ResolvedDevice};
use super::mixer::{self, SourceBuffer};
use super::wav;
use crate::error::{Result, ScribeError};
use crate::net::receiver;

/// Parameters for starting a capture session.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub session_id: Option<Uuid>,
    pub device_indices: Vec<usize>,
    pub use_loopback: bool,
    /// Port to receive network audio on (0 = ephemeral, None = no listener)
    pub network_listen_port: Option<u16>,
    pub sample_rate: u32,
    pub channels: u16,
    pub mix_tick_ms: u64,
}

/// Result of a successful start.
#[derive(Debug, Clone)]
pub struct StartedCapture {
    pub session_id: Uuid,
    /// Actual bound listen port, when a listener was requested
    pub listen_port: Option<u16>,
}

/// Non-blocking session snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CaptureStatus {
    pub is_recording: bool,
    pub device_count: usize,
    pub network_peer_count: usize,
    pub buffered_bytes: usize,
}

/// One live recording: sources, accumulated buffer, and worker handles.
pub struct CaptureSession {
    id: Uuid,
    sample_rate: u32,
    channels: u16,
    mix_tick_ms: u64,
    device_count: usize,

    running: Arc<AtomicBool>,
    sources: RwLock<Vec<Arc<SourceBuffer>>>,
    peer_count: AtomicUsize,
    accumulated: Mutex<Vec<i16>>,

    mix_handle: Mutex<Option<JoinHandle<()>>>,
    listener_handle: Mutex<Option<JoinHandle<()>>>,
    capture_threads: Mutex<Vec<CaptureThread>>,
}

impl CaptureSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Register an additional source with the running mix. Used by the
    /// network receiver when a new peer's first frame arrives.
    pub fn add_source(&self, source: Arc<SourceBuffer>) {
        info!(session = %self.id, source = %source.label(), "source registered");
        self.sources.write().push(source);
    }

    /// Record that a new distinct network peer has been seen.
    pub fn note_peer(&self) {
        self.peer_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn status(&self) -> CaptureStatus {
        CaptureStatus {
            is_recording: self.is_running(),
            device_count: self.device_count,
            network_peer_count: self.peer_count.load(Ordering::Relaxed),
            buffered_bytes: self.accumulated.lock().len() * 2,
        }
    }

    fn mix_tick(&self) {
        let sources = self.sources.read().clone();
        if sources.is_empty() {
            // A listener with no peers yet accumulates nothing
            return;
        }

        let target_len =
            mixer::samples_for_duration(self.sample_rate, self.channels, self.mix_tick_ms);
        let converted: Vec<Vec<i16>> = sources
            .iter()
            .map(|s| {
                let native = s.drain_tick(self.mix_tick_ms);
                mixer::convert_to_target(
                    &native,
                    s.native_rate(),
                    s.native_channels(),
                    self.sample_rate,
                    self.channels,
                )
            })
            .collect();

        let mixed = mixer::mix_sources(&converted, target_len);
        self.accumulated.lock().extend_from_slice(&mixed);
    }

    /// Drain whatever every source still has staged into one final mix.
    /// Runs once at stop, after the tick loop has ended.
    fn flush_remaining(&self) {
        let sources = self.sources.read().clone();
        if sources.is_empty() {
            return;
        }

        let converted: Vec<Vec<i16>> = sources
            .iter()
            .map(|s| {
                let native = s.drain_all();
                mixer::convert_to_target(
                    &native,
                    s.native_rate(),
                    s.native_channels(),
                    self.sample_rate,
                    self.channels,
                )
            })
            .collect();

        let target_len = converted.iter().map(|c| c.len()).max().unwrap_or(0);
        if target_len == 0 {
            return;
        }
        let mixed = mixer::mix_sources(&converted, target_len);
        self.accumulated.lock().extend_from_slice(&mixed);
    }
}

/// Dedicated thread owning one cpal stream. `cpal::Stream` is not `Send`,
/// so the stream is built and dropped on this thread (same approach as a
/// capture-thread-per-device recorder).
struct CaptureThread {
    shutdown: Arc<AtomicBool>,
    handle: std::thread::JoinHandle<()>,
}

impl CaptureThread {
    async fn spawn(resolved: ResolvedDevice, sink: Arc<SourceBuffer>) -> Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel::<Result<()>>();
        let thread_name = format!("capture-{}", sink.label());

        let handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let stream = match build_capture_stream(&resolved, sink) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = cpal::traits::StreamTrait::play(&stream) {
                    let _ = ready_tx.send(Err(ScribeError::DeviceOpen(format!(
                        "'{}': {}",
                        resolved.name, e
                    ))));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while !flag.load(Ordering::Relaxed) {
                    std::thread::sleep(Duration::from_millis(50));
                }
                drop(stream);
            })
            .map_err(|e| ScribeError::DeviceOpen(format!("failed to spawn capture thread: {}", e)))?;

        match tokio::time::timeout(Duration::from_secs(5), ready_rx).await {
            Ok(Ok(Ok(()))) => Ok(Self { shutdown, handle }),
            Ok(Ok(Err(e))) => {
                let _ = handle.join();
                Err(e)
            }
            Ok(Err(_)) | Err(_) => {
                shutdown.store(true, Ordering::Relaxed);
                Err(ScribeError::DeviceOpen(
                    "timed out waiting for capture stream to open".to_string(),
                ))
            }
        }
    }

    fn stop(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if self.handle.join().is_err() {
            warn!("capture thread panicked during shutdown");
        }
    }
}

/// Owns the map of active capture sessions.
pub struct CaptureManager {
    sessions: RwLock<HashMap<Uuid, Arc<CaptureSession>>>,
}

impl CaptureManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a new capture session. Either fully succeeds or rolls back
    /// completely: a device-open or bind failure leaves no session behind
    /// and releases everything opened so far.
    pub async fn start(&self, config: CaptureConfig) -> Result<StartedCapture> {
        let id = config.session_id.unwrap_or_else(Uuid::new_v4);

        if self.sessions.read().contains_key(&id) {
            return Err(ScribeError::SessionConflict(format!(
                "capture session {} is already recording",
                id
            )));
        }
        if config.device_indices.is_empty() && config.network_listen_port.is_none() {
            return Err(ScribeError::NothingToCapture);
        }

        // Bind the listener first so a taken port fails before any device opens
        let socket = match config.network_listen_port {
            Some(port) => {
                let sock = UdpSocket::bind(("0.0.0.0", port))
                    .await
                    .map_err(|e| ScribeError::NetworkBind {
                        port,
                        reason: e.to_string(),
                    })?;
                Some(sock)
            }
            None => None,
        };
        let listen_port = match &socket {
            Some(s) => Some(
                s.local_addr()
                    .map_err(|e| ScribeError::NetworkBind {
                        port: config.network_listen_port.unwrap_or(0),
                        reason: e.to_string(),
                    })?
                    .port(),
            ),
            None => None,
        };

        // Resolve every index against a fresh enumeration before opening
        // anything, so an invalid index fails with no devices touched
        let registry = DeviceRegistry::new();
        let mut resolved_devices = Vec::new();
        for &index in &config.device_indices {
            resolved_devices.push((index, registry.resolve(index, config.use_loopback)?));
        }

        // Open all device streams concurrently, each on its own thread
        let mut device_sources: Vec<Arc<SourceBuffer>> = Vec::new();
        let mut spawns = Vec::new();
        for (index, resolved) in resolved_devices {
            let source = SourceBuffer::new(
                format!("device-{}", index),
                resolved.config.sample_rate().0,
                resolved.config.channels(),
            );
            device_sources.push(Arc::clone(&source));
            spawns.push(CaptureThread::spawn(resolved, source));
        }

        let mut threads: Vec<CaptureThread> = Vec::new();
        let mut open_error = None;
        for result in futures::future::join_all(spawns).await {
            match result {
                Ok(t) => threads.push(t),
                Err(e) => open_error = Some(e),
            }
        }
        if let Some(e) = open_error {
            // Roll back the streams that did open; the session never existed
            tokio::task::spawn_blocking(move || {
                for t in threads {
                    t.stop();
                }
            })
            .await
            .ok();
            return Err(e);
        }

        let session = Arc::new(CaptureSession {
            id,
            sample_rate: config.sample_rate,
            channels: config.channels,
            mix_tick_ms: config.mix_tick_ms,
            device_count: device_sources.len(),
            running: Arc::new(AtomicBool::new(true)),
            sources: RwLock::new(device_sources),
            peer_count: AtomicUsize::new(0),
            accumulated: Mutex::new(Vec::new()),
            mix_handle: Mutex::new(None),
            listener_handle: Mutex::new(None),
            capture_threads: Mutex::new(threads),
        });

        if let Some(socket) = socket {
            let handle = receiver::spawn(socket, Arc::clone(&session));
            *session.listener_handle.lock() = Some(handle);
        }

        let mix_session = Arc::clone(&session);
        let mix_handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(mix_session.mix_tick_ms));
            while mix_session.is_running() {
                interval.tick().await;
                mix_session.mix_tick();
            }
            debug!(session = %mix_session.id, "mix loop stopped");
        });
        *session.mix_handle.lock() = Some(mix_handle);

        self.sessions.write().insert(id, Arc::clone(&session));

        info!(
            session = %id,
            devices = config.device_indices.len(),
            listen_port = ?listen_port,
            "capture session started"
        );

        Ok(StartedCapture {
            session_id: id,
            listen_port,
        })
    }

    /// Non-blocking status snapshot for a session.
    pub fn status(&self, id: Uuid) -> Result<CaptureStatus> {
        let sessions = self.sessions.read();
        let session = sessions
            .get(&id)
            .ok_or_else(|| ScribeError::SessionNotFound(id.to_string()))?;
        Ok(session.status())
    }

    /// Stop a session and return the recording as WAV bytes. The session is
    /// destroyed on retrieval; a second stop for the same id fails with
    /// `SessionNotFound`. Zero accumulated frames still yield a valid
    /// zero-duration container.
    pub async fn stop(&self, id: Uuid) -> Result<Vec<u8>> {
        let session = self
            .sessions
            .write()
            .remove(&id)
            .ok_or_else(|| ScribeError::SessionNotFound(id.to_string()))?;

        session.running.store(false, Ordering::Relaxed);

        // Take handles out before awaiting so no lock guard lives across an
        // await point
        let mix_handle = session.mix_handle.lock().take();
        if let Some(handle) = mix_handle {
            if let Err(e) = handle.await {
                warn!(session = %id, "mix task panicked: {}", e);
            }
        }
        let listener_handle = session.listener_handle.lock().take();
        if let Some(handle) = listener_handle {
            handle.abort();
        }

        let threads: Vec<CaptureThread> = session.capture_threads.lock().drain(..).collect();
        if !threads.is_empty() {
            tokio::task::spawn_blocking(move || {
                for t in threads {
                    t.stop();
                }
            })
            .await
            .ok();
        }

        session.flush_remaining();

        let samples = std::mem::take(&mut *session.accumulated.lock());
        info!(
            session = %id,
            samples = samples.len(),
            "capture session stopped"
        );

        wav::encode(&samples, session.sample_rate, session.channels)
            .map_err(|e| ScribeError::InvalidRequest(format!("failed to encode recording: {}", e)))
    }

    /// Ids of currently active sessions.
    pub fn active_sessions(&self) -> Vec<Uuid> {
        self.sessions.read().keys().copied().collect()
    }
}

impl Default for CaptureManager {
    fn default() -> Self {
        Self::new()
    }
}
