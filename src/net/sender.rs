//! Outbound audio streaming to a remote capture session.
//!
//! A sender session opens one local device (optionally in loopback mode)
//! and forwards everything it captures as sequenced `NetworkFrame`
//! datagrams. The sender's lifecycle is independent of any local capture
//! session: this machine may stream out without recording anything itself.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::frame::NetworkFrame;
use crate::audio::device::{build_capture_stream, DeviceRegistry};
use crate::audio::mixer::SourceBuffer;
use crate::error::{Result, ScribeError};

/// How often the send thread drains captured samples into datagrams.
const SEND_TICK_MS: u64 = 20;

/// Samples per channel in one outgoing frame; keeps every datagram well
/// under the payload cap at any realistic device format.
const FRAMES_PER_PACKET: usize = 1024;

#[derive(Debug, Clone)]
pub struct SendConfig {
    pub session_id: Option<Uuid>,
    pub device_index: usize,
    pub target_host: String,
    pub target_port: u16,
    pub use_loopback: bool,
}

struct SenderSession {
    target: String,
    running: Arc<AtomicBool>,
    thread: parking_lot::Mutex<Option<std::thread::JoinHandle<()>>>,
}

/// Owns the map of active sender sessions.
pub struct SenderManager {
    sessions: RwLock<HashMap<Uuid, Arc<SenderSession>>>,
}

impl SenderManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start streaming a device to `target_host:target_port`. Device-open
    /// failures surface here; once the loop is running, socket errors are
    /// logged and terminate the loop, leaving the session marked stopped.
    pub async fn start(&self, config: SendConfig) -> Result<Uuid> {
        let id = config.session_id.unwrap_or_else(Uuid::new_v4);

        if self.sessions.read().contains_key(&id) {
            return Err(ScribeError::SessionConflict(format!(
                "sender session {} already exists",
                id
            )));
        }

        let registry = DeviceRegistry::new();
        let resolved = registry.resolve(config.device_index, config.use_loopback)?;

        let target = format!("{}:{}", config.target_host, config.target_port);
        // Outbound only: bind an ephemeral local port and set the default
        // destination. Nothing needs to be opened on the sender's router.
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket
            .connect(&target)
            .map_err(|e| ScribeError::InvalidRequest(format!("cannot reach {}: {}", target, e)))?;

        let native_rate = resolved.config.sample_rate().0;
        let native_channels = resolved.config.channels();
        let source = SourceBuffer::new(format!("send-{}", id), native_rate, native_channels);

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel::<Result<()>>();
        let stream_source = Arc::clone(&source);

        let thread = std::thread::Builder::new()
            .name(format!("send-{}", id))
            .spawn(move || {
                let stream = match build_capture_stream(&resolved, stream_source) {
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

                send_loop(id, &socket, &source, native_rate, native_channels, &flag);
                drop(stream);
                flag.store(false, Ordering::Relaxed);
            })
            .map_err(|e| ScribeError::DeviceOpen(format!("failed to spawn send thread: {}", e)))?;

        match tokio::time::timeout(Duration::from_secs(5), ready_rx).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => {
                let _ = thread.join();
                return Err(e);
            }
            Ok(Err(_)) | Err(_) => {
                running.store(false, Ordering::Relaxed);
                return Err(ScribeError::DeviceOpen(
                    "timed out waiting for send stream to open".to_string(),
                ));
            }
        }

        let session = Arc::new(SenderSession {
            target: target.clone(),
            running,
            thread: parking_lot::Mutex::new(Some(thread)),
        });
        self.sessions.write().insert(id, session);

        info!(session = %id, target = %target, "audio sender started");
        Ok(id)
    }

    /// Stop a sender session and release its device.
    pub async fn stop(&self, id: Uuid) -> Result<()> {
        let session = self
            .sessions
            .write()
            .remove(&id)
            .ok_or_else(|| ScribeError::SessionNotFound(id.to_string()))?;

        session.running.store(false, Ordering::Relaxed);
        let thread = session.thread.lock().take();
        if let Some(thread) = thread {
            tokio::task::spawn_blocking(move || {
                if thread.join().is_err() {
                    warn!("send thread panicked during shutdown");
                }
            })
            .await
            .ok();
        }

        info!(session = %id, target = %session.target, "audio sender stopped");
        Ok(())
    }

    /// Whether a sender session exists and its loop is still running.
    pub fn is_sending(&self, id: Uuid) -> bool {
        self.sessions
            .read()
            .get(&id)
            .map(|s| s.running.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

impl Default for SenderManager {
    fn default() -> Self {
        Self::new()
    }
}

fn send_loop(
    session_id: Uuid,
    socket: &UdpSocket,
    source: &SourceBuffer,
    sample_rate: u32,
    channels: u16,
    running: &AtomicBool,
) {
    let packet_samples = FRAMES_PER_PACKET * channels as usize;
    let mut sequence_no: u32 = 0;

    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(SEND_TICK_MS));

        let samples = source.drain_all();
        if samples.is_empty() {
            continue;
        }

        for chunk in samples.chunks(packet_samples) {
            let frame =
                NetworkFrame::from_samples(session_id, sequence_no, sample_rate, channels, chunk);
            sequence_no = sequence_no.wrapping_add(1);

            if let Err(e) = socket.send(&frame.encode()) {
                error!(session = %session_id, "send error, terminating stream: {}", e);
                return;
            }
        }
    }
}
