//! UDP listen loop feeding a capture session.
//!
//! Any number of remote senders may stream to one listening session; the
//! first frame from a new address registers a new mixer source at the
//! rate/channel count its header declares. Sequence numbers are tracked per
//! peer: stale or duplicate frames are dropped, and a gap is filled with
//! silence of equivalent duration (bounded) so lost frames keep their place
//! in the recording timeline instead of compressing it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::frame::NetworkFrame;
use crate::audio::capture::CaptureSession;
use crate::audio::mixer::SourceBuffer;

/// Cap on silence inserted for one sequence gap, in frames. A corrupted or
/// forged sequence number must not balloon the session buffer.
const MAX_GAP_FRAMES: u32 = 50;

struct PeerState {
    source: Arc<SourceBuffer>,
    last_seq: u32,
}

/// Spawn the receive loop for a listening session. The task runs until the
/// session stops (the owner aborts the handle) or the socket fails.
pub fn spawn(socket: UdpSocket, session: Arc<CaptureSession>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut peers: HashMap<SocketAddr, PeerState> = HashMap::new();
        let mut buf = vec![0u8; 65_536];

        info!(session = %session.id(), "network audio receiver started");

        while session.is_running() {
            let (len, addr) = match socket.recv_from(&mut buf).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(session = %session.id(), "receiver socket error: {}", e);
                    break;
                }
            };
            handle_datagram(&buf[..len], addr, &session, &mut peers);
        }

        info!(
            session = %session.id(),
            peers = peers.len(),
            "network audio receiver stopped"
        );
    })
}

fn handle_datagram(
    data: &[u8],
    addr: SocketAddr,
    session: &Arc<CaptureSession>,
    peers: &mut HashMap<SocketAddr, PeerState>,
) {
    let frame = match NetworkFrame::decode(data) {
        Ok(f) => f,
        Err(e) => {
            debug!(peer = %addr, "dropping malformed datagram: {}", e);
            return;
        }
    };

    match peers.get_mut(&addr) {
        None => {
            let source = SourceBuffer::new(
                format!("peer-{}", addr),
                frame.sample_rate_hz,
                frame.channels,
            );
            session.add_source(Arc::clone(&source));
            session.note_peer();
            info!(
                peer = %addr,
                sample_rate = frame.sample_rate_hz,
                channels = frame.channels,
                "network peer connected"
            );
            source.push(&frame.samples());
            peers.insert(
                addr,
                PeerState {
                    source,
                    last_seq: frame.sequence_no,
                },
            );
        }
        Some(state) => {
            if frame.sequence_no <= state.last_seq {
                // Reordered or duplicated datagram; newer audio has already
                // been staged, so this one is dropped rather than re-spliced.
                debug!(
                    peer = %addr,
                    seq = frame.sequence_no,
                    last = state.last_seq,
                    "dropping out-of-order frame"
                );
                return;
            }

            let gap = frame.sequence_no - state.last_seq - 1;
            if gap > 0 {
                let fill_frames = gap.min(MAX_GAP_FRAMES);
                let fill = vec![0i16; fill_frames as usize * frame.sample_count()];
                if !fill.is_empty() {
                    state.source.push(&fill);
                }
                debug!(
                    peer = %addr,
                    missing = gap,
                    filled = fill_frames,
                    "sequence gap filled with silence"
                );
            }

            state.source.push(&frame.samples());
            state.last_seq = frame.sequence_no;
        }
    }
}
