//! Wire format for LAN audio frames.
//!
//! One UDP datagram per frame: a fixed 30-byte big-endian header followed
//! by raw little-endian 16-bit PCM payload.
//!
//! ```text
//! offset  size  field
//! 0       16    session id (UUID bytes)
//! 16      4     sequence number (u32, strictly increasing per sender)
//! 20      4     sample rate in Hz (u32)
//! 24      2     channel count (u16)
//! 26      4     payload length in bytes (u32)
//! 30      n     PCM payload (i16 little-endian, interleaved)
//! ```

use thiserror::Error;
use uuid::Uuid;

pub const HEADER_LEN: usize = 30;

/// Upper bound on payload size; keeps a frame within one UDP datagram and
/// rejects forged length fields before any allocation.
pub const MAX_PAYLOAD_LEN: usize = 60_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("datagram too short for frame header: {0} bytes")]
    TooShort(usize),

    #[error("payload length {declared} does not match datagram ({actual} bytes)")]
    PayloadMismatch { declared: usize, actual: usize },

    #[error("declared payload length {0} exceeds the datagram limit")]
    PayloadTooLarge(usize),
}

/// A single audio frame on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkFrame {
    pub session_id: Uuid,
    pub sequence_no: u32,
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub payload: Vec<u8>,
}

impl NetworkFrame {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(self.session_id.as_bytes());
        out.extend_from_slice(&self.sequence_no.to_be_bytes());
        out.extend_from_slice(&self.sample_rate_hz.to_be_bytes());
        out.extend_from_slice(&self.channels.to_be_bytes());
        out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < HEADER_LEN {
            return Err(FrameError::TooShort(data.len()));
        }

        let session_id = Uuid::from_bytes(data[0..16].try_into().expect("sliced 16 bytes"));
        let sequence_no = u32::from_be_bytes(data[16..20].try_into().expect("sliced 4 bytes"));
        let sample_rate_hz = u32::from_be_bytes(data[20..24].try_into().expect("sliced 4 bytes"));
        let channels = u16::from_be_bytes(data[24..26].try_into().expect("sliced 2 bytes"));
        let declared = u32::from_be_bytes(data[26..30].try_into().expect("sliced 4 bytes")) as usize;

        if declared > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLarge(declared));
        }
        let actual = data.len() - HEADER_LEN;
        if declared != actual {
            return Err(FrameError::PayloadMismatch { declared, actual });
        }

        Ok(Self {
            session_id,
            sequence_no,
            sample_rate_hz,
            channels,
            payload: data[HEADER_LEN..].to_vec(),
        })
    }

    /// Build a frame from interleaved samples.
    pub fn from_samples(
        session_id: Uuid,
        sequence_no: u32,
        sample_rate_hz: u32,
        channels: u16,
        samples: &[i16],
    ) -> Self {
        let payload = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self {
            session_id,
            sequence_no,
            sample_rate_hz,
            channels,
            payload,
        }
    }

    /// Decode the PCM payload into interleaved samples. A trailing odd byte
    /// (truncated datagram) is ignored.
    pub fn samples(&self) -> Vec<i16> {
        self.payload
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    /// Number of samples the payload carries.
    pub fn sample_count(&self) -> usize {
        self.payload.len() / 2
    }
}
