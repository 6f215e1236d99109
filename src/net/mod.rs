//! LAN audio streaming between machines.
//!
//! A `StreamSender` captures a local device and forwards sequenced PCM
//! frames over UDP to a listening `CaptureSession` on another machine. The
//! sender only makes outbound traffic, so no port-forwarding is needed on
//! its side; the receiver binds the listen port.
//!
//! Transport is deliberately best-effort: frames carry sequence numbers so
//! the receiver can detect loss and fill the gap with silence, but nothing
//! is retransmitted. Retransmission would add latency a live capture can't
//! absorb, and a dropped frame of audio degrades far more gracefully than a
//! stalled stream. The wire carries no authentication or encryption; the
//! protocol assumes a trusted LAN and is documented as such.

pub mod frame;
pub mod receiver;
pub mod sender;

pub use frame::NetworkFrame;
pub use sender::{SendConfig, SenderManager};
