pub mod capture;
pub mod device;
pub mod mixer;
pub mod wav;

pub use capture::{CaptureConfig, CaptureManager, CaptureStatus};
pub use device::{AudioDeviceInfo, Capabilities, DeviceList, DeviceRegistry};
pub use mixer::SourceBuffer;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
}
