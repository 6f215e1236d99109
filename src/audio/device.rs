//! Audio endpoint enumeration and capture stream construction.
//!
//! Device indices are positions within one enumeration pass and may change
//! whenever the OS device topology changes (a USB mic unplugs). Callers
//! re-enumerate before starting a capture instead of caching indices.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::SampleFormat;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

use super::mixer::SourceBuffer;
use crate::error::{Result, ScribeError};

/// Name fragments that identify virtual routing devices (VB-Cable,
/// Voicemeeter, BlackHole and friends) carrying system audio.
const VIRTUAL_DEVICE_KEYWORDS: &[&str] = &[
    "loopback",
    "stereo mix",
    "what u hear",
    "wave out",
    "vb-cable",
    "voicemeeter",
    "blackhole",
    "virtual",
];

#[derive(Debug, Clone, Serialize)]
pub struct AudioDeviceInfo {
    pub index: usize,
    pub name: String,
    pub channels: u16,
    pub sample_rate_hz: u32,
    pub is_loopback_capable: bool,
    pub is_network_virtual: bool,
    pub host_api: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceList {
    pub devices: Vec<AudioDeviceInfo>,
    pub loopback_devices: Vec<AudioDeviceInfo>,
    pub network_virtual_devices: Vec<AudioDeviceInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub loopback_supported: bool,
    pub network_streaming_supported: bool,
}

/// A device resolved against a fresh enumeration, ready to open on a
/// capture thread. `cpal::Stream` itself is not `Send`, so the stream is
/// built where it will live; this carries everything needed to build it.
pub struct ResolvedDevice {
    pub device: cpal::Device,
    pub name: String,
    pub config: cpal::SupportedStreamConfig,
    pub loopback: bool,
}

pub struct DeviceRegistry {
    host: cpal::Host,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            // cpal exposes loopback capture by opening an output endpoint as
            // an input stream, which only WASAPI supports.
            loopback_supported: cfg!(target_os = "windows"),
            network_streaming_supported: true,
        }
    }

    /// Enumerate capturable endpoints. Inputs come first; on hosts with
    /// loopback support, output endpoints follow as loopback candidates.
    /// No caching: every call reflects the current device topology.
    pub fn list(&self) -> Result<DeviceList> {
        let devices = self.scan()?.into_iter().map(|(_, info)| info).collect::<Vec<_>>();

        let loopback_devices = devices
            .iter()
            .filter(|d| d.is_loopback_capable)
            .cloned()
            .collect();
        let network_virtual_devices = devices
            .iter()
            .filter(|d| d.is_network_virtual)
            .cloned()
            .collect();

        Ok(DeviceList {
            devices,
            loopback_devices,
            network_virtual_devices,
        })
    }

    /// Resolve a device index from a fresh enumeration. An index that no
    /// longer exists (device unplugged since the caller enumerated) is a
    /// `DeviceOpen` error, not a silent fallback.
    pub fn resolve(&self, index: usize, use_loopback: bool) -> Result<ResolvedDevice> {
        let mut scanned = self.scan()?;
        if index >= scanned.len() {
            return Err(ScribeError::DeviceOpen(format!(
                "device index {} not present in current enumeration ({} devices)",
                index,
                scanned.len()
            )));
        }
        let (device, info) = scanned.swap_remove(index);

        if use_loopback && !info.is_loopback_capable {
            return Err(ScribeError::DeviceOpen(format!(
                "device '{}' does not support loopback capture",
                info.name
            )));
        }

        // Loopback endpoints are output devices opened for capture, so their
        // native format comes from the output side.
        let config = if use_loopback && info.is_loopback_capable && !info.is_network_virtual {
            device
                .default_output_config()
                .map_err(|e| ScribeError::DeviceOpen(format!("'{}': {}", info.name, e)))?
        } else {
            device
                .default_input_config()
                .map_err(|e| ScribeError::DeviceOpen(format!("'{}': {}", info.name, e)))?
        };

        Ok(ResolvedDevice {
            device,
            name: info.name,
            config,
            loopback: use_loopback,
        })
    }

    fn scan(&self) -> Result<Vec<(cpal::Device, AudioDeviceInfo)>> {
        let mut out = Vec::new();
        let host_api = format!("{:?}", self.host.id());

        let inputs = self
            .host
            .input_devices()
            .map_err(|e| ScribeError::DeviceEnumeration(e.to_string()))?;

        for device in inputs {
            let Ok(name) = device.name() else { continue };
            let Ok(config) = device.default_input_config() else {
                debug!(device = %name, "skipping input device with no usable config");
                continue;
            };
            let is_virtual = is_virtual_name(&name);
            let info = AudioDeviceInfo {
                index: out.len(),
                name,
                channels: config.channels(),
                sample_rate_hz: config.sample_rate().0,
                is_loopback_capable: is_virtual,
                is_network_virtual: is_virtual,
                host_api: host_api.clone(),
            };
            out.push((device, info));
        }

        if self.capabilities().loopback_supported {
            let outputs = self
                .host
                .output_devices()
                .map_err(|e| ScribeError::DeviceEnumeration(e.to_string()))?;
            for device in outputs {
                let Ok(name) = device.name() else { continue };
                let Ok(config) = device.default_output_config() else {
                    continue;
                };
                let info = AudioDeviceInfo {
                    index: out.len(),
                    name: name.clone(),
                    channels: config.channels(),
                    sample_rate_hz: config.sample_rate().0,
                    is_loopback_capable: true,
                    is_network_virtual: is_virtual_name(&name),
                    host_api: host_api.clone(),
                };
                out.push((device, info));
            }
        }

        Ok(out)
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn is_virtual_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    VIRTUAL_DEVICE_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Build a cpal input stream that pushes interleaved i16 samples into the
/// given source buffer. Must be called on the thread that will own the
/// stream; the returned stream stops capturing when dropped.
pub fn build_capture_stream(
    resolved: &ResolvedDevice,
    sink: Arc<SourceBuffer>,
) -> Result<cpal::Stream> {
    let stream_config: cpal::StreamConfig = resolved.config.clone().into();
    let name = resolved.name.clone();
    let err_name = name.clone();
    let err_fn = move |e| error!(device = %err_name, "capture stream error: {}", e);

    let stream = match resolved.config.sample_format() {
        SampleFormat::I16 => resolved.device.build_input_stream(
            &stream_config,
            move |data: &[i16], _| sink.push(data),
            err_fn,
            None,
        ),
        SampleFormat::U16 => resolved.device.build_input_stream(
            &stream_config,
            move |data: &[u16], _| {
                let converted: Vec<i16> =
                    data.iter().map(|&s| (s as i32 - 32_768) as i16).collect();
                sink.push(&converted);
            },
            err_fn,
            None,
        ),
        SampleFormat::F32 => resolved.device.build_input_stream(
            &stream_config,
            move |data: &[f32], _| {
                let converted: Vec<i16> = data
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .collect();
                sink.push(&converted);
            },
            err_fn,
            None,
        ),
        other => {
            return Err(ScribeError::DeviceOpen(format!(
                "device '{}' uses unsupported sample format {:?}",
                name, other
            )))
        }
    }
    .map_err(|e| ScribeError::DeviceOpen(format!("'{}': {}", name, e)))?;

    Ok(stream)
}
