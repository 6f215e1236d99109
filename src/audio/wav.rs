//! In-memory WAV container framing for finished recordings.
//!
//! The transcription and diarization engines take a portable container, not
//! raw sample memory, so a stopped session's PCM buffer is wrapped in a
//! standard 16-bit WAV before it leaves the capture subsystem.

use anyhow::{Context, Result};
use std::io::Cursor;

use super::AudioFrame;

/// Encode interleaved 16-bit PCM samples as WAV bytes. An empty sample
/// buffer produces a valid zero-duration container, not an error.
pub fn encode(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .context("Failed to create WAV writer")?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize().context("Failed to finalize WAV")?;
    }

    Ok(cursor.into_inner())
}

/// Decode WAV bytes back into an interleaved 16-bit PCM frame.
pub fn decode(bytes: &[u8]) -> Result<AudioFrame> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).context("Failed to parse WAV data")?;
    let spec = reader.spec();

    let samples: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read WAV samples")?,
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read WAV samples")?,
    };

    Ok(AudioFrame {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}
