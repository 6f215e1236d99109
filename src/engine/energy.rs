//! Energy-based diarizer.
//!
//! A single-speaker fallback for setups without a voice-print model: short-
//! time RMS energy is smoothed and thresholded at half its mean, and runs of
//! above-threshold frames become speech turns. Everything it finds is
//! attributed to one speaker, which still lets the merge stage separate
//! speech from silence.

use tracing::debug;

use super::{Diarization, SpeakerTurn};
use crate::audio::mixer::remap_channels;
use crate::audio::wav;
use crate::error::{Result, ScribeError};

#[derive(Debug, Clone)]
pub struct EnergyDiarizer {
    /// Analysis frame length in milliseconds
    frame_ms: u32,
    /// Hop between frames in milliseconds
    hop_ms: u32,
    /// Moving-average window over energy frames
    smooth_frames: usize,
    /// Minimum turn length in seconds
    min_turn_secs: f64,
}

impl Default for EnergyDiarizer {
    fn default() -> Self {
        Self {
            frame_ms: 25,
            hop_ms: 10,
            smooth_frames: 10,
            min_turn_secs: 0.5,
        }
    }
}

impl EnergyDiarizer {
    pub fn diarize_wav(&self, wav_bytes: &[u8]) -> Result<Diarization> {
        let frame = wav::decode(wav_bytes)
            .map_err(|e| ScribeError::Engine(format!("could not decode audio: {}", e)))?;

        let mono = remap_channels(&frame.samples, frame.channels, 1);
        let sample_rate = frame.sample_rate as usize;
        if sample_rate == 0 || mono.is_empty() {
            return Ok(Diarization::default());
        }

        let frame_len = sample_rate * self.frame_ms as usize / 1000;
        let hop = sample_rate * self.hop_ms as usize / 1000;
        if frame_len == 0 || hop == 0 || mono.len() < frame_len {
            return Ok(Diarization::default());
        }

        let energy = rms_frames(&mono, frame_len, hop);
        let smoothed = moving_average(&energy, self.smooth_frames);

        let mean: f64 = smoothed.iter().sum::<f64>() / smoothed.len() as f64;
        let threshold = mean * 0.5;

        let hop_secs = hop as f64 / sample_rate as f64;
        let turns = self.extract_turns(&smoothed, threshold, hop_secs);

        debug!(
            frames = energy.len(),
            turns = turns.len(),
            "energy diarization complete"
        );

        Ok(Diarization { turns })
    }

    fn extract_turns(&self, smoothed: &[f64], threshold: f64, hop_secs: f64) -> Vec<SpeakerTurn> {
        let mut turns = Vec::new();
        let mut run_start: Option<usize> = None;

        for (i, &value) in smoothed.iter().enumerate() {
            let speech = value > threshold;
            match (speech, run_start) {
                (true, None) => run_start = Some(i),
                (false, Some(start)) => {
                    self.push_turn(&mut turns, start, i, hop_secs);
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            self.push_turn(&mut turns, start, smoothed.len(), hop_secs);
        }

        turns
    }

    fn push_turn(&self, turns: &mut Vec<SpeakerTurn>, start: usize, end: usize, hop_secs: f64) {
        let start_time = start as f64 * hop_secs;
        let end_time = end as f64 * hop_secs;
        if end_time - start_time >= self.min_turn_secs {
            turns.push(SpeakerTurn {
                start: start_time,
                end: end_time,
                speaker: "SPEAKER_00".to_string(),
            });
        }
    }
}

fn rms_frames(samples: &[i16], frame_len: usize, hop: usize) -> Vec<f64> {
    let mut out = Vec::new();
    let mut start = 0;
    while start + frame_len <= samples.len() {
        let window = &samples[start..start + frame_len];
        let sum_sq: f64 = window.iter().map(|&s| (s as f64) * (s as f64)).sum();
        out.push((sum_sq / frame_len as f64).sqrt());
        start += hop;
    }
    out
}

/// Centered moving average, mirroring uniform smoothing over the energy
/// envelope. Window edges shrink at the boundaries.
fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if values.is_empty() || window <= 1 {
        return values.to_vec();
    }
    let half = window / 2;
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(values.len());
            values[lo..hi].iter().sum::<f64>() / (hi - lo) as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav;

    #[test]
    fn test_silence_yields_no_turns() {
        let samples = vec![0i16; 16_000 * 2]; // 2 seconds of silence
        let bytes = wav::encode(&samples, 16_000, 1).unwrap();
        let result = EnergyDiarizer::default().diarize_wav(&bytes).unwrap();
        assert!(result.turns.is_empty());
    }

    #[test]
    fn test_burst_is_detected_as_single_speaker_turn() {
        // 1s silence, 1s constant tone, 1s silence
        let mut samples = vec![0i16; 16_000];
        samples.extend(vec![10_000i16; 16_000]);
        samples.extend(vec![0i16; 16_000]);
        let bytes = wav::encode(&samples, 16_000, 1).unwrap();

        let result = EnergyDiarizer::default().diarize_wav(&bytes).unwrap();
        assert_eq!(result.turns.len(), 1);

        let turn = &result.turns[0];
        assert_eq!(turn.speaker, "SPEAKER_00");
        assert!(turn.start > 0.8 && turn.start < 1.2, "start={}", turn.start);
        assert!(turn.end > 1.8 && turn.end < 2.2, "end={}", turn.end);
    }

    #[test]
    fn test_short_blip_is_ignored() {
        // 100ms of tone is below the minimum turn length
        let mut samples = vec![0i16; 16_000];
        samples.extend(vec![10_000i16; 1_600]);
        samples.extend(vec![0i16; 16_000]);
        let bytes = wav::encode(&samples, 16_000, 1).unwrap();

        let result = EnergyDiarizer::default().diarize_wav(&bytes).unwrap();
        assert!(result.turns.is_empty());
    }

    #[test]
    fn test_garbage_bytes_are_an_engine_error() {
        let result = EnergyDiarizer::default().diarize_wav(b"not a wav file");
        assert!(result.is_err());
    }
}
