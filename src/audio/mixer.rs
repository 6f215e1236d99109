// Mixing math for combining capture sources into one PCM stream.
//
// Every source (local device stream or network peer) stages samples at its
// native rate/channel count in a `SourceBuffer`. On each tick the capture
// loop drains one tick's worth from every source, converts it to the
// session's target format, and sums the results with unity gain.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::warn;

/// Maximum backlog a source may stage, in milliseconds of native audio.
/// Pushing past this drops the oldest samples so a stalled mix loop can
/// never grow a source buffer without bound.
const MAX_BACKLOG_MS: u64 = 2_000;

/// Staging buffer between a producer (cpal callback or UDP receiver) and
/// the session mix loop. Producers push at the source's native format; the
/// mix loop drains one tick at a time.
pub struct SourceBuffer {
    label: String,
    native_rate: u32,
    native_channels: u16,
    samples: Mutex<VecDeque<i16>>,
}

impl SourceBuffer {
    pub fn new(label: impl Into<String>, native_rate: u32, native_channels: u16) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            native_rate,
            native_channels,
            samples: Mutex::new(VecDeque::new()),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn native_rate(&self) -> u32 {
        self.native_rate
    }

    pub fn native_channels(&self) -> u16 {
        self.native_channels
    }

    /// Append interleaved samples, dropping the oldest backlog past the cap.
    pub fn push(&self, new_samples: &[i16]) {
        let cap = samples_for_duration(self.native_rate, self.native_channels, MAX_BACKLOG_MS);
        let mut buf = self.samples.lock();
        buf.extend(new_samples.iter().copied());
        if buf.len() > cap {
            let excess = buf.len() - cap;
            buf.drain(..excess);
            warn!(
                source = %self.label,
                dropped = excess,
                "source backlog exceeded cap, dropping oldest samples"
            );
        }
    }

    /// Remove and return up to one tick's worth of native samples. A source
    /// that produced less than a tick returns what it has; the caller pads
    /// the shortfall with silence.
    pub fn drain_tick(&self, tick_ms: u64) -> Vec<i16> {
        let want = samples_for_duration(self.native_rate, self.native_channels, tick_ms);
        let mut buf = self.samples.lock();
        let take = want.min(buf.len());
        buf.drain(..take).collect()
    }

    /// Remove and return everything currently staged.
    pub fn drain_all(&self) -> Vec<i16> {
        self.samples.lock().drain(..).collect()
    }

    /// Number of staged samples, for status reporting.
    pub fn staged_len(&self) -> usize {
        self.samples.lock().len()
    }
}

/// Interleaved sample count for a duration at the given format.
pub fn samples_for_duration(sample_rate: u32, channels: u16, duration_ms: u64) -> usize {
    (sample_rate as u64 * channels as u64 * duration_ms / 1000) as usize
}

/// Convert interleaved samples from one channel count to another.
///
/// Down-mix to mono sums channels with clipping (preserves volume); mono to
/// multi-channel duplicates; other combinations copy matching channels and
/// zero-fill the remainder.
pub fn remap_channels(samples: &[i16], from: u16, to: u16) -> Vec<i16> {
    if from == to || from == 0 {
        return samples.to_vec();
    }

    let frames = samples.len() / from as usize;
    let mut out = Vec::with_capacity(frames * to as usize);

    for frame in samples.chunks_exact(from as usize) {
        if to == 1 {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            out.push(sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
        } else if from == 1 {
            out.extend(std::iter::repeat(frame[0]).take(to as usize));
        } else {
            for ch in 0..to as usize {
                out.push(frame.get(ch).copied().unwrap_or(0));
            }
        }
    }

    out
}

/// Linear-interpolation resampler over interleaved samples.
///
/// Output length is proportional to input duration. Works per channel on
/// the deinterleaved signal, so multi-channel input stays aligned.
pub fn resample_linear(samples: &[i16], from_rate: u32, to_rate: u32, channels: u16) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 {
        return samples.to_vec();
    }

    let ch = channels.max(1) as usize;
    let in_frames = samples.len() / ch;
    if in_frames == 0 {
        return Vec::new();
    }
    let out_frames =
        ((in_frames as u64 * to_rate as u64 + from_rate as u64 / 2) / from_rate as u64) as usize;
    if out_frames == 0 {
        return Vec::new();
    }

    let mut out = vec![0i16; out_frames * ch];
    for c in 0..ch {
        for i in 0..out_frames {
            // Position of output frame i in the input signal
            let pos = if out_frames == 1 {
                0.0
            } else {
                i as f64 * (in_frames - 1) as f64 / (out_frames - 1) as f64
            };
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(in_frames - 1);
            let frac = pos - lo as f64;

            let a = samples[lo * ch + c] as f64;
            let b = samples[hi * ch + c] as f64;
            out[i * ch + c] = (a + (b - a) * frac).round() as i16;
        }
    }

    out
}

/// Convert a drained source tick to the session's target format.
pub fn convert_to_target(
    samples: &[i16],
    from_rate: u32,
    from_channels: u16,
    to_rate: u32,
    to_channels: u16,
) -> Vec<i16> {
    let remapped = remap_channels(samples, from_channels, to_channels);
    resample_linear(&remapped, from_rate, to_rate, to_channels)
}

/// Sum converted source ticks sample-wise with unity gain, clipping to the
/// valid range. Sources shorter than `target_len` contribute silence for
/// the missing tail; the output is always exactly `target_len` samples.
pub fn mix_sources(converted: &[Vec<i16>], target_len: usize) -> Vec<i16> {
    let mut out = Vec::with_capacity(target_len);
    for i in 0..target_len {
        let mut sum: i32 = 0;
        for source in converted {
            sum += source.get(i).copied().unwrap_or(0) as i32;
        }
        out.push(sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_two_sources() {
        let a = vec![100, 200, 300];
        let b = vec![50, 100, 150];
        let mixed = mix_sources(&[a, b], 3);
        assert_eq!(mixed, vec![150, 300, 450]);
    }

    #[test]
    fn test_mix_clips_at_range() {
        let a = vec![i16::MAX - 100];
        let b = vec![200];
        let mixed = mix_sources(&[a, b], 1);
        assert_eq!(mixed[0], i16::MAX);

        let a = vec![i16::MIN + 100];
        let b = vec![-200];
        let mixed = mix_sources(&[a, b], 1);
        assert_eq!(mixed[0], i16::MIN);
    }

    #[test]
    fn test_mix_silence_stays_silent() {
        let sources = vec![vec![0i16; 160], vec![0i16; 160], vec![0i16; 160]];
        let mixed = mix_sources(&sources, 160);
        assert_eq!(mixed.len(), 160);
        assert!(mixed.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_mix_pads_short_sources_with_silence() {
        let a = vec![100, 200];
        let b = vec![50, 100, 150, 200];
        let mixed = mix_sources(&[a, b], 4);
        assert_eq!(mixed, vec![150, 300, 150, 200]);
    }

    #[test]
    fn test_mix_zero_sources_yields_silence() {
        let mixed = mix_sources(&[], 8);
        assert_eq!(mixed, vec![0i16; 8]);
    }

    #[test]
    fn test_resample_output_length_proportional() {
        // 1 second at 48kHz down to 16kHz should give ~1 second at 16kHz
        let input = vec![0i16; 48_000];
        let out = resample_linear(&input, 48_000, 16_000, 1);
        assert_eq!(out.len(), 16_000);

        // Upsampling works too
        let input = vec![0i16; 8_000];
        let out = resample_linear(&input, 8_000, 16_000, 1);
        assert_eq!(out.len(), 16_000);
    }

    #[test]
    fn test_resample_preserves_constant_signal() {
        let input = vec![1000i16; 4410];
        let out = resample_linear(&input, 44_100, 16_000, 1);
        assert!(out.iter().all(|&s| s == 1000));
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let input = vec![1, 2, 3, 4];
        assert_eq!(resample_linear(&input, 16_000, 16_000, 1), input);
    }

    #[test]
    fn test_remap_stereo_to_mono_sums() {
        let stereo = vec![100, 50, 200, 100, -300, 300];
        let mono = remap_channels(&stereo, 2, 1);
        assert_eq!(mono, vec![150, 300, 0]);
    }

    #[test]
    fn test_remap_mono_to_stereo_duplicates() {
        let mono = vec![10, 20];
        let stereo = remap_channels(&mono, 1, 2);
        assert_eq!(stereo, vec![10, 10, 20, 20]);
    }

    #[test]
    fn test_remap_stereo_to_mono_clips() {
        let stereo = vec![i16::MAX, i16::MAX];
        let mono = remap_channels(&stereo, 2, 1);
        assert_eq!(mono, vec![i16::MAX]);
    }

    #[test]
    fn test_source_buffer_drain_tick() {
        let buf = SourceBuffer::new("test", 16_000, 1);
        buf.push(&vec![7i16; 4000]);

        // 100ms at 16kHz mono = 1600 samples
        let tick = buf.drain_tick(100);
        assert_eq!(tick.len(), 1600);
        assert_eq!(buf.staged_len(), 2400);

        // Draining past the staged amount returns what's left
        let tick = buf.drain_tick(100);
        assert_eq!(tick.len(), 1600);
        let tick = buf.drain_tick(100);
        assert_eq!(tick.len(), 800);
        let tick = buf.drain_tick(100);
        assert!(tick.is_empty());
    }

    #[test]
    fn test_source_buffer_caps_backlog() {
        let buf = SourceBuffer::new("test", 1000, 1);
        // Cap at 1000 Hz mono is 2000 samples; push 5000
        buf.push(&vec![1i16; 5000]);
        assert_eq!(buf.staged_len(), 2000);
    }

    #[test]
    fn test_convert_to_target_full_path() {
        // 48kHz stereo tick down to 16kHz mono
        let input = vec![300i16; 9600]; // 100ms of 48kHz stereo
        let out = convert_to_target(&input, 48_000, 2, 16_000, 1);
        assert_eq!(out.len(), 1600); // 100ms of 16kHz mono
        assert!(out.iter().all(|&s| s == 600)); // summed channels
    }
}
