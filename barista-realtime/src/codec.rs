//! Conversion between device float samples and wire PCM16.
//!
//! The capture path resamples to [`INPUT_SAMPLE_RATE`] with nearest-neighbour
//! index mapping and quantizes asymmetrically so that `-1.0` maps to
//! `i16::MIN` and `1.0` to `i16::MAX`. The playback path only de-quantizes;
//! synthesized speech already arrives at the output rate.

use crate::audio::{AudioChunk, AudioFormat, INPUT_SAMPLE_RATE};

/// Bars in a waveform summary.
pub const SUMMARY_SEGMENTS: usize = 50;

/// Floor for the normalizing peak of a waveform summary.
const SUMMARY_PEAK_FLOOR: f32 = 0.00001;

/// Resample by nearest-neighbour index mapping.
///
/// The output holds `floor(len / ratio)` samples where `ratio = source / target`
/// and output sample `i` is input sample `floor(i * ratio)`.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    if source_rate == target_rate || source_rate == 0 || target_rate == 0 {
        return samples.to_vec();
    }

    let ratio = source_rate as f64 / target_rate as f64;
    let out_len = (samples.len() as f64 / ratio).floor() as usize;
    let last = samples.len() - 1;
    (0..out_len)
        .map(|i| samples[((i as f64 * ratio).floor() as usize).min(last)])
        .collect()
}

/// Quantize one normalized sample to signed 16-bit.
pub fn quantize(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 { (s * 32768.0) as i16 } else { (s * 32767.0) as i16 }
}

/// Convert one signed 16-bit sample back to the normalized range.
pub fn dequantize(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Encode device samples into a 16 kHz wire frame.
pub fn encode(samples: &[f32], source_rate: u32) -> AudioChunk {
    let resampled = resample(samples, source_rate, INPUT_SAMPLE_RATE);
    let mut data = Vec::with_capacity(resampled.len() * 2);
    for sample in resampled {
        data.extend_from_slice(&quantize(sample).to_le_bytes());
    }
    AudioChunk::new(data, AudioFormat::pcm16_16khz())
}

/// Decode a little-endian PCM16 frame. A trailing odd byte is ignored.
pub fn decode(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(2).map(|pair| dequantize(i16::from_le_bytes([pair[0], pair[1]]))).collect()
}

/// Decode a batch of frames into one continuous waveform.
pub fn decode_all<'a>(chunks: impl IntoIterator<Item = &'a AudioChunk>) -> Vec<f32> {
    let mut waveform = Vec::new();
    for chunk in chunks {
        waveform.extend(decode(&chunk.data));
    }
    waveform
}

/// Peak amplitude per equal-length segment, normalized to the loudest segment.
///
/// Returns an empty summary for empty input and `[0.0]` when there are fewer
/// samples than segments.
pub fn amplitude_summary(samples: &[f32], segments: usize) -> Vec<f32> {
    if samples.is_empty() || segments == 0 {
        return Vec::new();
    }
    let segment_len = samples.len() / segments;
    if segment_len == 0 {
        return vec![0.0];
    }

    let peaks: Vec<f32> = samples
        .chunks_exact(segment_len)
        .take(segments)
        .map(|segment| segment.iter().fold(0.0f32, |peak, s| peak.max(s.abs())))
        .collect();
    let max_peak = peaks.iter().copied().fold(SUMMARY_PEAK_FLOOR, f32::max);
    peaks.into_iter().map(|peak| peak / max_peak).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_identity() {
        let samples = vec![0.1, -0.2, 0.3];
        assert_eq!(resample(&samples, 16_000, 16_000), samples);
    }

    #[test]
    fn test_resample_downsample_48k() {
        let samples: Vec<f32> = (0..9).map(|i| i as f32).collect();
        assert_eq!(resample(&samples, 48_000, 16_000), vec![0.0, 3.0, 6.0]);
    }

    #[test]
    fn test_resample_44k1_length() {
        let samples = vec![0.0f32; 441];
        assert_eq!(resample(&samples, 44_100, 16_000).len(), 160);
    }

    #[test]
    fn test_quantize_extremes() {
        assert_eq!(quantize(1.0), i16::MAX);
        assert_eq!(quantize(-1.0), i16::MIN);
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(2.5), i16::MAX);
        assert_eq!(quantize(-7.0), i16::MIN);
    }

    #[test]
    fn test_encode_empty() {
        let chunk = encode(&[], 48_000);
        assert!(chunk.is_empty());
        assert_eq!(chunk.format, AudioFormat::pcm16_16khz());
    }

    #[test]
    fn test_decode_ignores_trailing_byte() {
        assert_eq!(decode(&[0x00, 0x80, 0x01]), vec![-1.0]);
    }

    #[test]
    fn test_summary_short_input() {
        assert_eq!(amplitude_summary(&[0.5; 10], SUMMARY_SEGMENTS), vec![0.0]);
        assert!(amplitude_summary(&[], SUMMARY_SEGMENTS).is_empty());
    }

    #[test]
    fn test_summary_normalized() {
        let mut samples = vec![0.0f32; 100];
        samples[10] = 0.25;
        samples[90] = -0.5;
        let summary = amplitude_summary(&samples, 50);
        assert_eq!(summary.len(), 50);
        assert_eq!(summary[5], 0.5);
        assert_eq!(summary[45], 1.0);
        assert_eq!(summary[0], 0.0);
    }

    #[test]
    fn test_summary_silence_uses_floor() {
        let summary = amplitude_summary(&[0.0; 200], 50);
        assert!(summary.iter().all(|v| *v == 0.0));
    }
}
