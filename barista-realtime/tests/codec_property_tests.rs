//! Property-based tests for the audio frame codec.
//!
//! *For any* float waveform and device rate, encoding SHALL produce
//! `floor(len / ratio)` PCM16 samples at 16 kHz, every decoded sample SHALL
//! lie in `[-1, 1)`, and samples already on the quantization grid SHALL
//! survive a round trip within one step.

use barista_realtime::codec::{self, SUMMARY_SEGMENTS};
use barista_realtime::audio::INPUT_SAMPLE_RATE;
use proptest::prelude::*;

const STEP: f32 = 1.0 / 32768.0;

fn arb_rate() -> impl Strategy<Value = u32> {
    prop_oneof![Just(8_000u32), Just(16_000), Just(22_050), Just(44_100), Just(48_000)]
}

fn arb_waveform() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-1.5f32..1.5f32, 0..2_000)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_encoded_length_follows_ratio(samples in arb_waveform(), rate in arb_rate()) {
        let chunk = codec::encode(&samples, rate);
        let ratio = rate as f64 / INPUT_SAMPLE_RATE as f64;
        let expected = if rate == INPUT_SAMPLE_RATE {
            samples.len()
        } else {
            (samples.len() as f64 / ratio).floor() as usize
        };
        prop_assert_eq!(chunk.len(), expected * 2);
        prop_assert_eq!(chunk.format.sample_rate, INPUT_SAMPLE_RATE);
    }

    #[test]
    fn prop_decoded_samples_in_range(samples in arb_waveform()) {
        let chunk = codec::encode(&samples, INPUT_SAMPLE_RATE);
        for sample in codec::decode(&chunk.data) {
            prop_assert!((-1.0..1.0).contains(&sample));
        }
    }

    #[test]
    fn prop_round_trip_within_one_step(samples in prop::collection::vec(-1.0f32..=1.0f32, 1..500)) {
        let chunk = codec::encode(&samples, INPUT_SAMPLE_RATE);
        let decoded = codec::decode(&chunk.data);
        prop_assert_eq!(decoded.len(), samples.len());
        for (original, back) in samples.iter().zip(decoded) {
            prop_assert!((original - back).abs() <= STEP * 2.0);
        }
    }

    #[test]
    fn prop_summary_is_normalized(samples in prop::collection::vec(-1.0f32..=1.0f32, 50..3_000)) {
        let summary = codec::amplitude_summary(&samples, SUMMARY_SEGMENTS);
        prop_assert_eq!(summary.len(), SUMMARY_SEGMENTS);
        for bar in &summary {
            prop_assert!((0.0..=1.0).contains(bar));
        }
    }
}

#[test]
fn test_extremes_round_trip() {
    let chunk = codec::encode(&[1.0, -1.0, 0.0], INPUT_SAMPLE_RATE);
    let decoded = codec::decode(&chunk.data);
    assert!((decoded[0] - 1.0).abs() <= STEP);
    assert!((decoded[1] + 1.0).abs() <= STEP);
    assert_eq!(decoded[2], 0.0);
}

#[test]
fn test_short_input_summary() {
    assert_eq!(codec::amplitude_summary(&[0.5; 10], SUMMARY_SEGMENTS), vec![0.0]);
}
