//! Audio format definitions and wire constants.

use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Sample rate of microphone audio on the wire.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of synthesized speech on the wire.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Mime descriptor attached to every outbound audio chunk.
pub const INPUT_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// Mono PCM16 audio format specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of audio channels.
    pub channels: u8,
    /// Bits per sample.
    pub bits_per_sample: u8,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::pcm16_24khz()
    }
}

impl AudioFormat {
    /// PCM16 mono at an arbitrary rate.
    pub fn pcm16(sample_rate: u32) -> Self {
        Self { sample_rate, channels: 1, bits_per_sample: 16 }
    }

    /// Synthesized speech format.
    pub fn pcm16_24khz() -> Self {
        Self::pcm16(OUTPUT_SAMPLE_RATE)
    }

    /// Microphone wire format.
    pub fn pcm16_16khz() -> Self {
        Self::pcm16(INPUT_SAMPLE_RATE)
    }

    /// Mime descriptor, e.g. `audio/pcm;rate=16000`.
    pub fn mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.sample_rate)
    }

    /// Calculate bytes per second for this format.
    pub fn bytes_per_second(&self) -> u32 {
        self.sample_rate * self.channels as u32 * (self.bits_per_sample / 8) as u32
    }

    /// Calculate duration in milliseconds for a given number of bytes.
    pub fn duration_ms(&self, bytes: usize) -> f64 {
        let bytes_per_ms = self.bytes_per_second() as f64 / 1000.0;
        if bytes_per_ms == 0.0 {
            return 0.0;
        }
        bytes as f64 / bytes_per_ms
    }
}

/// Encoded PCM16 little-endian audio with its format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Raw audio data.
    pub data: Bytes,
    /// Audio format of this chunk.
    pub format: AudioFormat,
}

impl AudioChunk {
    /// Create a new audio chunk.
    pub fn new(data: impl Into<Bytes>, format: AudioFormat) -> Self {
        Self { data: data.into(), format }
    }

    /// Create a synthesized speech chunk.
    pub fn pcm16_24khz(data: impl Into<Bytes>) -> Self {
        Self::new(data, AudioFormat::pcm16_24khz())
    }

    /// Create a microphone wire chunk.
    pub fn pcm16_16khz(data: impl Into<Bytes>) -> Self {
        Self::new(data, AudioFormat::pcm16_16khz())
    }

    /// Number of encoded bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the chunk carries no audio.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get duration of this audio chunk in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.format.duration_ms(self.data.len())
    }

    /// Encode audio data as base64.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// Decode audio data from base64.
    pub fn from_base64(encoded: &str, format: AudioFormat) -> Result<Self, base64::DecodeError> {
        let data = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        Ok(Self::new(data, format))
    }
}
