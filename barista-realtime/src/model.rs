//! Core RealtimeModel trait definition.

use crate::audio::AudioFormat;
use crate::config::RealtimeConfig;
use crate::error::Result;
use crate::session::BoxedSession;
use async_trait::async_trait;

/// A factory for realtime sessions.
///
/// `connect` resolves once the server has acknowledged the session setup,
/// so a returned session is ready to accept audio.
#[async_trait]
pub trait RealtimeModel: Send + Sync {
    /// Get the provider name.
    fn provider(&self) -> &str;

    /// Get the model identifier.
    fn model_id(&self) -> &str;

    /// Format expected for microphone audio.
    fn input_format(&self) -> AudioFormat {
        AudioFormat::pcm16_16khz()
    }

    /// Format of synthesized speech.
    fn output_format(&self) -> AudioFormat {
        AudioFormat::pcm16_24khz()
    }

    /// Connect and create a new realtime session.
    async fn connect(&self, config: RealtimeConfig) -> Result<BoxedSession>;
}

/// A shared model type for thread-safe access.
pub type BoxedModel = std::sync::Arc<dyn RealtimeModel>;
