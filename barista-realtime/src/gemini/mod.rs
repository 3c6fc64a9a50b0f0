//! Gemini Live API provider.
//!
//! Connects to Google's WebSocket-based Live API. Input audio is 16 kHz mono
//! PCM16 and output audio is 24 kHz mono PCM16. The provider translates each
//! server message into the ordered [`ServerEvent`](crate::ServerEvent)s the
//! orchestrator consumes.
//!
//! # Example
//!
//! ```rust,ignore
//! use barista_realtime::gemini::GeminiRealtimeModel;
//! use barista_realtime::{RealtimeModel, RealtimeConfig};
//!
//! let model = GeminiRealtimeModel::with_default_model(api_key)?;
//! let config = RealtimeConfig::default().with_instruction("You are a barista.");
//! let session = model.connect(config).await?;
//! session.close().await?;
//! ```

mod model;
mod protocol;
mod session;

pub use model::GeminiRealtimeModel;
pub use session::GeminiRealtimeSession;

/// Gemini Live API WebSocket URL.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Default native-audio model for Gemini Live.
pub const DEFAULT_MODEL: &str = "models/gemini-2.5-flash-preview-native-audio-dialog";
