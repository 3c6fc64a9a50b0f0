//! # barista-realtime
//!
//! Voice ordering for a coffee shop over a realtime conversational endpoint.
//!
//! The crate streams microphone audio to Gemini Live, plays back the
//! synthesized replies, keeps a running transcript, and answers the model's
//! `submit_order` tool call.
//!
//! ## Architecture
//!
//! ```text
//!   microphone ──► CaptureController ──► frames ─┐
//!                                                │
//!                                   ┌────────────▼────────────┐
//!   commands ─────────────────────► │ ConversationController  │ ──► ConversationUpdate
//!                                   └────────────┬────────────┘
//!                                                │ SessionObserver
//!                                   ┌────────────▼────────────┐
//!                                   │   SessionOrchestrator   │ ◄── ToolHandler
//!                                   └────────────┬────────────┘
//!                                                │ RealtimeSession
//!                                   ┌────────────▼────────────┐
//!                                   │   Gemini Live (wss)     │
//!                                   └─────────────────────────┘
//! ```
//!
//! One task owns the conversation. The transport pump, the microphone thread
//! and the speaker each feed it through channels.
//!
//! ## Example
//!
//! ```rust,ignore
//! use barista_realtime::gemini::GeminiRealtimeModel;
//! use barista_realtime::{ConversationController, SessionOrchestrator, prompt, tools};
//!
//! let model = GeminiRealtimeModel::with_default_model(api_key)?;
//! let orchestrator = SessionOrchestrator::builder()
//!     .model(Arc::new(model))
//!     .instruction(prompt::BARISTA_INSTRUCTION)
//!     .tool(tools::submit_order_tool(), tools::OrderToolHandler::simulated())
//!     .build()?;
//!
//! let mut conversation = ConversationController::new(orchestrator, input, output);
//! conversation.run(commands).await;
//! ```

pub mod audio;
pub mod capture;
pub mod codec;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod model;
pub mod orchestrator;
pub mod playback;
pub mod prompt;
pub mod session;
pub mod tools;

pub mod gemini;

#[cfg(feature = "desktop-audio")]
pub mod device;

// Re-exports
pub use audio::{AudioChunk, AudioFormat};
pub use capture::{AudioInput, CaptureController, CaptureState, InputStream, ReadinessGate};
pub use config::{Modality, RealtimeConfig, RealtimeConfigBuilder, ToolDefinition};
pub use conversation::{
    ChatMessage, ConversationCommand, ConversationController, ConversationState,
    ConversationStatus, ConversationUpdate, Sender,
};
pub use error::{RealtimeError, Result};
pub use events::{FunctionResponseData, ResponseStatus, ServerEvent, ToolCall, ToolResponse};
pub use model::{BoxedModel, RealtimeModel};
pub use orchestrator::{
    AudioSender, FnToolHandler, NoOpObserver, SessionObserver, SessionOrchestrator,
    SessionOrchestratorBuilder, ToolHandler,
};
pub use playback::{AudioOutput, NullOutput, PlaybackController, RenderControl};
pub use session::{BoxedSession, RealtimeSession};
pub use tools::{OrderSink, OrderToolHandler, SimulatedOrderSink};
