//! Core RealtimeSession trait definition.

use crate::audio::AudioChunk;
use crate::error::Result;
use crate::events::{ServerEvent, ToolResponse};
use async_trait::async_trait;

/// A live bidirectional connection to the realtime endpoint.
///
/// Sends and receives may run concurrently: implementations keep the write
/// and read halves independent so a pending [`next_event`](Self::next_event)
/// never blocks an outbound audio chunk.
///
/// # Example
///
/// ```rust,ignore
/// use barista_realtime::{RealtimeSession, ServerEvent};
///
/// async fn pump(session: &dyn RealtimeSession) -> Result<()> {
///     session.send_audio(&chunk).await?;
///     while let Some(event) = session.next_event().await {
///         if let ServerEvent::ToolCall { calls } = event? {
///             session.send_tool_responses(answer(calls)).await?;
///         }
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait RealtimeSession: Send + Sync {
    /// Get the session ID.
    fn session_id(&self) -> &str;

    /// Check if the session is currently connected.
    fn is_connected(&self) -> bool;

    /// Send one microphone chunk as realtime input.
    async fn send_audio(&self, audio: &AudioChunk) -> Result<()>;

    /// Signal the end of the user's utterance.
    async fn send_audio_stream_end(&self) -> Result<()>;

    /// Send every response for one tool-call event as a single batch.
    async fn send_tool_responses(&self, responses: Vec<ToolResponse>) -> Result<()>;

    /// Get the next event from the server.
    ///
    /// A remote close is delivered as [`ServerEvent::Closed`]; `None` follows
    /// once the connection is gone.
    async fn next_event(&self) -> Option<Result<ServerEvent>>;

    /// Close the session gracefully.
    async fn close(&self) -> Result<()>;
}

/// A boxed session type for dynamic dispatch.
pub type BoxedSession = Box<dyn RealtimeSession>;
