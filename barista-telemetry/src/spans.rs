//! Span helpers for the realtime session
//!
//! Pre-configured spans for instrumenting session setup, turns and tool execution.

use tracing::Span;

/// Create a span covering a session connect.
///
/// # Example
/// ```
/// use barista_telemetry::session_span;
/// let span = session_span("gemini-live-2.5-flash-preview", false);
/// let _enter = span.enter();
/// ```
pub fn session_span(model_id: &str, resuming: bool) -> Span {
    tracing::info_span!(
        "session.connect",
        model.id = model_id,
        session.resuming = resuming,
        session.id = tracing::field::Empty,
        otel.kind = "client"
    )
}

/// Create a span for one batch of tool calls the model asked for.
pub fn turn_span(call_count: usize) -> Span {
    tracing::info_span!("turn.tool_calls", tool.count = call_count, otel.kind = "internal")
}

/// Create a span for tool execution
///
/// # Example
/// ```
/// use barista_telemetry::tool_execute_span;
/// let span = tool_execute_span("submit_order", "call-1");
/// let _enter = span.enter();
/// ```
pub fn tool_execute_span(tool_name: &str, call_id: &str) -> Span {
    tracing::info_span!(
        "tool.execute",
        tool.name = tool_name,
        tool.call_id = call_id,
        otel.kind = "internal"
    )
}

/// Record the server-assigned session id on a [`session_span`].
pub fn record_session_id(span: &Span, session_id: &str) {
    span.record("session.id", session_id);
}
