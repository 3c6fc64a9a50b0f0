//! Session orchestration.
//!
//! [`SessionOrchestrator`] owns the realtime connection and everything that
//! must survive across reconnects: the resumption handle, the inbound event
//! queue, and the set of tool calls already answered. Inbound events are
//! drained one at a time, in arrival order, and turned into calls on a
//! [`SessionObserver`]. Tool calls are executed here and answered as a single
//! batch per server message.

use crate::audio::AudioChunk;
use crate::config::{RealtimeConfig, ToolDefinition};
use crate::error::{RealtimeError, Result};
use crate::events::{FunctionResponseData, ServerEvent, ToolCall, ToolResponse};
use crate::model::BoxedModel;
use crate::session::RealtimeSession;
use async_trait::async_trait;
use barista_telemetry::{metrics, record_session_id, session_span, tool_execute_span, turn_span};
use futures::FutureExt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Close code reported when the client ends the session.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the connection vanished without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Handler for tool/function calls from the realtime model.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute a tool call and return the result.
    ///
    /// An `Err` is reported to the model as a failure response.
    async fn execute(&self, call: &ToolCall) -> Result<FunctionResponseData>;
}

/// A simple function-based tool handler.
pub struct FnToolHandler<F>
where
    F: Fn(&ToolCall) -> Result<FunctionResponseData> + Send + Sync,
{
    handler: F,
}

impl<F> FnToolHandler<F>
where
    F: Fn(&ToolCall) -> Result<FunctionResponseData> + Send + Sync,
{
    /// Create a new function-based tool handler.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> ToolHandler for FnToolHandler<F>
where
    F: Fn(&ToolCall) -> Result<FunctionResponseData> + Send + Sync,
{
    async fn execute(&self, call: &ToolCall) -> Result<FunctionResponseData> {
        (self.handler)(call)
    }
}

/// Receives the side effects of the inbound stream.
///
/// Every method has a no-op default. Calls arrive on the task driving the
/// orchestrator, in the order the server produced the underlying events.
pub trait SessionObserver: Send {
    /// The server accepted the session.
    fn on_open(&mut self) {}

    /// Latest snapshot of the user's utterance.
    fn on_input_transcription(&mut self, _text: &str) {}

    /// Next fragment of the assistant's transcript.
    fn on_output_transcription(&mut self, _text: &str) {}

    /// Synthesized speech to buffer.
    fn on_audio(&mut self, _chunk: AudioChunk) {}

    /// The user spoke over the assistant.
    fn on_interrupted(&mut self, _connected: bool) {}

    /// The assistant's turn ended, explicitly or after a tool batch.
    fn on_turn_complete(&mut self, _connected: bool) {}

    /// A tool is about to run.
    fn on_tool_call(&mut self, _call: &ToolCall) {}

    /// A tool finished, successfully or not.
    fn on_tool_response(&mut self, _response: &ToolResponse) {}

    /// Every call in a batch has been answered.
    fn on_tool_calls_completed(&mut self) {}

    /// Something went wrong. Never followed by an automatic reconnect.
    fn on_error(&mut self, _error: &RealtimeError) {}

    /// The session ended, locally or remotely.
    fn on_close(&mut self, _code: u16, _reason: &str) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Default)]
pub struct NoOpObserver;

impl SessionObserver for NoOpObserver {}

/// Builder for SessionOrchestrator.
pub struct SessionOrchestratorBuilder {
    model: Option<BoxedModel>,
    instruction: Option<String>,
    voice: Option<String>,
    declarations: Vec<ToolDefinition>,
    tools: HashMap<String, Arc<dyn ToolHandler>>,
}

impl Default for SessionOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionOrchestratorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            model: None,
            instruction: None,
            voice: None,
            declarations: Vec::new(),
            tools: HashMap::new(),
        }
    }

    /// Set the realtime model.
    pub fn model(mut self, model: BoxedModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the system instruction.
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Set the voice.
    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Register a tool with its handler.
    pub fn tool(mut self, definition: ToolDefinition, handler: impl ToolHandler + 'static) -> Self {
        self.tools.insert(definition.name.clone(), Arc::new(handler));
        self.declarations.retain(|existing| existing.name != definition.name);
        self.declarations.push(definition);
        self
    }

    /// Register a tool with a sync function handler.
    pub fn tool_fn<F>(self, definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(&ToolCall) -> Result<FunctionResponseData> + Send + Sync + 'static,
    {
        self.tool(definition, FnToolHandler::new(handler))
    }

    /// Build the orchestrator (does not connect yet).
    pub fn build(self) -> Result<SessionOrchestrator> {
        let model = self.model.ok_or_else(|| RealtimeError::config("Model is required"))?;

        Ok(SessionOrchestrator {
            model,
            instruction: self.instruction,
            voice: self.voice,
            declarations: self.declarations,
            tools: self.tools,
            session: None,
            resumption_handle: None,
            inbound: VecDeque::new(),
            answered_calls: HashSet::new(),
        })
    }
}

/// The open connection plus the task feeding its events.
/// Sends microphone audio on one session without going through the
/// orchestrator, so frames keep flowing while a tool call is in progress.
#[derive(Clone)]
pub struct AudioSender {
    session: Arc<dyn RealtimeSession>,
}

impl AudioSender {
    /// Fails with [`RealtimeError::NotConnected`] once the session is gone.
    pub async fn send(&self, chunk: &AudioChunk) -> Result<()> {
        if !self.session.is_connected() {
            return Err(RealtimeError::NotConnected);
        }
        self.session.send_audio(chunk).await
    }

    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }
}

impl std::fmt::Debug for AudioSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSender").field("session_id", &self.session.session_id()).finish()
    }
}

struct ActiveSession {
    session: Arc<dyn RealtimeSession>,
    signals: mpsc::UnboundedReceiver<Result<ServerEvent>>,
    pump: JoinHandle<()>,
}

/// Owns one realtime connection at a time and drains its events in order.
///
/// Methods take `&mut self`, so a drain can never be re-entered while it is
/// running; events that arrive mid-drain are appended to the queue and picked
/// up by the same drain.
///
/// # Example
///
/// ```rust,ignore
/// let mut orchestrator = SessionOrchestrator::builder()
///     .model(Arc::new(model))
///     .instruction(prompt::BARISTA_INSTRUCTION)
///     .tool(tools::submit_order_tool(), OrderToolHandler::simulated())
///     .build()?;
///
/// orchestrator.connect(&mut observer).await?;
/// loop {
///     orchestrator.process_next(&mut observer).await;
/// }
/// ```
pub struct SessionOrchestrator {
    model: BoxedModel,
    instruction: Option<String>,
    voice: Option<String>,
    declarations: Vec<ToolDefinition>,
    tools: HashMap<String, Arc<dyn ToolHandler>>,
    session: Option<ActiveSession>,
    resumption_handle: Option<String>,
    inbound: VecDeque<Result<ServerEvent>>,
    answered_calls: HashSet<String>,
}

impl SessionOrchestrator {
    /// Create a new builder.
    pub fn builder() -> SessionOrchestratorBuilder {
        SessionOrchestratorBuilder::new()
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(|active| active.session.is_connected())
    }

    /// Whether a session handle is held, even if the socket is winding down.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Get the session ID if connected.
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|active| active.session.session_id())
    }

    /// The stored resumption handle, if any.
    pub fn resumption_handle(&self) -> Option<&str> {
        self.resumption_handle.as_deref()
    }

    /// Events queued but not yet handled.
    pub fn pending_events(&self) -> usize {
        self.inbound.len()
    }

    /// Tool declarations sent at setup.
    pub fn declarations(&self) -> &[ToolDefinition] {
        &self.declarations
    }

    /// Session configuration for the next connection attempt.
    pub fn session_config(&self) -> RealtimeConfig {
        let mut builder = RealtimeConfig::builder()
            .input_transcription(true)
            .output_transcription(true)
            .context_compression(true)
            .resumption(self.resumption_handle.clone());
        if let Some(instruction) = &self.instruction {
            builder = builder.instruction(instruction.clone());
        }
        if let Some(voice) = &self.voice {
            builder = builder.voice(voice.clone());
        }
        for declaration in &self.declarations {
            builder = builder.tool(declaration.clone());
        }
        builder.build()
    }

    /// Connect to the realtime provider.
    ///
    /// A no-op while a session is held. On failure the observer hears about
    /// it, the resumption handle is cleared, and the error is returned.
    pub async fn connect(&mut self, observer: &mut dyn SessionObserver) -> Result<()> {
        if self.session.is_some() {
            tracing::warn!("connect() called while a session is active");
            return Ok(());
        }

        let resuming = self.resumption_handle.is_some();
        let span = session_span(self.model.model_id(), resuming);
        tracing::info!(
            parent: &span,
            provider = self.model.provider(),
            "Connecting realtime session"
        );

        match self.model.connect(self.session_config()).instrument(span.clone()).await {
            Ok(session) => {
                let session: Arc<dyn RealtimeSession> = Arc::from(session);
                self.inbound.clear();
                let (tx, signals) = mpsc::unbounded_channel();
                let pump = tokio::spawn(pump_events(session.clone(), tx));
                record_session_id(&span, session.session_id());
                metrics().record_session_open(resuming);
                tracing::info!(parent: &span, "Realtime session open");
                self.session = Some(ActiveSession { session, signals, pump });
                observer.on_open();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(parent: &span, error = %e, "Realtime connect failed");
                observer.on_error(&e);
                self.resumption_handle = None;
                Err(e)
            }
        }
    }

    /// Forward one microphone chunk.
    ///
    /// Without a session the observer receives [`RealtimeError::NotConnected`].
    pub async fn send_audio_data(
        &mut self,
        chunk: &AudioChunk,
        observer: &mut dyn SessionObserver,
    ) {
        let Some(active) = &self.session else {
            observer.on_error(&RealtimeError::NotConnected);
            return;
        };
        if let Err(e) = active.session.send_audio(chunk).await {
            tracing::warn!(error = %e, "Failed to send audio");
            observer.on_error(&e);
        }
    }

    /// A handle that sends microphone audio on the current session from
    /// another task. `None` without a session.
    pub fn audio_sender(&self) -> Option<AudioSender> {
        self.session.as_ref().map(|active| AudioSender { session: active.session.clone() })
    }

    /// Signal the end of the user's utterance. No-op without a session.
    pub async fn send_audio_stream_end(&mut self) -> Result<()> {
        match &self.session {
            Some(active) => active.session.send_audio_stream_end().await,
            None => Ok(()),
        }
    }

    /// Close the session and forget the resumption handle.
    ///
    /// Safe from any state. `on_close` fires only if a session was held.
    pub async fn close(&mut self, observer: &mut dyn SessionObserver) {
        self.inbound.clear();
        self.resumption_handle = None;
        self.answered_calls.clear();

        let Some(active) = self.session.take() else {
            return;
        };
        active.pump.abort();
        if let Err(e) = active.session.close().await {
            tracing::debug!(error = %e, "Close handshake failed");
        }
        tracing::info!(session_id = active.session.session_id(), "Realtime session closed");
        metrics().record_close(NORMAL_CLOSURE);
        observer.on_close(NORMAL_CLOSURE, "");
    }

    /// Wait for the next inbound signal.
    ///
    /// Pending forever while no session is held, which makes it usable as a
    /// `tokio::select!` branch. `None` means the event pump has stopped.
    pub async fn next_signal(&mut self) -> Option<Result<ServerEvent>> {
        match self.session.as_mut() {
            Some(active) => active.signals.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Queue a signal from [`next_signal`](Self::next_signal) and drain.
    pub async fn dispatch(
        &mut self,
        signal: Option<Result<ServerEvent>>,
        observer: &mut dyn SessionObserver,
    ) {
        match signal {
            Some(item) => {
                self.enqueue(item);
                self.drain(observer).await;
            }
            None => {
                // The pump ends after a close, so a handle still held here
                // means the stream dried up without one.
                if self.session.is_some() {
                    self.drain(observer).await;
                    self.release_remote(ABNORMAL_CLOSURE, "", observer);
                }
            }
        }
    }

    /// Wait for the next signal and handle it.
    pub async fn process_next(&mut self, observer: &mut dyn SessionObserver) {
        let signal = self.next_signal().await;
        self.dispatch(signal, observer).await;
    }

    fn enqueue(&mut self, item: Result<ServerEvent>) {
        if let Ok(event) = &item {
            if let Some(handle) = event.usable_resumption_handle() {
                tracing::debug!("Stored resumption handle");
                self.resumption_handle = Some(handle.to_string());
            }
        }
        self.inbound.push_back(item);
    }

    /// Pull in whatever the pump has already delivered.
    fn absorb_ready(&mut self) {
        let mut ready = Vec::new();
        if let Some(active) = self.session.as_mut() {
            while let Ok(item) = active.signals.try_recv() {
                ready.push(item);
            }
        }
        for item in ready {
            self.enqueue(item);
        }
    }

    async fn drain(&mut self, observer: &mut dyn SessionObserver) {
        while let Some(item) = self.inbound.pop_front() {
            match item {
                Ok(event) => self.handle_event(event, observer).await,
                Err(e) => {
                    tracing::warn!(error = %e, "Inbound stream error");
                    observer.on_error(&e);
                }
            }
            tokio::task::yield_now().await;
            self.absorb_ready();
        }
    }

    async fn handle_event(&mut self, event: ServerEvent, observer: &mut dyn SessionObserver) {
        tracing::trace!(kind = event.kind(), "Handling server event");
        match event {
            ServerEvent::SetupComplete | ServerEvent::ResumptionUpdate { .. } => {}
            ServerEvent::InputTranscription { text } => observer.on_input_transcription(&text),
            ServerEvent::OutputTranscription { text } => observer.on_output_transcription(&text),
            ServerEvent::Interrupted => observer.on_interrupted(self.is_connected()),
            ServerEvent::AudioDelta { delta } => observer.on_audio(AudioChunk::pcm16_24khz(delta)),
            ServerEvent::GenerationComplete => tracing::debug!("Generation complete"),
            ServerEvent::TurnComplete => observer.on_turn_complete(self.is_connected()),
            ServerEvent::ToolCall { calls } => self.handle_tool_calls(calls, observer).await,
            ServerEvent::ToolCallCancellation { ids } => {
                tracing::info!(?ids, "Server cancelled tool calls");
            }
            ServerEvent::GoAway { time_left } => {
                tracing::warn!(?time_left, "Server will close the session soon");
            }
            ServerEvent::Closed { code, reason } => self.release_remote(code, &reason, observer),
            ServerEvent::Unknown => tracing::trace!("Ignoring unrecognized server message"),
        }
    }

    /// Run every new call in order, answer them in one batch, then finish
    /// the turn.
    async fn handle_tool_calls(
        &mut self,
        calls: Vec<ToolCall>,
        observer: &mut dyn SessionObserver,
    ) {
        let span = turn_span(calls.len());
        let mut responses = Vec::with_capacity(calls.len());
        for call in calls {
            if !self.answered_calls.insert(call.call_id.clone()) {
                tracing::warn!(
                    parent: &span,
                    call_id = %call.call_id,
                    name = %call.name,
                    "Skipping duplicate tool call"
                );
                continue;
            }
            observer.on_tool_call(&call);
            let response = self.execute_tool(&call).instrument(span.clone()).await;
            metrics().record_tool_call(&call.name, response.output.status.as_str());
            observer.on_tool_response(&response);
            responses.push(response);
        }

        if !responses.is_empty() {
            match &self.session {
                Some(active) => {
                    if let Err(e) = active.session.send_tool_responses(responses).await {
                        tracing::warn!(error = %e, "Failed to send tool responses");
                        observer.on_error(&e);
                    }
                }
                None => tracing::warn!(
                    count = responses.len(),
                    "Session closed before tool responses could be sent"
                ),
            }
        }

        observer.on_tool_calls_completed();
        observer.on_turn_complete(self.is_connected());
    }

    async fn execute_tool(&self, call: &ToolCall) -> ToolResponse {
        let Some(handler) = self.tools.get(&call.name).cloned() else {
            tracing::warn!(name = %call.name, "Unknown function called");
            return ToolResponse::failure(call, format!("Unknown function: {}", call.name));
        };

        let span = tool_execute_span(&call.name, &call.call_id);
        let outcome = AssertUnwindSafe(handler.execute(call)).catch_unwind().instrument(span).await;
        match outcome {
            Ok(Ok(output)) => ToolResponse::new(call, output),
            Ok(Err(e)) => {
                tracing::warn!(name = %call.name, error = %e, "Tool failed");
                ToolResponse::failure(
                    call,
                    format!("Error processing your request for {}: {}", call.name, e),
                )
            }
            Err(_) => {
                tracing::error!(name = %call.name, "Tool panicked");
                let message = format!("Error processing your request for {}", call.name);
                ToolResponse::failure(call, message)
            }
        }
    }

    /// The server hung up. The handle is kept for the next connect.
    fn release_remote(&mut self, code: u16, reason: &str, observer: &mut dyn SessionObserver) {
        if let Some(active) = self.session.take() {
            active.pump.abort();
            tracing::info!(
                session_id = active.session.session_id(),
                code,
                reason,
                "Realtime session closed remotely"
            );
        }
        metrics().record_close(code);
        observer.on_close(code, reason);
    }
}

impl Drop for SessionOrchestrator {
    fn drop(&mut self) {
        if let Some(active) = self.session.take() {
            active.pump.abort();
        }
    }
}

async fn pump_events(
    session: Arc<dyn RealtimeSession>,
    tx: mpsc::UnboundedSender<Result<ServerEvent>>,
) {
    while let Some(item) = session.next_event().await {
        let closed = matches!(item, Ok(ServerEvent::Closed { .. }));
        if tx.send(item).is_err() || closed {
            break;
        }
    }
    tracing::debug!(session_id = session.session_id(), "Inbound pump finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ResponseStatus;
    use crate::model::RealtimeModel;
    use crate::session::BoxedSession;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl SessionObserver for Recorder {
        fn on_open(&mut self) {
            self.calls.push("open".into());
        }
        fn on_tool_call(&mut self, call: &ToolCall) {
            self.calls.push(format!("call:{}", call.call_id));
        }
        fn on_tool_response(&mut self, response: &ToolResponse) {
            self.calls.push(format!("response:{}:{:?}", response.call_id, response.output.status));
        }
        fn on_turn_complete(&mut self, _connected: bool) {
            self.calls.push("turn".into());
        }
        fn on_error(&mut self, error: &RealtimeError) {
            self.calls.push(format!("error:{}", error));
        }
        fn on_close(&mut self, code: u16, _reason: &str) {
            self.calls.push(format!("close:{}", code));
        }
    }

    struct StubSession {
        sent: Arc<Mutex<Vec<Vec<ToolResponse>>>>,
    }

    #[async_trait]
    impl RealtimeSession for StubSession {
        fn session_id(&self) -> &str {
            "stub"
        }
        fn is_connected(&self) -> bool {
            true
        }
        async fn send_audio(&self, _audio: &AudioChunk) -> Result<()> {
            Ok(())
        }
        async fn send_audio_stream_end(&self) -> Result<()> {
            Ok(())
        }
        async fn send_tool_responses(&self, responses: Vec<ToolResponse>) -> Result<()> {
            self.sent.lock().push(responses);
            Ok(())
        }
        async fn next_event(&self) -> Option<Result<ServerEvent>> {
            std::future::pending().await
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    struct StubModel {
        sent: Arc<Mutex<Vec<Vec<ToolResponse>>>>,
    }

    #[async_trait]
    impl RealtimeModel for StubModel {
        fn provider(&self) -> &str {
            "stub"
        }
        fn model_id(&self) -> &str {
            "stub"
        }
        async fn connect(&self, _config: RealtimeConfig) -> Result<BoxedSession> {
            Ok(Box::new(StubSession { sent: self.sent.clone() }))
        }
    }

    fn orchestrator(sent: Arc<Mutex<Vec<Vec<ToolResponse>>>>) -> SessionOrchestrator {
        SessionOrchestrator::builder()
            .model(Arc::new(StubModel { sent }))
            .tool_fn(ToolDefinition::new("ok"), |_| Ok(FunctionResponseData::success("done")))
            .tool_fn(ToolDefinition::new("fails"), |_| Err(RealtimeError::tool("boom")))
            .tool_fn(ToolDefinition::new("panics"), |_| panic!("handler bug"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_requires_model() {
        assert!(SessionOrchestrator::builder().build().is_err());
    }

    #[test]
    fn test_session_config_defaults() {
        let orchestrator = orchestrator(Arc::default());
        let config = orchestrator.session_config();
        assert!(config.input_transcription && config.output_transcription);
        assert!(config.context_compression && config.session_resumption);
        assert!(config.resumption_handle.is_none());
        assert_eq!(config.tools.len(), 3);
    }

    #[tokio::test]
    async fn test_tool_batch_never_partial() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut orchestrator = orchestrator(sent.clone());
        let mut observer = Recorder::default();
        orchestrator.connect(&mut observer).await.unwrap();

        let calls = vec![
            ToolCall::new("1", "ok", json!({})),
            ToolCall::new("2", "fails", json!({})),
            ToolCall::new("3", "panics", json!({})),
            ToolCall::new("4", "missing", json!({})),
        ];
        orchestrator.dispatch(Some(Ok(ServerEvent::ToolCall { calls })), &mut observer).await;

        let batches = sent.lock();
        assert_eq!(batches.len(), 1);
        let statuses: Vec<_> = batches[0].iter().map(|r| r.output.status).collect();
        assert_eq!(
            statuses,
            vec![
                ResponseStatus::Success,
                ResponseStatus::Failure,
                ResponseStatus::Failure,
                ResponseStatus::Failure
            ]
        );
        assert_eq!(batches[0][3].output.message.as_deref(), Some("Unknown function: missing"));
        assert_eq!(observer.calls.last().map(String::as_str), Some("turn"));
    }

    #[tokio::test]
    async fn test_duplicate_call_runs_once() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut orchestrator = orchestrator(sent.clone());
        let mut observer = Recorder::default();
        orchestrator.connect(&mut observer).await.unwrap();

        for _ in 0..2 {
            let calls = vec![ToolCall::new("same", "ok", json!({}))];
            orchestrator.dispatch(Some(Ok(ServerEvent::ToolCall { calls })), &mut observer).await;
        }

        assert_eq!(sent.lock().len(), 1);
        let executed = observer.calls.iter().filter(|c| c.as_str() == "call:same").count();
        assert_eq!(executed, 1);
    }

    #[tokio::test]
    async fn test_handle_stored_before_handling() {
        let mut orchestrator = orchestrator(Arc::default());
        let mut observer = Recorder::default();
        orchestrator.connect(&mut observer).await.unwrap();

        let update = ServerEvent::ResumptionUpdate { handle: Some("h-1".into()), resumable: true };
        orchestrator.enqueue(Ok(update));
        assert_eq!(orchestrator.resumption_handle(), Some("h-1"));

        let unusable =
            ServerEvent::ResumptionUpdate { handle: Some("h-2".into()), resumable: false };
        orchestrator.dispatch(Some(Ok(unusable)), &mut observer).await;
        assert_eq!(orchestrator.resumption_handle(), Some("h-1"));
        assert_eq!(orchestrator.pending_events(), 0);
    }

    #[tokio::test]
    async fn test_remote_close_keeps_handle() {
        let mut orchestrator = orchestrator(Arc::default());
        let mut observer = Recorder::default();
        orchestrator.connect(&mut observer).await.unwrap();
        orchestrator.enqueue(Ok(ServerEvent::ResumptionUpdate {
            handle: Some("h-1".into()),
            resumable: true,
        }));

        let closed = ServerEvent::Closed { code: 1011, reason: "overloaded".into() };
        orchestrator.dispatch(Some(Ok(closed)), &mut observer).await;

        assert!(!orchestrator.has_session());
        assert_eq!(orchestrator.resumption_handle(), Some("h-1"));
        assert_eq!(orchestrator.session_config().resumption_handle.as_deref(), Some("h-1"));
        assert_eq!(observer.calls.last().map(String::as_str), Some("close:1011"));
    }

    #[tokio::test]
    async fn test_send_without_session_reports_not_connected() {
        let mut orchestrator = orchestrator(Arc::default());
        let mut observer = Recorder::default();
        orchestrator.send_audio_data(&AudioChunk::pcm16_16khz(vec![0u8; 4]), &mut observer).await;
        assert_eq!(observer.calls, vec![format!("error:{}", RealtimeError::NotConnected)]);
        assert!(orchestrator.send_audio_stream_end().await.is_ok());
    }
}
