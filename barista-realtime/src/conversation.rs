//! Conversation state machine and its driver.
//!
//! [`ConversationState`] holds everything the user sees: the status, the
//! message list, the provisional transcript. It reacts to the orchestrator
//! through [`SessionObserver`]. [`ConversationController`] owns the state,
//! the orchestrator, and the microphone, and is the single task that mutates
//! any of them. Microphone frames leave through a separate sender task so a
//! slow tool call never holds them back.

use crate::audio::AudioChunk;
use crate::capture::{AudioInput, CaptureController, FrameSink, ReadinessGate};
use crate::error::RealtimeError;
use crate::events::{ToolCall, ToolResponse};
use crate::orchestrator::{AudioSender, SessionObserver, SessionOrchestrator};
use crate::playback::{AudioOutput, PlaybackController};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Frames that may wait for the sender. A new frame is dropped while full.
const FRAME_SLOTS: usize = 1;

/// Where the conversation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    #[default]
    Idle,
    Connecting,
    Listening,
    Processing,
    Speaking,
    Error,
}

impl ConversationStatus {
    /// Label shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Connecting => "Connecting...",
            Self::Listening => "Listening...",
            Self::Processing => "AI is thinking...",
            Self::Speaking => "AI is speaking...",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
    System,
}

/// One line of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: Sender,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Sealed messages never change again.
    pub sealed: bool,
    /// Amplitude summary of the utterance, for AI messages with audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waveform: Option<Vec<f32>>,
}

impl ChatMessage {
    fn new(sender: Sender, text: impl Into<String>, sealed: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            text: text.into(),
            created_at: Utc::now(),
            sealed,
            waveform: None,
        }
    }
}

/// Changes pushed to a front end.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationUpdate {
    Status(ConversationStatus),
    MessageAdded(ChatMessage),
    MessageUpdated(ChatMessage),
    Transcript(String),
    Cleared,
    Muted(bool),
}

/// User intents fed to [`ConversationController::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationCommand {
    ToggleRecording,
    ToggleMute,
    Quit,
}

/// Work that needs the controller and cannot run inside a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    StopCapture,
    Teardown,
}

/// Displayed conversation plus speech playback.
pub struct ConversationState {
    status: ConversationStatus,
    messages: Vec<ChatMessage>,
    pending_transcript: String,
    in_flight: Option<Uuid>,
    playback: PlaybackController,
    gate: ReadinessGate,
    deferred: Vec<Deferred>,
    updates: Option<mpsc::UnboundedSender<ConversationUpdate>>,
}

impl ConversationState {
    pub fn new(playback: PlaybackController, gate: ReadinessGate) -> Self {
        Self {
            status: ConversationStatus::Idle,
            messages: Vec::new(),
            pending_transcript: String::new(),
            in_flight: None,
            playback,
            gate,
            deferred: Vec::new(),
            updates: None,
        }
    }

    /// Publish every change to `tx`.
    pub fn with_updates(mut self, tx: mpsc::UnboundedSender<ConversationUpdate>) -> Self {
        self.updates = Some(tx);
        self
    }

    pub fn status(&self) -> ConversationStatus {
        self.status
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn pending_transcript(&self) -> &str {
        &self.pending_transcript
    }

    /// Id of the AI message still receiving transcript fragments.
    pub fn in_flight(&self) -> Option<Uuid> {
        self.in_flight
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn is_muted(&self) -> bool {
        self.playback.is_muted()
    }

    /// The provisional trailing user line, while the user is speaking.
    pub fn provisional_line(&self) -> Option<String> {
        if self.pending_transcript.is_empty() {
            None
        } else {
            Some(format!("{}... (recording)", self.pending_transcript))
        }
    }

    pub fn toggle_mute(&mut self) -> bool {
        let muted = !self.playback.is_muted();
        self.playback.set_muted(muted);
        tracing::debug!(muted, "Output mute toggled");
        self.emit(ConversationUpdate::Muted(muted));
        muted
    }

    /// Rendering of the last utterance ended on its own.
    pub fn on_playback_finished(&mut self, connected: bool) {
        if self.status == ConversationStatus::Speaking {
            if connected {
                self.set_status(ConversationStatus::Listening);
            } else {
                self.set_status(ConversationStatus::Idle);
            }
        }
    }

    fn set_status(&mut self, status: ConversationStatus) {
        if self.status == status {
            return;
        }
        tracing::debug!(from = ?self.status, to = ?status, "Conversation status change");
        self.status = status;
        self.emit(ConversationUpdate::Status(status));
    }

    fn push_message(&mut self, message: ChatMessage) -> Uuid {
        let id = message.id;
        self.emit(ConversationUpdate::MessageAdded(message.clone()));
        self.messages.push(message);
        id
    }

    fn system_message(&mut self, text: impl Into<String>) {
        self.push_message(ChatMessage::new(Sender::System, text, true));
    }

    fn update_message(&mut self, id: Uuid, update: impl FnOnce(&mut ChatMessage)) {
        let Some(message) = self.messages.iter_mut().find(|m| m.id == id) else {
            return;
        };
        if message.sealed {
            tracing::warn!(%id, "Ignoring update to a sealed message");
            return;
        }
        update(message);
        let snapshot = message.clone();
        self.emit(ConversationUpdate::MessageUpdated(snapshot));
    }

    /// Seal the in-flight AI message, if any, and forget it.
    fn seal_in_flight(&mut self) {
        if let Some(id) = self.in_flight.take() {
            self.update_message(id, |message| message.sealed = true);
        }
    }

    /// Turn the provisional transcript into a user message.
    fn promote_transcript(&mut self) {
        if self.pending_transcript.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.pending_transcript);
        self.push_message(ChatMessage::new(Sender::User, text, true));
        self.emit(ConversationUpdate::Transcript(String::new()));
    }

    fn reset(&mut self) {
        self.messages.clear();
        self.pending_transcript.clear();
        self.in_flight = None;
        self.deferred.clear();
        self.emit(ConversationUpdate::Cleared);
    }

    fn microphone_error(&mut self, error: &RealtimeError) {
        self.system_message(format!("Microphone error: {}", error));
        self.set_status(ConversationStatus::Error);
    }

    fn defer(&mut self, action: Deferred) {
        if !self.deferred.contains(&action) {
            self.deferred.push(action);
        }
    }

    fn emit(&self, update: ConversationUpdate) {
        if let Some(tx) = &self.updates {
            let _ = tx.send(update);
        }
    }
}

impl SessionObserver for ConversationState {
    fn on_open(&mut self) {
        self.gate.open();
        self.set_status(ConversationStatus::Listening);
        self.system_message("Conversation started. Arum is listening.");
    }

    fn on_input_transcription(&mut self, text: &str) {
        self.pending_transcript = text.to_string();
        self.emit(ConversationUpdate::Transcript(self.pending_transcript.clone()));
    }

    fn on_output_transcription(&mut self, text: &str) {
        match self.in_flight {
            Some(id) => self.update_message(id, |message| message.text.push_str(text)),
            None => {
                let id = self.push_message(ChatMessage::new(Sender::Ai, text, false));
                self.in_flight = Some(id);
            }
        }
    }

    fn on_audio(&mut self, chunk: AudioChunk) {
        self.playback.enqueue(chunk);
    }

    fn on_interrupted(&mut self, connected: bool) {
        tracing::debug!("Assistant interrupted");
        self.playback.stop();
        if connected && self.status != ConversationStatus::Error {
            self.set_status(ConversationStatus::Listening);
        }
        self.seal_in_flight();
    }

    fn on_turn_complete(&mut self, connected: bool) {
        match self.playback.drain_and_play() {
            Ok(Some(summary)) => {
                self.set_status(ConversationStatus::Speaking);
                if let Some(id) = self.in_flight {
                    self.update_message(id, |message| message.waveform = Some(summary));
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Playback failed");
                self.system_message(format!("Playback error: {}", e));
            }
        }
        self.seal_in_flight();

        let busy = matches!(
            self.status,
            ConversationStatus::Processing | ConversationStatus::Error
        );
        if connected && !self.playback.is_playing() && !busy {
            self.set_status(ConversationStatus::Listening);
        }
        self.promote_transcript();
    }

    fn on_tool_call(&mut self, call: &ToolCall) {
        self.set_status(ConversationStatus::Processing);
        let details = call
            .arguments
            .as_ref()
            .map(|arguments| arguments.to_string())
            .unwrap_or_else(|| "{}".to_string());
        self.system_message(format!(
            "Arum is calling function {} with details: {}",
            call.name, details
        ));
    }

    fn on_tool_response(&mut self, response: &ToolResponse) {
        self.system_message(format!(
            "Function {} responded: {}",
            response.name,
            response.summary()
        ));
    }

    fn on_tool_calls_completed(&mut self) {
        if self.status == ConversationStatus::Processing {
            self.set_status(ConversationStatus::Listening);
        }
    }

    fn on_error(&mut self, error: &RealtimeError) {
        tracing::error!(error = %error, "Conversation error");
        self.set_status(ConversationStatus::Error);
        if error.is_resumption_rejected() {
            self.system_message(
                "Error: The previous session is invalid or has expired. Starting a new session.",
            );
        } else {
            self.system_message(format!(
                "Error: {}. Please check the logs or your API key settings.",
                error
            ));
        }
        self.defer(Deferred::Teardown);
    }

    fn on_close(&mut self, code: u16, reason: &str) {
        tracing::info!(code, reason, "Conversation session closed");
        let errored = self.status == ConversationStatus::Error;
        if !errored {
            self.set_status(ConversationStatus::Idle);
        }
        match code {
            1000 | 1005 => self.system_message("Conversation ended."),
            1001 | 1002 | 1006 => {}
            _ if !errored => self.system_message(format!(
                "Connection lost (code {}). You may be able to try again to resume.",
                code
            )),
            _ => {}
        }
        self.seal_in_flight();
        self.gate.close();
        self.defer(Deferred::StopCapture);
    }
}

/// What woke the controller.
enum Wake {
    Signal(Option<crate::error::Result<crate::events::ServerEvent>>),
    AudioFailed(RealtimeError),
    PlaybackFinished,
    Command(Option<ConversationCommand>),
}

/// Top-level coordinator: one task owns the session, the microphone, and the
/// displayed conversation.
pub struct ConversationController {
    orchestrator: SessionOrchestrator,
    capture: CaptureController,
    forwarder: Option<JoinHandle<()>>,
    audio_errors_tx: mpsc::UnboundedSender<RealtimeError>,
    audio_errors: mpsc::UnboundedReceiver<RealtimeError>,
    state: ConversationState,
}

impl ConversationController {
    pub fn new(
        orchestrator: SessionOrchestrator,
        input: Arc<dyn AudioInput>,
        output: Arc<dyn AudioOutput>,
    ) -> Self {
        let gate = ReadinessGate::new();
        let (audio_errors_tx, audio_errors) = mpsc::unbounded_channel();
        Self {
            orchestrator,
            capture: CaptureController::new(input, gate.clone()),
            forwarder: None,
            audio_errors_tx,
            audio_errors,
            state: ConversationState::new(PlaybackController::new(output), gate),
        }
    }

    /// Publish conversation changes on a channel.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ConversationUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.updates = Some(tx);
        rx
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn orchestrator(&self) -> &SessionOrchestrator {
        &self.orchestrator
    }

    /// Whether the microphone is held.
    pub fn is_recording(&self) -> bool {
        self.capture.is_active()
    }

    /// Start a conversation, or end the current one.
    pub async fn toggle_recording(&mut self) {
        if self.capture.is_active() {
            self.stop_recording().await;
        } else {
            self.start().await;
        }
        self.run_deferred().await;
    }

    /// Flip audible output. Returns the new mute state.
    pub fn toggle_mute(&mut self) -> bool {
        self.state.toggle_mute()
    }

    /// Wait for one inbound event, audio send failure, or playback
    /// completion, and handle it.
    pub async fn step(&mut self) {
        let wake = self.wait(None).await;
        self.handle(wake).await;
    }

    /// Drive the conversation until `Quit` or the command channel closes.
    pub async fn run(&mut self, mut commands: mpsc::UnboundedReceiver<ConversationCommand>) {
        loop {
            match self.wait(Some(&mut commands)).await {
                Wake::Command(Some(ConversationCommand::ToggleRecording)) => {
                    self.toggle_recording().await;
                }
                Wake::Command(Some(ConversationCommand::ToggleMute)) => {
                    self.toggle_mute();
                }
                Wake::Command(Some(ConversationCommand::Quit) | None) => break,
                wake => self.handle(wake).await,
            }
        }
        self.teardown().await;
    }

    async fn wait(
        &mut self,
        commands: Option<&mut mpsc::UnboundedReceiver<ConversationCommand>>,
    ) -> Wake {
        let next_command = async move {
            match commands {
                Some(rx) => rx.recv().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            command = next_command => Wake::Command(command),
            signal = self.orchestrator.next_signal() => Wake::Signal(signal),
            Some(error) = self.audio_errors.recv() => Wake::AudioFailed(error),
            _ = self.state.playback.wait_finished() => Wake::PlaybackFinished,
        }
    }

    async fn handle(&mut self, wake: Wake) {
        match wake {
            Wake::Signal(signal) => self.orchestrator.dispatch(signal, &mut self.state).await,
            Wake::AudioFailed(error) => {
                if self.orchestrator.has_session() && self.state.gate.is_open() {
                    self.state.on_error(&error);
                } else {
                    tracing::debug!(error = %error, "Ignoring audio failure after close");
                }
            }
            Wake::PlaybackFinished => {
                let connected = self.orchestrator.is_connected();
                self.state.on_playback_finished(connected);
            }
            Wake::Command(_) => {}
        }
        self.run_deferred().await;
    }

    async fn start(&mut self) {
        self.state.reset();
        self.state.set_status(ConversationStatus::Connecting);

        if let Err(e) = self.orchestrator.connect(&mut self.state).await {
            tracing::warn!(error = %e, "Failed to start the conversation");
            self.state.set_status(ConversationStatus::Error);
            self.state.system_message("Failed to start the conversation. Please try again.");
            self.teardown().await;
            return;
        }

        if self.state.status() != ConversationStatus::Listening {
            tracing::debug!(status = ?self.state.status(), "Not starting capture");
            return;
        }

        let Some(sender) = self.orchestrator.audio_sender() else {
            return;
        };
        let (frames_tx, frames) = mpsc::channel(FRAME_SLOTS);
        self.forwarder = Some(tokio::spawn(forward_frames(
            sender,
            frames,
            self.state.gate.clone(),
            self.audio_errors_tx.clone(),
        )));
        let sink: FrameSink = Box::new(move |chunk| {
            if let Err(mpsc::error::TrySendError::Full(_)) = frames_tx.try_send(chunk) {
                tracing::trace!("Audio sender busy, dropping microphone frame");
            }
        });
        if let Err(e) = self.capture.start(sink).await {
            self.state.microphone_error(&e);
            self.teardown().await;
        }
    }

    async fn stop_recording(&mut self) {
        self.stop_capture();
        let status = self.state.status();
        let ending_turn = self.orchestrator.is_connected()
            && !matches!(status, ConversationStatus::Connecting | ConversationStatus::Error);
        if ending_turn {
            if let Err(e) = self.orchestrator.send_audio_stream_end().await {
                tracing::debug!(error = %e, "Failed to send audio stream end");
            }
            self.state.promote_transcript();
        }
        self.teardown().await;
    }

    /// Release everything. Keeps an `Error` status visible.
    async fn teardown(&mut self) {
        self.stop_capture();
        self.state.gate.close();
        self.orchestrator.close(&mut self.state).await;
        self.state.playback.stop();
        self.state.seal_in_flight();
        if self.state.status() != ConversationStatus::Error {
            self.state.set_status(ConversationStatus::Idle);
        }
        while self.audio_errors.try_recv().is_ok() {}
        self.state.deferred.clear();
    }

    fn stop_capture(&mut self) {
        self.capture.stop();
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }

    async fn run_deferred(&mut self) {
        while !self.state.deferred.is_empty() {
            let actions = std::mem::take(&mut self.state.deferred);
            if actions.contains(&Deferred::Teardown) {
                self.teardown().await;
            } else if actions.contains(&Deferred::StopCapture) {
                self.stop_capture();
            }
        }
    }
}

/// Send microphone frames until capture drops its end of the channel or a
/// send fails. Only the first failure is reported.
async fn forward_frames(
    sender: AudioSender,
    mut frames: mpsc::Receiver<AudioChunk>,
    gate: ReadinessGate,
    errors: mpsc::UnboundedSender<RealtimeError>,
) {
    while let Some(frame) = frames.recv().await {
        if !gate.is_open() {
            tracing::trace!("Dropping microphone frame while the session is not ready");
            continue;
        }
        if let Err(e) = sender.send(&frame).await {
            tracing::warn!(session_id = sender.session_id(), error = %e, "Failed to send audio");
            let _ = errors.send(e);
            break;
        }
    }
}

impl fmt::Debug for ConversationController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationController")
            .field("status", &self.state.status)
            .field("recording", &self.capture.is_active())
            .field("session_id", &self.orchestrator.session_id())
            .finish()
    }
}
