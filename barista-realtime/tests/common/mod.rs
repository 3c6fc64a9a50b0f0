//! Scripted doubles for the transport and the audio devices.

#![allow(dead_code)]

use async_trait::async_trait;
use barista_realtime::capture::SampleCallback;
use barista_realtime::playback::RenderControl;
use barista_realtime::{
    AudioChunk, AudioInput, AudioOutput, BoxedSession, InputStream, RealtimeConfig, RealtimeError,
    RealtimeModel, RealtimeSession, Result, ServerEvent, ToolResponse,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Something the client sent to the mock server.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Audio(AudioChunk),
    StreamEnd,
    ToolResponses(Vec<ToolResponse>),
    Close,
}

type Feed = mpsc::UnboundedSender<Result<ServerEvent>>;

/// How the next `connect` should behave.
pub enum ConnectOutcome {
    Accept,
    Fail(String),
    RejectResumption,
}

/// A model whose sessions are driven by the test.
#[derive(Clone, Default)]
pub struct MockModel {
    inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    outcomes: Mutex<VecDeque<ConnectOutcome>>,
    configs: Mutex<Vec<RealtimeConfig>>,
    sent: Arc<Mutex<Vec<Sent>>>,
    feed: Mutex<Option<Feed>>,
    connected: Mutex<Option<Arc<AtomicBool>>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the behaviour of a future `connect`. Unqueued connects succeed.
    pub fn push_outcome(&self, outcome: ConnectOutcome) {
        self.inner.outcomes.lock().push_back(outcome);
    }

    /// Deliver an event on the latest session.
    pub fn emit(&self, event: ServerEvent) {
        if let Some(feed) = self.inner.feed.lock().as_ref() {
            let _ = feed.send(Ok(event));
        }
    }

    /// Deliver a transport error on the latest session.
    pub fn emit_error(&self, error: RealtimeError) {
        if let Some(feed) = self.inner.feed.lock().as_ref() {
            let _ = feed.send(Err(error));
        }
    }

    /// Simulate the server hanging up.
    pub fn hang_up(&self, code: u16, reason: &str) {
        if let Some(connected) = self.inner.connected.lock().as_ref() {
            connected.store(false, Ordering::SeqCst);
        }
        self.emit(ServerEvent::Closed { code, reason: reason.to_string() });
    }

    pub fn configs(&self) -> Vec<RealtimeConfig> {
        self.inner.configs.lock().clone()
    }

    pub fn connects(&self) -> usize {
        self.inner.configs.lock().len()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.inner.sent.lock().clone()
    }

    pub fn tool_batches(&self) -> Vec<Vec<ToolResponse>> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::ToolResponses(batch) => Some(batch),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl RealtimeModel for MockModel {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model_id(&self) -> &str {
        "mock-live"
    }

    async fn connect(&self, config: RealtimeConfig) -> Result<BoxedSession> {
        let resuming = config.resumption_handle.is_some();
        self.inner.configs.lock().push(config);

        let outcome = self.inner.outcomes.lock().pop_front().unwrap_or(ConnectOutcome::Accept);
        match outcome {
            ConnectOutcome::Accept => {}
            ConnectOutcome::Fail(message) => return Err(RealtimeError::connection(message)),
            ConnectOutcome::RejectResumption if resuming => {
                return Err(RealtimeError::resumption_rejected("session not found"));
            }
            ConnectOutcome::RejectResumption => {}
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        *self.inner.feed.lock() = Some(tx);
        *self.inner.connected.lock() = Some(connected.clone());

        Ok(Box::new(MockSession {
            connected,
            events: tokio::sync::Mutex::new(rx),
            sent: self.inner.sent.clone(),
        }))
    }
}

pub struct MockSession {
    connected: Arc<AtomicBool>,
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<ServerEvent>>>,
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl MockSession {
    fn record(&self, sent: Sent) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(RealtimeError::NotConnected);
        }
        self.sent.lock().push(sent);
        Ok(())
    }
}

#[async_trait]
impl RealtimeSession for MockSession {
    fn session_id(&self) -> &str {
        "mock-session"
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_audio(&self, audio: &AudioChunk) -> Result<()> {
        self.record(Sent::Audio(audio.clone()))
    }

    async fn send_audio_stream_end(&self) -> Result<()> {
        self.record(Sent::StreamEnd)
    }

    async fn send_tool_responses(&self, responses: Vec<ToolResponse>) -> Result<()> {
        self.record(Sent::ToolResponses(responses))
    }

    async fn next_event(&self) -> Option<Result<ServerEvent>> {
        self.events.lock().await.recv().await
    }

    async fn close(&self) -> Result<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.sent.lock().push(Sent::Close);
        }
        Ok(())
    }
}

type SharedCallback = Arc<Mutex<Option<SampleCallback>>>;

/// A microphone the test feeds by hand.
#[derive(Clone, Default)]
pub struct MockInput {
    callback: SharedCallback,
    opens: Arc<Mutex<usize>>,
    fail: Arc<AtomicBool>,
}

impl MockInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next opens fail as if permission was denied.
    pub fn deny(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        *self.opens.lock()
    }

    pub fn is_open(&self) -> bool {
        self.callback.lock().is_some()
    }

    /// Push samples at 16 kHz through the open stream.
    pub fn speak(&self, samples: &[f32]) {
        if let Some(callback) = self.callback.lock().as_mut() {
            callback(samples, 16_000);
        }
    }
}

struct MockInputStream {
    callback: SharedCallback,
}

impl InputStream for MockInputStream {
    fn sample_rate(&self) -> u32 {
        16_000
    }

    fn close(&mut self) {
        self.callback.lock().take();
    }
}

#[async_trait]
impl AudioInput for MockInput {
    async fn open(&self, on_samples: SampleCallback) -> Result<Box<dyn InputStream>> {
        *self.opens.lock() += 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(RealtimeError::device("permission denied"));
        }
        *self.callback.lock() = Some(on_samples);
        Ok(Box::new(MockInputStream { callback: self.callback.clone() }))
    }
}

/// A speaker that records renderings and lets the test end them.
#[derive(Clone, Default)]
pub struct MockOutput {
    renders: Arc<Mutex<Vec<(usize, RenderControl)>>>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render_count(&self) -> usize {
        self.renders.lock().len()
    }

    pub fn last_control(&self) -> Option<RenderControl> {
        self.renders.lock().last().map(|(_, control)| control.clone())
    }

    /// Finish the latest rendering as if every sample had played.
    pub fn finish_last(&self) {
        if let Some(control) = self.last_control() {
            control.finish();
        }
    }
}

impl AudioOutput for MockOutput {
    fn render(&self, samples: Vec<f32>, _sample_rate: u32, control: RenderControl) -> Result<()> {
        self.renders.lock().push((samples.len(), control));
        Ok(())
    }
}

/// 24 kHz speech with a recognisable non-zero amplitude.
pub fn speech(samples: usize) -> bytes::Bytes {
    let mut data = Vec::with_capacity(samples * 2);
    for i in 0..samples {
        let value: i16 = if i % 2 == 0 { 8000 } else { -8000 };
        data.extend_from_slice(&value.to_le_bytes());
    }
    data.into()
}
