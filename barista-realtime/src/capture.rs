//! Microphone capture lifecycle.
//!
//! [`CaptureController`] owns one [`AudioInput`] and turns its float frames
//! into 16 kHz PCM16 chunks handed to a caller-supplied sink. A
//! [`ReadinessGate`] can hold delivery back while keeping the device warm.

use crate::audio::AudioChunk;
use crate::codec;
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Receives mono device frames and the device sample rate.
pub type SampleCallback = Box<dyn FnMut(&[f32], u32) + Send + 'static>;

/// Receives each encoded frame as soon as it is produced.
pub type FrameSink = Box<dyn FnMut(AudioChunk) + Send + 'static>;

/// Observes capture state transitions.
pub type CaptureListener = Box<dyn Fn(CaptureState) + Send + Sync + 'static>;

/// A source of microphone audio.
#[async_trait]
pub trait AudioInput: Send + Sync {
    /// Acquire the device and start calling `on_samples` with mono frames.
    ///
    /// Fails with [`RealtimeError::DeviceError`](crate::RealtimeError::DeviceError)
    /// when the device is missing or access is denied.
    async fn open(&self, on_samples: SampleCallback) -> Result<Box<dyn InputStream>>;
}

/// An open capture stream. Dropping it releases the device.
pub trait InputStream: Send {
    /// Native rate of the frames passed to the callback.
    fn sample_rate(&self) -> u32;

    /// Release the device. Safe to call more than once.
    fn close(&mut self);
}

/// Capture lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No device held.
    Stopped,
    /// Waiting for device access.
    Requesting,
    /// Frames are flowing.
    Active,
    /// Releasing the device.
    Stopping,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Requesting => write!(f, "requesting"),
            Self::Active => write!(f, "active"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

/// Shared switch that suppresses frame delivery without stopping capture.
#[derive(Debug, Clone, Default)]
pub struct ReadinessGate(Arc<AtomicBool>);

impl ReadinessGate {
    /// A closed gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Let frames through.
    pub fn open(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Hold frames back.
    pub fn close(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Whether frames are delivered.
    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Owns the microphone lifecycle.
pub struct CaptureController {
    input: Arc<dyn AudioInput>,
    gate: ReadinessGate,
    state: CaptureState,
    stream: Option<Box<dyn InputStream>>,
    delivering: Arc<AtomicBool>,
    listener: Option<CaptureListener>,
}

impl CaptureController {
    /// Create a stopped controller over `input`, gated by `gate`.
    pub fn new(input: Arc<dyn AudioInput>, gate: ReadinessGate) -> Self {
        Self {
            input,
            gate,
            state: CaptureState::Stopped,
            stream: None,
            delivering: Arc::new(AtomicBool::new(false)),
            listener: None,
        }
    }

    /// Report every state transition to `listener`.
    pub fn with_listener(mut self, listener: CaptureListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Current state.
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Whether the device is held or being acquired.
    pub fn is_active(&self) -> bool {
        matches!(self.state, CaptureState::Active | CaptureState::Requesting)
    }

    /// The gate shared with this controller.
    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    /// Acquire the device and deliver encoded frames to `sink`.
    ///
    /// A no-op while already active. On failure the controller is left
    /// stopped and the device error is returned.
    pub async fn start(&mut self, mut sink: FrameSink) -> Result<()> {
        if self.is_active() {
            tracing::debug!(state = %self.state, "Capture already running");
            return Ok(());
        }
        self.set_state(CaptureState::Requesting);

        let delivering = Arc::new(AtomicBool::new(true));
        let gate = self.gate.clone();
        let live = delivering.clone();
        let on_samples: SampleCallback = Box::new(move |samples: &[f32], sample_rate: u32| {
            if samples.is_empty() || !live.load(Ordering::SeqCst) || !gate.is_open() {
                return;
            }
            sink(codec::encode(samples, sample_rate));
        });

        match self.input.open(on_samples).await {
            Ok(stream) => {
                tracing::info!(sample_rate = stream.sample_rate(), "Microphone capture started");
                self.stream = Some(stream);
                self.delivering = delivering;
                self.set_state(CaptureState::Active);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Microphone unavailable");
                self.set_state(CaptureState::Stopped);
                Err(e)
            }
        }
    }

    /// Release the device. Returns `false` when capture was already stopped.
    pub fn stop(&mut self) -> bool {
        if self.state == CaptureState::Stopped {
            return false;
        }
        self.set_state(CaptureState::Stopping);
        self.delivering.store(false, Ordering::SeqCst);
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        self.set_state(CaptureState::Stopped);
        tracing::info!("Microphone capture stopped");
        true
    }

    fn set_state(&mut self, state: CaptureState) {
        if self.state == state {
            return;
        }
        tracing::debug!(from = %self.state, to = %state, "Capture state change");
        self.state = state;
        if let Some(listener) = &self.listener {
            listener(state);
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.delivering.store(false, Ordering::SeqCst);
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RealtimeError;
    use parking_lot::Mutex;

    type Shared = Arc<Mutex<Option<SampleCallback>>>;

    struct MockInput {
        callback: Shared,
        fail: bool,
    }

    struct MockStream {
        callback: Shared,
    }

    impl InputStream for MockStream {
        fn sample_rate(&self) -> u32 {
            32_000
        }

        fn close(&mut self) {
            self.callback.lock().take();
        }
    }

    #[async_trait]
    impl AudioInput for MockInput {
        async fn open(&self, on_samples: SampleCallback) -> Result<Box<dyn InputStream>> {
            if self.fail {
                return Err(RealtimeError::device("permission denied"));
            }
            *self.callback.lock() = Some(on_samples);
            Ok(Box::new(MockStream { callback: self.callback.clone() }))
        }
    }

    fn push(callback: &Shared, samples: &[f32]) {
        if let Some(cb) = callback.lock().as_mut() {
            cb(samples, 32_000);
        }
    }

    fn controller(fail: bool) -> (CaptureController, Shared, Arc<Mutex<Vec<CaptureState>>>) {
        let callback: Shared = Arc::new(Mutex::new(None));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let input = Arc::new(MockInput { callback: callback.clone(), fail });
        let controller = CaptureController::new(input, ReadinessGate::new())
            .with_listener(Box::new(move |state| log.lock().push(state)));
        (controller, callback, seen)
    }

    #[tokio::test]
    async fn test_gate_suppresses_delivery() {
        let (mut capture, callback, _) = controller(false);
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink_frames = frames.clone();
        capture.start(Box::new(move |chunk| sink_frames.lock().push(chunk))).await.unwrap();

        push(&callback, &[0.5; 64]);
        assert!(frames.lock().is_empty());

        capture.gate().open();
        push(&callback, &[0.5; 64]);
        let frames = frames.lock();
        assert_eq!(frames.len(), 1);
        // 32 kHz -> 16 kHz halves the sample count
        assert_eq!(frames[0].len(), 64);
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let (mut capture, _, seen) = controller(false);
        capture.start(Box::new(|_| {})).await.unwrap();
        capture.start(Box::new(|_| {})).await.unwrap();
        assert_eq!(*seen.lock(), vec![CaptureState::Requesting, CaptureState::Active]);
    }

    #[tokio::test]
    async fn test_stop_reports_once() {
        let (mut capture, callback, seen) = controller(false);
        capture.start(Box::new(|_| {})).await.unwrap();

        assert!(capture.stop());
        assert!(!capture.stop());
        assert!(callback.lock().is_none());

        let stopped = seen.lock().iter().filter(|s| **s == CaptureState::Stopped).count();
        assert_eq!(stopped, 1);
        assert_eq!(capture.state(), CaptureState::Stopped);
    }

    #[tokio::test]
    async fn test_device_failure_leaves_stopped() {
        let (mut capture, _, seen) = controller(true);
        let err = capture.start(Box::new(|_| {})).await.unwrap_err();
        assert!(err.is_device());
        assert_eq!(capture.state(), CaptureState::Stopped);
        assert_eq!(*seen.lock(), vec![CaptureState::Requesting, CaptureState::Stopped]);
        assert!(!capture.stop());
    }
}
