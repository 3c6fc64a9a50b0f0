//! Buffered playback of synthesized speech.
//!
//! Audio for a turn is accumulated with [`PlaybackController::enqueue`] and
//! rendered as one utterance by [`PlaybackController::drain_and_play`]. A new
//! rendering replaces whatever is still playing. Muting silences the output
//! without stopping the rendering clock, so un-muting mid-utterance resumes
//! audibly at the current position.

use crate::audio::{AudioChunk, OUTPUT_SAMPLE_RATE};
use crate::codec::{self, SUMMARY_SEGMENTS};
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

/// Shared controls for one rendering.
#[derive(Debug, Clone)]
pub struct RenderControl {
    audible: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
    done: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl RenderControl {
    fn new(audible: Arc<AtomicBool>) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let control = Self {
            audible,
            cancelled: Arc::new(AtomicBool::new(false)),
            done: Arc::new(Mutex::new(Some(tx))),
        };
        (control, rx)
    }

    /// Whether samples should reach the speaker right now.
    pub fn is_audible(&self) -> bool {
        self.audible.load(Ordering::Relaxed)
    }

    /// Whether the rendering was halted or replaced.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Report that every sample has been played. Only the first call counts.
    pub fn finish(&self) {
        if self.is_cancelled() {
            return;
        }
        if let Some(tx) = self.done.lock().take() {
            let _ = tx.send(());
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.done.lock().take();
    }
}

/// A speaker that renders whole utterances.
pub trait AudioOutput: Send + Sync {
    /// Start rendering `samples`, replacing any earlier rendering.
    ///
    /// Implementations write silence while `control` is not audible, stop as
    /// soon as it is cancelled, and call [`RenderControl::finish`] after the
    /// last sample.
    fn render(&self, samples: Vec<f32>, sample_rate: u32, control: RenderControl) -> Result<()>;
}

/// Output that plays nothing but keeps real-time pacing.
#[derive(Debug, Clone, Default)]
pub struct NullOutput;

impl AudioOutput for NullOutput {
    fn render(&self, samples: Vec<f32>, sample_rate: u32, control: RenderControl) -> Result<()> {
        let duration = Duration::from_secs_f64(samples.len() as f64 / sample_rate.max(1) as f64);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            control.finish();
        });
        Ok(())
    }
}

struct Rendering {
    control: RenderControl,
    finished: oneshot::Receiver<()>,
}

/// Buffers inbound speech and renders it one turn at a time.
pub struct PlaybackController {
    output: Arc<dyn AudioOutput>,
    buffer: Vec<AudioChunk>,
    audible: Arc<AtomicBool>,
    muted: bool,
    current: Option<Rendering>,
    segments: usize,
}

impl PlaybackController {
    /// Create an idle, unmuted controller.
    pub fn new(output: Arc<dyn AudioOutput>) -> Self {
        Self {
            output,
            buffer: Vec::new(),
            audible: Arc::new(AtomicBool::new(true)),
            muted: false,
            current: None,
            segments: SUMMARY_SEGMENTS,
        }
    }

    /// Use a different number of waveform summary segments.
    pub fn with_segments(mut self, segments: usize) -> Self {
        self.segments = segments.max(1);
        self
    }

    /// Append a chunk to the pending batch.
    pub fn enqueue(&mut self, chunk: AudioChunk) {
        self.buffer.push(chunk);
    }

    /// Chunks waiting for the next drain.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Whether an utterance is being rendered.
    pub fn is_playing(&self) -> bool {
        self.current.is_some()
    }

    /// Whether output is muted.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Mute or unmute without interrupting the current rendering.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.audible.store(!muted, Ordering::Relaxed);
    }

    /// Render everything buffered so far as one utterance.
    ///
    /// Returns the waveform summary, or `None` when nothing was buffered or
    /// output is muted. An empty buffer leaves the playing state untouched.
    pub fn drain_and_play(&mut self) -> Result<Option<Vec<f32>>> {
        let batch = std::mem::take(&mut self.buffer);
        if batch.is_empty() {
            return Ok(None);
        }

        if self.muted {
            tracing::debug!(chunks = batch.len(), "Muted, discarding buffered speech");
            return Ok(None);
        }

        let waveform = codec::decode_all(&batch);
        if waveform.is_empty() {
            self.halt();
            return Ok(None);
        }
        let summary = codec::amplitude_summary(&waveform, self.segments);

        self.halt();
        let (control, finished) = RenderControl::new(self.audible.clone());
        tracing::debug!(
            chunks = batch.len(),
            samples = waveform.len(),
            "Rendering buffered speech"
        );
        self.output.render(waveform, OUTPUT_SAMPLE_RATE, control.clone())?;
        self.current = Some(Rendering { control, finished });
        Ok(Some(summary))
    }

    /// Halt rendering and discard the pending batch.
    ///
    /// Returns whether something was playing.
    pub fn stop(&mut self) -> bool {
        self.buffer.clear();
        self.halt()
    }

    /// Resolve when the current rendering ends on its own.
    ///
    /// Pending forever while nothing is playing, which makes it usable as a
    /// `tokio::select!` branch.
    pub async fn wait_finished(&mut self) {
        match self.current.as_mut() {
            Some(rendering) => {
                // A dropped sender counts as completion too.
                let _ = (&mut rendering.finished).await;
                self.current = None;
            }
            None => std::future::pending::<()>().await,
        }
    }

    fn halt(&mut self) -> bool {
        match self.current.take() {
            Some(rendering) => {
                rendering.control.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingOutput {
        rendered: Mutex<Vec<(usize, RenderControl)>>,
    }

    impl AudioOutput for RecordingOutput {
        fn render(&self, samples: Vec<f32>, _rate: u32, control: RenderControl) -> Result<()> {
            self.rendered.lock().push((samples.len(), control));
            Ok(())
        }
    }

    fn chunk(samples: &[i16]) -> AudioChunk {
        let mut data = Vec::new();
        for s in samples {
            data.extend_from_slice(&s.to_le_bytes());
        }
        AudioChunk::pcm16_24khz(data)
    }

    #[test]
    fn test_empty_drain_keeps_state() {
        let output = Arc::new(RecordingOutput::default());
        let mut playback = PlaybackController::new(output.clone());
        assert!(playback.drain_and_play().unwrap().is_none());
        assert!(!playback.is_playing());

        playback.enqueue(chunk(&[1000; 200]));
        playback.drain_and_play().unwrap();
        assert!(playback.drain_and_play().unwrap().is_none());
        assert!(playback.is_playing());
    }

    #[test]
    fn test_drain_concatenates_batch() {
        let output = Arc::new(RecordingOutput::default());
        let mut playback = PlaybackController::new(output.clone());
        playback.enqueue(chunk(&[1000; 100]));
        playback.enqueue(chunk(&[-2000; 60]));

        let summary = playback.drain_and_play().unwrap().unwrap();
        assert_eq!(summary.len(), SUMMARY_SEGMENTS);
        assert_eq!(output.rendered.lock()[0].0, 160);
        assert_eq!(playback.pending(), 0);
    }

    #[test]
    fn test_new_rendering_replaces_previous() {
        let output = Arc::new(RecordingOutput::default());
        let mut playback = PlaybackController::new(output.clone());
        playback.enqueue(chunk(&[1000; 100]));
        playback.drain_and_play().unwrap();
        playback.enqueue(chunk(&[1000; 100]));
        playback.drain_and_play().unwrap();

        let rendered = output.rendered.lock();
        assert!(rendered[0].1.is_cancelled());
        assert!(!rendered[1].1.is_cancelled());
    }

    #[test]
    fn test_mute_keeps_rendering() {
        let output = Arc::new(RecordingOutput::default());
        let mut playback = PlaybackController::new(output.clone());
        playback.enqueue(chunk(&[1000; 100]));
        playback.drain_and_play().unwrap();

        playback.set_muted(true);
        let control = output.rendered.lock()[0].1.clone();
        assert!(!control.is_audible());
        assert!(!control.is_cancelled());
        assert!(playback.is_playing());

        playback.set_muted(false);
        assert!(control.is_audible());
    }

    #[test]
    fn test_muted_drain_returns_none() {
        let output = Arc::new(RecordingOutput::default());
        let mut playback = PlaybackController::new(output.clone());
        playback.set_muted(true);
        playback.enqueue(chunk(&[1000; 100]));
        assert!(playback.drain_and_play().unwrap().is_none());
        assert!(output.rendered.lock().is_empty());
        assert_eq!(playback.pending(), 0);
    }

    #[test]
    fn test_muted_drain_leaves_current_rendering() {
        let output = Arc::new(RecordingOutput::default());
        let mut playback = PlaybackController::new(output.clone());
        playback.enqueue(chunk(&[1000; 100]));
        playback.drain_and_play().unwrap();

        playback.set_muted(true);
        playback.enqueue(chunk(&[1000; 100]));
        assert!(playback.drain_and_play().unwrap().is_none());

        let rendered = output.rendered.lock();
        assert_eq!(rendered.len(), 1);
        assert!(!rendered[0].1.is_cancelled());
        assert!(playback.is_playing());
    }

    #[test]
    fn test_stop_clears_buffer() {
        let output = Arc::new(RecordingOutput::default());
        let mut playback = PlaybackController::new(output.clone());
        playback.enqueue(chunk(&[1000; 100]));
        playback.drain_and_play().unwrap();
        playback.enqueue(chunk(&[1000; 100]));

        assert!(playback.stop());
        assert!(!playback.stop());
        assert_eq!(playback.pending(), 0);
        assert!(output.rendered.lock()[0].1.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_finished_with_null_output() {
        let mut playback = PlaybackController::new(Arc::new(NullOutput));
        playback.enqueue(chunk(&[1000; 2400]));
        playback.drain_and_play().unwrap();
        assert!(playback.is_playing());

        playback.wait_finished().await;
        assert!(!playback.is_playing());
    }
}
