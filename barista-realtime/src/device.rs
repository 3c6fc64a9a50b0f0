//! Desktop microphone and speaker through `cpal`.
//!
//! `cpal::Stream` is not `Send`, so each stream lives on its own thread and
//! is dropped there when the owning handle is closed.

use crate::capture::{AudioInput, InputStream, SampleCallback};
use crate::error::{RealtimeError, Result};
use crate::playback::{AudioOutput, RenderControl};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;

/// Default system microphone.
#[derive(Debug, Clone, Default)]
pub struct CpalInput;

impl CpalInput {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioInput for CpalInput {
    async fn open(&self, on_samples: SampleCallback) -> Result<Box<dyn InputStream>> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("barista-mic".into())
            .spawn(move || match start_input(on_samples) {
                Ok((stream, sample_rate)) => {
                    let _ = ready_tx.send(Ok(sample_rate));
                    // Blocks until the handle sends or is dropped.
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| RealtimeError::device(format!("Failed to spawn capture thread: {}", e)))?;

        let sample_rate = ready_rx
            .await
            .map_err(|_| RealtimeError::device("Capture thread exited before starting"))??;

        Ok(Box::new(CpalInputStream { sample_rate, stop: Some(stop_tx), thread: Some(thread) }))
    }
}

fn start_input(on_samples: SampleCallback) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| RealtimeError::device("No input device available"))?;
    let supported = device
        .default_input_config()
        .map_err(|e| RealtimeError::device(format!("Microphone unavailable: {}", e)))?;

    let format = supported.sample_format();
    let config: StreamConfig = supported.config();
    tracing::debug!(
        device = %device.name().unwrap_or_default(),
        sample_rate = config.sample_rate.0,
        channels = config.channels,
        ?format,
        "Opening input device"
    );

    let stream = match format {
        SampleFormat::F32 => build_input::<f32>(&device, &config, on_samples),
        SampleFormat::I16 => build_input::<i16>(&device, &config, on_samples),
        SampleFormat::U16 => build_input::<u16>(&device, &config, on_samples),
        other => {
            return Err(RealtimeError::device(format!("Unsupported input format {:?}", other)));
        }
    }?;
    stream
        .play()
        .map_err(|e| RealtimeError::device(format!("Failed to start microphone: {}", e)))?;

    Ok((stream, config.sample_rate.0))
}

fn build_input<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut on_samples: SampleCallback,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = usize::from(config.channels.max(1));
    let sample_rate = config.sample_rate.0;
    let mut mono = Vec::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                mono.clear();
                for frame in data.chunks(channels) {
                    let sum: f32 = frame.iter().map(|s| f32::from_sample_(*s)).sum();
                    mono.push(sum / frame.len() as f32);
                }
                on_samples(&mono, sample_rate);
            },
            |err| tracing::warn!(error = %err, "Input stream error"),
            None,
        )
        .map_err(|e| RealtimeError::device(format!("Failed to open microphone: {}", e)))
}

struct CpalInputStream {
    sample_rate: u32,
    stop: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl InputStream for CpalInputStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn close(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CpalInputStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// One utterance being rendered by the output callback.
struct Track {
    samples: Vec<f32>,
    position: f64,
    step: f64,
    control: RenderControl,
}

impl Track {
    /// Next mono sample, or `None` once the track is exhausted.
    fn next(&mut self) -> Option<f32> {
        let sample = *self.samples.get(self.position as usize)?;
        self.position += self.step;
        Some(if self.control.is_audible() { sample } else { 0.0 })
    }
}

type SharedTrack = Arc<Mutex<Option<Track>>>;

/// Default system speaker, kept open for the lifetime of the value.
pub struct CpalOutput {
    track: SharedTrack,
    device_rate: u32,
    stop: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalOutput {
    /// Open the default output device.
    pub fn open() -> Result<Self> {
        let track: SharedTrack = Arc::new(Mutex::new(None));
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let shared = track.clone();
        let thread = std::thread::Builder::new()
            .name("barista-speaker".into())
            .spawn(move || match start_output(shared) {
                Ok((stream, device_rate)) => {
                    let _ = ready_tx.send(Ok(device_rate));
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| RealtimeError::device(format!("Failed to spawn playback thread: {}", e)))?;

        let device_rate = ready_rx
            .recv()
            .map_err(|_| RealtimeError::device("Playback thread exited before starting"))??;

        Ok(Self { track, device_rate, stop: Some(stop_tx), thread: Some(thread) })
    }
}

impl AudioOutput for CpalOutput {
    fn render(&self, samples: Vec<f32>, sample_rate: u32, control: RenderControl) -> Result<()> {
        let step = f64::from(sample_rate) / f64::from(self.device_rate.max(1));
        let mut current = self.track.lock();
        if let Some(previous) = current.take() {
            tracing::trace!(played = previous.position as usize, "Replacing rendering");
        }
        *current = Some(Track { samples, position: 0.0, step, control });
        Ok(())
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn start_output(track: SharedTrack) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| RealtimeError::device("No output device available"))?;
    let supported = device
        .default_output_config()
        .map_err(|e| RealtimeError::device(format!("Speaker unavailable: {}", e)))?;

    let format = supported.sample_format();
    let config: StreamConfig = supported.config();
    tracing::debug!(
        device = %device.name().unwrap_or_default(),
        sample_rate = config.sample_rate.0,
        channels = config.channels,
        ?format,
        "Opening output device"
    );

    let stream = match format {
        SampleFormat::F32 => build_output::<f32>(&device, &config, track),
        SampleFormat::I16 => build_output::<i16>(&device, &config, track),
        SampleFormat::U16 => build_output::<u16>(&device, &config, track),
        other => {
            return Err(RealtimeError::device(format!("Unsupported output format {:?}", other)));
        }
    }?;
    stream
        .play()
        .map_err(|e| RealtimeError::device(format!("Failed to start speaker: {}", e)))?;

    Ok((stream, config.sample_rate.0))
}

fn build_output<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    track: SharedTrack,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels.max(1));

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut current = track.lock();
                if current.as_ref().is_some_and(|t| t.control.is_cancelled()) {
                    *current = None;
                }
                for frame in data.chunks_mut(channels) {
                    let value = match current.as_mut().map(Track::next) {
                        Some(Some(sample)) => sample,
                        Some(None) => {
                            if let Some(done) = current.take() {
                                done.control.finish();
                            }
                            0.0
                        }
                        None => 0.0,
                    };
                    let out = T::from_sample_(value);
                    frame.iter_mut().for_each(|slot| *slot = out);
                }
            },
            |err| tracing::warn!(error = %err, "Output stream error"),
            None,
        )
        .map_err(|e| RealtimeError::device(format!("Failed to open speaker: {}", e)))
}
