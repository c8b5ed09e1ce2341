//! Audio output using cpal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, SampleFormat, Stream, StreamConfig,
};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use stemix_core::{Error, Result};
use tracing::{debug, error, info};

use crate::context::{AudioContext, ContextState};
use crate::graph::SharedGraph;

/// How long to wait for the output thread to answer.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// Soft clipping threshold for the summed mix.
const SOFT_CLIP_THRESHOLD: f32 = 0.9;

/// Messages to the thread owning the cpal stream.
enum Control {
    Resume(Sender<Result<()>>),
    Close,
}

/// What the output thread reports once the stream is built.
struct DeviceInfo {
    sample_rate: u32,
    channels: u16,
    device_name: String,
}

/// State shared with the audio callback.
struct Shared {
    graph: Mutex<Option<SharedGraph>>,
    frames_rendered: AtomicU64,
}

/// Audio context backed by the default output device.
///
/// cpal streams are not `Send`, so the stream lives on a dedicated thread
/// and is controlled over a channel. The clock counts frames actually
/// handed to the device.
pub struct CpalContext {
    sample_rate: u32,
    channels: u16,
    device_name: String,
    state: RwLock<ContextState>,
    shared: Arc<Shared>,
    control_tx: Sender<Control>,
}

impl CpalContext {
    /// Open the default output device. The stream starts paused.
    pub fn new() -> Result<Self> {
        let shared = Arc::new(Shared {
            graph: Mutex::new(None),
            frames_rendered: AtomicU64::new(0),
        });
        let (control_tx, control_rx) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);

        let thread_shared = Arc::clone(&shared);
        std::thread::Builder::new()
            .name("stemix-output".to_string())
            .spawn(move || {
                // Create the stream inside the worker thread (cpal::Stream is not Send)
                match open_stream(thread_shared) {
                    Ok((stream, info)) => {
                        let _ = ready_tx.send(Ok(info));
                        run_output(&stream, &control_rx);
                    }
                    Err(e) => {
                        error!("Failed to initialize audio output: {e}");
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn output thread: {e}")))?;

        let info = ready_rx
            .recv_timeout(CONTROL_TIMEOUT)
            .map_err(|e| Error::AudioOutput(format!("Output thread did not start: {e}")))??;

        info!(
            "Audio output initialized: {} Hz, {} channels, device: {}",
            info.sample_rate, info.channels, info.device_name
        );

        Ok(Self {
            sample_rate: info.sample_rate,
            channels: info.channels,
            device_name: info.device_name,
            state: RwLock::new(ContextState::Suspended),
            shared,
            control_tx,
        })
    }

    /// Get the device name.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl AudioContext for CpalContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn output_channels(&self) -> u16 {
        self.channels
    }

    fn state(&self) -> ContextState {
        *self.state.read()
    }

    fn resume(&self) -> Result<()> {
        match self.state() {
            ContextState::Running => return Ok(()),
            ContextState::Closed => {
                return Err(Error::AudioContext("context is closed".to_string()));
            }
            ContextState::Suspended => {}
        }

        let (reply_tx, reply_rx) = bounded(1);
        self.control_tx
            .send(Control::Resume(reply_tx))
            .map_err(|_| Error::AudioContext("output thread has exited".to_string()))?;
        reply_rx
            .recv_timeout(CONTROL_TIMEOUT)
            .map_err(|e| Error::AudioContext(format!("No answer from output thread: {e}")))??;

        *self.state.write() = ContextState::Running;
        debug!("Audio context running");
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn current_time(&self) -> f64 {
        self.shared.frames_rendered.load(Ordering::Acquire) as f64 / f64::from(self.sample_rate)
    }

    fn connect(&self, graph: SharedGraph) {
        *self.shared.graph.lock() = Some(graph);
    }

    fn close(&self) {
        let mut state = self.state.write();
        if *state == ContextState::Closed {
            return;
        }
        *state = ContextState::Closed;
        *self.shared.graph.lock() = None;
        let _ = self.control_tx.send(Control::Close);
        debug!("Audio context closed");
    }
}

impl Drop for CpalContext {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_output(stream: &Stream, control_rx: &Receiver<Control>) {
    // Dropping the sender also ends the loop
    while let Ok(message) = control_rx.recv() {
        match message {
            Control::Resume(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| Error::AudioContext(format!("Failed to start stream: {e}")));
                let _ = reply.send(result);
            }
            Control::Close => break,
        }
    }
    debug!("Audio output thread exiting");
}

fn open_stream(shared: Arc<Shared>) -> Result<(Stream, DeviceInfo)> {
    let host = cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or_else(|| Error::AudioOutput("No output device found".to_string()))?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    info!("Using audio output device: {device_name}");

    let supported_config = device
        .default_output_config()
        .map_err(|e| Error::AudioOutput(format!("Failed to get output config: {e}")))?;

    debug!("Supported output config: {:?}", supported_config);

    let sample_format = supported_config.sample_format();
    let config: StreamConfig = supported_config.into();

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, shared)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, shared)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, shared)?,
        _ => {
            return Err(Error::AudioOutput(format!(
                "Unsupported sample format: {sample_format:?}"
            )));
        }
    };

    // Silent until the context is resumed
    stream
        .pause()
        .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {e}")))?;

    Ok((
        stream,
        DeviceInfo {
            sample_rate: config.sample_rate.0,
            channels: config.channels,
            device_name,
        },
    ))
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &Device,
    config: &StreamConfig,
    shared: Arc<Shared>,
) -> Result<Stream> {
    let channels = usize::from(config.channels);
    let sample_rate = f64::from(config.sample_rate.0);
    let mut scratch: Vec<f32> = Vec::new();

    let err_fn = |err| {
        error!("Audio stream error: {err}");
    };

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                scratch.resize(data.len(), 0.0);

                #[allow(clippy::cast_precision_loss)]
                let block_time = shared.frames_rendered.load(Ordering::Acquire) as f64 / sample_rate;
                let graph = shared.graph.lock().clone();
                match graph {
                    Some(graph) => graph.lock().render(&mut scratch, block_time),
                    None => scratch.fill(0.0),
                }

                for (out, sample) in data.iter_mut().zip(&scratch) {
                    // Soft clipping using tanh for smooth limiting
                    let limited = if sample.abs() > SOFT_CLIP_THRESHOLD {
                        sample.tanh()
                    } else {
                        *sample
                    };
                    *out = T::from_sample(limited);
                }

                shared
                    .frames_rendered
                    .fetch_add(frames as u64, Ordering::Release);
            },
            err_fn,
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {e}")))
}

/// List available output devices.
pub fn list_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();

    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| Error::AudioOutput(format!("Failed to list devices: {e}")))?
        .filter_map(|d| d.name().ok())
        .collect();

    Ok(devices)
}
