//! The mix graph: every loaded stem summed into one output under a shared
//! transport.

use std::sync::Arc;

use parking_lot::Mutex;
use stemix_core::{clamp_pan, EngineConfig};
use tracing::debug;

use crate::gain::GainRamp;
use crate::pcm::AudioBuffer;
use crate::stretch::{GrainStretcher, Tap};
use crate::transport::Transport;

/// Graph shared between the engine and the audio callback.
pub type SharedGraph = Arc<Mutex<MixGraph>>;

/// One stem wired into the graph.
struct Voice {
    name: String,
    buffer: AudioBuffer,
    gain: GainRamp,
    pan: f32,
}

impl Voice {
    /// Balance law: center leaves both sides at unity.
    fn pan_factor(&self, output_channel: usize, output_channels: usize) -> f32 {
        if output_channels < 2 {
            return 1.0;
        }
        match output_channel {
            0 => (1.0 - self.pan).min(1.0),
            1 => (1.0 + self.pan).min(1.0),
            _ => 1.0,
        }
    }

    fn read(&self, channel: usize, tap: Tap, transport: &Transport) -> f32 {
        self.buffer.sample_at(channel, transport.wrap(tap.position)) * tap.weight
    }
}

/// Renders all voices in lock-step.
pub struct MixGraph {
    sample_rate: u32,
    output_channels: u16,
    voices: Vec<Voice>,
    transport: Transport,
    stretcher: GrainStretcher,
    ramp_frames: u32,
}

impl MixGraph {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(sample_rate: u32, output_channels: u16, config: &EngineConfig) -> Self {
        let ramp_frames =
            (config.volume_ramp().as_secs_f64() * f64::from(sample_rate)).round() as u32;
        Self {
            sample_rate,
            output_channels: output_channels.max(1),
            voices: Vec::new(),
            transport: Transport::new(config.loop_playback),
            stretcher: GrainStretcher::new(config.grain_size_secs, config.grain_overlap_secs),
            ramp_frames,
        }
    }

    /// Wrap into the shared form handed to an audio context.
    pub fn shared(self) -> SharedGraph {
        Arc::new(Mutex::new(self))
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub const fn output_channels(&self) -> u16 {
        self.output_channels
    }

    pub const fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    /// Connect a stem. The voice starts settled at `gain`.
    pub fn add_voice(&mut self, name: impl Into<String>, buffer: AudioBuffer, gain: f32, pan: f32) {
        let name = name.into();
        debug!("Connecting voice '{}' ({:.2}s)", name, buffer.duration());
        self.voices.push(Voice {
            name,
            buffer,
            gain: GainRamp::new(gain),
            pan: clamp_pan(pan),
        });
    }

    /// Disconnect every voice and release its buffer.
    pub fn clear(&mut self) {
        if !self.voices.is_empty() {
            debug!("Releasing {} voices", self.voices.len());
        }
        self.voices.clear();
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn voice_names(&self) -> impl Iterator<Item = &str> {
        self.voices.iter().map(|v| v.name.as_str())
    }

    /// Ramp a voice towards `target`. Returns false for unknown names.
    pub fn set_gain_target(&mut self, name: &str, target: f32) -> bool {
        let ramp_frames = self.ramp_frames;
        self.voices
            .iter_mut()
            .find(|v| v.name == name)
            .map(|voice| {
                if (voice.gain.target() - target).abs() > f32::EPSILON {
                    voice.gain.set_target(target, ramp_frames);
                }
            })
            .is_some()
    }

    pub fn gain(&self, name: &str) -> Option<f32> {
        self.voices
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.gain.current())
    }

    pub fn set_pan(&mut self, name: &str, pan: f32) -> bool {
        self.voices
            .iter_mut()
            .find(|v| v.name == name)
            .map(|voice| voice.pan = clamp_pan(pan))
            .is_some()
    }

    /// Render interleaved frames into `out`, starting at context time
    /// `block_time`. Gain ramps advance even while the transport is idle.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::float_cmp
    )]
    pub fn render(&mut self, out: &mut [f32], block_time: f64) {
        out.fill(0.0);
        let channels = usize::from(self.output_channels);
        let frames = out.len() / channels;

        if !self.transport.is_playing() || self.voices.is_empty() {
            for voice in &mut self.voices {
                voice.gain.advance(frames as u32);
            }
            return;
        }

        let frame_time = 1.0 / f64::from(self.sample_rate);
        let anchor = self.transport.anchor_position();
        let rate = self.transport.rate();

        for (index, frame) in out.chunks_exact_mut(channels).enumerate() {
            let elapsed = self.transport.elapsed(block_time + index as f64 * frame_time);
            let (head, tail) = self.stretcher.taps(elapsed, anchor, rate);

            for voice in &mut self.voices {
                let gain = voice.gain.next_gain();
                if gain == 0.0 {
                    continue;
                }
                for (channel, sample) in frame.iter_mut().enumerate() {
                    let mut value = voice.read(channel, head, &self.transport);
                    if let Some(tail) = tail {
                        value += voice.read(channel, tail, &self.transport);
                    }
                    *sample += value * gain * voice.pan_factor(channel, channels);
                }
            }
        }
    }
}
