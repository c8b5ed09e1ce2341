//! Decoded PCM buffers.

use std::sync::Arc;

use stemix_core::{Error, Result};

/// Fully decoded audio for one stem: interleaved f32 samples.
///
/// Cloning is cheap; the samples are shared.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: u16,
    samples: Arc<[f32]>,
}

impl AudioBuffer {
    /// Wrap interleaved samples.
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::AudioDecode("sample rate must be positive".to_string()));
        }
        if channels == 0 {
            return Err(Error::AudioDecode("buffer has no channels".to_string()));
        }
        if samples.len() % usize::from(channels) != 0 {
            return Err(Error::AudioDecode(format!(
                "{} samples do not divide into {channels} channels",
                samples.len()
            )));
        }

        Ok(Self {
            sample_rate,
            channels,
            samples: samples.into(),
        })
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub const fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of sample frames.
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    /// Length in seconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Linearly interpolated sample of `channel` at `position` seconds.
    ///
    /// Mono buffers feed every output channel. Positions outside the buffer
    /// are silent.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn sample_at(&self, channel: usize, position: f64) -> f32 {
        if !position.is_finite() || position < 0.0 {
            return 0.0;
        }

        let frames = self.frames();
        let exact = position * f64::from(self.sample_rate);
        let index = exact.floor() as usize;
        if index >= frames {
            return 0.0;
        }

        let channels = usize::from(self.channels);
        let channel = channel.min(channels - 1);
        let current = self.samples[index * channels + channel];
        let next = if index + 1 < frames {
            self.samples[(index + 1) * channels + channel]
        } else {
            current
        };

        let frac = (exact - index as f64) as f32;
        current + (next - current) * frac
    }
}
