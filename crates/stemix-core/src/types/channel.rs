//! Per-stem mixer channel state.

use serde::{Deserialize, Serialize};

/// Lowest volume a channel fader accepts, in dB.
pub const MIN_VOLUME_DB: f32 = -60.0;

/// Highest volume a channel fader accepts, in dB.
pub const MAX_VOLUME_DB: f32 = 6.0;

pub const MIN_PAN: f32 = -1.0;
pub const MAX_PAN: f32 = 1.0;

/// Mixer state for one loaded stem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    /// Stem name this channel plays.
    pub name: String,
    /// Fader gain in dB.
    pub volume_db: f32,
    pub muted: bool,
    pub soloed: bool,
    /// Stereo balance (-1.0 left, 0.0 center, 1.0 right).
    pub pan: f32,
}

impl ChannelState {
    /// Create a channel at unity gain, centered, neither muted nor soloed.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            volume_db: 0.0,
            muted: false,
            soloed: false,
            pan: 0.0,
        }
    }

    /// Whether this channel is heard given the solo state of the whole mix.
    pub const fn audible(&self, any_soloed: bool) -> bool {
        is_audible(self.muted, self.soloed, any_soloed)
    }

    /// Linear gain the channel should ramp towards.
    pub fn target_gain(&self, any_soloed: bool) -> f32 {
        if self.audible(any_soloed) {
            db_to_gain(self.volume_db)
        } else {
            0.0
        }
    }
}

/// A muted channel is never heard; while anything is soloed only soloed
/// channels are heard.
pub const fn is_audible(muted: bool, soloed: bool, any_soloed: bool) -> bool {
    !muted && (!any_soloed || soloed)
}

/// Whether any channel in the mix is soloed.
pub fn any_soloed(channels: &[ChannelState]) -> bool {
    channels.iter().any(|c| c.soloed)
}

/// Convert decibels to linear amplitude.
pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Clamp a requested fader value into the accepted range.
pub fn clamp_volume_db(db: f32) -> f32 {
    db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB)
}

pub fn clamp_pan(pan: f32) -> f32 {
    pan.clamp(MIN_PAN, MAX_PAN)
}
