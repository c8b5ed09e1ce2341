//! Transport states.

use serde::{Deserialize, Serialize};

/// State of the shared playback clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    #[default]
    Stopped,
    Paused,
    Playing,
}

impl TransportState {
    pub const fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }
}
