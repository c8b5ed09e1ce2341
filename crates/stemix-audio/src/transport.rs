//! Shared playback clock.
//!
//! Positions are in song seconds. The clock is anchored to the audio
//! context's time: while playing, the song position is the anchored
//! position plus the context time elapsed since the anchor, scaled by the
//! playback rate. Every state change re-anchors, so nothing ever jumps.

use stemix_core::TransportState;

/// Transport state machine driving every channel in lock-step.
#[derive(Debug, Clone)]
pub struct Transport {
    state: TransportState,
    /// Context time of the last anchor.
    anchor_time: f64,
    /// Song position at the last anchor.
    anchor_position: f64,
    rate: f64,
    duration: f64,
    looping: bool,
}

impl Transport {
    pub const fn new(looping: bool) -> Self {
        Self {
            state: TransportState::Stopped,
            anchor_time: 0.0,
            anchor_position: 0.0,
            rate: 1.0,
            duration: 0.0,
            looping,
        }
    }

    pub const fn state(&self) -> TransportState {
        self.state
    }

    pub const fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub const fn rate(&self) -> f64 {
        self.rate
    }

    pub const fn duration(&self) -> f64 {
        self.duration
    }

    pub const fn anchor_position(&self) -> f64 {
        self.anchor_position
    }

    pub const fn is_looping(&self) -> bool {
        self.looping
    }

    /// Stop at the start of a song of the given length.
    pub fn reset(&mut self, duration: f64) {
        self.state = TransportState::Stopped;
        self.anchor_time = 0.0;
        self.anchor_position = 0.0;
        self.duration = duration.max(0.0);
    }

    /// Context seconds since the last anchor; zero unless playing.
    pub fn elapsed(&self, now: f64) -> f64 {
        if self.is_playing() {
            (now - self.anchor_time).max(0.0)
        } else {
            0.0
        }
    }

    /// Song position at context time `now`.
    pub fn position(&self, now: f64) -> f64 {
        self.wrap(self.anchor_position + self.elapsed(now) * self.rate)
    }

    /// Map a song position onto the playable range.
    pub fn wrap(&self, position: f64) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        if self.looping {
            position.rem_euclid(self.duration)
        } else {
            position.clamp(0.0, self.duration)
        }
    }

    /// Whether a non-looping song has played through at `now`.
    pub fn is_finished(&self, now: f64) -> bool {
        !self.looping
            && self.is_playing()
            && self.duration > 0.0
            && self.anchor_position + self.elapsed(now) * self.rate >= self.duration
    }

    /// Start or resume. Returns false if already playing.
    pub fn play(&mut self, now: f64) -> bool {
        if self.is_playing() {
            return false;
        }
        self.anchor_time = now;
        self.state = TransportState::Playing;
        true
    }

    /// Freeze the position. Returns false if not playing.
    pub fn pause(&mut self, now: f64) -> bool {
        if !self.is_playing() {
            return false;
        }
        self.anchor_position = self.position(now);
        self.anchor_time = now;
        self.state = TransportState::Paused;
        true
    }

    /// Return to the start.
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.anchor_position = 0.0;
    }

    /// Jump to `position`, clamped to the song. Keeps the play state.
    pub fn seek(&mut self, position: f64, now: f64) -> f64 {
        let position = if position.is_nan() {
            0.0
        } else {
            position.clamp(0.0, self.duration)
        };
        self.anchor_position = position;
        self.anchor_time = now;
        position
    }

    /// Change the playback rate without moving the position.
    pub fn set_rate(&mut self, rate: f64, now: f64) {
        if self.is_playing() {
            self.anchor_position = self.position(now);
            self.anchor_time = now;
        }
        self.rate = rate;
    }
}
