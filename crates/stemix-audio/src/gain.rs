//! Click-free gain changes.

/// Linear amplitude ramp advanced one frame at a time.
#[derive(Debug, Clone)]
pub struct GainRamp {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
}

impl GainRamp {
    /// Start settled at `gain`.
    pub const fn new(gain: f32) -> Self {
        Self {
            current: gain,
            target: gain,
            step: 0.0,
            remaining: 0,
        }
    }

    /// Move towards `target` over `frames` frames. Zero frames jumps immediately.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_target(&mut self, target: f32, frames: u32) {
        self.target = target;
        if frames == 0 {
            self.current = target;
            self.step = 0.0;
            self.remaining = 0;
        } else {
            self.step = (target - self.current) / frames as f32;
            self.remaining = frames;
        }
    }

    /// Gain for the next frame.
    pub fn next_gain(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.current = self.target;
            } else {
                self.current += self.step;
            }
        }
        self.current
    }

    /// Skip `frames` frames without producing output.
    pub fn advance(&mut self, frames: u32) {
        if frames >= self.remaining {
            self.current = self.target;
            self.remaining = 0;
        } else {
            #[allow(clippy::cast_precision_loss)]
            {
                self.current += self.step * frames as f32;
            }
            self.remaining -= frames;
        }
    }

    pub const fn current(&self) -> f32 {
        self.current
    }

    pub const fn target(&self) -> f32 {
        self.target
    }

    pub const fn is_ramping(&self) -> bool {
        self.remaining > 0
    }

    /// Fully silent and not about to change.
    #[allow(clippy::float_cmp)]
    pub fn is_silent(&self) -> bool {
        self.remaining == 0 && self.current == 0.0
    }
}
