//! Granular time-stretching.
//!
//! Output time is cut into grains of `grain_size` seconds. Each grain reads
//! the source at unity speed (so pitch is untouched) starting from where the
//! transport says the song should be at the grain's start, and consecutive
//! grains crossfade over `overlap` seconds. At rate 1.0 every overlapping
//! grain reads the same source sample and the output equals the input.

/// One grain's contribution to an output sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tap {
    /// Source position in seconds.
    pub position: f64,
    pub weight: f32,
}

/// Maps output time to weighted source positions.
#[derive(Debug, Clone, Copy)]
pub struct GrainStretcher {
    grain_size: f64,
    overlap: f64,
}

impl GrainStretcher {
    /// `overlap` is clamped to `0..=grain_size`.
    pub fn new(grain_size: f64, overlap: f64) -> Self {
        let grain_size = if grain_size > 0.0 { grain_size } else { 0.2 };
        Self {
            grain_size,
            overlap: overlap.clamp(0.0, grain_size),
        }
    }

    pub const fn grain_size(&self) -> f64 {
        self.grain_size
    }

    pub const fn overlap(&self) -> f64 {
        self.overlap
    }

    /// Source taps for the output instant `elapsed` seconds after the clock
    /// was anchored at `anchor_position` with playback `rate`.
    ///
    /// The second tap is the fading tail of the previous grain, present only
    /// inside a crossfade.
    #[allow(clippy::cast_possible_truncation)]
    pub fn taps(&self, elapsed: f64, anchor_position: f64, rate: f64) -> (Tap, Option<Tap>) {
        let elapsed = elapsed.max(0.0);
        let grain = (elapsed / self.grain_size).floor();
        let local = elapsed - grain * self.grain_size;
        let grain_start = anchor_position + grain * self.grain_size * rate;

        let in_crossfade = grain >= 1.0 && self.overlap > 0.0 && local < self.overlap;
        if !in_crossfade {
            return (
                Tap {
                    position: grain_start + local,
                    weight: 1.0,
                },
                None,
            );
        }

        let fade_in = (local / self.overlap) as f32;
        let previous_start = anchor_position + (grain - 1.0) * self.grain_size * rate;
        (
            Tap {
                position: grain_start + local,
                weight: fade_in,
            },
            Some(Tap {
                position: previous_start + self.grain_size + local,
                weight: 1.0 - fade_in,
            }),
        )
    }
}
