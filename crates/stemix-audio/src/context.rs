//! Audio contexts: the clock and destination a mix graph renders into.

use parking_lot::Mutex;
use stemix_core::{Error, Result};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::graph::SharedGraph;

/// Lifecycle of an audio context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextState {
    /// Created but not yet allowed to produce sound.
    #[default]
    Suspended,
    Running,
    Closed,
}

/// Destination and clock for a [`SharedGraph`].
///
/// A context starts suspended and must be resumed before it renders, the
/// way platform audio output often needs an explicit activation.
pub trait AudioContext: Send + Sync {
    fn sample_rate(&self) -> u32;

    fn output_channels(&self) -> u16;

    fn state(&self) -> ContextState;

    /// Activate the context. Fails with [`Error::AudioContext`] when the
    /// platform refuses.
    fn resume(&self) -> Result<()>;

    /// Seconds of audio the context has rendered (or would have rendered)
    /// since it was first resumed.
    fn current_time(&self) -> f64;

    /// Attach the graph the context renders from.
    fn connect(&self, graph: SharedGraph);

    /// Release the output. The context cannot be resumed afterwards.
    fn close(&self);
}

struct OfflineState {
    state: ContextState,
    /// Clock value accumulated before the current running span.
    elapsed: f64,
    running_since: Option<Instant>,
    graph: Option<SharedGraph>,
    refuse_activation: bool,
}

/// Context without an output device.
///
/// The clock follows `tokio::time`, so it can be driven by a paused test
/// clock. Audio is pulled explicitly with [`OfflineContext::render`].
pub struct OfflineContext {
    sample_rate: u32,
    channels: u16,
    inner: Mutex<OfflineState>,
}

impl OfflineContext {
    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            inner: Mutex::new(OfflineState {
                state: ContextState::Suspended,
                elapsed: 0.0,
                running_since: None,
                graph: None,
                refuse_activation: false,
            }),
        }
    }

    /// Make subsequent [`AudioContext::resume`] calls fail.
    pub fn block_activation(&self, blocked: bool) {
        self.inner.lock().refuse_activation = blocked;
    }

    /// Render `frames` interleaved frames from the connected graph at the
    /// current clock time.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * usize::from(self.channels)];
        let (graph, now) = {
            let inner = self.inner.lock();
            if inner.state != ContextState::Running {
                return out;
            }
            (inner.graph.clone(), Self::clock(&inner))
        };
        if let Some(graph) = graph {
            graph.lock().render(&mut out, now);
        }
        out
    }

    fn clock(inner: &OfflineState) -> f64 {
        inner.elapsed
            + inner
                .running_since
                .map_or(0.0, |since| since.elapsed().as_secs_f64())
    }
}

impl AudioContext for OfflineContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn output_channels(&self) -> u16 {
        self.channels
    }

    fn state(&self) -> ContextState {
        self.inner.lock().state
    }

    fn resume(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            ContextState::Running => Ok(()),
            ContextState::Closed => Err(Error::AudioContext("context is closed".to_string())),
            ContextState::Suspended if inner.refuse_activation => {
                warn!("Offline context activation refused");
                Err(Error::AudioContext("activation refused".to_string()))
            }
            ContextState::Suspended => {
                inner.state = ContextState::Running;
                inner.running_since = Some(Instant::now());
                debug!("Offline context running");
                Ok(())
            }
        }
    }

    fn current_time(&self) -> f64 {
        Self::clock(&self.inner.lock())
    }

    fn connect(&self, graph: SharedGraph) {
        self.inner.lock().graph = Some(graph);
    }

    fn close(&self) {
        let mut inner = self.inner.lock();
        inner.elapsed = Self::clock(&inner);
        inner.running_since = None;
        inner.graph = None;
        inner.state = ContextState::Closed;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_clock_runs_only_after_resume() {
        let context = OfflineContext::new(48000, 2);
        assert_eq!(context.state(), ContextState::Suspended);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(context.current_time(), 0.0);

        context.resume().unwrap();
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!((context.current_time() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_blocked_activation() {
        let context = OfflineContext::new(48000, 2);
        context.block_activation(true);
        assert!(matches!(context.resume(), Err(Error::AudioContext(_))));
        assert_eq!(context.state(), ContextState::Suspended);

        context.block_activation(false);
        context.resume().unwrap();
        assert_eq!(context.state(), ContextState::Running);
    }

    #[test]
    fn test_closed_context_stays_closed() {
        let context = OfflineContext::new(48000, 2);
        context.close();
        assert!(context.resume().is_err());
        assert!(context.render(16).iter().all(|s| *s == 0.0));
    }
}
