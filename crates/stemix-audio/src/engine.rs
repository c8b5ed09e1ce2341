//! Multitrack engine coordinating loading, mixing and the transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use stemix_core::{
    any_soloed, clamp_pan, clamp_volume_db, ChannelState, EngineConfig, Error, Result, StemSet,
    StemSource, TransportState, DEFAULT_ORIGINAL_BPM,
};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use crate::context::{AudioContext, ContextState};
use crate::graph::{MixGraph, SharedGraph};
use crate::loader::{LoadedStems, TrackLoader};

/// Events buffered for a consumer that is not draining them.
const EVENT_CAPACITY: usize = 1024;

/// Point-in-time view of the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub is_loaded: bool,
    pub is_loading: bool,
    pub load_error: Option<String>,
    pub transport: TransportState,
    pub is_playing: bool,
    pub bpm: f64,
    pub original_bpm: f64,
    pub playback_rate: f64,
    /// Song length in seconds.
    pub duration: f64,
    /// Last sampled position in seconds.
    pub current_time: f64,
    pub channels: Vec<ChannelState>,
}

impl EngineSnapshot {
    /// Look up a channel by stem name.
    pub fn channel(&self, name: &str) -> Option<&ChannelState> {
        self.channels.iter().find(|c| c.name == name)
    }
}

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Transport state changed.
    StateChanged(TransportState),
    /// Position updated (in seconds).
    PositionUpdate(f64),
    /// Duration determined (in seconds).
    DurationUpdate(f64),
    /// A stem set started loading.
    Loading,
    /// Every stem loaded.
    Loaded,
    /// Loading failed.
    LoadFailed(String),
    /// A non-looping song reached its end.
    PlaybackFinished,
    /// A channel's mixer settings changed.
    ChannelChanged(ChannelState),
    /// Tempo changed.
    TempoChanged { bpm: f64, rate: f64 },
}

/// How a load request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Failed(String),
    /// A newer load or teardown replaced this one before it finished.
    Superseded,
}

/// Handle to an in-flight load.
#[derive(Debug)]
pub struct LoadHandle {
    generation: u64,
    task: JoinHandle<LoadOutcome>,
}

impl LoadHandle {
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for the load to settle.
    pub async fn wait(self) -> LoadOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => LoadOutcome::Superseded,
            Err(e) => LoadOutcome::Failed(format!("Load task failed: {e}")),
        }
    }
}

struct EngineState {
    /// Last requested stem set, kept for reload.
    stems: Option<StemSet>,
    is_loaded: bool,
    is_loading: bool,
    load_error: Option<String>,
    bpm: f64,
    original_bpm: f64,
    duration: f64,
    current_time: f64,
    channels: Vec<ChannelState>,
    load_task: Option<AbortHandle>,
    poller: Option<JoinHandle<()>>,
    disposed: bool,
}

impl EngineState {
    fn playback_rate(&self) -> f64 {
        self.bpm / self.original_bpm
    }

    fn stop_poller(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

struct Inner {
    context: Arc<dyn AudioContext>,
    loader: TrackLoader,
    config: EngineConfig,
    graph: SharedGraph,
    runtime: Handle,
    /// Locked before `graph` whenever both are needed.
    state: Mutex<EngineState>,
    /// Bumped under the state lock for every load and teardown.
    generation: AtomicU64,
    snapshot_tx: watch::Sender<EngineSnapshot>,
    event_tx: Sender<EngineEvent>,
    event_rx: Receiver<EngineEvent>,
}

/// Plays a set of stems in lock-step with per-channel mixing and tempo
/// control.
///
/// Must be created inside a tokio runtime; loading and position polling run
/// as tasks on it. Dropping the engine disposes it.
pub struct MultitrackEngine {
    inner: Arc<Inner>,
}

impl MultitrackEngine {
    /// Create an engine rendering into `context` and fetching through
    /// `source`. `original_bpm` is the tempo the stems were recorded at.
    pub fn new(
        context: Arc<dyn AudioContext>,
        source: Arc<dyn StemSource>,
        original_bpm: f64,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        if !(original_bpm.is_finite() && original_bpm > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "original bpm must be positive, got {original_bpm}"
            )));
        }
        let runtime = Handle::try_current()
            .map_err(|e| Error::Internal(format!("MultitrackEngine needs a tokio runtime: {e}")))?;

        let graph = MixGraph::new(context.sample_rate(), context.output_channels(), &config).shared();
        context.connect(Arc::clone(&graph));
        let loader = TrackLoader::new(source, context.sample_rate(), config.length_tolerance_secs);

        let state = EngineState {
            stems: None,
            is_loaded: false,
            is_loading: false,
            load_error: None,
            bpm: original_bpm,
            original_bpm,
            duration: 0.0,
            current_time: 0.0,
            channels: Vec::new(),
            load_task: None,
            poller: None,
            disposed: false,
        };
        let (snapshot_tx, _) = watch::channel(build_snapshot(&state, TransportState::Stopped));
        let (event_tx, event_rx) = bounded(EVENT_CAPACITY);

        debug!(
            "Multitrack engine created: {} Hz, {} channels, original bpm {}",
            context.sample_rate(),
            context.output_channels(),
            original_bpm
        );

        Ok(Self {
            inner: Arc::new(Inner {
                context,
                loader,
                config,
                graph,
                runtime,
                state: Mutex::new(state),
                generation: AtomicU64::new(0),
                snapshot_tx,
                event_tx,
                event_rx,
            }),
        })
    }

    /// Engine with the default tempo and configuration.
    pub fn with_defaults(context: Arc<dyn AudioContext>, source: Arc<dyn StemSource>) -> Result<Self> {
        Self::new(context, source, DEFAULT_ORIGINAL_BPM, EngineConfig::default())
    }

    /// Replace whatever is loaded with `stems`.
    ///
    /// The previous set is released immediately and any load still in
    /// flight is cancelled. Failures end up in the snapshot's `load_error`.
    pub fn load(&self, stems: StemSet) -> LoadHandle {
        self.inner.start_load(stems)
    }

    /// Load the last requested stem set again.
    pub fn reload(&self) -> Result<LoadHandle> {
        let stems = self
            .inner
            .state
            .lock()
            .stems
            .clone()
            .ok_or_else(|| Error::InvalidArgument("nothing to reload".to_string()))?;
        Ok(self.inner.start_load(stems))
    }

    /// Start or resume playback.
    ///
    /// Activates the audio context first. A refused activation is returned
    /// and leaves the transport untouched.
    pub fn play(&self) -> Result<()> {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        if !state.is_loaded || inner.graph.lock().transport().is_playing() {
            return Ok(());
        }

        if inner.context.state() != ContextState::Running {
            if let Err(e) = inner.context.resume() {
                warn!("Audio context activation failed: {e}");
                return Err(match e {
                    Error::AudioContext(_) => e,
                    other => Error::AudioContext(other.to_string()),
                });
            }
        }

        let now = inner.context.current_time();
        inner.graph.lock().transport_mut().play(now);
        inner.start_poller(&mut state);
        drop(state);

        info!("Playback started");
        inner.emit(EngineEvent::StateChanged(TransportState::Playing));
        inner.publish();
        Ok(())
    }

    /// Pause, keeping the position.
    pub fn pause(&self) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        if !state.is_loaded {
            return;
        }

        let now = inner.context.current_time();
        let position = {
            let mut graph = inner.graph.lock();
            if !graph.transport_mut().pause(now) {
                return;
            }
            graph.transport().position(now)
        };
        state.stop_poller();
        state.current_time = position;
        drop(state);

        debug!("Paused at {position:.2}s");
        inner.emit(EngineEvent::StateChanged(TransportState::Paused));
        inner.emit(EngineEvent::PositionUpdate(position));
        inner.publish();
    }

    /// Stop and return to the start.
    pub fn stop(&self) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        if !state.is_loaded {
            return;
        }

        let previous = {
            let mut graph = inner.graph.lock();
            let previous = graph.transport().state();
            graph.transport_mut().stop();
            previous
        };
        state.stop_poller();
        state.current_time = 0.0;
        drop(state);

        if previous != TransportState::Stopped {
            debug!("Stopped");
            inner.emit(EngineEvent::StateChanged(TransportState::Stopped));
        }
        inner.emit(EngineEvent::PositionUpdate(0.0));
        inner.publish();
    }

    /// Pause when playing, play otherwise.
    pub fn toggle_playback(&self) -> Result<()> {
        if self.is_playing() {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Jump to `position` seconds, clamped to the song. The play state is
    /// kept.
    pub fn seek(&self, position: f64) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        if !state.is_loaded || position.is_nan() {
            return;
        }

        let now = inner.context.current_time();
        let position = inner.graph.lock().transport_mut().seek(position, now);
        state.current_time = position;
        drop(state);

        debug!("Seeked to {position:.2}s");
        inner.emit(EngineEvent::PositionUpdate(position));
        inner.publish();
    }

    /// Set the playback tempo. The playback rate becomes
    /// `bpm / original_bpm` for every channel, pitch is preserved.
    pub fn set_bpm(&self, bpm: f64) -> Result<()> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(Error::InvalidArgument(format!("bpm must be positive, got {bpm}")));
        }

        let inner = &self.inner;
        let mut state = inner.state.lock();
        state.bpm = bpm;
        let rate = state.playback_rate();
        let now = inner.context.current_time();
        inner.graph.lock().transport_mut().set_rate(rate, now);
        drop(state);

        debug!("Tempo set to {bpm} bpm (rate {rate:.3})");
        inner.emit(EngineEvent::TempoChanged { bpm, rate });
        inner.publish();
        Ok(())
    }

    pub fn bpm(&self) -> f64 {
        self.inner.state.lock().bpm
    }

    pub fn original_bpm(&self) -> f64 {
        self.inner.state.lock().original_bpm
    }

    /// Current `bpm / original_bpm`.
    pub fn playback_rate(&self) -> f64 {
        self.inner.state.lock().playback_rate()
    }

    /// Set a channel's fader in dB, clamped to the fader range.
    pub fn set_channel_volume(&self, name: &str, volume_db: f32) {
        if !volume_db.is_finite() {
            return;
        }
        self.inner
            .update_channel(name, |channel| channel.volume_db = clamp_volume_db(volume_db));
    }

    pub fn toggle_mute(&self, name: &str) {
        self.inner
            .update_channel(name, |channel| channel.muted = !channel.muted);
    }

    pub fn toggle_solo(&self, name: &str) {
        self.inner
            .update_channel(name, |channel| channel.soloed = !channel.soloed);
    }

    /// Set a channel's stereo balance (-1.0 left to 1.0 right).
    pub fn set_channel_pan(&self, name: &str, pan: f32) {
        if !pan.is_finite() {
            return;
        }
        self.inner
            .update_channel(name, |channel| channel.pan = clamp_pan(pan));
    }

    /// Current state.
    pub fn snapshot(&self) -> EngineSnapshot {
        self.inner.snapshot()
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Try to receive an event without blocking.
    pub fn try_recv_event(&self) -> Option<EngineEvent> {
        self.inner.event_rx.try_recv().ok()
    }

    /// A receiver for the event stream.
    pub fn events(&self) -> Receiver<EngineEvent> {
        self.inner.event_rx.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.graph.lock().transport().is_playing()
    }

    /// Live position in seconds, not limited to the polling interval.
    pub fn position(&self) -> f64 {
        let now = self.inner.context.current_time();
        self.inner.graph.lock().transport().position(now)
    }

    /// Number of stems wired into the graph.
    pub fn voice_count(&self) -> usize {
        self.inner.graph.lock().voice_count()
    }

    /// The context the engine renders into.
    pub fn context(&self) -> &Arc<dyn AudioContext> {
        &self.inner.context
    }

    /// Stop everything and release every stem.
    ///
    /// The audio context is closed only when this engine is its last owner;
    /// a context shared with other engines stays usable for them.
    pub fn dispose(&self) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        inner.generation.fetch_add(1, Ordering::SeqCst);
        inner.teardown(&mut state);
        state.is_loading = false;
        drop(state);

        if Arc::strong_count(&inner.context) == 1 {
            inner.context.close();
        }
        info!("Multitrack engine disposed");
        inner.publish();
    }
}

impl Drop for MultitrackEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Inner {
    fn start_load(self: &Arc<Self>, stems: StemSet) -> LoadHandle {
        let generation = {
            let mut state = self.state.lock();
            if state.disposed {
                drop(state);
                return LoadHandle {
                    generation: self.generation.load(Ordering::SeqCst),
                    task: self.runtime.spawn(async { LoadOutcome::Superseded }),
                };
            }

            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            self.teardown(&mut state);
            state.is_loading = true;
            state.load_error = None;
            state.stems = Some(stems.clone());
            generation
        };

        info!("Loading stem set {} ({} stems)", generation, stems.len());
        self.emit(EngineEvent::StateChanged(TransportState::Stopped));
        self.emit(EngineEvent::Loading);
        self.publish();

        let weak = Arc::downgrade(self);
        let loader = self.loader.clone();
        let timeout = self.config.load_timeout();
        let task = self.runtime.spawn(async move {
            let result = match tokio::time::timeout(timeout, loader.load(&stems)).await {
                Ok(result) => result,
                Err(_) => Err(Error::LoadTimeout {
                    secs: timeout.as_secs(),
                }),
            };
            match weak.upgrade() {
                Some(inner) => inner.finish_load(generation, result),
                None => LoadOutcome::Superseded,
            }
        });

        let mut state = self.state.lock();
        if self.generation.load(Ordering::SeqCst) == generation {
            state.load_task = Some(task.abort_handle());
        }
        drop(state);

        LoadHandle { generation, task }
    }

    /// Commit a finished load if it is still the latest one.
    fn finish_load(&self, generation: u64, result: Result<LoadedStems>) -> LoadOutcome {
        let mut state = self.state.lock();
        if state.disposed || self.generation.load(Ordering::SeqCst) != generation {
            debug!("Discarding stale load {generation}");
            return LoadOutcome::Superseded;
        }
        state.load_task = None;
        state.is_loading = false;

        let outcome = match result {
            Ok(loaded) => {
                let now = self.context.current_time();
                let rate = state.playback_rate();
                let mut channels = Vec::with_capacity(loaded.stems.len());
                {
                    let mut graph = self.graph.lock();
                    graph.clear();
                    for stem in loaded.stems {
                        let channel = ChannelState::new(stem.name.clone());
                        graph.add_voice(stem.name, stem.buffer, channel.target_gain(false), channel.pan);
                        channels.push(channel);
                    }
                    let transport = graph.transport_mut();
                    transport.reset(loaded.duration);
                    transport.set_rate(rate, now);
                }

                info!(
                    "Loaded {} stems, duration {:.2}s, rate {:.3}",
                    channels.len(),
                    loaded.duration,
                    rate
                );
                state.channels = channels;
                state.duration = loaded.duration;
                state.current_time = 0.0;
                state.is_loaded = true;
                state.load_error = None;
                LoadOutcome::Loaded
            }
            Err(e) => {
                error!("Failed to load stems: {e}");
                state.load_error = Some(e.to_string());
                LoadOutcome::Failed(e.to_string())
            }
        };
        let duration = state.duration;
        drop(state);

        match &outcome {
            LoadOutcome::Loaded => {
                self.emit(EngineEvent::DurationUpdate(duration));
                self.emit(EngineEvent::Loaded);
            }
            LoadOutcome::Failed(message) => self.emit(EngineEvent::LoadFailed(message.clone())),
            LoadOutcome::Superseded => {}
        }
        self.publish();
        outcome
    }

    /// Release everything tied to the current stem set. Caller holds the
    /// state lock.
    fn teardown(&self, state: &mut EngineState) {
        if let Some(task) = state.load_task.take() {
            task.abort();
        }
        state.stop_poller();
        {
            let mut graph = self.graph.lock();
            graph.clear();
            graph.transport_mut().reset(0.0);
        }
        state.channels.clear();
        state.is_loaded = false;
        state.duration = 0.0;
        state.current_time = 0.0;
    }

    fn start_poller(self: &Arc<Self>, state: &mut EngineState) {
        state.stop_poller();

        let weak = Arc::downgrade(self);
        let period = self.config.position_interval();
        state.poller = Some(self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !poll_position(&weak) {
                    break;
                }
            }
            trace!("Position poller finished");
        }));
    }

    /// Sample the transport. Returns false once polling should end.
    fn poll_position(&self) -> bool {
        let mut state = self.state.lock();
        let now = self.context.current_time();
        let mut graph = self.graph.lock();
        let transport = graph.transport_mut();
        if !transport.is_playing() {
            return false;
        }

        if transport.is_finished(now) {
            transport.stop();
            drop(graph);
            state.current_time = 0.0;
            state.poller = None;
            drop(state);

            info!("Playback finished");
            self.emit(EngineEvent::PlaybackFinished);
            self.emit(EngineEvent::StateChanged(TransportState::Stopped));
            self.emit(EngineEvent::PositionUpdate(0.0));
            self.publish();
            return false;
        }

        let position = transport.position(now);
        drop(graph);
        state.current_time = position;
        drop(state);

        self.emit(EngineEvent::PositionUpdate(position));
        self.publish();
        true
    }

    fn update_channel(&self, name: &str, change: impl FnOnce(&mut ChannelState)) {
        let mut state = self.state.lock();
        let Some(channel) = state.channels.iter_mut().find(|c| c.name == name) else {
            debug!("Ignoring unknown channel '{name}'");
            return;
        };
        change(channel);
        let updated = channel.clone();

        // Solo changes affect every channel's audibility
        let any = any_soloed(&state.channels);
        {
            let mut graph = self.graph.lock();
            for channel in &state.channels {
                graph.set_gain_target(&channel.name, channel.target_gain(any));
                graph.set_pan(&channel.name, channel.pan);
            }
        }
        drop(state);

        trace!("Channel updated: {updated:?}");
        self.emit(EngineEvent::ChannelChanged(updated));
        self.publish();
    }

    fn snapshot(&self) -> EngineSnapshot {
        let state = self.state.lock();
        let transport = self.graph.lock().transport().state();
        build_snapshot(&state, transport)
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }

    fn emit(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(event)) => trace!("Event queue full, dropping {event:?}"),
        }
    }
}

fn poll_position(weak: &Weak<Inner>) -> bool {
    weak.upgrade().is_some_and(|inner| inner.poll_position())
}

fn build_snapshot(state: &EngineState, transport: TransportState) -> EngineSnapshot {
    EngineSnapshot {
        is_loaded: state.is_loaded,
        is_loading: state.is_loading,
        load_error: state.load_error.clone(),
        transport,
        is_playing: transport.is_playing(),
        bpm: state.bpm,
        original_bpm: state.original_bpm,
        playback_rate: state.playback_rate(),
        duration: state.duration,
        current_time: state.current_time,
        channels: state.channels.clone(),
    }
}
