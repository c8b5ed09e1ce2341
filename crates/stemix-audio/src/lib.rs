//! # stemix-audio
//!
//! Multitrack stem playback engine for Stemix.
//!
//! Features:
//! - Concurrent, all-or-nothing stem loading with symphonia decoding
//! - Phase-locked mixing with per-channel volume, mute, solo and pan
//! - Pitch-preserving tempo changes via granular time-stretching
//! - cpal output, plus an offline context for rendering without a device

pub mod context;
pub mod decode;
pub mod engine;
pub mod fetch;
pub mod gain;
pub mod graph;
pub mod loader;
pub mod output;
pub mod pcm;
pub mod resample;
pub mod stretch;
pub mod transport;

pub use context::{AudioContext, ContextState, OfflineContext};
pub use engine::{EngineEvent, EngineSnapshot, LoadHandle, LoadOutcome, MultitrackEngine};
pub use fetch::FileSource;
pub use graph::{MixGraph, SharedGraph};
pub use loader::{LoadedStem, LoadedStems, TrackLoader};
pub use output::CpalContext;
pub use pcm::AudioBuffer;
pub use transport::Transport;
