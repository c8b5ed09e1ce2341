//! # stemix-core
//!
//! Core types, traits, and error handling for the Stemix multitrack stem player.

pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use config::{EngineConfig, DEFAULT_ORIGINAL_BPM};
pub use error::{Error, HttpError, Result};
pub use source::{StemPayload, StemSource};
pub use types::*;
