//! # stemix-client
//!
//! Client for the stem separation API used by Stemix.
//!
//! This crate reads job status, job results and the user's library, and
//! fetches access-controlled stem audio for the playback engine.

pub mod client;
pub mod config;
pub mod endpoints;
pub mod source;
pub mod types;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use source::HttpStemSource;
pub use types::{LibraryResponse, ProcessResponse, StemMode};
