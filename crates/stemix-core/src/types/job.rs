//! Separation job types returned by the separation API.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::stem::StemSet;

/// Lifecycle of a separation job on the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Uploading,
    Separating,
    Completed,
    Failed,
    Paused,
}

impl JobStatus {
    /// Whether the job will not change state any more.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Response of `GET /jobs/{id}` and the entries of the library listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStatusResponse {
    pub job_id: String,
    #[serde(default)]
    pub filename: Option<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// Song metadata attached to a finished job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    /// Song length in seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub chords: Option<String>,
    /// Detected tempo, when the backend reports one.
    #[serde(default)]
    pub bpm: Option<f64>,
}

/// Response of `GET /jobs/{id}/result`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub stems: StemSet,
    #[serde(default)]
    pub metadata: Metadata,
    /// Pre-rendered waveform images per stem.
    #[serde(default)]
    pub waveforms: Option<BTreeMap<String, String>>,
}
