//! Raw response shapes of the separation API.

use serde::{Deserialize, Serialize};
use stemix_core::{JobStatus, JobStatusResponse};

/// The library listing, which deployments return in one of several shapes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LibraryResponse {
    /// A bare array of jobs.
    Jobs(Vec<JobStatusResponse>),
    /// `{ "jobs": [...], "total": .., ... }`
    JobsPage { jobs: Vec<JobStatusResponse> },
    /// `{ "items": [...], "total": .., ... }`
    ItemsPage { items: Vec<JobStatusResponse> },
}

impl LibraryResponse {
    pub fn into_jobs(self) -> Vec<JobStatusResponse> {
        match self {
            Self::Jobs(jobs) | Self::JobsPage { jobs } | Self::ItemsPage { items: jobs } => jobs,
        }
    }
}

/// Separation model to run on an upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StemMode {
    /// Vocals, drums, bass and other.
    #[serde(rename = "htdemucs")]
    FourStems,
    /// Adds guitar and piano.
    #[default]
    #[serde(rename = "htdemucs_6s")]
    SixStems,
    /// Vocals and accompaniment.
    #[serde(rename = "two-stems")]
    TwoStems,
}

impl StemMode {
    /// Value sent in the `stem_mode` form field.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FourStems => "htdemucs",
            Self::SixStems => "htdemucs_6s",
            Self::TwoStems => "two-stems",
        }
    }
}

/// Response of `POST /process`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProcessResponse {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub message: Option<String>,
}
