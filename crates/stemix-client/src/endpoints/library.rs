//! The user's library of past jobs.

use stemix_core::{JobStatusResponse, Result};
use tracing::warn;

use crate::{ApiClient, LibraryResponse};

impl ApiClient {
    /// List past jobs, newest first.
    pub async fn library(&self, limit: u32, offset: u32) -> Result<Vec<JobStatusResponse>> {
        let value: serde_json::Value = self
            .get_json(
                "library",
                &[("limit", limit.to_string()), ("offset", offset.to_string())],
            )
            .await?;
        Ok(parse_library(value))
    }
}

/// Accept every listing shape; anything else is an empty library.
pub fn parse_library(value: serde_json::Value) -> Vec<JobStatusResponse> {
    match serde_json::from_value::<LibraryResponse>(value) {
        Ok(response) => response.into_jobs(),
        Err(e) => {
            warn!("Unexpected library response format: {e}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stemix_core::JobStatus;

    fn job(id: &str) -> serde_json::Value {
        json!({ "job_id": id, "status": "completed", "filename": "song.mp3" })
    }

    #[test]
    fn test_bare_array() {
        let jobs = parse_library(json!([job("a"), job("b")]));
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].job_id, "b");
        assert_eq!(jobs[0].status, JobStatus::Completed);
    }

    #[test]
    fn test_jobs_wrapper() {
        let jobs = parse_library(json!({ "jobs": [job("a")], "total": 1, "page": 1, "limit": 20 }));
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn test_items_wrapper() {
        let jobs = parse_library(json!({ "items": [job("a"), job("b"), job("c")], "total": 3 }));
        assert_eq!(jobs.len(), 3);
    }

    #[test]
    fn test_unexpected_shape_is_empty() {
        assert!(parse_library(json!({ "data": [job("a")] })).is_empty());
        assert!(parse_library(json!("nope")).is_empty());
    }
}
