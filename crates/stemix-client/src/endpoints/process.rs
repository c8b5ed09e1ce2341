//! Uploading songs and managing separation jobs.

use std::path::Path;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use stemix_core::{Error, Result};
use tracing::info;

use crate::types::{ProcessResponse, StemMode};
use crate::ApiClient;

impl ApiClient {
    /// Upload a song for separation and return the new job.
    pub async fn upload_audio(
        &self,
        filename: &str,
        data: Vec<u8>,
        mode: StemMode,
    ) -> Result<ProcessResponse> {
        info!("Uploading {filename} ({} bytes) as {}", data.len(), mode.as_str());
        let form = Form::new()
            .part("file", Part::bytes(data).file_name(filename.to_string()))
            .text("stem_mode", mode.as_str());

        let fetched = self
            .request_once(Method::POST, "process", Some(form))
            .await?;
        serde_json::from_slice(&fetched.body)
            .map_err(|e| Error::ParseError(format!("Failed to parse process response: {e}")))
    }

    /// [`ApiClient::upload_audio`] for a file on disk.
    pub async fn upload_file(&self, path: &Path, mode: StemMode) -> Result<ProcessResponse> {
        let data = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::InvalidArgument(format!("no file name in {}", path.display())))?;
        self.upload_audio(filename, data, mode).await
    }

    pub async fn pause_job(&self, job_id: &str) -> Result<()> {
        self.request_once(Method::PATCH, &format!("jobs/{job_id}/pause"), None)
            .await?;
        Ok(())
    }

    pub async fn resume_job(&self, job_id: &str) -> Result<()> {
        self.request_once(Method::PATCH, &format!("jobs/{job_id}/resume"), None)
            .await?;
        Ok(())
    }

    pub async fn delete_job(&self, job_id: &str) -> Result<()> {
        self.request_once(Method::DELETE, &format!("jobs/{job_id}"), None)
            .await?;
        Ok(())
    }

    /// Download every stem of a finished job as one zip archive.
    pub async fn export_stems(&self, job_id: &str) -> Result<Bytes> {
        let fetched = self.get_bytes(&format!("jobs/{job_id}/export")).await?;
        Ok(fetched.body)
    }
}
