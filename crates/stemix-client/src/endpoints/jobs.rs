//! Job status and result endpoints.

use std::time::Duration;

use stemix_core::{Error, JobStatus, JobStatusResponse, Result, ResultResponse};
use tracing::{debug, info};

use crate::ApiClient;

/// How often a running job is polled.
pub const JOB_POLL_INTERVAL: Duration = Duration::from_secs(3);

impl ApiClient {
    /// Get the status of a separation job.
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse> {
        self.get_json(&format!("jobs/{job_id}"), &[]).await
    }

    /// Get the stems and metadata of a finished job.
    pub async fn job_result(&self, job_id: &str) -> Result<ResultResponse> {
        self.get_json(&format!("jobs/{job_id}/result"), &[]).await
    }

    /// Poll a job until it finishes and return its result.
    pub async fn wait_for_result(&self, job_id: &str) -> Result<ResultResponse> {
        self.wait_for_result_every(job_id, JOB_POLL_INTERVAL).await
    }

    /// [`ApiClient::wait_for_result`] with a custom poll interval.
    pub async fn wait_for_result_every(
        &self,
        job_id: &str,
        interval: Duration,
    ) -> Result<ResultResponse> {
        let mut last_status = None;
        loop {
            let status = self.job_status(job_id).await?;
            if last_status != Some(status.status) {
                info!("Job {job_id} is {:?}", status.status);
                last_status = Some(status.status);
            }

            if !status.status.is_terminal() {
                debug!("Job {job_id} not finished, polling again in {interval:?}");
                tokio::time::sleep(interval).await;
                continue;
            }

            if status.status == JobStatus::Failed {
                return Err(Error::JobFailed(
                    status.error.unwrap_or_else(|| "unknown error".to_string()),
                ));
            }
            return self.job_result(job_id).await;
        }
    }
}
