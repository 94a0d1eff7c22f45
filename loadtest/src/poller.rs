//! Polls a single job until it reaches a terminal state.

use aggregation_client::{GetJobResponse, JobStatusRecord, Session};
use async_trait::async_trait;
use tokio::time::Instant;

use crate::config::Poll;
use crate::report::JobOutcome;

/// Return codes of finished jobs that count as success, given that no errors were reported.
///
/// A privacy budget error means the job was already aggregated in an earlier run, which is
/// expected when load testing with a fixed input set.
pub const SUCCESS_CODES: &[&str] = &["SUCCESS", "PRIVACY_BUDGET_ERROR"];

/// Source of job status records.
///
/// Implemented for [`Session`]. Tests substitute a scripted source to avoid real time and network.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetches the current status of a job.
    async fn fetch(&self, job_request_id: &str) -> aggregation_client::Result<GetJobResponse>;
}

#[async_trait]
impl StatusSource for Session {
    async fn fetch(&self, job_request_id: &str) -> aggregation_client::Result<GetJobResponse> {
        self.get_job(job_request_id).send().await
    }
}

/// Polls a job until it finished, failed or exceeded `poll.timeout`.
///
/// The deadline starts with the first status request. Between status requests of an unfinished
/// job, the poller waits for `poll.interval`. A failed status request ends polling immediately
/// with [`JobOutcome::RemoteError`].
///
/// Transport errors and malformed responses are returned as errors and abort the run.
pub async fn poll_job<S>(
    source: &S,
    job_request_id: &str,
    poll: &Poll,
) -> aggregation_client::Result<JobOutcome>
where
    S: StatusSource + ?Sized,
{
    let deadline = Instant::now() + poll.timeout;

    loop {
        let response = source.fetch(job_request_id).await?;
        let job_status = response
            .record
            .as_ref()
            .map(|record| record.job_status.as_str());
        tracing::debug!(
            job_request_id,
            status = %response.status,
            job_status,
            "fetched job status"
        );

        let Some(record) = response.record else {
            return Ok(JobOutcome::RemoteError {
                status: response.status,
            });
        };

        if record.job_status.is_finished() {
            return Ok(evaluate(record));
        }

        tokio::time::sleep(poll.interval).await;
        if Instant::now() >= deadline {
            return Ok(JobOutcome::Timeout);
        }
    }
}

fn evaluate(record: JobStatusRecord) -> JobOutcome {
    if record.error_count == 0 && SUCCESS_CODES.contains(&record.return_code.as_str()) {
        JobOutcome::Success {
            return_code: record.return_code,
            received_at: record.received_at,
            finished_at: record.finished_at,
        }
    } else {
        JobOutcome::UnacceptableResult {
            return_code: record.return_code,
            error_count: record.error_count,
        }
    }
}
