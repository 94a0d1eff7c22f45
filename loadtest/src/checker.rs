//! Polls every job of a set of batches and collects the results.

use aggregation_client::Client;
use futures::{StreamExt, TryStreamExt};

use crate::batch::{BatchInput, validate_all};
use crate::config::Poll;
use crate::error::Result;
use crate::poller::{StatusSource, poll_job};
use crate::report::{JobResult, RunResults};

/// Drives the poller across all jobs of all batches.
#[derive(Clone, Copy, Debug)]
pub struct Checker {
    poll: Poll,
    concurrency: usize,
}

impl Checker {
    /// Creates a checker that polls up to `concurrency` jobs at once. A concurrency of `0` is
    /// treated as `1`.
    pub fn new(poll: Poll, concurrency: usize) -> Self {
        Self {
            poll,
            concurrency: concurrency.max(1),
        }
    }

    /// Validates all batches and polls every job.
    ///
    /// Validation happens before the first request is sent. If any batch is incomplete, the run
    /// fails with [`Error::InvalidInput`](crate::Error::InvalidInput) and no job is polled.
    pub async fn run(&self, client: &Client, inputs: Vec<BatchInput>) -> Result<RunResults> {
        let batches = validate_all(inputs)?;

        let mut sources = Vec::with_capacity(batches.len());
        for batch in batches {
            tracing::debug!(
                base_url = %batch.endpoint.base_url,
                jobs = batch.job_request_ids.len(),
                "checking batch"
            );
            let session = client.session(batch.endpoint)?;
            sources.push((session, batch.job_request_ids));
        }

        self.run_sources(sources).await
    }

    /// Polls every job of the given batches.
    ///
    /// Jobs are processed in batch order, then list order. With a concurrency above `1`, later
    /// jobs may finish first, but results are still collected in that order.
    pub async fn run_sources<S>(&self, batches: Vec<(S, Vec<String>)>) -> Result<RunResults>
    where
        S: StatusSource,
    {
        let jobs = batches.iter().flat_map(|(source, job_request_ids)| {
            job_request_ids
                .iter()
                .map(move |job_request_id| (source, job_request_id.as_str()))
        });

        futures::stream::iter(jobs)
            .map(|(source, job_request_id)| self.check_job(source, job_request_id))
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    async fn check_job<S>(&self, source: &S, job_request_id: &str) -> Result<JobResult>
    where
        S: StatusSource,
    {
        let outcome = poll_job(source, job_request_id, &self.poll).await?;

        if outcome.is_success() {
            tracing::info!(
                job_request_id,
                return_code = outcome.return_code(),
                completion_seconds = outcome.completion_seconds(),
                "job succeeded"
            );
        } else {
            tracing::warn!(
                job_request_id,
                return_code = outcome.return_code(),
                error_count = outcome.error_count(),
                "job failed"
            );
        }

        Ok(JobResult {
            job_request_id: job_request_id.to_owned(),
            outcome,
        })
    }
}
