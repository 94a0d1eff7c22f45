//! Per-job outcomes and the aggregate report of a `check` run.

use aggregation_client::StatusCode;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Return code reported for jobs whose status request failed with an error status.
pub const RETURN_CODE_ERROR: &str = "ERROR";
/// Return code reported for jobs that did not finish before the deadline.
pub const RETURN_CODE_TIMEOUT: &str = "MAX_RETRY_TIME_EXCEEDED";

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// How polling a single job ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job finished with an accepted return code and no errors.
    Success {
        /// The accepted return code.
        return_code: String,
        /// When the job service received the job.
        received_at: DateTime<Utc>,
        /// When the job finished.
        finished_at: DateTime<Utc>,
    },
    /// The job service responded with an error status.
    RemoteError {
        /// The status code of the failed status request.
        status: StatusCode,
    },
    /// The job did not finish before the deadline.
    Timeout,
    /// The job finished, but with a return code or error count that does not count as success.
    UnacceptableResult {
        /// The return code reported by the job service.
        return_code: String,
        /// The sum of all error counts reported by the job service.
        error_count: u64,
    },
}

impl JobOutcome {
    /// Returns `true` for [`JobOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The return code as it appears in the report.
    pub fn return_code(&self) -> &str {
        match self {
            Self::Success { return_code, .. } => return_code,
            Self::RemoteError { .. } => RETURN_CODE_ERROR,
            Self::Timeout => RETURN_CODE_TIMEOUT,
            Self::UnacceptableResult { return_code, .. } => return_code,
        }
    }

    /// The error count as it appears in the report.
    pub fn error_count(&self) -> u64 {
        match self {
            Self::UnacceptableResult { error_count, .. } => *error_count,
            _ => 0,
        }
    }

    /// Completion time of a successful job in whole seconds, see [`whole_seconds`].
    pub fn completion_seconds(&self) -> Option<i64> {
        match self {
            Self::Success {
                received_at,
                finished_at,
                ..
            } => Some(whole_seconds(*finished_at - *received_at)),
            _ => None,
        }
    }
}

/// The outcome of one job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobResult {
    /// The job request ID as given in the input batch.
    pub job_request_id: String,
    /// How polling the job ended.
    pub outcome: JobOutcome,
}

/// A job that did not succeed, as listed in [`Report::failed_job_details`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedJob {
    /// The job request ID.
    pub job_request_id: String,
    /// The observed return code, or [`RETURN_CODE_ERROR`] / [`RETURN_CODE_TIMEOUT`].
    pub return_code: String,
    /// The observed error count.
    pub error_count: u64,
}

impl From<&JobResult> for FailedJob {
    fn from(result: &JobResult) -> Self {
        Self {
            job_request_id: result.job_request_id.clone(),
            return_code: result.outcome.return_code().to_owned(),
            error_count: result.outcome.error_count(),
        }
    }
}

/// Aggregate result of a `check` run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Number of jobs across all batches.
    pub total_jobs: usize,
    /// Number of jobs that finished successfully.
    pub success_jobs: usize,
    /// Number of jobs that did not.
    pub failed_jobs: usize,
    /// The failed jobs in processing order.
    pub failed_job_details: Vec<FailedJob>,
    /// Mean completion time of successful jobs in seconds, `None` if no job succeeded.
    pub average_job_completion_time: Option<f64>,
    /// Seconds between the first received and the last finished successful job, `None` if no job
    /// succeeded.
    pub total_time: Option<i64>,
}

/// Owned accumulator of all job results of a run, in processing order.
#[derive(Clone, Debug, Default)]
pub struct RunResults {
    results: Vec<JobResult>,
}

impl RunResults {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the result of one job.
    pub fn push(&mut self, result: JobResult) {
        self.results.push(result);
    }

    /// Number of recorded jobs.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns `true` if no job has been recorded.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Iterates over all results in processing order.
    pub fn iter(&self) -> impl Iterator<Item = &JobResult> {
        self.results.iter()
    }

    /// Completion times of all successful jobs in whole seconds, in processing order.
    pub fn completion_times(&self) -> Vec<i64> {
        self.iter()
            .filter_map(|result| result.outcome.completion_seconds())
            .collect()
    }

    /// Computes the aggregate report.
    ///
    /// This is a pure function of the recorded results, so it can be called any number of times.
    pub fn report(&self) -> Report {
        let failed_job_details: Vec<FailedJob> = self
            .iter()
            .filter(|result| !result.outcome.is_success())
            .map(FailedJob::from)
            .collect();

        let total_jobs = self.len();
        let failed_jobs = failed_job_details.len();

        let completion_times = self.completion_times();
        let average_job_completion_time = match completion_times.len() {
            0 => None,
            count => Some(completion_times.iter().sum::<i64>() as f64 / count as f64),
        };

        let mut first_received = None::<DateTime<Utc>>;
        let mut last_finished = None::<DateTime<Utc>>;
        for result in self.iter() {
            if let JobOutcome::Success {
                received_at,
                finished_at,
                ..
            } = result.outcome
            {
                first_received = Some(first_received.map_or(received_at, |t| t.min(received_at)));
                last_finished = Some(last_finished.map_or(finished_at, |t| t.max(finished_at)));
            }
        }
        let total_time = first_received
            .zip(last_finished)
            .map(|(first, last)| whole_seconds(last - first));

        Report {
            total_jobs,
            success_jobs: total_jobs - failed_jobs,
            failed_jobs,
            failed_job_details,
            average_job_completion_time,
            total_time,
        }
    }
}

impl FromIterator<JobResult> for RunResults {
    fn from_iter<T: IntoIterator<Item = JobResult>>(iter: T) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

impl Extend<JobResult> for RunResults {
    fn extend<T: IntoIterator<Item = JobResult>>(&mut self, iter: T) {
        self.results.extend(iter);
    }
}

/// Returns the seconds component of a duration.
///
/// Sub-second precision is floored away, and so are whole days: the result is always in
/// `0..86400`. Reports have always been computed this way, so the numbers stay comparable with
/// earlier load test runs.
pub fn whole_seconds(delta: TimeDelta) -> i64 {
    let seconds = delta.num_seconds();
    let floored = if delta.subsec_nanos() < 0 {
        seconds - 1
    } else {
        seconds
    };
    floored.rem_euclid(SECONDS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use aggregation_client::parse_timestamp;

    use super::*;

    fn success(id: &str, received_at: &str, finished_at: &str) -> JobResult {
        JobResult {
            job_request_id: id.into(),
            outcome: JobOutcome::Success {
                return_code: "SUCCESS".into(),
                received_at: parse_timestamp(received_at).unwrap(),
                finished_at: parse_timestamp(finished_at).unwrap(),
            },
        }
    }

    fn failure(id: &str, outcome: JobOutcome) -> JobResult {
        JobResult {
            job_request_id: id.into(),
            outcome,
        }
    }

    #[test]
    fn ten_minute_jobs() {
        let results: RunResults = (1..=5)
            .map(|i| {
                success(
                    &i.to_string(),
                    "2022-09-16T05:36:37.904Z",
                    "2022-09-16T05:46:37.904Z",
                )
            })
            .collect();

        let report = results.report();

        assert_eq!(report.total_jobs, 5);
        assert_eq!(report.success_jobs, 5);
        assert_eq!(report.failed_jobs, 0);
        assert!(report.failed_job_details.is_empty());
        assert_eq!(report.average_job_completion_time, Some(600.0));
        assert_eq!(report.total_time, Some(600));
    }

    #[test]
    fn truncates_each_job_before_averaging() {
        let results: RunResults = [
            success("a", "2022-09-16T05:00:00.000Z", "2022-09-16T05:00:10.900Z"),
            success("b", "2022-09-16T05:00:01.000Z", "2022-09-16T05:00:12.900Z"),
        ]
        .into_iter()
        .collect();

        let report = results.report();

        // 10 and 11 seconds, not 10.9 and 11.9
        assert_eq!(report.average_job_completion_time, Some(10.5));
        // from 05:00:00.000 to 05:00:12.900
        assert_eq!(report.total_time, Some(12));
    }

    #[test]
    fn failures_are_listed_in_order() {
        let results: RunResults = [
            failure(
                "1",
                JobOutcome::RemoteError {
                    status: StatusCode::BAD_REQUEST,
                },
            ),
            success("2", "2022-09-16T05:36:37.904Z", "2022-09-16T05:46:37.904Z"),
            failure("3", JobOutcome::Timeout),
            failure(
                "4",
                JobOutcome::UnacceptableResult {
                    return_code: "SUCCESS".into(),
                    error_count: 1000,
                },
            ),
        ]
        .into_iter()
        .collect();

        let report = results.report();

        assert_eq!(report.total_jobs, 4);
        assert_eq!(report.success_jobs, 1);
        assert_eq!(report.failed_jobs, 3);
        assert_eq!(
            report.failed_job_details,
            [
                FailedJob {
                    job_request_id: "1".into(),
                    return_code: "ERROR".into(),
                    error_count: 0,
                },
                FailedJob {
                    job_request_id: "3".into(),
                    return_code: "MAX_RETRY_TIME_EXCEEDED".into(),
                    error_count: 0,
                },
                FailedJob {
                    job_request_id: "4".into(),
                    return_code: "SUCCESS".into(),
                    error_count: 1000,
                },
            ]
        );
    }

    #[test]
    fn no_timing_without_successes() {
        let results: RunResults = [failure("1", JobOutcome::Timeout)].into_iter().collect();

        let report = results.report();

        assert_eq!(report.average_job_completion_time, None);
        assert_eq!(report.total_time, None);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["average_job_completion_time"].is_null());
        assert!(json["total_time"].is_null());
    }

    #[test]
    fn empty_run() {
        let report = RunResults::new().report();

        assert_eq!(report.total_jobs, 0);
        assert_eq!(report.success_jobs, 0);
        assert_eq!(report.failed_jobs, 0);
        assert_eq!(report.average_job_completion_time, None);
    }

    #[test]
    fn report_is_idempotent() {
        let results: RunResults = [
            success("1", "2022-09-16T05:36:37.904Z", "2022-09-16T05:46:37.904Z"),
            failure("2", JobOutcome::Timeout),
        ]
        .into_iter()
        .collect();

        assert_eq!(results.report(), results.report());
    }

    #[test]
    fn whole_seconds_drops_days() {
        assert_eq!(whole_seconds(TimeDelta::milliseconds(600_999)), 600);
        assert_eq!(whole_seconds(TimeDelta::days(1) + TimeDelta::seconds(5)), 5);
        assert_eq!(whole_seconds(TimeDelta::zero()), 0);
        // -0.5s is one day minus one second after flooring
        assert_eq!(whole_seconds(TimeDelta::milliseconds(-500)), 86_399);
    }

    #[test]
    fn wire_shape() {
        let results: RunResults = [failure(
            "1",
            JobOutcome::RemoteError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
            },
        )]
        .into_iter()
        .collect();

        let json = serde_json::to_value(results.report()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "total_jobs": 1,
                "success_jobs": 0,
                "failed_jobs": 1,
                "failed_job_details": [
                    {"job_request_id": "1", "return_code": "ERROR", "error_count": 0}
                ],
                "average_job_completion_time": null,
                "total_time": null,
            })
        );
    }
}
