use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::Session;

const GET_JOB: &str = "getJob";

/// Format of the `request_received_at` and `request_updated_at` timestamps.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Lifecycle state of a job, as reported by the job service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum JobStatus {
    /// The job has been accepted but not picked up by a worker yet.
    Received,
    /// A worker is processing the job.
    InProgress,
    /// The job has finished, either successfully or with an error.
    Finished,
    /// Any status this client does not know about.
    Other(String),
}

impl JobStatus {
    /// Returns the status as it appears on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Received => "RECEIVED",
            Self::InProgress => "IN_PROGRESS",
            Self::Finished => "FINISHED",
            Self::Other(other) => other,
        }
    }

    /// Returns `true` once the job has reached its terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "RECEIVED" => Self::Received,
            "IN_PROGRESS" => Self::InProgress,
            "FINISHED" => Self::Finished,
            _ => Self::Other(value),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The normalized status of a job at the time of one `getJob` request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobStatusRecord {
    /// Lifecycle state of the job.
    pub job_status: JobStatus,
    /// The result code of a finished job, or an empty string if the service did not send one.
    pub return_code: String,
    /// Sum of all error counts in the job's error summary.
    pub error_count: u64,
    /// When the job service received the job request.
    pub received_at: DateTime<Utc>,
    /// When the job was last updated. For finished jobs, this is the completion time.
    pub finished_at: DateTime<Utc>,
}

/// The result of a [`get_job`](Session::get_job) request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetJobResponse {
    /// The HTTP status code returned by the job service.
    pub status: StatusCode,
    /// The parsed job status, or `None` if the service responded with an error status.
    pub record: Option<JobStatusRecord>,
}

#[derive(Debug, Deserialize)]
struct JobBody {
    job_status: JobStatus,
    request_received_at: String,
    request_updated_at: String,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    return_code: Option<String>,
    #[serde(default)]
    error_summary: Option<ErrorSummary>,
}

#[derive(Debug, Deserialize)]
struct ErrorSummary {
    #[serde(default)]
    error_counts: Vec<ErrorCount>,
}

#[derive(Debug, Deserialize)]
struct ErrorCount {
    #[serde(default)]
    count: u64,
}

impl JobBody {
    fn into_record(self) -> crate::Result<JobStatusRecord> {
        let (return_code, error_summary) = match self.result_info {
            Some(info) => (info.return_code.unwrap_or_default(), info.error_summary),
            None => (String::new(), None),
        };
        let error_count = error_summary
            .map(|summary| summary.error_counts.iter().map(|error| error.count).sum::<u64>())
            .unwrap_or(0);

        Ok(JobStatusRecord {
            job_status: self.job_status,
            return_code,
            error_count,
            received_at: parse_timestamp(&self.request_received_at)?,
            finished_at: parse_timestamp(&self.request_updated_at)?,
        })
    }
}

/// Parses a timestamp in the job service's `2022-09-16T05:36:37.904Z` format.
pub fn parse_timestamp(value: &str) -> crate::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|source| crate::Error::InvalidTimestamp {
            value: value.to_owned(),
            source,
        })
}

impl Session {
    /// Retrieves the status of the job with the given `job_request_id`.
    pub fn get_job<'a>(&'a self, job_request_id: &'a str) -> GetJobBuilder<'a> {
        GetJobBuilder {
            session: self,
            job_request_id,
        }
    }
}

/// A `getJob` request builder.
#[derive(Debug)]
pub struct GetJobBuilder<'a> {
    session: &'a Session,
    job_request_id: &'a str,
}

impl GetJobBuilder<'_> {
    /// Sends the `getJob` request.
    ///
    /// An error status from the job service is not an error of this method: the status is
    /// returned with an empty [`record`](GetJobResponse::record) and the response body is logged.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request fails to send
    /// - A successful response does not contain a valid job status
    pub async fn send(self) -> crate::Result<GetJobResponse> {
        let query = format!("job_request_id={}", self.job_request_id);
        let response = self
            .session
            .request(reqwest::Method::GET, GET_JOB, &query, None)?
            .send()
            .await?;

        let status = response.status();
        if crate::client::is_error_status(status) {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                job_request_id = self.job_request_id,
                %status,
                %body,
                "job service returned an error"
            );
            return Ok(GetJobResponse {
                status,
                record: None,
            });
        }

        let body: JobBody = response.json().await?;
        Ok(GetJobResponse {
            status,
            record: Some(body.into_record()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_millisecond_timestamps() {
        let parsed = parse_timestamp("2022-09-16T05:36:37.904Z").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2022-09-16T05:36:37.904+00:00");
    }

    #[test]
    fn parses_microsecond_timestamps() {
        let parsed = parse_timestamp("2022-09-16T05:36:37.904123Z").unwrap();
        assert_eq!(parsed.timestamp_subsec_micros(), 904123);
    }

    #[test]
    fn rejects_other_timestamp_formats() {
        let err = parse_timestamp("2022-09-16 05:36:37").unwrap_err();
        assert!(matches!(err, crate::Error::InvalidTimestamp { .. }));
    }

    #[test]
    fn sums_error_counts() {
        let body: JobBody = serde_json::from_str(
            r#"{
                "job_status": "FINISHED",
                "request_received_at": "2022-09-16T05:36:37.904Z",
                "request_updated_at": "2022-09-16T05:46:37.904Z",
                "result_info": {
                    "return_code": "SUCCESS",
                    "error_summary": {"error_counts": [{"count": 3}, {"count": 4, "category": "X"}]}
                }
            }"#,
        )
        .unwrap();

        let record = body.into_record().unwrap();
        assert_eq!(record.job_status, JobStatus::Finished);
        assert_eq!(record.return_code, "SUCCESS");
        assert_eq!(record.error_count, 7);
    }

    #[test]
    fn result_info_is_optional() {
        let body: JobBody = serde_json::from_str(
            r#"{
                "job_status": "IN_PROGRESS",
                "request_received_at": "2022-09-16T05:36:37.904Z",
                "request_updated_at": "2022-09-16T05:36:38.000Z"
            }"#,
        )
        .unwrap();

        let record = body.into_record().unwrap();
        assert_eq!(record.job_status, JobStatus::InProgress);
        assert_eq!(record.return_code, "");
        assert_eq!(record.error_count, 0);
    }

    #[test]
    fn unknown_status_is_kept() {
        let status = JobStatus::from("RUNNING".to_owned());
        assert_eq!(status, JobStatus::Other("RUNNING".into()));
        assert!(!status.is_finished());
        assert_eq!(status.to_string(), "RUNNING");
    }
}
