use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use crate::Session;

const CREATE_JOB: &str = "createJob";

/// Parameters that tell the aggregation worker how to process a job.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParameters {
    /// The reporting origin the reports were sent to.
    pub attribution_report_to: Option<String>,
    /// Blob prefix of the output domain file.
    pub output_domain_blob_prefix: Option<String>,
    /// Bucket containing the output domain file.
    pub output_domain_bucket_name: Option<String>,
    /// Whether to run the job in debug mode, as `"true"` or `"false"`.
    pub debug_run: Option<String>,
}

/// The payload of a `createJob` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateJobRequest {
    /// Caller-chosen unique identifier of the job.
    pub job_request_id: String,
    /// Blob prefix of the encrypted input reports.
    pub input_data_blob_prefix: Option<String>,
    /// Bucket containing the encrypted input reports.
    pub input_data_bucket_name: Option<String>,
    /// Blob prefix the summary report is written to.
    pub output_data_blob_prefix: String,
    /// Bucket the summary report is written to.
    pub output_data_bucket_name: Option<String>,
    /// URL that is notified when the job completes.
    pub postback_url: String,
    /// Processing parameters.
    pub job_parameters: JobParameters,
}

/// The result of a [`create_job`](Session::create_job) request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreateJobResponse {
    /// The HTTP status code returned by the job service.
    pub status: StatusCode,
}

impl CreateJobResponse {
    /// Returns `true` if the job service accepted the job.
    pub fn is_accepted(&self) -> bool {
        !crate::client::is_error_status(self.status)
    }
}

impl Session {
    /// Submits a new job to the job service.
    pub fn create_job<'a>(&'a self, request: &'a CreateJobRequest) -> CreateJobBuilder<'a> {
        CreateJobBuilder {
            session: self,
            request,
        }
    }
}

/// A `createJob` request builder.
#[derive(Debug)]
pub struct CreateJobBuilder<'a> {
    session: &'a Session,
    request: &'a CreateJobRequest,
}

impl CreateJobBuilder<'_> {
    /// Sends the `createJob` request.
    ///
    /// Like [`get_job`](Session::get_job), an error status is returned rather than raised, and the
    /// error body is logged.
    pub async fn send(self) -> crate::Result<CreateJobResponse> {
        let payload = serde_json::to_vec(self.request)?;
        let response = self
            .session
            .request(reqwest::Method::POST, CREATE_JOB, "", Some(&payload))?
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;

        let response_status = response.status();
        let result = CreateJobResponse {
            status: response_status,
        };
        if !result.is_accepted() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                job_request_id = %self.request.job_request_id,
                status = %response_status,
                %body,
                "job service rejected job"
            );
        }

        Ok(result)
    }
}
