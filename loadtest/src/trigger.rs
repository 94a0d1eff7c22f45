//! Submits batches of new jobs to the job service.
//!
//! A trigger run sends `num_requests` `createJob` requests with freshly generated job request IDs
//! and returns a [`TriggerReport`]. The report has the same shape as a [`BatchInput`], so the
//! output of `loadtest trigger` can be passed to `loadtest check` as it is.

use std::fmt;
use std::time::Duration;

use aggregation_client::{
    Client, CreateJobRequest, Credentials, Endpoint, JobParameters, Session,
};
use async_trait::async_trait;
use serde::de::{self, Error as _, IntoDeserializer};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::batch::BatchInput;
use crate::error::{Error, Result};

/// Callback URL sent with every job. The load test does not listen for callbacks.
pub const POSTBACK_URL: &str = "fizz.com/api/buzz";

fn default_region() -> String {
    "us-east-1".into()
}

fn default_service() -> String {
    "execute-api".into()
}

fn default_num_requests() -> usize {
    1
}

fn default_time_between_requests() -> Duration {
    Duration::from_secs(10)
}

/// A number that may also be written as a string, such as `5` or `"5"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u64),
    Text(String),
}

fn deserialize_num_requests<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(value) => value,
        NumberOrText::Text(text) => text.trim().parse().map_err(|_| {
            D::Error::invalid_value(de::Unexpected::Str(&text), &"a number of requests")
        })?,
    };
    usize::try_from(value).map_err(de::Error::custom)
}

/// Whole seconds as a number or numeric string, or a duration such as `"1m 30s"`.
fn deserialize_seconds<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(secs) => Ok(Duration::from_secs(secs)),
        NumberOrText::Text(text) => match text.trim().parse() {
            Ok(secs) => Ok(Duration::from_secs(secs)),
            Err(_) => humantime_serde::deserialize(text.as_str().into_deserializer()),
        },
    }
}

/// Where to send jobs and which jobs to send.
#[derive(Clone, Deserialize, Serialize)]
pub struct TriggerInput {
    /// Access key ID used for signing. Required.
    #[serde(default)]
    pub access_key: String,
    /// Secret key used for signing. Required.
    #[serde(default)]
    pub secret_key: String,
    /// Host that is signed as part of every request. Required.
    #[serde(default)]
    pub host: String,
    /// Base URL of the job service API. Required.
    #[serde(default)]
    pub base_url: String,
    /// Region that scopes the signature.
    #[serde(default = "default_region")]
    pub region: String,
    /// Service name that scopes the signature.
    #[serde(default = "default_service")]
    pub service: String,
    /// Number of jobs to create, as a number or numeric string.
    #[serde(
        default = "default_num_requests",
        alias = "numRequests",
        deserialize_with = "deserialize_num_requests"
    )]
    pub num_requests: usize,
    /// Pause between two consecutive requests.
    ///
    /// Plain numbers are whole seconds. Strings may also use the humantime format, e.g. `"2s"`.
    #[serde(
        default = "default_time_between_requests",
        alias = "timeBetweenRequests",
        serialize_with = "humantime_serde::serialize",
        deserialize_with = "deserialize_seconds"
    )]
    pub time_between_requests: Duration,
    /// The job every request creates.
    #[serde(flatten)]
    pub job: JobTemplate,
}

impl fmt::Debug for TriggerInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerInput")
            .field("access_key", &self.access_key)
            .field("secret_key", &"[redacted]")
            .field("host", &self.host)
            .field("base_url", &self.base_url)
            .field("region", &self.region)
            .field("service", &self.service)
            .field("num_requests", &self.num_requests)
            .field("time_between_requests", &self.time_between_requests)
            .field("job", &self.job)
            .finish()
    }
}

impl TriggerInput {
    /// Checks that the required fields are present and not empty.
    pub fn validate(&self, index: usize) -> Result<()> {
        let missing: Vec<&'static str> = [
            ("access_key", &self.access_key),
            ("secret_key", &self.secret_key),
            ("host", &self.host),
            ("base_url", &self.base_url),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidInput { index, missing })
        }
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint {
            base_url: self.base_url.clone(),
            host: self.host.clone(),
            region: self.region.clone(),
            service: self.service.clone(),
            credentials: Credentials::new(self.access_key.clone(), self.secret_key.clone()),
        }
    }
}

/// Template for the jobs created by a trigger run. All fields are passed on to the job service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobTemplate {
    /// Whether to run jobs in debug mode, as `"true"` or `"false"`.
    pub debug_run: Option<String>,
    /// The reporting origin the reports were sent to.
    pub attribution_report_to: Option<String>,
    /// Blob prefix of the encrypted input reports.
    pub input_data_blob_prefix: Option<String>,
    /// Bucket containing the encrypted input reports.
    pub input_data_bucket_name: Option<String>,
    /// Blob prefix for summary reports, below a per-job `output-data/{job_request_id}/` prefix.
    pub output_data_blob_prefix: Option<String>,
    /// Bucket the summary reports are written to.
    pub output_data_bucket_name: Option<String>,
    /// Bucket containing the output domain file.
    pub output_domain_bucket_name: Option<String>,
    /// Blob prefix of the output domain file.
    pub output_domain_blob_prefix: Option<String>,
}

impl JobTemplate {
    /// Creates a job request with a new random job request ID.
    pub fn generate(&self) -> CreateJobRequest {
        self.generate_with_id(Uuid::new_v4().to_string())
    }

    /// Creates a job request with the given job request ID.
    pub fn generate_with_id(&self, job_request_id: String) -> CreateJobRequest {
        let output_data_blob_prefix = format!(
            "output-data/{job_request_id}/{}",
            self.output_data_blob_prefix.as_deref().unwrap_or_default()
        );

        CreateJobRequest {
            job_request_id,
            input_data_blob_prefix: self.input_data_blob_prefix.clone(),
            input_data_bucket_name: self.input_data_bucket_name.clone(),
            output_data_blob_prefix,
            output_data_bucket_name: self.output_data_bucket_name.clone(),
            postback_url: POSTBACK_URL.into(),
            job_parameters: JobParameters {
                attribution_report_to: self.attribution_report_to.clone(),
                output_domain_blob_prefix: self.output_domain_blob_prefix.clone(),
                output_domain_bucket_name: self.output_domain_bucket_name.clone(),
                debug_run: self.debug_run.clone(),
            },
        }
    }
}

/// Result of one trigger run.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TriggerReport {
    /// Number of jobs the job service accepted.
    pub success: usize,
    /// Number of jobs the job service rejected.
    pub failed: usize,
    /// IDs of the accepted jobs, in submission order.
    pub job_request_ids: Vec<String>,
    /// Base URL of the job service API.
    pub base_url: String,
    /// Host that was signed.
    pub host: String,
    /// Signing region.
    pub region: String,
    /// Access key ID.
    pub access_key: String,
    /// Secret key.
    pub secret_key: String,
    /// Signing service name.
    pub service: String,
}

impl fmt::Debug for TriggerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerReport")
            .field("success", &self.success)
            .field("failed", &self.failed)
            .field("job_request_ids", &self.job_request_ids)
            .field("base_url", &self.base_url)
            .field("host", &self.host)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"[redacted]")
            .field("service", &self.service)
            .finish()
    }
}

impl From<TriggerReport> for BatchInput {
    fn from(report: TriggerReport) -> Self {
        Self {
            access_key: Some(report.access_key),
            secret_key: Some(report.secret_key),
            host: Some(report.host),
            base_url: Some(report.base_url),
            region: Some(report.region),
            service: Some(report.service),
            job_request_ids: Some(report.job_request_ids),
        }
    }
}

/// Destination of new jobs.
///
/// Implemented for [`Session`]. Tests substitute a recording sink to avoid real time and network.
#[async_trait]
pub trait JobSink: Send + Sync {
    /// Submits a job and returns whether the job service accepted it.
    async fn submit(&self, request: &CreateJobRequest) -> aggregation_client::Result<bool>;
}

#[async_trait]
impl JobSink for Session {
    async fn submit(&self, request: &CreateJobRequest) -> aggregation_client::Result<bool> {
        let response = self.create_job(request).send().await?;
        Ok(response.is_accepted())
    }
}

/// Validates a trigger input and submits its jobs.
pub async fn trigger(client: &Client, input: TriggerInput) -> Result<TriggerReport> {
    input.validate(0)?;
    run(client, input).await
}

/// Validates all trigger inputs, then runs them one after another.
///
/// If any input is invalid, no request is sent.
pub async fn trigger_all(client: &Client, inputs: Vec<TriggerInput>) -> Result<Vec<TriggerReport>> {
    for (index, input) in inputs.iter().enumerate() {
        input.validate(index)?;
    }

    let mut reports = Vec::with_capacity(inputs.len());
    for input in inputs {
        reports.push(run(client, input).await?);
    }
    Ok(reports)
}

async fn run(client: &Client, input: TriggerInput) -> Result<TriggerReport> {
    let session = client.session(input.endpoint())?;
    Ok(submit_jobs(&session, input).await?)
}

/// Submits `input.num_requests` new jobs to `sink`, pausing between consecutive requests.
///
/// Rejected jobs are counted as failed. Transport errors abort the run.
pub async fn submit_jobs<S>(
    sink: &S,
    input: TriggerInput,
) -> aggregation_client::Result<TriggerReport>
where
    S: JobSink + ?Sized,
{
    let mut success = 0;
    let mut failed = 0;
    let mut job_request_ids = Vec::new();

    for i in 0..input.num_requests {
        if i > 0 {
            tokio::time::sleep(input.time_between_requests).await;
        }

        let request = input.job.generate();

        if sink.submit(&request).await? {
            tracing::info!(job_request_id = %request.job_request_id, "created job");
            success += 1;
            job_request_ids.push(request.job_request_id);
        } else {
            failed += 1;
        }
    }

    tracing::info!(
        base_url = %input.base_url,
        success,
        failed,
        "trigger run finished"
    );

    Ok(TriggerReport {
        success,
        failed,
        job_request_ids,
        base_url: input.base_url,
        host: input.host,
        region: input.region,
        access_key: input.access_key,
        secret_key: input.secret_key,
        service: input.service,
    })
}
