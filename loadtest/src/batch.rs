//! Input batches of the `check` command.

use std::fmt;

use aggregation_client::{Credentials, Endpoint};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One caller-supplied group of job request IDs sharing an endpoint and credentials, as read from
/// the input file.
///
/// All fields are optional here so that missing fields can be reported together, see
/// [`BatchInput::validate`]. Unknown fields are ignored, which means that the output of the
/// `trigger` command is a valid batch.
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct BatchInput {
    /// Access key ID used for signing.
    pub access_key: Option<String>,
    /// Secret key used for signing.
    pub secret_key: Option<String>,
    /// Host that is signed as part of every request.
    pub host: Option<String>,
    /// Base URL of the job service API.
    pub base_url: Option<String>,
    /// Region that scopes the signature.
    pub region: Option<String>,
    /// Service name that scopes the signature.
    pub service: Option<String>,
    /// The jobs to poll, in order.
    pub job_request_ids: Option<Vec<String>>,
}

impl fmt::Debug for BatchInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchInput")
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[redacted]"))
            .field("host", &self.host)
            .field("base_url", &self.base_url)
            .field("region", &self.region)
            .field("service", &self.service)
            .field("job_request_ids", &self.job_request_ids)
            .finish()
    }
}

/// A validated batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    /// Where and how to reach the job service.
    pub endpoint: Endpoint,
    /// The jobs to poll, in order.
    pub job_request_ids: Vec<String>,
}

impl BatchInput {
    /// Checks that all required fields are present.
    ///
    /// Only presence is checked, empty values are passed on as they are. `index` is the position
    /// of this batch in the input and only used for error reporting.
    pub fn validate(self, index: usize) -> Result<Batch> {
        let mut missing = Vec::new();
        let mut require = |name: &'static str, present: bool| {
            if !present {
                missing.push(name);
            }
        };

        require("access_key", self.access_key.is_some());
        require("base_url", self.base_url.is_some());
        require("host", self.host.is_some());
        require("job_request_ids", self.job_request_ids.is_some());
        require("region", self.region.is_some());
        require("secret_key", self.secret_key.is_some());
        require("service", self.service.is_some());

        let (
            Some(access_key),
            Some(secret_key),
            Some(host),
            Some(base_url),
            Some(region),
            Some(service),
            Some(job_request_ids),
        ) = (
            self.access_key,
            self.secret_key,
            self.host,
            self.base_url,
            self.region,
            self.service,
            self.job_request_ids,
        )
        else {
            return Err(Error::InvalidInput { index, missing });
        };

        Ok(Batch {
            endpoint: Endpoint {
                base_url,
                host,
                region,
                service,
                credentials: Credentials::new(access_key, secret_key),
            },
            job_request_ids,
        })
    }
}

/// Validates all batches, failing on the first one with missing fields.
pub fn validate_all(inputs: Vec<BatchInput>) -> Result<Vec<Batch>> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| input.validate(index))
        .collect()
}
