use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::AUTHORIZATION;
use url::Url;

use crate::auth::{self, CanonicalRequest, Credentials};

const USER_AGENT: &str = concat!("aggregation-client/", env!("CARGO_PKG_VERSION"));

/// Path prefix of all job service endpoints, relative to the base URL.
pub(crate) const API_PREFIX: &str = "/stage/v1alpha";

/// Returns `true` for every status of 400 and above, including non-standard codes.
pub(crate) fn is_error_status(status: reqwest::StatusCode) -> bool {
    status.as_u16() >= 400
}

const HEADER_AMZ_DATE: &str = "X-Amz-Date";
const HEADER_CONTENT_SHA256: &str = "X-Amz-Content-Sha256";

/// Builder to create a [`Client`].
#[must_use]
#[derive(Debug)]
pub struct ClientBuilder {
    reqwest_builder: reqwest::ClientBuilder,
}

impl ClientBuilder {
    /// Creates a new [`ClientBuilder`] with default timeouts.
    pub fn new() -> Self {
        let reqwest_builder = reqwest::Client::builder()
            // The job service sits behind an API gateway on the public internet, so these are
            // a lot more lenient than the timeouts one would use within a data center.
            .connect_timeout(Duration::from_secs(30))
            .read_timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT);

        Self { reqwest_builder }
    }

    /// Sets both the connect and the read timeout for the [`reqwest::Client`].
    /// For more fine-grained configuration, use [`Self::configure_reqwest`].
    pub fn timeout(self, timeout: Duration) -> Self {
        Self {
            reqwest_builder: self
                .reqwest_builder
                .connect_timeout(timeout)
                .read_timeout(timeout),
        }
    }

    /// Calls the closure with the underlying [`reqwest::ClientBuilder`].
    pub fn configure_reqwest<F>(self, closure: F) -> Self
    where
        F: FnOnce(reqwest::ClientBuilder) -> reqwest::ClientBuilder,
    {
        Self {
            reqwest_builder: closure(self.reqwest_builder),
        }
    }

    /// Returns a [`Client`] that uses this [`ClientBuilder`] configuration.
    ///
    /// # Errors
    ///
    /// This method fails if the [`reqwest::Client`] fails to build. Refer to
    /// [`reqwest::ClientBuilder::build`] for more information on when this can happen.
    pub fn build(self) -> crate::Result<Client> {
        Ok(Client {
            inner: Arc::new(ClientInner {
                reqwest: self.reqwest_builder.build()?,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything needed to reach and authenticate against one deployment of the job service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// Base URL of the API, such as `https://abc.execute-api.us-east-1.amazonaws.com`.
    ///
    /// Endpoint paths like `/stage/v1alpha/getJob` are appended to this URL.
    pub base_url: String,
    /// The host that is signed as part of every request.
    pub host: String,
    /// The region that scopes the signature, such as `us-east-1`.
    pub region: String,
    /// The service name that scopes the signature, such as `execute-api`.
    pub service: String,
    /// The key pair used for signing.
    pub credentials: Credentials,
}

#[derive(Debug)]
pub(crate) struct ClientInner {
    reqwest: reqwest::Client,
}

/// A client for the aggregation job service. Use [`Client::builder`] to configure and construct
/// this.
///
/// To perform requests, one has to create a [`Client`], and then bind it to an [`Endpoint`] in
/// order to create a [`Session`]. The client is cheap to clone and shares its connection pool
/// across all sessions.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Convenience function to create a [`ClientBuilder`].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Binds this client to an endpoint and its credentials.
    ///
    /// # Errors
    ///
    /// Fails if the endpoint's base URL cannot be parsed.
    pub fn session(&self, endpoint: Endpoint) -> crate::Result<Session> {
        Url::parse(&endpoint.base_url).map_err(|err| crate::Error::InvalidUrl {
            message: format!("invalid base url `{}`: {err}", endpoint.base_url),
        })?;

        Ok(Session {
            endpoint: Arc::new(endpoint),
            client: self.inner.clone(),
        })
    }
}

/// A [`Client`] bound to one [`Endpoint`]. All requests made through a session are signed with
/// the endpoint's credentials.
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) endpoint: Arc<Endpoint>,
    pub(crate) client: Arc<ClientInner>,
}

impl Session {
    /// The endpoint this session talks to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Creates a signed request for an endpoint below [`API_PREFIX`].
    ///
    /// `query` is appended verbatim and signed exactly as given, so it must already be in
    /// canonical form.
    pub(crate) fn request(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        query: &str,
        payload: Option<&[u8]>,
    ) -> crate::Result<reqwest::RequestBuilder> {
        let path = format!("{API_PREFIX}/{endpoint}");

        let mut url = format!("{}{path}", self.endpoint.base_url.trim_end_matches('/'));
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
        let url = Url::parse(&url).map_err(|err| crate::Error::InvalidUrl {
            message: format!("invalid request url `{url}`: {err}"),
        })?;

        let canonical = CanonicalRequest {
            method: method.as_str(),
            host: &self.endpoint.host,
            uri: &path,
            query,
            payload,
        };
        let signed = auth::sign(
            &self.endpoint.credentials,
            &self.endpoint.region,
            &self.endpoint.service,
            &canonical,
            Utc::now(),
        );

        let mut builder = self
            .client
            .reqwest
            .request(method, url)
            .header(HEADER_AMZ_DATE, signed.amz_date)
            .header(AUTHORIZATION, signed.authorization);
        if let Some(content_sha256) = signed.content_sha256 {
            builder = builder.header(HEADER_CONTENT_SHA256, content_sha256);
        }

        Ok(builder)
    }
}
