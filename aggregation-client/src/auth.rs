//! Request signing for the aggregation job service.
//!
//! The job service sits behind an API gateway that authenticates every request with an
//! `AWS4-HMAC-SHA256` signature. [`sign`] computes the headers for a single request and is a pure
//! function of its inputs; the caller passes in the current time.

use std::fmt;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const TERMINATOR: &str = "aws4_request";

/// Key pair used to sign requests to the job service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// The public access key ID, sent along in the `Authorization` header.
    pub access_key: String,
    /// The secret key used to derive the signing key. Never sent over the wire.
    pub secret_key: String,
}

impl Credentials {
    /// Creates a new key pair.
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"[redacted]")
            .finish()
    }
}

/// The parts of a request that are covered by the signature.
#[derive(Clone, Copy, Debug)]
pub struct CanonicalRequest<'a> {
    /// The HTTP method, such as `GET`.
    pub method: &'a str,
    /// Value of the `Host` header the API gateway sees.
    pub host: &'a str,
    /// The absolute request path, without the query string.
    pub uri: &'a str,
    /// The query string without the leading `?`, or an empty string.
    pub query: &'a str,
    /// The request body.
    ///
    /// When a body is present, its hash is also signed as `x-amz-content-sha256` header and
    /// returned in [`SignedHeaders::content_sha256`].
    pub payload: Option<&'a [u8]>,
}

/// Headers that authenticate a single request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedHeaders {
    /// Value of the `X-Amz-Date` header.
    pub amz_date: String,
    /// Value of the `Authorization` header.
    pub authorization: String,
    /// Value of the `X-Amz-Content-Sha256` header, only set for requests with a body.
    pub content_sha256: Option<String>,
}

/// Signs a request with the given credentials, scoped to `region` and `service`.
pub fn sign(
    credentials: &Credentials,
    region: &str,
    service: &str,
    request: &CanonicalRequest<'_>,
    now: DateTime<Utc>,
) -> SignedHeaders {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();

    let payload_hash = payload_hash(request.payload.unwrap_or_default());
    let (canonical_headers, signed_headers) = match request.payload {
        Some(_) => (
            format!(
                "host:{}\nx-amz-content-sha256:{payload_hash}\nx-amz-date:{amz_date}\n",
                request.host
            ),
            "host;x-amz-content-sha256;x-amz-date",
        ),
        None => (
            format!("host:{}\nx-amz-date:{amz_date}\n", request.host),
            "host;x-amz-date",
        ),
    };

    let canonical_request = format!(
        "{}\n{}\n{}\n{canonical_headers}\n{signed_headers}\n{payload_hash}",
        request.method, request.uri, request.query
    );

    let scope = format!("{date_stamp}/{region}/{service}/{TERMINATOR}");
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let signing_key = signing_key(&credentials.secret_key, &date_stamp, region, service);
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.access_key
    );

    SignedHeaders {
        amz_date,
        authorization,
        content_sha256: request.payload.map(|_| payload_hash),
    }
}

/// Derives the signing key for one day, region and service.
pub fn signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let date_key = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date_stamp.as_bytes());
    let region_key = hmac_sha256(&date_key, region.as_bytes());
    let service_key = hmac_sha256(&region_key, service.as_bytes());
    hmac_sha256(&service_key, TERMINATOR.as_bytes())
}

/// Returns the hex-encoded SHA-256 digest of a request body.
pub fn payload_hash(payload: &[u8]) -> String {
    sha256_hex(payload)
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so this never fails.
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
