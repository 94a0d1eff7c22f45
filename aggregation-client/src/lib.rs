//! # Aggregation Client
//!
//! A client for the aggregation job service's HTTP API. Every request is signed with the
//! `AWS4-HMAC-SHA256` scheme expected by the API gateway in front of the service, see [`auth`].
//!
//! ## Usage
//!
//! ```no_run
//! use aggregation_client::{Client, Credentials, Endpoint};
//!
//! #[tokio::main]
//! # async fn main() -> aggregation_client::Result<()> {
//!     let client = Client::builder().build()?;
//!     let session = client.session(Endpoint {
//!         base_url: "https://abc.execute-api.us-east-1.amazonaws.com".into(),
//!         host: "abc.execute-api.us-east-1.amazonaws.com".into(),
//!         region: "us-east-1".into(),
//!         service: "execute-api".into(),
//!         credentials: Credentials::new("AKIA...", "secret"),
//!     })?;
//!
//!     let response = session.get_job("my-job").send().await?;
//!     if let Some(record) = response.record {
//!         println!("{}: {}", record.job_status, record.return_code);
//!     }
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod auth;
mod client;
mod create;
mod error;
mod get;

pub use auth::Credentials;
pub use reqwest::StatusCode;

pub use client::*;
pub use create::*;
pub use error::*;
pub use get::*;

#[cfg(test)]
mod tests;
