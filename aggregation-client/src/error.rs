/// Errors that can happen within the aggregation-client
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Any error emitted from the underlying [`reqwest`] client.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// Errors serializing a request payload.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Error when URL manipulation fails.
    #[error("{message}")]
    InvalidUrl {
        /// The URL error message.
        message: String,
    },
    /// A timestamp in a job status response did not match the expected format.
    #[error("invalid timestamp `{value}`: {source}")]
    InvalidTimestamp {
        /// The timestamp as sent by the job service.
        value: String,
        /// The underlying parse error.
        source: chrono::ParseError,
    },
}

/// A convenience alias that defaults our [`Error`] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
