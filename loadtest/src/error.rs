//! Error types of the harness.

/// Errors that abort a load test run.
///
/// Failures of individual jobs are not errors; they are recorded as
/// [`JobOutcome`](crate::report::JobOutcome)s and reported at the end.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An input entry lacks required fields. Raised before any request is sent.
    #[error("input #{index} is missing required fields: {}", missing.join(", "))]
    InvalidInput {
        /// Position of the offending entry in the input list.
        index: usize,
        /// Names of the missing fields.
        missing: Vec<&'static str>,
    },
    /// Any error emitted from the job service client, such as transport errors.
    #[error(transparent)]
    Client(#[from] aggregation_client::Error),
}

/// A convenience alias that defaults our [`Error`] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
