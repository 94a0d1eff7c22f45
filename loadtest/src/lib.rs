//! Load test harness for the aggregation job service.
//!
//! The harness has two halves that are usually run one after another:
//!
//! - [`trigger_all`] submits a configurable number of jobs to one or more deployments of the job
//!   service and returns the IDs of the accepted jobs.
//! - [`Checker`] polls every job until it finished or timed out, and rolls the outcomes up into a
//!   [`Report`] with success counts and completion times.
//!
//! A job counts as successful if it finished with one of the [`SUCCESS_CODES`] and without any
//! errors. Jobs that fail, time out, or cannot be queried are listed in the report, but never abort
//! the run. Only incomplete input and transport failures do.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod batch;
pub mod checker;
pub mod cli;
pub mod config;
pub mod error;
pub mod observability;
pub mod poller;
pub mod report;
pub mod summary;
pub mod trigger;

pub use crate::batch::{Batch, BatchInput};
pub use crate::checker::Checker;
pub use crate::error::{Error, Result};
pub use crate::poller::{SUCCESS_CODES, StatusSource, poll_job};
pub use crate::report::{FailedJob, JobOutcome, JobResult, Report, RunResults};
pub use crate::trigger::{JobSink, TriggerInput, TriggerReport, submit_jobs, trigger, trigger_all};
