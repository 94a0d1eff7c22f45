//! Test utilities for the load test harness and the aggregation client.
//!
//! This crate provides a fake job service and a logger for tests. See the modules for all
//! available utilities.

pub mod server;
pub mod tracing;
