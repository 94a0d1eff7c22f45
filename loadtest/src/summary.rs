//! Human-readable summaries on stderr.

use std::time::Duration;

use sketches_ddsketch::DDSketch;
use yansi::Paint;

use crate::report::Report;
use crate::trigger::TriggerReport;

/// Completion time distribution of the successful jobs of a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Percentiles {
    /// Mean completion time.
    pub avg: Duration,
    /// Median completion time.
    pub p50: Duration,
    /// 90th percentile.
    pub p90: Duration,
    /// 99th percentile.
    pub p99: Duration,
}

impl Percentiles {
    /// Computes the distribution of completion times given in whole seconds.
    ///
    /// Returns `None` if there are no completion times.
    pub fn from_seconds(completion_times: &[i64]) -> Option<Self> {
        let mut sketch = DDSketch::default();
        for &seconds in completion_times {
            sketch.add(seconds as f64);
        }

        let count = sketch.count();
        if count == 0 {
            return None;
        }

        let quantile = |q| sketch.quantile(q).ok().flatten().map(secs);
        Some(Self {
            avg: secs(sketch.sum()? / count as f64),
            p50: quantile(0.5)?,
            p90: quantile(0.9)?,
            p99: quantile(0.99)?,
        })
    }
}

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

/// Prints the outcome of a `check` run.
pub fn print_check_summary(report: &Report, completion_times: &[i64]) {
    eprintln!();
    eprintln!(
        "{} ({} jobs)",
        "## CHECK".bold(),
        report.total_jobs.bold().blue()
    );

    eprint!(
        "{} {}",
        "SUCCESS:".bold().green(),
        report.success_jobs.bold()
    );
    if report.failed_jobs > 0 {
        eprint!(
            ", {}",
            format!("{} FAILURES", report.failed_jobs).bold().red()
        );
    }
    eprintln!();

    for failed in &report.failed_job_details {
        eprintln!(
            "  {} {} (errors: {})",
            failed.job_request_id,
            failed.return_code.red(),
            failed.error_count
        );
    }

    if let Some(total_time) = report.total_time {
        eprintln!("  total time: {}s", total_time.bold());
    }
    if let Some(p) = Percentiles::from_seconds(completion_times) {
        eprintln!(
            "  completion avg: {:.2?}; p50: {:.2?}; p90: {:.2?}; p99: {:.2?}",
            p.avg.bold(),
            p.p50,
            p.p90,
            p.p99
        );
    }
    eprintln!();
}

/// Prints the outcome of a `trigger` run.
pub fn print_trigger_summary(reports: &[TriggerReport]) {
    eprintln!();
    for report in reports {
        eprint!(
            "{} {}: {} created",
            "## TRIGGER".bold(),
            report.base_url.as_str().blue(),
            report.success.bold().green()
        );
        if report.failed > 0 {
            eprint!(", {}", format!("{} FAILED", report.failed).bold().red());
        }
        eprintln!();
    }
    eprintln!();
}
