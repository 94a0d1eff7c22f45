//! Configuration for the load test harness.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `LOADTEST__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! Environment variables use double underscores (`__`) to denote nested configuration structures,
//! for example `LOADTEST__POLL__TIMEOUT=10m`. The same in YAML:
//!
//! ```yaml
//! poll:
//!   timeout: 10m
//! ```
//!
//! The configuration only controls *how* the harness runs. The batches and trigger requests to
//! run are passed as input files to the individual commands.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "LOADTEST__";

/// Polling behavior while waiting for jobs to finish.
///
/// Used in: [`Config::poll`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Poll {
    /// Time to wait between two status requests for a job that has not finished yet.
    ///
    /// # Default
    ///
    /// `1s`
    ///
    /// # Environment Variable
    ///
    /// `LOADTEST__POLL__INTERVAL`
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Time after the first status request at which a job that has not finished is given up.
    ///
    /// # Default
    ///
    /// `5m`
    ///
    /// # Environment Variable
    ///
    /// `LOADTEST__POLL__TIMEOUT`
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for Poll {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// HTTP client configuration.
///
/// Used in: [`Config::http`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Http {
    /// Connect and read timeout for every request to the job service.
    ///
    /// # Default
    ///
    /// `30s`
    ///
    /// # Environment Variable
    ///
    /// `LOADTEST__HTTP__TIMEOUT`
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for Http {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether output is to a TTY.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    ///
    /// ```text
    ///  INFO  loadtest::checker > job finished
    /// ```
    Pretty,

    /// Simplified plain text output.
    ///
    /// ```text
    /// 2022-09-16T05:46:37Z [loadtest::checker] INFO: job finished
    /// ```
    Simplified,

    /// Dump out JSON lines.
    Json,
}

/// The logging format parse error.
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as format: expected one of "auto", "pretty", "simplified", "json""#,
            self.0
        )
    }
}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

impl std::error::Error for FormatParseError {}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr, so that stdout only carries the command's result.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable provides more granular control per module if needed.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `LOADTEST__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format. See [`LogFormat`] for available options.
    ///
    /// # Default
    ///
    /// `Auto` (pretty for TTY, simplified otherwise)
    ///
    /// # Environment Variable
    ///
    /// `LOADTEST__LOGGING__FORMAT`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Main configuration struct for the load test harness.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Polling behavior of the `check` command.
    pub poll: Poll,

    /// Maximum number of jobs polled at the same time.
    ///
    /// With the default of `1`, jobs are polled strictly one after another. Results are always
    /// reported in input order.
    ///
    /// # Default
    ///
    /// `1`
    ///
    /// # Environment Variable
    ///
    /// `LOADTEST__CONCURRENCY`
    pub concurrency: usize,

    /// HTTP client configuration.
    pub http: Http,

    /// Logging configuration.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll: Poll::default(),
            concurrency: 1,
            http: Http::default(),
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the provided arguments.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if provided in `args`)
    /// 3. Environment variables (prefixed with `LOADTEST__`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The YAML configuration file cannot be read or parsed
    /// - Environment variables contain invalid values
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_poll_timing() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert_eq!(config.poll.interval, Duration::from_secs(1));
            assert_eq!(config.poll.timeout, Duration::from_secs(300));
            assert_eq!(config.concurrency, 1);
            assert_eq!(config.logging.level, LevelFilter::INFO);
            assert_eq!(config.logging.format, LogFormat::Auto);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("LOADTEST__POLL__INTERVAL", "250ms");
            jail.set_env("LOADTEST__POLL__TIMEOUT", "10m");
            jail.set_env("LOADTEST__CONCURRENCY", "8");
            jail.set_env("LOADTEST__LOGGING__LEVEL", "debug");
            jail.set_env("LOADTEST__LOGGING__FORMAT", "json");

            let config = Config::load(None).unwrap();

            assert_eq!(config.poll.interval, Duration::from_millis(250));
            assert_eq!(config.poll.timeout, Duration::from_secs(600));
            assert_eq!(config.concurrency, 8);
            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);

            Ok(())
        });
    }

    #[test]
    fn configured_with_env_and_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            poll:
                interval: 2s
                timeout: 1m
            http:
                timeout: 5s
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("LOADTEST__POLL__TIMEOUT", "3m");

            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(config.poll.interval, Duration::from_secs(2));
            // Env should overwrite the yaml config
            assert_eq!(config.poll.timeout, Duration::from_secs(180));
            assert_eq!(config.http.timeout, Duration::from_secs(5));

            Ok(())
        });
    }

    #[test]
    fn rejects_unknown_log_format() {
        let err = "fancy".parse::<LogFormat>().unwrap_err();
        assert!(err.to_string().contains("fancy"));
    }
}
