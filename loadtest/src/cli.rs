//! The `loadtest` command line interface.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use aggregation_client::Client;
use anyhow::{Context, Result};
use argh::FromArgs;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::batch::BatchInput;
use crate::checker::Checker;
use crate::config::Config;
use crate::trigger::{TriggerInput, trigger_all};
use crate::{observability, summary};

/// Load test harness for the aggregation job service.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Trigger(TriggerCommand),
    Check(CheckCommand),
    Version(VersionCommand),
}

/// create jobs on the job service
///
/// Reads a YAML or JSON list of trigger inputs and prints one report per input as JSON. The
/// output can be passed to the check command as it is.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "trigger")]
struct TriggerCommand {
    /// path to the YAML or JSON list of trigger inputs
    #[argh(positional)]
    input: PathBuf,

    /// write the JSON result to this file instead of stdout
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,
}

/// wait for jobs to finish and report their outcome
///
/// Reads a YAML or JSON list of batches, polls every job until it finished or timed out, and
/// prints the aggregate report as JSON.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "check")]
struct CheckCommand {
    /// path to the YAML or JSON list of batches
    #[argh(positional)]
    input: PathBuf,

    /// write the JSON result to this file instead of stdout
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,
}

/// print the loadtest version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("main-rt")
        .enable_all()
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config.logging);
    tracing::debug!(?config);

    let client = Client::builder().timeout(config.http.timeout).build()?;

    runtime.block_on(async move {
        match args.command {
            Command::Trigger(TriggerCommand { input, output }) => {
                let inputs: Vec<TriggerInput> = read_input(&input)?;
                let reports = trigger_all(&client, inputs).await?;

                summary::print_trigger_summary(&reports);
                write_output(&reports, output.as_deref())
            }
            Command::Check(CheckCommand { input, output }) => {
                let inputs: Vec<BatchInput> = read_input(&input)?;
                let checker = Checker::new(config.poll, config.concurrency);
                let results = checker.run(&client, inputs).await?;

                let report = results.report();
                summary::print_check_summary(&report, &results.completion_times());
                write_output(&report, output.as_deref())
            }
            Command::Version(VersionCommand {}) => unreachable!(),
        }
    })
}

/// Reads a list of inputs. JSON is accepted as well, since it is valid YAML.
fn read_input<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.display()))?;
    serde_yaml::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse input file {}", path.display()))
}

fn write_output<T: Serialize>(value: &T, path: Option<&Path>) -> Result<()> {
    let mut writer: Box<dyn Write> = match path {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("failed to create output file {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    serde_json::to_writer_pretty(&mut writer, value).context("failed to write output")?;
    writeln!(writer)?;
    writer.flush()?;

    Ok(())
}
