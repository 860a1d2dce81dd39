//! # stmtcraft CLI
//!
//! Command-line interface for the parser generation agent.
//!
//! Usage:
//!   stmtcraft run --target <bank>
//!   stmtcraft verify --target <bank>
//!
//! Examples:
//!   stmtcraft run --target icici
//!   stmtcraft --provider anthropic --pytest run --target icici
//!   stmtcraft verify --target icici

use clap::{Parser, Subcommand};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use stmtcraft_agent::{
    verify_target, AgentConfig, Progress, PythonRuntime, RefinementController, RunReport, Target,
    Verdict, DEFAULT_EXEC_TIMEOUT_SECS, DEFAULT_PYTHON, DEFAULT_TEMPERATURE,
};
use stmtcraft_error::{Error, ErrorKind};
use stmtcraft_llm::{AnyProvider, LlmProvider, ProviderConfig, ProviderType};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "stmtcraft=info";
const LOG_FILE: &str = "agent.log";

#[derive(Parser)]
#[command(name = "stmtcraft")]
#[command(author, version, about = "stmtcraft - teaches an LLM to parse your bank statements")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding data/ and custom_parser/
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Generation service: groq, openai or anthropic
    #[arg(long, global = true, default_value = "groq")]
    provider: String,

    /// Model name (defaults to the provider's, or STMTCRAFT_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Sampling temperature
    #[arg(long, global = true, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Python interpreter used to run parsers
    #[arg(long, global = true, env = "STMTCRAFT_PYTHON", default_value = DEFAULT_PYTHON)]
    python: String,

    /// Seconds a parser may run before it is killed
    #[arg(long, global = true, default_value_t = DEFAULT_EXEC_TIMEOUT_SECS)]
    exec_timeout: u64,

    /// Run `pytest -q` in the root after a successful run
    #[arg(long, global = true)]
    pytest: bool,

    /// Enable verbose output (debug logs and full failure text)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode - only show the outcome
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a parser, retrying up to 3 times
    Run {
        /// Bank name; samples are read from data/<target>/
        #[arg(short, long)]
        target: String,
    },
    /// Check the existing parser against the sample CSV
    Verify {
        /// Bank name; samples are read from data/<target>/
        #[arg(short, long)]
        target: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    dotenvy::from_path(cli.root.join(".env")).ok();

    if let Err(e) = init_logging(&cli.root, cli.verbose, cli.quiet) {
        eprintln!("Warning: {}", e);
    }

    let config = AgentConfig::default()
        .with_root(cli.root.clone())
        .with_temperature(cli.temperature)
        .with_python(&cli.python)
        .with_exec_timeout(cli.exec_timeout)
        .with_pytest(cli.pytest);
    let config = match &cli.model {
        Some(model) => config.with_model(model),
        None => config,
    };

    let result = match &cli.command {
        Commands::Run { target } => run(&cli, config, target).await,
        Commands::Verify { target } => verify(&cli, config, target).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %e, "fatal");
            eprintln!("Error: {}", e.message());
            if cli.verbose {
                eprintln!("{:?}", e);
            }
            ExitCode::from(2)
        }
    }
}

async fn run(cli: &Cli, config: AgentConfig, target: &str) -> Result<u8, Error> {
    let target = Target::parse(target)?;
    let provider_type: ProviderType = cli.provider.parse()?;
    let provider = AnyProvider::from_config(ProviderConfig::from_env(provider_type)?)?;
    let runtime = PythonRuntime::new(&config.python, config.exec_timeout);

    info!(target = %target, provider = provider.name(), "run requested");

    let quiet = cli.quiet;
    let verbose = cli.verbose;
    let pytest = config.run_pytest;
    let mut controller = RefinementController::new(config, provider, runtime)
        .with_progress(move |event| {
            if !quiet {
                print_progress(event, verbose, pytest);
            }
        });

    let report = controller.run(&target).await?;
    print_outcome(&report, quiet);
    Ok(report.exit_code() as u8)
}

async fn verify(cli: &Cli, config: AgentConfig, target: &str) -> Result<u8, Error> {
    let target = Target::parse(target)?;
    let runtime = PythonRuntime::new(&config.python, config.exec_timeout);

    match verify_target(&config, &runtime, &target).await? {
        Verdict::Pass => {
            if !cli.quiet {
                println!("DataFrame.equals -> True");
            }
            println!("PASS {}", target);
            Ok(0)
        }
        Verdict::Fail(reason) => {
            if !cli.quiet {
                println!("{}", reason);
            }
            println!("FAIL {}", target);
            Ok(1)
        }
    }
}

fn print_progress(event: &Progress<'_>, verbose: bool, pytest: bool) {
    match event {
        Progress::Started { target, columns } => {
            println!("Starting agent for target: {}", target);
            println!("Expected columns: {:?}", columns);
        }
        Progress::AttemptStarted { index, max } => {
            println!("\nAttempt {}/{}", index, max);
        }
        Progress::AttemptFailed { index, failure, retrying } => {
            let text = if verbose {
                failure.description.clone()
            } else {
                truncate(&failure.description, 600)
            };
            println!("Attempt {} failed during {}: {}", index, failure.phase, text);
            if *retrying {
                println!("Retry: refining based on last error...");
            }
        }
        Progress::Succeeded { parser } => {
            println!("\nSuccess! Parser generated: {}", parser.display());
            if pytest {
                println!("Running pytest for verification...");
            }
        }
        Progress::Exhausted { attempts } => {
            println!(
                "\nFailed after {} attempts. Check {} for debug info.",
                attempts, LOG_FILE
            );
        }
    }
}

fn print_outcome(report: &RunReport, quiet: bool) {
    if let Some(code) = report.test_suite_exit {
        println!("pytest exited with status {}", code);
    }
    if !quiet {
        println!(
            "Tokens used: {} over {} call(s)",
            report.usage.total_tokens(),
            report.usage.total_calls
        );
    }
    if quiet {
        let status = if report.succeeded() { "SUCCEEDED" } else { "EXHAUSTED" };
        println!("{} {} ({} attempts)", status, report.target, report.attempts.len());
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}... (truncated, -v for full text)", head)
    }
}

/// stderr shows warnings (debug with -v, errors only with -q); `agent.log`
/// in the root records everything the filter allows.
fn init_logging(root: &Path, verbose: bool, quiet: bool) -> Result<(), Error> {
    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if verbose {
        EnvFilter::new("stmtcraft=debug")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::new("warn")
    };

    let (file_layer, open_error) = match open_log_file(&root.join(LOG_FILE)) {
        Ok(file) => {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(file_filter);
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::config_invalid(format!("failed to init logging: {}", e)))?;

    match open_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn open_log_file(path: &Path) -> Result<File, Error> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            Error::new(ErrorKind::IoFailed, format!("cannot open {}: {}", path.display(), e))
                .with_operation("cli::open_log_file")
                .set_source(e)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_globals() {
        let cli = Cli::try_parse_from([
            "stmtcraft", "--provider", "openai", "--exec-timeout", "30", "--pytest", "run", "--target", "ICICI",
        ])
        .unwrap();
        assert_eq!(cli.provider, "openai");
        assert_eq!(cli.exec_timeout, 30);
        assert!(cli.pytest);
        assert_eq!(cli.temperature, 0.2);
        assert!(matches!(cli.command, Commands::Run { ref target } if target == "ICICI"));
    }

    #[test]
    fn test_parse_verify() {
        let cli = Cli::try_parse_from(["stmtcraft", "verify", "-t", "sbi", "-q"]).unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.root, PathBuf::from("."));
        assert!(matches!(cli.command, Commands::Verify { ref target } if target == "sbi"));
    }

    #[test]
    fn test_target_is_required() {
        assert!(Cli::try_parse_from(["stmtcraft", "run"]).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert!(truncate("abcdefghijkl", 3).starts_with("abc..."));
    }
}
