//! CLI entry point for the dirtycheck engine.
//!
//! Runs JSON scenarios through a change detector and prints what was
//! dispatched, or parses a single expression and prints its canonical form.
//!
//! # Usage
//!
//! ```bash
//! dirtycheck [OPTIONS] <COMMAND>
//!
//! # Run a scenario with the compiled evaluator and verification passes
//! dirtycheck run scenario.json --strategy compiled --strict
//!
//! # Machine-readable output
//! dirtycheck run scenario.json --format json
//!
//! # Print the canonical form of an expression
//! dirtycheck parse "a | pipe:1 + b"
//! dirtycheck parse --interpolation "Hello {{name}}!"
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod scenario;

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::eyre;
use dc_core::{EngineConfig, EvaluatorStrategy};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::scenario::{Scenario, StepReport};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Dirty-checking change detection engine.
///
/// Drives scenarios of watched expressions over a mutable context and
/// reports the grouped changes each pass dispatches.
#[derive(Parser)]
#[command(name = "dirtycheck", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file and print the dispatched groups of every tick.
    Run {
        /// Path to the scenario JSON file.
        scenario: Utf8PathBuf,

        /// Evaluator strategy (overrides the scenario config).
        #[arg(short, long, value_enum, env = "DIRTYCHECK_STRATEGY")]
        strategy: Option<StrategyArg>,

        /// Verify every tick with a no-new-changes pass.
        #[arg(long)]
        strict: bool,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Parse an expression and print its canonical form.
    Parse {
        /// Expression source.
        expression: String,

        /// Parse as `{{ }}` interpolation text.
        #[arg(short, long)]
        interpolation: bool,

        /// Location label used in error messages.
        #[arg(short, long, default_value = "cli")]
        location: String,
    },
}

/// Evaluator strategy accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    /// Walk the expression tree on every check.
    Interpreted,
    /// Lower expressions to closures once.
    Compiled,
}

impl From<StrategyArg> for EvaluatorStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Interpreted => Self::Interpreted,
            StrategyArg::Compiled => Self::Compiled,
        }
    }
}

/// Scenario output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable listing.
    Text,
    /// Pretty-printed JSON array of step reports.
    Json,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `warn` level by default. Logs go
/// to stderr so they never mix with command output.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "warn" };
        EnvFilter::new(level)
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Merges command-line overrides into the scenario's engine config.
fn effective_config(base: EngineConfig, strategy: Option<StrategyArg>, strict: bool) -> EngineConfig {
    EngineConfig {
        strategy: strategy.map_or(base.strategy, EvaluatorStrategy::from),
        enforce_no_new_changes: base.enforce_no_new_changes || strict,
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Runs a scenario file and prints its step reports.
///
/// # Errors
///
/// Returns an error if the scenario cannot be loaded, a binding fails to
/// parse, or a tick fails. Reports of the ticks before a failure are still
/// printed.
fn run_scenario(
    path: &Utf8Path,
    strategy: Option<StrategyArg>,
    strict: bool,
    format: OutputFormat,
) -> color_eyre::Result<()> {
    let scenario = Scenario::from_path(path)?;
    let config = effective_config(scenario.config, strategy, strict);
    info!(path = %path, strategy = config.strategy.label(), "Loaded scenario");

    let reports = scenario.run(config)?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    match format {
        OutputFormat::Text => write_text_report(&mut handle, &reports)?,
        OutputFormat::Json => writeln!(handle, "{}", serde_json::to_string_pretty(&reports)?)?,
    }

    match reports.iter().find_map(|report| report.error.as_deref().map(|error| (report.step, error))) {
        Some((step, error)) => Err(eyre!("Step {step} failed: {error}")),
        None => Ok(()),
    }
}

/// Parses one expression and prints its canonical form.
///
/// # Errors
///
/// Returns the parse error.
fn run_parse(expression: &str, interpolation: bool, location: &str) -> color_eyre::Result<()> {
    let canonical = canonical_form(expression, interpolation, location)?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{canonical}")?;
    Ok(())
}

fn canonical_form(expression: &str, interpolation: bool, location: &str) -> Result<String, dc_expr::ParseError> {
    let ast = if interpolation {
        dc_expr::parse_interpolation(expression, location)?
    } else {
        dc_expr::parse_binding(expression, location)?
    };
    Ok(ast.to_string())
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

/// Writes step reports as an indented listing.
fn write_text_report(out: &mut impl Write, reports: &[StepReport]) -> std::io::Result<()> {
    for report in reports {
        writeln!(out, "step {}", report.step)?;
        if report.groups.is_empty() && report.error.is_none() {
            writeln!(out, "  (no changes)")?;
        }
        for group in &report.groups {
            writeln!(out, "  group {}", group.group)?;
            for change in &group.changes {
                let previous = change
                    .previous
                    .as_ref()
                    .map_or_else(|| "<uninitialized>".to_owned(), ToString::to_string);
                writeln!(out, "    {}: {previous} -> {}", change.binding, change.current)?;
            }
        }
        if let Some(error) = &report.error {
            writeln!(out, "  error: {error}")?;
        }
    }
    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Route to appropriate command
    match &cli.command {
        Commands::Run {
            scenario,
            strategy,
            strict,
            format,
        } => run_scenario(scenario, *strategy, *strict, *format),
        Commands::Parse {
            expression,
            interpolation,
            location,
        } => run_parse(expression, *interpolation, location),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "dirtycheck", "run", "s.json", "--strategy", "compiled", "--strict", "-f", "json",
        ])
        .unwrap();
        let Commands::Run {
            scenario,
            strategy,
            strict,
            format,
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(scenario, "s.json");
        assert_eq!(strategy, Some(StrategyArg::Compiled));
        assert!(strict);
        assert_eq!(format, OutputFormat::Json);
    }

    #[test]
    fn test_parse_arguments_default_location() {
        let cli = Cli::try_parse_from(["dirtycheck", "parse", "a + b", "-i"]).unwrap();
        let Commands::Parse {
            expression,
            interpolation,
            location,
        } = cli.command
        else {
            panic!("expected parse");
        };
        assert_eq!(expression, "a + b");
        assert!(interpolation);
        assert_eq!(location, "cli");
    }

    #[test]
    fn test_flags_override_scenario_config() {
        let base = EngineConfig {
            strategy: EvaluatorStrategy::Compiled,
            enforce_no_new_changes: true,
        };
        assert_eq!(effective_config(base, None, false), base);

        let config = effective_config(EngineConfig::default(), Some(StrategyArg::Compiled), true);
        assert_eq!(config.strategy, EvaluatorStrategy::Compiled);
        assert!(config.enforce_no_new_changes);
    }

    #[test]
    fn test_canonical_form() {
        assert_eq!(canonical_form("a+b", false, "cli").unwrap(), "(a + b)");
        assert_eq!(canonical_form("Hi {{name}}", true, "cli").unwrap(), "Hi {{name}}");
        let err = canonical_form("a +", false, "cli").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parser Error: unexpected end of expression, expected an expression in [a +] in cli"
        );
    }

    #[test]
    fn test_text_report() {
        let scenario = Scenario::from_json_str(
            r#"{
                "context": {"name": "misko", "age": 30},
                "bindings": [
                    {"expression": "name"},
                    {"expression": "age > 40", "id": "old", "group": "flags"},
                    {"expression": "missing", "id": "bad"}
                ],
                "steps": []
            }"#,
        )
        .unwrap();
        let reports = scenario.run(EngineConfig::default()).unwrap();

        let mut out = Vec::new();
        write_text_report(&mut out, &reports).unwrap();
        insta::assert_snapshot!(String::from_utf8(out).unwrap(), @r#"
        step 0
          group default
            name: <uninitialized> -> "misko"
          group flags
            old: <uninitialized> -> false
          error: cannot read field 'missing' of Context in [missing in bindings[2]]
        "#);
    }

    #[test]
    fn test_text_report_without_changes() {
        let reports = Scenario::from_json_str(r#"{"bindings": [{"expression": "1"}], "steps": [{}]}"#)
            .unwrap()
            .run(EngineConfig::default())
            .unwrap();
        let mut out = Vec::new();
        write_text_report(&mut out, &reports).unwrap();
        insta::assert_snapshot!(String::from_utf8(out).unwrap(), @r"
        step 0
          group default
            1: <uninitialized> -> 1
        step 1
          (no changes)
        ");
    }
}
