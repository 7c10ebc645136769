//! Build automation tasks for the dirtycheck workspace.
//!
//! Run with: `cargo xtask <command>`
//!
//! # Available Commands
//!
//! - `check`: Run all checks (fmt, clippy, test)
//! - `fmt`: Format code with rustfmt
//! - `lint`: Run clippy with all targets
//! - `test`: Run all tests
//! - `bench`: Run the detector benchmarks
//! - `build`: Build release binary
//! - `clean`: Clean build artifacts
//! - `doc`: Generate documentation

// xtask is a build tool - printing to stderr is expected
#![allow(clippy::print_stderr)]

use std::process::Command;

use anyhow::{bail, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};

/// Build automation for dirtycheck
#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for dirtycheck")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all checks (fmt --check, clippy, test)
    Check,
    /// Format code with rustfmt
    Fmt {
        /// Check formatting without modifying files
        #[arg(long)]
        check: bool,
    },
    /// Run clippy lints
    Lint {
        /// Automatically fix lint warnings
        #[arg(long)]
        fix: bool,
    },
    /// Run all tests
    Test {
        /// Run tests with release optimizations
        #[arg(long)]
        release: bool,
    },
    /// Run the change detection benchmarks
    Bench,
    /// Build release binary
    Build {
        /// Build in debug mode
        #[arg(long)]
        debug: bool,
    },
    /// Clean build artifacts
    Clean,
    /// Generate documentation
    Doc {
        /// Open in browser after building
        #[arg(long)]
        open: bool,
    },
}

/// The workspace root, one level above this crate.
fn workspace_root() -> Result<Utf8PathBuf> {
    Utf8Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Utf8Path::to_path_buf)
        .context("xtask has no parent directory")
}

/// Builds the argument list for a cargo invocation.
fn cargo_args(command: &Commands) -> Vec<Vec<&'static str>> {
    match command {
        Commands::Check => vec![
            vec!["fmt", "--all", "--", "--check"],
            vec!["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
            vec!["test", "--workspace"],
        ],
        Commands::Fmt { check } => {
            let mut args = vec!["fmt", "--all"];
            if *check {
                args.extend(["--", "--check"]);
            }
            vec![args]
        }
        Commands::Lint { fix } => {
            let mut args = vec!["clippy", "--workspace", "--all-targets"];
            if *fix {
                args.extend(["--fix", "--allow-dirty"]);
            }
            args.extend(["--", "-D", "warnings"]);
            vec![args]
        }
        Commands::Test { release } => {
            let mut args = vec!["test", "--workspace"];
            if *release {
                args.push("--release");
            }
            vec![args]
        }
        Commands::Bench => vec![vec!["bench", "-p", "dc-detector", "--bench", "detect_changes"]],
        Commands::Build { debug } => {
            let mut args = vec!["build", "-p", "dc-cli"];
            if !*debug {
                args.push("--release");
            }
            vec![args]
        }
        Commands::Clean => vec![vec!["clean"]],
        Commands::Doc { open } => {
            let mut args = vec!["doc", "--workspace", "--no-deps"];
            if *open {
                args.push("--open");
            }
            vec![args]
        }
    }
}

fn cargo(root: &Utf8Path, args: &[&str]) -> Result<()> {
    let cargo = std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_owned());
    eprintln!("$ cargo {}", args.join(" "));
    let status = Command::new(&cargo)
        .args(args)
        .current_dir(root)
        .status()
        .with_context(|| format!("failed to run {cargo}"))?;
    if !status.success() {
        bail!("cargo {} failed with {status}", args.join(" "));
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = workspace_root()?;

    for args in cargo_args(&cli.command) {
        cargo(&root, &args)?;
    }

    Ok(())
}
