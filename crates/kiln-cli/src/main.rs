//! kiln CLI - incremental build orchestrator for C and C++ projects.

mod build;
mod check;
mod clean;
mod colors;
mod commands;
mod manifest;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kiln_core::{ConfigError, MANIFEST_FILE};

/// Exit code for manifest and command-line errors.
const CONFIG_EXIT_CODE: i32 = 2;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Incremental build orchestrator for C and C++ projects")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the project manifest
    #[arg(short, long, global = true, default_value = MANIFEST_FILE)]
    manifest: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project
    Build {
        /// Rebuild everything in one invocation per target, ignoring the cache
        #[arg(long)]
        full: bool,

        /// Build only this target
        #[arg(short, long)]
        target: Option<String>,

        /// Skip linking when nothing was recompiled
        #[arg(long)]
        relink_when_changed: bool,

        /// Print the build report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the commands a build would run, without running them
    Commands {
        /// Only this target
        #[arg(short, long)]
        target: Option<String>,

        /// Show the full-build commands instead of the incremental ones
        #[arg(long)]
        full: bool,
    },

    /// Validate the manifest and locate the toolchain
    Check,

    /// Remove objects, preprocessed output and fingerprint tables
    Clean,
}

fn main() {
    // A replacement executable started by a self-rebuild gets here first.
    if let Some(result) = kiln_core::run_finalize_if_requested(std::env::args_os()) {
        if let Err(e) = result {
            eprintln!("{}error:{} {}", colors::RED, colors::RESET, e);
            std::process::exit(1);
        }
        return;
    }

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(err) = run(cli) {
        // Child exit codes pass through unchanged.
        std::process::exit(report(&err));
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Build {
            full,
            target,
            relink_when_changed,
            json,
        } => {
            let args = build::BuildArgs {
                full,
                target: target.as_deref(),
                relink_when_changed,
                json,
            };
            if build::execute(&cli.manifest, &args)? == build::Bootstrap::Relaunched {
                tracing::debug!("Exiting so the replacement can take over");
            }
        }

        Commands::Commands { target, full } => {
            commands::execute(&cli.manifest, target.as_deref(), full)?;
        }

        Commands::Check => check::execute(&cli.manifest)?,

        Commands::Clean => clean::execute(&cli.manifest)?,
    }

    Ok(())
}

/// Print an error with any captured toolchain output and pick the exit code.
fn report(err: &anyhow::Error) -> i32 {
    eprintln!("{}error:{} {:#}", colors::RED, colors::RESET, err);

    if let Some(core_err) = err.downcast_ref::<kiln_core::Error>() {
        if let Some((stdout, stderr)) = core_err.captured_output() {
            if !stdout.trim().is_empty() {
                eprintln!("{}", stdout.trim_end());
            }
            if !stderr.trim().is_empty() {
                eprintln!("{}", stderr.trim_end());
            }
        }
        return match core_err {
            kiln_core::Error::Config(_) => CONFIG_EXIT_CODE,
            other => other.exit_code(),
        };
    }
    if err.downcast_ref::<ConfigError>().is_some() {
        return CONFIG_EXIT_CODE;
    }
    1
}
