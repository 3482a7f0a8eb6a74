//! # FSC CLI
//!
//! Entry point: parse arguments, set up logging, resolve configuration and
//! dispatch to the command handlers in [`fsc::cli`].

use clap::Parser;
use fsc::args::{Cli, Command};
use fsc::cli::{self, CliContext};
use fsc::config::{AppConfig, Overrides};
use fsc::error::CliResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Cli::parse();

    // Logs go to stderr so --json output stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fsc=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(args: Cli) -> CliResult<ExitCode> {
    let overrides = Overrides {
        backend: args.backend,
        asil_d_threshold: args.asil_d_threshold,
        asil_c_threshold: args.asil_c_threshold,
    };
    let config = AppConfig::load(args.config.as_deref(), &overrides)?;
    let ctx = CliContext::new(args.db, config, args.json);

    match args.command {
        Command::Init { name, force } => cli::cmd_init(&ctx, name.as_deref(), force)?,
        Command::Goal(command) => {
            cli::cmd_goal(&ctx, command)?;
        }
        Command::Strategy(command) => {
            cli::cmd_strategy(&ctx, command)?;
        }
        Command::Fsr(command) => {
            cli::cmd_fsr(&ctx, command)?;
        }
        Command::Element(command) => {
            cli::cmd_element(&ctx, command)?;
        }
        Command::Allocate(allocate) => {
            cli::cmd_allocate(&ctx, allocate)?;
        }
        Command::Mechanism(command) => {
            cli::cmd_mechanism(&ctx, command)?;
        }
        Command::Decompose(command) => {
            cli::cmd_decompose(&ctx, command)?;
        }
        Command::Validation(command) => {
            cli::cmd_validation(&ctx, command)?;
        }
        Command::Remove { id } => cli::cmd_remove(&ctx, &id)?,
        Command::Stage(command) => {
            cli::cmd_stage(&ctx, command)?;
        }
        Command::Verify => {
            // Non-compliance is a result, not an error, but scripts need to see it.
            if !cli::cmd_verify(&ctx)?.passed {
                return Ok(ExitCode::from(1));
            }
        }
        Command::Status => cli::cmd_status(&ctx)?,
        Command::Trace { id } => cli::cmd_trace(&ctx, id.as_ref())?,
        Command::Export { output, format } => cli::cmd_export(&ctx, &output, format)?,
        Command::Import { input, force } => cli::cmd_import(&ctx, &input, force)?,
        Command::Document { output } => {
            cli::cmd_document(&ctx, output.as_deref())?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
