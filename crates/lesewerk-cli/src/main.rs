// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lesewerk: command-line document analysis client.
//
// Entry point. Loads `.env`, initialises logging, and dispatches to the
// subcommands.

mod analyze;
mod render;
mod show;
mod summary;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::report::ErrorReport;

#[derive(Parser)]
#[command(
    name = "lesewerk",
    about = "Analyze documents with a cloud document intelligence service",
    version
)]
struct Cli {
    /// Load credentials from this file instead of ./.env.
    #[arg(long, global = true, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit documents, wait for the analysis, and print the results.
    Analyze(analyze::AnalyzeArgs),
    /// Print a saved service response.
    Show(show::ShowArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let env_loaded = load_env(cli.env_file.as_deref());

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let outcome = match env_loaded {
        Ok(()) => dispatch(cli.command).await,
        Err(err) => Err(err),
    };
    match outcome {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", ErrorReport::from_error(&err));
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Command) -> Result<ExitCode> {
    match command {
        Command::Analyze(args) => analyze::run(args).await,
        Command::Show(args) => show::run(args).map(|()| ExitCode::SUCCESS),
    }
}

/// An explicit env file must exist; the default `./.env` is optional.
fn load_env(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => dotenvy::from_path(path).map_err(|err| {
            LesewerkError::Config(format!("cannot load env file {}: {err}", path.display()))
        }),
        None => {
            let _ = dotenvy::dotenv();
            Ok(())
        }
    }
}
