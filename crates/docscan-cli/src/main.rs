// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docscan — command-line front end for the document scanner.
//
// Entry point. Initialises logging, parses the command line, and dispatches
// to the subcommand handlers.

mod commands;
mod services;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "docscan")]
#[command(about = "Detect, flatten, and capture documents in camera images")]
#[command(version)]
struct Cli {
    /// Scanner config (JSON). Defaults to the file in the data directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the document quad in an image.
    Detect(commands::detect::DetectArgs),

    /// Detect and flatten the document in an image, writing a JPEG.
    Rectify(commands::rectify::RectifyArgs),

    /// Feed a directory of frames through a live scanner session.
    Replay(commands::replay::ReplayArgs),

    /// Write the effective configuration as JSON.
    Config {
        /// Destination file. Prints to stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = services::data_dir::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Detect(args) => commands::detect::run(&args, &config),
        Commands::Rectify(args) => commands::rectify::run(&args, &config),
        Commands::Replay(args) => commands::replay::run(&args, config).await,
        Commands::Config { out } => commands::write_config(&config, out.as_deref()),
    }
}
