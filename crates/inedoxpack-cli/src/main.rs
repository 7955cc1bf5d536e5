//! inedoxpack CLI - Packages Inedo extensions into Universal Packages
//!
//! Commands:
//! - `inedoxpack pack` - Create a .upack from compiled extension assemblies
//! - `inedoxpack inspect` - Show the manifest and files of a .upack
//! - `inedoxpack help` - Print usage

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod build;
mod config;
mod discover;
mod error;
mod inspect;
mod pack;
mod package;
mod reconcile;

use config::{DEFAULT_LOG_FILTER, Settings};
use error::PackError;

const USAGE: &str = "\
Usage: inedoxpack pack [SourceDirectory] [Output.upack] [-o] [--name=<name override>] [--version=<version override>] [--icon-url=<icon url override>] [--build=<Debug/Release>]
If SourceDirectory is not specified, the current directory is used.
If an output file is not specified, <PackageName>.upack will be used.
When --build is specified, SourceDirectory must refer to a directory which contains a .csproj file to build.
Set the INEDOXPACK_OUTDIR environment variable to output the package to a different default directory instead of the current directory.";

#[derive(Parser)]
#[command(name = "inedoxpack")]
#[command(author, version, about = "Packages Inedo extensions into Universal Packages", long_about = None)]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a .upack package from compiled extension assemblies
    Pack(pack::PackArgs),

    /// Show the manifest and files of a .upack package
    Inspect {
        /// Path to the package
        package: PathBuf,
    },

    /// Print usage
    Help,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("{USAGE}");
        return ExitCode::from(1);
    };

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => return report(PackError::from(e)),
    };
    init_tracing(&settings.log_filter);

    let result = match command {
        Commands::Pack(args) => pack::run(args, &settings).await,
        Commands::Inspect { package } => inspect::run(&settings.current_dir.join(package)),
        Commands::Help => {
            println!("{USAGE}");
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(e),
    }
}

fn report(error: PackError) -> ExitCode {
    eprintln!("{error}");
    ExitCode::from(error.exit_code())
}

/// Diagnostic logging to stderr; progress output stays on stdout.
fn init_tracing(filter: &str) {
    let env_filter =
        EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
