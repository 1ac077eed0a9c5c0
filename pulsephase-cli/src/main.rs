//! pulsephase CLI - Command-line interface
//!
//! Generates phase predictors from timing models and answers phase and
//! inverse-phase queries against them.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use pulsephase::config::{config_file_path, ConfigFile};
use pulsephase::logging;
use tracing::debug;

use commands::config::ConfigCommands;
use commands::generate::GenerateArgs;
use commands::phase::{IphaseArgs, PhaseArgs};
use error::CliError;

#[derive(Parser)]
#[command(name = "pulsephase")]
#[command(version = pulsephase::VERSION)]
#[command(about = "Pulsar phase prediction from timing models", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pulse phase and spin frequency at the given epochs
    Phase(PhaseArgs),

    /// Epochs at which the given phases are reached
    Iphase(IphaseArgs),

    /// Generate a predictor from a parameter file
    Generate(GenerateArgs),

    /// Summarize a predictor file
    Show {
        /// Predictor file (polyco.dat or Chebyshev model)
        predictor: PathBuf,
    },

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let path = cli.config.unwrap_or_else(config_file_path);

    // config commands must still work when the file holds bad values
    let config = match (&cli.command, ConfigFile::load_from(&path)) {
        (_, Ok(config)) => config,
        (Commands::Config { .. }, Err(_)) => ConfigFile::default(),
        (_, Err(e)) => return Err(e.into()),
    };

    let _guard = logging::init(&config.logging, cli.verbose)?;
    debug!(version = pulsephase::VERSION, config = %path.display(), "Starting");

    match cli.command {
        Commands::Phase(args) => commands::phase::run_phase(args),
        Commands::Iphase(args) => commands::phase::run_iphase(args),
        Commands::Generate(args) => commands::generate::run(args, &config),
        Commands::Show { predictor } => commands::show::run(&predictor),
        Commands::Config { command } => commands::config::run(command, &path),
    }
}
