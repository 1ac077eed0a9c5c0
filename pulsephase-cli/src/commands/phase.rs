//! Phase queries against a stored predictor.
//!
//! `phase` evaluates pulse phase and spin frequency at the given epochs;
//! `iphase` finds the epoch at which a given phase is reached.

use std::path::PathBuf;

use clap::Args;
use tracing::debug;

use super::common::{load_predictor, parse_epoch, parse_phase};
use crate::error::CliError;

/// Arguments for `pulsephase phase`.
#[derive(Debug, Args)]
pub struct PhaseArgs {
    /// Predictor file (polyco.dat or Chebyshev model)
    #[arg(short, long)]
    pub predictor: PathBuf,

    /// Observing frequency in MHz (Chebyshev predictors only)
    #[arg(short, long)]
    pub frequency: Option<f64>,

    /// Epochs as MJD in fractional days
    #[arg(required = true)]
    pub epochs: Vec<String>,
}

/// Arguments for `pulsephase iphase`.
#[derive(Debug, Args)]
pub struct IphaseArgs {
    /// Predictor file (polyco.dat or Chebyshev model)
    #[arg(short, long)]
    pub predictor: PathBuf,

    /// Observing frequency in MHz (Chebyshev predictors only)
    #[arg(short, long)]
    pub frequency: Option<f64>,

    /// Starting guess for the search, as MJD
    #[arg(short, long)]
    pub guess: Option<String>,

    /// Phases in turns
    #[arg(required = true, allow_negative_numbers = true)]
    pub phases: Vec<String>,
}

/// Print phase, frequency and period at each epoch.
pub fn run_phase(args: PhaseArgs) -> Result<(), CliError> {
    let predictor = load_predictor(&args.predictor, args.frequency)?;
    debug!(
        path = %args.predictor.display(),
        kind = %predictor.kind(),
        segments = predictor.len(),
        "Loaded predictor"
    );

    println!(
        "{:<20}  {:>24}  {:>20}  {:>18}",
        "MJD", "Phase (turns)", "Frequency (Hz)", "Period (s)"
    );
    for text in &args.epochs {
        let epoch = parse_epoch(text)?;
        let phase = predictor.phase(&epoch)?;
        let frequency = predictor.frequency(&epoch)?;
        println!(
            "{:<20}  {:>24}  {:>20.12}  {:>18.15}",
            epoch.to_days_string(12),
            phase.to_string_with(12),
            frequency,
            1.0 / frequency
        );
    }

    Ok(())
}

/// Print the epoch at which each phase is reached.
pub fn run_iphase(args: IphaseArgs) -> Result<(), CliError> {
    let predictor = load_predictor(&args.predictor, args.frequency)?;
    let guess = args.guess.as_deref().map(parse_epoch).transpose()?;

    println!("{:<24}  {:>20}", "Phase (turns)", "MJD");
    for text in &args.phases {
        let phase = parse_phase(text)?;
        let epoch = predictor.iphase(phase, guess)?;
        println!(
            "{:<24}  {:>20}",
            phase.to_string_with(12),
            epoch.to_days_string(15)
        );
    }

    let stats = predictor.solver_stats();
    debug!(
        calls = stats.calls(),
        mean_iterations = stats.mean_iterations(),
        unconverged = stats.unconverged(),
        "Inverse phase solver statistics"
    );

    Ok(())
}
