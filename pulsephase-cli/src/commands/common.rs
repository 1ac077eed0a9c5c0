//! Argument parsing shared across CLI commands.

use std::path::Path;

use clap::ValueEnum;
use pulsephase::{Mjd, Phase, Predictor, PredictorKind};

use crate::error::CliError;

/// Predictor family selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum Backend {
    /// TEMPO polynomial coefficients (polyco.dat)
    Polyco,
    /// Two-dimensional Chebyshev segments over time and frequency
    Chebyshev,
}

impl From<Backend> for PredictorKind {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Polyco => PredictorKind::Polyco,
            Backend::Chebyshev => PredictorKind::Chebyshev,
        }
    }
}

/// Parse an MJD given in fractional days.
pub fn parse_epoch(text: &str) -> Result<Mjd, CliError> {
    text.parse()
        .map_err(|e: pulsephase::epoch::ParseMjdError| CliError::Argument(e.to_string()))
}

/// Parse a phase in turns, keeping the whole turns exact.
pub fn parse_phase(text: &str) -> Result<Phase, CliError> {
    let invalid = || CliError::Argument(format!("invalid phase '{}'", text));
    let text = text.trim();
    let negative = text.starts_with('-');

    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    let turns: i64 = match whole {
        "" | "-" | "+" => 0,
        _ => whole.parse().map_err(|_| invalid())?,
    };
    let fturns: f64 = if fraction.is_empty() {
        0.0
    } else if fraction.bytes().all(|b| b.is_ascii_digit()) {
        format!("0.{}", fraction).parse().map_err(|_| invalid())?
    } else {
        return Err(invalid());
    };

    Ok(Phase::new(turns, if negative { -fturns } else { fturns }))
}

/// Load a predictor, applying an observing frequency if one is requested.
pub fn load_predictor(path: &Path, frequency: Option<f64>) -> Result<Predictor, CliError> {
    let mut predictor = Predictor::load(path)?;
    if let Some(mhz) = frequency {
        predictor.set_observing_frequency(mhz)?;
    }
    Ok(predictor)
}
