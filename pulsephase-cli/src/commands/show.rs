//! Predictor summary.

use std::path::Path;

use pulsephase::{Mjd, Predictor};

use crate::error::CliError;

fn calendar(epoch: &Mjd) -> String {
    match epoch.to_datetime() {
        Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "out of calendar range".to_string(),
    }
}

/// Print what a predictor file covers.
pub fn run(path: &Path) -> Result<(), CliError> {
    let predictor = Predictor::load(path)?;

    println!("Predictor: {}", path.display());
    println!("  Format:     {}", predictor.kind());
    println!("  Source:     {}", predictor.source().unwrap_or("(unknown)"));
    println!("  Site:       {}", predictor.site().unwrap_or("(unknown)"));
    println!("  Segments:   {}", predictor.len());

    if let (Some(start), Some(end)) = (predictor.start_time(), predictor.end_time()) {
        println!("  Start:      {:.6} ({})", start, calendar(&start));
        println!("  End:        {:.6} ({})", end, calendar(&end));
        println!("  Span:       {:.3} days", end.days_since(&start));
    }
    if let Some(mhz) = predictor.observing_frequency() {
        println!("  Frequency:  {} MHz", mhz);
    }

    Ok(())
}
