//! Predictor generation from a parameter file.

use std::path::PathBuf;

use clap::Args;
use pulsephase::config::ConfigFile;
use pulsephase::generator::{self, Generator};
use pulsephase::Parameters;
use tracing::info;

use super::common::{parse_epoch, Backend};
use crate::error::CliError;

/// Arguments for `pulsephase generate`.
#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Timing-model parameter file (.par)
    pub par: PathBuf,

    /// Output predictor file
    #[arg(short, long)]
    pub output: PathBuf,

    /// First epoch to cover, as MJD (defaults to now)
    #[arg(long)]
    pub start: Option<String>,

    /// Last epoch to cover, as MJD (defaults to one day after start)
    #[arg(long)]
    pub end: Option<String>,

    /// Predictor family, overriding predictor.backend
    #[arg(short, long, value_enum)]
    pub backend: Option<Backend>,

    /// Observatory code, overriding tempo.site
    #[arg(short, long)]
    pub site: Option<String>,

    /// Observing frequency in MHz
    #[arg(short, long, conflicts_with = "band")]
    pub frequency: Option<f64>,

    /// Observing band in MHz (low and high edge)
    #[arg(long, num_args = 2, value_names = ["LOW", "HIGH"])]
    pub band: Option<Vec<f64>>,
}

/// Generate a predictor and write it in its native format.
pub fn run(args: GenerateArgs, config: &ConfigFile) -> Result<(), CliError> {
    let mut config = config.clone();
    if let Some(backend) = args.backend {
        config.predictor.backend = backend.into();
    }

    let parameters = Parameters::load(&args.par)?;
    let mut generator = generator::from_config(&config)?;
    generator.set_parameters(&parameters);

    if let Some(site) = &args.site {
        generator.set_site(site);
    }
    match (&args.band, args.frequency) {
        (Some(band), _) if band.len() == 2 => generator.set_frequency_span(band[0], band[1]),
        (_, Some(mhz)) => generator.set_frequency_span(mhz, mhz),
        _ => {}
    }

    let start = args.start.as_deref().map(parse_epoch).transpose()?;
    let end = args.end.as_deref().map(parse_epoch).transpose()?;
    match (start, end) {
        (None, None) => generator.clear_time_span(),
        (Some(start), None) => generator.set_time_span(start, start + 86400.0),
        (None, Some(_)) => return Err(CliError::Argument("--end requires --start".to_string())),
        (Some(start), Some(end)) => generator.set_time_span(start, end),
    }

    let predictor = generator.generate()?;
    predictor.unload(&args.output)?;

    info!(
        source = parameters.name().unwrap_or("unknown"),
        kind = %predictor.kind(),
        segments = predictor.len(),
        output = %args.output.display(),
        "Predictor written"
    );
    println!(
        "Wrote {} predictor with {} segment(s) to {}",
        predictor.kind(),
        predictor.len(),
        args.output.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsephase::{Mjd, Predictor, PredictorKind};

    fn args(dir: &std::path::Path) -> GenerateArgs {
        let par = dir.join("J0437-4715.par");
        std::fs::write(&par, "PSRJ J0437-4715\nF0 173.6879458121843\nPEPOCH 58000\nDM 2.64\n")
            .unwrap();
        GenerateArgs {
            par,
            output: dir.join("J0437-4715.cheb"),
            start: Some("58000".to_string()),
            end: Some("58002".to_string()),
            backend: Some(Backend::Chebyshev),
            site: Some("pks".to_string()),
            frequency: None,
            band: Some(vec![1200.0, 1600.0]),
        }
    }

    #[test]
    fn test_generate_writes_loadable_predictor() {
        let dir = tempfile::tempdir().unwrap();
        let args = args(dir.path());
        let output = args.output.clone();

        run(args, &ConfigFile::default()).unwrap();

        let predictor = Predictor::load(&output).unwrap();
        assert_eq!(predictor.kind(), PredictorKind::Chebyshev);
        assert!(predictor.phase(&Mjd::new(58001, 0, 0.0)).is_ok());
        let frequency = predictor.frequency(&Mjd::new(58000, 43200, 0.0)).unwrap();
        assert!((frequency - 173.6879458121843).abs() < 1e-6);
    }

    #[test]
    fn test_generate_end_needs_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(dir.path());
        args.start = None;

        let err = run(args, &ConfigFile::default()).unwrap_err();
        assert!(matches!(err, CliError::Argument(_)));
    }

    #[test]
    fn test_generate_missing_par_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(dir.path());
        args.par = dir.path().join("absent.par");

        let err = run(args, &ConfigFile::default()).unwrap_err();
        assert!(matches!(err, CliError::Parameters(_)));
    }
}
