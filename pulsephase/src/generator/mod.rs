//! Predictor generation from timing-model parameters.
//!
//! A [`Generator`] turns a parameter set and a requested time span into a
//! [`Predictor`]:
//!
//! ```text
//!   Parameters ──┐
//!   time span  ──┼──► Generator::generate ──► Predictor
//!   site, band ──┘          │
//!                           └── PredictorCache (last result, strict enclosure)
//! ```
//!
//! [`PolycoGenerator`] drives TEMPO through a [`FitBackend`](crate::tempo::FitBackend);
//! [`ChebyshevGenerator`] fits two-dimensional Chebyshev segments to an
//! analytic spin model.
//!
//! # Example
//!
//! ```ignore
//! let mut generator = generator::from_config(&ConfigFile::load()?)?;
//! generator.set_parameters(&Parameters::load(Path::new("J1909-3744.par"))?);
//! generator.set_time_span(start, end);
//! let predictor = generator.generate()?;
//! ```

mod cache;
mod chebyshev;
mod polyco;
mod spin;

pub use cache::PredictorCache;
pub use chebyshev::{ChebyshevGenerator, ChebyshevSettings};
pub use polyco::{tempo_name, PolycoGenerator, PolycoSettings, EPHEMERIS_FILE, POLYCO_FILE, TZ_FILE};
pub use spin::{ChebyshevBuilder, SpinModel, SpinModelBuilder};

use tracing::debug;

use crate::config::ConfigFile;
use crate::epoch::Mjd;
use crate::error::{PredictResult, ResultExt};
use crate::parameters::Parameters;
use crate::predictor::{Predictor, PredictorKind};

/// Produces predictors for one source at a time.
pub trait Generator {
    /// Family of the predictors produced.
    fn kind(&self) -> PredictorKind;

    fn set_parameters(&mut self, parameters: &Parameters);

    fn parameters(&self) -> Option<&Parameters>;

    fn set_site(&mut self, site: &str);

    /// Epochs the next predictor must span.
    fn set_time_span(&mut self, start: Mjd, end: Mjd);

    /// Let the generator choose the span.
    fn clear_time_span(&mut self);

    /// Observing band in MHz.
    fn set_frequency_span(&mut self, low: f64, high: f64);

    /// Adopt the layout of an existing predictor so that newly generated
    /// segments can be merged with it. Predictors of another family are
    /// ignored.
    fn configure_like(&mut self, model: &Predictor);

    fn generate(&mut self) -> PredictResult<Predictor>;
}

impl<G: Generator + ?Sized> Generator for Box<G> {
    fn kind(&self) -> PredictorKind {
        (**self).kind()
    }

    fn set_parameters(&mut self, parameters: &Parameters) {
        (**self).set_parameters(parameters)
    }

    fn parameters(&self) -> Option<&Parameters> {
        (**self).parameters()
    }

    fn set_site(&mut self, site: &str) {
        (**self).set_site(site)
    }

    fn set_time_span(&mut self, start: Mjd, end: Mjd) {
        (**self).set_time_span(start, end)
    }

    fn clear_time_span(&mut self) {
        (**self).clear_time_span()
    }

    fn set_frequency_span(&mut self, low: f64, high: f64) {
        (**self).set_frequency_span(low, high)
    }

    fn configure_like(&mut self, model: &Predictor) {
        (**self).configure_like(model)
    }

    fn generate(&mut self) -> PredictResult<Predictor> {
        (**self).generate()
    }
}

/// The generator selected by `predictor.backend` in `config`.
pub fn from_config(config: &ConfigFile) -> PredictResult<Box<dyn Generator>> {
    debug!(backend = %config.predictor.backend, "Creating predictor generator");
    Ok(match config.predictor.backend {
        PredictorKind::Polyco => {
            Box::new(PolycoGenerator::from_config(config).context("generator::from_config")?)
        }
        PredictorKind::Chebyshev => Box::new(ChebyshevGenerator::from_config(config)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_selects_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ConfigFile::default();
        config.tempo.scratch_dir = Some(dir.path().to_path_buf());

        let generator = from_config(&config).unwrap();
        assert_eq!(generator.kind(), PredictorKind::Polyco);

        config.predictor.backend = PredictorKind::Chebyshev;
        let generator = from_config(&config).unwrap();
        assert_eq!(generator.kind(), PredictorKind::Chebyshev);
    }

    #[test]
    fn test_boxed_generator_forwards() {
        let mut generator: Box<dyn Generator> = Box::new(ChebyshevGenerator::default());
        assert!(generator.parameters().is_none());

        let params = Parameters::parse("PSRJ J0437-4715\nF0 173.68\nPEPOCH 58000\n").unwrap();
        generator.set_parameters(&params);
        assert_eq!(generator.parameters(), Some(&params));
    }
}
