//! Analytic spin-down timing model.

use crate::epoch::{Mjd, SECONDS_PER_DAY};
use crate::error::{PredictError, PredictResult};
use crate::parameters::Parameters;
use crate::phase::Phase;
use crate::segment::{dispersion_delay, ChebyshevSegment, ChebyshevWindow, PhaseFunction, DISPERSION_CONSTANT};

/// Builds Chebyshev segments from timing-model parameters.
pub trait ChebyshevBuilder {
    fn build(&self, parameters: &Parameters, window: &ChebyshevWindow) -> PredictResult<ChebyshevSegment>;
}

/// Phase from a Taylor series in spin frequency about PEPOCH:
///
/// ```text
/// φ(t, f) = F0·d + F1·d²/2 + F2·d³/6 - φ(TZRMJD, TZRFRQ)
/// d       = t - PEPOCH - DM·K/f²
/// ```
///
/// The zero of phase is set at TZRMJD when the parameters give one.
#[derive(Debug, Clone)]
pub struct SpinModel {
    pepoch: Mjd,
    f0: f64,
    f1: f64,
    f2: f64,
    dispersion_constant: f64,
    zero: Phase,
}

impl SpinModel {
    pub fn from_parameters(parameters: &Parameters) -> PredictResult<Self> {
        let frame = "SpinModel::from_parameters";
        let number = |key: &str| {
            parameters
                .number(key)
                .map_err(|e| PredictError::invalid_param(frame, e.to_string()).with_source(e))
        };
        let epoch = |key: &str| -> PredictResult<Option<Mjd>> {
            parameters
                .value(key)
                .map(|v| {
                    v.parse::<Mjd>()
                        .map_err(|e| PredictError::invalid_param(frame, e.to_string()).with_source(e))
                })
                .transpose()
        };

        let f0 = number("F0")?.ok_or_else(|| PredictError::invalid_param(frame, "F0 is required"))?;
        let pepoch = epoch("PEPOCH")?.ok_or_else(|| PredictError::invalid_param(frame, "PEPOCH is required"))?;

        let mut model = Self {
            pepoch,
            f0,
            f1: number("F1")?.unwrap_or(0.0),
            f2: number("F2")?.unwrap_or(0.0),
            dispersion_constant: number("DM")?.unwrap_or(0.0) * DISPERSION_CONSTANT,
            zero: Phase::ZERO,
        };

        if let Some(tzrmjd) = epoch("TZRMJD")? {
            let tzrfrq = number("TZRFRQ")?.unwrap_or(0.0);
            model.zero = model.phase_at(&tzrmjd, tzrfrq);
        }
        Ok(model)
    }

    pub fn pepoch(&self) -> Mjd {
        self.pepoch
    }

    /// DM times the dispersion constant, in s·MHz².
    pub fn dispersion_constant(&self) -> f64 {
        self.dispersion_constant
    }
}

impl PhaseFunction for SpinModel {
    fn phase_at(&self, t: &Mjd, mhz: f64) -> Phase {
        // whole seconds stay exact; only the fraction carries the delay
        let offset = *t - self.pepoch;
        let whole = (offset.intday() * SECONDS_PER_DAY + offset.secs()) as f64;
        let frac = offset.fracsec() - dispersion_delay(self.dispersion_constant, mhz, 0.0);
        let d = whole + frac;

        Phase::from_product(whole, self.f0) + Phase::from_product(frac, self.f0)
            + (0.5 * self.f1 * d * d + self.f2 * d * d * d / 6.0)
            - self.zero
    }

    fn frequency_at(&self, t: &Mjd) -> f64 {
        let d = t.seconds_since(&self.pepoch);
        self.f0 + self.f1 * d + 0.5 * self.f2 * d * d
    }
}

/// [`ChebyshevBuilder`] sampling a [`SpinModel`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinModelBuilder;

impl ChebyshevBuilder for SpinModelBuilder {
    fn build(&self, parameters: &Parameters, window: &ChebyshevWindow) -> PredictResult<ChebyshevSegment> {
        let model = SpinModel::from_parameters(parameters)?;
        ChebyshevSegment::fit(window, &model)
    }
}
