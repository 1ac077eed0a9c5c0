//! Validity-bounded predictive units.
//!
//! A predictor is assembled from segments, each of which describes pulse
//! phase and spin frequency over a limited span of time:
//!
//! - [`Polynomial`] - a low-order polynomial in minutes from a reference
//!   epoch, as produced by the TEMPO `-z` prediction mode
//! - [`ChebyshevSegment`] - a two-dimensional Chebyshev patch over time and
//!   observing frequency
//!
//! Both implement [`Segment`], which is all that segment selection in
//! [`SegmentSet`](crate::predictor::SegmentSet) needs.

mod chebyshev;
mod polynomial;
pub mod series;

pub use chebyshev::{ChebyshevSegment, ChebyshevWindow, PhaseFunction, DEFAULT_PHASE_BUFFER};
pub use polynomial::{Polynomial, DEFAULT_FLEXIBILITY};

use std::fmt;

use crate::epoch::Mjd;
use crate::phase::Phase;
use crate::solver::InversePhase;

/// Dispersion constant in s·MHz² per unit dispersion measure (pc cm⁻³).
pub const DISPERSION_CONSTANT: f64 = 1.0 / 2.41e-4;

/// Common contract of polynomial and Chebyshev segments.
///
/// Evaluation and the reference epoch used to rank segments come from the
/// [`InversePhase`] supertrait.
pub trait Segment: InversePhase + Clone + fmt::Debug {
    /// Name of the source this segment describes.
    fn source(&self) -> &str;

    /// Observatory site code.
    fn site(&self) -> &str;

    /// First epoch of the validity window.
    fn start_time(&self) -> Mjd;

    /// Last epoch of the validity window.
    fn end_time(&self) -> Mjd;

    /// Phase delay (turns) of radiation at `mhz` relative to the segment's
    /// reference observing frequency.
    fn dispersion(&self, t: &Mjd, mhz: f64) -> Phase;

    /// Observing frequency (MHz) at which phase is predicted.
    fn observing_frequency(&self) -> f64;

    /// True if reference attributes (source, site, frequency) agree.
    fn matches(&self, other: &Self) -> bool;

    /// Whether `t` lies inside the validity window.
    fn covers(&self, t: &Mjd) -> bool {
        self.start_time() <= *t && *t <= self.end_time()
    }

    /// Range of phase over which the segment may be inverted.
    fn phase_window(&self) -> (Phase, Phase) {
        (
            self.phase(&self.start_time()),
            self.phase(&self.end_time()),
        )
    }
}

/// Delay in seconds between `mhz` and `reference_mhz` for a dispersion
/// constant `k` (s·MHz²). Non-positive frequencies are treated as infinite.
pub(crate) fn dispersion_delay(k: f64, mhz: f64, reference_mhz: f64) -> f64 {
    let inverse_square = |f: f64| if f > 0.0 { 1.0 / (f * f) } else { 0.0 };
    k * (inverse_square(mhz) - inverse_square(reference_mhz))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispersion_delay_is_zero_at_reference() {
        assert_eq!(dispersion_delay(1000.0, 1400.0, 1400.0), 0.0);
    }

    #[test]
    fn test_dispersion_delay_grows_at_low_frequency() {
        let k = 10.0 * DISPERSION_CONSTANT;
        let delay = dispersion_delay(k, 700.0, 1400.0);
        let expected = k * (1.0 / 490_000.0 - 1.0 / 1_960_000.0);
        assert!((delay - expected).abs() < 1e-12);
        assert!(delay > 0.0);
    }

    #[test]
    fn test_infinite_frequency_reference() {
        let delay = dispersion_delay(100.0, 10.0, 0.0);
        assert!((delay - 1.0).abs() < 1e-12);
    }
}
