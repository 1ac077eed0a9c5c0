//! Two-dimensional Chebyshev segment.
//!
//! A segment covers `[start, end]` in time and `[freq_low, freq_high]` in
//! observing frequency. The time axis maps linearly onto `[-1, 1]`. The
//! frequency axis is linear in `1/f²`, along which dispersive delay is
//! linear, so a two-term frequency series already captures it.
//!
//! The bulk spin term is kept outside the series:
//!
//! ```text
//! φ(t, f) = ref_phase + Δs · ref_frequency + Σ c_ij T_i(x) T_j(y)
//! ```
//!
//! which leaves the series a residual of a few turns at most.

use serde::{Deserialize, Serialize};

use crate::epoch::Mjd;
use crate::error::{PredictError, PredictResult};
use crate::phase::Phase;
use crate::solver::InversePhase;

use super::{dispersion_delay, series, Segment};

/// Default fraction of the segment length by which the invertible phase
/// range extends past each end.
pub const DEFAULT_PHASE_BUFFER: f64 = 0.01;

/// A timing model that can be sampled to build segments.
pub trait PhaseFunction {
    /// Absolute phase at `t` of radiation observed at `mhz`.
    fn phase_at(&self, t: &Mjd, mhz: f64) -> Phase;

    /// Intrinsic spin frequency at `t` in Hz.
    fn frequency_at(&self, t: &Mjd) -> f64;
}

/// Extent and resolution of one segment to be fitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ChebyshevWindow {
    pub source: String,
    pub site: String,
    pub start: Mjd,
    pub end: Mjd,
    /// Lowest observing frequency in MHz.
    pub freq_low: f64,
    /// Highest observing frequency in MHz.
    pub freq_high: f64,
    pub ncoeff_time: usize,
    pub ncoeff_freq: usize,
    /// Dispersion measure times the dispersion constant, in s·MHz².
    pub dispersion_constant: f64,
}

/// Maps observing frequency onto `[-1, 1]` along `1/f²`.
#[derive(Debug, Clone, Copy)]
struct FrequencyAxis {
    low: f64,
    high: f64,
}

impl FrequencyAxis {
    fn is_degenerate(&self) -> bool {
        self.low <= 0.0 || self.high <= self.low
    }

    fn bounds(&self) -> (f64, f64) {
        (1.0 / (self.high * self.high), 1.0 / (self.low * self.low))
    }

    fn normalize(&self, mhz: f64) -> f64 {
        if self.is_degenerate() || mhz <= 0.0 {
            return 0.0;
        }
        let (u_min, u_max) = self.bounds();
        2.0 * (1.0 / (mhz * mhz) - u_min) / (u_max - u_min) - 1.0
    }

    fn denormalize(&self, y: f64) -> f64 {
        if self.is_degenerate() {
            return self.low;
        }
        let (u_min, u_max) = self.bounds();
        let u = u_min + 0.5 * (y + 1.0) * (u_max - u_min);
        1.0 / u.sqrt()
    }
}

/// A fitted two-dimensional Chebyshev segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChebyshevSegment {
    source: String,
    site: String,
    start: Mjd,
    end: Mjd,
    reference_epoch: Mjd,
    ref_phase: Phase,
    ref_frequency: f64,
    freq_low: f64,
    freq_high: f64,
    ncoeff_time: usize,
    ncoeff_freq: usize,
    coefs: Vec<f64>,
    dispersion_constant: f64,
    observing_frequency: f64,
    phase_buffer: f64,
}

impl ChebyshevSegment {
    /// Fit a segment to `model` over `window`.
    pub fn fit(window: &ChebyshevWindow, model: &dyn PhaseFunction) -> PredictResult<Self> {
        if window.end <= window.start {
            return Err(PredictError::invalid_param(
                "ChebyshevSegment::fit",
                format!("empty time span {} - {}", window.start, window.end),
            ));
        }
        if window.ncoeff_time == 0 || window.ncoeff_freq == 0 {
            return Err(PredictError::invalid_param(
                "ChebyshevSegment::fit",
                "coefficient counts must be positive",
            ));
        }

        let axis = FrequencyAxis {
            low: window.freq_low,
            high: window.freq_high,
        };
        let reference_epoch = window.start.midpoint(&window.end);
        let half = window.end.seconds_since(&window.start) / 2.0;
        let ref_phase = model.phase_at(&reference_epoch, axis.denormalize(0.0));
        let ref_frequency = model.frequency_at(&reference_epoch);

        let coefs = series::fit2(window.ncoeff_time, window.ncoeff_freq, |x, y| {
            let t = reference_epoch + x * half;
            let dt = t.seconds_since(&reference_epoch);
            let phase = model.phase_at(&t, axis.denormalize(y));
            (phase - ref_phase - Phase::from_product(dt, ref_frequency)).in_turns()
        });

        Ok(Self {
            source: window.source.clone(),
            site: window.site.clone(),
            start: window.start,
            end: window.end,
            reference_epoch,
            ref_phase,
            ref_frequency,
            freq_low: window.freq_low,
            freq_high: window.freq_high,
            ncoeff_time: window.ncoeff_time,
            ncoeff_freq: window.ncoeff_freq,
            coefs,
            dispersion_constant: window.dispersion_constant,
            observing_frequency: 0.5 * (window.freq_low + window.freq_high),
            phase_buffer: DEFAULT_PHASE_BUFFER,
        })
    }

    pub fn with_phase_buffer(mut self, fraction: f64) -> Self {
        self.phase_buffer = fraction;
        self
    }

    pub fn set_phase_buffer(&mut self, fraction: f64) {
        self.phase_buffer = fraction;
    }

    /// Select the observing frequency (MHz) at which phase is evaluated.
    pub fn set_observing_frequency(&mut self, mhz: f64) {
        self.observing_frequency = mhz;
    }

    pub fn freq_low(&self) -> f64 {
        self.freq_low
    }

    pub fn freq_high(&self) -> f64 {
        self.freq_high
    }

    pub fn ncoeff_time(&self) -> usize {
        self.ncoeff_time
    }

    pub fn ncoeff_freq(&self) -> usize {
        self.ncoeff_freq
    }

    pub fn coefs(&self) -> &[f64] {
        &self.coefs
    }

    /// Describe the first structural inconsistency, if any.
    ///
    /// Deserialized segments are only usable when this is `None`.
    pub fn defect(&self) -> Option<String> {
        if self.ncoeff_time == 0 || self.ncoeff_freq == 0 {
            return Some("coefficient counts must be positive".to_string());
        }
        let expected = self.ncoeff_time.checked_mul(self.ncoeff_freq);
        if expected != Some(self.coefs.len()) {
            return Some(format!(
                "{} x {} grid holds {} coefficients",
                self.ncoeff_time,
                self.ncoeff_freq,
                self.coefs.len()
            ));
        }
        if self.end <= self.start {
            return Some(format!("empty time span {} - {}", self.start, self.end));
        }
        None
    }

    #[cfg(test)]
    pub(crate) fn with_grid_shape(mut self, ncoeff_time: usize, ncoeff_freq: usize) -> Self {
        self.ncoeff_time = ncoeff_time;
        self.ncoeff_freq = ncoeff_freq;
        self
    }

    pub fn phase_buffer(&self) -> f64 {
        self.phase_buffer
    }

    fn axis(&self) -> FrequencyAxis {
        FrequencyAxis {
            low: self.freq_low,
            high: self.freq_high,
        }
    }

    fn half_span(&self) -> f64 {
        self.end.seconds_since(&self.start) / 2.0
    }

    /// Time series at the current observing frequency.
    fn time_series(&self) -> Vec<f64> {
        let y = self.axis().normalize(self.observing_frequency);
        series::collapse(&self.coefs, self.ncoeff_time, self.ncoeff_freq, y)
    }
}

impl InversePhase for ChebyshevSegment {
    fn phase(&self, t: &Mjd) -> Phase {
        let dt = t.seconds_since(&self.reference_epoch);
        let x = dt / self.half_span();
        let residual = series::evaluate(&self.time_series(), x);
        self.ref_phase + Phase::from_product(dt, self.ref_frequency) + residual
    }

    fn frequency(&self, t: &Mjd) -> f64 {
        let half = self.half_span();
        let x = t.seconds_since(&self.reference_epoch) / half;
        let slope = series::evaluate(&series::derivative(&self.time_series()), x);
        self.ref_frequency + slope / half
    }

    fn reference_epoch(&self) -> Mjd {
        self.reference_epoch
    }

    fn reference_phase(&self) -> Phase {
        self.ref_phase
    }

    fn reference_frequency(&self) -> f64 {
        self.ref_frequency
    }
}

impl Segment for ChebyshevSegment {
    fn source(&self) -> &str {
        &self.source
    }

    fn site(&self) -> &str {
        &self.site
    }

    fn start_time(&self) -> Mjd {
        self.start
    }

    fn end_time(&self) -> Mjd {
        self.end
    }

    fn dispersion(&self, t: &Mjd, mhz: f64) -> Phase {
        let delay = dispersion_delay(self.dispersion_constant, mhz, self.observing_frequency);
        Phase::from_turns(delay * self.frequency(t))
    }

    fn observing_frequency(&self) -> f64 {
        self.observing_frequency
    }

    fn matches(&self, other: &Self) -> bool {
        self.source == other.source
            && self.site == other.site
            && self.freq_low == other.freq_low
            && self.freq_high == other.freq_high
    }

    // The buffer widens the invertible phase range only; epoch coverage
    // stays at [start, end].
    fn phase_window(&self) -> (Phase, Phase) {
        let buffer = self.phase_buffer * 2.0 * self.half_span();
        (
            self.phase(&(self.start - buffer)),
            self.phase(&(self.end + buffer)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::DISPERSION_CONSTANT;

    struct Spin {
        epoch: Mjd,
        f0: f64,
        f1: f64,
        k: f64,
    }

    impl PhaseFunction for Spin {
        fn phase_at(&self, t: &Mjd, mhz: f64) -> Phase {
            let d = t.seconds_since(&self.epoch) - self.k / (mhz * mhz);
            Phase::from_product(d, self.f0) + 0.5 * self.f1 * d * d
        }

        fn frequency_at(&self, t: &Mjd) -> f64 {
            self.f0 + self.f1 * t.seconds_since(&self.epoch)
        }
    }

    fn window() -> ChebyshevWindow {
        ChebyshevWindow {
            source: "J1713+0747".to_string(),
            site: "pks".to_string(),
            start: Mjd::new(58000, 0, 0.0),
            end: Mjd::new(58001, 0, 0.0),
            freq_low: 1300.0,
            freq_high: 1500.0,
            ncoeff_time: 12,
            ncoeff_freq: 2,
            dispersion_constant: 16.0 * DISPERSION_CONSTANT,
        }
    }

    fn model() -> Spin {
        Spin {
            epoch: Mjd::new(57990, 0, 0.0),
            f0: 218.8,
            f1: -4.08e-16,
            k: 16.0 * DISPERSION_CONSTANT,
        }
    }

    #[test]
    fn test_fit_reproduces_model_phase() {
        let spin = model();
        let mut segment = ChebyshevSegment::fit(&window(), &spin).unwrap();
        segment.set_observing_frequency(1400.0);

        for offset in [0.0, 1234.5, 43_200.0, 80_000.25, 86_400.0] {
            let t = Mjd::new(58000, 0, 0.0) + offset;
            let diff = segment.phase(&t) - spin.phase_at(&t, 1400.0);
            assert!(diff.in_turns().abs() < 1e-7, "offset {}: {}", offset, diff);
        }
    }

    #[test]
    fn test_fit_tracks_observing_frequency() {
        let spin = model();
        let mut segment = ChebyshevSegment::fit(&window(), &spin).unwrap();
        let t = Mjd::new(58000, 30_000, 0.5);

        for mhz in [1300.0, 1355.0, 1500.0] {
            segment.set_observing_frequency(mhz);
            let diff = segment.phase(&t) - spin.phase_at(&t, mhz);
            assert!(diff.in_turns().abs() < 1e-6, "{} MHz: {}", mhz, diff);
        }
    }

    #[test]
    fn test_frequency_matches_model() {
        let spin = model();
        let segment = ChebyshevSegment::fit(&window(), &spin).unwrap();
        let t = Mjd::new(58000, 10_000, 0.0);
        assert!((segment.frequency(&t) - spin.frequency_at(&t)).abs() < 1e-9);
    }

    #[test]
    fn test_phase_window_extends_past_epoch_range() {
        let segment = ChebyshevSegment::fit(&window(), &model()).unwrap();
        let (low, high) = segment.phase_window();
        assert!(low < segment.phase(&segment.start_time()));
        assert!(high > segment.phase(&segment.end_time()));
        assert!(!segment.covers(&(segment.end_time() + 60.0)));
    }

    #[test]
    fn test_fit_rejects_empty_span() {
        let mut w = window();
        w.end = w.start;
        let err = ChebyshevSegment::fit(&w, &model()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidParam);
    }

    #[test]
    fn test_single_frequency_segment() {
        let mut w = window();
        w.freq_high = w.freq_low;
        w.ncoeff_freq = 1;
        let spin = model();
        let segment = ChebyshevSegment::fit(&w, &spin).unwrap();
        let t = Mjd::new(58000, 50_000, 0.0);
        // the observing frequency defaults to the band centre
        let diff = segment.phase(&t) - spin.phase_at(&t, 1300.0);
        assert!(diff.in_turns().abs() < 1e-7);
    }

    #[test]
    fn test_matches() {
        let a = ChebyshevSegment::fit(&window(), &model()).unwrap();
        let mut w = window();
        w.start = w.end;
        w.end = w.end + 86_400.0;
        let b = ChebyshevSegment::fit(&w, &model()).unwrap();
        let mut other = window();
        other.freq_low = 700.0;
        let c = ChebyshevSegment::fit(&other, &model()).unwrap();
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
    }
}
