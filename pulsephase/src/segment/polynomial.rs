//! Polynomial ephemeris segment.

use crate::epoch::Mjd;
use crate::phase::Phase;
use crate::solver::InversePhase;

use super::{dispersion_delay, Segment, DISPERSION_CONSTANT};

/// Default fractional widening of the validity window.
pub const DEFAULT_FLEXIBILITY: f64 = 0.0;

/// One polynomial segment of a polyco file.
///
/// Phase at epoch `t` is
///
/// ```text
/// φ(t) = ref_phase + Δs · f0 + Σ c_i · Δm^i
/// ```
///
/// where `Δs` and `Δm` are the offsets of `t` from the reference epoch in
/// seconds and minutes. The linear term is evaluated in seconds so that an
/// integer number of seconds at an integer spin frequency lands on an
/// integer number of turns.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    pub(crate) psrname: String,
    pub(crate) date: String,
    pub(crate) utc: String,
    pub(crate) reftime: Mjd,
    pub(crate) dm: f64,
    /// Doppler shift in units of 1e-4, as written in the file.
    pub(crate) doppler: f64,
    pub(crate) log_rms: f64,
    pub(crate) ref_phase: Phase,
    pub(crate) f0: f64,
    pub(crate) site: String,
    /// Span of validity in minutes.
    pub(crate) nspan: f64,
    pub(crate) freq: f64,
    pub(crate) binary: Option<(f64, f64)>,
    pub(crate) coefs: Vec<f64>,
    pub(crate) flexibility: f64,
}

impl Polynomial {
    /// Create a segment for `psrname` referenced to `reftime`.
    ///
    /// The span defaults to 960 minutes at 1400 MHz from site "7".
    pub fn new(
        psrname: impl Into<String>,
        reftime: Mjd,
        ref_phase: Phase,
        f0: f64,
        coefs: Vec<f64>,
    ) -> Self {
        Self {
            psrname: psrname.into(),
            date: reftime.date_string(),
            utc: reftime.utc_string(),
            reftime,
            dm: 0.0,
            doppler: 0.0,
            log_rms: 0.0,
            ref_phase,
            f0,
            site: "7".to_string(),
            nspan: 960.0,
            freq: 1400.0,
            binary: None,
            coefs,
            flexibility: DEFAULT_FLEXIBILITY,
        }
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = site.into();
        self
    }

    /// Set the span of validity in minutes.
    pub fn with_span(mut self, minutes: f64) -> Self {
        self.nspan = minutes;
        self
    }

    /// Set the reference observing frequency in MHz.
    pub fn with_frequency(mut self, mhz: f64) -> Self {
        self.freq = mhz;
        self
    }

    pub fn with_dm(mut self, dm: f64) -> Self {
        self.dm = dm;
        self
    }

    /// Set the binary phase and orbital frequency columns.
    pub fn with_binary(mut self, phase: f64, frequency: f64) -> Self {
        self.binary = Some((phase, frequency));
        self
    }

    pub fn with_flexibility(mut self, flexibility: f64) -> Self {
        self.flexibility = flexibility;
        self
    }

    pub fn psrname(&self) -> &str {
        &self.psrname
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn utc(&self) -> &str {
        &self.utc
    }

    pub fn reftime(&self) -> Mjd {
        self.reftime
    }

    pub fn ref_phase(&self) -> Phase {
        self.ref_phase
    }

    pub fn f0(&self) -> f64 {
        self.f0
    }

    /// Span of validity in minutes.
    pub fn nspan(&self) -> f64 {
        self.nspan
    }

    pub fn ncoef(&self) -> usize {
        self.coefs.len()
    }

    pub fn coefs(&self) -> &[f64] {
        &self.coefs
    }

    pub fn freq(&self) -> f64 {
        self.freq
    }

    pub fn dm(&self) -> f64 {
        self.dm
    }

    /// Doppler shift as a plain ratio.
    pub fn doppler_shift(&self) -> f64 {
        self.doppler * 1e-4
    }

    pub fn log_rms_residual(&self) -> f64 {
        self.log_rms
    }

    pub fn binary(&self) -> Option<(f64, f64)> {
        self.binary
    }

    pub fn flexibility(&self) -> f64 {
        self.flexibility
    }

    pub fn set_flexibility(&mut self, flexibility: f64) {
        self.flexibility = flexibility;
    }

    /// Half-width of the validity window in seconds.
    fn half_span(&self) -> f64 {
        self.nspan * (1.0 + self.flexibility) * 30.0
    }

    /// Σ c_i x^i
    fn polynomial(&self, x: f64) -> f64 {
        self.coefs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }

    /// Σ i c_i x^(i-1)
    fn slope(&self, x: f64) -> f64 {
        self.coefs
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .fold(0.0, |acc, (i, &c)| acc * x + i as f64 * c)
    }

    /// Σ i (i-1) c_i x^(i-2)
    fn curvature(&self, x: f64) -> f64 {
        self.coefs
            .iter()
            .enumerate()
            .skip(2)
            .rev()
            .fold(0.0, |acc, (i, &c)| acc * x + (i * (i - 1)) as f64 * c)
    }

    /// Rate of change of spin frequency in Hz/s.
    pub fn chirp(&self, t: &Mjd) -> f64 {
        self.curvature(t.minutes_since(&self.reftime)) / 3600.0
    }

    /// Pulse period in seconds.
    pub fn period(&self, t: &Mjd) -> f64 {
        1.0 / self.frequency(t)
    }
}

impl InversePhase for Polynomial {
    fn phase(&self, t: &Mjd) -> Phase {
        let seconds = t.seconds_since(&self.reftime);
        let minutes = seconds / 60.0;
        self.ref_phase + Phase::from_product(seconds, self.f0) + self.polynomial(minutes)
    }

    fn frequency(&self, t: &Mjd) -> f64 {
        self.f0 + self.slope(t.minutes_since(&self.reftime)) / 60.0
    }

    fn reference_epoch(&self) -> Mjd {
        self.reftime
    }

    fn reference_phase(&self) -> Phase {
        self.ref_phase
    }

    fn reference_frequency(&self) -> f64 {
        self.f0
    }
}

impl Segment for Polynomial {
    fn source(&self) -> &str {
        &self.psrname
    }

    fn site(&self) -> &str {
        &self.site
    }

    fn start_time(&self) -> Mjd {
        self.reftime - self.half_span()
    }

    fn end_time(&self) -> Mjd {
        self.reftime + self.half_span()
    }

    fn dispersion(&self, t: &Mjd, mhz: f64) -> Phase {
        let delay = dispersion_delay(self.dm * DISPERSION_CONSTANT, mhz, self.freq);
        Phase::from_turns(delay * self.frequency(t))
    }

    fn observing_frequency(&self) -> f64 {
        self.freq
    }

    fn matches(&self, other: &Self) -> bool {
        self.psrname == other.psrname && self.site == other.site && self.freq == other.freq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> Mjd {
        Mjd::new(58000, 43200, 0.0)
    }

    #[test]
    fn test_linear_phase_lands_on_whole_turns() {
        let poly = Polynomial::new("1937+21", reference(), Phase::new(100, 0.0), 1.0, vec![0.0; 3]);
        let phase = poly.phase(&(reference() + 1000.0));
        assert_eq!(phase.intturns(), 1100);
        assert!(phase.fracturns().abs() < 1e-12);
    }

    #[test]
    fn test_phase_at_reference_is_reference_phase_plus_constant_term() {
        let poly = Polynomial::new("1937+21", reference(), Phase::new(7, 0.25), 641.9, vec![0.125]);
        assert_eq!(poly.phase(&reference()), Phase::new(7, 0.375));
    }

    #[test]
    fn test_frequency_includes_polynomial_slope() {
        // c1 = 30 turns/minute adds 0.5 Hz
        let poly = Polynomial::new("B0329+54", reference(), Phase::ZERO, 1.399, vec![0.0, 30.0]);
        assert!((poly.frequency(&reference()) - 1.899).abs() < 1e-12);
        assert!((poly.period(&reference()) - 1.0 / 1.899).abs() < 1e-12);
    }

    #[test]
    fn test_chirp_from_quadratic_term() {
        // c2 = 1800 turns/min² gives 2·1800/3600 Hz/s
        let poly = Polynomial::new("B0329+54", reference(), Phase::ZERO, 1.0, vec![0.0, 0.0, 1800.0]);
        assert!((poly.chirp(&reference()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_validity_window() {
        let poly = Polynomial::new("J0437-4715", reference(), Phase::ZERO, 173.7, vec![0.0])
            .with_span(120.0);
        assert!(poly.start_time() == reference() - 3600.0);
        assert!(poly.end_time() == reference() + 3600.0);
        assert!(poly.covers(&(reference() + 3599.0)));
        assert!(!poly.covers(&(reference() + 3601.0)));
    }

    #[test]
    fn test_flexibility_widens_window() {
        let poly = Polynomial::new("J0437-4715", reference(), Phase::ZERO, 173.7, vec![0.0])
            .with_span(120.0)
            .with_flexibility(0.5);
        assert!(poly.covers(&(reference() + 5000.0)));
        assert!(!poly.covers(&(reference() + 5500.0)));
    }

    #[test]
    fn test_dispersion_phase_at_lower_frequency() {
        let poly = Polynomial::new("J0437-4715", reference(), Phase::ZERO, 100.0, vec![0.0])
            .with_dm(2.41e-4)
            .with_frequency(1000.0);
        // delay = 1/500² - 1/1000² seconds, times 100 Hz
        let expected = (1.0 / 250_000.0 - 1.0 / 1_000_000.0) * 100.0;
        let phase = poly.dispersion(&reference(), 500.0);
        assert!((phase.in_turns() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_matches_compares_reference_attributes() {
        let a = Polynomial::new("J0437-4715", reference(), Phase::ZERO, 173.7, vec![0.0]);
        let b = Polynomial::new("J0437-4715", reference() + 3600.0, Phase::ZERO, 173.7, vec![1.0]);
        let c = a.clone().with_frequency(430.0);
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
    }
}
