//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;

use pulsephase::generator::{EPHEMERIS_FILE, POLYCO_FILE, TZ_FILE};
use pulsephase::predictor::Polyco;
use pulsephase::segment::Polynomial;
use pulsephase::tempo::{FitBackend, ScratchGuard, DIAGNOSTICS_FILE};
use pulsephase::{Mjd, Parameters, Phase, PredictResult};

pub const F0: f64 = 339.31568732824;

/// Epoch at which the mock's phase is zero.
pub fn phase_origin() -> Mjd {
    Mjd::new(58000, 0, 0.0)
}

pub fn parameters() -> Parameters {
    Parameters::parse(&format!(
        "PSRJ           J1909-3744\nF0             {}\nPEPOCH         58000\nDM             10.3932\n",
        F0
    ))
    .unwrap()
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub arguments: Vec<String>,
    pub input: String,
    pub control: String,
    pub ephemeris: String,
}

/// Stands in for TEMPO: writes a constant-frequency polyco over the
/// requested span.
#[derive(Debug, Default)]
pub struct MockTempo {
    /// Seconds of the request left uncovered at its start.
    pub skip: f64,
    /// Written to the diagnostics file when set.
    pub diagnostic: Option<String>,
    pub invocations: RefCell<Vec<Invocation>>,
}

impl MockTempo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skipping(seconds: f64) -> Self {
        Self {
            skip: seconds,
            ..Self::default()
        }
    }

    pub fn runs(&self) -> usize {
        self.invocations.borrow().len()
    }

    pub fn last(&self) -> Invocation {
        self.invocations.borrow().last().cloned().unwrap()
    }
}

fn segments(name: &str, site: &str, nspan: f64, freq: f64, start: Mjd, end: Mjd) -> Vec<Polynomial> {
    let half = nspan * 30.0;
    let mut reftime = start + half;
    let mut out = Vec::new();
    loop {
        let ref_phase = Phase::from_product(reftime.seconds_since(&phase_origin()), F0);
        out.push(
            Polynomial::new(name, reftime, ref_phase, F0, vec![0.0, 0.0, 0.0])
                .with_site(site)
                .with_span(nspan)
                .with_frequency(freq),
        );
        if reftime + half >= end {
            break;
        }
        reftime += 2.0 * half;
    }
    out
}

impl FitBackend for MockTempo {
    fn run(&self, workdir: &ScratchGuard<'_>, arguments: &[String], input: &str) -> PredictResult<()> {
        let control = workdir.read_file(TZ_FILE)?.unwrap_or_default();
        let ephemeris = workdir.read_file(EPHEMERIS_FILE)?.unwrap_or_default();
        self.invocations.borrow_mut().push(Invocation {
            arguments: arguments.to_vec(),
            input: input.to_string(),
            control: control.clone(),
            ephemeris,
        });

        if let Some(message) = &self.diagnostic {
            workdir.write_file(DIAGNOSTICS_FILE, message)?;
            return Ok(());
        }

        let mut header = control.lines().next().unwrap_or_default().split_whitespace();
        let site = header.next().unwrap_or("7").to_string();
        let _maxha = header.next();
        let nspan: f64 = header.next().and_then(|v| v.parse().ok()).unwrap_or(60.0);
        let _ncoef = header.next();
        let freq: f64 = header.next().and_then(|v| v.parse().ok()).unwrap_or(1400.0);
        let name = control.lines().last().unwrap_or("0000+00").trim().to_string();

        let mut span = input.split_whitespace().map(|v| v.parse::<Mjd>().unwrap());
        let (m1, m2) = match (span.next(), span.next()) {
            (Some(m1), Some(m2)) => (m1, m2),
            _ => (phase_origin(), phase_origin() + 86_400.0),
        };
        let start = if (m1 + self.skip) < m2 { m1 + self.skip } else { m2 };

        let polyco = Polyco::from_segments(segments(&name, &site, nspan, freq, start, m2));
        workdir.write_file(POLYCO_FILE, &polyco.to_text())
    }
}
