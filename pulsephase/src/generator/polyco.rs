//! Polyco generation through TEMPO.

use tracing::{debug, info, warn};

use super::{Generator, PredictorCache};
use crate::config::ConfigFile;
use crate::epoch::{Mjd, SECONDS_PER_DAY};
use crate::error::{PredictError, PredictResult, ResultExt};
use crate::parameters::Parameters;
use crate::predictor::{Polyco, Predictor, PredictorKind};
use crate::segment::DEFAULT_FLEXIBILITY;
use crate::solver::{InverseSolver, DEFAULT_PRECISION};
use crate::tempo::{FitBackend, ScratchDir, ScratchGuard, TempoCommand, DIAGNOSTICS_FILE};

/// Control file read by `tempo -z`.
pub const TZ_FILE: &str = "tz.in";

/// Ephemeris written for the run.
pub const EPHEMERIS_FILE: &str = "pulsar.eph";

/// Output written by `tempo -z`.
pub const POLYCO_FILE: &str = "polyco.dat";

const HALF_DAY: f64 = SECONDS_PER_DAY as f64 / 2.0;

/// Polyco generation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PolycoSettings {
    /// Segment span in minutes.
    pub nspan: u32,
    pub ncoef: u32,
    /// Maximum hour angle in hours.
    pub maxha: u32,
    pub site: String,
    /// Observing frequency in MHz.
    pub frequency: f64,
    /// Check that the result spans the requested epochs.
    pub verify: bool,
    /// Runs allowed while widening the request to achieve coverage.
    pub max_attempts: u32,
    pub flexibility: f64,
    pub precision: f64,
}

impl Default for PolycoSettings {
    fn default() -> Self {
        Self {
            nspan: 960,
            ncoef: 12,
            maxha: 8,
            site: "7".to_string(),
            frequency: 1400.0,
            verify: true,
            max_attempts: 8,
            flexibility: DEFAULT_FLEXIBILITY,
            precision: DEFAULT_PRECISION,
        }
    }
}

impl PolycoSettings {
    pub fn from_config(config: &ConfigFile) -> Self {
        Self {
            nspan: config.tempo.nspan,
            ncoef: config.tempo.ncoef,
            maxha: config.tempo.maxha,
            site: config.tempo.site.clone(),
            frequency: config.tempo.frequency,
            verify: config.tempo.verify,
            max_attempts: config.tempo.max_attempts.max(1),
            flexibility: config.predictor.flexibility,
            precision: config.predictor.precision,
        }
    }

    pub fn with_nspan(mut self, minutes: u32) -> Self {
        self.nspan = minutes;
        self
    }

    pub fn with_ncoef(mut self, ncoef: u32) -> Self {
        self.ncoef = ncoef;
        self
    }

    pub fn with_maxha(mut self, hours: u32) -> Self {
        self.maxha = hours;
        self
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = site.into();
        self
    }

    pub fn with_frequency(mut self, mhz: f64) -> Self {
        self.frequency = mhz;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }
}

/// TEMPO accepts only the numeric part of a source name.
pub fn tempo_name(name: &str) -> &str {
    match name.trim_start_matches(|c: char| !c.is_ascii_digit()) {
        "" => name,
        stripped => stripped,
    }
}

/// Generates polycos by running a [`FitBackend`] in a [`ScratchDir`].
///
/// The last result is cached; changing any setting discards it.
#[derive(Debug)]
pub struct PolycoGenerator<B: FitBackend = TempoCommand> {
    backend: B,
    scratch: ScratchDir,
    settings: PolycoSettings,
    parameters: Option<Parameters>,
    span: Option<(Mjd, Mjd)>,
    cache: PredictorCache,
    runs: u64,
}

impl PolycoGenerator<TempoCommand> {
    /// A generator configured from `config`, running the configured
    /// `tempo` program.
    pub fn from_config(config: &ConfigFile) -> PredictResult<Self> {
        let scratch = match &config.tempo.scratch_dir {
            Some(path) => ScratchDir::new(path),
            None => ScratchDir::resolve_default().context("PolycoGenerator::from_config")?,
        };
        Ok(Self::new(TempoCommand::new(&config.tempo.program), scratch)
            .with_settings(PolycoSettings::from_config(config)))
    }
}

impl<B: FitBackend> PolycoGenerator<B> {
    pub fn new(backend: B, scratch: ScratchDir) -> Self {
        Self {
            backend,
            scratch,
            settings: PolycoSettings::default(),
            parameters: None,
            span: None,
            cache: PredictorCache::new(),
            runs: 0,
        }
    }

    pub fn with_settings(mut self, settings: PolycoSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &PolycoSettings {
        &self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of times the backend has been run.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn cache(&self) -> &PredictorCache {
        &self.cache
    }

    fn update(&mut self, apply: impl FnOnce(&mut PolycoSettings)) {
        let before = self.settings.clone();
        apply(&mut self.settings);
        if self.settings != before {
            self.cache.clear();
        }
    }

    pub fn set_nspan(&mut self, minutes: u32) {
        self.update(|s| s.nspan = minutes);
    }

    pub fn set_ncoef(&mut self, ncoef: u32) {
        self.update(|s| s.ncoef = ncoef);
    }

    pub fn set_maxha(&mut self, hours: u32) {
        self.update(|s| s.maxha = hours);
    }

    pub fn set_frequency(&mut self, mhz: f64) {
        self.update(|s| s.frequency = mhz);
    }

    pub fn set_verify(&mut self, verify: bool) {
        self.update(|s| s.verify = verify);
    }

    /// Contents of the control file.
    fn control_file(&self, psrname: &str) -> String {
        format!(
            "{} {} {} {} {:>8}\n\n\n{}\n",
            self.settings.site,
            self.settings.maxha,
            self.settings.nspan,
            self.settings.ncoef,
            self.settings.frequency,
            tempo_name(psrname),
        )
    }

    /// One write, run, read cycle with the scratch directory held.
    fn run_once(&mut self, parameters: &Parameters, psrname: &str, span: Option<(Mjd, Mjd)>) -> PredictResult<Polyco> {
        let frame = "PolycoGenerator::run_once";
        let guard: ScratchGuard<'_> = self.scratch.lock().context(frame)?;

        guard.remove_file(POLYCO_FILE).context(frame)?;
        guard.remove_file(DIAGNOSTICS_FILE).context(frame)?;
        guard
            .write_file(EPHEMERIS_FILE, &parameters.to_string())
            .context(frame)?;
        guard
            .write_file(TZ_FILE, &self.control_file(psrname))
            .context(frame)?;

        let input = match span {
            Some((m1, m2)) => format!(" {} {}\n", m1.to_days_string(6), m2.to_days_string(6)),
            None => "\n".to_string(),
        };
        let arguments = ["-z", "-f", EPHEMERIS_FILE].map(String::from);

        self.runs += 1;
        self.backend
            .run(&guard, &arguments, &input)
            .context(frame)?;

        if let Some(diagnostics) = guard.read_file(DIAGNOSTICS_FILE).context(frame)? {
            if let Some(line) = diagnostics.lines().find(|l| !l.trim().is_empty()) {
                return Err(PredictError::failed_sys(
                    frame,
                    format!("tempo reported: {}", line.trim()),
                ));
            }
        }

        let text = guard.read_file(POLYCO_FILE).context(frame)?.ok_or_else(|| {
            PredictError::failed_sys(frame, format!("tempo did not write {}", POLYCO_FILE))
        })?;
        drop(guard);

        let mut polyco = Polyco::parse(&text)
            .context(frame)?
            .with_solver(InverseSolver::new().with_precision(self.settings.precision));
        polyco.set_flexibility(self.settings.flexibility);
        debug!(segments = polyco.len(), "Parsed generated polyco");
        Ok(polyco)
    }
}

impl<B: FitBackend> Generator for PolycoGenerator<B> {
    fn kind(&self) -> PredictorKind {
        PredictorKind::Polyco
    }

    fn set_parameters(&mut self, parameters: &Parameters) {
        if self.parameters.as_ref() != Some(parameters) {
            self.cache.clear();
        }
        self.parameters = Some(parameters.clone());
    }

    fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref()
    }

    fn set_site(&mut self, site: &str) {
        self.update(|s| s.site = site.to_string());
    }

    fn set_time_span(&mut self, start: Mjd, end: Mjd) {
        self.span = Some((start, end));
    }

    fn clear_time_span(&mut self) {
        self.span = None;
    }

    /// Polycos are generated at a single frequency: the centre of the band.
    fn set_frequency_span(&mut self, low: f64, high: f64) {
        self.set_frequency(0.5 * (low + high));
    }

    fn configure_like(&mut self, model: &Predictor) {
        let Predictor::Polyco(polyco) = model else {
            return;
        };
        let Some(first) = polyco.segments().first() else {
            return;
        };
        let nspan = first.nspan().round() as u32;
        let ncoef = first.ncoef() as u32;
        let site = first.site.clone();
        let frequency = first.freq();
        self.update(|s| {
            s.nspan = nspan;
            s.ncoef = ncoef;
            s.maxha = 12;
            s.site = site;
            s.frequency = frequency;
        });
    }

    fn generate(&mut self) -> PredictResult<Predictor> {
        let frame = "PolycoGenerator::generate";
        let parameters = self
            .parameters
            .clone()
            .ok_or_else(|| PredictError::invalid_state(frame, "no timing-model parameters set"))?;
        let psrname = parameters
            .name()
            .ok_or_else(|| PredictError::invalid_state(frame, "parameters do not name a source"))?
            .to_string();

        let Some((start, end)) = self.span else {
            info!(source = %psrname, "Generating polyco for an unspecified span");
            return self
                .run_once(&parameters, &psrname, None)
                .map(Predictor::Polyco)
                .context(frame);
        };
        if end < start {
            return Err(PredictError::invalid_param(
                frame,
                format!("time span ends ({}) before it starts ({})", end, start),
            ));
        }

        if let Some(cached) = self.cache.lookup(&start, &end) {
            return Ok(cached);
        }

        let (mut m1, mut m2) = (start, end);
        if m2.days_since(&m1) < 1.0 {
            m1 -= HALF_DAY;
            m2 += HALF_DAY;
        }

        for attempt in 1..=self.settings.max_attempts {
            info!(source = %psrname, start = %m1, end = %m2, attempt, "Generating polyco");
            let polyco = self.run_once(&parameters, &psrname, Some((m1, m2))).context(frame)?;

            let covers_start = polyco.try_phase(&start).is_some();
            let covers_end = polyco.try_phase(&end).is_some();
            if !self.settings.verify || (covers_start && covers_end) {
                let predictor = Predictor::Polyco(polyco);
                self.cache.store(&predictor);
                return Ok(predictor);
            }

            warn!(
                attempt,
                covers_start, covers_end, "Generated polyco does not span the request; widening"
            );
            if !covers_start {
                m1 -= HALF_DAY;
            }
            if !covers_end {
                m2 += HALF_DAY;
            }
        }

        Err(PredictError::invalid_state(
            frame,
            format!(
                "polyco does not span {} - {} after {} attempts",
                start, end, self.settings.max_attempts
            ),
        ))
    }
}
