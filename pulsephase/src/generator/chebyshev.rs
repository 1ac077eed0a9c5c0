//! Chebyshev predictor generation.

use tracing::{debug, info};

use super::spin::{ChebyshevBuilder, SpinModelBuilder};
use super::{Generator, PredictorCache};
use crate::config::ConfigFile;
use crate::epoch::{Mjd, SECONDS_PER_DAY};
use crate::error::{PredictError, PredictResult, ResultExt};
use crate::parameters::Parameters;
use crate::predictor::{ChebyModelSet, Predictor, PredictorKind};
use crate::segment::{ChebyshevWindow, Segment, DEFAULT_PHASE_BUFFER, DISPERSION_CONSTANT};
use crate::solver::{InverseSolver, DEFAULT_PRECISION};

const DAY: f64 = SECONDS_PER_DAY as f64;

/// Chebyshev generation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ChebyshevSettings {
    /// Length of each segment in days.
    pub segment_days: f64,
    pub ncoeff_time: usize,
    pub ncoeff_freq: usize,
    pub phase_buffer: f64,
    pub precision: f64,
}

impl Default for ChebyshevSettings {
    fn default() -> Self {
        Self {
            segment_days: 1.0,
            ncoeff_time: 12,
            ncoeff_freq: 2,
            phase_buffer: DEFAULT_PHASE_BUFFER,
            precision: DEFAULT_PRECISION,
        }
    }
}

impl ChebyshevSettings {
    pub fn from_config(config: &ConfigFile) -> Self {
        Self {
            segment_days: config.chebyshev.segment_days,
            ncoeff_time: config.chebyshev.ncoeff_time,
            ncoeff_freq: config.chebyshev.ncoeff_freq,
            phase_buffer: config.chebyshev.phase_buffer,
            precision: config.predictor.precision,
        }
    }

    pub fn with_segment_days(mut self, days: f64) -> Self {
        self.segment_days = days;
        self
    }

    pub fn with_coefficients(mut self, ncoeff_time: usize, ncoeff_freq: usize) -> Self {
        self.ncoeff_time = ncoeff_time;
        self.ncoeff_freq = ncoeff_freq;
        self
    }
}

/// Generates [`ChebyModelSet`] predictors over a time and frequency range.
#[derive(Debug)]
pub struct ChebyshevGenerator<B: ChebyshevBuilder = SpinModelBuilder> {
    builder: B,
    settings: ChebyshevSettings,
    site: String,
    freq_low: f64,
    freq_high: f64,
    parameters: Option<Parameters>,
    span: Option<(Mjd, Mjd)>,
    cache: PredictorCache,
}

impl Default for ChebyshevGenerator<SpinModelBuilder> {
    fn default() -> Self {
        Self::new(SpinModelBuilder)
    }
}

impl ChebyshevGenerator<SpinModelBuilder> {
    pub fn from_config(config: &ConfigFile) -> Self {
        let mut generator =
            Self::new(SpinModelBuilder).with_settings(ChebyshevSettings::from_config(config));
        generator.site = config.tempo.site.clone();
        generator.freq_low = config.tempo.frequency;
        generator.freq_high = config.tempo.frequency;
        generator
    }
}

impl<B: ChebyshevBuilder> ChebyshevGenerator<B> {
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            settings: ChebyshevSettings::default(),
            site: "coe".to_string(),
            freq_low: 1400.0,
            freq_high: 1400.0,
            parameters: None,
            span: None,
            cache: PredictorCache::new(),
        }
    }

    pub fn with_settings(mut self, settings: ChebyshevSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ChebyshevSettings {
        &self.settings
    }

    pub fn cache(&self) -> &PredictorCache {
        &self.cache
    }

    pub fn frequency_span(&self) -> (f64, f64) {
        (self.freq_low, self.freq_high)
    }

    fn build_set(
        &self,
        parameters: &Parameters,
        source: &str,
        m1: Mjd,
        m2: Mjd,
    ) -> PredictResult<ChebyModelSet> {
        let segment_seconds = self.settings.segment_days.max(1e-3) * DAY;
        let total = m2.seconds_since(&m1);
        let count = (total / segment_seconds).ceil().max(1.0) as usize;
        let length = total / count as f64;
        let dispersion_constant = parameters
            .number("DM")
            .map_err(|e| {
                PredictError::invalid_param("ChebyshevGenerator::build_set", e.to_string())
            })?
            .unwrap_or(0.0)
            * DISPERSION_CONSTANT;

        let mut segments = Vec::with_capacity(count);
        for i in 0..count {
            let window = ChebyshevWindow {
                source: source.to_string(),
                site: self.site.clone(),
                start: m1 + i as f64 * length,
                end: if i + 1 == count { m2 } else { m1 + (i + 1) as f64 * length },
                freq_low: self.freq_low,
                freq_high: self.freq_high,
                ncoeff_time: self.settings.ncoeff_time,
                ncoeff_freq: self.settings.ncoeff_freq,
                dispersion_constant,
            };
            segments.push(self.builder.build(parameters, &window)?);
        }
        debug!(segments = count, "Fitted Chebyshev segments");

        let mut set = ChebyModelSet::from_segments(segments)
            .with_solver(InverseSolver::new().with_precision(self.settings.precision));
        set.set_observing_frequency(0.5 * (self.freq_low + self.freq_high));
        set.set_phase_buffer(self.settings.phase_buffer);
        Ok(set)
    }
}

impl<B: ChebyshevBuilder> Generator for ChebyshevGenerator<B> {
    fn kind(&self) -> PredictorKind {
        PredictorKind::Chebyshev
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
        if self.site != site {
            self.site = site.to_string();
            self.cache.clear();
        }
    }

    fn set_time_span(&mut self, start: Mjd, end: Mjd) {
        self.span = Some((start, end));
    }

    fn clear_time_span(&mut self) {
        self.span = None;
    }

    fn set_frequency_span(&mut self, low: f64, high: f64) {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        if (low, high) != (self.freq_low, self.freq_high) {
            self.freq_low = low;
            self.freq_high = high;
            self.cache.clear();
        }
    }

    fn configure_like(&mut self, model: &Predictor) {
        let Predictor::Chebyshev(set) = model else {
            return;
        };
        let Some(first) = set.segments().first() else {
            return;
        };
        let site = first.site().to_string();
        self.set_site(&site);
        self.set_frequency_span(first.freq_low(), first.freq_high());
        let settings = ChebyshevSettings {
            ncoeff_time: first.ncoeff_time(),
            ncoeff_freq: first.ncoeff_freq(),
            phase_buffer: first.phase_buffer(),
            ..self.settings.clone()
        };
        if settings != self.settings {
            self.settings = settings;
            self.cache.clear();
        }
    }

    fn generate(&mut self) -> PredictResult<Predictor> {
        let frame = "ChebyshevGenerator::generate";
        let parameters = self
            .parameters
            .clone()
            .ok_or_else(|| PredictError::invalid_state(frame, "no timing-model parameters set"))?;
        let source = parameters
            .name()
            .ok_or_else(|| PredictError::invalid_state(frame, "parameters do not name a source"))?
            .to_string();

        let (start, end) = match self.span {
            Some(span) => span,
            None => {
                let now = Mjd::now();
                (now, now + DAY)
            }
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
            m1 -= DAY / 2.0;
            m2 += DAY / 2.0;
        }

        info!(source = %source, start = %m1, end = %m2, "Generating Chebyshev predictor");
        let set = self.build_set(&parameters, &source, m1, m2).context(frame)?;
        let predictor = Predictor::Chebyshev(set);
        self.cache.store(&predictor);
        Ok(predictor)
    }
}
