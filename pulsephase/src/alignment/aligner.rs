//! Keeps observation records aligned to their phase predictor.

use tracing::{debug, info, warn};

use super::observation::Observation;
use crate::config::ConfigFile;
use crate::epoch::Mjd;
use crate::error::{PredictError, PredictResult, ResultExt};
use crate::generator::Generator;
use crate::phase::Phase;
use crate::predictor::Predictor;

/// Rules applied when appending one observation to another.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignConfig {
    /// Require matching source names and centre frequencies.
    pub must_match: bool,
    /// Require appended records to follow existing ones in time.
    pub chronological: bool,
    /// Seconds by which appended records may precede the end of existing
    /// ones when `chronological` is set.
    pub max_overlap: f64,
    /// MHz
    pub max_frequency_difference: f64,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            must_match: true,
            chronological: false,
            max_overlap: 30.0,
            max_frequency_difference: 0.1,
        }
    }
}

impl AlignConfig {
    pub fn from_config(config: &ConfigFile) -> Self {
        Self {
            must_match: config.append.must_match,
            chronological: config.append.chronological,
            max_overlap: config.append.max_overlap,
            max_frequency_difference: config.append.max_frequency_difference,
        }
    }
}

/// Decides when an observation's predictor can be reused and when it must
/// be extended or regenerated, and corrects record epochs accordingly.
///
/// ```text
///   update_model ─► update_model_for(n)
///                     ├─ create_updated_model ─► update_model_at(t) per record
///                     │                            ├─ reuse: model covers t
///                     │                            └─ generate, keep, insert
///                     └─ apply_model(old) for unaligned records < n
/// ```
#[derive(Debug)]
pub struct Aligner<G: Generator> {
    generator: G,
    config: AlignConfig,
}

impl<G: Generator> Aligner<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            config: AlignConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AlignConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn generator_mut(&mut self) -> &mut G {
        &mut self.generator
    }

    /// Rebuild the predictor after the parameters or support files changed,
    /// and realign every record.
    pub fn update_model(&mut self, obs: &mut Observation) -> PredictResult<()> {
        obs.runtime_model = false;
        let nsubint = obs.len();
        self.update_model_for(obs, nsubint)
            .context("Aligner::update_model")
    }

    /// Bring the predictor up to date and align the first `nsubint` records
    /// that are not yet aligned.
    pub fn update_model_for(
        &mut self,
        obs: &mut Observation,
        nsubint: usize,
    ) -> PredictResult<()> {
        let frame = "Aligner::update_model_for";
        let old = if obs.runtime_model {
            None
        } else {
            obs.model.clone()
        };

        let clear = !obs.runtime_model;
        self.create_updated_model(obs, clear).context(frame)?;
        if obs.model.is_none() {
            return Ok(());
        }

        let nsubint = nsubint.min(obs.len());
        for index in 0..nsubint {
            if !obs.records[index].zero_phase_aligned {
                self.apply_model(obs, old.as_ref(), index).context(frame)?;
            }
        }
        obs.runtime_model = true;
        Ok(())
    }

    /// Make sure the predictor covers every record epoch. With `clear`, the
    /// current predictor is discarded after its layout has been adopted.
    pub fn create_updated_model(
        &mut self,
        obs: &mut Observation,
        clear: bool,
    ) -> PredictResult<()> {
        if !obs.source_type.is_periodic() {
            return Err(PredictError::invalid_state(
                "Aligner::create_updated_model",
                format!("{} is not a pulsar observation", obs.source),
            ));
        }

        let epochs: Vec<Mjd> = obs.records.iter().map(|r| r.epoch).collect();
        let mut clear = clear;
        for epoch in epochs {
            self.update_model_at(obs, &epoch, clear)
                .context("Aligner::create_updated_model")?;
            clear = false;
        }
        Ok(())
    }

    /// Make sure the predictor covers `time`, generating and appending the
    /// segment that covers it when it does not.
    pub fn update_model_at(
        &mut self,
        obs: &mut Observation,
        time: &Mjd,
        clear: bool,
    ) -> PredictResult<()> {
        let frame = "Aligner::update_model_at";
        if !obs.source_type.is_periodic() {
            return Err(PredictError::invalid_state(
                frame,
                format!("{} is not a pulsar observation", obs.source),
            ));
        }

        let Some(parameters) = obs.parameters.as_ref() else {
            obs.model = None;
            return Ok(());
        };
        self.generator.set_parameters(parameters);

        match obs.model.as_ref().filter(|m| !m.is_empty()) {
            Some(model) => self.generator.configure_like(model),
            None => {
                info!(source = %obs.source, "No predictor to copy; using default generator settings");
                self.generator.set_site(&obs.site);
                self.generator
                    .set_frequency_span(obs.centre_frequency, obs.centre_frequency);
            }
        }

        if clear {
            obs.model = None;
        }

        if let Some(model) = &obs.model {
            if model.try_phase(time).is_some() {
                debug!(epoch = %time, "Predictor already covers epoch");
                return Ok(());
            }
        }

        self.generator.set_time_span(*time, *time);
        let mut part = self.generator.generate().context(frame)?;
        part.keep(std::slice::from_ref(time));

        match obs.model.as_mut() {
            Some(model) if model.kind() == part.kind() => model.insert(&part).context(frame)?,
            Some(model) => {
                warn!(
                    existing = %model.kind(),
                    generated = %part.kind(),
                    "Replacing predictor of a different family"
                );
                *model = part;
            }
            None => obs.model = Some(part),
        }
        Ok(())
    }

    /// Rotate record `index` so that its epoch falls on zero phase of the
    /// installed predictor.
    ///
    /// `old` is the predictor the record was previously folded with; the
    /// phase difference between its observing frequency and that of the
    /// installed predictor is included in the rotation.
    pub fn apply_model(
        &self,
        obs: &mut Observation,
        old: Option<&Predictor>,
        index: usize,
    ) -> PredictResult<()> {
        let frame = "Aligner::apply_model";
        let model = obs
            .model
            .as_ref()
            .ok_or_else(|| PredictError::invalid_state(frame, "no predictor installed"))?;

        if let Some(old) = old {
            if old.site() != model.site() {
                return Err(PredictError::invalid_state(
                    frame,
                    format!(
                        "telescope mismatch: {} != {}",
                        old.site().unwrap_or("none"),
                        model.site().unwrap_or("none")
                    ),
                ));
            }
        }

        let epoch = obs
            .records
            .get(index)
            .map(|r| r.epoch)
            .ok_or_else(|| {
                PredictError::invalid_param(frame, format!("record {} of {}", index, obs.len()))
            })?;

        let phase = model.phase(&epoch).context(frame)?;
        let freq_shift = match old.and_then(|o| o.observing_frequency()) {
            Some(mhz) => Phase::ZERO - model.dispersion(&epoch, mhz).context(frame)?,
            None => Phase::ZERO,
        };
        let dphase = freq_shift - phase;
        let period = model.period(&epoch).context(frame)?;
        let shift = dphase.fracturns() * period;

        debug!(
            index,
            epoch = %epoch,
            phase = %phase,
            freq_shift = %freq_shift,
            shift,
            "Aligning record"
        );

        let record = &mut obs.records[index];
        record.folding_period = period;
        record.rotate(shift);
        record.zero_phase_aligned = true;
        Ok(())
    }

    /// Append the records of `from` to `into`, keeping both aligned to a
    /// common predictor.
    ///
    /// All compatibility checks happen before `into` is modified.
    pub fn append(&mut self, into: &mut Observation, from: &Observation) -> PredictResult<()> {
        let frame = "Aligner::append";
        if into.same_as(from) {
            return Err(PredictError::invalid_param(
                frame,
                "cannot append observation to itself",
            ));
        }
        if from.is_empty() {
            return Ok(());
        }
        if into.is_empty() {
            into.copy_from(from);
            return Ok(());
        }

        self.check(into, from).context(frame)?;

        let aligned = into.zero_phase_aligned() && from.zero_phase_aligned();
        let into_nsubint = into.len();

        // work on a copy so that a failure leaves `into` untouched
        let mut staged = into.clone();
        staged.records.extend(from.records.iter().cloned());

        if staged.model.is_none() && from.model.is_none() {
            debug!("No predictor to correct");
            into.adopt(staged);
            return Ok(());
        }

        let equal_parameters = matches!(
            (&staged.parameters, &from.parameters),
            (Some(a), Some(b)) if a == b
        );
        let equal_models = matches!(
            (&staged.model, &from.model),
            (Some(a), Some(b)) if a.matches(b)
        );

        if aligned && equal_parameters && equal_models {
            if let (Some(model), Some(other)) = (staged.model.as_mut(), from.model.as_ref()) {
                model.insert(other).context(frame)?;
            }
            for record in &mut staged.records {
                record.zero_phase_aligned = true;
            }
            debug!(records = staged.len(), "Appended aligned records without regeneration");
            into.adopt(staged);
            return Ok(());
        }

        if staged.model.is_some() && staged.parameters.is_none() {
            return Err(PredictError::invalid_state(
                frame,
                format!(
                    "{} has a predictor but no parameters to extend it for appended records",
                    staged.source
                ),
            ));
        }

        self.update_model_for(&mut staged, into_nsubint)
            .context(frame)?;
        for index in into_nsubint..staged.len() {
            self.apply_model(&mut staged, from.model.as_ref(), index)
                .context(frame)?;
        }

        info!(
            appended = staged.len() - into_nsubint,
            total = staged.len(),
            "Appended and realigned records"
        );
        into.adopt(staged);
        Ok(())
    }

    fn check(&self, into: &Observation, from: &Observation) -> PredictResult<()> {
        let frame = "Aligner::check";
        if into.index_order != from.index_order {
            return Err(PredictError::invalid_param(
                frame,
                format!(
                    "index orders differ: {:?} != {:?}",
                    into.index_order, from.index_order
                ),
            ));
        }
        for obs in [into, from] {
            if !obs.source_type.is_periodic() {
                return Err(PredictError::invalid_state(
                    frame,
                    format!("{} is a {}, not a periodic source", obs.source, obs.source_type),
                ));
            }
        }
        if self.config.must_match {
            if into.source != from.source {
                return Err(PredictError::invalid_state(
                    frame,
                    format!("sources differ: {} != {}", into.source, from.source),
                ));
            }
            let difference = (into.centre_frequency - from.centre_frequency).abs();
            if difference > self.config.max_frequency_difference {
                return Err(PredictError::invalid_state(
                    frame,
                    format!(
                        "centre frequencies differ by {} MHz (limit {})",
                        difference, self.config.max_frequency_difference
                    ),
                ));
            }
        }
        if self.config.chronological {
            if let (Some(end), Some(start)) = (into.end_time(), from.start_time()) {
                let overlap = end.seconds_since(&start);
                if overlap > self.config.max_overlap {
                    return Err(PredictError::invalid_state(
                        frame,
                        format!(
                            "appended records start {:.3} s before existing records end (limit {} s)",
                            overlap, self.config.max_overlap
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::{IndexOrder, Record, SourceType};
    use crate::error::ErrorKind;
    use crate::generator::ChebyshevGenerator;
    use crate::parameters::Parameters;
    use crate::predictor::PredictorKind;

    const F0: f64 = 173.6879458;

    /// Counts generate calls of the wrapped generator.
    struct Counting<G> {
        inner: G,
        generated: usize,
    }

    impl<G: Generator> Generator for Counting<G> {
        fn kind(&self) -> PredictorKind {
            self.inner.kind()
        }
        fn set_parameters(&mut self, parameters: &Parameters) {
            self.inner.set_parameters(parameters)
        }
        fn parameters(&self) -> Option<&Parameters> {
            self.inner.parameters()
        }
        fn set_site(&mut self, site: &str) {
            self.inner.set_site(site)
        }
        fn set_time_span(&mut self, start: Mjd, end: Mjd) {
            self.inner.set_time_span(start, end)
        }
        fn clear_time_span(&mut self) {
            self.inner.clear_time_span()
        }
        fn set_frequency_span(&mut self, low: f64, high: f64) {
            self.inner.set_frequency_span(low, high)
        }
        fn configure_like(&mut self, model: &Predictor) {
            self.inner.configure_like(model)
        }
        fn generate(&mut self) -> PredictResult<Predictor> {
            self.generated += 1;
            self.inner.generate()
        }
    }

    fn aligner() -> Aligner<Counting<ChebyshevGenerator>> {
        Aligner::new(Counting {
            inner: ChebyshevGenerator::default(),
            generated: 0,
        })
    }

    fn parameters() -> Parameters {
        Parameters::parse(&format!(
            "PSRJ J0437-4715\nF0 {}\nF1 -1.728e-15\nPEPOCH 58000\nDM 2.64\n",
            F0
        ))
        .unwrap()
    }

    fn observation(day: i64, count: usize) -> Observation {
        let records = (0..count).map(|i| Record::new(Mjd::new(day, 3600 + 600 * i as i64, 0.123), 1.0 / F0));
        Observation::new("J0437-4715", 1400.0, "pks")
            .with_parameters(parameters())
            .with_records(records)
    }

    fn assert_zero_phase(model: &Predictor, epoch: &Mjd) {
        let frac = model.phase(epoch).unwrap().fracturns().abs();
        assert!(frac < 1e-6 || 1.0 - frac < 1e-6, "residual phase {}", frac);
    }

    #[test]
    fn test_update_model_aligns_every_record() {
        let mut aligner = aligner();
        let mut obs = observation(58010, 3);

        aligner.update_model(&mut obs).unwrap();
        assert!(obs.runtime_model());
        assert!(obs.zero_phase_aligned());

        let model = obs.model().unwrap();
        for record in obs.records() {
            assert_zero_phase(model, &record.epoch);
            assert!((record.folding_period - 1.0 / F0).abs() < 1e-12);
        }
        // one generation covers records an hour apart
        assert_eq!(aligner.generator().generated, 1);
    }

    #[test]
    fn test_covered_epoch_reuses_model() {
        let mut aligner = aligner();
        let mut obs = observation(58010, 1);
        aligner.update_model(&mut obs).unwrap();

        let t = Mjd::new(58010, 7200, 0.0);
        aligner.update_model_at(&mut obs, &t, false).unwrap();
        assert_eq!(aligner.generator().generated, 1);

        let later = Mjd::new(58020, 0, 0.0);
        aligner.update_model_at(&mut obs, &later, false).unwrap();
        assert_eq!(aligner.generator().generated, 2);
        let model = obs.model().unwrap();
        assert_eq!(model.len(), 2);
        assert!(model.try_phase(&t).is_some());
        assert!(model.try_phase(&later).is_some());
    }

    #[test]
    fn test_no_parameters_clears_model() {
        let mut aligner = aligner();
        let mut obs = Observation::new("J0437-4715", 1400.0, "pks")
            .with_records([Record::new(Mjd::new(58010, 0, 0.0), 1.0 / F0)]);
        aligner.update_model(&mut obs).unwrap();
        assert!(obs.model().is_none());
        assert!(!obs.zero_phase_aligned());
    }

    #[test]
    fn test_non_periodic_source_rejected() {
        let mut aligner = aligner();
        let mut obs = observation(58010, 1).with_source_type(SourceType::Calibrator);
        let err = aligner.update_model(&mut obs).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_apply_model_includes_frequency_shift() {
        let mut aligner = aligner();
        let mut obs = observation(58010, 1);
        aligner.update_model(&mut obs).unwrap();

        let mut old = obs.model().unwrap().clone();
        old.set_observing_frequency(700.0).unwrap();
        obs.records_mut()[0].zero_phase_aligned = false;
        aligner.apply_model(&mut obs, Some(&old), 0).unwrap();

        let model = obs.model().unwrap();
        let epoch = obs.records()[0].epoch;
        let at_old_frequency = model.phase(&epoch).unwrap() + model.dispersion(&epoch, 700.0).unwrap();
        let frac = at_old_frequency.fracturns().abs();
        assert!(frac < 1e-6 || 1.0 - frac < 1e-6);
    }

    #[test]
    fn test_apply_model_rejects_other_telescope() {
        let mut aligner = aligner();
        let mut obs = observation(58010, 1);
        aligner.update_model(&mut obs).unwrap();

        let mut other = ChebyshevGenerator::default();
        other.set_parameters(&parameters());
        other.set_site("gbt");
        other.set_time_span(Mjd::new(58010, 0, 0.0), Mjd::new(58010, 0, 0.0));
        let old = other.generate().unwrap();

        let err = aligner.apply_model(&mut obs, Some(&old), 0).unwrap_err();
        assert!(err.message().contains("telescope mismatch"));
    }

    #[test]
    fn test_append_to_self_rejected() {
        let mut aligner = aligner();
        let mut obs = observation(58010, 2);
        let same = obs.alias();
        let err = aligner.append(&mut obs, &same).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParam);
        assert_eq!(obs.len(), 2);
    }

    #[test]
    fn test_append_clone_is_allowed() {
        let mut aligner = aligner();
        let mut obs = observation(58010, 2);
        aligner.update_model(&mut obs).unwrap();
        let copy = obs.clone();
        aligner.append(&mut obs, &copy).unwrap();
        assert_eq!(obs.len(), 4);
        assert!(obs.zero_phase_aligned());
    }

    #[test]
    fn test_failed_append_leaves_observation_unchanged() {
        let mut aligner = aligner();
        let mut into = observation(58010, 1);
        aligner.update_model(&mut into).unwrap();
        let mut from = observation(58011, 1);
        from.site = "gbt".to_string();
        aligner.update_model(&mut from).unwrap();

        let records = into.records().to_vec();
        let segments = into.model().unwrap().len();

        let err = aligner.append(&mut into, &from).unwrap_err();
        assert!(err.message().contains("telescope mismatch"));
        assert_eq!(into.records(), &records[..]);
        assert!(into.zero_phase_aligned());
        assert!(into.runtime_model());
        assert_eq!(into.model().unwrap().len(), segments);
    }

    #[test]
    fn test_append_without_parameters_rejected() {
        let mut aligner = aligner();
        let mut into = observation(58010, 1);
        aligner.update_model(&mut into).unwrap();
        into.parameters = None;
        let from = observation(58011, 1);

        let err = aligner.append(&mut into, &from).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(into.len(), 1);
    }

    #[test]
    fn test_append_into_empty_copies() {
        let mut aligner = aligner();
        let mut into = Observation::new("", 0.0, "");
        let from = observation(58010, 2);
        aligner.append(&mut into, &from).unwrap();
        assert_eq!(into.len(), 2);
        assert_eq!(into.source, from.source);
        assert!(!into.same_as(&from));
    }

    #[test]
    fn test_append_checks_before_mutation() {
        let mut aligner = aligner();
        let mut into = observation(58010, 2);

        let other_order = observation(58011, 1).with_index_order(IndexOrder::BinaryPhase);
        assert_eq!(
            aligner.append(&mut into, &other_order).unwrap_err().kind(),
            ErrorKind::InvalidParam
        );

        let calibrator = observation(58011, 1).with_source_type(SourceType::Calibrator);
        assert!(aligner.append(&mut into, &calibrator).is_err());

        let mut shifted = observation(58011, 1);
        shifted.centre_frequency = 1400.5;
        assert!(aligner.append(&mut into, &shifted).is_err());

        assert_eq!(into.len(), 2);
    }

    #[test]
    fn test_append_chronological_overlap() {
        let mut aligner = aligner().with_config(AlignConfig {
            chronological: true,
            ..AlignConfig::default()
        });
        let mut into = observation(58010, 3);
        let early = observation(58010, 1);
        let err = aligner.append(&mut into, &early).unwrap_err();
        assert!(err.message().contains("before existing records end"));

        let late = observation(58011, 1);
        aligner.append(&mut into, &late).unwrap();
        assert_eq!(into.len(), 4);
    }

    #[test]
    fn test_append_aligned_inserts_models() {
        let mut aligner = aligner();
        let mut into = observation(58010, 2);
        let mut from = observation(58012, 2);
        aligner.update_model(&mut into).unwrap();
        aligner.update_model(&mut from).unwrap();
        let generated = aligner.generator().generated;

        aligner.append(&mut into, &from).unwrap();
        assert_eq!(aligner.generator().generated, generated);
        assert_eq!(into.len(), 4);
        assert!(into.zero_phase_aligned());
        assert_eq!(into.model().unwrap().len(), 2);
        assert_eq!(into.records()[2].epoch, from.records()[0].epoch);
    }

    #[test]
    fn test_append_unaligned_realigns_new_records() {
        let mut aligner = aligner();
        let mut into = observation(58010, 2);
        aligner.update_model(&mut into).unwrap();
        let existing: Vec<Mjd> = into.records().iter().map(|r| r.epoch).collect();

        let from = observation(58012, 2);
        aligner.append(&mut into, &from).unwrap();

        assert_eq!(into.len(), 4);
        assert!(into.zero_phase_aligned());
        let model = into.model().unwrap();
        for record in &into.records()[2..] {
            assert_zero_phase(model, &record.epoch);
        }
        for (record, epoch) in into.records().iter().zip(&existing) {
            assert_eq!(record.epoch, *epoch);
        }
    }
}
