//! Observations and their time-stamped records.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::epoch::Mjd;
use crate::parameters::Parameters;
use crate::predictor::Predictor;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Kind of source observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceType {
    #[default]
    Pulsar,
    /// Noise diode or flux calibrator.
    Calibrator,
    Unknown,
}

impl SourceType {
    /// Only pulsars have a rotational phase to align against.
    pub fn is_periodic(&self) -> bool {
        matches!(self, SourceType::Pulsar)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Pulsar => write!(f, "pulsar"),
            SourceType::Calibrator => write!(f, "calibrator"),
            SourceType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Quantity by which records are indexed when not ordered by time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrder {
    BinaryPhase,
    AscendingNodeLongitude,
    PeriastronLongitude,
}

/// One folded sub-integration.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub epoch: Mjd,
    /// Period (seconds) at which the data were folded.
    pub folding_period: f64,
    /// Whether `epoch` has been corrected against the installed model.
    pub zero_phase_aligned: bool,
}

impl Record {
    pub fn new(epoch: Mjd, folding_period: f64) -> Self {
        Self {
            epoch,
            folding_period,
            zero_phase_aligned: false,
        }
    }

    /// Shift the record by `seconds`, moving its epoch with it.
    pub fn rotate(&mut self, seconds: f64) {
        self.epoch += seconds;
    }
}

/// An observation: records of one source together with the timing model
/// and predictor used to fold them.
///
/// Every observation, including each clone, has its own identity.
#[derive(Debug)]
pub struct Observation {
    id: u64,
    pub source: String,
    pub source_type: SourceType,
    /// MHz
    pub centre_frequency: f64,
    pub site: String,
    pub index_order: Option<IndexOrder>,
    pub(crate) parameters: Option<Parameters>,
    pub(crate) model: Option<Predictor>,
    pub(crate) runtime_model: bool,
    pub(crate) records: Vec<Record>,
}

impl Clone for Observation {
    fn clone(&self) -> Self {
        Self {
            id: next_id(),
            source: self.source.clone(),
            source_type: self.source_type,
            centre_frequency: self.centre_frequency,
            site: self.site.clone(),
            index_order: self.index_order,
            parameters: self.parameters.clone(),
            model: self.model.clone(),
            runtime_model: self.runtime_model,
            records: self.records.clone(),
        }
    }
}

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

impl Observation {
    pub fn new(source: impl Into<String>, centre_frequency: f64, site: impl Into<String>) -> Self {
        Self {
            id: next_id(),
            source: source.into(),
            source_type: SourceType::Pulsar,
            centre_frequency,
            site: site.into(),
            index_order: None,
            parameters: None,
            model: None,
            runtime_model: false,
            records: Vec::new(),
        }
    }

    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    pub fn with_index_order(mut self, order: IndexOrder) -> Self {
        self.index_order = Some(order);
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.set_parameters(parameters);
        self
    }

    pub fn with_records(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        self.records.extend(records);
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether both refer to the same observation.
    pub fn same_as(&self, other: &Observation) -> bool {
        self.id == other.id
    }

    pub fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref()
    }

    /// Install a new timing model. Every record and the installed
    /// predictor must then be brought up to date again.
    pub fn set_parameters(&mut self, parameters: Parameters) {
        self.parameters = Some(parameters);
        self.runtime_model = false;
        for record in &mut self.records {
            record.zero_phase_aligned = false;
        }
    }

    pub fn model(&self) -> Option<&Predictor> {
        self.model.as_ref()
    }

    /// Install a predictor as-is, for instance one read from disk.
    pub fn set_model(&mut self, model: Option<Predictor>) {
        self.model = model;
    }

    /// Whether the installed predictor reflects the current parameters.
    pub fn runtime_model(&self) -> bool {
        self.runtime_model
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    pub fn push_record(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when every record is aligned to the installed model.
    pub fn zero_phase_aligned(&self) -> bool {
        self.records.iter().all(|r| r.zero_phase_aligned)
    }

    pub fn start_time(&self) -> Option<Mjd> {
        self.records.iter().map(|r| r.epoch).reduce(|a, b| if b < a { b } else { a })
    }

    pub fn end_time(&self) -> Option<Mjd> {
        self.records.iter().map(|r| r.epoch).reduce(|a, b| if b > a { b } else { a })
    }

    /// Whether `predictor` answers phase queries at every record epoch.
    pub fn good_model(&self, predictor: &Predictor) -> bool {
        self.records
            .iter()
            .all(|r| predictor.try_phase(&r.epoch).is_some())
    }

    /// Take over everything but the identity of `other`.
    pub(crate) fn copy_from(&mut self, other: &Observation) {
        self.adopt(other.clone());
    }

    /// Replace the contents with `other`, keeping this identity.
    pub(crate) fn adopt(&mut self, other: Observation) {
        let id = self.id;
        *self = other;
        self.id = id;
    }

    /// A copy sharing this identity.
    #[cfg(test)]
    pub(crate) fn alias(&self) -> Self {
        let mut copy = self.clone();
        copy.id = self.id;
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation() -> Observation {
        Observation::new("J0437-4715", 1400.0, "pks").with_records([
            Record::new(Mjd::new(58000, 100, 0.0), 0.0057),
            Record::new(Mjd::new(58000, 50, 0.0), 0.0057),
        ])
    }

    #[test]
    fn test_clone_has_own_identity() {
        let obs = observation();
        let copy = obs.clone();
        assert!(!obs.same_as(&copy));
        assert!(obs.same_as(&obs.alias()));
        assert_eq!(copy.records(), obs.records());
    }

    #[test]
    fn test_set_parameters_resets_flags() {
        let mut obs = observation();
        obs.runtime_model = true;
        obs.records_mut()[0].zero_phase_aligned = true;

        obs.set_parameters(Parameters::parse("PSRJ J0437-4715\n").unwrap());
        assert!(!obs.runtime_model());
        assert!(obs.records().iter().all(|r| !r.zero_phase_aligned));
    }

    #[test]
    fn test_time_range_ignores_order() {
        let obs = observation();
        assert_eq!(obs.start_time(), Some(Mjd::new(58000, 50, 0.0)));
        assert_eq!(obs.end_time(), Some(Mjd::new(58000, 100, 0.0)));
    }

    #[test]
    fn test_rotate_moves_epoch() {
        let mut record = Record::new(Mjd::new(58000, 0, 0.25), 0.5);
        record.rotate(-0.5);
        assert_eq!(record.epoch, Mjd::new(57999, 86399, 0.75));
    }

    #[test]
    fn test_copy_from_keeps_identity() {
        let mut empty = Observation::new("", 0.0, "");
        let id = empty.id();
        let full = observation();
        empty.copy_from(&full);
        assert_eq!(empty.id(), id);
        assert_eq!(empty.len(), 2);
        assert_eq!(empty.source, "J0437-4715");
    }

    #[test]
    fn test_only_pulsars_are_periodic() {
        assert!(SourceType::Pulsar.is_periodic());
        assert!(!SourceType::Calibrator.is_periodic());
    }
}
