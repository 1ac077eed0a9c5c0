//! Record alignment driven by polyco generation.

mod common;

use common::{parameters, MockTempo, F0};
use pulsephase::alignment::{Aligner, Observation, Record};
use pulsephase::generator::{Generator, PolycoGenerator};
use pulsephase::tempo::ScratchDir;
use pulsephase::{Mjd, Predictor};
use tempfile::TempDir;

fn aligner() -> (TempDir, Aligner<PolycoGenerator<MockTempo>>) {
    let temp = tempfile::tempdir().unwrap();
    let generator = PolycoGenerator::new(MockTempo::new(), ScratchDir::new(temp.path()));
    (temp, Aligner::new(generator))
}

fn observation(day: i64, count: i64) -> Observation {
    Observation::new("J1909-3744", 1400.0, "7")
        .with_parameters(parameters())
        .with_records((0..count).map(|i| {
            Record::new(Mjd::new(day, 1000 + 300 * i, 0.37), 1.0 / F0)
        }))
}

fn assert_zero_phase(model: &Predictor, epoch: &Mjd) {
    let frac = model.phase(epoch).unwrap().fracturns().abs();
    assert!(frac < 1e-6 || 1.0 - frac < 1e-6, "residual phase {}", frac);
}

#[test]
fn test_update_model_lands_records_on_zero_phase() {
    let (_temp, mut aligner) = aligner();
    let mut obs = observation(58300, 4);
    let before: Vec<Mjd> = obs.records().iter().map(|r| r.epoch).collect();

    aligner.update_model(&mut obs).unwrap();
    assert!(obs.runtime_model());
    assert_eq!(aligner.generator().backend().runs(), 1);

    let model = obs.model().unwrap();
    for (record, original) in obs.records().iter().zip(&before) {
        assert!(record.zero_phase_aligned);
        assert_zero_phase(model, &record.epoch);
        assert!(record.epoch.seconds_since(original).abs() < 1.0 / F0);
    }
}

#[test]
fn test_second_update_reuses_model() {
    let (_temp, mut aligner) = aligner();
    let mut obs = observation(58300, 2);
    aligner.update_model(&mut obs).unwrap();
    let epochs: Vec<Mjd> = obs.records().iter().map(|r| r.epoch).collect();

    aligner.update_model_for(&mut obs, 2).unwrap();
    assert_eq!(aligner.generator().backend().runs(), 1);
    let after: Vec<Mjd> = obs.records().iter().map(|r| r.epoch).collect();
    assert_eq!(epochs, after);
}

#[test]
fn test_distant_record_extends_model() {
    let (_temp, mut aligner) = aligner();
    let mut obs = observation(58300, 1);
    obs.push_record(Record::new(Mjd::new(58310, 500, 0.0), 1.0 / F0));

    aligner.update_model(&mut obs).unwrap();
    assert_eq!(aligner.generator().backend().runs(), 2);
    let model = obs.model().unwrap();
    assert!(obs.good_model(model));
    assert_eq!(model.len(), 2);
}

#[test]
fn test_new_parameters_force_realignment() {
    let (_temp, mut aligner) = aligner();
    let mut obs = observation(58300, 2);
    aligner.update_model(&mut obs).unwrap();

    let mut changed = parameters();
    changed.set("DM", "10.4");
    obs.set_parameters(changed);
    assert!(!obs.zero_phase_aligned());

    aligner.update_model(&mut obs).unwrap();
    assert!(obs.zero_phase_aligned());
    assert_eq!(aligner.generator().backend().runs(), 2);
    assert!(aligner.generator().backend().last().ephemeris.contains("10.4"));
}

#[test]
fn test_append_realigns_only_new_records() {
    let (_temp, mut aligner) = aligner();
    let mut into = observation(58300, 2);
    aligner.update_model(&mut into).unwrap();
    let existing: Vec<Mjd> = into.records().iter().map(|r| r.epoch).collect();

    let from = observation(58305, 2);
    aligner.append(&mut into, &from).unwrap();

    assert_eq!(into.len(), 4);
    let kept: Vec<Mjd> = into.records()[..2].iter().map(|r| r.epoch).collect();
    assert_eq!(kept, existing);
    let model = into.model().unwrap();
    for record in &into.records()[2..] {
        assert!(record.zero_phase_aligned);
        assert_zero_phase(model, &record.epoch);
    }
}

#[test]
fn test_append_aligned_observations_splices_models() {
    let (_temp, mut aligner) = aligner();
    let mut into = observation(58300, 2);
    let mut from = observation(58305, 2);
    aligner.update_model(&mut into).unwrap();
    aligner.update_model(&mut from).unwrap();
    let runs = aligner.generator().backend().runs();
    let segments = into.model().unwrap().len() + from.model().unwrap().len();

    aligner.append(&mut into, &from).unwrap();
    assert_eq!(aligner.generator().backend().runs(), runs);
    assert_eq!(into.model().unwrap().len(), segments);
    assert!(into.zero_phase_aligned());
}
