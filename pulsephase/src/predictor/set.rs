//! Ordered collection of segments with nearest-segment selection.

use tracing::debug;

use crate::epoch::Mjd;
use crate::error::{PredictError, PredictResult};
use crate::phase::Phase;
use crate::segment::Segment;
use crate::solver::{InversePhase, InverseSolver};

/// Segments ordered by reference epoch.
///
/// Queries pick the segment whose reference epoch (or reference phase) is
/// nearest the query. A segment that does not strictly cover the query is
/// still accepted while the query lies within the overall span of the set,
/// from the first segment's start to the last segment's end, which bridges
/// small gaps between neighbouring segments.
#[derive(Debug, Clone)]
pub struct SegmentSet<S> {
    segments: Vec<S>,
    solver: InverseSolver,
}

impl<S> Default for SegmentSet<S> {
    fn default() -> Self {
        Self {
            segments: Vec::new(),
            solver: InverseSolver::new(),
        }
    }
}

impl<S: Segment> SegmentSet<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from segments in any order.
    pub fn from_segments(segments: Vec<S>) -> Self {
        let mut set = Self::new();
        for segment in segments {
            set.push(segment);
        }
        set
    }

    pub fn with_solver(mut self, solver: InverseSolver) -> Self {
        self.solver = solver;
        self
    }

    pub fn solver(&self) -> &InverseSolver {
        &self.solver
    }

    pub fn segments(&self) -> &[S] {
        &self.segments
    }

    pub(crate) fn segments_mut(&mut self) -> &mut [S] {
        &mut self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Add a segment, keeping reference-epoch order. Equal epochs keep
    /// insertion order.
    pub fn push(&mut self, segment: S) {
        let epoch = segment.reference_epoch();
        let at = self
            .segments
            .partition_point(|s| s.reference_epoch() <= epoch);
        self.segments.insert(at, segment);
    }

    /// Add copies of every segment in `other`.
    pub fn insert(&mut self, other: &SegmentSet<S>) {
        for segment in &other.segments {
            self.push(segment.clone());
        }
    }

    /// Discard segments that no epoch in `epochs` would select.
    pub fn keep(&mut self, epochs: &[Mjd]) {
        let mut used = vec![false; self.segments.len()];
        for epoch in epochs {
            if let Some(index) = self.nearest_index(epoch, self.source()) {
                used[index] = true;
            }
        }

        let before = self.segments.len();
        let mut flags = used.into_iter();
        self.segments.retain(|_| flags.next().unwrap_or(false));
        debug!(
            kept = self.segments.len(),
            removed = before - self.segments.len(),
            "Pruned unused segments"
        );
    }

    pub fn source(&self) -> Option<&str> {
        self.segments.first().map(|s| s.source())
    }

    pub fn site(&self) -> Option<&str> {
        self.segments.first().map(|s| s.site())
    }

    pub fn observing_frequency(&self) -> Option<f64> {
        self.segments.first().map(|s| s.observing_frequency())
    }

    /// Earliest start of any segment window.
    pub fn start_time(&self) -> Option<Mjd> {
        self.segments
            .iter()
            .map(|s| s.start_time())
            .reduce(|a, b| if b < a { b } else { a })
    }

    /// Latest end of any segment window.
    pub fn end_time(&self) -> Option<Mjd> {
        self.segments
            .iter()
            .map(|s| s.end_time())
            .reduce(|a, b| if b > a { b } else { a })
    }

    pub fn start_phase(&self) -> Option<Phase> {
        self.segments
            .iter()
            .map(|s| s.phase_window().0)
            .reduce(|a, b| if b < a { b } else { a })
    }

    pub fn end_phase(&self) -> Option<Phase> {
        self.segments
            .iter()
            .map(|s| s.phase_window().1)
            .reduce(|a, b| if b > a { b } else { a })
    }

    /// Whether reference attributes of the two sets agree.
    pub fn matches(&self, other: &SegmentSet<S>) -> bool {
        match (self.segments.first(), other.segments.first()) {
            (Some(a), Some(b)) => a.matches(b),
            (None, None) => true,
            _ => false,
        }
    }

    fn within_span(&self, t: &Mjd) -> bool {
        match (self.start_time(), self.end_time()) {
            (Some(start), Some(end)) => start <= *t && *t <= end,
            _ => false,
        }
    }

    /// Index of the segment that answers queries at `t`, if any.
    fn nearest_index(&self, t: &Mjd, source: Option<&str>) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, segment) in self.segments.iter().enumerate() {
            if source.is_some_and(|name| name != segment.source()) {
                continue;
            }
            let distance = t.seconds_since(&segment.reference_epoch()).abs();
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((index, distance));
            }
        }

        let (index, _) = best?;
        if self.segments[index].covers(t) {
            return Some(index);
        }
        if self.within_span(t) {
            debug!(epoch = %t, index, "Using nearest segment across a gap");
            return Some(index);
        }
        None
    }

    fn nearest_phase_index(&self, phase: &Phase, source: Option<&str>) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, segment) in self.segments.iter().enumerate() {
            if source.is_some_and(|name| name != segment.source()) {
                continue;
            }
            let distance = (*phase - segment.reference_phase()).in_turns().abs();
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((index, distance));
            }
        }

        let (index, _) = best?;
        let (low, high) = self.segments[index].phase_window();
        if low <= *phase && *phase <= high {
            return Some(index);
        }
        match (self.start_phase(), self.end_phase()) {
            (Some(start), Some(end)) if start <= *phase && *phase <= end => Some(index),
            _ => None,
        }
    }

    fn not_covered(&self, frame: &str, what: String) -> PredictError {
        if self.segments.is_empty() {
            return PredictError::invalid_state(frame, "predictor has no segments");
        }
        let span = match (self.start_time(), self.end_time()) {
            (Some(start), Some(end)) => format!("{:.6} - {:.6}", start, end),
            _ => String::new(),
        };
        PredictError::invalid_param(frame, format!("{} not covered (span {})", what, span))
    }

    /// Segment that answers queries at `t`, optionally restricted to one
    /// source.
    pub fn segment_at(&self, t: &Mjd, source: Option<&str>) -> PredictResult<&S> {
        self.nearest_index(t, source)
            .map(|i| &self.segments[i])
            .ok_or_else(|| self.not_covered("SegmentSet::segment_at", format!("epoch {:.9}", t)))
    }

    /// Segment that answers inverse queries at `phase`.
    pub fn segment_for_phase(&self, phase: &Phase) -> PredictResult<&S> {
        self.nearest_phase_index(phase, self.source())
            .map(|i| &self.segments[i])
            .ok_or_else(|| {
                self.not_covered("SegmentSet::segment_for_phase", format!("phase {}", phase))
            })
    }

    pub fn phase(&self, t: &Mjd) -> PredictResult<Phase> {
        Ok(self.segment_at(t, self.source())?.phase(t))
    }

    /// Phase at `t`, or `None` when no segment answers.
    pub fn try_phase(&self, t: &Mjd) -> Option<Phase> {
        self.nearest_index(t, self.source())
            .map(|i| self.segments[i].phase(t))
    }

    pub fn frequency(&self, t: &Mjd) -> PredictResult<f64> {
        Ok(self.segment_at(t, self.source())?.frequency(t))
    }

    pub fn period(&self, t: &Mjd) -> PredictResult<f64> {
        Ok(1.0 / self.frequency(t)?)
    }

    pub fn dispersion(&self, t: &Mjd, mhz: f64) -> PredictResult<Phase> {
        Ok(self.segment_at(t, self.source())?.dispersion(t, mhz))
    }

    /// Epoch at which `phase` is reached.
    pub fn iphase(&self, phase: Phase, guess: Option<Mjd>) -> PredictResult<Mjd> {
        let segment = self.segment_for_phase(&phase)?;
        Ok(self.solver.solve(segment, phase, guess).epoch)
    }
}
