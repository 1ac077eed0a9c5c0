//! Chebyshev-specific operations.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{PredictError, PredictResult};
use crate::format::{read_chebyshev, write_chebyshev};
use crate::segment::ChebyshevSegment;

use super::SegmentSet;

/// A set of two-dimensional Chebyshev segments.
pub type ChebyModelSet = SegmentSet<ChebyshevSegment>;

impl SegmentSet<ChebyshevSegment> {
    /// Evaluate every segment at `mhz`.
    pub fn set_observing_frequency(&mut self, mhz: f64) {
        for segment in self.segments_mut() {
            segment.set_observing_frequency(mhz);
        }
    }

    /// Set the phase-level buffer on every segment.
    pub fn set_phase_buffer(&mut self, fraction: f64) {
        for segment in self.segments_mut() {
            segment.set_phase_buffer(fraction);
        }
    }

    pub fn load(path: &Path) -> PredictResult<Self> {
        let file = File::open(path)
            .map_err(|e| PredictError::io("ChebyModelSet::load", path.display(), e))?;
        let segments = read_chebyshev(BufReader::new(file)).map_err(|e| {
            PredictError::invalid_state(
                "ChebyModelSet::load",
                format!("{}: {}", path.display(), e),
            )
            .with_source(e)
        })?;
        Ok(Self::from_segments(segments))
    }

    pub fn unload(&self, path: &Path) -> PredictResult<()> {
        let file = File::create(path)
            .map_err(|e| PredictError::io("ChebyModelSet::unload", path.display(), e))?;
        write_chebyshev(BufWriter::new(file), self.segments()).map_err(|e| {
            PredictError::failed_sys(
                "ChebyModelSet::unload",
                format!("{}: {}", path.display(), e),
            )
            .with_source(e)
        })
    }
}
