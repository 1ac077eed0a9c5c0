//! Polyco-specific operations.

use std::fs;
use std::path::Path;

use crate::error::{PredictError, PredictResult};
use crate::format::{parse_polyco, write_polyco};
use crate::segment::Polynomial;

use super::SegmentSet;

/// A set of polynomial segments, as read from a polyco file.
pub type Polyco = SegmentSet<Polynomial>;

impl SegmentSet<Polynomial> {
    /// Parse polyco text.
    pub fn parse(text: &str) -> PredictResult<Self> {
        let segments = parse_polyco(text).map_err(|e| {
            PredictError::invalid_state("Polyco::parse", e.to_string()).with_source(e)
        })?;
        Ok(Self::from_segments(segments))
    }

    /// Read a polyco file.
    pub fn load(path: &Path) -> PredictResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| PredictError::io("Polyco::load", path.display(), e))?;
        Self::parse(&text).map_err(|e| e.context("Polyco::load"))
    }

    /// Render as polyco text.
    pub fn to_text(&self) -> String {
        write_polyco(self.segments())
    }

    /// Write a polyco file.
    pub fn unload(&self, path: &Path) -> PredictResult<()> {
        fs::write(path, self.to_text())
            .map_err(|e| PredictError::io("Polyco::unload", path.display(), e))
    }

    /// Widen (or narrow) the validity window of every segment.
    pub fn set_flexibility(&mut self, flexibility: f64) {
        for segment in self.segments_mut() {
            segment.set_flexibility(flexibility);
        }
    }

    /// Segment span in minutes, from the first segment.
    pub fn nspan(&self) -> Option<f64> {
        self.segments().first().map(|s| s.nspan())
    }

    pub fn ncoef(&self) -> Option<usize> {
        self.segments().first().map(|s| s.ncoef())
    }
}
