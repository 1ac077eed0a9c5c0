//! Phase predictors.
//!
//! A [`Predictor`] answers "what is the pulse phase at epoch t?" and the
//! inverse "at what epoch is phase φ reached?". Two families exist:
//!
//! ```text
//!   Predictor
//!     ├── Polyco        SegmentSet<Polynomial>        (TEMPO polycos)
//!     └── Chebyshev     SegmentSet<ChebyshevSegment>  (2-D Chebyshev)
//! ```
//!
//! Both share the selection rules of [`SegmentSet`]. The family is fixed
//! when a predictor is created; merging predictors of different families
//! is rejected.
//!
//! # Example
//!
//! ```ignore
//! let predictor = Predictor::load(Path::new("polyco.dat"))?;
//! let phase = predictor.phase(&Mjd::from_days(58000.5))?;
//! let epoch = predictor.iphase(phase.rint(), None)?;
//! ```

mod chebyshev;
mod polyco;
mod set;

pub use chebyshev::ChebyModelSet;
pub use polyco::Polyco;
pub use set::SegmentSet;

use std::fmt;
use std::fs;
use std::path::Path;

use crate::epoch::Mjd;
use crate::error::{PredictError, PredictResult, ResultExt};
use crate::format::{sniff, Format};
use crate::phase::Phase;
use crate::solver::SolverStats;

/// Predictor family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorKind {
    Polyco,
    Chebyshev,
}

impl fmt::Display for PredictorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictorKind::Polyco => write!(f, "polyco"),
            PredictorKind::Chebyshev => write!(f, "chebyshev"),
        }
    }
}

/// A phase predictor of either family.
#[derive(Debug, Clone)]
pub enum Predictor {
    Polyco(Polyco),
    Chebyshev(ChebyModelSet),
}

macro_rules! dispatch {
    ($self:expr, $set:ident => $body:expr) => {
        match $self {
            Predictor::Polyco($set) => $body,
            Predictor::Chebyshev($set) => $body,
        }
    };
}

impl From<Polyco> for Predictor {
    fn from(polyco: Polyco) -> Self {
        Predictor::Polyco(polyco)
    }
}

impl From<ChebyModelSet> for Predictor {
    fn from(set: ChebyModelSet) -> Self {
        Predictor::Chebyshev(set)
    }
}

impl Predictor {
    pub fn kind(&self) -> PredictorKind {
        match self {
            Predictor::Polyco(_) => PredictorKind::Polyco,
            Predictor::Chebyshev(_) => PredictorKind::Chebyshev,
        }
    }

    pub fn len(&self) -> usize {
        dispatch!(self, set => set.len())
    }

    pub fn is_empty(&self) -> bool {
        dispatch!(self, set => set.is_empty())
    }

    /// Phase at `t`.
    pub fn phase(&self, t: &Mjd) -> PredictResult<Phase> {
        dispatch!(self, set => set.phase(t)).context("Predictor::phase")
    }

    /// Phase at `t`, or `None` where the predictor has no answer.
    pub fn try_phase(&self, t: &Mjd) -> Option<Phase> {
        dispatch!(self, set => set.try_phase(t))
    }

    /// Spin frequency at `t` in Hz.
    pub fn frequency(&self, t: &Mjd) -> PredictResult<f64> {
        dispatch!(self, set => set.frequency(t)).context("Predictor::frequency")
    }

    /// Pulse period at `t` in seconds.
    pub fn period(&self, t: &Mjd) -> PredictResult<f64> {
        dispatch!(self, set => set.period(t)).context("Predictor::period")
    }

    /// Dispersive phase delay at `mhz` relative to the observing frequency.
    pub fn dispersion(&self, t: &Mjd, mhz: f64) -> PredictResult<Phase> {
        dispatch!(self, set => set.dispersion(t, mhz)).context("Predictor::dispersion")
    }

    /// Epoch at which `phase` is reached, starting from `guess` if given.
    pub fn iphase(&self, phase: Phase, guess: Option<Mjd>) -> PredictResult<Mjd> {
        dispatch!(self, set => set.iphase(phase, guess)).context("Predictor::iphase")
    }

    pub fn start_time(&self) -> Option<Mjd> {
        dispatch!(self, set => set.start_time())
    }

    pub fn end_time(&self) -> Option<Mjd> {
        dispatch!(self, set => set.end_time())
    }

    pub fn source(&self) -> Option<&str> {
        dispatch!(self, set => set.source())
    }

    pub fn site(&self) -> Option<&str> {
        dispatch!(self, set => set.site())
    }

    pub fn observing_frequency(&self) -> Option<f64> {
        dispatch!(self, set => set.observing_frequency())
    }

    pub fn solver_stats(&self) -> &SolverStats {
        dispatch!(self, set => set.solver().stats())
    }

    /// Whether both predictors are of one family with matching reference
    /// attributes.
    pub fn matches(&self, other: &Predictor) -> bool {
        match (self, other) {
            (Predictor::Polyco(a), Predictor::Polyco(b)) => a.matches(b),
            (Predictor::Chebyshev(a), Predictor::Chebyshev(b)) => a.matches(b),
            _ => false,
        }
    }

    /// Merge the segments of `other` into this predictor.
    pub fn insert(&mut self, other: &Predictor) -> PredictResult<()> {
        match (self, other) {
            (Predictor::Polyco(a), Predictor::Polyco(b)) => a.insert(b),
            (Predictor::Chebyshev(a), Predictor::Chebyshev(b)) => a.insert(b),
            (a, b) => {
                return Err(PredictError::invalid_param(
                    "Predictor::insert",
                    format!("cannot merge a {} predictor into a {} predictor", b.kind(), a.kind()),
                ))
            }
        }
        Ok(())
    }

    /// Discard segments not needed for `epochs`.
    pub fn keep(&mut self, epochs: &[Mjd]) {
        dispatch!(self, set => set.keep(epochs))
    }

    /// Select the observing frequency at which phase is evaluated.
    ///
    /// Polycos are fixed at the frequency they were generated for; asking
    /// for any other frequency is an error.
    pub fn set_observing_frequency(&mut self, mhz: f64) -> PredictResult<()> {
        match self {
            Predictor::Chebyshev(set) => {
                set.set_observing_frequency(mhz);
                Ok(())
            }
            Predictor::Polyco(set) => match set.observing_frequency() {
                Some(freq) if freq != mhz => Err(PredictError::invalid_param(
                    "Predictor::set_observing_frequency",
                    format!("polyco generated at {} MHz cannot predict at {} MHz", freq, mhz),
                )),
                _ => Ok(()),
            },
        }
    }

    /// Read a predictor, detecting its format.
    pub fn load(path: &Path) -> PredictResult<Self> {
        let bytes =
            fs::read(path).map_err(|e| PredictError::io("Predictor::load", path.display(), e))?;
        let predictor = match sniff(&bytes) {
            Format::Chebyshev => ChebyModelSet::load(path).map(Predictor::Chebyshev),
            Format::Polyco => {
                let text = String::from_utf8_lossy(&bytes);
                Polyco::parse(&text).map(Predictor::Polyco)
            }
        };
        predictor.context("Predictor::load")
    }

    /// Write the predictor in its native format.
    pub fn unload(&self, path: &Path) -> PredictResult<()> {
        match self {
            Predictor::Polyco(set) => set.unload(path),
            Predictor::Chebyshev(set) => set.unload(path),
        }
        .context("Predictor::unload")
    }
}
