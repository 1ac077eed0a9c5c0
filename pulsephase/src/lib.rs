//! pulsephase - Pulse phase prediction
//!
//! This library predicts the rotational phase and spin frequency of a pulsar
//! at any epoch from a timing model, and solves the inverse problem of
//! finding the epoch at which a given phase is reached.
//!
//! ```text
//!   Parameters ─► Generator ─► Predictor ─► phase / frequency / iphase
//!                   │            ├─ Polyco          (TEMPO polynomials)
//!                   │            └─ ChebyModelSet   (2-D Chebyshev)
//!                   └─ PredictorCache
//!
//!   Observation ─► Aligner ─► records rotated onto zero phase
//! ```

pub mod alignment;
pub mod config;
pub mod epoch;
pub mod error;
pub mod format;
pub mod generator;
pub mod logging;
pub mod parameters;
pub mod phase;
pub mod predictor;
pub mod segment;
pub mod solver;
pub mod tempo;

pub use epoch::Mjd;
pub use error::{ErrorKind, PredictError, PredictResult, ResultExt};
pub use parameters::Parameters;
pub use phase::Phase;
pub use predictor::{Predictor, PredictorKind};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
