//! On-disk predictor formats.
//!
//! - [`polyco`] - the TEMPO polyco text format
//! - [`chebyshev`] - a binary stream of Chebyshev segments
//!
//! [`sniff`] tells the two apart from the first bytes of a file.

pub mod chebyshev;
pub mod polyco;

pub use chebyshev::{read_chebyshev, write_chebyshev, ChebyshevStreamError, CHEBYSHEV_MAGIC};
pub use polyco::{parse_polyco, write_polyco, PolycoParseError};

/// Predictor file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Polyco,
    Chebyshev,
}

/// Identify the format of `bytes`.
pub fn sniff(bytes: &[u8]) -> Format {
    if bytes.starts_with(CHEBYSHEV_MAGIC) {
        Format::Chebyshev
    } else {
        Format::Polyco
    }
}
