//! Binary stream of Chebyshev segments.
//!
//! ```text
//! +----------+------------------------------------------+
//! | PSRCHEB1 | bincode { version: u32, segments: [...] } |
//! +----------+------------------------------------------+
//! ```

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::segment::ChebyshevSegment;

/// Leading bytes of every stream.
pub const CHEBYSHEV_MAGIC: &[u8; 8] = b"PSRCHEB1";

const STREAM_VERSION: u32 = 1;

/// Errors reading or writing a segment stream.
#[derive(Debug, Error)]
pub enum ChebyshevStreamError {
    #[error("not a Chebyshev predictor stream")]
    BadMagic,

    #[error("unsupported stream version {0}")]
    Version(u32),

    #[error("segment {index}: {reason}")]
    Malformed { index: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

#[derive(Serialize)]
struct PayloadRef<'a> {
    version: u32,
    segments: &'a [ChebyshevSegment],
}

#[derive(Deserialize)]
struct Payload {
    version: u32,
    segments: Vec<ChebyshevSegment>,
}

/// Write `segments` to `writer`.
pub fn write_chebyshev<W: Write>(
    mut writer: W,
    segments: &[ChebyshevSegment],
) -> Result<(), ChebyshevStreamError> {
    writer.write_all(CHEBYSHEV_MAGIC)?;
    bincode::serialize_into(
        &mut writer,
        &PayloadRef {
            version: STREAM_VERSION,
            segments,
        },
    )?;
    writer.flush()?;
    Ok(())
}

/// Read segments from `reader`.
pub fn read_chebyshev<R: Read>(mut reader: R) -> Result<Vec<ChebyshevSegment>, ChebyshevStreamError> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != CHEBYSHEV_MAGIC {
        return Err(ChebyshevStreamError::BadMagic);
    }

    let payload: Payload = bincode::deserialize_from(reader)?;
    if payload.version != STREAM_VERSION {
        return Err(ChebyshevStreamError::Version(payload.version));
    }
    for (index, segment) in payload.segments.iter().enumerate() {
        if let Some(reason) = segment.defect() {
            return Err(ChebyshevStreamError::Malformed { index, reason });
        }
    }
    Ok(payload.segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epoch::Mjd;
    use crate::phase::Phase;
    use crate::segment::{ChebyshevWindow, PhaseFunction, Segment};
    use crate::solver::InversePhase;

    struct Linear;

    impl PhaseFunction for Linear {
        fn phase_at(&self, t: &Mjd, _mhz: f64) -> Phase {
            Phase::from_product(t.seconds_since(&Mjd::new(58000, 0, 0.0)), 100.0)
        }

        fn frequency_at(&self, _t: &Mjd) -> f64 {
            100.0
        }
    }

    fn segment() -> ChebyshevSegment {
        let window = ChebyshevWindow {
            source: "J0437-4715".to_string(),
            site: "pks".to_string(),
            start: Mjd::new(58000, 0, 0.0),
            end: Mjd::new(58001, 0, 0.0),
            freq_low: 1300.0,
            freq_high: 1500.0,
            ncoeff_time: 4,
            ncoeff_freq: 2,
            dispersion_constant: 0.0,
        };
        ChebyshevSegment::fit(&window, &Linear).unwrap()
    }

    #[test]
    fn test_stream_preserves_segments() {
        let mut buffer = Vec::new();
        write_chebyshev(&mut buffer, &[segment()]).unwrap();
        assert!(buffer.starts_with(CHEBYSHEV_MAGIC));

        let segments = read_chebyshev(buffer.as_slice()).unwrap();
        assert_eq!(segments.len(), 1);
        let t = Mjd::new(58000, 777, 0.25);
        assert_eq!(segments[0].phase(&t), segment().phase(&t));
        assert_eq!(segments[0].source(), "J0437-4715");
    }

    #[test]
    fn test_rejects_foreign_bytes() {
        let err = read_chebyshev(&b"NOTCHEB1xxxxxxxx"[..]).unwrap_err();
        assert!(matches!(err, ChebyshevStreamError::BadMagic));
    }

    #[test]
    fn test_rejects_inconsistent_grid() {
        let mut buffer = Vec::new();
        let corrupt = segment().with_grid_shape(400, 2);
        write_chebyshev(&mut buffer, &[segment(), corrupt]).unwrap();

        let err = read_chebyshev(buffer.as_slice()).unwrap_err();
        assert!(matches!(err, ChebyshevStreamError::Malformed { index: 1, .. }));
    }

    #[test]
    fn test_rejects_zero_coefficient_count() {
        let mut buffer = Vec::new();
        write_chebyshev(&mut buffer, &[segment().with_grid_shape(0, 2)]).unwrap();
        assert!(matches!(
            read_chebyshev(buffer.as_slice()).unwrap_err(),
            ChebyshevStreamError::Malformed { index: 0, .. }
        ));
    }

    #[test]
    fn test_truncated_stream() {
        let mut buffer = Vec::new();
        write_chebyshev(&mut buffer, &[segment()]).unwrap();
        buffer.truncate(buffer.len() / 2);
        assert!(read_chebyshev(buffer.as_slice()).is_err());
    }
}
