//! TEMPO polyco text format.
//!
//! Each segment is two header lines followed by the coefficients:
//!
//! ```text
//! 1937+21    04-Sep-17   010203.50     58000.04309606481           71.023100  -0.123 -6.241
//!   6118574231.123456 641.928250028350   7   960  12   1400.000
//!  1.23456789012345678D-03 -2.34567890123456789D-07  3.45678901234567890D-11
//!  ...
//! ```
//!
//! Line one: name, date, UTC, reference epoch (MJD), DM, and optionally the
//! Doppler shift (units of 1e-4) and log10 of the rms residual. Line two:
//! reference phase, f0, site, span (minutes), coefficient count, observing
//! frequency, and optionally binary phase and orbital frequency.
//!
//! Coefficients are written in fixed 25-column fields with Fortran `D`
//! exponents. Adjacent fields with negative values run together, so the
//! reader splits on signs as well as whitespace.

use std::fmt::Write as _;

use thiserror::Error;

use crate::epoch::Mjd;
use crate::phase::Phase;
use crate::segment::Polynomial;

/// Coefficients per line in written files.
const COEFFICIENTS_PER_LINE: usize = 3;

/// Largest coefficient count accepted from a header.
pub const MAX_COEFFICIENTS: usize = 64;

/// Errors reading polyco text.
#[derive(Debug, Error)]
pub enum PolycoParseError {
    #[error("no segments found")]
    Empty,

    #[error("line {line}: missing {field}")]
    MissingField { line: usize, field: &'static str },

    #[error("line {line}: invalid {field} '{value}'")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: {count} coefficients exceeds the limit of {}", MAX_COEFFICIENTS)]
    TooManyCoefficients { line: usize, count: u64 },

    #[error("segment at line {line}: expected {expected} coefficients, found {found}")]
    CoefficientCount {
        line: usize,
        expected: usize,
        found: usize,
    },
}

fn number<T: std::str::FromStr>(
    token: Option<&str>,
    line: usize,
    field: &'static str,
) -> Result<T, PolycoParseError> {
    let token = token.ok_or(PolycoParseError::MissingField { line, field })?;
    token
        .replace(['D', 'd'], "E")
        .parse()
        .map_err(|_| PolycoParseError::InvalidNumber {
            line,
            field,
            value: token.to_string(),
        })
}

/// Parse a reference phase without passing the integer part through f64.
fn parse_phase(token: &str, line: usize) -> Result<Phase, PolycoParseError> {
    let invalid = || PolycoParseError::InvalidNumber {
        line,
        field: "reference phase",
        value: token.to_string(),
    };

    let negative = token.starts_with('-');
    let (whole, frac) = token.split_once('.').unwrap_or((token, ""));
    let turns: i64 = match whole.trim_start_matches(['+', '-']) {
        "" => 0,
        digits => digits.parse().map_err(|_| invalid())?,
    };
    let fturns: f64 = if frac.is_empty() {
        0.0
    } else {
        format!("0.{}", frac).parse().map_err(|_| invalid())?
    };

    Ok(if negative {
        -Phase::new(turns, fturns)
    } else {
        Phase::new(turns, fturns)
    })
}

/// Split a coefficient line into numbers, separating fields that touch.
fn split_coefficients(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        let after_exponent = current.ends_with(['D', 'd', 'E', 'e']);
        if (c == '+' || c == '-') && !current.is_empty() && !after_exponent {
            tokens.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Parse every segment in `text`.
pub fn parse_polyco(text: &str) -> Result<Vec<Polynomial>, PolycoParseError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty());

    let mut segments = Vec::new();
    while let Some((n1, header)) = lines.next() {
        let mut f = header.split_whitespace();
        let psrname = f
            .next()
            .ok_or(PolycoParseError::MissingField { line: n1, field: "name" })?
            .to_string();
        let date = f
            .next()
            .ok_or(PolycoParseError::MissingField { line: n1, field: "date" })?
            .to_string();
        let utc = f
            .next()
            .ok_or(PolycoParseError::MissingField { line: n1, field: "utc" })?
            .to_string();
        let reftime_token = f.next().ok_or(PolycoParseError::MissingField {
            line: n1,
            field: "reference epoch",
        })?;
        let reftime: Mjd = reftime_token
            .parse()
            .map_err(|_| PolycoParseError::InvalidNumber {
                line: n1,
                field: "reference epoch",
                value: reftime_token.to_string(),
            })?;
        let dm: f64 = number(f.next(), n1, "dm")?;
        let doppler: f64 = f.next().map_or(Ok(0.0), |t| number(Some(t), n1, "doppler"))?;
        let log_rms: f64 = f.next().map_or(Ok(0.0), |t| number(Some(t), n1, "log rms"))?;

        let (n2, second) = lines.next().ok_or(PolycoParseError::MissingField {
            line: n1 + 1,
            field: "second header line",
        })?;
        let mut f = second.split_whitespace();
        let phase_token = f.next().ok_or(PolycoParseError::MissingField {
            line: n2,
            field: "reference phase",
        })?;
        let ref_phase = parse_phase(phase_token, n2)?;
        let f0: f64 = number(f.next(), n2, "f0")?;
        let site = f
            .next()
            .ok_or(PolycoParseError::MissingField { line: n2, field: "site" })?
            .to_string();
        let nspan: f64 = number(f.next(), n2, "span")?;
        let count: u64 = number(f.next(), n2, "coefficient count")?;
        let ncoef = match usize::try_from(count) {
            Ok(n) if n <= MAX_COEFFICIENTS => n,
            _ => return Err(PolycoParseError::TooManyCoefficients { line: n2, count }),
        };
        let freq: f64 = number(f.next(), n2, "frequency")?;
        let binary = match (f.next(), f.next()) {
            (Some(phase), Some(freq)) => Some((
                number(Some(phase), n2, "binary phase")?,
                number(Some(freq), n2, "orbital frequency")?,
            )),
            _ => None,
        };

        let mut coefs = Vec::new();
        while coefs.len() < ncoef {
            let Some((n, line)) = lines.next() else {
                break;
            };
            for token in split_coefficients(line) {
                coefs.push(number(Some(&token), n, "coefficient")?);
            }
        }
        if coefs.len() != ncoef {
            return Err(PolycoParseError::CoefficientCount {
                line: n1,
                expected: ncoef,
                found: coefs.len(),
            });
        }

        segments.push(Polynomial {
            psrname,
            date,
            utc,
            reftime,
            dm,
            doppler,
            log_rms,
            ref_phase,
            f0,
            site,
            nspan,
            freq,
            binary,
            coefs,
            flexibility: crate::segment::DEFAULT_FLEXIBILITY,
        });
    }

    if segments.is_empty() {
        return Err(PolycoParseError::Empty);
    }
    Ok(segments)
}

/// Format a coefficient as `±d.dddddddddddddddddD±ee`.
fn fortran_double(value: f64) -> String {
    let formatted = format!("{:.17e}", value);
    let (mantissa, exponent) = formatted.split_once('e').unwrap_or((&formatted, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    format!("{}D{}{:02}", mantissa, if exponent < 0 { '-' } else { '+' }, exponent.abs())
}

/// Render one segment.
pub fn write_segment(out: &mut String, poly: &Polynomial) {
    let date = if poly.date.is_empty() {
        poly.reftime.date_string()
    } else {
        poly.date.clone()
    };
    let utc = if poly.utc.is_empty() {
        poly.reftime.utc_string()
    } else {
        poly.utc.clone()
    };

    let _ = writeln!(
        out,
        "{:<10} {:>9} {:>11} {:>20} {:>21.6} {:>6.3} {:>6.3}",
        poly.psrname,
        date,
        utc,
        poly.reftime.to_days_string(11),
        poly.dm,
        poly.doppler,
        poly.log_rms,
    );

    let _ = write!(
        out,
        "{:>20} {:>17.12} {:>4} {:>5} {:>4} {:>10.3}",
        poly.ref_phase.to_string_with(6),
        poly.f0,
        poly.site,
        poly.nspan.round() as i64,
        poly.coefs.len(),
        poly.freq,
    );
    if let Some((phase, freq)) = poly.binary {
        let _ = write!(out, " {:>7.4} {:>9.4}", phase, freq);
    }
    out.push('\n');

    for chunk in poly.coefs.chunks(COEFFICIENTS_PER_LINE) {
        for c in chunk {
            let _ = write!(out, "{:>25}", fortran_double(*c));
        }
        out.push('\n');
    }
}

/// Render a list of segments.
pub fn write_polyco<'a>(segments: impl IntoIterator<Item = &'a Polynomial>) -> String {
    let mut out = String::new();
    for poly in segments {
        write_segment(&mut out, poly);
    }
    out
}
