//! Pulse phase with an integer/fractional split.
//!
//! Pulse counts over a long observing campaign easily reach 10⁹–10¹¹ turns,
//! where a single `f64` no longer resolves a microsecond of phase. [`Phase`]
//! keeps whole turns in an `i64` and the remainder in an `f64`, and every
//! operation re-normalizes ("settles") the pair.
//!
//! # Invariant
//!
//! After every mutation `|fturns| < 1`, and the sign of `fturns` agrees with
//! the sign of `turns` whenever `turns != 0`.
//!
//! # Example
//!
//! ```
//! use pulsephase::Phase;
//!
//! let p = Phase::new(1_000_000_000, 0.25) + 0.875;
//! assert_eq!(p.intturns(), 1_000_000_001);
//! assert!((p.fracturns() - 0.125).abs() < 1e-15);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::epoch::Mjd;

/// Tolerance on fractional turns below which two phases compare equal.
pub const PHASE_EPSILON: f64 = 2e-15;

/// Pulse phase in turns, split into whole and fractional parts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Phase {
    turns: i64,
    fturns: f64,
}

impl Phase {
    /// Zero phase.
    pub const ZERO: Phase = Phase {
        turns: 0,
        fturns: 0.0,
    };

    /// Create a phase from whole and fractional turns.
    ///
    /// `fturns` may be any finite value; whole turns it contains are carried
    /// into `turns`.
    pub fn new(turns: i64, fturns: f64) -> Self {
        let mut phase = Self { turns, fturns };
        phase.settle();
        phase
    }

    /// Create a phase from a plain number of turns.
    pub fn from_turns(turns: f64) -> Self {
        Self::new(0, turns)
    }

    /// Create a phase from the product `a · b` without losing the rounding
    /// error of the multiplication.
    pub fn from_product(a: f64, b: f64) -> Self {
        let product = a * b;
        let error = a.mul_add(b, -product);
        Self::from_turns(product) + error
    }

    fn settle(&mut self) {
        let whole = self.fturns.trunc();
        self.turns += whole as i64;
        self.fturns -= whole;

        if self.fturns < 0.0 && self.turns > 0 {
            self.fturns += 1.0;
            self.turns -= 1;
        } else if self.fturns > 0.0 && self.turns < 0 {
            self.fturns -= 1.0;
            self.turns += 1;
        }

        // borrowing a turn can round the fraction up to exactly one
        if self.fturns >= 1.0 {
            self.fturns -= 1.0;
            self.turns += 1;
        } else if self.fturns <= -1.0 {
            self.fturns += 1.0;
            self.turns -= 1;
        }
    }

    /// Total phase as a single `f64` (loses precision for large turn counts).
    pub fn in_turns(&self) -> f64 {
        self.turns as f64 + self.fturns
    }

    /// Whole turns.
    pub fn intturns(&self) -> i64 {
        self.turns
    }

    /// Fractional turns, `-1 < fracturns < 1`.
    pub fn fracturns(&self) -> f64 {
        self.fturns
    }

    /// Smallest whole turn not less than this phase.
    pub fn ceil(&self) -> Phase {
        if self.fturns > 0.0 {
            Phase::new(self.turns + 1, 0.0)
        } else {
            Phase::new(self.turns, 0.0)
        }
    }

    /// Largest whole turn not greater than this phase.
    pub fn floor(&self) -> Phase {
        if self.fturns < 0.0 {
            Phase::new(self.turns - 1, 0.0)
        } else {
            Phase::new(self.turns, 0.0)
        }
    }

    /// Nearest whole turn; halves round away from zero.
    pub fn rint(&self) -> Phase {
        if self.fturns >= 0.5 {
            Phase::new(self.turns + 1, 0.0)
        } else if self.fturns <= -0.5 {
            Phase::new(self.turns - 1, 0.0)
        } else {
            Phase::new(self.turns, 0.0)
        }
    }

    /// Time spanned by this many turns of the given period (seconds).
    ///
    /// Whole and fractional turns are scaled separately and recombined as an
    /// [`Mjd`] offset, so the sub-turn part keeps full precision even when
    /// `turns` is very large.
    pub fn times_period(&self, period: f64) -> Mjd {
        let big_seconds = self.turns as f64 * period;
        let big_error = (self.turns as f64).mul_add(period, -big_seconds);
        let small_seconds = self.fturns * period;
        Mjd::from_seconds(big_seconds) + (small_seconds + big_error)
    }

    /// Format with `precision` digits after the decimal point.
    pub fn to_string_with(&self, precision: usize) -> String {
        let negative = self.turns < 0 || (self.turns == 0 && self.fturns < 0.0);
        let mut whole = self.turns.unsigned_abs();
        let mut fraction = format!("{:.*}", precision, self.fturns.abs());

        // rounding of the fraction may carry into the whole turns
        if fraction.starts_with('1') {
            whole += 1;
            fraction = format!("{:.*}", precision, 0.0);
        }

        let fraction = fraction.trim_start_matches('0');
        let sign = if negative { "-" } else { "" };
        format!("{}{}{}", sign, whole, fraction)
    }
}

impl From<f64> for Phase {
    fn from(turns: f64) -> Self {
        Phase::from_turns(turns)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = f.precision().unwrap_or(12);
        write!(f, "{}", self.to_string_with(precision))
    }
}

impl PartialEq for Phase {
    fn eq(&self, other: &Self) -> bool {
        self.turns == other.turns && (self.fturns - other.fturns).abs() < PHASE_EPSILON
    }
}

impl PartialOrd for Phase {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.turns != other.turns {
            return Some(self.turns.cmp(&other.turns));
        }
        if (self.fturns - other.fturns).abs() < PHASE_EPSILON {
            return Some(Ordering::Equal);
        }
        self.fturns.partial_cmp(&other.fturns)
    }
}

impl Add for Phase {
    type Output = Phase;

    fn add(self, rhs: Phase) -> Phase {
        Phase::new(self.turns + rhs.turns, self.fturns + rhs.fturns)
    }
}

impl Sub for Phase {
    type Output = Phase;

    fn sub(self, rhs: Phase) -> Phase {
        Phase::new(self.turns - rhs.turns, self.fturns - rhs.fturns)
    }
}

impl Add<f64> for Phase {
    type Output = Phase;

    fn add(self, turns: f64) -> Phase {
        Phase::new(self.turns, self.fturns + turns)
    }
}

impl Sub<f64> for Phase {
    type Output = Phase;

    fn sub(self, turns: f64) -> Phase {
        Phase::new(self.turns, self.fturns - turns)
    }
}

impl AddAssign<f64> for Phase {
    fn add_assign(&mut self, turns: f64) {
        *self = *self + turns;
    }
}

impl SubAssign<f64> for Phase {
    fn sub_assign(&mut self, turns: f64) {
        *self = *self - turns;
    }
}

impl AddAssign for Phase {
    fn add_assign(&mut self, rhs: Phase) {
        *self = *self + rhs;
    }
}

impl SubAssign for Phase {
    fn sub_assign(&mut self, rhs: Phase) {
        *self = *self - rhs;
    }
}

impl Neg for Phase {
    type Output = Phase;

    fn neg(self) -> Phase {
        Phase::new(-self.turns, -self.fturns)
    }
}

/// Turns times a period in seconds yields a time offset.
impl Mul<f64> for Phase {
    type Output = Mjd;

    fn mul(self, period: f64) -> Mjd {
        self.times_period(period)
    }
}
