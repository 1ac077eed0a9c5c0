//! Modified Julian Date timestamps.
//!
//! An [`Mjd`] stores whole days, whole seconds into the day, and fractional
//! seconds separately. Differences between nearby epochs are therefore exact
//! to well below a nanosecond even at MJD 60000, which a single `f64` of days
//! (resolution ≈ 1 µs) cannot deliver.
//!
//! The same type doubles as a time offset (for example the result of
//! multiplying a [`Phase`](crate::Phase) by a period); offsets may have a
//! negative day count.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Seconds in one day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Smallest fractional-second difference the comparison operators resolve.
pub const MJD_PRECISION: f64 = 2e-15;

/// Calendar date of MJD 0.
const MJD_ZERO: (i32, u32, u32) = (1858, 11, 17);

/// A Modified Julian Date (or an offset between two of them).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Mjd {
    days: i64,
    secs: i64,
    fracsec: f64,
}

impl Mjd {
    /// Create an epoch from days, seconds into the day, and fractional seconds.
    ///
    /// Values outside their nominal ranges are carried into the next field.
    pub fn new(days: i64, secs: i64, fracsec: f64) -> Self {
        Self::normalized(days, secs, fracsec)
    }

    /// Create an epoch from an integer day and a fraction of a day.
    pub fn from_day_fraction(days: i64, fracday: f64) -> Self {
        let seconds = fracday * SECONDS_PER_DAY as f64;
        let whole = seconds.floor();
        Self::normalized(days, whole as i64, seconds - whole)
    }

    /// Create an epoch from fractional days.
    pub fn from_days(mjd: f64) -> Self {
        let days = mjd.floor();
        Self::from_day_fraction(days as i64, mjd - days)
    }

    /// Create an offset of `seconds` from MJD 0.
    pub fn from_seconds(seconds: f64) -> Self {
        let whole = seconds.floor();
        Self::normalized(0, whole as i64, seconds - whole)
    }

    /// The current time.
    pub fn now() -> Self {
        Self::from_datetime(&Utc::now().naive_utc())
    }

    /// Convert a UTC calendar time.
    pub fn from_datetime(datetime: &NaiveDateTime) -> Self {
        let base = NaiveDate::from_ymd_opt(MJD_ZERO.0, MJD_ZERO.1, MJD_ZERO.2).unwrap_or_default();
        let days = (datetime.date() - base).num_days();
        let secs = datetime.num_seconds_from_midnight() as i64;
        let fracsec = datetime.nanosecond() as f64 * 1e-9;
        Self::normalized(days, secs, fracsec)
    }

    fn normalized(days: i64, secs: i64, fracsec: f64) -> Self {
        let carry = fracsec.floor();
        let mut fracsec = fracsec - carry;
        let mut secs = secs + carry as i64;

        if fracsec >= 1.0 {
            fracsec -= 1.0;
            secs += 1;
        }

        let days = days + secs.div_euclid(SECONDS_PER_DAY);
        let secs = secs.rem_euclid(SECONDS_PER_DAY);

        Self {
            days,
            secs,
            fracsec,
        }
    }

    /// Whole days.
    pub fn intday(&self) -> i64 {
        self.days
    }

    /// Whole seconds into the day.
    pub fn secs(&self) -> i64 {
        self.secs
    }

    /// Fractional seconds.
    pub fn fracsec(&self) -> f64 {
        self.fracsec
    }

    /// Fraction of the day elapsed.
    pub fn fracday(&self) -> f64 {
        (self.secs as f64 + self.fracsec) / SECONDS_PER_DAY as f64
    }

    pub fn in_days(&self) -> f64 {
        self.days as f64 + self.fracday()
    }

    pub fn in_seconds(&self) -> f64 {
        (self.days * SECONDS_PER_DAY + self.secs) as f64 + self.fracsec
    }

    pub fn in_minutes(&self) -> f64 {
        self.in_seconds() / 60.0
    }

    /// Seconds elapsed from `earlier` to `self`.
    ///
    /// Whole seconds are differenced as integers before the fractional parts
    /// are added, so nearby epochs differ exactly.
    pub fn seconds_since(&self, earlier: &Mjd) -> f64 {
        let whole = (self.days - earlier.days) * SECONDS_PER_DAY + (self.secs - earlier.secs);
        whole as f64 + (self.fracsec - earlier.fracsec)
    }

    /// Minutes elapsed from `earlier` to `self`.
    pub fn minutes_since(&self, earlier: &Mjd) -> f64 {
        self.seconds_since(earlier) / 60.0
    }

    /// Days elapsed from `earlier` to `self`.
    pub fn days_since(&self, earlier: &Mjd) -> f64 {
        self.seconds_since(earlier) / SECONDS_PER_DAY as f64
    }

    /// The midpoint between two epochs.
    pub fn midpoint(&self, other: &Mjd) -> Mjd {
        *self + other.seconds_since(self) / 2.0
    }

    /// Convert to a UTC calendar time (`None` outside chrono's range).
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        let base = NaiveDate::from_ymd_opt(MJD_ZERO.0, MJD_ZERO.1, MJD_ZERO.2)?;
        let date = base.checked_add_signed(Duration::try_days(self.days)?)?;
        let nanos = (self.fracsec * 1e9).round() as i64;
        date.and_hms_opt(0, 0, 0)?
            .checked_add_signed(Duration::try_seconds(self.secs)?)?
            .checked_add_signed(Duration::nanoseconds(nanos))
    }

    /// Calendar date in the `DD-Mon-YY` form used by polyco headers.
    pub fn date_string(&self) -> String {
        self.to_datetime()
            .map(|dt| dt.format("%d-%b-%y").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// UTC time of day in the `HHMMSS.SS` form used by polyco headers.
    pub fn utc_string(&self) -> String {
        let hours = self.secs / 3600;
        let minutes = (self.secs % 3600) / 60;
        let seconds = (self.secs % 60) as f64 + self.fracsec;
        // keep 59.999 from printing as 60.00
        let seconds = (seconds * 100.0).floor() / 100.0;
        format!("{:02}{:02}{:05.2}", hours, minutes, seconds)
    }

    /// Format as fractional days with `precision` decimal places.
    pub fn to_days_string(&self, precision: usize) -> String {
        if self.days < 0 {
            return format!("{:.*}", precision, self.in_days());
        }

        let mut days = self.days;
        let mut fraction = format!("{:.*}", precision, self.fracday());
        if fraction.starts_with('1') {
            days += 1;
            fraction = format!("{:.*}", precision, 0.0);
        }
        format!("{}{}", days, fraction.trim_start_matches('0'))
    }
}

impl fmt::Display for Mjd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = f.precision().unwrap_or(12);
        write!(f, "{}", self.to_days_string(precision))
    }
}

/// Error parsing an epoch string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid MJD '{0}'")]
pub struct ParseMjdError(pub String);

impl FromStr for Mjd {
    type Err = ParseMjdError;

    /// Parse fractional days, keeping the integer day exact.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let err = || ParseMjdError(s.to_string());

        let (int_part, frac_part) = match text.split_once('.') {
            Some((i, f)) => (i, f),
            None => (text, ""),
        };

        if int_part.starts_with('-') {
            let days: f64 = text.parse().map_err(|_| err())?;
            return Ok(Mjd::from_days(days));
        }

        let days: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| err())?
        };

        let fracday = if frac_part.is_empty() {
            0.0
        } else {
            if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            format!("0.{}", frac_part).parse::<f64>().map_err(|_| err())?
        };

        Ok(Mjd::from_day_fraction(days, fracday))
    }
}

impl PartialEq for Mjd {
    fn eq(&self, other: &Self) -> bool {
        self.days == other.days
            && self.secs == other.secs
            && (self.fracsec - other.fracsec).abs() < MJD_PRECISION
    }
}

impl PartialOrd for Mjd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.days, self.secs).cmp(&(other.days, other.secs)) {
            Ordering::Equal => {
                if (self.fracsec - other.fracsec).abs() < MJD_PRECISION {
                    Some(Ordering::Equal)
                } else {
                    self.fracsec.partial_cmp(&other.fracsec)
                }
            }
            ordering => Some(ordering),
        }
    }
}

/// Shift an epoch by a number of seconds.
impl Add<f64> for Mjd {
    type Output = Mjd;

    fn add(self, seconds: f64) -> Mjd {
        let whole = seconds.trunc();
        Mjd::normalized(
            self.days,
            self.secs + whole as i64,
            self.fracsec + (seconds - whole),
        )
    }
}

impl Sub<f64> for Mjd {
    type Output = Mjd;

    fn sub(self, seconds: f64) -> Mjd {
        self + (-seconds)
    }
}

impl AddAssign<f64> for Mjd {
    fn add_assign(&mut self, seconds: f64) {
        *self = *self + seconds;
    }
}

impl SubAssign<f64> for Mjd {
    fn sub_assign(&mut self, seconds: f64) {
        *self = *self - seconds;
    }
}

/// Add an offset to an epoch.
impl Add for Mjd {
    type Output = Mjd;

    fn add(self, rhs: Mjd) -> Mjd {
        Mjd::normalized(
            self.days + rhs.days,
            self.secs + rhs.secs,
            self.fracsec + rhs.fracsec,
        )
    }
}

/// The offset between two epochs.
impl Sub for Mjd {
    type Output = Mjd;

    fn sub(self, rhs: Mjd) -> Mjd {
        Mjd::normalized(
            self.days - rhs.days,
            self.secs - rhs.secs,
            self.fracsec - rhs.fracsec,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_fields() {
        let t = Mjd::new(58000, 86_400 + 10, 1.5);
        assert_eq!(t.intday(), 58001);
        assert_eq!(t.secs(), 11);
        assert!((t.fracsec() - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_negative_seconds_borrow_a_day() {
        let t = Mjd::new(58000, 0, 0.0) - 0.25;
        assert_eq!(t.intday(), 57999);
        assert_eq!(t.secs(), 86_399);
        assert!((t.fracsec() - 0.75).abs() < 1e-15);
    }

    #[test]
    fn test_from_days() {
        let t = Mjd::from_days(58000.5);
        assert_eq!(t.intday(), 58000);
        assert_eq!(t.secs(), 43_200);
        assert!(t.fracsec().abs() < 1e-6);
    }

    #[test]
    fn test_seconds_since_is_exact_for_nearby_epochs() {
        let reference = Mjd::new(58000, 0, 0.0);
        let later = reference + 1000.0;
        assert_eq!(later.seconds_since(&reference), 1000.0);
        assert_eq!(later.minutes_since(&reference), 1000.0 / 60.0);
        assert_eq!(reference.seconds_since(&later), -1000.0);
    }

    #[test]
    fn test_sub_yields_offset() {
        let a = Mjd::new(58001, 100, 0.25);
        let b = Mjd::new(58000, 50, 0.5);
        let offset = a - b;
        assert!((offset.in_seconds() - (86_400.0 + 49.75)).abs() < 1e-9);
        assert_eq!(b + offset, a);
    }

    #[test]
    fn test_comparison_with_epsilon() {
        let a = Mjd::new(58000, 10, 0.5);
        assert_eq!(a, Mjd::new(58000, 10, 0.5 + 1e-16));
        assert!(a < Mjd::new(58000, 10, 0.6));
        assert!(a > Mjd::new(57999, 86_399, 0.9));
    }

    #[test]
    fn test_parse_keeps_integer_day() {
        let t: Mjd = "58000.25".parse().unwrap();
        assert_eq!(t.intday(), 58000);
        assert_eq!(t.secs(), 21_600);

        let whole: Mjd = "58000".parse().unwrap();
        assert_eq!(whole, Mjd::new(58000, 0, 0.0));

        assert!("58000.2x".parse::<Mjd>().is_err());
        assert!("abc".parse::<Mjd>().is_err());
    }

    #[test]
    fn test_days_string() {
        let t = Mjd::new(58000, 43_200, 0.0);
        assert_eq!(t.to_days_string(3), "58000.500");
        assert_eq!(format!("{:.1}", t), "58000.5");
    }

    #[test]
    fn test_calendar_round_trip() {
        let t = Mjd::new(58000, 3723, 0.5);
        let dt = t.to_datetime().unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2017-09-04 01:02:03");
        assert_eq!(Mjd::from_datetime(&dt), t);
    }

    #[test]
    fn test_polyco_header_strings() {
        let t = Mjd::new(58000, 3723, 0.5);
        assert_eq!(t.date_string(), "04-Sep-17");
        assert_eq!(t.utc_string(), "010203.50");
    }

    #[test]
    fn test_midpoint() {
        let a = Mjd::new(58000, 0, 0.0);
        let b = Mjd::new(58001, 0, 0.0);
        assert_eq!(a.midpoint(&b), Mjd::new(58000, 43_200, 0.0));
    }
}
