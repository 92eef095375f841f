//! Time values and host clock abstractions.
//!
//! Document times are `f32` seconds. Two values are reserved: [`UNRESOLVED`]
//! (NaN) for "not yet known" and [`INDEFINITE`] (+∞) for "known to be
//! unbounded". Arithmetic that mixes these follows the SMIL rules implemented
//! by [`min_time`], [`max_time`], [`minus_time`] and [`multiply_time`], which
//! are *not* ordinary float comparisons.

use core::fmt;

/// A time value in seconds.
pub type Time = f32;

/// A time that has not been determined yet.
pub const UNRESOLVED: Time = f32::NAN;

/// A time that is resolved but unbounded.
pub const INDEFINITE: Time = f32::INFINITY;

/// Returns whether `t` is [`UNRESOLVED`].
#[inline]
pub fn is_unresolved(t: Time) -> bool {
    t.is_nan()
}

#[inline]
fn is_open(t: Time) -> bool {
    t == INDEFINITE || is_unresolved(t)
}

/// Compares two times for equality, treating two unresolved values as equal.
#[inline]
pub fn same_time(a: Time, b: Time) -> bool {
    a == b || (is_unresolved(a) && is_unresolved(b))
}

/// Subtracts `t2` from `t1`.
pub fn minus_time(t1: Time, t2: Time) -> Time {
    if is_unresolved(t1) || is_unresolved(t2) {
        return UNRESOLVED;
    }
    if t1 == INDEFINITE || t2 == INDEFINITE {
        return INDEFINITE;
    }
    t1 - t2
}

/// Multiplies a simple time by `n`.
pub fn multiply_time(t: Time, n: f32) -> Time {
    if is_unresolved(t) || t == INDEFINITE {
        return t;
    }
    t * n
}

/// Returns the minimum of two time values.
///
/// Zero absorbs everything, a resolved finite value wins over an open one,
/// and `INDEFINITE` wins over `UNRESOLVED`.
pub fn min_time(t1: Time, t2: Time) -> Time {
    if t1 == 0.0 || t2 == 0.0 {
        return 0.0;
    }
    if is_open(t1) && !is_open(t2) {
        return t2;
    }
    if is_open(t2) && !is_open(t1) {
        return t1;
    }
    if (t1 == INDEFINITE && is_unresolved(t2)) || (is_unresolved(t1) && t2 == INDEFINITE) {
        return INDEFINITE;
    }
    if t1 < t2 { t1 } else { t2 }
}

/// Returns the maximum of two time values.
///
/// An open value (`INDEFINITE` or `UNRESOLVED`) wins over a finite one, and
/// mixing `INDEFINITE` with `UNRESOLVED` yields `UNRESOLVED`.
pub fn max_time(t1: Time, t2: Time) -> Time {
    if is_open(t1) && !is_open(t2) {
        return t1;
    }
    if is_open(t2) && !is_open(t1) {
        return t2;
    }
    if (t1 == INDEFINITE && is_unresolved(t2)) || (is_unresolved(t1) && t2 == INDEFINITE) {
        return UNRESOLVED;
    }
    if t1 > t2 { t1 } else { t2 }
}

/// Lowest of two wake times, where an unresolved value counts as "never".
#[inline]
pub(crate) fn earliest(a: Time, b: Time) -> Time {
    match (is_unresolved(a), is_unresolved(b)) {
        (true, true) => INDEFINITE,
        (true, false) => b,
        (false, true) => a,
        (false, false) => {
            if a < b {
                a
            } else {
                b
            }
        }
    }
}

/// Converts seconds to whole milliseconds, rounding half away from zero.
pub(crate) fn seconds_to_millis(t: Time) -> i64 {
    let ms = t as f64 * 1e3;
    if ms >= 0.0 {
        (ms + 0.5) as i64
    } else {
        (ms - 0.5) as i64
    }
}

/// `Display` adapter that renders the reserved values by name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTime(pub Time);

impl fmt::Display for DisplayTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if is_unresolved(self.0) {
            f.write_str("UNRESOLVED")
        } else if self.0 == INDEFINITE {
            f.write_str("INDEFINITE")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Wraps a time for display.
#[inline]
pub fn display_time(t: Time) -> DisplayTime {
    DisplayTime(t)
}

/// Host clock used by [`DocumentTimeline`](crate::timeline::DocumentTimeline).
pub trait TimeSource<I: TimeInstant> {
    /// Returns the current time instant.
    fn now(&self) -> I;
}

/// Millisecond-resolution duration supplied by the host.
pub trait TimeDuration: Copy + PartialEq {
    /// Zero duration constant.
    const ZERO: Self;

    /// Converts duration to milliseconds.
    fn as_millis(&self) -> u64;

    /// Creates duration from milliseconds.
    fn from_millis(millis: u64) -> Self;

    /// Saturating subtraction (returns ZERO on underflow).
    fn saturating_sub(self, other: Self) -> Self;

    /// The duration in (fractional) seconds.
    fn as_secs(&self) -> Time {
        self.as_millis() as f32 / 1000.0
    }
}

/// Monotonic instant supplied by the host.
pub trait TimeInstant: Copy {
    /// Duration type for this instant.
    type Duration: TimeDuration;

    /// Calculates duration since an earlier instant.
    fn duration_since(&self, earlier: Self) -> Self::Duration;

    /// Adds duration to instant, returns None on overflow.
    fn checked_add(self, duration: Self::Duration) -> Option<Self>;

    /// Subtracts duration from instant, returns None on underflow.
    fn checked_sub(self, duration: Self::Duration) -> Option<Self>;
}

/// Rounds a non-negative finite wait time up to whole milliseconds.
pub(crate) fn duration_from_secs<D: TimeDuration>(t: Time) -> D {
    if !(t > 0.0) {
        return D::ZERO;
    }
    let exact = t as f64 * 1e3;
    let whole = exact as u64;
    if (whole as f64) < exact {
        D::from_millis(whole + 1)
    } else {
        D::from_millis(whole)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_time_zero_absorbs() {
        assert_eq!(min_time(0.0, INDEFINITE), 0.0);
        assert_eq!(min_time(UNRESOLVED, 0.0), 0.0);
        assert_eq!(min_time(0.0, 3.0), 0.0);
    }

    #[test]
    fn min_time_prefers_resolved_operand() {
        assert_eq!(min_time(UNRESOLVED, 2.0), 2.0);
        assert_eq!(min_time(2.0, INDEFINITE), 2.0);
        assert_eq!(min_time(INDEFINITE, UNRESOLVED), INDEFINITE);
        assert_eq!(min_time(UNRESOLVED, INDEFINITE), INDEFINITE);
        assert!(is_unresolved(min_time(UNRESOLVED, UNRESOLVED)));
    }

    #[test]
    fn max_time_prefers_open_operand() {
        assert_eq!(max_time(INDEFINITE, 2.0), INDEFINITE);
        assert!(is_unresolved(max_time(2.0, UNRESOLVED)));
        assert!(is_unresolved(max_time(INDEFINITE, UNRESOLVED)));
        assert_eq!(max_time(1.0, 2.0), 2.0);
    }

    #[test]
    fn minus_and_multiply_propagate_sentinels() {
        assert!(is_unresolved(minus_time(UNRESOLVED, INDEFINITE)));
        assert_eq!(minus_time(INDEFINITE, 5.0), INDEFINITE);
        assert_eq!(minus_time(7.0, 5.0), 2.0);
        assert_eq!(multiply_time(INDEFINITE, 3.0), INDEFINITE);
        assert!(is_unresolved(multiply_time(UNRESOLVED, 3.0)));
        assert_eq!(multiply_time(1.5, 2.0), 3.0);
    }

    #[test]
    fn earliest_ignores_unresolved() {
        assert_eq!(earliest(UNRESOLVED, 2.0), 2.0);
        assert_eq!(earliest(UNRESOLVED, UNRESOLVED), INDEFINITE);
        assert_eq!(earliest(1.0, INDEFINITE), 1.0);
    }

    #[test]
    fn seconds_round_to_millis() {
        assert_eq!(seconds_to_millis(1.0006), 1001);
        assert_eq!(seconds_to_millis(-0.25), -250);
        assert_eq!(seconds_to_millis(2.0), 2000);
    }
}
