//! Periods: contiguous spans on the timeline with inclusive or exclusive bounds.

use crate::time::{Interval, Timestamp};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A contiguous interval on the timeline.
///
/// Invariants: `lower <= upper`, and a degenerate period (`lower == upper`)
/// has both bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub lower: Timestamp,
    pub upper: Timestamp,
    pub lower_inc: bool,
    pub upper_inc: bool,
}

/// Order two lower bounds; an inclusive bound starts before an exclusive one
/// at the same timestamp.
pub fn cmp_lower_bounds(t1: Timestamp, inc1: bool, t2: Timestamp, inc2: bool) -> Ordering {
    t1.cmp(&t2).then_with(|| inc2.cmp(&inc1))
}

/// Order two upper bounds; an exclusive bound ends before an inclusive one
/// at the same timestamp.
pub fn cmp_upper_bounds(t1: Timestamp, inc1: bool, t2: Timestamp, inc2: bool) -> Ordering {
    t1.cmp(&t2).then_with(|| inc1.cmp(&inc2))
}

impl Period {
    pub fn new(
        lower: Timestamp,
        upper: Timestamp,
        lower_inc: bool,
        upper_inc: bool,
    ) -> Result<Self, String> {
        if lower > upper {
            return Err(format!("period bounds out of order: {lower} > {upper}"));
        }
        if lower == upper && !(lower_inc && upper_inc) {
            return Err(format!("degenerate period at {lower} must be inclusive"));
        }
        Ok(Period {
            lower,
            upper,
            lower_inc,
            upper_inc,
        })
    }

    /// The single-instant period `[t, t]`.
    pub fn at(t: Timestamp) -> Self {
        Period {
            lower: t,
            upper: t,
            lower_inc: true,
            upper_inc: true,
        }
    }

    pub fn inclusive(lower: Timestamp, upper: Timestamp) -> Result<Self, String> {
        Period::new(lower, upper, true, true)
    }

    pub fn is_instant(&self) -> bool {
        self.lower == self.upper
    }

    pub fn duration(&self) -> Interval {
        self.upper - self.lower
    }

    pub fn contains(&self, t: Timestamp) -> bool {
        (t > self.lower || (t == self.lower && self.lower_inc))
            && (t < self.upper || (t == self.upper && self.upper_inc))
    }

    pub fn overlaps(&self, other: &Period) -> bool {
        (self.lower < other.upper
            || (self.lower == other.upper && self.lower_inc && other.upper_inc))
            && (other.lower < self.upper
                || (other.lower == self.upper && other.lower_inc && self.upper_inc))
    }

    /// True if every point of `other` lies in `self`.
    pub fn contains_period(&self, other: &Period) -> bool {
        cmp_lower_bounds(self.lower, self.lower_inc, other.lower, other.lower_inc) != Ordering::Greater
            && cmp_upper_bounds(self.upper, self.upper_inc, other.upper, other.upper_inc)
                != Ordering::Less
    }

    /// True if `self` ends strictly before `other` begins.
    pub fn is_before(&self, other: &Period) -> bool {
        self.upper < other.lower
            || (self.upper == other.lower && !(self.upper_inc && other.lower_inc))
    }

    pub fn is_after(&self, other: &Period) -> bool {
        other.is_before(self)
    }

    /// True if the two periods touch at a single shared timestamp that exactly
    /// one of them includes, so their union is contiguous.
    pub fn is_adjacent(&self, other: &Period) -> bool {
        (self.upper == other.lower && self.upper_inc != other.lower_inc)
            || (other.upper == self.lower && other.upper_inc != self.lower_inc)
    }

    pub fn intersection(&self, other: &Period) -> Option<Period> {
        let (lower, lower_inc) =
            match cmp_lower_bounds(self.lower, self.lower_inc, other.lower, other.lower_inc) {
                Ordering::Less => (other.lower, other.lower_inc),
                _ => (self.lower, self.lower_inc),
            };
        let (upper, upper_inc) =
            match cmp_upper_bounds(self.upper, self.upper_inc, other.upper, other.upper_inc) {
                Ordering::Greater => (other.upper, other.upper_inc),
                _ => (self.upper, self.upper_inc),
            };
        Period::new(lower, upper, lower_inc, upper_inc).ok()
    }

    /// Smallest period covering both inputs; gaps between them are absorbed.
    pub fn bounding_union(&self, other: &Period) -> Period {
        let (lower, lower_inc) =
            match cmp_lower_bounds(self.lower, self.lower_inc, other.lower, other.lower_inc) {
                Ordering::Greater => (other.lower, other.lower_inc),
                _ => (self.lower, self.lower_inc),
            };
        let (upper, upper_inc) =
            match cmp_upper_bounds(self.upper, self.upper_inc, other.upper, other.upper_inc) {
                Ordering::Less => (other.upper, other.upper_inc),
                _ => (self.upper, self.upper_inc),
            };
        Period {
            lower,
            upper,
            lower_inc,
            upper_inc,
        }
    }

    /// Lexicographic order on (lower bound, upper bound).
    pub fn cmp_periods(&self, other: &Period) -> Ordering {
        cmp_lower_bounds(self.lower, self.lower_inc, other.lower, other.lower_inc).then_with(|| {
            cmp_upper_bounds(self.upper, self.upper_inc, other.upper, other.upper_inc)
        })
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}, {}{}",
            if self.lower_inc { '[' } else { '(' },
            self.lower,
            self.upper,
            if self.upper_inc { ']' } else { ')' },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(n: i64) -> Timestamp {
        Timestamp::from_micros(n)
    }

    fn p(lo: i64, hi: i64, li: bool, ui: bool) -> Period {
        Period::new(ts(lo), ts(hi), li, ui).unwrap()
    }

    #[test]
    fn test_new_rejects_inverted_bounds() {
        assert!(Period::new(ts(5), ts(1), true, true).is_err());
        assert!(Period::new(ts(5), ts(5), true, false).is_err());
        assert!(Period::new(ts(5), ts(5), true, true).is_ok());
    }

    #[test]
    fn test_contains_respects_bounds() {
        let half_open = p(0, 10, true, false);
        assert!(half_open.contains(ts(0)));
        assert!(half_open.contains(ts(9)));
        assert!(!half_open.contains(ts(10)));
        assert!(!half_open.contains(ts(-1)));
    }

    #[test]
    fn test_overlaps_at_touching_bound() {
        let a = p(0, 5, true, true);
        let b = p(5, 10, true, true);
        let c = p(5, 10, false, true);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(a.is_before(&c));
        assert!(!a.is_before(&b));
    }

    #[test]
    fn test_adjacency() {
        let a = p(0, 5, true, false);
        let b = p(5, 10, true, false);
        assert!(a.is_adjacent(&b));
        let c = p(5, 10, false, false);
        assert!(!a.is_adjacent(&c));
    }

    #[test]
    fn test_intersection() {
        let a = p(0, 10, true, false);
        let b = p(5, 15, true, true);
        assert_eq!(a.intersection(&b), Some(p(5, 10, true, false)));

        let c = p(10, 15, false, true);
        assert_eq!(a.intersection(&c), None);

        let d = p(0, 5, true, true);
        let e = p(5, 10, true, false);
        assert_eq!(d.intersection(&e), Some(Period::at(ts(5))));
    }

    #[test]
    fn test_bounding_union() {
        let a = p(0, 4, true, false);
        let b = p(6, 10, false, true);
        assert_eq!(a.bounding_union(&b), p(0, 10, true, true));
    }

    #[test]
    fn test_bound_ordering() {
        assert_eq!(
            cmp_lower_bounds(ts(1), true, ts(1), false),
            Ordering::Less
        );
        assert_eq!(
            cmp_upper_bounds(ts(1), false, ts(1), true),
            Ordering::Less
        );
        assert_eq!(cmp_lower_bounds(ts(1), true, ts(2), false), Ordering::Less);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            p(0, 1_000_000, true, false).to_string(),
            "[1970-01-01 00:00:00+00, 1970-01-01 00:00:01+00)"
        );
    }
}
