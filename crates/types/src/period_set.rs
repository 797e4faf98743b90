//! Period sets: ordered collections of disjoint periods with set algebra.

use crate::period::Period;
use crate::time::{Interval, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered set of pairwise-disjoint periods.
///
/// Adjacent periods never form a contiguous cover: the constructor merges
/// overlapping or adjacent inputs, so two stored periods may share an endpoint
/// only when both exclude it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSet {
    periods: Vec<Period>,
}

impl PeriodSet {
    /// Build a period set from arbitrary periods, sorting and coalescing
    /// overlapping or adjacent ones.
    ///
    /// Returns `None` when `periods` is empty.
    pub fn new(mut periods: Vec<Period>) -> Option<Self> {
        if periods.is_empty() {
            return None;
        }
        periods.sort_by(|a, b| a.cmp_periods(b));
        let mut merged: Vec<Period> = Vec::with_capacity(periods.len());
        for p in periods {
            match merged.last_mut() {
                Some(last) if last.overlaps(&p) || last.is_adjacent(&p) => {
                    *last = last.bounding_union(&p);
                }
                _ => merged.push(p),
            }
        }
        Some(PeriodSet { periods: merged })
    }

    pub fn from_period(p: Period) -> Self {
        PeriodSet { periods: vec![p] }
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn num_periods(&self) -> usize {
        self.periods.len()
    }

    pub fn period_n(&self, n: usize) -> Option<&Period> {
        self.periods.get(n)
    }

    /// Bounding period of the whole set.
    pub fn period(&self) -> Period {
        let first = self.periods.first().expect("period set is never empty");
        let last = self.periods.last().expect("period set is never empty");
        Period {
            lower: first.lower,
            upper: last.upper,
            lower_inc: first.lower_inc,
            upper_inc: last.upper_inc,
        }
    }

    /// Sum of the member durations (not the bounding duration).
    pub fn duration(&self) -> Interval {
        self.periods
            .iter()
            .fold(Interval::ZERO, |acc, p| acc + p.duration())
    }

    /// Binary search for the period containing `t`.
    ///
    /// Returns `(true, i)` when member `i` contains `t`, and `(false, i)`
    /// where `i` counts the members lying strictly before `t` otherwise.
    pub fn find_timestamp(&self, t: Timestamp) -> (bool, usize) {
        let mut first = 0usize;
        let mut last = self.periods.len();
        while first < last {
            let middle = (first + last) / 2;
            let p = &self.periods[middle];
            if p.contains(t) {
                return (true, middle);
            }
            if t <= p.lower {
                last = middle;
            } else {
                first = middle + 1;
            }
        }
        (false, first)
    }

    pub fn contains_timestamp(&self, t: Timestamp) -> bool {
        self.find_timestamp(t).0
    }

    pub fn overlaps_period(&self, p: &Period) -> bool {
        self.periods.iter().any(|q| q.overlaps(p))
    }

    /// Intersection with a single period.
    pub fn at_period(&self, p: &Period) -> Option<PeriodSet> {
        let pieces: Vec<Period> = self
            .periods
            .iter()
            .filter_map(|q| q.intersection(p))
            .collect();
        if pieces.is_empty() {
            None
        } else {
            Some(PeriodSet { periods: pieces })
        }
    }

    /// Difference with a single period.
    pub fn minus_period(&self, p: &Period) -> Option<PeriodSet> {
        let mut pieces: Vec<Period> = Vec::with_capacity(self.periods.len() + 1);
        for q in &self.periods {
            pieces.extend(subtract_period(q, p));
        }
        if pieces.is_empty() {
            None
        } else {
            Some(PeriodSet { periods: pieces })
        }
    }

    /// Difference with another period set.
    pub fn minus(&self, other: &PeriodSet) -> Option<PeriodSet> {
        let mut pieces: Vec<Period> = self.periods.clone();
        for p in &other.periods {
            let mut next = Vec::with_capacity(pieces.len() + 1);
            for q in &pieces {
                next.extend(subtract_period(q, p));
            }
            pieces = next;
            if pieces.is_empty() {
                return None;
            }
        }
        Some(PeriodSet { periods: pieces })
    }

    /// Set union; overlapping and adjacent members coalesce.
    pub fn union(&self, other: &PeriodSet) -> PeriodSet {
        let mut all = self.periods.clone();
        all.extend(other.periods.iter().copied());
        PeriodSet::new(all).expect("union of non-empty sets is non-empty")
    }

    pub fn iter(&self) -> impl Iterator<Item = &Period> {
        self.periods.iter()
    }
}

/// The 0, 1, or 2 pieces of `q` left after removing `p`.
fn subtract_period(q: &Period, p: &Period) -> Vec<Period> {
    use crate::period::{cmp_lower_bounds, cmp_upper_bounds};
    use std::cmp::Ordering;

    if !q.overlaps(p) {
        return vec![*q];
    }
    let mut pieces = Vec::with_capacity(2);
    if cmp_lower_bounds(q.lower, q.lower_inc, p.lower, p.lower_inc) == Ordering::Less {
        if let Ok(left) = Period::new(q.lower, p.lower, q.lower_inc, !p.lower_inc) {
            pieces.push(left);
        }
    }
    if cmp_upper_bounds(q.upper, q.upper_inc, p.upper, p.upper_inc) == Ordering::Greater {
        if let Ok(right) = Period::new(p.upper, q.upper, !p.upper_inc, q.upper_inc) {
            pieces.push(right);
        }
    }
    pieces
}

impl fmt::Display for PeriodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, p) in self.periods.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, "}}")
    }
}
