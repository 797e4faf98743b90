//! The temporal value façade: one sum type over the subtypes, routing each
//! operation to the subtype-specific implementation.

use crate::error::{Result, TemporalError};
use crate::inst::TInstant;
use crate::seq::TSequence;
use crate::seqset::TSequenceSet;
use crate::sync::{
    intersect_set_discrete, synchronize_seq_seq, synchronize_set_seq, synchronize_set_set,
    SyncMode,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tempo_types::bbox::TBox;
use tempo_types::period::Period;
use tempo_types::period_set::PeriodSet;
use tempo_types::time::{Interval, Timestamp};
use tempo_types::value::{Interpolation, TempType, Value};

/// Runtime tag of a temporal value's representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subtype {
    Instant,
    DiscreteSequence,
    ContinuousSequence,
    SequenceSet,
}

/// A temporal value of any subtype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Temporal {
    Instant(TInstant),
    Sequence(TSequence),
    SequenceSet(TSequenceSet),
}

impl Temporal {
    pub fn subtype(&self) -> Subtype {
        match self {
            Temporal::Instant(_) => Subtype::Instant,
            Temporal::Sequence(seq) => {
                if seq.interpolation() == Interpolation::Discrete {
                    Subtype::DiscreteSequence
                } else {
                    Subtype::ContinuousSequence
                }
            }
            Temporal::SequenceSet(_) => Subtype::SequenceSet,
        }
    }

    pub fn temptype(&self) -> TempType {
        match self {
            Temporal::Instant(inst) => inst.temptype(),
            Temporal::Sequence(seq) => seq.temptype(),
            Temporal::SequenceSet(ss) => ss.temptype(),
        }
    }

    /// Declared interpolation; an instant has none.
    pub fn interpolation(&self) -> Option<Interpolation> {
        match self {
            Temporal::Instant(_) => None,
            Temporal::Sequence(seq) => Some(seq.interpolation()),
            Temporal::SequenceSet(ss) => Some(ss.interpolation()),
        }
    }

    pub fn bbox(&self) -> TBox {
        match self {
            Temporal::Instant(inst) => inst.bbox(),
            Temporal::Sequence(seq) => *seq.bbox(),
            Temporal::SequenceSet(ss) => *ss.bbox(),
        }
    }

    /// Bounding period.
    pub fn period(&self) -> Period {
        match self {
            Temporal::Instant(inst) => inst.period(),
            Temporal::Sequence(seq) => *seq.period(),
            Temporal::SequenceSet(ss) => ss.period(),
        }
    }

    /// Exact time support.
    pub fn time(&self) -> PeriodSet {
        match self {
            Temporal::Instant(inst) => PeriodSet::from_period(inst.period()),
            Temporal::Sequence(seq) => {
                if seq.interpolation() == Interpolation::Discrete {
                    PeriodSet::new(seq.instants().iter().map(|i| Period::at(i.t)).collect())
                        .expect("a sequence is never empty")
                } else {
                    PeriodSet::from_period(*seq.period())
                }
            }
            Temporal::SequenceSet(ss) => ss.time(),
        }
    }

    pub fn start_timestamp(&self) -> Timestamp {
        match self {
            Temporal::Instant(inst) => inst.t,
            Temporal::Sequence(seq) => seq.start_timestamp(),
            Temporal::SequenceSet(ss) => ss.start_timestamp(),
        }
    }

    pub fn end_timestamp(&self) -> Timestamp {
        match self {
            Temporal::Instant(inst) => inst.t,
            Temporal::Sequence(seq) => seq.end_timestamp(),
            Temporal::SequenceSet(ss) => ss.end_timestamp(),
        }
    }

    pub fn duration(&self, boundspan: bool) -> Interval {
        match self {
            Temporal::Instant(_) => Interval::ZERO,
            Temporal::Sequence(seq) => seq.duration(),
            Temporal::SequenceSet(ss) => ss.duration(boundspan),
        }
    }

    pub fn num_instants(&self) -> usize {
        match self {
            Temporal::Instant(_) => 1,
            Temporal::Sequence(seq) => seq.num_instants(),
            Temporal::SequenceSet(ss) => ss.num_instants(),
        }
    }

    /// Distinct values, sorted.
    pub fn values(&self) -> Vec<Value> {
        match self {
            Temporal::Instant(inst) => vec![inst.value.clone()],
            Temporal::Sequence(seq) => {
                let mut out: Vec<Value> =
                    seq.instants().iter().map(|i| i.value.clone()).collect();
                out.sort_by(|a, b| a.total_cmp(b));
                out.dedup();
                out
            }
            Temporal::SequenceSet(ss) => ss.values(),
        }
    }

    pub fn value_at(&self, t: Timestamp, strict: bool) -> Option<Value> {
        match self {
            Temporal::Instant(inst) => inst.value_at(t).cloned(),
            Temporal::Sequence(seq) => seq.value_at(t, strict),
            Temporal::SequenceSet(ss) => ss.value_at(t, strict),
        }
    }

    // ------------------------------------------------------------------
    // Restriction routing
    // ------------------------------------------------------------------

    pub fn at_timestamp(&self, t: Timestamp) -> Option<Temporal> {
        match self {
            Temporal::Instant(inst) => (inst.t == t).then(|| self.clone()),
            Temporal::Sequence(seq) => seq.at_timestamp(t).map(Temporal::Instant),
            Temporal::SequenceSet(ss) => ss.at_timestamp(t).map(Temporal::Instant),
        }
    }

    pub fn minus_timestamp(&self, t: Timestamp) -> Option<Temporal> {
        match self {
            Temporal::Instant(inst) => (inst.t != t).then(|| self.clone()),
            Temporal::Sequence(seq) => {
                let pieces = seq.minus_timestamp(t);
                Self::from_pieces(pieces)
            }
            Temporal::SequenceSet(ss) => ss.minus_timestamp(t).map(Temporal::SequenceSet),
        }
    }

    pub fn at_period(&self, p: &Period) -> Option<Temporal> {
        match self {
            Temporal::Instant(inst) => p.contains(inst.t).then(|| self.clone()),
            Temporal::Sequence(seq) => seq.at_period(p).map(Temporal::Sequence),
            Temporal::SequenceSet(ss) => ss.at_period(p).map(Temporal::SequenceSet),
        }
    }

    pub fn minus_period(&self, p: &Period) -> Option<Temporal> {
        match self {
            Temporal::Instant(inst) => (!p.contains(inst.t)).then(|| self.clone()),
            Temporal::Sequence(seq) => Self::from_pieces(seq.minus_period(p)),
            Temporal::SequenceSet(ss) => ss.minus_period(p).map(Temporal::SequenceSet),
        }
    }

    pub fn at_periodset(&self, ps: &PeriodSet) -> Option<Temporal> {
        match self {
            Temporal::Instant(inst) => ps.contains_timestamp(inst.t).then(|| self.clone()),
            Temporal::Sequence(seq) => Self::from_pieces(seq.at_periodset(ps)),
            Temporal::SequenceSet(ss) => ss.at_periodset(ps).map(Temporal::SequenceSet),
        }
    }

    pub fn minus_periodset(&self, ps: &PeriodSet) -> Option<Temporal> {
        match self {
            Temporal::Instant(inst) => (!ps.contains_timestamp(inst.t)).then(|| self.clone()),
            Temporal::Sequence(seq) => Self::from_pieces(seq.minus_periodset(ps)),
            Temporal::SequenceSet(ss) => ss.minus_periodset(ps).map(Temporal::SequenceSet),
        }
    }

    pub fn restrict_value(&self, value: &Value, atfunc: bool) -> Option<Temporal> {
        match self {
            Temporal::Instant(inst) => {
                ((&inst.value == value) == atfunc).then(|| self.clone())
            }
            Temporal::Sequence(seq) => Self::from_pieces(seq.restrict_value(value, atfunc)),
            Temporal::SequenceSet(ss) => {
                ss.restrict_value(value, atfunc).map(Temporal::SequenceSet)
            }
        }
    }

    /// Wrap restriction pieces back into the smallest fitting subtype.
    fn from_pieces(pieces: Vec<TSequence>) -> Option<Temporal> {
        match pieces.len() {
            0 => None,
            1 => {
                let seq = pieces.into_iter().next().expect("len checked");
                Some(Temporal::Sequence(seq))
            }
            _ => TSequenceSet::make(pieces, false).ok().map(Temporal::SequenceSet),
        }
    }

    // ------------------------------------------------------------------
    // Constructors across subtypes
    // ------------------------------------------------------------------

    /// Promote any subtype to a sequence set.
    ///
    /// A discrete sequence cannot be promoted; it reports an interpolation
    /// mismatch.
    pub fn to_sequenceset(&self) -> Result<TSequenceSet> {
        match self {
            Temporal::Instant(inst) => {
                let interp = inst.temptype().default_interpolation();
                TSequenceSet::from_instant(inst.clone(), interp)
            }
            Temporal::Sequence(seq) => {
                if seq.interpolation() == Interpolation::Discrete {
                    return Err(TemporalError::InterpolationMismatch);
                }
                TSequenceSet::from_sequence(seq.clone())
            }
            Temporal::SequenceSet(ss) => Ok(ss.clone()),
        }
    }

    /// Merge two temporal values of the same subtype family.
    pub fn merge(&self, other: &Temporal) -> Result<Temporal> {
        if self.temptype() != other.temptype() {
            return Err(TemporalError::TypeMismatch);
        }
        match (self, other) {
            (Temporal::Instant(a), Temporal::Instant(b)) => {
                if a.t == b.t {
                    if a.value != b.value {
                        return Err(TemporalError::ValueMismatchAtJoin(a.t));
                    }
                    return Ok(Temporal::Instant(a.clone()));
                }
                let (first, second) = if a.t < b.t { (a, b) } else { (b, a) };
                Ok(Temporal::Sequence(TSequence::discrete(vec![
                    first.clone(),
                    second.clone(),
                ])?))
            }
            (Temporal::Sequence(a), Temporal::Sequence(b))
                if a.interpolation() == Interpolation::Discrete
                    && b.interpolation() == Interpolation::Discrete =>
            {
                let mut instants: Vec<TInstant> = a.instants().to_vec();
                instants.extend(b.instants().iter().cloned());
                instants.sort_by(|x, y| x.t.cmp(&y.t));
                for pair in instants.windows(2) {
                    if pair[0].t == pair[1].t && pair[0].value != pair[1].value {
                        return Err(TemporalError::ValueMismatchAtJoin(pair[0].t));
                    }
                }
                instants.dedup_by(|a, b| a.t == b.t);
                Ok(Temporal::Sequence(TSequence::discrete(instants)?))
            }
            _ => {
                let a = self.to_sequenceset()?;
                let b = other.to_sequenceset()?;
                Ok(Temporal::SequenceSet(a.merge(&b)?))
            }
        }
    }

    /// Synchronise two temporal values, producing a pair with identical
    /// period structure.
    pub fn synchronize(&self, other: &Temporal, mode: SyncMode) -> Option<(Temporal, Temporal)> {
        match (self, other) {
            (Temporal::Instant(a), _) => {
                let v = other.value_at(a.t, true)?;
                Some((
                    Temporal::Instant(a.clone()),
                    Temporal::Instant(TInstant::new(a.t, v)),
                ))
            }
            (_, Temporal::Instant(b)) => {
                let (rb, ra) = other.synchronize(self, mode)?;
                Some((ra, rb))
            }
            (Temporal::Sequence(a), Temporal::Sequence(b)) => {
                match (a.interpolation(), b.interpolation()) {
                    (Interpolation::Discrete, Interpolation::Discrete) => {
                        let shared: Vec<Timestamp> = a
                            .timestamps()
                            .into_iter()
                            .filter(|t| b.timestamps().contains(t))
                            .collect();
                        let sa = a.at_timestampset(&shared)?;
                        let sb = b.at_timestampset(&shared)?;
                        Some((Temporal::Sequence(sa), Temporal::Sequence(sb)))
                    }
                    (Interpolation::Discrete, _) => {
                        let ts = a.timestamps();
                        let sb = b.at_timestampset(&ts)?;
                        let sa = a.at_timestampset(&sb.timestamps())?;
                        Some((Temporal::Sequence(sa), Temporal::Sequence(sb)))
                    }
                    (_, Interpolation::Discrete) => {
                        let (rb, ra) = other.synchronize(self, mode)?;
                        Some((ra, rb))
                    }
                    _ => {
                        let (sa, sb) = synchronize_seq_seq(a, b, mode)?;
                        Some((Temporal::Sequence(sa), Temporal::Sequence(sb)))
                    }
                }
            }
            (Temporal::SequenceSet(a), Temporal::Sequence(b)) => {
                if b.interpolation() == Interpolation::Discrete {
                    let (sa, sb) = intersect_set_discrete(a, b)?;
                    Some((Temporal::Sequence(sa), Temporal::Sequence(sb)))
                } else {
                    let (sa, sb) = synchronize_set_seq(a, b, mode)?;
                    Some((Temporal::SequenceSet(sa), Temporal::SequenceSet(sb)))
                }
            }
            (Temporal::Sequence(_), Temporal::SequenceSet(_)) => {
                let (rb, ra) = other.synchronize(self, mode)?;
                Some((ra, rb))
            }
            (Temporal::SequenceSet(a), Temporal::SequenceSet(b)) => {
                let (sa, sb) = synchronize_set_set(a, b, mode)?;
                Some((Temporal::SequenceSet(sa), Temporal::SequenceSet(sb)))
            }
        }
    }

    // ------------------------------------------------------------------
    // Order and hash
    // ------------------------------------------------------------------

    fn subtype_rank(&self) -> u8 {
        match self.subtype() {
            Subtype::Instant => 0,
            Subtype::DiscreteSequence => 1,
            Subtype::ContinuousSequence => 2,
            Subtype::SequenceSet => 3,
        }
    }

    /// Total order: subtype rank, then the subtype's lexicographic order.
    pub fn cmp_temporal(&self, other: &Temporal) -> Ordering {
        match (self, other) {
            (Temporal::Instant(a), Temporal::Instant(b)) => a.cmp_instants(b),
            (Temporal::Sequence(a), Temporal::Sequence(b)) => a.cmp_sequences(b),
            (Temporal::SequenceSet(a), Temporal::SequenceSet(b)) => a.cmp_seqsets(b),
            _ => self.subtype_rank().cmp(&other.subtype_rank()),
        }
    }

    pub fn hash32(&self) -> u32 {
        match self {
            Temporal::Instant(inst) => inst.hash32(),
            Temporal::Sequence(seq) => seq.hash32(),
            Temporal::SequenceSet(ss) => ss.hash32(),
        }
    }
}

impl fmt::Display for Temporal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Temporal::Instant(inst) => write!(f, "{inst}"),
            Temporal::Sequence(seq) => write!(f, "{seq}"),
            Temporal::SequenceSet(ss) => write!(f, "{ss}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(n: i64) -> Timestamp {
        Timestamp::from_micros(n)
    }

    fn fi(t: i64, v: f64) -> TInstant {
        TInstant::new(ts(t), Value::Float(v))
    }

    fn seq(insts: Vec<TInstant>, lower_inc: bool, upper_inc: bool) -> TSequence {
        TSequence::new(insts, lower_inc, upper_inc, Interpolation::Linear, true).unwrap()
    }

    #[test]
    fn test_subtype_tags() {
        let inst = Temporal::Instant(fi(0, 1.0));
        assert_eq!(inst.subtype(), Subtype::Instant);
        assert_eq!(inst.interpolation(), None);

        let disc = Temporal::Sequence(TSequence::discrete(vec![fi(0, 1.0), fi(2, 2.0)]).unwrap());
        assert_eq!(disc.subtype(), Subtype::DiscreteSequence);

        let cont = Temporal::Sequence(seq(vec![fi(0, 1.0), fi(2, 2.0)], true, false));
        assert_eq!(cont.subtype(), Subtype::ContinuousSequence);

        let set = Temporal::SequenceSet(
            TSequenceSet::make(vec![seq(vec![fi(0, 1.0), fi(2, 2.0)], true, false)], false)
                .unwrap(),
        );
        assert_eq!(set.subtype(), Subtype::SequenceSet);
    }

    #[test]
    fn test_routing_value_at() {
        let inst = Temporal::Instant(fi(5, 2.0));
        assert_eq!(inst.value_at(ts(5), true), Some(Value::Float(2.0)));
        assert_eq!(inst.value_at(ts(6), true), None);

        let cont = Temporal::Sequence(seq(vec![fi(0, 0.0), fi(10, 10.0)], true, false));
        assert_eq!(cont.value_at(ts(5), true), Some(Value::Float(5.0)));
    }

    #[test]
    fn test_time_of_discrete_is_instants() {
        let disc = Temporal::Sequence(TSequence::discrete(vec![fi(0, 1.0), fi(4, 2.0)]).unwrap());
        let time = disc.time();
        assert_eq!(time.num_periods(), 2);
        assert!(time.contains_timestamp(ts(0)));
        assert!(!time.contains_timestamp(ts(2)));
    }

    #[test]
    fn test_minus_period_promotes_to_set() {
        let cont = Temporal::Sequence(seq(vec![fi(0, 0.0), fi(10, 10.0)], true, false));
        let p = Period::new(ts(3), ts(7), true, true).unwrap();
        let rest = cont.minus_period(&p).unwrap();
        assert_eq!(rest.subtype(), Subtype::SequenceSet);
        assert_eq!(rest.num_instants(), 4);
    }

    #[test]
    fn test_merge_instants_into_discrete() {
        let a = Temporal::Instant(fi(0, 1.0));
        let b = Temporal::Instant(fi(5, 2.0));
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.subtype(), Subtype::DiscreteSequence);
        assert_eq!(merged.num_instants(), 2);

        let clash = Temporal::Instant(fi(0, 9.0));
        assert_eq!(
            a.merge(&clash).unwrap_err(),
            TemporalError::ValueMismatchAtJoin(ts(0))
        );
    }

    #[test]
    fn test_merge_sequences_promotes() {
        let a = Temporal::Sequence(seq(vec![fi(0, 0.0), fi(2, 2.0)], true, false));
        let b = Temporal::Sequence(seq(vec![fi(4, 4.0), fi(6, 6.0)], true, false));
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.subtype(), Subtype::SequenceSet);
        assert_eq!(merged.num_instants(), 4);
    }

    #[test]
    fn test_synchronize_instant_against_sequence() {
        let inst = Temporal::Instant(fi(5, 99.0));
        let cont = Temporal::Sequence(seq(vec![fi(0, 0.0), fi(10, 10.0)], true, false));
        let (a, b) = inst.synchronize(&cont, SyncMode::Plain).unwrap();
        assert_eq!(a.value_at(ts(5), true), Some(Value::Float(99.0)));
        assert_eq!(b.value_at(ts(5), true), Some(Value::Float(5.0)));
    }

    #[test]
    fn test_cmp_consistent_with_eq() {
        let a = Temporal::Sequence(seq(vec![fi(0, 0.0), fi(2, 2.0)], true, false));
        let b = Temporal::Sequence(seq(vec![fi(0, 0.0), fi(2, 2.0)], true, false));
        let c = Temporal::Sequence(seq(vec![fi(0, 0.0), fi(2, 3.0)], true, false));
        assert_eq!(a.cmp_temporal(&b), Ordering::Equal);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a.cmp_temporal(&c), Ordering::Equal);
        // Antisymmetry.
        assert_eq!(a.cmp_temporal(&c), c.cmp_temporal(&a).reverse());
    }
}
