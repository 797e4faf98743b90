//! Temporal sequence sets: ordered disjoint sequences sharing one
//! interpolation.
//!
//! This is the most general representation of a temporal value and the home
//! of the top-level algorithms: binary search over the sequence array,
//! restriction for every selector, append with amortised growth, insert /
//! update / delete under the strict ordering rules, and merge.

use crate::error::{Result, TemporalError};
use crate::inst::TInstant;
use crate::seq::{merge_seq_array, normalize_seq_array, TSequence};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tempo_types::bbox::TBox;
use tempo_types::period::Period;
use tempo_types::period_set::PeriodSet;
use tempo_types::time::{Interval, Timestamp};
use tempo_types::value::{Interpolation, NumSpan, TempType, Value};

/// An ordered collection of disjoint sequences over one interpolation.
///
/// Invariants:
/// - at least one sequence, all with the same temporal type, continuity, and
///   interpolation (step or linear; a discrete collection is a discrete
///   sequence, not a set);
/// - sequence periods are strictly ordered and pairwise disjoint; adjacent
///   periods may share an endpoint only when at least one side excludes it;
/// - `total_instants` is the sum of the member instant counts;
/// - the bounding box is the union of the members' boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TSequenceSet {
    interp: Interpolation,
    sequences: Vec<TSequence>,
    total_instants: usize,
    bbox: TBox,
}

impl TSequenceSet {
    /// Build a set from sequences, validating the ordering and interpolation
    /// agreement. With `normalize`, adjacent joinable sequences are merged.
    ///
    /// `normalize` is false when synchronizing two sets before applying an
    /// operation to them, so their period structures stay aligned.
    pub fn make(sequences: Vec<TSequence>, normalize: bool) -> Result<Self> {
        let first = sequences.first().ok_or(TemporalError::EmptyResult)?;
        let interp = first.interpolation();
        let temptype = first.temptype();
        if interp == Interpolation::Discrete {
            return Err(TemporalError::InterpolationMismatch);
        }
        for seq in &sequences {
            if seq.interpolation() != interp {
                return Err(TemporalError::InterpolationMismatch);
            }
            if seq.temptype() != temptype {
                return Err(TemporalError::TypeMismatch);
            }
        }
        for pair in sequences.windows(2) {
            if !pair[0].period().is_before(pair[1].period()) {
                return Err(TemporalError::InvalidOrder(format!(
                    "sequences must be disjointly ordered: {} then {}",
                    pair[0].period(),
                    pair[1].period()
                )));
            }
        }
        Ok(Self::from_valid_parts(sequences, normalize))
    }

    /// Set holding a single sequence.
    pub fn from_sequence(seq: TSequence) -> Result<Self> {
        Self::make(vec![seq], false)
    }

    /// Promote an instant to a singleton set.
    pub fn from_instant(inst: TInstant, interp: Interpolation) -> Result<Self> {
        Self::from_sequence(TSequence::from_instant(inst, interp))
    }

    /// Constant value over every period of a period set.
    pub fn from_base(value: Value, time: &PeriodSet, interp: Interpolation) -> Result<Self> {
        if interp == Interpolation::Linear && !value.temptype().is_continuous() {
            return Err(TemporalError::InterpolationMismatch);
        }
        let sequences: Vec<TSequence> = time
            .iter()
            .map(|p| {
                if p.is_instant() {
                    TSequence::from_instant(TInstant::new(p.lower, value.clone()), interp)
                } else {
                    TSequence::assemble(
                        vec![
                            TInstant::new(p.lower, value.clone()),
                            TInstant::new(p.upper, value.clone()),
                        ],
                        p.lower_inc,
                        p.upper_inc,
                        interp,
                    )
                }
            })
            .collect();
        Self::make(sequences, false)
    }

    /// Assemble from sequences already known to satisfy the invariants.
    pub(crate) fn from_valid_parts(sequences: Vec<TSequence>, normalize: bool) -> Self {
        debug_assert!(!sequences.is_empty());
        let sequences = if normalize {
            normalize_seq_array(sequences)
        } else {
            sequences
        };
        let interp = sequences[0].interpolation();
        let total_instants = sequences.iter().map(|s| s.num_instants()).sum();
        let mut bbox = *sequences[0].bbox();
        for seq in &sequences[1..] {
            bbox = bbox.union(seq.bbox());
        }
        TSequenceSet {
            interp,
            sequences,
            total_instants,
            bbox,
        }
    }

    fn wrap(pieces: Vec<TSequence>, normalize: bool) -> Option<TSequenceSet> {
        if pieces.is_empty() {
            None
        } else {
            Some(Self::from_valid_parts(pieces, normalize))
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn interpolation(&self) -> Interpolation {
        self.interp
    }

    pub fn temptype(&self) -> TempType {
        self.sequences[0].temptype()
    }

    pub fn bbox(&self) -> &TBox {
        &self.bbox
    }

    pub fn sequences(&self) -> &[TSequence] {
        &self.sequences
    }

    pub fn num_sequences(&self) -> usize {
        self.sequences.len()
    }

    pub fn sequence_n(&self, n: usize) -> Option<&TSequence> {
        self.sequences.get(n)
    }

    pub fn total_instants(&self) -> usize {
        self.total_instants
    }

    fn first_seq(&self) -> &TSequence {
        &self.sequences[0]
    }

    fn last_seq(&self) -> &TSequence {
        &self.sequences[self.sequences.len() - 1]
    }

    /// Bounding period of the whole set.
    pub fn period(&self) -> Period {
        let first = self.first_seq().period();
        let last = self.last_seq().period();
        Period {
            lower: first.lower,
            upper: last.upper,
            lower_inc: first.lower_inc,
            upper_inc: last.upper_inc,
        }
    }

    pub fn start_timestamp(&self) -> Timestamp {
        self.first_seq().period().lower
    }

    pub fn end_timestamp(&self) -> Timestamp {
        self.last_seq().period().upper
    }

    /// Exact time support as a period set.
    pub fn time(&self) -> PeriodSet {
        PeriodSet::new(self.sequences.iter().map(|s| *s.period()).collect())
            .expect("a sequence set is never empty")
    }

    /// Total duration: the sum of member durations, or the bounding period's
    /// length when `boundspan`.
    pub fn duration(&self, boundspan: bool) -> Interval {
        if boundspan {
            return self.period().duration();
        }
        self.sequences
            .iter()
            .fold(Interval::ZERO, |acc, s| acc + s.period().duration())
    }

    /// Distinct base values, sorted.
    pub fn values(&self) -> Vec<Value> {
        let mut out: Vec<Value> = self
            .sequences
            .iter()
            .flat_map(|s| s.instants().iter().map(|i| i.value.clone()))
            .collect();
        out.sort_by(|a, b| a.total_cmp(b));
        out.dedup();
        out
    }

    /// Numeric value span from the bounding box, number domains only.
    pub fn value_span(&self) -> Option<NumSpan> {
        self.bbox
            .span
            .and_then(|(lo, hi)| NumSpan::inclusive(lo, hi).ok())
    }

    pub fn min_value(&self) -> Value {
        if let Some((lo, _)) = self.bbox.span {
            return Value::from_double(lo, self.temptype()).expect("number domain");
        }
        self.sequences
            .iter()
            .map(|s| s.min_value().clone())
            .min_by(|a, b| a.total_cmp(b))
            .expect("non-empty")
    }

    pub fn max_value(&self) -> Value {
        if let Some((_, hi)) = self.bbox.span {
            return Value::from_double(hi, self.temptype()).expect("number domain");
        }
        self.sequences
            .iter()
            .map(|s| s.max_value().clone())
            .max_by(|a, b| a.total_cmp(b))
            .expect("non-empty")
    }

    /// Instant carrying the minimum value; whether it sits on an exclusive
    /// bound is ignored by contract.
    pub fn min_instant(&self) -> &TInstant {
        self.sequences
            .iter()
            .filter_map(|s| s.min_instant())
            .min_by(|a, b| a.value.total_cmp(&b.value))
            .expect("non-empty")
    }

    pub fn max_instant(&self) -> &TInstant {
        self.sequences
            .iter()
            .filter_map(|s| s.max_instant())
            .max_by(|a, b| a.value.total_cmp(&b.value))
            .expect("non-empty")
    }

    /// Number of distinct instants; a shared instant at touching bounds
    /// counts once.
    pub fn num_instants(&self) -> usize {
        let mut result = 0;
        let mut prev: Option<&TInstant> = None;
        for seq in &self.sequences {
            result += seq.num_instants();
            if prev == Some(seq.first()) {
                result -= 1;
            }
            prev = Some(seq.last());
        }
        result
    }

    /// The `n`-th distinct instant, 1-based.
    pub fn instant_n(&self, n: usize) -> Result<&TInstant> {
        let out_of_range = TemporalError::OutOfRange {
            index: n,
            count: self.total_instants,
        };
        if n < 1 || n > self.total_instants {
            return Err(out_of_range);
        }
        let mut remaining = n - 1;
        let mut prev: Option<&TInstant> = None;
        for seq in &self.sequences {
            let skip = usize::from(prev == Some(seq.first()));
            for inst in &seq.instants()[skip..] {
                if remaining == 0 {
                    return Ok(inst);
                }
                remaining -= 1;
            }
            prev = Some(seq.last());
        }
        Err(out_of_range)
    }

    /// Distinct timestamps in order.
    pub fn timestamps(&self) -> Vec<Timestamp> {
        let mut out: Vec<Timestamp> = self
            .sequences
            .iter()
            .flat_map(|s| s.timestamps())
            .collect();
        out.dedup();
        out
    }

    pub fn num_timestamps(&self) -> usize {
        let mut result = 0;
        let mut prev: Option<Timestamp> = None;
        for seq in &self.sequences {
            result += seq.num_instants();
            if prev == Some(seq.first().t) {
                result -= 1;
            }
            prev = Some(seq.last().t);
        }
        result
    }

    /// The `n`-th distinct timestamp, 1-based.
    pub fn timestamp_n(&self, n: usize) -> Result<Timestamp> {
        let ts = self.timestamps();
        if n < 1 || n > ts.len() {
            return Err(TemporalError::OutOfRange {
                index: n,
                count: ts.len(),
            });
        }
        Ok(ts[n - 1])
    }

    /// One sequence per segment across all members.
    pub fn segments(&self) -> Vec<TSequence> {
        self.sequences.iter().flat_map(|s| s.segments()).collect()
    }

    // ------------------------------------------------------------------
    // Binary search
    // ------------------------------------------------------------------

    /// Locate a timestamp among the sequences.
    ///
    /// Returns `(true, i)` when sequence `i` contains `t`; otherwise
    /// `(false, loc)` where `loc` counts the sequences lying strictly before
    /// `t` (the insertion index). A timestamp sitting on an exclusive upper
    /// bound reports the index past that sequence.
    pub fn find_timestamp(&self, t: Timestamp) -> (bool, usize) {
        let mut first: i64 = 0;
        let mut last: i64 = self.sequences.len() as i64 - 1;
        let mut middle: i64 = 0;
        while first <= last {
            middle = (first + last) / 2;
            let seq = &self.sequences[middle as usize];
            if seq.period().contains(t) {
                return (true, middle as usize);
            }
            if t <= seq.period().lower {
                last = middle - 1;
            } else {
                first = middle + 1;
            }
        }
        if t >= self.sequences[middle as usize].period().upper {
            middle += 1;
        }
        (false, middle as usize)
    }

    // ------------------------------------------------------------------
    // Value at timestamp
    // ------------------------------------------------------------------

    /// The value taken at `t`.
    ///
    /// With `strict = false`, a timestamp sitting on an exclusive bound of a
    /// member sequence still yields that bound instant's value.
    pub fn value_at(&self, t: Timestamp, strict: bool) -> Option<Value> {
        let (found, loc) = self.find_timestamp(t);
        if found {
            return self.sequences[loc].value_at(t, strict);
        }
        if strict {
            return None;
        }
        // The timestamp may sit on an exclusive bound of a neighbour.
        if loc < self.sequences.len() {
            let seq = &self.sequences[loc];
            if seq.first().t == t {
                return Some(seq.first().value.clone());
            }
        }
        if loc > 0 {
            let seq = &self.sequences[loc - 1];
            if seq.last().t == t {
                return Some(seq.last().value.clone());
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Restriction: value selectors
    // ------------------------------------------------------------------

    /// Restrict to (`atfunc`) or away from a base value.
    pub fn restrict_value(&self, value: &Value, atfunc: bool) -> Option<TSequenceSet> {
        // Singleton delegation.
        if self.sequences.len() == 1 {
            return Self::wrap(self.first_seq().restrict_value(value, atfunc), true);
        }
        let mut capacity = self.total_instants;
        if !atfunc && self.interp == Interpolation::Linear {
            capacity *= 2;
        }
        let mut pieces: Vec<TSequence> = Vec::with_capacity(capacity);
        for seq in &self.sequences {
            pieces.extend(seq.restrict_value(value, atfunc));
        }
        Self::wrap(pieces, true)
    }

    /// Restrict to (or away from) a finite set of values.
    pub fn restrict_values(&self, values: &[Value], atfunc: bool) -> Option<TSequenceSet> {
        if self.sequences.len() == 1 {
            return Self::wrap(self.first_seq().restrict_values(values, atfunc), true);
        }
        let mut at_pieces: Vec<TSequence> = Vec::with_capacity(self.total_instants * values.len());
        for seq in &self.sequences {
            at_pieces.extend(seq.restrict_values(values, true));
        }
        let at = Self::wrap(at_pieces, true);
        if atfunc {
            return at;
        }
        // Complement in the period-set algebra.
        let at = match at {
            Some(at) => at,
            None => return Some(self.clone()),
        };
        let rest = self.time().minus(&at.time())?;
        self.at_periodset(&rest)
    }

    /// Restrict a temporal number to (or away from) a numeric span.
    pub fn restrict_span(&self, span: &NumSpan, atfunc: bool) -> Option<TSequenceSet> {
        if self.sequences.len() == 1 {
            return Self::wrap(self.first_seq().restrict_span(span, atfunc), true);
        }
        let mut capacity = self.total_instants;
        if !atfunc && self.interp == Interpolation::Linear {
            capacity *= 2;
        }
        let mut pieces: Vec<TSequence> = Vec::with_capacity(capacity);
        for seq in &self.sequences {
            pieces.extend(seq.restrict_span(span, atfunc));
        }
        Self::wrap(pieces, true)
    }

    /// Restrict a temporal number to (or away from) a set of numeric spans.
    pub fn restrict_spans(&self, spans: &[NumSpan], atfunc: bool) -> Option<TSequenceSet> {
        if self.sequences.len() == 1 {
            return Self::wrap(self.first_seq().restrict_spans(spans, atfunc), true);
        }
        let mut capacity = self.total_instants * spans.len().max(1);
        if !atfunc && self.interp == Interpolation::Linear {
            capacity *= 2;
        }
        let mut pieces: Vec<TSequence> = Vec::with_capacity(capacity);
        for seq in &self.sequences {
            pieces.extend(seq.restrict_spans(spans, atfunc));
        }
        Self::wrap(pieces, true)
    }

    /// Restrict to (or away from) the set-wide minimum or maximum value.
    pub fn restrict_minmax(&self, min: bool, atfunc: bool) -> Option<TSequenceSet> {
        let target = if min { self.min_value() } else { self.max_value() };
        self.restrict_value(&target, atfunc)
    }

    // ------------------------------------------------------------------
    // Restriction: time selectors
    // ------------------------------------------------------------------

    /// The instant at `t`, honouring exclusive bounds.
    pub fn at_timestamp(&self, t: Timestamp) -> Option<TInstant> {
        let (found, loc) = self.find_timestamp(t);
        if !found {
            return None;
        }
        self.sequences[loc].at_timestamp(t)
    }

    /// Remove a single timestamp.
    pub fn minus_timestamp(&self, t: Timestamp) -> Option<TSequenceSet> {
        if !self.period().contains(t) {
            return Some(self.clone());
        }
        // At most one member splits in two.
        let mut pieces: Vec<TSequence> = Vec::with_capacity(self.sequences.len() + 1);
        let mut rest_from = self.sequences.len();
        for (i, seq) in self.sequences.iter().enumerate() {
            pieces.extend(seq.minus_timestamp(t));
            if t < seq.period().upper {
                rest_from = i + 1;
                break;
            }
        }
        for seq in &self.sequences[rest_from.min(self.sequences.len())..] {
            pieces.push(seq.clone());
        }
        Self::wrap(pieces, false)
    }

    /// Project onto a set of timestamps, producing a discrete sequence.
    ///
    /// The timestamps must be in ascending order.
    pub fn at_timestampset(&self, ts: &[Timestamp]) -> Option<TSequence> {
        let mut instants: Vec<TInstant> = Vec::with_capacity(ts.len());
        let mut i = 0;
        let mut j = 0;
        while i < ts.len() && j < self.sequences.len() {
            let seq = &self.sequences[j];
            let t = ts[i];
            if seq.period().contains(t) {
                if let Some(inst) = seq.at_timestamp(t) {
                    instants.push(inst);
                }
                i += 1;
            } else {
                if t <= seq.period().lower {
                    i += 1;
                }
                if t >= seq.period().upper {
                    j += 1;
                }
            }
        }
        if instants.is_empty() {
            None
        } else {
            Some(TSequence::discrete(instants).expect("instants are ordered"))
        }
    }

    /// Remove a set of timestamps.
    ///
    /// The timestamps must be in ascending order.
    pub fn minus_timestampset(&self, ts: &[Timestamp]) -> Option<TSequenceSet> {
        let span = match (ts.first(), ts.last()) {
            (Some(&lo), Some(&hi)) => Period::new(lo, hi, true, true).ok()?,
            _ => return Some(self.clone()),
        };
        if !self.period().overlaps(&span) {
            return Some(self.clone());
        }
        // Each timestamp splits at most one member in two.
        let mut pieces: Vec<TSequence> =
            Vec::with_capacity(self.sequences.len() + ts.len() + 1);
        for seq in &self.sequences {
            pieces.extend(seq.minus_timestampset(ts));
        }
        Self::wrap(pieces, true)
    }

    /// Project onto a period.
    pub fn at_period(&self, p: &Period) -> Option<TSequenceSet> {
        if !self.period().overlaps(p) {
            return None;
        }
        if self.sequences.len() == 1 {
            return self
                .first_seq()
                .at_period(p)
                .map(|s| Self::from_valid_parts(vec![s], false));
        }
        let (_, loc) = self.find_timestamp(p.lower);
        let mut pieces: Vec<TSequence> = Vec::with_capacity(self.sequences.len() - loc);
        for seq in &self.sequences[loc..] {
            if p.contains_period(seq.period()) {
                pieces.push(seq.clone());
            } else if p.overlaps(seq.period()) {
                if let Some(piece) = seq.at_period(p) {
                    pieces.push(piece);
                }
            }
            let cmp = p.upper.cmp(&seq.period().upper);
            if cmp == Ordering::Less || (cmp == Ordering::Equal && seq.period().upper_inc) {
                break;
            }
        }
        // Both inputs are normalised, so the projection already is.
        Self::wrap(pieces, false)
    }

    /// Remove a period, computed in the period-set algebra.
    pub fn minus_period(&self, p: &Period) -> Option<TSequenceSet> {
        if !self.period().overlaps(p) {
            return Some(self.clone());
        }
        let rest = self.time().minus_period(p)?;
        self.at_periodset(&rest)
    }

    /// Project onto a period set with a two-pointer walk.
    pub fn at_periodset(&self, ps: &PeriodSet) -> Option<TSequenceSet> {
        if ps.num_periods() == 1 {
            return self.at_period(ps.period_n(0).expect("non-empty"));
        }
        if !self.period().overlaps(&ps.period()) {
            return None;
        }
        if self.sequences.len() == 1 {
            return Self::wrap(self.first_seq().at_periodset(ps), false);
        }
        let start = self.period().lower.max(ps.period().lower);
        let (_, mut i) = self.find_timestamp(start);
        let (_, mut j) = ps.find_timestamp(start);
        let mut pieces: Vec<TSequence> =
            Vec::with_capacity(self.sequences.len() + ps.num_periods() - i - j);
        while i < self.sequences.len() && j < ps.num_periods() {
            let seq = &self.sequences[i];
            let p = ps.period_n(j).expect("index in range");
            if let Some(piece) = seq.at_period(p) {
                pieces.push(piece);
            }
            let cmp = seq.period().upper.cmp(&p.upper);
            if cmp == Ordering::Equal && seq.period().upper_inc == p.upper_inc {
                i += 1;
                j += 1;
            } else if cmp == Ordering::Less
                || (cmp == Ordering::Equal && !seq.period().upper_inc && p.upper_inc)
            {
                i += 1;
            } else {
                j += 1;
            }
        }
        Self::wrap(pieces, true)
    }

    /// Remove a period set.
    pub fn minus_periodset(&self, ps: &PeriodSet) -> Option<TSequenceSet> {
        if !self.period().overlaps(&ps.period()) {
            return Some(self.clone());
        }
        let mut pieces: Vec<TSequence> =
            Vec::with_capacity(self.sequences.len() + ps.num_periods());
        for seq in &self.sequences {
            pieces.extend(seq.minus_periodset(ps));
        }
        Self::wrap(pieces, true)
    }

    // ------------------------------------------------------------------
    // Overlap predicates
    // ------------------------------------------------------------------

    pub fn overlaps_timestamp(&self, t: Timestamp) -> bool {
        self.find_timestamp(t).0
    }

    pub fn overlaps_timestampset(&self, ts: &[Timestamp]) -> bool {
        ts.iter().any(|&t| self.overlaps_timestamp(t))
    }

    pub fn overlaps_period(&self, p: &Period) -> bool {
        let (found, loc) = self.find_timestamp(p.lower);
        if found {
            return true;
        }
        for seq in &self.sequences[loc.min(self.sequences.len())..] {
            if seq.period().overlaps(p) {
                return true;
            }
            if p.upper < seq.period().upper {
                break;
            }
        }
        false
    }

    pub fn overlaps_periodset(&self, ps: &PeriodSet) -> bool {
        ps.iter().any(|p| self.overlaps_period(p))
    }

    // ------------------------------------------------------------------
    // Append and merge
    // ------------------------------------------------------------------

    /// Append one instant to the last sequence, growing it in place.
    ///
    /// The timestamp must be strictly after the current end, or equal to it
    /// with an equal value while the upper bound is exclusive.
    pub fn append_instant(&mut self, inst: TInstant) -> Result<()> {
        if inst.temptype() != self.temptype() {
            return Err(TemporalError::TypeMismatch);
        }
        let last = self.sequences.last_mut().expect("non-empty");
        let before = last.num_instants();
        last.append_instant(inst)?;
        let added = last.num_instants() - before;
        self.total_instants += added;
        self.bbox = self.bbox.union(self.sequences.last().expect("non-empty").bbox());
        Ok(())
    }

    /// Append a whole sequence, joining it onto the last member when the
    /// join predicate allows, otherwise adding it as a new member.
    ///
    /// The underlying vector grows amortised; callers appending in a loop
    /// pay a reallocation only on capacity doubling.
    pub fn append_sequence(&mut self, seq: TSequence) -> Result<()> {
        if seq.temptype() != self.temptype() {
            return Err(TemporalError::TypeMismatch);
        }
        if seq.interpolation() != self.interp {
            return Err(TemporalError::InterpolationMismatch);
        }
        let last = self.sequences.last().expect("non-empty");
        let inst1 = last.last();
        let inst2 = seq.first();
        if inst1.t > inst2.t {
            return Err(TemporalError::InvalidOrder(format!(
                "timestamps must be increasing: {} then {}",
                inst1.t, inst2.t
            )));
        }
        if inst1.t == inst2.t
            && last.period().upper_inc
            && seq.period().lower_inc
            && inst1.value != inst2.value
        {
            return Err(TemporalError::ValueMismatchAtJoin(inst1.t));
        }
        match last.join_test(&seq) {
            Some((removelast, removefirst)) => {
                let joined = last.join(&seq, removelast, removefirst);
                let old = self.sequences.pop().expect("non-empty");
                self.total_instants -= old.num_instants();
                self.total_instants += joined.num_instants();
                self.bbox = self.bbox.union(joined.bbox());
                self.sequences.push(joined);
            }
            None => {
                self.total_instants += seq.num_instants();
                self.bbox = self.bbox.union(seq.bbox());
                self.sequences.push(seq);
            }
        }
        Ok(())
    }

    /// Merge two sets; supports may overlap in single equal-valued instants.
    pub fn merge(&self, other: &TSequenceSet) -> Result<TSequenceSet> {
        Self::merge_array(&[self, other])
    }

    /// Merge any number of sets.
    pub fn merge_array(sets: &[&TSequenceSet]) -> Result<TSequenceSet> {
        let first = sets.first().ok_or(TemporalError::EmptyResult)?;
        for set in sets {
            if set.temptype() != first.temptype() {
                return Err(TemporalError::TypeMismatch);
            }
            if set.interp != first.interp {
                return Err(TemporalError::InterpolationMismatch);
            }
        }
        let all: Vec<TSequence> = sets
            .iter()
            .flat_map(|s| s.sequences.iter().cloned())
            .collect();
        let merged = merge_seq_array(all)?;
        Ok(Self::from_valid_parts(merged, false))
    }

    // ------------------------------------------------------------------
    // Insert, update, delete
    // ------------------------------------------------------------------

    /// Insert the other set's values: the result is defined on the union of
    /// the two time supports.
    ///
    /// Disjoint supports merge, bridging a gap between an inclusive upper
    /// and an inclusive lower bound so the interpolation stays defined
    /// across it. Interleaved supports stream in order; touching members
    /// must agree at shared instants.
    pub fn insert(&self, other: &TSequenceSet) -> Result<TSequenceSet> {
        if self.temptype() != other.temptype() {
            return Err(TemporalError::TypeMismatch);
        }
        if self.interp != other.interp {
            return Err(TemporalError::InterpolationMismatch);
        }
        // Order the two sets by their first sequence.
        let (ss1, ss2) = if other
            .first_seq()
            .period()
            .is_before(self.first_seq().period())
        {
            (other, self)
        } else {
            (self, other)
        };

        // One entirely before the other: bridge the gap if both facing
        // bounds are inclusive, then merge.
        if ss1.period().is_before(&ss2.period()) {
            if ss1.period().upper_inc && ss2.period().lower_inc {
                let bridge = gap_sequence(ss1.last_seq().last(), ss2.first_seq().first(), self.interp);
                let bridge_set = Self::from_valid_parts(vec![bridge], false);
                return Self::merge_array(&[ss1, &bridge_set, ss2]);
            }
            return Self::merge_array(&[ss1, ss2]);
        }

        // Interleaved case: stream both sides in order, bridging around
        // every inserted sequence whose facing bounds are inclusive.
        let mut pieces: Vec<TSequence> =
            Vec::with_capacity(ss1.sequences.len() + ss2.sequences.len() * 3);
        pieces.push(ss1.sequences[0].clone());
        let mut i = 1;
        let mut j = 0;
        while i < ss1.sequences.len() && j < ss2.sequences.len() {
            let seq1 = &ss1.sequences[i];
            let seq2 = &ss2.sequences[j];
            let prev_upper = pieces.last().expect("non-empty").period().upper;
            let fits_after_prev = prev_upper <= seq2.period().lower;
            let fits_before_next = seq2.period().upper <= seq1.period().lower;
            if fits_after_prev && fits_before_next {
                let leading = {
                    let prev = pieces.last().expect("non-empty");
                    if prev.period().upper_inc && seq2.period().lower_inc {
                        if prev.period().upper == seq2.period().lower
                            && prev.last().value != seq2.first().value
                        {
                            return Err(TemporalError::ValueMismatchAtJoin(prev.period().upper));
                        }
                        Some(gap_sequence(prev.last(), seq2.first(), self.interp))
                    } else {
                        None
                    }
                };
                if let Some(bridge) = leading {
                    pieces.push(bridge);
                }
                pieces.push(seq2.clone());
                if seq2.period().upper_inc && seq1.period().lower_inc {
                    if seq2.period().upper == seq1.period().lower
                        && seq2.last().value != seq1.first().value
                    {
                        return Err(TemporalError::ValueMismatchAtJoin(seq1.period().lower));
                    }
                    pieces.push(gap_sequence(seq2.last(), seq1.first(), self.interp));
                }
                // seq1 stays pending; it follows once no more of the other
                // side's sequences fit before it.
                j += 1;
            } else {
                pieces.push(seq1.clone());
                i += 1;
            }
        }
        while i < ss1.sequences.len() {
            pieces.push(ss1.sequences[i].clone());
            i += 1;
        }
        while j < ss2.sequences.len() {
            pieces.push(ss2.sequences[j].clone());
            j += 1;
        }
        let merged = merge_seq_array(pieces)?;
        Ok(Self::from_valid_parts(merged, false))
    }

    /// Replace the values on the other set's support with the other set.
    pub fn update(&self, other: &TSequenceSet) -> Result<TSequenceSet> {
        match self.minus_periodset(&other.time()) {
            Some(rest) => rest.insert(other),
            None => Ok(other.clone()),
        }
    }

    /// Delete a timestamp: the sample goes away and neighbours connect.
    pub fn delete_timestamp(&self, t: Timestamp) -> Option<TSequenceSet> {
        if !self.period().contains(t) {
            return Some(self.clone());
        }
        let pieces: Vec<TSequence> = self
            .sequences
            .iter()
            .filter_map(|s| s.delete_timestamp(t))
            .collect();
        Self::wrap(pieces, false)
    }

    /// Delete a set of timestamps.
    pub fn delete_timestampset(&self, ts: &[Timestamp]) -> Option<TSequenceSet> {
        let span = match (ts.first(), ts.last()) {
            (Some(&lo), Some(&hi)) => Period::new(lo, hi, true, true).ok()?,
            _ => return Some(self.clone()),
        };
        if !self.period().overlaps(&span) {
            return Some(self.clone());
        }
        let pieces: Vec<TSequence> = self
            .sequences
            .iter()
            .filter_map(|s| s.delete_timestampset(ts))
            .collect();
        Self::wrap(pieces, true)
    }

    /// Delete a period, stitching the hole when its endpoint values agree.
    pub fn delete_period(&self, p: &Period) -> Option<TSequenceSet> {
        self.delete_periodset(&PeriodSet::from_period(*p))
    }

    /// Delete a period set.
    ///
    /// Unlike `minus_periodset`, a hole whose two endpoint values are equal
    /// is stitched back together (step and linear interpolation only).
    pub fn delete_periodset(&self, ps: &PeriodSet) -> Option<TSequenceSet> {
        if !self.period().overlaps(&ps.period()) {
            return Some(self.clone());
        }
        if self.sequences.len() == 1 {
            return Self::wrap(self.first_seq().delete_periodset(ps), false);
        }
        let minus = self.minus_periodset(ps)?;
        // A hole is stitched only when the deletion created it: every point
        // of the hole must come from the original support or the deleted
        // periods, and the deletion must actually reach into it.
        let cover = ps.union(&self.time());
        let mut out: Vec<TSequence> = Vec::with_capacity(minus.sequences.len());
        for piece in minus.sequences {
            let stitchable = out.last().is_some_and(|prev| {
                let hole = match gap_period(prev.period(), piece.period()) {
                    Some(hole) => hole,
                    None => return false,
                };
                if !ps.overlaps_period(&hole) {
                    return false;
                }
                let covered = PeriodSet::from_period(hole).minus(&cover).is_none();
                if !covered {
                    return false;
                }
                if prev.last().value == piece.first().value {
                    true
                } else {
                    log::warn!("hole at {hole} left open: endpoint values differ");
                    false
                }
            });
            if !stitchable {
                out.push(piece);
                continue;
            }
            let prev = out.pop().expect("non-empty");
            out.push(crate::seq::stitch_pair(prev, piece, self.interp));
        }
        Self::wrap(out, false)
    }

    // ------------------------------------------------------------------
    // Aggregates, order, hash
    // ------------------------------------------------------------------

    /// Area under the curve of a temporal number.
    pub fn integral(&self) -> f64 {
        self.sequences.iter().map(|s| s.integral()).sum()
    }

    /// Time-weighted average of a temporal number.
    pub fn twavg(&self) -> f64 {
        let duration = self.duration(false).as_secs_f64();
        if duration == 0.0 {
            let sum: f64 = self.sequences.iter().map(|s| s.twavg()).sum();
            return sum / self.sequences.len() as f64;
        }
        self.integral() / duration
    }

    /// Lexicographic order: member sequences, then member count.
    pub fn cmp_seqsets(&self, other: &TSequenceSet) -> Ordering {
        let n = self.sequences.len().min(other.sequences.len());
        for i in 0..n {
            let ord = self.sequences[i].cmp_sequences(&other.sequences[i]);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.sequences.len().cmp(&other.sequences.len())
    }

    /// Rolling 32-bit structural hash over the member sequences.
    pub fn hash32(&self) -> u32 {
        let mut h: u32 = 1;
        for seq in &self.sequences {
            h = (h << 5).wrapping_sub(h).wrapping_add(seq.hash32());
        }
        h
    }

    // ------------------------------------------------------------------
    // Transformations and casts
    // ------------------------------------------------------------------

    /// Affinely remap the timeline: optional shift, optional new total
    /// bounding duration.
    pub fn shift_scale(&self, shift: Option<Interval>, duration: Option<Interval>) -> TSequenceSet {
        let old_lower = self.start_timestamp();
        let old_span = (self.end_timestamp() - old_lower).micros();
        let new_lower = match shift {
            Some(s) => old_lower + s,
            None => old_lower,
        };
        let new_span = match duration {
            Some(d) if old_span > 0 => d.micros(),
            _ => old_span,
        };
        let remap = |t: Timestamp| -> Timestamp {
            let offset = (t - old_lower).micros();
            let scaled = if old_span == 0 {
                0
            } else {
                (offset as i128 * new_span as i128 / old_span as i128) as i64
            };
            new_lower + Interval::from_micros(scaled)
        };
        let sequences = self
            .sequences
            .iter()
            .map(|s| s.remap_time(&remap))
            .collect();
        Self::from_valid_parts(sequences, false)
    }

    /// Collapse to a discrete sequence; defined when every member is a
    /// single instant.
    pub fn to_discrete(&self) -> Option<TSequence> {
        let mut instants = Vec::with_capacity(self.sequences.len());
        for seq in &self.sequences {
            if seq.num_instants() != 1 {
                return None;
            }
            instants.push(seq.first().clone());
        }
        TSequence::discrete(instants).ok()
    }

    /// Cast a temporal integer set to a temporal float set.
    pub fn int_to_float(&self) -> Result<TSequenceSet> {
        let sequences: Result<Vec<TSequence>> =
            self.sequences.iter().map(|s| s.int_to_float()).collect();
        Ok(Self::from_valid_parts(sequences?, false))
    }

    /// Cast a temporal float set to a temporal integer set; rejected for
    /// linear interpolation.
    pub fn float_to_int(&self) -> Result<TSequenceSet> {
        let sequences: Result<Vec<TSequence>> =
            self.sequences.iter().map(|s| s.float_to_int()).collect();
        Ok(Self::from_valid_parts(sequences?, false))
    }

    /// Rewrite a step set as equivalent linear pieces.
    pub fn step_to_linear(&self) -> Result<TSequenceSet> {
        if self.interp != Interpolation::Step {
            return Err(TemporalError::InterpolationMismatch);
        }
        if !self.temptype().is_continuous() {
            return Err(TemporalError::InterpolationMismatch);
        }
        let pieces: Vec<TSequence> = self
            .sequences
            .iter()
            .flat_map(|s| s.step_to_linear())
            .collect();
        Ok(Self::from_valid_parts(pieces, false))
    }
}

/// Bridging sequence between two facing inclusive bounds, so step and linear
/// interpolation stay defined across the gap.
fn gap_sequence(a: &TInstant, b: &TInstant, interp: Interpolation) -> TSequence {
    if a.t == b.t {
        TSequence::from_instant(a.clone(), interp)
    } else {
        TSequence::assemble(vec![a.clone(), b.clone()], true, true, interp)
    }
}

/// The open hole between two adjacent remainder pieces, if any.
fn gap_period(left: &Period, right: &Period) -> Option<Period> {
    Period::new(
        left.upper,
        right.lower,
        !left.upper_inc,
        !right.lower_inc,
    )
    .ok()
}

impl fmt::Display for TSequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, seq) in self.sequences.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{seq}")?;
        }
        write!(f, "}}")
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

    fn ii(t: i64, v: i64) -> TInstant {
        TInstant::new(ts(t), Value::Int(v))
    }

    fn linear_seq(insts: Vec<TInstant>, lower_inc: bool, upper_inc: bool) -> TSequence {
        TSequence::new(insts, lower_inc, upper_inc, Interpolation::Linear, true).unwrap()
    }

    fn step_seq(insts: Vec<TInstant>, lower_inc: bool, upper_inc: bool) -> TSequence {
        TSequence::new(insts, lower_inc, upper_inc, Interpolation::Step, true).unwrap()
    }

    /// Three disjoint linear sequences over [0,2), [4,6), [8,10].
    fn three_piece() -> TSequenceSet {
        TSequenceSet::make(
            vec![
                linear_seq(vec![fi(0, 0.0), fi(2, 2.0)], true, false),
                linear_seq(vec![fi(4, 4.0), fi(6, 6.0)], true, false),
                linear_seq(vec![fi(8, 8.0), fi(10, 10.0)], true, true),
            ],
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_make_rejects_overlap() {
        let err = TSequenceSet::make(
            vec![
                linear_seq(vec![fi(0, 0.0), fi(5, 5.0)], true, true),
                linear_seq(vec![fi(5, 5.0), fi(10, 0.0)], true, true),
            ],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, TemporalError::InvalidOrder(_)));
    }

    #[test]
    fn test_make_rejects_mixed_interpolation() {
        let err = TSequenceSet::make(
            vec![
                linear_seq(vec![fi(0, 0.0), fi(2, 2.0)], true, false),
                TSequence::new(
                    vec![fi(4, 4.0), fi(6, 4.0)],
                    true,
                    false,
                    Interpolation::Step,
                    true,
                )
                .unwrap(),
            ],
            false,
        )
        .unwrap_err();
        assert_eq!(err, TemporalError::InterpolationMismatch);
    }

    #[test]
    fn test_make_normalizes_adjacent_joinable() {
        let ss = TSequenceSet::make(
            vec![
                linear_seq(vec![fi(0, 0.0), fi(5, 5.0)], true, false),
                linear_seq(vec![fi(5, 5.0), fi(10, 0.0)], true, false),
            ],
            true,
        )
        .unwrap();
        assert_eq!(ss.num_sequences(), 1);
        assert_eq!(ss.total_instants(), 3);
    }

    #[test]
    fn test_invariants_hold() {
        let ss = three_piece();
        assert_eq!(ss.total_instants(), 6);
        assert_eq!(ss.num_sequences(), 3);
        let bbox_union = ss
            .sequences()
            .iter()
            .skip(1)
            .fold(*ss.sequences()[0].bbox(), |acc, s| acc.union(s.bbox()));
        assert_eq!(ss.bbox(), &bbox_union);
        assert_eq!(ss.duration(false), Interval::from_micros(6));
        assert_eq!(ss.duration(true), Interval::from_micros(10));
    }

    #[test]
    fn test_find_timestamp_edges() {
        let ss = three_piece();
        assert_eq!(ss.find_timestamp(ts(-1)), (false, 0));
        assert_eq!(ss.find_timestamp(ts(0)), (true, 0));
        assert_eq!(ss.find_timestamp(ts(1)), (true, 0));
        // Exactly on an exclusive upper bound: not found, loc past it.
        assert_eq!(ss.find_timestamp(ts(2)), (false, 1));
        assert_eq!(ss.find_timestamp(ts(3)), (false, 1));
        assert_eq!(ss.find_timestamp(ts(5)), (true, 1));
        assert_eq!(ss.find_timestamp(ts(7)), (false, 2));
        assert_eq!(ss.find_timestamp(ts(10)), (true, 2));
        assert_eq!(ss.find_timestamp(ts(11)), (false, 3));
    }

    #[test]
    fn test_find_timestamp_monotone() {
        let ss = three_piece();
        let mut prev = 0usize;
        for t in -2..12 {
            let (_, loc) = ss.find_timestamp(ts(t));
            assert!(loc >= prev, "loc went backwards at t={t}");
            prev = loc;
        }
    }

    #[test]
    fn test_value_at_strictness() {
        let ss = three_piece();
        assert_eq!(ss.value_at(ts(1), true), Some(Value::Float(1.0)));
        // t=2 is an exclusive upper bound.
        assert_eq!(ss.value_at(ts(2), true), None);
        assert_eq!(ss.value_at(ts(2), false), Some(Value::Float(2.0)));
        assert_eq!(ss.value_at(ts(3), false), None);
    }

    #[test]
    fn test_values_sorted_distinct() {
        let ss = TSequenceSet::make(
            vec![
                step_seq(vec![ii(0, 3), ii(2, 3)], true, false),
                step_seq(vec![ii(4, 1), ii(6, 1)], true, true),
            ],
            false,
        )
        .unwrap();
        assert_eq!(ss.values(), vec![Value::Int(1), Value::Int(3)]);
        assert_eq!(ss.min_value(), Value::Int(1));
        assert_eq!(ss.max_value(), Value::Int(3));
    }

    #[test]
    fn test_distinct_instants_at_touching_bounds() {
        // Two sequences sharing the instant 5@5.0, one side exclusive.
        let ss = TSequenceSet::make(
            vec![
                linear_seq(vec![fi(0, 0.0), fi(5, 5.0)], true, false),
                linear_seq(vec![fi(5, 5.0), fi(10, 0.0)], true, true),
            ],
            false,
        )
        .unwrap();
        assert_eq!(ss.total_instants(), 4);
        assert_eq!(ss.num_instants(), 3);
        assert_eq!(ss.num_timestamps(), 3);
        assert_eq!(ss.instant_n(1).unwrap().t, ts(0));
        assert_eq!(ss.instant_n(2).unwrap().t, ts(5));
        assert_eq!(ss.instant_n(3).unwrap().t, ts(10));
        assert!(matches!(
            ss.instant_n(5),
            Err(TemporalError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_at_period_projection() {
        let ss = three_piece();
        let p = Period::new(ts(1), ts(5), true, false).unwrap();
        let cut = ss.at_period(&p).unwrap();
        assert_eq!(cut.num_sequences(), 2);
        assert_eq!(cut.start_timestamp(), ts(1));
        assert_eq!(cut.end_timestamp(), ts(5));
        assert!(!cut.period().upper_inc);
        assert_eq!(cut.value_at(ts(1), true), Some(Value::Float(1.0)));
    }

    #[test]
    fn test_minus_period_inner_bounds_exclusive() {
        // minus({[0@0, 10@10)}, [3, 7]) = {[0@0, 3@3), (7@7, 10@10)}
        let ss = TSequenceSet::make(
            vec![linear_seq(vec![fi(0, 0.0), fi(10, 10.0)], true, false)],
            false,
        )
        .unwrap();
        let p = Period::new(ts(3), ts(7), true, true).unwrap();
        let rest = ss.minus_period(&p).unwrap();
        assert_eq!(rest.num_sequences(), 2);
        let a = rest.sequence_n(0).unwrap();
        let b = rest.sequence_n(1).unwrap();
        assert_eq!(a.period().upper, ts(3));
        assert!(!a.period().upper_inc);
        assert_eq!(a.last().value, Value::Float(3.0));
        assert_eq!(b.period().lower, ts(7));
        assert!(!b.period().lower_inc);
        assert_eq!(b.first().value, Value::Float(7.0));
    }

    #[test]
    fn test_restriction_duality_period() {
        let ss = three_piece();
        let p = Period::new(ts(1), ts(9), true, true).unwrap();
        let at = ss.at_period(&p).unwrap();
        let minus = ss.minus_period(&p).unwrap();
        let total = at.duration(false) + minus.duration(false);
        assert_eq!(total, ss.duration(false));
        // Idempotence.
        assert_eq!(at.at_period(&p).unwrap(), at);
        assert_eq!(minus.minus_period(&p).unwrap(), minus);
    }

    #[test]
    fn test_at_timestampset_two_pointer() {
        let ss = three_piece();
        let got = ss.at_timestampset(&[ts(1), ts(3), ts(5), ts(9)]).unwrap();
        assert_eq!(got.interpolation(), Interpolation::Discrete);
        assert_eq!(got.num_instants(), 3);
        assert_eq!(got.inst_n(0).unwrap().value, Value::Float(1.0));
        assert_eq!(got.inst_n(2).unwrap().value, Value::Float(9.0));
    }

    #[test]
    fn test_minus_timestamp_splits_one_member() {
        let ss = three_piece();
        let rest = ss.minus_timestamp(ts(5)).unwrap();
        assert_eq!(rest.num_sequences(), 4);
        assert_eq!(rest.value_at(ts(5), true), None);
        assert_eq!(rest.value_at(ts(9), true), Some(Value::Float(9.0)));
    }

    #[test]
    fn test_restrict_value_at_linear_crossing() {
        let ss = TSequenceSet::make(
            vec![linear_seq(vec![fi(1, 1.0), fi(3, 3.0)], true, false)],
            false,
        )
        .unwrap();
        let at = ss.restrict_value(&Value::Float(2.0), true).unwrap();
        assert_eq!(at.num_sequences(), 1);
        let seq = at.sequence_n(0).unwrap();
        assert!(seq.period().is_instant());
        assert_eq!(seq.period().lower, ts(2));
        assert_eq!(seq.first().value, Value::Float(2.0));
    }

    #[test]
    fn test_restrict_value_duality() {
        let ss = TSequenceSet::make(
            vec![
                step_seq(vec![ii(0, 1), ii(4, 2), ii(8, 1), ii(10, 1)], true, false),
                step_seq(vec![ii(12, 2), ii(14, 2)], true, true),
            ],
            false,
        )
        .unwrap();
        let at = ss.restrict_value(&Value::Int(2), true).unwrap();
        let minus = ss.restrict_value(&Value::Int(2), false).unwrap();
        assert_eq!(
            at.duration(false) + minus.duration(false),
            ss.duration(false)
        );
        assert_eq!(at.values(), vec![Value::Int(2)]);
        assert_eq!(minus.values(), vec![Value::Int(1)]);
        // minus of a value not taken returns the set unchanged.
        assert_eq!(ss.restrict_value(&Value::Int(9), false).unwrap(), ss);
    }

    #[test]
    fn test_restrict_span() {
        let ss = TSequenceSet::make(
            vec![linear_seq(vec![fi(0, 0.0), fi(10, 10.0)], true, true)],
            false,
        )
        .unwrap();
        let span = NumSpan::inclusive(2.0, 4.0).unwrap();
        let at = ss.restrict_span(&span, true).unwrap();
        assert_eq!(at.start_timestamp(), ts(2));
        assert_eq!(at.end_timestamp(), ts(4));
        let minus = ss.restrict_span(&span, false).unwrap();
        assert_eq!(minus.num_sequences(), 2);
        assert_eq!(
            at.duration(false) + minus.duration(false),
            ss.duration(false)
        );
    }

    #[test]
    fn test_restrict_minmax() {
        let ss = three_piece();
        let at_min = ss.restrict_minmax(true, true).unwrap();
        assert_eq!(at_min.values(), vec![Value::Float(0.0)]);
        assert_eq!(at_min.start_timestamp(), ts(0));
        let at_max = ss.restrict_minmax(false, true).unwrap();
        assert_eq!(at_max.values(), vec![Value::Float(10.0)]);
    }

    #[test]
    fn test_append_sequence_joins() {
        // {[1@1, 2@2)} ++ [2@2, 3@3) joins into one sequence.
        let mut ss = TSequenceSet::make(
            vec![linear_seq(vec![fi(1, 1.0), fi(2, 2.0)], true, false)],
            false,
        )
        .unwrap();
        ss.append_sequence(linear_seq(vec![fi(2, 2.0), fi(3, 3.0)], true, false))
            .unwrap();
        assert_eq!(ss.num_sequences(), 1);
        assert_eq!(ss.total_instants(), 3);
        assert_eq!(ss.start_timestamp(), ts(1));
        assert_eq!(ss.end_timestamp(), ts(3));
        assert_eq!(ss.value_at(ts(2), true), Some(Value::Float(2.0)));
    }

    #[test]
    fn test_append_sequence_gap_keeps_two() {
        let mut ss = TSequenceSet::make(
            vec![linear_seq(vec![fi(0, 0.0), fi(2, 2.0)], true, false)],
            false,
        )
        .unwrap();
        ss.append_sequence(linear_seq(vec![fi(4, 4.0), fi(6, 6.0)], true, false))
            .unwrap();
        assert_eq!(ss.num_sequences(), 2);
        assert_eq!(ss.total_instants(), 4);
    }

    #[test]
    fn test_append_sequence_rejects_backwards() {
        let mut ss = three_piece();
        let err = ss
            .append_sequence(linear_seq(vec![fi(5, 5.0), fi(7, 7.0)], true, false))
            .unwrap_err();
        assert!(matches!(err, TemporalError::InvalidOrder(_)));
    }

    #[test]
    fn test_append_sequence_value_mismatch() {
        let mut ss = TSequenceSet::make(
            vec![linear_seq(vec![fi(0, 0.0), fi(2, 2.0)], true, true)],
            false,
        )
        .unwrap();
        let err = ss
            .append_sequence(linear_seq(vec![fi(2, 9.0), fi(4, 4.0)], true, false))
            .unwrap_err();
        assert_eq!(err, TemporalError::ValueMismatchAtJoin(ts(2)));
    }

    #[test]
    fn test_append_instant_equivalence() {
        // append_instant(ss, i) == make(sequences with i appended).
        let mut grown = TSequenceSet::make(
            vec![linear_seq(vec![fi(0, 0.0), fi(2, 2.0)], true, true)],
            false,
        )
        .unwrap();
        grown.append_instant(fi(4, 4.0)).unwrap();
        let direct = TSequenceSet::make(
            vec![linear_seq(vec![fi(0, 0.0), fi(2, 2.0), fi(4, 4.0)], true, true)],
            false,
        )
        .unwrap();
        assert_eq!(grown.total_instants(), 3);
        assert_eq!(grown.end_timestamp(), ts(4));
        assert_eq!(grown.value_at(ts(3), true), direct.value_at(ts(3), true));
    }

    #[test]
    fn test_merge_touching_equal_instant() {
        let a = TSequenceSet::make(
            vec![linear_seq(vec![fi(0, 0.0), fi(5, 5.0)], true, true)],
            false,
        )
        .unwrap();
        let b = TSequenceSet::make(
            vec![linear_seq(vec![fi(5, 5.0), fi(10, 0.0)], true, true)],
            false,
        )
        .unwrap();
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.num_sequences(), 1);
        assert_eq!(merged.value_at(ts(5), true), Some(Value::Float(5.0)));
    }

    #[test]
    fn test_insert_disjoint_bridges_gap() {
        let a = TSequenceSet::make(
            vec![step_seq(vec![ii(0, 1), ii(2, 1)], true, true)],
            false,
        )
        .unwrap();
        let b = TSequenceSet::make(
            vec![step_seq(vec![ii(6, 4), ii(8, 4)], true, true)],
            false,
        )
        .unwrap();
        let joined = a.insert(&b).unwrap();
        // Both facing bounds inclusive: the gap (2, 6) is bridged.
        assert_eq!(joined.num_sequences(), 1);
        assert_eq!(joined.value_at(ts(4), true), Some(Value::Int(1)));
        assert_eq!(joined.value_at(ts(7), true), Some(Value::Int(4)));
    }

    #[test]
    fn test_insert_open_bounds_keep_gap() {
        let a = TSequenceSet::make(
            vec![step_seq(vec![ii(0, 1), ii(2, 1)], true, false)],
            false,
        )
        .unwrap();
        let b = TSequenceSet::make(
            vec![step_seq(vec![ii(6, 4), ii(8, 4)], true, true)],
            false,
        )
        .unwrap();
        let joined = a.insert(&b).unwrap();
        assert_eq!(joined.num_sequences(), 2);
        assert_eq!(joined.value_at(ts(4), true), None);
    }

    #[test]
    fn test_insert_interleaved() {
        let a = three_piece();
        let b = TSequenceSet::make(
            vec![linear_seq(vec![fi(2, 2.0), fi(4, 4.0)], false, false)],
            false,
        )
        .unwrap();
        let joined = a.insert(&b).unwrap();
        assert_eq!(joined.value_at(ts(3), true), Some(Value::Float(3.0)));
        assert_eq!(joined.value_at(ts(9), true), Some(Value::Float(9.0)));
        // [0,2) ∪ (2,4) ∪ [4,6) normalises into one leading run.
        assert!(joined.num_sequences() <= 3);
    }

    #[test]
    fn test_update_replaces_support() {
        let base = TSequenceSet::make(
            vec![step_seq(vec![ii(0, 1), ii(10, 1)], true, true)],
            false,
        )
        .unwrap();
        let patch = TSequenceSet::make(
            vec![step_seq(vec![ii(3, 7), ii(5, 7)], true, true)],
            false,
        )
        .unwrap();
        let updated = base.update(&patch).unwrap();
        assert_eq!(updated.value_at(ts(4), true), Some(Value::Int(7)));
        assert_eq!(updated.value_at(ts(1), true), Some(Value::Int(1)));
        assert_eq!(updated.value_at(ts(8), true), Some(Value::Int(1)));
    }

    #[test]
    fn test_delete_period_stitches_hole() {
        // delete_period({[5@0, 5@10)}, [3, 7]) keeps one sequence: the hole
        // is filled because the value on both sides is 5.
        let ss = TSequenceSet::make(
            vec![step_seq(vec![ii(0, 5), ii(10, 5)], true, false)],
            false,
        )
        .unwrap();
        let p = Period::new(ts(3), ts(7), true, true).unwrap();
        let out = ss.delete_period(&p).unwrap();
        assert_eq!(out.num_sequences(), 1);
        assert_eq!(out.start_timestamp(), ts(0));
        assert_eq!(out.end_timestamp(), ts(10));
        assert_eq!(out.total_instants(), 2);
        assert_eq!(out.value_at(ts(5), true), Some(Value::Int(5)));
    }

    #[test]
    fn test_delete_period_keeps_hole_on_jump() {
        let ss = TSequenceSet::make(
            vec![
                step_seq(vec![ii(0, 1), ii(4, 1)], true, false),
                step_seq(vec![ii(4, 9), ii(10, 9)], false, true),
            ],
            false,
        )
        .unwrap();
        let p = Period::new(ts(3), ts(5), true, true).unwrap();
        let out = ss.delete_periodset(&PeriodSet::from_period(p)).unwrap();
        assert_eq!(out.num_sequences(), 2);
        assert_eq!(out.value_at(ts(4), true), None);
    }

    #[test]
    fn test_delete_period_does_not_stitch_preexisting_hole() {
        let ss = three_piece();
        // Delete a period inside the pre-existing hole (2, 4): nothing
        // changes and no stitching happens.
        let p = Period::new(ts(2), ts(4), false, false).unwrap();
        let out = ss.delete_period(&p).unwrap();
        assert_eq!(out.num_sequences(), 3);
    }

    #[test]
    fn test_delete_timestamp_removes_sample() {
        let ss = TSequenceSet::make(
            vec![linear_seq(vec![fi(0, 0.0), fi(5, 9.0), fi(10, 0.0)], true, true)],
            false,
        )
        .unwrap();
        let out = ss.delete_timestamp(ts(5)).unwrap();
        assert_eq!(out.total_instants(), 2);
        assert_eq!(out.value_at(ts(5), true), Some(Value::Float(0.0)));
    }

    #[test]
    fn test_overlaps_predicates() {
        let ss = three_piece();
        assert!(ss.overlaps_timestamp(ts(1)));
        assert!(!ss.overlaps_timestamp(ts(3)));
        assert!(ss.overlaps_timestampset(&[ts(3), ts(9)]));
        let hole = Period::new(ts(2), ts(4), false, false).unwrap();
        assert!(!ss.overlaps_period(&hole));
        let wide = Period::new(ts(3), ts(4), true, true).unwrap();
        assert!(ss.overlaps_period(&wide));
        assert!(ss.overlaps_periodset(&PeriodSet::from_period(wide)));
    }

    #[test]
    fn test_integral_twavg() {
        let ss = TSequenceSet::make(
            vec![
                linear_seq(vec![fi(0, 0.0), fi(10_000_000, 10.0)], true, false),
                linear_seq(
                    vec![fi(20_000_000, 10.0), fi(30_000_000, 10.0)],
                    true,
                    true,
                ),
            ],
            false,
        )
        .unwrap();
        assert!((ss.integral() - 150.0).abs() < 1e-9);
        assert!((ss.twavg() - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_cmp_total_order() {
        let a = three_piece();
        let mut b = a.clone();
        b.append_sequence(linear_seq(vec![fi(12, 0.0), fi(13, 1.0)], true, true))
            .unwrap();
        assert_eq!(a.cmp_seqsets(&a), Ordering::Equal);
        assert_eq!(a.cmp_seqsets(&b), Ordering::Less);
        assert_eq!(b.cmp_seqsets(&a), Ordering::Greater);
    }

    #[test]
    fn test_hash_stable_under_normalisation() {
        // Coalescing keeps the junction instant, so the normalised forms of
        // the split and the directly-built value coincide exactly.
        let split = TSequenceSet::make(
            vec![
                linear_seq(vec![fi(0, 0.0), fi(5, 7.0)], true, false),
                linear_seq(vec![fi(5, 7.0), fi(10, 10.0)], true, true),
            ],
            true,
        )
        .unwrap();
        let whole = TSequenceSet::make(
            vec![linear_seq(vec![fi(0, 0.0), fi(5, 7.0), fi(10, 10.0)], true, true)],
            false,
        )
        .unwrap();
        assert_eq!(split, whole);
        assert_eq!(split.hash32(), whole.hash32());
        assert_eq!(split.cmp_seqsets(&whole), Ordering::Equal);
    }

    #[test]
    fn test_shift_scale() {
        let ss = three_piece();
        let shifted = ss.shift_scale(Some(Interval::from_micros(100)), None);
        assert_eq!(shifted.start_timestamp(), ts(100));
        assert_eq!(shifted.end_timestamp(), ts(110));
        let doubled = ss.shift_scale(None, Some(Interval::from_micros(20)));
        assert_eq!(doubled.end_timestamp(), ts(20));
        assert_eq!(doubled.num_sequences(), 3);
    }

    #[test]
    fn test_to_discrete() {
        let ss = TSequenceSet::make(
            vec![
                TSequence::from_instant(fi(0, 1.0), Interpolation::Linear),
                TSequence::from_instant(fi(5, 2.0), Interpolation::Linear),
            ],
            false,
        )
        .unwrap();
        let disc = ss.to_discrete().unwrap();
        assert_eq!(disc.interpolation(), Interpolation::Discrete);
        assert_eq!(disc.num_instants(), 2);
        assert!(three_piece().to_discrete().is_none());
    }

    #[test]
    fn test_from_base() {
        let time = PeriodSet::new(vec![
            Period::new(ts(0), ts(2), true, false).unwrap(),
            Period::new(ts(4), ts(6), true, true).unwrap(),
        ])
        .unwrap();
        let ss = TSequenceSet::from_base(Value::Int(7), &time, Interpolation::Step).unwrap();
        assert_eq!(ss.num_sequences(), 2);
        assert_eq!(ss.value_at(ts(1), true), Some(Value::Int(7)));
        assert_eq!(ss.value_at(ts(5), true), Some(Value::Int(7)));
        assert_eq!(ss.time(), time);
    }

    #[test]
    fn test_casts() {
        let ints = TSequenceSet::make(
            vec![step_seq(vec![ii(0, 1), ii(5, 2), ii(10, 2)], true, true)],
            false,
        )
        .unwrap();
        let floats = ints.int_to_float().unwrap();
        assert_eq!(floats.temptype(), TempType::Float);
        assert_eq!(floats.interpolation(), Interpolation::Step);
        let back = floats.float_to_int().unwrap();
        assert_eq!(back, ints);

        let linear = floats.step_to_linear().unwrap();
        assert_eq!(linear.interpolation(), Interpolation::Linear);
        assert_eq!(linear.value_at(ts(3), true), Some(Value::Float(1.0)));

        let lin_set = TSequenceSet::make(
            vec![linear_seq(vec![fi(0, 0.0), fi(10, 10.0)], true, true)],
            false,
        )
        .unwrap();
        assert!(matches!(
            lin_set.float_to_int(),
            Err(TemporalError::CastLossy(_))
        ));
    }

    #[test]
    fn test_value_span() {
        let ss = three_piece();
        let span = ss.value_span().unwrap();
        assert_eq!(span.lower, 0.0);
        assert_eq!(span.upper, 10.0);
    }
}
