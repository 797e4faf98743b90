//! Temporal sequences: an ordered run of instants on one period with a
//! declared interpolation.
//!
//! Sequences are the workhorse under [`crate::seqset::TSequenceSet`]: every
//! set-level operation bottoms out in the per-sequence restriction, join, and
//! crossing routines defined here.

use crate::error::{Result, TemporalError};
use crate::inst::TInstant;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tempo_types::bbox::TBox;
use tempo_types::period::Period;
use tempo_types::period_set::PeriodSet;
use tempo_types::time::{Interval, Timestamp};
use tempo_types::value::{Interpolation, NumSpan, TempType, Value};

/// An ordered run of instants over one period.
///
/// Invariants:
/// - instants have strictly increasing timestamps and share one temporal type;
/// - a single-instant sequence has both bounds inclusive;
/// - discrete sequences have both bounds inclusive;
/// - a step sequence with an exclusive upper bound ends with two equal values
///   (the closing instant marks the bound, its value is never attained);
/// - normalised sequences carry no redundant interior instant (equal-value
///   for step, collinear for linear).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TSequence {
    interp: Interpolation,
    period: Period,
    instants: Vec<TInstant>,
    bbox: TBox,
}

impl TSequence {
    /// Build a sequence from instants, validating every invariant.
    ///
    /// With `normalize`, redundant interior instants are removed first.
    pub fn new(
        instants: Vec<TInstant>,
        lower_inc: bool,
        upper_inc: bool,
        interp: Interpolation,
        normalize: bool,
    ) -> Result<Self> {
        let mut instants = instants;
        validate_instants(&instants, lower_inc, upper_inc, interp)?;
        if normalize {
            instants = normalize_instants(instants, interp);
        }
        let (lower_inc, upper_inc) = if interp == Interpolation::Discrete || instants.len() == 1 {
            (true, true)
        } else {
            (lower_inc, upper_inc)
        };
        Ok(Self::assemble(instants, lower_inc, upper_inc, interp))
    }

    /// Promote a single instant to a sequence with inclusive bounds.
    pub fn from_instant(inst: TInstant, interp: Interpolation) -> Self {
        Self::assemble(vec![inst], true, true, interp)
    }

    /// Discrete sequence over already-ordered instants.
    pub fn discrete(instants: Vec<TInstant>) -> Result<Self> {
        Self::new(instants, true, true, Interpolation::Discrete, false)
    }

    /// Assemble without validation; callers guarantee the invariants.
    pub(crate) fn assemble(
        instants: Vec<TInstant>,
        lower_inc: bool,
        upper_inc: bool,
        interp: Interpolation,
    ) -> Self {
        debug_assert!(!instants.is_empty());
        let lower = instants[0].t;
        let upper = instants[instants.len() - 1].t;
        let (lower_inc, upper_inc) = if instants.len() == 1 {
            (true, true)
        } else {
            (lower_inc, upper_inc)
        };
        let period = Period {
            lower,
            upper,
            lower_inc,
            upper_inc,
        };
        let mut bbox = TBox::from_value(period, &instants[0].value);
        for inst in &instants[1..] {
            bbox.expand_value(&inst.value);
        }
        TSequence {
            interp,
            period,
            instants,
            bbox,
        }
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interp
    }

    pub fn temptype(&self) -> TempType {
        self.instants[0].temptype()
    }

    pub fn period(&self) -> &Period {
        &self.period
    }

    pub fn bbox(&self) -> &TBox {
        &self.bbox
    }

    pub fn instants(&self) -> &[TInstant] {
        &self.instants
    }

    pub fn num_instants(&self) -> usize {
        self.instants.len()
    }

    pub fn inst_n(&self, n: usize) -> Option<&TInstant> {
        self.instants.get(n)
    }

    pub fn first(&self) -> &TInstant {
        &self.instants[0]
    }

    pub fn last(&self) -> &TInstant {
        &self.instants[self.instants.len() - 1]
    }

    pub fn start_timestamp(&self) -> Timestamp {
        self.period.lower
    }

    pub fn end_timestamp(&self) -> Timestamp {
        self.period.upper
    }

    pub fn timestamps(&self) -> Vec<Timestamp> {
        self.instants.iter().map(|i| i.t).collect()
    }

    pub fn duration(&self) -> Interval {
        match self.interp {
            Interpolation::Discrete => Interval::ZERO,
            _ => self.period.duration(),
        }
    }

    pub fn min_value(&self) -> &Value {
        self.min_instant().map(|i| &i.value).expect("non-empty")
    }

    pub fn max_value(&self) -> &Value {
        self.max_instant().map(|i| &i.value).expect("non-empty")
    }

    /// Instant carrying the minimum value; exclusive bounds are ignored by
    /// contract.
    pub fn min_instant(&self) -> Option<&TInstant> {
        self.instants
            .iter()
            .min_by(|a, b| a.value.total_cmp(&b.value))
    }

    pub fn max_instant(&self) -> Option<&TInstant> {
        self.instants
            .iter()
            .max_by(|a, b| a.value.total_cmp(&b.value))
    }

    /// One sequence per segment; a discrete sequence yields its instants.
    pub fn segments(&self) -> Vec<TSequence> {
        if self.interp == Interpolation::Discrete || self.instants.len() == 1 {
            return self
                .instants
                .iter()
                .map(|i| TSequence::from_instant(i.clone(), self.interp))
                .collect();
        }
        let n = self.instants.len();
        (0..n - 1)
            .map(|i| {
                let pair = vec![self.instants[i].clone(), self.instants[i + 1].clone()];
                let lower_inc = if i == 0 { self.period.lower_inc } else { true };
                let upper_inc = if i == n - 2 { self.period.upper_inc } else { false };
                TSequence::assemble(pair, lower_inc, upper_inc, self.interp)
            })
            .collect()
    }

    /// The value taken at `t`.
    ///
    /// With `strict = false`, a timestamp sitting exactly on an exclusive
    /// bound still yields that bound instant's value; equality semantics at
    /// joins rely on this.
    pub fn value_at(&self, t: Timestamp, strict: bool) -> Option<Value> {
        if self.interp == Interpolation::Discrete {
            return self
                .instants
                .iter()
                .find(|i| i.t == t)
                .map(|i| i.value.clone());
        }
        if t < self.period.lower || t > self.period.upper {
            return None;
        }
        if !strict {
            if t == self.period.lower {
                return Some(self.first().value.clone());
            }
            if t == self.period.upper {
                return Some(self.last().value.clone());
            }
        }
        if !self.period.contains(t) {
            return None;
        }
        let idx = self.instants.partition_point(|i| i.t <= t) - 1;
        let left = &self.instants[idx];
        if left.t == t || self.interp == Interpolation::Step {
            return Some(left.value.clone());
        }
        let right = &self.instants[idx + 1];
        let ratio = ratio_at(left.t, right.t, t);
        Some(left.value.interpolate(&right.value, ratio))
    }

    /// Value approached from the left at `t`; differs from `value_at` only
    /// for step interpolation at a sample point.
    fn left_limit(&self, t: Timestamp) -> Value {
        let idx = self.instants.partition_point(|i| i.t < t);
        if idx == 0 {
            return self.first().value.clone();
        }
        match self.interp {
            Interpolation::Step => self.instants[idx - 1].value.clone(),
            _ => self.value_at(t, false).expect("t within period"),
        }
    }

    // ------------------------------------------------------------------
    // Restriction
    // ------------------------------------------------------------------

    /// Project the sequence onto a period.
    pub fn at_period(&self, p: &Period) -> Option<TSequence> {
        if self.interp == Interpolation::Discrete {
            let kept: Vec<TInstant> = self
                .instants
                .iter()
                .filter(|i| p.contains(i.t))
                .cloned()
                .collect();
            if kept.is_empty() {
                return None;
            }
            return Some(TSequence::assemble(kept, true, true, self.interp));
        }
        let inter = self.period.intersection(p)?;
        if inter.is_instant() {
            let v = self.value_at(inter.lower, false)?;
            return Some(TSequence::from_instant(
                TInstant::new(inter.lower, v),
                self.interp,
            ));
        }
        let mut insts: Vec<TInstant> = Vec::with_capacity(self.instants.len() + 2);
        let lo_value = self
            .value_at(inter.lower, false)
            .expect("intersection lower within period");
        insts.push(TInstant::new(inter.lower, lo_value));
        for inst in &self.instants {
            if inst.t > inter.lower && inst.t < inter.upper {
                insts.push(inst.clone());
            }
        }
        let hi_value = if inter.upper_inc || self.interp == Interpolation::Linear {
            self.value_at(inter.upper, false)
                .expect("intersection upper within period")
        } else {
            // Exclusive step upper keeps the value approached from the left.
            self.left_limit(inter.upper)
        };
        insts.push(TInstant::new(inter.upper, hi_value));
        Some(TSequence::assemble(
            insts,
            inter.lower_inc,
            inter.upper_inc,
            self.interp,
        ))
    }

    /// Remove a period from the sequence's support.
    pub fn minus_period(&self, p: &Period) -> Vec<TSequence> {
        if self.interp == Interpolation::Discrete {
            let kept: Vec<TInstant> = self
                .instants
                .iter()
                .filter(|i| !p.contains(i.t))
                .cloned()
                .collect();
            return if kept.is_empty() {
                Vec::new()
            } else {
                vec![TSequence::assemble(kept, true, true, self.interp)]
            };
        }
        match PeriodSet::from_period(self.period).minus_period(p) {
            Some(rest) => self.at_periodset(&rest),
            None => Vec::new(),
        }
    }

    /// Project onto a period set.
    pub fn at_periodset(&self, ps: &PeriodSet) -> Vec<TSequence> {
        ps.iter().filter_map(|p| self.at_period(p)).collect()
    }

    /// Remove a period set from the support.
    pub fn minus_periodset(&self, ps: &PeriodSet) -> Vec<TSequence> {
        if self.interp == Interpolation::Discrete {
            let kept: Vec<TInstant> = self
                .instants
                .iter()
                .filter(|i| !ps.contains_timestamp(i.t))
                .cloned()
                .collect();
            return if kept.is_empty() {
                Vec::new()
            } else {
                vec![TSequence::assemble(kept, true, true, self.interp)]
            };
        }
        match PeriodSet::from_period(self.period).minus(ps) {
            Some(rest) => self.at_periodset(&rest),
            None => Vec::new(),
        }
    }

    /// The instant taken at `t`, honouring exclusive bounds.
    pub fn at_timestamp(&self, t: Timestamp) -> Option<TInstant> {
        self.value_at(t, true).map(|v| TInstant::new(t, v))
    }

    /// Remove a single timestamp from the support.
    pub fn minus_timestamp(&self, t: Timestamp) -> Vec<TSequence> {
        self.minus_period(&Period::at(t))
    }

    /// Project onto a set of timestamps, producing a discrete sequence.
    pub fn at_timestampset(&self, ts: &[Timestamp]) -> Option<TSequence> {
        let mut ts: Vec<Timestamp> = ts.to_vec();
        ts.sort();
        ts.dedup();
        let kept: Vec<TInstant> = ts.iter().filter_map(|&t| self.at_timestamp(t)).collect();
        if kept.is_empty() {
            None
        } else {
            Some(TSequence::assemble(kept, true, true, Interpolation::Discrete))
        }
    }

    /// Remove a set of timestamps from the support.
    pub fn minus_timestampset(&self, ts: &[Timestamp]) -> Vec<TSequence> {
        let holes: Vec<Period> = ts.iter().map(|&t| Period::at(t)).collect();
        match PeriodSet::new(holes) {
            Some(ps) => self.minus_periodset(&ps),
            None => vec![self.clone()],
        }
    }

    /// Restrict to (`atfunc`) or away from the given base value.
    pub fn restrict_value(&self, value: &Value, atfunc: bool) -> Vec<TSequence> {
        if atfunc {
            self.at_value(value)
        } else {
            self.minus_by_support(&self.at_value(value))
        }
    }

    /// Restriction to a value: matching runs, samples, and linear crossings.
    pub fn at_value(&self, value: &Value) -> Vec<TSequence> {
        if self.temptype() != value.temptype() {
            return Vec::new();
        }
        match self.interp {
            Interpolation::Discrete => {
                let kept: Vec<TInstant> = self
                    .instants
                    .iter()
                    .filter(|i| &i.value == value)
                    .cloned()
                    .collect();
                if kept.is_empty() {
                    Vec::new()
                } else {
                    vec![TSequence::assemble(kept, true, true, self.interp)]
                }
            }
            Interpolation::Step => {
                let support = self.step_support(|v| v == value);
                match PeriodSet::new(support) {
                    Some(ps) => self.at_periodset(&ps),
                    None => Vec::new(),
                }
            }
            Interpolation::Linear => self.linear_at_value(value),
        }
    }

    fn linear_at_value(&self, value: &Value) -> Vec<TSequence> {
        let n = self.instants.len();
        if n == 1 {
            return if &self.instants[0].value == value {
                vec![self.clone()]
            } else {
                Vec::new()
            };
        }
        let mut pieces: Vec<TSequence> = Vec::new();
        let mut i = 0;
        while i < n - 1 {
            let a = &self.instants[i];
            let b = &self.instants[i + 1];
            if &a.value == value {
                if &b.value == value {
                    // Constant run at the target value.
                    let start = i;
                    let mut j = i + 1;
                    while j + 1 < n && self.instants[j + 1].value == *value {
                        j += 1;
                    }
                    let lower_inc = if start == 0 { self.period.lower_inc } else { true };
                    let upper_inc = if j == n - 1 { self.period.upper_inc } else { true };
                    pieces.push(TSequence::assemble(
                        self.instants[start..=j].to_vec(),
                        lower_inc,
                        upper_inc,
                        self.interp,
                    ));
                    i = j + 1;
                    continue;
                }
                if i > 0 || self.period.lower_inc {
                    pieces.push(TSequence::from_instant(a.clone(), self.interp));
                }
            } else if &b.value != value {
                if let Some(tc) = linear_crossing_at_value(a, b, value) {
                    pieces.push(TSequence::from_instant(
                        TInstant::new(tc, value.clone()),
                        self.interp,
                    ));
                }
            }
            i += 1;
        }
        let last = &self.instants[n - 1];
        if &last.value == value
            && self.instants[n - 2].value != *value
            && self.period.upper_inc
        {
            pieces.push(TSequence::from_instant(last.clone(), self.interp));
        }
        pieces
    }

    /// Restrict to (or away from) a finite set of values.
    pub fn restrict_values(&self, values: &[Value], atfunc: bool) -> Vec<TSequence> {
        let mut at: Vec<TSequence> = Vec::new();
        for v in values {
            at.extend(self.at_value(v));
        }
        at.sort_by(|a, b| a.period.cmp_periods(&b.period));
        if atfunc {
            at
        } else {
            self.minus_by_support(&at)
        }
    }

    /// Restrict a temporal number to (or away from) a numeric span.
    pub fn restrict_span(&self, span: &NumSpan, atfunc: bool) -> Vec<TSequence> {
        let at = match self.numeric_span_support(std::slice::from_ref(span)) {
            Some(ps) => self.at_periodset(&ps),
            None => Vec::new(),
        };
        if atfunc {
            at
        } else {
            self.minus_by_support(&at)
        }
    }

    /// Restrict a temporal number to (or away from) a set of numeric spans.
    pub fn restrict_spans(&self, spans: &[NumSpan], atfunc: bool) -> Vec<TSequence> {
        let at = match self.numeric_span_support(spans) {
            Some(ps) => self.at_periodset(&ps),
            None => Vec::new(),
        };
        if atfunc {
            at
        } else {
            self.minus_by_support(&at)
        }
    }

    /// Restrict to (or away from) the sequence's own extreme value.
    pub fn restrict_minmax(&self, min: bool, atfunc: bool) -> Vec<TSequence> {
        let target = if min {
            self.min_value().clone()
        } else {
            self.max_value().clone()
        };
        self.restrict_value(&target, atfunc)
    }

    /// Complement of the given pieces within this sequence's support.
    fn minus_by_support(&self, at: &[TSequence]) -> Vec<TSequence> {
        if at.is_empty() {
            return vec![self.clone()];
        }
        if self.interp == Interpolation::Discrete {
            let kept: Vec<TInstant> = self
                .instants
                .iter()
                .filter(|i| !at.iter().any(|s| s.instants.iter().any(|j| j.t == i.t)))
                .cloned()
                .collect();
            return if kept.is_empty() {
                Vec::new()
            } else {
                vec![TSequence::assemble(kept, true, true, self.interp)]
            };
        }
        let at_ps = PeriodSet::new(at.iter().map(|s| s.period).collect())
            .expect("at pieces are non-empty");
        match PeriodSet::from_period(self.period).minus(&at_ps) {
            Some(rest) => self.at_periodset(&rest),
            None => Vec::new(),
        }
    }

    /// Time support where the step value satisfies the predicate.
    fn step_support<F: Fn(&Value) -> bool>(&self, pred: F) -> Vec<Period> {
        let n = self.instants.len();
        let mut out = Vec::new();
        let mut i = 0;
        while i < n {
            if !pred(&self.instants[i].value) {
                i += 1;
                continue;
            }
            let start = i;
            while i + 1 < n && pred(&self.instants[i + 1].value) {
                i += 1;
            }
            let lower_inc = if start == 0 { self.period.lower_inc } else { true };
            let (upper, upper_inc) = if i == n - 1 {
                (self.period.upper, self.period.upper_inc)
            } else {
                (self.instants[i + 1].t, false)
            };
            if let Ok(p) = Period::new(self.instants[start].t, upper, lower_inc, upper_inc) {
                out.push(p);
            }
            i += 1;
        }
        out
    }

    /// Time support where the numeric value lies in any of the spans.
    fn numeric_span_support(&self, spans: &[NumSpan]) -> Option<PeriodSet> {
        debug_assert!(self.temptype().is_number());
        match self.interp {
            Interpolation::Discrete | Interpolation::Step => {
                let contained = |v: &Value| {
                    v.as_double()
                        .map(|d| spans.iter().any(|s| s.contains(d)))
                        .unwrap_or(false)
                };
                if self.interp == Interpolation::Discrete {
                    let periods: Vec<Period> = self
                        .instants
                        .iter()
                        .filter(|i| contained(&i.value))
                        .map(|i| Period::at(i.t))
                        .collect();
                    PeriodSet::new(periods)
                } else {
                    PeriodSet::new(self.step_support(contained))
                }
            }
            Interpolation::Linear => {
                let n = self.instants.len();
                let mut periods = Vec::new();
                if n == 1 {
                    let d = self.instants[0].value.as_double()?;
                    if spans.iter().any(|s| s.contains(d)) {
                        periods.push(self.period);
                    }
                    return PeriodSet::new(periods);
                }
                for i in 0..n - 1 {
                    let a = &self.instants[i];
                    let b = &self.instants[i + 1];
                    let seg_lower_inc = if i == 0 { self.period.lower_inc } else { true };
                    let seg_upper_inc = if i == n - 2 { self.period.upper_inc } else { true };
                    for span in spans {
                        if let Some(p) =
                            segment_span_support(a, b, seg_lower_inc, seg_upper_inc, span)
                        {
                            periods.push(p);
                        }
                    }
                }
                PeriodSet::new(periods)
            }
        }
    }

    // ------------------------------------------------------------------
    // Append and join
    // ------------------------------------------------------------------

    /// Append one instant, growing the period.
    ///
    /// The timestamp must be strictly greater than the current end, or equal
    /// to it with an equal value while the upper bound is exclusive (which
    /// closes the bound).
    pub fn append_instant(&mut self, inst: TInstant) -> Result<()> {
        if self.temptype() != inst.temptype() {
            return Err(TemporalError::TypeMismatch);
        }
        let last_t = self.last().t;
        if inst.t < last_t {
            return Err(TemporalError::InvalidOrder(format!(
                "timestamps must be increasing: {} then {}",
                last_t, inst.t
            )));
        }
        if inst.t == last_t {
            if self.interp == Interpolation::Discrete || self.period.upper_inc {
                return Err(TemporalError::InvalidOrder(format!(
                    "timestamps must be increasing: {} then {}",
                    last_t, inst.t
                )));
            }
            if inst.value != self.last().value {
                return Err(TemporalError::ValueMismatchAtJoin(inst.t));
            }
            self.period.upper_inc = true;
            return Ok(());
        }
        self.period.upper = inst.t;
        if self.interp != Interpolation::Discrete {
            self.period.upper_inc = true;
        }
        self.bbox = self.bbox.union(&TBox::from_value(Period::at(inst.t), &inst.value));
        self.instants.push(inst);
        Ok(())
    }

    /// Whether `other` can be merged onto the end of `self` without loss.
    ///
    /// On success the flags say which of the two boundary instants to drop.
    pub(crate) fn join_test(&self, other: &TSequence) -> Option<(bool, bool)> {
        if self.interp != other.interp || self.temptype() != other.temptype() {
            return None;
        }
        if self.interp == Interpolation::Discrete {
            return None;
        }
        if self.period.upper != other.period.lower {
            return None;
        }
        let upper_inc = self.period.upper_inc;
        let lower_inc = other.period.lower_inc;
        if !upper_inc && !lower_inc {
            // A point gap: the boundary belongs to neither side.
            return None;
        }
        let eq = self.last().value == other.first().value;
        match self.interp {
            Interpolation::Linear => eq.then_some((false, true)),
            Interpolation::Step => {
                if eq {
                    Some((false, true))
                } else if lower_inc && !upper_inc {
                    // The left closing instant never attains its value; the
                    // right side defines the boundary.
                    Some((true, false))
                } else {
                    None
                }
            }
            Interpolation::Discrete => None,
        }
    }

    /// Merge `other` onto the end of `self`; `join_test` must have succeeded.
    pub(crate) fn join(&self, other: &TSequence, removelast: bool, removefirst: bool) -> TSequence {
        let mut insts: Vec<TInstant> = Vec::with_capacity(
            self.instants.len() + other.instants.len(),
        );
        let self_end = if removelast {
            self.instants.len() - 1
        } else {
            self.instants.len()
        };
        insts.extend_from_slice(&self.instants[..self_end]);
        let other_start = usize::from(removefirst);
        insts.extend_from_slice(&other.instants[other_start..]);
        TSequence::assemble(
            insts,
            self.period.lower_inc,
            other.period.upper_inc,
            self.interp,
        )
    }

    // ------------------------------------------------------------------
    // Modification
    // ------------------------------------------------------------------

    /// Remove the sample at `t`, if any; neighbours connect directly.
    pub fn delete_timestamp(&self, t: Timestamp) -> Option<TSequence> {
        let idx = match self.instants.iter().position(|i| i.t == t) {
            Some(idx) => idx,
            None => return Some(self.clone()),
        };
        if self.instants.len() == 1 {
            return None;
        }
        let mut insts = self.instants.clone();
        insts.remove(idx);
        let lower_inc = if idx == 0 { true } else { self.period.lower_inc };
        let upper_inc = if idx == self.instants.len() - 1 {
            true
        } else {
            self.period.upper_inc
        };
        fixup_step_closing(&mut insts, upper_inc, self.interp);
        Some(TSequence::assemble(insts, lower_inc, upper_inc, self.interp))
    }

    /// Remove every sample whose timestamp appears in `ts`.
    pub fn delete_timestampset(&self, ts: &[Timestamp]) -> Option<TSequence> {
        let mut kept: Vec<TInstant> = self
            .instants
            .iter()
            .filter(|i| !ts.contains(&i.t))
            .cloned()
            .collect();
        if kept.is_empty() {
            return None;
        }
        let lower_inc = if kept[0].t == self.period.lower {
            self.period.lower_inc
        } else {
            true
        };
        let upper_inc = if kept[kept.len() - 1].t == self.period.upper {
            self.period.upper_inc
        } else {
            true
        };
        fixup_step_closing(&mut kept, upper_inc, self.interp);
        Some(TSequence::assemble(kept, lower_inc, upper_inc, self.interp))
    }

    /// Remove a period, stitching the two sides when the hole's endpoint
    /// values agree and the interpolation permits.
    pub fn delete_period(&self, p: &Period) -> Vec<TSequence> {
        let pieces = self.minus_period(p);
        stitch_pieces(pieces, self.interp)
    }

    /// Remove a period set, stitching across each removable hole.
    pub fn delete_periodset(&self, ps: &PeriodSet) -> Vec<TSequence> {
        let pieces = self.minus_periodset(ps);
        stitch_pieces(pieces, self.interp)
    }

    // ------------------------------------------------------------------
    // Aggregates, order, hash
    // ------------------------------------------------------------------

    /// Area under the curve of a temporal number, in value-seconds.
    pub fn integral(&self) -> f64 {
        if !self.temptype().is_number() || self.interp == Interpolation::Discrete {
            return 0.0;
        }
        let mut total = 0.0;
        for pair in self.instants.windows(2) {
            let dt = (pair[1].t - pair[0].t).as_secs_f64();
            let a = pair[0].value.as_double().expect("number domain");
            match self.interp {
                Interpolation::Step => total += a * dt,
                Interpolation::Linear => {
                    let b = pair[1].value.as_double().expect("number domain");
                    total += (a + b) / 2.0 * dt;
                }
                Interpolation::Discrete => unreachable!(),
            }
        }
        total
    }

    /// Time-weighted average of a temporal number.
    pub fn twavg(&self) -> f64 {
        let duration = self.duration().as_secs_f64();
        if duration == 0.0 {
            let sum: f64 = self
                .instants
                .iter()
                .filter_map(|i| i.value.as_double())
                .sum();
            return sum / self.instants.len() as f64;
        }
        self.integral() / duration
    }

    /// Lexicographic order: instants, then count, then bounds, then
    /// interpolation.
    pub fn cmp_sequences(&self, other: &TSequence) -> Ordering {
        let n = self.instants.len().min(other.instants.len());
        for i in 0..n {
            let ord = self.instants[i].cmp_instants(&other.instants[i]);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.instants
            .len()
            .cmp(&other.instants.len())
            .then_with(|| other.period.lower_inc.cmp(&self.period.lower_inc))
            .then_with(|| self.period.upper_inc.cmp(&other.period.upper_inc))
            .then_with(|| interp_rank(self.interp).cmp(&interp_rank(other.interp)))
    }

    /// Rolling 32-bit structural hash.
    pub fn hash32(&self) -> u32 {
        let mut h: u32 = 1;
        for inst in &self.instants {
            h = (h << 5).wrapping_sub(h).wrapping_add(inst.hash32());
        }
        let bounds =
            u32::from(self.period.lower_inc) << 1 | u32::from(self.period.upper_inc);
        (h << 5).wrapping_sub(h).wrapping_add(bounds)
    }

    // ------------------------------------------------------------------
    // Casts
    // ------------------------------------------------------------------

    /// Cast a temporal integer to a temporal float, keeping step semantics.
    pub fn int_to_float(&self) -> Result<TSequence> {
        if self.temptype() != TempType::Int {
            return Err(TemporalError::TypeMismatch);
        }
        let insts = self
            .instants
            .iter()
            .map(|i| TInstant::new(i.t, Value::Float(i.value.as_double().expect("int"))))
            .collect();
        Ok(TSequence::assemble(
            insts,
            self.period.lower_inc,
            self.period.upper_inc,
            self.interp,
        ))
    }

    /// Cast a temporal float to a temporal integer; linear interpolation
    /// would lose the continuous variation and is rejected.
    pub fn float_to_int(&self) -> Result<TSequence> {
        if self.temptype() != TempType::Float {
            return Err(TemporalError::TypeMismatch);
        }
        if self.interp == Interpolation::Linear {
            return Err(TemporalError::CastLossy("temporal float"));
        }
        let insts = self
            .instants
            .iter()
            .map(|i| {
                TInstant::new(
                    i.t,
                    Value::Int(i.value.as_double().expect("float") as i64),
                )
            })
            .collect();
        Ok(TSequence::assemble(
            insts,
            self.period.lower_inc,
            self.period.upper_inc,
            self.interp,
        ))
    }

    /// Rewrite a step sequence as equivalent linear pieces, splitting at each
    /// value jump.
    pub fn step_to_linear(&self) -> Vec<TSequence> {
        debug_assert_eq!(self.interp, Interpolation::Step);
        let n = self.instants.len();
        if n == 1 {
            return vec![TSequence::assemble(
                self.instants.clone(),
                true,
                true,
                Interpolation::Linear,
            )];
        }
        let mut out = Vec::new();
        for i in 0..n - 1 {
            let a = &self.instants[i];
            let b = &self.instants[i + 1];
            let lower_inc = if i == 0 { self.period.lower_inc } else { true };
            let last_seg = i == n - 2;
            if a.value == b.value {
                let upper_inc = if last_seg { self.period.upper_inc } else { false };
                out.push(TSequence::assemble(
                    vec![a.clone(), b.clone()],
                    lower_inc,
                    upper_inc,
                    Interpolation::Linear,
                ));
            } else {
                out.push(TSequence::assemble(
                    vec![a.clone(), TInstant::new(b.t, a.value.clone())],
                    lower_inc,
                    false,
                    Interpolation::Linear,
                ));
                if last_seg && self.period.upper_inc {
                    out.push(TSequence::from_instant(b.clone(), Interpolation::Linear));
                }
            }
        }
        out
    }

    /// Affinely remap the timeline: optional shift, optional new total
    /// duration.
    pub fn shift_scale(&self, shift: Option<Interval>, duration: Option<Interval>) -> TSequence {
        let old_lower = self.period.lower;
        let old_span = (self.period.upper - old_lower).micros();
        let new_lower = match shift {
            Some(s) => old_lower + s,
            None => old_lower,
        };
        let new_span = match duration {
            Some(d) if old_span > 0 => d.micros(),
            _ => old_span,
        };
        self.remap_time(&|t| {
            let offset = (t - old_lower).micros();
            let scaled = if old_span == 0 {
                0
            } else {
                (offset as i128 * new_span as i128 / old_span as i128) as i64
            };
            new_lower + Interval::from_micros(scaled)
        })
    }

    /// Rebuild the sequence with every timestamp passed through `f`, which
    /// must be strictly monotone.
    pub(crate) fn remap_time(&self, f: &dyn Fn(Timestamp) -> Timestamp) -> TSequence {
        let insts = self
            .instants
            .iter()
            .map(|i| TInstant::new(f(i.t), i.value.clone()))
            .collect();
        TSequence::assemble(
            insts,
            self.period.lower_inc,
            self.period.upper_inc,
            self.interp,
        )
    }
}

impl fmt::Display for TSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.interp == Interpolation::Discrete {
            write!(f, "{{")?;
            for (i, inst) in self.instants.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{inst}")?;
            }
            return write!(f, "}}");
        }
        write!(f, "{}", if self.period.lower_inc { '[' } else { '(' })?;
        for (i, inst) in self.instants.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{inst}")?;
        }
        write!(f, "{}", if self.period.upper_inc { ']' } else { ')' })
    }
}

/// Interpolation ratio of `t` within `[t1, t2]`.
pub(crate) fn ratio_at(t1: Timestamp, t2: Timestamp, t: Timestamp) -> f64 {
    (t - t1).micros() as f64 / (t2 - t1).micros() as f64
}

fn interp_rank(interp: Interpolation) -> u8 {
    match interp {
        Interpolation::Discrete => 0,
        Interpolation::Step => 1,
        Interpolation::Linear => 2,
    }
}

fn validate_instants(
    instants: &[TInstant],
    lower_inc: bool,
    upper_inc: bool,
    interp: Interpolation,
) -> Result<()> {
    let first = instants.first().ok_or(TemporalError::EmptyResult)?;
    let temptype = first.temptype();
    if interp == Interpolation::Linear && !temptype.is_continuous() {
        return Err(TemporalError::InterpolationMismatch);
    }
    for pair in instants.windows(2) {
        if pair[0].temptype() != temptype || pair[1].temptype() != temptype {
            return Err(TemporalError::TypeMismatch);
        }
        if pair[0].t >= pair[1].t {
            return Err(TemporalError::InvalidOrder(format!(
                "timestamps must be increasing: {} then {}",
                pair[0].t, pair[1].t
            )));
        }
    }
    if instants.len() == 1 && interp != Interpolation::Discrete && !(lower_inc && upper_inc) {
        return Err(TemporalError::InvalidOrder(
            "a single-instant sequence must have inclusive bounds".to_string(),
        ));
    }
    if interp == Interpolation::Step && !upper_inc && instants.len() > 1 {
        let last = &instants[instants.len() - 1];
        let prev = &instants[instants.len() - 2];
        if last.value != prev.value {
            return Err(TemporalError::InvalidOrder(
                "a step sequence with exclusive upper bound must end with equal values"
                    .to_string(),
            ));
        }
    }
    Ok(())
}

/// Remove redundant interior instants: equal-value for step, collinear for
/// linear. End instants always stay.
fn normalize_instants(instants: Vec<TInstant>, interp: Interpolation) -> Vec<TInstant> {
    if instants.len() <= 2 {
        return instants;
    }
    match interp {
        Interpolation::Discrete => instants,
        Interpolation::Step => {
            let n = instants.len();
            let mut kept: Vec<TInstant> = Vec::with_capacity(n);
            for (i, inst) in instants.into_iter().enumerate() {
                let interior = i > 0 && i < n - 1;
                if interior && kept.last().map(|p| p.value == inst.value) == Some(true) {
                    continue;
                }
                kept.push(inst);
            }
            kept
        }
        Interpolation::Linear => {
            let mut kept: Vec<TInstant> = Vec::with_capacity(instants.len());
            for inst in instants {
                while kept.len() >= 2 {
                    let prev = &kept[kept.len() - 2];
                    let mid = &kept[kept.len() - 1];
                    let ratio = ratio_at(prev.t, inst.t, mid.t);
                    if prev.value.is_collinear(&mid.value, &inst.value, ratio) {
                        kept.pop();
                    } else {
                        break;
                    }
                }
                kept.push(inst);
            }
            kept
        }
    }
}

/// Solve the crossing time where a linear segment attains `target`, strictly
/// inside the segment.
fn linear_crossing_at_value(a: &TInstant, b: &TInstant, target: &Value) -> Option<Timestamp> {
    let ratio = match (&a.value, &b.value, target) {
        (Value::Float(av), Value::Float(bv), Value::Float(tv)) => {
            if (av < tv && tv < bv) || (bv < tv && tv < av) {
                Some((tv - av) / (bv - av))
            } else {
                None
            }
        }
        (Value::Point(ap), Value::Point(bp), Value::Point(tp)) => {
            point_crossing_ratio(
                &[ap.x(), ap.y(), ap.z.unwrap_or(0.0)],
                &[bp.x(), bp.y(), bp.z.unwrap_or(0.0)],
                &[tp.x(), tp.y(), tp.z.unwrap_or(0.0)],
            )
        }
        _ => None,
    }?;
    let delta = (b.t - a.t).micros() as f64;
    let tc = a.t + Interval::from_micros((delta * ratio).round() as i64);
    (tc > a.t && tc < b.t).then_some(tc)
}

/// Ratio at which a moving point passes exactly through `target`, if it does.
fn point_crossing_ratio(a: &[f64; 3], b: &[f64; 3], target: &[f64; 3]) -> Option<f64> {
    use tempo_types::value::EPSILON;
    let mut ratio = None;
    for axis in 0..3 {
        let delta = b[axis] - a[axis];
        if delta.abs() > EPSILON {
            ratio = Some((target[axis] - a[axis]) / delta);
            break;
        }
    }
    let ratio = ratio?;
    if !(0.0..=1.0).contains(&ratio) {
        return None;
    }
    for axis in 0..3 {
        let at = a[axis] + (b[axis] - a[axis]) * ratio;
        if (at - target[axis]).abs() > EPSILON {
            return None;
        }
    }
    Some(ratio)
}

/// Time support of a linear segment within a numeric span.
fn segment_span_support(
    a: &TInstant,
    b: &TInstant,
    seg_lower_inc: bool,
    seg_upper_inc: bool,
    span: &NumSpan,
) -> Option<Period> {
    let av = a.value.as_double()?;
    let bv = b.value.as_double()?;
    if av == bv {
        return span
            .contains(av)
            .then(|| Period::new(a.t, b.t, seg_lower_inc, seg_upper_inc).ok())
            .flatten();
    }
    let increasing = bv > av;
    let (start_v, end_v) = (av, bv);
    let (enter_v, enter_inc, exit_v, exit_inc) = if increasing {
        (span.lower, span.lower_inc, span.upper, span.upper_inc)
    } else {
        (span.upper, span.upper_inc, span.lower, span.lower_inc)
    };
    let time_at = |v: f64| -> Timestamp {
        let ratio = (v - start_v) / (end_v - start_v);
        let delta = (b.t - a.t).micros() as f64;
        a.t + Interval::from_micros((delta * ratio).round() as i64)
    };
    let crosses_enter = if increasing { av < enter_v } else { av > enter_v };
    let crosses_exit = if increasing { bv > exit_v } else { bv < exit_v };
    let (tl, tl_inc) = if crosses_enter {
        if increasing && bv < enter_v || !increasing && bv > enter_v {
            return None;
        }
        (time_at(enter_v), enter_inc)
    } else {
        (a.t, seg_lower_inc && span.contains(av))
    };
    let (tu, tu_inc) = if crosses_exit {
        if increasing && av > exit_v || !increasing && av < exit_v {
            return None;
        }
        (time_at(exit_v), exit_inc)
    } else {
        (b.t, seg_upper_inc && span.contains(bv))
    };
    if tl > tu {
        return None;
    }
    if tl == tu && !(tl_inc && tu_inc) {
        return None;
    }
    Period::new(tl, tu, tl_inc, tu_inc).ok()
}

/// A step sequence with an exclusive upper bound must end with two equal
/// values; rewrite the closing instant after samples were removed.
fn fixup_step_closing(insts: &mut [TInstant], upper_inc: bool, interp: Interpolation) {
    if interp != Interpolation::Step || upper_inc || insts.len() < 2 {
        return;
    }
    let prev_value = insts[insts.len() - 2].value.clone();
    let last = insts.last_mut().expect("len >= 2");
    if last.value != prev_value {
        last.value = prev_value;
    }
}

/// Join two delete remainders across a removed hole; the caller has checked
/// that the hole's endpoint values agree.
pub(crate) fn stitch_pair(prev: TSequence, next: TSequence, interp: Interpolation) -> TSequence {
    let lower_inc = prev.period.lower_inc;
    let upper_inc = next.period.upper_inc;
    let mut insts = prev.instants;
    // The shared value appears on both hole edges; keep both boundary
    // instants unless they coincide in time.
    if insts.last().map(|i| i.t) == Some(next.first().t) {
        insts.pop();
    }
    insts.extend(next.instants.iter().cloned());
    let insts = normalize_instants(insts, interp);
    TSequence::assemble(insts, lower_inc, upper_inc, interp)
}

/// Rejoin delete pieces across holes whose endpoint values agree.
fn stitch_pieces(pieces: Vec<TSequence>, interp: Interpolation) -> Vec<TSequence> {
    if interp == Interpolation::Discrete || pieces.len() < 2 {
        return pieces;
    }
    let mut out: Vec<TSequence> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let stitchable = out
            .last()
            .is_some_and(|prev| prev.last().value == piece.first().value);
        if !stitchable {
            out.push(piece);
            continue;
        }
        let prev = out.pop().expect("non-empty");
        out.push(stitch_pair(prev, piece, interp));
    }
    out
}

/// Coalesce an ordered run of sequences, merging adjacent ones that join.
pub(crate) fn normalize_seq_array(seqs: Vec<TSequence>) -> Vec<TSequence> {
    let mut out: Vec<TSequence> = Vec::with_capacity(seqs.len());
    for seq in seqs {
        match out.last().and_then(|prev| prev.join_test(&seq)) {
            Some((removelast, removefirst)) => {
                let prev = out.pop().expect("non-empty");
                out.push(prev.join(&seq, removelast, removefirst));
            }
            None => out.push(seq),
        }
    }
    out
}

/// Merge sequences that may overlap in single equal-valued instants.
pub(crate) fn merge_seq_array(mut seqs: Vec<TSequence>) -> Result<Vec<TSequence>> {
    if seqs.is_empty() {
        return Err(TemporalError::EmptyResult);
    }
    let temptype = seqs[0].temptype();
    let interp = seqs[0].interpolation();
    for seq in &seqs {
        if seq.temptype() != temptype {
            return Err(TemporalError::TypeMismatch);
        }
        if seq.interpolation() != interp {
            return Err(TemporalError::InterpolationMismatch);
        }
    }
    seqs.sort_by(|a, b| a.period().cmp_periods(b.period()));
    for pair in seqs.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.period().overlaps(b.period()) {
            let touching = a.period().upper == b.period().lower;
            if !touching {
                return Err(TemporalError::InvalidOrder(format!(
                    "sequences overlap: {} and {}",
                    a.period(),
                    b.period()
                )));
            }
            if a.last().value != b.first().value {
                return Err(TemporalError::ValueMismatchAtJoin(a.period().upper));
            }
        }
    }
    Ok(normalize_seq_array(seqs))
}
