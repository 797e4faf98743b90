//! Synchronisation: temporally aligning two values so pointwise operators
//! can walk them instant by instant.
//!
//! Plain mode projects both inputs onto the intersection of their supports;
//! crossings mode additionally injects a synthetic instant wherever two
//! linearly-interpolated numbers become equal between samples.

use crate::inst::TInstant;
use crate::seq::TSequence;
use crate::seqset::TSequenceSet;
use tempo_types::period::Period;
use tempo_types::time::{Interval, Timestamp};
use tempo_types::value::{Interpolation, TempType};

/// Synchronisation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Align sample times on the shared support.
    Plain,
    /// Also insert instants where the two values cross between samples.
    Crossings,
}

/// Synchronise two sequences onto their shared support.
///
/// The outputs share an identical period and identical sample times; they are
/// intentionally left denormalised so later pointwise passes stay aligned.
pub fn synchronize_seq_seq(
    a: &TSequence,
    b: &TSequence,
    mode: SyncMode,
) -> Option<(TSequence, TSequence)> {
    let inter = a.period().intersection(b.period())?;
    if inter.is_instant() {
        let t = inter.lower;
        let va = a.value_at(t, false)?;
        let vb = b.value_at(t, false)?;
        return Some((
            TSequence::from_instant(TInstant::new(t, va), a.interpolation()),
            TSequence::from_instant(TInstant::new(t, vb), b.interpolation()),
        ));
    }

    let times = merged_times(a, b, &inter);
    let with_crossings = mode == SyncMode::Crossings
        && a.interpolation() == Interpolation::Linear
        && b.interpolation() == Interpolation::Linear
        && a.temptype() == TempType::Float
        && b.temptype() == TempType::Float;

    let mut insts_a: Vec<TInstant> = Vec::with_capacity(times.len() * 2);
    let mut insts_b: Vec<TInstant> = Vec::with_capacity(times.len() * 2);
    for (i, &t) in times.iter().enumerate() {
        if with_crossings && i > 0 {
            if let Some(tc) = segment_crossing(a, b, times[i - 1], t) {
                push_sample(&mut insts_a, a, tc);
                push_sample(&mut insts_b, b, tc);
            }
        }
        push_sample(&mut insts_a, a, t);
        push_sample(&mut insts_b, b, t);
    }
    Some((
        TSequence::assemble(insts_a, inter.lower_inc, inter.upper_inc, a.interpolation()),
        TSequence::assemble(insts_b, inter.lower_inc, inter.upper_inc, b.interpolation()),
    ))
}

/// Synchronise a sequence set against a single sequence.
pub fn synchronize_set_seq(
    ss: &TSequenceSet,
    seq: &TSequence,
    mode: SyncMode,
) -> Option<(TSequenceSet, TSequenceSet)> {
    if !ss.period().overlaps(seq.period()) {
        return None;
    }
    let (_, loc) = ss.find_timestamp(seq.period().lower);
    let mut parts_set: Vec<TSequence> = Vec::with_capacity(ss.num_sequences() - loc);
    let mut parts_seq: Vec<TSequence> = Vec::with_capacity(ss.num_sequences() - loc);
    for member in &ss.sequences()[loc..] {
        if let Some((m, s)) = synchronize_seq_seq(member, seq, mode) {
            parts_set.push(m);
            parts_seq.push(s);
        }
        let cmp = seq.period().upper.cmp(&member.period().upper);
        if cmp == std::cmp::Ordering::Less
            || (cmp == std::cmp::Ordering::Equal
                && (!seq.period().upper_inc || member.period().upper_inc))
        {
            break;
        }
    }
    if parts_set.is_empty() {
        return None;
    }
    Some((
        TSequenceSet::from_valid_parts(parts_set, false),
        TSequenceSet::from_valid_parts(parts_seq, false),
    ))
}

/// Synchronise two sequence sets with a two-pointer walk keyed on the
/// members' upper bounds.
pub fn synchronize_set_set(
    a: &TSequenceSet,
    b: &TSequenceSet,
    mode: SyncMode,
) -> Option<(TSequenceSet, TSequenceSet)> {
    if !a.period().overlaps(&b.period()) {
        return None;
    }
    let mut parts_a: Vec<TSequence> = Vec::with_capacity(a.num_sequences() + b.num_sequences());
    let mut parts_b: Vec<TSequence> = Vec::with_capacity(a.num_sequences() + b.num_sequences());
    let mut i = 0;
    let mut j = 0;
    while i < a.num_sequences() && j < b.num_sequences() {
        let seq_a = &a.sequences()[i];
        let seq_b = &b.sequences()[j];
        if let Some((pa, pb)) = synchronize_seq_seq(seq_a, seq_b, mode) {
            parts_a.push(pa);
            parts_b.push(pb);
        }
        let cmp = seq_a.period().upper.cmp(&seq_b.period().upper);
        if cmp == std::cmp::Ordering::Equal
            && seq_a.period().upper_inc == seq_b.period().upper_inc
        {
            i += 1;
            j += 1;
        } else if cmp == std::cmp::Ordering::Less
            || (cmp == std::cmp::Ordering::Equal
                && !seq_a.period().upper_inc
                && seq_b.period().upper_inc)
        {
            i += 1;
        } else {
            j += 1;
        }
    }
    if parts_a.is_empty() {
        return None;
    }
    Some((
        TSequenceSet::from_valid_parts(parts_a, false),
        TSequenceSet::from_valid_parts(parts_b, false),
    ))
}

/// Temporally intersect a sequence set with a discrete sequence, walking both
/// in order.
pub fn intersect_set_discrete(
    ss: &TSequenceSet,
    seq: &TSequence,
) -> Option<(TSequence, TSequence)> {
    if !ss.period().overlaps(seq.period()) {
        return None;
    }
    let mut mine: Vec<TInstant> = Vec::with_capacity(seq.num_instants());
    let mut theirs: Vec<TInstant> = Vec::with_capacity(seq.num_instants());
    let mut i = 0;
    let mut j = 0;
    while i < ss.num_sequences() && j < seq.num_instants() {
        let member = &ss.sequences()[i];
        let inst = seq.inst_n(j).expect("index in range");
        if member.period().contains(inst.t) {
            if let Some(sample) = member.at_timestamp(inst.t) {
                mine.push(sample);
                theirs.push(inst.clone());
            }
        }
        match member.period().upper.cmp(&inst.t) {
            std::cmp::Ordering::Equal => {
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    if mine.is_empty() {
        return None;
    }
    Some((
        TSequence::discrete(mine).expect("instants are ordered"),
        TSequence::discrete(theirs).expect("instants are ordered"),
    ))
}

/// Sample times of both sequences inside the shared period, bounds included.
fn merged_times(a: &TSequence, b: &TSequence, inter: &Period) -> Vec<Timestamp> {
    let in_range = |t: Timestamp| t >= inter.lower && t <= inter.upper;
    let mut times: Vec<Timestamp> = a
        .timestamps()
        .into_iter()
        .chain(b.timestamps())
        .filter(|&t| in_range(t))
        .collect();
    times.push(inter.lower);
    times.push(inter.upper);
    times.sort();
    times.dedup();
    times
}

fn push_sample(insts: &mut Vec<TInstant>, seq: &TSequence, t: Timestamp) {
    if let Some(v) = seq.value_at(t, false) {
        insts.push(TInstant::new(t, v));
    }
}

/// Closed-form crossing of two linear float segments strictly between two
/// aligned sample times; parallel and coincident segments contribute none.
fn segment_crossing(
    a: &TSequence,
    b: &TSequence,
    t1: Timestamp,
    t2: Timestamp,
) -> Option<Timestamp> {
    let va1 = a.value_at(t1, false)?.as_double()?;
    let va2 = a.value_at(t2, false)?.as_double()?;
    let vb1 = b.value_at(t1, false)?.as_double()?;
    let vb2 = b.value_at(t2, false)?.as_double()?;
    let d0 = va1 - vb1;
    let d1 = va2 - vb2;
    if d0 == 0.0 || d1 == 0.0 || (d0 > 0.0) == (d1 > 0.0) {
        return None;
    }
    let ratio = d0 / (d0 - d1);
    let delta = (t2 - t1).micros() as f64;
    let tc = t1 + Interval::from_micros((delta * ratio).round() as i64);
    (tc > t1 && tc < t2).then_some(tc)
}
