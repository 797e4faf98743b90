//! Temporal instants: a single (timestamp, value) sample.

use crate::error::{Result, TemporalError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tempo_types::bbox::TBox;
use tempo_types::period::Period;
use tempo_types::time::Timestamp;
use tempo_types::value::{TempType, Value};

/// A temporal value defined at exactly one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TInstant {
    pub t: Timestamp,
    pub value: Value,
}

impl TInstant {
    pub fn new(t: Timestamp, value: Value) -> Self {
        TInstant { t, value }
    }

    pub fn temptype(&self) -> TempType {
        self.value.temptype()
    }

    /// The degenerate period `[t, t]`.
    pub fn period(&self) -> Period {
        Period::at(self.t)
    }

    pub fn bbox(&self) -> TBox {
        TBox::from_value(self.period(), &self.value)
    }

    /// The instant's value when `t` matches, `None` otherwise.
    pub fn value_at(&self, t: Timestamp) -> Option<&Value> {
        (t == self.t).then_some(&self.value)
    }

    /// Require the same temporal type as `other`.
    pub fn ensure_same_type(&self, other: &TInstant) -> Result<()> {
        if self.temptype() != other.temptype() {
            return Err(TemporalError::TypeMismatch);
        }
        Ok(())
    }

    /// Lexicographic order on (timestamp, value).
    pub fn cmp_instants(&self, other: &TInstant) -> Ordering {
        self.t
            .cmp(&other.t)
            .then_with(|| self.value.total_cmp(&other.value))
    }

    pub fn hash32(&self) -> u32 {
        let t_hash = {
            let bytes = self.t.micros().to_le_bytes();
            let mut h: u32 = 0x811c_9dc5;
            for b in bytes {
                h ^= u32::from(b);
                h = h.wrapping_mul(0x0100_0193);
            }
            h
        };
        (t_hash << 5).wrapping_sub(t_hash).wrapping_add(self.value.hash32())
    }
}

impl fmt::Display for TInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.value, self.t)
    }
}
