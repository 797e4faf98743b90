//! Temporal values over boolean, numeric, text, and point base domains.
//!
//! A temporal value is a function of time, stored by enumerating the pieces
//! on which it varies continuously or discretely. Four subtypes cover the
//! representations: a single [`TInstant`], a discrete or continuous
//! [`TSequence`], and the most general [`TSequenceSet`] of ordered disjoint
//! sequences. The [`Temporal`] sum type routes shared operations to the
//! subtype implementations.
//!
//! ```rust
//! use tempo::prelude::*;
//!
//! let ss = parse_temporal("[1@2000-01-01, 3@2000-01-03)", TempType::Float)?;
//! let t = Timestamp::from_ymd(2000, 1, 2);
//! assert_eq!(ss.value_at(t, true), Some(Value::Float(2.0)));
//! # Ok::<(), tempo::TemporalError>(())
//! ```

pub mod error;
pub mod inst;
pub mod packed;
pub mod seq;
pub mod seqset;
pub mod sync;
pub mod temporal;
pub mod wkt;

pub use error::{Result, TemporalError};

pub use inst::TInstant;
pub use seq::TSequence;
pub use seqset::TSequenceSet;
pub use temporal::{Subtype, Temporal};

pub use sync::{synchronize_seq_seq, synchronize_set_seq, synchronize_set_set, SyncMode};

pub use packed::{decode_seqset, encode_seqset};
pub use wkt::{format_temporal, parse_temporal};

pub use tempo_types::bbox::{SpatialExtent, TBox};
pub use tempo_types::period::Period;
pub use tempo_types::period_set::PeriodSet;
pub use tempo_types::time::{Interval, Timestamp};
pub use tempo_types::value::{Interpolation, NumSpan, PointValue, TempType, Value};

pub use geo::Point;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Result, TemporalError};

    pub use crate::{Subtype, Temporal, TInstant, TSequence, TSequenceSet};

    pub use crate::{format_temporal, parse_temporal};

    pub use crate::{synchronize_set_set, SyncMode};

    pub use crate::{decode_seqset, encode_seqset};

    pub use crate::{Interpolation, NumSpan, PointValue, TempType, Value};

    pub use crate::{Interval, Period, PeriodSet, Timestamp};

    pub use geo::Point;
}
