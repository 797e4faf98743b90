//! # tempo-types
//!
//! Time and base-value primitives for the `tempo` temporal-value library.
//!
//! This crate provides the leaf types the temporal engine is built on:
//!
//! - **Time**: `Timestamp` (64-bit microsecond epoch) and `Interval`
//! - **Periods**: `Period` (a span with inclusive/exclusive bounds) and
//!   `PeriodSet` (an ordered set of disjoint periods)
//! - **Values**: `Value` (boolean, integer, float, text, 2D/3D point),
//!   the `TempType` tag and its read-only catalog, and `NumSpan`
//! - **Bounding boxes**: `TBox` combining a period with a numeric span or
//!   a spatial extent
//!
//! All types are serializable with Serde; point values are built on the
//! `geo` crate's primitives.
//!
//! ## Examples
//!
//! ```rust
//! use tempo_types::period::Period;
//! use tempo_types::time::Timestamp;
//!
//! let p = Period::new(
//!     Timestamp::from_micros(0),
//!     Timestamp::from_micros(10),
//!     true,
//!     false,
//! )
//! .unwrap();
//! assert!(p.contains(Timestamp::from_micros(0)));
//! assert!(!p.contains(Timestamp::from_micros(10)));
//! ```

pub mod bbox;
pub mod period;
pub mod period_set;
pub mod time;
pub mod value;

pub use bbox::{SpatialExtent, TBox};
pub use period::Period;
pub use period_set::PeriodSet;
pub use time::{Interval, Timestamp};
pub use value::{Interpolation, NumSpan, PointValue, TempType, TypeInfo, Value};
