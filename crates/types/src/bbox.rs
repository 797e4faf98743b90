//! Bounding boxes: per-type summaries combining a period with a value extent.

use crate::period::Period;
use crate::value::{PointValue, Value};
use serde::{Deserialize, Serialize};

/// An axis-aligned spatial extent, optionally carrying a z range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialExtent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub min_z: Option<f64>,
    pub max_z: Option<f64>,
}

impl SpatialExtent {
    pub fn from_point(p: &PointValue) -> Self {
        SpatialExtent {
            min_x: p.x(),
            min_y: p.y(),
            max_x: p.x(),
            max_y: p.y(),
            min_z: p.z,
            max_z: p.z,
        }
    }

    pub fn union(&self, other: &SpatialExtent) -> SpatialExtent {
        SpatialExtent {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
            min_z: merge_z(self.min_z, other.min_z, f64::min),
            max_z: merge_z(self.max_z, other.max_z, f64::max),
        }
    }

    pub fn expand_point(&mut self, p: &PointValue) {
        *self = self.union(&SpatialExtent::from_point(p));
    }

    pub fn intersects(&self, other: &SpatialExtent) -> bool {
        !(self.max_x < other.min_x
            || self.min_x > other.max_x
            || self.max_y < other.min_y
            || self.min_y > other.max_y)
    }
}

fn merge_z(a: Option<f64>, b: Option<f64>, pick: fn(f64, f64) -> f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

/// Bounding box of a temporal value.
///
/// Every box carries the bounding period; numbers add the value span, points
/// add the spatial extent. Boxes form a monoid under `union`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TBox {
    pub period: Period,
    /// Numeric value span `(min, max)`, number domains only.
    pub span: Option<(f64, f64)>,
    /// Spatial extent, point domains only.
    pub extent: Option<SpatialExtent>,
}

impl TBox {
    pub fn from_period(period: Period) -> Self {
        TBox {
            period,
            span: None,
            extent: None,
        }
    }

    /// Box of a single (timestamp, value) sample.
    pub fn from_value(period: Period, value: &Value) -> Self {
        let mut bbox = TBox::from_period(period);
        match value {
            Value::Int(_) | Value::Float(_) => {
                let d = value.as_double().expect("number domain");
                bbox.span = Some((d, d));
            }
            Value::Point(p) => bbox.extent = Some(SpatialExtent::from_point(p)),
            _ => {}
        }
        bbox
    }

    pub fn union(&self, other: &TBox) -> TBox {
        TBox {
            period: self.period.bounding_union(&other.period),
            span: match (self.span, other.span) {
                (Some((a, b)), Some((c, d))) => Some((a.min(c), b.max(d))),
                (s, None) => s,
                (None, s) => s,
            },
            extent: match (&self.extent, &other.extent) {
                (Some(a), Some(b)) => Some(a.union(b)),
                (Some(a), None) => Some(*a),
                (None, e) => *e,
            },
        }
    }

    /// Widen the box to cover one more sample without touching the period.
    pub fn expand_value(&mut self, value: &Value) {
        match value {
            Value::Int(_) | Value::Float(_) => {
                let d = value.as_double().expect("number domain");
                self.span = Some(match self.span {
                    Some((lo, hi)) => (lo.min(d), hi.max(d)),
                    None => (d, d),
                });
            }
            Value::Point(p) => match &mut self.extent {
                Some(extent) => extent.expand_point(p),
                None => self.extent = Some(SpatialExtent::from_point(p)),
            },
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Timestamp;

    fn period(lo: i64, hi: i64) -> Period {
        Period::new(
            Timestamp::from_micros(lo),
            Timestamp::from_micros(hi),
            true,
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_from_value_number() {
        let b = TBox::from_value(period(0, 10), &Value::Int(7));
        assert_eq!(b.span, Some((7.0, 7.0)));
        assert!(b.extent.is_none());
    }

    #[test]
    fn test_from_value_text_has_period_only() {
        let b = TBox::from_value(period(0, 10), &Value::Text("x".into()));
        assert!(b.span.is_none());
        assert!(b.extent.is_none());
    }

    #[test]
    fn test_union_is_monoidal() {
        let a = TBox::from_value(period(0, 10), &Value::Float(1.0));
        let b = TBox::from_value(period(20, 30), &Value::Float(5.0));
        let u = a.union(&b);
        assert_eq!(u.span, Some((1.0, 5.0)));
        assert_eq!(u.period.lower, Timestamp::from_micros(0));
        assert_eq!(u.period.upper, Timestamp::from_micros(30));
        // Union with itself is the identity.
        assert_eq!(u.union(&u), u);
    }

    #[test]
    fn test_expand_value() {
        let mut b = TBox::from_value(period(0, 10), &Value::Float(2.0));
        b.expand_value(&Value::Float(-1.0));
        assert_eq!(b.span, Some((-1.0, 2.0)));
    }

    #[test]
    fn test_extent_union_3d() {
        let a = SpatialExtent::from_point(&PointValue::new_3d(0.0, 0.0, 5.0));
        let b = SpatialExtent::from_point(&PointValue::new(2.0, -1.0));
        let u = a.union(&b);
        assert_eq!(u.min_y, -1.0);
        assert_eq!(u.max_x, 2.0);
        assert_eq!(u.min_z, Some(5.0));
        assert!(a.intersects(&u));
    }
}
