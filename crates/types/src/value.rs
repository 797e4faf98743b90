//! Base values, the temporal type catalog, and interpolation arithmetic.

use geo::Point;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Tolerance used when comparing interpolated coordinates.
pub const EPSILON: f64 = 1e-12;

/// Tag identifying the base domain of a temporal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempType {
    Bool,
    Int,
    Float,
    Text,
    GeomPoint,
    GeogPoint,
}

/// Catalog metadata for one temporal type.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub temptype: TempType,
    /// Name of the base domain, as used in diagnostics.
    pub base_type: &'static str,
    /// Whether the type admits linear interpolation.
    pub continuous: bool,
    /// Whether bounding boxes carry a numeric value span.
    pub has_span: bool,
    /// Whether bounding boxes carry a spatial extent.
    pub spatial: bool,
}

/// The read-only type catalog, fixed at compile time.
pub const CATALOG: [TypeInfo; 6] = [
    TypeInfo {
        temptype: TempType::Bool,
        base_type: "bool",
        continuous: false,
        has_span: false,
        spatial: false,
    },
    TypeInfo {
        temptype: TempType::Int,
        base_type: "int",
        continuous: false,
        has_span: true,
        spatial: false,
    },
    TypeInfo {
        temptype: TempType::Float,
        base_type: "float",
        continuous: true,
        has_span: true,
        spatial: false,
    },
    TypeInfo {
        temptype: TempType::Text,
        base_type: "text",
        continuous: false,
        has_span: false,
        spatial: false,
    },
    TypeInfo {
        temptype: TempType::GeomPoint,
        base_type: "geometry",
        continuous: true,
        has_span: false,
        spatial: true,
    },
    TypeInfo {
        temptype: TempType::GeogPoint,
        base_type: "geography",
        continuous: true,
        has_span: false,
        spatial: true,
    },
];

impl TempType {
    pub fn info(self) -> &'static TypeInfo {
        match self {
            TempType::Bool => &CATALOG[0],
            TempType::Int => &CATALOG[1],
            TempType::Float => &CATALOG[2],
            TempType::Text => &CATALOG[3],
            TempType::GeomPoint => &CATALOG[4],
            TempType::GeogPoint => &CATALOG[5],
        }
    }

    pub fn is_continuous(self) -> bool {
        self.info().continuous
    }

    pub fn is_number(self) -> bool {
        self.info().has_span
    }

    pub fn is_point(self) -> bool {
        self.info().spatial
    }

    /// Interpolation assumed when none is declared.
    pub fn default_interpolation(self) -> Interpolation {
        if self.is_continuous() {
            Interpolation::Linear
        } else {
            Interpolation::Step
        }
    }
}

/// How a sequence's value evolves between samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Isolated samples; the value is undefined between them.
    Discrete,
    /// The value holds constant from one sample until the next.
    Step,
    /// The value varies linearly between consecutive samples.
    Linear,
}

impl Interpolation {
    pub fn is_continuous(self) -> bool {
        matches!(self, Interpolation::Step | Interpolation::Linear)
    }
}

/// A 2D or 3D point value, optionally geodetic, with a spatial reference id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PointValue {
    pub point: Point<f64>,
    pub z: Option<f64>,
    pub srid: i32,
    pub geodetic: bool,
}

impl PointValue {
    pub fn new(x: f64, y: f64) -> Self {
        PointValue {
            point: Point::new(x, y),
            z: None,
            srid: 0,
            geodetic: false,
        }
    }

    pub fn new_3d(x: f64, y: f64, z: f64) -> Self {
        PointValue {
            point: Point::new(x, y),
            z: Some(z),
            srid: 0,
            geodetic: false,
        }
    }

    pub fn with_srid(mut self, srid: i32) -> Self {
        self.srid = srid;
        self
    }

    pub fn geodetic(mut self) -> Self {
        self.geodetic = true;
        self
    }

    pub fn x(&self) -> f64 {
        self.point.x()
    }

    pub fn y(&self) -> f64 {
        self.point.y()
    }

    pub fn is_3d(&self) -> bool {
        self.z.is_some()
    }

    fn cmp_coords(&self, other: &PointValue) -> Ordering {
        self.x()
            .total_cmp(&other.x())
            .then_with(|| self.y().total_cmp(&other.y()))
            .then_with(|| match (self.z, other.z) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
            })
    }
}

/// A base value of one of the supported domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Point(PointValue),
}

impl Value {
    pub fn temptype(&self) -> TempType {
        match self {
            Value::Bool(_) => TempType::Bool,
            Value::Int(_) => TempType::Int,
            Value::Float(_) => TempType::Float,
            Value::Text(_) => TempType::Text,
            Value::Point(p) => {
                if p.geodetic {
                    TempType::GeogPoint
                } else {
                    TempType::GeomPoint
                }
            }
        }
    }

    /// Total order within one domain; values of different domains order by tag.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Point(a), Value::Point(b)) => a.cmp_coords(b),
            _ => self.tag_rank().cmp(&other.tag_rank()),
        }
    }

    fn tag_rank(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Int(_) => 1,
            Value::Float(_) => 2,
            Value::Text(_) => 3,
            Value::Point(_) => 4,
        }
    }

    /// Numeric reading of the value, defined for the number domains only.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Build a number value of the given domain from a double.
    pub fn from_double(d: f64, temptype: TempType) -> Option<Value> {
        match temptype {
            TempType::Int => Some(Value::Int(d as i64)),
            TempType::Float => Some(Value::Float(d)),
            _ => None,
        }
    }

    /// Linear interpolation at `ratio` in `[0, 1]` between two values of a
    /// continuous domain. Non-continuous domains return the start value.
    pub fn interpolate(&self, other: &Value, ratio: f64) -> Value {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => Value::Float(a + (b - a) * ratio),
            (Value::Point(a), Value::Point(b)) => {
                let z = match (a.z, b.z) {
                    (Some(za), Some(zb)) => Some(za + (zb - za) * ratio),
                    _ => None,
                };
                Value::Point(PointValue {
                    point: Point::new(
                        a.x() + (b.x() - a.x()) * ratio,
                        a.y() + (b.y() - a.y()) * ratio,
                    ),
                    z,
                    srid: a.srid,
                    geodetic: a.geodetic,
                })
            }
            _ => self.clone(),
        }
    }

    /// True when `mid` lies on the segment from `self` to `end` at `ratio`.
    pub fn is_collinear(&self, mid: &Value, end: &Value, ratio: f64) -> bool {
        match (self, mid, end) {
            (Value::Float(a), Value::Float(m), Value::Float(b)) => {
                (a + (b - a) * ratio - m).abs() <= EPSILON
            }
            (Value::Point(a), Value::Point(m), Value::Point(b)) => {
                let dx = (a.x() + (b.x() - a.x()) * ratio - m.x()).abs();
                let dy = (a.y() + (b.y() - a.y()) * ratio - m.y()).abs();
                let dz = match (a.z, m.z, b.z) {
                    (Some(za), Some(zm), Some(zb)) => (za + (zb - za) * ratio - zm).abs(),
                    _ => 0.0,
                };
                dx <= EPSILON && dy <= EPSILON && dz <= EPSILON
            }
            _ => false,
        }
    }

    /// Deterministic 32-bit structural hash.
    pub fn hash32(&self) -> u32 {
        match self {
            Value::Bool(b) => fnv1a(&[u8::from(*b)]),
            Value::Int(i) => fnv1a(&i.to_le_bytes()),
            Value::Float(f) => fnv1a(&f.to_bits().to_le_bytes()),
            Value::Text(s) => fnv1a(s.as_bytes()),
            Value::Point(p) => {
                let mut h = fnv1a(&p.x().to_bits().to_le_bytes());
                h ^= fnv1a(&p.y().to_bits().to_le_bytes()).rotate_left(11);
                if let Some(z) = p.z {
                    h ^= fnv1a(&z.to_bits().to_le_bytes()).rotate_left(22);
                }
                h
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.total_cmp(other) == Ordering::Equal
            && match (self, other) {
                (Value::Point(a), Value::Point(b)) => {
                    a.srid == b.srid && a.geodetic == b.geodetic
                }
                _ => true,
            }
    }
}

impl Eq for Value {}

fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c9dc5;
    for b in bytes {
        hash ^= u32::from(*b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", if *b { "t" } else { "f" }),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Value::Point(p) => match p.z {
                Some(z) => write!(f, "POINT Z ({} {} {})", p.x(), p.y(), z),
                None => write!(f, "POINT({} {})", p.x(), p.y()),
            },
        }
    }
}

/// A span of numeric base values with inclusive or exclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumSpan {
    pub lower: f64,
    pub upper: f64,
    pub lower_inc: bool,
    pub upper_inc: bool,
}

impl NumSpan {
    pub fn new(lower: f64, upper: f64, lower_inc: bool, upper_inc: bool) -> Result<Self, String> {
        if lower > upper || (lower == upper && !(lower_inc && upper_inc)) {
            return Err(format!("invalid numeric span [{lower}, {upper}]"));
        }
        Ok(NumSpan {
            lower,
            upper,
            lower_inc,
            upper_inc,
        })
    }

    pub fn inclusive(lower: f64, upper: f64) -> Result<Self, String> {
        NumSpan::new(lower, upper, true, true)
    }

    pub fn contains(&self, v: f64) -> bool {
        (v > self.lower || (v == self.lower && self.lower_inc))
            && (v < self.upper || (v == self.upper && self.upper_inc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_flags() {
        assert!(TempType::Float.is_continuous());
        assert!(!TempType::Int.is_continuous());
        assert!(TempType::Int.is_number());
        assert!(TempType::GeogPoint.is_point());
        assert!(!TempType::Text.is_number());
        assert_eq!(TempType::Bool.default_interpolation(), Interpolation::Step);
        assert_eq!(
            TempType::Float.default_interpolation(),
            Interpolation::Linear
        );
        for info in &CATALOG {
            assert_eq!(info.temptype.info().base_type, info.base_type);
        }
    }

    #[test]
    fn test_value_temptype() {
        assert_eq!(Value::Bool(true).temptype(), TempType::Bool);
        assert_eq!(
            Value::Point(PointValue::new(1.0, 2.0)).temptype(),
            TempType::GeomPoint
        );
        assert_eq!(
            Value::Point(PointValue::new(1.0, 2.0).geodetic()).temptype(),
            TempType::GeogPoint
        );
    }

    #[test]
    fn test_total_cmp_and_eq() {
        assert_eq!(
            Value::Float(1.0).total_cmp(&Value::Float(2.0)),
            Ordering::Less
        );
        assert_eq!(Value::Text("a".into()), Value::Text("a".into()));
        assert_ne!(Value::Int(1), Value::Int(2));
        // Points with different SRIDs are distinct even at equal coordinates.
        let a = Value::Point(PointValue::new(1.0, 2.0).with_srid(4326));
        let b = Value::Point(PointValue::new(1.0, 2.0));
        assert_ne!(a, b);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let v = Value::Float(0.0).interpolate(&Value::Float(10.0), 0.5);
        assert_eq!(v, Value::Float(5.0));

        let p = Value::Point(PointValue::new_3d(0.0, 0.0, 0.0))
            .interpolate(&Value::Point(PointValue::new_3d(2.0, 4.0, 6.0)), 0.5);
        match p {
            Value::Point(p) => {
                assert_eq!(p.x(), 1.0);
                assert_eq!(p.y(), 2.0);
                assert_eq!(p.z, Some(3.0));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_collinear() {
        let a = Value::Float(0.0);
        let m = Value::Float(5.0);
        let b = Value::Float(10.0);
        assert!(a.is_collinear(&m, &b, 0.5));
        assert!(!a.is_collinear(&Value::Float(5.1), &b, 0.5));
        // Step-only domains are never collinear.
        assert!(!Value::Int(0).is_collinear(&Value::Int(5), &Value::Int(10), 0.5));
    }

    #[test]
    fn test_hash32_stability() {
        assert_eq!(Value::Int(42).hash32(), Value::Int(42).hash32());
        assert_ne!(Value::Int(42).hash32(), Value::Int(43).hash32());
        assert_ne!(
            Value::Text("ab".into()).hash32(),
            Value::Text("ba".into()).hash32()
        );
    }

    #[test]
    fn test_num_span_contains() {
        let s = NumSpan::new(1.0, 2.0, true, false).unwrap();
        assert!(s.contains(1.0));
        assert!(s.contains(1.5));
        assert!(!s.contains(2.0));
        assert!(NumSpan::new(2.0, 1.0, true, true).is_err());
    }
}
