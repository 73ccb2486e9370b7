//! Runtime values produced by the evaluator.

use std::cmp::Ordering;
use std::fmt;
use std::net::IpAddr;

use pcapql_core::FieldValue;

/// A value computed from a packet or a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing field or undefined result.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Inclusive range built by `lo to hi`.
    Range(Box<Value>, Box<Value>),
    /// The `*` marker; equal to anything.
    Any,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness used for filter results.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::Range(..) | Value::Any => true,
        }
    }

    /// Integer coercion. Bytes are read big-endian (at most 8).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.is_finite() => Some(*f as i64),
            Value::Bytes(b) if !b.is_empty() && b.len() <= 8 => {
                Some(b.iter().fold(0i64, |acc, &x| (acc << 8) | x as i64))
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            other => other.as_i64().map(|i| i as f64),
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Value::Bool(_) | Value::Int(_) | Value::Float(_))
    }

    /// Equality with numeric coercion across int, float and bytes.
    /// `None` when either side is Null.
    pub fn loose_eq(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Any, _) | (_, Value::Any) => Some(true),
            (Value::Str(a), Value::Str(b)) => Some(a == b),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a == b),
            (Value::Range(lo, hi), v) | (v, Value::Range(lo, hi)) => v.within(lo, hi),
            (a, b) if a.is_numeric() || b.is_numeric() => {
                match (a, b) {
                    (Value::Float(_), _) | (_, Value::Float(_)) => {
                        Some(a.as_f64()? == b.as_f64()?)
                    }
                    _ => Some(a.as_i64()? == b.as_i64()?),
                }
            }
            _ => Some(false),
        }
    }

    /// Ordering for `< <= > >=`. `None` when either side is Null or the
    /// values are not comparable.
    pub fn partial_compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Float(_), _) | (_, Value::Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            _ => Some(self.as_i64()?.cmp(&other.as_i64()?)),
        }
    }

    /// Inclusive bounds test.
    pub fn within(&self, lo: &Value, hi: &Value) -> Option<bool> {
        let above = self.partial_compare(lo)? != Ordering::Less;
        let below = self.partial_compare(hi)? != Ordering::Greater;
        Some(above && below)
    }

    /// Total order used for sorting and group keys.
    ///
    /// Null sorts first, then booleans, numbers, strings, bytes, ranges.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Int(_) | Value::Float(_) => 2,
                Value::Str(_) => 3,
                Value::Bytes(_) => 4,
                Value::Range(..) => 5,
                Value::Any => 6,
            }
        }

        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let a = self.as_f64().unwrap_or(f64::NAN);
                let b = other.as_f64().unwrap_or(f64::NAN);
                a.total_cmp(&b)
            }
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Range(a_lo, a_hi), Value::Range(b_lo, b_hi)) => a_lo
                .total_cmp(b_lo)
                .then_with(|| a_hi.total_cmp(b_hi)),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl From<FieldValue<'_>> for Value {
    fn from(value: FieldValue<'_>) -> Self {
        match value {
            FieldValue::UInt8(v) => Value::Int(v as i64),
            FieldValue::UInt16(v) => Value::Int(v as i64),
            FieldValue::UInt32(v) => Value::Int(v as i64),
            FieldValue::UInt64(v) => i64::try_from(v).map_or(Value::Float(v as f64), Value::Int),
            FieldValue::Int64(v) => Value::Int(v),
            FieldValue::Bool(b) => Value::Bool(b),
            // IPv4 compares as a 32-bit integer; IPv6 keeps its text form
            FieldValue::IpAddr(IpAddr::V4(addr)) => Value::Int(u32::from(addr) as i64),
            FieldValue::IpAddr(IpAddr::V6(addr)) => Value::Str(addr.to_string()),
            mac @ FieldValue::MacAddr(_) => mac
                .as_mac_u64()
                .map_or(Value::Null, |m| Value::Int(m as i64)),
            FieldValue::Str(s) => Value::Str(s.to_string()),
            FieldValue::OwnedString(s) => Value::Str(s.to_string()),
            FieldValue::Bytes(b) => Value::Bytes(b.to_vec()),
            FieldValue::OwnedBytes(b) => Value::Bytes(b),
            FieldValue::Null => Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
            Value::Bytes(bytes) => {
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Value::Range(lo, hi) => write!(f, "{lo} to {hi}"),
            Value::Any => f.write_str("*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::Int(3).loose_eq(&Value::Float(3.0)), Some(true));
        assert_eq!(Value::Bytes(vec![0x01, 0xbb]).loose_eq(&Value::Int(443)), Some(true));
        assert_eq!(Value::Bool(true).loose_eq(&Value::Int(1)), Some(true));
        assert_eq!(Value::Str("a".into()).loose_eq(&Value::Int(1)), None);
        assert_eq!(Value::Str("a".into()).loose_eq(&Value::Str("a".into())), Some(true));
    }

    #[test]
    fn test_null_never_compares() {
        assert_eq!(Value::Null.loose_eq(&Value::Null), None);
        assert_eq!(Value::Null.partial_compare(&Value::Int(1)), None);
        assert!(!Value::Null.is_truthy());
    }

    #[test]
    fn test_ranges() {
        let range = Value::Range(Box::new(Value::Int(10)), Box::new(Value::Int(20)));
        assert_eq!(Value::Int(10).loose_eq(&range), Some(true));
        assert_eq!(Value::Int(20).loose_eq(&range), Some(true));
        assert_eq!(Value::Int(21).loose_eq(&range), Some(false));
        assert_eq!(Value::Float(15.5).within(&Value::Int(10), &Value::Int(20)), Some(true));
    }

    #[test]
    fn test_total_order() {
        let mut values = vec![
            Value::Str("b".into()),
            Value::Int(5),
            Value::Null,
            Value::Float(2.5),
            Value::Str("a".into()),
        ];
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Float(2.5),
                Value::Int(5),
                Value::Str("a".into()),
                Value::Str("b".into()),
            ]
        );
    }

    #[test]
    fn test_from_field_value() {
        assert_eq!(
            Value::from(FieldValue::ipv4(&[192, 168, 1, 1])),
            Value::Int(0xC0A8_0101)
        );
        assert_eq!(
            Value::from(FieldValue::mac(&[0, 0x11, 0x22, 0x33, 0x44, 0x55])),
            Value::Int(0x0011_2233_4455)
        );
        assert_eq!(Value::from(FieldValue::UInt16(443)), Value::Int(443));
        assert_eq!(Value::from(FieldValue::Null), Value::Null);
    }
}
