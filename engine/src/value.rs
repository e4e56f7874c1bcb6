//! Scalar values stored in synchronized collections.
//!
//! [`Value`] is the tagged union every list and set element is stored as.
//! Equality and hashing are structural over `(tag, payload)`, so `Int(1)` and
//! `Double(1.0)` are different values and `Null` is a value like any other.

use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use uuid::Uuid;

use crate::{error::Result, Error};

/// Element type of a collection property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    Int,
    Bool,
    String,
    Data,
    Date,
    Double,
    ObjectId,
    Decimal,
    Uuid,
    /// Dynamically typed; accepts any value including null
    Any,
}

impl ValueType {
    /// Every element type, in schema order.
    pub const ALL: [ValueType; 10] = [
        ValueType::Int,
        ValueType::Bool,
        ValueType::String,
        ValueType::Data,
        ValueType::Date,
        ValueType::Double,
        ValueType::ObjectId,
        ValueType::Decimal,
        ValueType::Uuid,
        ValueType::Any,
    ];

    /// Name used as the property name prefix (`intList`, `objectIdSet`, ...).
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Bool => "bool",
            ValueType::String => "string",
            ValueType::Data => "data",
            ValueType::Date => "date",
            ValueType::Double => "double",
            ValueType::ObjectId => "objectId",
            ValueType::Decimal => "decimal",
            ValueType::Uuid => "uuid",
            ValueType::Any => "any",
        }
    }

    /// Check whether `value` may be stored in a collection of this type.
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ValueType::Any, _)
                | (ValueType::Int, Value::Int(_))
                | (ValueType::Bool, Value::Bool(_))
                | (ValueType::String, Value::String(_))
                | (ValueType::Data, Value::Data(_))
                | (ValueType::Date, Value::Date(_))
                | (ValueType::Double, Value::Double(_))
                | (ValueType::ObjectId, Value::ObjectId(_))
                | (ValueType::Decimal, Value::Decimal(_))
                | (ValueType::Uuid, Value::Uuid(_))
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single collection element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Value {
    Null,
    Int(i64),
    Bool(bool),
    String(String),
    Data(#[serde(with = "base64_bytes")] Vec<u8>),
    Date(DateTime<Utc>),
    Double(f64),
    ObjectId(ObjectId),
    Decimal(Decimal128),
    Uuid(Uuid),
}

impl Value {
    /// Short type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Data(_) => "data",
            Value::Date(_) => "date",
            Value::Double(_) => "double",
            Value::ObjectId(_) => "objectId",
            Value::Decimal(_) => "decimal",
            Value::Uuid(_) => "uuid",
        }
    }

    /// Whether this is the null variant.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn tag(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int(_) => 1,
            Value::Bool(_) => 2,
            Value::String(_) => 3,
            Value::Data(_) => 4,
            Value::Date(_) => 5,
            Value::Double(_) => 6,
            Value::ObjectId(_) => 7,
            Value::Decimal(_) => 8,
            Value::Uuid(_) => 9,
        }
    }
}

/// Bit pattern used for double equality: `-0.0 == 0.0` and all NaNs are equal,
/// which keeps `Eq` reflexive and `Hash` consistent with it.
fn canonical_bits(d: f64) -> u64 {
    if d == 0.0 {
        0
    } else if d.is_nan() {
        f64::NAN.to_bits()
    } else {
        d.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Data(a), Value::Data(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => canonical_bits(*a) == canonical_bits(*b),
            (Value::ObjectId(a), Value::ObjectId(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag().hash(state);
        match self {
            Value::Null => {}
            Value::Int(v) => v.hash(state),
            Value::Bool(v) => v.hash(state),
            Value::String(v) => v.hash(state),
            Value::Data(v) => v.hash(state),
            Value::Date(v) => v.hash(state),
            Value::Double(v) => canonical_bits(*v).hash(state),
            Value::ObjectId(v) => v.hash(state),
            Value::Decimal(v) => v.hash(state),
            Value::Uuid(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::Data(v) => write!(f, "<{} bytes>", v.len()),
            Value::Date(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Double(v) => write!(f, "{v}"),
            Value::ObjectId(v) => write!(f, "ObjectId({v})"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Uuid(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Data(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Date(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::ObjectId(v)
    }
}

impl From<Decimal128> for Value {
    fn from(v: Decimal128) -> Self {
        Value::Decimal(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A 12-byte object identifier, written as 24 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| Error::MalformedOperation(format!("invalid object id '{s}': {e}")))?;
        let bytes: [u8; 12] = bytes.try_into().map_err(|_| {
            Error::MalformedOperation(format!("object id '{s}' must be 12 bytes"))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Largest coefficient a decimal may carry (34 significant digits).
const MAX_COEFFICIENT: u128 = 9_999_999_999_999_999_999_999_999_999_999_999;
const MAX_DIGITS: usize = 34;

/// Exponent range of IEEE 754 decimal128.
const MIN_EXPONENT: i32 = -6176;
const MAX_EXPONENT: i32 = 6111;

/// A 128-bit decimal: `coefficient * 10^exponent`.
///
/// Always stored normalized (no trailing zeros in the coefficient while the
/// exponent allows it), so `1.50` and `1.5` are the same value and hash
/// identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal128 {
    coefficient: i128,
    exponent: i32,
}

impl Decimal128 {
    /// Build from a coefficient and exponent, normalizing trailing zeros.
    pub fn new(coefficient: i128, exponent: i32) -> Result<Self> {
        if coefficient.unsigned_abs() > MAX_COEFFICIENT {
            return Err(Error::MalformedOperation(format!(
                "decimal coefficient {coefficient} exceeds 34 digits"
            )));
        }
        let d = Self::normalized(coefficient, exponent);
        if !(MIN_EXPONENT..=MAX_EXPONENT).contains(&d.exponent) {
            return Err(Error::MalformedOperation(format!(
                "decimal exponent {exponent} is outside {MIN_EXPONENT}..={MAX_EXPONENT}"
            )));
        }
        Ok(d)
    }

    fn normalized(mut coefficient: i128, mut exponent: i32) -> Self {
        if coefficient == 0 {
            return Self {
                coefficient,
                exponent: 0,
            };
        }
        while exponent < MAX_EXPONENT && coefficient % 10 == 0 {
            coefficient /= 10;
            exponent += 1;
        }
        Self {
            coefficient,
            exponent,
        }
    }

    pub fn coefficient(&self) -> i128 {
        self.coefficient
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }
}

impl From<i64> for Decimal128 {
    fn from(v: i64) -> Self {
        Self::normalized(v.into(), 0)
    }
}

impl FromStr for Decimal128 {
    type Err = Error;

    /// Accepts plain (`-12.5`) and exponent (`1.25E+3`) notation.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::MalformedOperation(format!("invalid decimal '{s}'"));
        let (negative, unsigned) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (mantissa, exp) = match unsigned.split_once(['e', 'E']) {
            Some((mantissa, exp)) => (mantissa, exp.parse::<i32>().map_err(|_| invalid())?),
            None => (unsigned, 0),
        };
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let digits = format!("{int_part}{frac_part}");
        let trimmed = digits.trim_end_matches('0');
        let mut exponent = i64::from(exp) - frac_part.len() as i64
            + (digits.len() - trimmed.len()) as i64;
        let significant = trimmed.trim_start_matches('0');
        if significant.is_empty() {
            return Ok(Self::normalized(0, 0));
        }
        if significant.len() > MAX_DIGITS {
            return Err(Error::MalformedOperation(format!(
                "decimal '{s}' has more than 34 significant digits"
            )));
        }

        let mut coefficient: i128 = significant.parse().map_err(|_| invalid())?;
        // An exponent above the range may still fit by padding the coefficient.
        while exponent > i64::from(MAX_EXPONENT)
            && coefficient.unsigned_abs() * 10 <= MAX_COEFFICIENT
        {
            coefficient *= 10;
            exponent -= 1;
        }
        if negative {
            coefficient = -coefficient;
        }
        let exponent = i32::try_from(exponent).map_err(|_| invalid())?;
        Self::new(coefficient, exponent)
    }
}

impl fmt::Display for Decimal128 {
    /// Plain notation when the value has at most 34 integer digits and no
    /// more than 6 leading fractional zeros; exponent notation otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.coefficient < 0 { "-" } else { "" };
        let digits = self.coefficient.unsigned_abs().to_string();
        let exponent = i64::from(self.exponent);
        let adjusted = exponent + digits.len() as i64 - 1;

        if exponent >= 0 && adjusted < MAX_DIGITS as i64 {
            return write!(f, "{sign}{digits}{}", "0".repeat(exponent as usize));
        }
        if exponent < 0 && adjusted >= -7 {
            let scale = exponent.unsigned_abs() as usize;
            return if digits.len() > scale {
                let (int_part, frac_part) = digits.split_at(digits.len() - scale);
                write!(f, "{sign}{int_part}.{frac_part}")
            } else {
                write!(f, "{sign}0.{}{digits}", "0".repeat(scale - digits.len()))
            };
        }

        let (lead, rest) = digits.split_at(1);
        let point = if rest.is_empty() { "" } else { "." };
        write!(f, "{sign}{lead}{point}{rest}E{adjusted:+}")
    }
}

impl Serialize for Decimal128 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Decimal128 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

mod base64_bytes {
    use super::BASE64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        BASE64.decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn structural_equality_includes_tag() {
        assert_ne!(Value::Int(1), Value::Double(1.0));
        assert_ne!(Value::Null, Value::Int(0));
        assert_eq!(Value::Null, Value::Null);
        assert_eq!(Value::from("Hey"), Value::String("Hey".into()));
    }

    #[test]
    fn doubles_are_reflexive() {
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_eq!(Value::Double(-0.0), Value::Double(0.0));

        let mut set = HashSet::new();
        set.insert(Value::Double(-0.0));
        assert!(set.contains(&Value::Double(0.0)));
    }

    #[test]
    fn null_hashes_as_a_value() {
        let set: HashSet<Value> = [Value::Null, Value::from(12345), Value::from("Hello")]
            .into_iter()
            .collect();
        assert!(set.contains(&Value::Null));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn value_type_accepts() {
        assert!(ValueType::Int.accepts(&Value::Int(3)));
        assert!(!ValueType::Int.accepts(&Value::Null));
        assert!(!ValueType::String.accepts(&Value::Int(3)));
        assert!(ValueType::Any.accepts(&Value::Null));
        assert!(ValueType::Any.accepts(&Value::Double(123.456)));
    }

    #[test]
    fn object_id_hex_roundtrip() {
        let oid: ObjectId = "6058f12b957ba06156586a7c".parse().unwrap();
        assert_eq!(oid.to_string(), "6058f12b957ba06156586a7c");
        assert!("6058f12b".parse::<ObjectId>().is_err());
        assert!("zz58f12b957ba06156586a7c".parse::<ObjectId>().is_err());
    }

    #[test]
    fn decimal_parse_and_normalize() {
        let d: Decimal128 = "123.345".parse().unwrap();
        assert_eq!(d.coefficient(), 123345);
        assert_eq!(d.exponent(), -3);
        assert_eq!(d.to_string(), "123.345");

        let a: Decimal128 = "1.50".parse().unwrap();
        let b: Decimal128 = "1.5".parse().unwrap();
        assert_eq!(a, b);

        assert_eq!("-0.05".parse::<Decimal128>().unwrap().to_string(), "-0.05");
        assert_eq!("0.000".parse::<Decimal128>().unwrap().to_string(), "0");
        assert_eq!(Decimal128::from(42).to_string(), "42");
        assert!("12a.3".parse::<Decimal128>().is_err());
        assert!(".".parse::<Decimal128>().is_err());
    }

    #[test]
    fn decimal_exponent_notation() {
        let big: Decimal128 = "1E+40".parse().unwrap();
        assert_eq!((big.coefficient(), big.exponent()), (1, 40));
        assert_eq!(big.to_string(), "1E+40");
        assert_eq!(big.to_string().parse::<Decimal128>().unwrap(), big);

        let tiny: Decimal128 = "-2.5e-30".parse().unwrap();
        assert_eq!((tiny.coefficient(), tiny.exponent()), (-25, -31));
        assert_eq!(tiny.to_string(), "-2.5E-30");

        assert_eq!("1.25E+3".parse::<Decimal128>().unwrap().to_string(), "1250");
        assert_eq!(Decimal128::from(1500), "1500".parse().unwrap());
        assert_eq!(Decimal128::from(1500).to_string(), "1500");
        assert_eq!("1".repeat(40).parse::<Decimal128>().ok(), None);
        assert!("1E+6112".parse::<Decimal128>().is_ok());
        assert!("1E+6200".parse::<Decimal128>().is_err());
        assert!("1E-6200".parse::<Decimal128>().is_err());
        assert!("1E".parse::<Decimal128>().is_err());
    }

    #[test]
    fn decimal_rejects_out_of_range_coefficients() {
        assert!(Decimal128::new(i128::MIN, 0).is_err());
        assert!(Decimal128::new(i128::MAX, 0).is_err());
        assert!(Decimal128::new(-(10i128.pow(34) - 1), 0).is_ok());
        assert!(Decimal128::new(1, MAX_EXPONENT + 1).is_err());
        assert!(Decimal128::new(1, MIN_EXPONENT - 1).is_err());
        assert_eq!(Decimal128::new(100, MIN_EXPONENT - 2).unwrap().exponent(), MIN_EXPONENT);
    }

    #[test]
    fn decimal_rejects_more_than_34_digits() {
        let too_long = "1".repeat(35);
        assert!(too_long.parse::<Decimal128>().is_err());
        assert!("9".repeat(34).parse::<Decimal128>().is_ok());
    }

    #[test]
    fn serialization_format() {
        let json = serde_json::to_string(&Value::Int(7)).unwrap();
        assert_eq!(json, r#"{"type":"int","value":7}"#);

        let json = serde_json::to_string(&Value::Null).unwrap();
        assert_eq!(json, r#"{"type":"null"}"#);

        let json = serde_json::to_string(&Value::Data(vec![1, 2, 3])).unwrap();
        assert_eq!(json, r#"{"type":"data","value":"AQID"}"#);

        let oid: ObjectId = "6058f12682b2fbb1f334ef1d".parse().unwrap();
        let json = serde_json::to_string(&Value::ObjectId(oid)).unwrap();
        assert_eq!(json, r#"{"type":"objectId","value":"6058f12682b2fbb1f334ef1d"}"#);
    }

    #[test]
    fn large_data_survives_json() {
        let blob = Value::Data(vec![0u8; 1024 * 1024]);
        let json = serde_json::to_string(&blob).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(blob, parsed);
    }
}
