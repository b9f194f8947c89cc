//! Coercion of raw scalars into declared primitive types.
//!
//! A declared attribute type is a guarantee, not a parsing hint: a value is
//! converted to the target type and the result must still compare equal to
//! the original, otherwise the conversion lost information and is rejected.

use super::value::Value;
use crate::error::ErrorKind;
use crate::schema::Primitive;
use std::fmt;

/// Converts `value` to `target`.
///
/// A value equal to `default` passes through untouched, so a `null` default
/// type-checks against attributes that cannot represent `null`.
pub fn coerce(value: &Value, target: Primitive, default: Option<&Value>) -> Result<Value, ErrorKind> {
    if default == Some(value) || target.accepts(value) {
        return Ok(value.clone());
    }

    let coerced = construct(value, target).ok_or_else(|| ErrorKind::coercion_failure(value, target))?;
    if !loosely_equal(&coerced, value) {
        return Err(ErrorKind::coercion_mismatch(value, &coerced));
    }
    Ok(coerced)
}

fn construct(value: &Value, target: Primitive) -> Option<Value> {
    match target {
        Primitive::Str => match value {
            Value::Ref(_) => None,
            other => Some(Value::String(other.to_string())),
        },
        Primitive::Int => match value {
            Value::Bool(b) => Some(Value::Int(i64::from(*b))),
            Value::Float(f) if f.is_finite() && f.abs() < 9.2e18 => Some(Value::Int(f.trunc() as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::Int),
            _ => None,
        },
        Primitive::Float => match value {
            Value::Bool(b) => Some(Value::Float(if *b { 1.0 } else { 0.0 })),
            Value::Int(i) => Some(Value::Float(*i as f64)),
            Value::String(s) => s.trim().parse::<f64>().ok().map(Value::Float),
            _ => None,
        },
        Primitive::Bool => match value {
            Value::Null => Some(Value::Bool(false)),
            Value::Int(i) => Some(Value::Bool(*i != 0)),
            Value::Float(f) => Some(Value::Bool(*f != 0.0)),
            Value::String(s) => Some(Value::Bool(!s.is_empty())),
            Value::List(items) => Some(Value::Bool(!items.is_empty())),
            Value::Map(pairs) => Some(Value::Bool(!pairs.is_empty())),
            _ => None,
        },
    }
}

/// Equality across numeric kinds: `1 == 1.0` and `true == 1`.
///
/// Strings never equal numbers, so `"5"` and `5` differ.
pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    fn numeric(v: &Value) -> Option<f64> {
        match v {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| loosely_equal(p, q))
        }
        (Value::Map(x), Value::Map(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .zip(y)
                    .all(|((k1, v1), (k2, v2))| loosely_equal(k1, k2) && loosely_equal(v1, v2))
        }
        _ => match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

/// A Rust type that stands for one [`Primitive`].
pub trait ScalarType: Sized {
    const PRIMITIVE: Primitive;

    /// Extracts the value if it already has this type.
    fn from_value(value: &Value) -> Option<Self>;

    fn into_value(self) -> Value;
}

impl ScalarType for String {
    const PRIMITIVE: Primitive = Primitive::Str;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl ScalarType for i64 {
    const PRIMITIVE: Primitive = Primitive::Int;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }

    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl ScalarType for f64 {
    const PRIMITIVE: Primitive = Primitive::Float;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_float()
    }

    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl ScalarType for bool {
    const PRIMITIVE: Primitive = Primitive::Bool;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

/// Typed wraps a value that passed coercion to `T`.
#[derive(Debug, Clone, PartialEq)]
pub struct Typed<T: ScalarType>(T);

impl<T: ScalarType> Typed<T> {
    /// Coerces `value` to `T` under the lossless policy of [`coerce`].
    pub fn coerce(value: &Value) -> Result<Self, ErrorKind> {
        let coerced = coerce(value, T::PRIMITIVE, None)?;
        T::from_value(&coerced)
            .map(Typed)
            .ok_or_else(|| ErrorKind::coercion_failure(value, T::PRIMITIVE))
    }

    pub fn get(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn into_value(self) -> Value {
        self.0.into_value()
    }
}

impl<T: ScalarType + fmt::Display> fmt::Display for Typed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn is_mismatch(r: Result<Value, ErrorKind>) -> bool {
        matches!(r, Err(ErrorKind::CoercionMismatch { .. }))
    }

    fn is_failure(r: Result<Value, ErrorKind>) -> bool {
        matches!(r, Err(ErrorKind::CoercionFailure { .. }))
    }

    #[test]
    fn test_same_type_passes_through() {
        assert_eq!(coerce(&Value::Int(5), Primitive::Int, None), Ok(Value::Int(5)));
        assert_eq!(
            coerce(&Value::from("x"), Primitive::Str, None),
            Ok(Value::from("x"))
        );
    }

    #[test]
    fn test_lossless_conversions() {
        assert_eq!(coerce(&Value::Int(5), Primitive::Float, None), Ok(Value::Float(5.0)));
        assert_eq!(coerce(&Value::Float(12.0), Primitive::Int, None), Ok(Value::Int(12)));
        assert_eq!(coerce(&Value::Int(1), Primitive::Bool, None), Ok(Value::Bool(true)));
        assert_eq!(coerce(&Value::Int(0), Primitive::Bool, None), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_lossy_conversions_rejected() {
        assert!(is_mismatch(coerce(&Value::Float(12.12), Primitive::Int, None)));
        assert!(is_mismatch(coerce(&Value::from("5"), Primitive::Int, None)));
        assert!(is_mismatch(coerce(&Value::Int(5), Primitive::Str, None)));
        assert!(is_mismatch(coerce(&Value::Int(2), Primitive::Bool, None)));
        assert!(is_mismatch(coerce(&Value::Null, Primitive::Bool, None)));
    }

    #[test]
    fn test_construction_failures() {
        assert!(is_failure(coerce(&Value::Null, Primitive::Int, None)));
        assert!(is_failure(coerce(&Value::from("abc"), Primitive::Float, None)));
        assert!(is_failure(coerce(&Value::Float(f64::INFINITY), Primitive::Int, None)));
    }

    #[test]
    fn test_default_carve_out() {
        assert_eq!(
            coerce(&Value::Null, Primitive::Int, Some(&Value::Null)),
            Ok(Value::Null)
        );
        assert!(is_failure(coerce(&Value::Null, Primitive::Int, Some(&Value::Int(0)))));
    }

    #[test]
    fn test_loosely_equal() {
        assert!(loosely_equal(&Value::Int(1), &Value::Float(1.0)));
        assert!(loosely_equal(&Value::Bool(true), &Value::Int(1)));
        assert!(!loosely_equal(&Value::from("1"), &Value::Int(1)));
        assert!(loosely_equal(
            &Value::List(vec![Value::Int(2)]),
            &Value::List(vec![Value::Float(2.0)])
        ));
    }

    #[test]
    fn test_typed_wrapper() {
        let t = Typed::<f64>::coerce(&Value::Int(3)).unwrap();
        assert_eq!(*t.get(), 3.0);
        assert_eq!(t.into_value(), Value::Float(3.0));
        assert!(Typed::<i64>::coerce(&Value::from("3")).is_err());
        assert_eq!(Typed::<String>::coerce(&Value::from("a")).unwrap().to_string(), "a");
    }

    proptest! {
        #[test]
        fn prop_fractional_floats_never_become_ints(whole in -1_000_000i64..1_000_000, frac in 1u32..1000) {
            let f = whole as f64 + f64::from(frac) / 1000.0;
            prop_assert!(is_mismatch(coerce(&Value::Float(f), Primitive::Int, None)));
        }

        #[test]
        fn prop_numbers_never_become_strings(i in any::<i64>()) {
            prop_assert!(is_mismatch(coerce(&Value::Int(i), Primitive::Str, None)));
        }

        #[test]
        fn prop_ints_round_trip_through_float(i in -(1i64 << 52)..(1i64 << 52)) {
            prop_assert_eq!(coerce(&Value::Int(i), Primitive::Float, None), Ok(Value::Float(i as f64)));
        }
    }
}
