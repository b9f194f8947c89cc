//! Attribute descriptors.

use super::elements::TypeRef;
use crate::error::ErrorKind;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

type ValidateFn = dyn Fn(&Value) -> Result<(), String> + Send + Sync;

/// Validator is a user check run whenever an attribute is assigned.
#[derive(Clone)]
pub struct Validator(Arc<ValidateFn>);

impl Validator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Validator(Arc::new(f))
    }

    pub fn check(&self, value: &Value) -> Result<(), String> {
        (self.0)(value)
    }

    /// Two validators are the same only if they share one function.
    pub fn same(&self, other: &Validator) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator(..)")
    }
}

/// Attribute is one named, typed field of a record.
///
/// An attribute without a default is required.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub(crate) name: String,
    pub(crate) key: Option<String>,
    pub(crate) type_ref: TypeRef,
    pub(crate) default: Option<Value>,
    pub(crate) validator: Option<Validator>,
}

impl Attribute {
    /// Creates a required attribute of type `any` whose wire key is its name.
    pub fn new(name: impl Into<String>) -> Self {
        Attribute {
            name: name.into(),
            key: None,
            type_ref: TypeRef::Any,
            default: None,
            validator: None,
        }
    }

    /// Sets the key used in documents, when it differs from the name.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn of(mut self, type_ref: impl Into<TypeRef>) -> Self {
        self.type_ref = type_ref.into();
        self
    }

    /// Makes the attribute optional.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Validator::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wire_key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.name)
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    /// Runs the validator, if any, against a value about to be assigned.
    pub fn validate(&self, type_name: &str, value: &Value) -> Result<(), ErrorKind> {
        match &self.validator {
            Some(v) => v
                .check(value)
                .map_err(|message| ErrorKind::validation(&self.name, type_name, message)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Primitive;

    #[test]
    fn test_builder_defaults() {
        let a = Attribute::new("int_attr");
        assert_eq!(a.wire_key(), "int_attr");
        assert_eq!(a.type_ref(), &TypeRef::Any);
        assert!(a.is_required());

        let b = Attribute::new("field").key("wire").of(Primitive::Int).default(Value::Null);
        assert_eq!(b.wire_key(), "wire");
        assert_eq!(b.default_value(), Some(&Value::Null));
        assert!(!b.is_required());
    }

    #[test]
    fn test_validator() {
        let a = Attribute::new("x").of(Primitive::Float).validator(|v| match v.as_float() {
            Some(f) if f < 0.0 => Err("must be positive".to_string()),
            _ => Ok(()),
        });
        assert!(a.validate("PositivePoint", &Value::Float(1.0)).is_ok());
        assert_eq!(
            a.validate("PositivePoint", &Value::Float(-1.0)).unwrap_err().to_string(),
            "failed to assign attribute `x` of `PositivePoint`: must be positive"
        );
    }
}
