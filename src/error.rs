//! Binding errors.
//!
//! Every failure surfaced by loading, dumping or mutating a document is a
//! [`BindError`]: an [`ErrorKind`] plus the location of the offending node
//! and the attribute path leading to it, when known.

use crate::fieldpath::{Path, PathElement};
use crate::tree::Mark;
use crate::value::Value;
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = BindError> = std::result::Result<T, E>;

/// ErrorKind enumerates the ways binding can fail.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    #[error("found key `{key}` but expected any of [{}]", .expected.join(", "))]
    UnknownKey { key: String, expected: Vec<String> },

    #[error("duplicate key `{key}`")]
    DuplicateKey { key: String },

    #[error("missing required attributes for `{type_name}`: {}", .attributes.join(", "))]
    MissingRequired {
        type_name: String,
        attributes: Vec<String>,
    },

    #[error("failed to coerce value `{value}` to type `{target}`")]
    CoercionFailure { value: String, target: String },

    #[error("coerced `{from}` to `{to}`, but the new value `{coerced}` is not equal to old `{original}`")]
    CoercionMismatch {
        from: String,
        to: String,
        original: String,
        coerced: String,
    },

    #[error("item key `{actual}` does not match container key `{expected}`")]
    KeyMismatch { expected: String, actual: String },

    #[error("expected a {expected} node, found {found}")]
    StructuralTypeError { expected: String, found: String },

    #[error("failed to assign attribute `{attribute}` of `{type_name}`: {message}")]
    ValidationFailure {
        attribute: String,
        type_name: String,
        message: String,
    },

    #[error("syntax error: {message}")]
    Syntax { message: String },

    #[error("merge references `{anchor}` before it was bound")]
    UnresolvedMerge { anchor: String },

    #[error("unknown type `{name}`")]
    UnknownType { name: String },

    #[error("invalid schema: {message}")]
    Schema { message: String },

    #[error("nesting deeper than {limit} levels")]
    RecursionLimit { limit: usize },

    #[error("`{type_name}` has no attribute `{name}`")]
    UnknownAttribute { type_name: String, name: String },

    #[error("value is not a {expected}")]
    NotA { expected: String },

    #[error("i/o error: {message}")]
    Io { message: String },
}

impl ErrorKind {
    /// Creates an unknown key error.
    pub fn unknown_key(key: impl Into<String>, expected: Vec<String>) -> Self {
        ErrorKind::UnknownKey {
            key: key.into(),
            expected,
        }
    }

    /// Creates a duplicate key error.
    pub fn duplicate_key(key: impl Into<String>) -> Self {
        ErrorKind::DuplicateKey { key: key.into() }
    }

    /// Creates a missing required attributes error.
    pub fn missing_required(type_name: impl Into<String>, attributes: Vec<String>) -> Self {
        ErrorKind::MissingRequired {
            type_name: type_name.into(),
            attributes,
        }
    }

    /// Creates a coercion failure for a value that cannot be converted at all.
    pub fn coercion_failure(value: &Value, target: impl fmt::Display) -> Self {
        ErrorKind::CoercionFailure {
            value: value.to_string(),
            target: target.to_string(),
        }
    }

    /// Creates a coercion mismatch for a conversion that lost information.
    pub fn coercion_mismatch(original: &Value, coerced: &Value) -> Self {
        ErrorKind::CoercionMismatch {
            from: original.type_name().to_string(),
            to: coerced.type_name().to_string(),
            original: original.to_string(),
            coerced: coerced.to_string(),
        }
    }

    /// Creates a key mismatch error.
    pub fn key_mismatch(expected: &Value, actual: &Value) -> Self {
        ErrorKind::KeyMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Creates a structural type error.
    pub fn structural(expected: impl Into<String>, found: impl Into<String>) -> Self {
        ErrorKind::StructuralTypeError {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates a validation failure.
    pub fn validation(
        attribute: impl Into<String>,
        type_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ErrorKind::ValidationFailure {
            attribute: attribute.into(),
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Creates a syntax error.
    pub fn syntax(message: impl Into<String>) -> Self {
        ErrorKind::Syntax {
            message: message.into(),
        }
    }

    /// Creates an unknown type error.
    pub fn unknown_type(name: impl Into<String>) -> Self {
        ErrorKind::UnknownType { name: name.into() }
    }

    /// Creates a schema definition error.
    pub fn schema(message: impl Into<String>) -> Self {
        ErrorKind::Schema {
            message: message.into(),
        }
    }

    /// Creates an unknown attribute error.
    pub fn unknown_attribute(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        ErrorKind::UnknownAttribute {
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    /// Creates a wrong entity kind error.
    pub fn not_a(expected: impl Into<String>) -> Self {
        ErrorKind::NotA {
            expected: expected.into(),
        }
    }
}

/// BindError is an [`ErrorKind`] located in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct BindError {
    kind: ErrorKind,
    mark: Option<Mark>,
    path: Path,
}

impl BindError {
    pub fn new(kind: ErrorKind) -> Self {
        BindError {
            kind,
            mark: None,
            path: Path::new(),
        }
    }

    /// Returns the kind of failure.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the source location of the offending node, if known.
    pub fn mark(&self) -> Option<Mark> {
        self.mark
    }

    /// Returns the attribute path leading to the failure.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Attaches a source location unless a more precise one is already set.
    pub fn at(mut self, mark: Option<Mark>) -> Self {
        if self.mark.is_none() {
            self.mark = mark;
        }
        self
    }

    /// Records that the failure happened inside `element`.
    pub fn within(mut self, element: PathElement) -> Self {
        self.path.prepend(element);
        self
    }
}

impl From<ErrorKind> for BindError {
    fn from(kind: ErrorKind) -> Self {
        BindError::new(kind)
    }
}

impl From<std::io::Error> for BindError {
    fn from(e: std::io::Error) -> Self {
        BindError::new(ErrorKind::Io {
            message: e.to_string(),
        })
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.path.is_empty() {
            write!(f, "{}: ", self.path)?;
        }
        write!(f, "{}", self.kind)?;
        if let Some(mark) = self.mark {
            write!(f, " (at {})", mark)?;
        }
        Ok(())
    }
}

impl std::error::Error for BindError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}
