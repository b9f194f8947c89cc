//! Locations of values inside a bound document.

use crate::value::Value;
use std::collections::VecDeque;
use std::fmt;

/// PathElement is one step from a composite to one of its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// Attribute of a record, or static attribute of a map or keyed list.
    FieldName(String),
    /// Entry of a map or keyed list.
    Key(Value),
    /// Item of a sequence.
    Index(usize),
}

impl PathElement {
    pub fn field_name(name: impl Into<String>) -> Self {
        PathElement::FieldName(name.into())
    }

    pub fn key(key: impl Into<Value>) -> Self {
        PathElement::Key(key.into())
    }

    pub fn index(i: usize) -> Self {
        PathElement::Index(i)
    }

    /// Returns the attribute name for a [`PathElement::FieldName`].
    pub fn as_field_name(&self) -> Option<&str> {
        match self {
            PathElement::FieldName(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::FieldName(name) => write!(f, ".{}", name),
            PathElement::Key(Value::String(key)) => write!(f, "[{}]", key),
            PathElement::Key(key) => write!(f, "[{}]", key),
            PathElement::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// Path leads from the document root to a value, outermost step first.
///
/// Binding errors are raised at the innermost node and gain one step per
/// composite they unwind through, so paths grow at the front.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    elements: VecDeque<PathElement>,
}

impl Path {
    /// The path of the document root.
    pub fn new() -> Self {
        Path::default()
    }

    pub fn is_root(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> impl Iterator<Item = &PathElement> {
        self.elements.iter()
    }

    /// Adds the step leading into the current path.
    pub fn prepend(&mut self, element: PathElement) {
        self.elements.push_front(element);
    }

    /// The innermost step.
    pub fn leaf(&self) -> Option<&PathElement> {
        self.elements.back()
    }
}

impl From<Vec<PathElement>> for Path {
    fn from(elements: Vec<PathElement>) -> Self {
        Path {
            elements: elements.into(),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.elements.iter().try_for_each(|element| write!(f, "{}", element))
    }
}
