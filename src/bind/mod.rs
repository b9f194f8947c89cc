//! Bind module - Moves documents between node trees and entity graphs.
//!
//! [`LoadSession`] walks a parsed [`crate::tree::Tree`] and binds every node
//! to its declared type, recording the formatting and provenance needed to
//! write the document back. [`DumpSession`] walks the resulting
//! [`crate::graph::Graph`] and rebuilds a tree, replaying that metadata for
//! the parts that did not change.
//!
//! Both sessions own their identity maps, so nodes shared through aliases
//! bind to one entity and entities referenced twice dump as an alias.

mod dump;
mod dynamic;
mod load;

#[cfg(test)]
mod dump_test;
#[cfg(test)]
mod load_test;

pub(crate) use dump::DumpSession;
pub(crate) use dynamic::DynamicDecoder;
pub(crate) use load::LoadSession;

use crate::error::ErrorKind;
use crate::graph::{Entity, Graph};
use crate::schema::{Schema, TypeRef};
use crate::value::{coerce, Value};

/// Current value of an attribute: the stored value, else its default.
pub(crate) fn value_of(schema: &Schema, entity: &Entity, name: &str) -> Option<Value> {
    entity.field(name).cloned().or_else(|| {
        schema
            .find(&entity.type_name)?
            .attributes()?
            .by_name(name)?
            .default_value()
            .cloned()
    })
}

/// Checks `value` against a declared type, coercing primitives.
pub(crate) fn conform(
    graph: &Graph,
    type_ref: &TypeRef,
    default: Option<&Value>,
    value: Value,
) -> Result<Value, ErrorKind> {
    match type_ref {
        TypeRef::Any => Ok(value),
        TypeRef::Primitive(p) => coerce(&value, *p, default),
        TypeRef::Named(_) if default == Some(&value) => Ok(value),
        TypeRef::Named(name) => match graph.resolve(&value) {
            Some((_, entity)) if &entity.type_name == name => Ok(value),
            Some((_, entity)) => Err(ErrorKind::structural(
                name.as_str(),
                format!("`{}` value", entity.type_name),
            )),
            None => Err(ErrorKind::structural(name.as_str(), value.type_name())),
        },
    }
}
