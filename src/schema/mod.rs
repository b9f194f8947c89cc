//! Schema module defines the types documents are bound to.
//!
//! A schema is a set of named types: records with a closed set of
//! attributes, homogeneous sequences, ordered maps, and keyed lists whose
//! keys are an attribute of the stored records. Schemas are declared with
//! [`SchemaBuilder`] or parsed from a YAML definition.

mod attribute;
mod builder;
mod collection;
mod definition;
mod elements;
mod equals;

pub use attribute::*;
pub use builder::*;
pub use collection::*;
pub use elements::*;
