//! Value module - In-memory representation of bound document content.
//!
//! This module also holds the coercion layer that lifts raw scalars into the
//! primitive type an attribute declares.

mod coerce;
mod value;

pub use coerce::*;
pub use value::*;
