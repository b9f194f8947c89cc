//! Typed module - Loading, mutating and dumping documents of a schema type.
//!
//! [`Parser`] wraps a schema; [`ParseableType`] loads text into a
//! [`Document`] and writes documents back, and [`Document`] is the mutation
//! API over the bound values.

mod document;
mod options;
mod parser;

pub use document::*;
pub use options::*;
pub use parser::*;
