//! Tree module - Node-level representation of YAML documents.
//!
//! This module provides the document tree the binders walk: an arena of
//! nodes with formatting metadata, a parser for the supported YAML subset,
//! an emitter that replays the metadata, and core schema scalar resolution.

mod emitter;
mod node;
mod parser;
mod resolve;


pub use emitter::*;
pub use node::*;
pub use parser::*;
pub use resolve::*;
