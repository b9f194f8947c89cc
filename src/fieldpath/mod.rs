//! Field path module - Locates values inside a bound document.
//!
//! Paths are attached to binding errors so a failure deep inside a document
//! reports where it happened (`.things[thing2].int_attr`).

mod path;

pub use path::*;
