//! Graph module - Arena of bound entities for one document.
//!
//! Records, sequences, maps and keyed lists bound to declared types are
//! stored in a [`Graph`] and referenced by [`Handle`](crate::value::Handle),
//! so shared and cyclic structure needs no reference counting. Each entity
//! carries the [`RoundTrip`] metadata captured when it was loaded.

mod entity;
mod round_trip;

pub use entity::*;
pub use round_trip::*;
