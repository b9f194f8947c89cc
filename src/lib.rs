//! # YAML Bind
//!
//! Schema-driven binding of YAML documents to typed values, with round trips
//! that keep the original formatting.
//!
//! A schema declares records, sequences, maps and keyed lists (maps whose
//! key is an attribute of the stored record). Loading a document checks it
//! against the schema, coerces scalars without loss, applies defaults and
//! resolves anchors, aliases and merge keys into shared entities. Dumping
//! writes the values back, replaying comments, key order, quoting, layout
//! and anchor names for everything that did not change, and re-deriving
//! aliases and merge keys for records that still match their parents.
//!
//! ## Modules
//!
//! - [`schema`] - Type declarations, attributes and schema definitions
//! - [`value`] - Values, entity handles and lossless coercion
//! - [`tree`] - Document tree with formatting metadata, parser and emitter
//! - [`graph`] - Bound entities and their round-trip metadata
//! - [`typed`] - Loading, mutating and dumping documents
//! - [`fieldpath`] - Paths locating values inside a document
//! - [`error`] - The binding error taxonomy
//!
//! ```
//! use yaml_bind::typed::Parser;
//!
//! let parser = Parser::new(r#"
//! types:
//! - name: Animal
//!   record:
//!     attributes:
//!     - {name: name, type: str}
//!     - {name: age, type: int, default: 0}
//! "#).unwrap();
//!
//! let animal = parser.type_by_name("Animal");
//! let mut doc = animal.load("name: Lucy # good dog\n").unwrap();
//! let lucy = doc.root_handle().unwrap();
//! doc.set(lucy, "age", 5).unwrap();
//! assert_eq!(animal.dump(&doc).unwrap(), "name: Lucy # good dog\nage: 5\n");
//! ```

mod bind;
pub mod error;
pub mod fieldpath;
pub mod graph;
pub mod schema;
pub mod tree;
pub mod typed;
pub mod value;

pub use error::{BindError, ErrorKind, Result};
pub use fieldpath::{Path, PathElement};
pub use graph::{Entity, EntityData, Graph};
pub use schema::{Attribute, Primitive, Schema, TypeRef};
pub use typed::{Document, DumpOptions, LoadOptions, ParseableType, Parser};
pub use value::{Handle, Value};
