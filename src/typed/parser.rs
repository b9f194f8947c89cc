//! Parser for loading and dumping typed documents.

use super::document::Document;
use super::options::{DumpOptions, LoadOptions};
use crate::bind::LoadSession;
use crate::error::{ErrorKind, Result};
use crate::schema::{Schema, TypeRef};
use crate::tree::TreeParser;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::debug;

/// Parser holds a schema and hands out [`ParseableType`]s for its types.
#[derive(Debug, Clone)]
pub struct Parser {
    schema: Arc<Schema>,
}

impl Parser {
    /// Creates a new parser from a YAML schema definition.
    pub fn new(schema_yaml: &str) -> Result<Parser> {
        Ok(Parser::from_schema(Schema::from_yaml(schema_yaml)?))
    }

    /// Creates a parser for a schema declared with [`Schema::builder`].
    pub fn from_schema(schema: Schema) -> Parser {
        Parser {
            schema: Arc::new(schema),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the list of type names in this schema.
    pub fn type_names(&self) -> Vec<&str> {
        self.schema.type_names().collect()
    }

    /// Returns a ParseableType helper for the given type name.
    pub fn type_by_name(&self, name: &str) -> ParseableType {
        self.type_of(TypeRef::named(name))
    }

    /// Returns a ParseableType for any type reference, including primitives
    /// and `any`.
    pub fn type_of(&self, type_ref: TypeRef) -> ParseableType {
        ParseableType {
            schema: Arc::clone(&self.schema),
            type_ref,
            load_options: LoadOptions::default(),
            dump_options: DumpOptions::default(),
        }
    }
}

/// ParseableType loads documents of one type and writes them back.
#[derive(Debug, Clone)]
pub struct ParseableType {
    schema: Arc<Schema>,
    type_ref: TypeRef,
    load_options: LoadOptions,
    dump_options: DumpOptions,
}

impl ParseableType {
    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    pub fn with_load_options(mut self, options: LoadOptions) -> Self {
        self.load_options = options;
        self
    }

    pub fn with_dump_options(mut self, options: DumpOptions) -> Self {
        self.dump_options = options;
        self
    }

    /// Returns true if the type is valid in the schema.
    pub fn is_valid(&self) -> bool {
        self.schema.resolves(&self.type_ref)
    }

    /// Parses a document and binds it to this type.
    pub fn load(&self, text: &str) -> Result<Document> {
        if !self.is_valid() {
            return Err(ErrorKind::unknown_type(self.type_ref.to_string()).into());
        }
        let max_depth = self.load_options.max_depth;
        let tree = TreeParser::new(text).max_depth(max_depth).parse()?;
        let (graph, root) = LoadSession::new(&self.schema, &tree, max_depth).load(&self.type_ref)?;
        debug!(type_ref = %self.type_ref, "document loaded");
        Ok(Document::loaded(
            Arc::clone(&self.schema),
            self.type_ref.clone(),
            graph,
            root,
            tree,
            self.dump_options.clone(),
        ))
    }

    pub fn load_reader<R: Read>(&self, mut reader: R) -> Result<Document> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        self.load(&text)
    }

    /// Writes a document of this type with this type's dump options.
    pub fn dump(&self, document: &Document) -> Result<String> {
        if document.type_ref() != &self.type_ref {
            return Err(ErrorKind::structural(
                format!("`{}` document", self.type_ref),
                format!("`{}` document", document.type_ref()),
            )
            .into());
        }
        document.dump_with(&self.dump_options)
    }

    pub fn dump_to_writer<W: Write>(&self, document: &Document, mut writer: W) -> Result<()> {
        let text = self.dump(document)?;
        writer.write_all(text.as_bytes())?;
        Ok(())
    }

    /// Creates an empty document of this type to be filled in memory.
    pub fn new_document(&self) -> Document {
        Document::new(
            Arc::clone(&self.schema),
            self.type_ref.clone(),
            self.dump_options.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Primitive;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    const TEST_SCHEMA: &str = r#"types:
- name: Animal
  record:
    attributes:
    - {name: name, type: str}
    - {name: age, type: int, default: null}
- name: Kennel
  keyed_list: {key_attr: name, item: Animal}
"#;

    #[test]
    fn test_parser_new() {
        let parser = Parser::new(TEST_SCHEMA).unwrap();
        let names = parser.type_names();
        assert!(names.contains(&"Animal"));
        assert!(names.contains(&"Kennel"));
        assert!(names.contains(&"StrList"));
    }

    #[test]
    fn test_parser_rejects_bad_schema() {
        let err = Parser::new("types:\n- name: A\n  record:\n    attributes:\n    - {name: b, type: Missing}\n")
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownType { .. }));
    }

    #[test]
    fn test_parseable_type_is_valid() {
        let parser = Parser::new(TEST_SCHEMA).unwrap();
        assert!(parser.type_by_name("Kennel").is_valid());
        assert!(parser.type_of(TypeRef::Any).is_valid());
        assert!(!parser.type_by_name("nonexistent").is_valid());

        let err = parser.type_by_name("nonexistent").load("a: 1\n").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownType { .. }));
    }

    #[test]
    fn test_load_and_dump() {
        let parser = Parser::new(TEST_SCHEMA).unwrap();
        let kennel = parser.type_by_name("Kennel");
        let text = "Lucy:\n  age: 5\nPossum: {}\n";
        let doc = kennel.load(text).unwrap();
        assert_eq!(kennel.dump(&doc).unwrap(), text);

        let mut out = Vec::new();
        kennel.dump_to_writer(&doc, &mut out).unwrap();
        assert_eq!(out, text.as_bytes());

        let err = parser.type_by_name("Animal").dump(&doc).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::StructuralTypeError { .. }));
    }

    #[test]
    fn test_load_reader() {
        let parser = Parser::new(TEST_SCHEMA).unwrap();
        let doc = parser
            .type_by_name("Animal")
            .load_reader("name: Lucy\nage: 5\n".as_bytes())
            .unwrap();
        let lucy = doc.root_handle().unwrap();
        assert_eq!(doc.get(lucy, "age").unwrap(), Value::Int(5));
    }

    #[test]
    fn test_primitive_and_dynamic_roots() {
        let parser = Parser::new(TEST_SCHEMA).unwrap();
        let doc = parser.type_of(Primitive::Int.into()).load("42\n").unwrap();
        assert_eq!(doc.root(), &Value::Int(42));
        assert!(parser.type_of(Primitive::Int.into()).load("x\n").is_err());

        let doc = parser.type_of(TypeRef::Any).load("a: [1, 2]\n").unwrap();
        assert_eq!(doc.root().get("a"), Some(&Value::List(vec![Value::Int(1), Value::Int(2)])));
        assert_eq!(doc.dump().unwrap(), "a: [1, 2]\n");
    }

    #[test]
    fn test_options() {
        let parser = Parser::new(TEST_SCHEMA).unwrap();
        let deep = "a:\n  b:\n    c:\n      d: 1\n";
        let shallow = parser
            .type_of(TypeRef::Any)
            .with_load_options(LoadOptions::builder().max_depth(2).build());
        let err = shallow.load(deep).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RecursionLimit { limit: 2 }));

        let kennel = parser
            .type_by_name("Kennel")
            .with_dump_options(DumpOptions::builder().indent(4).build());
        let mut doc = kennel.new_document();
        let root = doc.new_keyed_list("Kennel").unwrap();
        doc.set_root(root).unwrap();
        let lucy = doc.new_object("Animal").unwrap();
        doc.set(lucy, "name", "Lucy").unwrap();
        doc.set(lucy, "age", 5).unwrap();
        doc.add_keyed(root, lucy).unwrap();
        assert_eq!(kennel.dump(&doc).unwrap(), "Lucy:\n    age: 5\n");
    }
}
