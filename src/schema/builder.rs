//! Programmatic schema declaration.

use super::attribute::Attribute;
use super::collection::AttributeCollection;
use super::elements::{Schema, TypeDef, TypeKind, TypeRef};
use crate::error::{ErrorKind, Result};

/// RecordBuilder collects the attributes of one type.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    attributes: Vec<Attribute>,
}

impl RecordBuilder {
    pub fn attr(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn attrs(mut self, attributes: impl IntoIterator<Item = Attribute>) -> Self {
        self.attributes.extend(attributes);
        self
    }
}

#[derive(Debug)]
enum Shape {
    Record { extends: Option<String> },
    Sequence(TypeRef),
    Map(TypeRef, TypeRef),
    KeyedList(String, TypeRef),
}

#[derive(Debug)]
struct Declaration {
    name: String,
    shape: Shape,
    attributes: Vec<Attribute>,
}

/// SchemaBuilder declares the types of a schema in order.
///
/// Registration errors (duplicate names or wire keys, unknown types) are
/// reported by [`SchemaBuilder::build`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    declarations: Vec<Declaration>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        SchemaBuilder::default()
    }

    fn declare(mut self, name: &str, shape: Shape, body: RecordBuilder) -> Self {
        self.declarations.push(Declaration {
            name: name.to_string(),
            shape,
            attributes: body.attributes,
        });
        self
    }

    /// Declares a record.
    pub fn record<F>(self, name: &str, f: F) -> Self
    where
        F: FnOnce(RecordBuilder) -> RecordBuilder,
    {
        self.declare(name, Shape::Record { extends: None }, f(RecordBuilder::default()))
    }

    /// Declares a record that starts with the attributes of `parent`, which
    /// must be declared earlier.
    pub fn record_extending<F>(self, name: &str, parent: &str, f: F) -> Self
    where
        F: FnOnce(RecordBuilder) -> RecordBuilder,
    {
        let shape = Shape::Record {
            extends: Some(parent.to_string()),
        };
        self.declare(name, shape, f(RecordBuilder::default()))
    }

    pub fn sequence(self, name: &str, item: impl Into<TypeRef>) -> Self {
        self.declare(name, Shape::Sequence(item.into()), RecordBuilder::default())
    }

    pub fn map(self, name: &str, key: impl Into<TypeRef>, value: impl Into<TypeRef>) -> Self {
        self.map_with(name, key, value, |r| r)
    }

    /// Declares a map that also has static attributes.
    pub fn map_with<F>(
        self,
        name: &str,
        key: impl Into<TypeRef>,
        value: impl Into<TypeRef>,
        f: F,
    ) -> Self
    where
        F: FnOnce(RecordBuilder) -> RecordBuilder,
    {
        let shape = Shape::Map(key.into(), value.into());
        self.declare(name, shape, f(RecordBuilder::default()))
    }

    pub fn keyed_list(self, name: &str, key_attr: &str, item: impl Into<TypeRef>) -> Self {
        self.keyed_list_with(name, key_attr, item, |r| r)
    }

    /// Declares a keyed list that also has static attributes.
    pub fn keyed_list_with<F>(
        self,
        name: &str,
        key_attr: &str,
        item: impl Into<TypeRef>,
        f: F,
    ) -> Self
    where
        F: FnOnce(RecordBuilder) -> RecordBuilder,
    {
        let shape = Shape::KeyedList(key_attr.to_string(), item.into());
        self.declare(name, shape, f(RecordBuilder::default()))
    }

    pub fn build(self) -> Result<Schema> {
        let mut types: Vec<TypeDef> = Vec::with_capacity(self.declarations.len());
        for declaration in self.declarations {
            let mut attributes = AttributeCollection::new();
            if let Shape::Record {
                extends: Some(parent),
            } = &declaration.shape
            {
                let inherited = types
                    .iter()
                    .find(|t| &t.name == parent)
                    .and_then(TypeDef::attributes)
                    .ok_or_else(|| ErrorKind::unknown_type(parent.as_str()))?;
                for attribute in inherited.iter() {
                    attributes.add(attribute.clone())?;
                }
            }
            for attribute in declaration.attributes {
                attributes.add(attribute).map_err(|e| match e {
                    ErrorKind::Schema { message } => {
                        ErrorKind::schema(format!("{}: {}", declaration.name, message))
                    }
                    other => other,
                })?;
            }

            let kind = match declaration.shape {
                Shape::Record { .. } => TypeKind::Record { attributes },
                Shape::Sequence(item) => TypeKind::Sequence { item },
                Shape::Map(key, value) => TypeKind::Map {
                    key,
                    value,
                    attributes,
                },
                Shape::KeyedList(key_attr, item) => TypeKind::KeyedList {
                    key_attr,
                    item,
                    attributes,
                },
            };
            types.push(TypeDef::new(declaration.name, kind));
        }
        Schema::from_types(types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Primitive;
    use crate::value::Value;

    #[test]
    fn test_build_kennel_schema() {
        let schema = Schema::builder()
            .record("Animal", |r| {
                r.attr(Attribute::new("name").of(Primitive::Str))
                    .attr(Attribute::new("age").of(Primitive::Int).default(Value::Null))
            })
            .keyed_list("NamedKennel", "name", "Animal")
            .map("PetMap", Primitive::Str, "Animal")
            .build()
            .unwrap();

        let animal = schema.find("Animal").unwrap();
        assert_eq!(animal.attributes().unwrap().len(), 2);
        assert_eq!(schema.find("NamedKennel").unwrap().kind_name(), "keyed list");
        assert!(schema.find("IntList").is_some());
    }

    #[test]
    fn test_record_extending() {
        let schema = Schema::builder()
            .record("Base", |r| r.attr(Attribute::new("id").of(Primitive::Int)))
            .record_extending("Child", "Base", |r| {
                r.attr(Attribute::new("id").of(Primitive::Int))
                    .attr(Attribute::new("extra").default(Value::Null))
            })
            .build()
            .unwrap();
        let keys = schema.find("Child").unwrap().attributes().unwrap().keys();
        assert_eq!(keys, vec!["id", "extra"]);
    }

    #[test]
    fn test_duplicate_wire_key_fails_at_build() {
        let err = Schema::builder()
            .record("Bad", |r| {
                r.attr(Attribute::new("a").key("k"))
                    .attr(Attribute::new("b").key("k"))
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().starts_with("invalid schema: Bad: key `k`"));
    }

    #[test]
    fn test_extending_unknown_parent() {
        let err = Schema::builder()
            .record_extending("Child", "Missing", |r| r)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnknownType { name: "Missing".into() });
    }
}
