//! Declarative schema definitions.
//!
//! ```yaml
//! types:
//! - name: Animal
//!   record:
//!     attributes:
//!     - {name: name, type: str}
//!     - {name: age, type: int, default: null}
//! - name: Kennel
//!   keyed_list: {key_attr: name, item: Animal}
//! ```
//!
//! An attribute without `default` is required; `default: null` makes it
//! optional with a null default.

use super::attribute::Attribute;
use super::builder::{RecordBuilder, SchemaBuilder};
use super::elements::{Schema, TypeRef};
use crate::error::{ErrorKind, Result};
use crate::value::Value;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDefinition {
    #[serde(default)]
    types: Vec<TypeDefinition>,
}

#[derive(Debug, Deserialize)]
struct TypeDefinition {
    name: String,
    #[serde(flatten)]
    shape: ShapeDefinition,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ShapeDefinition {
    Record {
        #[serde(default)]
        extends: Option<String>,
        #[serde(default)]
        attributes: Vec<AttributeDefinition>,
    },
    Sequence {
        item: TypeRef,
    },
    Map {
        key: TypeRef,
        value: TypeRef,
        #[serde(default)]
        attributes: Vec<AttributeDefinition>,
    },
    KeyedList {
        key_attr: String,
        item: TypeRef,
        #[serde(default)]
        attributes: Vec<AttributeDefinition>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AttributeDefinition {
    name: String,
    #[serde(default)]
    key: Option<String>,
    #[serde(default, rename = "type")]
    type_ref: TypeRef,
    #[serde(default, deserialize_with = "deserialize_some")]
    default: Option<serde_yaml::Value>,
}

/// Distinguishes `default: null` from an absent `default`.
fn deserialize_some<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl AttributeDefinition {
    fn into_attribute(self) -> Attribute {
        let mut attribute = Attribute::new(self.name).of(self.type_ref);
        if let Some(key) = self.key {
            attribute = attribute.key(key);
        }
        if let Some(default) = self.default {
            attribute = attribute.default(Value::from(default));
        }
        attribute
    }
}

fn body(attributes: Vec<AttributeDefinition>) -> impl FnOnce(RecordBuilder) -> RecordBuilder {
    move |r| r.attrs(attributes.into_iter().map(AttributeDefinition::into_attribute))
}

impl Schema {
    /// Parses a schema definition document.
    pub fn from_yaml(text: &str) -> Result<Schema> {
        let definition: SchemaDefinition = serde_yaml::from_str(text)
            .map_err(|e| ErrorKind::schema(format!("failed to parse schema: {}", e)))?;

        let mut builder = SchemaBuilder::new();
        for t in definition.types {
            builder = match t.shape {
                ShapeDefinition::Record {
                    extends: Some(parent),
                    attributes,
                } => builder.record_extending(&t.name, &parent, body(attributes)),
                ShapeDefinition::Record {
                    extends: None,
                    attributes,
                } => builder.record(&t.name, body(attributes)),
                ShapeDefinition::Sequence { item } => builder.sequence(&t.name, item),
                ShapeDefinition::Map {
                    key,
                    value,
                    attributes,
                } => builder.map_with(&t.name, key, value, body(attributes)),
                ShapeDefinition::KeyedList {
                    key_attr,
                    item,
                    attributes,
                } => builder.keyed_list_with(&t.name, &key_attr, item, body(attributes)),
            };
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Primitive, TypeKind};

    const KENNEL: &str = r#"
types:
- name: Animal
  record:
    attributes:
    - {name: name, type: str}
    - {name: age, type: int, default: null}
    - {name: notes, key: remarks}
- name: Kennel
  keyed_list: {key_attr: name, item: Animal}
- name: Tags
  sequence: {item: str}
"#;

    #[test]
    fn test_from_yaml() {
        let schema = Schema::from_yaml(KENNEL).unwrap();
        let animal = schema.find("Animal").unwrap().attributes().unwrap();

        let name = animal.by_name("name").unwrap();
        assert_eq!(name.type_ref(), &TypeRef::Primitive(Primitive::Str));
        assert!(name.is_required());

        let age = animal.by_name("age").unwrap();
        assert_eq!(age.default_value(), Some(&Value::Null));

        let notes = animal.by_key("remarks").unwrap();
        assert_eq!(notes.name(), "notes");
        assert_eq!(notes.type_ref(), &TypeRef::Any);

        assert!(matches!(
            &schema.find("Kennel").unwrap().kind,
            TypeKind::KeyedList { key_attr, .. } if key_attr == "name"
        ));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = Schema::from_yaml("types:\n- name: A\n  record:\n    attributes:\n    - {name: a, typo: int}\n")
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Schema { .. }));
    }
}
