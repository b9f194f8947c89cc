//! Core schema elements and type definitions.

use super::collection::AttributeCollection;
use crate::error::{ErrorKind, Result};
use crate::value::Value;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Primitive is a scalar type an attribute or container element may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Str,
    Int,
    Float,
    Bool,
}

impl Primitive {
    /// Returns true if `value` already has this type.
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Primitive::Str, Value::String(_))
                | (Primitive::Int, Value::Int(_))
                | (Primitive::Float, Value::Float(_))
                | (Primitive::Bool, Value::Bool(_))
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Str => "str",
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::Bool => "bool",
        }
    }

    fn parse(name: &str) -> Option<Primitive> {
        match name {
            "str" => Some(Primitive::Str),
            "int" => Some(Primitive::Int),
            "float" => Some(Primitive::Float),
            "bool" => Some(Primitive::Bool),
            _ => None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// TypeRef is the declared type of an attribute or container element.
///
/// In schema definitions it is written as a single name: `any`, one of the
/// primitive names, or the name of a declared type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TypeRef {
    /// Untyped content, kept as a dynamic [`Value`].
    #[default]
    Any,
    Primitive(Primitive),
    /// A record, sequence, map or keyed list declared in the schema.
    Named(String),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn parse(name: &str) -> Self {
        match name {
            "any" => TypeRef::Any,
            other => Primitive::parse(other)
                .map(TypeRef::Primitive)
                .unwrap_or_else(|| TypeRef::Named(other.to_string())),
        }
    }

    /// Name of the declared type, if this refers to one.
    pub fn as_named(&self) -> Option<&str> {
        match self {
            TypeRef::Named(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Any => f.write_str("any"),
            TypeRef::Primitive(p) => p.fmt(f),
            TypeRef::Named(name) => f.write_str(name),
        }
    }
}

impl From<Primitive> for TypeRef {
    fn from(p: Primitive) -> Self {
        TypeRef::Primitive(p)
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::parse(name)
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        TypeRef::parse(&name)
    }
}

impl From<TypeRef> for String {
    fn from(t: TypeRef) -> Self {
        t.to_string()
    }
}

/// TypeDef is a named type of a schema.
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
}

/// TypeKind is the shape of a declared type.
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// A closed mapping of named attributes.
    Record { attributes: AttributeCollection },
    /// A homogeneous ordered list.
    Sequence { item: TypeRef },
    /// An ordered association, optionally with static attributes.
    Map {
        key: TypeRef,
        value: TypeRef,
        attributes: AttributeCollection,
    },
    /// A mapping of records whose key is the record's `key_attr` attribute.
    KeyedList {
        key_attr: String,
        item: TypeRef,
        attributes: AttributeCollection,
    },
}

impl TypeDef {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        TypeDef {
            name: name.into(),
            kind,
        }
    }

    /// Static attributes of records, maps and keyed lists.
    pub fn attributes(&self) -> Option<&AttributeCollection> {
        match &self.kind {
            TypeKind::Record { attributes }
            | TypeKind::Map { attributes, .. }
            | TypeKind::KeyedList { attributes, .. } => Some(attributes),
            TypeKind::Sequence { .. } => None,
        }
    }

    /// Short name of the kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            TypeKind::Record { .. } => "record",
            TypeKind::Sequence { .. } => "sequence",
            TypeKind::Map { .. } => "map",
            TypeKind::KeyedList { .. } => "keyed list",
        }
    }

    fn type_refs(&self) -> Vec<&TypeRef> {
        let mut refs = match &self.kind {
            TypeKind::Record { .. } => vec![],
            TypeKind::Sequence { item } => vec![item],
            TypeKind::Map { key, value, .. } => vec![key, value],
            TypeKind::KeyedList { item, .. } => vec![item],
        };
        if let Some(attributes) = self.attributes() {
            refs.extend(attributes.iter().map(|a| a.type_ref()));
        }
        refs
    }
}

/// Sequence types registered on every schema.
pub const BUILTIN_TYPES: [(&str, Primitive); 3] = [
    ("IntList", Primitive::Int),
    ("FloatList", Primitive::Float),
    ("StrList", Primitive::Str),
];

/// Schema is a list of named types.
///
/// Schema types are indexed in a map before the first search so this type
/// should be considered immutable.
#[derive(Debug, Default)]
pub struct Schema {
    types: Vec<TypeDef>,
    index: OnceCell<HashMap<String, usize>>,
}

impl Clone for Schema {
    fn clone(&self) -> Self {
        Schema {
            types: self.types.clone(),
            index: OnceCell::new(),
        }
    }
}

impl Schema {
    /// Starts a programmatic schema declaration.
    pub fn builder() -> super::SchemaBuilder {
        super::SchemaBuilder::new()
    }

    /// Creates a schema from type definitions, adding the built-in list
    /// types and checking every type reference.
    pub fn from_types(mut types: Vec<TypeDef>) -> Result<Schema> {
        for (name, item) in BUILTIN_TYPES {
            if !types.iter().any(|t| t.name == name) {
                types.push(TypeDef::new(
                    name,
                    TypeKind::Sequence {
                        item: TypeRef::Primitive(item),
                    },
                ));
            }
        }
        let schema = Schema {
            types,
            index: OnceCell::new(),
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn types(&self) -> &[TypeDef] {
        &self.types
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|t| t.name.as_str())
    }

    /// Returns the named type, if it exists.
    pub fn find(&self, name: &str) -> Option<&TypeDef> {
        let index = self.index.get_or_init(|| {
            self.types
                .iter()
                .enumerate()
                .map(|(i, t)| (t.name.clone(), i))
                .collect()
        });
        index.get(name).map(|&i| &self.types[i])
    }

    /// Like [`Schema::find`], failing with `UnknownType`.
    pub fn lookup(&self, name: &str) -> std::result::Result<&TypeDef, ErrorKind> {
        self.find(name).ok_or_else(|| ErrorKind::unknown_type(name))
    }

    /// Returns true if `type_ref` can be bound with this schema.
    pub fn resolves(&self, type_ref: &TypeRef) -> bool {
        match type_ref {
            TypeRef::Named(name) => self.find(name).is_some(),
            _ => true,
        }
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for t in &self.types {
            if !seen.insert(t.name.as_str()) {
                return Err(ErrorKind::schema(format!("duplicate type name `{}`", t.name)).into());
            }
        }

        for t in &self.types {
            for type_ref in t.type_refs() {
                if !self.resolves(type_ref) {
                    return Err(ErrorKind::unknown_type(type_ref.to_string()).into());
                }
            }
            match &t.kind {
                TypeKind::Map { key, .. } if key.as_named().is_some() => {
                    return Err(ErrorKind::schema(format!(
                        "map `{}` must have a scalar or `any` key type, not `{}`",
                        t.name, key
                    ))
                    .into());
                }
                TypeKind::KeyedList { key_attr, item, .. } => {
                    let record = item
                        .as_named()
                        .and_then(|name| self.find(name))
                        .filter(|def| matches!(def.kind, TypeKind::Record { .. }));
                    let Some(record) = record else {
                        return Err(ErrorKind::schema(format!(
                            "keyed list `{}` must hold a record type, not `{}`",
                            t.name, item
                        ))
                        .into());
                    };
                    let has_key = record
                        .attributes()
                        .and_then(|a| a.by_name(key_attr))
                        .is_some();
                    if !has_key {
                        return Err(ErrorKind::schema(format!(
                            "keyed list `{}` uses key `{}`, which `{}` does not declare",
                            t.name, key_attr, record.name
                        ))
                        .into());
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;

    fn record(name: &str, attrs: Vec<Attribute>) -> TypeDef {
        let mut attributes = AttributeCollection::new();
        for a in attrs {
            attributes.add(a).unwrap();
        }
        TypeDef::new(name, TypeKind::Record { attributes })
    }

    #[test]
    fn test_type_ref_parsing() {
        assert_eq!(TypeRef::parse("any"), TypeRef::Any);
        assert_eq!(TypeRef::parse("float"), TypeRef::Primitive(Primitive::Float));
        assert_eq!(TypeRef::parse("Animal"), TypeRef::named("Animal"));
        assert_eq!(TypeRef::named("Kennel").to_string(), "Kennel");
        assert_eq!(serde_json::to_string(&Primitive::Bool).unwrap(), "\"bool\"");
    }

    #[test]
    fn test_builtins_are_registered() {
        let schema = Schema::from_types(vec![]).unwrap();
        let names: Vec<&str> = schema.type_names().collect();
        assert_eq!(names, vec!["IntList", "FloatList", "StrList"]);
        assert!(matches!(
            schema.find("StrList").unwrap().kind,
            TypeKind::Sequence { item: TypeRef::Primitive(Primitive::Str) }
        ));
    }

    #[test]
    fn test_unknown_reference() {
        let err = Schema::from_types(vec![record(
            "Owner",
            vec![Attribute::new("pets").of("Kennel")],
        )])
        .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnknownType { name: "Kennel".into() });
    }

    #[test]
    fn test_keyed_list_requires_key_attribute() {
        let animal = record("Animal", vec![Attribute::new("age").of(Primitive::Int)]);
        let kennel = TypeDef::new(
            "Kennel",
            TypeKind::KeyedList {
                key_attr: "name".into(),
                item: TypeRef::named("Animal"),
                attributes: AttributeCollection::new(),
            },
        );
        let err = Schema::from_types(vec![animal, kennel]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Schema { .. }));
    }

    #[test]
    fn test_duplicate_type_names() {
        let err = Schema::from_types(vec![record("A", vec![]), record("A", vec![])]).unwrap_err();
        assert!(err.to_string().contains("duplicate type name `A`"));
    }

    #[test]
    fn test_clone_resets_index() {
        let schema = Schema::from_types(vec![record("A", vec![])]).unwrap();
        assert!(schema.find("A").is_some());
        let copy = schema.clone();
        assert!(copy.find("A").is_some());
        assert!(copy.find("B").is_none());
    }
}
