//! Bound entities and the arena holding them.

use super::round_trip::RoundTrip;
use crate::error::ErrorKind;
use crate::value::{Handle, Value};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Content of an entity, by kind of its declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityData {
    /// Attribute values by name. Absent attributes hold their default.
    Record(HashMap<String, Value>),
    Sequence(Vec<Value>),
    Map {
        fields: HashMap<String, Value>,
        entries: IndexMap<Value, Value>,
    },
    KeyedList {
        fields: HashMap<String, Value>,
        entries: IndexMap<Value, Handle>,
    },
}

impl EntityData {
    /// Static attribute values, for kinds that have them.
    pub fn fields(&self) -> Option<&HashMap<String, Value>> {
        match self {
            EntityData::Record(fields)
            | EntityData::Map { fields, .. }
            | EntityData::KeyedList { fields, .. } => Some(fields),
            EntityData::Sequence(_) => None,
        }
    }

    pub fn fields_mut(&mut self) -> Option<&mut HashMap<String, Value>> {
        match self {
            EntityData::Record(fields)
            | EntityData::Map { fields, .. }
            | EntityData::KeyedList { fields, .. } => Some(fields),
            EntityData::Sequence(_) => None,
        }
    }

    /// Keys of a map or keyed list, in order.
    pub fn entry_keys(&self) -> Vec<Value> {
        match self {
            EntityData::Map { entries, .. } => entries.keys().cloned().collect(),
            EntityData::KeyedList { entries, .. } => entries.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Number of items or entries; records have none.
    pub fn len(&self) -> usize {
        match self {
            EntityData::Record(_) => 0,
            EntityData::Sequence(items) => items.len(),
            EntityData::Map { entries, .. } => entries.len(),
            EntityData::KeyedList { entries, .. } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Entity is a value bound to a declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub type_name: String,
    pub data: EntityData,
    pub round_trip: RoundTrip,
}

impl Entity {
    pub fn new(type_name: impl Into<String>, data: EntityData) -> Self {
        Entity {
            type_name: type_name.into(),
            data,
            round_trip: RoundTrip::default(),
        }
    }

    pub fn record(type_name: impl Into<String>) -> Self {
        Entity::new(type_name, EntityData::Record(HashMap::new()))
    }

    pub fn sequence(type_name: impl Into<String>) -> Self {
        Entity::new(type_name, EntityData::Sequence(Vec::new()))
    }

    pub fn map(type_name: impl Into<String>) -> Self {
        Entity::new(
            type_name,
            EntityData::Map {
                fields: HashMap::new(),
                entries: IndexMap::new(),
            },
        )
    }

    pub fn keyed_list(type_name: impl Into<String>) -> Self {
        Entity::new(
            type_name,
            EntityData::KeyedList {
                fields: HashMap::new(),
                entries: IndexMap::new(),
            },
        )
    }

    pub fn is_record(&self) -> bool {
        matches!(self.data, EntityData::Record(_))
    }

    /// Stored value of a static attribute.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.fields().and_then(|f| f.get(name))
    }
}

/// Graph owns every entity of one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    entities: Vec<Entity>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    pub fn alloc(&mut self, entity: Entity) -> Handle {
        let handle = Handle(self.entities.len() as u32);
        self.entities.push(entity);
        handle
    }

    pub fn get(&self, handle: Handle) -> &Entity {
        &self.entities[handle.index()]
    }

    pub fn get_mut(&mut self, handle: Handle) -> &mut Entity {
        &mut self.entities[handle.index()]
    }

    /// Returns the entity `value` refers to, if any.
    pub fn resolve(&self, value: &Value) -> Option<(Handle, &Entity)> {
        let handle = value.as_handle()?;
        self.entities.get(handle.index()).map(|e| (handle, e))
    }

    /// Checks that `handle` is an entity of this graph.
    pub fn check(&self, handle: Handle) -> Result<(), ErrorKind> {
        if handle.index() < self.entities.len() {
            Ok(())
        } else {
            Err(ErrorKind::not_a(format!("entity of this document ({})", handle)))
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_resolve() {
        let mut graph = Graph::new();
        let a = graph.alloc(Entity::record("Animal"));
        let b = graph.alloc(Entity::sequence("StrList"));
        assert_eq!(graph.len(), 2);
        assert_ne!(a, b);

        let (h, entity) = graph.resolve(&Value::Ref(b)).unwrap();
        assert_eq!(h, b);
        assert_eq!(entity.type_name, "StrList");
        assert!(graph.resolve(&Value::from("b")).is_none());
        assert!(graph.check(Handle(7)).is_err());
    }

    #[test]
    fn test_entry_keys_keep_order() {
        let mut entity = Entity::map("PetMap");
        if let EntityData::Map { entries, .. } = &mut entity.data {
            entries.insert(Value::from("b"), Value::Int(1));
            entries.insert(Value::from("a"), Value::Int(2));
            entries.insert(Value::from("b"), Value::Int(3));
        }
        assert_eq!(entity.data.entry_keys(), vec![Value::from("b"), Value::from("a")]);
        assert_eq!(entity.data.len(), 2);
    }
}
