//! Loaded documents and their mutation API.

use super::options::DumpOptions;
use crate::bind::{conform, value_of, DumpSession};
use crate::error::{BindError, ErrorKind, Result};
use crate::fieldpath::PathElement;
use crate::graph::{Entity, EntityData, Graph};
use crate::schema::{Attribute, Schema, Slot, TypeDef, TypeKind, TypeRef};
use crate::tree::{Emitter, Tree};
use crate::value::{coerce, Handle, ScalarType, Typed, Value};
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, trace};

/// Document is a bound value together with the graph of its entities and
/// the tree it was loaded from.
///
/// Composite values are addressed by [`Handle`]. Mutations go through the
/// methods below so that every stored value keeps satisfying its declared
/// type; dumping replays the formatting of whatever did not change.
#[derive(Debug, Clone)]
pub struct Document {
    schema: Arc<Schema>,
    type_ref: TypeRef,
    graph: Graph,
    root: Value,
    source: Tree,
    dump_options: DumpOptions,
}

/// Resolves the declared attribute `name` of `entity`.
fn attribute<'s>(schema: &'s Schema, entity: &Entity, name: &str) -> Result<&'s Attribute> {
    schema
        .lookup(&entity.type_name)?
        .attributes()
        .and_then(|attributes| attributes.by_name(name))
        .ok_or_else(|| ErrorKind::unknown_attribute(entity.type_name.as_str(), name).into())
}

fn conform_key(key_type: &TypeRef, key: Value) -> Result<Value, ErrorKind> {
    match key_type {
        TypeRef::Primitive(p) => coerce(&key, *p, None),
        TypeRef::Any | TypeRef::Named(_) => Ok(key),
    }
}

impl Document {
    /// Creates an empty document; its root is null until [`Document::set_root`].
    pub fn new(schema: Arc<Schema>, type_ref: TypeRef, dump_options: DumpOptions) -> Self {
        Document {
            schema,
            type_ref,
            graph: Graph::new(),
            root: Value::Null,
            source: Tree::new(),
            dump_options,
        }
    }

    pub(crate) fn loaded(
        schema: Arc<Schema>,
        type_ref: TypeRef,
        graph: Graph,
        root: Value,
        source: Tree,
        dump_options: DumpOptions,
    ) -> Self {
        Document {
            schema,
            type_ref,
            graph,
            root,
            source,
            dump_options,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Handle of the root entity, if the root is one.
    pub fn root_handle(&self) -> Option<Handle> {
        self.root.as_handle()
    }

    /// Replaces the root value; it must satisfy the document type.
    pub fn set_root(&mut self, value: impl Into<Value>) -> Result<()> {
        self.root = conform(&self.graph, &self.type_ref, None, value.into())?;
        Ok(())
    }

    pub fn entity(&self, handle: Handle) -> Result<&Entity> {
        self.graph.check(handle)?;
        Ok(self.graph.get(handle))
    }

    fn definition(&self, handle: Handle) -> Result<&TypeDef> {
        let entity = self.entity(handle)?;
        Ok(self.schema.lookup(&entity.type_name)?)
    }

    /// Current value of an attribute, falling back to its default.
    ///
    /// Reading a required attribute that was never set fails with
    /// `MissingRequired`.
    pub fn get(&self, handle: Handle, name: &str) -> Result<Value> {
        let entity = self.entity(handle)?;
        attribute(&self.schema, entity, name)?;
        value_of(&self.schema, entity, name).ok_or_else(|| {
            ErrorKind::missing_required(entity.type_name.as_str(), vec![name.to_string()]).into()
        })
    }

    /// Like [`Document::get`], converting the value to a Rust scalar type.
    pub fn get_as<T: ScalarType>(&self, handle: Handle, name: &str) -> Result<T> {
        let value = self.get(handle, name)?;
        Typed::<T>::coerce(&value)
            .map(Typed::into_inner)
            .map_err(|e| BindError::new(e).within(PathElement::field_name(name)))
    }

    /// Assigns an attribute after coercing it to the declared type and
    /// running its validator.
    pub fn set(&mut self, handle: Handle, name: &str, value: impl Into<Value>) -> Result<()> {
        self.graph.check(handle)?;
        let entity = self.graph.get(handle);
        let attribute = attribute(&self.schema, entity, name)?;
        let value = conform(
            &self.graph,
            attribute.type_ref(),
            attribute.default_value(),
            value.into(),
        )
        .and_then(|value| attribute.validate(&entity.type_name, &value).map(|_| value))
        .map_err(|e| BindError::new(e).within(PathElement::field_name(name)))?;

        trace!(%handle, attribute = name, "attribute set");
        if let Some(fields) = self.graph.get_mut(handle).data.fields_mut() {
            fields.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Removes an assigned attribute so that it reads as its default again.
    pub fn unset(&mut self, handle: Handle, name: &str) -> Result<Option<Value>> {
        self.graph.check(handle)?;
        attribute(&self.schema, self.graph.get(handle), name)?;
        let entity = self.graph.get_mut(handle);
        entity.round_trip.forget(&Slot::Attr(name.to_string()));
        Ok(entity.data.fields_mut().and_then(|fields| fields.remove(name)))
    }

    /// Returns true if the attribute holds a value of its own, whether
    /// written, inherited or assigned.
    pub fn is_set(&self, handle: Handle, name: &str) -> Result<bool> {
        let entity = self.entity(handle)?;
        attribute(&self.schema, entity, name)?;
        Ok(entity.field(name).is_some())
    }

    fn create(&mut self, type_name: &str, kind: &str) -> Result<Handle> {
        let def = self.schema.lookup(type_name)?;
        if def.kind_name() != kind {
            return Err(ErrorKind::not_a(format!("{} ({} is a {})", kind, type_name, def.kind_name())).into());
        }
        let entity = match &def.kind {
            TypeKind::Record { .. } => Entity::record(type_name),
            TypeKind::Sequence { .. } => Entity::sequence(type_name),
            TypeKind::Map { .. } => Entity::map(type_name),
            TypeKind::KeyedList { .. } => Entity::keyed_list(type_name),
        };
        let handle = self.graph.alloc(entity);
        debug!(%handle, type_name, "created entity");
        Ok(handle)
    }

    /// Creates an empty record; required attributes must be set before
    /// dumping.
    pub fn new_object(&mut self, type_name: &str) -> Result<Handle> {
        self.create(type_name, "record")
    }

    pub fn new_sequence(&mut self, type_name: &str) -> Result<Handle> {
        self.create(type_name, "sequence")
    }

    pub fn new_map(&mut self, type_name: &str) -> Result<Handle> {
        self.create(type_name, "map")
    }

    pub fn new_keyed_list(&mut self, type_name: &str) -> Result<Handle> {
        self.create(type_name, "keyed list")
    }

    fn item_type(&self, handle: Handle) -> Result<TypeRef> {
        match &self.definition(handle)?.kind {
            TypeKind::Sequence { item } => Ok(item.clone()),
            _ => Err(ErrorKind::not_a("sequence").into()),
        }
    }

    fn sequence_mut(&mut self, handle: Handle) -> Result<&mut Vec<Value>> {
        match &mut self.graph.get_mut(handle).data {
            EntityData::Sequence(items) => Ok(items),
            _ => Err(ErrorKind::not_a("sequence").into()),
        }
    }

    /// Items of a sequence.
    pub fn items(&self, handle: Handle) -> Result<&[Value]> {
        match &self.entity(handle)?.data {
            EntityData::Sequence(items) => Ok(items),
            _ => Err(ErrorKind::not_a("sequence").into()),
        }
    }

    /// Number of items of a sequence or entries of a map or keyed list.
    pub fn len(&self, handle: Handle) -> Result<usize> {
        let entity = self.entity(handle)?;
        if entity.is_record() {
            return Err(ErrorKind::not_a("collection").into());
        }
        Ok(entity.data.len())
    }

    /// Appends an item, coercing it to the item type.
    pub fn push(&mut self, handle: Handle, value: impl Into<Value>) -> Result<()> {
        let item = self.item_type(handle)?;
        let index = self.items(handle)?.len();
        let value = conform(&self.graph, &item, None, value.into())
            .map_err(|e| BindError::new(e).within(PathElement::index(index)))?;
        self.sequence_mut(handle)?.push(value);
        Ok(())
    }

    pub fn set_item(&mut self, handle: Handle, index: usize, value: impl Into<Value>) -> Result<()> {
        let item = self.item_type(handle)?;
        let value = conform(&self.graph, &item, None, value.into())
            .map_err(|e| BindError::new(e).within(PathElement::index(index)))?;
        let items = self.sequence_mut(handle)?;
        let len = items.len();
        let slot = items
            .get_mut(index)
            .ok_or_else(|| ErrorKind::not_a(format!("index below {}", len)))?;
        *slot = value;
        Ok(())
    }

    pub fn remove_item(&mut self, handle: Handle, index: usize) -> Result<Value> {
        self.item_type(handle)?;
        let items = self.sequence_mut(handle)?;
        if index >= items.len() {
            return Err(ErrorKind::not_a(format!("index below {}", items.len())).into());
        }
        let removed = items.remove(index);
        self.graph.get_mut(handle).round_trip.remove_index(index);
        Ok(removed)
    }

    /// Compares a sequence with a plain list, item by item. Nested
    /// sequences compare against nested lists the same way.
    pub fn sequence_eq(&self, handle: Handle, other: &[Value]) -> Result<bool> {
        let items = self.items(handle)?;
        if items.len() != other.len() {
            return Ok(false);
        }
        for (item, expected) in items.iter().zip(other) {
            let equal = match (item, expected) {
                (Value::Ref(nested), Value::List(list)) => {
                    matches!(self.entity(*nested)?.data, EntityData::Sequence(_))
                        && self.sequence_eq(*nested, list)?
                }
                _ => item == expected,
            };
            if !equal {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Key and value types of a map, or the key attribute type of a keyed
    /// list.
    fn entry_types(&self, handle: Handle) -> Result<(TypeRef, Option<TypeRef>)> {
        match &self.definition(handle)?.kind {
            TypeKind::Map { key, value, .. } => Ok((key.clone(), Some(value.clone()))),
            TypeKind::KeyedList { key_attr, item, .. } => {
                let key = item
                    .as_named()
                    .and_then(|name| self.schema.find(name))
                    .and_then(TypeDef::attributes)
                    .and_then(|attributes| attributes.by_name(key_attr))
                    .map(|attribute| attribute.type_ref().clone())
                    .unwrap_or_default();
                Ok((key, None))
            }
            _ => Err(ErrorKind::not_a("map or keyed list").into()),
        }
    }

    /// Inserts or replaces a map entry. Returns the previous value.
    pub fn insert(&mut self, handle: Handle, key: impl Into<Value>, value: impl Into<Value>) -> Result<Option<Value>> {
        let (key_type, value_type) = self.entry_types(handle)?;
        let value_type = value_type.ok_or_else(|| ErrorKind::not_a("map"))?;
        let key = conform_key(&key_type, key.into())?;
        let value = conform(&self.graph, &value_type, None, value.into())
            .map_err(|e| BindError::new(e).within(PathElement::key(key.clone())))?;
        match &mut self.graph.get_mut(handle).data {
            EntityData::Map { entries, .. } => Ok(entries.insert(key, value)),
            _ => Err(ErrorKind::not_a("map").into()),
        }
    }

    /// Value stored under `key` in a map, or the item of a keyed list.
    pub fn entry(&self, handle: Handle, key: impl Into<Value>) -> Result<Option<Value>> {
        let (key_type, _) = self.entry_types(handle)?;
        let key = conform_key(&key_type, key.into())?;
        Ok(match &self.entity(handle)?.data {
            EntityData::Map { entries, .. } => entries.get(&key).cloned(),
            EntityData::KeyedList { entries, .. } => entries.get(&key).copied().map(Value::Ref),
            _ => None,
        })
    }

    /// Removes an entry of a map or keyed list, keeping the order of the
    /// others.
    pub fn remove_entry(&mut self, handle: Handle, key: impl Into<Value>) -> Result<Option<Value>> {
        let (key_type, _) = self.entry_types(handle)?;
        let key = conform_key(&key_type, key.into())?;
        let entity = self.graph.get_mut(handle);
        let removed = match &mut entity.data {
            EntityData::Map { entries, .. } => entries.shift_remove(&key),
            EntityData::KeyedList { entries, .. } => entries.shift_remove(&key).map(Value::Ref),
            _ => None,
        };
        if removed.is_some() {
            trace!(%handle, %key, "entry removed");
            entity.round_trip.forget(&Slot::Entry(key));
        }
        Ok(removed)
    }

    pub fn keys(&self, handle: Handle) -> Result<Vec<Value>> {
        self.entry_types(handle)?;
        Ok(self.entity(handle)?.data.entry_keys())
    }

    /// Stores `item` under `key`; the key must equal the item's key
    /// attribute.
    pub fn insert_keyed(&mut self, handle: Handle, key: impl Into<Value>, item: Handle) -> Result<()> {
        let (key_type, key_attr, item_type) = match &self.definition(handle)?.kind {
            TypeKind::KeyedList { key_attr, item, .. } => {
                let (key_type, _) = self.entry_types(handle)?;
                (key_type, key_attr.clone(), item.clone())
            }
            _ => return Err(ErrorKind::not_a("keyed list").into()),
        };
        conform(&self.graph, &item_type, None, Value::Ref(item))?;
        let key = conform_key(&key_type, key.into())?;
        let actual = value_of(&self.schema, self.entity(item)?, &key_attr).unwrap_or_default();
        if key != actual {
            return Err(BindError::new(ErrorKind::key_mismatch(&key, &actual)).within(PathElement::key(key)));
        }

        match &mut self.graph.get_mut(handle).data {
            EntityData::KeyedList { entries, .. } => {
                entries.insert(key, item);
                Ok(())
            }
            _ => Err(ErrorKind::not_a("keyed list").into()),
        }
    }

    /// Stores `item` under the value of its key attribute and returns that
    /// key.
    pub fn add_keyed(&mut self, handle: Handle, item: Handle) -> Result<Value> {
        let key_attr = match &self.definition(handle)?.kind {
            TypeKind::KeyedList { key_attr, .. } => key_attr.clone(),
            _ => return Err(ErrorKind::not_a("keyed list").into()),
        };
        let key = self.get(item, &key_attr)?;
        self.insert_keyed(handle, key.clone(), item)?;
        Ok(key)
    }

    /// Records the record inherits from, in merge order.
    pub fn merge_parents(&self, handle: Handle) -> Result<Vec<Handle>> {
        Ok(self
            .entity(handle)?
            .round_trip
            .merge_links
            .iter()
            .map(|link| link.parent)
            .collect())
    }

    /// Forgets that the record inherited from `parent`. Inherited values
    /// stay assigned and are written out explicitly.
    pub fn remove_merge_parent(&mut self, handle: Handle, parent: Handle) -> Result<bool> {
        self.graph.check(handle)?;
        let links = &mut self.graph.get_mut(handle).round_trip.merge_links;
        let before = links.len();
        links.retain(|link| link.parent != parent);
        Ok(links.len() != before)
    }

    /// Returns true if both values are the same entity.
    pub fn same_entity(&self, a: &Value, b: &Value) -> bool {
        matches!((a.as_handle(), b.as_handle()), (Some(x), Some(y)) if x == y)
    }

    /// Converts the root value to JSON. Shared entities are repeated;
    /// cycles are rejected.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        self.json(&self.root, &mut HashSet::new())
    }

    fn json(&self, value: &Value, visiting: &mut HashSet<Handle>) -> Result<serde_json::Value> {
        use serde_json::Value as Json;

        fn key_text(key: &Value) -> String {
            key.as_str().map(str::to_string).unwrap_or_else(|| key.to_string())
        }

        Ok(match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Value::String(s) => Json::String(s.clone()),
            Value::List(items) => Json::Array(
                items
                    .iter()
                    .map(|item| self.json(item, visiting))
                    .collect::<Result<_>>()?,
            ),
            Value::Map(pairs) => {
                let mut object = serde_json::Map::new();
                for (k, v) in pairs {
                    object.insert(key_text(k), self.json(v, visiting)?);
                }
                Json::Object(object)
            }
            Value::Ref(handle) => {
                let entity = self.entity(*handle)?;
                if !visiting.insert(*handle) {
                    return Err(ErrorKind::structural("acyclic document", "cycle").into());
                }
                let mut object = serde_json::Map::new();
                if let Some(attributes) = self.schema.lookup(&entity.type_name)?.attributes() {
                    for attribute in attributes.iter() {
                        if let Some(v) = value_of(&self.schema, entity, attribute.name()) {
                            object.insert(attribute.wire_key().to_string(), self.json(&v, visiting)?);
                        }
                    }
                }
                let json = match &entity.data {
                    EntityData::Record(_) => Json::Object(object),
                    EntityData::Sequence(items) => Json::Array(
                        items
                            .iter()
                            .map(|item| self.json(item, visiting))
                            .collect::<Result<_>>()?,
                    ),
                    EntityData::Map { entries, .. } => {
                        for (k, v) in entries {
                            object.insert(key_text(k), self.json(v, visiting)?);
                        }
                        Json::Object(object)
                    }
                    EntityData::KeyedList { entries, .. } => {
                        for (k, item) in entries {
                            object.insert(key_text(k), self.json(&Value::Ref(*item), visiting)?);
                        }
                        Json::Object(object)
                    }
                };
                visiting.remove(handle);
                json
            }
        })
    }

    /// Writes the document with the options it was loaded with.
    pub fn dump(&self) -> Result<String> {
        self.dump_with(&self.dump_options)
    }

    pub fn dump_with(&self, options: &DumpOptions) -> Result<String> {
        let tree = DumpSession::new(&self.schema, &self.graph, &self.source, options.max_depth)
            .dump(&self.type_ref, &self.root)?;
        Ok(Emitter::new(&tree)
            .indent(options.indent)
            .anchor_prefix(options.anchor_prefix.as_str())
            .emit())
    }

    pub fn dump_to_writer<W: Write>(&self, mut writer: W) -> Result<()> {
        let text = self.dump()?;
        writer.write_all(text.as_bytes())?;
        Ok(())
    }
}
