//! Parse path: binds tree nodes to schema types.

use super::dynamic::{merge_targets, DynamicDecoder};
use super::conform;
use crate::error::{BindError, ErrorKind, Result};
use crate::fieldpath::PathElement;
use crate::graph::{ChildKey, Entity, EntityData, Graph, MergeLink, Origin, RoundTrip};
use crate::schema::{Attribute, AttributeCollection, Schema, Slot, TypeDef, TypeKind, TypeRef};
use crate::tree::{resolve_scalar, Mark, NodeId, NodeKind, Tree};
use crate::value::{coerce, Handle, Value};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Static attributes and provenance gathered from one mapping.
#[derive(Debug, Default)]
struct Body {
    fields: HashMap<String, Value>,
    applied: HashSet<String>,
    order: Vec<Slot>,
    origins: HashMap<ChildKey, Origin>,
    links: Vec<MergeLink>,
    /// Regular pairs read so far.
    written: usize,
    merge_seen: bool,
    merge_position: usize,
    merge_as_sequence: bool,
}

impl Body {
    /// Starts a body whose key attribute is supplied from outside the
    /// mapping.
    fn keyed(attribute: &Attribute, key: Value) -> Self {
        let mut body = Body::default();
        let name = attribute.name().to_string();
        body.applied.insert(name.clone());
        body.order.push(Slot::Attr(name.clone()));
        body.fields.insert(name, key);
        body
    }

    fn add_entry(&mut self, key: Value, origin: Origin) {
        let slot = Slot::Entry(key.clone());
        if !self.order.contains(&slot) {
            self.order.push(slot);
        }
        self.origins.insert(ChildKey::Entry(key), origin);
        self.written += 1;
    }
}

/// LoadSession binds one document.
///
/// Every composite is registered in the identity map before its children
/// are bound, so aliases (including cyclic ones) resolve to the entity being
/// built instead of a copy.
pub(crate) struct LoadSession<'a> {
    schema: &'a Schema,
    tree: &'a Tree,
    graph: Graph,
    bound: HashMap<NodeId, Value>,
    decoder: DynamicDecoder,
    depth: usize,
    max_depth: usize,
}

impl<'a> LoadSession<'a> {
    pub fn new(schema: &'a Schema, tree: &'a Tree, max_depth: usize) -> Self {
        LoadSession {
            schema,
            tree,
            graph: Graph::new(),
            bound: HashMap::new(),
            decoder: DynamicDecoder::new(max_depth),
            depth: 0,
            max_depth,
        }
    }

    /// Binds the root node to `type_ref`.
    pub fn load(mut self, type_ref: &TypeRef) -> Result<(Graph, Value)> {
        let root = self.tree.root().ok_or_else(|| {
            BindError::new(ErrorKind::structural(
                format!("`{}` document", type_ref),
                "empty document",
            ))
        })?;
        debug!(%type_ref, nodes = self.tree.len(), "loading document");
        let value = self.bind(type_ref, None, root)?;
        debug!(entities = self.graph.len(), "loaded document");
        Ok((self.graph, value))
    }

    fn mark(&self, id: NodeId) -> Option<Mark> {
        self.tree.get(id).mark
    }

    fn fail(&self, kind: ErrorKind, id: NodeId) -> BindError {
        BindError::new(kind).at(self.mark(id))
    }

    fn bind(&mut self, type_ref: &TypeRef, default: Option<&Value>, id: NodeId) -> Result<Value> {
        if self.depth >= self.max_depth {
            return Err(self.fail(ErrorKind::RecursionLimit { limit: self.max_depth }, id));
        }
        self.depth += 1;
        let result = self.bind_node(type_ref, default, id);
        self.depth -= 1;
        result
    }

    fn bind_node(&mut self, type_ref: &TypeRef, default: Option<&Value>, id: NodeId) -> Result<Value> {
        let tree = self.tree;
        let id = tree.resolve(id);
        trace!(%type_ref, node = id.index(), "binding node");

        match type_ref {
            TypeRef::Any => {
                if let Some(value) = self.bound.get(&id) {
                    return Ok(value.clone());
                }
                let value = self.decoder.decode(tree, id)?;
                self.bound.insert(id, value.clone());
                Ok(value)
            }
            TypeRef::Primitive(p) => {
                let raw = self.scalar(id, p.name())?;
                coerce(&raw, *p, default).map_err(|e| self.fail(e, id))
            }
            TypeRef::Named(name) => {
                if let Some(existing) = self.bound.get(&id) {
                    return conform(&self.graph, type_ref, None, existing.clone())
                        .map_err(|e| self.fail(e, id));
                }
                if let (Some(default), NodeKind::Scalar(scalar)) = (default, &tree.get(id).kind) {
                    if resolve_scalar(scalar, tree.get(id).meta.tag.as_deref()) == *default {
                        return Ok(default.clone());
                    }
                }

                let schema = self.schema;
                let def = schema.lookup(name).map_err(|e| self.fail(e, id))?;
                match &def.kind {
                    TypeKind::Record { attributes } => {
                        self.load_record(def, attributes, id, None).map(Value::Ref)
                    }
                    TypeKind::Sequence { item } => self.load_sequence(def, item, id),
                    TypeKind::Map {
                        key,
                        value,
                        attributes,
                    } => self.load_map(def, key, value, attributes, id),
                    TypeKind::KeyedList {
                        key_attr,
                        item,
                        attributes,
                    } => self.load_keyed_list(def, key_attr, item, attributes, id),
                }
            }
        }
    }

    fn scalar(&self, id: NodeId, expected: &str) -> Result<Value> {
        let node = self.tree.get(id);
        match &node.kind {
            NodeKind::Scalar(scalar) => Ok(resolve_scalar(scalar, node.meta.tag.as_deref())),
            other => Err(self.fail(ErrorKind::structural(expected, other.describe()), id)),
        }
    }

    fn pairs(&self, id: NodeId, def: &TypeDef) -> Result<&'a [(NodeId, NodeId)]> {
        let tree = self.tree;
        match &tree.get(id).kind {
            NodeKind::Mapping(pairs) => Ok(pairs),
            other => Err(self.fail(
                ErrorKind::structural(format!("mapping for `{}`", def.name), other.describe()),
                id,
            )),
        }
    }

    fn key_text(&self, id: NodeId) -> Result<&'a str> {
        let tree = self.tree;
        match &tree.get(id).kind {
            NodeKind::Scalar(scalar) => Ok(&scalar.text),
            other => Err(self.fail(ErrorKind::structural("scalar key", other.describe()), id)),
        }
    }

    /// The static attribute a pair's key names, if any.
    fn static_attribute<'c>(&self, attributes: &'c AttributeCollection, k: NodeId) -> Option<&'c Attribute> {
        match &self.tree.get(k).kind {
            NodeKind::Scalar(scalar) => attributes.by_key(&scalar.text),
            _ => None,
        }
    }

    fn load_record(
        &mut self,
        def: &TypeDef,
        attributes: &AttributeCollection,
        id: NodeId,
        key: Option<(&Attribute, Value)>,
    ) -> Result<Handle> {
        let pairs = self.pairs(id, def)?;
        let handle = self.graph.alloc(Entity::record(&def.name));
        self.bound.insert(id, Value::Ref(handle));

        let mut body = match key {
            Some((attribute, key)) => Body::keyed(attribute, key),
            None => Body::default(),
        };
        self.publish(handle, &body);
        for &(k, v) in pairs {
            if self.tree.is_merge_key(k) {
                self.read_merge(&mut body, k, v)?;
                continue;
            }
            let text = self.key_text(k)?;
            let attribute = attributes
                .by_key(text)
                .ok_or_else(|| self.fail(ErrorKind::unknown_key(text, attributes.keys()), k))?;
            self.apply(&def.name, attribute, &mut body, k, v)?;
            self.publish(handle, &body);
        }

        self.inherit(&def.name, attributes, &mut body)
            .map_err(|e| e.at(self.mark(id)))?;
        self.store(handle, body, Some(id));
        Ok(handle)
    }

    /// Copies the attributes bound so far onto the entity, so a descendant
    /// merging this record while it is still being read sees them.
    fn publish(&mut self, handle: Handle, body: &Body) {
        if let Some(fields) = self.graph.get_mut(handle).data.fields_mut() {
            fields.clone_from(&body.fields);
        }
    }

    /// Records the parents named by a merge pair.
    fn read_merge(&mut self, body: &mut Body, k: NodeId, v: NodeId) -> Result<()> {
        if !body.merge_seen {
            body.merge_seen = true;
            body.merge_position = body.written;
        }
        let resolved = self.tree.resolve(v);
        if resolved == v && matches!(self.tree.get(v).kind, NodeKind::Sequence(_)) {
            body.merge_as_sequence = true;
        }

        for target in merge_targets(self.tree, v) {
            match self.bound.get(&target) {
                Some(Value::Ref(parent)) if self.graph.get(*parent).is_record() => {
                    let mut link = MergeLink::new(*parent);
                    link.origin = Some(Origin {
                        key: Some(k),
                        value: v,
                    });
                    body.links.push(link);
                }
                Some(_) => debug!(node = target.index(), "merge parent is not a record, ignored"),
                None if self.decoder.contains(target) => {
                    debug!(node = target.index(), "merge parent is dynamic, ignored")
                }
                None => {
                    let node = self.tree.get(target);
                    let anchor = node
                        .meta
                        .anchor
                        .clone()
                        .unwrap_or_else(|| node.kind.describe().to_string());
                    return Err(self.fail(ErrorKind::UnresolvedMerge { anchor }, v));
                }
            }
        }
        Ok(())
    }

    /// Binds the value of a static attribute pair.
    fn apply(
        &mut self,
        type_name: &str,
        attribute: &Attribute,
        body: &mut Body,
        k: NodeId,
        v: NodeId,
    ) -> Result<()> {
        let name = attribute.name();
        if !body.applied.insert(name.to_string()) {
            return Err(self.fail(ErrorKind::duplicate_key(attribute.wire_key()), k));
        }

        let value = self
            .bind(attribute.type_ref(), attribute.default_value(), v)
            .map_err(|e| e.within(PathElement::field_name(name)))?;
        attribute
            .validate(type_name, &value)
            .map_err(|e| self.fail(e, v).within(PathElement::field_name(name)))?;

        body.written += 1;
        body.order.push(Slot::Attr(name.to_string()));
        body.origins.insert(
            ChildKey::Attr(name.to_string()),
            Origin {
                key: Some(k),
                value: v,
            },
        );
        body.fields.insert(name.to_string(), value);
        Ok(())
    }

    /// Resolves every attribute the mapping did not set: from the first merge
    /// parent holding a value for it, else its default. Missing required
    /// attributes are reported together.
    fn inherit(&self, type_name: &str, attributes: &AttributeCollection, body: &mut Body) -> Result<()> {
        let applied = &body.applied;
        for link in &mut body.links {
            let parent = self.graph.get(link.parent);
            link.attributes = self
                .schema
                .find(&parent.type_name)
                .and_then(TypeDef::attributes)
                .into_iter()
                .flat_map(|parent_attributes| parent_attributes.iter())
                .filter(|a| attributes.by_name(a.name()).is_some())
                .filter(|a| !applied.contains(a.name()))
                .map(|a| a.name().to_string())
                .collect();
        }

        let mut missing = Vec::new();
        for attribute in attributes.iter() {
            let name = attribute.name();
            if body.applied.contains(name) {
                continue;
            }
            let inherited = body
                .links
                .iter()
                .filter(|link| link.attributes.iter().any(|a| a == name))
                .find_map(|link| self.graph.get(link.parent).field(name).cloned());

            match inherited {
                Some(value) => {
                    let value = conform(
                        &self.graph,
                        attribute.type_ref(),
                        attribute.default_value(),
                        value,
                    )
                    .and_then(|value| attribute.validate(type_name, &value).map(|_| value))
                    .map_err(|e| BindError::new(e).within(PathElement::field_name(name)))?;
                    trace!(attribute = name, "inherited through merge");
                    body.fields.insert(name.to_string(), value);
                }
                None if attribute.is_required() => missing.push(name.to_string()),
                None => {}
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ErrorKind::missing_required(type_name, missing).into())
        }
    }

    fn store(&mut self, handle: Handle, body: Body, node: Option<NodeId>) {
        let entity = self.graph.get_mut(handle);
        if let Some(fields) = entity.data.fields_mut() {
            *fields = body.fields;
        }
        entity.round_trip = RoundTrip {
            node,
            order: body.order,
            merge_links: body.links,
            merge_position: body.merge_position,
            merge_as_sequence: body.merge_as_sequence,
            origins: body.origins,
        };
    }

    fn load_sequence(&mut self, def: &TypeDef, item: &TypeRef, id: NodeId) -> Result<Value> {
        let tree = self.tree;
        let items = match &tree.get(id).kind {
            NodeKind::Sequence(items) => items,
            other => {
                return Err(self.fail(
                    ErrorKind::structural(format!("sequence for `{}`", def.name), other.describe()),
                    id,
                ))
            }
        };
        let handle = self.graph.alloc(Entity::sequence(&def.name));
        self.bound.insert(id, Value::Ref(handle));

        let mut values = Vec::with_capacity(items.len());
        let mut round_trip = RoundTrip {
            node: Some(id),
            ..RoundTrip::default()
        };
        for (i, &item_id) in items.iter().enumerate() {
            let value = self
                .bind(item, None, item_id)
                .map_err(|e| e.within(PathElement::index(i)))?;
            values.push(value);
            round_trip.origins.insert(
                ChildKey::Index(i),
                Origin {
                    key: None,
                    value: item_id,
                },
            );
        }

        let entity = self.graph.get_mut(handle);
        entity.data = EntityData::Sequence(values);
        entity.round_trip = round_trip;
        Ok(Value::Ref(handle))
    }

    /// Binds a map or keyed list key.
    fn bind_key(&mut self, key_type: &TypeRef, k: NodeId) -> Result<Value> {
        match key_type {
            TypeRef::Primitive(p) => {
                let raw = self.scalar(k, p.name())?;
                coerce(&raw, *p, None).map_err(|e| self.fail(e, k))
            }
            TypeRef::Any | TypeRef::Named(_) => self.decoder.decode(self.tree, k),
        }
    }

    fn reject_merge(&self, def: &TypeDef, k: NodeId) -> Result<()> {
        if self.tree.is_merge_key(k) {
            return Err(self.fail(
                ErrorKind::structural(format!("entry of `{}`", def.name), "merge key"),
                k,
            ));
        }
        Ok(())
    }

    fn load_map(
        &mut self,
        def: &TypeDef,
        key_type: &TypeRef,
        value_type: &TypeRef,
        attributes: &AttributeCollection,
        id: NodeId,
    ) -> Result<Value> {
        let pairs = self.pairs(id, def)?;
        let handle = self.graph.alloc(Entity::map(&def.name));
        self.bound.insert(id, Value::Ref(handle));

        let mut body = Body::default();
        let mut entries = IndexMap::new();
        for &(k, v) in pairs {
            self.reject_merge(def, k)?;
            if let Some(attribute) = self.static_attribute(attributes, k) {
                self.apply(&def.name, attribute, &mut body, k, v)?;
                continue;
            }
            let key = self.bind_key(key_type, k)?;
            let value = self
                .bind(value_type, None, v)
                .map_err(|e| e.within(PathElement::key(key.clone())))?;
            body.add_entry(
                key.clone(),
                Origin {
                    key: Some(k),
                    value: v,
                },
            );
            entries.insert(key, value);
        }

        self.inherit(&def.name, attributes, &mut body)
            .map_err(|e| e.at(self.mark(id)))?;
        self.store(handle, body, Some(id));
        if let EntityData::Map { entries: stored, .. } = &mut self.graph.get_mut(handle).data {
            *stored = entries;
        }
        Ok(Value::Ref(handle))
    }

    fn load_keyed_list(
        &mut self,
        def: &TypeDef,
        key_attr: &str,
        item: &TypeRef,
        attributes: &AttributeCollection,
        id: NodeId,
    ) -> Result<Value> {
        let schema = self.schema;
        let item_def = item
            .as_named()
            .ok_or_else(|| ErrorKind::schema(format!("{}: item must be a record", def.name)))
            .and_then(|name| schema.lookup(name))
            .map_err(|e| self.fail(e, id))?;
        let (item_attributes, key_attribute) = item_def
            .attributes()
            .and_then(|a| a.by_name(key_attr).map(|k| (a, k)))
            .ok_or_else(|| {
                self.fail(ErrorKind::unknown_attribute(item_def.name.as_str(), key_attr), id)
            })?;

        let pairs = self.pairs(id, def)?;
        let handle = self.graph.alloc(Entity::keyed_list(&def.name));
        self.bound.insert(id, Value::Ref(handle));

        let mut body = Body::default();
        let mut entries = IndexMap::new();
        for &(k, v) in pairs {
            self.reject_merge(def, k)?;
            if let Some(attribute) = self.static_attribute(attributes, k) {
                self.apply(&def.name, attribute, &mut body, k, v)?;
                continue;
            }
            let key = self.bind_key(key_attribute.type_ref(), k)?;
            key_attribute
                .validate(&item_def.name, &key)
                .map_err(|e| self.fail(e, k))?;
            let item_handle = self
                .keyed_item(item_def, item_attributes, key_attribute, key.clone(), v)
                .map_err(|e| e.within(PathElement::key(key.clone())))?;
            body.add_entry(
                key.clone(),
                Origin {
                    key: Some(k),
                    value: v,
                },
            );
            entries.insert(key, item_handle);
        }

        self.inherit(&def.name, attributes, &mut body)
            .map_err(|e| e.at(self.mark(id)))?;
        self.store(handle, body, Some(id));
        if let EntityData::KeyedList { entries: stored, .. } = &mut self.graph.get_mut(handle).data {
            *stored = entries;
        }
        Ok(Value::Ref(handle))
    }

    /// Binds one keyed list item whose key comes from the pair's key node.
    ///
    /// An alias to an already bound item creates a new item that inherits
    /// every other attribute from it.
    fn keyed_item(
        &mut self,
        def: &TypeDef,
        attributes: &AttributeCollection,
        key_attribute: &Attribute,
        key: Value,
        v: NodeId,
    ) -> Result<Handle> {
        let resolved = self.tree.resolve(v);
        let existing = match self.bound.get(&resolved) {
            Some(existing) => existing.clone(),
            None => return self.load_record(def, attributes, resolved, Some((key_attribute, key))),
        };

        let parent = match self.graph.resolve(&existing) {
            Some((parent, entity)) if entity.type_name == def.name => parent,
            _ => {
                let found = conform(&self.graph, &TypeRef::named(def.name.as_str()), None, existing.clone())
                    .err()
                    .unwrap_or_else(|| ErrorKind::structural(def.name.as_str(), "alias"));
                return Err(self.fail(found, v));
            }
        };

        debug!(%parent, "keyed item inherits from alias");
        let handle = self.graph.alloc(Entity::record(&def.name));
        let mut body = Body::keyed(key_attribute, key);
        let mut link = MergeLink::new(parent);
        link.origin = Some(Origin { key: None, value: v });
        body.links.push(link);
        self.inherit(&def.name, attributes, &mut body)
            .map_err(|e| e.at(self.mark(v)))?;
        self.store(handle, body, None);
        Ok(handle)
    }
}
