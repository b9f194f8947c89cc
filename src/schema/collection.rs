//! Ordered attribute registries.

use super::attribute::Attribute;
use crate::error::ErrorKind;
use crate::value::Value;
use std::collections::{HashMap, HashSet};

/// Slot is one position in the written order of a mapping: a static
/// attribute, or a dynamic entry of a map or keyed list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    Attr(String),
    Entry(Value),
}

/// AttributeCollection holds the static attributes of one type in
/// declaration order, indexed by wire key and by name.
#[derive(Debug, Clone, Default)]
pub struct AttributeCollection {
    attributes: Vec<Attribute>,
    by_key: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl AttributeCollection {
    pub fn new() -> Self {
        AttributeCollection::default()
    }

    /// Registers an attribute.
    ///
    /// Re-adding an equal attribute is a no-op. A different attribute reusing
    /// a registered name or wire key is rejected.
    pub fn add(&mut self, attribute: Attribute) -> Result<(), ErrorKind> {
        let by_name = self.by_name.get(attribute.name()).copied();
        let by_key = self.by_key.get(attribute.wire_key()).copied();
        if let (Some(i), Some(j)) = (by_name, by_key) {
            if i == j && self.attributes[i] == attribute {
                return Ok(());
            }
        }
        if by_name.is_some() {
            return Err(ErrorKind::schema(format!(
                "attribute `{}` is declared twice",
                attribute.name()
            )));
        }
        if by_key.is_some() {
            return Err(ErrorKind::schema(format!(
                "key `{}` of attribute `{}` is already in use",
                attribute.wire_key(),
                attribute.name()
            )));
        }

        let index = self.attributes.len();
        self.by_key.insert(attribute.wire_key().to_string(), index);
        self.by_name.insert(attribute.name().to_string(), index);
        self.attributes.push(attribute);
        Ok(())
    }

    pub fn by_key(&self, key: &str) -> Option<&Attribute> {
        self.by_key.get(key).map(|&i| &self.attributes[i])
    }

    pub fn by_name(&self, name: &str) -> Option<&Attribute> {
        self.by_name.get(name).map(|&i| &self.attributes[i])
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Wire keys in declaration order.
    pub fn keys(&self) -> Vec<String> {
        self.attributes
            .iter()
            .map(|a| a.wire_key().to_string())
            .collect()
    }

    /// Attributes without a default.
    pub fn required(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| a.is_required())
    }

    /// Observed order first, then attributes and entries not yet observed.
    ///
    /// Observed slots that no longer exist are dropped. New attributes follow
    /// in declaration order, new entries in `entries` order.
    pub fn display_order(&self, observed: &[Slot], entries: &[Value]) -> Vec<Slot> {
        let live: HashSet<&Value> = entries.iter().collect();
        let mut seen = HashSet::new();
        let mut order = Vec::new();

        for slot in observed {
            let exists = match slot {
                Slot::Attr(name) => self.by_name.contains_key(name),
                Slot::Entry(key) => live.contains(key),
            };
            if exists && seen.insert(slot.clone()) {
                order.push(slot.clone());
            }
        }
        for attribute in &self.attributes {
            let slot = Slot::Attr(attribute.name().to_string());
            if seen.insert(slot.clone()) {
                order.push(slot);
            }
        }
        for key in entries {
            let slot = Slot::Entry(key.clone());
            if seen.insert(slot.clone()) {
                order.push(slot);
            }
        }
        order
    }

    /// Like [`AttributeCollection::display_order`], without the attributes
    /// `elide` selects. Attributes present in `observed` are never elided.
    pub fn dump_order<F>(&self, observed: &[Slot], entries: &[Value], elide: F) -> Vec<Slot>
    where
        F: Fn(&Attribute) -> bool,
    {
        let observed_set: HashSet<&Slot> = observed.iter().collect();
        self.display_order(observed, entries)
            .into_iter()
            .filter(|slot| match slot {
                Slot::Attr(name) => {
                    observed_set.contains(slot)
                        || self.by_name(name).map_or(true, |a| !elide(a))
                }
                Slot::Entry(_) => true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Primitive;

    fn collection() -> AttributeCollection {
        let mut c = AttributeCollection::new();
        c.add(Attribute::new("name").of(Primitive::Str)).unwrap();
        c.add(Attribute::new("age").of(Primitive::Int).default(0i64)).unwrap();
        c.add(Attribute::new("friend").key("best_friend").default(Value::Null))
            .unwrap();
        c
    }

    fn attr(name: &str) -> Slot {
        Slot::Attr(name.to_string())
    }

    #[test]
    fn test_lookup() {
        let c = collection();
        assert_eq!(c.by_key("best_friend").unwrap().name(), "friend");
        assert!(c.by_key("friend").is_none());
        assert_eq!(c.keys(), vec!["name", "age", "best_friend"]);
        let required: Vec<&str> = c.required().map(|a| a.name()).collect();
        assert_eq!(required, vec!["name"]);
    }

    #[test]
    fn test_add_is_idempotent_for_equal_attributes() {
        let mut c = collection();
        c.add(Attribute::new("name").of(Primitive::Str)).unwrap();
        assert_eq!(c.len(), 3);

        let err = c.add(Attribute::new("name").of(Primitive::Int)).unwrap_err();
        assert!(matches!(err, ErrorKind::Schema { .. }));
        let err = c.add(Attribute::new("other").key("age")).unwrap_err();
        assert!(matches!(err, ErrorKind::Schema { .. }));
    }

    #[test]
    fn test_display_order_appends_new() {
        let c = collection();
        let observed = vec![attr("age"), attr("gone"), attr("age")];
        assert_eq!(
            c.display_order(&observed, &[]),
            vec![attr("age"), attr("name"), attr("friend")]
        );
    }

    #[test]
    fn test_display_order_interleaves_entries() {
        let c = collection();
        let observed = vec![
            Slot::Entry(Value::from("lucy")),
            attr("name"),
            Slot::Entry(Value::from("removed")),
        ];
        let entries = vec![Value::from("new"), Value::from("lucy")];
        assert_eq!(
            c.display_order(&observed, &entries),
            vec![
                Slot::Entry(Value::from("lucy")),
                attr("name"),
                attr("age"),
                attr("friend"),
                Slot::Entry(Value::from("new")),
            ]
        );
    }

    #[test]
    fn test_dump_order_elides_unobserved_defaults() {
        let c = collection();
        let observed = vec![attr("name"), attr("friend")];
        let order = c.dump_order(&observed, &[], |a| a.default_value().is_some());
        assert_eq!(order, vec![attr("name"), attr("friend")]);
    }
}
