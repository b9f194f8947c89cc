//! Equality comparisons for schema types.
//!
//! Attributes compare structurally by name, wire key, type and default, so a
//! record that re-declares an inherited attribute registers it only once.
//! Validators compare by identity and take no part in hashing.

use super::attribute::{Attribute, Validator};
use super::collection::AttributeCollection;
use super::elements::*;
use std::hash::{Hash, Hasher};

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name
            || self.key != other.key
            || self.type_ref != other.type_ref
            || self.default != other.default
        {
            return false;
        }
        match (&self.validator, &other.validator) {
            (None, None) => true,
            (Some(a), Some(b)) => Validator::same(a, b),
            _ => false,
        }
    }
}

impl Eq for Attribute {}

impl Hash for Attribute {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.key.hash(state);
        self.type_ref.hash(state);
        self.default.hash(state);
    }
}

impl PartialEq for AttributeCollection {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl Eq for AttributeCollection {}

impl PartialEq for TypeKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeKind::Record { attributes: a }, TypeKind::Record { attributes: b }) => a == b,
            (TypeKind::Sequence { item: a }, TypeKind::Sequence { item: b }) => a == b,
            (
                TypeKind::Map {
                    key: k1,
                    value: v1,
                    attributes: a1,
                },
                TypeKind::Map {
                    key: k2,
                    value: v2,
                    attributes: a2,
                },
            ) => k1 == k2 && v1 == v2 && a1 == a2,
            (
                TypeKind::KeyedList {
                    key_attr: k1,
                    item: i1,
                    attributes: a1,
                },
                TypeKind::KeyedList {
                    key_attr: k2,
                    item: i2,
                    attributes: a2,
                },
            ) => k1 == k2 && i1 == i2 && a1 == a2,
            _ => false,
        }
    }
}

impl Eq for TypeKind {}

impl PartialEq for TypeDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.kind == other.kind
    }
}

impl Eq for TypeDef {}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.types() == other.types()
    }
}

impl Eq for Schema {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::collections::HashSet;

    #[test]
    fn test_attribute_structural_equality() {
        let a = Attribute::new("age").of(Primitive::Int).default(0i64);
        let b = Attribute::new("age").of(Primitive::Int).default(0i64);
        let c = Attribute::new("age").of(Primitive::Int).default(Value::Null);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Attribute> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_validators_compare_by_identity() {
        let v = Validator::new(|_| Ok(()));
        let mut a = Attribute::new("x");
        a.validator = Some(v.clone());
        let mut b = Attribute::new("x");
        b.validator = Some(v);
        assert_eq!(a, b);

        let c = Attribute::new("x").validator(|_| Ok(()));
        assert_ne!(a, c);
    }
}
