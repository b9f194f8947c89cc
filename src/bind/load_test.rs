//! Tests for binding documents to schema types.

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::schema::{Attribute, Primitive, Schema};
    use crate::typed::{ParseableType, Parser};
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const SCHEMA: &str = r#"types:
- name: Animal
  record:
    attributes:
    - {name: name, type: str}
    - {name: age, type: int}
- name: LooseAnimal
  record:
    attributes:
    - {name: name}
    - {name: age}
- name: Kennel
  map: {key: str, value: Animal}
- name: NamedKennel
  keyed_list: {key_attr: name, item: Animal}
- name: TypeCheck
  record:
    attributes:
    - {name: one, type: int}
    - {name: array, type: StrList}
- name: AnimalWithFriend
  record:
    attributes:
    - {name: name, type: str}
    - {name: friend, type: AnimalWithFriend, default: null}
- name: Labelled
  record:
    attributes:
    - {name: label, key: display-name, type: str}
    - {name: size, type: float, default: 1.0}
- name: Tagged
  map:
    key: int
    value: str
    attributes:
    - {name: kind, type: str, default: plain}
"#;

    fn parseable(name: &str) -> ParseableType {
        Parser::new(SCHEMA).unwrap().type_by_name(name)
    }

    fn load_err(type_name: &str, text: &str) -> crate::error::BindError {
        match parseable(type_name).load(text) {
            Ok(_) => panic!("expected {:?} to fail as {}", text, type_name),
            Err(e) => e,
        }
    }

    const KENNEL_YAML: &str = "Lucy:
    name: Lucy
    age: 5
Possum:
    name: Possum
    age: 5
";

    const NAMED_KENNEL_YAML: &str = "Lucy:
    age: 5
Possum:
    age: 5
";

    #[test]
    fn test_bad_root_kind() {
        let err = load_err("LooseAnimal", "[this, is a list]\n");
        assert!(matches!(err.kind(), ErrorKind::StructuralTypeError { .. }));
        let err = load_err("LooseAnimal", "this is a scalar\n");
        assert!(matches!(err.kind(), ErrorKind::StructuralTypeError { .. }));
        let err = load_err("LooseAnimal", "");
        assert!(matches!(err.kind(), ErrorKind::StructuralTypeError { .. }));
    }

    #[test]
    fn test_attributes_applied() {
        let doc = parseable("LooseAnimal").load("name: Possum\nage: 5\n").unwrap();
        let possum = doc.root_handle().unwrap();
        assert_eq!(doc.get(possum, "name").unwrap(), Value::from("Possum"));
        assert_eq!(doc.get(possum, "age").unwrap(), Value::Int(5));
    }

    #[test]
    fn test_bonus_attributes_fail() {
        let err = load_err("LooseAnimal", "name: Possum\nage: 5\nbonus: fail\n");
        assert_eq!(
            err.kind(),
            &ErrorKind::unknown_key("bonus", vec!["name".to_string(), "age".to_string()])
        );
        assert_eq!(err.mark().unwrap().line, 3);
    }

    #[test]
    fn test_duplicate_attribute_fails() {
        let err = load_err("LooseAnimal", "name: Possum\nname: Lucy\nage: 5\n");
        assert_eq!(err.kind(), &ErrorKind::duplicate_key("name"));
    }

    #[test]
    fn test_type_check() {
        let doc = parseable("TypeCheck").load("one: 1\narray: [a, bc]\n").unwrap();
        let root = doc.root_handle().unwrap();
        assert_eq!(doc.get_as::<i64>(root, "one").unwrap(), 1);
        let array = doc.get(root, "array").unwrap().as_handle().unwrap();
        assert!(doc
            .sequence_eq(array, &[Value::from("a"), Value::from("bc")])
            .unwrap());

        let err = load_err("TypeCheck", "one: 1\narray: 99\n");
        assert!(matches!(err.kind(), ErrorKind::StructuralTypeError { .. }));
        assert_eq!(err.path().to_string(), ".array");

        let err = load_err("TypeCheck", "one: a\narray: []\n");
        assert!(matches!(err.kind(), ErrorKind::CoercionFailure { .. }));
        assert_eq!(err.path().to_string(), ".one");
    }

    #[test]
    fn test_lossy_coercion_fails() {
        let err = load_err("TypeCheck", "one: 1.5\narray: []\n");
        assert!(matches!(err.kind(), ErrorKind::CoercionMismatch { .. }));

        let doc = parseable("TypeCheck").load("one: 2.0\narray: []\n").unwrap();
        let root = doc.root_handle().unwrap();
        assert_eq!(doc.get(root, "one").unwrap(), Value::Int(2));
    }

    #[test]
    fn test_missing_required_lists_all() {
        let err = load_err("Animal", "{}\n");
        assert_eq!(
            err.kind(),
            &ErrorKind::missing_required("Animal", vec!["name".to_string(), "age".to_string()])
        );
        assert_eq!(err.mark().unwrap().line, 1);
    }

    #[test]
    fn test_wire_keys_and_defaults() {
        let doc = parseable("Labelled").load("display-name: box\n").unwrap();
        let root = doc.root_handle().unwrap();
        assert_eq!(doc.get(root, "label").unwrap(), Value::from("box"));
        assert_eq!(doc.get(root, "size").unwrap(), Value::Float(1.0));
        assert!(!doc.is_set(root, "size").unwrap());

        let err = load_err("Labelled", "label: box\n");
        assert!(matches!(err.kind(), ErrorKind::UnknownKey { .. }));
    }

    #[test]
    fn test_animal_with_friend_cycle() {
        let doc = parseable("AnimalWithFriend")
            .load("&possum\nname: Possum\nfriend:\n    name: Maggie\n    friend: *possum\n")
            .unwrap();
        let possum = doc.root().clone();
        let maggie = doc.get(possum.as_handle().unwrap(), "friend").unwrap();
        let back = doc.get(maggie.as_handle().unwrap(), "friend").unwrap();
        assert!(doc.same_entity(&possum, &back));
        assert!(!doc.same_entity(&possum, &maggie));
        assert!(doc.to_json().is_err());
    }

    #[test]
    fn test_map_and_keyed_list_apply_attributes() {
        for (type_name, text) in [("Kennel", KENNEL_YAML), ("NamedKennel", NAMED_KENNEL_YAML)] {
            let doc = parseable(type_name).load(text).unwrap();
            let root = doc.root_handle().unwrap();
            let possum = doc.entry(root, "Possum").unwrap().unwrap();
            let possum = possum.as_handle().unwrap();
            assert_eq!(doc.get(possum, "name").unwrap(), Value::from("Possum"));
            assert_eq!(doc.get(possum, "age").unwrap(), Value::Int(5));
        }
    }

    #[test]
    fn test_map_and_keyed_list_bad_shape() {
        // Map values must carry their own name.
        let err = load_err("Kennel", NAMED_KENNEL_YAML);
        assert!(matches!(err.kind(), ErrorKind::MissingRequired { .. }));
        assert_eq!(err.path().to_string(), "[Lucy]");

        // Keyed list items take their name from the key.
        let err = load_err("NamedKennel", KENNEL_YAML);
        assert_eq!(err.kind(), &ErrorKind::duplicate_key("name"));
    }

    #[test]
    fn test_incomplete_entries() {
        let err = load_err("Kennel", "{Lucy: {name: Lucy}}\n");
        assert_eq!(
            err.kind(),
            &ErrorKind::missing_required("Animal", vec!["age".to_string()])
        );
        let err = load_err("NamedKennel", "{Lucy: }\n");
        assert!(matches!(err.kind(), ErrorKind::StructuralTypeError { .. }));
    }

    #[test]
    fn test_merge_key_in_map_fails() {
        let err = load_err("Kennel", "base: &b {name: B, age: 1}\n<<: *b\n");
        assert!(matches!(err.kind(), ErrorKind::StructuralTypeError { .. }));
    }

    #[test]
    fn test_map_keys_and_static_attributes() {
        let doc = parseable("Tagged").load("kind: fancy\n1: one\n2: two\n").unwrap();
        let root = doc.root_handle().unwrap();
        assert_eq!(doc.get(root, "kind").unwrap(), Value::from("fancy"));
        assert_eq!(doc.keys(root).unwrap(), vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(doc.entry(root, 2).unwrap(), Some(Value::from("two")));

        let err = load_err("Tagged", "x: one\n");
        assert!(matches!(err.kind(), ErrorKind::CoercionFailure { .. }));
    }

    #[test]
    fn test_duplicate_map_entries_last_wins() {
        let doc = parseable("Tagged").load("1: one\n1: uno\n").unwrap();
        let root = doc.root_handle().unwrap();
        assert_eq!(doc.keys(root).unwrap(), vec![Value::Int(1)]);
        assert_eq!(doc.entry(root, 1).unwrap(), Some(Value::from("uno")));
    }

    #[test]
    fn test_validator_rejects_value() {
        let schema = Schema::builder()
            .record("PositivePoint", |r| {
                r.attr(Attribute::new("x").of(Primitive::Float).validator(|v| {
                    match v.as_float() {
                        Some(x) if x < 0.0 => Err(format!("Cannot set PositivePoint.x to {}", x)),
                        _ => Ok(()),
                    }
                }))
                .attr(Attribute::new("y").of(Primitive::Float))
            })
            .build()
            .unwrap();
        let pt = Parser::from_schema(schema).type_by_name("PositivePoint");

        let err = pt.load("{ x: -0.0000001, y: 1.0}\n").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ValidationFailure { .. }));
        assert_eq!(err.path().to_string(), ".x");
        assert!(pt.load("{ x: 0.5, y: 1.0}\n").is_ok());
    }

    #[test]
    fn test_undefined_alias_is_syntax_error() {
        let err = load_err("LooseAnimal", "name: *nobody\nage: 1\n");
        assert!(matches!(err.kind(), ErrorKind::Syntax { .. }));
    }

    #[test]
    fn test_recursion_limit() {
        let deep = format!("{}x{}\n", "[".repeat(40), "]".repeat(40));
        let pt = Parser::new(SCHEMA)
            .unwrap()
            .type_of(crate::schema::TypeRef::Any)
            .with_load_options(crate::typed::LoadOptions::builder().max_depth(16).build());
        let err = pt.load(&deep).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::RecursionLimit { limit: 16 });
    }

    #[test]
    fn test_missing_required_in_declaration_order() {
        let schema = Schema::builder()
            .record("Abc", |r| {
                r.attr(Attribute::new("c"))
                    .attr(Attribute::new("a"))
                    .attr(Attribute::new("b"))
                    .attr(Attribute::new("d").default(Value::Null))
            })
            .build()
            .unwrap();
        let err = Parser::from_schema(schema)
            .type_by_name("Abc")
            .load("d: 1\n")
            .unwrap_err();
        match err.kind() {
            ErrorKind::MissingRequired { attributes, .. } => {
                assert_eq!(attributes, &vec!["c", "a", "b"]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_unknown_key_always_fails(key in "[a-z]{1,8}") {
            let text = format!("name: Lucy\nage: 5\nextra_{}: 1\n", key);
            let err = parseable("Animal").load(&text).unwrap_err();
            let is_unknown = matches!(err.kind(), ErrorKind::UnknownKey { .. });
            prop_assert!(is_unknown);
        }

        #[test]
        fn prop_fractional_ints_are_rejected(whole in -1000i64..1000, frac in 1u32..100) {
            let text = format!("name: Lucy\nage: {}.{:02}\n", whole, frac);
            let err = parseable("Animal").load(&text).unwrap_err();
            let is_mismatch = matches!(err.kind(), ErrorKind::CoercionMismatch { .. });
            prop_assert!(is_mismatch);
        }

        #[test]
        fn prop_integral_values_load(age in -100000i64..100000) {
            let text = format!("name: Lucy\nage: {}\n", age);
            let doc = parseable("Animal").load(&text).unwrap();
            let root = doc.root_handle().unwrap();
            prop_assert_eq!(doc.get(root, "age").unwrap(), Value::Int(age));
            prop_assert_eq!(doc.dump().unwrap(), text);
        }
    }
}
