//! Tests for writing bound documents back out.

#[cfg(test)]
mod tests {
    use crate::typed::{Document, ParseableType, Parser};
    use crate::value::{Handle, Value};
    use pretty_assertions::assert_eq;

    const SCHEMA: &str = r#"types:
- name: Animal
  record:
    attributes:
    - {name: name, type: str}
    - {name: age, type: int}
- name: Kennel
  map: {key: str, value: Animal}
- name: NamedKennel
  keyed_list: {key_attr: name, item: Animal}
- name: NestedKennel
  map: {key: str, value: NamedKennel}
- name: Owner
  record:
    attributes:
    - {name: name, type: str}
    - {name: pets, type: NamedKennel}
- name: OwnerMap
  map: {key: str, value: Owner}
- name: Owners
  keyed_list: {key_attr: name, item: Owner}
- name: AnimalWithFriends
  record:
    attributes:
    - {name: name, type: str}
    - {name: friends, type: AnimalSequence, default: null}
- name: AnimalSequence
  sequence: {item: AnimalWithFriends}
- name: Point
  record:
    attributes:
    - {name: x, type: int}
    - {name: y, type: int, default: null}
- name: Pair
  record:
    attributes:
    - {name: a, type: Point}
    - {name: b, type: Point}
- name: Bag
  record:
    attributes:
    - {name: label, type: str}
    - {name: data}
"#;

    fn parseable(name: &str) -> ParseableType {
        Parser::new(SCHEMA).unwrap().type_by_name(name)
    }

    fn round_trip(type_name: &str, text: &str) -> Document {
        let pt = parseable(type_name);
        let doc = pt
            .load(text)
            .unwrap_or_else(|e| panic!("failed to load {:?}: {}", text, e));
        assert_eq!(pt.dump(&doc).unwrap(), text);
        doc
    }

    fn animal(doc: &mut Document, name: &str, age: i64) -> Handle {
        let handle = doc.new_object("Animal").unwrap();
        doc.set(handle, "name", name).unwrap();
        doc.set(handle, "age", age).unwrap();
        handle
    }

    const FRIENDS: &str = "# no friends :(
- name: Lucy # no friends
- &luna
  name: Luna
  friends:
  - &possum
    name: Possum
    friends: [*luna]
- *possum
";

    #[test]
    fn test_sequence_with_comments_and_cycles() {
        let doc = round_trip("AnimalSequence", FRIENDS);
        let root = doc.root_handle().unwrap();
        let items = doc.items(root).unwrap().to_vec();
        assert_eq!(items.len(), 3);

        let lucy = items[0].as_handle().unwrap();
        assert_eq!(doc.get(lucy, "friends").unwrap(), Value::Null);
        assert!(!doc.is_set(lucy, "friends").unwrap());

        let possum = items[2].as_handle().unwrap();
        let friends = doc.get(possum, "friends").unwrap().as_handle().unwrap();
        assert!(doc.same_entity(&items[1], &doc.items(friends).unwrap()[0]));
    }

    #[test]
    fn test_removed_item_keeps_neighbour_comments() {
        let pt = parseable("AnimalSequence");
        let mut doc = pt
            .load("- name: A\n- name: B # b\n- name: C\n")
            .unwrap();
        let root = doc.root_handle().unwrap();
        doc.remove_item(root, 0).unwrap();
        assert_eq!(pt.dump(&doc).unwrap(), "- name: B # b\n- name: C\n");
    }

    #[test]
    fn test_str_list_round_trip() {
        let doc = round_trip("StrList", "- a\n- 'b c'\n- \"d\"\n");
        let root = doc.root_handle().unwrap();
        assert!(doc
            .sequence_eq(root, &[Value::from("a"), Value::from("b c"), Value::from("d")])
            .unwrap());
    }

    #[test]
    fn test_write_order_follows_insertion() {
        let kennel = parseable("Kennel");
        let mut doc = kennel.new_document();
        let root = doc.new_map("Kennel").unwrap();
        doc.set_root(root).unwrap();
        let possum = animal(&mut doc, "Possum", 5);
        let lucy = animal(&mut doc, "Lucy", 5);
        doc.insert(root, "Possum", possum).unwrap();
        doc.insert(root, "Lucy", lucy).unwrap();
        assert_eq!(
            kennel.dump(&doc).unwrap(),
            "Possum:\n  name: Possum\n  age: 5\nLucy:\n  name: Lucy\n  age: 5\n"
        );

        let named = parseable("NamedKennel");
        let mut doc = named.new_document();
        let root = doc.new_keyed_list("NamedKennel").unwrap();
        doc.set_root(root).unwrap();
        let possum = animal(&mut doc, "Possum", 5);
        let lucy = animal(&mut doc, "Lucy", 5);
        doc.add_keyed(root, possum).unwrap();
        doc.add_keyed(root, lucy).unwrap();
        let yaml = named.dump(&doc).unwrap();
        assert_eq!(yaml, "Possum:\n  age: 5\nLucy:\n  age: 5\n");
        assert!(!yaml.contains("name:"));
    }

    #[test]
    fn test_nested_named_kennel() {
        let doc = round_trip(
            "NestedKennel",
            "bark and play:
  Lucy:
    age: 5
  Possum:
    age: 5
paws for fun:
  Luna:
    age: 1
  Maggie:
    age: 2
",
        );
        let root = doc.root_handle().unwrap();
        let fun = doc.entry(root, "paws for fun").unwrap().unwrap().as_handle().unwrap();
        let maggie = doc.entry(fun, "Maggie").unwrap().unwrap().as_handle().unwrap();
        assert_eq!(doc.get(maggie, "name").unwrap(), Value::from("Maggie"));
        assert_eq!(doc.get(maggie, "age").unwrap(), Value::Int(2));
    }

    #[test]
    fn test_shared_pets_in_map() {
        let doc = round_trip(
            "OwnerMap",
            "Tiffany:
  name: Tiffany
  pets: &lucy_possum
    Lucy:
      age: 5
    Possum:
      age: 5
Jeff:
  name: Jeff
  pets: *lucy_possum
T: {name: T, pets: {Maggie: {age: 2}}}
",
        );
        let root = doc.root_handle().unwrap();
        let tiffany = doc.entry(root, "Tiffany").unwrap().unwrap().as_handle().unwrap();
        let jeff = doc.entry(root, "Jeff").unwrap().unwrap().as_handle().unwrap();
        assert!(doc.same_entity(&doc.get(tiffany, "pets").unwrap(), &doc.get(jeff, "pets").unwrap()));
    }

    #[test]
    fn test_shared_pets_in_keyed_list() {
        let doc = round_trip(
            "Owners",
            "Tiffany:
  pets: &lucy_possum
    Lucy:
      age: 5
    Possum:
      age: 5
Jeff:
  pets: *lucy_possum
T: {pets: {Maggie: {age: 2}}}
",
        );
        let root = doc.root_handle().unwrap();
        let t = doc.entry(root, "T").unwrap().unwrap().as_handle().unwrap();
        assert_eq!(doc.get(t, "name").unwrap(), Value::from("T"));
    }

    #[test]
    fn test_renamed_keyed_item() {
        let pt = parseable("NamedKennel");
        let mut doc = pt.load("Lucy:\n  age: 5\n").unwrap();
        let root = doc.root_handle().unwrap();
        let lucy = doc.entry(root, "Lucy").unwrap().unwrap().as_handle().unwrap();
        doc.set(lucy, "name", "Luna").unwrap();
        assert_eq!(pt.dump(&doc).unwrap(), "Luna:\n  age: 5\n");
    }

    #[test]
    fn test_default_elision() {
        let pt = parseable("Point");

        let mut doc = pt.load("x: 1\n").unwrap();
        let root = doc.root_handle().unwrap();
        doc.set(root, "y", Value::Null).unwrap();
        assert_eq!(pt.dump(&doc).unwrap(), "x: 1\n");

        // A default written in the source stays.
        round_trip("Point", "x: 1\ny: null\n");

        let mut doc = pt.load("x: 1\ny: 3\n").unwrap();
        let root = doc.root_handle().unwrap();
        assert_eq!(doc.unset(root, "y").unwrap(), Some(Value::Int(3)));
        assert_eq!(pt.dump(&doc).unwrap(), "x: 1\n");
    }

    #[test]
    fn test_changed_scalar_keeps_comment() {
        let pt = parseable("Point");
        let mut doc = pt.load("# origin\nx: 0 # left edge\n").unwrap();
        let root = doc.root_handle().unwrap();
        doc.set(root, "x", 4).unwrap();
        assert_eq!(pt.dump(&doc).unwrap(), "# origin\nx: 4 # left edge\n");
    }

    #[test]
    fn test_new_strings_are_quoted() {
        let pt = parseable("Animal");
        let mut doc = pt.load("name: Lucy\nage: 5\n").unwrap();
        let root = doc.root_handle().unwrap();
        doc.set(root, "name", "5").unwrap();
        assert_eq!(pt.dump(&doc).unwrap(), "name: '5'\nage: 5\n");
    }

    #[test]
    fn test_shared_entity_gets_generated_anchor() {
        let pt = parseable("Pair");
        let mut doc = pt.new_document();
        let root = doc.new_object("Pair").unwrap();
        doc.set_root(root).unwrap();
        let point = doc.new_object("Point").unwrap();
        doc.set(point, "x", 1).unwrap();
        doc.set(root, "a", point).unwrap();
        doc.set(root, "b", point).unwrap();
        assert_eq!(pt.dump(&doc).unwrap(), "a: &id001\n  x: 1\nb: *id001\n");

        let reloaded = pt.load(&pt.dump(&doc).unwrap()).unwrap();
        let root = reloaded.root_handle().unwrap();
        assert!(reloaded.same_entity(&reloaded.get(root, "a").unwrap(), &reloaded.get(root, "b").unwrap()));
    }

    #[test]
    fn test_dynamic_values_replay() {
        let doc = round_trip("Bag", "label: raw\ndata: {a: [1, 2], 'b': ~} # untouched\n");
        let root = doc.root_handle().unwrap();
        let data = doc.get(root, "data").unwrap();
        assert_eq!(data.get("a"), Some(&Value::List(vec![Value::Int(1), Value::Int(2)])));

        let pt = parseable("Bag");
        let mut doc = pt.load("label: raw\ndata: [1, 2]\n").unwrap();
        let root = doc.root_handle().unwrap();
        doc.set(root, "data", Value::List(vec![Value::Int(3)])).unwrap();
        assert_eq!(pt.dump(&doc).unwrap(), "label: raw\ndata:\n- 3\n");
    }
}
