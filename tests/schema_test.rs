use binmsg::core::{deserialize_with, serialize_with};
use binmsg::*;

struct People {
    schema: Schema,
    person: NodeId,
}

/// `{ id: u8, name: str, age: u8, isMarried: bool, mentor: <self> }`, plus
/// `students: [<self>]` when `with_students` is set.
fn people(with_students: bool) -> People {
    let mut schema = Schema::new();
    let person = schema.declare();
    let u8_node = schema.scalar(ScalarType::U8);
    let str_node = schema.scalar(ScalarType::Str);
    let bool_node = schema.scalar(ScalarType::Bool);
    let mut fields = vec![
        ("id", u8_node),
        ("name", str_node),
        ("age", u8_node),
        ("isMarried", bool_node),
        ("mentor", person),
    ];
    if with_students {
        let students = schema.list(person);
        fields.push(("students", students));
    }
    schema.define_object(person, fields).unwrap();
    schema.validate().unwrap();
    People { schema, person }
}

fn person(id: u8, name: &str, age: u8, married: bool, mentor: Value) -> Value {
    Value::map([
        ("id", Value::U8(id)),
        ("name", Value::from(name)),
        ("age", Value::U8(age)),
        ("isMarried", Value::Bool(married)),
        ("mentor", mentor),
    ])
}

fn with_students(mut value: Value, students: Vec<Value>) -> Value {
    if let Value::Map(map) = &mut value {
        map.insert("students".to_string(), Value::List(students));
    }
    value
}

fn round_trip(value: &Value, ty: ScalarType) -> Value {
    let mut schema = Schema::new();
    let node = schema.scalar(ty);
    let bytes = serialize(value, &schema, node).unwrap();
    deserialize(&bytes, &schema, node).unwrap()
}

#[test]
fn test_scalar_round_trip() {
    let cases = vec![
        (Value::U8(5), ScalarType::U8),
        (Value::U16(3647), ScalarType::U16),
        (Value::U32(4823823), ScalarType::U32),
        (Value::I8(67), ScalarType::I8),
        (Value::I16(2343), ScalarType::I16),
        (Value::I32(4534544), ScalarType::I32),
        (Value::I8(-67), ScalarType::I8),
        (Value::I32(-4534544), ScalarType::I32),
        (Value::Bool(true), ScalarType::Bool),
        (Value::Bool(false), ScalarType::Bool),
        (Value::from("Lorem ipsum dolor sit amet"), ScalarType::Str),
        (Value::from(""), ScalarType::Str),
    ];
    for (value, ty) in cases {
        assert_eq!(round_trip(&value, ty), value, "type {}", ty);
    }
}

#[test]
fn test_float_round_trip() {
    match round_trip(&Value::F32(134.24), ScalarType::F32) {
        Value::F32(v) => assert_eq!(format!("{:.2}", v), "134.24"),
        other => panic!("unexpected {:?}", other),
    }
    match round_trip(&Value::F64(5454243.5454523), ScalarType::F64) {
        Value::F64(v) => assert_eq!(format!("{:.7}", v), "5454243.5454523"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_scalar_layout_is_big_endian() {
    let mut schema = Schema::new();
    let node = schema.scalar(ScalarType::U16);
    let bytes = serialize(&Value::U16(3647), &schema, node).unwrap();
    assert_eq!(&bytes[..], &[0x0E, 0x3F]);

    let node = schema.scalar(ScalarType::Str);
    let bytes = serialize(&Value::from("hi"), &schema, node).unwrap();
    assert_eq!(&bytes[..], &[0x22, b'h', b'i']);
}

#[test]
fn test_numbers_truncate_to_declared_width() {
    assert_eq!(round_trip(&Value::U32(70000), ScalarType::U16), Value::U16(4464));
    assert_eq!(round_trip(&Value::I32(-1), ScalarType::U8), Value::U8(255));
    assert_eq!(round_trip(&Value::F64(27.9), ScalarType::U8), Value::U8(27));
}

#[test]
fn test_array() {
    let mut schema = Schema::new();
    let u8_node = schema.scalar(ScalarType::U8);
    let list = schema.list(u8_node);
    let arr: Vec<Value> = [10u8, 25, 32, 1, 0, 255, 16, 33, 77, 90]
        .into_iter()
        .map(Value::U8)
        .collect();
    let value = Value::List(arr);
    let bytes = serialize(&value, &schema, list).unwrap();
    assert_eq!(bytes.len(), 11);
    assert_eq!(deserialize(&bytes, &schema, list).unwrap(), value);
}

#[test]
fn test_long_list_uses_wider_size_tag() {
    let mut schema = Schema::new();
    let bool_node = schema.scalar(ScalarType::Bool);
    let list = schema.list(bool_node);
    let value = Value::List((0..40).map(|i| Value::Bool(i % 3 == 0)).collect());
    let bytes = serialize(&value, &schema, list).unwrap();
    assert_eq!(&bytes[..2], &[0x40, 40]);
    assert_eq!(bytes.len(), 42);
    assert_eq!(deserialize(&bytes, &schema, list).unwrap(), value);
}

#[test]
fn test_null_mentor() {
    let People { schema, person: node } = people(false);
    let value = person(1, "John", 27, false, Value::Null);

    let bytes = serialize(&value, &schema, node).unwrap();
    assert_eq!(
        &bytes[..],
        &[0x25, 1, 0x24, b'J', b'o', b'h', b'n', 27, 0, 0x20]
    );

    let decoded = deserialize(&bytes, &schema, node).unwrap();
    assert_eq!(decoded, value);
    assert_eq!(decoded.get("mentor"), Some(&Value::Null));
}

#[test]
fn test_self_referential_object() {
    let People { schema, person: node } = people(false);
    let value = person(
        1,
        "John",
        27,
        false,
        person(2, "Jane", 33, true, person(3, "Nike", 11, false, Value::Null)),
    );

    let bytes = serialize(&value, &schema, node).unwrap();
    let decoded = deserialize(&bytes, &schema, node).unwrap();
    assert_eq!(decoded, value);

    let nike = decoded
        .get("mentor")
        .and_then(|m| m.get("mentor"))
        .unwrap();
    assert_eq!(nike.get("name"), Some(&Value::from("Nike")));
    assert!(nike.get("mentor").unwrap().is_null());
}

#[test]
fn test_combined_object_and_list_recursion() {
    let People { schema, person: node } = people(true);
    let value = with_students(
        person(
            1,
            "John",
            27,
            false,
            with_students(person(2, "Jane", 33, true, Value::Null), vec![]),
        ),
        vec![
            with_students(person(3, "Money", 214, false, Value::Null), vec![]),
            with_students(person(4, "George", 37, true, Value::Null), vec![]),
        ],
    );

    let bytes = serialize(&value, &schema, node).unwrap();
    let decoded = deserialize(&bytes, &schema, node).unwrap();
    assert_eq!(decoded, value);

    let students = decoded.get("students").and_then(Value::as_list).unwrap();
    let names: Vec<_> = students
        .iter()
        .map(|s| s.get("name").and_then(Value::as_str).unwrap())
        .collect();
    assert_eq!(names, ["Money", "George"]);
}

#[test]
fn test_fields_follow_schema_order() {
    let People { schema, person: node } = people(false);
    let value = Value::map([
        ("mentor", Value::Null),
        ("isMarried", Value::Bool(true)),
        ("age", Value::U8(40)),
        ("name", Value::from("Ann")),
        ("id", Value::U8(9)),
    ]);
    let bytes = serialize(&value, &schema, node).unwrap();
    assert_eq!(bytes[1], 9);

    let decoded = deserialize(&bytes, &schema, node).unwrap();
    let keys: Vec<_> = decoded.as_map().unwrap().keys().cloned().collect();
    assert_eq!(keys, ["id", "name", "age", "isMarried", "mentor"]);
    assert_eq!(decoded, value);
}

#[test]
fn test_absent_object_field_is_null() {
    let People { schema, person: node } = people(false);
    let mut value = person(1, "John", 27, false, Value::Null);
    if let Value::Map(map) = &mut value {
        map.shift_remove("mentor");
    }
    let bytes = serialize(&value, &schema, node).unwrap();
    let decoded = deserialize(&bytes, &schema, node).unwrap();
    assert_eq!(decoded.get("mentor"), Some(&Value::Null));
}

#[test]
fn test_growth_preserves_output() {
    let People { schema, person: node } = people(true);
    let students = (0..50u8)
        .map(|i| {
            let student = person(i, "Student with a long name", i, i % 2 == 0, Value::Null);
            with_students(student, vec![])
        })
        .collect();
    let value = with_students(person(1, "John", 27, false, Value::Null), students);

    let tiny = Options::default().with_initial_capacity(1);
    let roomy = Options::default().with_initial_capacity(1 << 16);
    let small = serialize_with(&value, &schema, node, &tiny).unwrap();
    let large = serialize_with(&value, &schema, node, &roomy).unwrap();
    assert!(small.len() > 1000);
    assert_eq!(small, large);
    assert_eq!(deserialize(&small, &schema, node).unwrap(), value);
}

#[test]
fn test_type_mismatch() {
    let mut schema = Schema::new();
    let node = schema.scalar(ScalarType::U8);
    let err = serialize(&Value::from("five"), &schema, node).unwrap_err();
    assert!(matches!(
        err,
        CodecError::TypeMismatch { expected: "u8", found: "str" }
    ));

    let list = schema.list(node);
    assert!(matches!(
        serialize(&Value::U8(1), &schema, list),
        Err(CodecError::TypeMismatch { expected: "list", .. })
    ));
}

#[test]
fn test_missing_scalar_field() {
    let People { schema, person: node } = people(false);
    let value = Value::map([("id", Value::U8(1))]);
    assert!(matches!(
        serialize(&value, &schema, node),
        Err(CodecError::MissingField(field)) if field == "name"
    ));
}

#[test]
fn test_truncated_input() {
    let People { schema, person: node } = people(false);
    let value = person(1, "John", 27, false, Value::Null);
    let bytes = serialize(&value, &schema, node).unwrap();
    for len in 0..bytes.len() {
        assert!(
            deserialize(&bytes[..len], &schema, node).is_err(),
            "prefix of {} bytes decoded",
            len
        );
    }
}

#[test]
fn test_field_count_mismatch() {
    let People { schema, person: node } = people(false);
    let bytes = [0x23, 1, 0x20, 27];
    assert!(matches!(
        deserialize(&bytes, &schema, node),
        Err(CodecError::FieldCountMismatch { expected: 5, actual: 3 })
    ));
}

#[test]
fn test_invalid_utf8() {
    let mut schema = Schema::new();
    let node = schema.scalar(ScalarType::Str);
    assert!(matches!(
        deserialize(&[0x22, 0xC3, 0x28], &schema, node),
        Err(CodecError::Decode(_))
    ));
}

#[test]
fn test_depth_limit() {
    let People { schema, person: node } = people(false);
    let value = person(
        1,
        "John",
        27,
        false,
        person(2, "Jane", 33, true, person(3, "Nike", 11, false, Value::Null)),
    );

    let shallow = Options::default().with_max_depth(2);
    assert!(matches!(
        serialize_with(&value, &schema, node, &shallow),
        Err(CodecError::DepthLimitExceeded(2))
    ));

    let enough = Options::default().with_max_depth(3);
    let bytes = serialize_with(&value, &schema, node, &enough).unwrap();
    assert_eq!(deserialize_with(&bytes, &schema, node, &enough).unwrap(), value);
    assert!(matches!(
        deserialize_with(&bytes, &schema, node, &shallow),
        Err(CodecError::DepthLimitExceeded(2))
    ));
}

#[test]
fn test_undefined_node() {
    let mut schema = Schema::new();
    let node = schema.declare();
    assert!(matches!(
        serialize(&Value::Null, &schema, node),
        Err(CodecError::UndefinedNode(0))
    ));
}

#[test]
fn test_named_schema_lookup() {
    let People { mut schema, person: node } = people(false);
    schema.name(node, "Person");
    let root = schema.lookup("Person").unwrap();
    let value = person(7, "Lee", 50, true, Value::Null);
    let bytes = serialize(&value, &schema, root).unwrap();
    assert_eq!(deserialize(&bytes, &schema, node).unwrap(), value);
}
