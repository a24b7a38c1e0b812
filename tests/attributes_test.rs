use hprose_encoder::{
    lookup, marshal, register_as, register_with, unmarshal, Decode, Encode, HproseError,
    Struct, Value,
};

// ============================================================================
// Class names and field aliases
// ============================================================================

#[derive(Encode, Decode, PartialEq, Debug, Default)]
#[hprose(name = "user.Account")]
#[allow(non_snake_case)]
struct Account {
    #[hprose(rename = "ID")]
    id: u32,
    Email: String,
}

#[test]
fn test_class_name_and_rename() {
    let account = Account {
        id: 7,
        Email: "a@b.c".to_string(),
    };
    let bytes = marshal(&account).unwrap();
    assert_eq!(
        &bytes[..],
        b"c12\"user.Account\"2{s2\"ID\"s5\"email\"}o0{7s5\"a@b.c\"}"
    );

    let decoded: Account = unmarshal(&bytes).unwrap();
    assert_eq!(decoded, account);
}

#[derive(Encode, Decode, PartialEq, Debug, Default)]
struct Tagged {
    #[hprose(alias(xml = "Nm"))]
    name: String,
    #[hprose(alias(json = "years", xml = "Age"))]
    age: i32,
}

#[test]
fn test_alias_namespaces() {
    let meta = register_with::<Tagged>(Some("TaggedXml"), &["xml"]).unwrap();
    let aliases: Vec<&str> = meta.fields.iter().map(|f| f.alias.as_str()).collect();
    // `json` is consulted before the registered namespaces.
    assert_eq!(aliases, vec!["Nm", "years"]);
    assert!(lookup("TaggedXml").is_some());

    let bytes = marshal(&Tagged {
        name: "Ann".to_string(),
        age: 30,
    })
    .unwrap();
    assert_eq!(
        &bytes[..],
        b"c9\"TaggedXml\"2{s2\"Nm\"s5\"years\"}o0{s3\"Ann\"i30;}"
    );
}

#[derive(Encode, Decode, Debug, Default)]
struct Clash {
    #[hprose(alias(json = "key"))]
    a: i32,
    key: i32,
}

#[test]
fn test_ambiguous_field_is_reported() {
    let result = marshal(&Clash { a: 1, key: 2 });
    match result {
        Err(HproseError::AmbiguousField { class, alias }) => {
            assert_eq!(class, "Clash");
            assert_eq!(alias, "key");
        }
        other => panic!("expected AmbiguousField, got {:?}", other),
    }
}

// ============================================================================
// Skip and flatten
// ============================================================================

#[derive(Encode, Decode, PartialEq, Debug, Default)]
struct Cached {
    id: i32,
    #[hprose(skip)]
    cache: Vec<u8>,
}

#[test]
fn test_skip_field() {
    let value = Cached {
        id: 5,
        cache: vec![1, 2, 3],
    };
    let bytes = marshal(&value).unwrap();
    assert_eq!(&bytes[..], b"c6\"Cached\"1{s2\"id\"}o0{5}");

    let decoded: Cached = unmarshal(&bytes).unwrap();
    assert_eq!(decoded.id, 5);
    assert!(decoded.cache.is_empty());
}

#[derive(Encode, Decode, PartialEq, Debug, Default)]
struct Audit {
    created_by: String,
    version: i32,
}

#[derive(Encode, Decode, PartialEq, Debug, Default)]
struct Doc {
    title: String,
    #[hprose(flatten)]
    audit: Audit,
}

#[test]
fn test_flatten_inlines_fields() {
    assert_eq!(Doc::FIELD_COUNT, 3);
    let doc = Doc {
        title: "hi".to_string(),
        audit: Audit {
            created_by: "bob".to_string(),
            version: 2,
        },
    };
    let bytes = marshal(&doc).unwrap();
    assert_eq!(
        &bytes[..],
        b"c3\"Doc\"3{s5\"title\"s10\"created_by\"s7\"version\"}o0{s2\"hi\"s3\"bob\"2}"
    );

    let decoded: Doc = unmarshal(&bytes).unwrap();
    assert_eq!(decoded, doc);
}

// ============================================================================
// Struct shapes
// ============================================================================

#[derive(Encode, Decode, PartialEq, Debug, Default)]
#[hprose(as_map)]
struct Point {
    x: i32,
    y: i32,
}

#[test]
fn test_as_map() {
    let bytes = marshal(&Point { x: 1, y: 2 }).unwrap();
    assert_eq!(&bytes[..], b"m2{ux1uy2}");
    let decoded: Point = unmarshal(&bytes).unwrap();
    assert_eq!(decoded, Point { x: 1, y: 2 });
}

#[derive(Encode, Decode, PartialEq, Debug, Default)]
struct Pair(i32, String);

#[test]
fn test_tuple_struct_is_a_list() {
    let bytes = marshal(&Pair(1, "one".to_string())).unwrap();
    assert_eq!(&bytes[..], b"a2{1s3\"one\"}");
    let decoded: Pair = unmarshal(&bytes).unwrap();
    assert_eq!(decoded, Pair(1, "one".to_string()));

    assert!(matches!(
        unmarshal::<Pair>(b"a1{1}"),
        Err(HproseError::Cast { from: "list", .. })
    ));
}

#[derive(Encode, Decode, PartialEq, Debug, Default)]
struct Marker;

#[test]
fn test_unit_struct() {
    let bytes = marshal(&Marker).unwrap();
    assert_eq!(&bytes[..], b"c6\"Marker\"{}o0{}");
    let decoded: Marker = unmarshal(&bytes).unwrap();
    assert_eq!(decoded, Marker);
}

// ============================================================================
// Reading structs from other shapes
// ============================================================================

#[derive(Encode, Decode, PartialEq, Debug, Default)]
struct User {
    id: u32,
    name: String,
}

#[test]
fn test_struct_from_map_and_list() {
    let from_map: User = unmarshal(b"m3{s2\"id\"i42;s4\"name\"s5\"hello\"s5\"extra\"t}").unwrap();
    assert_eq!(
        from_map,
        User {
            id: 42,
            name: "hello".to_string()
        }
    );

    let from_list: User = unmarshal(b"a2{i42;s5\"hello\"}").unwrap();
    assert_eq!(from_list, from_map);
}

#[test]
fn test_struct_from_other_class_matches_by_field_name() {
    // Fields are matched by name, in any order; unknown fields are skipped.
    let bytes = b"c5\"Other\"3{s4\"name\"s4\"note\"s2\"id\"}o0{s3\"Bob\"s4\"none\"9}";
    let user: User = unmarshal(bytes).unwrap();
    assert_eq!(
        user,
        User {
            id: 9,
            name: "Bob".to_string()
        }
    );
}

#[test]
fn test_registered_class_reads_as_object_value() {
    #[derive(Encode, Decode, Default)]
    struct Ship {
        name: String,
    }
    register_as::<Ship>("fleet.Ship").unwrap();

    let bytes = marshal(&Ship {
        name: "Argo".to_string(),
    })
    .unwrap();
    let value: Value = unmarshal(&bytes).unwrap();
    match value {
        Value::Object(object) => {
            assert_eq!(object.class, "fleet.Ship");
            assert_eq!(object.fields["name"], Value::from("Argo"));
        }
        other => panic!("expected an object, got {:?}", other),
    }
}

#[test]
fn test_unregistered_class_reads_as_map_value() {
    let bytes = marshal(&User {
        id: 1,
        name: "x".to_string(),
    })
    .unwrap();
    let value: Value = unmarshal(&bytes).unwrap();
    assert_eq!(value.get("id"), Some(&Value::Int(1)));
    assert_eq!(value.get("name"), Some(&Value::from("x")));
    assert!(matches!(value, Value::Map(_)));
}

#[derive(Decode, Struct, Default, Debug, PartialEq)]
struct Reply {
    status: i32,
    message: String,
}

#[test]
fn test_decode_only_struct() {
    let reply: Reply = unmarshal(b"m2{s6\"status\"1s7\"message\"s2\"ok\"}").unwrap();
    assert_eq!(
        reply,
        Reply {
            status: 1,
            message: "ok".to_string(),
        }
    );
}
