use bigdecimal::BigDecimal;
use hprose_encoder::{
    convert, marshal, unmarshal, Decode, Decoder, Encode, Formatter, HproseError, LongType,
    MapType, RealType, Value,
};
use num_bigint::BigInt;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

// ============================================================================
// Scalars
// ============================================================================

#[test]
fn test_string_to_numbers() {
    assert_eq!(unmarshal::<i32>(b"s3\"123\"").unwrap(), 123);
    assert_eq!(unmarshal::<u64>(b"u7").unwrap(), 7);
    assert_eq!(unmarshal::<f64>(b"s4\"1.25\"").unwrap(), 1.25);
    assert!(matches!(
        unmarshal::<i32>(b"s3\"abc\""),
        Err(HproseError::Parse { target: "i32", .. })
    ));
}

#[test]
fn test_numbers_to_string() {
    assert_eq!(unmarshal::<String>(b"i123;").unwrap(), "123");
    assert_eq!(unmarshal::<String>(b"7").unwrap(), "7");
    assert_eq!(unmarshal::<String>(b"d1.5;").unwrap(), "1.5");
    assert_eq!(unmarshal::<String>(b"t").unwrap(), "true");
    assert_eq!(unmarshal::<String>(b"n").unwrap(), "");
    assert_eq!(unmarshal::<String>(b"b5\"Hello\"").unwrap(), "Hello");
}

#[test]
fn test_bool_coercions() {
    assert!(unmarshal::<bool>(b"s4\"true\"").unwrap());
    assert!(!unmarshal::<bool>(b"uF").unwrap());
    assert!(unmarshal::<bool>(b"i-3;").unwrap());
    assert!(!unmarshal::<bool>(b"0").unwrap());
    assert!(!unmarshal::<bool>(b"d0;").unwrap());
    assert!(unmarshal::<bool>(b"s3\"yes\"").is_err());
}

#[test]
fn test_integer_coercions() {
    assert_eq!(unmarshal::<i64>(b"t").unwrap(), 1);
    assert_eq!(unmarshal::<i64>(b"e").unwrap(), 0);
    assert_eq!(unmarshal::<i64>(b"d3.99;").unwrap(), 3);
    // Long values wrap into narrower targets.
    assert_eq!(unmarshal::<i32>(b"l4294967297;").unwrap(), 1);
    assert_eq!(unmarshal::<f64>(b"i42;").unwrap(), 42.0);
}

#[test]
fn test_date_to_integer_is_unix_seconds() {
    assert_eq!(unmarshal::<i64>(b"D19700102Z").unwrap(), 86400);
}

#[test]
fn test_string_to_bytes() {
    let bytes: Vec<u8> = unmarshal(b"s5\"Hello\"").unwrap();
    assert_eq!(bytes, b"Hello");
}

#[test]
fn test_cast_error_names_both_sides() {
    match unmarshal::<i32>(b"a{}") {
        Err(HproseError::Cast { from, to }) => {
            assert_eq!(from, "list");
            assert_eq!(to, "i32");
        }
        other => panic!("expected a cast error, got {:?}", other),
    }
}

// ============================================================================
// Containers
// ============================================================================

#[test]
fn test_list_to_map_keyed_by_index() {
    let map: HashMap<i32, String> = unmarshal(b"a2{u1u2}").unwrap();
    assert_eq!(map[&0], "1");
    assert_eq!(map[&1], "2");
}

#[test]
fn test_object_to_map_keyed_by_field_name() {
    #[derive(Encode, Default)]
    struct Sample {
        a: i32,
        b: String,
    }
    let bytes = marshal(&Sample {
        a: 3,
        b: "bee".to_string(),
    })
    .unwrap();
    let map: BTreeMap<String, String> = unmarshal(&bytes).unwrap();
    assert_eq!(map["a"], "3");
    assert_eq!(map["b"], "bee");
}

#[test]
fn test_null_to_empty_containers() {
    assert!(unmarshal::<Vec<i32>>(b"n").unwrap().is_empty());
    assert!(unmarshal::<HashMap<String, i32>>(b"e").unwrap().is_empty());
}

#[test]
fn test_tuple_from_list() {
    let tuple: (i32, String, bool) = unmarshal(b"a3{1s2\"ab\"t}").unwrap();
    assert_eq!(tuple, (1, "ab".to_string(), true));
    assert!(unmarshal::<(i32, i32)>(b"a3{123}").is_err());
}

// ============================================================================
// Recovery
// ============================================================================

#[derive(Encode, Decode, Default, Debug, PartialEq)]
struct Loose {
    id: i32,
    tags: Vec<String>,
}

#[test]
fn test_field_error_keeps_default_and_is_carried() {
    let bytes = b"m2{s2\"id\"s3\"abc\"s4\"tags\"a2{uxuy}}";

    let mut dec = Decoder::new(bytes::Bytes::from_static(bytes), false);
    let loose: Loose = dec.decode().unwrap();
    assert_eq!(loose.id, 0);
    assert_eq!(loose.tags, vec!["x".to_string(), "y".to_string()]);
    assert!(matches!(dec.error(), Some(HproseError::Parse { .. })));

    // The one-shot entry point reports the carried error.
    assert!(unmarshal::<Loose>(bytes).is_err());
}

#[test]
fn test_list_item_error_skips_rest() {
    let mut dec = Decoder::new(bytes::Bytes::from_static(b"a3{1a{}2}7"), false);
    let result = dec.decode::<Vec<i32>>();
    assert!(matches!(result, Err(HproseError::Cast { .. })));
    // The list was consumed completely, so the next value is readable.
    assert_eq!(dec.decode::<i32>().unwrap(), 7);
}

#[test]
fn test_unexpected_eof() {
    assert!(matches!(
        unmarshal::<String>(b"s5\"Hel"),
        Err(HproseError::UnexpectedEof)
    ));
}

#[test]
fn test_depth_limit() {
    let formatter = Formatter::new().max_depth(3);
    let result = formatter.unmarshal::<Value>(b"a1{a1{a1{a1{}}}}");
    assert!(matches!(result, Err(HproseError::DepthLimit(3))));
}

/// `levels` nested single-item lists around a `n`.
fn nested_lists(levels: usize) -> Vec<u8> {
    let mut bytes = b"a1{".repeat(levels);
    bytes.push(b'n');
    bytes.extend(b"}".repeat(levels));
    bytes
}

fn on_small_stack<F: FnOnce() + Send + 'static>(f: F) {
    std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap();
}

#[test]
fn test_default_depth_limit_fits_small_stack() {
    on_small_stack(|| {
        let mut value: Value = unmarshal(&nested_lists(127)).unwrap();
        let mut levels = 0;
        while let Value::List(mut items) = value {
            assert_eq!(items.len(), 1);
            value = items.pop().unwrap();
            levels += 1;
        }
        assert_eq!(levels, 127);
        assert_eq!(value, Value::Null);

        let result = unmarshal::<Value>(&nested_lists(128));
        assert!(matches!(result, Err(HproseError::DepthLimit(128))));
    });
}

#[test]
fn test_default_depth_limit_for_value_list() {
    on_small_stack(|| {
        let list: Vec<Value> = unmarshal(&nested_lists(127)).unwrap();
        assert_eq!(list.len(), 1);

        let result = unmarshal::<Vec<Value>>(&nested_lists(128));
        assert!(matches!(result, Err(HproseError::DepthLimit(128))));
    });
}

// ============================================================================
// Value
// ============================================================================

#[test]
fn test_value_long_types() {
    let bytes = b"l18446744073709551615;";
    let unsigned: Value = Formatter::new()
        .long_type(LongType::Uint)
        .unmarshal(bytes)
        .unwrap();
    assert_eq!(unsigned, Value::Uint(u64::MAX));

    let big: Value = Formatter::new()
        .long_type(LongType::BigInt)
        .unmarshal(bytes)
        .unwrap();
    assert_eq!(
        big,
        Value::BigInt(BigInt::from_str("18446744073709551615").unwrap())
    );

    let small: Value = unmarshal(b"i-12;").unwrap();
    assert_eq!(small, Value::Int(-12));
}

#[test]
fn test_value_real_types() {
    let single: Value = Formatter::new()
        .real_type(RealType::Float32)
        .unmarshal(b"d1.5;")
        .unwrap();
    assert_eq!(single, Value::Float32(1.5));

    let decimal: Value = Formatter::new()
        .real_type(RealType::BigFloat)
        .unmarshal(b"d0.1;")
        .unwrap();
    assert_eq!(
        decimal,
        Value::BigFloat(BigDecimal::from_str("0.1").unwrap())
    );

    let double: Value = unmarshal(b"d0.1;").unwrap();
    assert_eq!(double.as_f64(), Some(0.1));
}

#[test]
fn test_value_map_types() {
    let bytes = b"m1{12}";
    let keyed: Value = unmarshal(bytes).unwrap();
    assert_eq!(keyed.get("1"), Some(&Value::Int(2)));

    let any: Value = Formatter::new()
        .map_type(MapType::AnyKeyed)
        .unmarshal(bytes)
        .unwrap();
    assert_eq!(any, Value::AnyMap(vec![(Value::Int(1), Value::Int(2))]));
}

#[test]
fn test_value_round_trip_of_list() {
    let value = Value::List(vec![
        Value::Null,
        Value::from(true),
        Value::from("text"),
        Value::Bytes(bytes::Bytes::from_static(b"\x01\x02")),
    ]);
    let bytes = marshal(&value).unwrap();
    assert_eq!(&bytes[..], b"a4{nts4\"text\"b2\"\x01\x02\"}");
    assert_eq!(unmarshal::<Value>(&bytes).unwrap(), value);
}

#[test]
fn test_convert() {
    assert_eq!(convert::<i64>(&Value::from("42")).unwrap(), 42);
    assert_eq!(convert::<String>(&Value::from(1.5f64)).unwrap(), "1.5");
    let list = Value::List(vec![Value::from(1), Value::from(2)]);
    assert_eq!(convert::<Vec<u16>>(&list).unwrap(), vec![1, 2]);
}
