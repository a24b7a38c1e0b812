use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use hprose_encoder::{marshal, unmarshal, Decode, Encode, Encoder, RemoteError, Value};
use indexmap::IndexMap;
use num_complex::Complex;
use std::sync::Arc;

#[derive(Encode, Decode, PartialEq, Debug, Default, Clone)]
struct Person {
    name: String,
    age: i32,
    male: bool,
}

// ============================================================================
// Scalars
// ============================================================================

#[test]
fn test_small_integers_are_single_digits() {
    let mut enc = Encoder::new(false);
    enc.encode(&0i32).unwrap();
    enc.encode(&1u8).unwrap();
    enc.encode(&123i64).unwrap();
    enc.encode(&u64::MAX).unwrap();
    assert_eq!(enc.bytes(), b"01i123;l18446744073709551615;");
}

#[test]
fn test_integer_boundaries() {
    assert_eq!(&marshal(&2147483647i32).unwrap()[..], b"i2147483647;");
    assert_eq!(&marshal(&-2147483648i32).unwrap()[..], b"i-2147483648;");
    assert_eq!(&marshal(&2147483648i64).unwrap()[..], b"l2147483648;");
    assert_eq!(&marshal(&-2147483649i64).unwrap()[..], b"l-2147483649;");
    assert_eq!(&marshal(&2147483648u32).unwrap()[..], b"l2147483648;");
    assert_eq!(&marshal(&-5i8).unwrap()[..], b"i-5;");
    assert_eq!(&marshal(&10u16).unwrap()[..], b"i10;");
}

#[test]
fn test_bool_and_nil() {
    assert_eq!(&marshal(&true).unwrap()[..], b"t");
    assert_eq!(&marshal(&false).unwrap()[..], b"f");
    assert_eq!(&marshal(&()).unwrap()[..], b"n");
    assert_eq!(&marshal(&None::<i32>).unwrap()[..], b"n");
}

#[test]
fn test_float_nan_and_infinity() {
    assert_eq!(&marshal(&f32::NAN).unwrap()[..], b"N");
    assert_eq!(&marshal(&f64::INFINITY).unwrap()[..], b"I+");
    assert_eq!(&marshal(&f64::NEG_INFINITY).unwrap()[..], b"I-");

    let nan: f32 = unmarshal(b"N").unwrap();
    assert!(nan.is_nan());
    let inf: f64 = unmarshal(b"I-").unwrap();
    assert_eq!(inf, f64::NEG_INFINITY);
}

// ============================================================================
// Strings and bytes
// ============================================================================

#[test]
fn test_string_forms() {
    let mut enc = Encoder::new(false);
    for s in ["", "Hello", "Pokémon", "中文", "🐱🐶"] {
        enc.encode(s).unwrap();
    }
    assert_eq!(
        enc.bytes(),
        "es5\"Hello\"s7\"Pokémon\"s2\"中文\"s4\"🐱🐶\"".as_bytes()
    );
}

#[test]
fn test_single_char_string() {
    assert_eq!(&marshal("A").unwrap()[..], b"uA");
    assert_eq!(&marshal(&'中').unwrap()[..], "u中".as_bytes());
    let s: String = unmarshal("u中".as_bytes()).unwrap();
    assert_eq!(s, "中");
}

#[test]
fn test_repeated_string_is_referenced() {
    let mut enc = Encoder::new(false);
    enc.encode("我爱你").unwrap();
    enc.encode("我爱你").unwrap();
    assert_eq!(enc.bytes(), "s3\"我爱你\"r0;".as_bytes());

    let mut simple = Encoder::new(true);
    simple.encode("我爱你").unwrap();
    simple.encode("我爱你").unwrap();
    assert_eq!(simple.bytes(), "s3\"我爱你\"s3\"我爱你\"".as_bytes());
}

#[test]
fn test_surrogate_pair_string_decodes() {
    let s: String = unmarshal("s4\"🐱🐶\"".as_bytes()).unwrap();
    assert_eq!(s, "🐱🐶");
}

#[test]
fn test_bytes() {
    assert_eq!(&marshal(&b"Hello"[..]).unwrap()[..], b"b5\"Hello\"");
    assert_eq!(&marshal(&Vec::<u8>::new()).unwrap()[..], b"b\"\"");

    let bytes: Vec<u8> = unmarshal(b"b5\"Hello\"").unwrap();
    assert_eq!(bytes, b"Hello");
}

// ============================================================================
// Collections
// ============================================================================

#[test]
fn test_option_of_empty_list() {
    assert_eq!(&marshal(&None::<Vec<i32>>).unwrap()[..], b"n");
    assert_eq!(&marshal(&Some(Vec::<i32>::new())).unwrap()[..], b"a{}");

    let none: Option<Vec<i32>> = unmarshal(b"n").unwrap();
    assert_eq!(none, None);
    let some: Option<Vec<i32>> = unmarshal(b"a{}").unwrap();
    assert_eq!(some, Some(vec![]));
}

#[test]
fn test_list_of_numbers() {
    let bytes = marshal(&vec![1, 2, 300]).unwrap();
    assert_eq!(&bytes[..], b"a3{12i300;}");
    let decoded: Vec<i64> = unmarshal(&bytes).unwrap();
    assert_eq!(decoded, vec![1, 2, 300]);
}

#[test]
fn test_map_keeps_insertion_order() {
    let mut map: IndexMap<String, Value> = IndexMap::new();
    map.insert("name".to_string(), Value::from("马秉尧"));
    map.insert("age".to_string(), Value::from(33));
    map.insert("male".to_string(), Value::from(true));

    let bytes = marshal(&map).unwrap();
    assert_eq!(
        &bytes[..],
        "m3{s4\"name\"s3\"马秉尧\"s3\"age\"i33;s4\"male\"t}".as_bytes()
    );

    let decoded: IndexMap<String, Value> = unmarshal(&bytes).unwrap();
    assert_eq!(decoded, map);
}

// ============================================================================
// Structs and shared values
// ============================================================================

#[test]
fn test_shared_struct_written_once() {
    let tom = Arc::new(Person {
        name: "Tom".to_string(),
        age: 18,
        male: true,
    });
    let people = vec![tom.clone(), tom];

    let bytes = marshal(&people).unwrap();
    assert_eq!(
        &bytes[..],
        b"a2{c6\"Person\"3{s4\"name\"s3\"age\"s4\"male\"}o0{s3\"Tom\"i18;t}r4;}"
    );

    let decoded: Vec<Arc<Person>> = unmarshal(&bytes).unwrap();
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[0].name, "Tom");
    assert!(Arc::ptr_eq(&decoded[0], &decoded[1]));

    // Without Arc the reference is read again as a copy.
    let copies: Vec<Person> = unmarshal(&bytes).unwrap();
    assert_eq!(copies[0], copies[1]);
}

#[test]
fn test_class_written_once_per_session() {
    let tom = Person {
        name: "Tom".to_string(),
        age: 18,
        male: true,
    };
    let jerry = Person {
        name: "Jerry".to_string(),
        age: 7,
        male: false,
    };
    let mut enc = Encoder::new(false);
    enc.encode(&tom).unwrap();
    enc.encode(&jerry).unwrap();
    assert_eq!(
        enc.bytes(),
        b"c6\"Person\"3{s4\"name\"s3\"age\"s4\"male\"}o0{s3\"Tom\"i18;t}o0{s5\"Jerry\"7f}"
    );

    let mut dec = hprose_encoder::Decoder::new(enc.take_bytes(), false);
    assert_eq!(dec.decode::<Person>().unwrap(), tom);
    assert_eq!(dec.decode::<Person>().unwrap(), jerry);
}

// ============================================================================
// Numbers
// ============================================================================

#[test]
fn test_complex_numbers() {
    assert_eq!(
        &marshal(&Complex::new(0.0f64, 100.0)).unwrap()[..],
        b"a2{d0;d100;}"
    );
    assert_eq!(&marshal(&Complex::new(100.0f64, 0.0)).unwrap()[..], b"d100;");

    let c: Complex<f64> = unmarshal(b"a2{d0;d100;}").unwrap();
    assert_eq!(c, Complex::new(0.0, 100.0));
    let real: Complex<f64> = unmarshal(b"d100;").unwrap();
    assert_eq!(real, Complex::new(100.0, 0.0));
}

// ============================================================================
// Date/time, GUID and errors
// ============================================================================

#[test]
fn test_date_only_utc() {
    let date = Utc.with_ymd_and_hms(2020, 2, 22, 0, 0, 0).unwrap();
    let bytes = marshal(&date).unwrap();
    assert_eq!(&bytes[..], b"D20200222Z");

    let decoded: chrono::DateTime<Utc> = unmarshal(&bytes).unwrap();
    assert_eq!(decoded, date);
}

#[test]
fn test_time_only_with_nanoseconds() {
    let time = NaiveTime::from_hms_nano_opt(12, 12, 12, 123_456_789).unwrap();
    let bytes = marshal(&time).unwrap();
    assert_eq!(&bytes[..], b"T121212.123456789;");

    let decoded: NaiveTime = unmarshal(&bytes).unwrap();
    assert_eq!(decoded, time);
}

#[test]
fn test_date_and_time_with_milliseconds() {
    let stamp = NaiveDate::from_ymd_opt(2021, 12, 31)
        .unwrap()
        .and_hms_milli_opt(23, 59, 1, 500)
        .unwrap();
    let bytes = marshal(&stamp).unwrap();
    assert_eq!(&bytes[..], b"D20211231T235901.500;");

    let decoded: chrono::NaiveDateTime = unmarshal(&bytes).unwrap();
    assert_eq!(decoded, stamp);
}

#[test]
fn test_uuid() {
    let id = uuid::Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
    let bytes = marshal(&id).unwrap();
    assert_eq!(&bytes[..], b"g{67e55044-10b1-426f-9247-bb680e5fe0c8}");
    let decoded: uuid::Uuid = unmarshal(&bytes).unwrap();
    assert_eq!(decoded, id);
}

#[test]
fn test_remote_error() {
    let err = RemoteError("test error".to_string());
    let bytes = marshal(&err).unwrap();
    assert_eq!(&bytes[..], b"Es10\"test error\"");

    let decoded: RemoteError = unmarshal(&bytes).unwrap();
    assert_eq!(decoded, err);

    let value: Value = unmarshal(&bytes).unwrap();
    assert_eq!(value, Value::Error("test error".to_string()));
}
