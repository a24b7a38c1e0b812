use hprose_encoder::{
    marshal, unmarshal, Decode, Encode, Encoder, Formatter, HproseError, Value,
};
use std::rc::Rc;
use std::sync::{Arc, Mutex, RwLock};

#[derive(Encode, Decode, Debug, Default)]
struct Node {
    name: String,
    next: Option<Arc<Mutex<Node>>>,
}

// ============================================================================
// Shared allocations
// ============================================================================

#[test]
fn test_rc_list_is_referenced() {
    let shared = Rc::new(vec![1, 2]);
    let bytes = marshal(&vec![shared.clone(), shared]).unwrap();
    assert_eq!(&bytes[..], b"a2{a2{12}r1;}");

    let decoded: Vec<Vec<i32>> = unmarshal(&bytes).unwrap();
    assert_eq!(decoded, vec![vec![1, 2], vec![1, 2]]);
}

#[test]
fn test_equal_but_distinct_values_are_not_referenced() {
    let bytes = marshal(&vec![vec![1, 2], vec![1, 2]]).unwrap();
    assert_eq!(&bytes[..], b"a2{a2{12}a2{12}}");
}

#[test]
fn test_reference_read_into_another_type() {
    let shared = Rc::new(vec![1, 2]);
    let bytes = marshal(&vec![shared.clone(), shared]).unwrap();

    let decoded: Vec<Vec<String>> = unmarshal(&bytes).unwrap();
    assert_eq!(decoded[1], vec!["1".to_string(), "2".to_string()]);
}

#[test]
fn test_string_reference_inside_struct() {
    #[derive(Encode, Decode, Debug, Default, PartialEq)]
    struct Names {
        first: String,
        second: String,
    }
    let value = Names {
        first: "same".to_string(),
        second: "same".to_string(),
    };
    let bytes = marshal(&value).unwrap();
    // Slots 0 and 1 are the field names, 2 the object, 3 the first string.
    assert_eq!(
        &bytes[..],
        b"c5\"Names\"2{s5\"first\"s6\"second\"}o0{s4\"same\"r3;}"
    );
    let decoded: Names = unmarshal(&bytes).unwrap();
    assert_eq!(decoded, value);
}

// ============================================================================
// Cycles
// ============================================================================

#[test]
fn test_cycle_through_arc_mutex() {
    let a = Arc::new(Mutex::new(Node {
        name: "a".to_string(),
        next: None,
    }));
    let b = Arc::new(Mutex::new(Node {
        name: "b".to_string(),
        next: Some(a.clone()),
    }));
    a.lock().unwrap().next = Some(b.clone());

    let bytes = marshal(&a).unwrap();
    assert_eq!(
        &bytes[..],
        b"c4\"Node\"2{s4\"name\"s4\"next\"}o0{uao0{ubr2;}}"
    );
    // Break the cycle so both nodes are dropped.
    a.lock().unwrap().next = None;

    let decoded: Arc<Mutex<Node>> = unmarshal(&bytes).unwrap();
    let second = {
        let first = decoded.lock().unwrap();
        assert_eq!(first.name, "a");
        first.next.clone().unwrap()
    };
    let back = {
        let second = second.lock().unwrap();
        assert_eq!(second.name, "b");
        second.next.clone().unwrap()
    };
    assert!(Arc::ptr_eq(&back, &decoded));
    second.lock().unwrap().next = None;
}

#[derive(Encode, Decode, Debug, Default)]
struct Counter {
    count: i32,
}

#[test]
fn test_shared_rwlock_is_filled() {
    let counter = Arc::new(RwLock::new(Counter { count: 5 }));
    let bytes = marshal(&vec![counter.clone(), counter]).unwrap();

    let decoded: Vec<Arc<RwLock<Counter>>> = unmarshal(&bytes).unwrap();
    assert_eq!(decoded[0].read().unwrap().count, 5);
    assert!(Arc::ptr_eq(&decoded[0], &decoded[1]));
}

#[test]
fn test_cycle_into_value_fails() {
    let result = unmarshal::<Value>(b"c4\"Node\"2{s4\"name\"s4\"next\"}o0{uao0{ubr2;}}");
    assert!(matches!(result, Err(HproseError::RecursiveReference(2))));

    // Shared values without a cycle are copied.
    let list: Value = unmarshal(b"a2{m1{uau1}r1;}").unwrap();
    match list {
        Value::List(items) => assert_eq!(items[0], items[1]),
        other => panic!("expected a list, got {:?}", other),
    }
}

#[test]
fn test_recursive_reference_without_arc_fails() {
    let result = unmarshal::<Vec<Vec<i32>>>(b"a1{r0;}");
    assert!(matches!(result, Err(HproseError::RecursiveReference(0))));
}

#[test]
fn test_unknown_reference() {
    let result = unmarshal::<Vec<i32>>(b"a1{r5;}");
    assert!(matches!(result, Err(HproseError::UnknownReference(5))));
}

// ============================================================================
// Simple mode
// ============================================================================

#[test]
fn test_simple_mode_writes_values_again() {
    let shared = Rc::new(vec![1, 2]);
    let formatter = Formatter::new().simple(true);
    let bytes = formatter.marshal(&vec![shared.clone(), shared]).unwrap();
    assert_eq!(&bytes[..], b"a2{a2{12}a2{12}}");

    let decoded: Vec<Vec<i32>> = formatter.unmarshal(&bytes).unwrap();
    assert_eq!(decoded.len(), 2);
}

#[test]
fn test_simple_mode_ignores_class_field_slots() {
    #[derive(Encode, Decode, Debug, Default, PartialEq)]
    struct Tag {
        label: String,
    }
    let tags = vec![
        Tag {
            label: "x1".to_string(),
        },
        Tag {
            label: "x1".to_string(),
        },
    ];
    let mut enc = Encoder::new(true);
    enc.encode(&tags).unwrap();
    assert_eq!(
        enc.bytes(),
        b"a2{c3\"Tag\"1{s5\"label\"}o0{s2\"x1\"}o0{s2\"x1\"}}"
    );

    let decoded: Vec<Tag> = Formatter::new().simple(true).unmarshal(enc.bytes()).unwrap();
    assert_eq!(decoded, tags);
}
