use bytes::Bytes;
use gd_variant::{
    marshal, unmarshal_any, Array, CallError, ConvertError, Dictionary, NodePath, Operator,
    Packed, Variant, VariantType, Vector2, Vector3,
};

#[test]
fn test_accessors() {
    assert!(Variant::from(true).to_bool());
    assert_eq!(Variant::from(7i32).to_int(), 7);
    assert_eq!(Variant::from(7i64).to_int(), 7);
    assert_eq!(Variant::from(0.5f32).to_float(), 0.5);
    assert_eq!(Variant::from("s").to_string_value(), "s");
    assert_eq!(Variant::from(Vector2::ONE).to_vector2(), Vector2::ONE);
    assert_eq!(Variant::from(Vector3::UP).to_vector3(), Vector3::UP);
    assert_eq!(Variant::from(NodePath::from("a")).to_node_path(), NodePath::from("a"));
    assert!(Variant::default().is_nil());
}

#[test]
#[should_panic(expected = "Expected int, got String")]
fn test_mismatch_panics_with_both_types() {
    Variant::from("not a number").to_int();
}

#[test]
fn test_try_to() {
    assert_eq!(
        Variant::from(1.0f64).try_to::<bool>(),
        Err(ConvertError::TypeMismatch {
            expected: VariantType::Bool,
            actual: VariantType::Float,
        })
    );
    assert!(matches!(
        Variant::from(300i32).try_to::<u8>(),
        Err(ConvertError::OutOfRange { value: 300, .. })
    ));
    assert_eq!(Variant::Nil.try_to::<Option<i32>>(), Ok(None));
    assert_eq!(Variant::from(4i32).try_to::<Option<i32>>(), Ok(Some(4)));
}

#[test]
fn test_packed_access_is_typed() {
    let v = Variant::from(vec![1i32, 2, 3]);
    assert_eq!(v.to::<Packed<i32>>().len(), 3);
    assert!(v.try_to::<Packed<i64>>().is_err());
    assert_eq!(v.variant_type(), VariantType::Int32Array);

    let view = v.as_packed::<i32>().unwrap();
    assert_eq!(view.get(2), Some(3));
    assert!(v.as_packed::<f32>().is_none());
    assert_eq!(v.to::<Packed<i32>>().as_le_bytes().as_ptr(), view.as_le_bytes().as_ptr());

    let raw = Variant::from(vec![7u8, 8]);
    assert_eq!(raw.as_bytes(), Some(&[7u8, 8][..]));
    assert_eq!(v.as_bytes(), None);
}

#[test]
fn test_get_and_set() {
    let mut array = Variant::from(Array::from(vec![Variant::from(1), Variant::from("b")]));
    assert_eq!(array.get(&Variant::from(1)).unwrap(), Variant::from("b"));
    assert_eq!(
        array.get(&Variant::from(5)),
        Err(CallError::IndexOutOfBounds { index: 5, len: 2 })
    );
    array.set(Variant::from(0), Variant::from(9.0f64)).unwrap();
    assert_eq!(array.get(&Variant::from(0)).unwrap(), Variant::Float(9.0));

    let mut dict = Variant::from(Dictionary::new());
    dict.set(Variant::from("k"), Variant::from(true)).unwrap();
    assert_eq!(dict.get(&Variant::from("k")).unwrap(), Variant::Bool(true));
    assert_eq!(dict.get(&Variant::from("missing")), Err(CallError::KeyNotFound));

    let packed = Variant::from(vec![Vector2::ZERO, Vector2::ONE]);
    assert_eq!(packed.get(&Variant::from(1)).unwrap(), Variant::from(Vector2::ONE));

    assert!(matches!(
        Variant::from(3).get(&Variant::from(0)),
        Err(CallError::Unsupported { operation: "get", .. })
    ));
}

/// `{key: value, ...}` with every key and value already encoded.
fn raw_dictionary(entries: &[(&[u8], &[u8])]) -> Bytes {
    let mut raw = vec![18, 0, 0, 0, entries.len() as u8, 0, 0, 0];
    for (key, value) in entries {
        raw.extend_from_slice(key);
        raw.extend_from_slice(value);
    }
    Bytes::from(raw)
}

#[test]
fn test_dictionary_keys_ignore_width() {
    let five32: &[u8] = &[2, 0, 0, 0, 5, 0, 0, 0];
    let text = marshal("five").unwrap();
    let decoded = unmarshal_any(&raw_dictionary(&[(five32, &text[..])])).unwrap();
    let Variant::Dictionary(mut dict) = decoded else {
        panic!("expected Dictionary");
    };
    assert_eq!(dict.get(&Variant::Int(5)), Some(&Variant::from("five")));
    assert!(dict.contains_key(&Variant::Int32(5)));

    assert_eq!(dict.insert(5i64, "FIVE"), Some(Variant::from("five")));
    assert_eq!(dict.len(), 1);
    assert_eq!(dict.keys().next(), Some(&Variant::Int32(5)));
    assert_eq!(dict.remove(&Variant::Int(5)), Some(Variant::from("FIVE")));
    assert!(dict.is_empty());

    // Floats and ints stay distinct keys.
    let mut mixed = Dictionary::new();
    mixed.insert(1, "int");
    mixed.insert(1.0f64, "float");
    assert_eq!(mixed.len(), 2);

    let a = Variant::from(Array::from(vec![Variant::Int32(1)]));
    let b = Variant::from(Array::from(vec![Variant::Int(1)]));
    assert_eq!(a.calculate(Operator::Equal, &b).unwrap(), Variant::Bool(true));
    let mut keyed = Dictionary::new();
    keyed.insert(a, true);
    assert_eq!(keyed.get(&b), Some(&Variant::Bool(true)));
}

#[test]
fn test_duplicate_wire_keys_keep_last() {
    let key = marshal("k").unwrap();
    let first = marshal(&1i32).unwrap();
    let second = marshal(&2i32).unwrap();
    let buf = raw_dictionary(&[(&key[..], &first[..]), (&key[..], &second[..])]);

    let decoded = unmarshal_any(&buf).unwrap();
    assert_eq!(marshal(&decoded).unwrap(), buf);
    let Variant::Dictionary(mut dict) = decoded else {
        panic!("expected Dictionary");
    };
    assert_eq!(dict.len(), 2);
    assert_eq!(dict.get(&Variant::from("k")), Some(&Variant::Int32(2)));
    assert_eq!(dict.get_str("k"), Some(&Variant::Int32(2)));

    dict.insert("k", 3);
    assert_eq!(dict.get(&Variant::from("k")), Some(&Variant::Int32(3)));
    assert_eq!(dict.remove(&Variant::from("k")), Some(Variant::Int32(3)));
    assert!(dict.is_empty());
}

#[test]
fn test_iter() {
    let array = Variant::from(Array::from(vec![Variant::from("x"), Variant::from("y")]));
    let pairs: Vec<_> = array.iter().unwrap().collect();
    assert_eq!(
        pairs,
        vec![
            (Variant::Int(0), Variant::from("x")),
            (Variant::Int(1), Variant::from("y")),
        ]
    );

    let dict: Dictionary = [("a", 1), ("b", 2)].into_iter().collect();
    let keys: Vec<_> = Variant::from(dict).iter().unwrap().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![Variant::from("a"), Variant::from("b")]);

    assert!(Variant::from(1.5f32).iter().is_err());
}

#[test]
fn test_calculate() {
    let two = Variant::from(2);
    let three = Variant::from(3i64);
    assert_eq!(two.calculate(Operator::Add, &three).unwrap(), Variant::Int(5));
    assert_eq!(
        two.calculate(Operator::Multiply, &Variant::from(1.5f64)).unwrap(),
        Variant::Float(3.0)
    );
    assert_eq!(two.calculate(Operator::Less, &three).unwrap(), Variant::Bool(true));
    assert_eq!(two.calculate(Operator::Divide, &Variant::from(0)), Err(CallError::DivisionByZero));
    assert_eq!(two.calculate(Operator::Negate, &Variant::Nil).unwrap(), Variant::Int(-2));
    assert_eq!(
        Variant::from("a").calculate(Operator::Add, &Variant::from("b")).unwrap(),
        Variant::from("ab")
    );
    assert_eq!(
        Variant::from(Vector2::ONE).calculate(Operator::Add, &Variant::from(Vector2::ONE)).unwrap(),
        Variant::from(Vector2::new(2.0, 2.0))
    );
    assert_eq!(
        Variant::from(true).calculate(Operator::And, &Variant::from(false)).unwrap(),
        Variant::Bool(false)
    );
    assert_eq!(
        Variant::from("a").calculate(Operator::NotEqual, &Variant::from(1)).unwrap(),
        Variant::Bool(true)
    );
    assert!(matches!(
        Variant::from("a").calculate(Operator::Subtract, &Variant::from(1)),
        Err(CallError::InvalidOperands { .. })
    ));
}

#[test]
fn test_hash_follows_encoding() {
    let hash = |v: Variant| v.hash().unwrap();
    assert_eq!(hash(Variant::from("abc")), hash(Variant::from("abc")));
    assert_ne!(hash(Variant::from("abc")), hash(Variant::from("abd")));
    assert_ne!(hash(Variant::from(1i32)), hash(Variant::from(1i64)));
}

#[test]
fn test_duplicate_is_deep() {
    let inner = Array::from(vec![Variant::from(1)]);
    let outer = Variant::from(Array::from(vec![Variant::from(inner)]));
    let mut copy = outer.duplicate().unwrap();
    assert_eq!(copy, outer);

    let packed = Variant::from(vec![1.0f64, 2.0]);
    let packed_copy = packed.duplicate().unwrap();
    let (Variant::Float64Array(a), Variant::Float64Array(b)) = (&packed, &packed_copy) else {
        panic!("expected Float64Array");
    };
    assert_ne!(a.as_le_bytes().as_ptr(), b.as_le_bytes().as_ptr());

    copy.set(Variant::from(0), Variant::Nil).unwrap();
    assert_ne!(copy, outer);
}

#[test]
fn test_call_needs_proxy() {
    assert!(matches!(
        Variant::from(1).call("abs", &[]),
        Err(CallError::Unsupported { operation: "call", .. })
    ));
}

#[test]
fn test_display() {
    let dict: Dictionary = [("k", Variant::from(vec![1i32, 2]))].into_iter().collect();
    assert_eq!(Variant::from(dict).to_string(), "{k: [1, 2]}");
    assert_eq!(Variant::Nil.to_string(), "<null>");
    assert_eq!(VariantType::Vector3Array.to_string(), "PackedVector3Array");
}
