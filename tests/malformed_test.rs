use bytes::{Bytes, BytesMut};
use gd_variant::{
    marshal, unmarshal_any, unmarshal_any_with, unmarshal_size, unmarshal_size_with, Array,
    Color, DecodeOptions, Dictionary, EncoderError, NodePath, Variant, Vector2, Vector3,
    DEFAULT_MAX_DEPTH,
};
use proptest::prelude::*;

fn finite_f32() -> impl Strategy<Value = f32> {
    -1.0e6f32..1.0e6
}

fn leaf() -> impl Strategy<Value = Variant> {
    let scalars = prop_oneof![
        Just(Variant::Nil),
        any::<bool>().prop_map(Variant::Bool),
        any::<i32>().prop_map(Variant::Int32),
        any::<i64>().prop_map(Variant::Int),
        finite_f32().prop_map(Variant::Float32),
        (-1.0e12f64..1.0e12).prop_map(Variant::Float),
        ".{0,12}".prop_map(Variant::String),
    ];
    let structured = prop_oneof![
        (finite_f32(), finite_f32()).prop_map(|(x, y)| Vector2::new(x, y).into()),
        (finite_f32(), finite_f32(), finite_f32())
            .prop_map(|(x, y, z)| Vector3::new(x, y, z).into()),
        (0.0f32..1.0, 0.0f32..1.0).prop_map(|(r, a)| Color::from_rgba(r, r, r, a).into()),
        "(/)?[a-z]{1,4}(/[a-z]{1,4}){0,3}".prop_map(|p| NodePath::from(p).into()),
        prop::collection::vec(any::<u8>(), 0..9).prop_map(Variant::from),
        prop::collection::vec(any::<i32>(), 0..6).prop_map(Variant::from),
        prop::collection::vec(finite_f32(), 0..6).prop_map(Variant::from),
        prop::collection::vec("[a-z]{0,5}", 0..4).prop_map(Variant::from),
    ];
    prop_oneof![scalars, structured]
}

fn arb_variant() -> impl Strategy<Value = Variant> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4)
                .prop_map(|items| Variant::Array(Array::from(items))),
            prop::collection::vec(("[a-z]{1,3}", inner), 0..4).prop_map(|entries| {
                let mut dict = Dictionary::new();
                for (key, value) in entries {
                    dict.insert(key, value);
                }
                Variant::Dictionary(dict)
            }),
        ]
    })
}

proptest! {
    #[test]
    fn prop_round_trip(value in arb_variant()) {
        let buf = marshal(&value).unwrap();
        prop_assert_eq!(unmarshal_any(&buf).unwrap(), value);
    }

    #[test]
    fn prop_size_matches_decode(
        value in arb_variant(),
        tail in prop::collection::vec(any::<u8>(), 0..8)
    ) {
        let encoded = marshal(&value).unwrap();
        let mut buf = BytesMut::from(&encoded[..]);
        buf.extend_from_slice(&tail);
        let buf = buf.freeze();

        let size = unmarshal_size(&buf).unwrap();
        prop_assert_eq!(size, encoded.len());
        let mut reader = buf.clone();
        gd_variant::unmarshal(&mut reader).unwrap();
        prop_assert_eq!(&buf[size..], &reader[..]);
    }

    #[test]
    fn prop_reencode_is_identical(value in arb_variant()) {
        let buf = marshal(&value).unwrap();
        let decoded = unmarshal_any(&buf).unwrap();
        prop_assert_eq!(marshal(&decoded).unwrap(), buf);
    }

    #[test]
    fn prop_truncation_is_error(value in arb_variant()) {
        let buf = marshal(&value).unwrap();
        for cut in 0..buf.len() {
            let short = buf.slice(..cut);
            prop_assert!(unmarshal_any(&short).is_err());
            prop_assert!(unmarshal_size(&short).is_err());
        }
    }

    #[test]
    fn prop_garbage_never_panics(raw in prop::collection::vec(any::<u8>(), 0..64)) {
        let buf = Bytes::from(raw);
        let _ = unmarshal_any(&buf);
        let _ = unmarshal_size(&buf);
    }
}

#[test]
fn test_unknown_tag() {
    let buf = Bytes::from_static(&[200, 0, 0, 0]);
    assert!(matches!(
        unmarshal_any(&buf),
        Err(EncoderError::UnknownTag(200))
    ));
    assert!(matches!(
        unmarshal_size(&buf),
        Err(EncoderError::UnknownTag(200))
    ));
}

#[test]
fn test_declared_length_beyond_buffer() {
    // String claiming 1000 bytes with only 4 present.
    let buf = Bytes::from_static(&[4, 0, 0, 0, 0xE8, 0x03, 0, 0, b'a', b'b', b'c', b'd']);
    match unmarshal_any(&buf) {
        Err(EncoderError::Truncated { needed, remaining, .. }) => {
            assert_eq!(needed, 1000);
            assert_eq!(remaining, 4);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_huge_packed_count() {
    let buf = Bytes::from_static(&[22, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0x7F]);
    assert!(matches!(
        unmarshal_any(&buf),
        Err(EncoderError::Truncated { .. })
    ));
    // Containers must not reserve memory for counts the buffer cannot hold.
    let buf = Bytes::from_static(&[19, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0x7F]);
    assert!(unmarshal_any(&buf).is_err());
}

#[test]
fn test_invalid_utf8() {
    let buf = Bytes::from_static(&[4, 0, 0, 0, 2, 0, 0, 0, 0xC3, 0x28, 0, 0]);
    assert!(matches!(unmarshal_any(&buf), Err(EncoderError::Decode(_))));
}

fn nested_arrays(depth: usize) -> Bytes {
    let mut raw = Vec::new();
    for _ in 0..depth {
        raw.extend_from_slice(&[19, 0, 0, 0, 1, 0, 0, 0]);
    }
    raw.extend_from_slice(&[0, 0, 0, 0]);
    Bytes::from(raw)
}

#[test]
fn test_depth_limit() {
    let _ = env_logger::builder().is_test(true).try_init();
    let options = DecodeOptions { max_depth: 8 };

    let ok = nested_arrays(8);
    assert!(unmarshal_any_with(&ok, &options).is_ok());
    assert_eq!(unmarshal_size_with(&ok, &options).unwrap(), ok.len());

    let deep = nested_arrays(9);
    assert!(matches!(
        unmarshal_any_with(&deep, &options),
        Err(EncoderError::DepthLimit(8))
    ));
    assert!(matches!(
        unmarshal_size_with(&deep, &options),
        Err(EncoderError::DepthLimit(8))
    ));
}

/// Runs `f` on a thread with the stack size of a default spawned thread.
fn on_small_stack(f: impl FnOnce() + Send + 'static) {
    std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap();
}

#[test]
fn test_default_depth_stops_hostile_nesting() {
    on_small_stack(|| {
        let hostile = nested_arrays(100_000);
        assert!(matches!(
            unmarshal_any(&hostile),
            Err(EncoderError::DepthLimit(_))
        ));
        assert!(unmarshal_size(&hostile).is_err());
    });
}

#[test]
fn test_default_depth_fits_small_stack() {
    on_small_stack(|| {
        let deepest = nested_arrays(DEFAULT_MAX_DEPTH);
        assert!(matches!(unmarshal_any(&deepest).unwrap(), Variant::Array(_)));
        assert_eq!(unmarshal_size(&deepest).unwrap(), deepest.len());

        let too_deep = nested_arrays(DEFAULT_MAX_DEPTH + 1);
        assert!(matches!(
            unmarshal_any(&too_deep),
            Err(EncoderError::DepthLimit(DEFAULT_MAX_DEPTH))
        ));
    });
}
