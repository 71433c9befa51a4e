use bytes::Bytes;
use gd_variant::{marshal, unmarshal_any, unmarshal_size, NodePath, Variant};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_bool_true() {
    init_logger();
    let buf = marshal(&true).unwrap();
    assert_eq!(&buf[..], &[0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]);
    assert_eq!(unmarshal_any(&buf).unwrap(), Variant::Bool(true));
}

#[test]
fn test_string_is_padded() {
    init_logger();
    let buf = marshal("ab").unwrap();
    assert_eq!(
        &buf[..],
        &[4, 0, 0, 0, 2, 0, 0, 0, b'a', b'b', 0, 0],
    );
    assert_eq!(unmarshal_any(&buf).unwrap(), Variant::String("ab".into()));
}

#[test]
fn test_int64_sets_wide_flag() {
    init_logger();
    let buf = marshal(&-5i64).unwrap();
    let mut expected = vec![2, 0, 1, 0];
    expected.extend_from_slice(&(-5i64).to_le_bytes());
    assert_eq!(&buf[..], &expected[..]);
    let decoded = unmarshal_any(&buf).unwrap();
    assert_eq!(decoded, Variant::Int(-5));
    assert_eq!(decoded.to::<i64>(), -5);
}

#[test]
fn test_float32_array() {
    init_logger();
    let buf = marshal(&vec![1.5f32, -2.25]).unwrap();
    let mut expected = vec![23, 0, 0, 0, 2, 0, 0, 0];
    expected.extend_from_slice(&1.5f32.to_bits().to_le_bytes());
    expected.extend_from_slice(&(-2.25f32).to_bits().to_le_bytes());
    assert_eq!(&buf[..], &expected[..]);
    let decoded = unmarshal_any(&buf).unwrap();
    assert_eq!(decoded.to::<Vec<f32>>(), vec![1.5, -2.25]);
}

#[test]
fn test_node_path_segments() {
    init_logger();
    for text in ["a/b/c", "/a/b/c"] {
        let path = NodePath::from(text);
        let buf = marshal(&path).unwrap();
        let decoded = unmarshal_any(&buf).unwrap();
        assert_eq!(decoded, Variant::NodePath(path.clone()));
        assert_eq!(decoded.to_node_path().is_absolute(), text.starts_with('/'));
    }
}

#[test]
fn test_node_path_plain_string_form() {
    init_logger();
    // Length without bit 31: a single string.
    let buf = Bytes::from_static(&[15, 0, 0, 0, 3, 0, 0, 0, b'a', b'/', b'b', 0]);
    assert_eq!(
        unmarshal_any(&buf).unwrap(),
        Variant::NodePath(NodePath::from("a/b"))
    );
    assert_eq!(unmarshal_size(&buf).unwrap(), 12);
}

#[test]
fn test_short_buffer_is_error() {
    init_logger();
    let buf = Bytes::from_static(&[1, 0, 0]);
    assert!(unmarshal_any(&buf).is_err());
    assert!(unmarshal_size(&buf).is_err());
}

#[test]
fn test_strings_are_four_byte_aligned() {
    for len in 0..9 {
        let text = "x".repeat(len);
        assert_eq!(marshal(text.as_str()).unwrap().len() % 4, 0);
        assert_eq!(marshal(&vec![7u8; len]).unwrap().len() % 4, 0);
    }
}
