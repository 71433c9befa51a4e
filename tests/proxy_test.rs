use gd_variant::{
    marshal, unmarshal_any, CallError, ConvertError, EncoderError, Operator, Proxy, ProxyHandle,
    Variant, VariantType, Vector2, Vector3,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Engine stand-in: values live in a table keyed by handle.
#[derive(Debug, Default)]
struct TableProxy {
    values: Mutex<HashMap<ProxyHandle, Variant>>,
    materialized: AtomicUsize,
}

impl TableProxy {
    fn with(values: impl IntoIterator<Item = (ProxyHandle, Variant)>) -> Arc<Self> {
        Arc::new(Self {
            values: Mutex::new(values.into_iter().collect()),
            materialized: AtomicUsize::new(0),
        })
    }
}

impl Proxy for TableProxy {
    fn variant_type(&self, handle: ProxyHandle) -> VariantType {
        self.values.lock().unwrap()[&handle].variant_type()
    }

    fn materialize(&self, handle: ProxyHandle) -> Variant {
        self.materialized.fetch_add(1, Ordering::Relaxed);
        self.values.lock().unwrap()[&handle].clone()
    }

    // Served without materializing.
    fn to_int(&self, handle: ProxyHandle) -> Result<i64, ConvertError> {
        self.values.lock().unwrap()[&handle].try_to()
    }

    fn to_vector2(&self, handle: ProxyHandle) -> Result<Vector2, ConvertError> {
        self.values.lock().unwrap()[&handle].try_to()
    }

    fn set(&self, handle: ProxyHandle, key: Variant, value: Variant) -> Result<(), CallError> {
        let mut values = self.values.lock().unwrap();
        let target = values.get_mut(&handle).ok_or(CallError::KeyNotFound)?;
        target.set(key, value)
    }

    fn call(
        &self,
        handle: ProxyHandle,
        method: &str,
        args: &[Variant],
    ) -> Result<Variant, CallError> {
        match method {
            "length" => Ok(Variant::from(self.materialize(handle).to_vector3().length())),
            "echo" => Ok(args.first().cloned().unwrap_or_default()),
            _ => Err(CallError::Proxy(format!("no method {method}"))),
        }
    }
}

/// Answers with another proxied value, which is never allowed.
#[derive(Debug)]
struct LoopingProxy;

impl Proxy for LoopingProxy {
    fn variant_type(&self, _handle: ProxyHandle) -> VariantType {
        VariantType::Bool
    }

    fn materialize(&self, handle: ProxyHandle) -> Variant {
        Variant::from_proxy(Arc::new(LoopingProxy), handle)
    }
}

const INT: ProxyHandle = ProxyHandle::new(0, 1);
const VEC: ProxyHandle = ProxyHandle::new(0, 2);
const DICT: ProxyHandle = ProxyHandle::new(7, 3);
const POINT: ProxyHandle = ProxyHandle::new(0, 4);

fn table() -> Arc<TableProxy> {
    TableProxy::with([
        (INT, Variant::from(41i64)),
        (VEC, Variant::from(Vector3::new(3.0, 4.0, 0.0))),
        (DICT, Variant::from(gd_variant::Dictionary::new())),
        (POINT, Variant::from(Vector2::new(1.0, 2.0))),
    ])
}

#[test]
fn test_accessors_delegate() {
    let _ = env_logger::builder().is_test(true).try_init();
    let proxy = table();
    let int = Variant::from_proxy(proxy.clone(), INT);
    assert_eq!(int.variant_type(), VariantType::Integer);
    assert_eq!(int.to_int(), 41);
    assert_eq!(proxy.materialized.load(Ordering::Relaxed), 0);

    assert!(int.try_to::<f64>().is_err());
    let vec = Variant::from_proxy(proxy.clone(), VEC);
    assert_eq!(vec.to_vector3(), Vector3::new(3.0, 4.0, 0.0));
    assert!(proxy.materialized.load(Ordering::Relaxed) > 0);
}

#[test]
fn test_records_served_without_copy() {
    let proxy = table();
    let point = Variant::from_proxy(proxy.clone(), POINT);
    assert_eq!(point.to_vector2(), Vector2::new(1.0, 2.0));
    assert_eq!(point.try_to::<Vector2>(), Ok(Vector2::new(1.0, 2.0)));
    assert_eq!(proxy.materialized.load(Ordering::Relaxed), 0);

    assert!(point.try_to::<gd_variant::Color>().is_err());
    assert_eq!(proxy.materialized.load(Ordering::Relaxed), 1);
}

#[test]
fn test_operations_delegate() {
    let proxy = table();
    let int = Variant::from_proxy(proxy.clone(), INT);
    assert_eq!(
        int.calculate(Operator::Add, &Variant::from(1)).unwrap(),
        Variant::Int(42)
    );
    assert_eq!(int.materialize(), Variant::Int(41));
    assert_eq!(int.hash().unwrap(), Variant::Int(41).hash().unwrap());
    assert_eq!(int.duplicate().unwrap(), Variant::Int(41));

    let vec = Variant::from_proxy(proxy.clone(), VEC);
    assert_eq!(vec.call("length", &[]).unwrap(), Variant::Float32(5.0));
    assert_eq!(
        vec.call("echo", &[Variant::from("x")]).unwrap(),
        Variant::from("x")
    );
    assert!(matches!(vec.call("nope", &[]), Err(CallError::Proxy(_))));
}

#[test]
fn test_set_writes_through() {
    let proxy = table();
    let mut dict = Variant::from_proxy(proxy.clone(), DICT);
    dict.set(Variant::from("hp"), Variant::from(10)).unwrap();
    assert_eq!(dict.get(&Variant::from("hp")).unwrap(), Variant::Int32(10));
    let pairs: Vec<_> = dict.iter().unwrap().collect();
    assert_eq!(pairs, vec![(Variant::from("hp"), Variant::Int32(10))]);
}

#[test]
fn test_default_set_and_call_are_unsupported() {
    let mut looping = Variant::from_proxy(Arc::new(LoopingProxy), INT);
    assert!(matches!(
        looping.set(Variant::Nil, Variant::Nil),
        Err(CallError::Unsupported { operation: "set", ty: VariantType::Bool })
    ));
    assert!(matches!(
        looping.call("x", &[]),
        Err(CallError::Unsupported { operation: "call", .. })
    ));
}

#[test]
fn test_marshal_materializes() {
    let proxy = table();
    let vec = Variant::from_proxy(proxy, VEC);
    let buf = marshal(&vec).unwrap();
    assert_eq!(buf, marshal(&Vector3::new(3.0, 4.0, 0.0)).unwrap());
    assert_eq!(unmarshal_any(&buf).unwrap().to_vector3().x, 3.0);
}

#[test]
fn test_unresolvable_proxy_is_error() {
    let looping = Variant::from_proxy(Arc::new(LoopingProxy), INT);
    assert!(matches!(marshal(&looping), Err(EncoderError::Proxy(_))));
    assert!(looping.try_to::<bool>().is_err());
    assert!(matches!(
        looping.get(&Variant::Nil),
        Err(CallError::Proxy(_))
    ));
}

#[test]
fn test_unresolvable_proxy_cannot_hash_or_copy() {
    let looping = Variant::from_proxy(Arc::new(LoopingProxy), INT);
    assert!(matches!(looping.hash(), Err(CallError::Proxy(_))));
    assert!(matches!(looping.duplicate(), Err(CallError::Proxy(_))));

    let nested = Variant::from(gd_variant::Array::from(vec![looping]));
    assert!(matches!(nested.hash(), Err(CallError::Proxy(_))));
    assert!(matches!(nested.duplicate(), Err(CallError::Proxy(_))));
}

#[test]
fn test_equality_is_identity() {
    let proxy = table();
    let a = Variant::from_proxy(proxy.clone(), INT);
    let b = Variant::from_proxy(proxy, INT);
    let other = Variant::from_proxy(table(), INT);
    assert_eq!(a, b);
    assert_ne!(a, other);
    assert_ne!(a, Variant::Int(41));
}
