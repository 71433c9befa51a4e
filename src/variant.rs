//! The dynamic `Variant` value and the small value types it carries.

use crate::core::VariantType;
use crate::math::*;
use crate::packed::*;
use crate::proxy::{Operator, Proxied, Proxy, ProxyHandle};
use crate::{CallError, ConvertError, EncoderError, FromVariant, Marshal, ToVariant};
use bytes::{Bytes, BytesMut};
use crc::{Crc, CRC_32_ISO_HDLC};
use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

/// CRC-32 over the canonical encoding, used by [`Variant::hash`].
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

// --- Small value types ---

/// Path to a node in the scene tree, e.g. `"/root/Main"` or `"../Player"`.
#[derive(Clone, Default, PartialEq, Eq, Hash, Debug)]
pub struct NodePath(String);

impl NodePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_absolute(&self) -> bool {
        self.0.starts_with('/')
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path segments without the leading `/` of an absolute path.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        let rest = self.0.strip_prefix('/').unwrap_or(&self.0);
        rest.split('/').filter(move |_| !rest.is_empty())
    }
}

impl From<&str> for NodePath {
    fn from(path: &str) -> Self {
        Self(path.to_owned())
    }
}

impl From<String> for NodePath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque resource id owned by one of the engine's servers.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, Debug)]
pub struct Rid(u64);

impl Rid {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u64 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RID({})", self.0)
    }
}

/// Instance id of an engine object. Zero is the null object and has no id.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ObjectId(NonZeroU64);

impl ObjectId {
    pub fn new(id: u64) -> Option<Self> {
        NonZeroU64::new(id).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

// --- Array / Dictionary ---

/// Heterogeneous ordered list of variants.
#[derive(Clone, Default, PartialEq, Debug)]
pub struct Array {
    items: Vec<Variant>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, value: impl Into<Variant>) {
        self.items.push(value.into());
    }

    pub fn get(&self, index: usize) -> Option<&Variant> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variant> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Variant] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<Variant> {
        &mut self.items
    }
}

impl From<Vec<Variant>> for Array {
    fn from(items: Vec<Variant>) -> Self {
        Self { items }
    }
}

impl<V: Into<Variant>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl IntoIterator for Array {
    type Item = Variant;
    type IntoIter = std::vec::IntoIter<Variant>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Array {
    type Item = &'a Variant;
    type IntoIter = std::slice::Iter<'a, Variant>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Key/value map of variants that keeps insertion order.
///
/// Keys match across storage widths, so `Int32(5)` and `Int(5)` are the same
/// key. Lookups are linear; dictionaries crossing the engine boundary are
/// small.
///
/// A decoded buffer may repeat a key. Every entry is kept so the buffer
/// re-encodes unchanged, and lookups see the last one, as the engine does.
#[derive(Clone, Default, PartialEq, Debug)]
pub struct Dictionary {
    entries: Vec<(Variant, Variant)>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &Variant) -> Option<usize> {
        self.entries.iter().rposition(|(k, _)| values_equal(k, key))
    }

    /// Inserts or replaces the value under `key`, returning the previous value.
    pub fn insert(
        &mut self,
        key: impl Into<Variant>,
        value: impl Into<Variant>,
    ) -> Option<Variant> {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(index) => Some(std::mem::replace(&mut self.entries[index].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Appends an entry as read off the wire, without looking for an equal key.
    pub(crate) fn append_entry(&mut self, key: Variant, value: Variant) {
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &Variant) -> Option<&Variant> {
        self.position(key).map(|index| &self.entries[index].1)
    }

    /// Looks up a string key.
    pub fn get_str(&self, key: &str) -> Option<&Variant> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| matches!(k, Variant::String(s) if s == key))
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &Variant) -> bool {
        self.position(key).is_some()
    }

    /// Removes every entry under `key` and returns the value lookups saw.
    pub fn remove(&mut self, key: &Variant) -> Option<Variant> {
        let index = self.position(key)?;
        let (_, value) = self.entries.remove(index);
        self.entries.retain(|(k, _)| !values_equal(k, key));
        Some(value)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&Variant, &Variant)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Variant> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Variant> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl<K: Into<Variant>, V: Into<Variant>> FromIterator<(K, V)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dict = Dictionary::new();
        for (key, value) in iter {
            dict.insert(key, value);
        }
        dict
    }
}

// --- Variant ---

/// A dynamically typed value.
///
/// Values whose payload fits in 16 bytes are stored inline and never allocate.
/// Larger fixed records are boxed; strings, containers and packed arrays own
/// heap storage. `Proxied` values live behind the engine boundary and are read
/// through their [`Proxy`].
///
/// Integer and Float remember the width they were decoded with, so a decoded
/// buffer re-encodes to the same bytes.
#[derive(Clone, Default, PartialEq, Debug)]
pub enum Variant {
    #[default]
    Nil,
    Bool(bool),
    Int32(i32),
    Int(i64),
    Float32(f32),
    Float(f64),
    String(String),
    Vector2(Vector2),
    Rect2(Rect2),
    Vector3(Vector3),
    Transform2D(Box<Transform2D>),
    Plane(Plane),
    Quaternion(Quaternion),
    Aabb(Box<Aabb>),
    Basis(Box<Basis>),
    Transform3D(Box<Transform3D>),
    Color(Color),
    Vector4(Vector4),
    NodePath(NodePath),
    Rid(Rid),
    /// `None` is the null object, and the placeholder for decoded objects.
    Object(Option<ObjectId>),
    Dictionary(Dictionary),
    Array(Array),
    RawArray(Bytes),
    Int32Array(PackedInt32Array),
    Int64Array(PackedInt64Array),
    Float32Array(PackedFloat32Array),
    Float64Array(PackedFloat64Array),
    StringArray(Vec<String>),
    Vector2Array(PackedVector2Array),
    Vector3Array(PackedVector3Array),
    ColorArray(PackedColorArray),
    Proxied(Proxied),
}

impl Variant {
    /// Wraps an engine-owned value identified by `handle`.
    pub fn from_proxy(proxy: Arc<dyn Proxy>, handle: ProxyHandle) -> Self {
        Variant::Proxied(Proxied::new(proxy, handle))
    }

    pub fn nil() -> Self {
        Variant::Nil
    }

    pub fn is_nil(&self) -> bool {
        match self {
            Variant::Nil => true,
            Variant::Proxied(p) => p.variant_type() == VariantType::Nil,
            _ => false,
        }
    }

    pub fn variant_type(&self) -> VariantType {
        match self {
            Variant::Nil => VariantType::Nil,
            Variant::Bool(_) => VariantType::Bool,
            Variant::Int32(_) | Variant::Int(_) => VariantType::Integer,
            Variant::Float32(_) | Variant::Float(_) => VariantType::Float,
            Variant::String(_) => VariantType::String,
            Variant::Vector2(_) => VariantType::Vector2,
            Variant::Rect2(_) => VariantType::Rect2,
            Variant::Vector3(_) => VariantType::Vector3,
            Variant::Transform2D(_) => VariantType::Transform2D,
            Variant::Plane(_) => VariantType::Plane,
            Variant::Quaternion(_) => VariantType::Quaternion,
            Variant::Aabb(_) => VariantType::Aabb,
            Variant::Basis(_) => VariantType::Basis,
            Variant::Transform3D(_) => VariantType::Transform3D,
            Variant::Color(_) => VariantType::Color,
            Variant::Vector4(_) => VariantType::Vector4,
            Variant::NodePath(_) => VariantType::NodePath,
            Variant::Rid(_) => VariantType::Rid,
            Variant::Object(_) => VariantType::Object,
            Variant::Dictionary(_) => VariantType::Dictionary,
            Variant::Array(_) => VariantType::Array,
            Variant::RawArray(_) => VariantType::RawArray,
            Variant::Int32Array(_) => VariantType::Int32Array,
            Variant::Int64Array(_) => VariantType::Int64Array,
            Variant::Float32Array(_) => VariantType::Float32Array,
            Variant::Float64Array(_) => VariantType::Float64Array,
            Variant::StringArray(_) => VariantType::StringArray,
            Variant::Vector2Array(_) => VariantType::Vector2Array,
            Variant::Vector3Array(_) => VariantType::Vector3Array,
            Variant::ColorArray(_) => VariantType::ColorArray,
            Variant::Proxied(p) => p.variant_type(),
        }
    }

    /// Converts to `T`, panicking if the stored type does not match.
    ///
    /// # Panics
    /// With a message naming both the expected and the actual type.
    pub fn to<T: FromVariant>(&self) -> T {
        match T::try_from_variant(self) {
            Ok(value) => value,
            Err(err) => panic!("Variant::to: {err}"),
        }
    }

    pub fn try_to<T: FromVariant>(&self) -> Result<T, ConvertError> {
        T::try_from_variant(self)
    }

    pub fn to_bool(&self) -> bool {
        self.to()
    }

    pub fn to_int(&self) -> i64 {
        self.to()
    }

    pub fn to_float(&self) -> f64 {
        self.to()
    }

    /// The stored string. Named so it does not shadow `ToString`.
    pub fn to_string_value(&self) -> String {
        self.to()
    }

    pub fn to_vector2(&self) -> Vector2 {
        self.to()
    }

    pub fn to_vector3(&self) -> Vector3 {
        self.to()
    }

    pub fn to_color(&self) -> Color {
        self.to()
    }

    pub fn to_node_path(&self) -> NodePath {
        self.to()
    }

    pub fn to_array(&self) -> Array {
        self.to()
    }

    pub fn to_dictionary(&self) -> Dictionary {
        self.to()
    }

    /// Borrows the packed array of `T` without copying. Proxied values have
    /// no local storage and return `None`; use [`to`](Self::to) for those.
    pub fn as_packed<T: PackedElement>(&self) -> Option<&Packed<T>> {
        T::view(self)
    }

    /// Borrows the bytes of a raw array.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Variant::RawArray(bytes) => Some(bytes.as_ref()),
            _ => None,
        }
    }

    /// Resolves a proxied value into a fully local one. Local values are
    /// returned as a clone.
    pub fn materialize(&self) -> Variant {
        match self {
            Variant::Proxied(p) => p.materialize(),
            local => local.clone(),
        }
    }

    /// Hash of the value, stable across processes for local values.
    pub fn hash(&self) -> Result<u32, CallError> {
        if let Variant::Proxied(p) = self {
            return p.proxy().hash(p.handle());
        }
        let mut writer = BytesMut::new();
        match self.marshal_into(&mut writer) {
            Ok(()) => Ok(CRC32.checksum(&writer)),
            Err(EncoderError::Proxy(message)) => Err(CallError::Proxy(message)),
            // Otherwise only lengths beyond the wire limit fail to encode.
            Err(_) => Ok(CRC32.checksum(self.variant_type().name().as_bytes())),
        }
    }

    /// Deep copy. Containers and packed arrays get storage of their own.
    pub fn duplicate(&self) -> Result<Variant, CallError> {
        let copy = match self {
            Variant::Proxied(p) => return p.proxy().duplicate(p.handle()),
            Variant::RawArray(bytes) => Variant::RawArray(Bytes::copy_from_slice(bytes)),
            Variant::Int32Array(a) => Variant::Int32Array(a.iter().collect()),
            Variant::Int64Array(a) => Variant::Int64Array(a.iter().collect()),
            Variant::Float32Array(a) => Variant::Float32Array(a.iter().collect()),
            Variant::Float64Array(a) => Variant::Float64Array(a.iter().collect()),
            Variant::Vector2Array(a) => Variant::Vector2Array(a.iter().collect()),
            Variant::Vector3Array(a) => Variant::Vector3Array(a.iter().collect()),
            Variant::ColorArray(a) => Variant::ColorArray(a.iter().collect()),
            Variant::Array(a) => Variant::Array(
                a.iter()
                    .map(Variant::duplicate)
                    .collect::<Result<_, _>>()?,
            ),
            Variant::Dictionary(d) => Variant::Dictionary(Dictionary {
                entries: d
                    .iter()
                    .map(|(k, v)| Ok((k.duplicate()?, v.duplicate()?)))
                    .collect::<Result<_, CallError>>()?,
            }),
            other => other.clone(),
        };
        Ok(copy)
    }

    /// Reads `key` from a container: an index for arrays, a key for
    /// dictionaries.
    pub fn get(&self, key: &Variant) -> Result<Variant, CallError> {
        match self {
            Variant::Proxied(p) => p.proxy().get(p.handle(), key),
            Variant::Dictionary(d) => d.get(key).cloned().ok_or(CallError::KeyNotFound),
            Variant::Array(a) => {
                let index = index_of(key, a.len())?;
                Ok(a.as_slice()[index].clone())
            }
            Variant::StringArray(a) => {
                let index = index_of(key, a.len())?;
                Ok(Variant::String(a[index].clone()))
            }
            Variant::RawArray(b) => {
                let index = index_of(key, b.len())?;
                Ok(Variant::Int(b[index] as i64))
            }
            Variant::Int32Array(a) => packed_get(a, key),
            Variant::Int64Array(a) => packed_get(a, key),
            Variant::Float32Array(a) => packed_get(a, key),
            Variant::Float64Array(a) => packed_get(a, key),
            Variant::Vector2Array(a) => packed_get(a, key),
            Variant::Vector3Array(a) => packed_get(a, key),
            Variant::ColorArray(a) => packed_get(a, key),
            other => Err(CallError::Unsupported {
                operation: "get",
                ty: other.variant_type(),
            }),
        }
    }

    /// Writes `value` under `key`. Arrays accept existing indices only.
    pub fn set(&mut self, key: Variant, value: Variant) -> Result<(), CallError> {
        match self {
            Variant::Proxied(p) => p.proxy().set(p.handle(), key, value),
            Variant::Dictionary(d) => {
                d.insert(key, value);
                Ok(())
            }
            Variant::Array(a) => {
                let index = index_of(&key, a.len())?;
                a.items_mut()[index] = value;
                Ok(())
            }
            other => Err(CallError::Unsupported {
                operation: "set",
                ty: other.variant_type(),
            }),
        }
    }

    /// Iterates `(key, value)` pairs: `(index, element)` for arrays and
    /// packed arrays, entries for dictionaries.
    pub fn iter(&self) -> Result<Iter<'_>, CallError> {
        let iter = match self {
            Variant::Proxied(p) => Iter::Owned(p.proxy().iter(p.handle())?.into_iter()),
            Variant::Array(a) => Iter::Array(a.as_slice().iter().enumerate()),
            Variant::Dictionary(d) => Iter::Dictionary(d.entries.iter()),
            Variant::RawArray(b) => Iter::owned(b.iter().map(|&v| Variant::Int(v as i64))),
            Variant::Int32Array(a) => Iter::owned(a.iter().map(Variant::from)),
            Variant::Int64Array(a) => Iter::owned(a.iter().map(Variant::from)),
            Variant::Float32Array(a) => Iter::owned(a.iter().map(Variant::from)),
            Variant::Float64Array(a) => Iter::owned(a.iter().map(Variant::from)),
            Variant::StringArray(a) => Iter::owned(a.iter().cloned().map(Variant::from)),
            Variant::Vector2Array(a) => Iter::owned(a.iter().map(Variant::from)),
            Variant::Vector3Array(a) => Iter::owned(a.iter().map(Variant::from)),
            Variant::ColorArray(a) => Iter::owned(a.iter().map(Variant::from)),
            other => {
                return Err(CallError::Unsupported {
                    operation: "iter",
                    ty: other.variant_type(),
                })
            }
        };
        Ok(iter)
    }

    /// Calls `method` on an engine-owned value. Local values have no methods.
    pub fn call(&self, method: &str, args: &[Variant]) -> Result<Variant, CallError> {
        match self {
            Variant::Proxied(p) => {
                log::trace!("call {method} with {} args through {:?}", args.len(), p);
                p.proxy().call(p.handle(), method, args)
            }
            other => Err(CallError::Unsupported {
                operation: "call",
                ty: other.variant_type(),
            }),
        }
    }

    /// Evaluates `self <op> other`. `other` is ignored by unary operators.
    pub fn calculate(&self, op: Operator, other: &Variant) -> Result<Variant, CallError> {
        match self {
            Variant::Proxied(p) => p.proxy().calculate(p.handle(), op, other),
            local => calculate_local(local, op, &other.materialize()),
        }
    }
}

fn index_of(key: &Variant, len: usize) -> Result<usize, CallError> {
    let index: i64 = key.try_to()?;
    usize::try_from(index)
        .ok()
        .filter(|&i| i < len)
        .ok_or(CallError::IndexOutOfBounds { index, len })
}

fn packed_get<T: PackedElement>(packed: &Packed<T>, key: &Variant) -> Result<Variant, CallError>
where
    Variant: From<T>,
{
    let index = index_of(key, packed.len())?;
    packed
        .get(index)
        .map(Variant::from)
        .ok_or(CallError::IndexOutOfBounds {
            index: index as i64,
            len: packed.len(),
        })
}

// --- Iteration ---

/// Iterator returned by [`Variant::iter`].
pub enum Iter<'a> {
    Array(std::iter::Enumerate<std::slice::Iter<'a, Variant>>),
    Dictionary(std::slice::Iter<'a, (Variant, Variant)>),
    Owned(std::vec::IntoIter<(Variant, Variant)>),
}

impl Iter<'_> {
    fn owned(values: impl Iterator<Item = Variant>) -> Self {
        let pairs: Vec<_> = values
            .enumerate()
            .map(|(i, v)| (Variant::Int(i as i64), v))
            .collect();
        Iter::Owned(pairs.into_iter())
    }
}

impl Iterator for Iter<'_> {
    type Item = (Variant, Variant);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Iter::Array(it) => it.next().map(|(i, v)| (Variant::Int(i as i64), v.clone())),
            Iter::Dictionary(it) => it.next().cloned(),
            Iter::Owned(it) => it.next(),
        }
    }
}

// --- Operators ---

enum Number {
    Int(i64),
    Float(f64),
}

fn as_number(value: &Variant) -> Option<Number> {
    match *value {
        Variant::Int32(v) => Some(Number::Int(v as i64)),
        Variant::Int(v) => Some(Number::Int(v)),
        Variant::Float32(v) => Some(Number::Float(v as f64)),
        Variant::Float(v) => Some(Number::Float(v)),
        _ => None,
    }
}

fn calculate_local(lhs: &Variant, op: Operator, rhs: &Variant) -> Result<Variant, CallError> {
    let unsupported = || CallError::InvalidOperands {
        op,
        lhs: lhs.variant_type(),
        rhs: rhs.variant_type(),
    };
    match op {
        Operator::Equal => return Ok(Variant::Bool(values_equal(lhs, rhs))),
        Operator::NotEqual => return Ok(Variant::Bool(!values_equal(lhs, rhs))),
        Operator::Not => {
            return lhs
                .try_to::<bool>()
                .map(|b| Variant::Bool(!b))
                .map_err(|_| unsupported())
        }
        Operator::And | Operator::Or => {
            let (a, b) = (lhs.try_to::<bool>(), rhs.try_to::<bool>());
            return match (a, b, op) {
                (Ok(a), Ok(b), Operator::And) => Ok(Variant::Bool(a && b)),
                (Ok(a), Ok(b), _) => Ok(Variant::Bool(a || b)),
                _ => Err(unsupported()),
            };
        }
        _ => {}
    }

    if let (Variant::String(a), Variant::String(b)) = (lhs, rhs) {
        return match op {
            Operator::Add => Ok(Variant::String(format!("{a}{b}"))),
            Operator::Less => Ok(Variant::Bool(a < b)),
            Operator::LessEqual => Ok(Variant::Bool(a <= b)),
            Operator::Greater => Ok(Variant::Bool(a > b)),
            Operator::GreaterEqual => Ok(Variant::Bool(a >= b)),
            _ => Err(unsupported()),
        };
    }

    match (lhs, rhs) {
        (Variant::Vector2(a), Variant::Vector2(b)) => {
            return match op {
                Operator::Add => Ok(Vector2::new(a.x + b.x, a.y + b.y).into()),
                Operator::Subtract => Ok(Vector2::new(a.x - b.x, a.y - b.y).into()),
                _ => Err(unsupported()),
            }
        }
        (Variant::Vector3(a), Variant::Vector3(b)) => {
            return match op {
                Operator::Add => Ok(Vector3::new(a.x + b.x, a.y + b.y, a.z + b.z).into()),
                Operator::Subtract => Ok(Vector3::new(a.x - b.x, a.y - b.y, a.z - b.z).into()),
                _ => Err(unsupported()),
            }
        }
        _ => {}
    }

    if op == Operator::Negate {
        return match as_number(lhs).ok_or_else(unsupported)? {
            Number::Int(v) => Ok(Variant::Int(v.wrapping_neg())),
            Number::Float(v) => Ok(Variant::Float(-v)),
        };
    }

    let (a, b) = match (as_number(lhs), as_number(rhs)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(unsupported()),
    };
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => match op {
            Operator::Add => Ok(Variant::Int(a.wrapping_add(b))),
            Operator::Subtract => Ok(Variant::Int(a.wrapping_sub(b))),
            Operator::Multiply => Ok(Variant::Int(a.wrapping_mul(b))),
            Operator::Divide if b == 0 => Err(CallError::DivisionByZero),
            Operator::Divide => Ok(Variant::Int(a.wrapping_div(b))),
            Operator::Modulo if b == 0 => Err(CallError::DivisionByZero),
            Operator::Modulo => Ok(Variant::Int(a.wrapping_rem(b))),
            Operator::Less => Ok(Variant::Bool(a < b)),
            Operator::LessEqual => Ok(Variant::Bool(a <= b)),
            Operator::Greater => Ok(Variant::Bool(a > b)),
            Operator::GreaterEqual => Ok(Variant::Bool(a >= b)),
            _ => Err(unsupported()),
        },
        (a, b) => {
            let a = match a {
                Number::Int(v) => v as f64,
                Number::Float(v) => v,
            };
            let b = match b {
                Number::Int(v) => v as f64,
                Number::Float(v) => v,
            };
            match op {
                Operator::Add => Ok(Variant::Float(a + b)),
                Operator::Subtract => Ok(Variant::Float(a - b)),
                Operator::Multiply => Ok(Variant::Float(a * b)),
                Operator::Divide => Ok(Variant::Float(a / b)),
                Operator::Modulo => Ok(Variant::Float(a % b)),
                Operator::Less => Ok(Variant::Bool(a < b)),
                Operator::LessEqual => Ok(Variant::Bool(a <= b)),
                Operator::Greater => Ok(Variant::Bool(a > b)),
                Operator::GreaterEqual => Ok(Variant::Bool(a >= b)),
                _ => Err(unsupported()),
            }
        }
    }
}

/// Equality across storage widths: `Int32(1)` equals `Int(1)`, also inside
/// containers. Dictionaries compare as maps, ignoring entry order.
pub(crate) fn values_equal(lhs: &Variant, rhs: &Variant) -> bool {
    match (lhs, rhs) {
        (Variant::Array(a), Variant::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Variant::Dictionary(a), Variant::Dictionary(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| values_equal(value, other)))
        }
        _ => match (as_number(lhs), as_number(rhs)) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => a == b,
            (Some(Number::Float(a)), Some(Number::Float(b))) => a == b,
            (Some(_), Some(_)) => false,
            _ => lhs == rhs,
        },
    }
}

// --- Display ---

fn write_list<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = T>,
) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Nil => f.write_str("<null>"),
            Variant::Bool(v) => write!(f, "{v}"),
            Variant::Int32(v) => write!(f, "{v}"),
            Variant::Int(v) => write!(f, "{v}"),
            Variant::Float32(v) => write!(f, "{v}"),
            Variant::Float(v) => write!(f, "{v}"),
            Variant::String(v) => f.write_str(v),
            Variant::Vector2(v) => write!(f, "{v}"),
            Variant::Rect2(v) => write!(f, "{v}"),
            Variant::Vector3(v) => write!(f, "{v}"),
            Variant::Transform2D(v) => write!(f, "{v}"),
            Variant::Plane(v) => write!(f, "{v}"),
            Variant::Quaternion(v) => write!(f, "{v}"),
            Variant::Aabb(v) => write!(f, "{v}"),
            Variant::Basis(v) => write!(f, "{v}"),
            Variant::Transform3D(v) => write!(f, "{v}"),
            Variant::Color(v) => write!(f, "{v}"),
            Variant::Vector4(v) => write!(f, "{v}"),
            Variant::NodePath(v) => write!(f, "{v}"),
            Variant::Rid(v) => write!(f, "{v}"),
            Variant::Object(Some(id)) => write!(f, "<Object#{}>", id.get()),
            Variant::Object(None) => f.write_str("<null>"),
            Variant::Dictionary(d) => {
                f.write_str("{")?;
                for (i, (k, v)) in d.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Variant::Array(a) => write_list(f, a.iter()),
            Variant::RawArray(b) => write_list(f, b.iter()),
            Variant::Int32Array(a) => write_list(f, a.iter()),
            Variant::Int64Array(a) => write_list(f, a.iter()),
            Variant::Float32Array(a) => write_list(f, a.iter()),
            Variant::Float64Array(a) => write_list(f, a.iter()),
            Variant::StringArray(a) => write_list(f, a.iter()),
            Variant::Vector2Array(a) => write_list(f, a.iter()),
            Variant::Vector3Array(a) => write_list(f, a.iter()),
            Variant::ColorArray(a) => write_list(f, a.iter()),
            Variant::Proxied(p) => match p.materialize() {
                Variant::Proxied(_) => write!(f, "<{}#{:?}>", p.variant_type(), p.handle()),
                local => write!(f, "{local}"),
            },
        }
    }
}

// --- Conversions into Variant ---

macro_rules! impl_from_inline {
    ($($ty:ty => $variant:ident),+ $(,)?) => {$(
        impl From<$ty> for Variant {
            fn from(value: $ty) -> Self {
                Variant::$variant(value.into())
            }
        }
    )+};
}

impl_from_inline!(
    bool => Bool,
    i8 => Int32,
    i16 => Int32,
    i32 => Int32,
    u8 => Int32,
    u16 => Int32,
    i64 => Int,
    u32 => Int,
    f32 => Float32,
    f64 => Float,
    String => String,
    Vector2 => Vector2,
    Rect2 => Rect2,
    Vector3 => Vector3,
    Transform2D => Transform2D,
    Plane => Plane,
    Quaternion => Quaternion,
    Aabb => Aabb,
    Basis => Basis,
    Transform3D => Transform3D,
    Color => Color,
    Vector4 => Vector4,
    NodePath => NodePath,
    Rid => Rid,
    Dictionary => Dictionary,
    Array => Array,
    Bytes => RawArray,
    PackedInt32Array => Int32Array,
    PackedInt64Array => Int64Array,
    PackedFloat32Array => Float32Array,
    PackedFloat64Array => Float64Array,
    Vec<String> => StringArray,
    PackedVector2Array => Vector2Array,
    PackedVector3Array => Vector3Array,
    PackedColorArray => ColorArray,
);

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_owned())
    }
}

impl From<Vec<u8>> for Variant {
    fn from(value: Vec<u8>) -> Self {
        Variant::RawArray(Bytes::from(value))
    }
}

/// `None` is the null object, matching how it is marshaled.
impl From<Option<ObjectId>> for Variant {
    fn from(value: Option<ObjectId>) -> Self {
        Variant::Object(value)
    }
}

impl<T: Into<Variant>> From<Option<T>> for Variant {
    fn from(value: Option<T>) -> Self {
        value.map_or(Variant::Nil, Into::into)
    }
}

impl From<Proxied> for Variant {
    fn from(value: Proxied) -> Self {
        Variant::Proxied(value)
    }
}

macro_rules! impl_from_packed_vec {
    ($($ty:ty),+) => {$(
        impl From<Vec<$ty>> for Variant {
            fn from(value: Vec<$ty>) -> Self {
                Packed::<$ty>::from(value).into()
            }
        }
    )+};
}

impl_from_packed_vec!(i32, i64, f32, f64, Vector2, Vector3, Color);

// --- ToVariant ---

macro_rules! impl_to_variant {
    ($($ty:ty),+ $(,)?) => {$(
        impl ToVariant for $ty {
            fn to_variant(&self) -> Variant {
                Variant::from(self.clone())
            }
        }
    )+};
}

impl_to_variant!(
    bool, i8, i16, i32, u8, u16, u32, i64, f32, f64, String, Vector2, Rect2, Vector3,
    Transform2D, Plane, Quaternion, Aabb, Basis, Transform3D, Color, Vector4, NodePath, Rid,
    Option<ObjectId>, Dictionary, Array, Bytes, Vec<u8>, Vec<String>, Vec<i32>, Vec<i64>,
    Vec<f32>, Vec<f64>, Vec<Vector2>, Vec<Vector3>, Vec<Color>, PackedInt32Array, PackedInt64Array,
    PackedFloat32Array, PackedFloat64Array, PackedVector2Array, PackedVector3Array,
    PackedColorArray, Variant,
);

impl ToVariant for str {
    fn to_variant(&self) -> Variant {
        Variant::from(self)
    }
}

impl<T: ToVariant> ToVariant for Option<T> {
    fn to_variant(&self) -> Variant {
        self.as_ref().map_or(Variant::Nil, ToVariant::to_variant)
    }
}

impl<T: ToVariant + ?Sized> ToVariant for &T {
    fn to_variant(&self) -> Variant {
        (**self).to_variant()
    }
}

// --- FromVariant ---

fn mismatch(expected: VariantType, variant: &Variant) -> ConvertError {
    ConvertError::TypeMismatch {
        expected,
        actual: variant.variant_type(),
    }
}

/// Resolves proxied values before a local conversion.
fn through_proxy<T: FromVariant>(proxied: &Proxied) -> Result<T, ConvertError> {
    match proxied.materialize() {
        Variant::Proxied(_) => Err(ConvertError::Proxy(format!(
            "{proxied:?} did not materialize to a local value"
        ))),
        local => T::try_from_variant(&local),
    }
}

impl FromVariant for bool {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        match variant {
            Variant::Bool(v) => Ok(*v),
            Variant::Proxied(p) => p.proxy().to_bool(p.handle()),
            other => Err(mismatch(VariantType::Bool, other)),
        }
    }
}

impl FromVariant for i64 {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        match variant {
            Variant::Int32(v) => Ok(*v as i64),
            Variant::Int(v) => Ok(*v),
            Variant::Proxied(p) => p.proxy().to_int(p.handle()),
            other => Err(mismatch(VariantType::Integer, other)),
        }
    }
}

macro_rules! impl_from_variant_int {
    ($($ty:ty),+) => {$(
        impl FromVariant for $ty {
            fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
                let value = i64::try_from_variant(variant)?;
                <$ty>::try_from(value).map_err(|_| ConvertError::OutOfRange {
                    value,
                    target: stringify!($ty),
                })
            }
        }
    )+};
}

impl_from_variant_int!(i8, i16, i32, u8, u16, u32, isize, usize);

/// Reinterprets the 64-bit payload, matching how `u64` is written.
impl FromVariant for u64 {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        i64::try_from_variant(variant).map(|v| v as u64)
    }
}

impl FromVariant for f64 {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        match variant {
            Variant::Float32(v) => Ok(*v as f64),
            Variant::Float(v) => Ok(*v),
            Variant::Proxied(p) => p.proxy().to_float(p.handle()),
            other => Err(mismatch(VariantType::Float, other)),
        }
    }
}

impl FromVariant for f32 {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        match variant {
            Variant::Float32(v) => Ok(*v),
            other => f64::try_from_variant(other).map(|v| v as f32),
        }
    }
}

impl FromVariant for String {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        match variant {
            Variant::String(v) => Ok(v.clone()),
            Variant::Proxied(p) => p.proxy().to_string_value(p.handle()),
            other => Err(mismatch(VariantType::String, other)),
        }
    }
}

macro_rules! impl_from_variant_local {
    ($($ty:ty => $variant:ident $(($deref:tt))?),+ $(,)?) => {$(
        impl FromVariant for $ty {
            fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
                match variant {
                    Variant::$variant(v) => Ok($($deref)?(v.clone())),
                    Variant::Proxied(p) => through_proxy(p),
                    other => Err(mismatch(VariantType::$variant, other)),
                }
            }
        }
    )+};
}

impl_from_variant_local!(
    Rect2 => Rect2,
    Transform2D => Transform2D(*),
    Plane => Plane,
    Quaternion => Quaternion,
    Aabb => Aabb(*),
    Basis => Basis(*),
    Transform3D => Transform3D(*),
    Vector4 => Vector4,
    NodePath => NodePath,
    Rid => Rid,
    Dictionary => Dictionary,
    Array => Array,
    Bytes => RawArray,
    Vec<String> => StringArray,
);

/// Records a proxy can serve without materializing the value.
macro_rules! impl_from_variant_served {
    ($($ty:ident => $method:ident),+ $(,)?) => {$(
        impl FromVariant for $ty {
            fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
                match variant {
                    Variant::$ty(v) => Ok(*v),
                    Variant::Proxied(p) => p.proxy().$method(p.handle()),
                    other => Err(mismatch(VariantType::$ty, other)),
                }
            }
        }
    )+};
}

impl_from_variant_served!(
    Vector2 => to_vector2,
    Vector3 => to_vector3,
    Color => to_color,
);

impl FromVariant for Option<ObjectId> {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        match variant {
            Variant::Object(id) => Ok(*id),
            Variant::Proxied(p) => through_proxy(p),
            other => Err(mismatch(VariantType::Object, other)),
        }
    }
}

impl FromVariant for Vec<u8> {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        Bytes::try_from_variant(variant).map(|b| b.to_vec())
    }
}

/// Matches the packed array tag of `T`.
impl<T: PackedElement> FromVariant for Packed<T> {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        match variant {
            Variant::Proxied(p) => through_proxy(p),
            other => T::view(other)
                .cloned()
                .ok_or_else(|| mismatch(T::ARRAY_TYPE, other)),
        }
    }
}

impl<T: PackedElement> FromVariant for Vec<T> {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        Packed::<T>::try_from_variant(variant).map(|p| p.to_vec())
    }
}

impl FromVariant for Variant {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        Ok(variant.clone())
    }
}

/// Nil reads as `None`.
impl<T: FromVariant> FromVariant for Option<T> {
    fn try_from_variant(variant: &Variant) -> Result<Self, ConvertError> {
        if variant.is_nil() {
            Ok(None)
        } else {
            T::try_from_variant(variant).map(Some)
        }
    }
}
