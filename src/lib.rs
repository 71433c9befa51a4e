//! # gd-variant
//!
//! Binary codec for the engine's `Variant`: a dynamically typed value that
//! crosses the scripting boundary as a compact little-endian byte stream.
//!
//! - Encodes Rust values and [`Variant`]s into the engine's wire format
//! - Decodes any buffer into a [`Variant`], or measures the leading value
//!   without building it
//! - Packed arrays decode as views sharing the input allocation
//! - Values owned by the engine are reached through the [`Proxy`] capability
//!   trait and behave like local values
//!
//! ## Wire format
//!
//! Every value starts with a 4-byte header `tag | (flags << 16)`. Flag bit 0
//! selects 64-bit Integer/Float payloads. Strings are length-prefixed and
//! zero-padded to a multiple of 4; geometric types are flattened `f32`
//! fields; packed arrays are a count followed by the elements. The tag
//! numbering is fixed, see [`VariantType`].
//!
//! ## Derive Macros
//!
//! With the `derive` feature (on by default), `#[derive(ToVariant, FromVariant)]`
//! maps structs to dictionaries keyed by field name, tuple structs to arrays,
//! newtypes to their inner value, and unit-only enums to their index.
//!
//! - `#[variant(rename = "name")]`: Use `name` as the dictionary key.
//! - `#[variant(skip)]`: Not written; reads as `Default::default()`.
//! - `#[variant(default)]`: A missing key reads as `Default::default()`.
//!
//! ## Feature Flags
//!
//! - `derive`: Re-exports the `ToVariant`/`FromVariant` derive macros.
//! - `glam`: Conversions between the math types and `glam` vectors, quaternions and matrices.
//! - `serde_json`: Conversions between [`Variant`] and `serde_json::Value`.

pub mod core;
mod features;
pub mod math;
pub mod packed;
pub mod proxy;
pub mod variant;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::any::Any;

pub use crate::core::VariantType;
pub use crate::math::{
    Aabb, Basis, Color, Plane, Quaternion, Rect2, Transform2D, Transform3D, Vector2, Vector3,
    Vector4,
};
pub use crate::packed::{
    Packed, PackedColorArray, PackedElement, PackedFloat32Array, PackedFloat64Array,
    PackedInt32Array, PackedInt64Array, PackedVector2Array, PackedVector3Array,
};
pub use crate::proxy::{Operator, Proxied, Proxy, ProxyHandle};
pub use crate::variant::{Array, Dictionary, NodePath, ObjectId, Rid, Variant};
pub use bytes;
#[cfg(feature = "derive")]
pub use gd_variant_derive::{FromVariant, ToVariant};

/// Errors that can occur during encoding or decoding operations.
#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    /// The dynamic encoder was handed a type with no wire representation.
    #[error("Unsupported type: {0}")]
    UnsupportedType(&'static str),
    /// The value could not be encoded (e.g., a length beyond 31 bits).
    #[error("Encode error: {0}")]
    Encode(String),
    /// The buffer ended before a field of the value.
    #[error("Truncated {what}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        what: &'static str,
        needed: usize,
        remaining: usize,
    },
    #[error("Unknown variant tag: {0}")]
    UnknownTag(u32),
    /// The value could not be decoded (e.g., invalid UTF-8).
    #[error("Decode error: {0}")]
    Decode(String),
    /// Containers were nested deeper than the decoder allows.
    #[error("Nesting exceeds depth limit of {0}")]
    DepthLimit(usize),
    /// A proxied value could not be resolved to a local one.
    #[error("Proxy error: {0}")]
    Proxy(String),
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

/// The result type used throughout this crate for encode/decode operations.
pub type Result<T> = std::result::Result<T, EncoderError>;

/// Errors from converting a [`Variant`] into a concrete Rust type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConvertError {
    #[error("Expected {expected}, got {actual}")]
    TypeMismatch {
        expected: VariantType,
        actual: VariantType,
    },
    #[error("Integer {value} does not fit in {target}")]
    OutOfRange { value: i64, target: &'static str },
    #[error("Required field '{field}' not found for {type_name}")]
    MissingField {
        field: &'static str,
        type_name: &'static str,
    },
    #[error("Proxy error: {0}")]
    Proxy(String),
}

/// Errors from the container and operator helpers on [`Variant`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    #[error("{operation} is not supported on {ty}")]
    Unsupported {
        operation: &'static str,
        ty: VariantType,
    },
    #[error("Invalid operands for {op:?}: {lhs} and {rhs}")]
    InvalidOperands {
        op: Operator,
        lhs: VariantType,
        rhs: VariantType,
    },
    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("Key not found")]
    KeyNotFound,
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Proxy error: {0}")]
    Proxy(String),
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

/// Trait for types that can be written in the variant wire format.
///
/// # Errors
/// Returns `EncoderError` if the value cannot be encoded.
pub trait Marshal {
    /// Appends the header and payload of `self` to `writer`.
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()>;
}

/// Conversion into a [`Variant`].
///
/// Most users should use `#[derive(ToVariant)]` for their own types.
pub trait ToVariant {
    fn to_variant(&self) -> Variant;
}

/// Fallible conversion out of a [`Variant`].
///
/// Most users should use `#[derive(FromVariant)]` for their own types.
pub trait FromVariant: Sized {
    fn try_from_variant(variant: &Variant) -> std::result::Result<Self, ConvertError>;
}

/// Default bound on container nesting while decoding.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Decoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Arrays and dictionaries nested deeper than this are rejected.
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Encodes a value to bytes.
///
/// # Example
/// ```rust
/// use gd_variant::{marshal, unmarshal_any, Variant, Vector3};
///
/// let buf = marshal(&Vector3::new(1.0, 2.0, 3.0)).unwrap();
/// assert_eq!(buf.len(), 16);
/// assert_eq!(unmarshal_any(&buf).unwrap(), Variant::Vector3(Vector3::new(1.0, 2.0, 3.0)));
/// ```
pub fn marshal<T: Marshal + ?Sized>(value: &T) -> Result<Bytes> {
    let mut writer = BytesMut::new();
    value.marshal_into(&mut writer)?;
    Ok(writer.freeze())
}

macro_rules! marshal_downcast {
    ($any:expr, $($ty:ty),+ $(,)?) => {
        $(
            if let Some(value) = $any.downcast_ref::<$ty>() {
                return marshal(value);
            }
        )+
    };
}

/// Encodes a value whose type is only known at runtime.
///
/// # Errors
/// Returns `EncoderError::UnsupportedType` naming `T` if it has no wire
/// representation.
///
/// # Example
/// ```rust
/// use gd_variant::{marshal_dyn, EncoderError};
///
/// assert!(marshal_dyn(&7i32).is_ok());
/// assert!(matches!(marshal_dyn(&'x'), Err(EncoderError::UnsupportedType(_))));
/// ```
pub fn marshal_dyn<T: Any>(value: &T) -> Result<Bytes> {
    let any = value as &dyn Any;
    marshal_downcast!(
        any,
        Variant, bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64,
        String, &'static str, Vec<u8>, Bytes,
        Vector2, Vector3, Vector4, Rect2, Transform2D, Plane, Quaternion, Aabb, Basis,
        Transform3D, Color, NodePath, Rid, Option<ObjectId>,
        Vec<i32>, Vec<i64>, Vec<f32>, Vec<f64>, Vec<String>, Vec<Vector2>, Vec<Vector3>,
        Vec<Color>, PackedInt32Array, PackedInt64Array, PackedFloat32Array,
        PackedFloat64Array, PackedVector2Array, PackedVector3Array, PackedColorArray,
        Array, Dictionary,
    );
    if let Some(id) = any.downcast_ref::<ObjectId>() {
        return marshal(&Some(*id));
    }
    Err(EncoderError::UnsupportedType(std::any::type_name::<T>()))
}

/// Decodes the value at the start of `buf`. Trailing bytes are ignored.
///
/// Packed and raw arrays in the result share memory with `buf`.
///
/// # Example
/// ```rust
/// use gd_variant::{unmarshal_any, Variant};
/// use bytes::Bytes;
///
/// let buf = Bytes::from_static(&[1, 0, 0, 0, 1, 0, 0, 0]);
/// assert_eq!(unmarshal_any(&buf).unwrap(), Variant::Bool(true));
/// ```
pub fn unmarshal_any(buf: &Bytes) -> Result<Variant> {
    unmarshal_any_with(buf, &DecodeOptions::default())
}

pub fn unmarshal_any_with(buf: &Bytes, options: &DecodeOptions) -> Result<Variant> {
    let mut reader = buf.clone();
    crate::core::decode_variant(&mut reader, 0, options.max_depth)
}

/// Decodes one value from the front of `reader` and advances past it, for
/// streams of consecutive values.
pub fn unmarshal(reader: &mut Bytes) -> Result<Variant> {
    crate::core::decode_variant(reader, 0, DEFAULT_MAX_DEPTH)
}

/// Decodes the value at the start of `buf` and converts it to `T`.
pub fn unmarshal_as<T: FromVariant>(buf: &Bytes) -> Result<T> {
    let variant = unmarshal_any(buf)?;
    Ok(T::try_from_variant(&variant)?)
}

/// Returns how many bytes the value at the start of `buf` occupies, without
/// building it.
///
/// # Errors
/// Fails where [`unmarshal_any`] fails on the layout (truncation, unknown
/// tags, depth). String contents are not checked for valid UTF-8.
pub fn unmarshal_size(buf: &[u8]) -> Result<usize> {
    unmarshal_size_with(buf, &DecodeOptions::default())
}

pub fn unmarshal_size_with(buf: &[u8], options: &DecodeOptions) -> Result<usize> {
    let mut reader = buf;
    crate::core::skip_variant(&mut reader, 0, options.max_depth)?;
    Ok(buf.len() - reader.remaining())
}
