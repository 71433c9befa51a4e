use crate::math::*;
use crate::packed::{Packed, PackedElement};
use crate::variant::{Array, Dictionary, NodePath, ObjectId, Rid};
use crate::*;
use std::fmt;

/// Type tags used in the variant binary format.
///
/// The tag is the low byte of the 4-byte header word that starts every encoded
/// value. The numbering follows the engine's own `Variant::Type` ordering for
/// the first 21 tags, with the numeric packed arrays split by width; it is part
/// of the wire format and must never be renumbered.
///
/// - Tags above `ColorArray` are extensions appended after the closed range.
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum VariantType {
    Nil = 0,
    Bool = 1,
    Integer = 2,
    Float = 3,
    String = 4,
    Vector2 = 5,
    Rect2 = 6,
    Vector3 = 7,
    Transform2D = 8,
    Plane = 9,
    Quaternion = 10,
    Aabb = 11,
    Basis = 12,
    Transform3D = 13,
    Color = 14,
    NodePath = 15,
    Rid = 16,
    Object = 17,
    Dictionary = 18,
    Array = 19,
    RawArray = 20,
    Int32Array = 21,
    Int64Array = 22,
    Float32Array = 23,
    Float64Array = 24,
    StringArray = 25,
    Vector2Array = 26,
    Vector3Array = 27,
    ColorArray = 28,
    Vector4 = 29,
}

impl VariantType {
    /// Number of defined tags.
    pub const MAX: u8 = 30;

    /// Looks up the tag stored in the low byte of a header word.
    pub fn from_tag(tag: u8) -> Option<Self> {
        use VariantType::*;
        const ALL: [VariantType; VariantType::MAX as usize] = [
            Nil, Bool, Integer, Float, String, Vector2, Rect2, Vector3, Transform2D, Plane,
            Quaternion, Aabb, Basis, Transform3D, Color, NodePath, Rid, Object, Dictionary, Array,
            RawArray, Int32Array, Int64Array, Float32Array, Float64Array, StringArray,
            Vector2Array, Vector3Array, ColorArray, Vector4,
        ];
        ALL.get(tag as usize).copied()
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Nil => "Nil",
            Self::Bool => "bool",
            Self::Integer => "int",
            Self::Float => "float",
            Self::String => "String",
            Self::Vector2 => "Vector2",
            Self::Rect2 => "Rect2",
            Self::Vector3 => "Vector3",
            Self::Transform2D => "Transform2D",
            Self::Plane => "Plane",
            Self::Quaternion => "Quaternion",
            Self::Aabb => "AABB",
            Self::Basis => "Basis",
            Self::Transform3D => "Transform3D",
            Self::Color => "Color",
            Self::NodePath => "NodePath",
            Self::Rid => "RID",
            Self::Object => "Object",
            Self::Dictionary => "Dictionary",
            Self::Array => "Array",
            Self::RawArray => "PackedByteArray",
            Self::Int32Array => "PackedInt32Array",
            Self::Int64Array => "PackedInt64Array",
            Self::Float32Array => "PackedFloat32Array",
            Self::Float64Array => "PackedFloat64Array",
            Self::StringArray => "PackedStringArray",
            Self::Vector2Array => "PackedVector2Array",
            Self::Vector3Array => "PackedVector3Array",
            Self::ColorArray => "PackedColorArray",
            Self::Vector4 => "Vector4",
        }
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

///< Selects 64-bit Integer/Float payloads; marks an Object encoded as its id.
pub const ENCODE_FLAG_64: u32 = 1;
///< Low byte of the header word.
pub const HEADER_TYPE_MASK: u32 = 0xFF;
pub const HEADER_FLAGS_SHIFT: u32 = 16;
///< Set in a NodePath length field when the segment form follows.
pub const NODE_PATH_SEGMENTED: u32 = 0x8000_0000;
pub const NODE_PATH_FLAG_ABSOLUTE: u32 = 1;
///< Array and Dictionary counts; bit 31 is the engine's "shared" marker.
pub const CONTAINER_COUNT_MASK: u32 = 0x7FFF_FFFF;
///< Largest length or count any length field may carry.
pub const MAX_LENGTH: usize = 0x7FFF_FFFF;

// --- Header ---

#[inline]
pub fn write_header(writer: &mut BytesMut, ty: VariantType, flags: u32) {
    writer.put_u32_le(ty.tag() as u32 | (flags << HEADER_FLAGS_SHIFT));
}

/// Reads the header word, returning the tag and the flag bits.
///
/// # Errors
/// Returns an error if fewer than 4 bytes remain or the tag is unknown.
pub fn read_header(reader: &mut impl Buf) -> Result<(VariantType, u32)> {
    let word = read_u32(reader, "header")?;
    let tag = (word & HEADER_TYPE_MASK) as u8;
    let flags = word >> HEADER_FLAGS_SHIFT;
    match VariantType::from_tag(tag) {
        Some(ty) => Ok((ty, flags)),
        None => {
            log::debug!("rejecting variant header {word:#010x}: unknown tag {tag}");
            Err(EncoderError::UnknownTag(tag as u32))
        }
    }
}

// --- Primitive codec ---

/// Fails unless `needed` bytes remain in `reader`.
#[inline]
pub fn ensure(reader: &impl Buf, needed: usize, what: &'static str) -> Result<()> {
    let remaining = reader.remaining();
    if remaining < needed {
        log::debug!("truncated {what}: needed {needed} bytes, {remaining} remaining");
        return Err(EncoderError::Truncated {
            what,
            needed,
            remaining,
        });
    }
    Ok(())
}

#[inline]
pub fn read_u32(reader: &mut impl Buf, what: &'static str) -> Result<u32> {
    ensure(reader, 4, what)?;
    Ok(reader.get_u32_le())
}

#[inline]
pub fn read_u64(reader: &mut impl Buf, what: &'static str) -> Result<u64> {
    ensure(reader, 8, what)?;
    Ok(reader.get_u64_le())
}

/// Reads a fixed `f32` record after checking its full size is present.
#[inline]
fn read_record<T: FloatRecord>(reader: &mut impl Buf, what: &'static str) -> Result<T> {
    ensure(reader, T::SIZE, what)?;
    Ok(T::read(reader))
}

/// Writes a length or count field, rejecting values the format cannot carry.
#[inline]
fn write_len(writer: &mut BytesMut, len: usize, what: &'static str) -> Result<()> {
    if len > MAX_LENGTH {
        return Err(EncoderError::Encode(format!(
            "{what} length {len} exceeds {MAX_LENGTH}"
        )));
    }
    writer.put_u32_le(len as u32);
    Ok(())
}

/// Number of zero bytes that follow `len` payload bytes.
#[inline]
pub fn padding(len: usize) -> usize {
    (4 - len % 4) % 4
}

// --- Composite codec: strings and raw bytes ---

/// Writes a length prefix, the bytes, and zero padding to a 4-byte boundary.
pub fn write_padded(writer: &mut BytesMut, data: &[u8], what: &'static str) -> Result<()> {
    write_len(writer, data.len(), what)?;
    writer.put_slice(data);
    writer.put_bytes(0, padding(data.len()));
    Ok(())
}

/// Returns `len` plus its padding after checking it is present in `reader`.
fn padded_len(reader: &impl Buf, len: u32, what: &'static str) -> Result<usize> {
    let len = len as usize;
    let total = len
        .checked_add(padding(len))
        .ok_or_else(|| EncoderError::Decode(format!("{what} length {len} overflows")))?;
    ensure(reader, total, what)?;
    Ok(total)
}

/// Reads a length-prefixed, padded byte run. The result aliases `reader`.
pub fn read_padded(reader: &mut Bytes, what: &'static str) -> Result<Bytes> {
    let len = read_u32(reader, what)?;
    let total = padded_len(reader, len, what)?;
    let data = reader.split_to(len as usize);
    reader.advance(total - len as usize);
    Ok(data)
}

fn skip_padded(reader: &mut &[u8], what: &'static str) -> Result<()> {
    let len = read_u32(reader, what)?;
    let total = padded_len(reader, len, what)?;
    reader.advance(total);
    Ok(())
}

pub fn write_string(writer: &mut BytesMut, value: &str) -> Result<()> {
    write_padded(writer, value.as_bytes(), "string")
}

pub fn read_string(reader: &mut Bytes) -> Result<String> {
    let data = read_padded(reader, "string")?;
    String::from_utf8(data.to_vec()).map_err(|e| EncoderError::Decode(e.to_string()))
}

// --- NodePath codec ---

/// Writes a path in the segmented form: count with bit 31 set, the flags
/// word, then each segment as a padded string.
fn write_node_path(writer: &mut BytesMut, path: &str) -> Result<()> {
    let (absolute, rest) = match path.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, path),
    };
    let segments: Vec<&str> = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split('/').collect()
    };
    if segments.len() > MAX_LENGTH {
        return Err(EncoderError::Encode(format!(
            "node path has {} segments",
            segments.len()
        )));
    }
    writer.put_u32_le(segments.len() as u32 | NODE_PATH_SEGMENTED);
    writer.put_u32_le(if absolute { NODE_PATH_FLAG_ABSOLUTE } else { 0 });
    for segment in segments {
        write_string(writer, segment)?;
    }
    Ok(())
}

fn read_node_path(reader: &mut Bytes) -> Result<NodePath> {
    let first = read_u32(reader, "node path")?;
    if first & NODE_PATH_SEGMENTED == 0 {
        let total = padded_len(reader, first, "node path")?;
        let data = reader.split_to(first as usize);
        reader.advance(total - first as usize);
        let text = String::from_utf8(data.to_vec())
            .map_err(|e| EncoderError::Decode(e.to_string()))?;
        return Ok(NodePath::from(text));
    }
    let count = first & !NODE_PATH_SEGMENTED;
    let flags = read_u32(reader, "node path flags")?;
    let mut path = String::new();
    if flags & NODE_PATH_FLAG_ABSOLUTE != 0 {
        path.push('/');
    }
    for i in 0..count {
        if i > 0 {
            path.push('/');
        }
        path.push_str(&read_string(reader)?);
    }
    Ok(NodePath::from(path))
}

fn skip_node_path(reader: &mut &[u8]) -> Result<()> {
    let first = read_u32(reader, "node path")?;
    if first & NODE_PATH_SEGMENTED == 0 {
        let total = padded_len(reader, first, "node path")?;
        reader.advance(total);
        return Ok(());
    }
    let count = first & !NODE_PATH_SEGMENTED;
    read_u32(reader, "node path flags")?;
    for _ in 0..count {
        skip_padded(reader, "string")?;
    }
    Ok(())
}

// --- Container codec ---

fn write_packed<T: PackedElement>(writer: &mut BytesMut, items: &[T]) -> Result<()> {
    write_header(writer, T::ARRAY_TYPE, 0);
    write_len(writer, items.len(), T::ARRAY_TYPE.name())?;
    for item in items {
        item.write_element(writer);
    }
    Ok(())
}

/// Byte length of `count` packed elements, checked against `reader`.
fn packed_len(reader: &impl Buf, count: u32, size: usize, what: &'static str) -> Result<usize> {
    let len = (count as usize)
        .checked_mul(size)
        .ok_or_else(|| EncoderError::Decode(format!("{what} count {count} overflows")))?;
    ensure(reader, len, what)?;
    Ok(len)
}

fn read_packed<T: PackedElement>(reader: &mut Bytes) -> Result<Packed<T>> {
    let what = T::ARRAY_TYPE.name();
    let count = read_u32(reader, what)?;
    let len = packed_len(reader, count, T::SIZE, what)?;
    Ok(Packed::from_le_bytes(reader.split_to(len)))
}

fn write_string_array<S: AsRef<str>>(writer: &mut BytesMut, items: &[S]) -> Result<()> {
    write_header(writer, VariantType::StringArray, 0);
    write_len(writer, items.len(), "PackedStringArray")?;
    for item in items {
        write_string(writer, item.as_ref())?;
    }
    Ok(())
}

/// Capacity to reserve for `count` untrusted elements of at least 4 bytes.
#[inline]
fn bounded_capacity(reader: &impl Buf, count: u32) -> usize {
    (count as usize).min(reader.remaining() / 4)
}

#[inline]
fn enter(depth: usize, max_depth: usize) -> Result<usize> {
    if depth >= max_depth {
        log::debug!("rejecting variant nested deeper than {max_depth} containers");
        return Err(EncoderError::DepthLimit(max_depth));
    }
    Ok(depth + 1)
}

// --- Decode ---

/// Decodes one complete value from the front of `reader`, advancing it past
/// the value. `depth` counts the containers already entered.
///
/// Packed and raw arrays in the result share memory with `reader`.
///
/// Only this dispatcher and the container helpers recurse; leaf values are
/// decoded in a separate frame so each nesting level stays small.
pub(crate) fn decode_variant(
    reader: &mut Bytes,
    depth: usize,
    max_depth: usize,
) -> Result<Variant> {
    let (ty, flags) = read_header(reader)?;
    match ty {
        VariantType::Object if flags & ENCODE_FLAG_64 == 0 => {
            decode_object(reader, depth, max_depth)
        }
        VariantType::Dictionary => decode_dictionary(reader, depth, max_depth),
        VariantType::Array => decode_array(reader, depth, max_depth),
        _ => decode_leaf(reader, ty, flags),
    }
}

/// Class name, then (name, value) property pairs that are read and dropped.
#[inline(never)]
fn decode_object(reader: &mut Bytes, depth: usize, max_depth: usize) -> Result<Variant> {
    let class_name = read_padded(reader, "object class")?;
    if !class_name.is_empty() {
        let inner = enter(depth, max_depth)?;
        let count = read_u32(reader, "object properties")?;
        for _ in 0..count {
            read_padded(reader, "property name")?;
            decode_variant(reader, inner, max_depth)?;
        }
    }
    // Live objects only exist inside the engine.
    Ok(Variant::Object(None))
}

#[inline(never)]
fn decode_dictionary(reader: &mut Bytes, depth: usize, max_depth: usize) -> Result<Variant> {
    let inner = enter(depth, max_depth)?;
    let count = read_u32(reader, "Dictionary")? & CONTAINER_COUNT_MASK;
    let mut dict = Dictionary::with_capacity(bounded_capacity(reader, count));
    for _ in 0..count {
        let key = decode_variant(reader, inner, max_depth)?;
        let value = decode_variant(reader, inner, max_depth)?;
        dict.append_entry(key, value);
    }
    Ok(Variant::Dictionary(dict))
}

#[inline(never)]
fn decode_array(reader: &mut Bytes, depth: usize, max_depth: usize) -> Result<Variant> {
    let inner = enter(depth, max_depth)?;
    let count = read_u32(reader, "Array")? & CONTAINER_COUNT_MASK;
    let mut array = Array::with_capacity(bounded_capacity(reader, count));
    for _ in 0..count {
        array.push(decode_variant(reader, inner, max_depth)?);
    }
    Ok(Variant::Array(array))
}

/// Decodes every value that holds no nested variants.
#[inline(never)]
fn decode_leaf(reader: &mut Bytes, ty: VariantType, flags: u32) -> Result<Variant> {
    let wide = flags & ENCODE_FLAG_64 != 0;
    let value = match ty {
        VariantType::Nil => Variant::Nil,
        VariantType::Bool => Variant::Bool(read_u32(reader, "bool")? != 0),
        VariantType::Integer => {
            if wide {
                Variant::Int(read_u64(reader, "int")? as i64)
            } else {
                Variant::Int32(read_u32(reader, "int")? as i32)
            }
        }
        VariantType::Float => {
            if wide {
                Variant::Float(f64::from_bits(read_u64(reader, "float")?))
            } else {
                Variant::Float32(f32::from_bits(read_u32(reader, "float")?))
            }
        }
        VariantType::String => Variant::String(read_string(reader)?),
        VariantType::Vector2 => Variant::Vector2(read_record(reader, "Vector2")?),
        VariantType::Rect2 => Variant::Rect2(read_record(reader, "Rect2")?),
        VariantType::Vector3 => Variant::Vector3(read_record(reader, "Vector3")?),
        VariantType::Transform2D => {
            Variant::Transform2D(Box::new(read_record(reader, "Transform2D")?))
        }
        VariantType::Plane => Variant::Plane(read_record(reader, "Plane")?),
        VariantType::Quaternion => Variant::Quaternion(read_record(reader, "Quaternion")?),
        VariantType::Aabb => Variant::Aabb(Box::new(read_record(reader, "AABB")?)),
        VariantType::Basis => Variant::Basis(Box::new(read_record(reader, "Basis")?)),
        VariantType::Transform3D => {
            Variant::Transform3D(Box::new(read_record(reader, "Transform3D")?))
        }
        VariantType::Color => Variant::Color(read_record(reader, "Color")?),
        VariantType::Vector4 => Variant::Vector4(read_record(reader, "Vector4")?),
        VariantType::NodePath => Variant::NodePath(read_node_path(reader)?),
        VariantType::Rid => Variant::Rid(Rid::new(read_u64(reader, "RID")?)),
        VariantType::Object => Variant::Object(ObjectId::new(read_u64(reader, "object id")?)),
        VariantType::RawArray => Variant::RawArray(read_padded(reader, "PackedByteArray")?),
        VariantType::Int32Array => Variant::Int32Array(read_packed(reader)?),
        VariantType::Int64Array => Variant::Int64Array(read_packed(reader)?),
        VariantType::Float32Array => Variant::Float32Array(read_packed(reader)?),
        VariantType::Float64Array => Variant::Float64Array(read_packed(reader)?),
        VariantType::StringArray => {
            let count = read_u32(reader, "PackedStringArray")?;
            let mut items = Vec::with_capacity(bounded_capacity(reader, count));
            for _ in 0..count {
                items.push(read_string(reader)?);
            }
            Variant::StringArray(items)
        }
        VariantType::Vector2Array => Variant::Vector2Array(read_packed(reader)?),
        VariantType::Vector3Array => Variant::Vector3Array(read_packed(reader)?),
        VariantType::ColorArray => Variant::ColorArray(read_packed(reader)?),
        VariantType::Dictionary | VariantType::Array => {
            return Err(EncoderError::Decode(format!("{ty} is not a leaf value")));
        }
    };
    Ok(value)
}

// --- Size ---

/// Skips one complete value at the front of `reader` without building it.
///
/// Mirrors [`decode_variant`] case for case; every tag added there needs a
/// matching arm here.
pub(crate) fn skip_variant(reader: &mut &[u8], depth: usize, max_depth: usize) -> Result<()> {
    let (ty, flags) = read_header(reader)?;
    let wide = flags & ENCODE_FLAG_64 != 0;
    match ty {
        VariantType::Nil => {}
        VariantType::Bool => skip_fixed(reader, 4, "bool")?,
        VariantType::Integer => skip_fixed(reader, if wide { 8 } else { 4 }, "int")?,
        VariantType::Float => skip_fixed(reader, if wide { 8 } else { 4 }, "float")?,
        VariantType::String => skip_padded(reader, "string")?,
        VariantType::Vector2 => skip_record::<Vector2>(reader, "Vector2")?,
        VariantType::Rect2 => skip_record::<Rect2>(reader, "Rect2")?,
        VariantType::Vector3 => skip_record::<Vector3>(reader, "Vector3")?,
        VariantType::Transform2D => skip_record::<Transform2D>(reader, "Transform2D")?,
        VariantType::Plane => skip_record::<Plane>(reader, "Plane")?,
        VariantType::Quaternion => skip_record::<Quaternion>(reader, "Quaternion")?,
        VariantType::Aabb => skip_record::<Aabb>(reader, "AABB")?,
        VariantType::Basis => skip_record::<Basis>(reader, "Basis")?,
        VariantType::Transform3D => skip_record::<Transform3D>(reader, "Transform3D")?,
        VariantType::Color => skip_record::<Color>(reader, "Color")?,
        VariantType::Vector4 => skip_record::<Vector4>(reader, "Vector4")?,
        VariantType::NodePath => skip_node_path(reader)?,
        VariantType::Rid => skip_fixed(reader, 8, "RID")?,
        VariantType::Object => {
            if wide {
                skip_fixed(reader, 8, "object id")?;
            } else {
                let len = read_u32(reader, "object class")?;
                let total = padded_len(reader, len, "object class")?;
                reader.advance(total);
                if len > 0 {
                    let inner = enter(depth, max_depth)?;
                    let count = read_u32(reader, "object properties")?;
                    for _ in 0..count {
                        skip_padded(reader, "property name")?;
                        skip_variant(reader, inner, max_depth)?;
                    }
                }
            }
        }
        VariantType::Dictionary => {
            let inner = enter(depth, max_depth)?;
            let count = read_u32(reader, "Dictionary")? & CONTAINER_COUNT_MASK;
            for _ in 0..count {
                skip_variant(reader, inner, max_depth)?; // key
                skip_variant(reader, inner, max_depth)?; // value
            }
        }
        VariantType::Array => {
            let inner = enter(depth, max_depth)?;
            let count = read_u32(reader, "Array")? & CONTAINER_COUNT_MASK;
            for _ in 0..count {
                skip_variant(reader, inner, max_depth)?;
            }
        }
        VariantType::RawArray => skip_padded(reader, "PackedByteArray")?,
        VariantType::Int32Array => skip_packed::<i32>(reader)?,
        VariantType::Int64Array => skip_packed::<i64>(reader)?,
        VariantType::Float32Array => skip_packed::<f32>(reader)?,
        VariantType::Float64Array => skip_packed::<f64>(reader)?,
        VariantType::StringArray => {
            let count = read_u32(reader, "PackedStringArray")?;
            for _ in 0..count {
                skip_padded(reader, "string")?;
            }
        }
        VariantType::Vector2Array => skip_packed::<Vector2>(reader)?,
        VariantType::Vector3Array => skip_packed::<Vector3>(reader)?,
        VariantType::ColorArray => skip_packed::<Color>(reader)?,
    }
    Ok(())
}

#[inline]
fn skip_fixed(reader: &mut &[u8], len: usize, what: &'static str) -> Result<()> {
    ensure(reader, len, what)?;
    reader.advance(len);
    Ok(())
}

#[inline]
fn skip_record<T: FloatRecord>(reader: &mut &[u8], what: &'static str) -> Result<()> {
    skip_fixed(reader, T::SIZE, what)
}

fn skip_packed<T: PackedElement>(reader: &mut &[u8]) -> Result<()> {
    let what = T::ARRAY_TYPE.name();
    let count = read_u32(reader, what)?;
    let len = packed_len(reader, count, T::SIZE, what)?;
    reader.advance(len);
    Ok(())
}

// --- Encode: scalars ---

impl Marshal for bool {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        write_header(writer, VariantType::Bool, 0);
        writer.put_u32_le(*self as u32);
        Ok(())
    }
}

/// Integers narrower than 64 bits are written as 32-bit fields.
macro_rules! impl_marshal_int32 {
    ($($ty:ty),+) => {$(
        impl Marshal for $ty {
            fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
                write_header(writer, VariantType::Integer, 0);
                writer.put_i32_le(*self as i32);
                Ok(())
            }
        }
    )+};
}

impl_marshal_int32!(i8, i16, i32, u8, u16, u32);

impl Marshal for i64 {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        write_header(writer, VariantType::Integer, ENCODE_FLAG_64);
        writer.put_i64_le(*self);
        Ok(())
    }
}

impl Marshal for u64 {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        write_header(writer, VariantType::Integer, ENCODE_FLAG_64);
        writer.put_u64_le(*self);
        Ok(())
    }
}

/// Encodes `isize` at the platform's pointer width.
impl Marshal for isize {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        if usize::BITS == u64::BITS {
            (*self as i64).marshal_into(writer)
        } else {
            (*self as i32).marshal_into(writer)
        }
    }
}

impl Marshal for usize {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        if usize::BITS == u64::BITS {
            (*self as u64).marshal_into(writer)
        } else {
            (*self as u32).marshal_into(writer)
        }
    }
}

impl Marshal for f32 {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        write_header(writer, VariantType::Float, 0);
        writer.put_f32_le(*self);
        Ok(())
    }
}

impl Marshal for f64 {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        write_header(writer, VariantType::Float, ENCODE_FLAG_64);
        writer.put_f64_le(*self);
        Ok(())
    }
}

// --- Encode: strings, bytes, records ---

impl Marshal for str {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        write_header(writer, VariantType::String, 0);
        write_string(writer, self)
    }
}

impl Marshal for String {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        self.as_str().marshal_into(writer)
    }
}

impl Marshal for [u8] {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        write_header(writer, VariantType::RawArray, 0);
        write_padded(writer, self, "PackedByteArray")
    }
}

impl Marshal for Vec<u8> {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        self.as_slice().marshal_into(writer)
    }
}

impl Marshal for Bytes {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        self.as_ref().marshal_into(writer)
    }
}

macro_rules! impl_marshal_record {
    ($($ty:ident),+) => {$(
        impl Marshal for $ty {
            fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
                write_header(writer, VariantType::$ty, 0);
                self.write(writer);
                Ok(())
            }
        }
    )+};
}

impl_marshal_record!(
    Vector2, Rect2, Vector3, Transform2D, Plane, Quaternion, Aabb, Basis, Transform3D, Color,
    Vector4
);

impl Marshal for NodePath {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        write_header(writer, VariantType::NodePath, 0);
        write_node_path(writer, self.as_str())
    }
}

impl Marshal for Rid {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        write_header(writer, VariantType::Rid, 0);
        writer.put_u64_le(self.id());
        Ok(())
    }
}

/// A present id is written with the id flag; `None` as an empty class name.
impl Marshal for Option<ObjectId> {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        match self {
            Some(id) => {
                write_header(writer, VariantType::Object, ENCODE_FLAG_64);
                writer.put_u64_le(id.get());
            }
            None => {
                write_header(writer, VariantType::Object, 0);
                writer.put_u32_le(0);
            }
        }
        Ok(())
    }
}

// --- Encode: containers ---

impl<T: PackedElement> Marshal for Packed<T> {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        write_header(writer, T::ARRAY_TYPE, 0);
        write_len(writer, self.len(), T::ARRAY_TYPE.name())?;
        writer.put_slice(self.as_le_bytes());
        Ok(())
    }
}

impl<T: PackedElement> Marshal for [T] {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        write_packed(writer, self)
    }
}

impl<T: PackedElement> Marshal for Vec<T> {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        write_packed(writer, self)
    }
}

impl Marshal for [String] {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        write_string_array(writer, self)
    }
}

impl Marshal for Vec<String> {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        write_string_array(writer, self)
    }
}

impl Marshal for [&str] {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        write_string_array(writer, self)
    }
}

impl Marshal for Array {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        write_header(writer, VariantType::Array, 0);
        write_len(writer, self.len(), "Array")?;
        for item in self.iter() {
            item.marshal_into(writer)?;
        }
        Ok(())
    }
}

impl Marshal for Dictionary {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        write_header(writer, VariantType::Dictionary, 0);
        write_len(writer, self.len(), "Dictionary")?;
        for (key, value) in self.iter() {
            key.marshal_into(writer)?;
            value.marshal_into(writer)?;
        }
        Ok(())
    }
}

/// `None` encodes as Nil.
impl<T: Marshal> Marshal for Option<T> {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        match self {
            Some(value) => value.marshal_into(writer),
            None => {
                write_header(writer, VariantType::Nil, 0);
                Ok(())
            }
        }
    }
}

impl<T: Marshal + ?Sized> Marshal for &T {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        (**self).marshal_into(writer)
    }
}

impl<T: Marshal + ?Sized> Marshal for Box<T> {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        (**self).marshal_into(writer)
    }
}

// --- Encode: Variant ---

/// Encodes every variant with its own tag; width is preserved for Integer and
/// Float so that a decoded buffer re-encodes to the same bytes.
impl Marshal for Variant {
    fn marshal_into(&self, writer: &mut BytesMut) -> Result<()> {
        match self {
            Variant::Nil => {
                write_header(writer, VariantType::Nil, 0);
                Ok(())
            }
            Variant::Bool(v) => v.marshal_into(writer),
            Variant::Int32(v) => v.marshal_into(writer),
            Variant::Int(v) => v.marshal_into(writer),
            Variant::Float32(v) => v.marshal_into(writer),
            Variant::Float(v) => v.marshal_into(writer),
            Variant::String(v) => v.marshal_into(writer),
            Variant::Vector2(v) => v.marshal_into(writer),
            Variant::Rect2(v) => v.marshal_into(writer),
            Variant::Vector3(v) => v.marshal_into(writer),
            Variant::Transform2D(v) => v.marshal_into(writer),
            Variant::Plane(v) => v.marshal_into(writer),
            Variant::Quaternion(v) => v.marshal_into(writer),
            Variant::Aabb(v) => v.marshal_into(writer),
            Variant::Basis(v) => v.marshal_into(writer),
            Variant::Transform3D(v) => v.marshal_into(writer),
            Variant::Color(v) => v.marshal_into(writer),
            Variant::Vector4(v) => v.marshal_into(writer),
            Variant::NodePath(v) => v.marshal_into(writer),
            Variant::Rid(v) => v.marshal_into(writer),
            Variant::Object(v) => v.marshal_into(writer),
            Variant::Dictionary(v) => v.marshal_into(writer),
            Variant::Array(v) => v.marshal_into(writer),
            Variant::RawArray(v) => v.marshal_into(writer),
            Variant::Int32Array(v) => v.marshal_into(writer),
            Variant::Int64Array(v) => v.marshal_into(writer),
            Variant::Float32Array(v) => v.marshal_into(writer),
            Variant::Float64Array(v) => v.marshal_into(writer),
            Variant::StringArray(v) => v.marshal_into(writer),
            Variant::Vector2Array(v) => v.marshal_into(writer),
            Variant::Vector3Array(v) => v.marshal_into(writer),
            Variant::ColorArray(v) => v.marshal_into(writer),
            Variant::Proxied(proxied) => match proxied.materialize() {
                Variant::Proxied(_) => Err(EncoderError::Proxy(format!(
                    "{:?} did not materialize to a local value",
                    proxied
                ))),
                local => local.marshal_into(writer),
            },
        }
    }
}
