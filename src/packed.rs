//! Homogeneous packed arrays backed by shared little-endian storage.
//!
//! A decoded `Packed<T>` is a view into the buffer it was decoded from: the
//! elements are never copied out. `Bytes` keeps that buffer alive and
//! immutable for as long as any view exists, so aliasing is always safe.

use crate::core::VariantType;
use crate::math::{Color, FloatRecord, Vector2, Vector3};
use crate::variant::Variant;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::marker::PhantomData;

/// Element types that have a dedicated packed array tag.
pub trait PackedElement: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Encoded size of a single element.
    const SIZE: usize;
    /// Tag of the packed array holding this element type.
    const ARRAY_TYPE: VariantType;

    fn write_element(&self, writer: &mut BytesMut);
    /// Reads one element. `chunk` is exactly `SIZE` bytes long.
    fn read_element(chunk: &[u8]) -> Self;
    /// The packed array of this element type held by `variant`, if any.
    fn view(variant: &Variant) -> Option<&Packed<Self>>;
}

macro_rules! impl_packed_scalar {
    ($ty:ty, $tag:ident, $put:ident, $get:ident) => {
        impl PackedElement for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();
            const ARRAY_TYPE: VariantType = VariantType::$tag;

            #[inline]
            fn write_element(&self, writer: &mut BytesMut) {
                writer.$put(*self);
            }

            #[inline]
            fn read_element(mut chunk: &[u8]) -> Self {
                chunk.$get()
            }

            #[inline]
            fn view(variant: &Variant) -> Option<&Packed<Self>> {
                match variant {
                    Variant::$tag(packed) => Some(packed),
                    _ => None,
                }
            }
        }
    };
}

impl_packed_scalar!(i32, Int32Array, put_i32_le, get_i32_le);
impl_packed_scalar!(i64, Int64Array, put_i64_le, get_i64_le);
impl_packed_scalar!(f32, Float32Array, put_f32_le, get_f32_le);
impl_packed_scalar!(f64, Float64Array, put_f64_le, get_f64_le);

macro_rules! impl_packed_record {
    ($ty:ty, $tag:ident) => {
        impl PackedElement for $ty {
            const SIZE: usize = <$ty as FloatRecord>::SIZE;
            const ARRAY_TYPE: VariantType = VariantType::$tag;

            #[inline]
            fn write_element(&self, writer: &mut BytesMut) {
                FloatRecord::write(self, writer);
            }

            #[inline]
            fn read_element(mut chunk: &[u8]) -> Self {
                <$ty as FloatRecord>::read(&mut chunk)
            }

            #[inline]
            fn view(variant: &Variant) -> Option<&Packed<Self>> {
                match variant {
                    Variant::$tag(packed) => Some(packed),
                    _ => None,
                }
            }
        }
    };
}

impl_packed_record!(Vector2, Vector2Array);
impl_packed_record!(Vector3, Vector3Array);
impl_packed_record!(Color, ColorArray);

/// A packed array of `T`, stored as the raw little-endian element bytes.
#[derive(Clone)]
pub struct Packed<T: PackedElement> {
    bytes: Bytes,
    _marker: PhantomData<T>,
}

pub type PackedInt32Array = Packed<i32>;
pub type PackedInt64Array = Packed<i64>;
pub type PackedFloat32Array = Packed<f32>;
pub type PackedFloat64Array = Packed<f64>;
pub type PackedVector2Array = Packed<Vector2>;
pub type PackedVector3Array = Packed<Vector3>;
pub type PackedColorArray = Packed<Color>;

impl<T: PackedElement> Packed<T> {
    pub fn new() -> Self {
        Self {
            bytes: Bytes::new(),
            _marker: PhantomData,
        }
    }

    /// Wraps element bytes that the decoder already sized as `len * T::SIZE`.
    pub(crate) fn from_le_bytes(bytes: Bytes) -> Self {
        debug_assert_eq!(bytes.len() % T::SIZE, 0);
        Self {
            bytes,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len() / T::SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        let start = index.checked_mul(T::SIZE)?;
        let chunk = self.bytes.get(start..start.checked_add(T::SIZE)?)?;
        Some(T::read_element(chunk))
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = T> + '_ {
        self.bytes.chunks_exact(T::SIZE).map(T::read_element)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// The element storage in wire order. Shares memory with `self`.
    pub fn as_le_bytes(&self) -> &Bytes {
        &self.bytes
    }
}

impl<T: PackedElement> Default for Packed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PackedElement> FromIterator<T> for Packed<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut writer = BytesMut::with_capacity(iter.size_hint().0 * T::SIZE);
        for item in iter {
            item.write_element(&mut writer);
        }
        Self::from_le_bytes(writer.freeze())
    }
}

impl<T: PackedElement> From<&[T]> for Packed<T> {
    fn from(items: &[T]) -> Self {
        items.iter().copied().collect()
    }
}

impl<T: PackedElement> From<Vec<T>> for Packed<T> {
    fn from(items: Vec<T>) -> Self {
        items.into_iter().collect()
    }
}

impl<T: PackedElement> PartialEq for Packed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: PackedElement> fmt::Debug for Packed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_and_index() {
        let packed: Packed<i64> = vec![1, -2, 3].into();
        assert_eq!(packed.len(), 3);
        assert_eq!(packed.get(1), Some(-2));
        assert_eq!(packed.get(3), None);
        assert_eq!(packed.as_le_bytes().len(), 24);
    }

    #[test]
    fn views_share_storage() {
        let packed: Packed<Vector2> = vec![Vector2::new(1.0, 2.0)].into();
        let copy = packed.clone();
        assert_eq!(packed.as_le_bytes().as_ptr(), copy.as_le_bytes().as_ptr());
    }
}
