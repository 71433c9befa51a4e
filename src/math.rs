//! Geometric value types carried by the variant format.
//!
//! Every type here is a plain record of `f32` fields. The wire payload of each
//! one is exactly those fields, little-endian, in declaration order; the
//! [`FloatRecord`] trait is the single place that order is written down.

use bytes::{Buf, BufMut, BytesMut};
use std::fmt;

/// A fixed-size record of `f32` fields with a flat wire layout.
///
/// `read` assumes the caller already verified that `LEN * 4` bytes remain.
pub trait FloatRecord: Copy {
    /// Number of `f32` fields in the record.
    const LEN: usize;
    /// Encoded payload size in bytes.
    const SIZE: usize = Self::LEN * 4;

    fn write(&self, writer: &mut BytesMut);
    fn read(reader: &mut impl Buf) -> Self;
}

macro_rules! impl_float_record {
    ($ty:ident { $($field:ident),+ }, $len:expr) => {
        impl FloatRecord for $ty {
            const LEN: usize = $len;

            #[inline]
            fn write(&self, writer: &mut BytesMut) {
                $( self.$field.write(writer); )+
            }

            #[inline]
            fn read(reader: &mut impl Buf) -> Self {
                Self { $( $field: FloatRecord::read(reader), )+ }
            }
        }
    };
}

impl FloatRecord for f32 {
    const LEN: usize = 1;

    #[inline]
    fn write(&self, writer: &mut BytesMut) {
        writer.put_f32_le(*self);
    }

    #[inline]
    fn read(reader: &mut impl Buf) -> Self {
        reader.get_f32_le()
    }
}

// --- Vectors ---

/// 2D vector.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
#[repr(C)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

/// 3D vector.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
#[repr(C)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// 4D vector.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
#[repr(C)]
pub struct Vector4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl_float_record!(Vector2 { x, y }, 2);
impl_float_record!(Vector3 { x, y, z }, 3);
impl_float_record!(Vector4 { x, y, z, w }, 4);

impl Vector2 {
    pub const ZERO: Self = Self::new(0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0);

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }
}

impl Vector3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);
    pub const UP: Self = Self::new(0.0, 1.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }
}

impl Vector4 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

// --- Rect2 / AABB / Plane ---

/// 2D axis-aligned rectangle, stored as position and size.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
#[repr(C)]
pub struct Rect2 {
    pub position: Vector2,
    pub size: Vector2,
}

impl_float_record!(Rect2 { position, size }, 4);

impl Rect2 {
    pub const fn new(position: Vector2, size: Vector2) -> Self {
        Self { position, size }
    }

    pub fn end(self) -> Vector2 {
        Vector2::new(self.position.x + self.size.x, self.position.y + self.size.y)
    }

    /// Whether `point` lies inside the rectangle. The far edges are exclusive.
    pub fn contains_point(self, point: Vector2) -> bool {
        let end = self.end();
        point.x >= self.position.x
            && point.y >= self.position.y
            && point.x < end.x
            && point.y < end.y
    }
}

/// 3D axis-aligned bounding box, stored as position and size.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
#[repr(C)]
pub struct Aabb {
    pub position: Vector3,
    pub size: Vector3,
}

impl_float_record!(Aabb { position, size }, 6);

impl Aabb {
    pub const fn new(position: Vector3, size: Vector3) -> Self {
        Self { position, size }
    }

    pub fn volume(self) -> f32 {
        self.size.x * self.size.y * self.size.z
    }
}

/// Plane in Hessian normal form: all points `p` with `normal.dot(p) == d`.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
#[repr(C)]
pub struct Plane {
    pub normal: Vector3,
    pub d: f32,
}

impl_float_record!(Plane { normal, d }, 4);

impl Plane {
    pub const fn new(normal: Vector3, d: f32) -> Self {
        Self { normal, d }
    }

    pub fn distance_to(self, point: Vector3) -> f32 {
        self.normal.dot(point) - self.d
    }
}

// --- Rotations and transforms ---

/// Unit quaternion, `(x, y, z, w)` order on the wire.
#[derive(Copy, Clone, PartialEq, Debug)]
#[repr(C)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl_float_record!(Quaternion { x, y, z, w }, 4);

impl Quaternion {
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// 3x3 matrix, stored as three rows.
#[derive(Copy, Clone, PartialEq, Debug)]
#[repr(C)]
pub struct Basis {
    pub rows: [Vector3; 3],
}

impl FloatRecord for Basis {
    const LEN: usize = 9;

    fn write(&self, writer: &mut BytesMut) {
        for row in &self.rows {
            row.write(writer);
        }
    }

    fn read(reader: &mut impl Buf) -> Self {
        let x = Vector3::read(reader);
        let y = Vector3::read(reader);
        let z = Vector3::read(reader);
        Self { rows: [x, y, z] }
    }
}

impl Basis {
    pub const IDENTITY: Self = Self::from_rows(
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(0.0, 0.0, 1.0),
    );

    pub const fn from_rows(x: Vector3, y: Vector3, z: Vector3) -> Self {
        Self { rows: [x, y, z] }
    }

    pub fn determinant(&self) -> f32 {
        let [a, b, c] = self.rows;
        a.dot(b.cross(c))
    }
}

impl Default for Basis {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// 2D affine transform: two basis columns `a`, `b` and an `origin`.
#[derive(Copy, Clone, PartialEq, Debug)]
#[repr(C)]
pub struct Transform2D {
    pub a: Vector2,
    pub b: Vector2,
    pub origin: Vector2,
}

impl_float_record!(Transform2D { a, b, origin }, 6);

impl Transform2D {
    pub const IDENTITY: Self = Self::new(
        Vector2::new(1.0, 0.0),
        Vector2::new(0.0, 1.0),
        Vector2::ZERO,
    );

    pub const fn new(a: Vector2, b: Vector2, origin: Vector2) -> Self {
        Self { a, b, origin }
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// 3D affine transform.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
#[repr(C)]
pub struct Transform3D {
    pub basis: Basis,
    pub origin: Vector3,
}

impl_float_record!(Transform3D { basis, origin }, 12);

impl Transform3D {
    pub const IDENTITY: Self = Self::new(Basis::IDENTITY, Vector3::ZERO);

    pub const fn new(basis: Basis, origin: Vector3) -> Self {
        Self { basis, origin }
    }
}

// --- Color ---

/// Linear RGBA color with `f32` channels.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
#[repr(C)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl_float_record!(Color { r, g, b, a }, 4);

impl Color {
    pub const BLACK: Self = Self::from_rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::from_rgba(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self::from_rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn from_rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        Self::from_rgba(r, g, b, 1.0)
    }
}

// --- Display ---

impl fmt::Display for Vector2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl fmt::Display for Vector4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x, self.y, self.z, self.w)
    }
}

impl fmt::Display for Rect2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[P: {}, S: {}]", self.position, self.size)
    }
}

impl fmt::Display for Aabb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[P: {}, S: {}]", self.position, self.size)
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[N: {}, D: {}]", self.normal, self.d)
    }
}

impl fmt::Display for Quaternion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x, self.y, self.z, self.w)
    }
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.rows;
        write!(f, "[X: {x}, Y: {y}, Z: {z}]")
    }
}

impl fmt::Display for Transform2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[X: {}, Y: {}, O: {}]", self.a, self.b, self.origin)
    }
}

impl fmt::Display for Transform3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} - O: {}]", self.basis, self.origin)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sizes() {
        assert_eq!(Vector2::SIZE, 8);
        assert_eq!(Vector3::SIZE, 12);
        assert_eq!(Rect2::SIZE, 16);
        assert_eq!(Plane::SIZE, 16);
        assert_eq!(Aabb::SIZE, 24);
        assert_eq!(Basis::SIZE, 36);
        assert_eq!(Transform2D::SIZE, 24);
        assert_eq!(Transform3D::SIZE, 48);
        assert_eq!(Color::SIZE, 16);
    }

    #[test]
    fn plane_field_order() {
        let mut buf = BytesMut::new();
        Plane::new(Vector3::new(1.0, 2.0, 3.0), 4.0).write(&mut buf);
        let floats: Vec<f32> = buf
            .chunks(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(floats, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn basis_determinant() {
        assert_eq!(Basis::IDENTITY.determinant(), 1.0);
    }
}
