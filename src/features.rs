#[cfg(feature = "glam")]
use glam::{Affine2, Affine3A, Mat3, Quat, Vec2, Vec3, Vec4};
#[cfg(feature = "serde_json")]
use serde_json::{Map, Number, Value};

#[allow(unused_imports)]
use crate::*;

// --- glam vectors ---
#[cfg(feature = "glam")]
impl From<Vec2> for Vector2 {
    fn from(v: Vec2) -> Self {
        Vector2 { x: v.x, y: v.y }
    }
}
#[cfg(feature = "glam")]
impl From<Vector2> for Vec2 {
    fn from(v: Vector2) -> Self {
        Vec2::new(v.x, v.y)
    }
}

#[cfg(feature = "glam")]
impl From<Vec3> for Vector3 {
    fn from(v: Vec3) -> Self {
        Vector3 {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}
#[cfg(feature = "glam")]
impl From<Vector3> for Vec3 {
    fn from(v: Vector3) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

#[cfg(feature = "glam")]
impl From<Vec4> for Vector4 {
    fn from(v: Vec4) -> Self {
        Vector4 {
            x: v.x,
            y: v.y,
            z: v.z,
            w: v.w,
        }
    }
}
#[cfg(feature = "glam")]
impl From<Vector4> for Vec4 {
    fn from(v: Vector4) -> Self {
        Vec4::new(v.x, v.y, v.z, v.w)
    }
}

// --- glam rotations ---
#[cfg(feature = "glam")]
impl From<Quat> for Quaternion {
    fn from(q: Quat) -> Self {
        Quaternion {
            x: q.x,
            y: q.y,
            z: q.z,
            w: q.w,
        }
    }
}
#[cfg(feature = "glam")]
impl From<Quaternion> for Quat {
    fn from(q: Quaternion) -> Self {
        Quat::from_xyzw(q.x, q.y, q.z, q.w)
    }
}

/// `Basis` stores rows; `Mat3` stores columns.
#[cfg(feature = "glam")]
impl From<Mat3> for Basis {
    fn from(m: Mat3) -> Self {
        let rows = m.transpose();
        Basis::from_rows(rows.x_axis.into(), rows.y_axis.into(), rows.z_axis.into())
    }
}
#[cfg(feature = "glam")]
impl From<Basis> for Mat3 {
    fn from(b: Basis) -> Self {
        let [x, y, z] = b.rows;
        Mat3::from_cols(x.into(), y.into(), z.into()).transpose()
    }
}

// --- glam affine transforms ---
#[cfg(feature = "glam")]
impl From<Affine2> for Transform2D {
    fn from(t: Affine2) -> Self {
        Transform2D::new(
            t.matrix2.x_axis.into(),
            t.matrix2.y_axis.into(),
            t.translation.into(),
        )
    }
}
#[cfg(feature = "glam")]
impl From<Transform2D> for Affine2 {
    fn from(t: Transform2D) -> Self {
        Affine2::from_cols(t.a.into(), t.b.into(), t.origin.into())
    }
}

#[cfg(feature = "glam")]
impl From<Affine3A> for Transform3D {
    fn from(t: Affine3A) -> Self {
        Transform3D::new(Mat3::from(t.matrix3).into(), Vec3::from(t.translation).into())
    }
}
#[cfg(feature = "glam")]
impl From<Transform3D> for Affine3A {
    fn from(t: Transform3D) -> Self {
        Affine3A::from_mat3_translation(t.basis.into(), t.origin.into())
    }
}

#[cfg(feature = "glam")]
macro_rules! impl_glam_variant {
    ($($glam:ty => $local:ty),+) => {$(
        impl From<$glam> for Variant {
            fn from(value: $glam) -> Self {
                Variant::from(<$local>::from(value))
            }
        }
        impl FromVariant for $glam {
            fn try_from_variant(variant: &Variant) -> std::result::Result<Self, ConvertError> {
                <$local>::try_from_variant(variant).map(Into::into)
            }
        }
    )+};
}

#[cfg(feature = "glam")]
impl_glam_variant!(
    Vec2 => Vector2,
    Vec3 => Vector3,
    Vec4 => Vector4,
    Quat => Quaternion,
    Mat3 => Basis,
    Affine2 => Transform2D,
    Affine3A => Transform3D
);

// --- serde_json::Value ---
#[cfg(feature = "serde_json")]
fn json_float(v: f64) -> Value {
    // JSON has no NaN or infinity.
    Number::from_f64(v).map_or(Value::Null, Value::Number)
}

#[cfg(feature = "serde_json")]
fn json_list<T>(items: impl Iterator<Item = T>, f: impl Fn(T) -> Value) -> Value {
    Value::Array(items.map(f).collect())
}

#[cfg(feature = "serde_json")]
fn json_floats(fields: &[f32]) -> Value {
    json_list(fields.iter(), |&v| json_float(v as f64))
}

/// Vectors and colors become arrays of numbers; packed arrays become arrays;
/// dictionaries need string keys.
#[cfg(feature = "serde_json")]
impl TryFrom<&Variant> for Value {
    type Error = ConvertError;

    fn try_from(variant: &Variant) -> std::result::Result<Self, Self::Error> {
        let value = match variant {
            Variant::Nil | Variant::Object(None) => Value::Null,
            Variant::Bool(b) => Value::Bool(*b),
            Variant::Int32(v) => Value::from(*v),
            Variant::Int(v) => Value::from(*v),
            Variant::Float32(v) => json_float(*v as f64),
            Variant::Float(v) => json_float(*v),
            Variant::String(s) => Value::String(s.clone()),
            Variant::NodePath(p) => Value::String(p.as_str().to_owned()),
            Variant::Vector2(v) => json_floats(&[v.x, v.y]),
            Variant::Vector3(v) => json_floats(&[v.x, v.y, v.z]),
            Variant::Vector4(v) => json_floats(&[v.x, v.y, v.z, v.w]),
            Variant::Quaternion(q) => json_floats(&[q.x, q.y, q.z, q.w]),
            Variant::Color(c) => json_floats(&[c.r, c.g, c.b, c.a]),
            Variant::Object(Some(id)) => Value::from(id.get()),
            Variant::Rid(rid) => Value::from(rid.id()),
            Variant::Array(items) => Value::Array(
                items
                    .iter()
                    .map(Value::try_from)
                    .collect::<std::result::Result<_, _>>()?,
            ),
            Variant::Dictionary(dict) => {
                let mut map = Map::with_capacity(dict.len());
                for (key, value) in dict.iter() {
                    let Variant::String(key) = key else {
                        return Err(ConvertError::TypeMismatch {
                            expected: VariantType::String,
                            actual: key.variant_type(),
                        });
                    };
                    map.insert(key.clone(), Value::try_from(value)?);
                }
                Value::Object(map)
            }
            Variant::RawArray(b) => json_list(b.iter(), |&v| Value::from(v)),
            Variant::Int32Array(a) => json_list(a.iter(), Value::from),
            Variant::Int64Array(a) => json_list(a.iter(), Value::from),
            Variant::Float32Array(a) => json_list(a.iter(), |v| json_float(v as f64)),
            Variant::Float64Array(a) => json_list(a.iter(), json_float),
            Variant::StringArray(a) => json_list(a.iter(), |s| Value::String(s.clone())),
            Variant::Vector2Array(a) => json_list(a.iter(), |v| json_floats(&[v.x, v.y])),
            Variant::Vector3Array(a) => json_list(a.iter(), |v| json_floats(&[v.x, v.y, v.z])),
            Variant::ColorArray(a) => json_list(a.iter(), |c| json_floats(&[c.r, c.g, c.b, c.a])),
            Variant::Proxied(_) => match variant.materialize() {
                Variant::Proxied(p) => {
                    return Err(ConvertError::Proxy(format!(
                        "{p:?} did not materialize to a local value"
                    )))
                }
                local => Value::try_from(&local)?,
            },
            other => {
                return Err(ConvertError::TypeMismatch {
                    expected: VariantType::Dictionary,
                    actual: other.variant_type(),
                })
            }
        };
        Ok(value)
    }
}

/// Integers that fit in `i64` become Integer; other numbers become Float.
#[cfg(feature = "serde_json")]
impl From<Value> for Variant {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Variant::Nil,
            Value::Bool(b) => Variant::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Variant::Int(i),
                None => Variant::Float(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => Variant::String(s),
            Value::Array(items) => Variant::Array(items.into_iter().map(Variant::from).collect()),
            Value::Object(map) => Variant::Dictionary(
                map.into_iter()
                    .map(|(key, value)| (Variant::String(key), Variant::from(value)))
                    .collect(),
            ),
        }
    }
}
