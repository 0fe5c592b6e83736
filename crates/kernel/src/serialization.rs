//! Serialization boundary for components.
//!
//! Components write named fields into a [`ComponentWriter`] and read them
//! back from a [`ComponentReader`]. The kernel never chooses a storage format;
//! [`FieldMap`] is an in-memory implementation of both sides that tooling can
//! encode however it likes.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use worldspace_common::Transform;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SerializationError {
    #[error("missing field '{0}'")]
    MissingField(String),
    #[error("field '{field}' is not a {expected}")]
    TypeMismatch { field: String, expected: &'static str },
    #[error("{component} cannot read format version {found} (current is {current})")]
    UnsupportedVersion {
        component: &'static str,
        found: u32,
        current: u32,
    },
    #[error("{0}")]
    Custom(String),
}

/// A single serialized value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    Vec3([f32; 3]),
    Quat([f32; 4]),
    Bytes(Vec<u8>),
    List(Vec<FieldValue>),
}

/// Conversion out of a [`FieldValue`], used by [`ComponentReader`] helpers.
pub trait FromField: Sized {
    const EXPECTED: &'static str;
    fn from_field(value: &FieldValue) -> Option<Self>;
}

macro_rules! field_conversions {
    ($($ty:ty => $variant:ident, $expected:literal, |$v:ident| $to:expr, |$f:ident| $from:expr;)*) => {
        $(
            impl From<$ty> for FieldValue {
                fn from($v: $ty) -> Self {
                    FieldValue::$variant($to)
                }
            }

            impl FromField for $ty {
                const EXPECTED: &'static str = $expected;
                fn from_field(value: &FieldValue) -> Option<Self> {
                    match value {
                        FieldValue::$variant($f) => Some($from),
                        _ => None,
                    }
                }
            }
        )*
    };
}

field_conversions! {
    bool => Bool, "bool", |v| v, |f| *f;
    i64 => I64, "i64", |v| v, |f| *f;
    i32 => I64, "i64", |v| v as i64, |f| *f as i32;
    u64 => U64, "u64", |v| v, |f| *f;
    u32 => U64, "u64", |v| v as u64, |f| *f as u32;
    f64 => F64, "f64", |v| v, |f| *f;
    f32 => F64, "f64", |v| v as f64, |f| *f as f32;
    String => Str, "string", |v| v, |f| f.clone();
    Vec3 => Vec3, "vec3", |v| v.to_array(), |f| Vec3::from_array(*f);
    Quat => Quat, "quat", |v| v.to_array(), |f| Quat::from_array(*f);
    Vec<u8> => Bytes, "bytes", |v| v, |f| f.clone();
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

/// Sink for a component's serialized fields.
pub trait ComponentWriter {
    fn write_field(&mut self, name: &str, value: FieldValue);
}

/// Source of a component's serialized fields.
pub trait ComponentReader {
    fn read_field(&self, name: &str) -> Option<&FieldValue>;
}

impl dyn ComponentWriter + '_ {
    pub fn write(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.write_field(name, value.into());
    }

    pub fn write_transform(&mut self, name: &str, transform: &Transform) {
        self.write_field(
            name,
            FieldValue::List(vec![
                transform.position.into(),
                transform.rotation.into(),
                transform.scale.into(),
            ]),
        );
    }
}

impl dyn ComponentReader + '_ {
    /// Read a required field.
    pub fn read<T: FromField>(&self, name: &str) -> Result<T, SerializationError> {
        let value = self
            .read_field(name)
            .ok_or_else(|| SerializationError::MissingField(name.to_string()))?;
        T::from_field(value).ok_or_else(|| SerializationError::TypeMismatch {
            field: name.to_string(),
            expected: T::EXPECTED,
        })
    }

    /// Read an optional field, falling back to `default` when it is absent.
    /// A present field of the wrong type is still an error.
    pub fn read_or<T: FromField>(&self, name: &str, default: T) -> Result<T, SerializationError> {
        match self.read_field(name) {
            None => Ok(default),
            Some(_) => self.read(name),
        }
    }

    pub fn read_transform(&self, name: &str) -> Result<Transform, SerializationError> {
        let mismatch = || SerializationError::TypeMismatch {
            field: name.to_string(),
            expected: "transform",
        };
        let value = self
            .read_field(name)
            .ok_or_else(|| SerializationError::MissingField(name.to_string()))?;
        let FieldValue::List(parts) = value else {
            return Err(mismatch());
        };
        match parts.as_slice() {
            [position, rotation, scale] => Ok(Transform {
                position: Vec3::from_field(position).ok_or_else(mismatch)?,
                rotation: Quat::from_field(rotation).ok_or_else(mismatch)?,
                scale: Vec3::from_field(scale).ok_or_else(mismatch)?,
            }),
            _ => Err(mismatch()),
        }
    }
}

/// Ordered name → value map implementing both sides of the boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMap {
    fields: BTreeMap<String, FieldValue>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl ComponentWriter for FieldMap {
    fn write_field(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }
}

impl ComponentReader for FieldMap {
    fn read_field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_fields_read_back() {
        let mut map = FieldMap::new();
        {
            let writer: &mut dyn ComponentWriter = &mut map;
            writer.write("speed", 2.5f32);
            writer.write("name", "crate");
            writer.write("offset", Vec3::new(1.0, 2.0, 3.0));
        }
        let reader: &dyn ComponentReader = &map;
        assert_eq!(reader.read::<f32>("speed").unwrap(), 2.5);
        assert_eq!(reader.read::<String>("name").unwrap(), "crate");
        assert_eq!(
            reader.read::<Vec3>("offset").unwrap(),
            Vec3::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn missing_and_mismatched_fields_are_errors() {
        let mut map = FieldMap::new();
        map.write_field("flag", FieldValue::Bool(true));
        let reader: &dyn ComponentReader = &map;
        assert_eq!(
            reader.read::<u32>("count"),
            Err(SerializationError::MissingField("count".into()))
        );
        assert!(matches!(
            reader.read::<f32>("flag"),
            Err(SerializationError::TypeMismatch { expected: "f64", .. })
        ));
        assert_eq!(reader.read_or::<u32>("count", 4).unwrap(), 4);
    }

    #[test]
    fn transform_field_round_trips() {
        let t = Transform {
            position: Vec3::new(1.0, 0.0, -1.0),
            rotation: Quat::from_rotation_x(0.3),
            scale: Vec3::splat(0.5),
        };
        let mut map = FieldMap::new();
        (&mut map as &mut dyn ComponentWriter).write_transform("local", &t);
        let back = (&map as &dyn ComponentReader).read_transform("local").unwrap();
        assert_eq!(back, t);
    }
}
