//! Dynamic field values and per-type field descriptors.
//!
//! `FieldValue` is the value tree that flows between a live object and its
//! field blob. `FieldKind` is the static shape of a declared field, used by
//! discovery to decide what inside a structure is eligible.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

use bevy::math::{Quat, Vec3};

use crate::field_table::FieldTable;

/// One field value read from or written to a live object.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    /// Stored as f64; every f32 round-trips exactly.
    Float(f64),
    Text(String),
    Vec3([f32; 3]),
    Quat([f32; 4]),
    Struct(StructValue),
    List(Vec<FieldValue>),
    Map(Vec<(FieldValue, FieldValue)>),
}

/// Named entries of a structured value, in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructValue {
    entries: Vec<(String, FieldValue)>,
}

impl StructValue {
    pub fn from_entries(entries: Vec<(String, FieldValue)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(String, FieldValue)] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<(String, FieldValue)> {
        self.entries
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Remove and return the entry called `name`.
    pub fn take(&mut self, name: &str) -> Option<FieldValue> {
        let at = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(at).1)
    }

    /// Replace the entry called `name`, or append it.
    pub fn insert(&mut self, name: &str, value: FieldValue) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Int,
    UInt,
    Float,
    Text,
    Vec3,
    Quat,
}

/// A structure type: its fully-qualified name and its descriptor table.
///
/// The table is reached through a function pointer so self-referential
/// types can describe themselves without building the table eagerly.
#[derive(Clone, Copy)]
pub struct StructType {
    name: &'static str,
    table: fn() -> &'static [FieldDescriptor],
}

impl StructType {
    pub fn of<T: FieldTable>() -> Self {
        Self {
            name: T::TYPE_NAME,
            table: T::table,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &'static [FieldDescriptor] {
        (self.table)()
    }
}

impl PartialEq for StructType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for StructType {}

impl fmt::Debug for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StructType({})", self.name)
    }
}

/// Static shape of a declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarKind),
    Struct(StructType),
    List(Box<FieldKind>),
    Map(Box<FieldKind>, Box<FieldKind>),
}

/// One row of a type's descriptor table.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Declared eligible with `#[save]`.
    pub save: bool,
}

/// Conversion between a Rust field type and `FieldValue`.
///
/// Implemented here for scalars, strings, bevy vectors/quaternions, `Vec`
/// and maps; `#[derive(SaveFields)]` implements it for structures.
pub trait SaveValue: Sized {
    fn kind() -> FieldKind;
    fn to_value(&self) -> FieldValue;
    fn from_value(value: FieldValue) -> Option<Self>;
}

impl SaveValue for bool {
    fn kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::Bool)
    }

    fn to_value(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Bool(b) => Some(b),
            _ => None,
        }
    }
}

macro_rules! impl_signed {
    ($($t:ty),*) => {$(
        impl SaveValue for $t {
            fn kind() -> FieldKind {
                FieldKind::Scalar(ScalarKind::Int)
            }

            fn to_value(&self) -> FieldValue {
                FieldValue::Int(*self as i64)
            }

            fn from_value(value: FieldValue) -> Option<Self> {
                match value {
                    FieldValue::Int(v) => <$t>::try_from(v).ok(),
                    FieldValue::UInt(v) => <$t>::try_from(v).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {$(
        impl SaveValue for $t {
            fn kind() -> FieldKind {
                FieldKind::Scalar(ScalarKind::UInt)
            }

            fn to_value(&self) -> FieldValue {
                FieldValue::UInt(*self as u64)
            }

            fn from_value(value: FieldValue) -> Option<Self> {
                match value {
                    FieldValue::UInt(v) => <$t>::try_from(v).ok(),
                    FieldValue::Int(v) => <$t>::try_from(v).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

impl_signed!(i8, i16, i32, i64);
impl_unsigned!(u8, u16, u32, u64, usize);

impl SaveValue for f32 {
    fn kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::Float)
    }

    fn to_value(&self) -> FieldValue {
        FieldValue::Float(f64::from(*self))
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Float(v) => Some(v as f32),
            _ => None,
        }
    }
}

impl SaveValue for f64 {
    fn kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::Float)
    }

    fn to_value(&self) -> FieldValue {
        FieldValue::Float(*self)
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Float(v) => Some(v),
            _ => None,
        }
    }
}

impl SaveValue for String {
    fn kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::Text)
    }

    fn to_value(&self) -> FieldValue {
        FieldValue::Text(self.clone())
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl SaveValue for Vec3 {
    fn kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::Vec3)
    }

    fn to_value(&self) -> FieldValue {
        FieldValue::Vec3(self.to_array())
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Vec3(v) => Some(Vec3::from_array(v)),
            _ => None,
        }
    }
}

impl SaveValue for Quat {
    fn kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::Quat)
    }

    fn to_value(&self) -> FieldValue {
        FieldValue::Quat(self.to_array())
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Quat(q) => Some(Quat::from_array(q)),
            _ => None,
        }
    }
}

impl<T: SaveValue> SaveValue for Vec<T> {
    fn kind() -> FieldKind {
        FieldKind::List(Box::new(T::kind()))
    }

    fn to_value(&self) -> FieldValue {
        FieldValue::List(self.iter().map(SaveValue::to_value).collect())
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::List(items) => items.into_iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

impl<K, V> SaveValue for HashMap<K, V>
where
    K: SaveValue + Eq + Hash,
    V: SaveValue,
{
    fn kind() -> FieldKind {
        FieldKind::Map(Box::new(K::kind()), Box::new(V::kind()))
    }

    fn to_value(&self) -> FieldValue {
        FieldValue::Map(self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect())
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Map(pairs) => pairs
                .into_iter()
                .map(|(k, v)| Some((K::from_value(k)?, V::from_value(v)?)))
                .collect(),
            _ => None,
        }
    }
}

impl<K, V> SaveValue for BTreeMap<K, V>
where
    K: SaveValue + Ord,
    V: SaveValue,
{
    fn kind() -> FieldKind {
        FieldKind::Map(Box::new(K::kind()), Box::new(V::kind()))
    }

    fn to_value(&self) -> FieldValue {
        FieldValue::Map(self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect())
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Map(pairs) => pairs
                .into_iter()
                .map(|(k, v)| Some((K::from_value(k)?, V::from_value(v)?)))
                .collect(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_is_exact_through_f64() {
        for v in [0.1f32, -3.75, f32::MAX, f32::MIN_POSITIVE, 1.0e-30] {
            assert_eq!(f32::from_value(v.to_value()), Some(v));
        }
    }

    #[test]
    fn test_integer_range_checked() {
        assert_eq!(u8::from_value(FieldValue::UInt(300)), None);
        assert_eq!(i8::from_value(FieldValue::Int(-5)), Some(-5));
        assert_eq!(u32::from_value(FieldValue::Int(-1)), None);
        assert_eq!(i64::from_value(FieldValue::UInt(7)), Some(7));
    }

    #[test]
    fn test_wrong_variant_rejected() {
        assert_eq!(bool::from_value(FieldValue::Int(1)), None);
        assert_eq!(String::from_value(FieldValue::Bool(true)), None);
        assert_eq!(Vec::<u32>::from_value(FieldValue::Text("x".into())), None);
    }

    #[test]
    fn test_list_with_bad_element_rejected() {
        let value = FieldValue::List(vec![FieldValue::UInt(1), FieldValue::Text("x".into())]);
        assert_eq!(Vec::<u32>::from_value(value), None);
    }

    #[test]
    fn test_map_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert("gold".to_string(), 10u32);
        map.insert("wood".to_string(), 3u32);
        let back = BTreeMap::<String, u32>::from_value(map.to_value()).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_bevy_math_roundtrip() {
        let v = Vec3::new(1.5, -2.0, 1.0e6);
        let q = Quat::from_rotation_y(0.7);
        assert_eq!(Vec3::from_value(v.to_value()), Some(v));
        assert_eq!(Quat::from_value(q.to_value()), Some(q));
    }

    #[test]
    fn test_struct_value_insert_take() {
        let mut s = StructValue::default();
        s.insert("a", FieldValue::Bool(true));
        s.insert("b", FieldValue::Int(2));
        s.insert("a", FieldValue::Bool(false));
        assert_eq!(s.len(), 2);
        assert_eq!(s.get("a"), Some(&FieldValue::Bool(false)));
        assert_eq!(s.take("b"), Some(FieldValue::Int(2)));
        assert_eq!(s.take("b"), None);
    }

    #[test]
    fn test_kinds_nest() {
        let kind = <HashMap<String, Vec<f32>>>::kind();
        let FieldKind::Map(key, value) = kind else {
            panic!("expected map kind");
        };
        assert_eq!(*key, FieldKind::Scalar(ScalarKind::Text));
        assert_eq!(
            *value,
            FieldKind::List(Box::new(FieldKind::Scalar(ScalarKind::Float)))
        );
    }
}
