//! Object-safe field access backed by generated descriptor tables.

use std::any::Any;

use crate::field_value::{FieldDescriptor, FieldValue};

/// Per-type descriptor table, built once per type.
///
/// Implemented by `#[derive(SaveFields)]`.
pub trait FieldTable {
    /// Fully-qualified type name; also the spawn registry key.
    const TYPE_NAME: &'static str;

    fn table() -> &'static [FieldDescriptor];
}

/// Get/set-by-name over an object's declared fields.
///
/// This is the only capability the engine needs from host objects: the
/// descriptor table says what exists, `get_field`/`set_field` move values.
pub trait FieldSet: Send + Sync + 'static {
    fn type_name(&self) -> &'static str;

    fn field_table(&self) -> &'static [FieldDescriptor];

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn get_field(&self, name: &str) -> Option<FieldValue>;

    /// Returns false when the field is unknown or the value has the wrong shape.
    fn set_field(&mut self, name: &str, value: FieldValue) -> bool;
}
