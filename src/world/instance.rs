use crate::{
    messages::value::Value,
    types::{ConstructorId, FieldId, SetId},
};

/// A local representation of a replicated entity. The engine owns the box;
/// the application reaches its instance through the registry by entity id.
///
/// The sync hooks are opt-in: the default implementations do nothing. When an
/// update set is read or written, the matching pair of hooks fires exactly
/// once per batch, not once per individual connection.
pub trait Instance {
    /// Read the current value of a replicated field.
    fn read_field(&self, field: FieldId) -> Value;

    /// Write a received value into a replicated field.
    fn write_field(&mut self, field: FieldId, value: Value);

    /// The constructor id and parameters replicated in `EntityInit` /
    /// `EntityChange` so peers can build their own representation.
    fn construction(&self) -> (ConstructorId, Vec<Value>);

    fn before_sync_read(&mut self, _set: SetId) {}

    fn after_sync_read(&mut self, _set: SetId) {}

    fn before_sync_write(&mut self, _set: SetId) {}

    fn after_sync_write(&mut self, _set: SetId) {}
}
