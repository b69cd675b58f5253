// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Schema contract: how a record type maps to tagged fields.

use std::fmt;

use crate::descriptor::FieldSet;
use crate::error::Result;
use crate::object::Object;
use crate::pipe::PipeSession;
use crate::wire::{Input, Output};

/// A record type with a tagged binary encoding.
///
/// `describe` is consulted once, when the type's [`RuntimeSchema`] is built;
/// `Default` supplies the empty instance merges start from.
///
/// [`RuntimeSchema`]: crate::RuntimeSchema
pub trait Message: Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Short name of the record type.
    const NAME: &'static str;

    /// Fully qualified name; written as the discriminator of polymorphic values.
    const FULL_NAME: &'static str = Self::NAME;

    /// Declares the record's fields.
    fn describe(fields: &mut FieldSet<Self>);
}

/// Encoding contract for values of `T`.
///
/// Field lookups are bidirectional: `field_name(field_number(s)?)? == s` for
/// every declared field.
pub trait Schema<T>: Send + Sync {
    /// Name of the field with the given tag.
    fn field_name(&self, number: u32) -> Result<&'static str>;

    /// Tag of the field with the given name.
    fn field_number(&self, name: &str) -> Result<u32>;

    /// Returns `true` if every required field of `message` is set.
    fn is_initialized(&self, message: &T) -> bool;

    /// A zero-initialized instance.
    fn new_message(&self) -> T;

    /// Short name of the record type.
    fn message_name(&self) -> &'static str;

    /// Fully qualified name of the record type.
    fn message_full_name(&self) -> &'static str;

    /// Reads fields until the end of the current message and applies them to `message`.
    fn merge_from(&self, input: &mut dyn Input, message: &mut T) -> Result<()>;

    /// Writes every field of `message` in ascending tag order.
    fn write_to(&self, output: &mut dyn Output, message: &T) -> Result<()>;
}

/// A schema usable without knowing its record type statically.
///
/// This is what the type registry hands out for polymorphic values and what a
/// [`Pipe`](crate::Pipe) drives during a transfer.
pub trait ErasedSchema: Send + Sync + fmt::Debug {
    /// Short name of the record type.
    fn message_name(&self) -> &'static str;

    /// Fully qualified name of the record type.
    fn message_full_name(&self) -> &'static str;

    /// Name of the field with the given tag.
    fn field_name(&self, number: u32) -> Result<&'static str>;

    /// Tag of the field with the given name.
    fn field_number(&self, name: &str) -> Result<u32>;

    /// A zero-initialized instance, boxed.
    fn new_object(&self) -> Box<dyn Object>;

    /// Merges into an erased instance of this schema's type.
    fn merge_object(&self, input: &mut dyn Input, object: &mut dyn Object) -> Result<()>;

    /// Writes an erased instance of this schema's type.
    fn write_object(&self, output: &mut dyn Output, object: &dyn Object) -> Result<()>;

    /// Required-field check on an erased instance; `false` for another type.
    fn is_object_initialized(&self, object: &dyn Object) -> bool;

    /// Copies every field of the current message from `input` to `output`
    /// without materializing it.
    fn transfer(
        &self,
        session: &mut PipeSession,
        input: &mut dyn Input,
        output: &mut dyn Output,
    ) -> Result<()>;
}
