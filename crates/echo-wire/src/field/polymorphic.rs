// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire layout of polymorphic values.
//!
//! A fresh object is a nested message whose first field (number 127) is the
//! discriminator of its concrete type, followed by that type's fields. In graph
//! mode the object's index (field 126) comes before the discriminator, and an
//! object already written in the same encode is a single `Reference` entry
//! carrying that index.

use tracing::trace;

use crate::error::{CodecError, Result};
use crate::graph::Visit;
use crate::object::ObjectRef;
use crate::pipe::PipeSession;
use crate::registry;
use crate::wire::{
    Input, Output, WireError, WireType, OBJECT_INDEX_FIELD_NUMBER, TYPE_FIELD_NUMBER,
};

pub(crate) fn write_object(
    output: &mut dyn Output,
    number: u32,
    object: &ObjectRef,
    repeated: bool,
) -> Result<()> {
    let identity = object.identity();
    match output.tracker().enter(identity)? {
        Visit::Reference(index) => output.write_reference(number, index, repeated),
        Visit::Fresh(index) => {
            let result = write_fresh(output, number, object, index, repeated);
            output.tracker().leave(identity);
            result
        }
    }
}

fn write_fresh(
    output: &mut dyn Output,
    number: u32,
    object: &ObjectRef,
    index: Option<u32>,
    repeated: bool,
) -> Result<()> {
    let guard = object.read();
    let schema = guard.schema()?;
    output.write_nested(number, repeated, &mut |nested| {
        if let Some(index) = index {
            nested.write_uint32(OBJECT_INDEX_FIELD_NUMBER, index, false)?;
        }
        nested.write_string(TYPE_FIELD_NUMBER, schema.message_full_name(), false)?;
        schema.write_object(nested, &**guard)
    })
}

/// Reads the header of a fresh object: its graph index, if any, and its
/// discriminator. Leaves `input` positioned at the object's first field.
pub(crate) fn read_header(input: &mut dyn Input) -> Result<(Option<u32>, String)> {
    let mut number = input.read_field_number()?;
    let mut index = None;
    if number == OBJECT_INDEX_FIELD_NUMBER {
        index = Some(input.read_uint32()?);
        number = input.read_field_number()?;
    }
    if number != TYPE_FIELD_NUMBER {
        return Err(CodecError::MissingDiscriminator);
    }
    Ok((index, input.read_string()?))
}

pub(crate) fn read_object(input: &mut dyn Input) -> Result<ObjectRef> {
    if input.last_wire_type() == Some(WireType::Reference) {
        let index = input.read_reference()?;
        let graph = input.graph().ok_or(WireError::UnexpectedReference)?;
        return graph.resolve_reference(index);
    }
    let mut slot = None;
    input.merge_nested(&mut |nested| {
        let (index, name) = read_header(nested)?;
        let schema = registry::lookup(&name)?;
        let object = ObjectRef::from_boxed(schema.new_object());
        // Registered before its fields so back-references inside resolve to it.
        if let (Some(index), Some(graph)) = (index, nested.graph()) {
            graph.register_placeholder(index, object.clone())?;
        }
        {
            let mut guard = object.write();
            schema.merge_object(nested, &mut **guard)?;
        }
        slot = Some(object);
        Ok(())
    })?;
    slot.ok_or(CodecError::MissingDiscriminator)
}

pub(crate) fn transfer_object(
    session: &mut PipeSession,
    input: &mut dyn Input,
    output: &mut dyn Output,
    number: u32,
    repeated: bool,
) -> Result<()> {
    if input.last_wire_type() == Some(WireType::Reference) {
        let index = input.read_reference()?;
        // The target may sit in a field this pass dropped.
        if !session.has_object(index) {
            return Err(CodecError::DanglingReference(index));
        }
        trace!(number, index, "copying back-reference");
        return output.write_reference(number, index, repeated);
    }
    output.write_nested(number, repeated, &mut |nested_out| {
        input.merge_nested(&mut |nested_in| session.transfer_polymorphic(nested_in, nested_out))
    })
}
