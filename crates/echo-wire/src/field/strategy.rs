// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cardinality strategies: one per field, wrapping an element codec.

use crate::error::Result;
use crate::pipe::PipeSession;
use crate::wire::{FieldType, Input, Output};

use super::element::ElementCodec;

/// Per-field codec bound into a schema.
pub trait FieldStrategy<T>: Send + Sync {
    /// Declared wire-level type of the field's elements.
    fn field_type(&self) -> FieldType;

    /// Writes the field's current value; absent and empty values write nothing.
    fn write_to(&self, output: &mut dyn Output, number: u32, message: &T) -> Result<()>;

    /// Applies one wire occurrence of the field to `message`.
    fn merge_from(&self, input: &mut dyn Input, message: &mut T) -> Result<()>;

    /// Copies one occurrence from `input` to `output` without decoding it.
    fn transfer(
        &self,
        session: &mut PipeSession,
        input: &mut dyn Input,
        output: &mut dyn Output,
        number: u32,
        repeated: bool,
    ) -> Result<()>;

    /// Returns `true` if the field holds a value.
    fn is_set(&self, _message: &T) -> bool {
        true
    }
}

pub(crate) struct Singular<T, V> {
    get: fn(&T) -> &V,
    get_mut: fn(&mut T) -> &mut V,
    element: Box<dyn ElementCodec<V>>,
}

impl<T, V> Singular<T, V> {
    pub(crate) fn new(
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
        element: Box<dyn ElementCodec<V>>,
    ) -> Self {
        Self {
            get,
            get_mut,
            element,
        }
    }
}

impl<T, V> FieldStrategy<T> for Singular<T, V> {
    fn field_type(&self) -> FieldType {
        self.element.field_type()
    }

    fn write_to(&self, output: &mut dyn Output, number: u32, message: &T) -> Result<()> {
        self.element.write(output, number, (self.get)(message), false)
    }

    fn merge_from(&self, input: &mut dyn Input, message: &mut T) -> Result<()> {
        self.element.merge_into(input, (self.get_mut)(message))
    }

    fn transfer(
        &self,
        session: &mut PipeSession,
        input: &mut dyn Input,
        output: &mut dyn Output,
        number: u32,
        repeated: bool,
    ) -> Result<()> {
        self.element.transfer(session, input, output, number, repeated)
    }
}

pub(crate) struct Optional<T, V> {
    get: fn(&T) -> &Option<V>,
    get_mut: fn(&mut T) -> &mut Option<V>,
    element: Box<dyn ElementCodec<V>>,
}

impl<T, V> Optional<T, V> {
    pub(crate) fn new(
        get: fn(&T) -> &Option<V>,
        get_mut: fn(&mut T) -> &mut Option<V>,
        element: Box<dyn ElementCodec<V>>,
    ) -> Self {
        Self {
            get,
            get_mut,
            element,
        }
    }
}

impl<T, V> FieldStrategy<T> for Optional<T, V> {
    fn field_type(&self) -> FieldType {
        self.element.field_type()
    }

    fn write_to(&self, output: &mut dyn Output, number: u32, message: &T) -> Result<()> {
        match (self.get)(message) {
            Some(value) => self.element.write(output, number, value, false),
            None => Ok(()),
        }
    }

    fn merge_from(&self, input: &mut dyn Input, message: &mut T) -> Result<()> {
        let slot = (self.get_mut)(message);
        if let Some(value) = slot.as_mut() {
            return self.element.merge_into(input, value);
        }
        *slot = Some(self.element.read(input)?);
        Ok(())
    }

    fn transfer(
        &self,
        session: &mut PipeSession,
        input: &mut dyn Input,
        output: &mut dyn Output,
        number: u32,
        repeated: bool,
    ) -> Result<()> {
        self.element.transfer(session, input, output, number, repeated)
    }

    fn is_set(&self, message: &T) -> bool {
        (self.get)(message).is_some()
    }
}

/// Collection wrapper: one wire entry per element, appended in arrival order.
pub(crate) struct Repeated<T, V> {
    get: fn(&T) -> &Vec<V>,
    get_mut: fn(&mut T) -> &mut Vec<V>,
    element: Box<dyn ElementCodec<V>>,
}

impl<T, V> Repeated<T, V> {
    pub(crate) fn new(
        get: fn(&T) -> &Vec<V>,
        get_mut: fn(&mut T) -> &mut Vec<V>,
        element: Box<dyn ElementCodec<V>>,
    ) -> Self {
        Self {
            get,
            get_mut,
            element,
        }
    }
}

impl<T, V> FieldStrategy<T> for Repeated<T, V> {
    fn field_type(&self) -> FieldType {
        self.element.field_type()
    }

    fn write_to(&self, output: &mut dyn Output, number: u32, message: &T) -> Result<()> {
        for value in (self.get)(message) {
            self.element.write(output, number, value, true)?;
        }
        Ok(())
    }

    fn merge_from(&self, input: &mut dyn Input, message: &mut T) -> Result<()> {
        let value = self.element.read(input)?;
        (self.get_mut)(message).push(value);
        Ok(())
    }

    fn transfer(
        &self,
        session: &mut PipeSession,
        input: &mut dyn Input,
        output: &mut dyn Output,
        number: u32,
        repeated: bool,
    ) -> Result<()> {
        self.element.transfer(session, input, output, number, repeated)
    }

    fn is_set(&self, message: &T) -> bool {
        !(self.get)(message).is_empty()
    }
}
