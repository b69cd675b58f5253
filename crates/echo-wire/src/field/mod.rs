// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fields bound into a schema, the strategies behind them, and the factory that
//! picks a strategy per field.

mod element;
mod factory;
pub(crate) mod polymorphic;
mod strategy;

use std::fmt;

pub use element::{
    Element, ElementKind, EnumCodec, Fixed32, Fixed64, InlineCodec, MessageCodec,
    PolymorphicCodec, ProtoEnum, SFixed32, SFixed64, SInt32, SInt64,
};
pub use factory::{FieldFactory, FieldLabel, StrategyKind};
pub use strategy::FieldStrategy;

use crate::error::Result;
use crate::pipe::PipeSession;
use crate::wire::{FieldType, Input, Output};

/// One field of a schema: its tag, name and bound strategy.
pub struct Field<T> {
    number: u32,
    name: &'static str,
    repeated: bool,
    group_filter: u32,
    required: bool,
    strategy: Box<dyn FieldStrategy<T>>,
}

impl<T> Field<T> {
    pub(crate) fn new(
        number: u32,
        name: &'static str,
        repeated: bool,
        group_filter: u32,
        required: bool,
        strategy: Box<dyn FieldStrategy<T>>,
    ) -> Self {
        Self {
            number,
            name,
            repeated,
            group_filter,
            required,
            strategy,
        }
    }

    /// Field tag.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared wire-level type of the field's elements.
    pub fn field_type(&self) -> FieldType {
        self.strategy.field_type()
    }

    /// Returns `true` for collection fields.
    pub fn is_repeated(&self) -> bool {
        self.repeated
    }

    /// Group filter; 0 means the field takes part in every pass.
    pub fn group_filter(&self) -> u32 {
        self.group_filter
    }

    /// Returns `true` if the field must be set for its message to be initialized.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns `true` if the field takes part in a pass for `group`.
    pub fn in_group(&self, group: u32) -> bool {
        self.group_filter == 0 || self.group_filter == group
    }

    /// Writes the field's value from `message`.
    pub fn write_to(&self, output: &mut dyn Output, message: &T) -> Result<()> {
        self.strategy.write_to(output, self.number, message)
    }

    /// Applies one wire occurrence of the field to `message`.
    pub fn merge_from(&self, input: &mut dyn Input, message: &mut T) -> Result<()> {
        self.strategy.merge_from(input, message)
    }

    /// Copies one occurrence from `input` to `output`.
    pub fn transfer(
        &self,
        session: &mut PipeSession,
        input: &mut dyn Input,
        output: &mut dyn Output,
    ) -> Result<()> {
        self.strategy
            .transfer(session, input, output, self.number, self.repeated)
    }

    /// Returns `false` if the field is required but unset in `message`.
    pub fn is_initialized(&self, message: &T) -> bool {
        !self.required || self.strategy.is_set(message)
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("number", &self.number)
            .field("name", &self.name)
            .field("field_type", &self.field_type())
            .field("repeated", &self.repeated)
            .field("group_filter", &self.group_filter)
            .field("required", &self.required)
            .finish()
    }
}
