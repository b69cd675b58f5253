// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structural description of a record type.

use crate::error::Result;
use crate::field::{Element, FieldFactory, FieldLabel, FieldStrategy};

type Bind<T> = Box<dyn FnOnce(&FieldFactory<'_>, FieldLabel) -> Result<Box<dyn FieldStrategy<T>>>>;

pub(crate) struct FieldDescriptor<T> {
    pub(crate) number: u32,
    pub(crate) name: &'static str,
    pub(crate) repeated: bool,
    pub(crate) group_filter: u32,
    pub(crate) required: bool,
    pub(crate) bind: Bind<T>,
}

/// Field declarations collected by [`Message::describe`](crate::Message::describe).
///
/// Each declaration pairs a tag and name with explicit accessors; the factory
/// turns them into strategies when the schema is built.
///
/// ```rust,ignore
/// fields
///     .field(1, "id", |p| &p.id, |p| &mut p.id)
///     .optional(2, "email", |p| &p.email, |p| &mut p.email)
///     .required()
///     .repeated(3, "tags", |p| &p.tags, |p| &mut p.tags)
///     .group(1);
/// ```
pub struct FieldSet<T> {
    descriptors: Vec<FieldDescriptor<T>>,
}

impl<T: 'static> FieldSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            descriptors: Vec::new(),
        }
    }

    /// Declares a field that always holds a value and is always written.
    pub fn field<V: Element>(
        &mut self,
        number: u32,
        name: &'static str,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> &mut Self {
        self.push(number, name, false, move |factory, label| {
            factory.singular(label, get, get_mut)
        })
    }

    /// Declares a field written only when `Some`.
    pub fn optional<V: Element>(
        &mut self,
        number: u32,
        name: &'static str,
        get: fn(&T) -> &Option<V>,
        get_mut: fn(&mut T) -> &mut Option<V>,
    ) -> &mut Self {
        self.push(number, name, false, move |factory, label| {
            factory.optional(label, get, get_mut)
        })
    }

    /// Declares a collection field: one wire entry per element, none when empty.
    pub fn repeated<V: Element>(
        &mut self,
        number: u32,
        name: &'static str,
        get: fn(&T) -> &Vec<V>,
        get_mut: fn(&mut T) -> &mut Vec<V>,
    ) -> &mut Self {
        self.push(number, name, true, move |factory, label| {
            factory.repeated(label, get, get_mut)
        })
    }

    /// Restricts the last declared field to passes for `filter` (0 = every pass).
    pub fn group(&mut self, filter: u32) -> &mut Self {
        if let Some(last) = self.descriptors.last_mut() {
            last.group_filter = filter;
        }
        self
    }

    /// Marks the last declared field as required for initialization.
    pub fn required(&mut self) -> &mut Self {
        if let Some(last) = self.descriptors.last_mut() {
            last.required = true;
        }
        self
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` if no field was declared.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub(crate) fn into_descriptors(self) -> Vec<FieldDescriptor<T>> {
        self.descriptors
    }

    fn push(
        &mut self,
        number: u32,
        name: &'static str,
        repeated: bool,
        bind: impl FnOnce(&FieldFactory<'_>, FieldLabel) -> Result<Box<dyn FieldStrategy<T>>>
            + 'static,
    ) -> &mut Self {
        self.descriptors.push(FieldDescriptor {
            number,
            name,
            repeated,
            group_filter: 0,
            required: false,
            bind: Box::new(bind),
        });
        self
    }
}
