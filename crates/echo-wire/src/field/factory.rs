// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Field-strategy factory.
//!
//! Classification is a total function of the element type and the configured
//! exclusion policy, checked in a fixed order: enum, inline scalar, exclusion
//! policy, record with a known schema, and polymorphic for every remaining
//! object type.

use crate::config::CodecConfig;
use crate::error::{CodecError, Result};

use super::element::{
    Element, ElementCodec, ElementKind, EnumElement, InlineElement, MessageElement,
    PolymorphicElement,
};
use super::strategy::{FieldStrategy, Optional, Repeated, Singular};

/// Element strategy chosen for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Closed integer enum.
    Enum,
    /// Scalar mapped directly to a wire type.
    Inline,
    /// Record with a statically known schema.
    NestedRecord,
    /// Record whose concrete type is carried on the wire.
    Polymorphic,
}

/// Binds field strategies under one configuration.
#[derive(Debug, Clone, Copy)]
pub struct FieldFactory<'a> {
    config: &'a CodecConfig,
}

/// Names reported when the factory declines a field.
#[derive(Debug, Clone, Copy)]
pub struct FieldLabel {
    /// Full name of the owning message.
    pub message: &'static str,
    /// Declared field number.
    pub number: u32,
    /// Declared field name.
    pub name: &'static str,
}

impl<'a> FieldFactory<'a> {
    /// Creates a factory applying `config`'s exclusion policy.
    pub fn new(config: &'a CodecConfig) -> Self {
        Self { config }
    }

    /// Classifies `V`, or returns `None` if it is unmappable.
    pub fn classify<V: Element>(&self) -> Option<StrategyKind> {
        match V::kind() {
            ElementKind::Enum(_) => Some(StrategyKind::Enum),
            ElementKind::Inline(_) => Some(StrategyKind::Inline),
            _ if self.config.is_excluded(V::TYPE_NAME) => None,
            ElementKind::Unsupported => None,
            ElementKind::Message(_) => Some(StrategyKind::NestedRecord),
            ElementKind::Polymorphic(_) => Some(StrategyKind::Polymorphic),
        }
    }

    fn element<V: Element>(&self, label: FieldLabel) -> Result<Box<dyn ElementCodec<V>>> {
        let element: Box<dyn ElementCodec<V>> = match V::kind() {
            ElementKind::Enum(codec) => Box::new(EnumElement::new(codec)),
            ElementKind::Inline(codec) => Box::new(InlineElement::new(codec)),
            _ if self.config.is_excluded(V::TYPE_NAME) => return Err(unmappable::<V>(label)),
            ElementKind::Unsupported => return Err(unmappable::<V>(label)),
            ElementKind::Message(codec) => Box::new(MessageElement::new(codec)),
            ElementKind::Polymorphic(codec) => Box::new(PolymorphicElement::new(codec)),
        };
        Ok(element)
    }

    /// Strategy for a field that always holds a value.
    pub fn singular<T: 'static, V: Element>(
        &self,
        label: FieldLabel,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Result<Box<dyn FieldStrategy<T>>> {
        let element = self.element::<V>(label)?;
        Ok(Box::new(Singular::new(get, get_mut, element)))
    }

    /// Strategy for a field that may be absent.
    pub fn optional<T: 'static, V: Element>(
        &self,
        label: FieldLabel,
        get: fn(&T) -> &Option<V>,
        get_mut: fn(&mut T) -> &mut Option<V>,
    ) -> Result<Box<dyn FieldStrategy<T>>> {
        let element = self.element::<V>(label)?;
        Ok(Box::new(Optional::new(get, get_mut, element)))
    }

    /// Collection strategy wrapping the element strategy of `V`.
    pub fn repeated<T: 'static, V: Element>(
        &self,
        label: FieldLabel,
        get: fn(&T) -> &Vec<V>,
        get_mut: fn(&mut T) -> &mut Vec<V>,
    ) -> Result<Box<dyn FieldStrategy<T>>> {
        let element = self.element::<V>(label)?;
        Ok(Box::new(Repeated::new(get, get_mut, element)))
    }
}

fn unmappable<V: Element>(label: FieldLabel) -> CodecError {
    CodecError::UnmappableFieldType {
        message: label.message,
        number: label.number,
        name: label.name,
        type_name: V::TYPE_NAME,
    }
}
