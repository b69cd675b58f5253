// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Schemas built at runtime from a record's field description.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::{debug, warn};

use crate::config::{self, CodecConfig};
use crate::descriptor::FieldSet;
use crate::error::{CodecError, FieldKey, Result};
use crate::field::{Field, FieldFactory, FieldLabel};
use crate::object::Object;
use crate::pipe::PipeSession;
use crate::registry;
use crate::schema::{ErasedSchema, Message, Schema};
use crate::wire::{
    Input, Output, MAX_FIELD_NUMBER, OBJECT_INDEX_FIELD_NUMBER, TYPE_FIELD_NUMBER,
};

/// A schema that can also drive a pipe transfer of its own messages.
pub(crate) trait NestedSchema<T>: Schema<T> {
    fn as_erased(&self) -> &dyn ErasedSchema;
}

type SchemaCache = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

fn cache() -> &'static SchemaCache {
    static CACHE: OnceLock<SchemaCache> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Schema of `T`, built once from [`Message::describe`].
///
/// Fields are held in ascending tag order; encoding walks them in that order
/// and merging dispatches on the tag read from the wire. Tags that are not
/// declared are skipped, so records stay readable as fields are added.
pub struct RuntimeSchema<T> {
    name: &'static str,
    full_name: &'static str,
    fields: Vec<Field<T>>,
    by_number: HashMap<u32, usize>,
    by_name: HashMap<&'static str, usize>,
}

impl<T: Message> RuntimeSchema<T> {
    /// The process-wide schema of `T`, built on first use.
    ///
    /// Concurrent first uses may build the schema more than once; the first
    /// instance cached is the one every caller receives. The type is also
    /// registered for polymorphic decoding under [`Message::FULL_NAME`]; if
    /// another type already holds that name the schema is not cached and this
    /// fails with [`CodecError::DuplicateType`] on every call.
    pub fn get() -> Result<Arc<Self>> {
        let key = TypeId::of::<T>();
        if let Some(cached) = read_cache(key) {
            return downcast(cached);
        }
        let built = Arc::new(Self::build()?);
        let erased: Arc<dyn ErasedSchema> = built.clone();
        registry::insert(key, erased)?;
        let built: Arc<dyn Any + Send + Sync> = built;
        let cached = {
            let mut cache = cache().write().unwrap_or_else(|e| e.into_inner());
            Arc::clone(cache.entry(key).or_insert(built))
        };
        downcast::<T>(cached)
    }

    /// Builds a fresh schema under the process-wide configuration.
    pub fn build() -> Result<Self> {
        Self::build_with(config::current())
    }

    /// Builds a fresh schema, applying `config`'s exclusion policy.
    ///
    /// Fields the factory cannot map are dropped with a warning. Tag 0, tags
    /// above the maximum, the tags reserved for polymorphic framing, and duplicate tags or
    /// names fail with [`CodecError::InvalidSchema`].
    pub fn build_with(config: &CodecConfig) -> Result<Self> {
        let mut set = FieldSet::new();
        T::describe(&mut set);
        let factory = FieldFactory::new(config);
        let mut fields = Vec::with_capacity(set.len());
        let mut seen_numbers = HashMap::new();
        let mut seen_names = HashMap::new();
        for descriptor in set.into_descriptors() {
            let number = descriptor.number;
            if number == 0 || number > MAX_FIELD_NUMBER {
                return Err(invalid::<T>(format!("field {:?} has invalid tag {number}", descriptor.name)));
            }
            if number == TYPE_FIELD_NUMBER || number == OBJECT_INDEX_FIELD_NUMBER {
                return Err(invalid::<T>(format!(
                    "field {:?} uses tag {number}, reserved for polymorphic framing",
                    descriptor.name
                )));
            }
            if let Some(other) = seen_numbers.insert(number, descriptor.name) {
                return Err(invalid::<T>(format!(
                    "tag {number} declared by both {other:?} and {:?}",
                    descriptor.name
                )));
            }
            if seen_names.insert(descriptor.name, number).is_some() {
                return Err(invalid::<T>(format!("field name {:?} declared twice", descriptor.name)));
            }
            let label = FieldLabel {
                message: T::FULL_NAME,
                number,
                name: descriptor.name,
            };
            match (descriptor.bind)(&factory, label) {
                Ok(strategy) => fields.push(Field::new(
                    number,
                    descriptor.name,
                    descriptor.repeated,
                    descriptor.group_filter,
                    descriptor.required,
                    strategy,
                )),
                Err(err @ CodecError::UnmappableFieldType { .. }) => {
                    warn!(%err, "dropping unmappable field");
                }
                Err(err) => return Err(err),
            }
        }
        fields.sort_by_key(Field::number);
        let by_number = fields
            .iter()
            .enumerate()
            .map(|(index, field)| (field.number(), index))
            .collect();
        let by_name = fields
            .iter()
            .enumerate()
            .map(|(index, field)| (field.name(), index))
            .collect();
        debug!(record = T::FULL_NAME, fields = fields.len(), "built runtime schema");
        Ok(Self {
            name: T::NAME,
            full_name: T::FULL_NAME,
            fields,
            by_number,
            by_name,
        })
    }

    /// Fields in ascending tag order.
    pub fn fields(&self) -> &[Field<T>] {
        &self.fields
    }

    /// The field with the given tag.
    pub fn field(&self, number: u32) -> Option<&Field<T>> {
        self.by_number.get(&number).map(|&index| &self.fields[index])
    }

    /// The field with the given name.
    pub fn field_by_name(&self, name: &str) -> Option<&Field<T>> {
        self.by_name.get(name).map(|&index| &self.fields[index])
    }

    /// Writes only the fields taking part in a pass for `group`.
    pub fn write_filtered(&self, output: &mut dyn Output, message: &T, group: u32) -> Result<()> {
        for field in self.fields.iter().filter(|field| field.in_group(group)) {
            field.write_to(output, message)?;
        }
        Ok(())
    }

    /// A view of this schema restricted to the fields of `group`.
    pub fn filtered(self: &Arc<Self>, group: u32) -> FilteredSchema<T> {
        FilteredSchema {
            inner: Arc::clone(self),
            group,
        }
    }

    fn merge_fields(
        &self,
        input: &mut dyn Input,
        message: &mut T,
        group: Option<u32>,
    ) -> Result<()> {
        loop {
            let number = input.read_field_number()?;
            if number == 0 {
                return Ok(());
            }
            match self.field(number) {
                Some(field) if group.is_none_or(|group| field.in_group(group)) => {
                    field.merge_from(input, message)?;
                }
                _ => input.skip_field()?,
            }
        }
    }

    fn unknown(&self, field: FieldKey) -> CodecError {
        CodecError::UnknownField {
            message: self.full_name.to_owned(),
            field,
        }
    }
}

fn read_cache(key: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
    let cache = cache().read().unwrap_or_else(|e| e.into_inner());
    cache.get(&key).cloned()
}

fn downcast<T: Message>(cached: Arc<dyn Any + Send + Sync>) -> Result<Arc<RuntimeSchema<T>>> {
    cached
        .downcast::<RuntimeSchema<T>>()
        .map_err(|_| CodecError::TypeMismatch {
            expected: T::FULL_NAME,
            found: "cached schema of another type",
        })
}

fn invalid<T: Message>(reason: String) -> CodecError {
    CodecError::InvalidSchema {
        message: T::FULL_NAME,
        reason,
    }
}

impl<T: Message> Schema<T> for RuntimeSchema<T> {
    fn field_name(&self, number: u32) -> Result<&'static str> {
        self.field(number)
            .map(Field::name)
            .ok_or_else(|| self.unknown(FieldKey::Number(number)))
    }

    fn field_number(&self, name: &str) -> Result<u32> {
        self.field_by_name(name)
            .map(Field::number)
            .ok_or_else(|| self.unknown(FieldKey::Name(name.to_owned())))
    }

    fn is_initialized(&self, message: &T) -> bool {
        self.fields.iter().all(|field| field.is_initialized(message))
    }

    fn new_message(&self) -> T {
        T::default()
    }

    fn message_name(&self) -> &'static str {
        self.name
    }

    fn message_full_name(&self) -> &'static str {
        self.full_name
    }

    fn merge_from(&self, input: &mut dyn Input, message: &mut T) -> Result<()> {
        self.merge_fields(input, message, None)
    }

    fn write_to(&self, output: &mut dyn Output, message: &T) -> Result<()> {
        for field in &self.fields {
            field.write_to(output, message)?;
        }
        Ok(())
    }
}

impl<T: Message> NestedSchema<T> for RuntimeSchema<T> {
    fn as_erased(&self) -> &dyn ErasedSchema {
        self
    }
}

impl<T: Message> ErasedSchema for RuntimeSchema<T> {
    fn message_name(&self) -> &'static str {
        self.name
    }

    fn message_full_name(&self) -> &'static str {
        self.full_name
    }

    fn field_name(&self, number: u32) -> Result<&'static str> {
        Schema::field_name(self, number)
    }

    fn field_number(&self, name: &str) -> Result<u32> {
        Schema::field_number(self, name)
    }

    fn new_object(&self) -> Box<dyn Object> {
        Box::new(T::default())
    }

    fn merge_object(&self, input: &mut dyn Input, object: &mut dyn Object) -> Result<()> {
        let found = object.type_name();
        let message = object
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or(CodecError::TypeMismatch {
                expected: self.full_name,
                found,
            })?;
        self.merge_from(input, message)
    }

    fn write_object(&self, output: &mut dyn Output, object: &dyn Object) -> Result<()> {
        let message = object
            .as_any()
            .downcast_ref::<T>()
            .ok_or(CodecError::TypeMismatch {
                expected: self.full_name,
                found: object.type_name(),
            })?;
        self.write_to(output, message)
    }

    fn is_object_initialized(&self, object: &dyn Object) -> bool {
        object
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|message| self.is_initialized(message))
    }

    fn transfer(
        &self,
        session: &mut PipeSession,
        input: &mut dyn Input,
        output: &mut dyn Output,
    ) -> Result<()> {
        loop {
            let number = input.read_field_number()?;
            if number == 0 {
                return Ok(());
            }
            match self.field(number) {
                Some(field) => {
                    field.transfer(session, input, output)?;
                    session.record_field();
                }
                None => input.skip_field()?,
            }
        }
    }
}

impl<T> fmt::Debug for RuntimeSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeSchema")
            .field("full_name", &self.full_name)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// A [`RuntimeSchema`] restricted to one field group.
///
/// Writing emits only participating fields; merging skips the others.
#[derive(Debug)]
pub struct FilteredSchema<T> {
    inner: Arc<RuntimeSchema<T>>,
    group: u32,
}

impl<T: Message> Schema<T> for FilteredSchema<T> {
    fn field_name(&self, number: u32) -> Result<&'static str> {
        match self.inner.field(number) {
            Some(field) if field.in_group(self.group) => Ok(field.name()),
            _ => Err(self.inner.unknown(FieldKey::Number(number))),
        }
    }

    fn field_number(&self, name: &str) -> Result<u32> {
        match self.inner.field_by_name(name) {
            Some(field) if field.in_group(self.group) => Ok(field.number()),
            _ => Err(self.inner.unknown(FieldKey::Name(name.to_owned()))),
        }
    }

    fn is_initialized(&self, message: &T) -> bool {
        self.inner
            .fields
            .iter()
            .filter(|field| field.in_group(self.group))
            .all(|field| field.is_initialized(message))
    }

    fn new_message(&self) -> T {
        T::default()
    }

    fn message_name(&self) -> &'static str {
        self.inner.name
    }

    fn message_full_name(&self) -> &'static str {
        self.inner.full_name
    }

    fn merge_from(&self, input: &mut dyn Input, message: &mut T) -> Result<()> {
        self.inner.merge_fields(input, message, Some(self.group))
    }

    fn write_to(&self, output: &mut dyn Output, message: &T) -> Result<()> {
        self.inner.write_filtered(output, message, self.group)
    }
}
