// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Element types: what a single field value is and how it is encoded.

use std::sync::{Arc, OnceLock};

use bytes::Bytes;

use crate::error::{CodecError, Result};
use crate::object::ObjectRef;
use crate::pipe::PipeSession;
use crate::runtime::{NestedSchema, RuntimeSchema};
use crate::schema::Message;
use crate::wire::{FieldType, Input, Output};

use super::polymorphic;

/// A type usable as the value of a field, or as the element of a repeated field.
///
/// The factory classifies elements through [`kind`](Element::kind). Every
/// [`Message`] is an element of kind [`ElementKind::Message`]; closed integer
/// enums implement [`ProtoEnum`] and return [`ElementKind::enumeration`].
pub trait Element: Sized + Send + Sync + 'static {
    /// Name checked against the configured exclusion policy.
    const TYPE_NAME: &'static str;

    /// How values of this type are encoded.
    fn kind() -> ElementKind<Self>;
}

/// Encoding family of an [`Element`].
pub enum ElementKind<V> {
    /// Closed set of named integer constants.
    Enum(EnumCodec<V>),
    /// Scalar mapped directly to a wire type.
    Inline(InlineCodec<V>),
    /// Record with a statically known schema.
    Message(MessageCodec<V>),
    /// Record whose concrete type travels on the wire.
    Polymorphic(PolymorphicCodec<V>),
    /// Not encodable; fields of this type are dropped from their schema.
    Unsupported,
}

impl<V: ProtoEnum> ElementKind<V> {
    /// Enum encoding for a [`ProtoEnum`].
    pub fn enumeration() -> Self {
        Self::Enum(EnumCodec {
            name: V::NAME,
            to_number: V::number,
            from_number: V::from_number,
        })
    }
}

/// A closed enum encoded as its integer number.
pub trait ProtoEnum: Sized {
    /// Enum type name, reported by [`CodecError::UnknownEnumValue`].
    const NAME: &'static str;

    /// Wire number of this constant.
    fn number(&self) -> i32;

    /// Constant for a wire number, if one exists.
    fn from_number(number: i32) -> Option<Self>;
}

/// Enum element accessors.
pub struct EnumCodec<V> {
    /// Enum type name.
    pub name: &'static str,
    /// Constant to wire number.
    pub to_number: fn(&V) -> i32,
    /// Wire number to constant.
    pub from_number: fn(i32) -> Option<V>,
}

/// Inline scalar accessors.
pub struct InlineCodec<V> {
    /// Declared wire-level type.
    pub field_type: FieldType,
    /// Writes one tagged value.
    pub write: fn(&mut dyn Output, u32, &V, bool) -> Result<()>,
    /// Reads one value after its tag.
    pub read: fn(&mut dyn Input) -> Result<V>,
}

/// Nested record with a statically known schema.
pub struct MessageCodec<V> {
    new: fn() -> V,
    schema: fn() -> Result<Arc<dyn NestedSchema<V>>>,
}

impl<V: Message> MessageCodec<V> {
    /// Codec resolving `V`'s cached schema on first use.
    pub fn new() -> Self {
        Self {
            new: V::default,
            schema: || {
                let schema: Arc<dyn NestedSchema<V>> = RuntimeSchema::<V>::get()?;
                Ok(schema)
            },
        }
    }
}

impl<V: Message> Default for MessageCodec<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Polymorphic element: a value convertible to and from an [`ObjectRef`].
pub struct PolymorphicCodec<V> {
    /// Wraps a decoded object.
    pub wrap: fn(ObjectRef) -> V,
    /// Borrows the object to encode.
    pub unwrap: fn(&V) -> &ObjectRef,
}

impl<T: Message> Element for T {
    const TYPE_NAME: &'static str = T::FULL_NAME;

    fn kind() -> ElementKind<Self> {
        ElementKind::Message(MessageCodec::new())
    }
}

impl Element for ObjectRef {
    const TYPE_NAME: &'static str = "ObjectRef";

    fn kind() -> ElementKind<Self> {
        ElementKind::Polymorphic(PolymorphicCodec {
            wrap: |object| object,
            unwrap: |object| object,
        })
    }
}

macro_rules! inline_element {
    ($ty:ty, $name:literal, $field_type:ident, $write:ident, $read:ident) => {
        impl Element for $ty {
            const TYPE_NAME: &'static str = $name;

            fn kind() -> ElementKind<Self> {
                ElementKind::Inline(InlineCodec {
                    field_type: FieldType::$field_type,
                    write: |output, number, value, repeated| {
                        output.$write(number, *value, repeated)
                    },
                    read: |input| input.$read(),
                })
            }
        }
    };
}

inline_element!(i32, "i32", Int32, write_int32, read_int32);
inline_element!(u32, "u32", UInt32, write_uint32, read_uint32);
inline_element!(i64, "i64", Int64, write_int64, read_int64);
inline_element!(u64, "u64", UInt64, write_uint64, read_uint64);
inline_element!(f32, "f32", Float, write_float, read_float);
inline_element!(f64, "f64", Double, write_double, read_double);
inline_element!(bool, "bool", Bool, write_bool, read_bool);

impl Element for String {
    const TYPE_NAME: &'static str = "String";

    fn kind() -> ElementKind<Self> {
        ElementKind::Inline(InlineCodec {
            field_type: FieldType::String,
            write: |output, number, value, repeated| output.write_string(number, value, repeated),
            read: |input| input.read_string(),
        })
    }
}

impl Element for Vec<u8> {
    const TYPE_NAME: &'static str = "Vec<u8>";

    fn kind() -> ElementKind<Self> {
        ElementKind::Inline(InlineCodec {
            field_type: FieldType::Bytes,
            write: |output, number, value, repeated| output.write_bytes(number, value, repeated),
            read: |input| input.read_bytes(),
        })
    }
}

impl Element for Bytes {
    const TYPE_NAME: &'static str = "Bytes";

    fn kind() -> ElementKind<Self> {
        ElementKind::Inline(InlineCodec {
            field_type: FieldType::Bytes,
            write: |output, number, value, repeated| output.write_bytes(number, value, repeated),
            read: |input| input.read_bytes().map(Bytes::from),
        })
    }
}

macro_rules! scalar_wrapper {
    ($(#[$doc:meta])* $wrapper:ident($inner:ty), $field_type:ident, $write:ident, $read:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $wrapper(pub $inner);

        impl From<$inner> for $wrapper {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl Element for $wrapper {
            const TYPE_NAME: &'static str = stringify!($wrapper);

            fn kind() -> ElementKind<Self> {
                ElementKind::Inline(InlineCodec {
                    field_type: FieldType::$field_type,
                    write: |output, number, value, repeated| {
                        output.$write(number, value.0, repeated)
                    },
                    read: |input| input.$read().map($wrapper),
                })
            }
        }
    };
}

scalar_wrapper!(
    /// `i32` encoded as a zig-zag varint.
    SInt32(i32), SInt32, write_sint32, read_sint32
);
scalar_wrapper!(
    /// `i64` encoded as a zig-zag varint.
    SInt64(i64), SInt64, write_sint64, read_sint64
);
scalar_wrapper!(
    /// `u32` encoded as four little-endian bytes.
    Fixed32(u32), Fixed32, write_fixed32, read_fixed32
);
scalar_wrapper!(
    /// `u64` encoded as eight little-endian bytes.
    Fixed64(u64), Fixed64, write_fixed64, read_fixed64
);
scalar_wrapper!(
    /// `i32` encoded as four little-endian bytes.
    SFixed32(i32), SFixed32, write_sfixed32, read_sfixed32
);
scalar_wrapper!(
    /// `i64` encoded as eight little-endian bytes.
    SFixed64(i64), SFixed64, write_sfixed64, read_sfixed64
);

/// Per-element codec bound by the factory; the cardinality strategies wrap it.
pub(crate) trait ElementCodec<V>: Send + Sync {
    fn field_type(&self) -> FieldType;

    fn write(&self, output: &mut dyn Output, number: u32, value: &V, repeated: bool)
        -> Result<()>;

    fn read(&self, input: &mut dyn Input) -> Result<V>;

    /// Applies one wire value to an existing slot; replaces it unless overridden.
    fn merge_into(&self, input: &mut dyn Input, slot: &mut V) -> Result<()> {
        *slot = self.read(input)?;
        Ok(())
    }

    fn transfer(
        &self,
        session: &mut PipeSession,
        input: &mut dyn Input,
        output: &mut dyn Output,
        number: u32,
        repeated: bool,
    ) -> Result<()>;
}

pub(crate) struct InlineElement<V> {
    codec: InlineCodec<V>,
}

impl<V> InlineElement<V> {
    pub(crate) fn new(codec: InlineCodec<V>) -> Self {
        Self { codec }
    }
}

impl<V: Element> ElementCodec<V> for InlineElement<V> {
    fn field_type(&self) -> FieldType {
        self.codec.field_type
    }

    fn write(
        &self,
        output: &mut dyn Output,
        number: u32,
        value: &V,
        repeated: bool,
    ) -> Result<()> {
        (self.codec.write)(output, number, value, repeated)
    }

    fn read(&self, input: &mut dyn Input) -> Result<V> {
        (self.codec.read)(input)
    }

    fn transfer(
        &self,
        _session: &mut PipeSession,
        input: &mut dyn Input,
        output: &mut dyn Output,
        number: u32,
        repeated: bool,
    ) -> Result<()> {
        transfer_scalar(self.codec.field_type, input, output, number, repeated)
    }
}

pub(crate) struct EnumElement<V> {
    codec: EnumCodec<V>,
}

impl<V> EnumElement<V> {
    pub(crate) fn new(codec: EnumCodec<V>) -> Self {
        Self { codec }
    }
}

impl<V: Element> ElementCodec<V> for EnumElement<V> {
    fn field_type(&self) -> FieldType {
        FieldType::Enum
    }

    fn write(
        &self,
        output: &mut dyn Output,
        number: u32,
        value: &V,
        repeated: bool,
    ) -> Result<()> {
        output.write_enum(number, (self.codec.to_number)(value), repeated)
    }

    fn read(&self, input: &mut dyn Input) -> Result<V> {
        let value = input.read_enum()?;
        (self.codec.from_number)(value).ok_or(CodecError::UnknownEnumValue {
            name: self.codec.name,
            value,
        })
    }

    fn transfer(
        &self,
        _session: &mut PipeSession,
        input: &mut dyn Input,
        output: &mut dyn Output,
        number: u32,
        repeated: bool,
    ) -> Result<()> {
        output.write_enum(number, input.read_enum()?, repeated)
    }
}

pub(crate) struct MessageElement<V> {
    codec: MessageCodec<V>,
    schema: OnceLock<Arc<dyn NestedSchema<V>>>,
}

impl<V> MessageElement<V> {
    pub(crate) fn new(codec: MessageCodec<V>) -> Self {
        Self {
            codec,
            schema: OnceLock::new(),
        }
    }

    // Resolved lazily so self-referential records can be described.
    fn schema(&self) -> Result<&Arc<dyn NestedSchema<V>>> {
        if let Some(schema) = self.schema.get() {
            return Ok(schema);
        }
        let schema = (self.codec.schema)()?;
        Ok(self.schema.get_or_init(|| schema))
    }
}

impl<V: Element> ElementCodec<V> for MessageElement<V> {
    fn field_type(&self) -> FieldType {
        FieldType::Message
    }

    fn write(
        &self,
        output: &mut dyn Output,
        number: u32,
        value: &V,
        repeated: bool,
    ) -> Result<()> {
        let schema = self.schema()?;
        output.write_nested(number, repeated, &mut |nested| schema.write_to(nested, value))
    }

    fn read(&self, input: &mut dyn Input) -> Result<V> {
        let mut value = (self.codec.new)();
        self.merge_into(input, &mut value)?;
        Ok(value)
    }

    fn merge_into(&self, input: &mut dyn Input, slot: &mut V) -> Result<()> {
        let schema = self.schema()?;
        input.merge_nested(&mut |nested| schema.merge_from(nested, slot))
    }

    fn transfer(
        &self,
        session: &mut PipeSession,
        input: &mut dyn Input,
        output: &mut dyn Output,
        number: u32,
        repeated: bool,
    ) -> Result<()> {
        let schema = self.schema()?;
        session.transfer_nested(schema.as_erased(), input, output, number, repeated)
    }
}

pub(crate) struct PolymorphicElement<V> {
    codec: PolymorphicCodec<V>,
}

impl<V> PolymorphicElement<V> {
    pub(crate) fn new(codec: PolymorphicCodec<V>) -> Self {
        Self { codec }
    }
}

impl<V: Element> ElementCodec<V> for PolymorphicElement<V> {
    fn field_type(&self) -> FieldType {
        FieldType::Message
    }

    fn write(
        &self,
        output: &mut dyn Output,
        number: u32,
        value: &V,
        repeated: bool,
    ) -> Result<()> {
        polymorphic::write_object(output, number, (self.codec.unwrap)(value), repeated)
    }

    fn read(&self, input: &mut dyn Input) -> Result<V> {
        polymorphic::read_object(input).map(self.codec.wrap)
    }

    fn transfer(
        &self,
        session: &mut PipeSession,
        input: &mut dyn Input,
        output: &mut dyn Output,
        number: u32,
        repeated: bool,
    ) -> Result<()> {
        polymorphic::transfer_object(session, input, output, number, repeated)
    }
}

/// Re-tags one scalar occurrence without interpreting it beyond its wire shape.
fn transfer_scalar(
    field_type: FieldType,
    input: &mut dyn Input,
    output: &mut dyn Output,
    number: u32,
    repeated: bool,
) -> Result<()> {
    match field_type {
        FieldType::Int32 | FieldType::Enum => {
            output.write_int32(number, input.read_int32()?, repeated)
        }
        FieldType::UInt32 => output.write_uint32(number, input.read_uint32()?, repeated),
        FieldType::SInt32 => output.write_sint32(number, input.read_sint32()?, repeated),
        FieldType::Fixed32 => output.write_fixed32(number, input.read_fixed32()?, repeated),
        FieldType::SFixed32 => output.write_sfixed32(number, input.read_sfixed32()?, repeated),
        FieldType::Int64 => output.write_int64(number, input.read_int64()?, repeated),
        FieldType::UInt64 => output.write_uint64(number, input.read_uint64()?, repeated),
        FieldType::SInt64 => output.write_sint64(number, input.read_sint64()?, repeated),
        FieldType::Fixed64 => output.write_fixed64(number, input.read_fixed64()?, repeated),
        FieldType::SFixed64 => output.write_sfixed64(number, input.read_sfixed64()?, repeated),
        FieldType::Float => output.write_float(number, input.read_float()?, repeated),
        FieldType::Double => output.write_double(number, input.read_double()?, repeated),
        FieldType::Bool => output.write_bool(number, input.read_bool()?, repeated),
        FieldType::String => input.transfer_byte_range(output, true, number, repeated),
        FieldType::Bytes => input.transfer_byte_range(output, false, number, repeated),
        FieldType::Message => Err(CodecError::TypeMismatch {
            expected: "scalar",
            found: "nested message",
        }),
    }
}
