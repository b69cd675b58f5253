// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire primitives: tags, wire types, varints and the `Input`/`Output` cursors.
//!
//! The byte layout is the protobuf tagged encoding: every field occurrence is a
//! varint tag `(number << 3) | wire_type` followed by a payload whose shape is
//! fixed by the wire type. Two framings exist for nested messages:
//!
//! - [`Format::Protobuf`]: nested messages are length-delimited.
//! - [`Format::Grouped`]: nested messages are wrapped in `StartGroup`/`EndGroup`
//!   tags carrying the field number.
//!
//! Scalars are encoded identically in both formats, which is what lets the
//! [`Pipe`](crate::Pipe) copy them byte-for-byte.

// Wire integers are reinterpreted bitwise between widths and signedness.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

mod input;
mod output;
mod varint;

pub use input::{ByteInput, Input};
pub use output::{ByteOutput, Output};
pub use varint::{
    decode_zigzag32, decode_zigzag64, encode_varint, encode_zigzag32, encode_zigzag64,
    varint_len,
};

use thiserror::Error;

/// Number of low bits in a tag that carry the wire type.
pub const TAG_TYPE_BITS: u32 = 3;

/// Largest field number representable in a tag.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// Field number carrying the concrete type discriminator of a polymorphic value.
pub const TYPE_FIELD_NUMBER: u32 = 127;

/// Field number carrying the object index of a polymorphic value written in
/// graph mode. It precedes the discriminator.
pub const OBJECT_INDEX_FIELD_NUMBER: u32 = 126;

/// Encoding category of a field occurrence on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    /// Variable-length integer.
    Varint,
    /// Eight little-endian bytes.
    Fixed64,
    /// Varint length followed by that many bytes.
    LengthDelimited,
    /// Opens a group-framed nested message.
    StartGroup,
    /// Closes a group-framed nested message.
    EndGroup,
    /// Four little-endian bytes.
    Fixed32,
    /// Varint index of a previously written polymorphic object.
    Reference,
}

impl WireType {
    /// Decodes the low three bits of a tag.
    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::LengthDelimited),
            3 => Some(Self::StartGroup),
            4 => Some(Self::EndGroup),
            5 => Some(Self::Fixed32),
            6 => Some(Self::Reference),
            _ => None,
        }
    }

    /// Bits placed in the low three bits of a tag.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Varint => 0,
            Self::Fixed64 => 1,
            Self::LengthDelimited => 2,
            Self::StartGroup => 3,
            Self::EndGroup => 4,
            Self::Fixed32 => 5,
            Self::Reference => 6,
        }
    }
}

/// Builds a tag from a field number and wire type.
pub const fn make_tag(number: u32, wire_type: WireType) -> u32 {
    (number << TAG_TYPE_BITS) | wire_type.bits()
}

/// Field number carried by `tag`.
pub const fn tag_number(tag: u32) -> u32 {
    tag >> TAG_TYPE_BITS
}

/// Wire type carried by `tag`, if valid.
pub const fn tag_wire_type(tag: u32) -> Option<WireType> {
    WireType::from_bits(tag & ((1 << TAG_TYPE_BITS) - 1))
}

/// Declared value type of a field, independent of how it travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Varint-encoded signed 32-bit integer.
    Int32,
    /// Varint-encoded unsigned 32-bit integer.
    UInt32,
    /// Zig-zag varint signed 32-bit integer.
    SInt32,
    /// Little-endian unsigned 32-bit integer.
    Fixed32,
    /// Little-endian signed 32-bit integer.
    SFixed32,
    /// Varint-encoded signed 64-bit integer.
    Int64,
    /// Varint-encoded unsigned 64-bit integer.
    UInt64,
    /// Zig-zag varint signed 64-bit integer.
    SInt64,
    /// Little-endian unsigned 64-bit integer.
    Fixed64,
    /// Little-endian signed 64-bit integer.
    SFixed64,
    /// IEEE-754 single precision.
    Float,
    /// IEEE-754 double precision.
    Double,
    /// Varint boolean.
    Bool,
    /// Length-delimited UTF-8 text.
    String,
    /// Length-delimited raw bytes.
    Bytes,
    /// Varint enum number.
    Enum,
    /// Nested message (framing chosen by the output format).
    Message,
}

impl FieldType {
    /// Wire type used for a single occurrence of this field type.
    ///
    /// `Message` reports `LengthDelimited`; [`Format::Grouped`] outputs
    /// substitute `StartGroup` when writing.
    pub const fn wire_type(self) -> WireType {
        match self {
            Self::Int32
            | Self::UInt32
            | Self::SInt32
            | Self::Int64
            | Self::UInt64
            | Self::SInt64
            | Self::Bool
            | Self::Enum => WireType::Varint,
            Self::Fixed32 | Self::SFixed32 | Self::Float => WireType::Fixed32,
            Self::Fixed64 | Self::SFixed64 | Self::Double => WireType::Fixed64,
            Self::String | Self::Bytes | Self::Message => WireType::LengthDelimited,
        }
    }
}

/// Framing used for nested messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// Nested messages are length-delimited (standard protobuf).
    #[default]
    Protobuf,
    /// Nested messages are framed by start/end group tags.
    Grouped,
}

/// Malformed input detected by the wire primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Input ended in the middle of a value or an open nested message.
    #[error("input truncated")]
    Truncated,
    /// A varint ran past ten bytes.
    #[error("malformed varint")]
    MalformedVarint,
    /// Tag carried wire-type bits 7.
    #[error("invalid wire type bits {0}")]
    InvalidWireType(u32),
    /// Tag carried field number 0 or a number above the maximum.
    #[error("invalid field number {0}")]
    InvalidFieldNumber(u32),
    /// An end-group tag did not close the innermost open group.
    #[error("end group for field {found} does not close open group {expected:?}")]
    UnmatchedEndGroup {
        /// Field number of the innermost open group, if any.
        expected: Option<u32>,
        /// Field number carried by the end-group tag.
        found: u32,
    },
    /// The last tag's wire type does not fit the requested read.
    #[error("wire type {found:?} cannot be read as {expected}")]
    UnexpectedWireType {
        /// What the caller tried to read.
        expected: &'static str,
        /// Wire type of the last tag.
        found: Option<WireType>,
    },
    /// A length prefix exceeded the configured maximum.
    #[error("length {len} exceeds the maximum of {max}")]
    LengthTooLarge {
        /// Declared length.
        len: u64,
        /// Configured maximum.
        max: usize,
    },
    /// Nested message did not consume exactly its declared length.
    #[error("nested message length misreported")]
    MisreportedLength,
    /// String payload was not valid UTF-8.
    #[error("invalid utf-8")]
    InvalidUtf8,
    /// A reference entry appeared on an input without a graph resolver.
    #[error("reference entry without graph resolution")]
    UnexpectedReference,
}
