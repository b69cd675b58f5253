// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error types for echo-wire.

use std::fmt;

use thiserror::Error;

use crate::wire::WireError;

/// Key used in a failed field lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKey {
    /// Lookup by field number.
    Number(u32),
    /// Lookup by field name.
    Name(String),
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(f, "#{number}"),
            Self::Name(name) => write!(f, "{name:?}"),
        }
    }
}

/// Errors raised while building schemas, encoding, merging or piping records.
///
/// Every top-level operation reports at most one error. Output written before
/// the failure is not rolled back; callers discard it.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A field number or name is not declared by the schema.
    #[error("[UNKNOWN_FIELD] {message} has no field {field}")]
    UnknownField {
        /// Full name of the message that was queried.
        message: String,
        /// The number or name that missed.
        field: FieldKey,
    },

    /// A wire integer has no constant in the declared enum.
    #[error("[UNKNOWN_ENUM_VALUE] {value} is not a value of enum {name}")]
    UnknownEnumValue {
        /// Enum type name.
        name: &'static str,
        /// Integer found on the wire.
        value: i32,
    },

    /// The factory declined to bind a strategy for a field's element type.
    ///
    /// Schema construction drops such fields; this never surfaces from
    /// encode or merge calls.
    #[error("[UNMAPPABLE_FIELD] field {number} ({name}) of {message} has unmappable element type {type_name}")]
    UnmappableFieldType {
        /// Full name of the owning message.
        message: &'static str,
        /// Declared field number.
        number: u32,
        /// Declared field name.
        name: &'static str,
        /// Element type name reported by the element.
        type_name: &'static str,
    },

    /// Malformed tag, length or payload on the input.
    #[error("[WIRE_INTEGRITY] {0}")]
    Wire(#[from] WireError),

    /// A pipe source failed to release its resources.
    #[error("[RESOURCE_CLEANUP] {0}")]
    ResourceCleanup(String),

    /// A message description violates tag invariants.
    #[error("[INVALID_SCHEMA] {message}: {reason}")]
    InvalidSchema {
        /// Full name of the message being described.
        message: &'static str,
        /// What is wrong with the description.
        reason: String,
    },

    /// A polymorphic discriminator names no registered type.
    #[error("[UNKNOWN_TYPE] no schema registered for {0:?}")]
    UnknownType(String),

    /// Two different types were registered under one discriminator.
    #[error("[DUPLICATE_TYPE] discriminator {0:?} already names another type")]
    DuplicateType(String),

    /// A polymorphic payload did not start with its type discriminator.
    #[error("[MISSING_DISCRIMINATOR] polymorphic value does not start with field 127")]
    MissingDiscriminator,

    /// An erased object was handed to the schema of another type.
    #[error("[TYPE_MISMATCH] expected {expected}, found {found}")]
    TypeMismatch {
        /// Type the schema handles.
        expected: &'static str,
        /// Type of the object received.
        found: &'static str,
    },

    /// A reference index names no object registered in this merge.
    #[error("[DANGLING_REFERENCE] reference #{0} names no object read in this merge")]
    DanglingReference(u32),

    /// Two objects in one graph-mode message carry the same index.
    #[error("[DUPLICATE_OBJECT_INDEX] object index #{0} appears twice")]
    DuplicateObjectIndex(u32),

    /// A cyclic object graph was written without graph references enabled.
    #[error("[CYCLIC_REFERENCE] object graph contains a cycle; write it in graph mode")]
    CyclicReference,

    /// Message nesting exceeded the configured maximum depth.
    #[error("[DEPTH_LIMIT] nesting exceeds the configured depth of {0}")]
    DepthLimitExceeded(usize),

    /// I/O error from a stream-backed helper or pipe source.
    #[error("[IO] {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`CodecError`].
pub type Result<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_key_display_distinguishes_numbers_and_names() {
        assert_eq!(FieldKey::Number(7).to_string(), "#7");
        assert_eq!(FieldKey::Name("id".into()).to_string(), "\"id\"");
    }

    #[test]
    fn wire_errors_convert_into_codec_errors() {
        let err: CodecError = WireError::Truncated.into();
        assert!(matches!(err, CodecError::Wire(WireError::Truncated)));
        assert_eq!(err.to_string(), "[WIRE_INTEGRITY] input truncated");
    }
}
