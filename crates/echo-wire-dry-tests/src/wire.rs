// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Builder for hand-crafted wire bytes, including malformed ones.

use bytes::Bytes;
use echo_wire::wire::{encode_varint, make_tag, WireType};

/// Appends tags and payloads without any validation.
///
/// ```
/// use echo_wire_dry_tests::WireBuilder;
///
/// let bytes = WireBuilder::new().varint(1, 150).build();
/// assert_eq!(&bytes[..], [0x08, 0x96, 0x01]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct WireBuilder {
    buf: Vec<u8>,
}

impl WireBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a tag.
    pub fn tag(mut self, number: u32, wire_type: WireType) -> Self {
        encode_varint(u64::from(make_tag(number, wire_type)), &mut self.buf);
        self
    }

    /// Appends a bare varint.
    pub fn raw_varint(mut self, value: u64) -> Self {
        encode_varint(value, &mut self.buf);
        self
    }

    /// Appends bytes verbatim.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Appends a varint field.
    pub fn varint(self, number: u32, value: u64) -> Self {
        self.tag(number, WireType::Varint).raw_varint(value)
    }

    /// Appends a 4-byte field.
    pub fn fixed32(self, number: u32, value: u32) -> Self {
        self.tag(number, WireType::Fixed32).raw(&value.to_le_bytes())
    }

    /// Appends an 8-byte field.
    pub fn fixed64(self, number: u32, value: u64) -> Self {
        self.tag(number, WireType::Fixed64).raw(&value.to_le_bytes())
    }

    /// Appends a length-delimited field.
    pub fn bytes(self, number: u32, value: &[u8]) -> Self {
        self.tag(number, WireType::LengthDelimited)
            .raw_varint(value.len() as u64)
            .raw(value)
    }

    /// Appends a string field.
    pub fn string(self, number: u32, value: &str) -> Self {
        self.bytes(number, value.as_bytes())
    }

    /// Appends a length-delimited nested message built by `build`.
    pub fn nested(self, number: u32, build: impl FnOnce(Self) -> Self) -> Self {
        let body = build(Self::new()).buf;
        self.bytes(number, &body)
    }

    /// Opens a group.
    pub fn start_group(self, number: u32) -> Self {
        self.tag(number, WireType::StartGroup)
    }

    /// Closes a group.
    pub fn end_group(self, number: u32) -> Self {
        self.tag(number, WireType::EndGroup)
    }

    /// Appends a back-reference to the object at `index`.
    pub fn reference(self, number: u32, index: u32) -> Self {
        self.tag(number, WireType::Reference)
            .raw_varint(u64::from(index))
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finishes the buffer.
    pub fn build(self) -> Bytes {
        Bytes::from(self.buf)
    }
}
