// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Read side of the wire primitives.

use std::str;

use bytes::Bytes;

use super::{make_tag, tag_number, tag_wire_type, Output, WireError, WireType, MAX_FIELD_NUMBER};
use crate::config;
use crate::error::{CodecError, Result};
use crate::graph::GraphResolver;

/// Cursor over one encoded message.
///
/// The cursor is positioned by [`read_field_number`](Input::read_field_number);
/// exactly one value read (or [`skip_field`](Input::skip_field)) must follow
/// each non-zero field number.
pub trait Input {
    /// Reads the next tag and returns its field number, or 0 at the end of the
    /// current message.
    fn read_field_number(&mut self) -> Result<u32>;

    /// Wire type of the most recently read tag.
    fn last_wire_type(&self) -> Option<WireType>;

    /// Skips the value of the current field.
    fn skip_field(&mut self) -> Result<()>;

    /// Reads a varint `int32`.
    fn read_int32(&mut self) -> Result<i32>;
    /// Reads a varint `uint32`.
    fn read_uint32(&mut self) -> Result<u32>;
    /// Reads a zig-zag `sint32`.
    fn read_sint32(&mut self) -> Result<i32>;
    /// Reads a little-endian `fixed32`.
    fn read_fixed32(&mut self) -> Result<u32>;
    /// Reads a little-endian `sfixed32`.
    fn read_sfixed32(&mut self) -> Result<i32>;
    /// Reads a varint `int64`.
    fn read_int64(&mut self) -> Result<i64>;
    /// Reads a varint `uint64`.
    fn read_uint64(&mut self) -> Result<u64>;
    /// Reads a zig-zag `sint64`.
    fn read_sint64(&mut self) -> Result<i64>;
    /// Reads a little-endian `fixed64`.
    fn read_fixed64(&mut self) -> Result<u64>;
    /// Reads a little-endian `sfixed64`.
    fn read_sfixed64(&mut self) -> Result<i64>;
    /// Reads a `float`.
    fn read_float(&mut self) -> Result<f32>;
    /// Reads a `double`.
    fn read_double(&mut self) -> Result<f64>;
    /// Reads a varint boolean.
    fn read_bool(&mut self) -> Result<bool>;
    /// Reads an enum number.
    fn read_enum(&mut self) -> Result<i32>;
    /// Reads length-delimited UTF-8 text.
    fn read_string(&mut self) -> Result<String>;
    /// Reads length-delimited bytes.
    fn read_bytes(&mut self) -> Result<Vec<u8>>;
    /// Reads the object index following a `Reference` tag.
    fn read_reference(&mut self) -> Result<u32>;

    /// Enters the nested message of the current field, runs `merge` over it and
    /// leaves it.
    ///
    /// Both framings are accepted: a length-delimited payload or a start-group
    /// tag closed by the matching end-group tag.
    fn merge_nested(&mut self, merge: &mut dyn FnMut(&mut dyn Input) -> Result<()>) -> Result<()>;

    /// Copies the current length-delimited payload to `output` without decoding it.
    fn transfer_byte_range(
        &mut self,
        output: &mut dyn Output,
        utf8: bool,
        number: u32,
        repeated: bool,
    ) -> Result<()>;

    /// Graph resolver of this merge, when back-references are enabled.
    fn graph(&mut self) -> Option<&mut GraphResolver> {
        None
    }
}

/// [`Input`] over an in-memory buffer.
///
/// Limits are taken from [`config::current`] at construction and can be
/// overridden with [`with_limits`](ByteInput::with_limits).
#[derive(Debug)]
pub struct ByteInput<B = Bytes> {
    buf: B,
    pos: usize,
    limit: usize,
    last_tag: u32,
    groups: Vec<u32>,
    depth: usize,
    max_depth: usize,
    max_length: usize,
    graph: Option<GraphResolver>,
}

impl<B: AsRef<[u8]>> ByteInput<B> {
    /// Creates a cursor positioned at the start of `buf`.
    pub fn new(buf: B) -> Self {
        let cfg = config::current();
        let limit = buf.as_ref().len();
        Self {
            buf,
            pos: 0,
            limit,
            last_tag: 0,
            groups: Vec::new(),
            depth: 0,
            max_depth: cfg.max_depth,
            max_length: cfg.max_length,
            graph: None,
        }
    }

    /// Enables back-reference resolution for polymorphic values.
    pub fn with_graph(mut self) -> Self {
        self.graph = Some(GraphResolver::new());
        self
    }

    /// Overrides the nesting and length limits.
    pub fn with_limits(mut self, max_depth: usize, max_length: usize) -> Self {
        self.max_depth = max_depth;
        self.max_length = max_length;
        self
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns `true` once every byte of the buffer was consumed.
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.buf.as_ref().len()
    }

    /// Consumes the cursor, returning its graph resolver if one was enabled.
    pub fn into_graph(self) -> Option<GraphResolver> {
        self.graph
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.limit)
            .ok_or(WireError::Truncated)?;
        let start = self.pos;
        self.pos = end;
        Ok(&self.buf.as_ref()[start..end])
    }

    fn read_raw_varint64(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            if self.pos >= self.limit {
                return Err(WireError::Truncated.into());
            }
            let byte = self.buf.as_ref()[self.pos];
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(WireError::MalformedVarint.into())
    }

    fn read_raw_fixed32(&mut self) -> Result<u32> {
        let chunk = self.take(4)?;
        let raw: [u8; 4] = chunk.try_into().map_err(|_| WireError::Truncated)?;
        Ok(u32::from_le_bytes(raw))
    }

    fn read_raw_fixed64(&mut self) -> Result<u64> {
        let chunk = self.take(8)?;
        let raw: [u8; 8] = chunk.try_into().map_err(|_| WireError::Truncated)?;
        Ok(u64::from_le_bytes(raw))
    }

    fn read_length(&mut self) -> Result<usize> {
        let len = self.read_raw_varint64()?;
        usize::try_from(len)
            .ok()
            .filter(|len| *len <= self.max_length)
            .ok_or_else(|| {
                WireError::LengthTooLarge {
                    len,
                    max: self.max_length,
                }
                .into()
            })
    }

    fn expect(&self, wire_type: WireType, expected: &'static str) -> Result<()> {
        let found = self.last_wire_type();
        if found == Some(wire_type) {
            Ok(())
        } else {
            Err(WireError::UnexpectedWireType { expected, found }.into())
        }
    }

    fn varint(&mut self) -> Result<u64> {
        self.expect(WireType::Varint, "varint")?;
        self.read_raw_varint64()
    }

    fn fixed32(&mut self) -> Result<u32> {
        self.expect(WireType::Fixed32, "fixed32")?;
        self.read_raw_fixed32()
    }

    fn fixed64(&mut self) -> Result<u64> {
        self.expect(WireType::Fixed64, "fixed64")?;
        self.read_raw_fixed64()
    }

    fn delimited(&mut self) -> Result<&[u8]> {
        self.expect(WireType::LengthDelimited, "length-delimited")?;
        let len = self.read_length()?;
        self.take(len)
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(CodecError::DepthLimitExceeded(self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    fn skip_group(&mut self, number: u32) -> Result<()> {
        self.enter()?;
        self.groups.push(number);
        let result = loop {
            match self.read_field_number() {
                Ok(0) => break Ok(()),
                Ok(_) => {
                    if let Err(err) = self.skip_field() {
                        break Err(err);
                    }
                }
                Err(err) => break Err(err),
            }
        };
        self.groups.pop();
        self.depth -= 1;
        result?;
        self.expect_group_closed(number)
    }

    fn expect_group_closed(&self, number: u32) -> Result<()> {
        if self.last_tag == make_tag(number, WireType::EndGroup) {
            Ok(())
        } else {
            Err(WireError::Truncated.into())
        }
    }
}

impl<B: AsRef<[u8]>> Input for ByteInput<B> {
    fn read_field_number(&mut self) -> Result<u32> {
        if self.pos >= self.limit {
            self.last_tag = 0;
            return Ok(0);
        }
        let raw = self.read_raw_varint64()?;
        let tag = u32::try_from(raw).map_err(|_| WireError::MalformedVarint)?;
        let Some(wire_type) = tag_wire_type(tag) else {
            return Err(WireError::InvalidWireType(tag & 0x7).into());
        };
        let number = tag_number(tag);
        if number == 0 || number > MAX_FIELD_NUMBER {
            return Err(WireError::InvalidFieldNumber(number).into());
        }
        self.last_tag = tag;
        if wire_type == WireType::EndGroup {
            let open = self.groups.last().copied();
            if open != Some(number) {
                return Err(WireError::UnmatchedEndGroup {
                    expected: open,
                    found: number,
                }
                .into());
            }
            return Ok(0);
        }
        Ok(number)
    }

    fn last_wire_type(&self) -> Option<WireType> {
        if self.last_tag == 0 {
            None
        } else {
            tag_wire_type(self.last_tag)
        }
    }

    fn skip_field(&mut self) -> Result<()> {
        match self.last_wire_type() {
            Some(WireType::Varint | WireType::Reference) => {
                self.read_raw_varint64()?;
            }
            Some(WireType::Fixed64) => {
                self.take(8)?;
            }
            Some(WireType::Fixed32) => {
                self.take(4)?;
            }
            Some(WireType::LengthDelimited) => {
                let len = self.read_length()?;
                self.take(len)?;
            }
            Some(WireType::StartGroup) => {
                self.skip_group(tag_number(self.last_tag))?;
            }
            found @ (Some(WireType::EndGroup) | None) => {
                return Err(WireError::UnexpectedWireType {
                    expected: "skippable field",
                    found,
                }
                .into());
            }
        }
        Ok(())
    }

    fn read_int32(&mut self) -> Result<i32> {
        Ok(self.varint()? as i32)
    }

    fn read_uint32(&mut self) -> Result<u32> {
        Ok(self.varint()? as u32)
    }

    fn read_sint32(&mut self) -> Result<i32> {
        Ok(super::decode_zigzag32(self.varint()? as u32))
    }

    fn read_fixed32(&mut self) -> Result<u32> {
        self.fixed32()
    }

    fn read_sfixed32(&mut self) -> Result<i32> {
        Ok(self.fixed32()? as i32)
    }

    fn read_int64(&mut self) -> Result<i64> {
        Ok(self.varint()? as i64)
    }

    fn read_uint64(&mut self) -> Result<u64> {
        self.varint()
    }

    fn read_sint64(&mut self) -> Result<i64> {
        Ok(super::decode_zigzag64(self.varint()?))
    }

    fn read_fixed64(&mut self) -> Result<u64> {
        self.fixed64()
    }

    fn read_sfixed64(&mut self) -> Result<i64> {
        Ok(self.fixed64()? as i64)
    }

    fn read_float(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.fixed32()?))
    }

    fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.fixed64()?))
    }

    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.varint()? != 0)
    }

    fn read_enum(&mut self) -> Result<i32> {
        Ok(self.varint()? as i32)
    }

    fn read_string(&mut self) -> Result<String> {
        let bytes = self.delimited()?;
        str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8.into())
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>> {
        Ok(self.delimited()?.to_vec())
    }

    fn read_reference(&mut self) -> Result<u32> {
        self.expect(WireType::Reference, "reference")?;
        let raw = self.read_raw_varint64()?;
        u32::try_from(raw).map_err(|_| WireError::MalformedVarint.into())
    }

    fn merge_nested(&mut self, merge: &mut dyn FnMut(&mut dyn Input) -> Result<()>) -> Result<()> {
        match self.last_wire_type() {
            Some(WireType::LengthDelimited) => {
                let len = self.read_length()?;
                let end = self
                    .pos
                    .checked_add(len)
                    .filter(|end| *end <= self.limit)
                    .ok_or(WireError::Truncated)?;
                self.enter()?;
                let outer_limit = std::mem::replace(&mut self.limit, end);
                // Groups opened outside a length-delimited payload cannot close inside it.
                let outer_groups = std::mem::take(&mut self.groups);
                let result = merge(self);
                self.groups = outer_groups;
                let consumed = self.pos == end;
                self.limit = outer_limit;
                self.depth -= 1;
                result?;
                if consumed {
                    Ok(())
                } else {
                    Err(WireError::MisreportedLength.into())
                }
            }
            Some(WireType::StartGroup) => {
                let number = tag_number(self.last_tag);
                self.enter()?;
                self.groups.push(number);
                let result = merge(self);
                self.groups.pop();
                self.depth -= 1;
                result?;
                self.expect_group_closed(number)
            }
            found => Err(WireError::UnexpectedWireType {
                expected: "nested message",
                found,
            }
            .into()),
        }
    }

    fn transfer_byte_range(
        &mut self,
        output: &mut dyn Output,
        utf8: bool,
        number: u32,
        repeated: bool,
    ) -> Result<()> {
        let bytes = self.delimited()?;
        output.write_byte_range(utf8, number, bytes, repeated)
    }

    fn graph(&mut self) -> Option<&mut GraphResolver> {
        self.graph.as_mut()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn reads_classic_protobuf_varint_field() {
        // field 1, varint 150
        let mut input = ByteInput::new(&[0x08u8, 0x96, 0x01][..]);
        assert_eq!(input.read_field_number().unwrap(), 1);
        assert_eq!(input.last_wire_type(), Some(WireType::Varint));
        assert_eq!(input.read_int32().unwrap(), 150);
        assert_eq!(input.read_field_number().unwrap(), 0);
        assert!(input.is_at_end());
    }

    #[test]
    fn reads_string_field() {
        // field 2, "testing"
        let bytes = [0x12u8, 0x07, b't', b'e', b's', b't', b'i', b'n', b'g'];
        let mut input = ByteInput::new(&bytes[..]);
        assert_eq!(input.read_field_number().unwrap(), 2);
        assert_eq!(input.read_string().unwrap(), "testing");
    }

    #[test]
    fn truncated_length_is_an_integrity_error() {
        let bytes = [0x12u8, 0x05, b'a'];
        let mut input = ByteInput::new(&bytes[..]);
        input.read_field_number().unwrap();
        assert!(matches!(
            input.read_string(),
            Err(CodecError::Wire(WireError::Truncated))
        ));
    }

    #[test]
    fn field_number_zero_is_rejected() {
        let mut input = ByteInput::new(&[0x00u8, 0x01][..]);
        assert!(matches!(
            input.read_field_number(),
            Err(CodecError::Wire(WireError::InvalidFieldNumber(0)))
        ));
    }

    #[test]
    fn wire_type_seven_is_rejected() {
        let mut input = ByteInput::new(&[0x0fu8][..]);
        assert!(matches!(
            input.read_field_number(),
            Err(CodecError::Wire(WireError::InvalidWireType(7)))
        ));
    }

    #[test]
    fn overlong_varint_is_malformed() {
        let mut bytes = vec![0x08u8];
        bytes.extend(std::iter::repeat_n(0xffu8, 11));
        let mut input = ByteInput::new(&bytes[..]);
        input.read_field_number().unwrap();
        assert!(matches!(
            input.read_int64(),
            Err(CodecError::Wire(WireError::MalformedVarint))
        ));
    }

    #[test]
    fn reading_with_the_wrong_wire_type_fails() {
        let mut input = ByteInput::new(&[0x08u8, 0x01][..]);
        input.read_field_number().unwrap();
        assert!(matches!(
            input.read_string(),
            Err(CodecError::Wire(WireError::UnexpectedWireType { .. }))
        ));
    }

    #[test]
    fn stray_end_group_is_rejected() {
        // end group for field 1 with no open group
        let mut input = ByteInput::new(&[0x0cu8][..]);
        assert!(matches!(
            input.read_field_number(),
            Err(CodecError::Wire(WireError::UnmatchedEndGroup {
                expected: None,
                found: 1
            }))
        ));
    }

    #[test]
    fn merge_nested_accepts_both_framings() {
        // field 3 length-delimited { field 1 = 5 }, then field 4 group { field 1 = 6 }
        let bytes = [0x1au8, 0x02, 0x08, 0x05, 0x23, 0x08, 0x06, 0x24];
        let mut input = ByteInput::new(&bytes[..]);
        let mut seen = Vec::new();
        while input.read_field_number().unwrap() != 0 {
            input
                .merge_nested(&mut |inner| {
                    while inner.read_field_number()? != 0 {
                        seen.push(inner.read_int32()?);
                    }
                    Ok(())
                })
                .unwrap();
        }
        assert_eq!(seen, [5, 6]);
        assert!(input.is_at_end());
    }

    #[test]
    fn unterminated_group_is_truncated() {
        let bytes = [0x23u8, 0x08, 0x06];
        let mut input = ByteInput::new(&bytes[..]);
        input.read_field_number().unwrap();
        let result = input.merge_nested(&mut |inner| {
            while inner.read_field_number()? != 0 {
                inner.skip_field()?;
            }
            Ok(())
        });
        assert!(matches!(result, Err(CodecError::Wire(WireError::Truncated))));
    }

    #[test]
    fn skip_field_handles_every_wire_type() {
        let bytes = [
            0x08, 0x01, // varint
            0x11, 0, 0, 0, 0, 0, 0, 0, 0, // fixed64
            0x1a, 0x01, 0xff, // length-delimited
            0x23, 0x08, 0x01, 0x24, // group 4 { field 1 }
            0x2d, 0, 0, 0, 0, // fixed32
            0x36, 0x02, // reference
        ];
        let mut input = ByteInput::new(&bytes[..]);
        let mut skipped = 0;
        while input.read_field_number().unwrap() != 0 {
            input.skip_field().unwrap();
            skipped += 1;
        }
        assert_eq!(skipped, 6);
        assert!(input.is_at_end());
    }

    #[test]
    fn nesting_depth_is_bounded() {
        // field 1 group, nested three times
        let bytes = [0x0bu8, 0x0b, 0x0b, 0x0c, 0x0c, 0x0c];
        let mut input = ByteInput::new(&bytes[..]).with_limits(2, 1024);
        input.read_field_number().unwrap();
        assert!(matches!(
            input.skip_field(),
            Err(CodecError::DepthLimitExceeded(2))
        ));
    }

    #[test]
    fn oversized_length_is_rejected() {
        let bytes = [0x0au8, 0x10];
        let mut input = ByteInput::new(&bytes[..]).with_limits(8, 4);
        input.read_field_number().unwrap();
        assert!(matches!(
            input.read_bytes(),
            Err(CodecError::Wire(WireError::LengthTooLarge { len: 16, max: 4 }))
        ));
    }
}
