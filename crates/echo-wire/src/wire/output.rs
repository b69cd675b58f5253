// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Write side of the wire primitives.

use bytes::Bytes;

use super::{encode_varint, encode_zigzag32, encode_zigzag64, make_tag, Format, WireType};
use crate::config;
use crate::error::{CodecError, Result};
use crate::graph::ObjectTracker;

/// Sink for tagged field occurrences.
///
/// `repeated` marks occurrences that belong to a collection field. The binary
/// encodings ignore it; it exists for sinks that render collections differently.
pub trait Output {
    /// Framing this sink uses for nested messages.
    fn format(&self) -> Format;

    /// Writes a varint `int32` (negative values take ten bytes).
    fn write_int32(&mut self, number: u32, value: i32, repeated: bool) -> Result<()>;
    /// Writes a varint `uint32`.
    fn write_uint32(&mut self, number: u32, value: u32, repeated: bool) -> Result<()>;
    /// Writes a zig-zag `sint32`.
    fn write_sint32(&mut self, number: u32, value: i32, repeated: bool) -> Result<()>;
    /// Writes a little-endian `fixed32`.
    fn write_fixed32(&mut self, number: u32, value: u32, repeated: bool) -> Result<()>;
    /// Writes a little-endian `sfixed32`.
    fn write_sfixed32(&mut self, number: u32, value: i32, repeated: bool) -> Result<()>;
    /// Writes a varint `int64`.
    fn write_int64(&mut self, number: u32, value: i64, repeated: bool) -> Result<()>;
    /// Writes a varint `uint64`.
    fn write_uint64(&mut self, number: u32, value: u64, repeated: bool) -> Result<()>;
    /// Writes a zig-zag `sint64`.
    fn write_sint64(&mut self, number: u32, value: i64, repeated: bool) -> Result<()>;
    /// Writes a little-endian `fixed64`.
    fn write_fixed64(&mut self, number: u32, value: u64, repeated: bool) -> Result<()>;
    /// Writes a little-endian `sfixed64`.
    fn write_sfixed64(&mut self, number: u32, value: i64, repeated: bool) -> Result<()>;
    /// Writes a `float`.
    fn write_float(&mut self, number: u32, value: f32, repeated: bool) -> Result<()>;
    /// Writes a `double`.
    fn write_double(&mut self, number: u32, value: f64, repeated: bool) -> Result<()>;
    /// Writes a varint boolean.
    fn write_bool(&mut self, number: u32, value: bool, repeated: bool) -> Result<()>;
    /// Writes an enum number.
    fn write_enum(&mut self, number: u32, value: i32, repeated: bool) -> Result<()>;
    /// Writes length-delimited UTF-8 text.
    fn write_string(&mut self, number: u32, value: &str, repeated: bool) -> Result<()>;
    /// Writes length-delimited bytes.
    fn write_bytes(&mut self, number: u32, value: &[u8], repeated: bool) -> Result<()>;

    /// Writes an already-encoded length-delimited payload; `utf8` says whether it
    /// is text.
    fn write_byte_range(
        &mut self,
        utf8: bool,
        number: u32,
        value: &[u8],
        repeated: bool,
    ) -> Result<()>;

    /// Writes a back-reference to the object with the given index.
    fn write_reference(&mut self, number: u32, index: u32, repeated: bool) -> Result<()>;

    /// Writes a nested message whose fields are produced by `write`.
    fn write_nested(
        &mut self,
        number: u32,
        repeated: bool,
        write: &mut dyn FnMut(&mut dyn Output) -> Result<()>,
    ) -> Result<()>;

    /// Identity tracker for polymorphic objects written to this sink.
    fn tracker(&mut self) -> &mut ObjectTracker;
}

/// [`Output`] accumulating into a byte buffer.
#[derive(Debug)]
pub struct ByteOutput {
    buf: Vec<u8>,
    format: Format,
    depth: usize,
    max_depth: usize,
    tracker: ObjectTracker,
}

impl ByteOutput {
    /// Creates an empty sink in tree mode.
    pub fn new(format: Format) -> Self {
        Self {
            buf: Vec::new(),
            format,
            depth: 0,
            max_depth: config::current().max_depth,
            tracker: ObjectTracker::tree(),
        }
    }

    /// Switches to graph mode: repeated polymorphic objects become references.
    pub fn with_graph(mut self) -> Self {
        self.tracker = ObjectTracker::graph();
        self
    }

    /// Overrides the nesting limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consumes the sink, returning the encoded bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    /// Consumes the sink, returning the encoded bytes as [`Bytes`].
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buf)
    }

    fn tag(&mut self, number: u32, wire_type: WireType) {
        encode_varint(u64::from(make_tag(number, wire_type)), &mut self.buf);
    }

    fn varint(&mut self, number: u32, value: u64) {
        self.tag(number, WireType::Varint);
        encode_varint(value, &mut self.buf);
    }

    fn fixed32(&mut self, number: u32, value: u32) {
        self.tag(number, WireType::Fixed32);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn fixed64(&mut self, number: u32, value: u64) {
        self.tag(number, WireType::Fixed64);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn delimited(&mut self, number: u32, value: &[u8]) {
        self.tag(number, WireType::LengthDelimited);
        encode_varint(value.len() as u64, &mut self.buf);
        self.buf.extend_from_slice(value);
    }
}

impl Default for ByteOutput {
    fn default() -> Self {
        Self::new(Format::default())
    }
}

impl Output for ByteOutput {
    fn format(&self) -> Format {
        self.format
    }

    fn write_int32(&mut self, number: u32, value: i32, _repeated: bool) -> Result<()> {
        // Sign-extended so negative values read back as int64 too.
        self.varint(number, i64::from(value) as u64);
        Ok(())
    }

    fn write_uint32(&mut self, number: u32, value: u32, _repeated: bool) -> Result<()> {
        self.varint(number, u64::from(value));
        Ok(())
    }

    fn write_sint32(&mut self, number: u32, value: i32, _repeated: bool) -> Result<()> {
        self.varint(number, u64::from(encode_zigzag32(value)));
        Ok(())
    }

    fn write_fixed32(&mut self, number: u32, value: u32, _repeated: bool) -> Result<()> {
        self.fixed32(number, value);
        Ok(())
    }

    fn write_sfixed32(&mut self, number: u32, value: i32, _repeated: bool) -> Result<()> {
        self.fixed32(number, value as u32);
        Ok(())
    }

    fn write_int64(&mut self, number: u32, value: i64, _repeated: bool) -> Result<()> {
        self.varint(number, value as u64);
        Ok(())
    }

    fn write_uint64(&mut self, number: u32, value: u64, _repeated: bool) -> Result<()> {
        self.varint(number, value);
        Ok(())
    }

    fn write_sint64(&mut self, number: u32, value: i64, _repeated: bool) -> Result<()> {
        self.varint(number, encode_zigzag64(value));
        Ok(())
    }

    fn write_fixed64(&mut self, number: u32, value: u64, _repeated: bool) -> Result<()> {
        self.fixed64(number, value);
        Ok(())
    }

    fn write_sfixed64(&mut self, number: u32, value: i64, _repeated: bool) -> Result<()> {
        self.fixed64(number, value as u64);
        Ok(())
    }

    fn write_float(&mut self, number: u32, value: f32, _repeated: bool) -> Result<()> {
        self.fixed32(number, value.to_bits());
        Ok(())
    }

    fn write_double(&mut self, number: u32, value: f64, _repeated: bool) -> Result<()> {
        self.fixed64(number, value.to_bits());
        Ok(())
    }

    fn write_bool(&mut self, number: u32, value: bool, _repeated: bool) -> Result<()> {
        self.varint(number, u64::from(value));
        Ok(())
    }

    fn write_enum(&mut self, number: u32, value: i32, repeated: bool) -> Result<()> {
        self.write_int32(number, value, repeated)
    }

    fn write_string(&mut self, number: u32, value: &str, _repeated: bool) -> Result<()> {
        self.delimited(number, value.as_bytes());
        Ok(())
    }

    fn write_bytes(&mut self, number: u32, value: &[u8], _repeated: bool) -> Result<()> {
        self.delimited(number, value);
        Ok(())
    }

    fn write_byte_range(
        &mut self,
        _utf8: bool,
        number: u32,
        value: &[u8],
        _repeated: bool,
    ) -> Result<()> {
        self.delimited(number, value);
        Ok(())
    }

    fn write_reference(&mut self, number: u32, index: u32, _repeated: bool) -> Result<()> {
        self.tag(number, WireType::Reference);
        encode_varint(u64::from(index), &mut self.buf);
        Ok(())
    }

    fn write_nested(
        &mut self,
        number: u32,
        _repeated: bool,
        write: &mut dyn FnMut(&mut dyn Output) -> Result<()>,
    ) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(CodecError::DepthLimitExceeded(self.max_depth));
        }
        self.depth += 1;
        let result = match self.format {
            Format::Protobuf => {
                let outer = std::mem::take(&mut self.buf);
                let result = write(self);
                let inner = std::mem::replace(&mut self.buf, outer);
                if result.is_ok() {
                    self.delimited(number, &inner);
                }
                result
            }
            Format::Grouped => {
                self.tag(number, WireType::StartGroup);
                let result = write(self);
                if result.is_ok() {
                    self.tag(number, WireType::EndGroup);
                }
                result
            }
        };
        self.depth -= 1;
        result
    }

    fn tracker(&mut self) -> &mut ObjectTracker {
        &mut self.tracker
    }
}
