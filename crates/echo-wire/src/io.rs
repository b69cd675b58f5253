// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Convenience entry points over buffers and `std::io` streams.

use std::io::{self, Read, Write};

use bytes::Bytes;

use crate::config;
use crate::error::{CodecError, Result};
use crate::pipe::{BytesSource, Pipe, PipeSchema};
use crate::runtime::RuntimeSchema;
use crate::schema::{Message, Schema};
use crate::wire::{encode_varint, ByteInput, ByteOutput, Format, WireError};

/// Encodes `message`; shared polymorphic objects are written in full and
/// cycles fail with [`CodecError::CyclicReference`].
pub fn to_bytes<T: Message>(message: &T, format: Format) -> Result<Bytes> {
    let mut output = ByteOutput::new(format);
    RuntimeSchema::<T>::get()?.write_to(&mut output, message)?;
    Ok(output.into_bytes())
}

/// Encodes `message` in graph mode: each polymorphic object is written once
/// and referenced afterwards.
pub fn to_graph_bytes<T: Message>(message: &T, format: Format) -> Result<Bytes> {
    let mut output = ByteOutput::new(format).with_graph();
    RuntimeSchema::<T>::get()?.write_to(&mut output, message)?;
    Ok(output.into_bytes())
}

/// Decodes a message written by [`to_bytes`], in either format.
pub fn from_bytes<T: Message>(bytes: &[u8]) -> Result<T> {
    let mut message = T::default();
    merge_from_bytes(bytes, &mut message)?;
    Ok(message)
}

/// Decodes a message written by [`to_graph_bytes`], resolving back-references
/// to shared instances.
pub fn from_graph_bytes<T: Message>(bytes: &[u8]) -> Result<T> {
    let mut message = T::default();
    let mut input = ByteInput::new(bytes).with_graph();
    RuntimeSchema::<T>::get()?.merge_from(&mut input, &mut message)?;
    Ok(message)
}

/// Merges an encoded message into `message`.
pub fn merge_from_bytes<T: Message>(bytes: &[u8], message: &mut T) -> Result<()> {
    let mut input = ByteInput::new(bytes);
    RuntimeSchema::<T>::get()?.merge_from(&mut input, message)
}

/// Re-encodes an encoded `T` into `format` through a [`Pipe`], without decoding it.
pub fn transcode<T: Message>(bytes: impl Into<Bytes>, format: Format) -> Result<Bytes> {
    let schema = PipeSchema::of::<T>()?;
    let mut pipe = Pipe::new(BytesSource::new(bytes));
    let mut output = ByteOutput::new(format);
    pipe.write_to(&mut output, &schema)?;
    Ok(output.into_bytes())
}

/// Writes `message` prefixed with its varint length; returns the bytes written.
pub fn write_delimited_to<T: Message, W: Write>(
    writer: &mut W,
    message: &T,
    format: Format,
) -> Result<usize> {
    let body = to_bytes(message, format)?;
    let mut prefix = Vec::with_capacity(10);
    encode_varint(body.len() as u64, &mut prefix);
    writer.write_all(&prefix)?;
    writer.write_all(&body)?;
    Ok(prefix.len() + body.len())
}

/// Merges one length-prefixed message from `reader`; returns `false` at a clean
/// end of stream.
pub fn merge_delimited_from<T: Message, R: Read>(reader: &mut R, message: &mut T) -> Result<bool> {
    let Some(body) = read_length_prefix(reader)? else {
        return Ok(false);
    };
    let mut input = ByteInput::new(body);
    RuntimeSchema::<T>::get()?.merge_from(&mut input, message)?;
    Ok(true)
}

/// Reads a varint length and that many bytes; `None` at end of stream before the prefix.
pub(crate) fn read_length_prefix<R: Read>(reader: &mut R) -> Result<Option<Bytes>> {
    let mut len = 0u64;
    let mut shift = 0;
    loop {
        let mut byte = [0u8; 1];
        match reader.read_exact(&mut byte) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                if shift == 0 {
                    return Ok(None);
                }
                return Err(WireError::Truncated.into());
            }
            Err(err) => return Err(err.into()),
        }
        len |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 64 {
            return Err(WireError::MalformedVarint.into());
        }
    }
    let max = config::current().max_length;
    let len = usize::try_from(len)
        .ok()
        .filter(|len| *len <= max)
        .ok_or(WireError::LengthTooLarge { len, max })?;
    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => CodecError::from(WireError::Truncated),
            _ => CodecError::from(err),
        })?;
    Ok(Some(Bytes::from(body)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn length_prefix_reads_one_message_then_reports_end() {
        let data = [0x02u8, 0x08, 0x01];
        let mut reader = &data[..];
        let body = read_length_prefix(&mut reader).unwrap().unwrap();
        assert_eq!(&body[..], [0x08, 0x01]);
        assert!(read_length_prefix(&mut reader).unwrap().is_none());
    }

    #[test]
    fn short_body_is_truncated() {
        let data = [0x05u8, 0x08];
        let mut reader = &data[..];
        assert!(matches!(
            read_length_prefix(&mut reader),
            Err(CodecError::Wire(WireError::Truncated))
        ));
    }

    /// Yields one byte per call, reporting `Interrupted` before each.
    struct Stuttering<'a> {
        data: &'a [u8],
        interrupt: bool,
    }

    impl Read for Stuttering<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(io::ErrorKind::Interrupted.into());
            }
            let Some((first, rest)) = self.data.split_first() else {
                return Ok(0);
            };
            buf[0] = *first;
            self.data = rest;
            Ok(1)
        }
    }

    #[test]
    fn interrupted_reads_are_retried() {
        // A two-byte prefix (130) ahead of the body.
        let mut stream = vec![0x82u8, 0x01];
        stream.extend([0x08u8; 130]);
        let mut reader = Stuttering {
            data: &stream,
            interrupt: false,
        };
        let body = read_length_prefix(&mut reader).unwrap().unwrap();
        assert_eq!(body.len(), 130);
        assert!(read_length_prefix(&mut reader).unwrap().is_none());
    }

    #[test]
    fn prefix_cut_mid_varint_is_truncated() {
        let data = [0x80u8];
        let mut reader = &data[..];
        assert!(matches!(
            read_length_prefix(&mut reader),
            Err(CodecError::Wire(WireError::Truncated))
        ));
    }
}
