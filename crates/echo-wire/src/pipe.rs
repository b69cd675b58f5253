// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Streaming transcoder: copies an encoded record from one input to another
//! output encoding field by field, without materializing the record.
//!
//! A [`Pipe`] owns a [`PipeSource`] and runs one session per
//! [`write_to`](Pipe::write_to) call:
//!
//! ```text
//! Idle --begin--> Active --transfer done or failed--> Closing --end--> Idle
//! ```
//!
//! `end` runs exactly once per session that `begin` opened, with
//! `cleanup_only` set when the transfer failed or the message was empty.
//! Nested records are copied inside the same session through
//! [`Input::merge_nested`]; they never open a session of their own.
//!
//! Graph indices are copied unchanged. Unknown fields are dropped, so a
//! back-reference to an object inside one fails with
//! [`CodecError::DanglingReference`] rather than pointing elsewhere.

use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{instrument, trace, warn};

use crate::error::{CodecError, Result};
use crate::io::read_length_prefix;
use crate::registry;
use crate::runtime::RuntimeSchema;
use crate::schema::{ErasedSchema, Message};
use crate::field::polymorphic;
use crate::wire::{ByteInput, Input, Output, OBJECT_INDEX_FIELD_NUMBER, TYPE_FIELD_NUMBER};

/// Session state of a [`Pipe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipeState {
    /// No session bound.
    #[default]
    Idle,
    /// Input and output bound; fields are being copied.
    Active,
    /// The source is releasing the session's resources.
    Closing,
}

/// Pass-through schema driving a transfer.
///
/// No record is materialized, so [`is_initialized`](PipeSchema::is_initialized)
/// always reports `true`.
#[derive(Debug, Clone)]
pub struct PipeSchema {
    inner: Arc<dyn ErasedSchema>,
}

impl PipeSchema {
    /// Wraps an erased schema.
    pub fn new(inner: Arc<dyn ErasedSchema>) -> Self {
        Self { inner }
    }

    /// Pipe schema of `T`.
    pub fn of<T: Message>() -> Result<Self> {
        let inner: Arc<dyn ErasedSchema> = RuntimeSchema::<T>::get()?;
        Ok(Self::new(inner))
    }

    /// Pipe schema of the type registered under `name`.
    pub fn named(name: &str) -> Result<Self> {
        registry::lookup(name).map(Self::new)
    }

    /// Short name of the piped record type.
    pub fn message_name(&self) -> &'static str {
        self.inner.message_name()
    }

    /// Fully qualified name of the piped record type.
    pub fn message_full_name(&self) -> &'static str {
        self.inner.message_full_name()
    }

    /// Name of the field with the given tag.
    pub fn field_name(&self, number: u32) -> Result<&'static str> {
        self.inner.field_name(number)
    }

    /// Tag of the field with the given name.
    pub fn field_number(&self, name: &str) -> Result<u32> {
        self.inner.field_number(name)
    }

    /// Always `true`: nothing is materialized to check.
    #[allow(clippy::unused_self)]
    pub fn is_initialized(&self) -> bool {
        true
    }

    /// The wrapped schema.
    pub fn schema(&self) -> &dyn ErasedSchema {
        &*self.inner
    }
}

/// Provider of the input a [`Pipe`] session reads from.
pub trait PipeSource {
    /// Opens the input for one message of `schema`; `None` means the message is empty.
    fn begin(&mut self, schema: &PipeSchema) -> Result<Option<Box<dyn Input>>>;

    /// Releases the input opened by [`begin`](PipeSource::begin).
    ///
    /// `cleanup_only` is set when the transfer failed or nothing was
    /// transferred; only failures to release resources should be reported then.
    fn end(
        &mut self,
        schema: &PipeSchema,
        input: Option<Box<dyn Input>>,
        cleanup_only: bool,
    ) -> Result<()>;
}

impl<S: PipeSource + ?Sized> PipeSource for &mut S {
    fn begin(&mut self, schema: &PipeSchema) -> Result<Option<Box<dyn Input>>> {
        (**self).begin(schema)
    }

    fn end(
        &mut self,
        schema: &PipeSchema,
        input: Option<Box<dyn Input>>,
        cleanup_only: bool,
    ) -> Result<()> {
        (**self).end(schema, input, cleanup_only)
    }
}

/// Context of one pipe session, threaded through every field transfer.
#[derive(Debug, Default)]
pub struct PipeSession {
    fields: usize,
    objects: HashSet<u32>,
}

impl PipeSession {
    /// Field occurrences copied so far, nested ones included.
    pub fn fields_transferred(&self) -> usize {
        self.fields
    }

    pub(crate) fn record_field(&mut self) {
        self.fields += 1;
    }

    /// Returns `true` if the object with this graph index was copied in this session.
    pub fn has_object(&self, index: u32) -> bool {
        self.objects.contains(&index)
    }

    /// Copies the nested record of the current field, framed for `output`,
    /// by re-entering `schema`'s transfer inside the input's nested message.
    pub fn transfer_nested(
        &mut self,
        schema: &dyn ErasedSchema,
        input: &mut dyn Input,
        output: &mut dyn Output,
        number: u32,
        repeated: bool,
    ) -> Result<()> {
        output.write_nested(number, repeated, &mut |nested_out| {
            input.merge_nested(&mut |nested_in| schema.transfer(self, nested_in, nested_out))
        })
    }

    /// Copies the body of a polymorphic value: its graph index, its
    /// discriminator, then the fields of the type it names.
    pub(crate) fn transfer_polymorphic(
        &mut self,
        input: &mut dyn Input,
        output: &mut dyn Output,
    ) -> Result<()> {
        let (index, name) = polymorphic::read_header(input)?;
        let schema = registry::lookup(&name)?;
        if let Some(index) = index {
            if !self.objects.insert(index) {
                return Err(CodecError::DuplicateObjectIndex(index));
            }
            output.write_uint32(OBJECT_INDEX_FIELD_NUMBER, index, false)?;
        }
        output.write_string(TYPE_FIELD_NUMBER, &name, false)?;
        schema.transfer(self, input, output)
    }
}

/// Streaming transcoder bound to one [`PipeSource`].
///
/// Not shareable between concurrent transfers; `write_to` takes `&mut self`.
#[derive(Debug)]
pub struct Pipe<S> {
    source: S,
    state: PipeState,
}

impl<S: PipeSource> Pipe<S> {
    /// Creates an idle pipe over `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: PipeState::Idle,
        }
    }

    /// Current session state; `Idle` between calls.
    pub fn state(&self) -> PipeState {
        self.state
    }

    /// The underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Consumes the pipe, returning its source.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Copies one message of `schema` from the source to `output`.
    ///
    /// If the transfer fails, the source's `end` still runs (cleanup only)
    /// before the error is returned; a cleanup failure in that path is logged
    /// and the transfer error wins.
    #[instrument(skip_all, fields(record = schema.message_full_name()))]
    pub fn write_to(&mut self, output: &mut dyn Output, schema: &PipeSchema) -> Result<()> {
        let opened = match self.source.begin(schema) {
            Ok(opened) => opened,
            Err(err) => {
                self.state = PipeState::Idle;
                return Err(err);
            }
        };
        self.transition(PipeState::Active);

        let (input, result) = match opened {
            None => {
                trace!("empty message");
                (None, None)
            }
            Some(mut input) => {
                let mut session = PipeSession::default();
                let result = schema.schema().transfer(&mut session, input.as_mut(), output);
                trace!(fields = session.fields_transferred(), ok = result.is_ok(), "transfer finished");
                (Some(input), Some(result))
            }
        };

        self.transition(PipeState::Closing);
        let cleanup_only = !matches!(result, Some(Ok(())));
        let ended = self.source.end(schema, input, cleanup_only);
        self.transition(PipeState::Idle);

        match (result.unwrap_or(Ok(())), ended) {
            (Ok(()), ended) => ended,
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(cleanup)) => {
                warn!(?cleanup, "pipe cleanup failed after transfer error");
                Err(err)
            }
        }
    }

    fn transition(&mut self, next: PipeState) {
        trace!(from = ?self.state, to = ?next, "pipe state");
        self.state = next;
    }
}

/// Source reading one message from an in-memory buffer; an empty buffer is an
/// empty message.
#[derive(Debug, Clone)]
pub struct BytesSource {
    data: Bytes,
}

impl BytesSource {
    /// Source over `data`.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl PipeSource for BytesSource {
    fn begin(&mut self, _schema: &PipeSchema) -> Result<Option<Box<dyn Input>>> {
        if self.data.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(ByteInput::new(self.data.clone()))))
    }

    fn end(
        &mut self,
        _schema: &PipeSchema,
        input: Option<Box<dyn Input>>,
        _cleanup_only: bool,
    ) -> Result<()> {
        drop(input);
        Ok(())
    }
}

/// Source reading varint-length-prefixed messages from a stream, one per session.
///
/// A clean end of stream before the prefix is an empty message.
#[derive(Debug)]
pub struct DelimitedSource<R> {
    reader: R,
    completed: u64,
}

impl<R: Read> DelimitedSource<R> {
    /// Source over `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            completed: 0,
        }
    }

    /// Sessions that ended after a clean transfer.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Consumes the source, returning the reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> PipeSource for DelimitedSource<R> {
    fn begin(&mut self, _schema: &PipeSchema) -> Result<Option<Box<dyn Input>>> {
        let Some(message) = read_length_prefix(&mut self.reader)? else {
            return Ok(None);
        };
        if message.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(ByteInput::new(message))))
    }

    fn end(
        &mut self,
        _schema: &PipeSchema,
        input: Option<Box<dyn Input>>,
        cleanup_only: bool,
    ) -> Result<()> {
        drop(input);
        if !cleanup_only {
            self.completed += 1;
        }
        Ok(())
    }
}
