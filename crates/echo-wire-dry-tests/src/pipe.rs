// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pipe source that records its session calls.

use bytes::Bytes;
use echo_wire::{ByteInput, CodecError, Input, PipeSchema, PipeSource, Result};

/// One observed `end` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndCall {
    /// Whether `begin` had handed out an input.
    pub had_input: bool,
    /// The flag the pipe passed.
    pub cleanup_only: bool,
}

/// [`PipeSource`] over a byte buffer that counts `begin` calls and records
/// every `end` call.
///
/// A mid-transfer failure is injected by handing it malformed or truncated
/// bytes; `begin` and `end` failures through the `fail_*` flags.
#[derive(Debug, Clone, Default)]
pub struct RecordingSource {
    data: Bytes,
    begins: usize,
    ends: Vec<EndCall>,
    fail_begin: bool,
    fail_end: bool,
}

impl RecordingSource {
    /// Source serving `data`; an empty buffer is an empty message.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Makes `begin` fail before any input is opened.
    pub fn failing_begin(mut self) -> Self {
        self.fail_begin = true;
        self
    }

    /// Makes `end` report a cleanup failure.
    pub fn failing_end(mut self) -> Self {
        self.fail_end = true;
        self
    }

    /// Number of `begin` calls.
    pub fn begins(&self) -> usize {
        self.begins
    }

    /// Every `end` call, in order.
    pub fn ends(&self) -> &[EndCall] {
        &self.ends
    }
}

impl PipeSource for RecordingSource {
    fn begin(&mut self, _schema: &PipeSchema) -> Result<Option<Box<dyn Input>>> {
        self.begins += 1;
        if self.fail_begin {
            return Err(CodecError::ResourceCleanup("simulated begin failure".into()));
        }
        if self.data.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(ByteInput::new(self.data.clone()))))
    }

    fn end(
        &mut self,
        _schema: &PipeSchema,
        input: Option<Box<dyn Input>>,
        cleanup_only: bool,
    ) -> Result<()> {
        self.ends.push(EndCall {
            had_input: input.is_some(),
            cleanup_only,
        });
        if self.fail_end {
            return Err(CodecError::ResourceCleanup("simulated end failure".into()));
        }
        Ok(())
    }
}
