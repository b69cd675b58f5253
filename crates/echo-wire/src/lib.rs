// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Schema-driven tagged binary codec for Echo records.
//!
//! A record type implements [`Message`] and describes its fields once with
//! explicit accessors. [`RuntimeSchema`] turns that description into one bound
//! [`Field`] per tag, choosing a strategy per field through the
//! [`FieldFactory`]: inline scalar, enum, nested record, polymorphic
//! ([`ObjectRef`]), each optionally wrapped as a collection.
//!
//! The byte layout is the protobuf tagged encoding, so scalar fields and
//! length-delimited nesting interoperate with standard protobuf tooling. A
//! second framing, [`Format::Grouped`], nests records between start/end group
//! tags; the [`Pipe`] copies an encoded record between framings without
//! decoding it.
//!
//! # Object graphs
//!
//! Polymorphic values are shared handles. In graph mode
//! ([`io::to_graph_bytes`] / [`io::from_graph_bytes`]) each object is written
//! once and later occurrences become back-references, so shared objects and
//! cycles round-trip to the same instance. Outside graph mode shared objects
//! are duplicated and cycles are rejected.
//!
//! # Concurrency
//!
//! Schemas are built once per type, cached for the process lifetime and
//! immutable afterwards; they can be used from any number of threads. A
//! [`Pipe`], an [`Input`] or an [`Output`] belongs to one call at a time.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::redundant_pub_crate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::use_self
)]

pub mod config;
mod descriptor;
mod error;
pub mod field;
mod graph;
pub mod io;
mod object;
mod pipe;
pub mod registry;
mod runtime;
mod schema;
pub mod wire;

pub use config::{CodecConfig, ConfigError, ConfigService, ConfigStore, DirConfigStore};
pub use descriptor::FieldSet;
pub use error::{CodecError, FieldKey, Result};
pub use field::{
    Element, ElementKind, Field, FieldFactory, FieldStrategy, Fixed32, Fixed64, ProtoEnum,
    SFixed32, SFixed64, SInt32, SInt64, StrategyKind,
};
pub use graph::{GraphResolver, ObjectTracker, Visit};
pub use object::{Object, ObjectRef};
pub use pipe::{BytesSource, DelimitedSource, Pipe, PipeSchema, PipeSession, PipeSource, PipeState};
pub use runtime::{FilteredSchema, RuntimeSchema};
pub use schema::{ErasedSchema, Message, Schema};
pub use wire::{ByteInput, ByteOutput, FieldType, Format, Input, Output, WireError, WireType};
