// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for echo-wire.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`fixtures`] - Sample records for every field strategy
//! - [`pipe`] - Recording pipe source with failure injection
//! - [`wire`] - Builder for hand-crafted wire bytes

pub mod config;
pub mod fixtures;
pub mod pipe;
pub mod wire;

pub use config::InMemoryConfigStore;
pub use fixtures::{
    register_fixtures, Address, Circle, Color, Everything, Node, Person, ShapeGroup, Square,
    TreeNode,
};
pub use pipe::{EndCall, RecordingSource};
pub use wire::WireBuilder;
