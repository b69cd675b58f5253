// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Object identity across one encode or merge.
//!
//! In graph mode the writer assigns each polymorphic object an index when it
//! first enters it and writes that index ahead of the object's discriminator.
//! A repeated object is written as a `Reference` entry carrying the index, so
//! shared objects and cycles survive a round trip without duplication or
//! unbounded recursion. Indices are explicit so that a reader skipping a field
//! cannot shift them: a reference to an object it never merged is dangling,
//! never another object.

use std::collections::HashMap;

use tracing::trace;

use crate::error::{CodecError, Result};
use crate::object::ObjectRef;

/// Read-side identity map, scoped to a single top-level merge.
#[derive(Debug, Default)]
pub struct GraphResolver {
    objects: HashMap<u32, ObjectRef>,
}

impl GraphResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the object written under `index`, before its fields are merged.
    pub fn register_placeholder(&mut self, index: u32, object: ObjectRef) -> Result<()> {
        if self.objects.contains_key(&index) {
            return Err(CodecError::DuplicateObjectIndex(index));
        }
        self.objects.insert(index, object);
        Ok(())
    }

    /// Resolves a back-reference to the registered instance.
    pub fn resolve_reference(&self, index: u32) -> Result<ObjectRef> {
        let object = self
            .objects
            .get(&index)
            .cloned()
            .ok_or(CodecError::DanglingReference(index))?;
        trace!(index, "resolved back-reference");
        Ok(object)
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Outcome of entering an object on the write side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// First visit: write the object's fields, under this index in graph mode.
    Fresh(Option<u32>),
    /// Already written: emit a reference to this index.
    Reference(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackMode {
    Tree,
    Graph,
}

/// Write-side identity tracker, scoped to a single top-level write.
///
/// In tree mode every object is written in full; entering an object that is
/// still being written is a cycle and fails with
/// [`CodecError::CyclicReference`]. In graph mode repeats become references.
#[derive(Debug)]
pub struct ObjectTracker {
    mode: TrackMode,
    seen: HashMap<usize, u32>,
    active: Vec<usize>,
}

impl ObjectTracker {
    /// Tracker that writes shared objects in full and rejects cycles.
    pub fn tree() -> Self {
        Self {
            mode: TrackMode::Tree,
            seen: HashMap::new(),
            active: Vec::new(),
        }
    }

    /// Tracker that writes each object once and references it afterwards.
    pub fn graph() -> Self {
        Self {
            mode: TrackMode::Graph,
            ..Self::tree()
        }
    }

    /// Returns `true` in graph mode.
    pub fn is_graph(&self) -> bool {
        self.mode == TrackMode::Graph
    }

    /// Enters the object with the given identity.
    pub fn enter(&mut self, identity: usize) -> Result<Visit> {
        let index = match self.mode {
            TrackMode::Graph => {
                if let Some(&index) = self.seen.get(&identity) {
                    return Ok(Visit::Reference(index));
                }
                let index = u32::try_from(self.seen.len()).unwrap_or(u32::MAX);
                self.seen.insert(identity, index);
                Some(index)
            }
            TrackMode::Tree => {
                if self.active.contains(&identity) {
                    return Err(CodecError::CyclicReference);
                }
                None
            }
        };
        self.active.push(identity);
        Ok(Visit::Fresh(index))
    }

    /// Leaves the object most recently entered as [`Visit::Fresh`].
    pub fn leave(&mut self, identity: usize) {
        if self.active.last() == Some(&identity) {
            self.active.pop();
        }
    }
}

impl Default for ObjectTracker {
    fn default() -> Self {
        Self::tree()
    }
}
