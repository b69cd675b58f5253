// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Type-erased records and shared object handles for polymorphic fields.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Result;
use crate::runtime::RuntimeSchema;
use crate::schema::{ErasedSchema, Message};

/// A record whose concrete type is only known at runtime.
///
/// Implemented for every [`Message`]; the polymorphic strategy uses it to reach
/// the concrete schema of a value.
pub trait Object: Any + Send + Sync + fmt::Debug {
    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete type.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Schema of the concrete type.
    fn schema(&self) -> Result<Arc<dyn ErasedSchema>>;

    /// Discriminator of the concrete type.
    fn type_name(&self) -> &'static str;

    /// Structural equality against another erased record.
    fn dyn_eq(&self, other: &dyn Object) -> bool;
}

impl<T: Message> Object for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn schema(&self) -> Result<Arc<dyn ErasedSchema>> {
        let schema: Arc<dyn ErasedSchema> = RuntimeSchema::<T>::get()?;
        Ok(schema)
    }

    fn type_name(&self) -> &'static str {
        T::FULL_NAME
    }

    fn dyn_eq(&self, other: &dyn Object) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|other| self == other)
    }
}

/// Shared, mutable handle to a polymorphic record.
///
/// Clones share the instance, which is how graph-mode merges hand out one
/// object for every back-reference to it. Equality holds for the same instance
/// or for structurally equal records of the same type; comparing cyclic graphs
/// structurally does not terminate.
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<Box<dyn Object>>>);

impl ObjectRef {
    /// Wraps a record in a fresh handle.
    pub fn new<T: Message>(value: T) -> Self {
        Self::from_boxed(Box::new(value))
    }

    /// Wraps an already erased record.
    pub fn from_boxed(value: Box<dyn Object>) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    /// Returns `true` if both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity of the instance while any handle to it is alive.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0).addr()
    }

    /// Shared access to the record; a poisoned lock is recovered.
    pub fn read(&self) -> RwLockReadGuard<'_, Box<dyn Object>> {
        self.0.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Exclusive access to the record; a poisoned lock is recovered.
    pub fn write(&self) -> RwLockWriteGuard<'_, Box<dyn Object>> {
        self.0.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Discriminator of the referenced record.
    pub fn type_name(&self) -> &'static str {
        self.read().type_name()
    }

    /// Returns `true` if the record is a `T`.
    pub fn is<T: Message>(&self) -> bool {
        self.read().as_any().is::<T>()
    }

    /// Runs `f` on the record if it is a `T`.
    pub fn with<T: Message, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.read();
        guard.as_any().downcast_ref::<T>().map(f)
    }

    /// Runs `f` on the record mutably if it is a `T`.
    pub fn with_mut<T: Message, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.write();
        guard.as_any_mut().downcast_mut::<T>().map(f)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let lhs = self.read();
        let rhs = other.read();
        lhs.dyn_eq(&**rhs)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only the head: the record may be locked or cyclic.
        let name = self
            .0
            .try_read()
            .map_or("<locked>", |guard| guard.type_name());
        write!(f, "ObjectRef({name}@{:#x})", self.identity())
    }
}

impl<T: Message> From<T> for ObjectRef {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::descriptor::FieldSet;

    #[derive(Debug, Default, PartialEq)]
    struct Tally {
        hits: u32,
    }

    impl Message for Tally {
        const NAME: &'static str = "Tally";
        const FULL_NAME: &'static str = "object.Tally";

        fn describe(fields: &mut FieldSet<Self>) {
            fields.field(1, "hits", |p| &p.hits, |p| &mut p.hits);
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Other {
        flag: bool,
    }

    impl Message for Other {
        const NAME: &'static str = "Other";
        const FULL_NAME: &'static str = "object.Other";

        fn describe(fields: &mut FieldSet<Self>) {
            fields.field(1, "flag", |o| &o.flag, |o| &mut o.flag);
        }
    }

    #[test]
    fn clones_share_the_instance() {
        let a = ObjectRef::new(Tally { hits: 1 });
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.identity(), b.identity());
        b.with_mut(|p: &mut Tally| p.hits += 1).unwrap();
        assert_eq!(a.with(|p: &Tally| p.hits), Some(2));
    }

    #[test]
    fn equality_is_structural_across_instances() {
        let a = ObjectRef::new(Tally { hits: 3 });
        let b = ObjectRef::from(Tally { hits: 3 });
        assert!(!a.ptr_eq(&b));
        assert_eq!(a, b);
        assert_ne!(a, ObjectRef::new(Tally { hits: 4 }));
    }

    #[test]
    fn downcasts_only_to_the_concrete_type() {
        let a = ObjectRef::new(Tally::default());
        assert!(a.is::<Tally>());
        assert_eq!(a.type_name(), "object.Tally");
        assert_eq!(a.with(|o: &Other| o.flag), None);
        assert_ne!(a, ObjectRef::new(Other::default()));
        assert!(format!("{a:?}").starts_with("ObjectRef(object.Tally@"));
    }
}
