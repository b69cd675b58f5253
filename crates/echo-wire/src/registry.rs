// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Process-wide registry of record types by discriminator.
//!
//! Polymorphic decoding looks the concrete schema up by the discriminator read
//! from the wire, so every type that may appear behind an
//! [`ObjectRef`](crate::ObjectRef) must be registered before it is decoded.
//! Building a type's schema registers it; [`register`] does so explicitly.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::debug;

use crate::error::{CodecError, Result};
use crate::runtime::RuntimeSchema;
use crate::schema::{ErasedSchema, Message};

struct Entry {
    type_id: TypeId,
    schema: Arc<dyn ErasedSchema>,
}

type Registry = RwLock<HashMap<&'static str, Entry>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Registers `T` under [`Message::FULL_NAME`]. Registering the same type again is a no-op.
pub fn register<T: Message>() -> Result<()> {
    let schema: Arc<dyn ErasedSchema> = RuntimeSchema::<T>::get()?;
    insert(TypeId::of::<T>(), schema)
}

pub(crate) fn insert(type_id: TypeId, schema: Arc<dyn ErasedSchema>) -> Result<()> {
    let name = schema.message_full_name();
    let mut entries = registry().write().unwrap_or_else(|e| e.into_inner());
    match entries.get(name) {
        Some(entry) if entry.type_id == type_id => Ok(()),
        Some(_) => Err(CodecError::DuplicateType(name.to_owned())),
        None => {
            entries.insert(name, Entry { type_id, schema });
            debug!(record = name, "registered record type");
            Ok(())
        }
    }
}

/// Schema registered under `name`.
pub fn lookup(name: &str) -> Result<Arc<dyn ErasedSchema>> {
    let entries = registry().read().unwrap_or_else(|e| e.into_inner());
    entries
        .get(name)
        .map(|entry| Arc::clone(&entry.schema))
        .ok_or_else(|| CodecError::UnknownType(name.to_owned()))
}

/// Returns `true` if a type is registered under `name`.
pub fn contains(name: &str) -> bool {
    registry()
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .contains_key(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::descriptor::FieldSet;

    #[derive(Debug, Default, PartialEq)]
    struct Ping {
        seq: u64,
    }

    impl Message for Ping {
        const NAME: &'static str = "Ping";
        const FULL_NAME: &'static str = "registry.Ping";

        fn describe(fields: &mut FieldSet<Self>) {
            fields.field(1, "seq", |p| &p.seq, |p| &mut p.seq);
        }
    }

    #[test]
    fn lookup_by_full_name() {
        register::<Ping>().unwrap();
        register::<Ping>().unwrap();
        assert!(contains("registry.Ping"));
        let schema = lookup("registry.Ping").unwrap();
        assert_eq!(schema.message_name(), "Ping");
        assert_eq!(schema.field_number("seq").unwrap(), 1);
        assert!(matches!(
            lookup("registry.Missing"),
            Err(CodecError::UnknownType(name)) if name == "registry.Missing"
        ));
    }

    #[test]
    fn a_name_belongs_to_one_type() {
        register::<Ping>().unwrap();
        let ping: Arc<dyn ErasedSchema> = RuntimeSchema::<Ping>::get().unwrap();
        // Another type claiming the same name.
        let err = insert(TypeId::of::<u8>(), ping).unwrap_err();
        assert!(matches!(err, CodecError::DuplicateType(name) if name == "registry.Ping"));
        assert_eq!(lookup("registry.Ping").unwrap().message_name(), "Ping");
    }
}
