//! Directory of known service entities.
//!
//! The CA consults the directory before handing out key material. It is an
//! external collaborator: hosts with a database implement [`EntityDirectory`]
//! over it, everything else can use [`InMemoryDirectory`].

use cat_core::EntityRecord;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

/// Lookup of `(entity type, entity name)` pairs.
pub trait EntityDirectory: Send + Sync {
    /// Is `name` a registered entity of `entity_type`?
    fn entity_exists(&self, entity_type: &str, name: &str) -> bool;

    /// Is `entity_type` a registered entity type?
    fn entity_type_exists(&self, entity_type: &str) -> bool;
}

/// Thread-safe in-memory directory. Names are unique per type.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    entities: RwLock<HashMap<String, HashSet<String>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from configuration records.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a EntityRecord>) -> Self {
        let directory = Self::new();
        for record in records {
            directory.register(&record.entity_type, &record.name);
        }
        directory
    }

    pub fn register_type(&self, entity_type: &str) {
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(entity_type.to_string())
            .or_default();
    }

    /// Register an entity, creating its type if needed. Returns `false` if
    /// it was already present.
    pub fn register(&self, entity_type: &str, name: &str) -> bool {
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(entity_type.to_string())
            .or_default()
            .insert(name.to_string())
    }

    pub fn len(&self) -> usize {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(HashSet::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EntityDirectory for InMemoryDirectory {
    fn entity_exists(&self, entity_type: &str, name: &str) -> bool {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_type)
            .is_some_and(|names| names.contains(name))
    }

    fn entity_type_exists(&self, entity_type: &str) -> bool {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(entity_type)
    }
}
