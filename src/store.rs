//! In-memory record caches, one per resource kind.

use crate::error::{DossierError, Result};
use crate::models::{Record, ResourceKind};

/// Owns one ordered collection per kind, most recently created first.
///
/// Every mutation is synchronous and touches only the collection of the
/// kind it names. Records are checked against the target kind so a cache
/// never holds a record of another kind.
#[derive(Debug, Default, Clone)]
pub struct ResourceStore {
    collections: [Vec<Record>; 6],
}

fn check_kind(kind: ResourceKind, record: &Record) -> Result<()> {
    if record.kind() != kind {
        return Err(DossierError::InvalidInput(format!(
            "{} record {} cannot be stored as {}",
            record.kind(),
            record.id,
            kind
        )));
    }
    Ok(())
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached collection for `kind`.
    pub fn collection(&self, kind: ResourceKind) -> &[Record] {
        &self.collections[kind.index()]
    }

    /// Replace the whole collection for `kind`.
    pub fn replace_collection(&mut self, kind: ResourceKind, records: Vec<Record>) -> Result<()> {
        for record in &records {
            check_kind(kind, record)?;
        }
        self.collections[kind.index()] = records;
        Ok(())
    }

    /// Place a newly created record at the front of its collection.
    pub fn insert_record(&mut self, kind: ResourceKind, record: Record) -> Result<()> {
        check_kind(kind, &record)?;
        self.collections[kind.index()].insert(0, record);
        Ok(())
    }

    /// Replace the record with `id` in place. Returns whether one was found.
    pub fn update_record(&mut self, kind: ResourceKind, id: &str, record: Record) -> Result<bool> {
        check_kind(kind, &record)?;
        match self.collections[kind.index()]
            .iter_mut()
            .find(|existing| existing.id == id)
        {
            Some(slot) => {
                *slot = record;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop the record with `id`. Returns whether one was removed.
    pub fn remove_record(&mut self, kind: ResourceKind, id: &str) -> bool {
        let collection = &mut self.collections[kind.index()];
        let before = collection.len();
        collection.retain(|record| record.id != id);
        collection.len() != before
    }

    pub fn find(&self, kind: ResourceKind, id: &str) -> Option<&Record> {
        self.collection(kind).iter().find(|record| record.id == id)
    }

    pub fn len(&self, kind: ResourceKind) -> usize {
        self.collection(kind).len()
    }

    pub fn is_empty(&self, kind: ResourceKind) -> bool {
        self.collection(kind).is_empty()
    }

    /// Forget every cached record, e.g. after the owner changed.
    pub fn clear(&mut self) {
        for collection in &mut self.collections {
            collection.clear();
        }
    }
}
