//! Bounded, newest-first ledger of executed queries.

use crate::error::VeddbError;
use crate::models::QueryExecutionRecord;
use crate::services::clipboard::Clipboard;
use crate::services::storage::{load_or_default, save_record, StateStore, HISTORY_KEY};

use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// Default number of records kept before the oldest are dropped.
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// Append-only log of query executions with search and replay support.
///
/// Records are kept newest-first. Appends beyond `capacity` drop the oldest.
pub struct QueryHistoryLedger {
    records: RwLock<Vec<QueryExecutionRecord>>,
    capacity: usize,
    persistence: Arc<dyn StateStore>,
}

impl QueryHistoryLedger {
    /// Load the ledger from persistence, trimming to `capacity`.
    pub fn load(persistence: Arc<dyn StateStore>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut records: Vec<QueryExecutionRecord> =
            load_or_default(persistence.as_ref(), HISTORY_KEY);
        records.truncate(capacity);

        tracing::debug!(records = records.len(), capacity, "Query history loaded");
        Self { records: RwLock::new(records), capacity, persistence }
    }

    /// Maximum number of records retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert a record at the front and return its id.
    ///
    /// A nil id is replaced with a fresh one. Reusing an id already in the
    /// ledger is an invariant violation.
    pub fn append(&self, mut record: QueryExecutionRecord) -> Result<Uuid, VeddbError> {
        let mut records = self.records.write();

        if record.id.is_nil() {
            record.id = Uuid::new_v4();
            while records.iter().any(|r| r.id == record.id) {
                record.id = Uuid::new_v4();
            }
        } else if records.iter().any(|r| r.id == record.id) {
            return Err(VeddbError::internal(format!(
                "History record {} is already in the ledger",
                record.id
            )));
        }

        let id = record.id;
        let mut next = Vec::with_capacity(self.capacity.min(records.len() + 1));
        next.push(record);
        next.extend(records.iter().take(self.capacity - 1).cloned());
        let dropped = records.len() + 1 - next.len();
        self.commit(&mut records, next)?;
        if dropped > 0 {
            tracing::trace!(dropped, "Oldest history records dropped");
        }

        tracing::trace!(history_id = %id, "Query added to history");
        Ok(id)
    }

    /// Remove every record.
    pub fn clear(&self) -> Result<(), VeddbError> {
        let mut records = self.records.write();
        self.commit(&mut records, Vec::new())?;

        tracing::debug!("Query history cleared");
        Ok(())
    }

    /// Remove one record.
    pub fn remove(&self, id: Uuid) -> Result<bool, VeddbError> {
        let mut records = self.records.write();
        if !records.iter().any(|r| r.id == id) {
            return Ok(false);
        }
        let next = records.iter().filter(|r| r.id != id).cloned().collect();
        self.commit(&mut records, next)?;

        tracing::debug!(history_id = %id, "History record removed");
        Ok(true)
    }

    /// Find records matching a term and an optional collection, newest-first.
    ///
    /// An empty `term` matches everything; otherwise it is matched
    /// case-insensitively against the query text and the collection name.
    /// `collection_filter`, when non-empty, must equal the record's collection.
    pub fn search(&self, term: &str, collection_filter: Option<&str>) -> Vec<QueryExecutionRecord> {
        let term = term.trim().to_lowercase();
        let collection_filter = collection_filter.filter(|c| !c.is_empty());

        self.records
            .read()
            .iter()
            .filter(|r| r.matches_term(&term))
            .filter(|r| collection_filter.map_or(true, |c| r.collection == c))
            .cloned()
            .collect()
    }

    /// Compact list label for a record.
    pub fn summarize(record: &QueryExecutionRecord) -> String {
        record.summary()
    }

    /// Get a record by id.
    pub fn get(&self, id: Uuid) -> Option<QueryExecutionRecord> {
        self.records.read().iter().find(|r| r.id == id).cloned()
    }

    /// Get all records, newest-first.
    pub fn records(&self) -> Vec<QueryExecutionRecord> {
        self.records.read().clone()
    }

    /// Distinct collection names, most recently used first.
    pub fn collections(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for record in self.records.read().iter() {
            if !seen.contains(&record.collection) {
                seen.push(record.collection.clone());
            }
        }
        seen
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Copy the exact serialized query of a record to the clipboard.
    pub fn copy_query(&self, id: Uuid, clipboard: &dyn Clipboard) -> Result<(), VeddbError> {
        let record = self
            .get(id)
            .ok_or_else(|| VeddbError::validation(format!("Unknown history record: {id}")))?;
        clipboard.write_text(&record.serialized_query)
    }

    /// Persist `next`, then make it the current record list.
    fn commit(
        &self,
        current: &mut Vec<QueryExecutionRecord>,
        next: Vec<QueryExecutionRecord>,
    ) -> Result<(), VeddbError> {
        save_record(self.persistence.as_ref(), HISTORY_KEY, &next).inspect_err(|e| {
            tracing::warn!(error = %e, "Failed to persist query history");
        })?;
        *current = next;
        Ok(())
    }
}

impl std::fmt::Debug for QueryHistoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryHistoryLedger")
            .field("records", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
