//! Query history models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{QueryDraft, QueryResultSet};

/// Label shown for a query with no filter, sort or limit.
pub const EMPTY_QUERY_LABEL: &str = "Empty query";

/// Label shown when the serialized query no longer parses.
pub const INVALID_QUERY_LABEL: &str = "Invalid query";

/// How a recorded execution settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExecutionOutcome {
    /// The transport returned results
    Succeeded {
        /// Number of documents returned
        result_count: u64,
        /// Wall-clock execution time
        execution_time_ms: u64,
    },
    /// The transport reported an error
    Failed {
        /// Error message from the transport
        error: String,
    },
}

/// Record of a previously executed query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryExecutionRecord {
    /// Unique id; nil until the ledger assigns one
    pub id: Uuid,
    /// Collection the query ran against
    pub collection: String,
    /// Structured text of the query as executed
    pub serialized_query: String,
    /// When the execution was issued
    pub timestamp: DateTime<Utc>,
    /// Result metadata or error
    #[serde(flatten)]
    pub outcome: ExecutionOutcome,
}

impl QueryExecutionRecord {
    /// Create a record from a successful execution.
    pub fn from_result(
        collection: impl Into<String>,
        serialized_query: impl Into<String>,
        result: &QueryResultSet,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::nil(), // Assigned by the ledger
            collection: collection.into(),
            serialized_query: serialized_query.into(),
            timestamp: Utc::now(),
            outcome: ExecutionOutcome::Succeeded {
                result_count: result.result_count() as u64,
                execution_time_ms,
            },
        }
    }

    /// Create a record from a failed execution.
    pub fn from_error(
        collection: impl Into<String>,
        serialized_query: impl Into<String>,
        error: impl std::fmt::Display,
    ) -> Self {
        Self {
            id: Uuid::nil(), // Assigned by the ledger
            collection: collection.into(),
            serialized_query: serialized_query.into(),
            timestamp: Utc::now(),
            outcome: ExecutionOutcome::Failed { error: error.to_string() },
        }
    }

    /// Set the issue timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Check if this record represents a successful query.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ExecutionOutcome::Succeeded { .. })
    }

    /// Check if this record represents a failed query.
    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    /// Number of documents returned, for successful executions.
    pub fn result_count(&self) -> Option<u64> {
        match self.outcome {
            ExecutionOutcome::Succeeded { result_count, .. } => Some(result_count),
            ExecutionOutcome::Failed { .. } => None,
        }
    }

    /// Execution time, for successful executions.
    pub fn execution_time_ms(&self) -> Option<u64> {
        match self.outcome {
            ExecutionOutcome::Succeeded { execution_time_ms, .. } => Some(execution_time_ms),
            ExecutionOutcome::Failed { .. } => None,
        }
    }

    /// Error message, for failed executions.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ExecutionOutcome::Succeeded { .. } => None,
            ExecutionOutcome::Failed { error } => Some(error),
        }
    }

    /// Parse the serialized query back into a draft for this collection.
    pub fn to_draft(&self) -> Result<QueryDraft, crate::VeddbError> {
        QueryDraft::from_text(Some(self.collection.clone()), &self.serialized_query)
    }

    /// Case-insensitive match against the query text or collection name.
    pub fn matches_term(&self, lowercase_term: &str) -> bool {
        lowercase_term.is_empty()
            || self.serialized_query.to_lowercase().contains(lowercase_term)
            || self.collection.to_lowercase().contains(lowercase_term)
    }

    /// Compact label for list display.
    ///
    /// Lists up to two filter fields (`…` when there are more), the first
    /// sort field and the limit, e.g. `status, total, … · sort: created_at · limit: 50`.
    pub fn summary(&self) -> String {
        let Ok(draft) = QueryDraft::from_text(None, &self.serialized_query) else {
            return INVALID_QUERY_LABEL.to_string();
        };
        if draft.is_empty_query() {
            return EMPTY_QUERY_LABEL.to_string();
        }

        let mut parts = Vec::new();
        if !draft.filter.is_empty() {
            let mut fields: Vec<&str> = draft.filter.keys().take(2).map(String::as_str).collect();
            if draft.filter.len() > 2 {
                fields.push("…");
            }
            parts.push(format!("filter: {}", fields.join(", ")));
        }
        if let Some(first) = draft.sort.first() {
            parts.push(format!("sort: {}", first.field));
        }
        if let Some(limit) = draft.limit {
            parts.push(format!("limit: {limit}"));
        }
        parts.join(" · ")
    }
}
