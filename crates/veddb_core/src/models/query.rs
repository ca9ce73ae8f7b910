//! Query draft and execution models.
//!
//! A [`QueryDraft`] is the canonical value behind both editor presentations.
//! The structured-text presentation is a JSON object with the optional keys
//! `filter`, `sort` and `limit`:
//!
//! ```text
//! {
//!   "filter": { "status": "active" },
//!   "sort": { "created_at": -1 },
//!   "limit": 50
//! }
//! ```
//!
//! The collection is picked through the guided form and travels beside the
//! text, never inside it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::num::NonZeroU32;
use uuid::Uuid;

use crate::error::VeddbError;

/// Sort direction for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

impl SortDirection {
    /// Numeric form used in the structured text.
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }

    /// Parse the structured-text form (`1`, `-1`, `"asc"`, `"desc"`).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(1) => Some(Self::Ascending),
                Some(-1) => Some(Self::Descending),
                _ => None,
            },
            Value::String(s) => match s.to_lowercase().as_str() {
                "asc" | "ascending" => Some(Self::Ascending),
                "desc" | "descending" => Some(Self::Descending),
                _ => None,
            },
            _ => None,
        }
    }
}

/// One entry of the ordered sort specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// Field to sort by
    pub field: String,
    /// Direction
    pub direction: SortDirection,
}

impl SortKey {
    /// Create a sort key.
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self { field: field.into(), direction }
    }
}

/// The query under construction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryDraft {
    /// Target collection
    pub collection: Option<String>,
    /// Filter document (insertion ordered)
    pub filter: Map<String, Value>,
    /// Ordered sort specification
    pub sort: Vec<SortKey>,
    /// Maximum number of documents to return
    pub limit: Option<NonZeroU32>,
}

/// Wire shape of the structured text.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct QueryText {
    #[serde(default)]
    filter: Option<Map<String, Value>>,
    #[serde(default)]
    sort: Option<Map<String, Value>>,
    #[serde(default)]
    limit: Option<NonZeroU32>,
}

impl QueryDraft {
    /// Create an empty draft targeting a collection.
    pub fn for_collection(collection: impl Into<String>) -> Self {
        Self { collection: normalize_collection(Some(collection.into())), ..Default::default() }
    }

    /// Check whether the draft has no filter, sort or limit.
    pub fn is_empty_query(&self) -> bool {
        self.filter.is_empty() && self.sort.is_empty() && self.limit.is_none()
    }

    /// Render the structured-text form of filter, sort and limit.
    pub fn to_text(&self) -> String {
        let mut body = Map::new();
        if !self.filter.is_empty() {
            body.insert("filter".to_string(), Value::Object(self.filter.clone()));
        }
        if !self.sort.is_empty() {
            let sort = self
                .sort
                .iter()
                .map(|key| (key.field.clone(), Value::from(key.direction.as_i64())))
                .collect();
            body.insert("sort".to_string(), Value::Object(sort));
        }
        if let Some(limit) = self.limit {
            body.insert("limit".to_string(), Value::from(limit.get()));
        }
        format!("{:#}", Value::Object(body))
    }

    /// Parse structured text into a draft for the given collection.
    pub fn from_text(collection: Option<String>, text: &str) -> Result<Self, VeddbError> {
        let document: Value = serde_json::from_str(text).map_err(|e| VeddbError::parse_json(&e))?;
        if !document.is_object() {
            return Err(VeddbError::parse("Query text must be a JSON object"));
        }
        let parsed: QueryText =
            serde_json::from_value(document).map_err(|e| VeddbError::parse(e.to_string()))?;

        let mut sort = Vec::new();
        for (field, value) in parsed.sort.unwrap_or_default() {
            let direction = SortDirection::from_value(&value).ok_or_else(|| {
                VeddbError::parse(format!(
                    "Sort direction for '{field}' must be 1, -1, \"asc\" or \"desc\""
                ))
            })?;
            sort.push(SortKey { field, direction });
        }

        Ok(Self {
            collection: normalize_collection(collection),
            filter: parsed.filter.unwrap_or_default(),
            sort,
            limit: parsed.limit,
        })
    }

    /// Apply a guided-form edit.
    pub fn apply(&mut self, edit: DraftEdit) {
        match edit {
            DraftEdit::Collection(collection) => {
                self.collection = normalize_collection(collection);
            }
            DraftEdit::Filter(filter) => self.filter = filter,
            DraftEdit::FilterField { field, value } => {
                self.filter.insert(field, value);
            }
            DraftEdit::RemoveFilterField(field) => {
                self.filter.shift_remove(&field);
            }
            DraftEdit::Sort(sort) => {
                self.sort.clear();
                for key in sort {
                    upsert_sort_key(&mut self.sort, key);
                }
            }
            DraftEdit::SortField { field, direction } => {
                upsert_sort_key(&mut self.sort, SortKey { field, direction });
            }
            DraftEdit::RemoveSortField(field) => self.sort.retain(|key| key.field != field),
            DraftEdit::Limit(limit) => self.limit = limit,
        }
    }
}

fn upsert_sort_key(sort: &mut Vec<SortKey>, key: SortKey) {
    match sort.iter_mut().find(|existing| existing.field == key.field) {
        Some(existing) => existing.direction = key.direction,
        None => sort.push(key),
    }
}

fn normalize_collection(collection: Option<String>) -> Option<String> {
    collection.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())
}

/// A guided-form edit. Every variant is a valid shape, so applying one
/// cannot fail.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftEdit {
    /// Select (or clear) the target collection
    Collection(Option<String>),
    /// Replace the whole filter document
    Filter(Map<String, Value>),
    /// Set one filter field
    FilterField { field: String, value: Value },
    /// Remove one filter field
    RemoveFilterField(String),
    /// Replace the whole sort specification
    Sort(Vec<SortKey>),
    /// Set the direction of one sort field, appending it if new
    SortField { field: String, direction: SortDirection },
    /// Remove one sort field
    RemoveSortField(String),
    /// Set or clear the limit
    Limit(Option<NonZeroU32>),
}

/// Documents returned by the transport.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResultSet {
    /// Result documents
    pub documents: Vec<Value>,
}

impl QueryResultSet {
    /// Create a result set.
    pub fn new(documents: Vec<Value>) -> Self {
        Self { documents }
    }

    /// Get the number of documents returned.
    pub fn result_count(&self) -> usize {
        self.documents.len()
    }

    /// Check if the result is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Lifecycle of a query session.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExecutionState {
    /// Nothing running and nothing to show
    #[default]
    Idle,
    /// A request is in flight
    Executing {
        /// Token matching the in-flight request
        execution_id: Uuid,
        /// When the request was issued
        started_at: DateTime<Utc>,
    },
    /// The last request returned results
    Succeeded {
        execution_id: Uuid,
        result: QueryResultSet,
        execution_time_ms: u64,
    },
    /// The last request failed
    Failed { execution_id: Uuid, message: String },
}

impl ExecutionState {
    /// Check if a request is in flight.
    pub fn is_executing(&self) -> bool {
        matches!(self, Self::Executing { .. })
    }

    /// Check if the state is idle.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Check if the last request succeeded.
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Check if the last request failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Get the in-flight execution id.
    pub fn executing_id(&self) -> Option<Uuid> {
        match self {
            Self::Executing { execution_id, .. } => Some(*execution_id),
            _ => None,
        }
    }

    /// Get the error message if in failed state.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed { message, .. } => Some(message),
            _ => None,
        }
    }
}
