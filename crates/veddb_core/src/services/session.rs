//! Query sessions: draft editing and execution.
//!
//! Provides:
//! - One canonical [`QueryDraft`] behind the guided form and the text editor
//! - A latent parse-error marker that never corrupts the canonical draft
//! - Execution against the active connection, recorded into history from a
//!   snapshot taken when the request was issued
//!
//! Only one execution may be in flight per session. A second request while
//! one is outstanding is rejected with [`VeddbError::InvalidState`]; the
//! caller may [`QuerySession::abandon`] the outstanding one first. A result
//! that arrives after abandonment is still written to history (the query did
//! run) but leaves the session untouched.

use crate::error::VeddbError;
use crate::models::{
    ConnectionProfile, DraftEdit, ExecutionState, QueryDraft, QueryExecutionRecord,
    QueryResultSet,
};
use crate::services::clipboard::Clipboard;
use crate::services::connection::ConnectionStore;
use crate::services::history::QueryHistoryLedger;

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Network transport to the remote database, supplied by the host.
pub trait QueryTransport: Send + Sync {
    /// Run a query and return the matching documents.
    fn execute(
        &self,
        profile: &ConnectionProfile,
        collection: &str,
        draft: &QueryDraft,
    ) -> impl Future<Output = Result<QueryResultSet, VeddbError>> + Send;
}

/// Latent marker for structured text that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    /// Parser message
    pub message: String,
    /// Line of the failure (1-indexed)
    pub line: Option<usize>,
    /// Column of the failure (1-indexed)
    pub column: Option<usize>,
}

/// An issued request: the draft snapshot plus the token matching it.
#[derive(Debug, Clone)]
pub struct PendingExecution {
    execution_id: Uuid,
    profile: ConnectionProfile,
    collection: String,
    draft: QueryDraft,
    serialized_query: String,
    started_at: DateTime<Utc>,
}

impl PendingExecution {
    /// Token identifying this request.
    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    /// Collection the request targets.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Draft as it was when the request was issued.
    pub fn draft(&self) -> &QueryDraft {
        &self.draft
    }

    /// Structured text as it was when the request was issued.
    pub fn serialized_query(&self) -> &str {
        &self.serialized_query
    }

    /// Profile the request runs against.
    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    /// Issue the request through the transport and wait for it to settle.
    ///
    /// Owns its snapshot, so it can be spawned while the session keeps
    /// accepting edits.
    pub async fn run<T: QueryTransport>(self, transport: &T) -> CompletedExecution {
        let start = Instant::now();

        tracing::debug!(
            execution_id = %self.execution_id,
            profile_id = %self.profile.id,
            collection = %self.collection,
            "Executing query"
        );

        let outcome = transport.execute(&self.profile, &self.collection, &self.draft).await;
        let execution_time_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            Ok(result) => tracing::debug!(
                execution_id = %self.execution_id,
                execution_time_ms,
                result_count = result.result_count(),
                "Query completed"
            ),
            Err(e) => tracing::warn!(
                execution_id = %self.execution_id,
                error = %e,
                "Query failed"
            ),
        }

        CompletedExecution { pending: self, outcome, execution_time_ms }
    }
}

/// A settled request, ready to be applied to its session.
#[derive(Debug)]
pub struct CompletedExecution {
    pending: PendingExecution,
    outcome: Result<QueryResultSet, VeddbError>,
    execution_time_ms: u64,
}

impl CompletedExecution {
    /// Token of the request that settled.
    pub fn execution_id(&self) -> Uuid {
        self.pending.execution_id
    }

    /// Check if the transport returned results.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    fn to_record(&self) -> QueryExecutionRecord {
        let pending = &self.pending;
        let record = match &self.outcome {
            Ok(result) => QueryExecutionRecord::from_result(
                &pending.collection,
                &pending.serialized_query,
                result,
                self.execution_time_ms,
            ),
            Err(e) => {
                QueryExecutionRecord::from_error(&pending.collection, &pending.serialized_query, e)
            }
        };
        record.at(pending.started_at)
    }
}

/// An in-progress query with its two synchronized presentations.
pub struct QuerySession {
    id: Uuid,
    connections: Arc<ConnectionStore>,
    draft: QueryDraft,
    /// Text rendered from `draft`
    text: String,
    /// Verbatim text of an edit that failed to parse
    invalid_text: Option<String>,
    parse_issue: Option<ParseIssue>,
    state: ExecutionState,
}

impl QuerySession {
    /// Create an empty session reading the active profile from `connections`.
    pub fn new(connections: Arc<ConnectionStore>) -> Self {
        let draft = QueryDraft::default();
        let text = draft.to_text();
        Self {
            id: Uuid::new_v4(),
            connections,
            draft,
            text,
            invalid_text: None,
            parse_issue: None,
            state: ExecutionState::Idle,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The canonical draft (the guided-form view).
    pub fn draft(&self) -> &QueryDraft {
        &self.draft
    }

    /// Text the editor should display: the invalid edit if there is one,
    /// otherwise the canonical rendering.
    pub fn text(&self) -> &str {
        self.invalid_text.as_deref().unwrap_or(&self.text)
    }

    /// Text rendered from the canonical draft.
    pub fn canonical_text(&self) -> &str {
        &self.text
    }

    /// Latent parse error, if the text view holds an invalid edit.
    pub fn parse_issue(&self) -> Option<&ParseIssue> {
        self.parse_issue.as_ref()
    }

    /// Check if the text view holds an invalid edit.
    pub fn has_parse_error(&self) -> bool {
        self.parse_issue.is_some()
    }

    /// Current execution state.
    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    /// Check if a request is in flight.
    pub fn is_executing(&self) -> bool {
        self.state.is_executing()
    }

    // ========== Editing ==========

    /// Apply a guided-form edit and re-render the text.
    ///
    /// Replaces any pending invalid text edit.
    pub fn set_field(&mut self, edit: DraftEdit) {
        tracing::trace!(session_id = %self.id, edit = ?edit, "Guided edit");
        self.draft.apply(edit);
        self.refresh_text();
    }

    /// Replace filter, sort and limit from structured text.
    ///
    /// On failure the canonical draft is kept, `text` is held verbatim for
    /// redisplay and the parse error is returned.
    pub fn set_raw_text(&mut self, text: &str) -> Result<(), VeddbError> {
        match QueryDraft::from_text(self.draft.collection.clone(), text) {
            Ok(draft) => {
                self.draft = draft;
                self.refresh_text();
                Ok(())
            }
            Err(err) => {
                let issue = match &err {
                    VeddbError::Parse { message, line, column } => {
                        ParseIssue { message: message.clone(), line: *line, column: *column }
                    }
                    other => ParseIssue { message: other.to_string(), line: None, column: None },
                };
                tracing::debug!(session_id = %self.id, error = %issue.message, "Query text does not parse");
                self.invalid_text = Some(text.to_string());
                self.parse_issue = Some(issue);
                Err(err)
            }
        }
    }

    /// Drop an invalid text edit and show the canonical text again.
    pub fn discard_invalid_text(&mut self) {
        self.invalid_text = None;
        self.parse_issue = None;
    }

    /// Replace the draft with a history record, unconditionally.
    pub fn load_from_history(&mut self, record: &QueryExecutionRecord) -> Result<(), VeddbError> {
        let draft = record.to_draft().map_err(|e| {
            VeddbError::format(format!("History record {} cannot be replayed: {e}", record.id))
        })?;

        self.draft = draft;
        self.refresh_text();
        tracing::debug!(session_id = %self.id, history_id = %record.id, "Draft loaded from history");
        Ok(())
    }

    /// Copy the canonical query text to the clipboard.
    pub fn copy_draft(&self, clipboard: &dyn Clipboard) -> Result<(), VeddbError> {
        clipboard.write_text(&self.text)
    }

    fn refresh_text(&mut self) {
        self.text = self.draft.to_text();
        self.invalid_text = None;
        self.parse_issue = None;
    }

    // ========== Execution ==========

    /// Snapshot the draft and move to `Executing`.
    pub fn begin_execution(&mut self) -> Result<PendingExecution, VeddbError> {
        if let Some(execution_id) = self.state.executing_id() {
            return Err(VeddbError::invalid_state(format!(
                "A query is already running ({execution_id})"
            )));
        }

        let collection = self
            .draft
            .collection
            .clone()
            .ok_or_else(|| VeddbError::validation_field("collection", "Select a collection"))?;

        let profile = self
            .connections
            .active_profile()
            .ok_or_else(|| VeddbError::invalid_state("No active connection"))?;

        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();
        self.state = ExecutionState::Executing { execution_id, started_at };

        Ok(PendingExecution {
            execution_id,
            profile,
            collection,
            draft: self.draft.clone(),
            serialized_query: self.text.clone(),
            started_at,
        })
    }

    /// Record a settled request and, if it is still the current one, move to
    /// `Succeeded` or `Failed`.
    ///
    /// Returns `true` when the session state changed.
    pub fn complete_execution(
        &mut self,
        completed: CompletedExecution,
        ledger: &QueryHistoryLedger,
    ) -> bool {
        let record = completed.to_record();
        if let Err(e) = ledger.append(record) {
            tracing::warn!(error = %e, "Failed to record query history");
        }

        let execution_id = completed.execution_id();
        if self.state.executing_id() != Some(execution_id) {
            tracing::debug!(
                session_id = %self.id,
                execution_id = %execution_id,
                "Ignoring result of an abandoned execution"
            );
            return false;
        }

        self.state = match completed.outcome {
            Ok(result) => ExecutionState::Succeeded {
                execution_id,
                result,
                execution_time_ms: completed.execution_time_ms,
            },
            Err(e) => ExecutionState::Failed { execution_id, message: e.to_string() },
        };
        true
    }

    /// Issue the current draft, wait for it and record the outcome.
    ///
    /// Transport failures are not returned: they end in `Failed` state and a
    /// history record. Errors are only returned when the request could not
    /// be issued at all.
    pub async fn execute<T: QueryTransport>(
        &mut self,
        transport: &T,
        ledger: &QueryHistoryLedger,
    ) -> Result<&ExecutionState, VeddbError> {
        let pending = self.begin_execution()?;
        let completed = pending.run(transport).await;
        self.complete_execution(completed, ledger);
        Ok(&self.state)
    }

    /// Stop waiting for the in-flight request and return to `Idle`.
    ///
    /// Returns the abandoned execution id.
    pub fn abandon(&mut self) -> Option<Uuid> {
        let execution_id = self.state.executing_id()?;
        self.state = ExecutionState::Idle;
        tracing::debug!(session_id = %self.id, execution_id = %execution_id, "Execution abandoned");
        Some(execution_id)
    }

    /// Return a settled session to `Idle`.
    pub fn dismiss(&mut self) {
        if !self.state.is_executing() {
            self.state = ExecutionState::Idle;
        }
    }
}

impl std::fmt::Debug for QuerySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySession")
            .field("id", &self.id)
            .field("draft", &self.draft)
            .field("has_parse_error", &self.has_parse_error())
            .field("state", &self.state)
            .finish()
    }
}
