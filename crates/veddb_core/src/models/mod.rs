//! Data models for the VedDB client core.
//!
//! This module contains all core data structures:
//! - `connection` - ConnectionProfile, ProfileDraft, ProfilePatch, ConnectionStoreState
//! - `query` - QueryDraft, DraftEdit, SortKey, QueryResultSet, ExecutionState
//! - `history` - QueryExecutionRecord, ExecutionOutcome
//! - `preferences` - ThemePreference, CurrentView

pub mod connection;
pub mod history;
pub mod preferences;
pub mod query;

pub use connection::{ConnectionProfile, ConnectionStoreState, ProfileDraft, ProfilePatch};
pub use history::{ExecutionOutcome, QueryExecutionRecord};
pub use preferences::{CurrentView, ThemePreference};
pub use query::{DraftEdit, ExecutionState, QueryDraft, QueryResultSet, SortDirection, SortKey};
