//! Core types and services for the VedDB desktop client.
//!
//! This crate provides the backend service layer behind the query editor:
//!
//! - **error**: Error taxonomy with user-facing messages and hints
//! - **models**: Connection profiles, query drafts, history records, preferences
//! - **services**: Connection store, portable profile files, query sessions, history
//! - **state**: Application state management
//! - **config**: Data directory and history capacity
//! - **logging**: Structured logging setup

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

mod verification_tests;

pub use config::CoreConfig;
pub use error::{ErrorInfo, VeddbError, VeddbResult};
pub use models::{
    ConnectionProfile, ConnectionStoreState, CurrentView, DraftEdit, ExecutionOutcome,
    ExecutionState, ProfileDraft, ProfilePatch, QueryDraft, QueryExecutionRecord, QueryResultSet,
    SortDirection, SortKey, ThemePreference,
};
pub use services::{
    Clipboard, CompletedExecution, ConnectionStore, FilePicker, LocalStorage, MemoryStore,
    PendingExecution, PreferencesService, ProfileCodec, QueryHistoryLedger, QuerySession,
    QueryTransport, StateStore,
};
pub use state::VeddbState;
