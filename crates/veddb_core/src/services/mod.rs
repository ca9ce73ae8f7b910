//! Backend services for the VedDB client core.
//!
//! This module contains all service layer abstractions:
//! - `connection` - Saved connection profiles and the active selection
//! - `codec` - Portable `.veddb` connection files
//! - `session` - Query drafts and execution
//! - `history` - Bounded, searchable execution history
//! - `preferences` - Theme and current view
//! - `storage` - Keyed local state (SQLite or in-memory)
//! - `clipboard` - Clipboard port

pub mod clipboard;
pub mod codec;
pub mod connection;
pub mod history;
pub mod preferences;
pub mod session;
pub mod storage;

pub use clipboard::Clipboard;
pub use codec::{FilePicker, ProfileCodec};
pub use connection::ConnectionStore;
pub use history::QueryHistoryLedger;
pub use preferences::PreferencesService;
pub use session::{CompletedExecution, PendingExecution, QuerySession, QueryTransport};
pub use storage::{LocalStorage, MemoryStore, StateStore};
