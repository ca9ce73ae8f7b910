//! Application state management.
//!
//! Provides centralized state shared by every window: saved connections,
//! query history, preferences and the runtime that drives query execution.

use crate::config::CoreConfig;
use crate::error::VeddbError;
use crate::services::{
    ConnectionStore, LocalStorage, PreferencesService, QueryHistoryLedger, QuerySession,
    StateStore,
};

use std::path::PathBuf;
use std::sync::Arc;

/// Central application state.
///
/// The stores are shared; each open editor owns its own [`QuerySession`].
pub struct VeddbState {
    /// Keyed local state backing every store
    persistence: Arc<dyn StateStore>,
    /// Saved connection profiles
    connections: Arc<ConnectionStore>,
    /// Execution history
    history: Arc<QueryHistoryLedger>,
    /// Theme and current view
    preferences: PreferencesService,
    /// Application data directory
    data_dir: PathBuf,
    /// Tokio runtime for query execution
    tokio_runtime: tokio::runtime::Runtime,
}

impl VeddbState {
    /// Create application state from environment configuration.
    pub fn new() -> Result<Self, VeddbError> {
        Self::from_config(CoreConfig::from_env()?)
    }

    /// Create application state backed by SQLite in `config.data_dir`.
    pub fn from_config(config: CoreConfig) -> Result<Self, VeddbError> {
        let storage = LocalStorage::open(config.data_dir.clone())?;
        Self::with_store(Arc::new(storage), config)
    }

    /// Create application state over an existing store (for testing).
    pub fn with_store(
        persistence: Arc<dyn StateStore>,
        config: CoreConfig,
    ) -> Result<Self, VeddbError> {
        config.validate()?;

        let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| VeddbError::internal(format!("Failed to create tokio runtime: {e}")))?;

        let connections = Arc::new(ConnectionStore::load(persistence.clone()));
        let history =
            Arc::new(QueryHistoryLedger::load(persistence.clone(), config.history_capacity));
        let preferences = PreferencesService::load(persistence.clone());

        tracing::info!(
            data_dir = %config.data_dir.display(),
            store = persistence.name(),
            connections = connections.list().len(),
            history = history.len(),
            "VeddbState initialized"
        );

        Ok(Self {
            persistence,
            connections,
            history,
            preferences,
            data_dir: config.data_dir,
            tokio_runtime,
        })
    }

    /// Open a new query editor bound to the shared connection store.
    pub fn new_session(&self) -> QuerySession {
        QuerySession::new(self.connections.clone())
    }

    // ========== Service Accessors ==========

    /// Saved connection profiles.
    pub fn connections(&self) -> &Arc<ConnectionStore> {
        &self.connections
    }

    /// Query execution history.
    pub fn history(&self) -> &Arc<QueryHistoryLedger> {
        &self.history
    }

    /// Theme and view preferences.
    pub fn preferences(&self) -> &PreferencesService {
        &self.preferences
    }

    /// Underlying state store.
    pub fn persistence(&self) -> &Arc<dyn StateStore> {
        &self.persistence
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Get a handle to the tokio runtime.
    pub fn runtime(&self) -> &tokio::runtime::Runtime {
        &self.tokio_runtime
    }

    /// Spawn a future on the tokio runtime.
    ///
    /// Use this for query execution to avoid blocking the UI thread.
    pub fn spawn<F, T>(&self, future: F) -> tokio::task::JoinHandle<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.tokio_runtime.spawn(future)
    }

    /// Block on a future using the tokio runtime.
    ///
    /// Note: Avoid using this from the main thread as it will block.
    /// Prefer `spawn` for non-blocking execution.
    pub fn block_on<F, T>(&self, future: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        self.tokio_runtime.block_on(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProfileDraft, ThemePreference};
    use crate::services::MemoryStore;
    use tempfile::TempDir;

    #[test]
    fn test_state_over_memory_store() {
        let state =
            VeddbState::with_store(Arc::new(MemoryStore::new()), CoreConfig::default()).unwrap();

        assert!(state.connections().list().is_empty());
        assert!(state.history().is_empty());
        assert_eq!(state.preferences().theme(), ThemePreference::System);
        assert_eq!(state.persistence().name(), "MemoryStore");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CoreConfig::default().with_history_capacity(0);
        let result = VeddbState::with_store(Arc::new(MemoryStore::new()), config);
        assert!(result.is_err());
    }

    #[test]
    fn test_sqlite_state_reloads() {
        let temp_dir = TempDir::new().unwrap();
        let config = CoreConfig::default().with_data_dir(temp_dir.path());

        let id = {
            let state = VeddbState::from_config(config.clone()).unwrap();
            let profile = state.connections().add(ProfileDraft::new("Local", "localhost")).unwrap();
            state.connections().set_active(Some(profile.id)).unwrap();
            state.preferences().set_theme(ThemePreference::Light).unwrap();
            profile.id
        };

        let state = VeddbState::from_config(config).unwrap();
        assert_eq!(state.connections().active_profile_id(), Some(id));
        assert_eq!(state.preferences().theme(), ThemePreference::Light);
        assert!(temp_dir.path().join("veddb.db").exists());
    }

    #[test]
    fn test_sessions_share_connections() {
        let state =
            VeddbState::with_store(Arc::new(MemoryStore::new()), CoreConfig::default()).unwrap();
        let first = state.new_session();
        let second = state.new_session();

        assert_ne!(first.id(), second.id());
        assert_eq!(state.block_on(async { 2 + 2 }), 4);
    }
}
