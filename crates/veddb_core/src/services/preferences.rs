//! User preferences: persisted theme and runtime-only current view.

use crate::error::VeddbError;
use crate::models::{CurrentView, ThemePreference};
use crate::services::storage::{load_or_default, save_record, StateStore, THEME_KEY};

use parking_lot::RwLock;
use std::sync::Arc;

/// Preference service backed by the `theme` state record.
pub struct PreferencesService {
    theme: RwLock<ThemePreference>,
    current_view: RwLock<CurrentView>,
    persistence: Arc<dyn StateStore>,
}

impl PreferencesService {
    /// Load preferences, defaulting to the system theme.
    pub fn load(persistence: Arc<dyn StateStore>) -> Self {
        let theme: ThemePreference = load_or_default(persistence.as_ref(), THEME_KEY);
        tracing::debug!(theme = theme.as_str(), "Preferences loaded");
        Self {
            theme: RwLock::new(theme),
            current_view: RwLock::new(CurrentView::default()),
            persistence,
        }
    }

    /// Current theme preference.
    pub fn theme(&self) -> ThemePreference {
        *self.theme.read()
    }

    /// Change and persist the theme preference.
    pub fn set_theme(&self, theme: ThemePreference) -> Result<(), VeddbError> {
        let mut current = self.theme.write();
        save_record(self.persistence.as_ref(), THEME_KEY, &theme).inspect_err(|e| {
            tracing::warn!(error = %e, "Failed to persist theme");
        })?;
        *current = theme;
        tracing::debug!(theme = theme.as_str(), "Theme changed");
        Ok(())
    }

    /// View shown in the main window.
    pub fn current_view(&self) -> CurrentView {
        *self.current_view.read()
    }

    /// Switch the main window view. Not persisted.
    pub fn set_current_view(&self, view: CurrentView) {
        *self.current_view.write() = view;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::{FailingStore, MemoryStore};
    use serde_json::json;

    #[test]
    fn test_theme_defaults_to_system() {
        let prefs = PreferencesService::load(Arc::new(MemoryStore::new()));
        assert_eq!(prefs.theme(), ThemePreference::System);
        assert_eq!(prefs.current_view(), CurrentView::Query);
    }

    #[test]
    fn test_theme_persists_and_view_does_not() {
        let memory = Arc::new(MemoryStore::new());
        {
            let prefs = PreferencesService::load(memory.clone());
            prefs.set_theme(ThemePreference::Dark).unwrap();
            prefs.set_current_view(CurrentView::History);
        }

        let prefs = PreferencesService::load(memory.clone());
        assert_eq!(prefs.theme(), ThemePreference::Dark);
        assert_eq!(prefs.current_view(), CurrentView::Query);
        assert_eq!(memory.load(THEME_KEY).unwrap(), Some(json!("dark")));
    }

    #[test]
    fn test_corrupt_theme_falls_back() {
        let memory = Arc::new(MemoryStore::new());
        memory.insert_raw(THEME_KEY, json!("neon"));

        let prefs = PreferencesService::load(memory);
        assert_eq!(prefs.theme(), ThemePreference::System);
    }

    #[test]
    fn test_failed_save_keeps_theme() {
        let failing = Arc::new(FailingStore::default());
        let prefs = PreferencesService::load(failing.clone());
        prefs.set_theme(ThemePreference::Light).unwrap();

        failing.set_failing(true);
        assert!(prefs.set_theme(ThemePreference::Dark).is_err());
        assert_eq!(prefs.theme(), ThemePreference::Light);
    }
}
