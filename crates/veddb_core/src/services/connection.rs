//! Registry of saved connection profiles.
//!
//! Provides:
//! - Profile creation with collision-free ids
//! - Partial updates that the active reference observes immediately
//! - Whole-state persistence on every mutation (passwords included,
//!   `connected` flags always written as `false`)

use crate::error::VeddbError;
use crate::models::{ConnectionProfile, ConnectionStoreState, ProfileDraft, ProfilePatch};
use crate::services::storage::{load_or_default, save_record, StateStore, CONNECTIONS_KEY};

use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// Durable registry of saved connection profiles and the active one.
///
/// Mutations are serialized through the write lock; readers get snapshots.
pub struct ConnectionStore {
    state: RwLock<ConnectionStoreState>,
    persistence: Arc<dyn StateStore>,
}

impl ConnectionStore {
    /// Load the store from persistence.
    ///
    /// Missing or corrupt state yields an empty store.
    pub fn load(persistence: Arc<dyn StateStore>) -> Self {
        let mut state: ConnectionStoreState = load_or_default(persistence.as_ref(), CONNECTIONS_KEY);
        state.normalize_after_load();

        tracing::debug!(
            profiles = state.profiles.len(),
            active = ?state.active_profile_id,
            store = persistence.name(),
            "Connection store loaded"
        );

        Self { state: RwLock::new(state), persistence }
    }

    /// Add a new profile with a fresh id.
    pub fn add(&self, draft: ProfileDraft) -> Result<ConnectionProfile, VeddbError> {
        draft.validate()?;

        let mut state = self.state.write();
        let mut id = Uuid::new_v4();
        while state.contains(id) {
            id = Uuid::new_v4();
        }

        let profile = ConnectionProfile::from_draft(id, draft);
        let mut next = state.clone();
        next.profiles.push(profile.clone());
        self.commit(&mut state, next)?;

        tracing::debug!(profile_id = %id, name = %profile.name, "Connection profile added");
        Ok(profile)
    }

    /// Merge fields into a profile.
    ///
    /// Returns `false` (and changes nothing) if the id is unknown.
    pub fn update(&self, id: Uuid, patch: ProfilePatch) -> Result<bool, VeddbError> {
        let mut state = self.state.write();
        let mut next = state.clone();
        let Some(profile) = next.get_mut(id) else {
            tracing::debug!(profile_id = %id, "Update ignored for unknown profile");
            return Ok(false);
        };

        profile.apply(patch);
        profile.to_draft().validate()?;
        self.commit(&mut state, next)?;
        tracing::debug!(profile_id = %id, "Connection profile updated");
        Ok(true)
    }

    /// Remove a profile, clearing the active reference if it pointed here.
    pub fn remove(&self, id: Uuid) -> Result<Option<ConnectionProfile>, VeddbError> {
        let mut state = self.state.write();
        let Some(index) = state.profiles.iter().position(|p| p.id == id) else {
            return Ok(None);
        };

        let mut next = state.clone();
        let removed = next.profiles.remove(index);
        if next.active_profile_id == Some(id) {
            next.active_profile_id = None;
        }
        self.commit(&mut state, next)?;

        tracing::debug!(profile_id = %id, "Connection profile removed");
        Ok(Some(removed))
    }

    /// Select the active profile, or clear the selection.
    ///
    /// Connectivity is established elsewhere; this only records the choice.
    pub fn set_active(&self, id: Option<Uuid>) -> Result<(), VeddbError> {
        let mut state = self.state.write();
        if let Some(id) = id {
            if !state.contains(id) {
                return Err(VeddbError::validation(format!("Unknown connection profile: {id}")));
            }
        }

        let next = ConnectionStoreState { active_profile_id: id, ..state.clone() };
        self.commit(&mut state, next)?;

        tracing::debug!(profile_id = ?id, "Active connection changed");
        Ok(())
    }

    /// Record runtime connectivity reported by the transport. Not persisted.
    pub fn set_connected(&self, id: Uuid, connected: bool) -> bool {
        let mut state = self.state.write();
        match state.get_mut(id) {
            Some(profile) => {
                profile.connected = connected;
                tracing::debug!(profile_id = %id, connected, "Connection status changed");
                true
            }
            None => false,
        }
    }

    /// Get a profile by id.
    pub fn get(&self, id: Uuid) -> Option<ConnectionProfile> {
        self.state.read().get(id).cloned()
    }

    /// Get all profiles in insertion order.
    pub fn list(&self) -> Vec<ConnectionProfile> {
        self.state.read().profiles.clone()
    }

    /// Get the active profile as it is right now.
    pub fn active_profile(&self) -> Option<ConnectionProfile> {
        self.state.read().active().cloned()
    }

    /// Get the active profile id.
    pub fn active_profile_id(&self) -> Option<Uuid> {
        self.state.read().active_profile_id
    }

    /// Get a copy of the whole state.
    pub fn snapshot(&self) -> ConnectionStoreState {
        self.state.read().clone()
    }

    /// Persist `next`, then make it the current state.
    ///
    /// On failure the current state is left as it was.
    fn commit(
        &self,
        current: &mut ConnectionStoreState,
        next: ConnectionStoreState,
    ) -> Result<(), VeddbError> {
        save_record(self.persistence.as_ref(), CONNECTIONS_KEY, &next).inspect_err(|e| {
            tracing::warn!(error = %e, "Failed to persist connection store");
        })?;
        *current = next;
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ConnectionStore")
            .field("profiles", &state.profiles.len())
            .field("active_profile_id", &state.active_profile_id)
            .field("persistence", &self.persistence.name())
            .finish()
    }
}
