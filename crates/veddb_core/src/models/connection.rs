//! Connection profile models.

use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::error::VeddbError;

/// Default VedDB server port.
pub const DEFAULT_PORT: u16 = 50051;

/// A saved set of connection parameters for one database instance.
///
/// The password lives here and in durable local storage, but never in the
/// portable `.veddb` export format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    /// Unique identifier, immutable once assigned
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Server hostname or IP
    pub host: String,
    /// Server port
    pub port: u16,
    /// Login username
    pub username: Option<String>,
    /// Login password
    pub password: Option<String>,
    /// Whether the transport should use TLS
    pub tls_enabled: bool,
    /// Runtime-only connectivity flag, always persisted as `false`
    #[serde(default, serialize_with = "serialize_disconnected")]
    pub connected: bool,
}

fn serialize_disconnected<S: Serializer>(_: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_bool(false)
}

impl ConnectionProfile {
    /// Build a profile from a draft with the given id.
    pub fn from_draft(id: Uuid, draft: ProfileDraft) -> Self {
        Self {
            id,
            name: draft.name,
            host: draft.host,
            port: draft.port,
            username: draft.username,
            password: draft.password,
            tls_enabled: draft.tls_enabled,
            connected: false,
        }
    }

    /// Strip the identity and runtime status, keeping the editable fields.
    pub fn to_draft(&self) -> ProfileDraft {
        ProfileDraft {
            name: self.name.clone(),
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            tls_enabled: self.tls_enabled,
        }
    }

    /// Merge a patch into this profile. The id is never touched.
    pub fn apply(&mut self, patch: ProfilePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(host) = patch.host {
            self.host = host;
        }
        if let Some(port) = patch.port {
            self.port = port;
        }
        if let Some(username) = patch.username {
            self.username = username;
        }
        if let Some(password) = patch.password {
            self.password = password;
        }
        if let Some(tls_enabled) = patch.tls_enabled {
            self.tls_enabled = tls_enabled;
        }
    }

    /// Get the display address (without credentials).
    pub fn display_url(&self) -> String {
        let scheme = if self.tls_enabled { "veddbs" } else { "veddb" };
        match &self.username {
            Some(user) => format!("{scheme}://{user}@{}:{}", self.host, self.port),
            None => format!("{scheme}://{}:{}", self.host, self.port),
        }
    }
}

/// A connection profile without id and runtime status.
///
/// Input of `ConnectionStore::add` and output of a portable file import.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileDraft {
    /// Display name
    pub name: String,
    /// Server hostname or IP
    pub host: String,
    /// Server port
    pub port: u16,
    /// Login username
    pub username: Option<String>,
    /// Login password
    pub password: Option<String>,
    /// Whether the transport should use TLS
    pub tls_enabled: bool,
}

impl ProfileDraft {
    /// Create a new draft with required fields and the default port.
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self { name: name.into(), host: host.into(), port: DEFAULT_PORT, ..Default::default() }
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Enable or disable TLS.
    pub fn with_tls(mut self, tls_enabled: bool) -> Self {
        self.tls_enabled = tls_enabled;
        self
    }

    /// Validate the required fields.
    pub fn validate(&self) -> Result<(), VeddbError> {
        if self.name.trim().is_empty() {
            return Err(VeddbError::validation_field("name", "Name is required"));
        }
        if self.host.trim().is_empty() {
            return Err(VeddbError::validation_field("host", "Host is required"));
        }
        if self.port == 0 {
            return Err(VeddbError::validation_field("port", "Port must be between 1 and 65535"));
        }
        Ok(())
    }
}

/// Partial update for a connection profile.
///
/// `None` leaves a field untouched. For the nullable fields, `Some(None)`
/// clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<Option<String>>,
    pub password: Option<Option<String>>,
    pub tls_enabled: Option<bool>,
}

impl ProfilePatch {
    /// Set a new name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set a new host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set a new port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set or clear the username.
    pub fn username(mut self, username: Option<String>) -> Self {
        self.username = Some(username);
        self
    }

    /// Set or clear the password.
    pub fn password(mut self, password: Option<String>) -> Self {
        self.password = Some(password);
        self
    }

    /// Set TLS on or off.
    pub fn tls_enabled(mut self, tls_enabled: bool) -> Self {
        self.tls_enabled = Some(tls_enabled);
        self
    }
}

/// Persisted state of the connection registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStoreState {
    /// Saved profiles in insertion order, unique by id
    #[serde(default)]
    pub profiles: Vec<ConnectionProfile>,
    /// Currently selected profile
    #[serde(default)]
    pub active_profile_id: Option<Uuid>,
}

impl ConnectionStoreState {
    /// Find a profile by id.
    pub fn get(&self, id: Uuid) -> Option<&ConnectionProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// Find a profile by id for mutation.
    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut ConnectionProfile> {
        self.profiles.iter_mut().find(|p| p.id == id)
    }

    /// Check whether an id is in use.
    pub fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    /// Get the active profile, if any.
    pub fn active(&self) -> Option<&ConnectionProfile> {
        self.active_profile_id.and_then(|id| self.get(id))
    }

    /// Reset runtime-only fields and repair references after loading.
    pub fn normalize_after_load(&mut self) {
        for profile in &mut self.profiles {
            profile.connected = false;
        }

        let mut seen = std::collections::HashSet::new();
        self.profiles.retain(|p| seen.insert(p.id));

        if let Some(active) = self.active_profile_id {
            if !self.contains(active) {
                tracing::warn!(profile_id = %active, "Dropping dangling active profile reference");
                self.active_profile_id = None;
            }
        }
    }
}
