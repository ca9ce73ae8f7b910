//! Portable `.veddb` connection files.
//!
//! File shape (UTF-8 JSON):
//!
//! ```text
//! {
//!   "version": "1.0",
//!   "connection": { "name": "Prod", "host": "db.internal", "port": 50051, "username": "ops", "tls": true }
//! }
//! ```
//!
//! Passwords never appear in the file. Unknown fields are ignored on import.

use crate::error::VeddbError;
use crate::models::{ConnectionProfile, ProfileDraft};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Current portable file format version.
pub const FORMAT_VERSION: &str = "1.0";

/// File extension for portable connection files.
pub const FILE_EXTENSION: &str = "veddb";

/// Native file dialogs, supplied by the host UI.
///
/// `None` means the user cancelled the dialog.
pub trait FilePicker {
    /// Ask for a destination path to save a file.
    fn pick_save_path(&self, suggested_name: &str) -> Option<PathBuf>;

    /// Ask for an existing file to open.
    fn pick_open_path(&self) -> Option<PathBuf>;
}

#[derive(Serialize)]
struct PortableFile<'a> {
    version: &'a str,
    connection: PortableConnection<'a>,
}

#[derive(Serialize)]
struct PortableConnection<'a> {
    name: &'a str,
    host: &'a str,
    port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    tls: bool,
}

#[derive(Deserialize)]
struct ImportedConnection {
    name: Option<String>,
    host: Option<String>,
    port: Option<Value>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    tls: Option<bool>,
}

/// Encoder/decoder for single connection profiles.
pub struct ProfileCodec;

impl ProfileCodec {
    /// Encode a profile as a portable document. The password is omitted.
    pub fn encode(profile: &ConnectionProfile) -> Result<String, VeddbError> {
        let file = PortableFile {
            version: FORMAT_VERSION,
            connection: PortableConnection {
                name: &profile.name,
                host: &profile.host,
                port: profile.port,
                username: profile.username.as_deref(),
                tls: profile.tls_enabled,
            },
        };

        serde_json::to_string_pretty(&file).map_err(|e| {
            VeddbError::encoding_with_source("Failed to encode connection profile", e)
        })
    }

    /// Decode a portable document into a draft with no password.
    pub fn decode(text: &str) -> Result<ProfileDraft, VeddbError> {
        let document: Value = serde_json::from_str(text)
            .map_err(|e| VeddbError::format(format!("Not a valid connection file: {e}")))?;

        let Value::Object(mut root) = document else {
            return Err(VeddbError::format("Connection file must be a JSON object"));
        };

        match root.get("version") {
            Some(Value::String(version)) => {
                if version != FORMAT_VERSION {
                    tracing::debug!(version = %version, "Importing connection file with newer format");
                }
            }
            Some(_) => return Err(VeddbError::format("Field 'version' must be a string")),
            None => return Err(VeddbError::format("Missing 'version' field")),
        }

        let connection = match root.remove("connection") {
            Some(value @ Value::Object(_)) => value,
            Some(_) => return Err(VeddbError::format("Field 'connection' must be an object")),
            None => return Err(VeddbError::format("Missing 'connection' field")),
        };

        let imported: ImportedConnection = serde_json::from_value(connection)
            .map_err(|e| VeddbError::validation(format!("Invalid connection fields: {e}")))?;

        let name = imported
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| VeddbError::validation_field("name", "Connection name is required"))?;
        let host = imported
            .host
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| VeddbError::validation_field("host", "Connection host is required"))?;
        let port = imported
            .port
            .as_ref()
            .and_then(parse_port)
            .ok_or_else(|| VeddbError::validation_field("port", "A valid port is required"))?;

        Ok(ProfileDraft {
            name,
            host,
            port,
            username: imported.username,
            password: None,
            tls_enabled: imported.tls.unwrap_or(false),
        })
    }

    /// Suggested file name for an exported profile.
    pub fn suggested_file_name(profile: &ConnectionProfile) -> String {
        let stem: String = profile
            .name
            .trim()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let stem = if stem.is_empty() { "connection".to_string() } else { stem };
        format!("{stem}.{FILE_EXTENSION}")
    }

    /// Export a profile through the save dialog.
    ///
    /// Returns the written path, or `None` when the user cancelled.
    pub fn export_profile(
        profile: &ConnectionProfile,
        picker: &dyn FilePicker,
    ) -> Result<Option<PathBuf>, VeddbError> {
        let Some(path) = picker.pick_save_path(&Self::suggested_file_name(profile)) else {
            tracing::debug!(profile_id = %profile.id, "Export cancelled");
            return Ok(None);
        };

        Self::write_file(profile, &path)?;
        tracing::info!(profile_id = %profile.id, path = %path.display(), "Connection exported");
        Ok(Some(path))
    }

    /// Import a profile through the open dialog.
    ///
    /// Returns `None` when the user cancelled. Never touches the connection
    /// store; the caller adds the draft once the password is re-entered.
    pub fn import_profile(picker: &dyn FilePicker) -> Result<Option<ProfileDraft>, VeddbError> {
        let Some(path) = picker.pick_open_path() else {
            tracing::debug!("Import cancelled");
            return Ok(None);
        };

        let draft = Self::read_file(&path)?;
        tracing::info!(path = %path.display(), name = %draft.name, "Connection imported");
        Ok(Some(draft))
    }

    /// Write a profile to a path.
    pub fn write_file(profile: &ConnectionProfile, path: &Path) -> Result<(), VeddbError> {
        let text = Self::encode(profile)?;
        std::fs::write(path, text).map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write connection file");
            VeddbError::encoding_with_source(
                format!("Failed to write '{}'", path.display()),
                e,
            )
        })
    }

    /// Read a profile draft from a path.
    pub fn read_file(path: &Path) -> Result<ProfileDraft, VeddbError> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => VeddbError::format(format!(
                "'{}' is not a UTF-8 text file",
                path.display()
            )),
            _ => VeddbError::from(e),
        })?;
        Self::decode(&text)
    }
}

fn parse_port(value: &Value) -> Option<u16> {
    let port = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    u16::try_from(port).ok().filter(|p| *p != 0)
}
