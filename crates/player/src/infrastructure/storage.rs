//! File-backed storage for the last joined session.
//!
//! Stores key-value pairs in a JSON file at:
//! - Linux: ~/.config/wordgrid/player/storage.json
//! - macOS: ~/Library/Application Support/io.wordgrid.player/storage.json
//! - Windows: C:\Users\<User>\AppData\Roaming\wordgrid\player\config\storage.json
//!
//! A restarted client reads the saved session back and rejoins with the same
//! player id.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use wordgrid_shared::{PlayerId, SessionCode};

use crate::identity::ConnectParams;

const SESSION_KEY: &str = "session";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("storage data is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Identity needed to rejoin a session after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSession {
    pub code: SessionCode,
    pub player_id: PlayerId,
    pub name: String,
    pub avatar: String,
}

impl From<&ConnectParams> for SavedSession {
    fn from(params: &ConnectParams) -> Self {
        Self {
            code: params.code.clone(),
            player_id: params.player_id.clone(),
            name: params.name.clone(),
            avatar: params.avatar.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionStorage {
    path: PathBuf,
}

impl SessionStorage {
    /// Storage in the platform config directory, or the working directory when
    /// none is available.
    pub fn new() -> Self {
        let path = match ProjectDirs::from("io", "wordgrid", "player") {
            Some(dirs) => dirs.config_dir().join("storage.json"),
            None => PathBuf::from("wordgrid_storage.json"),
        };
        tracing::debug!(path = %path.display(), "Session storage initialized");
        Self { path }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved session, if any. A malformed entry is treated as absent.
    pub fn load(&self) -> Result<Option<SavedSession>, StorageError> {
        let entries = self.read()?;
        let Some(raw) = entries.get(SESSION_KEY) else {
            return Ok(None);
        };
        match serde_json::from_value(raw.clone()) {
            Ok(saved) => Ok(Some(saved)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed saved session");
                Ok(None)
            }
        }
    }

    pub fn save(&self, session: &SavedSession) -> Result<(), StorageError> {
        let mut entries = self.read()?;
        entries.insert(SESSION_KEY.to_string(), serde_json::to_value(session)?);
        self.write(&entries)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        let mut entries = self.read()?;
        if entries.remove(SESSION_KEY).is_some() {
            self.write(&entries)?;
        }
        Ok(())
    }

    fn read(&self) -> Result<HashMap<String, serde_json::Value>, StorageError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let data = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;
        match serde_json::from_str(&data) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse storage file, starting empty");
                Ok(HashMap::new())
            }
        }
    }

    fn write(&self, entries: &HashMap<String, serde_json::Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let data = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, data).map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Default for SessionStorage {
    fn default() -> Self {
        Self::new()
    }
}
