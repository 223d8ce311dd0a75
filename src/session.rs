//! Session record persistence.
//!
//! A [`SessionRecord`] is written when a lobby is created or joined, read once
//! at the start of every connection lifetime to decide whether to attempt a
//! resume, and erased on leave or on a failed resume. At most one record
//! exists per client.
//!
//! Stores are plain data access with no business logic. Two backends ship
//! with the crate:
//!
//! | Store                  | Survives                                  |
//! |------------------------|-------------------------------------------|
//! | [`MemorySessionStore`] | transport drops within one process        |
//! | [`FileSessionStore`]   | process restarts sharing the same directory |

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PartyError, Result};
use crate::protocol::PlayerId;

/// Well-known key under which the session record is stored.
pub const SESSION_STORAGE_KEY: &str = "drinkingames_session";

/// Identity needed to resume a lobby membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub player_id: PlayerId,
    pub username: String,
    pub lobby_code: String,
}

/// Durable storage for the single [`SessionRecord`].
pub trait SessionStore: Send + Sync + 'static {
    /// Persist `record`, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns [`PartyError::Storage`] or [`PartyError::Io`] if the record
    /// could not be written.
    fn save(&self, record: &SessionRecord) -> Result<()>;

    /// Load the stored record, if any.
    ///
    /// # Errors
    ///
    /// Returns an error only for storage failures; a missing record is `Ok(None)`.
    fn load(&self) -> Result<Option<SessionRecord>>;

    /// Erase the stored record. Clearing an empty store is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage could not be modified.
    fn clear(&self) -> Result<()>;
}

impl<S: SessionStore> SessionStore for Arc<S> {
    fn save(&self, record: &SessionRecord) -> Result<()> {
        (**self).save(record)
    }

    fn load(&self) -> Result<Option<SessionRecord>> {
        (**self).load()
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

// ── In-memory store ─────────────────────────────────────────────────

/// Process-lifetime store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    record: Mutex<Option<SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `record`.
    pub fn with_record(record: SessionRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<SessionRecord>>> {
        self.record
            .lock()
            .map_err(|_| PartyError::Storage("session store lock poisoned".into()))
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, record: &SessionRecord) -> Result<()> {
        *self.slot()? = Some(record.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<SessionRecord>> {
        Ok(self.slot()?.clone())
    }

    fn clear(&self) -> Result<()> {
        *self.slot()? = None;
        Ok(())
    }
}

// ── File store ──────────────────────────────────────────────────────

/// JSON file store, one file named after [`SESSION_STORAGE_KEY`].
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store the record in `dir/drinkingames_session.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{SESSION_STORAGE_KEY}.json")),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, record: &SessionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(record)?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), "session record saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<SessionRecord>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                // An unreadable record cannot be resumed; treat it as absent.
                warn!(path = %self.path.display(), "discarding corrupt session record: {e}");
                Ok(None)
            }
        }
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "session record cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn record() -> SessionRecord {
        SessionRecord {
            player_id: "p1".into(),
            username: "alice".into(),
            lobby_code: "ABCD".into(),
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "drinkingames-client-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn memory_store_save_load_clear() {
        let store = MemorySessionStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save(&record()).unwrap();
        assert_eq!(store.load().unwrap(), Some(record()));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn memory_store_keeps_one_record() {
        let store = MemorySessionStore::with_record(record());
        let mut other = record();
        other.lobby_code = "WXYZ".into();
        store.save(&other).unwrap();
        assert_eq!(store.load().unwrap().unwrap().lobby_code, "WXYZ");
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = scratch_dir("persist");
        FileSessionStore::in_dir(&dir).save(&record()).unwrap();

        let reopened = FileSessionStore::in_dir(&dir);
        assert!(reopened
            .path()
            .ends_with(format!("{SESSION_STORAGE_KEY}.json")));
        assert_eq!(reopened.load().unwrap(), Some(record()));

        let raw = std::fs::read_to_string(reopened.path()).unwrap();
        assert!(raw.contains("\"lobbyCode\""));

        reopened.clear().unwrap();
        assert_eq!(reopened.load().unwrap(), None);
        reopened.clear().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_store_treats_corrupt_record_as_absent() {
        let dir = scratch_dir("corrupt");
        let store = FileSessionStore::in_dir(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(store.path(), b"{not json").unwrap();
        assert_eq!(store.load().unwrap(), None);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
