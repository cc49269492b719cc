//! Session persistence.
//!
//! A session is the pair of an opaque bearer token and the identifier of the
//! user it was issued to. Both values are written and cleared together; a
//! reader never observes one without the other.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Session file name inside the per-origin session directory
const SESSION_FILE: &str = "session.json";

/// Prefix of the scratch file used for atomic replacement of the session
/// file. The process id is appended so concurrent processes never share one.
const SESSION_TMP_PREFIX: &str = "session.json.tmp";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access session file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_identifier: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: impl Into<String>, user_identifier: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_identifier: user_identifier.into(),
            created_at: Utc::now(),
        }
    }
}

// The token is a credential; keep it out of logs and panic messages.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user_identifier", &self.user_identifier)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Durable storage of the current session.
///
/// Queries are synchronous and never touch the network. Implementations must
/// make `save` and `clear` all-or-nothing from the point of view of readers.
pub trait SessionStore: Send + Sync {
    /// Persist `session`, replacing any prior one.
    fn save(&self, session: Session) -> Result<(), StoreError>;

    /// Remove the stored session. Clearing an empty store is a no-op.
    fn clear(&self) -> Result<(), StoreError>;

    /// Snapshot of the stored session, if any.
    fn session(&self) -> Option<Session>;

    /// True iff a token is present. The token itself is not inspected.
    fn is_authenticated(&self) -> bool {
        self.current_token().is_some()
    }

    fn current_token(&self) -> Option<String> {
        self.session()
            .map(|s| s.token)
            .filter(|token| !token.is_empty())
    }

    fn current_user_identifier(&self) -> Option<String> {
        self.session().map(|s| s.user_identifier)
    }
}

/// On-disk layout, keyed the same way the web client keys its local storage.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSession {
    #[serde(rename = "authToken", default, skip_serializing_if = "Option::is_none")]
    auth_token: Option<String>,
    #[serde(rename = "userEmail", default, skip_serializing_if = "Option::is_none")]
    user_email: Option<String>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    fn into_session(self) -> Option<Session> {
        match (self.auth_token, self.user_email) {
            (Some(token), Some(user_identifier)) => Some(Session {
                token,
                user_identifier,
                created_at: self.created_at.unwrap_or_else(Utc::now),
            }),
            (None, None) => None,
            _ => {
                warn!("Session file holds only one of token and user, ignoring it");
                None
            }
        }
    }
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        Self {
            auth_token: Some(session.token.clone()),
            user_email: Some(session.user_identifier.clone()),
            created_at: Some(session.created_at),
        }
    }
}

/// Session store backed by a JSON file.
///
/// The file is replaced with a write-then-rename, so a crash mid-save leaves
/// either the old session or the new one on disk.
pub struct FileSessionStore {
    dir: PathBuf,
    current: RwLock<Option<Session>>,
}

impl FileSessionStore {
    /// Open the store rooted at `dir`, loading any session already on disk.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        let current = Self::load(&dir.join(SESSION_FILE))?;
        debug!(dir = %dir.display(), has_session = current.is_some(), "Session store opened");
        Ok(Self {
            dir,
            current: RwLock::new(current),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    fn tmp_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.{}", SESSION_TMP_PREFIX, std::process::id()))
    }

    fn load(path: &Path) -> Result<Option<Session>, StoreError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };

        match serde_json::from_str::<StoredSession>(&contents) {
            Ok(stored) => Ok(stored.into_session()),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Unreadable session file, ignoring it");
                Ok(None)
            }
        }
    }

    fn write(&self, stored: &StoredSession) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let contents = serde_json::to_string_pretty(stored)?;
        let tmp = self.tmp_path();

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        file.write_all(contents.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| StoreError::io(&tmp, e))?;
        drop(file);

        let path = self.path();
        fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, session: Session) -> Result<(), StoreError> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        self.write(&StoredSession::from(&session))?;
        *current = Some(session);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let path = self.path();
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(&path, e)),
        }
        *current = None;
        Ok(())
    }

    fn session(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// In-process session store; nothing survives a restart.
#[derive(Default)]
pub struct MemorySessionStore {
    current: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            current: RwLock::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: Session) -> Result<(), StoreError> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    fn session(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
