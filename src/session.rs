//! Saved login session.
//!
//! `session.yaml` in the data directory keeps the signed-in user and the
//! cookies the server set at login, so later invocations stay signed in.

use coursenotes_core::{AuthProvider, CurrentUser, EntityId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Contents of `session.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: EntityId,
    pub username: String,
    /// `name=value` pairs to put back into the cookie jar.
    #[serde(default)]
    pub cookies: Vec<String>,
}

#[derive(Debug)]
pub enum SessionError {
    Read(PathBuf, std::io::Error),
    Parse(PathBuf, serde_yaml::Error),
    Write(PathBuf, std::io::Error),
    Encode(serde_yaml::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Read(path, e) => {
                write!(f, "Failed to read session '{}': {}", path.display(), e)
            }
            SessionError::Parse(path, e) => {
                write!(f, "Failed to parse session '{}': {}", path.display(), e)
            }
            SessionError::Write(path, e) => {
                write!(f, "Failed to write session '{}': {}", path.display(), e)
            }
            SessionError::Encode(e) => write!(f, "Failed to encode session: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

/// File-backed [`AuthProvider`].
#[derive(Debug)]
pub struct SessionAuth {
    path: PathBuf,
    data: Mutex<Option<SessionData>>,
}

impl SessionAuth {
    /// Loads the session at `path`. A missing file means signed out.
    pub fn load(path: PathBuf) -> Result<Self, SessionError> {
        let data = if path.exists() {
            let contents =
                std::fs::read_to_string(&path).map_err(|e| SessionError::Read(path.clone(), e))?;
            let data = serde_yaml::from_str(&contents)
                .map_err(|e| SessionError::Parse(path.clone(), e))?;
            Some(data)
        } else {
            None
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> Option<SessionData> {
        self.lock().clone()
    }

    pub fn cookies(&self) -> Vec<String> {
        self.lock()
            .as_ref()
            .map(|data| data.cookies.clone())
            .unwrap_or_default()
    }

    /// Writes `data` to disk and makes it the current session.
    pub fn save(&self, data: SessionData) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SessionError::Write(self.path.clone(), e))?;
        }
        let yaml = serde_yaml::to_string(&data).map_err(SessionError::Encode)?;
        std::fs::write(&self.path, yaml).map_err(|e| SessionError::Write(self.path.clone(), e))?;
        *self.lock() = Some(data);
        Ok(())
    }

    /// Forgets the session and removes the file. Returns false if there was
    /// nothing to forget.
    pub fn clear(&self) -> Result<bool, SessionError> {
        let had_session = self.lock().take().is_some();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(had_session),
            Err(e) => Err(SessionError::Write(self.path.clone(), e)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<SessionData>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AuthProvider for SessionAuth {
    fn current_user(&self) -> Option<CurrentUser> {
        self.lock().as_ref().map(|data| CurrentUser {
            id: data.user_id,
            username: data.username.clone(),
        })
    }

    fn logout(&self) {
        match self.clear() {
            Ok(_) => tracing::info!("session cleared"),
            Err(e) => tracing::warn!("{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> SessionData {
        SessionData {
            user_id: 7,
            username: "ada".to_string(),
            cookies: vec!["access_token_cookie=abc".to_string()],
        }
    }

    #[test]
    fn test_missing_file_is_signed_out() {
        let temp_dir = tempdir().unwrap();
        let auth = SessionAuth::load(temp_dir.path().join("session.yaml")).unwrap();
        assert_eq!(auth.current_user(), None);
        assert!(auth.cookies().is_empty());
    }

    #[test]
    fn test_save_then_reload() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("session.yaml");

        let auth = SessionAuth::load(path.clone()).unwrap();
        auth.save(sample()).unwrap();
        assert_eq!(auth.current_user().map(|u| u.id), Some(7));

        let reloaded = SessionAuth::load(path).unwrap();
        assert_eq!(reloaded.data(), Some(sample()));
        assert_eq!(reloaded.cookies(), vec!["access_token_cookie=abc".to_string()]);
    }

    #[test]
    fn test_logout_removes_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("session.yaml");
        let auth = SessionAuth::load(path.clone()).unwrap();
        auth.save(sample()).unwrap();

        auth.logout();
        assert_eq!(auth.current_user(), None);
        assert!(!path.exists());
        assert!(!auth.clear().unwrap());
    }

    #[test]
    fn test_corrupt_session_is_an_error() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("session.yaml");
        std::fs::write(&path, "user_id: [").unwrap();

        let err = SessionAuth::load(path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse session"));
    }
}
