use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::ClientError;

/// Client-local persistence for the single session token.
pub trait TokenStore: Send {
    fn load(&self) -> Result<Option<String>, ClientError>;
    fn save(&mut self, token: &str) -> Result<(), ClientError>;
    fn clear(&mut self) -> Result<(), ClientError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryTokenStore {
    token: Option<String>,
}

impl MemoryTokenStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        Ok(self.token.clone())
    }

    fn save(&mut self, token: &str) -> Result<(), ClientError> {
        self.token = Some(token.to_owned());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ClientError> {
        self.token = None;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    token: String,
}

/// Keeps the token in a small JSON file, surviving restarts.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<local data dir>/blogcraft/session.json`, falling back to the
    /// working directory when the platform has no data dir.
    pub fn in_default_dir() -> Self {
        let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join("blogcraft").join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice::<TokenFile>(&bytes)?.token)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, token: &str) -> Result<(), ClientError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let body = serde_json::to_vec(&TokenFile {
            token: token.to_owned(),
        })?;
        std::fs::write(&self.path, body)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ClientError> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
