//! Last-used file memory
//!
//! `assemble` and `send` remember the source they worked on so the next
//! invocation can omit the path.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Persisted session state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    /// Source file used most recently
    pub last_file: Option<PathBuf>,
}

impl Session {
    /// Default location of the session file
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "r31jp").map(|dirs| dirs.data_dir().join("session.toml"))
    }

    /// Load a session file; a missing file yields an empty session
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the session file, creating its directory if needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string(self)?)?;
        Ok(())
    }

    /// Pick the source file: the explicit one, else the remembered one
    pub fn resolve_source(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        match explicit {
            Some(path) => Ok(path.to_path_buf()),
            None => {
                let path = self.last_file.clone().ok_or(Error::NoSourceFile)?;
                log::info!("Using last file {}", path.display());
                Ok(path)
            }
        }
    }

    /// Remember a source file, stored as an absolute path when possible
    pub fn remember(&mut self, path: &Path) {
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.last_file = Some(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::load_from(&dir.path().join("session.toml")).unwrap();
        assert_eq!(session, Session::default());
    }

    #[test]
    fn test_remember_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("lab.asm");
        fs::write(&src, "nop\n").unwrap();
        let path = dir.path().join("state").join("session.toml");

        let mut session = Session::default();
        session.remember(&src);
        session.save_to(&path).unwrap();

        let reloaded = Session::load_from(&path).unwrap();
        assert_eq!(reloaded.last_file, Some(fs::canonicalize(&src).unwrap()));
    }

    #[test]
    fn test_resolve_source() {
        let session = Session {
            last_file: Some(PathBuf::from("/tmp/last.asm")),
        };
        assert_eq!(
            session.resolve_source(Some(Path::new("new.asm"))).unwrap(),
            PathBuf::from("new.asm")
        );
        assert_eq!(
            session.resolve_source(None).unwrap(),
            PathBuf::from("/tmp/last.asm")
        );
        assert!(matches!(
            Session::default().resolve_source(None),
            Err(Error::NoSourceFile)
        ));
    }
}
