//! Discovery and management of the DataSmith data directory.
//!
//! The data directory holds `config.db` (saved credentials, specs and the
//! usage ledger) and `logs/` (per-database SQL logs plus the server's
//! `runner.log`). The `DATASMITH_DIR` environment variable overrides the
//! default of `~/.datasmith`.

use std::path::{Path, PathBuf};

/// The name of the default data directory under the user's home.
const DATA_DIR_NAME: &str = ".datasmith";

/// Environment variable that overrides the data directory.
const DATA_DIR_ENV: &str = "DATASMITH_DIR";

/// Errors raised while resolving or creating the data directory.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine a home directory; set {DATA_DIR_ENV}")]
    HomeNotFound,

    #[error("failed to create data directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to the resolved data directory and the standard paths inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolves the data directory: `DATASMITH_DIR` first, then
    /// `~/.datasmith`.
    pub fn resolve() -> Result<Self, ConfigError> {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.is_empty() {
                return Ok(Self {
                    root: PathBuf::from(dir),
                });
            }
        }
        let home = home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(Self {
            root: home.join(DATA_DIR_NAME),
        })
    }

    /// Uses an explicit directory (tests, `--data-dir`).
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { root: path.into() }
    }

    /// Creates the directory tree (root and `logs/`) if missing.
    pub fn ensure(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the embedded preferences database.
    pub fn config_db(&self) -> PathBuf {
        self.root.join("config.db")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Per-database SQL statement log.
    pub fn sql_log(&self, db_name: &str) -> PathBuf {
        self.logs_dir().join(format!("{db_name}.sql.log"))
    }

    /// The server's own activity log.
    pub fn runner_log(&self) -> PathBuf {
        self.logs_dir().join("runner.log")
    }
}

/// Get the user's home directory.
fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_paths() {
        let dir = DataDir::at("/tmp/ds-test");
        assert_eq!(dir.config_db(), PathBuf::from("/tmp/ds-test/config.db"));
        assert_eq!(
            dir.sql_log("school"),
            PathBuf::from("/tmp/ds-test/logs/school.sql.log")
        );
        assert_eq!(
            dir.runner_log(),
            PathBuf::from("/tmp/ds-test/logs/runner.log")
        );
    }

    #[test]
    fn ensure_creates_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::at(tmp.path().join("ds"));
        dir.ensure().unwrap();
        assert!(dir.logs_dir().is_dir());
        // Idempotent.
        dir.ensure().unwrap();
    }
}
