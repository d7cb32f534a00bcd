//! Error types shared by the scheduler, selector, store and session.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid grade {0}: expected 1 (again), 2 (hard), 3 (good) or 4 (easy)")]
    InvalidGrade(u8),

    #[error("Card not found: {0}")]
    MissingCard(String),

    /// The stored collection could not be parsed. The store refuses to
    /// overwrite it until the file is explicitly quarantined.
    #[error("Corrupt persisted state in {path:?}: {source}")]
    CorruptPersistedState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to persist {path:?}: {source}")]
    PersistenceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Invalid card: {0}")]
    InvalidCard(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PersistenceIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::CorruptPersistedState {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
