// src/errors.rs
//! Crate error taxonomy.
//!
//! Only genuine failures live here. A conflict rejection is a normal gate
//! outcome (`GateOutcome::Rejected`), not an error.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or incomplete snapshot input. The current turn is skipped;
    /// the store is never mutated. A missing declared signal lands here
    /// instead of silently defaulting to zero.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Persisted store state is unreadable. Fatal to startup: every later
    /// accept/reject decision depends on store state, so there is no
    /// auto-repair path that silently drops rules.
    #[error("corrupt store at {path}: {reason}")]
    CorruptStore { path: PathBuf, reason: String },

    /// Invalid configuration (e.g. ranker weights summing to zero).
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid_snapshot(msg: impl Into<String>) -> Self {
        Error::InvalidSnapshot(msg.into())
    }

    pub fn corrupt_store(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptStore {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
