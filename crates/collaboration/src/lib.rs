/// Meme collaboration core
/// Co-editing, forking and versioning of meme projects with role-based access
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod roles;
pub use roles::*;

mod settings;
pub use settings::*;

mod history;
pub use history::*;

mod invites;
pub use invites::*;

mod aggregate;
pub use aggregate::*;

mod views;
pub use views::*;

mod memes;
pub use memes::*;

mod store;
pub use store::*;

mod service;
pub use service::*;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaborationError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("capacity exceeded: {0}")]
    Capacity(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("revision conflict: expected {expected}, found {actual}")]
    RevisionConflict { expected: u64, actual: u64 },

    #[error("storage error: {0}")]
    Storage(String),
}

impl CollaborationError {
    /// Only revision conflicts are worth retrying; everything else is a business rule.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CollaborationError::RevisionConflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, CollaborationError>;

/// User identifier supplied by the identity context
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collaboration identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollaborationId(pub uuid::Uuid);

impl CollaborationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CollaborationError::NotFound(format!("collaboration {}", s)))
    }
}

impl Default for CollaborationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CollaborationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Reference to a meme owned by the meme-management subsystem
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemeId(pub String);

impl MemeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for MemeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
