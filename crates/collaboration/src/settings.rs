/// Per-collaboration settings
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CollaborationError, Result};

pub const MIN_COLLABORATORS: u32 = 2;
pub const MAX_COLLABORATORS: u32 = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollaborationSettings {
    pub is_public: bool,
    pub allow_forks: bool,
    pub require_approval: bool,

    /// Upper bound on members, owner included (2-50)
    pub max_collaborators: u32,

    pub allow_anonymous: bool,

    /// Informational only; mutations are not blocked once it has passed
    pub deadline: Option<DateTime<Utc>>,
}

impl Default for CollaborationSettings {
    fn default() -> Self {
        Self {
            is_public: true,
            allow_forks: true,
            require_approval: false,
            max_collaborators: 10,
            allow_anonymous: false,
            deadline: None,
        }
    }
}

impl CollaborationSettings {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_COLLABORATORS..=MAX_COLLABORATORS).contains(&self.max_collaborators) {
            return Err(CollaborationError::Validation(format!(
                "maxCollaborators must be between {} and {}",
                MIN_COLLABORATORS, MAX_COLLABORATORS
            )));
        }
        Ok(())
    }

    /// Deadline flag computed at read time
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.deadline.map_or(true, |deadline| now < deadline)
    }
}
