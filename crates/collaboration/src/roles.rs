/// Collaboration roles and the acting principal
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{CollaborationError, UserId};

/// Permission tier inside a collaboration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Editor,
    Contributor,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Editor => "editor",
            Role::Contributor => "contributor",
            Role::Viewer => "viewer",
        }
    }

    /// Roles that can be granted to a collaborator (everything but owner)
    pub fn is_assignable(&self) -> bool {
        !matches!(self, Role::Owner)
    }

    pub fn can_invite(&self) -> bool {
        matches!(self, Role::Owner | Role::Editor)
    }

    pub fn can_add_version(&self) -> bool {
        matches!(self, Role::Owner | Role::Editor | Role::Contributor)
    }

    pub fn can_manage(&self) -> bool {
        matches!(self, Role::Owner)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CollaborationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "editor" => Ok(Role::Editor),
            "contributor" => Ok(Role::Contributor),
            "viewer" => Ok(Role::Viewer),
            other => Err(CollaborationError::Validation(format!(
                "unknown role '{}'",
                other
            ))),
        }
    }
}

/// Platform-wide role from the identity context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformRole {
    #[default]
    User,
    Admin,
}

impl FromStr for PlatformRole {
    type Err = CollaborationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(PlatformRole::User),
            "admin" => Ok(PlatformRole::Admin),
            other => Err(CollaborationError::Validation(format!(
                "unknown platform role '{}'",
                other
            ))),
        }
    }
}

/// Authenticated principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: UserId,
    pub role: PlatformRole,
}

impl Principal {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(user_id),
            role: PlatformRole::User,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(user_id),
            role: PlatformRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == PlatformRole::Admin
    }
}
