/// Membership records: current collaborators and pending invitations
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Role, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub user_id: UserId,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

/// Whether a pending entry was offered by a member or requested by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteKind {
    /// Offered by the owner or an editor; resolved by the invitee
    #[default]
    Invitation,

    /// Raised by the user via join; resolved by the owner
    JoinRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInvite {
    pub user_id: UserId,
    pub role: Role,
    pub invited_by: UserId,
    pub invited_at: DateTime<Utc>,
    pub message: Option<String>,
    #[serde(default)]
    pub kind: InviteKind,
}

impl PendingInvite {
    pub fn is_expired(&self, cutoff: DateTime<Utc>) -> bool {
        self.invited_at < cutoff
    }
}
