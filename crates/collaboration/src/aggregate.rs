/// Collaboration aggregate
/// Holds all state owned by one collaboration and validates every transition.
/// No I/O happens here; the service loads, mutates and persists it.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::{
    Collaborator, CollaborationError, CollaborationId, CollaborationSettings, Comment,
    CommentAuthor, CommentId, InviteKind, MemeId, NewVersion, PendingInvite, Principal, Result,
    Role, UserId, Version, VersionId, MAX_COMMENT_LENGTH, MAX_DISPLAY_NAME_LENGTH,
};

pub const MIN_TITLE_LENGTH: usize = 3;
pub const MAX_TITLE_LENGTH: usize = 200;
const FORK_SUFFIX: &str = " (Fork)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationType {
    #[default]
    Collaboration,
    Remix,
    TemplateCreation,
}

impl FromStr for CollaborationType {
    type Err = CollaborationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "collaboration" => Ok(CollaborationType::Collaboration),
            "remix" => Ok(CollaborationType::Remix),
            "template_creation" => Ok(CollaborationType::TemplateCreation),
            other => Err(CollaborationError::Validation(format!(
                "unknown collaboration type '{}'",
                other
            ))),
        }
    }
}

/// Counters maintained on write so reads never scan history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollaborationStats {
    pub view_count: u64,
    pub fork_count: u64,
    pub like_count: u64,
    pub version_count: u64,
    pub comment_count: u64,
}

/// Input for creating a collaboration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCollaboration {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: CollaborationType,
    #[serde(default)]
    pub original_meme: Option<MemeId>,
    #[serde(default)]
    pub settings: CollaborationSettings,
}

impl NewCollaboration {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn remix(title: impl Into<String>, original_meme: Option<MemeId>) -> Self {
        Self {
            title: title.into(),
            kind: CollaborationType::Remix,
            original_meme,
            ..Default::default()
        }
    }

    pub fn with_settings(mut self, settings: CollaborationSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Result of a join attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JoinOutcome {
    Joined { role: Role },
    Requested,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaboration {
    id: CollaborationId,
    title: String,
    description: Option<String>,
    #[serde(rename = "type")]
    kind: CollaborationType,
    owner: UserId,
    original_meme: Option<MemeId>,
    parent_collaboration: Option<CollaborationId>,
    collaborators: Vec<Collaborator>,
    pending_invites: Vec<PendingInvite>,
    versions: Vec<Version>,
    comments: Vec<Comment>,
    settings: CollaborationSettings,
    stats: CollaborationStats,
    #[serde(default)]
    liked_by: BTreeSet<UserId>,
    #[serde(default)]
    revision: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Trim and check title length in characters
pub fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    let len = title.chars().count();
    if !(MIN_TITLE_LENGTH..=MAX_TITLE_LENGTH).contains(&len) {
        return Err(CollaborationError::Validation(format!(
            "title must be between {} and {} characters",
            MIN_TITLE_LENGTH, MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

fn default_fork_title(title: &str) -> String {
    let room = MAX_TITLE_LENGTH - FORK_SUFFIX.chars().count();
    let base: String = title.chars().take(room).collect();
    format!("{}{}", base, FORK_SUFFIX)
}

impl Collaboration {
    pub fn create(owner: UserId, input: NewCollaboration) -> Result<Self> {
        let title = validate_title(&input.title)?;
        if input.kind == CollaborationType::Remix && input.original_meme.is_none() {
            return Err(CollaborationError::Validation(
                "remix collaborations require an original meme".to_string(),
            ));
        }
        input.settings.validate()?;

        let now = Utc::now();
        Ok(Self {
            id: CollaborationId::new(),
            title,
            description: input.description,
            kind: input.kind,
            owner,
            original_meme: input.original_meme,
            parent_collaboration: None,
            collaborators: Vec::new(),
            pending_invites: Vec::new(),
            versions: Vec::new(),
            comments: Vec::new(),
            settings: input.settings,
            stats: CollaborationStats::default(),
            liked_by: BTreeSet::new(),
            revision: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> CollaborationId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn kind(&self) -> CollaborationType {
        self.kind
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn original_meme(&self) -> Option<&MemeId> {
        self.original_meme.as_ref()
    }

    pub fn parent_collaboration(&self) -> Option<CollaborationId> {
        self.parent_collaboration
    }

    pub fn collaborators(&self) -> &[Collaborator] {
        &self.collaborators
    }

    pub fn pending_invites(&self) -> &[PendingInvite] {
        &self.pending_invites
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn settings(&self) -> &CollaborationSettings {
        &self.settings
    }

    pub fn stats(&self) -> &CollaborationStats {
        &self.stats
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn has_liked(&self, user_id: &UserId) -> bool {
        self.liked_by.contains(user_id)
    }

    /// Role used by every authorization check. The owner is resolved before
    /// the collaborator list is consulted.
    pub fn effective_role(&self, user_id: &UserId) -> Option<Role> {
        if &self.owner == user_id {
            return Some(Role::Owner);
        }
        self.collaborators
            .iter()
            .find(|c| &c.user_id == user_id)
            .map(|c| c.role)
    }

    pub fn pending_invite_for(&self, user_id: &UserId) -> Option<&PendingInvite> {
        self.pending_invites.iter().find(|i| &i.user_id == user_id)
    }

    /// Public collaborations are readable by anyone; private ones by members,
    /// pending invitees and platform admins.
    pub fn can_read(&self, principal: Option<&Principal>) -> bool {
        if self.settings.is_public {
            return true;
        }
        match principal {
            Some(p) => {
                p.is_admin()
                    || self.effective_role(&p.user_id).is_some()
                    || self.pending_invite_for(&p.user_id).is_some()
            }
            None => false,
        }
    }

    fn require_role(&self, actor: &UserId, allowed: impl Fn(Role) -> bool, action: &str) -> Result<Role> {
        match self.effective_role(actor) {
            Some(role) if allowed(role) => Ok(role),
            _ => Err(CollaborationError::Authorization(format!(
                "user {} may not {}",
                actor, action
            ))),
        }
    }

    /// Owner plus collaborators plus seats reserved by pending entries for other users
    fn seats_taken_excluding(&self, user_id: &UserId) -> usize {
        1 + self.collaborators.len()
            + self
                .pending_invites
                .iter()
                .filter(|i| &i.user_id != user_id)
                .count()
    }

    fn ensure_seat_for(&self, user_id: &UserId) -> Result<()> {
        if self.seats_taken_excluding(user_id) + 1 > self.settings.max_collaborators as usize {
            return Err(CollaborationError::Capacity(format!(
                "collaboration is limited to {} members",
                self.settings.max_collaborators
            )));
        }
        Ok(())
    }

    /// Seat check at admission time, ignoring reservations
    fn ensure_admission(&self) -> Result<()> {
        if self.collaborators.len() + 2 > self.settings.max_collaborators as usize {
            return Err(CollaborationError::Capacity(format!(
                "collaboration is limited to {} members",
                self.settings.max_collaborators
            )));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Creation timestamp for a new history entry; never earlier than the last one
    fn next_timestamp(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let now = Utc::now();
        match last {
            Some(last) if last > now => last,
            _ => now,
        }
    }

    fn take_pending(&mut self, user_id: &UserId, kind: InviteKind) -> Result<PendingInvite> {
        let index = self
            .pending_invites
            .iter()
            .position(|i| &i.user_id == user_id && i.kind == kind)
            .ok_or_else(|| {
                let what = match kind {
                    InviteKind::Invitation => "pending invite",
                    InviteKind::JoinRequest => "pending join request",
                };
                CollaborationError::NotFound(format!("{} for user {}", what, user_id))
            })?;
        Ok(self.pending_invites.remove(index))
    }

    fn admit(&mut self, invite: PendingInvite) -> &Collaborator {
        self.collaborators.push(Collaborator {
            user_id: invite.user_id,
            role: invite.role,
            joined_at: Utc::now(),
        });
        self.touch();
        &self.collaborators[self.collaborators.len() - 1]
    }

    pub fn invite(
        &mut self,
        actor: &UserId,
        target: UserId,
        role: Role,
        message: Option<String>,
    ) -> Result<&PendingInvite> {
        self.require_role(actor, |r| r.can_invite(), "invite collaborators")?;
        if !role.is_assignable() {
            return Err(CollaborationError::Validation(
                "cannot invite a user as owner".to_string(),
            ));
        }
        if self.effective_role(&target).is_some() {
            return Err(CollaborationError::Conflict(format!(
                "user {} is already a member",
                target
            )));
        }
        self.ensure_seat_for(&target)?;

        // One pending entry per user; a new invite replaces the old one
        self.pending_invites.retain(|i| i.user_id != target);
        self.pending_invites.push(PendingInvite {
            user_id: target,
            role,
            invited_by: actor.clone(),
            invited_at: Utc::now(),
            message,
            kind: InviteKind::Invitation,
        });
        self.touch();
        Ok(&self.pending_invites[self.pending_invites.len() - 1])
    }

    pub fn accept_invite(&mut self, user_id: &UserId) -> Result<&Collaborator> {
        if !self
            .pending_invites
            .iter()
            .any(|i| &i.user_id == user_id && i.kind == InviteKind::Invitation)
        {
            return Err(CollaborationError::NotFound(format!(
                "pending invite for user {}",
                user_id
            )));
        }
        self.ensure_admission()?;
        let invite = self.take_pending(user_id, InviteKind::Invitation)?;
        Ok(self.admit(invite))
    }

    pub fn decline_invite(&mut self, user_id: &UserId) -> Result<()> {
        self.take_pending(user_id, InviteKind::Invitation)?;
        self.touch();
        Ok(())
    }

    /// Joins straight away when approval is off, otherwise files a join request
    pub fn join_directly(&mut self, user_id: &UserId, message: Option<String>) -> Result<JoinOutcome> {
        if self.effective_role(user_id).is_some() {
            return Err(CollaborationError::Conflict(format!(
                "user {} is already a member",
                user_id
            )));
        }
        if let Some(pending) = self.pending_invite_for(user_id) {
            let msg = match pending.kind {
                InviteKind::Invitation => "user has a pending invite; accept it instead",
                InviteKind::JoinRequest => "join request already pending",
            };
            return Err(CollaborationError::Conflict(msg.to_string()));
        }
        self.ensure_seat_for(user_id)?;

        let request = PendingInvite {
            user_id: user_id.clone(),
            role: Role::Contributor,
            invited_by: user_id.clone(),
            invited_at: Utc::now(),
            message,
            kind: InviteKind::JoinRequest,
        };

        if self.settings.require_approval {
            self.pending_invites.push(request);
            self.touch();
            Ok(JoinOutcome::Requested)
        } else {
            let role = self.admit(request).role;
            Ok(JoinOutcome::Joined { role })
        }
    }

    pub fn approve_join_request(&mut self, actor: &UserId, user_id: &UserId) -> Result<&Collaborator> {
        self.require_role(actor, |r| r.can_manage(), "approve join requests")?;
        if !self
            .pending_invites
            .iter()
            .any(|i| &i.user_id == user_id && i.kind == InviteKind::JoinRequest)
        {
            return Err(CollaborationError::NotFound(format!(
                "pending join request for user {}",
                user_id
            )));
        }
        self.ensure_admission()?;
        let request = self.take_pending(user_id, InviteKind::JoinRequest)?;
        Ok(self.admit(request))
    }

    pub fn reject_join_request(&mut self, actor: &UserId, user_id: &UserId) -> Result<()> {
        self.require_role(actor, |r| r.can_manage(), "reject join requests")?;
        self.take_pending(user_id, InviteKind::JoinRequest)?;
        self.touch();
        Ok(())
    }

    /// Drops pending entries created before `cutoff` and returns them
    pub fn expire_invites(&mut self, cutoff: DateTime<Utc>) -> Vec<PendingInvite> {
        let (expired, live): (Vec<_>, Vec<_>) = self
            .pending_invites
            .drain(..)
            .partition(|i| i.is_expired(cutoff));
        self.pending_invites = live;
        if !expired.is_empty() {
            self.touch();
        }
        expired
    }

    pub fn update_collaborator_role(
        &mut self,
        actor: &UserId,
        target: &UserId,
        new_role: Role,
    ) -> Result<&Collaborator> {
        if !new_role.is_assignable() {
            return Err(CollaborationError::Validation(
                "role must be one of editor, contributor, viewer".to_string(),
            ));
        }
        self.require_role(actor, |r| r.can_manage(), "change collaborator roles")?;
        let index = self
            .collaborators
            .iter()
            .position(|c| &c.user_id == target)
            .ok_or_else(|| CollaborationError::NotFound(format!("collaborator {}", target)))?;

        self.collaborators[index].role = new_role;
        self.touch();
        Ok(&self.collaborators[index])
    }

    pub fn remove_collaborator(&mut self, actor: &UserId, target: &UserId) -> Result<()> {
        self.require_role(actor, |r| r.can_manage(), "remove collaborators")?;
        if target == &self.owner {
            return Err(CollaborationError::Validation(
                "the owner cannot be removed".to_string(),
            ));
        }
        self.drop_collaborator(target)
    }

    pub fn leave(&mut self, user_id: &UserId) -> Result<()> {
        if user_id == &self.owner {
            return Err(CollaborationError::Validation(
                "the owner cannot leave their own collaboration".to_string(),
            ));
        }
        self.drop_collaborator(user_id)
    }

    fn drop_collaborator(&mut self, user_id: &UserId) -> Result<()> {
        let index = self
            .collaborators
            .iter()
            .position(|c| &c.user_id == user_id)
            .ok_or_else(|| CollaborationError::NotFound(format!("collaborator {}", user_id)))?;
        self.collaborators.remove(index);
        self.touch();
        Ok(())
    }

    pub fn add_version(&mut self, actor: &UserId, input: NewVersion) -> Result<&Version> {
        self.require_role(actor, |r| r.can_add_version(), "add versions")?;
        input.validate()?;

        let created_at = Self::next_timestamp(self.versions.last().map(|v| v.created_at));
        self.versions.push(Version {
            id: VersionId::new(),
            author_id: actor.clone(),
            title: input.title.trim().to_string(),
            description: input.description,
            changes: input.changes,
            created_at,
        });
        self.stats.version_count += 1;
        self.touch();
        Ok(&self.versions[self.versions.len() - 1])
    }

    pub fn add_comment(&mut self, author: CommentAuthor, content: &str) -> Result<&Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CollaborationError::Validation(
                "comment content is required".to_string(),
            ));
        }
        if content.chars().count() > MAX_COMMENT_LENGTH {
            return Err(CollaborationError::Validation(format!(
                "comment must be at most {} characters",
                MAX_COMMENT_LENGTH
            )));
        }

        let author = match author {
            CommentAuthor::User { user_id } => {
                self.require_role(&user_id, |_| true, "comment")?;
                CommentAuthor::User { user_id }
            }
            CommentAuthor::Anonymous { display_name } => {
                if !self.settings.allow_anonymous {
                    return Err(CollaborationError::Authorization(
                        "anonymous comments are disabled".to_string(),
                    ));
                }
                // Guests may only comment where they can read
                if !self.can_read(None) {
                    return Err(CollaborationError::Authorization(
                        "this collaboration is private".to_string(),
                    ));
                }
                let display_name = display_name.trim().to_string();
                let len = display_name.chars().count();
                if len == 0 || len > MAX_DISPLAY_NAME_LENGTH {
                    return Err(CollaborationError::Validation(format!(
                        "display name must be between 1 and {} characters",
                        MAX_DISPLAY_NAME_LENGTH
                    )));
                }
                CommentAuthor::Anonymous { display_name }
            }
        };

        let created_at = Self::next_timestamp(self.comments.last().map(|c| c.created_at));
        self.comments.push(Comment {
            id: CommentId::new(),
            author,
            content: content.to_string(),
            created_at,
        });
        self.stats.comment_count += 1;
        self.touch();
        Ok(&self.comments[self.comments.len() - 1])
    }

    /// Creates an independent collaboration owned by `actor`, carrying this
    /// one's version history forward. Bumps this collaboration's fork counter.
    pub fn fork(&mut self, actor: &UserId, new_title: Option<&str>) -> Result<Collaboration> {
        if !self.settings.allow_forks {
            return Err(CollaborationError::Forbidden(
                "forking is disabled for this collaboration".to_string(),
            ));
        }
        let title = match new_title {
            Some(title) => validate_title(title)?,
            None => default_fork_title(&self.title),
        };

        let now = Utc::now();
        let fork = Collaboration {
            id: CollaborationId::new(),
            title,
            description: self.description.clone(),
            kind: self.kind,
            owner: actor.clone(),
            original_meme: self.original_meme.clone(),
            parent_collaboration: Some(self.id),
            collaborators: Vec::new(),
            pending_invites: Vec::new(),
            versions: self.versions.clone(),
            comments: Vec::new(),
            settings: self.settings.clone(),
            stats: CollaborationStats {
                version_count: self.versions.len() as u64,
                ..Default::default()
            },
            liked_by: BTreeSet::new(),
            revision: 0,
            created_at: now,
            updated_at: now,
        };

        self.stats.fork_count += 1;
        self.touch();
        Ok(fork)
    }

    pub fn update_settings(&mut self, actor: &UserId, settings: CollaborationSettings) -> Result<()> {
        self.require_role(actor, |r| r.can_manage(), "change settings")?;
        settings.validate()?;
        let seats = 1 + self.collaborators.len() + self.pending_invites.len();
        if seats > settings.max_collaborators as usize {
            return Err(CollaborationError::Capacity(format!(
                "{} seats are already taken",
                seats
            )));
        }
        self.settings = settings;
        self.touch();
        Ok(())
    }

    /// Views do not refresh `updated_at`
    pub fn record_view(&mut self) {
        self.stats.view_count += 1;
    }

    pub fn like(&mut self, user_id: &UserId) -> Result<u64> {
        if !self.liked_by.insert(user_id.clone()) {
            return Err(CollaborationError::Conflict(format!(
                "user {} already liked this collaboration",
                user_id
            )));
        }
        self.stats.like_count += 1;
        self.touch();
        Ok(self.stats.like_count)
    }
}
