/// Read-only views derived from a collaboration at request time.
/// Counters come from the incrementally maintained stats; time windows use
/// binary search over the append-only history.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::history::count_since;
use crate::{Collaboration, CollaborationId, CollaborationType, InviteKind, UserId};

pub const ACTIVITY_WINDOW_DAYS: i64 = 7;
const DEADLINE_WARNING_DAYS: i64 = 3;
const CONTENT_PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicStats {
    pub collaborator_count: usize,
    pub version_count: u64,
    pub comment_count: u64,
    pub fork_count: u64,
    pub like_count: u64,
    pub view_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub versions_last_7d: usize,
    pub comments_last_7d: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineStats {
    pub days_since_creation: i64,
    pub is_active: bool,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsView {
    pub basic: BasicStats,
    pub activity: ActivityStats,
    pub timeline: TimelineStats,
}

fn days_since_creation(collab: &Collaboration, now: DateTime<Utc>) -> i64 {
    (now - collab.created_at()).num_days().max(0)
}

fn versions_since(collab: &Collaboration, since: DateTime<Utc>) -> usize {
    count_since(collab.versions(), since, |v| v.created_at)
}

impl StatsView {
    pub fn compute(collab: &Collaboration, now: DateTime<Utc>) -> Self {
        let stats = collab.stats();
        let window_start = now - Duration::days(ACTIVITY_WINDOW_DAYS);
        Self {
            basic: BasicStats {
                collaborator_count: collab.collaborators().len(),
                version_count: stats.version_count,
                comment_count: stats.comment_count,
                fork_count: stats.fork_count,
                like_count: stats.like_count,
                view_count: stats.view_count,
            },
            activity: ActivityStats {
                versions_last_7d: versions_since(collab, window_start),
                comments_last_7d: count_since(collab.comments(), window_start, |c| c.created_at),
            },
            timeline: TimelineStats {
                days_since_creation: days_since_creation(collab, now),
                is_active: collab.settings().is_active_at(now),
                deadline: collab.settings().deadline,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Version,
    Comment,
    Join,
    Invite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub user: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

fn preview(content: &str) -> String {
    if content.chars().count() <= CONTENT_PREVIEW_CHARS {
        return content.to_string();
    }
    let cut: String = content.chars().take(CONTENT_PREVIEW_CHARS).collect();
    format!("{}...", cut)
}

/// Merged reverse-chronological feed of versions, comments, joins and invites
pub fn activity_feed(collab: &Collaboration, limit: usize) -> Vec<ActivityEntry> {
    let versions = collab.versions().iter().rev().take(limit).map(|v| ActivityEntry {
        kind: ActivityKind::Version,
        user: v.author_id.to_string(),
        summary: v.title.clone(),
        created_at: v.created_at,
    });
    let comments = collab.comments().iter().rev().take(limit).map(|c| ActivityEntry {
        kind: ActivityKind::Comment,
        user: c.author.label(),
        summary: preview(&c.content),
        created_at: c.created_at,
    });
    let joins = collab.collaborators().iter().map(|c| ActivityEntry {
        kind: ActivityKind::Join,
        user: c.user_id.to_string(),
        summary: format!("joined as {}", c.role),
        created_at: c.joined_at,
    });
    let invites = collab.pending_invites().iter().map(|i| match i.kind {
        InviteKind::Invitation => ActivityEntry {
            kind: ActivityKind::Invite,
            user: i.invited_by.to_string(),
            summary: format!("invited {} as {}", i.user_id, i.role),
            created_at: i.invited_at,
        },
        InviteKind::JoinRequest => ActivityEntry {
            kind: ActivityKind::Invite,
            user: i.user_id.to_string(),
            summary: "requested to join".to_string(),
            created_at: i.invited_at,
        },
    });

    let mut feed: Vec<ActivityEntry> = versions.chain(comments).chain(joins).chain(invites).collect();
    feed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    feed.truncate(limit);
    feed
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    pub versions_per_day: f64,
    pub comments_per_day: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quality {
    /// Heuristic percentage, capped at 100
    pub completion_score: u32,
}

/// Deterministic threshold rules, not a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub engagement: Engagement,
    pub quality: Quality,
    pub recommendations: Vec<String>,
    pub is_active: bool,
    pub days_until_deadline: Option<i64>,
}

impl Insights {
    pub fn compute(collab: &Collaboration, now: DateTime<Utc>) -> Self {
        let stats = collab.stats();
        let collaborator_count = collab.collaborators().len() as u64;
        let days = days_since_creation(collab, now).max(1) as f64;

        let completion_score = (stats.version_count * 10
            + stats.comment_count * 5
            + collaborator_count * 10)
            .min(100) as u32;

        let until_deadline = collab.settings().deadline.map(|d| d - now);

        let mut recommendations = Vec::new();
        if collaborator_count < 2 {
            recommendations.push("Invite more collaborators to grow the project".to_string());
        }
        if stats.version_count == 0 {
            recommendations.push("Create a first version to get things started".to_string());
        }
        if stats.comment_count < 3 {
            recommendations.push("Ask for feedback in the comments".to_string());
        }
        if let Some(remaining) = until_deadline {
            if remaining > Duration::zero() && remaining < Duration::days(DEADLINE_WARNING_DAYS) {
                recommendations.push("Deadline is approaching".to_string());
            }
        }
        if !collab.settings().is_public {
            recommendations
                .push("Make the collaboration public to attract contributors".to_string());
        }

        Self {
            engagement: Engagement {
                versions_per_day: stats.version_count as f64 / days,
                comments_per_day: stats.comment_count as f64 / days,
            },
            quality: Quality { completion_score },
            recommendations,
            is_active: collab.settings().is_active_at(now),
            days_until_deadline: until_deadline.map(|d| d.num_days()),
        }
    }
}

/// Listing entry for collections of collaborations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationSummary {
    pub id: CollaborationId,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: CollaborationType,
    pub owner: UserId,
    pub parent_collaboration: Option<CollaborationId>,
    pub collaborator_count: usize,
    pub version_count: u64,
    pub fork_count: u64,
    pub like_count: u64,
    pub view_count: u64,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Collaboration> for CollaborationSummary {
    fn from(collab: &Collaboration) -> Self {
        let stats = collab.stats();
        Self {
            id: collab.id(),
            title: collab.title().to_string(),
            description: collab.description().map(str::to_string),
            kind: collab.kind(),
            owner: collab.owner().clone(),
            parent_collaboration: collab.parent_collaboration(),
            collaborator_count: collab.collaborators().len(),
            version_count: stats.version_count,
            fork_count: stats.fork_count,
            like_count: stats.like_count,
            view_count: stats.view_count,
            is_public: collab.settings().is_public,
            created_at: collab.created_at(),
            updated_at: collab.updated_at(),
        }
    }
}

/// Ranking used by the trending listing
pub fn trending_score(collab: &Collaboration, now: DateTime<Utc>, window_days: i64) -> u64 {
    let stats = collab.stats();
    let recent_versions = versions_since(collab, now - Duration::days(window_days)) as u64;
    3 * stats.fork_count + 2 * stats.like_count + stats.view_count + 2 * recent_versions
}
