/// Version history and comments
/// Both sequences are append-only and ordered by creation time
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CollaborationError, Result, UserId};

pub const MAX_COMMENT_LENGTH: usize = 2000;
pub const MAX_DISPLAY_NAME_LENGTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(pub uuid::Uuid);

impl VersionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub uuid::Uuid);

impl CommentId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for CommentId {
    fn default() -> Self {
        Self::new()
    }
}

/// Single change recorded in a version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub previous_value: Option<serde_json::Value>,
    #[serde(default)]
    pub new_value: Option<serde_json::Value>,
}

impl Change {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: None,
            previous_value: None,
            new_value: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_values(
        mut self,
        previous_value: serde_json::Value,
        new_value: serde_json::Value,
    ) -> Self {
        self.previous_value = Some(previous_value);
        self.new_value = Some(new_value);
        self
    }
}

/// Immutable snapshot entry in a collaboration's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: VersionId,
    pub author_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub changes: Vec<Change>,
    pub created_at: DateTime<Utc>,
}

/// Input for a new version; id, author and timestamp are assigned by the aggregate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVersion {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub changes: Vec<Change>,
}

impl NewVersion {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            changes: Vec::new(),
        }
    }

    pub fn with_change(mut self, change: Change) -> Self {
        self.changes.push(change);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(CollaborationError::Validation(
                "version title is required".to_string(),
            ));
        }
        if let Some(index) = self.changes.iter().position(|c| c.kind.trim().is_empty()) {
            return Err(CollaborationError::Validation(format!(
                "change #{} is missing a type",
                index
            )));
        }
        Ok(())
    }
}

/// Who wrote a comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CommentAuthor {
    User {
        #[serde(rename = "userId")]
        user_id: UserId,
    },
    Anonymous {
        #[serde(rename = "displayName")]
        display_name: String,
    },
}

impl CommentAuthor {
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            CommentAuthor::User { user_id } => Some(user_id),
            CommentAuthor::Anonymous { .. } => None,
        }
    }

    /// Label shown in activity feeds
    pub fn label(&self) -> String {
        match self {
            CommentAuthor::User { user_id } => user_id.to_string(),
            CommentAuthor::Anonymous { display_name } => format!("{} (guest)", display_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub author: CommentAuthor,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Number of entries created at or after `since`.
/// Relies on the sequence being ordered by creation time.
pub(crate) fn count_since<T>(
    entries: &[T],
    since: DateTime<Utc>,
    created_at: impl Fn(&T) -> DateTime<Utc>,
) -> usize {
    let first = entries.partition_point(|e| created_at(e) < since);
    entries.len() - first
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_version_validation() {
        assert!(NewVersion::new("checkpoint").validate().is_ok());
        assert!(NewVersion::new("  ").validate().is_err());

        let version = NewVersion::new("caption tweak")
            .with_change(Change::new("text").with_description("top caption"))
            .with_change(Change::new(""));
        assert!(matches!(
            version.validate(),
            Err(CollaborationError::Validation(msg)) if msg.contains("#1")
        ));
    }

    #[test]
    fn test_change_wire_format() {
        let change = Change::new("caption")
            .with_values(serde_json::json!("old"), serde_json::json!("new"));
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["type"], "caption");
        assert_eq!(json["previousValue"], "old");
        assert_eq!(json["newValue"], "new");
    }

    #[test]
    fn test_count_since() {
        let now = Utc::now();
        let stamps: Vec<DateTime<Utc>> = (0..10)
            .rev()
            .map(|days| now - chrono::Duration::days(days))
            .collect();

        assert_eq!(count_since(&stamps, now - chrono::Duration::days(7), |t| *t), 8);
        assert_eq!(count_since(&stamps, now + chrono::Duration::days(1), |t| *t), 0);
        assert_eq!(count_since(&[] as &[DateTime<Utc>], now, |t| *t), 0);
    }
}
