/// Collaboration service
/// Loads aggregates from the repository, applies one transition, and writes
/// back with a compare-and-swap on the revision that was read. A failed
/// transition persists nothing.
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    activity_feed, trending_score, ActivityEntry, Collaboration, CollaborationError,
    CollaborationId, CollaborationRepository, CollaborationSettings, CollaborationSummary,
    CollaborationType, Collaborator, Comment, CommentAuthor, Insights, InviteKind, JoinOutcome,
    MemeCatalog, NewCollaboration, NewVersion, PendingInvite, Principal, Result, Role, StatsView,
    UserId, Version,
};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Pending invites and join requests older than this are expired
    pub invite_ttl: Duration,
    pub trending_window_days: i64,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            invite_ttl: Duration::days(7),
            trending_window_days: 7,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// Query parameters for listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// "recent" (default), "popular" or "forks"
    pub sort: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub pages: usize,
}

/// Invitation addressed to the current user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteSummary {
    pub collaboration_id: CollaborationId,
    pub title: String,
    pub invite: PendingInvite,
}

pub struct CollaborationService {
    repo: Arc<dyn CollaborationRepository>,
    memes: Arc<dyn MemeCatalog>,
    config: ServiceConfig,
}

impl CollaborationService {
    pub fn new(
        repo: Arc<dyn CollaborationRepository>,
        memes: Arc<dyn MemeCatalog>,
        config: ServiceConfig,
    ) -> Self {
        Self { repo, memes, config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn load(&self, id: &CollaborationId) -> Result<Collaboration> {
        self.repo
            .get(id)?
            .ok_or_else(|| CollaborationError::NotFound(format!("collaboration {}", id)))
    }

    fn load_readable(
        &self,
        principal: Option<&Principal>,
        id: &CollaborationId,
    ) -> Result<Collaboration> {
        let collab = self.load(id)?;
        ensure_readable(&collab, principal)?;
        Ok(collab)
    }

    /// Load for a write: check the caller's revision and drop expired invites.
    /// Returns the aggregate and the revision the final write must match.
    fn load_for_write(
        &self,
        id: &CollaborationId,
        expected: Option<u64>,
    ) -> Result<(Collaboration, u64)> {
        let mut collab = self.load(id)?;
        let read_revision = collab.revision();
        if let Some(expected) = expected {
            if expected != read_revision {
                return Err(CollaborationError::RevisionConflict {
                    expected,
                    actual: read_revision,
                });
            }
        }

        let expired = collab.expire_invites(Utc::now() - self.config.invite_ttl);
        if !expired.is_empty() {
            debug!("Expired {} pending invites on {}", expired.len(), id);
        }
        Ok((collab, read_revision))
    }

    /// Load, check the caller's revision, apply `apply`, and CAS the result back
    fn mutate<T>(
        &self,
        id: &CollaborationId,
        expected: Option<u64>,
        apply: impl FnOnce(&mut Collaboration) -> Result<T>,
    ) -> Result<(Collaboration, T)> {
        let (mut collab, read_revision) = self.load_for_write(id, expected)?;
        let output = apply(&mut collab).map_err(|e| log_rejection(id, e))?;
        let saved = self.repo.update(collab, read_revision)?;
        Ok((saved, output))
    }

    pub fn create(&self, actor: &Principal, input: NewCollaboration) -> Result<Collaboration> {
        let collab = Collaboration::create(actor.user_id.clone(), input)?;
        if collab.kind() == CollaborationType::Remix {
            if let Some(meme_id) = collab.original_meme() {
                if self.memes.get(meme_id).is_none() {
                    return Err(CollaborationError::NotFound(format!("meme {}", meme_id)));
                }
            }
        }

        let collab = self.repo.insert(collab)?;
        info!(
            "User {} created collaboration {} ({:?})",
            actor.user_id,
            collab.id(),
            collab.kind()
        );
        Ok(collab)
    }

    /// Fetch one collaboration and count the view. A lost race on the view
    /// counter is not an error for the reader.
    pub fn get(&self, principal: Option<&Principal>, id: &CollaborationId) -> Result<Collaboration> {
        let mut collab = self.load_readable(principal, id)?;
        let read_revision = collab.revision();
        collab.record_view();
        match self.repo.update(collab.clone(), read_revision) {
            Ok(saved) => Ok(saved),
            Err(e) if e.is_retryable() => {
                debug!("View count on {} lost a race: {}", id, e);
                self.load(id)
            }
            Err(e) => Err(e),
        }
    }

    pub fn list(&self, query: &ListQuery) -> Result<Page<CollaborationSummary>> {
        let kind = query
            .kind
            .as_deref()
            .map(str::parse::<CollaborationType>)
            .transpose()?;
        self.list_filtered(query, kind)
    }

    pub fn templates(&self, query: &ListQuery) -> Result<Page<CollaborationSummary>> {
        self.list_filtered(query, Some(CollaborationType::TemplateCreation))
    }

    fn list_filtered(
        &self,
        query: &ListQuery,
        kind: Option<CollaborationType>,
    ) -> Result<Page<CollaborationSummary>> {
        let mut items: Vec<Collaboration> = self
            .repo
            .list_all()?
            .into_iter()
            .filter(|c| c.settings().is_public)
            .filter(|c| kind.map_or(true, |k| c.kind() == k))
            .collect();

        if let Some(search) = query.q.as_deref().filter(|q| !q.trim().is_empty()) {
            let search = search.trim().to_lowercase();
            items.retain(|c| {
                c.title().to_lowercase().contains(&search)
                    || c.description()
                        .map_or(false, |d| d.to_lowercase().contains(&search))
            });
        }

        match query.sort.as_deref() {
            Some("popular") => items.sort_by(|a, b| {
                let score = |c: &Collaboration| c.stats().like_count + c.stats().view_count;
                score(b).cmp(&score(a)).then(b.updated_at().cmp(&a.updated_at()))
            }),
            Some("forks") => items.sort_by(|a, b| {
                b.stats()
                    .fork_count
                    .cmp(&a.stats().fork_count)
                    .then(b.updated_at().cmp(&a.updated_at()))
            }),
            _ => items.sort_by(|a, b| b.created_at().cmp(&a.created_at())),
        }

        let total = items.len();
        let limit = query
            .limit
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size);
        let page = query.page.unwrap_or(1).max(1);

        let items = items
            .iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .map(CollaborationSummary::from)
            .collect();

        Ok(Page {
            items,
            total,
            page,
            pages: (total + limit - 1) / limit,
        })
    }

    pub fn trending(&self, limit: Option<usize>) -> Result<Vec<CollaborationSummary>> {
        let now = Utc::now();
        let window = self.config.trending_window_days;
        let limit = limit
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size);

        let mut scored: Vec<(u64, Collaboration)> = self
            .repo
            .list_all()?
            .into_iter()
            .filter(|c| c.settings().is_public)
            .map(|c| (trending_score(&c, now, window), c))
            .collect();
        scored.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then(b.updated_at().cmp(&a.updated_at())));

        Ok(scored
            .iter()
            .take(limit)
            .map(|(_, c)| CollaborationSummary::from(c))
            .collect())
    }

    pub fn invite(
        &self,
        actor: &Principal,
        id: &CollaborationId,
        target: UserId,
        role: Role,
        message: Option<String>,
        expected: Option<u64>,
    ) -> Result<PendingInvite> {
        let (_, invite) = self.mutate(id, expected, |c| {
            c.invite(&actor.user_id, target, role, message).cloned()
        })?;
        info!(
            "User {} invited {} to {} as {}",
            actor.user_id, invite.user_id, id, invite.role
        );
        Ok(invite)
    }

    /// Unexpired invitations addressed to `actor`, answered from the repository index
    pub fn pending_invites(&self, actor: &Principal) -> Result<Vec<InviteSummary>> {
        let cutoff = Utc::now() - self.config.invite_ttl;
        let mut invites = Vec::new();
        for id in self.repo.pending_invites_for(&actor.user_id)? {
            let Some(collab) = self.repo.get(&id)? else {
                continue;
            };
            if let Some(invite) = collab.pending_invite_for(&actor.user_id) {
                if invite.kind == InviteKind::Invitation && !invite.is_expired(cutoff) {
                    invites.push(InviteSummary {
                        collaboration_id: collab.id(),
                        title: collab.title().to_string(),
                        invite: invite.clone(),
                    });
                }
            }
        }
        invites.sort_by(|a, b| b.invite.invited_at.cmp(&a.invite.invited_at));
        Ok(invites)
    }

    pub fn accept_invite(
        &self,
        actor: &Principal,
        id: &CollaborationId,
        expected: Option<u64>,
    ) -> Result<Collaboration> {
        let (collab, role) =
            self.mutate(id, expected, |c| c.accept_invite(&actor.user_id).map(|m| m.role))?;
        info!("User {} accepted invite to {} as {}", actor.user_id, id, role);
        Ok(collab)
    }

    pub fn decline_invite(
        &self,
        actor: &Principal,
        id: &CollaborationId,
        expected: Option<u64>,
    ) -> Result<()> {
        self.mutate(id, expected, |c| c.decline_invite(&actor.user_id))?;
        info!("User {} declined invite to {}", actor.user_id, id);
        Ok(())
    }

    pub fn join(
        &self,
        actor: &Principal,
        id: &CollaborationId,
        message: Option<String>,
        expected: Option<u64>,
    ) -> Result<JoinOutcome> {
        let (_, outcome) = self.mutate(id, expected, |c| {
            ensure_readable(c, Some(actor))?;
            c.join_directly(&actor.user_id, message)
        })?;
        info!("User {} join on {}: {:?}", actor.user_id, id, outcome);
        Ok(outcome)
    }

    pub fn approve_join_request(
        &self,
        actor: &Principal,
        id: &CollaborationId,
        user_id: &UserId,
        expected: Option<u64>,
    ) -> Result<Collaborator> {
        let (_, member) = self.mutate(id, expected, |c| {
            c.approve_join_request(&actor.user_id, user_id).cloned()
        })?;
        info!("User {} approved {} joining {}", actor.user_id, user_id, id);
        Ok(member)
    }

    pub fn reject_join_request(
        &self,
        actor: &Principal,
        id: &CollaborationId,
        user_id: &UserId,
        expected: Option<u64>,
    ) -> Result<()> {
        self.mutate(id, expected, |c| {
            c.reject_join_request(&actor.user_id, user_id)
        })?;
        info!("User {} rejected {} joining {}", actor.user_id, user_id, id);
        Ok(())
    }

    pub fn leave(&self, actor: &Principal, id: &CollaborationId, expected: Option<u64>) -> Result<()> {
        self.mutate(id, expected, |c| c.leave(&actor.user_id))?;
        info!("User {} left {}", actor.user_id, id);
        Ok(())
    }

    pub fn remove_collaborator(
        &self,
        actor: &Principal,
        id: &CollaborationId,
        user_id: &UserId,
        expected: Option<u64>,
    ) -> Result<()> {
        self.mutate(id, expected, |c| {
            c.remove_collaborator(&actor.user_id, user_id)
        })?;
        info!("User {} removed {} from {}", actor.user_id, user_id, id);
        Ok(())
    }

    pub fn update_collaborator_role(
        &self,
        actor: &Principal,
        id: &CollaborationId,
        user_id: &UserId,
        role: Role,
        expected: Option<u64>,
    ) -> Result<Collaborator> {
        let (_, member) = self.mutate(id, expected, |c| {
            c.update_collaborator_role(&actor.user_id, user_id, role)
                .cloned()
        })?;
        info!("User {} set {} to {} on {}", actor.user_id, user_id, role, id);
        Ok(member)
    }

    pub fn update_settings(
        &self,
        actor: &Principal,
        id: &CollaborationId,
        settings: CollaborationSettings,
        expected: Option<u64>,
    ) -> Result<CollaborationSettings> {
        let (collab, _) =
            self.mutate(id, expected, |c| c.update_settings(&actor.user_id, settings))?;
        info!("User {} updated settings on {}", actor.user_id, id);
        Ok(collab.settings().clone())
    }

    pub fn add_version(
        &self,
        actor: &Principal,
        id: &CollaborationId,
        input: NewVersion,
        expected: Option<u64>,
    ) -> Result<Version> {
        let (_, version) = self.mutate(id, expected, |c| {
            c.add_version(&actor.user_id, input).cloned()
        })?;
        info!(
            "User {} added version {} to {} ({} changes)",
            actor.user_id,
            version.id.0,
            id,
            version.changes.len()
        );
        Ok(version)
    }

    /// Signed-in users comment under their id; guests need a display name and
    /// a collaboration that allows anonymous comments.
    pub fn add_comment(
        &self,
        principal: Option<&Principal>,
        display_name: Option<&str>,
        id: &CollaborationId,
        content: &str,
        expected: Option<u64>,
    ) -> Result<Comment> {
        let author = match (principal, display_name) {
            (Some(p), _) => CommentAuthor::User {
                user_id: p.user_id.clone(),
            },
            (None, Some(name)) => CommentAuthor::Anonymous {
                display_name: name.to_string(),
            },
            (None, None) => {
                return Err(CollaborationError::Authorization(
                    "sign in or provide a display name to comment".to_string(),
                ))
            }
        };

        let (_, comment) = self.mutate(id, expected, |c| c.add_comment(author, content).cloned())?;
        info!("{} commented on {}", comment.author.label(), id);
        Ok(comment)
    }

    pub fn fork(
        &self,
        actor: &Principal,
        id: &CollaborationId,
        new_title: Option<&str>,
        expected: Option<u64>,
    ) -> Result<Collaboration> {
        let (mut source, read_revision) = self.load_for_write(id, expected)?;
        ensure_readable(&source, Some(actor)).map_err(|e| log_rejection(id, e))?;
        let fork = source
            .fork(&actor.user_id, new_title)
            .map_err(|e| log_rejection(id, e))?;
        // The new aggregate and the source's fork counter land together or not at all
        let (fork, _) = self.repo.insert_fork(fork, source, read_revision)?;
        info!("User {} forked {} into {}", actor.user_id, id, fork.id());
        Ok(fork)
    }

    pub fn like(&self, actor: &Principal, id: &CollaborationId, expected: Option<u64>) -> Result<u64> {
        let (_, likes) = self.mutate(id, expected, |c| {
            ensure_readable(c, Some(actor))?;
            c.like(&actor.user_id)
        })?;
        debug!("User {} liked {}", actor.user_id, id);
        Ok(likes)
    }

    pub fn versions(&self, principal: Option<&Principal>, id: &CollaborationId) -> Result<Vec<Version>> {
        Ok(self.load_readable(principal, id)?.versions().to_vec())
    }

    pub fn comments(&self, principal: Option<&Principal>, id: &CollaborationId) -> Result<Vec<Comment>> {
        Ok(self.load_readable(principal, id)?.comments().to_vec())
    }

    /// Direct forks visible to the caller
    pub fn forks(
        &self,
        principal: Option<&Principal>,
        id: &CollaborationId,
    ) -> Result<Vec<CollaborationSummary>> {
        self.load_readable(principal, id)?;
        let mut forks = Vec::new();
        for fork_id in self.repo.forks_of(id)? {
            if let Some(fork) = self.repo.get(&fork_id)? {
                if fork.can_read(principal) {
                    forks.push(CollaborationSummary::from(&fork));
                }
            }
        }
        Ok(forks)
    }

    pub fn stats(&self, principal: Option<&Principal>, id: &CollaborationId) -> Result<StatsView> {
        let collab = self.load_readable(principal, id)?;
        Ok(StatsView::compute(&collab, Utc::now()))
    }

    pub fn activity(
        &self,
        principal: Option<&Principal>,
        id: &CollaborationId,
        limit: Option<usize>,
    ) -> Result<Vec<ActivityEntry>> {
        let collab = self.load_readable(principal, id)?;
        let limit = limit
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size);
        Ok(activity_feed(&collab, limit))
    }

    pub fn insights(&self, principal: Option<&Principal>, id: &CollaborationId) -> Result<Insights> {
        let collab = self.load_readable(principal, id)?;
        Ok(Insights::compute(&collab, Utc::now()))
    }
}

fn ensure_readable(collab: &Collaboration, principal: Option<&Principal>) -> Result<()> {
    if collab.can_read(principal) {
        Ok(())
    } else {
        Err(CollaborationError::Authorization(
            "this collaboration is private".to_string(),
        ))
    }
}

fn log_rejection(id: &CollaborationId, error: CollaborationError) -> CollaborationError {
    match &error {
        CollaborationError::Authorization(_) | CollaborationError::Forbidden(_) => {
            warn!("Rejected operation on {}: {}", id, error)
        }
        _ => debug!("Operation on {} failed: {}", id, error),
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CollaborationStore, InMemoryMemeCatalog, MemeId, MemeRef};

    fn service() -> CollaborationService {
        let memes = InMemoryMemeCatalog::new();
        memes.insert(MemeRef {
            id: MemeId::new("meme123"),
            owner_id: UserId::new("alice"),
            image_url: "https://cdn.example/meme123.png".to_string(),
            title: "Doge".to_string(),
        });
        CollaborationService::new(
            Arc::new(CollaborationStore::in_memory()),
            Arc::new(memes),
            ServiceConfig::default(),
        )
    }

    fn alice() -> Principal {
        Principal::user("alice")
    }

    #[test]
    fn test_remix_must_resolve() {
        let svc = service();
        let missing = svc.create(
            &alice(),
            NewCollaboration::remix("Remix", Some(MemeId::new("nope"))),
        );
        assert!(matches!(missing, Err(CollaborationError::NotFound(_))));

        let ok = svc
            .create(
                &alice(),
                NewCollaboration::remix("Remix", Some(MemeId::new("meme123"))),
            )
            .unwrap();
        assert_eq!(ok.kind(), CollaborationType::Remix);
    }

    #[test]
    fn test_stale_revision_is_rejected() {
        let svc = service();
        let collab = svc.create(&alice(), NewCollaboration::new("Revisions")).unwrap();
        let id = collab.id();

        svc.add_version(&alice(), &id, NewVersion::new("v1"), Some(0))
            .unwrap();

        let err = svc
            .add_version(&alice(), &id, NewVersion::new("v2"), Some(0))
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            err,
            CollaborationError::RevisionConflict {
                expected: 0,
                actual: 1
            }
        );
        assert_eq!(svc.versions(None, &id).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_transition_persists_nothing() {
        let svc = service();
        let id = svc
            .create(&alice(), NewCollaboration::new("Atomic"))
            .unwrap()
            .id();

        let err = svc.update_collaborator_role(
            &alice(),
            &id,
            &UserId::new("ghost"),
            Role::Editor,
            None,
        );
        assert!(matches!(err, Err(CollaborationError::NotFound(_))));

        let stored = svc.repo.get(&id).unwrap().unwrap();
        assert_eq!(stored.revision(), 0);
    }

    #[test]
    fn test_get_counts_views_and_hides_private() {
        let svc = service();
        let public = svc.create(&alice(), NewCollaboration::new("Public")).unwrap();
        assert_eq!(svc.get(None, &public.id()).unwrap().stats().view_count, 1);
        assert_eq!(svc.get(None, &public.id()).unwrap().stats().view_count, 2);

        let settings = CollaborationSettings {
            is_public: false,
            ..Default::default()
        };
        let private = svc
            .create(
                &alice(),
                NewCollaboration::new("Private").with_settings(settings),
            )
            .unwrap();
        assert!(matches!(
            svc.get(None, &private.id()),
            Err(CollaborationError::Authorization(_))
        ));
        assert!(svc.get(Some(&Principal::admin("mod")), &private.id()).is_ok());
        assert!(matches!(
            svc.stats(Some(&Principal::user("bob")), &private.id()),
            Err(CollaborationError::Authorization(_))
        ));
        assert!(matches!(
            svc.join(&Principal::user("bob"), &private.id(), None, None),
            Err(CollaborationError::Authorization(_))
        ));
    }

    #[test]
    fn test_pending_invites_listing() {
        let svc = service();
        let first = svc.create(&alice(), NewCollaboration::new("First")).unwrap();
        let second = svc.create(&alice(), NewCollaboration::new("Second")).unwrap();
        let bob = Principal::user("bob");

        for collab in [&first, &second] {
            svc.invite(&alice(), &collab.id(), bob.user_id.clone(), Role::Editor, None, None)
                .unwrap();
        }
        assert_eq!(svc.pending_invites(&bob).unwrap().len(), 2);

        svc.accept_invite(&bob, &first.id(), None).unwrap();
        let remaining = svc.pending_invites(&bob).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].collaboration_id, second.id());
        assert_eq!(remaining[0].title, "Second");
    }

    #[test]
    fn test_expired_invites_are_hidden_and_purged() {
        let svc = CollaborationService::new(
            Arc::new(CollaborationStore::in_memory()),
            Arc::new(InMemoryMemeCatalog::new()),
            ServiceConfig {
                invite_ttl: Duration::zero(),
                ..Default::default()
            },
        );
        let collab = svc.create(&alice(), NewCollaboration::new("Short lived")).unwrap();
        let bob = Principal::user("bob");
        svc.invite(&alice(), &collab.id(), bob.user_id.clone(), Role::Viewer, None, None)
            .unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(svc.pending_invites(&bob).unwrap().is_empty());
        assert!(matches!(
            svc.accept_invite(&bob, &collab.id(), None),
            Err(CollaborationError::NotFound(_))
        ));
    }

    #[test]
    fn test_listing_filters_and_pages() {
        let svc = service();
        for i in 0..5 {
            svc.create(&alice(), NewCollaboration::new(format!("Cat meme {}", i)))
                .unwrap();
        }
        let template = NewCollaboration {
            title: "Dog template".to_string(),
            kind: CollaborationType::TemplateCreation,
            ..Default::default()
        };
        svc.create(&alice(), template).unwrap();

        let page = svc
            .list(&ListQuery {
                q: Some("CAT".to_string()),
                limit: Some(2),
                page: Some(2),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.pages, 3);
        assert_eq!(page.items.len(), 2);

        let templates = svc.templates(&ListQuery::default()).unwrap();
        assert_eq!(templates.total, 1);
        assert_eq!(templates.items[0].title, "Dog template");

        assert!(matches!(
            svc.list(&ListQuery {
                kind: Some("meme".to_string()),
                ..Default::default()
            }),
            Err(CollaborationError::Validation(_))
        ));
    }

    #[test]
    fn test_page_past_the_end_is_empty() {
        let svc = service();
        for i in 0..3 {
            svc.create(&alice(), NewCollaboration::new(format!("Frog meme {}", i)))
                .unwrap();
        }

        let page = svc
            .list(&ListQuery {
                limit: Some(2),
                page: Some(usize::MAX),
                ..Default::default()
            })
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
        assert_eq!(page.pages, 2);
    }

    #[test]
    fn test_fork_failure_leaves_source_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let store = Arc::new(CollaborationStore::open(&data_dir).unwrap());
        let svc = CollaborationService::new(
            store.clone(),
            Arc::new(InMemoryMemeCatalog::new()),
            ServiceConfig::default(),
        );
        let id = svc
            .create(&alice(), NewCollaboration::new("Fragile"))
            .unwrap()
            .id();

        // Snapshot writes fail from here on
        std::fs::remove_dir_all(&data_dir).unwrap();
        let err = svc
            .fork(&Principal::user("bob"), &id, None, None)
            .unwrap_err();
        assert!(matches!(err, CollaborationError::Storage(_)));

        let source = store.get(&id).unwrap().unwrap();
        assert_eq!(source.stats().fork_count, 0);
        assert_eq!(source.revision(), 0);
        assert!(store.forks_of(&id).unwrap().is_empty());
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_fork_counts_on_source() {
        let svc = service();
        let id = svc.create(&alice(), NewCollaboration::new("Counted")).unwrap().id();
        let fork = svc.fork(&Principal::user("bob"), &id, None, Some(0)).unwrap();

        let source = svc.repo.get(&id).unwrap().unwrap();
        assert_eq!(source.stats().fork_count, 1);
        assert_eq!(source.revision(), 1);
        assert_eq!(fork.parent_collaboration(), Some(id));
        assert!(matches!(
            svc.fork(&Principal::user("carol"), &id, None, Some(0)),
            Err(CollaborationError::RevisionConflict { .. })
        ));
    }

    #[test]
    fn test_guest_cannot_comment_on_private() {
        let svc = service();
        let settings = CollaborationSettings {
            allow_anonymous: true,
            is_public: false,
            ..Default::default()
        };
        let id = svc
            .create(&alice(), NewCollaboration::new("Hidden").with_settings(settings))
            .unwrap()
            .id();

        assert!(svc.comments(None, &id).is_err());
        assert!(matches!(
            svc.add_comment(None, Some("guest"), &id, "let me in", None),
            Err(CollaborationError::Authorization(_))
        ));
        assert_eq!(svc.repo.get(&id).unwrap().unwrap().revision(), 0);
    }

    #[test]
    fn test_trending_prefers_forked() {
        let svc = service();
        let quiet = svc.create(&alice(), NewCollaboration::new("Quiet")).unwrap();
        let hot = svc.create(&alice(), NewCollaboration::new("Hot")).unwrap();
        svc.fork(&Principal::user("bob"), &hot.id(), None, None)
            .unwrap();

        let trending = svc.trending(Some(10)).unwrap();
        assert_eq!(trending[0].id, hot.id());
        assert!(trending.iter().any(|s| s.id == quiet.id()));
    }

    #[test]
    fn test_anonymous_comment_requires_name() {
        let svc = service();
        let settings = CollaborationSettings {
            allow_anonymous: true,
            ..Default::default()
        };
        let collab = svc
            .create(&alice(), NewCollaboration::new("Open").with_settings(settings))
            .unwrap();

        assert!(matches!(
            svc.add_comment(None, None, &collab.id(), "hello", None),
            Err(CollaborationError::Authorization(_))
        ));
        let comment = svc
            .add_comment(None, Some("guest"), &collab.id(), "hello", None)
            .unwrap();
        assert_eq!(comment.author.label(), "guest (guest)");
    }
}
