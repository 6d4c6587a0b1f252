/// Collaboration workflow integration tests
/// Multi-user scenarios driven through the service and the in-memory repository
use collaboration::*;
use std::sync::Arc;

fn service() -> CollaborationService {
    let memes = InMemoryMemeCatalog::new();
    memes.insert(MemeRef {
        id: MemeId::new("meme123"),
        owner_id: UserId::new("someone"),
        image_url: "https://cdn.example/meme123.png".to_string(),
        title: "Success kid".to_string(),
    });
    CollaborationService::new(
        Arc::new(CollaborationStore::in_memory()),
        Arc::new(memes),
        ServiceConfig::default(),
    )
}

fn with_max(title: &str, max: u32) -> NewCollaboration {
    NewCollaboration::new(title).with_settings(CollaborationSettings {
        max_collaborators: max,
        ..Default::default()
    })
}

/// No user is both a member and a pending invitee, and capacity holds
fn assert_invariants(collab: &Collaboration) {
    assert!(collab.collaborators().len() + 1 <= collab.settings().max_collaborators as usize);
    for invite in collab.pending_invites() {
        assert!(collab.effective_role(&invite.user_id).is_none());
    }
    assert!(collab
        .collaborators()
        .iter()
        .all(|c| &c.user_id != collab.owner()));
}

#[test]
fn test_invite_accept_scenario() {
    let svc = service();
    let owner = Principal::user("owner");
    let user_b = Principal::user("userB");

    let collab = svc.create(&owner, with_max("Two person job", 2)).unwrap();
    svc.invite(
        &owner,
        &collab.id(),
        user_b.user_id.clone(),
        Role::Contributor,
        Some("join me".to_string()),
        None,
    )
    .unwrap();

    let collab = svc.accept_invite(&user_b, &collab.id(), None).unwrap();
    assert_eq!(collab.collaborators().len(), 1);
    assert_eq!(collab.collaborators()[0].user_id, user_b.user_id);
    assert_eq!(collab.collaborators()[0].role, Role::Contributor);
    assert!(collab.pending_invites().is_empty());
    assert_invariants(&collab);
}

#[test]
fn test_capacity_scenario() {
    let svc = service();
    let owner = Principal::user("owner");
    let collab = svc.create(&owner, with_max("Full house", 2)).unwrap();
    let id = collab.id();

    svc.invite(&owner, &id, UserId::new("userB"), Role::Editor, None, None)
        .unwrap();
    svc.accept_invite(&Principal::user("userB"), &id, None)
        .unwrap();

    let err = svc
        .invite(&owner, &id, UserId::new("userC"), Role::Viewer, None, None)
        .unwrap_err();
    assert!(matches!(err, CollaborationError::Capacity(_)));

    let err = svc
        .join(&Principal::user("userD"), &id, None, None)
        .unwrap_err();
    assert!(matches!(err, CollaborationError::Capacity(_)));

    let collab = svc.get(None, &id).unwrap();
    assert_eq!(collab.collaborators().len(), 1);
    assert_invariants(&collab);
}

#[test]
fn test_remix_validation_scenario() {
    let svc = service();
    let owner = Principal::user("owner");

    let err = svc
        .create(&owner, NewCollaboration::remix("Remix time", None))
        .unwrap_err();
    assert!(matches!(err, CollaborationError::Validation(_)));

    let collab = svc
        .create(
            &owner,
            NewCollaboration::remix("Remix time", Some(MemeId::new("meme123"))),
        )
        .unwrap();
    assert_eq!(collab.original_meme(), Some(&MemeId::new("meme123")));
}

#[test]
fn test_fork_disabled_scenario() {
    let svc = service();
    let owner = Principal::user("owner");
    let input = NewCollaboration::new("No forks").with_settings(CollaborationSettings {
        allow_forks: false,
        ..Default::default()
    });
    let collab = svc.create(&owner, input).unwrap();
    let before = svc.versions(None, &collab.id()).unwrap();

    for actor in [Principal::user("other"), owner.clone()] {
        let err = svc.fork(&actor, &collab.id(), None, None).unwrap_err();
        assert!(matches!(err, CollaborationError::Forbidden(_)));
    }

    let stats = svc.stats(None, &collab.id()).unwrap();
    assert_eq!(stats.basic.fork_count, 0);
    assert_eq!(svc.versions(None, &collab.id()).unwrap(), before);
}

#[test]
fn test_title_bounds_scenario() {
    let svc = service();
    let owner = Principal::user("owner");

    assert!(matches!(
        svc.create(&owner, NewCollaboration::new("ab")),
        Err(CollaborationError::Validation(_))
    ));
    assert!(svc.create(&owner, NewCollaboration::new("abc")).is_ok());
    assert!(matches!(
        svc.create(&owner, NewCollaboration::new("a".repeat(201))),
        Err(CollaborationError::Validation(_))
    ));
}

#[test]
fn test_fork_lineage() {
    let svc = service();
    let owner = Principal::user("owner");
    let forker = Principal::user("forker");

    let source = svc.create(&owner, NewCollaboration::new("Origin story")).unwrap();
    for title in ["sketch", "caption", "final"] {
        svc.add_version(&owner, &source.id(), NewVersion::new(title), None)
            .unwrap();
    }
    let source_versions = svc.versions(None, &source.id()).unwrap();

    let fork = svc.fork(&forker, &source.id(), None, None).unwrap();
    assert_eq!(fork.parent_collaboration(), Some(source.id()));
    assert_eq!(fork.owner(), &forker.user_id);
    assert_ne!(fork.owner(), &owner.user_id);
    assert_eq!(fork.versions(), source_versions.as_slice());
    assert_eq!(fork.title(), "Origin story (Fork)");

    // Fork history diverges afterwards without touching the source
    svc.add_version(&forker, &fork.id(), NewVersion::new("my spin"), None)
        .unwrap();
    assert_eq!(svc.versions(None, &source.id()).unwrap().len(), 3);
    assert_eq!(svc.versions(None, &fork.id()).unwrap().len(), 4);

    let forks = svc.forks(None, &source.id()).unwrap();
    assert_eq!(forks.len(), 1);
    assert_eq!(forks[0].id, fork.id());
    assert_eq!(svc.stats(None, &source.id()).unwrap().basic.fork_count, 1);

    // Self-fork keeps the same owner
    let self_fork = svc
        .fork(&owner, &source.id(), Some("Director's cut"), None)
        .unwrap();
    assert_eq!(self_fork.owner(), &owner.user_id);
}

#[test]
fn test_role_closure_leaves_aggregate_unchanged() {
    let svc = service();
    let owner = Principal::user("owner");
    let collab = svc.create(&owner, NewCollaboration::new("Roles")).unwrap();
    let id = collab.id();
    svc.join(&Principal::user("fan"), &id, None, None).unwrap();

    let before = svc.versions(None, &id).unwrap();
    let revision_before = svc.get(None, &id).unwrap().revision();

    let err = svc
        .update_collaborator_role(&owner, &id, &UserId::new("fan"), Role::Owner, None)
        .unwrap_err();
    assert!(matches!(err, CollaborationError::Validation(_)));
    assert!(matches!(
        "superuser".parse::<Role>(),
        Err(CollaborationError::Validation(_))
    ));

    // Only the view recorded by get() moved the revision
    let after = svc.get(None, &id).unwrap();
    assert_eq!(after.revision(), revision_before + 1);
    assert_eq!(after.effective_role(&UserId::new("fan")), Some(Role::Contributor));
    assert_eq!(svc.versions(None, &id).unwrap(), before);
}

#[test]
fn test_decline_twice_is_not_found() {
    let svc = service();
    let owner = Principal::user("owner");
    let guest = Principal::user("guest");
    let collab = svc.create(&owner, NewCollaboration::new("Declines")).unwrap();
    let id = collab.id();

    // Never invited
    assert!(matches!(
        svc.decline_invite(&guest, &id, None),
        Err(CollaborationError::NotFound(_))
    ));

    svc.invite(&owner, &id, guest.user_id.clone(), Role::Viewer, None, None)
        .unwrap();
    svc.decline_invite(&guest, &id, None).unwrap();

    let revision = svc.get(None, &id).unwrap().revision();
    for _ in 0..2 {
        assert!(matches!(
            svc.decline_invite(&guest, &id, None),
            Err(CollaborationError::NotFound(_))
        ));
    }
    // Each get() bumps the view counter; nothing else was written
    assert_eq!(svc.get(None, &id).unwrap().revision(), revision + 1);
}

#[test]
fn test_history_is_append_only() {
    let svc = service();
    let owner = Principal::user("owner");
    let editor = Principal::user("editor");
    let collab = svc.create(&owner, NewCollaboration::new("History")).unwrap();
    let id = collab.id();

    svc.invite(&owner, &id, editor.user_id.clone(), Role::Editor, None, None)
        .unwrap();
    svc.accept_invite(&editor, &id, None).unwrap();

    let mut last_versions = 0;
    let mut last_comments = 0;
    for step in 0..6 {
        match step % 3 {
            0 => {
                svc.add_version(
                    &editor,
                    &id,
                    NewVersion::new(format!("v{}", step))
                        .with_change(Change::new("caption").with_description("tweak")),
                    None,
                )
                .unwrap();
            }
            1 => {
                svc.add_comment(Some(&owner), None, &id, "nice", None)
                    .unwrap();
            }
            _ => {
                // Rejected operations must not shrink history either
                let _ = svc.add_comment(Some(&Principal::user("stranger")), None, &id, "hi", None);
                let _ = svc.leave(&owner, &id, None);
            }
        }

        let collab = svc.get(None, &id).unwrap();
        assert!(collab.versions().len() >= last_versions);
        assert!(collab.comments().len() >= last_comments);
        last_versions = collab.versions().len();
        last_comments = collab.comments().len();
        assert_invariants(&collab);
    }

    assert_eq!(last_versions, 2);
    assert_eq!(last_comments, 2);
}

#[test]
fn test_join_request_flow() {
    let svc = service();
    let owner = Principal::user("owner");
    let fan = Principal::user("fan");
    let input = NewCollaboration::new("Curated").with_settings(CollaborationSettings {
        require_approval: true,
        ..Default::default()
    });
    let id = svc.create(&owner, input).unwrap().id();

    assert_eq!(
        svc.join(&fan, &id, Some("please".to_string()), None).unwrap(),
        JoinOutcome::Requested
    );
    // Join requests are not invitations addressed to the user
    assert!(svc.pending_invites(&fan).unwrap().is_empty());

    let member = svc
        .approve_join_request(&owner, &id, &fan.user_id, None)
        .unwrap();
    assert_eq!(member.role, Role::Contributor);

    let another = Principal::user("another");
    svc.join(&another, &id, None, None).unwrap();
    svc.reject_join_request(&owner, &id, &another.user_id, None)
        .unwrap();
    let collab = svc.get(None, &id).unwrap();
    assert!(collab.pending_invites().is_empty());
    assert_eq!(collab.collaborators().len(), 1);
}

#[test]
fn test_derived_views() {
    let svc = service();
    let owner = Principal::user("owner");
    let id = svc
        .create(&owner, NewCollaboration::new("Views"))
        .unwrap()
        .id();

    svc.add_version(&owner, &id, NewVersion::new("v1"), None)
        .unwrap();
    svc.add_comment(Some(&owner), None, &id, "first!", None)
        .unwrap();
    svc.invite(&owner, &id, UserId::new("pal"), Role::Viewer, None, None)
        .unwrap();

    let stats = svc.stats(None, &id).unwrap();
    assert_eq!(stats.basic.version_count, 1);
    assert_eq!(stats.basic.comment_count, 1);
    assert_eq!(stats.activity.versions_last_7d, 1);

    let feed = svc.activity(None, &id, Some(10)).unwrap();
    assert_eq!(feed.len(), 3);
    assert_eq!(feed[0].kind, ActivityKind::Invite);

    let insights = svc.insights(None, &id).unwrap();
    assert_eq!(insights.quality.completion_score, 15);
    assert!(insights
        .recommendations
        .contains(&"Invite more collaborators to grow the project".to_string()));
}
