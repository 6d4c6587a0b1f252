/// Collaboration repository
/// In-memory store with optional JSON snapshot persistence and secondary
/// indices for invitee and fork lookups.
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{Collaboration, CollaborationError, CollaborationId, Result, UserId};

const SNAPSHOT_FILE: &str = "collaborations.json";

pub trait CollaborationRepository: Send + Sync {
    fn get(&self, id: &CollaborationId) -> Result<Option<Collaboration>>;

    /// Store a new collaboration; fails with a conflict if the id exists
    fn insert(&self, collab: Collaboration) -> Result<Collaboration>;

    /// Compare-and-swap write. Succeeds only if the stored revision equals
    /// `expected_revision`; the stored copy gets the next revision.
    fn update(&self, collab: Collaboration, expected_revision: u64) -> Result<Collaboration>;

    /// Store a new fork and the updated source in one commit. The source write
    /// is checked against `expected_revision` like `update`.
    fn insert_fork(
        &self,
        fork: Collaboration,
        source: Collaboration,
        expected_revision: u64,
    ) -> Result<(Collaboration, Collaboration)>;

    fn list_all(&self) -> Result<Vec<Collaboration>>;

    /// Collaborations holding a pending entry for `user_id`
    fn pending_invites_for(&self, user_id: &UserId) -> Result<Vec<CollaborationId>>;

    /// Direct forks of `id`
    fn forks_of(&self, id: &CollaborationId) -> Result<Vec<CollaborationId>>;
}

#[derive(Default)]
struct StoreState {
    collaborations: HashMap<CollaborationId, Collaboration>,
    invite_index: HashMap<UserId, HashSet<CollaborationId>>,
    fork_index: HashMap<CollaborationId, Vec<CollaborationId>>,
}

impl StoreState {
    fn index(&mut self, previous: Option<&Collaboration>, current: &Collaboration) {
        if let Some(previous) = previous {
            for invite in previous.pending_invites() {
                if let Some(ids) = self.invite_index.get_mut(&invite.user_id) {
                    ids.remove(&previous.id());
                    if ids.is_empty() {
                        self.invite_index.remove(&invite.user_id);
                    }
                }
            }
        } else if let Some(parent) = current.parent_collaboration() {
            self.fork_index.entry(parent).or_default().push(current.id());
        }

        for invite in current.pending_invites() {
            self.invite_index
                .entry(invite.user_id.clone())
                .or_default()
                .insert(current.id());
        }
    }
}

pub struct CollaborationStore {
    storage_path: Option<PathBuf>,
    state: RwLock<StoreState>,
}

impl CollaborationStore {
    pub fn in_memory() -> Self {
        Self {
            storage_path: None,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Open a store persisted under `storage_path`, reloading any snapshot
    pub fn open(storage_path: impl AsRef<Path>) -> Result<Self> {
        let storage_path = storage_path.as_ref().to_path_buf();
        fs::create_dir_all(&storage_path).map_err(storage_err)?;

        let snapshot = storage_path.join(SNAPSHOT_FILE);
        let collaborations: Vec<Collaboration> = if snapshot.exists() {
            let data = fs::read_to_string(&snapshot).map_err(storage_err)?;
            serde_json::from_str(&data).map_err(storage_err)?
        } else {
            Vec::new()
        };

        let mut state = StoreState::default();
        for collab in &collaborations {
            state.index(None, collab);
        }
        state.collaborations = collaborations
            .into_iter()
            .map(|c| (c.id(), c))
            .collect();

        info!(
            "Loaded {} collaborations from {}",
            state.collaborations.len(),
            storage_path.display()
        );

        Ok(Self {
            storage_path: Some(storage_path),
            state: RwLock::new(state),
        })
    }

    fn save(&self, collaborations: &HashMap<CollaborationId, Collaboration>) -> Result<()> {
        let Some(path) = &self.storage_path else {
            return Ok(());
        };
        let mut all: Vec<&Collaboration> = collaborations.values().collect();
        all.sort_by_key(|c| c.created_at());
        let json = serde_json::to_string_pretty(&all).map_err(storage_err)?;
        fs::write(path.join(SNAPSHOT_FILE), json).map_err(storage_err)?;
        Ok(())
    }

    /// Persist first, then swap in-memory state so a failed write leaves nothing behind
    fn commit(&self, state: &mut StoreState, collabs: Vec<Collaboration>) -> Result<()> {
        if self.storage_path.is_some() {
            let mut next = state.collaborations.clone();
            for collab in &collabs {
                next.insert(collab.id(), collab.clone());
            }
            self.save(&next)?;
        }
        for collab in collabs {
            let previous = state.collaborations.insert(collab.id(), collab.clone());
            state.index(previous.as_ref(), &collab);
        }
        Ok(())
    }
}

fn ensure_absent(state: &StoreState, id: &CollaborationId) -> Result<()> {
    if state.collaborations.contains_key(id) {
        return Err(CollaborationError::Conflict(format!(
            "collaboration {} already exists",
            id
        )));
    }
    Ok(())
}

/// Check the stored revision and stamp the next one onto `collab`
fn next_revision(
    state: &StoreState,
    collab: &mut Collaboration,
    expected_revision: u64,
) -> Result<u64> {
    let actual = state
        .collaborations
        .get(&collab.id())
        .map(|c| c.revision())
        .ok_or_else(|| CollaborationError::NotFound(format!("collaboration {}", collab.id())))?;

    if actual != expected_revision {
        return Err(CollaborationError::RevisionConflict {
            expected: expected_revision,
            actual,
        });
    }

    collab.set_revision(actual + 1);
    Ok(actual + 1)
}

fn storage_err(e: impl std::fmt::Display) -> CollaborationError {
    CollaborationError::Storage(e.to_string())
}

impl CollaborationRepository for CollaborationStore {
    fn get(&self, id: &CollaborationId) -> Result<Option<Collaboration>> {
        Ok(self.state.read().collaborations.get(id).cloned())
    }

    fn insert(&self, collab: Collaboration) -> Result<Collaboration> {
        let mut state = self.state.write();
        ensure_absent(&state, &collab.id())?;
        self.commit(&mut state, vec![collab.clone()])?;
        debug!("Inserted collaboration {}", collab.id());
        Ok(collab)
    }

    fn update(&self, mut collab: Collaboration, expected_revision: u64) -> Result<Collaboration> {
        let mut state = self.state.write();
        let revision = next_revision(&state, &mut collab, expected_revision)?;
        self.commit(&mut state, vec![collab.clone()])?;
        debug!("Updated collaboration {} to revision {}", collab.id(), revision);
        Ok(collab)
    }

    fn insert_fork(
        &self,
        fork: Collaboration,
        mut source: Collaboration,
        expected_revision: u64,
    ) -> Result<(Collaboration, Collaboration)> {
        let mut state = self.state.write();
        ensure_absent(&state, &fork.id())?;
        let revision = next_revision(&state, &mut source, expected_revision)?;
        self.commit(&mut state, vec![source.clone(), fork.clone()])?;
        debug!(
            "Inserted fork {} of {} (source revision {})",
            fork.id(),
            source.id(),
            revision
        );
        Ok((fork, source))
    }

    fn list_all(&self) -> Result<Vec<Collaboration>> {
        Ok(self.state.read().collaborations.values().cloned().collect())
    }

    fn pending_invites_for(&self, user_id: &UserId) -> Result<Vec<CollaborationId>> {
        Ok(self
            .state
            .read()
            .invite_index
            .get(user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    fn forks_of(&self, id: &CollaborationId) -> Result<Vec<CollaborationId>> {
        Ok(self
            .state
            .read()
            .fork_index
            .get(id)
            .cloned()
            .unwrap_or_default())
    }
}
