/// Meme reference catalog
/// Memes are created and stored by a separate subsystem; collaborations only
/// need to resolve them by id.
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::{CollaborationError, MemeId, Result, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemeRef {
    pub id: MemeId,
    pub owner_id: UserId,
    pub image_url: String,
    pub title: String,
}

pub trait MemeCatalog: Send + Sync {
    fn get(&self, id: &MemeId) -> Option<MemeRef>;
}

#[derive(Default)]
pub struct InMemoryMemeCatalog {
    memes: RwLock<HashMap<MemeId, MemeRef>>,
}

impl InMemoryMemeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON array of meme references
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|e| CollaborationError::Storage(format!("{}: {}", path.display(), e)))?;
        let memes: Vec<MemeRef> = serde_json::from_str(&data)
            .map_err(|e| CollaborationError::Storage(format!("{}: {}", path.display(), e)))?;

        let catalog = Self::new();
        for meme in memes {
            catalog.insert(meme);
        }
        info!("Loaded {} meme references from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn insert(&self, meme: MemeRef) {
        self.memes.write().insert(meme.id.clone(), meme);
    }

    pub fn len(&self) -> usize {
        self.memes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.memes.read().is_empty()
    }
}

impl MemeCatalog for InMemoryMemeCatalog {
    fn get(&self, id: &MemeId) -> Option<MemeRef> {
        self.memes.read().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "meme123", "ownerId": "alice", "imageUrl": "https://cdn.example/m.png", "title": "Doge"}}]"#
        )
        .unwrap();

        let catalog = InMemoryMemeCatalog::from_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 1);

        let meme = catalog.get(&MemeId::new("meme123")).unwrap();
        assert_eq!(meme.owner_id, UserId::new("alice"));
        assert!(catalog.get(&MemeId::new("missing")).is_none());
    }

    #[test]
    fn test_bad_file_is_storage_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            InMemoryMemeCatalog::from_file(file.path()),
            Err(CollaborationError::Storage(_))
        ));
    }
}
