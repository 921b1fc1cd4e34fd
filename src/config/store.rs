//! Persistence collaborator for section state
//!
//! Blobs are opaque to the store and keyed by string. The section list is
//! stored as JSON under [`SECTIONS_KEY`]; anything unreadable yields the
//! canonical default sections.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants::config::{APP_DIR, SECTIONS_KEY};
use crate::section::{initialize_sections, Section, SectionSet};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("blob could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait Store {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn save(&self, key: &str, blob: &[u8]) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// One `<key>.json` file per key under a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store rooted at the platform config dir
    pub fn default_location() -> Self {
        let mut dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        dir.push(APP_DIR);
        Self::new(dir)
    }

    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Store for FileStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        // Write then rename so a crash never leaves a truncated blob
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), bytes = blob.len(), "Saved blob");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let blobs = self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(blobs.get(key).cloned())
    }

    fn save(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
        let mut blobs = self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        blobs.insert(key.to_string(), blob.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut blobs = self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        blobs.remove(key);
        Ok(())
    }
}

/// Load the section arena, falling back to defaults on any failure
pub fn load_sections(store: &dyn Store) -> SectionSet {
    let persisted = match store.load(SECTIONS_KEY) {
        Ok(Some(blob)) => match serde_json::from_slice::<Vec<Section>>(&blob) {
            Ok(sections) => {
                info!(count = sections.len(), "Loaded persisted sections");
                Some(sections)
            }
            Err(e) => {
                warn!(error = %e, "Persisted sections are corrupt, resetting to defaults");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Failed to load persisted sections, using defaults");
            None
        }
    };
    initialize_sections(persisted)
}

pub fn save_sections(store: &dyn Store, sections: &SectionSet) -> Result<(), StoreError> {
    let blob = serde_json::to_vec_pretty(&sections.to_vec())?;
    store.save(SECTIONS_KEY, &blob)
}
