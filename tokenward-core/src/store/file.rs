//! Persistent client-side credential jar.
//!
//! The jar is a JSON document mapping keys to `{value, expires_at}` records.
//! It is read once when opened and rewritten after every mutation, with
//! expired entries pruned on save. Each save goes through a sibling temporary
//! file renamed over the jar, so a reader never sees a partial write.
//!
//! # Storage Location
//!
//! The CLI keeps its jar at `<data_dir>/tokenward/credentials.json`; any path
//! can be passed to [`FileJarStore::open`].

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{CredentialStore, Secret, SetOptions, StoreError, StoredEntry};

/// On-disk format of the jar.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JarData {
    /// Version of the jar format.
    version: u32,

    /// Stored entries by key.
    entries: BTreeMap<String, StoredEntry>,
}

impl Default for JarData {
    fn default() -> Self {
        Self {
            version: 1,
            entries: BTreeMap::new(),
        }
    }
}

/// File-backed credential jar owned by the local session.
pub struct FileJarStore {
    path: PathBuf,
    data: Mutex<JarData>,
}

impl FileJarStore {
    /// Open the jar at `path`, creating parent directories as needed.
    ///
    /// A missing file is treated as an empty jar; it is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let data = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&contents)?
        } else {
            JarData::default()
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Location of the jar file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the jar file atomically. The file is readable by its owner only.
    fn save(&self, data: &mut JarData) -> Result<(), StoreError> {
        let now = Utc::now();
        data.entries.retain(|_, entry| entry.is_live(now));

        let contents = serde_json::to_vec_pretty(&*data)?;
        let io_error = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut staged = NamedTempFile::new_in(dir).map_err(io_error)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            staged
                .as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(io_error)?;
        }

        staged.write_all(&contents).map_err(io_error)?;
        staged.as_file().sync_all().map_err(io_error)?;
        staged
            .persist(&self.path)
            .map_err(|e| io_error(e.error))?;
        Ok(())
    }
}

impl std::fmt::Debug for FileJarStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileJarStore")
            .field("path", &self.path)
            .finish()
    }
}

#[async_trait]
impl CredentialStore for FileJarStore {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        let data = self.data.lock();
        Ok(data
            .entries
            .get(key)
            .filter(|entry| entry.is_live(Utc::now()))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &Secret, options: &SetOptions) -> Result<(), StoreError> {
        let mut data = self.data.lock();
        data.entries
            .insert(key.to_string(), StoredEntry::new(value.clone(), options));
        self.save(&mut data)
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut data = self.data.lock();
        if data.entries.remove(key).is_none() {
            return Ok(());
        }
        self.save(&mut data)
    }
}
