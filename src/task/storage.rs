#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

/// The single key the whole task list lives under.
pub const STORAGE_KEY: &str = "tasks";

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable key-value store holding the serialized task list.
///
/// Every `save` carries the complete list, so repeated calls with newer
/// snapshots are safe and the last one wins.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Returns the stored blob, or `None` when nothing has been saved yet.
    async fn load(&self) -> StorageResult<Option<String>>;

    async fn save(&self, blob: String) -> StorageResult<()>;
}

/// Stores the blob as `<dir>/tasks.json`.
#[derive(Debug, Clone)]
pub struct FileGateway {
    dir: PathBuf,
}

impl FileGateway {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{STORAGE_KEY}.json"))
    }
}

#[async_trait]
impl PersistenceGateway for FileGateway {
    async fn load(&self) -> StorageResult<Option<String>> {
        let path = self.path();
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    async fn save(&self, blob: String) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StorageError::Io {
                path: self.dir.clone(),
                source,
            })?;
        let path = self.path();
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, blob.as_bytes())
            .await
            .map_err(|source| StorageError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StorageError::Io { path, source })?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    blob: Option<String>,
    saves: Vec<String>,
    fail_load: bool,
    fail_save: bool,
}

/// In-process gateway. Records every saved snapshot and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_blob(blob: impl Into<String>) -> Self {
        let gw = Self::default();
        gw.lock().blob = Some(blob.into());
        gw
    }

    pub fn set_fail_load(&self, fail: bool) {
        self.lock().fail_load = fail;
    }

    pub fn set_fail_save(&self, fail: bool) {
        self.lock().fail_save = fail;
    }

    /// The blob currently stored under the key.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.lock().blob.clone()
    }

    /// Every snapshot that reached `save`, including failed attempts.
    #[must_use]
    pub fn saves(&self) -> Vec<String> {
        self.lock().saves.clone()
    }

    #[must_use]
    pub fn save_count(&self) -> usize {
        self.lock().saves.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn load(&self) -> StorageResult<Option<String>> {
        let state = self.lock();
        if state.fail_load {
            return Err(StorageError::Unavailable("load failed".to_owned()));
        }
        Ok(state.blob.clone())
    }

    async fn save(&self, blob: String) -> StorageResult<()> {
        let mut state = self.lock();
        state.saves.push(blob.clone());
        if state.fail_save {
            return Err(StorageError::Unavailable("save failed".to_owned()));
        }
        state.blob = Some(blob);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_gateway_reports_absent_then_round_trips() {
        let td = tempfile::tempdir().expect("tempdir");
        let gw = FileGateway::new(td.path().join("nested").join("data"));

        assert_eq!(gw.load().await.unwrap(), None);

        gw.save("[1]".to_owned()).await.unwrap();
        gw.save("[2]".to_owned()).await.unwrap();
        assert_eq!(gw.load().await.unwrap().as_deref(), Some("[2]"));
        assert!(gw.path().ends_with("tasks.json"));
        assert!(!gw.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn file_gateway_surfaces_unreadable_storage() {
        let td = tempfile::tempdir().expect("tempdir");
        let gw = FileGateway::new(td.path().to_path_buf());
        std::fs::create_dir_all(gw.path()).expect("mkdir over key");

        assert!(matches!(gw.load().await, Err(StorageError::Io { .. })));
        assert!(gw.save("[]".to_owned()).await.is_err());
    }

    #[tokio::test]
    async fn memory_gateway_records_failed_saves_without_storing() {
        let gw = MemoryGateway::with_blob("[]");
        gw.set_fail_save(true);
        assert!(gw.save("[1]".to_owned()).await.is_err());
        assert_eq!(gw.current().as_deref(), Some("[]"));
        assert_eq!(gw.save_count(), 1);

        gw.set_fail_load(true);
        assert!(gw.load().await.is_err());
    }
}
