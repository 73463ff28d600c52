//! Storage port for sheet bytes
//!
//! One PDF per sheet, keyed by its id. The manager owns the registry and the
//! locking; adapters only move bytes.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::SheetError;

#[async_trait]
pub trait SheetStorage: Send + Sync {
    /// Replace the stored bytes for `id` as one unit.
    async fn save(&self, id: Uuid, bytes: &[u8]) -> Result<(), SheetError>;
    async fn load(&self, id: Uuid) -> Result<Vec<u8>, SheetError>;
    async fn delete(&self, id: Uuid) -> Result<(), SheetError>;
    async fn list(&self) -> Result<Vec<Uuid>, SheetError>;
}

// =============================================================================
// Filesystem
// =============================================================================

/// `<data_dir>/<uuid>.pdf`, replaced via a temporary sibling and a rename.
#[derive(Debug, Clone)]
pub struct FsSheetStorage {
    data_dir: PathBuf,
}

impl FsSheetStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.data_dir.join(format!("{}.pdf", id))
    }
}

#[async_trait]
impl SheetStorage for FsSheetStorage {
    async fn save(&self, id: Uuid, bytes: &[u8]) -> Result<(), SheetError> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        let path = self.path_for(id);
        let scratch = self.data_dir.join(format!(".{}.pdf.tmp", id));
        tokio::fs::write(&scratch, bytes).await?;
        if let Err(e) = tokio::fs::rename(&scratch, &path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&scratch).await {
                warn!(path = %scratch.display(), error = %cleanup, "failed to remove temporary sheet file");
            }
            return Err(e.into());
        }
        debug!(path = %path.display(), bytes = bytes.len(), "sheet persisted");
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Vec<u8>, SheetError> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SheetError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), SheetError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SheetError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<Uuid>, SheetError> {
        let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("pdf") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| Uuid::parse_str(stem).ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Keeps sheets in a map; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemorySheetStorage {
    sheets: RwLock<HashMap<Uuid, Vec<u8>>>,
}

impl MemorySheetStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SheetStorage for MemorySheetStorage {
    async fn save(&self, id: Uuid, bytes: &[u8]) -> Result<(), SheetError> {
        self.sheets.write().await.insert(id, bytes.to_vec());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Vec<u8>, SheetError> {
        self.sheets
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SheetError::NotFound(id))
    }

    async fn delete(&self, id: Uuid) -> Result<(), SheetError> {
        self.sheets
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(SheetError::NotFound(id))
    }

    async fn list(&self) -> Result<Vec<Uuid>, SheetError> {
        let mut ids: Vec<Uuid> = self.sheets.read().await.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsSheetStorage::new(&StorageConfig::new(dir.path().join("sheets")));
        let id = Uuid::new_v4();

        assert!(storage.list().await.unwrap().is_empty());
        storage.save(id, b"%PDF-1.7 first").await.unwrap();
        storage.save(id, b"%PDF-1.7 second").await.unwrap();
        assert_eq!(storage.load(id).await.unwrap(), b"%PDF-1.7 second".to_vec());
        assert_eq!(storage.list().await.unwrap(), vec![id]);

        let names: Vec<_> = std::fs::read_dir(storage.data_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![format!("{}.pdf", id)]);

        storage.delete(id).await.unwrap();
        assert!(matches!(storage.load(id).await, Err(SheetError::NotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn test_fs_failed_replace_removes_scratch_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsSheetStorage::new(&StorageConfig::new(dir.path()));
        let id = Uuid::new_v4();
        // A non-empty directory where the sheet should go makes the rename fail.
        let blocker = dir.path().join(format!("{}.pdf", id));
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), b"x").unwrap();

        assert!(matches!(storage.save(id, b"%PDF-1.7").await, Err(SheetError::Storage(_))));
        assert!(!dir.path().join(format!(".{}.pdf.tmp", id)).exists());
    }

    #[tokio::test]
    async fn test_fs_list_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"x").unwrap();
        let storage = FsSheetStorage::new(&StorageConfig::new(dir.path()));
        assert!(storage.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_storage_missing_sheet() {
        let storage = MemorySheetStorage::new();
        let id = Uuid::new_v4();
        assert!(matches!(storage.delete(id).await, Err(SheetError::NotFound(_))));
        storage.save(id, b"bytes").await.unwrap();
        assert_eq!(storage.list().await.unwrap(), vec![id]);
    }
}
