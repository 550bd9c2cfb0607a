//! SS File Store (spec §2, §6.3): the on-disk directory holding this SS's
//! share of file bytes, keyed by trie name with `/` creating one level of
//! subdirectory.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    async fn ensure_parent(&self, path: &Path) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Physically creates an empty file (spec §4.4 CREATE: "primary
    /// physically creates").
    pub async fn create_file(&self, name: &str) -> StoreResult<()> {
        let path = self.path_for(name);
        self.ensure_parent(&path).await?;
        tokio::fs::write(&path, b"").await?;
        Ok(())
    }

    pub async fn create_folder(&self, name: &str) -> StoreResult<()> {
        let path = self.path_for(name);
        tokio::fs::create_dir_all(&path).await?;
        Ok(())
    }

    /// Idempotent: a missing file is not an error (spec §4.10 "delete-then-
    /// recreate" is expected to tolerate a stale or absent copy).
    pub async fn delete(&self, name: &str) -> StoreResult<()> {
        let path = self.path_for(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, name: &str) -> bool {
        tokio::fs::metadata(self.path_for(name)).await.is_ok()
    }

    pub async fn read(&self, name: &str) -> StoreResult<Vec<u8>> {
        Ok(tokio::fs::read(self.path_for(name)).await?)
    }

    pub async fn write(&self, name: &str, content: &[u8]) -> StoreResult<()> {
        let path = self.path_for(name);
        self.ensure_parent(&path).await?;
        tokio::fs::write(&path, content).await?;
        Ok(())
    }

    pub async fn size(&self, name: &str) -> StoreResult<u64> {
        Ok(tokio::fs::metadata(self.path_for(name)).await?.len())
    }

    /// `NM_MOVE src dest` (spec §4.4 MOVE: "ensure destination folder
    /// exists there, then rename").
    pub async fn move_entry(&self, src: &str, dest: &str) -> StoreResult<()> {
        let src_path = self.path_for(src);
        let dest_path = self.path_for(dest);
        self.ensure_parent(&dest_path).await?;
        tokio::fs::rename(&src_path, &dest_path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_read_write_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.create_file("a.txt").await.unwrap();
        assert!(store.exists("a.txt").await);
        store.write("a.txt", b"hello").await.unwrap();
        assert_eq!(store.read("a.txt").await.unwrap(), b"hello");
        assert_eq!(store.size("a.txt").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.delete("missing.txt").await.unwrap();
    }

    #[tokio::test]
    async fn folder_segment_creates_one_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.create_file("notes/a.txt").await.unwrap();
        assert!(store.exists("notes/a.txt").await);
    }

    #[tokio::test]
    async fn move_entry_renames_across_folders() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.create_file("a.txt").await.unwrap();
        store.write("a.txt", b"hi").await.unwrap();
        store.move_entry("a.txt", "notes/a.txt").await.unwrap();
        assert!(!store.exists("a.txt").await);
        assert_eq!(store.read("notes/a.txt").await.unwrap(), b"hi");
    }
}
