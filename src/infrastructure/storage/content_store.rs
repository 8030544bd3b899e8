//! Filesystem blob storage partitioned by UTC ingestion date.
//!
//! Layout: `{root}/{YYYY}/{MM}/{DD}/{uuid}.{ext}`. The generated name is a
//! fresh v4 UUID, unrelated to the asset's public identifier, so the
//! physical location can never be derived from a public link.

use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::errors::StorageError;

const FALLBACK_EXTENSION: &str = "bin";

static EXTENSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]{1,10}$").expect("valid extension regex")
});

#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ContentStore { root: root.into() }
    }

    /// Creates the storage root. Called once at startup.
    pub async fn init(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            StorageError::Io(format!("Failed to create storage root {}: {}", self.root.display(), e))
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a stored relative path to its absolute location.
    ///
    /// Only plain relative paths are accepted; `..`, roots and prefixes are
    /// rejected so a crafted record can never escape the storage root.
    pub fn resolve(&self, relative_path: &str) -> Result<PathBuf, StorageError> {
        let path = Path::new(relative_path);
        let is_plain = !relative_path.is_empty()
            && path.components().all(|c| matches!(c, Component::Normal(_)));

        if !is_plain {
            return Err(StorageError::InvalidPath(relative_path.to_string()));
        }

        Ok(self.root.join(path))
    }

    /// Writes `data` under today's partition and returns a guard owning the
    /// new blob. The blob is removed again when the guard is dropped without
    /// [`PendingBlob::keep`].
    pub async fn put(&self, data: &[u8], suggested_extension: Option<&str>) -> Result<PendingBlob, StorageError> {
        let extension = sanitize_extension(suggested_extension);
        let partition = Utc::now().format("%Y/%m/%d").to_string();
        let relative_path = format!("{}/{}.{}", partition, Uuid::new_v4(), extension);
        let final_path = self.resolve(&relative_path)?;

        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::Io(format!("Failed to create directory {}: {}", parent.display(), e))
            })?;
        }

        let temp_path = final_path.with_extension(format!("{}.tmp", extension));
        let temp_guard = PendingBlob::new(relative_path.clone(), temp_path.clone());

        tokio::fs::write(&temp_path, data).await.map_err(|e| {
            StorageError::Io(format!("Failed to write {}: {}", temp_path.display(), e))
        })?;

        // Arm the final guard before the rename so a cancellation at any
        // point leaves nothing behind.
        let blob = PendingBlob::new(relative_path, final_path.clone());

        tokio::fs::rename(&temp_path, &final_path).await.map_err(|e| {
            StorageError::Io(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                final_path.display(),
                e
            ))
        })?;
        temp_guard.keep();

        tracing::debug!(
            path = %blob.relative_path(),
            size = data.len(),
            "Stored blob"
        );

        Ok(blob)
    }

    pub async fn read(&self, relative_path: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(relative_path)?;

        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(relative_path.to_string())
            } else {
                StorageError::Io(format!("Failed to read {}: {}", path.display(), e))
            }
        })
    }

    /// Idempotent: removing a blob that does not exist is not an error.
    pub async fn remove(&self, relative_path: &str) -> Result<(), StorageError> {
        let path = self.resolve(relative_path)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %relative_path, "Removed blob");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(format!("Failed to remove {}: {}", path.display(), e))),
        }
    }

    pub async fn exists(&self, relative_path: &str) -> bool {
        match self.resolve(relative_path) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Whether the storage root is currently reachable.
    pub async fn is_available(&self) -> bool {
        tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }
}

/// Lower-cased extension if it is short and alphanumeric, `bin` otherwise.
pub fn sanitize_extension(suggested: Option<&str>) -> String {
    suggested
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| EXTENSION_RE.is_match(ext))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// Extension of an uploaded file name, if any.
pub fn extension_of(file_name: &str) -> Option<&str> {
    Path::new(file_name).extension().and_then(|e| e.to_str())
}

/// A freshly written blob that is deleted on drop unless kept.
///
/// Compensates for failures after the write: a failed metadata commit, or
/// the upload future being dropped mid-flight.
#[derive(Debug)]
pub struct PendingBlob {
    relative_path: String,
    absolute_path: PathBuf,
    armed: bool,
}

impl PendingBlob {
    fn new(relative_path: String, absolute_path: PathBuf) -> Self {
        PendingBlob { relative_path, absolute_path, armed: true }
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Disarms the guard; the blob now belongs to a committed record.
    pub fn keep(mut self) -> String {
        self.armed = false;
        std::mem::take(&mut self.relative_path)
    }

    /// Removes the blob now rather than on drop.
    pub async fn discard(mut self) {
        self.armed = false;
        match tokio::fs::remove_file(&self.absolute_path).await {
            Ok(()) => tracing::info!(path = %self.relative_path, "Discarded uncommitted blob"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!(
                path = %self.relative_path,
                "Failed to discard uncommitted blob: {}", e
            ),
        }
    }
}

impl Drop for PendingBlob {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.absolute_path) {
            Ok(()) => tracing::info!(path = %self.absolute_path.display(), "Removed orphaned blob"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!(
                path = %self.absolute_path.display(),
                "Failed to remove orphaned blob: {}", e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn put_partitions_by_date_and_keeps_blob() {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::new(temp_dir.path());

        let blob = store.put(b"pixels", Some("PNG")).await.unwrap();
        let relative = blob.keep();

        let today = Utc::now().format("%Y/%m/%d").to_string();
        assert!(relative.starts_with(&today));
        assert!(relative.ends_with(".png"));
        assert_eq!(store.read(&relative).await.unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn dropped_guard_removes_blob() {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::new(temp_dir.path());

        let blob = store.put(b"pixels", Some("jpg")).await.unwrap();
        let relative = blob.relative_path().to_string();
        assert!(store.exists(&relative).await);

        drop(blob);
        assert!(!store.exists(&relative).await);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::new(temp_dir.path());

        let relative = store.put(b"x", None).await.unwrap().keep();
        assert!(relative.ends_with(".bin"));

        store.remove(&relative).await.unwrap();
        store.remove(&relative).await.unwrap();
        store.remove("2020/01/01/never-written.png").await.unwrap();
    }

    #[test]
    fn resolve_rejects_escaping_paths() {
        let store = ContentStore::new("/srv/images");

        assert!(store.resolve("../etc/passwd").is_err());
        assert!(store.resolve("/etc/passwd").is_err());
        assert!(store.resolve("").is_err());
        assert_eq!(
            store.resolve("2024/01/02/a.png").unwrap(),
            PathBuf::from("/srv/images/2024/01/02/a.png")
        );
    }

    #[test]
    fn extensions_are_sanitized() {
        assert_eq!(sanitize_extension(Some(".JPeG")), "jpeg");
        assert_eq!(sanitize_extension(Some("p/ng")), "bin");
        assert_eq!(sanitize_extension(Some("averyveryverylongext")), "bin");
        assert_eq!(sanitize_extension(None), "bin");
    }

    #[tokio::test]
    async fn missing_root_surfaces_as_error() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("gone");
        let store = ContentStore::new(&root);
        store.init().await.unwrap();

        // Replace the root directory with a regular file.
        std::fs::remove_dir_all(&root).unwrap();
        std::fs::write(&root, b"not a directory").unwrap();

        assert!(!store.is_available().await);
        assert!(matches!(store.put(b"x", Some("png")).await, Err(StorageError::Io(_))));
    }
}
