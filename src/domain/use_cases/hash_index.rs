use std::sync::Arc;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{entities::asset::Asset, errors::AppError, repositories::asset::AssetRepository};

/// Incremental SHA-256 over streamed chunks, hex encoded on finish.
#[derive(Default, Clone)]
pub struct ContentHasher {
    inner: Sha256,
    bytes: u64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Bytes fed so far.
    pub fn len(&self) -> u64 {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    pub fn finalize(self) -> String {
        hex::encode(self.inner.finalize())
    }

    pub fn digest(data: &[u8]) -> String {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }
}

/// Per-owner lookup of existing content by digest.
pub struct HashIndex<R>
where
    R: AssetRepository + ?Sized,
{
    repo: Arc<R>,
}

impl<R> HashIndex<R>
where
    R: AssetRepository + ?Sized,
{
    pub fn new(repo: Arc<R>) -> Self {
        HashIndex { repo }
    }

    /// Live asset of `owner_id` with the same content, if any. Other owners'
    /// assets never match.
    pub async fn find_by_hash(&self, content_hash: &str, owner_id: &Uuid) -> Result<Option<Asset>, AppError> {
        self.repo.find_by_hash(content_hash, owner_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunked_and_whole_digests_agree() {
        let mut hasher = ContentHasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.len(), 11);

        let chunked = hasher.finalize();
        assert_eq!(chunked, ContentHasher::digest(b"hello world"));
        assert_eq!(
            chunked,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn different_content_has_different_digest() {
        assert_ne!(ContentHasher::digest(b"a"), ContentHasher::digest(b"b"));
    }
}
