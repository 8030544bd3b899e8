use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    entities::{
        asset::AssetInsert,
        owner::{Owner, Requester},
        upload::{ItemOutcome, UploadItem, UploadReport},
    },
    errors::{AppError, UploadError},
    repositories::MetadataStore,
    settings::UploadSettings,
    storage::{
        content_store::{extension_of, ContentStore},
        probe::{sniff_mime_type, DimensionProbe, HeaderProbe},
    },
    use_cases::{
        hash_index::{ContentHasher, HashIndex},
        quota::QuotaLedger,
    },
};

const GENERIC_MIME_TYPE: &str = "application/octet-stream";
const MAX_FILE_NAME_CHARS: usize = 255;

/// Ingests upload batches: validate, hash, dedup, quota, write, commit.
pub struct UploadPipeline<R>
where
    R: MetadataStore + ?Sized,
{
    repo: Arc<R>,
    store: ContentStore,
    probe: Arc<dyn DimensionProbe>,
    hash_index: HashIndex<R>,
    ledger: QuotaLedger<R>,
    settings: UploadSettings,
    owner_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl<R> UploadPipeline<R>
where
    R: MetadataStore + ?Sized,
{
    pub fn new(repo: Arc<R>, store: ContentStore, settings: UploadSettings) -> Self {
        UploadPipeline {
            hash_index: HashIndex::new(repo.clone()),
            ledger: QuotaLedger::new(repo.clone()),
            repo,
            store,
            probe: Arc::new(HeaderProbe),
            settings,
            owner_locks: DashMap::new(),
        }
    }

    /// Loads the uploading account. Disabled accounts may not upload.
    pub async fn owner_for(&self, requester: &Requester) -> Result<Owner, AppError> {
        let owner = self
            .repo
            .get_owner(&requester.owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !owner.is_active() {
            return Err(AppError::ForbiddenAccess);
        }
        Ok(owner)
    }

    /// Processes `items` in order. Item failures are reported, never raised.
    pub async fn upload<'a, I>(&self, requester: &Requester, items: I) -> Result<UploadReport, AppError>
    where
        I: IntoIterator<Item = UploadItem<'a>>,
    {
        let owner = self.owner_for(requester).await?;
        let mut report = UploadReport::default();
        let mut received = 0usize;

        for item in items {
            received += 1;
            let file_name = sanitize_file_name(&item.file_name);
            let outcome = self.ingest(&owner, item).await;
            report.record(&file_name, outcome);
        }

        if received == 0 {
            return Err(AppError::invalid("files", "No files uploaded"));
        }
        Ok(report.finish())
    }

    /// Runs one item through the pipeline.
    #[instrument(skip(self, owner, item), fields(owner_id = %owner.id, file = %item.file_name))]
    pub async fn ingest(&self, owner: &Owner, mut item: UploadItem<'_>) -> Result<ItemOutcome, UploadError> {
        let max = self.settings.max_size;

        if item.declared_size.is_some_and(|size| size > max) {
            return Err(UploadError::FileTooLarge { max });
        }

        let declared_mime = item
            .mime_type
            .as_deref()
            .map(normalize_mime)
            .filter(|m| !m.is_empty() && m != GENERIC_MIME_TYPE);

        if let Some(mime) = &declared_mime {
            if !self.settings.allows(mime) {
                return Err(UploadError::UnsupportedType(mime.clone()));
            }
        }

        let (data, content_hash) = self.read_content(&mut item).await?;

        let mime_type = match declared_mime {
            Some(mime) => mime,
            None => {
                let sniffed = sniff_mime_type(&data).unwrap_or(GENERIC_MIME_TYPE);
                if !self.settings.allows(sniffed) {
                    return Err(UploadError::UnsupportedType(sniffed.to_string()));
                }
                sniffed.to_string()
            }
        };

        let lock = self.owner_lock(&owner.id);
        let outcome = {
            let _guard = lock.lock().await;
            self.commit(owner, item.file_name, mime_type, data, content_hash).await
        };
        drop(lock);
        self.owner_locks
            .remove_if(&owner.id, |_, lock| Arc::strong_count(lock) == 1);

        outcome
    }

    async fn read_content(&self, item: &mut UploadItem<'_>) -> Result<(Vec<u8>, String), UploadError> {
        let max = self.settings.max_size;
        let capacity = item.declared_size.unwrap_or(0).min(max) as usize;
        let mut buffer = Vec::with_capacity(capacity);
        let mut hasher = ContentHasher::new();

        while let Some(chunk) = item.content.next().await {
            let chunk = chunk.map_err(|e| UploadError::ReadFailed(e.to_string()))?;
            if hasher.len() + chunk.len() as u64 > max {
                return Err(UploadError::FileTooLarge { max });
            }
            hasher.update(&chunk);
            buffer.extend_from_slice(&chunk);
        }

        if hasher.is_empty() {
            return Err(UploadError::EmptyFile);
        }
        Ok((buffer, hasher.finalize()))
    }

    /// Dedup, quota, write and metadata commit. Runs under the owner lock.
    async fn commit(
        &self,
        owner: &Owner,
        file_name: String,
        mime_type: String,
        data: Vec<u8>,
        content_hash: String,
    ) -> Result<ItemOutcome, UploadError> {
        if let Some(existing) = self
            .hash_index
            .find_by_hash(&content_hash, &owner.id)
            .await
            .map_err(metadata_failure)?
        {
            tracing::info!(asset_id = existing.id, hash = %content_hash, "Duplicate content, reusing asset");
            return Ok(ItemOutcome::Deduplicated(existing));
        }

        let size = data.len() as u64;
        self.ledger
            .check(owner, size)
            .await
            .map_err(metadata_failure)?
            .map_err(|exceeded| {
                tracing::info!(size, used = exceeded.used, quota = exceeded.quota, "Upload rejected by quota");
                UploadError::QuotaExceeded(exceeded)
            })?;

        let file_name = sanitize_file_name(&file_name);
        let extension = extension_of(&file_name)
            .map(str::to_string)
            .or_else(|| extension_for_mime(&mime_type));

        let blob = self
            .store
            .put(&data, extension.as_deref())
            .await
            .map_err(|e| UploadError::StorageWriteFailed(e.to_string()))?;

        let (width, height) = self.probe.dimensions(&data);

        let insert = AssetInsert {
            uuid: Uuid::new_v4(),
            user_id: owner.id,
            file_path: blob.relative_path().to_string(),
            original_name: file_name,
            file_size: size as i64,
            mime_type,
            width,
            height,
            content_hash,
            is_public: true,
            created_at: Utc::now(),
        };

        match self.repo.create_asset(&insert).await {
            Ok(asset) => {
                blob.keep();
                tracing::info!(
                    asset_id = asset.id,
                    uuid = %asset.uuid,
                    size,
                    hash = %asset.content_hash,
                    "Stored new asset"
                );
                Ok(ItemOutcome::Created(asset))
            }
            Err(e) => {
                tracing::error!("Metadata commit failed, discarding blob: {}", e);
                blob.discard().await;
                Err(metadata_failure(e))
            }
        }
    }

    fn owner_lock(&self, owner_id: &Uuid) -> Arc<Mutex<()>> {
        self.owner_locks
            .entry(*owner_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn metadata_failure(err: AppError) -> UploadError {
    UploadError::StorageWriteFailed(err.to_string())
}

/// `type/subtype` without parameters, lower-cased.
pub fn normalize_mime(raw: &str) -> String {
    let mime = raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match mime.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => mime,
    }
}

fn extension_for_mime(mime_type: &str) -> Option<String> {
    match mime_type {
        "image/jpeg" => Some("jpg".to_string()),
        other => other.strip_prefix("image/").map(str::to_string),
    }
}

/// Last path segment of a client file name, trimmed and bounded.
pub fn sanitize_file_name(raw: &str) -> String {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return "unnamed".to_string();
    }
    name.chars().take(MAX_FILE_NAME_CHARS).collect()
}
