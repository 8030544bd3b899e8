use std::sync::Arc;

use validator::Validate;

use crate::{
    entities::{
        asset::{
            normalize_tags, Asset, AssetChanges, AssetPage, AssetPatch, AssetQuery, AssetView,
            BatchDeleteRequest, BatchDeleteResponse, ListAssetsQuery,
        },
        links::LinksResponse,
        owner::{Owner, Requester},
        quota::{QuotaStatus, UsageStats},
    },
    errors::AppError,
    repositories::MetadataStore,
    storage::content_store::ContentStore,
    use_cases::{
        links::{link_base, LinkFormatter},
        quota::QuotaLedger,
    },
};

/// Owner-facing management of stored assets.
pub struct AssetHandler<R>
where
    R: MetadataStore + ?Sized,
{
    repo: Arc<R>,
    store: ContentStore,
    ledger: QuotaLedger<R>,
}

impl<R> AssetHandler<R>
where
    R: MetadataStore + ?Sized,
{
    pub fn new(repo: Arc<R>, store: ContentStore) -> Self {
        AssetHandler {
            ledger: QuotaLedger::new(repo.clone()),
            repo,
            store,
        }
    }

    /// Paged listing of the requester's live assets, newest first.
    pub async fn list(&self, requester: &Requester, params: &ListAssetsQuery) -> Result<AssetPage, AppError> {
        let query = AssetQuery::new(requester.owner_id, params);
        let images = self.repo.list_assets(&query).await?;
        let total = self.repo.count_assets(&query).await?;

        Ok(AssetPage {
            images,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }

    /// Detail view for the owner or an admin.
    pub async fn get(&self, id: i64, requester: &Requester) -> Result<AssetView, AppError> {
        let view = self.repo.find_view_by_id(id).await?.ok_or_else(not_found)?;
        ensure_manageable(&view.asset, requester)?;
        Ok(view)
    }

    /// Applies a metadata patch. Only the owner may edit.
    pub async fn update(&self, id: i64, requester: &Requester, patch: AssetPatch) -> Result<Asset, AppError> {
        patch.validate()?;

        let asset = self.owned_asset(id, requester).await?;
        if patch.is_empty() {
            return Ok(asset);
        }

        let changes = AssetChanges {
            description: patch
                .description
                .map_value(|d| strip_html(&d))
                .apply(asset.description.clone(), String::new()),
            tags: patch
                .tags
                .map_value(|t| normalize_tags(&t))
                .apply(asset.tags.clone(), String::new()),
            is_public: patch.is_public.apply(asset.is_public, asset.is_public),
        };

        let updated = self.repo.update_asset(id, &changes).await?;
        tracing::info!(asset_id = id, is_public = updated.is_public, "Updated asset metadata");
        Ok(updated)
    }

    /// Tombstones the record, then removes the blob best effort.
    pub async fn delete(&self, id: i64, requester: &Requester) -> Result<Asset, AppError> {
        let asset = self.repo.find_by_id(id).await?.ok_or_else(not_found)?;
        ensure_manageable(&asset, requester)?;

        let tombstoned = self.repo.tombstone_asset(id).await?.ok_or_else(not_found)?;
        self.remove_blob(&tombstoned).await;

        tracing::info!(asset_id = id, uuid = %tombstoned.uuid, "Deleted asset");
        Ok(tombstoned)
    }

    /// Deletes every listed asset the requester may manage. Unknown and
    /// foreign ids are skipped.
    pub async fn batch_delete(
        &self,
        requester: &Requester,
        request: BatchDeleteRequest,
    ) -> Result<BatchDeleteResponse, AppError> {
        request.validate()?;

        let mut deleted_count = 0;
        for id in request.image_ids {
            match self.delete(id, requester).await {
                Ok(_) => deleted_count += 1,
                Err(AppError::NotFound(_)) | Err(AppError::ForbiddenAccess) => {
                    tracing::debug!(asset_id = id, "Skipped asset in batch delete");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(BatchDeleteResponse {
            message: format!("Successfully deleted {} image(s)", deleted_count),
            deleted_count,
        })
    }

    pub async fn quota(&self, requester: &Requester) -> Result<QuotaStatus, AppError> {
        self.ledger.status(&requester.owner_id).await
    }

    pub async fn stats(&self, requester: &Requester) -> Result<UsageStats, AppError> {
        let owner_id = &requester.owner_id;
        let quota = self.ledger.status(owner_id).await?;
        let query = AssetQuery::new(*owner_id, &ListAssetsQuery { page: None, page_size: None, keyword: None });
        let image_count = self.repo.count_assets(&query).await?;
        let total_views = self.repo.total_views(owner_id).await?;

        Ok(UsageStats::new(image_count, total_views, &quota))
    }

    /// Embed links for an asset, on the owner's custom domain when set.
    pub async fn links(
        &self,
        id: i64,
        requester: &Requester,
        request_base: &str,
    ) -> Result<LinksResponse<AssetView>, AppError> {
        let view = self.get(id, requester).await?;
        let owner = self.owner(&view.asset.user_id).await?;
        let base = link_base(owner.as_ref().and_then(Owner::link_domain), request_base);
        let links = LinkFormatter::format(&view.asset, &base)?;

        Ok(LinksResponse { image: view, links })
    }

    pub async fn owner(&self, owner_id: &uuid::Uuid) -> Result<Option<Owner>, AppError> {
        self.repo.get_owner(owner_id).await
    }

    async fn owned_asset(&self, id: i64, requester: &Requester) -> Result<Asset, AppError> {
        let asset = self.repo.find_by_id(id).await?.ok_or_else(not_found)?;
        if !asset.is_owned_by(&requester.owner_id) {
            return Err(AppError::ForbiddenAccess);
        }
        Ok(asset)
    }

    async fn remove_blob(&self, asset: &Asset) {
        if let Err(e) = self.store.remove(&asset.file_path).await {
            tracing::warn!(asset_id = asset.id, "Failed to remove blob of deleted asset: {}", e);
        }
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Image not found".to_string())
}

fn ensure_manageable(asset: &Asset, requester: &Requester) -> Result<(), AppError> {
    if asset.is_owned_by(&requester.owner_id) || requester.is_admin() {
        Ok(())
    } else {
        Err(AppError::ForbiddenAccess)
    }
}

/// Plain text of a user-supplied description.
fn strip_html(input: &str) -> String {
    ammonia::Builder::empty().clean(input).to_string().trim().to_string()
}
