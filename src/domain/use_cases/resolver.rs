use std::sync::Arc;

use uuid::Uuid;

use crate::{
    entities::{
        asset::{Asset, AssetView, RandomFilter},
        owner::Requester,
    },
    errors::AppError,
    repositories::MetadataStore,
    storage::content_store::ContentStore,
};

/// Bytes of a resolved asset, ready to be written to a response.
#[derive(Debug)]
pub struct ServedFile {
    pub asset: Asset,
    pub data: Vec<u8>,
}

impl ServedFile {
    pub fn mime_type(&self) -> &str {
        &self.asset.mime_type
    }

    pub fn file_name(&self) -> &str {
        &self.asset.original_name
    }
}

/// Maps public identifiers to assets and counts every successful view.
///
/// Metadata and bytes share one visibility rule: a private asset resolves
/// only for its owner. Tombstoned and unknown identifiers are both
/// `NotFound`, and rejected lookups leave the view counter untouched.
pub struct PublicResolver<R>
where
    R: MetadataStore + ?Sized,
{
    repo: Arc<R>,
    store: ContentStore,
}

impl<R> PublicResolver<R>
where
    R: MetadataStore + ?Sized,
{
    pub fn new(repo: Arc<R>, store: ContentStore) -> Self {
        PublicResolver { repo, store }
    }

    pub async fn resolve_by_uuid(&self, uuid: &Uuid, requester: Option<&Requester>) -> Result<AssetView, AppError> {
        let asset = self.visible_asset(uuid, requester).await?;
        self.count_view(asset).await
    }

    pub async fn serve_bytes(&self, uuid: &Uuid, requester: Option<&Requester>) -> Result<ServedFile, AppError> {
        let asset = self.visible_asset(uuid, requester).await?;
        self.load(asset).await
    }

    /// Random live public asset matching `filter`.
    pub async fn random(&self, filter: &RandomFilter) -> Result<AssetView, AppError> {
        let asset = self.random_asset(filter).await?;
        self.count_view(asset).await
    }

    pub async fn random_file(&self, filter: &RandomFilter) -> Result<ServedFile, AppError> {
        let asset = self.random_asset(filter).await?;
        self.load(asset).await
    }

    async fn visible_asset(&self, uuid: &Uuid, requester: Option<&Requester>) -> Result<Asset, AppError> {
        let asset = self
            .repo
            .find_by_uuid(uuid)
            .await?
            .ok_or_else(not_found)?;

        if !can_view(&asset, requester) {
            tracing::debug!(uuid = %uuid, "Private asset requested by non-owner");
            return Err(AppError::ForbiddenAccess);
        }
        Ok(asset)
    }

    async fn random_asset(&self, filter: &RandomFilter) -> Result<Asset, AppError> {
        self.repo
            .random_public_asset(filter)
            .await?
            .ok_or_else(|| AppError::NotFound("No public images available".to_string()))
    }

    async fn count_view(&self, asset: Asset) -> Result<AssetView, AppError> {
        let view_count = self.repo.increment_view_count(asset.id).await?;
        Ok(AssetView { asset, view_count })
    }

    async fn load(&self, asset: Asset) -> Result<ServedFile, AppError> {
        let data = self.store.read(&asset.file_path).await.map_err(|e| {
            tracing::error!(asset_id = asset.id, "Failed to read stored blob: {}", e);
            AppError::from(e)
        })?;

        self.repo.increment_view_count(asset.id).await?;
        Ok(ServedFile { asset, data })
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Image not found".to_string())
}

pub fn can_view(asset: &Asset, requester: Option<&Requester>) -> bool {
    asset.is_public || requester.is_some_and(|r| asset.is_owned_by(&r.owner_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::asset::{AssetChanges, AssetInsert};
    use crate::entities::owner::Owner;
    use crate::repositories::{asset::AssetRepository, memory::MemoryRepo};
    use chrono::Utc;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        repo: Arc<MemoryRepo>,
        resolver: PublicResolver<MemoryRepo>,
        owner: Owner,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(MemoryRepo::new());
        let owner = Owner::new(Uuid::new_v4(), "alice", 0);
        repo.insert_owner(owner.clone());
        let resolver = PublicResolver::new(repo.clone(), ContentStore::new(dir.path()));
        Fixture { dir, repo, resolver, owner }
    }

    async fn stored_asset(fx: &Fixture, is_public: bool) -> Asset {
        let store = ContentStore::new(fx.dir.path());
        let path = store.put(b"pixels", Some("png")).await.unwrap().keep();

        let asset = fx
            .repo
            .create_asset(&AssetInsert {
                uuid: Uuid::new_v4(),
                user_id: fx.owner.id,
                file_path: path,
                original_name: "cat.png".into(),
                file_size: 6,
                mime_type: "image/png".into(),
                width: 0,
                height: 0,
                content_hash: Uuid::new_v4().to_string(),
                is_public: true,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        if is_public {
            return asset;
        }
        let changes = AssetChanges { description: String::new(), tags: String::new(), is_public: false };
        fx.repo.update_asset(asset.id, &changes).await.unwrap()
    }

    #[tokio::test]
    async fn tombstoned_assets_are_unreachable_even_for_the_owner() {
        let fx = fixture();
        let asset = stored_asset(&fx, true).await;
        let owner = Requester::new(fx.owner.id, "user");

        assert!(fx.resolver.resolve_by_uuid(&asset.uuid, Some(&owner)).await.is_ok());
        fx.repo.tombstone_asset(asset.id).await.unwrap();

        for requester in [None, Some(&owner)] {
            assert!(matches!(
                fx.resolver.resolve_by_uuid(&asset.uuid, requester).await,
                Err(AppError::NotFound(_))
            ));
            assert!(matches!(
                fx.resolver.serve_bytes(&asset.uuid, requester).await,
                Err(AppError::NotFound(_))
            ));
        }
        assert!(matches!(
            fx.resolver.resolve_by_uuid(&Uuid::new_v4(), None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn private_assets_resolve_only_for_their_owner() {
        let fx = fixture();
        let asset = stored_asset(&fx, false).await;
        let owner = Requester::new(fx.owner.id, "user");
        let stranger = Requester::new(Uuid::new_v4(), "admin");

        for requester in [None, Some(&stranger)] {
            assert!(matches!(
                fx.resolver.serve_bytes(&asset.uuid, requester).await,
                Err(AppError::ForbiddenAccess)
            ));
            assert!(matches!(
                fx.resolver.resolve_by_uuid(&asset.uuid, requester).await,
                Err(AppError::ForbiddenAccess)
            ));
        }
        assert_eq!(fx.repo.view_count(asset.id).await.unwrap(), 0);

        let served = fx.resolver.serve_bytes(&asset.uuid, Some(&owner)).await.unwrap();
        assert_eq!(served.data, b"pixels");
        assert_eq!(served.mime_type(), "image/png");
        assert_eq!(fx.repo.view_count(asset.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_resolutions_count_every_view() {
        let fx = fixture();
        let asset = stored_asset(&fx, true).await;
        let before = fx.repo.view_count(asset.id).await.unwrap();

        let lookups = (0..64).map(|_| fx.resolver.resolve_by_uuid(&asset.uuid, None));
        let results = futures::future::join_all(lookups).await;
        assert!(results.iter().all(Result::is_ok));

        assert_eq!(fx.repo.view_count(asset.id).await.unwrap(), before + 64);
    }

    #[tokio::test]
    async fn random_only_picks_public_assets() {
        let fx = fixture();
        assert!(matches!(
            fx.resolver.random(&RandomFilter::default()).await,
            Err(AppError::NotFound(_))
        ));

        stored_asset(&fx, false).await;
        let public = stored_asset(&fx, true).await;

        for _ in 0..10 {
            let picked = fx.resolver.random(&RandomFilter::default()).await.unwrap();
            assert_eq!(picked.asset.id, public.id);
        }

        let other_owner = RandomFilter { user_id: Some(Uuid::new_v4()), tags: None };
        assert!(fx.resolver.random(&other_owner).await.is_err());
    }
}
