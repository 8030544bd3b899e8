//! In-process metadata store.
//!
//! Backs the test suite and local runs with `APP_DATABASE_URL=memory`. All
//! multi-record writes happen under one lock so the cached usage moves in
//! the same step as the records it summarizes.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::{
    entities::{
        asset::{Asset, AssetChanges, AssetInsert, AssetQuery, AssetView, RandomFilter},
        owner::Owner,
    },
    errors::AppError,
    repositories::{asset::AssetRepository, owner::OwnerRepository},
};

#[derive(Default)]
struct MemoryState {
    assets: BTreeMap<i64, Asset>,
    owners: HashMap<Uuid, Owner>,
}

#[derive(Default)]
pub struct MemoryRepo {
    state: RwLock<MemoryState>,
    next_id: AtomicI64,
    views: DashMap<i64, i64>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an owner record.
    pub fn insert_owner(&self, owner: Owner) {
        self.state.write().owners.insert(owner.id, owner);
    }

    /// Overwrites the cached usage without touching any asset, simulating drift.
    pub fn force_used_storage(&self, owner_id: &Uuid, used: i64) {
        if let Some(owner) = self.state.write().owners.get_mut(owner_id) {
            owner.used_storage = used;
        }
    }

    /// Every record for the owner, tombstoned ones included.
    pub fn all_assets_for(&self, owner_id: &Uuid) -> Vec<Asset> {
        self.state
            .read()
            .assets
            .values()
            .filter(|a| a.is_owned_by(owner_id))
            .cloned()
            .collect()
    }

    fn live_matching(&self, owner_id: &Uuid, keyword: Option<&str>) -> Vec<Asset> {
        let keyword = keyword.map(str::trim).filter(|k| !k.is_empty());
        let state = self.state.read();

        let mut assets: Vec<Asset> = state
            .assets
            .values()
            .filter(|a| !a.is_tombstoned() && a.is_owned_by(owner_id))
            .filter(|a| keyword.map_or(true, |k| a.matches_keyword(k)))
            .cloned()
            .collect();

        assets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        assets
    }

    fn views_of(&self, asset_id: i64) -> i64 {
        self.views.get(&asset_id).map(|v| *v).unwrap_or(0)
    }

    fn with_views(&self, asset: Asset) -> AssetView {
        let view_count = self.views_of(asset.id);
        AssetView { asset, view_count }
    }

    fn pick_random(candidates: &[Asset]) -> Option<Asset> {
        candidates.choose(&mut rand::thread_rng()).cloned()
    }
}

#[async_trait]
impl AssetRepository for MemoryRepo {
    async fn check_connection(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_asset(&self, insert: &AssetInsert) -> Result<Asset, AppError> {
        let mut state = self.state.write();

        if state.assets.values().any(|a| a.uuid == insert.uuid) {
            return Err(AppError::Conflict("Public identifier already exists".into()));
        }
        let owner = state
            .owners
            .get_mut(&insert.user_id)
            .ok_or_else(|| AppError::Conflict("Foreign key violation".into()))?;
        owner.used_storage += insert.file_size;
        owner.updated_at = Utc::now();

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let asset = insert.clone().into_asset(id);
        state.assets.insert(id, asset.clone());

        Ok(asset)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Asset>, AppError> {
        Ok(self
            .state
            .read()
            .assets
            .get(&id)
            .filter(|a| !a.is_tombstoned())
            .cloned())
    }

    async fn find_by_uuid(&self, uuid: &Uuid) -> Result<Option<Asset>, AppError> {
        Ok(self
            .state
            .read()
            .assets
            .values()
            .find(|a| &a.uuid == uuid && !a.is_tombstoned())
            .cloned())
    }

    async fn find_by_hash(&self, content_hash: &str, owner_id: &Uuid) -> Result<Option<Asset>, AppError> {
        Ok(self
            .state
            .read()
            .assets
            .values()
            .find(|a| a.content_hash == content_hash && a.is_owned_by(owner_id) && !a.is_tombstoned())
            .cloned())
    }

    async fn find_view_by_id(&self, id: i64) -> Result<Option<AssetView>, AppError> {
        let asset = self.find_by_id(id).await?;
        Ok(asset.map(|a| self.with_views(a)))
    }

    async fn list_assets(&self, query: &AssetQuery) -> Result<Vec<AssetView>, AppError> {
        let skip = query.page.saturating_sub(1) as usize * query.page_size as usize;

        Ok(self
            .live_matching(&query.owner_id, query.keyword.as_deref())
            .into_iter()
            .skip(skip)
            .take(query.page_size as usize)
            .map(|a| self.with_views(a))
            .collect())
    }

    async fn count_assets(&self, query: &AssetQuery) -> Result<u64, AppError> {
        Ok(self.live_matching(&query.owner_id, query.keyword.as_deref()).len() as u64)
    }

    async fn update_asset(&self, id: i64, changes: &AssetChanges) -> Result<Asset, AppError> {
        let mut state = self.state.write();
        let asset = state
            .assets
            .get_mut(&id)
            .filter(|a| !a.is_tombstoned())
            .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;

        asset.description = changes.description.clone();
        asset.tags = changes.tags.clone();
        asset.is_public = changes.is_public;
        asset.updated_at = Utc::now();

        Ok(asset.clone())
    }

    async fn tombstone_asset(&self, id: i64) -> Result<Option<Asset>, AppError> {
        let mut state = self.state.write();
        let now = Utc::now();

        let tombstoned = match state.assets.get_mut(&id) {
            Some(asset) if !asset.is_tombstoned() => {
                asset.deleted_at = Some(now);
                asset.updated_at = now;
                asset.clone()
            }
            _ => return Ok(None),
        };

        if let Some(owner) = state.owners.get_mut(&tombstoned.user_id) {
            owner.used_storage = (owner.used_storage - tombstoned.file_size).max(0);
            owner.updated_at = now;
        }

        Ok(Some(tombstoned))
    }

    async fn sum_live_sizes(&self, owner_id: &Uuid) -> Result<u64, AppError> {
        Ok(self
            .state
            .read()
            .assets
            .values()
            .filter(|a| a.is_owned_by(owner_id) && !a.is_tombstoned())
            .map(Asset::size_bytes)
            .sum())
    }

    async fn increment_view_count(&self, asset_id: i64) -> Result<i64, AppError> {
        let mut entry = self.views.entry(asset_id).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }

    async fn view_count(&self, asset_id: i64) -> Result<i64, AppError> {
        Ok(self.views_of(asset_id))
    }

    async fn total_views(&self, owner_id: &Uuid) -> Result<u64, AppError> {
        let ids: Vec<i64> = self
            .state
            .read()
            .assets
            .values()
            .filter(|a| a.is_owned_by(owner_id) && !a.is_tombstoned())
            .map(|a| a.id)
            .collect();

        Ok(ids.into_iter().map(|id| self.views_of(id).max(0) as u64).sum())
    }

    async fn random_public_asset(&self, filter: &RandomFilter) -> Result<Option<Asset>, AppError> {
        let tags = filter.tags.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let candidates: Vec<Asset> = self
            .state
            .read()
            .assets
            .values()
            .filter(|a| a.is_public && !a.is_tombstoned())
            .filter(|a| filter.user_id.map_or(true, |id| a.is_owned_by(&id)))
            .filter(|a| tags.map_or(true, |t| a.has_tag(t)))
            .cloned()
            .collect();

        Ok(Self::pick_random(&candidates))
    }
}

#[async_trait]
impl OwnerRepository for MemoryRepo {
    async fn get_owner(&self, id: &Uuid) -> Result<Option<Owner>, AppError> {
        Ok(self.state.read().owners.get(id).cloned())
    }

    async fn create_owner(&self, owner: &Owner) -> Result<(), AppError> {
        let mut state = self.state.write();
        if state.owners.values().any(|o| o.username == owner.username) {
            return Err(AppError::Conflict("Username already exists".into()));
        }
        state.owners.insert(owner.id, owner.clone());
        Ok(())
    }

    async fn reconcile_used_storage(&self) -> Result<u64, AppError> {
        let mut state = self.state.write();

        let mut totals: HashMap<Uuid, i64> = HashMap::new();
        for asset in state.assets.values().filter(|a| !a.is_tombstoned()) {
            *totals.entry(asset.user_id).or_default() += asset.file_size;
        }

        let mut drifted = 0;
        for owner in state.owners.values_mut() {
            let actual = totals.get(&owner.id).copied().unwrap_or(0);
            if owner.used_storage != actual {
                owner.used_storage = actual;
                owner.updated_at = Utc::now();
                drifted += 1;
            }
        }

        Ok(drifted)
    }
}
