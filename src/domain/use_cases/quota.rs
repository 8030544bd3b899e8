use std::sync::Arc;

use uuid::Uuid;

use crate::{
    entities::{owner::Owner, quota::QuotaStatus},
    errors::{AppError, QuotaExceeded},
    repositories::MetadataStore,
};

/// Storage budget per owner.
///
/// Usage is always recomputed from live asset records. The cached
/// `used_storage` column is only written by asset commits and by
/// [`QuotaLedger::reconcile`]; nothing here reads it for a decision.
pub struct QuotaLedger<R>
where
    R: MetadataStore + ?Sized,
{
    repo: Arc<R>,
}

impl<R> QuotaLedger<R>
where
    R: MetadataStore + ?Sized,
{
    pub fn new(repo: Arc<R>) -> Self {
        QuotaLedger { repo }
    }

    pub async fn used_storage(&self, owner_id: &Uuid) -> Result<u64, AppError> {
        self.repo.sum_live_sizes(owner_id).await
    }

    pub async fn has_capacity(&self, owner_id: &Uuid, additional: u64) -> Result<bool, AppError> {
        let owner = self.owner(owner_id).await?;
        Ok(self.check(&owner, additional).await?.is_ok())
    }

    /// Admission check for `additional` bytes against the current live usage.
    pub async fn check(&self, owner: &Owner, additional: u64) -> Result<Result<(), QuotaExceeded>, AppError> {
        if owner.has_unlimited_quota() {
            return Ok(Ok(()));
        }

        let used = self.used_storage(&owner.id).await?;
        Ok(admit(used, owner.quota_bytes(), additional))
    }

    pub async fn status(&self, owner_id: &Uuid) -> Result<QuotaStatus, AppError> {
        let owner = self.owner(owner_id).await?;
        let used = self.used_storage(owner_id).await?;
        Ok(QuotaStatus::new(used, owner.quota_bytes()))
    }

    /// Rewrites drifted `used_storage` caches. Returns the number repaired.
    pub async fn reconcile(&self) -> Result<u64, AppError> {
        self.repo.reconcile_used_storage().await
    }

    async fn owner(&self, owner_id: &Uuid) -> Result<Owner, AppError> {
        self.repo
            .get_owner(owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

/// `used + additional <= quota`, reporting the numbers on rejection.
pub fn admit(used: u64, quota: u64, additional: u64) -> Result<(), QuotaExceeded> {
    if quota == 0 || used.saturating_add(additional) <= quota {
        return Ok(());
    }

    Err(QuotaExceeded {
        used,
        quota,
        remaining: quota.saturating_sub(used),
        attempted: additional,
    })
}
