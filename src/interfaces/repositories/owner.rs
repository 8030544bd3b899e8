use async_trait::async_trait;
use uuid::Uuid;

use crate::{entities::owner::Owner, errors::AppError, repositories::sqlx_repo::SqlxRepo};

#[async_trait]
pub trait OwnerRepository: Send + Sync {
    async fn get_owner(&self, id: &Uuid) -> Result<Option<Owner>, AppError>;
    async fn create_owner(&self, owner: &Owner) -> Result<(), AppError>;

    /// Rewrites every owner's cached usage from the live asset sizes.
    /// Returns how many owners had drifted.
    async fn reconcile_used_storage(&self) -> Result<u64, AppError>;
}

#[async_trait]
impl OwnerRepository for SqlxRepo {
    async fn get_owner(&self, id: &Uuid) -> Result<Option<Owner>, AppError> {
        let owner = sqlx::query_as::<_, Owner>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(owner)
    }

    async fn create_owner(&self, owner: &Owner) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, role, status, storage_quota, used_storage, custom_domain,
                max_image_size, allowed_image_types, compress_image, enable_watermark,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(owner.id)
        .bind(&owner.username)
        .bind(&owner.role)
        .bind(&owner.status)
        .bind(owner.storage_quota)
        .bind(owner.used_storage)
        .bind(&owner.custom_domain)
        .bind(owner.max_image_size)
        .bind(&owner.allowed_image_types)
        .bind(owner.compress_image)
        .bind(owner.enable_watermark)
        .bind(owner.created_at)
        .bind(owner.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("users_username_key") {
                    return AppError::Conflict("Username already exists".into());
                }
            }
            AppError::from(e)
        })?;

        Ok(())
    }

    async fn reconcile_used_storage(&self) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users u
            SET used_storage = t.total, updated_at = NOW()
            FROM (
                SELECT o.id, COALESCE(SUM(i.file_size), 0)::BIGINT AS total
                FROM users o
                LEFT JOIN images i ON i.user_id = o.id AND i.deleted_at IS NULL
                GROUP BY o.id
            ) t
            WHERE u.id = t.id AND u.used_storage <> t.total
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
