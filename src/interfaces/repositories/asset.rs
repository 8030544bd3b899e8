use async_trait::async_trait;
use sqlx::{self, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    entities::asset::{Asset, AssetChanges, AssetInsert, AssetQuery, AssetView, RandomFilter},
    errors::AppError,
    repositories::sqlx_repo::SqlxRepo,
};

/// Helper to compute OFFSET safely from 1-based `page` and `page_size`.
pub fn page_offset(page: u32, page_size: u32) -> i64 {
    let page = page.saturating_sub(1);
    (page as i64) * (page_size as i64)
}

const VIEW_SELECT: &str = r#"
    SELECT i.*, COALESCE(s.view_count, 0)::BIGINT AS view_count
    FROM images i
    LEFT JOIN image_stats s ON s.image_id = i.id
"#;

#[async_trait]
pub trait AssetRepository: Send + Sync {
    async fn check_connection(&self) -> Result<(), AppError>;

    /// Inserts the record and adds its size to the owner's cached usage in
    /// one commit.
    async fn create_asset(&self, asset: &AssetInsert) -> Result<Asset, AppError>;

    /// Live lookups. Tombstoned records are never returned.
    async fn find_by_id(&self, id: i64) -> Result<Option<Asset>, AppError>;
    async fn find_by_uuid(&self, uuid: &Uuid) -> Result<Option<Asset>, AppError>;
    async fn find_by_hash(&self, content_hash: &str, owner_id: &Uuid) -> Result<Option<Asset>, AppError>;
    async fn find_view_by_id(&self, id: i64) -> Result<Option<AssetView>, AppError>;

    async fn list_assets(&self, query: &AssetQuery) -> Result<Vec<AssetView>, AppError>;
    async fn count_assets(&self, query: &AssetQuery) -> Result<u64, AppError>;

    async fn update_asset(&self, id: i64, changes: &AssetChanges) -> Result<Asset, AppError>;

    /// Marks the record deleted and subtracts its size from the owner's
    /// cached usage in one commit. Returns `None` if it was not live.
    async fn tombstone_asset(&self, id: i64) -> Result<Option<Asset>, AppError>;

    /// Authoritative usage: sum of live asset sizes.
    async fn sum_live_sizes(&self, owner_id: &Uuid) -> Result<u64, AppError>;

    async fn increment_view_count(&self, asset_id: i64) -> Result<i64, AppError>;
    async fn view_count(&self, asset_id: i64) -> Result<i64, AppError>;
    async fn total_views(&self, owner_id: &Uuid) -> Result<u64, AppError>;

    async fn random_public_asset(&self, filter: &RandomFilter) -> Result<Option<Asset>, AppError>;
}

/// `%needle%` with LIKE metacharacters escaped, for use with `ESCAPE '\'`.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_keyword_filter(builder: &mut QueryBuilder<'_, Postgres>, keyword: Option<&str>) {
    if let Some(keyword) = keyword.map(str::trim).filter(|k| !k.is_empty()) {
        let pattern = contains_pattern(keyword);
        builder
            .push(" AND (i.original_name ILIKE ")
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\' OR i.description ILIKE ")
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\' OR i.tags ILIKE ")
            .push_bind(pattern)
            .push(r" ESCAPE '\')");
    }
}

fn non_negative(value: i64) -> u64 {
    value.max(0) as u64
}

#[async_trait]
impl AssetRepository for SqlxRepo {
    async fn check_connection(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_asset(&self, asset: &AssetInsert) -> Result<Asset, AppError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Asset>(
            r#"
            INSERT INTO images (
                uuid, user_id, file_path, original_name, file_size, mime_type,
                width, height, content_hash, is_public, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *
            "#,
        )
        .bind(asset.uuid)
        .bind(asset.user_id)
        .bind(&asset.file_path)
        .bind(&asset.original_name)
        .bind(asset.file_size)
        .bind(&asset.mime_type)
        .bind(asset.width)
        .bind(asset.height)
        .bind(&asset.content_hash)
        .bind(asset.is_public)
        .bind(asset.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("images_uuid_key") {
                    return AppError::Conflict("Public identifier already exists".into());
                }
            }
            AppError::from(e)
        })?;

        sqlx::query(
            "UPDATE users SET used_storage = used_storage + $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(created.user_id)
        .bind(created.file_size)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Asset>, AppError> {
        let asset = sqlx::query_as::<_, Asset>(
            "SELECT * FROM images WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(asset)
    }

    async fn find_by_uuid(&self, uuid: &Uuid) -> Result<Option<Asset>, AppError> {
        let asset = sqlx::query_as::<_, Asset>(
            "SELECT * FROM images WHERE uuid = $1 AND deleted_at IS NULL",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(asset)
    }

    async fn find_by_hash(&self, content_hash: &str, owner_id: &Uuid) -> Result<Option<Asset>, AppError> {
        let asset = sqlx::query_as::<_, Asset>(
            r#"
            SELECT * FROM images
            WHERE content_hash = $1 AND user_id = $2 AND deleted_at IS NULL
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(content_hash)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(asset)
    }

    async fn find_view_by_id(&self, id: i64) -> Result<Option<AssetView>, AppError> {
        let view = sqlx::query_as::<_, AssetView>(&format!(
            "{} WHERE i.id = $1 AND i.deleted_at IS NULL",
            VIEW_SELECT
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(view)
    }

    async fn list_assets(&self, query: &AssetQuery) -> Result<Vec<AssetView>, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new(VIEW_SELECT);
        builder
            .push(" WHERE i.deleted_at IS NULL AND i.user_id = ")
            .push_bind(query.owner_id);
        push_keyword_filter(&mut builder, query.keyword.as_deref());
        builder
            .push(" ORDER BY i.created_at DESC, i.id DESC LIMIT ")
            .push_bind(query.page_size as i64)
            .push(" OFFSET ")
            .push_bind(page_offset(query.page, query.page_size));

        let views = builder
            .build_query_as::<AssetView>()
            .fetch_all(&self.pool)
            .await?;

        Ok(views)
    }

    async fn count_assets(&self, query: &AssetQuery) -> Result<u64, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM images i WHERE i.deleted_at IS NULL AND i.user_id = ",
        );
        builder.push_bind(query.owner_id);
        push_keyword_filter(&mut builder, query.keyword.as_deref());

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        Ok(non_negative(count))
    }

    async fn update_asset(&self, id: i64, changes: &AssetChanges) -> Result<Asset, AppError> {
        let asset = sqlx::query_as::<_, Asset>(
            r#"
            UPDATE images
            SET description = $2, tags = $3, is_public = $4, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.description)
        .bind(&changes.tags)
        .bind(changes.is_public)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;

        Ok(asset)
    }

    async fn tombstone_asset(&self, id: i64) -> Result<Option<Asset>, AppError> {
        let mut tx = self.pool.begin().await?;

        let tombstoned = sqlx::query_as::<_, Asset>(
            r#"
            UPDATE images
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(asset) = &tombstoned {
            sqlx::query(
                r#"
                UPDATE users
                SET used_storage = GREATEST(used_storage - $2, 0), updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(asset.user_id)
            .bind(asset.file_size)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(tombstoned)
    }

    async fn sum_live_sizes(&self, owner_id: &Uuid) -> Result<u64, AppError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(file_size), 0)::BIGINT
            FROM images
            WHERE user_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(non_negative(total))
    }

    async fn increment_view_count(&self, asset_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO image_stats (image_id, view_count, updated_at)
            VALUES ($1, 1, NOW())
            ON CONFLICT (image_id)
            DO UPDATE SET view_count = image_stats.view_count + 1, updated_at = NOW()
            RETURNING view_count
            "#,
        )
        .bind(asset_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn view_count(&self, asset_id: i64) -> Result<i64, AppError> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT view_count FROM image_stats WHERE image_id = $1",
        )
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.unwrap_or(0))
    }

    async fn total_views(&self, owner_id: &Uuid) -> Result<u64, AppError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(s.view_count), 0)::BIGINT
            FROM image_stats s
            JOIN images i ON i.id = s.image_id
            WHERE i.user_id = $1 AND i.deleted_at IS NULL
            "#,
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(non_negative(total))
    }

    async fn random_public_asset(&self, filter: &RandomFilter) -> Result<Option<Asset>, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT * FROM images WHERE deleted_at IS NULL AND is_public = TRUE",
        );

        if let Some(user_id) = filter.user_id {
            builder.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(tags) = filter.tags.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            builder
                .push(" AND tags ILIKE ")
                .push_bind(contains_pattern(tags))
                .push(r" ESCAPE '\'");
        }
        builder.push(" ORDER BY RANDOM() LIMIT 1");

        let asset = builder
            .build_query_as::<Asset>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(asset)
    }
}
