use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ROLE_ADMIN: &str = "admin";
pub const STATUS_ACTIVE: &str = "active";

/// Quota owner. Accounts are provisioned by the identity service; this crate
/// only reads them and maintains the cached `used_storage` column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Owner {
    pub id: Uuid,
    pub username: String,
    pub role: String,
    pub status: String,
    pub storage_quota: i64, // Bytes, 0 = unlimited
    pub used_storage: i64,  // Cache only, see QuotaLedger
    pub custom_domain: Option<String>,
    pub max_image_size: i64,
    pub allowed_image_types: String,
    pub compress_image: bool,
    pub enable_watermark: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owner {
    /// Owner with the defaults the accounts table applies to new rows.
    pub fn new(id: Uuid, username: impl Into<String>, storage_quota: i64) -> Self {
        let now = Utc::now();
        Owner {
            id,
            username: username.into(),
            role: "user".to_string(),
            status: STATUS_ACTIVE.to_string(),
            storage_quota,
            used_storage: 0,
            custom_domain: None,
            max_image_size: 10 * 1024 * 1024,
            allowed_image_types: "jpg,jpeg,png,gif,webp".to_string(),
            compress_image: false,
            enable_watermark: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    pub fn quota_bytes(&self) -> u64 {
        self.storage_quota.max(0) as u64
    }

    pub fn has_unlimited_quota(&self) -> bool {
        self.storage_quota <= 0
    }

    /// Custom domain without trailing slash, if configured.
    pub fn link_domain(&self) -> Option<&str> {
        self.custom_domain
            .as_deref()
            .map(|d| d.trim().trim_end_matches('/'))
            .filter(|d| !d.is_empty())
    }
}

/// Authenticated caller as seen by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub owner_id: Uuid,
    pub role: String,
}

impl Requester {
    pub fn new(owner_id: Uuid, role: impl Into<String>) -> Self {
        Requester { owner_id, role: role.into() }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}
