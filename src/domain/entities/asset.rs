use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::entities::option_fields::{OptionField, PatchString};

pub const MAX_DESCRIPTION_LENGTH: usize = 1000;
pub const MAX_TAGS_LENGTH: usize = 500;

/// A stored image and its metadata record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Asset {
    pub id: i64,
    pub uuid: Uuid, // Public identifier, decoupled from the storage path
    pub user_id: Uuid,
    #[serde(skip)]
    pub file_path: String, // Relative to the storage root, never exposed
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub width: i32,
    pub height: i32,
    pub content_hash: String,
    pub description: String,
    pub tags: String, // Comma separated
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>, // Tombstone
}

impl Asset {
    pub fn is_tombstoned(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_owned_by(&self, owner_id: &Uuid) -> bool {
        &self.user_id == owner_id
    }

    pub fn size_bytes(&self) -> u64 {
        self.file_size.max(0) as u64
    }

    /// Case-insensitive match against name, description and tags.
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.to_lowercase();
        [&self.original_name, &self.description, &self.tags]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.to_lowercase().contains(&tag.to_lowercase())
    }
}

/// Everything needed to create an asset row in one commit.
#[derive(Debug, Clone)]
pub struct AssetInsert {
    pub uuid: Uuid,
    pub user_id: Uuid,
    pub file_path: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub width: i32,
    pub height: i32,
    pub content_hash: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

impl AssetInsert {
    pub fn into_asset(self, id: i64) -> Asset {
        Asset {
            id,
            uuid: self.uuid,
            user_id: self.user_id,
            file_path: self.file_path,
            original_name: self.original_name,
            file_size: self.file_size,
            mime_type: self.mime_type,
            width: self.width,
            height: self.height,
            content_hash: self.content_hash,
            description: String::new(),
            tags: String::new(),
            is_public: self.is_public,
            created_at: self.created_at,
            updated_at: self.created_at,
            deleted_at: None,
        }
    }
}

/// Asset joined with its access statistics.
#[derive(Debug, Clone, Serialize, PartialEq, sqlx::FromRow)]
pub struct AssetView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub asset: Asset,
    pub view_count: i64,
}

#[derive(Debug, Serialize)]
pub struct AssetPage {
    pub images: Vec<AssetView>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Deserialize)]
pub struct ListAssetsQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub keyword: Option<String>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Normalized listing request handed to the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetQuery {
    pub owner_id: Uuid,
    pub keyword: Option<String>,
    pub page: u32,
    pub page_size: u32,
}

impl AssetQuery {
    /// Page is at least 1, page size is clamped to `1..=100` and blank
    /// keywords are dropped.
    pub fn new(owner_id: Uuid, params: &ListAssetsQuery) -> Self {
        AssetQuery {
            owner_id,
            keyword: params
                .keyword
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
            page: params.page.unwrap_or(1).max(1),
            page_size: params.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// Metadata edit. Omitted fields stay as they are.
#[derive(Debug, Clone, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AssetPatch {
    #[validate(custom(function = "validate_description"))]
    pub description: PatchString,

    #[validate(custom(function = "validate_tags"))]
    pub tags: PatchString,

    #[validate(custom(function = "validate_visibility"))]
    pub is_public: OptionField<bool>,
}

impl AssetPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_unchanged() && self.tags.is_unchanged() && self.is_public.is_unchanged()
    }
}

/// Resolved values written by an update.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetChanges {
    pub description: String,
    pub tags: String,
    pub is_public: bool,
}

/// Narrows the random public image pick.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RandomFilter {
    pub user_id: Option<Uuid>,
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BatchDeleteRequest {
    #[validate(length(min = 1, max = 500, message = "Between 1 and 500 ids required"))]
    pub image_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct BatchDeleteResponse {
    pub message: String,
    pub deleted_count: usize,
}

// ───── Validation Helpers ───────────────────────────────────────────

pub fn validate_description(value: &PatchString) -> Result<(), ValidationError> {
    if let OptionField::SetToValue(text) = value {
        if text.chars().count() > MAX_DESCRIPTION_LENGTH {
            return Err(new_validation_error("description_too_long", "Description must be at most 1000 characters"));
        }
    }
    Ok(())
}

pub fn validate_tags(value: &PatchString) -> Result<(), ValidationError> {
    if let OptionField::SetToValue(tags) = value {
        if tags.chars().count() > MAX_TAGS_LENGTH {
            return Err(new_validation_error("tags_too_long", "Tags must be at most 500 characters"));
        }
    }
    Ok(())
}

pub fn validate_visibility(value: &OptionField<bool>) -> Result<(), ValidationError> {
    if value.is_set_to_null() {
        return Err(new_validation_error("visibility_null", "is_public cannot be null"));
    }
    Ok(())
}

fn new_validation_error(code: &'static str, msg: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(msg));
    err
}

/// Normalizes a comma separated tag list: trims, drops empties and duplicates.
pub fn normalize_tags(raw: &str) -> String {
    let mut seen: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(tag)) {
            seen.push(tag.to_string());
        }
    }
    seen.join(",")
}
