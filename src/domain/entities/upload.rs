use std::fmt;

use actix_web::web::Bytes;
use futures::stream::{self, LocalBoxStream, StreamExt};
use serde::Serialize;

use crate::entities::asset::Asset;
use crate::errors::{QuotaExceeded, UploadError};

pub type ByteStream<'a> = LocalBoxStream<'a, Result<Bytes, std::io::Error>>;

/// One file of an upload batch.
pub struct UploadItem<'a> {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub declared_size: Option<u64>,
    pub content: ByteStream<'a>,
}

impl UploadItem<'static> {
    /// Item backed by an in-memory buffer; the declared size is its length.
    pub fn from_bytes(file_name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        UploadItem {
            file_name: file_name.into(),
            mime_type: Some(mime_type.into()),
            declared_size: Some(data.len() as u64),
            content: stream::once(async move { Ok(data) }).boxed_local(),
        }
    }
}

impl<'a> UploadItem<'a> {
    pub fn from_stream(
        file_name: impl Into<String>,
        mime_type: Option<String>,
        declared_size: Option<u64>,
        content: ByteStream<'a>,
    ) -> Self {
        UploadItem {
            file_name: file_name.into(),
            mime_type,
            declared_size,
            content,
        }
    }
}

impl fmt::Debug for UploadItem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadItem")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("declared_size", &self.declared_size)
            .finish_non_exhaustive()
    }
}

/// Outcome of one item that did not produce an asset.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ItemFailure {
    pub file_name: String,
    pub kind: &'static str,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<QuotaExceeded>,
}

impl ItemFailure {
    pub fn new(file_name: impl Into<String>, error: &UploadError) -> Self {
        ItemFailure {
            file_name: file_name.into(),
            kind: error.kind(),
            reason: error.to_string(),
            quota: match error {
                UploadError::QuotaExceeded(q) => Some(q.clone()),
                _ => None,
            },
        }
    }
}

/// Result of a single item that was accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Created(Asset),
    Deduplicated(Asset),
}

#[derive(Debug, Default, Serialize)]
pub struct UploadReport {
    pub message: String,
    pub created: Vec<Asset>,
    pub deduped: Vec<Asset>,
    pub errors: Vec<ItemFailure>,
}

impl UploadReport {
    pub fn record(&mut self, file_name: &str, outcome: Result<ItemOutcome, UploadError>) {
        match outcome {
            Ok(ItemOutcome::Created(asset)) => self.created.push(asset),
            Ok(ItemOutcome::Deduplicated(asset)) => self.deduped.push(asset),
            Err(e) => self.errors.push(ItemFailure::new(file_name, &e)),
        }
    }

    pub fn success_count(&self) -> usize {
        self.created.len() + self.deduped.len()
    }

    pub fn finish(mut self) -> Self {
        self.message = format!("Successfully uploaded {} file(s)", self.success_count());
        self
    }
}
