use crate::error::{StoreError, UploadError};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteRecord {
    pub record_id: String,
    pub title: String,
    pub id: Option<u64>,
    pub status_tags: BTreeSet<String>,
    pub asset_url: Option<String>,
    pub archived: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordQuery {
    All,
    TitleEquals(String),
}

#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    pub results: Vec<RemoteRecord>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDraft {
    pub title: String,
    pub id: Option<u64>,
    pub status_tags: BTreeSet<String>,
    pub asset_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub id: Option<u64>,
    pub status_tags: Option<BTreeSet<String>>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn query(
        &self,
        query: &RecordQuery,
        cursor: Option<&str>,
    ) -> Result<RecordPage, StoreError>;

    async fn create(&self, draft: &RecordDraft) -> Result<RemoteRecord, StoreError>;

    async fn update(&self, record_id: &str, patch: &RecordPatch) -> Result<(), StoreError>;

    /// Soft delete.
    async fn archive(&self, record_id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload(&self, local_path: &Path, asset_name: &str)
    -> Result<Option<String>, UploadError>;
}

async fn collect_pages(
    store: &dyn RecordStore,
    query: &RecordQuery,
) -> Result<Vec<RemoteRecord>, StoreError> {
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = store.query(query, cursor.as_deref()).await?;
        pages += 1;
        records.extend(page.results);
        match (page.has_more, page.next_cursor) {
            (true, Some(next)) => cursor = Some(next),
            _ => break,
        }
    }

    debug!(pages, records = records.len(), "record scan complete");
    Ok(records)
}

pub async fn fetch_all(store: &dyn RecordStore) -> Result<Vec<RemoteRecord>, StoreError> {
    collect_pages(store, &RecordQuery::All).await
}

pub async fn find_by_title(
    store: &dyn RecordStore,
    title: &str,
) -> Result<Vec<RemoteRecord>, StoreError> {
    collect_pages(store, &RecordQuery::TitleEquals(title.to_string())).await
}
