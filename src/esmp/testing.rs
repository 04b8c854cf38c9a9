use crate::error::{StoreError, UploadError};
use crate::esmp::records::{
    AssetUploader, RecordDraft, RecordPage, RecordPatch, RecordQuery, RecordStore, RemoteRecord,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub(crate) fn record(id: &str, title: &str) -> RemoteRecord {
    RemoteRecord {
        record_id: id.to_string(),
        title: title.to_string(),
        id: None,
        status_tags: BTreeSet::new(),
        asset_url: None,
        archived: false,
    }
}

#[derive(Default)]
pub(crate) struct StoreState {
    pub(crate) records: BTreeMap<String, RemoteRecord>,
    pub(crate) next_id: usize,
    pub(crate) queries: usize,
    pub(crate) creates: Vec<RecordDraft>,
    pub(crate) updates: Vec<(String, RecordPatch)>,
    pub(crate) archived: Vec<String>,
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    pub(crate) state: Mutex<StoreState>,
    pub(crate) conflict_every_query: bool,
    pub(crate) fail_archive_for: Option<String>,
    pub(crate) hold_create: Option<Arc<Notify>>,
    pub(crate) page_size: usize,
}

impl MemoryStore {
    pub(crate) fn with_records(records: &[RemoteRecord]) -> Self {
        let store = MemoryStore {
            page_size: 2,
            ..MemoryStore::default()
        };
        {
            let mut state = store.state.lock().unwrap();
            for r in records {
                state.records.insert(r.record_id.clone(), r.clone());
            }
        }
        store
    }

    pub(crate) fn creates(&self) -> Vec<RecordDraft> {
        self.state.lock().unwrap().creates.clone()
    }

    pub(crate) fn archived(&self) -> Vec<String> {
        self.state.lock().unwrap().archived.clone()
    }

    pub(crate) fn queries(&self) -> usize {
        self.state.lock().unwrap().queries
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn query(
        &self,
        query: &RecordQuery,
        cursor: Option<&str>,
    ) -> Result<RecordPage, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.queries += 1;
        if self.conflict_every_query {
            return Err(StoreError::Conflict("conflict".into()));
        }
        let matching = state
            .records
            .values()
            .filter(|r| !r.archived)
            .filter(|r| match query {
                RecordQuery::All => true,
                RecordQuery::TitleEquals(title) => &r.title == title,
            })
            .cloned()
            .collect::<Vec<_>>();
        let start = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        let size = self.page_size.max(1);
        let end = (start + size).min(matching.len());
        let has_more = end < matching.len();
        Ok(RecordPage {
            results: matching[start..end].to_vec(),
            has_more,
            next_cursor: has_more.then(|| end.to_string()),
        })
    }

    async fn create(&self, draft: &RecordDraft) -> Result<RemoteRecord, StoreError> {
        if let Some(gate) = &self.hold_create {
            gate.notified().await;
        }
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let created = RemoteRecord {
            record_id: format!("new-{}", state.next_id),
            title: draft.title.clone(),
            id: draft.id,
            status_tags: draft.status_tags.clone(),
            asset_url: draft.asset_url.clone(),
            archived: false,
        };
        state.creates.push(draft.clone());
        state
            .records
            .insert(created.record_id.clone(), created.clone());
        Ok(created)
    }

    async fn update(&self, record_id: &str, patch: &RecordPatch) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state
            .updates
            .push((record_id.to_string(), patch.clone()));
        Ok(())
    }

    async fn archive(&self, record_id: &str) -> Result<(), StoreError> {
        if self.fail_archive_for.as_deref() == Some(record_id) {
            return Err(StoreError::Status {
                status: 500,
                body: "boom".into(),
            });
        }
        let mut state = self.state.lock().unwrap();
        if let Some(r) = state.records.get_mut(record_id) {
            r.archived = true;
        }
        state.archived.push(record_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingUploader {
    pub(crate) calls: Mutex<Vec<(PathBuf, String)>>,
    pub(crate) fail: bool,
}

#[async_trait]
impl AssetUploader for RecordingUploader {
    async fn upload(
        &self,
        local_path: &Path,
        asset_name: &str,
    ) -> Result<Option<String>, UploadError> {
        self.calls
            .lock()
            .unwrap()
            .push((local_path.to_path_buf(), asset_name.to_string()));
        if self.fail {
            return Err(UploadError::Network("connection reset".into()));
        }
        Ok(Some(format!("https://assets.test/{asset_name}")))
    }
}
