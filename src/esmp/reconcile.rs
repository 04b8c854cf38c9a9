use crate::error::SyncError;
use crate::esmp::identity::{LocalItem, decompose_name, normalize_name, parse_name};
use crate::esmp::records::{
    AssetUploader, RecordDraft, RecordPatch, RecordStore, RemoteRecord, fetch_all, find_by_title,
};
use crate::esmp::retry::{RetryOutcome, RetryPolicy};
use crate::esmp::session::SyncSession;
use futures::future::join_all;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub source_dir: PathBuf,
    pub asset_extension: String,
    pub update_on_match: bool,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Created { title: String, record_id: String },
    AlreadySynced { title: String, record_id: String },
    Updated { title: String, record_id: String },
    Busy { title: String },
    Failed { title: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ArchiveOutcome {
    Archived {
        title: String,
        record_id: String,
    },
    NotIndexed {
        title: String,
    },
    Failed {
        title: String,
        record_id: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub local_items: usize,
    pub remote_records: usize,
    pub scan_error: Option<String>,
    pub archives: Vec<ArchiveOutcome>,
    pub items: Vec<ItemOutcome>,
}

impl PassReport {
    pub fn created(&self) -> usize {
        self.count_items(|o| matches!(o, ItemOutcome::Created { .. }))
    }

    pub fn already_synced(&self) -> usize {
        self.count_items(|o| matches!(o, ItemOutcome::AlreadySynced { .. }))
    }

    pub fn updated(&self) -> usize {
        self.count_items(|o| matches!(o, ItemOutcome::Updated { .. }))
    }

    pub fn busy(&self) -> usize {
        self.count_items(|o| matches!(o, ItemOutcome::Busy { .. }))
    }

    pub fn failed_items(&self) -> usize {
        self.count_items(|o| matches!(o, ItemOutcome::Failed { .. }))
    }

    pub fn archived(&self) -> usize {
        self.archives
            .iter()
            .filter(|o| matches!(o, ArchiveOutcome::Archived { .. }))
            .count()
    }

    pub fn failed_archives(&self) -> usize {
        self.archives
            .iter()
            .filter(|o| matches!(o, ArchiveOutcome::Failed { .. }))
            .count()
    }

    fn count_items(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|o| pred(o)).count()
    }
}

/// Remote records whose title appears in no local base name.
///
/// Matching is by containment: a record titled `Song` survives as long as any
/// local name contains `Song`.
pub fn plan_archives(local_names: &[String], remote: &[RemoteRecord]) -> Vec<RemoteRecord> {
    remote
        .iter()
        .filter(|record| !record.archived)
        .filter(|record| {
            let title = normalize_name(&record.title);
            !local_names.iter().any(|name| name.contains(title.as_str()))
        })
        .cloned()
        .collect()
}

fn needs_update(existing: &RemoteRecord, item: &LocalItem) -> bool {
    (item.derived_id.is_some() && existing.id != item.derived_id)
        || existing.status_tags != item.status_tags
}

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    uploader: Arc<dyn AssetUploader>,
    session: Arc<SyncSession>,
    options: Arc<ReconcileOptions>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        uploader: Arc<dyn AssetUploader>,
        session: Arc<SyncSession>,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            store,
            uploader,
            session,
            options: Arc::new(options),
        }
    }

    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    pub fn asset_path(&self, item: &LocalItem) -> PathBuf {
        self.options
            .source_dir
            .join(format!("{}.{}", item.raw_name, self.options.asset_extension))
    }

    pub async fn reconcile(&self, item: &LocalItem) -> ItemOutcome {
        let Some(_guard) = self.session.try_acquire(&item.title) else {
            info!(title = %item.title, "already in flight; trigger dropped");
            return ItemOutcome::Busy {
                title: item.title.clone(),
            };
        };

        debug!(
            title = %item.title,
            id = ?item.derived_id,
            tags = ?item.status_tags,
            "reconciling"
        );

        // Survives conflict retries so a create conflict never re-uploads.
        let uploaded: Mutex<Option<Option<String>>> = Mutex::new(None);
        let uploaded = &uploaded;
        let outcome = self
            .options
            .retry
            .run(
                move |attempt| self.attempt(item, attempt, uploaded),
                SyncError::is_conflict,
            )
            .await;

        match outcome {
            RetryOutcome::Success { value, .. } => value,
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                error!(
                    title = %item.title,
                    attempts,
                    error = %last_error,
                    "giving up after repeated conflicts"
                );
                ItemOutcome::Failed {
                    title: item.title.clone(),
                    reason: format!("gave up after {attempts} attempts: {last_error}"),
                }
            }
            RetryOutcome::Failed { error, .. } => {
                error!(title = %item.title, error = %error, "reconcile failed");
                ItemOutcome::Failed {
                    title: item.title.clone(),
                    reason: error.to_string(),
                }
            }
        }
    }

    async fn attempt(
        &self,
        item: &LocalItem,
        attempt: u32,
        uploaded: &Mutex<Option<Option<String>>>,
    ) -> Result<ItemOutcome, SyncError> {
        let mut matches = find_by_title(self.store.as_ref(), &item.title).await?;
        if matches.is_empty() {
            // Records created from decomposed file names keep that form.
            let decomposed = decompose_name(&item.title);
            if decomposed != item.title {
                matches = find_by_title(self.store.as_ref(), &decomposed).await?;
            }
        }

        if let Some(existing) = matches.first() {
            self.session.remember(&item.title, &existing.record_id);
            if self.options.update_on_match && needs_update(existing, item) {
                let patch = RecordPatch {
                    id: item.derived_id,
                    status_tags: Some(item.status_tags.clone()),
                };
                self.store.update(&existing.record_id, &patch).await?;
                info!(title = %item.title, record_id = %existing.record_id, "record updated");
                return Ok(ItemOutcome::Updated {
                    title: item.title.clone(),
                    record_id: existing.record_id.clone(),
                });
            }
            debug!(title = %item.title, matches = matches.len(), "already synced");
            return Ok(ItemOutcome::AlreadySynced {
                title: item.title.clone(),
                record_id: existing.record_id.clone(),
            });
        }

        let cached = uploaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let asset_url = match cached {
            Some(url) => url,
            None => {
                let path = self.asset_path(item);
                let url = self.uploader.upload(&path, &item.raw_name).await?;
                *uploaded.lock().unwrap_or_else(PoisonError::into_inner) = Some(url.clone());
                url
            }
        };
        if asset_url.is_none() {
            warn!(title = %item.title, "no asset url; creating record without link");
        }

        let draft = RecordDraft {
            title: item.title.clone(),
            id: item.derived_id,
            status_tags: item.status_tags.clone(),
            asset_url,
        };
        let record = self.store.create(&draft).await?;
        self.session.remember(&item.title, &record.record_id);
        info!(title = %item.title, record_id = %record.record_id, attempt, "record created");

        Ok(ItemOutcome::Created {
            title: item.title.clone(),
            record_id: record.record_id,
        })
    }

    pub async fn archive(&self, record_id: &str, title: &str) -> ArchiveOutcome {
        match self.store.archive(record_id).await {
            Ok(()) => {
                if self.session.record_id_for(title).as_deref() == Some(record_id) {
                    self.session.forget(title);
                }
                info!(title, record_id, "record archived");
                ArchiveOutcome::Archived {
                    title: title.to_string(),
                    record_id: record_id.to_string(),
                }
            }
            Err(err) => {
                error!(title, record_id, error = %err, "archive failed");
                ArchiveOutcome::Failed {
                    title: title.to_string(),
                    record_id: record_id.to_string(),
                    reason: err.to_string(),
                }
            }
        }
    }

    pub async fn archive_by_title(&self, title: &str) -> ArchiveOutcome {
        let Some(record_id) = self.session.record_id_for(title) else {
            warn!(title, "no indexed record for removed file; skipping");
            return ArchiveOutcome::NotIndexed {
                title: title.to_string(),
            };
        };
        self.archive(&record_id, title).await
    }

    pub async fn run_pass(&self, base_names: &[String]) -> PassReport {
        let items = base_names
            .iter()
            .map(|name| parse_name(name))
            .collect::<Vec<_>>();
        let names = items
            .iter()
            .map(|item| item.raw_name.clone())
            .collect::<Vec<_>>();

        let mut report = PassReport {
            local_items: items.len(),
            ..PassReport::default()
        };

        self.session.reset_index();
        match fetch_all(self.store.as_ref()).await {
            Ok(remote) => {
                report.remote_records = remote.len();
                for record in remote.iter().filter(|r| !r.archived) {
                    self.session.remember(&record.title, &record.record_id);
                }
                let doomed = plan_archives(&names, &remote);
                info!(
                    remote = remote.len(),
                    indexed = self.session.indexed_titles(),
                    local = items.len(),
                    archive = doomed.len(),
                    "archive sweep"
                );
                report.archives = join_all(
                    doomed
                        .iter()
                        .map(|record| self.archive(&record.record_id, &record.title)),
                )
                .await;
            }
            Err(err) => {
                error!(error = %err, "full record scan failed; skipping archive sweep");
                report.scan_error = Some(err.to_string());
            }
        }

        report.items = join_all(items.iter().map(|item| self.reconcile(item))).await;
        report
    }
}
