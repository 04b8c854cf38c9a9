pub mod parse;
pub mod status;
pub mod sync;
pub mod watch;

use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::esmp::config::EsmpConfig;
use crate::esmp::reconcile::{PassReport, ReconcileOptions, Reconciler};
use crate::esmp::records::AssetUploader;
use crate::esmp::session::SyncSession;
use crate::notion::{NotionClient, NotionStore};
use crate::storage::{DisabledUploader, FirebaseUploader};

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn merge(&mut self, mut other: CommandReport) {
        self.ok &= other.ok;
        self.details.append(&mut other.details);
        self.issues.append(&mut other.issues);
    }

    pub fn to_text(&self) -> String {
        let mut out = format!("command={}\nok={}\n", self.command, self.ok);
        for detail in &self.details {
            out.push_str(detail);
            out.push('\n');
        }
        for issue in &self.issues {
            out.push_str(&format!("issue={issue}\n"));
        }
        out
    }

    pub fn record_pass(&mut self, pass: &PassReport) {
        use crate::esmp::reconcile::{ArchiveOutcome, ItemOutcome};

        self.detail(format!("local_items={}", pass.local_items));
        self.detail(format!("remote_records={}", pass.remote_records));
        self.detail(format!("created={}", pass.created()));
        self.detail(format!("already_synced={}", pass.already_synced()));
        if pass.updated() > 0 {
            self.detail(format!("updated={}", pass.updated()));
        }
        if pass.busy() > 0 {
            self.detail(format!("busy={}", pass.busy()));
        }
        self.detail(format!("archived={}", pass.archived()));

        if let Some(err) = &pass.scan_error {
            self.issue(format!("full scan failed, archive sweep skipped: {err}"));
        }
        for outcome in &pass.archives {
            if let ArchiveOutcome::Failed {
                title,
                record_id,
                reason,
            } = outcome
            {
                self.issue(format!("archive failed for {title} ({record_id}): {reason}"));
            }
        }
        for outcome in &pass.items {
            if let ItemOutcome::Failed { title, reason } = outcome {
                self.issue(format!("sync failed for {title}: {reason}"));
            }
        }
    }
}

pub fn build_reconciler(cfg: &EsmpConfig, source_dir: &Path) -> Result<Reconciler> {
    let client = NotionClient::new(
        &cfg.notion.api_base,
        &cfg.notion.token,
        &cfg.notion.api_version,
    )?;
    let store = NotionStore::new(
        client,
        &cfg.notion.database_id,
        cfg.notion.properties.clone(),
    );
    let uploader: Arc<dyn AssetUploader> = match cfg.storage.bucket.as_deref() {
        Some(bucket) if !bucket.trim().is_empty() => {
            Arc::new(FirebaseUploader::new(bucket, &cfg.storage))
        }
        _ => Arc::new(DisabledUploader),
    };

    let options = ReconcileOptions {
        source_dir: source_dir.to_path_buf(),
        asset_extension: cfg.storage.extension.trim_start_matches('.').to_string(),
        update_on_match: cfg.sync.update_on_match,
        retry: cfg.retry.policy(),
    };

    Ok(Reconciler::new(
        Arc::new(store),
        uploader,
        Arc::new(SyncSession::new()),
        options,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esmp::reconcile::{ArchiveOutcome, ItemOutcome};

    #[test]
    fn merge_keeps_worst_status() {
        let mut a = CommandReport::new("sync");
        a.detail("created=1");
        let mut b = CommandReport::new("notify");
        b.issue("notifier failed");
        a.merge(b);
        assert!(!a.ok);
        assert_eq!(a.details, vec!["created=1".to_string()]);
        assert_eq!(a.issues.len(), 1);
    }

    #[test]
    fn pass_failures_become_issues() {
        let pass = PassReport {
            local_items: 2,
            remote_records: 1,
            scan_error: None,
            archives: vec![ArchiveOutcome::Failed {
                title: "Old".into(),
                record_id: "r1".into(),
                reason: "record store returned 500: boom".into(),
            }],
            items: vec![
                ItemOutcome::Created {
                    title: "A".into(),
                    record_id: "r2".into(),
                },
                ItemOutcome::Failed {
                    title: "B".into(),
                    reason: "asset upload failed: reset".into(),
                },
            ],
        };

        let mut report = CommandReport::new("sync");
        report.record_pass(&pass);
        assert!(report.details.contains(&"created=1".to_string()));
        assert!(report.details.contains(&"archived=0".to_string()));
        assert_eq!(report.issues.len(), 2);
        assert!(!report.ok);
    }
}
