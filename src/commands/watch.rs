use anyhow::Result;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::commands::{CommandReport, build_reconciler};
use crate::esmp::audit;
use crate::esmp::config::load_config;
use crate::esmp::paths::resolve_paths;
use crate::esmp::source::list_base_names;
use crate::esmp::watcher::watch_directory;

#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub dir: Option<PathBuf>,
    pub skip_initial: bool,
}

pub async fn run<F>(options: &WatchOptions, shutdown: F) -> Result<CommandReport>
where
    F: Future<Output = ()>,
{
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let dir = cfg.source_dir(options.dir.as_deref())?;
    let reconciler = build_reconciler(&cfg, &dir)?;

    let mut report = CommandReport::new("watch");
    report.detail(format!("source_dir={}", dir.display()));

    if options.skip_initial {
        report.detail("initial_pass=skipped");
    } else {
        let names = list_base_names(&dir, &cfg.storage.extension)?;
        info!(files = names.len(), "initial snapshot pass");
        let pass = reconciler.run_pass(&names).await;
        report.record_pass(&pass);
    }

    let settle = Duration::from_millis(cfg.sync.watch_settle_ms);
    let summary = watch_directory(reconciler, &dir, settle, shutdown).await?;
    report.detail(format!("watch_added={}", summary.added));
    report.detail(format!("watch_removed={}", summary.removed));
    report.detail(format!("watch_created={}", summary.created));
    report.detail(format!("watch_archived={}", summary.archived));
    if summary.failed > 0 {
        report.issue(format!("{} watch reconciliations failed", summary.failed));
    }
    if summary.watch_errors > 0 {
        report.issue(format!("{} watcher errors", summary.watch_errors));
    }

    let status = if report.ok { "ok" } else { "partial" };
    let message = format!(
        "added={} removed={} created={} archived={}",
        summary.added, summary.removed, summary.created, summary.archived
    );
    if let Err(err) = audit::append_event(&paths, "watch", status, &message) {
        warn!(error = %err, "failed to append audit event");
    }

    Ok(report)
}
