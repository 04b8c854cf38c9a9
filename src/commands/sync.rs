use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::commands::{CommandReport, build_reconciler};
use crate::esmp::audit;
use crate::esmp::config::{EsmpConfig, load_config};
use crate::esmp::notifier;
use crate::esmp::paths::{EsmpPaths, resolve_paths};
use crate::esmp::reconcile::PassReport;
use crate::esmp::source::list_base_names;

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub dir: Option<PathBuf>,
    pub notify: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRun {
    pub report: CommandReport,
    pub pass: PassReport,
}

fn summary_line(pass: &PassReport) -> String {
    format!(
        "created={} archived={} failed={}",
        pass.created(),
        pass.archived(),
        pass.failed_items() + pass.failed_archives()
    )
}

fn publish(paths: &EsmpPaths, cfg: &EsmpConfig, run: &mut SyncRun) {
    match notifier::append_run_log(paths, &run.report.to_text()) {
        Ok(path) => run.report.detail(format!("run_log={}", path.display())),
        Err(err) => {
            warn!(error = %err, "failed to append run log");
            run.report.issue(format!("run log append failed: {err}"));
        }
    }

    let Some(bin) = cfg.notify.bin.as_deref() else {
        run.report.detail("notification=skipped (ESMP_NOTIFY_BIN unset)");
        return;
    };
    let message = summary_line(&run.pass);
    match notifier::send_notification(bin, &cfg.notify.title, &message) {
        Ok(()) => run.report.detail("notification=sent"),
        Err(err) => {
            warn!(error = %err, "notification failed");
            run.report.issue(format!("notification failed: {err}"));
        }
    }
}

pub async fn run(options: &SyncOptions) -> Result<SyncRun> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let dir = cfg.source_dir(options.dir.as_deref())?;
    let reconciler = build_reconciler(&cfg, &dir)?;

    let names = list_base_names(&dir, &cfg.storage.extension)?;
    info!(dir = %dir.display(), files = names.len(), "starting sync pass");
    let pass = reconciler.run_pass(&names).await;

    let mut report = CommandReport::new("sync");
    report.detail(format!("source_dir={}", dir.display()));
    report.record_pass(&pass);

    let status = if report.ok { "ok" } else { "partial" };
    if let Err(err) = audit::append_event(&paths, "sync", status, &summary_line(&pass)) {
        warn!(error = %err, "failed to append audit event");
    }

    let mut run = SyncRun { report, pass };
    if options.notify {
        publish(&paths, &cfg, &mut run);
    }
    Ok(run)
}
