use crate::esmp::identity::parse_name;
use crate::esmp::reconcile::{ArchiveOutcome, ItemOutcome, Reconciler};
use crate::esmp::source::tracked_name;
use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Added(PathBuf),
    Removed(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct WatchSummary {
    pub added: usize,
    pub removed: usize,
    pub created: usize,
    pub archived: usize,
    pub failed: usize,
    pub watch_errors: usize,
}

fn added_or_removed(path: &Path) -> FileChange {
    if path.exists() {
        FileChange::Added(path.to_path_buf())
    } else {
        FileChange::Removed(path.to_path_buf())
    }
}

pub fn classify(event: &Event) -> Vec<FileChange> {
    let paths = &event.paths;
    match &event.kind {
        EventKind::Create(_) => paths.iter().cloned().map(FileChange::Added).collect(),
        EventKind::Remove(_) => paths.iter().cloned().map(FileChange::Removed).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.iter().cloned().map(FileChange::Removed).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.iter().cloned().map(FileChange::Added).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() == 2 => vec![
            FileChange::Removed(paths[0].clone()),
            FileChange::Added(paths[1].clone()),
        ],
        // FSEvents reports renames without a direction.
        EventKind::Modify(ModifyKind::Name(_)) => {
            paths.iter().map(|p| added_or_removed(p)).collect()
        }
        _ => Vec::new(),
    }
}

enum TaskResult {
    Item(ItemOutcome),
    Archive(ArchiveOutcome),
}

fn dispatch(
    reconciler: &Reconciler,
    change: FileChange,
    settle: Duration,
    tasks: &mut JoinSet<TaskResult>,
    summary: &mut WatchSummary,
) {
    match change {
        FileChange::Added(path) => {
            if path.is_dir() {
                return;
            }
            let Some(name) = tracked_name(&path, &reconciler.options().asset_extension) else {
                return;
            };
            summary.added += 1;
            info!(file = %path.display(), "file added");
            let reconciler = reconciler.clone();
            tasks.spawn(async move {
                // Let the writer finish before the asset is read.
                tokio::time::sleep(settle).await;
                let item = parse_name(&name);
                if !path.exists() {
                    debug!(file = %path.display(), "file vanished before upload");
                    return TaskResult::Item(ItemOutcome::Failed {
                        title: item.title,
                        reason: "file removed before upload".to_string(),
                    });
                }
                TaskResult::Item(reconciler.reconcile(&item).await)
            });
        }
        FileChange::Removed(path) => {
            let Some(name) = tracked_name(&path, &reconciler.options().asset_extension) else {
                return;
            };
            summary.removed += 1;
            info!(file = %path.display(), "file removed");
            let reconciler = reconciler.clone();
            tasks.spawn(async move {
                let item = parse_name(&name);
                TaskResult::Archive(reconciler.archive_by_title(&item.title).await)
            });
        }
    }
}

fn tally(summary: &mut WatchSummary, result: TaskResult) {
    match result {
        TaskResult::Item(ItemOutcome::Created { .. }) => summary.created += 1,
        TaskResult::Item(ItemOutcome::Failed { .. }) => summary.failed += 1,
        TaskResult::Archive(ArchiveOutcome::Archived { .. }) => summary.archived += 1,
        TaskResult::Archive(ArchiveOutcome::Failed { .. }) => summary.failed += 1,
        TaskResult::Item(_) | TaskResult::Archive(_) => {}
    }
}

pub async fn watch_directory<F>(
    reconciler: Reconciler,
    dir: &Path,
    settle: Duration,
    shutdown: F,
) -> Result<WatchSummary>
where
    F: Future<Output = ()>,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })
    .context("failed to create filesystem watcher")?;
    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", dir.display()))?;
    info!(dir = %dir.display(), "watching for changes");

    let mut summary = WatchSummary::default();
    let mut tasks = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
            received = rx.recv() => match received {
                Some(Ok(event)) => {
                    for change in classify(&event) {
                        dispatch(&reconciler, change, settle, &mut tasks, &mut summary);
                    }
                }
                Some(Err(err)) => {
                    summary.watch_errors += 1;
                    warn!(error = %err, "watch error");
                }
                None => break,
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => match joined {
                Ok(result) => tally(&mut summary, result),
                Err(err) => error!(error = %err, "watch task aborted"),
            },
        }
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => tally(&mut summary, result),
            Err(err) => error!(error = %err, "watch task aborted"),
        }
    }

    Ok(summary)
}
