use anyhow::Result;

use crate::commands::CommandReport;
use crate::esmp::config::{EsmpConfig, load_unvalidated, problems};
use crate::esmp::paths::{EsmpPaths, resolve_paths};

fn redact(secret: &str) -> &'static str {
    if secret.trim().is_empty() {
        "<unset>"
    } else {
        "<set>"
    }
}

pub fn describe(paths: &EsmpPaths, cfg: &EsmpConfig) -> CommandReport {
    let mut report = CommandReport::new("status");

    report.detail(format!("esmp_home={}", paths.esmp_home.display()));
    report.detail(format!(
        "config_file={}{}",
        paths.config_file.display(),
        if paths.config_file.exists() {
            ""
        } else {
            " (absent)"
        }
    ));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));

    report.detail(format!("notion_token={}", redact(&cfg.notion.token)));
    report.detail(format!("notion_database_id={}", cfg.notion.database_id));
    report.detail(format!("notion_api_base={}", cfg.notion.api_base));
    report.detail(format!("notion_api_version={}", cfg.notion.api_version));
    let props = &cfg.notion.properties;
    report.detail(format!(
        "notion_properties=title:{} id:{} tags:{} link:{}",
        props.title, props.id, props.tags, props.link
    ));

    match cfg.storage.bucket.as_deref() {
        Some(bucket) => report.detail(format!("storage_bucket={bucket}")),
        None => report.detail("storage_bucket=<unset> (assets will not be uploaded)"),
    }
    report.detail(format!(
        "storage_auth_token={}",
        redact(cfg.storage.auth_token.as_deref().unwrap_or_default())
    ));
    report.detail(format!(
        "asset={}/<name>.{} ({})",
        cfg.storage.object_prefix, cfg.storage.extension, cfg.storage.content_type
    ));

    match &cfg.sync.source_dir {
        Some(dir) if dir.is_dir() => report.detail(format!("source_dir={}", dir.display())),
        Some(dir) => report.issue(format!("source directory does not exist: {}", dir.display())),
        None => report.issue("FOLDER_PATH is not set (pass --dir to sync/watch)"),
    }
    report.detail(format!("update_on_match={}", cfg.sync.update_on_match));
    report.detail(format!(
        "retry=attempts:{} base_delay_ms:{}",
        cfg.retry.max_attempts, cfg.retry.base_delay_ms
    ));
    report.detail(format!(
        "notify_bin={}",
        cfg.notify.bin.as_deref().unwrap_or("<unset>")
    ));

    for problem in problems(cfg) {
        report.issue(problem.to_string());
    }
    report
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_unvalidated(&paths)?;
    Ok(describe(&paths, &cfg))
}
