use crate::esmp::paths::EsmpPaths;
use crate::esmp::util::truncate_with_ellipsis;
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

const RUN_LOG_FILE: &str = "sync_output.log";
const MAX_NOTIFICATION_CHARS: usize = 240;

pub fn append_run_log(paths: &EsmpPaths, body: &str) -> Result<PathBuf> {
    fs::create_dir_all(&paths.logs_dir)
        .with_context(|| format!("failed to create {}", paths.logs_dir.display()))?;
    let path = paths.logs_dir.join(RUN_LOG_FILE);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    write!(file, "{}\n{}\n\n", Utc::now().to_rfc3339(), body.trim_end())?;
    Ok(path)
}

pub fn send_notification(bin: &str, title: &str, message: &str) -> Result<()> {
    let message = truncate_with_ellipsis(message, MAX_NOTIFICATION_CHARS);
    let out = Command::new(bin)
        .arg(title)
        .arg(&message)
        .output()
        .with_context(|| format!("failed to run `{bin}`"))?;
    if !out.status.success() {
        anyhow::bail!(
            "notifier `{bin}` exited with {}\nstderr: {}",
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_log_blocks_are_appended() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = EsmpPaths {
            esmp_home: tmp.path().to_path_buf(),
            config_file: tmp.path().join("esmp.toml"),
            logs_dir: tmp.path().join("logs"),
        };

        append_run_log(&paths, "created=1\n").expect("first");
        let path = append_run_log(&paths, "created=0").expect("second");

        let raw = fs::read_to_string(path).expect("read");
        assert_eq!(raw.matches("created=").count(), 2);
        assert!(raw.ends_with("created=0\n\n"));
    }

    #[cfg(unix)]
    #[test]
    fn notifier_failure_is_reported() {
        assert!(send_notification("false", "title", "body").is_err());
        assert!(send_notification("true", "title", "body").is_ok());
    }
}
