use crate::error::ConfigError;
use crate::esmp::paths::EsmpPaths;
use crate::esmp::retry::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com/v1";
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
pub const DEFAULT_STORAGE_API_BASE: &str = "https://firebasestorage.googleapis.com/v0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyNames {
    pub title: String,
    pub id: String,
    pub tags: String,
    pub link: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            title: "Song".to_string(),
            id: "ID".to_string(),
            tags: "Properties".to_string(),
            link: "Link".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    #[serde(skip_serializing)]
    pub token: String,
    pub database_id: String,
    pub api_base: String,
    pub api_version: String,
    pub properties: PropertyNames,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            database_id: String::new(),
            api_base: DEFAULT_NOTION_API_BASE.to_string(),
            api_version: DEFAULT_NOTION_VERSION.to_string(),
            properties: PropertyNames::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: Option<String>,
    pub api_base: String,
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    pub object_prefix: String,
    pub extension: String,
    pub content_type: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            api_base: DEFAULT_STORAGE_API_BASE.to_string(),
            auth_token: None,
            object_prefix: "files".to_string(),
            extension: "mp3".to_string(),
            content_type: "audio/mpeg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub source_dir: Option<PathBuf>,
    pub update_on_match: bool,
    pub watch_settle_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            source_dir: None,
            update_on_match: false,
            watch_settle_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::linear(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub bin: Option<String>,
    pub title: String,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            bin: None,
            title: "ESMP Sync".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EsmpConfig {
    pub notion: NotionConfig,
    pub storage: StorageConfig,
    pub sync: SyncSettings,
    pub retry: RetrySettings,
    pub notify: NotifySettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialEsmpConfig {
    notion: Option<NotionConfig>,
    storage: Option<StorageConfig>,
    sync: Option<SyncSettings>,
    retry: Option<RetrySettings>,
    notify: Option<NotifySettings>,
}

fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    env_non_empty(var).unwrap_or_else(|| fallback.to_string())
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u32(var: &str, fallback: u32) -> u32 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u32>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn merge_file_config(base: &mut EsmpConfig, path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)
        .map_err(|err| ConfigError::InvalidFile(format!("{}: {err}", path.display())))?;
    let parsed: PartialEsmpConfig = toml::from_str(&raw)
        .map_err(|err| ConfigError::InvalidFile(format!("{}: {err}", path.display())))?;
    if let Some(notion) = parsed.notion {
        base.notion = notion;
    }
    if let Some(storage) = parsed.storage {
        base.storage = storage;
    }
    if let Some(sync) = parsed.sync {
        base.sync = sync;
    }
    if let Some(retry) = parsed.retry {
        base.retry = retry;
    }
    if let Some(notify) = parsed.notify {
        base.notify = notify;
    }
    Ok(())
}

fn apply_env(cfg: &mut EsmpConfig) {
    cfg.notion.token = env_or_string("NOTION_TOKEN", &cfg.notion.token);
    cfg.notion.database_id = env_or_string("NOTION_DATABASE_ID", &cfg.notion.database_id);
    cfg.notion.api_base = env_or_string("ESMP_NOTION_API_BASE", &cfg.notion.api_base);
    cfg.notion.api_version = env_or_string("ESMP_NOTION_VERSION", &cfg.notion.api_version);

    if let Some(bucket) = env_non_empty("FIREBASE_STORAGE_BUCKET") {
        cfg.storage.bucket = Some(bucket);
    }
    if let Some(token) = env_non_empty("FIREBASE_AUTH_TOKEN") {
        cfg.storage.auth_token = Some(token);
    }
    cfg.storage.api_base = env_or_string("ESMP_STORAGE_API_BASE", &cfg.storage.api_base);
    cfg.storage.extension = env_or_string("ESMP_ASSET_EXTENSION", &cfg.storage.extension);
    cfg.storage.content_type =
        env_or_string("ESMP_ASSET_CONTENT_TYPE", &cfg.storage.content_type);

    if let Some(dir) = env_non_empty("FOLDER_PATH") {
        cfg.sync.source_dir = Some(PathBuf::from(dir));
    }
    cfg.sync.update_on_match = env_or_bool("ESMP_UPDATE_ON_MATCH", cfg.sync.update_on_match);
    cfg.sync.watch_settle_ms = env_or_u64("ESMP_WATCH_SETTLE_MS", cfg.sync.watch_settle_ms);

    cfg.retry.max_attempts = env_or_u32("ESMP_RETRY_MAX_ATTEMPTS", cfg.retry.max_attempts);
    cfg.retry.base_delay_ms = env_or_u64("ESMP_RETRY_BASE_DELAY_MS", cfg.retry.base_delay_ms);

    if let Some(bin) = env_non_empty("ESMP_NOTIFY_BIN") {
        cfg.notify.bin = Some(bin);
    }
}

pub fn problems(cfg: &EsmpConfig) -> Vec<ConfigError> {
    let mut out = Vec::new();
    if cfg.notion.token.trim().is_empty() {
        out.push(ConfigError::MissingValue("NOTION_TOKEN"));
    }
    if cfg.notion.database_id.trim().is_empty() {
        out.push(ConfigError::MissingValue("NOTION_DATABASE_ID"));
    }
    if cfg.retry.max_attempts == 0 {
        out.push(ConfigError::InvalidValue(
            "retry max attempts must be >= 1".to_string(),
        ));
    }
    if cfg.storage.extension.trim().is_empty() {
        out.push(ConfigError::InvalidValue(
            "asset extension cannot be empty".to_string(),
        ));
    }
    out
}

pub fn validate(cfg: &EsmpConfig) -> Result<(), ConfigError> {
    match problems(cfg).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

pub fn load_unvalidated(paths: &EsmpPaths) -> Result<EsmpConfig, ConfigError> {
    let mut cfg = EsmpConfig::default();
    merge_file_config(&mut cfg, &paths.config_file)?;
    apply_env(&mut cfg);
    Ok(cfg)
}

pub fn load_config(paths: &EsmpPaths) -> Result<EsmpConfig, ConfigError> {
    let cfg = load_unvalidated(paths)?;
    validate(&cfg)?;
    Ok(cfg)
}

impl EsmpConfig {
    pub fn source_dir(&self, cli_override: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let dir = cli_override
            .map(Path::to_path_buf)
            .or_else(|| self.sync.source_dir.clone())
            .ok_or(ConfigError::MissingValue("FOLDER_PATH"))?;
        if !dir.is_dir() {
            return Err(ConfigError::MissingSourceDir(dir.display().to_string()));
        }
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> EsmpConfig {
        let mut cfg = EsmpConfig::default();
        cfg.notion.token = "secret".to_string();
        cfg.notion.database_id = "db".to_string();
        cfg
    }

    #[test]
    fn missing_credentials_are_reported() {
        let errs = problems(&EsmpConfig::default());
        let text = errs.iter().map(|e| e.to_string()).collect::<Vec<_>>();
        assert!(text.iter().any(|t| t.contains("NOTION_TOKEN")));
        assert!(text.iter().any(|t| t.contains("NOTION_DATABASE_ID")));
        assert!(validate(&valid()).is_ok());
    }

    #[test]
    fn zero_retry_attempts_rejected() {
        let mut cfg = valid();
        cfg.retry.max_attempts = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn file_sections_override_defaults() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("esmp.toml");
        fs::write(
            &path,
            r#"
[notion]
database_id = "from-file"

[notion.properties]
title = "Track"

[retry]
max_attempts = 3
"#,
        )
        .expect("write config");

        let mut cfg = EsmpConfig::default();
        merge_file_config(&mut cfg, &path).expect("merge");
        assert_eq!(cfg.notion.database_id, "from-file");
        assert_eq!(cfg.notion.properties.title, "Track");
        assert_eq!(cfg.notion.properties.link, "Link");
        assert_eq!(cfg.notion.api_version, DEFAULT_NOTION_VERSION);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.base_delay_ms, DEFAULT_BASE_DELAY_MS);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("esmp.toml");
        fs::write(&path, "[retry\nmax_attempts = ").expect("write config");
        let mut cfg = EsmpConfig::default();
        assert!(matches!(
            merge_file_config(&mut cfg, &path),
            Err(ConfigError::InvalidFile(_))
        ));
    }

    #[test]
    fn source_dir_must_exist() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cfg = valid();
        assert!(matches!(
            cfg.source_dir(None),
            Err(ConfigError::MissingValue("FOLDER_PATH"))
        ));
        assert_eq!(
            cfg.source_dir(Some(tmp.path())).expect("dir"),
            tmp.path().to_path_buf()
        );
        assert!(matches!(
            cfg.source_dir(Some(&tmp.path().join("nope"))),
            Err(ConfigError::MissingSourceDir(_))
        ));
    }
}
