use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct EsmpPaths {
    pub esmp_home: PathBuf,
    pub config_file: PathBuf,
    pub logs_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

pub(crate) fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<EsmpPaths> {
    let esmp_home = match env::var("ESMP_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join(".esmp"),
    };
    let config_file = env_or_default_path("ESMP_CONFIG_PATH", esmp_home.join("esmp.toml"));
    let logs_dir = env_or_default_path("ESMP_LOGS_DIR", esmp_home.join("logs"));

    Ok(EsmpPaths {
        esmp_home,
        config_file,
        logs_dir,
    })
}
