use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required and cannot be empty")]
    MissingValue(&'static str),
    #[error("source directory does not exist: {0}")]
    MissingSourceDir(String),
    #[error("config file invalid or unreadable: {0}")]
    InvalidFile(String),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store conflict (409): {0}")]
    Conflict(String),
    #[error("record store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("record store unreachable: {0}")]
    Network(String),
    #[error("record store response malformed: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to read asset {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("asset upload returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("asset upload failed: {0}")]
    Network(String),
    #[error("invalid storage URL: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl SyncError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::Store(StoreError::Conflict(_)))
    }
}
