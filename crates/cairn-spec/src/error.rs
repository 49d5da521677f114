use std::path::PathBuf;

use cairn_datas::DatasError;
use cairn_remote::RemoteError;
use cairn_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("invalid database spec {spec:?}: {reason}")]
    InvalidDatabase { spec: String, reason: String },

    #[error("invalid path {spec:?}: {reason}")]
    InvalidPath { spec: String, reason: String },

    #[error("no database given and no default_db configured")]
    NoDefaultDatabase,

    #[error("config error in {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Datas(#[from] DatasError),
}

pub type SpecResult<T> = Result<T, SpecError>;
