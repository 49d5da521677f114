//! `.cairnconfig`: database aliases and the default database.
//!
//! ```toml
//! default_db = "local"
//!
//! [db.local]
//! url = "./data"
//!
//! [db.origin]
//! url = "http://db.example.com:8000"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SpecError, SpecResult};

pub const CONFIG_FILE_NAME: &str = ".cairnconfig";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CairnConfig {
    /// Database used when a spec leaves the database part empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_db: Option<String>,
    #[serde(default)]
    pub db: BTreeMap<String, DbEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbEntry {
    pub url: String,
}

/// A parsed config together with the file it came from.
#[derive(Clone, Debug)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub config: CairnConfig,
}

impl LoadedConfig {
    /// Directory that relative file paths in the config are resolved against.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

impl CairnConfig {
    pub fn from_toml(path: &Path, text: &str) -> SpecResult<Self> {
        toml::from_str(text).map_err(|e| SpecError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn load(path: impl AsRef<Path>) -> SpecResult<LoadedConfig> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(path, &text)?;
        Ok(LoadedConfig {
            path: path.to_path_buf(),
            config,
        })
    }

    /// Look for `.cairnconfig` in `start` and each of its ancestors.
    pub fn find(start: impl AsRef<Path>) -> SpecResult<Option<LoadedConfig>> {
        for dir in start.as_ref().ancestors() {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                debug!(path = %candidate.display(), "found config");
                return Self::load(candidate).map(Some);
            }
        }
        Ok(None)
    }

    /// The url behind an alias, if `name` is one.
    pub fn alias(&self, name: &str) -> Option<&str> {
        self.db.get(name).map(|entry| entry.url.as_str())
    }
}
