//! Spellings for databases, datasets, and paths.
//!
//! ```text
//! mem                       in-memory database
//! file:/var/db  | /var/db   local file database
//! http://host:8000          served database
//!
//! <db>::<dataset>           a dataset
//! <db>::#<hash>             a value by hash
//! <db>::<dataset>.value     a field of the head commit
//! ```
//!
//! An empty `<db>` (as in `::main`) stands for the configured default.

use std::fmt;
use std::path::PathBuf;

use cairn_datas::validate_dataset_name;
use cairn_types::Hash;

use crate::error::{SpecError, SpecResult};

const SEPARATOR: &str = "::";

/// Where a database lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatabaseSpec {
    Memory,
    File(PathBuf),
    Http(String),
}

impl DatabaseSpec {
    pub fn parse(s: &str) -> SpecResult<Self> {
        if s.is_empty() {
            return Err(SpecError::InvalidDatabase {
                spec: s.to_string(),
                reason: "database spec must not be empty".into(),
            });
        }
        if s == "mem" {
            return Ok(Self::Memory);
        }
        if s.starts_with("http://") || s.starts_with("https://") {
            return Ok(Self::Http(s.to_string()));
        }
        if let Some(path) = s.strip_prefix("file:") {
            if path.is_empty() {
                return Err(SpecError::InvalidDatabase {
                    spec: s.to_string(),
                    reason: "file: needs a path".into(),
                });
            }
            return Ok(Self::File(PathBuf::from(path)));
        }
        if s.contains("://") {
            return Err(SpecError::InvalidDatabase {
                spec: s.to_string(),
                reason: "unsupported scheme".into(),
            });
        }
        Ok(Self::File(PathBuf::from(s)))
    }
}

impl fmt::Display for DatabaseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "mem"),
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Http(url) => write!(f, "{url}"),
        }
    }
}

/// Split `<db>::<rest>` into its parts. The db part may be empty.
pub fn split_spec(s: &str) -> SpecResult<(&str, &str)> {
    s.rsplit_once(SEPARATOR).ok_or_else(|| SpecError::InvalidPath {
        spec: s.to_string(),
        reason: format!("expected <database>{SEPARATOR}<dataset or #hash>"),
    })
}

/// What a path starts from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathRoot {
    /// The head commit of a dataset.
    Dataset(String),
    /// A value by hash.
    Hash(Hash),
}

/// The part of a path after `::`: a root and field steps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValuePath {
    pub root: PathRoot,
    pub fields: Vec<String>,
}

impl ValuePath {
    pub fn parse(s: &str) -> SpecResult<Self> {
        let invalid = |reason: String| SpecError::InvalidPath {
            spec: s.to_string(),
            reason,
        };

        let (root, rest) = if let Some(after) = s.strip_prefix('#') {
            let (hash, rest) = after.split_once('.').map_or((after, ""), |(h, r)| (h, r));
            let hash = Hash::parse(hash).map_err(|e| invalid(e.to_string()))?;
            (PathRoot::Hash(hash), rest)
        } else {
            let (name, rest) = s.split_once('.').map_or((s, ""), |(n, r)| (n, r));
            validate_dataset_name(name).map_err(|e| invalid(e.to_string()))?;
            (PathRoot::Dataset(name.to_string()), rest)
        };

        let fields = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('.').map(str::to_string).collect::<Vec<_>>()
        };
        if fields.iter().any(String::is_empty) {
            return Err(invalid("empty field name".into()));
        }
        Ok(Self { root, fields })
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            PathRoot::Dataset(name) => write!(f, "{name}")?,
            PathRoot::Hash(hash) => write!(f, "#{hash}")?,
        }
        for field in &self.fields {
            write!(f, ".{field}")?;
        }
        Ok(())
    }
}
