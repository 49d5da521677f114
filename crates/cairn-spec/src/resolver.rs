use std::path::PathBuf;
use std::sync::Arc;

use cairn_datas::{Database, Dataset};
use cairn_remote::HttpChunkStore;
use cairn_store::{check_version, ChunkStore, FileChunkStore, MemoryChunkStore};
use cairn_value::Value;
use tracing::debug;

use crate::config::LoadedConfig;
use crate::error::{SpecError, SpecResult};
use crate::spec::{split_spec, DatabaseSpec, PathRoot, ValuePath};

/// Open the chunk store a [`DatabaseSpec`] names and check its format.
pub async fn open_store(spec: &DatabaseSpec) -> SpecResult<Arc<dyn ChunkStore>> {
    let store: Arc<dyn ChunkStore> = match spec {
        DatabaseSpec::Memory => Arc::new(MemoryChunkStore::new()),
        DatabaseSpec::File(path) => Arc::new(FileChunkStore::open(path)?),
        DatabaseSpec::Http(url) => Arc::new(HttpChunkStore::open(url).await?),
    };
    check_version(store.as_ref())?;
    debug!(db = %spec, "opened store");
    Ok(store)
}

/// Turns command-line spellings into stores, datasets, and values.
///
/// Aliases from `.cairnconfig` are expanded before a database spelling is
/// parsed, and an empty database part means the configured `default_db`.
#[derive(Clone, Debug, Default)]
pub struct Resolver {
    config: Option<LoadedConfig>,
}

impl Resolver {
    pub fn new(config: Option<LoadedConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> Option<&LoadedConfig> {
        self.config.as_ref()
    }

    /// Expand aliases and the default, then parse.
    pub fn resolve_database(&self, db: &str) -> SpecResult<DatabaseSpec> {
        let Some(loaded) = &self.config else {
            if db.is_empty() {
                return Err(SpecError::NoDefaultDatabase);
            }
            return DatabaseSpec::parse(db);
        };

        let name = if db.is_empty() {
            loaded
                .config
                .default_db
                .as_deref()
                .ok_or(SpecError::NoDefaultDatabase)?
        } else {
            db
        };

        let alias = loaded.config.alias(name);
        let from_config = alias.is_some() || db.is_empty();
        match DatabaseSpec::parse(alias.unwrap_or(name))? {
            DatabaseSpec::File(path) if from_config && path.is_relative() => {
                Ok(DatabaseSpec::File(loaded.base_dir().join(path)))
            }
            spec => Ok(spec),
        }
    }

    pub async fn get_chunk_store(&self, db: &str) -> SpecResult<Arc<dyn ChunkStore>> {
        open_store(&self.resolve_database(db)?).await
    }

    pub async fn get_database(&self, db: &str) -> SpecResult<Database> {
        Ok(Database::new(self.get_chunk_store(db).await?))
    }

    /// Resolve `<db>::<dataset>`.
    pub async fn get_dataset(&self, spec: &str) -> SpecResult<(Database, Dataset)> {
        let (db, rest) = split_spec(spec)?;
        let name = dataset_name(spec, rest)?;
        let database = self.get_database(db).await?;
        let dataset = database.get_dataset(&name).await?;
        Ok((database, dataset))
    }

    /// Resolve `<db>::<dataset or #hash>[.field...]` to a value.
    ///
    /// A dataset resolves to its head commit. Unknown datasets, absent
    /// hashes, and missing fields all resolve to `None`.
    pub async fn get_path(&self, spec: &str) -> SpecResult<(Database, Option<Value>)> {
        let (db, rest) = split_spec(spec)?;
        let path = ValuePath::parse(rest)?;
        let database = self.get_database(db).await?;
        let value = read_path(&database, &path).await?;
        Ok((database, value))
    }

    /// Resolve a sync source path and destination dataset.
    ///
    /// When both name the same on-disk or remote database, one store is
    /// opened and shared, since a file store can only be open once.
    /// Separate `mem` spellings stay separate databases.
    pub async fn get_sync_pair(
        &self,
        source: &str,
        destination: &str,
    ) -> SpecResult<(Database, Option<Value>, Database, Dataset)> {
        let (source_db, source_rest) = split_spec(source)?;
        let (sink_db, sink_rest) = split_spec(destination)?;
        let path = ValuePath::parse(source_rest)?;
        let name = dataset_name(destination, sink_rest)?;

        let source_spec = self.resolve_database(source_db)?;
        let sink_spec = self.resolve_database(sink_db)?;
        let source_db = Database::new(open_store(&source_spec).await?);
        let sink_db = if source_spec == sink_spec && source_spec != DatabaseSpec::Memory {
            debug!(db = %sink_spec, "sync within one database");
            Database::new(Arc::clone(source_db.store()))
        } else {
            Database::new(open_store(&sink_spec).await?)
        };

        let value = read_path(&source_db, &path).await?;
        let dataset = sink_db.get_dataset(&name).await?;
        Ok((source_db, value, sink_db, dataset))
    }
}

/// The dataset name in the part of `spec` after `::`.
fn dataset_name(spec: &str, rest: &str) -> SpecResult<String> {
    let path = ValuePath::parse(rest)?;
    let PathRoot::Dataset(name) = path.root else {
        return Err(SpecError::InvalidPath {
            spec: spec.to_string(),
            reason: "expected a dataset, got a hash".into(),
        });
    };
    if !path.fields.is_empty() {
        return Err(SpecError::InvalidPath {
            spec: spec.to_string(),
            reason: "a dataset spec cannot select fields".into(),
        });
    }
    Ok(name)
}

async fn read_path(database: &Database, path: &ValuePath) -> SpecResult<Option<Value>> {
    let root = match &path.root {
        PathRoot::Hash(hash) => database.read_value(hash).await?,
        PathRoot::Dataset(name) => {
            let ds = database.get_dataset(name).await?;
            match ds.head_hash() {
                Some(head) => database.read_value(&head).await?,
                None => None,
            }
        }
    };

    Ok(root.and_then(|mut value| {
        for field in &path.fields {
            value = value.get(field)?.clone();
        }
        Some(value)
    }))
}

/// A resolver using the nearest `.cairnconfig` at or above `start`.
pub fn discover(start: impl Into<PathBuf>) -> SpecResult<Resolver> {
    let config = crate::config::CairnConfig::find(start.into())?;
    Ok(Resolver::new(config))
}
