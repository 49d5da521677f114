use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use cairn_types::hash::BYTE_LEN;
use cairn_types::{Chunk, Hash, FORMAT_VERSION};
use fs4::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::ChunkStore;

const LOG_FILE: &str = "chunks.log";
const MANIFEST_FILE: &str = "MANIFEST";
const LOCK_FILE: &str = "LOCK";

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Buffered puts are written out (without fsync) past this many bytes.
const MAX_PENDING_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    version: String,
    root: Hash,
}

#[derive(Clone, Copy, Debug)]
struct Location {
    /// Offset of the payload (past header and hash).
    offset: u64,
    len: u32,
}

struct LogState {
    log: File,
    reader: File,
    /// End of the valid log.
    offset: u64,
    index: HashMap<Hash, Location>,
    pending: Vec<Chunk>,
    pending_index: HashMap<Hash, usize>,
    pending_bytes: usize,
    root: Hash,
    closed: bool,
    /// Exclusive lock on the directory, released on close.
    lock: Option<File>,
    #[cfg(test)]
    fail_next_append: bool,
}

/// Log-structured chunk store in a local directory.
///
/// On-disk layout:
/// ```text
/// <dir>/LOCK         held exclusively by the open handle
/// <dir>/chunks.log   append-only chunk records
/// <dir>/MANIFEST     JSON {"version": ..., "root": ...}
/// ```
///
/// Each log record is framed as:
/// ```text
/// [4 bytes: record length (little-endian u32), hash + payload]
/// [4 bytes: CRC32 of hash + payload (little-endian u32)]
/// [20 bytes: chunk hash]
/// [N bytes: payload]
/// ```
///
/// Only one handle may have a directory open at a time; a second
/// [`FileChunkStore::open`] fails with [`StoreError::Locked`] until the
/// first is closed or dropped. The in-memory root and log offset are
/// therefore authoritative for the directory.
///
/// Puts are buffered in memory. `update_root` and `close` write the buffer
/// out and fsync it before touching the manifest, so the root never names
/// a chunk that is not on disk. A failed write leaves the buffer intact
/// and cuts the log back to its last good end. The manifest is replaced
/// atomically by writing a temporary file and renaming it over the old one.
///
/// On open the log is scanned to rebuild the index. Records failing the CRC
/// check are skipped, and a torn record at the tail is cut off so later
/// appends follow valid data.
pub struct FileChunkStore {
    dir: PathBuf,
    state: Arc<Mutex<LogState>>,
}

impl FileChunkStore {
    /// Open (or create) a store in `dir`.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let lock = lock_dir(&dir)?;

        let manifest = match read_manifest(&dir)? {
            Some(m) => m,
            None => {
                let m = Manifest {
                    version: FORMAT_VERSION.to_string(),
                    root: Hash::empty(),
                };
                write_manifest(&dir, &m)?;
                m
            }
        };
        if manifest.version != FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: FORMAT_VERSION.to_string(),
                actual: manifest.version,
            });
        }

        let log_path = dir.join(LOG_FILE);
        let log = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&log_path)?;
        let (index, valid_end) = scan_log(&log_path)?;
        let file_len = log.metadata()?.len();
        if valid_end < file_len {
            warn!(
                valid_end,
                file_len,
                "discarding torn tail of chunk log"
            );
            log.set_len(valid_end)?;
        }
        let reader = File::open(&log_path)?;

        info!(
            dir = %dir.display(),
            chunks = index.len(),
            root = %manifest.root,
            "opened file chunk store"
        );

        Ok(Self {
            dir,
            state: Arc::new(Mutex::new(LogState {
                log,
                reader,
                offset: valid_end,
                index,
                pending: Vec::new(),
                pending_index: HashMap::new(),
                pending_bytes: 0,
                root: manifest.root,
                closed: false,
                lock: Some(lock),
                #[cfg(test)]
                fail_next_append: false,
            })),
        })
    }

    /// Directory holding the store.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Number of distinct chunks, buffered ones included.
    pub fn len(&self) -> usize {
        let state = self.state.lock().expect("lock poisoned");
        state.index.len() + state.pending.len()
    }

    /// Returns `true` if the store holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against the log on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut LogState, &Path) -> StoreResult<T> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || {
            let mut state = state.lock().expect("lock poisoned");
            f(&mut state, &dir)
        })
        .await
        .map_err(|e| StoreError::Io(io::Error::other(e.to_string())))?
    }
}

fn lock_dir(dir: &Path) -> StoreResult<File> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(dir.join(LOCK_FILE))?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(err) if err.kind() == ErrorKind::WouldBlock => {
            Err(StoreError::Locked(dir.to_path_buf()))
        }
        Err(err) => Err(err.into()),
    }
}

fn read_manifest(dir: &Path) -> StoreResult<Option<Manifest>> {
    let path = dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&path)?;
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))
}

fn write_manifest(dir: &Path, manifest: &Manifest) -> StoreResult<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, manifest)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(MANIFEST_FILE))
        .map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

/// Rebuild the index from the log. Returns the index and the end offset of
/// the last intact record.
fn scan_log(path: &Path) -> StoreResult<(HashMap<Hash, Location>, u64)> {
    let mut reader = BufReader::new(File::open(path)?);
    let file_len = reader.get_ref().metadata()?.len();
    let mut index = HashMap::new();
    let mut offset: u64 = 0;
    let mut header = [0u8; HEADER_SIZE];

    while offset + HEADER_SIZE as u64 <= file_len {
        reader.read_exact(&mut header)?;
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let end = offset + HEADER_SIZE as u64 + length as u64;

        if (length as usize) < BYTE_LEN || end > file_len {
            warn!(offset, length, file_len, "invalid chunk record length; stopping scan");
            break;
        }

        let mut body = vec![0u8; length as usize];
        reader.read_exact(&mut body)?;

        let actual_crc = crc32fast::hash(&body);
        if actual_crc != expected_crc {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; skipping chunk record"
            );
            offset = end;
            continue;
        }

        let mut hash_bytes = [0u8; BYTE_LEN];
        hash_bytes.copy_from_slice(&body[..BYTE_LEN]);
        index.insert(
            Hash::from_bytes(hash_bytes),
            Location {
                offset: offset + (HEADER_SIZE + BYTE_LEN) as u64,
                len: length - BYTE_LEN as u32,
            },
        );
        offset = end;
    }

    debug!(chunks = index.len(), offset, "chunk log scan complete");
    Ok((index, offset))
}

/// Frame one chunk as a log record.
fn encode_record(buf: &mut Vec<u8>, chunk: &Chunk) {
    let hash = chunk.hash();
    let length = (BYTE_LEN + chunk.len()) as u32;
    let mut crc = crc32fast::Hasher::new();
    crc.update(hash.as_bytes());
    crc.update(chunk.data());

    buf.extend_from_slice(&length.to_le_bytes());
    buf.extend_from_slice(&crc.finalize().to_le_bytes());
    buf.extend_from_slice(hash.as_bytes());
    buf.extend_from_slice(chunk.data());
}

impl LogState {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn contains(&self, hash: &Hash) -> bool {
        self.pending_index.contains_key(hash) || self.index.contains_key(hash)
    }

    /// Read a record, checking that it is the one `hash` names.
    fn read(&mut self, hash: &Hash) -> StoreResult<Option<Chunk>> {
        if let Some(&i) = self.pending_index.get(hash) {
            return Ok(Some(self.pending[i].clone()));
        }
        let Some(loc) = self.index.get(hash).copied() else {
            return Ok(None);
        };
        let start = loc.offset - BYTE_LEN as u64;
        let mut buf = vec![0u8; BYTE_LEN + loc.len as usize];
        self.reader.seek(SeekFrom::Start(start))?;
        self.reader.read_exact(&mut buf).map_err(|e| StoreError::Corruption {
            hash: *hash,
            reason: format!("short read at offset {start}: {e}"),
        })?;
        if buf[..BYTE_LEN] != hash.as_bytes()[..] {
            return Err(StoreError::Corruption {
                hash: *hash,
                reason: format!("record at offset {start} belongs to another chunk"),
            });
        }
        let payload = Bytes::from(buf).slice(BYTE_LEN..);
        Ok(Some(Chunk::with_hash(*hash, payload)))
    }

    fn buffer(&mut self, chunk: Chunk) -> StoreResult<()> {
        let hash = chunk.hash();
        if self.contains(&hash) {
            return Ok(());
        }
        self.pending_bytes += chunk.len();
        self.pending_index.insert(hash, self.pending.len());
        self.pending.push(chunk);
        if self.pending_bytes > MAX_PENDING_BYTES {
            self.flush_pending(false)?;
        }
        Ok(())
    }

    /// Append buffered chunks to the log, optionally fsyncing.
    ///
    /// Buffered chunks move to the index only once the whole batch is
    /// written (and synced, when asked). On failure the log is cut back to
    /// its previous end and the buffer is kept for a later attempt.
    fn flush_pending(&mut self, sync: bool) -> StoreResult<()> {
        let mut batch = Vec::with_capacity(
            self.pending_bytes + self.pending.len() * (HEADER_SIZE + BYTE_LEN),
        );
        let mut located = Vec::with_capacity(self.pending.len());
        let mut end = self.offset;
        for chunk in &self.pending {
            encode_record(&mut batch, chunk);
            located.push((
                chunk.hash(),
                Location {
                    offset: end + (HEADER_SIZE + BYTE_LEN) as u64,
                    len: chunk.len() as u32,
                },
            ));
            end += (HEADER_SIZE + BYTE_LEN + chunk.len()) as u64;
        }

        if let Err(err) = self.append(&batch, sync) {
            if let Err(cut) = self.log.set_len(self.offset) {
                warn!(offset = self.offset, %cut, "could not cut back chunk log");
            }
            return Err(err.into());
        }

        let count = located.len();
        self.index.extend(located);
        self.offset = end;
        self.pending.clear();
        self.pending_index.clear();
        self.pending_bytes = 0;
        if count > 0 {
            debug!(count, offset = self.offset, sync, "flushed chunks");
        }
        Ok(())
    }

    fn append(&mut self, batch: &[u8], sync: bool) -> io::Result<()> {
        self.log.write_all(batch)?;
        #[cfg(test)]
        {
            if std::mem::take(&mut self.fail_next_append) {
                return Err(io::Error::other("injected append failure"));
            }
        }
        if sync {
            self.log.sync_data()?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChunkStore for FileChunkStore {
    async fn get(&self, hash: &Hash) -> StoreResult<Option<Chunk>> {
        let hash = *hash;
        self.blocking(move |state, _| {
            state.ensure_open()?;
            state.read(&hash)
        })
        .await
    }

    async fn has(&self, hash: &Hash) -> StoreResult<bool> {
        let state = self.state.lock().expect("lock poisoned");
        state.ensure_open()?;
        Ok(state.contains(hash))
    }

    async fn put(&self, chunk: Chunk) -> StoreResult<()> {
        self.blocking(move |state, _| {
            state.ensure_open()?;
            state.buffer(chunk)
        })
        .await
    }

    async fn root(&self) -> StoreResult<Hash> {
        let state = self.state.lock().expect("lock poisoned");
        state.ensure_open()?;
        Ok(state.root)
    }

    async fn update_root(&self, new: Hash, expected: Hash) -> StoreResult<bool> {
        self.blocking(move |state, dir| {
            state.ensure_open()?;
            state.flush_pending(true)?;
            if state.root != expected {
                debug!(current = %state.root, %expected, "root CAS rejected");
                return Ok(false);
            }
            write_manifest(
                dir,
                &Manifest {
                    version: FORMAT_VERSION.to_string(),
                    root: new,
                },
            )?;
            state.root = new;
            debug!(%new, "root updated");
            Ok(true)
        })
        .await
    }

    fn version(&self) -> &str {
        FORMAT_VERSION
    }

    async fn close(&self) -> StoreResult<()> {
        self.blocking(|state, dir| {
            if state.closed {
                return Ok(());
            }
            state.flush_pending(true)?;
            state.closed = true;
            state.lock = None;
            debug!(dir = %dir.display(), "closed file chunk store");
            Ok(())
        })
        .await
    }
}

impl std::fmt::Debug for FileChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileChunkStore")
            .field("dir", &self.dir)
            .finish()
    }
}
