//! Chunk graph transfer between stores.
//!
//! [`pull`] copies every chunk reachable from a ref in the source that the
//! sink does not already have. The walk starts at the ref and discovers
//! children by decoding each fetched chunk, so the frontier grows as chunks
//! arrive. Subtrees whose root the sink already holds are skipped.
//!
//! Chunks are written bottom-up: a chunk goes to the sink only after every
//! child it was waiting on has been written. A chunk present in the sink
//! therefore always has its whole subtree present, even after a pull that
//! failed or was cancelled halfway, which is what makes the skip safe.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use cairn_store::ChunkStore;
use cairn_types::{Chunk, Hash};
use cairn_value::{codec, Ref};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::error::{DatasError, DatasResult};
use crate::progress::{PullProgress, PullSummary};

enum Task {
    Fetch(Hash),
    Write(Chunk),
}

enum Outcome {
    Fetched {
        hash: Hash,
        chunk: Chunk,
        missing_children: Vec<Hash>,
    },
    Written {
        hash: Hash,
        bytes: u64,
    },
}

/// A fetched chunk waiting for its children to be written.
struct Pending {
    chunk: Chunk,
    waiting_on: usize,
}

/// Copy everything reachable from `source_ref` into `sink`.
///
/// At most `parallelism` fetches and writes are in flight at once. One
/// [`PullProgress`] is sent per written chunk; when the sink already holds
/// `source_ref` a single `{known: 1, done: 1}` snapshot is sent instead.
///
/// The engine never closes `progress`; the caller drops its sender when
/// this returns. If the receiving side is dropped, in-flight work is aborted
/// and [`DatasError::Cancelled`] is returned.
///
/// `sink_head` is the sink dataset's current head, if any. Everything under
/// it is already in the sink, so pulling a ref equal to it copies nothing.
///
/// Memory: a fetched chunk is held until every missing child below it has
/// been written. Pulling a long linear history into an empty sink keeps the
/// whole missing chain in memory, and `done` stays at zero until the oldest
/// missing commit is reached. Peak memory is bounded by the total size of
/// the missing chunks.
///
/// Any failed fetch or write aborts the pull. Chunks already written stay
/// in the sink; no head is moved here.
pub async fn pull(
    source: Arc<dyn ChunkStore>,
    sink: Arc<dyn ChunkStore>,
    source_ref: &Ref,
    sink_head: Option<&Ref>,
    parallelism: usize,
    progress: &mpsc::Sender<PullProgress>,
) -> DatasResult<PullSummary> {
    let root = source_ref.target();
    let parallelism = parallelism.max(1);

    if progress.is_closed() {
        return Err(DatasError::Cancelled);
    }

    if sink_head.is_some_and(|h| h.target() == root) || sink.has(&root).await? {
        debug!(%root, "sink already has source ref");
        send(
            progress,
            PullProgress {
                known: 1,
                done: 1,
                approx_written_bytes: 0,
            },
        )
        .await?;
        return Ok(PullSummary::default());
    }

    let mut puller = Puller {
        source,
        sink,
        queue: VecDeque::from([Task::Fetch(root)]),
        tasks: JoinSet::new(),
        discovered: HashSet::from([root]),
        written: HashSet::new(),
        pending: HashMap::new(),
        dependents: HashMap::new(),
        stats: PullProgress {
            known: 1,
            done: 0,
            approx_written_bytes: 0,
        },
    };

    let result = puller.run(parallelism, progress).await;
    if result.is_err() {
        puller.tasks.abort_all();
    }
    let summary = result?;

    info!(
        %root,
        chunks = summary.chunks_written,
        bytes = summary.bytes_written,
        "pull complete"
    );
    Ok(summary)
}

struct Puller {
    source: Arc<dyn ChunkStore>,
    sink: Arc<dyn ChunkStore>,
    queue: VecDeque<Task>,
    tasks: JoinSet<DatasResult<Outcome>>,
    /// Chunks scheduled for fetching.
    discovered: HashSet<Hash>,
    written: HashSet<Hash>,
    pending: HashMap<Hash, Pending>,
    /// Child -> parents waiting for it.
    dependents: HashMap<Hash, Vec<Hash>>,
    stats: PullProgress,
}

impl Puller {
    async fn run(
        &mut self,
        parallelism: usize,
        progress: &mpsc::Sender<PullProgress>,
    ) -> DatasResult<PullSummary> {
        loop {
            if progress.is_closed() {
                debug!("progress receiver dropped; cancelling pull");
                return Err(DatasError::Cancelled);
            }

            while self.tasks.len() < parallelism {
                let Some(task) = self.queue.pop_front() else {
                    break;
                };
                self.spawn(task);
            }

            let Some(joined) = self.tasks.join_next().await else {
                break;
            };
            let outcome = joined.map_err(|e| DatasError::Task(e.to_string()))??;

            match outcome {
                Outcome::Fetched {
                    hash,
                    chunk,
                    missing_children,
                } => self.on_fetched(hash, chunk, missing_children),
                Outcome::Written { hash, bytes } => {
                    self.on_written(hash, bytes);
                    send(progress, self.stats).await?;
                }
            }
        }

        if !self.pending.is_empty() {
            return Err(DatasError::Task(format!(
                "{} chunks were never written",
                self.pending.len()
            )));
        }

        Ok(PullSummary {
            chunks_written: self.stats.done,
            bytes_written: self.stats.approx_written_bytes,
        })
    }

    fn spawn(&mut self, task: Task) {
        match task {
            Task::Fetch(hash) => {
                let source = Arc::clone(&self.source);
                let sink = Arc::clone(&self.sink);
                self.tasks.spawn(fetch(source, sink, hash));
            }
            Task::Write(chunk) => {
                let sink = Arc::clone(&self.sink);
                self.tasks.spawn(write(sink, chunk));
            }
        }
    }

    fn on_fetched(&mut self, hash: Hash, chunk: Chunk, missing_children: Vec<Hash>) {
        let mut waiting_on = 0;
        for child in missing_children {
            if self.written.contains(&child) {
                continue;
            }
            waiting_on += 1;
            self.dependents.entry(child).or_default().push(hash);
            if self.discovered.insert(child) {
                self.stats.known += 1;
                self.queue.push_back(Task::Fetch(child));
            }
        }

        if waiting_on == 0 {
            self.queue.push_back(Task::Write(chunk));
        } else {
            self.pending.insert(hash, Pending { chunk, waiting_on });
        }
    }

    fn on_written(&mut self, hash: Hash, bytes: u64) {
        self.written.insert(hash);
        self.stats.done += 1;
        self.stats.approx_written_bytes += bytes;

        for parent in self.dependents.remove(&hash).unwrap_or_default() {
            let ready = match self.pending.get_mut(&parent) {
                Some(p) => {
                    p.waiting_on -= 1;
                    p.waiting_on == 0
                }
                None => false,
            };
            if ready {
                if let Some(p) = self.pending.remove(&parent) {
                    self.queue.push_back(Task::Write(p.chunk));
                }
            }
        }
    }
}

async fn send(progress: &mpsc::Sender<PullProgress>, snapshot: PullProgress) -> DatasResult<()> {
    progress
        .send(snapshot)
        .await
        .map_err(|_| DatasError::Cancelled)
}

async fn fetch(
    source: Arc<dyn ChunkStore>,
    sink: Arc<dyn ChunkStore>,
    hash: Hash,
) -> DatasResult<Outcome> {
    let chunk = source
        .get(&hash)
        .await?
        .ok_or(DatasError::MissingChunk(hash))?;
    if !chunk.verify(&hash) {
        return Err(DatasError::Corruption {
            hash,
            reason: "fetched content does not match its hash".into(),
        });
    }
    let chunk = Chunk::with_hash(hash, chunk.data().clone());

    let value = codec::decode(chunk.data())?;
    let mut children: Vec<Hash> = value.refs().iter().map(Ref::target).collect();
    children.sort();
    children.dedup();

    let present = sink.has_many(&children).await?;
    if present.len() != children.len() {
        return Err(DatasError::Task(format!(
            "sink answered {} of {} presence checks for children of {hash}",
            present.len(),
            children.len()
        )));
    }
    let missing_children = children
        .into_iter()
        .zip(present)
        .filter_map(|(h, has)| (!has).then_some(h))
        .collect();

    Ok(Outcome::Fetched {
        hash,
        chunk,
        missing_children,
    })
}

async fn write(sink: Arc<dyn ChunkStore>, chunk: Chunk) -> DatasResult<Outcome> {
    let hash = chunk.hash();
    let bytes = chunk.len() as u64;
    sink.put(chunk).await?;
    Ok(Outcome::Written { hash, bytes })
}
