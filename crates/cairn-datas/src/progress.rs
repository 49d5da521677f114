/// A progress snapshot emitted by [`pull`](crate::pull::pull).
///
/// `known` grows as the walk discovers chunks missing from the sink, so
/// `done / known` is an estimate that converges as the pull proceeds.
/// A single snapshot with `known == 1` and nothing written means the sink
/// already had everything.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PullProgress {
    pub known: u64,
    pub done: u64,
    pub approx_written_bytes: u64,
}

impl PullProgress {
    /// Estimated completion in percent.
    pub fn percent(&self) -> f64 {
        if self.known == 0 {
            return 0.0;
        }
        100.0 * self.done as f64 / self.known as f64
    }

    /// The "nothing to copy" signal.
    pub fn is_degenerate(&self) -> bool {
        self.known == 1 && self.done == 1 && self.approx_written_bytes == 0
    }
}

/// Totals for a finished pull.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PullSummary {
    pub chunks_written: u64,
    pub bytes_written: u64,
}
