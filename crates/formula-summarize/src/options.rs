use crate::error::{SummarizeError, SummarizeResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default number of candidate keys evaluated per window.
pub const DEFAULT_WINDOW_SIZE: usize = 65_536;

/// How many contiguous chunks a scan splits the rows into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChunkCount {
    /// One chunk per scan worker.
    #[default]
    Available,
    Fixed(usize),
}

/// Which rows contribute candidate keys (implicit mode) and domain values (cartesian mode).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KeyDiscovery {
    /// Every row, including rows rejected by the item filter. Their groups are still evaluated,
    /// over an empty row list.
    #[default]
    AllRows,
    /// Only rows accepted by the item filter.
    QualifyingRows,
}

/// Cooperative cancellation flag, checked before each scan pass.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SummarizeOptions {
    /// Stop after this many emitted groups.
    pub max_count: Option<usize>,
    pub chunks: ChunkCount,
    /// Upper bound on candidate keys registered per scan pass in ordered and cartesian modes.
    pub window_size: usize,
    pub key_discovery: KeyDiscovery,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub cancellation: Option<CancellationToken>,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            max_count: None,
            chunks: ChunkCount::Available,
            window_size: DEFAULT_WINDOW_SIZE,
            key_discovery: KeyDiscovery::AllRows,
            cancellation: None,
        }
    }
}

// Tokens compare by identity; two option sets are equal if they would observe the same flag.
impl PartialEq for CancellationToken {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

impl Eq for CancellationToken {}

impl SummarizeOptions {
    /// Defaults, overridden by `FORMULA_SUMMARIZE_CHUNKS` and `FORMULA_SUMMARIZE_WINDOW`.
    ///
    /// Unparseable or zero values are ignored.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(chunks) = env_usize("FORMULA_SUMMARIZE_CHUNKS") {
            options.chunks = ChunkCount::Fixed(chunks);
        }
        if let Some(window) = env_usize("FORMULA_SUMMARIZE_WINDOW") {
            options.window_size = window;
        }
        options
    }

    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = Some(max_count);
        self
    }

    pub fn with_chunks(mut self, chunks: ChunkCount) -> Self {
        self.chunks = chunks;
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_key_discovery(mut self, key_discovery: KeyDiscovery) -> Self {
        self.key_discovery = key_discovery;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn validate(&self) -> SummarizeResult<()> {
        if self.chunks == ChunkCount::Fixed(0) {
            return Err(SummarizeError::InvalidOptions(
                "chunk count must be at least 1".to_string(),
            ));
        }
        if self.window_size == 0 {
            return Err(SummarizeError::InvalidOptions(
                "window size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of contiguous chunks per scan pass.
    pub(crate) fn chunk_count(&self) -> usize {
        match self.chunks {
            ChunkCount::Available => crate::parallel::worker_count(),
            ChunkCount::Fixed(n) => n,
        }
        .max(1)
    }

    /// Keys registered per window: the window size, capped by `max_count`.
    pub(crate) fn window_len(&self) -> usize {
        match self.max_count {
            Some(max) => self.window_size.min(max).max(1),
            None => self.window_size.max(1),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

fn env_usize(var: &str) -> Option<usize> {
    std::env::var(var)
        .ok()
        .and_then(|v| v.replace('_', "").trim().parse::<usize>().ok())
        .filter(|&v| v > 0)
}
