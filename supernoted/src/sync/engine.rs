use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use supernote_core::{EntryKind, ListingError};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::convert::{ConversionError, Converter};
use super::paths::{PathError, prepare_local_target};
use super::queue::{QueueError, SyncQueue, WorkItem};
use super::reader::DirectoryReader;
use super::transfer::{DownloadError, Downloader};

pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 5;

/// Failure while processing a single queued entry. Never fails the run.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("listing error: {0}")]
    Listing(#[from] ListingError),
    #[error("path error: {0}")]
    Path(#[from] PathError),
    #[error("download error: {0}")]
    Download(#[from] DownloadError),
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("download gate is closed")]
    GateClosed,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("root listing failed: {0}")]
    RootListing(#[from] ListingError),
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("sync worker panicked")]
    WorkerPanicked,
    #[error("sync worker stopped before the tree was drained")]
    WorkerExited,
}

impl EngineError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, EngineError::RootListing(err) if err.is_connectivity())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of workers pulling from the queue.
    pub workers: usize,
    /// Capacity of the gate bounding simultaneous downloads.
    pub download_concurrency: usize,
}

impl EngineConfig {
    pub fn new(workers: usize, download_concurrency: usize) -> Self {
        Self {
            workers: workers.max(1),
            download_concurrency: download_concurrency.max(1),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS, DEFAULT_DOWNLOAD_CONCURRENCY)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub listings: usize,
    pub downloads: usize,
    pub conversions: usize,
    pub failures: usize,
}

#[derive(Default)]
struct RunCounters {
    listings: AtomicUsize,
    downloads: AtomicUsize,
    conversions: AtomicUsize,
    failures: AtomicUsize,
}

impl RunCounters {
    fn snapshot(&self) -> RunStats {
        RunStats {
            listings: self.listings.load(Ordering::SeqCst),
            downloads: self.downloads.load(Ordering::SeqCst),
            conversions: self.conversions.load(Ordering::SeqCst),
            failures: self.failures.load(Ordering::SeqCst),
        }
    }
}

/// Mirrors a remote tree into `output_dir`.
///
/// Holds only read-only collaborator handles; the queue and the download gate
/// are created per [`SyncEngine::run`] and dropped when it returns.
pub struct SyncEngine {
    reader: Arc<dyn DirectoryReader>,
    downloader: Arc<dyn Downloader>,
    converter: Option<Arc<dyn Converter>>,
    output_dir: PathBuf,
    config: EngineConfig,
}

impl SyncEngine {
    pub fn new(
        reader: Arc<dyn DirectoryReader>,
        downloader: Arc<dyn Downloader>,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            reader,
            downloader,
            converter: None,
            output_dir,
            config: EngineConfig::default(),
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = EngineConfig::new(config.workers, config.download_concurrency);
        self
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Runs one full traversal of the tree rooted at `root_url` and returns
    /// once every discovered entry has been processed.
    pub async fn run(&self, root_url: &str) -> Result<RunStats, EngineError> {
        let run = Arc::new(RunState {
            queue: SyncQueue::new(),
            gate: Semaphore::new(self.config.download_concurrency),
            stats: RunCounters::default(),
            root_url: root_url.trim_end_matches('/').to_string(),
            reader: Arc::clone(&self.reader),
            downloader: Arc::clone(&self.downloader),
            converter: self.converter.clone(),
            output_dir: self.output_dir.clone(),
        });

        let entries = self.reader.read_directory(root_url).await?;
        run.stats.listings.fetch_add(1, Ordering::SeqCst);
        debug!(root = root_url, entries = entries.len(), "seeding sync queue");
        for entry in entries {
            run.queue.enqueue(WorkItem::new(&run.root_url, entry))?;
        }

        let mut workers = JoinSet::new();
        for id in 0..self.config.workers {
            let run = Arc::clone(&run);
            workers.spawn(async move { run.work(id).await });
        }

        let stopped = tokio::select! {
            biased;
            () = run.queue.join() => None,
            joined = workers.join_next() => Some(joined),
        };
        if let Some(joined) = stopped {
            workers.shutdown().await;
            return Err(match joined {
                Some(Err(err)) if err.is_panic() => EngineError::WorkerPanicked,
                _ => EngineError::WorkerExited,
            });
        }

        // Outstanding count is zero, so every worker is parked on an empty queue.
        workers.shutdown().await;
        let stats = run.stats.snapshot();
        debug!(
            listings = stats.listings,
            downloads = stats.downloads,
            conversions = stats.conversions,
            failures = stats.failures,
            "sync run drained"
        );
        Ok(stats)
    }
}

struct RunState {
    queue: SyncQueue,
    gate: Semaphore,
    stats: RunCounters,
    root_url: String,
    reader: Arc<dyn DirectoryReader>,
    downloader: Arc<dyn Downloader>,
    converter: Option<Arc<dyn Converter>>,
    output_dir: PathBuf,
}

impl RunState {
    async fn work(&self, worker: usize) {
        while let Some(item) = self.queue.dequeue().await {
            let uri = item.entry.uri.clone();
            if let Err(err) = self.process(item).await {
                self.stats.failures.fetch_add(1, Ordering::SeqCst);
                warn!(worker, uri = %uri, error = %err, "failed to sync entry");
            }
            if let Err(err) = self.queue.task_done() {
                warn!(worker, uri = %uri, error = %err, "queue bookkeeping out of step");
            }
        }
    }

    async fn process(&self, item: WorkItem) -> Result<(), ItemError> {
        match item.entry.kind() {
            EntryKind::Directory => self.expand(item).await,
            EntryKind::File => self.fetch(item).await,
        }
    }

    async fn expand(&self, item: WorkItem) -> Result<(), ItemError> {
        let children = self.reader.read_directory(&item.url).await?;
        self.stats.listings.fetch_add(1, Ordering::SeqCst);
        debug!(uri = %item.entry.uri, children = children.len(), "expanded directory");
        for child in children {
            self.queue.enqueue(WorkItem::new(&self.root_url, child))?;
        }
        Ok(())
    }

    async fn fetch(&self, item: WorkItem) -> Result<(), ItemError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| ItemError::GateClosed)?;
        let target = prepare_local_target(&self.output_dir, &item.entry.uri).await?;
        self.downloader
            .download(&item.url, &target.file_path)
            .await?;
        self.stats.downloads.fetch_add(1, Ordering::SeqCst);
        info!(
            name = %item.entry.name,
            path = %target.file_path.display(),
            "downloaded"
        );

        if let Some(converter) = &self.converter
            && converter.accepts(&target.file_path)
        {
            let derived = converter.convert(&target.file_path).await?;
            self.stats.conversions.fetch_add(1, Ordering::SeqCst);
            info!(name = %item.entry.name, path = %derived.display(), "converted");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
