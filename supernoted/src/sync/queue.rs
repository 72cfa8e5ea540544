use supernote_core::RemoteEntry;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc, watch};

/// A remote entry together with the absolute URL it is fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub entry: RemoteEntry,
    pub url: String,
}

impl WorkItem {
    /// `root_url` must already be stripped of any trailing `/`.
    pub fn new(root_url: &str, entry: RemoteEntry) -> Self {
        let url = format!("{root_url}{}", entry.uri);
        Self { entry, url }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("task_done called with no outstanding items")]
    NothingPending,
    #[error("work queue is closed")]
    Closed,
}

/// Unbounded work queue that tracks how many items were enqueued but not yet
/// marked done.
///
/// Completion is decided by the outstanding count, never by emptiness: a
/// worker expanding a directory has already dequeued it but enqueues its
/// children before calling [`SyncQueue::task_done`], so the count cannot reach
/// zero while any item is still being processed.
pub struct SyncQueue {
    sender: mpsc::UnboundedSender<WorkItem>,
    receiver: Mutex<mpsc::UnboundedReceiver<WorkItem>>,
    outstanding: watch::Sender<usize>,
}

impl SyncQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (outstanding, _) = watch::channel(0);
        Self {
            sender,
            receiver: Mutex::new(receiver),
            outstanding,
        }
    }

    pub fn enqueue(&self, item: WorkItem) -> Result<(), QueueError> {
        // Count first so a fast consumer can never mark it done before it is counted.
        self.outstanding.send_modify(|count| *count += 1);
        if self.sender.send(item).is_err() {
            self.outstanding
                .send_modify(|count| *count = count.saturating_sub(1));
            return Err(QueueError::Closed);
        }
        Ok(())
    }

    /// Waits for the next item. Suspends while the queue is empty.
    pub async fn dequeue(&self) -> Option<WorkItem> {
        self.receiver.lock().await.recv().await
    }

    pub fn task_done(&self) -> Result<(), QueueError> {
        let mut underflow = false;
        self.outstanding.send_if_modified(|count| {
            if *count == 0 {
                underflow = true;
                false
            } else {
                *count -= 1;
                true
            }
        });
        if underflow {
            return Err(QueueError::NothingPending);
        }
        Ok(())
    }

    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Resolves once every enqueued item, including items enqueued while
    /// waiting, has been marked done.
    pub async fn join(&self) {
        let mut rx = self.outstanding.subscribe();
        let _ = rx.wait_for(|count| *count == 0).await;
    }
}

impl Default for SyncQueue {
    fn default() -> Self {
        Self::new()
    }
}
