use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::crawler::job::WorkItem;

/// FIFO intake queue shared by the dispatcher and all workers.
///
/// The queue wraps an in-process channel: the dispatcher pushes from one
/// side, and any number of workers pop from the other through a shared
/// receiver. Popping is a blocking wait, not a poll. This is the only
/// synchronization between the dispatcher and the worker pool.
pub struct IntakeQueue {
    tx: mpsc::UnboundedSender<WorkItem>,
    rx: Mutex<mpsc::UnboundedReceiver<WorkItem>>,
}

impl IntakeQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Push one item onto the queue.
    pub fn push(&self, item: WorkItem) {
        // The receiver is owned by the queue itself, so the channel cannot
        // be closed while the queue is alive.
        let _ = self.tx.send(item);
    }

    /// Pop the next item, waiting while the queue is empty.
    ///
    /// Returns `None` only if the queue has been torn down, which workers
    /// treat the same as a shutdown token.
    pub async fn pop(&self) -> Option<WorkItem> {
        let item = self.rx.lock().await.recv().await;
        if let Some(WorkItem::Brand(job)) = &item {
            debug!("popped brand '{}' from the intake queue", job.name);
        }
        item
    }
}

impl Default for IntakeQueue {
    fn default() -> Self {
        Self::new()
    }
}
