use super::WorkerId;
use crate::segments::SegmentSpec;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkItem {
    Segment(SegmentSpec),
    /// no more work for whichever worker receives this.
    Poison,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    Update {
        worker_id: WorkerId,
        cumulative_bytes: u64,
    },
    Stop,
}

/// receiving end of the work queue, shared by all workers. whichever worker is free first takes
/// the next item.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
}

impl WorkQueue {
    pub fn bounded(capacity: usize) -> (mpsc::Sender<WorkItem>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            tx,
            Self {
                rx: Arc::new(Mutex::new(rx)),
            },
        )
    }

    /// `None` once the sender is gone and the queue is drained.
    pub async fn next(&self) -> Option<WorkItem> {
        self.rx.lock().await.recv().await
    }
}
