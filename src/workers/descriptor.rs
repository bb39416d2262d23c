use super::{ProgressEvent, WorkQueue, WorkerId, CHUNK_SIZE, MAX_RETRIES};
use crate::disk::PositionedFile;
use crate::error::{DownloadError, FetchError};
use crate::fetch::RangeFetcher;
use crate::prelude::*;
use crate::resume::ResumeStore;
use crate::segments::SegmentIndex;
use reqwest::Url;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug)]
/// data struct that owns everything a worker needs independent of the segment it is on.
pub(super) struct WorkerStateDescriptor<F: RangeFetcher> {
    pub worker_id: WorkerId,
    pub fetcher: Arc<F>,
    pub url: Url,
    pub queue: WorkQueue,
    pub output: PositionedFile,
    pub resume: ResumeStore,
    pub progress_tx: mpsc::Sender<ProgressEvent>,
    pub buffer: Box<[u8]>,
    pub cumulative_bytes: u64,
    pub failed_attempts: u32,
    pub segments_completed: u64,
}

impl<F: RangeFetcher> WorkerStateDescriptor<F> {
    pub fn new(
        worker_id: WorkerId,
        fetcher: Arc<F>,
        url: Url,
        queue: WorkQueue,
        output: PositionedFile,
        resume: ResumeStore,
        progress_tx: mpsc::Sender<ProgressEvent>,
    ) -> Self {
        Self {
            worker_id,
            fetcher,
            url,
            queue,
            output,
            resume,
            progress_tx,
            buffer: vec![0; CHUNK_SIZE].into_boxed_slice(),
            cumulative_bytes: 0,
            failed_attempts: 0,
            segments_completed: 0,
        }
    }

    /// count one failed attempt against `segment`, erroring out once the budget is spent.
    pub fn record_failure(
        &mut self,
        segment: SegmentIndex,
        err: FetchError,
    ) -> Result<(), DownloadError> {
        self.failed_attempts += 1;

        if self.failed_attempts > MAX_RETRIES {
            error!(segment, attempts = self.failed_attempts, "giving up on segment: {}", err);
            return Err(DownloadError::FatalFetch {
                segment,
                attempts: self.failed_attempts,
                last_error: err.to_string(),
            });
        }

        warn!(
            segment,
            attempt = self.failed_attempts,
            "range request failed, retrying: {}",
            err
        );
        Ok(())
    }

    pub async fn report_progress(&self) {
        let event = ProgressEvent::Update {
            worker_id: self.worker_id,
            cumulative_bytes: self.cumulative_bytes,
        };

        if self.progress_tx.send(event).await.is_err() {
            trace!("progress sink closed, dropping update");
        }
    }
}
