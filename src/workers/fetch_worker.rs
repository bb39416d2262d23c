use super::descriptor::WorkerStateDescriptor;
use super::worker_fsm::WorkerState;
use super::{ProgressEvent, WorkQueue, WorkerId};
use crate::disk::PositionedFile;
use crate::error::DownloadError;
use crate::fetch::RangeFetcher;
use crate::prelude::*;
use crate::resume::ResumeStore;
use reqwest::Url;
use std::sync::Arc;
use tokio::sync::mpsc;

/// handles shared by every worker of one download.
#[derive(Debug)]
pub struct WorkerResources<F: RangeFetcher> {
    pub fetcher: Arc<F>,
    pub url: Url,
    pub queue: WorkQueue,
    pub output: PositionedFile,
    pub resume: ResumeStore,
    pub progress_tx: mpsc::Sender<ProgressEvent>,
}

impl<F: RangeFetcher> Clone for WorkerResources<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            url: self.url.clone(),
            queue: self.queue.clone(),
            output: self.output.clone(),
            resume: self.resume.clone(),
            progress_tx: self.progress_tx.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: WorkerId,
    pub segments_completed: u64,
    pub bytes_written: u64,
}

#[derive(Debug)]
pub struct FetchWorker<F: RangeFetcher> {
    state: WorkerState,
    descriptor: WorkerStateDescriptor<F>,
}

impl<F: RangeFetcher> FetchWorker<F> {
    pub fn new(
        worker_id: WorkerId,
        WorkerResources {
            fetcher,
            url,
            queue,
            output,
            resume,
            progress_tx,
        }: WorkerResources<F>,
    ) -> Self {
        let descriptor = WorkerStateDescriptor::new(
            worker_id,
            fetcher,
            url,
            queue,
            output,
            resume,
            progress_tx,
        );

        Self {
            state: WorkerState::Idle,
            descriptor,
        }
    }

    /// take segments off the queue until a poison item arrives. any error is fatal for the whole
    /// download.
    #[instrument(name = "fetch worker", level = "info", skip_all, fields(worker_id = self.descriptor.worker_id))]
    pub async fn run(mut self) -> Result<WorkerReport, DownloadError> {
        info!("worker started");
        while !self.state.is_stopped() {
            self.state.transition(&mut self.descriptor).await?;
        }

        let report = WorkerReport {
            worker_id: self.descriptor.worker_id,
            segments_completed: self.descriptor.segments_completed,
            bytes_written: self.descriptor.cumulative_bytes,
        };
        info!(
            segments = report.segments_completed,
            bytes = report.bytes_written,
            "worker finished"
        );
        Ok(report)
    }
}
