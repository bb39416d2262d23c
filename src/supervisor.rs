use crate::config::DownloadConfig;
use crate::disk::PositionedFile;
use crate::error::DownloadError;
use crate::fetch::RangeFetcher;
use crate::prelude::*;
use crate::progress::{drain_progress, ProgressSink};
use crate::resume::{OpenedStore, ResumeState, ResumeStore};
use crate::segments::{pending_segments, plan, SegmentSpec};
use crate::workers::{
    FetchWorker, ProgressEvent, WorkItem, WorkQueue, WorkerReport, WorkerResources,
};
use reqwest::StatusCode;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// the output already had the remote length and no resume state was around.
    AlreadyComplete,
    Downloaded {
        segments_fetched: u64,
        segments_skipped: u64,
    },
}

/// what the supervisor knows once startup is done, handed to the progress sink factory.
#[derive(Debug, Clone, Copy)]
pub struct DownloadPlan {
    pub total_length: u64,
    pub already_downloaded: u64,
    pub workers: usize,
}

pub struct Supervisor<F: RangeFetcher> {
    fetcher: Arc<F>,
    config: DownloadConfig,
}

impl<F: RangeFetcher> Supervisor<F> {
    // rendezvous-like, the feed can't get ahead of the workers.
    const QUEUE_CAPACITY: usize = 1;
    const PROGRESS_BUFFER_SIZE: usize = 64;

    pub fn new(fetcher: Arc<F>, config: DownloadConfig) -> Self {
        Self { fetcher, config }
    }

    #[instrument(name = "download", level = "info", skip_all, fields(url = %self.config.url))]
    pub async fn run<S, M>(self, make_sink: M) -> Result<Outcome, DownloadError>
    where
        S: ProgressSink,
        M: FnOnce(DownloadPlan) -> S,
    {
        let total_length = self.probe_length().await?;
        info!("downloading file {:.2}MB", total_length as f64 / 1e6);

        let resume_path = self.config.resume_path();
        let existing_output = tokio::fs::metadata(&self.config.output).await.ok();
        let journal_exists = tokio::fs::try_exists(&resume_path)
            .await
            .map_err(|err| DownloadError::io("check for resume state", err))?;

        // same length and no journal means a previous run finished, content is not verified.
        if existing_output
            .as_ref()
            .is_some_and(|metadata| metadata.len() == total_length)
            && !journal_exists
        {
            info!(output = %self.config.output.display(), "file already downloaded");
            return Ok(Outcome::AlreadyComplete);
        }

        // without the output file there is nothing a journal could refer to.
        let force_clean = self.config.restart || existing_output.is_none();
        let OpenedStore {
            store,
            state,
            clean_start,
        } = ResumeStore::open(&resume_path, total_length, self.config.segment_size, force_clean)
            .await?;

        let output = self.open_output(clean_start).await?;

        let segments = plan(state.total_length, state.segment_size);
        let pending: Vec<SegmentSpec> =
            pending_segments(&segments, &state.segments_done).collect();
        let segments_skipped = (segments.len() - pending.len()) as u64;

        let download_plan = DownloadPlan {
            total_length,
            already_downloaded: downloaded_bytes(&segments, &state),
            workers: self.config.workers,
        };
        debug!(
            pending = pending.len(),
            skipped = segments_skipped,
            clean_start,
            "segments planned"
        );

        let (progress_tx, progress_rx) = mpsc::channel(Self::PROGRESS_BUFFER_SIZE);
        let progress = tokio::spawn(drain_progress(progress_rx, make_sink(download_plan)));

        let (queue_tx, queue) = WorkQueue::bounded(Self::QUEUE_CAPACITY);
        let resources = WorkerResources {
            fetcher: self.fetcher.clone(),
            url: self.config.url.clone(),
            queue,
            output,
            resume: store.clone(),
            progress_tx: progress_tx.clone(),
        };

        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.workers {
            workers.spawn(FetchWorker::new(worker_id, resources.clone()).run());
        }
        // workers hold the only remaining handles.
        drop(resources);

        let feed =
            tokio::spawn(feed_queue(queue_tx, pending, self.config.workers).in_current_span());

        let result = join_workers(&mut workers).await;
        feed.abort();

        // the sink gets to finish rendering whatever happened.
        let _ = progress_tx.send(ProgressEvent::Stop).await;
        drop(progress_tx);
        if let Err(err) = progress.await {
            warn!("progress sink task failed: {}", err);
        }

        let reports = result?;
        let segments_fetched: u64 = reports
            .iter()
            .map(|report| report.segments_completed)
            .sum();

        store.discard().await?;
        info!(segments_fetched, segments_skipped, "download complete");

        Ok(Outcome::Downloaded {
            segments_fetched,
            segments_skipped,
        })
    }

    async fn probe_length(&self) -> Result<u64, DownloadError> {
        let response = self
            .fetcher
            .head(&self.config.url)
            .await
            .map_err(|err| DownloadError::RemoteUnavailable(err.to_string()))?;

        if response.status != StatusCode::OK {
            error!(status = %response.status, "failed to get file length");
            return Err(DownloadError::RemoteUnavailable(format!(
                "metadata request returned {}",
                response.status
            )));
        }

        response.content_length.ok_or_else(|| {
            DownloadError::RemoteUnavailable("server did not report a content length".into())
        })
    }

    /// truncate on a clean start, otherwise keep the bytes of segments already done.
    async fn open_output(&self, clean_start: bool) -> Result<PositionedFile, DownloadError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(clean_start)
            .open(&self.config.output)
            .await
            .map_err(|err| {
                DownloadError::io(
                    format!("open output file {}", self.config.output.display()),
                    err,
                )
            })?;

        Ok(PositionedFile::new(file.into_std().await))
    }
}

/// one item per pending segment in ascending order, then one poison item per worker.
async fn feed_queue(
    queue_tx: mpsc::Sender<WorkItem>,
    pending: Vec<SegmentSpec>,
    n_workers: usize,
) {
    let items = pending
        .into_iter()
        .map(WorkItem::Segment)
        .chain(std::iter::repeat(WorkItem::Poison).take(n_workers));

    for item in items {
        if queue_tx.send(item).await.is_err() {
            // every worker is gone, the join reports why.
            debug!("work queue closed early");
            return;
        }
    }
    debug!("all work items queued");
}

/// wait for every worker, stopping the rest as soon as one fails.
async fn join_workers(
    workers: &mut JoinSet<Result<WorkerReport, DownloadError>>,
) -> Result<Vec<WorkerReport>, DownloadError> {
    let mut reports = Vec::new();

    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(Ok(report)) => {
                debug!(
                    worker_id = report.worker_id,
                    segments = report.segments_completed,
                    bytes = report.bytes_written,
                    "worker joined"
                );
                reports.push(report);
            }
            Ok(Err(err)) => {
                error!("worker failed, aborting download: {}", err);
                workers.abort_all();
                return Err(err);
            }
            Err(err) => {
                error!("worker task failed, aborting download: {}", err);
                workers.abort_all();
                return Err(err.into());
            }
        }
    }

    Ok(reports)
}

fn downloaded_bytes(segments: &[SegmentSpec], state: &ResumeState) -> u64 {
    segments
        .iter()
        .filter(|segment| state.is_done(segment.index))
        .map(|segment| segment.length)
        .sum()
}
