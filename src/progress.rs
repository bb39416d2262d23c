use crate::prelude::*;
use crate::workers::{ProgressEvent, WorkerId};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

const WORKER_STYLE: &str = "{prefix:>10} {spinner:.blue} {bytes:>10} {binary_bytes_per_sec:>12}";
const TOTAL_STYLE: &str =
    "{prefix:>10} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({eta})";
const PB_CHARS: &str = "█▓▒░  ";

/// consumer of worker progress. runs on its own task and must keep up with the workers, as they
/// wait on the bounded progress channel.
pub trait ProgressSink: Send + 'static {
    fn update(&mut self, worker_id: WorkerId, cumulative_bytes: u64);
    fn finish(&mut self);
}

/// discards everything, for `--quiet`.
#[derive(Debug, Default)]
pub struct QuietProgress;

impl ProgressSink for QuietProgress {
    fn update(&mut self, _worker_id: WorkerId, _cumulative_bytes: u64) {}
    fn finish(&mut self) {}
}

/// one throughput line per worker and a bar for the whole file.
#[derive(Debug)]
pub struct TerminalProgress {
    _multi: MultiProgress,
    workers: Vec<(ProgressBar, u64)>,
    total: ProgressBar,
}

impl TerminalProgress {
    pub fn new(n_workers: usize, total_length: u64, already_downloaded: u64) -> Self {
        let multi = MultiProgress::new();

        let worker_style = ProgressStyle::with_template(WORKER_STYLE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let workers = (0..n_workers)
            .map(|worker_id| {
                let bar = multi.add(ProgressBar::new_spinner());
                bar.set_style(worker_style.clone());
                bar.set_prefix(format!("worker {worker_id}"));
                (bar, 0)
            })
            .collect();

        let total_style = ProgressStyle::with_template(TOTAL_STYLE)
            .map(|style| style.progress_chars(PB_CHARS))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let total = multi.add(ProgressBar::new(total_length));
        total.set_style(total_style);
        total.set_prefix("total");
        total.set_position(already_downloaded);

        Self {
            _multi: multi,
            workers,
            total,
        }
    }
}

impl ProgressSink for TerminalProgress {
    fn update(&mut self, worker_id: WorkerId, cumulative_bytes: u64) {
        let Some((bar, seen)) = self.workers.get_mut(worker_id) else {
            warn!(worker_id, "progress update from unknown worker");
            return;
        };

        self.total.inc(cumulative_bytes.saturating_sub(*seen));
        *seen = cumulative_bytes;
        bar.set_position(cumulative_bytes);
    }

    fn finish(&mut self) {
        for (bar, _) in &self.workers {
            bar.finish();
        }
        self.total.finish();
    }
}

/// feed events into `sink` until a stop event arrives or every sender is gone.
pub async fn drain_progress(
    mut events: mpsc::Receiver<ProgressEvent>,
    mut sink: impl ProgressSink,
) {
    while let Some(event) = events.recv().await {
        match event {
            ProgressEvent::Update {
                worker_id,
                cumulative_bytes,
            } => sink.update(worker_id, cumulative_bytes),
            ProgressEvent::Stop => {
                trace!("progress stop received");
                break;
            }
        }
    }
    sink.finish();
}
