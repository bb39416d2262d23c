use super::descriptor::WorkerStateDescriptor;
use super::in_flight::InFlightRange;
use super::WorkItem;
use crate::error::{DownloadError, FetchError};
use crate::fetch::{BodyStream, RangeFetcher};
use crate::prelude::*;
use bytes::Bytes;
use reqwest::StatusCode;
use std::cmp::min;
use std::io;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;

pub(super) struct ResponseBody(StreamReader<BodyStream, Bytes>);

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ResponseBody")
    }
}

#[derive(Debug)]
pub(super) enum WorkerState {
    /// waiting on the work queue.
    Idle,
    /// issuing the ranged request for whatever is left of the segment.
    Requesting { range: InFlightRange },
    /// waiting on the next chunk of the response body.
    Fetching {
        range: InFlightRange,
        body: ResponseBody,
        received: u64,
    },
    /// writing a received chunk at its offset in the output file.
    Writing {
        range: InFlightRange,
        body: ResponseBody,
        received: u64,
        chunk: Bytes,
    },
    /// every byte of the segment is written, persist that fact.
    Completing { range: InFlightRange },
    Stopped,
}

impl WorkerState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub async fn transition<F: RangeFetcher>(
        &mut self,
        descriptor: &mut WorkerStateDescriptor<F>,
    ) -> Result<(), DownloadError> {
        // left as Stopped if any step errors out.
        let current = std::mem::replace(self, Self::Stopped);

        *self = match current {
            Self::Idle => match descriptor.queue.next().await {
                Some(WorkItem::Segment(segment)) => {
                    debug!(
                        segment = segment.index,
                        start = segment.start,
                        length = segment.length,
                        "picked up segment"
                    );
                    descriptor.failed_attempts = 0;
                    Self::Requesting {
                        range: InFlightRange::new(segment),
                    }
                }
                Some(WorkItem::Poison) => {
                    info!("received poison item, stopping");
                    Self::Stopped
                }
                None => {
                    warn!("work queue closed without a poison item, stopping");
                    Self::Stopped
                }
            },

            Self::Requesting { range } => {
                let segment = range.segment().index;
                let response = descriptor
                    .fetcher
                    .get_range(&descriptor.url, range.byte_range())
                    .await
                    .and_then(|response| {
                        if response.status == StatusCode::PARTIAL_CONTENT {
                            Ok(response)
                        } else {
                            Err(FetchError::UnexpectedStatus(response.status.as_u16()))
                        }
                    });

                match response {
                    Ok(response) => {
                        trace!(segment, remaining = range.remaining(), "range request accepted");
                        Self::Fetching {
                            range,
                            body: ResponseBody(StreamReader::new(response.body)),
                            received: 0,
                        }
                    }
                    Err(err) => {
                        descriptor.record_failure(segment, err)?;
                        Self::Requesting { range }
                    }
                }
            }

            Self::Fetching {
                range,
                mut body,
                received,
            } => {
                // never read past the segment, whatever the server sends.
                let want = min(descriptor.buffer.len() as u64, range.remaining()) as usize;

                match body.0.read(&mut descriptor.buffer[..want]).await {
                    Ok(0) => Self::end_of_body(range, received, None, descriptor)?,
                    Ok(n) => Self::Writing {
                        range,
                        body,
                        received,
                        chunk: Bytes::copy_from_slice(&descriptor.buffer[..n]),
                    },
                    Err(err) => Self::end_of_body(range, received, Some(err), descriptor)?,
                }
            }

            Self::Writing {
                mut range,
                body,
                received,
                chunk,
            } => {
                let n_bytes = chunk.len() as u64;
                let offset = range.offset();
                trace!(segment = range.segment().index, offset, n_bytes, "writing chunk");

                descriptor
                    .output
                    .write_all_at(chunk, offset)
                    .await
                    .map_err(|err| DownloadError::io(format!("write at offset {offset}"), err))?;

                range.advance(n_bytes);
                descriptor.cumulative_bytes += n_bytes;
                descriptor.failed_attempts = 0;
                descriptor.report_progress().await;

                if range.is_done() {
                    Self::Completing { range }
                } else {
                    Self::Fetching {
                        range,
                        body,
                        received: received + n_bytes,
                    }
                }
            }

            Self::Completing { range } => {
                let segment = range.segment().index;

                // the data must be on disk before the journal claims it is.
                descriptor
                    .output
                    .sync_data()
                    .await
                    .map_err(|err| DownloadError::io("flush output file", err))?;
                descriptor.resume.mark_segment_done(segment).await?;
                descriptor.segments_completed += 1;

                debug!(segment, "segment complete");
                Self::Idle
            }

            Self::Stopped => Self::Stopped,
        };

        Ok(())
    }

    /// the body ended (cleanly or not) with part of the segment still missing. an attempt that
    /// delivered nothing is a failure, otherwise only the remainder is requested again.
    fn end_of_body<F: RangeFetcher>(
        range: InFlightRange,
        received: u64,
        err: Option<io::Error>,
        descriptor: &mut WorkerStateDescriptor<F>,
    ) -> Result<Self, DownloadError> {
        let segment = range.segment().index;

        if received == 0 {
            let err = err.map_or(FetchError::EmptyBody, |err| {
                FetchError::Transport(err.to_string())
            });
            descriptor.record_failure(segment, err)?;
        } else {
            debug!(
                segment,
                received,
                remaining = range.remaining(),
                error = err.as_ref().map(tracing::field::display),
                "response ended early, requesting remainder"
            );
        }

        Ok(Self::Requesting { range })
    }
}
