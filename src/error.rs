use crate::segments::SegmentIndex;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("remote resource unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("segment {segment} failed after {attempts} attempts: {last_error}")]
    FatalFetch {
        segment: SegmentIndex,
        attempts: u32,
        last_error: String,
    },

    #[error("failed to {action}: {source}")]
    Io {
        action: String,
        #[source]
        source: io::Error,
    },

    #[error("fetch worker terminated abnormally: {0}")]
    WorkerPanicked(#[from] tokio::task::JoinError),
}

impl DownloadError {
    pub fn io(action: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            action: action.into(),
            source,
        }
    }
}

/// errors from a single ranged request, these never leave the worker unless the retry budget is
/// exhausted.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),

    #[error("response body ended before any byte was received")]
    EmptyBody,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
