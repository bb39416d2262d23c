use crate::error::DownloadError;
use crate::resume::ResumeStore;
use crate::segments::{SegmentSize, DEFAULT_SEGMENT_SIZE};
use reqwest::Url;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub url: Url,
    pub output: PathBuf,
    pub workers: usize,
    /// segment size for a clean start, a resumed download keeps the one it was started with.
    pub segment_size: SegmentSize,
    pub restart: bool,
}

impl DownloadConfig {
    pub fn new(
        url: Url,
        output: impl Into<PathBuf>,
        workers: usize,
    ) -> Result<Self, DownloadError> {
        if workers == 0 {
            return Err(DownloadError::Config(
                "running with zero workers means nothing will download".into(),
            ));
        }

        Ok(Self {
            url,
            output: output.into(),
            workers,
            segment_size: DEFAULT_SEGMENT_SIZE,
            restart: false,
        })
    }

    pub fn with_segment_size(mut self, segment_size: SegmentSize) -> Result<Self, DownloadError> {
        if segment_size == 0 {
            return Err(DownloadError::Config("segment size must be positive".into()));
        }
        self.segment_size = segment_size;
        Ok(self)
    }

    pub fn with_restart(mut self, restart: bool) -> Self {
        self.restart = restart;
        self
    }

    pub fn resume_path(&self) -> PathBuf {
        ResumeStore::path_for(&self.output)
    }
}
