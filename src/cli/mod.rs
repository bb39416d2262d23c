use clap::{self, ArgAction, Parser};
use std::num::NonZeroUsize;
use std::path::PathBuf;

pub mod download_url;
use download_url::DownloadUrl;

use crate::config::DownloadConfig;
use crate::error::DownloadError;
use crate::segments::DEFAULT_SEGMENT_SIZE;

#[derive(Parser, Debug)]
#[command(author, about, long_about = None)]
/// a resumable, segmented http downloader.
pub struct Cli {
    #[arg(required = true)]
    /// url of the resource to download, the server must support range requests.
    pub url: DownloadUrl,

    #[arg(short, long, default_value = "video.mp4")]
    /// where to write the download. progress is kept next to it in <output>.multidownload
    pub output: PathBuf,

    #[arg(short = 'n', long, default_value = "4")]
    /// number of concurrent range requests.
    pub workers: NonZeroUsize,

    #[arg(short, long)]
    /// don't render progress.
    pub quiet: bool,

    #[arg(long, default_value_t = DEFAULT_SEGMENT_SIZE, value_parser = clap::value_parser!(u64).range(1..))]
    /// size in bytes of each segment when starting a new download.
    pub segment_size: u64,

    #[arg(long)]
    /// ignore any saved progress and download from scratch.
    pub restart: bool,

    #[arg(short, long, action = ArgAction::Count)]
    /// more logging, repeat for more.
    pub verbose: u8,
}

impl TryFrom<Cli> for DownloadConfig {
    type Error = DownloadError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        Ok(DownloadConfig::new(cli.url.into_inner(), cli.output, cli.workers.get())?
            .with_segment_size(cli.segment_size)?
            .with_restart(cli.restart))
    }
}
