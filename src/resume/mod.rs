mod bitfield;
mod state;

pub use bitfield::Bitfield;
pub use state::{ResumeError, ResumeState};

use state::{BITMAP_OFFSET, DONE_MARKER, MAX_SEGMENTS};

use crate::disk::PositionedFile;
use crate::error::DownloadError;
use crate::prelude::*;
use crate::segments::{SegmentIndex, SegmentSize};
use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;

/// handle on the `<output>.multidownload` journal. cloned into every worker, each of which only
/// ever touches the marker bytes of the segments it completes.
#[derive(Debug, Clone)]
pub struct ResumeStore {
    path: PathBuf,
    file: PositionedFile,
}

/// result of [`ResumeStore::open`].
#[derive(Debug)]
pub struct OpenedStore {
    pub store: ResumeStore,
    pub state: ResumeState,
    pub clean_start: bool,
}

impl ResumeStore {
    pub const EXTENSION: &'static str = "multidownload";

    pub fn path_for(output: impl AsRef<Path>) -> PathBuf {
        let mut path = output.as_ref().as_os_str().to_owned();
        path.push(".");
        path.push(Self::EXTENSION);
        PathBuf::from(path)
    }

    /// recover the state at `path`, or start over when asked to, when there is nothing usable to
    /// recover, or when it describes a resource of a different length.
    #[instrument(name = "open resume state", level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(
        path: impl AsRef<Path>,
        expected_length: u64,
        segment_size_hint: SegmentSize,
        force_clean: bool,
    ) -> Result<OpenedStore, DownloadError> {
        let path = path.as_ref().to_path_buf();

        let recovered = if force_clean {
            debug!("clean start forced, ignoring any existing state");
            None
        } else {
            match Self::read_state(&path).await {
                Ok(state) if state.total_length == expected_length => Some(state),
                Ok(state) => {
                    info!(
                        stored_length = state.total_length,
                        expected_length, "remote length changed, starting over"
                    );
                    None
                }
                Err(ResumeError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                    debug!("no resume state found");
                    None
                }
                Err(err) => {
                    warn!("discarding unusable resume state: {}", err);
                    None
                }
            }
        };

        match recovered {
            Some(state) => {
                let file = OpenOptions::new()
                    .write(true)
                    .open(&path)
                    .await
                    .map_err(|err| DownloadError::io("open resume state", err))?
                    .into_std()
                    .await;
                info!(
                    "resuming file download {}/{}",
                    state.done_count(),
                    state.segment_count()
                );

                Ok(OpenedStore {
                    store: Self::from_parts(path, file),
                    state,
                    clean_start: false,
                })
            }
            None => {
                let segment_size = fit_segment_size(expected_length, segment_size_hint);
                let state = ResumeState::new(expected_length, segment_size);
                let store = Self::begin(path, &state).await?;

                Ok(OpenedStore {
                    store,
                    state,
                    clean_start: true,
                })
            }
        }
    }

    pub async fn read_state(path: impl AsRef<Path>) -> Result<ResumeState, ResumeError> {
        let bytes = tokio::fs::read(path).await?;
        ResumeState::decode(&bytes)
    }

    /// truncate (or create) the file and write a fresh header, every bitmap entry is pending.
    async fn begin(path: PathBuf, state: &ResumeState) -> Result<Self, DownloadError> {
        let header = state.encode_header().map_err(|err| {
            DownloadError::io("encode resume header", io::Error::other(err.to_string()))
        })?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(|err| DownloadError::io("create resume state", err))?
            .into_std()
            .await;

        let store = Self::from_parts(path, file);
        store
            .file
            .write_all_at(Bytes::from(header), 0)
            .await
            .map_err(|err| DownloadError::io("write resume header", err))?;
        store
            .file
            .sync_data()
            .await
            .map_err(|err| DownloadError::io("sync resume header", err))?;

        Ok(store)
    }

    fn from_parts(path: PathBuf, file: std::fs::File) -> Self {
        Self {
            path,
            file: PositionedFile::new(file),
        }
    }

    /// flip the marker byte of one segment. writing the same marker twice is harmless, and
    /// distinct segments live at distinct offsets so concurrent callers need no lock.
    pub async fn mark_segment_done(&self, index: SegmentIndex) -> Result<(), DownloadError> {
        trace!(index, "marking segment done");
        self.file
            .write_all_at(
                Bytes::from_static(&[DONE_MARKER]),
                BITMAP_OFFSET + index as u64,
            )
            .await
            .map_err(|err| DownloadError::io(format!("mark segment {index} done"), err))
    }

    /// remove the journal, only called once every segment is on disk.
    pub async fn discard(self) -> Result<(), DownloadError> {
        let Self { path, file } = self;
        drop(file);

        debug!(path = %path.display(), "removing resume state");
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(DownloadError::io("remove resume state", err)),
        }
    }
}

/// grow the segment size until the bitmap fits in the journal, so the state stays recoverable.
fn fit_segment_size(total_length: u64, segment_size_hint: SegmentSize) -> SegmentSize {
    let smallest = total_length.div_ceil(MAX_SEGMENTS);
    if segment_size_hint >= smallest {
        return segment_size_hint;
    }

    warn!(
        requested = segment_size_hint,
        segment_size = smallest,
        "segment size too small for a resumable download, raising it"
    );
    smallest
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn dir() -> TempDir {
        tempfile::tempdir().expect("temp dir")
    }

    #[rstest]
    fn test_path_for() {
        assert_eq!(
            ResumeStore::path_for("videos/out.mp4"),
            PathBuf::from("videos/out.mp4.multidownload")
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_round_trip(dir: TempDir) -> anyhow::Result<()> {
        let path = dir.path().join("a.multidownload");

        let opened = ResumeStore::open(&path, 2_500_000, 1_000_000, false).await?;
        assert!(opened.clean_start);
        assert_eq!(opened.state.done_count(), 0);

        opened.store.mark_segment_done(0).await?;
        opened.store.mark_segment_done(2).await?;

        let mut expected = ResumeState::new(2_500_000, 1_000_000);
        expected.segments_done.set(0, true);
        expected.segments_done.set(2, true);
        assert_eq!(ResumeStore::read_state(&path).await?, expected);

        let reopened = ResumeStore::open(&path, 2_500_000, 1_000_000, false).await?;
        assert!(!reopened.clean_start);
        assert_eq!(reopened.state, expected);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_mark_is_idempotent(dir: TempDir) -> anyhow::Result<()> {
        let path = dir.path().join("b.multidownload");
        let opened = ResumeStore::open(&path, 50, 10, false).await?;

        opened.store.mark_segment_done(3).await?;
        let once = tokio::fs::read(&path).await?;
        opened.store.mark_segment_done(3).await?;
        let twice = tokio::fs::read(&path).await?;

        assert_eq!(once, twice);
        assert!(ResumeStore::read_state(&path).await?.is_done(3));
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_concurrent_marks(dir: TempDir) -> anyhow::Result<()> {
        let path = dir.path().join("c.multidownload");
        let opened = ResumeStore::open(&path, 100, 10, false).await?;

        let mut tasks = tokio::task::JoinSet::new();
        for index in 0..10 {
            let store = opened.store.clone();
            tasks.spawn(async move { store.mark_segment_done(index).await });
        }
        while let Some(res) = tasks.join_next().await {
            res??;
        }

        assert_eq!(ResumeStore::read_state(&path).await?.done_count(), 10);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_length_mismatch_starts_clean(dir: TempDir) -> anyhow::Result<()> {
        let path = dir.path().join("d.multidownload");
        let opened = ResumeStore::open(&path, 30, 10, false).await?;
        opened.store.mark_segment_done(1).await?;

        let reopened = ResumeStore::open(&path, 40, 10, false).await?;
        assert!(reopened.clean_start);
        assert_eq!(reopened.state, ResumeState::new(40, 10));
        assert_eq!(ResumeStore::read_state(&path).await?.done_count(), 0);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_force_clean(dir: TempDir) -> anyhow::Result<()> {
        let path = dir.path().join("e.multidownload");
        let opened = ResumeStore::open(&path, 30, 10, false).await?;
        opened.store.mark_segment_done(0).await?;

        let reopened = ResumeStore::open(&path, 30, 10, true).await?;
        assert!(reopened.clean_start);
        assert_eq!(reopened.state.done_count(), 0);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_resume_keeps_stored_segment_size(dir: TempDir) -> anyhow::Result<()> {
        let path = dir.path().join("f.multidownload");
        ResumeStore::open(&path, 30, 10, false).await?;

        let reopened = ResumeStore::open(&path, 30, 7, false).await?;
        assert!(!reopened.clean_start);
        assert_eq!(reopened.state.segment_size, 10);
        assert_eq!(reopened.state.segment_count(), 3);
        Ok(())
    }

    #[rstest]
    #[case::garbage(b"not a state file at all".to_vec())]
    #[case::empty(Vec::new())]
    #[tokio::test]
    async fn test_corrupt_state_starts_clean(
        dir: TempDir,
        #[case] contents: Vec<u8>,
    ) -> anyhow::Result<()> {
        let path = dir.path().join("g.multidownload");
        tokio::fs::write(&path, contents).await?;

        let opened = ResumeStore::open(&path, 30, 10, false).await?;
        assert!(opened.clean_start);
        assert_eq!(ResumeStore::read_state(&path).await?, ResumeState::new(30, 10));
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_over_cap_starts_clean(dir: TempDir) -> anyhow::Result<()> {
        let path = dir.path().join("h.multidownload");
        let header = ResumeState::new(MAX_SEGMENTS + 10, 1).encode_header()?;
        tokio::fs::write(&path, header).await?;

        let opened = ResumeStore::open(&path, MAX_SEGMENTS + 10, 1_000_000, false).await?;
        assert!(opened.clean_start);
        assert_eq!(opened.state.segment_size, 1_000_000);
        Ok(())
    }

    #[rstest]
    #[case(60_000, 1, 2)]
    #[case(MAX_SEGMENTS * 3 + 1, 1_000, 1_000)]
    #[case(MAX_SEGMENTS * 3 + 1, 3, 4)]
    #[case(0, 1, 1)]
    fn test_fit_segment_size(#[case] total: u64, #[case] hint: u64, #[case] expected: u64) {
        assert_eq!(fit_segment_size(total, hint), expected);
        if total > 0 {
            assert!(total.div_ceil(expected) <= MAX_SEGMENTS);
        }
    }

    #[rstest]
    #[tokio::test]
    async fn test_tiny_segment_size_stays_resumable(dir: TempDir) -> anyhow::Result<()> {
        let path = dir.path().join("j.multidownload");
        let opened = ResumeStore::open(&path, 60_000, 1, true).await?;
        assert_eq!(opened.state.segment_size, 2);
        assert_eq!(opened.state.segment_count(), 30_000);

        for index in [0, 1, 29_999] {
            opened.store.mark_segment_done(index).await?;
        }
        drop(opened);

        let reopened = ResumeStore::open(&path, 60_000, 1, false).await?;
        assert!(!reopened.clean_start);
        assert_eq!(reopened.state.segment_size, 2);
        assert_eq!(reopened.state.done_count(), 3);
        assert!(reopened.state.is_done(29_999));
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_discard(dir: TempDir) -> anyhow::Result<()> {
        let path = dir.path().join("i.multidownload");
        let opened = ResumeStore::open(&path, 30, 10, false).await?;
        assert!(path.exists());

        opened.store.discard().await?;
        assert!(!path.exists());
        Ok(())
    }
}
