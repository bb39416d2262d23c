use bytes::Bytes;
use std::fs::File;
use std::io;
use std::sync::Arc;

/// shared file handle that only supports writes at explicit offsets, so any number of tasks may
/// write through clones of it as long as their byte ranges don't overlap.
#[derive(Debug, Clone)]
pub struct PositionedFile {
    file: Arc<File>,
}

impl PositionedFile {
    pub fn new(file: File) -> Self {
        Self {
            file: Arc::new(file),
        }
    }

    pub async fn write_all_at(&self, bytes: Bytes, offset: u64) -> io::Result<()> {
        let file = self.file.clone();
        tokio::task::spawn_blocking(move || write_all_at(&file, &bytes, offset))
            .await
            .map_err(io::Error::other)?
    }

    pub async fn sync_data(&self) -> io::Result<()> {
        let file = self.file.clone();
        tokio::task::spawn_blocking(move || file.sync_data())
            .await
            .map_err(io::Error::other)?
    }
}

#[cfg(unix)]
fn write_all_at(file: &File, bytes: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(bytes, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut bytes: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !bytes.is_empty() {
        match file.seek_write(bytes, offset) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => {
                bytes = &bytes[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn test_disjoint_writes_land_at_offsets() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.bin");
        let file = PositionedFile::new(File::create(&path)?);

        // out of order on purpose, the second write leaves a hole that the first one fills.
        let tail = file.write_all_at(Bytes::from_static(b"world"), 6);
        let head = file.write_all_at(Bytes::from_static(b"hello "), 0);
        let (tail, head) = tokio::join!(tail, head);
        tail?;
        head?;
        file.sync_data().await?;

        assert_eq!(std::fs::read(&path)?, b"hello world");
        Ok(())
    }
}
