//! Seekable file handles built from stateless range reads.
//!
//! The store keeps no read cursor, so the handle keeps one itself. Every
//! `read` is a fresh ranged GET for exactly the bytes it can return.

use crate::cadapter::{ByteRange, ObjectBackend, ObjectClient};
use crate::vfs::error::{FsError, PathContext, Result};
use crate::vfs::path::ObjectKey;
use crate::vfs::stat::{FileInfo, resolve};
use std::fmt;
use std::io::SeekFrom;
use std::str::FromStr;

/// Chunk size used by `read_to_end`.
const READ_CHUNK: usize = 256 * 1024;

/// How `seek` treats the cached object size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SeekMode {
    /// Pure position arithmetic against the size seen at open time.
    #[default]
    Arithmetic,
    /// Re-resolve the object on every seek, refreshing the size and failing
    /// if it vanished or shrank below the target.
    Reopen,
}

impl fmt::Display for SeekMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeekMode::Arithmetic => f.write_str("arithmetic"),
            SeekMode::Reopen => f.write_str("reopen"),
        }
    }
}

impl FromStr for SeekMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arithmetic" => Ok(SeekMode::Arithmetic),
            "reopen" => Ok(SeekMode::Reopen),
            other => Err(format!(
                "unknown seek mode {other:?}, expected \"arithmetic\" or \"reopen\""
            )),
        }
    }
}

/// An open object.
///
/// Holds no remote resource; dropping it is the same as `close`.
pub struct FileHandle<B: ObjectBackend> {
    client: ObjectClient<B>,
    key: ObjectKey,
    pos: u64,
    size: u64,
    seek_mode: SeekMode,
}

impl<B: ObjectBackend> FileHandle<B> {
    pub(crate) fn new(
        client: ObjectClient<B>,
        key: ObjectKey,
        size: u64,
        seek_mode: SeekMode,
    ) -> Self {
        Self {
            client,
            key,
            pos: 0,
            size,
            seek_mode,
        }
    }

    pub fn path(&self) -> &str {
        self.key.as_str()
    }

    pub fn name(&self) -> &str {
        self.key.base_name()
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Size as last observed: at open, or at the last reopening seek.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn seek_mode(&self) -> SeekMode {
        self.seek_mode
    }

    /// Read into `buf` from the current position. `Ok(0)` means end of data
    /// (or an empty `buf`).
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = self.size.saturating_sub(self.pos);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = remaining.min(buf.len() as u64);
        let range = ByteRange::new(self.pos, want);
        let data = self
            .client
            .get_object(self.key.as_str(), Some(range))
            .await
            .with_path("read", self.key.as_str())?;

        let n = data.len().min(want as usize);
        buf[..n].copy_from_slice(&data[..n]);
        self.pos += n as u64;
        Ok(n)
    }

    /// Read from the current position to end of data, appending to `out`.
    pub async fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let remaining = self.size.saturating_sub(self.pos);
        let mut chunk = vec![0u8; READ_CHUNK.min(remaining as usize).max(1)];
        let mut total = 0;
        loop {
            let n = self.read(&mut chunk).await?;
            if n == 0 {
                return Ok(total);
            }
            out.extend_from_slice(&chunk[..n]);
            total += n;
        }
    }

    /// Move the cursor and return the new position.
    ///
    /// `SeekFrom::End(d)` lands at `size + d`, so `End(-3)` is three bytes
    /// before the end. A position past the end is allowed in arithmetic mode
    /// and reads return 0 there. A negative result fails with `Invalid`.
    pub async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match self.seek_mode {
            SeekMode::Arithmetic => offset_from(pos, self.pos, self.size),
            SeekMode::Reopen => self.reopen(pos).await,
        }
        .with_path("seek", self.key.as_str())?;
        self.pos = target;
        Ok(target)
    }

    async fn reopen(&mut self, pos: SeekFrom) -> std::result::Result<u64, FsError> {
        let info = resolve(&self.client, &self.key).await?;
        if !info.is_file() {
            tracing::debug!(key = %self.key, "object replaced by a directory since open");
            return Err(FsError::NotExist);
        }
        if info.size() != self.size {
            tracing::debug!(
                key = %self.key,
                old = self.size,
                new = info.size(),
                "object size changed"
            );
            self.size = info.size();
        }
        let target = offset_from(pos, self.pos, self.size)?;
        if target > self.size {
            return Err(FsError::Stale {
                size: self.size,
                position: target,
            });
        }
        Ok(target)
    }

    /// Fresh metadata for the object behind this handle.
    pub async fn stat(&self) -> Result<FileInfo> {
        resolve(&self.client, &self.key)
            .await
            .with_path("stat", self.key.as_str())
    }

    pub fn close(self) {}
}

fn offset_from(pos: SeekFrom, current: u64, size: u64) -> std::result::Result<u64, FsError> {
    let target = match pos {
        SeekFrom::Start(k) => Some(k),
        SeekFrom::Current(d) => current.checked_add_signed(d),
        SeekFrom::End(d) => size.checked_add_signed(d),
    };
    target.ok_or(FsError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cadapter::memory::{InMemoryBackend, Op};
    use crate::vfs::error::ErrorKind;

    fn handle(data: &'static [u8], mode: SeekMode) -> FileHandle<InMemoryBackend> {
        let backend = InMemoryBackend::new("t");
        backend.insert("obj", data);
        FileHandle::new(
            ObjectClient::new(backend),
            ObjectKey::parse("obj").unwrap(),
            data.len() as u64,
            mode,
        )
    }

    #[test]
    fn test_offset_from() {
        assert_eq!(offset_from(SeekFrom::Start(7), 3, 10).unwrap(), 7);
        assert_eq!(offset_from(SeekFrom::Current(2), 3, 10).unwrap(), 5);
        assert_eq!(offset_from(SeekFrom::Current(-3), 3, 10).unwrap(), 0);
        assert_eq!(offset_from(SeekFrom::End(-4), 3, 10).unwrap(), 6);
        assert_eq!(offset_from(SeekFrom::End(5), 3, 10).unwrap(), 15);
        assert!(matches!(offset_from(SeekFrom::Current(-4), 3, 10), Err(FsError::Invalid)));
        assert!(matches!(offset_from(SeekFrom::End(-11), 3, 10), Err(FsError::Invalid)));
    }

    #[test]
    fn test_seek_mode_parse() {
        assert_eq!("reopen".parse::<SeekMode>().unwrap(), SeekMode::Reopen);
        assert_eq!("Arithmetic".parse::<SeekMode>().unwrap(), SeekMode::Arithmetic);
        assert!("sideways".parse::<SeekMode>().is_err());
        assert_eq!(SeekMode::default().to_string(), "arithmetic");
    }

    #[tokio::test]
    async fn test_read_issues_one_range_per_call() {
        let mut f = handle(b"abcdefghij", SeekMode::Arithmetic);
        let mut buf = [0u8; 4];
        assert_eq!(f.read(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(f.read(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"efgh");
        assert_eq!(f.read(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"ij");
        assert_eq!(f.read(&mut buf).await.unwrap(), 0);
        assert_eq!(f.client.backend().calls(Op::Get), 3);
        assert_eq!(f.position(), 10);
    }

    #[tokio::test]
    async fn test_empty_object_reads_nothing() {
        let mut f = handle(b"", SeekMode::Arithmetic);
        let mut out = Vec::new();
        assert_eq!(f.read_to_end(&mut out).await.unwrap(), 0);
        assert!(out.is_empty());
        assert_eq!(f.client.backend().calls(Op::Get), 0);
    }

    #[tokio::test]
    async fn test_seek_then_read_matches_skip() {
        let data: &[u8] = b"0123456789abcdef";
        for k in [0u64, 1, 7, 15, 16] {
            let mut f = handle(data, SeekMode::Arithmetic);
            assert_eq!(f.seek(SeekFrom::Start(k)).await.unwrap(), k);
            let mut out = Vec::new();
            f.read_to_end(&mut out).await.unwrap();
            assert_eq!(&out[..], &data[k as usize..], "offset {k}");
        }
    }

    #[tokio::test]
    async fn test_arithmetic_seek_makes_no_call() {
        let mut f = handle(b"hello", SeekMode::Arithmetic);
        assert_eq!(f.seek(SeekFrom::End(-2)).await.unwrap(), 3);
        assert_eq!(f.seek(SeekFrom::Current(-1)).await.unwrap(), 2);
        assert_eq!(f.seek(SeekFrom::End(10)).await.unwrap(), 15);
        let mut buf = [0u8; 8];
        assert_eq!(f.read(&mut buf).await.unwrap(), 0);
        assert_eq!(f.client.backend().total_calls(), 0);

        let err = f.seek(SeekFrom::Current(-100)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(err.op, "seek");
        // A failed seek leaves the cursor alone.
        assert_eq!(f.position(), 15);
    }

    #[tokio::test]
    async fn test_reopen_seek_refreshes_size() {
        let mut f = handle(b"short", SeekMode::Reopen);
        f.client.backend().insert("obj", "a longer body");
        assert_eq!(f.seek(SeekFrom::End(-4)).await.unwrap(), 9);
        assert_eq!(f.size(), 13);
        let mut out = Vec::new();
        f.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"body");
        assert_eq!(f.client.backend().calls(Op::Head), 1);
    }

    #[tokio::test]
    async fn test_reopen_seek_detects_deletion_and_truncation() {
        let mut f = handle(b"0123456789", SeekMode::Reopen);
        f.client.backend().insert("obj", "012");
        let err = f.seek(SeekFrom::Start(8)).await.unwrap_err();
        assert!(matches!(err.source, FsError::Stale { size: 3, position: 8 }));
        assert_eq!(err.kind(), ErrorKind::Other);

        f.client.backend().insert("obj/child", "x");
        f.client.backend().remove("obj");
        let err = f.seek(SeekFrom::Start(0)).await.unwrap_err();
        assert!(err.is_not_found());

        f.client.backend().remove("obj/child");
        let err = f.seek(SeekFrom::Start(0)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stat_refreshes() {
        let f = handle(b"abc", SeekMode::Arithmetic);
        f.client.backend().insert("obj", "abcdef");
        let info = f.stat().await.unwrap();
        assert_eq!(info.size(), 6);
        assert_eq!(info.name(), "obj");
        // The cached size only moves on a reopening seek.
        assert_eq!(f.size(), 3);
        f.close();
    }
}
