//! Local directory backend: a directory tree standing in for a bucket.
//!
//! Each key maps to a regular file below `root`. Directories on disk only
//! exist to hold files, so a key and a key below it (`a` and `a/b`) cannot
//! both be stored here. Content types are not persisted.

use crate::cadapter::client::{
    BackendError, ByteRange, ListPage, ListRequest, ObjectBackend, ObjectInfo, ObjectMeta,
    paginate,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io::{ErrorKind, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tokio::{
    fs,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};

pub struct LocalFsBackend {
    root: PathBuf,
    bucket: String,
}

impl LocalFsBackend {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        let bucket = root.display().to_string();
        Self { root, bucket }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BackendError> {
        let relative = Path::new(key);
        let escapes = key.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(BackendError::service(
                "InvalidKey",
                format!("key {key:?} does not name a file below the root"),
            ));
        }
        Ok(self.root.join(relative))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                _ => return None,
            }
        }
        Some(parts.join("/"))
    }

    /// Metadata of the file stored under `key`; directories do not count.
    async fn file_metadata(&self, key: &str) -> Result<std::fs::Metadata, BackendError> {
        let path = self.path_for(key)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(meta),
            Ok(_) => Err(BackendError::no_such_key(key)),
            Err(e) => Err(io_error(key, e)),
        }
    }

    /// Remove now-empty directories between `path` and the root so a prefix
    /// disappears once its last key is gone.
    async fn prune_empty_parents(&self, path: &Path) {
        let mut dir = path.parent();
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            if fs::remove_dir(current).await.is_err() {
                break;
            }
            dir = current.parent();
        }
    }

    /// Every stored key at or below the directory part of `prefix`, sorted.
    async fn walk(&self, prefix: &str) -> Result<Vec<ObjectInfo>, BackendError> {
        let start = match prefix.rfind('/') {
            Some(idx) => self.path_for(&prefix[..idx])?,
            None => self.root.clone(),
        };

        let mut found = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                    continue;
                }
                Err(e) => return Err(BackendError::transport(e)),
            };
            while let Some(entry) = entries.next_entry().await.map_err(BackendError::transport)? {
                let path = entry.path();
                let meta = entry.metadata().await.map_err(BackendError::transport)?;
                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }
                match self.key_for(&path) {
                    Some(key) => found.push(ObjectInfo {
                        key,
                        size: meta.len(),
                        last_modified: modified(&meta),
                    }),
                    None => tracing::warn!(path = %path.display(), "skipping non UTF-8 file name"),
                }
            }
        }
        found.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(found)
    }
}

fn io_error(key: &str, err: std::io::Error) -> BackendError {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::NotADirectory => BackendError::no_such_key(key),
        _ => BackendError::transport(err),
    }
}

fn modified(meta: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    meta.modified().ok().map(DateTime::<Utc>::from)
}

#[async_trait]
impl ObjectBackend for LocalFsBackend {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get_object(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> Result<Bytes, BackendError> {
        let meta = self.file_metadata(key).await?;
        let path = self.path_for(key)?;
        let mut f = fs::File::open(&path).await.map_err(|e| io_error(key, e))?;

        let Some(range) = range else {
            let mut buf = Vec::with_capacity(meta.len() as usize);
            f.read_to_end(&mut buf).await.map_err(BackendError::transport)?;
            return Ok(Bytes::from(buf));
        };

        if range.start >= meta.len() {
            return Err(BackendError::service(
                "InvalidRange",
                format!(
                    "range {range} not satisfiable for object of {} bytes",
                    meta.len()
                ),
            ));
        }
        let len = range.end.min(meta.len() - 1) - range.start + 1;
        f.seek(SeekFrom::Start(range.start))
            .await
            .map_err(BackendError::transport)?;
        let mut buf = Vec::with_capacity(len as usize);
        f.take(len)
            .read_to_end(&mut buf)
            .await
            .map_err(BackendError::transport)?;
        Ok(Bytes::from(buf))
    }

    async fn head_object(&self, key: &str) -> Result<ObjectMeta, BackendError> {
        let meta = self.file_metadata(key).await?;
        Ok(ObjectMeta {
            size: meta.len(),
            last_modified: modified(&meta),
            content_type: None,
            etag: None,
        })
    }

    async fn put_object(
        &self,
        key: &str,
        data: &[u8],
        _content_type: Option<&str>,
    ) -> Result<(), BackendError> {
        let path = self.path_for(key)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(BackendError::transport)?;
        }
        let mut f = fs::File::create(path)
            .await
            .map_err(BackendError::transport)?;
        f.write_all(data).await.map_err(BackendError::transport)?;
        f.flush().await.map_err(BackendError::transport)?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), BackendError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            // Deleting a missing key succeeds, as it does on S3.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(BackendError::transport(e)),
        }
        self.prune_empty_parents(&path).await;
        Ok(())
    }

    async fn copy_object(&self, src_key: &str, dst_key: &str) -> Result<(), BackendError> {
        self.file_metadata(src_key).await?;
        let src = self.path_for(src_key)?;
        let dst = self.path_for(dst_key)?;
        if let Some(dir) = dst.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(BackendError::transport)?;
        }
        fs::copy(&src, &dst)
            .await
            .map_err(|e| io_error(src_key, e))?;
        Ok(())
    }

    async fn list_objects(&self, req: &ListRequest) -> Result<ListPage, BackendError> {
        let objects = self.walk(&req.prefix).await?;
        Ok(paginate(objects, req))
    }
}
