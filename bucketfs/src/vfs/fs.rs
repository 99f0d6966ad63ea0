//! Path-style filesystem view over an object store bucket: open, stat,
//! readdir, read, write and rename.
//!
//! Files are objects; directories exist only as key prefixes and are never
//! stored. Open, Stat and ReadDir resolve a path first; WriteFile and Rename
//! address object keys directly.

use crate::cadapter::{DEFAULT_MAX_KEYS, ObjectBackend, ObjectClient};
use crate::vfs::dir::DirHandle;
use crate::vfs::error::{ErrorKind, FsError, PathContext, PathError, Result, classify};
use crate::vfs::file::{FileHandle, SeekMode};
use crate::vfs::path::ObjectKey;
use crate::vfs::sniff::detect_content_type;
use crate::vfs::stat::{FileInfo, resolve};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FsOptions {
    pub seek_mode: SeekMode,
    /// Keys requested per listing page, within `1..=DEFAULT_MAX_KEYS`.
    /// `BucketFs` clamps values outside that range.
    pub list_page_size: i32,
}

impl Default for FsOptions {
    fn default() -> Self {
        Self {
            seek_mode: SeekMode::default(),
            list_page_size: DEFAULT_MAX_KEYS,
        }
    }
}

/// Result of `open`: which variant is decided by what the path resolves to.
pub enum Node<B: ObjectBackend> {
    File(FileHandle<B>),
    Dir(DirHandle<B>),
}

impl<B: ObjectBackend> Node<B> {
    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Dir(_))
    }

    pub async fn stat(&self) -> Result<FileInfo> {
        match self {
            Node::File(f) => f.stat().await,
            Node::Dir(d) => Ok(d.stat()),
        }
    }

    pub fn into_file(self) -> Option<FileHandle<B>> {
        match self {
            Node::File(f) => Some(f),
            Node::Dir(_) => None,
        }
    }

    pub fn into_dir(self) -> Option<DirHandle<B>> {
        match self {
            Node::Dir(d) => Some(d),
            Node::File(_) => None,
        }
    }

    pub fn close(self) {
        match self {
            Node::File(f) => f.close(),
            Node::Dir(d) => d.close(),
        }
    }
}

/// A bucket viewed as a filesystem.
///
/// Immutable after construction and cheap to clone; clones share the backend.
pub struct BucketFs<B: ObjectBackend> {
    client: ObjectClient<B>,
    options: FsOptions,
}

impl<B: ObjectBackend> Clone for BucketFs<B> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            options: self.options,
        }
    }
}

impl<B: ObjectBackend> BucketFs<B> {
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, FsOptions::default())
    }

    pub fn with_options(backend: B, options: FsOptions) -> Self {
        Self::from_client(ObjectClient::from_arc(Arc::new(backend)), options)
    }

    pub fn from_client(client: ObjectClient<B>, mut options: FsOptions) -> Self {
        let page_size = options.list_page_size.clamp(1, DEFAULT_MAX_KEYS);
        if page_size != options.list_page_size {
            tracing::warn!(
                requested = options.list_page_size,
                using = page_size,
                "list page size out of range"
            );
            options.list_page_size = page_size;
        }
        Self { client, options }
    }

    pub fn bucket(&self) -> &str {
        self.client.bucket()
    }

    pub fn options(&self) -> &FsOptions {
        &self.options
    }

    pub fn client(&self) -> &ObjectClient<B> {
        &self.client
    }

    /// Open a file or a directory, whichever `path` turns out to be.
    pub async fn open(&self, path: &str) -> Result<Node<B>> {
        let key = ObjectKey::parse(path).with_path("open", path)?;
        let info = resolve(&self.client, &key).await.with_path("open", path)?;
        Ok(self.node(key, info))
    }

    pub async fn stat(&self, path: &str) -> Result<FileInfo> {
        let key = ObjectKey::parse(path).with_path("stat", path)?;
        resolve(&self.client, &key).await.with_path("stat", path)
    }

    /// Open a directory; fails with `NotADirectory` when `path` is a file.
    pub async fn open_dir(&self, path: &str) -> Result<DirHandle<B>> {
        self.dir_handle("opendir", path).await
    }

    /// List the entries of a directory. `None` lists everything, `Some(n)`
    /// at most `n` entries.
    pub async fn read_dir(&self, path: &str, n: Option<usize>) -> Result<Vec<FileInfo>> {
        let mut dir = self.dir_handle("readdir", path).await?;
        dir.read_dir(n).await
    }

    /// Read a whole file.
    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let node = self.open(path).await?;
        let Node::File(mut file) = node else {
            return Err(PathError::new("read", path, FsError::IsADirectory));
        };
        let mut out = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut out).await?;
        Ok(out)
    }

    /// Store `data` at `path`, replacing any existing object. The content
    /// type is sniffed from the leading bytes.
    pub async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let key = ObjectKey::parse_object(path).with_path("write", path)?;
        let content_type = detect_content_type(data);
        self.client
            .put_object(key.as_str(), data, Some(content_type.as_ref()))
            .await
            .with_path("write", path)
    }

    /// Move an object by copying it and deleting the source.
    ///
    /// Not atomic. If the copy fails nothing changed. If the delete fails the
    /// data lives under both keys and `FsError::PartialRename` is returned;
    /// nothing is rolled back.
    ///
    /// Renaming a key onto itself leaves the object alone, but the object
    /// must exist: a missing key or a bare directory prefix is `NotExist`.
    pub async fn rename(&self, old: &str, new: &str) -> Result<()> {
        let src = ObjectKey::parse_object(old).with_path("rename", old)?;
        let dst = ObjectKey::parse_object(new).with_path("rename", new)?;
        if src == dst {
            return match self.client.head_object(src.as_str()).await {
                Ok(_) => Ok(()),
                Err(err) if classify(&err) == ErrorKind::NotFound => {
                    Err(PathError::new("rename", old, FsError::NotExist))
                }
                Err(err) => Err(PathError::new("rename", old, err.into())),
            };
        }

        self.client
            .copy_object(src.as_str(), dst.as_str())
            .await
            .with_path("rename", old)?;

        if let Err(err) = self.client.delete_object(src.as_str()).await {
            tracing::warn!(
                bucket = self.bucket(),
                src = %src,
                dst = %dst,
                error = %err,
                "rename copied the object but could not delete the source"
            );
            return Err(PathError::new(
                "rename",
                old,
                FsError::PartialRename {
                    dest: dst.to_string(),
                    source: err,
                },
            ));
        }
        Ok(())
    }

    /// Directories are implied by keys, so there is nothing to create.
    pub async fn mkdir_all(&self, path: &str) -> Result<()> {
        ObjectKey::parse(path).with_path("mkdir", path)?;
        Ok(())
    }

    fn node(&self, key: ObjectKey, info: FileInfo) -> Node<B> {
        if info.is_dir() {
            Node::Dir(DirHandle::new(
                self.client.clone(),
                key,
                info,
                self.options.list_page_size,
            ))
        } else {
            Node::File(FileHandle::new(
                self.client.clone(),
                key,
                info.size(),
                self.options.seek_mode,
            ))
        }
    }

    async fn dir_handle(&self, op: &'static str, path: &str) -> Result<DirHandle<B>> {
        let key = ObjectKey::parse(path).with_path(op, path)?;
        let info = resolve(&self.client, &key).await.with_path(op, path)?;
        match self.node(key, info) {
            Node::Dir(dir) => Ok(dir),
            Node::File(_) => Err(PathError::new(op, path, FsError::NotADirectory)),
        }
    }
}
