//! Path resolution: file, synthetic directory, or nothing.

use crate::cadapter::{ListRequest, ObjectBackend, ObjectClient};
use crate::vfs::error::{ErrorKind, FsError, classify};
use crate::vfs::path::{DELIMITER, ObjectKey, ROOT};
use chrono::{DateTime, Utc};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
    File,
    Dir,
}

/// Snapshot of a path, taken fresh on every resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    name: String,
    size: u64,
    kind: FileType,
    mod_time: Option<DateTime<Utc>>,
}

impl FileInfo {
    pub(crate) fn file(
        name: impl Into<String>,
        size: u64,
        mod_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            kind: FileType::File,
            mod_time,
        }
    }

    /// Directories are prefixes, not stored objects: no size, no timestamp.
    pub(crate) fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            kind: FileType::Dir,
            mod_time: None,
        }
    }

    /// Base name: the last path segment only.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn file_type(&self) -> FileType {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileType::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileType::File
    }

    /// Last modification time. `None` is the zero time, which is what every
    /// synthetic directory reports.
    pub fn mod_time(&self) -> Option<DateTime<Utc>> {
        self.mod_time
    }
}

/// Resolve `key` against the bucket.
///
/// The exact key is checked first and wins; only when it is missing is the
/// key probed as a directory prefix with a single-entry listing. Failures
/// other than "not found" abort resolution.
pub(crate) async fn resolve<B: ObjectBackend>(
    client: &ObjectClient<B>,
    key: &ObjectKey,
) -> Result<FileInfo, FsError> {
    if key.is_root() {
        return Ok(FileInfo::dir(ROOT));
    }

    match client.head_object(key.as_str()).await {
        Ok(meta) => {
            return Ok(FileInfo::file(
                key.base_name(),
                meta.size,
                meta.last_modified,
            ));
        }
        Err(err) if classify(&err) == ErrorKind::NotFound => {
            tracing::trace!(%key, "no object at key, probing as directory");
        }
        Err(err) => return Err(err.into()),
    }

    let probe = ListRequest::new(key.dir_prefix())
        .delimiter(DELIMITER)
        .max_keys(1);
    let page = client.list_objects(&probe).await?;
    if page.is_empty() {
        tracing::debug!(%key, "neither object nor prefix");
        return Err(FsError::NotExist);
    }
    Ok(FileInfo::dir(key.base_name()))
}
