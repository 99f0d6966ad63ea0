//! Directory handles over delimiter listings.

use crate::cadapter::{ListPage, ListRequest, ObjectBackend, ObjectClient};
use crate::vfs::error::{FsError, PathError, Result};
use crate::vfs::path::{DELIMITER, ObjectKey};
use crate::vfs::stat::FileInfo;
use std::collections::VecDeque;

/// An open synthetic directory.
///
/// Entries are fetched lazily, one listing page at a time. Entries of a page
/// beyond what the caller asked for stay buffered until the next `read_dir`.
pub struct DirHandle<B: ObjectBackend> {
    client: ObjectClient<B>,
    key: ObjectKey,
    info: FileInfo,
    prefix: String,
    page_size: i32,
    buffered: VecDeque<FileInfo>,
    continuation: Option<String>,
    exhausted: bool,
}

impl<B: ObjectBackend> DirHandle<B> {
    pub(crate) fn new(
        client: ObjectClient<B>,
        key: ObjectKey,
        info: FileInfo,
        page_size: i32,
    ) -> Self {
        let prefix = key.dir_prefix();
        Self {
            client,
            key,
            info,
            prefix,
            page_size,
            buffered: VecDeque::new(),
            continuation: None,
            exhausted: false,
        }
    }

    pub fn path(&self) -> &str {
        self.key.as_str()
    }

    /// Snapshot taken when the directory was opened.
    pub fn stat(&self) -> FileInfo {
        self.info.clone()
    }

    /// True once the last page has been fetched and every entry handed out.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.buffered.is_empty()
    }

    /// Read the next entries.
    ///
    /// `None` returns everything that is left; `Some(n)` returns at most `n`
    /// entries. An exhausted handle returns an empty vector without asking
    /// the backend again.
    pub async fn read_dir(&mut self, n: Option<usize>) -> Result<Vec<FileInfo>> {
        let mut out = Vec::new();
        if n == Some(0) {
            return Ok(out);
        }

        loop {
            let take = match n {
                Some(n) => (n - out.len()).min(self.buffered.len()),
                None => self.buffered.len(),
            };
            out.extend(self.buffered.drain(..take));

            if self.exhausted || n.is_some_and(|n| out.len() >= n) {
                break;
            }
            if let Err(err) = self.fetch_page().await {
                // Hand the drained entries back so a retry sees them again.
                for entry in out.into_iter().rev() {
                    self.buffered.push_front(entry);
                }
                return Err(PathError::new("readdir", self.key.as_str(), err));
            }
        }
        Ok(out)
    }

    pub fn close(self) {}

    async fn fetch_page(&mut self) -> std::result::Result<(), FsError> {
        let req = ListRequest::new(self.prefix.clone())
            .delimiter(DELIMITER)
            .max_keys(self.page_size)
            .continuation_token(self.continuation.clone());
        let ListPage {
            common_prefixes,
            contents,
            next_continuation_token,
        } = self.client.list_objects(&req).await?;

        let dirs = common_prefixes.into_iter().filter_map(|p| {
            let info = FileInfo::dir(entry_name(&self.prefix, &p)?);
            Some((p, info))
        });
        let files = contents.into_iter().filter_map(|o| {
            let info = FileInfo::file(entry_name(&self.prefix, &o.key)?, o.size, o.last_modified);
            Some((o.key, info))
        });
        let mut entries: Vec<_> = dirs.chain(files).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        tracing::trace!(
            dir = %self.key,
            entries = entries.len(),
            more = next_continuation_token.is_some(),
            "listed page"
        );
        self.buffered.extend(entries.into_iter().map(|(_, info)| info));
        self.exhausted = next_continuation_token.is_none();
        self.continuation = next_continuation_token;
        Ok(())
    }
}

/// Name of a listed key relative to `prefix`; `None` for the folder marker
/// (key == prefix) and other empty names.
fn entry_name(prefix: &str, key: &str) -> Option<String> {
    let rest = key.strip_prefix(prefix)?;
    let name = rest.strip_suffix(DELIMITER).unwrap_or(rest);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
