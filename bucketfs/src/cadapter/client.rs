//! High-level client API for the object store
//!
//! `ObjectBackend` is implemented once per store flavour. `ObjectClient` is
//! what the filesystem layer holds: a cheap, clonable handle that shares one
//! backend and logs every remote call.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Max keys used by S3 when a request does not ask for a page size.
pub const DEFAULT_MAX_KEYS: i32 = 1000;

/// Failure reported by a backend primitive.
///
/// Backends report a missing key either structurally (`NoSuchKey`) or, when
/// they only speak error codes, as a `Service` error carrying the code.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no such key: {key}")]
    NoSuchKey { key: String },

    #[error("service error {code}: {message}")]
    Service {
        code: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
}

impl BackendError {
    pub fn no_such_key(key: impl Into<String>) -> Self {
        BackendError::NoSuchKey { key: key.into() }
    }

    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        BackendError::Service {
            code: code.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn transport(err: impl Into<BoxError>) -> Self {
        BackendError::Transport(err.into())
    }

    /// Service error code, if the backend returned one.
    pub fn code(&self) -> Option<&str> {
        match self {
            BackendError::NoSuchKey { .. } => Some("NoSuchKey"),
            BackendError::Service { code, .. } => Some(code),
            BackendError::Transport(_) => None,
        }
    }
}

/// Inclusive byte range, rendered as an HTTP `Range` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Range covering `len` bytes from `start`. `len` must be non-zero.
    pub fn new(start: u64, len: u64) -> Self {
        debug_assert!(len > 0, "empty byte range");
        Self {
            start,
            end: start + len - 1,
        }
    }

    pub fn to_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Metadata returned by a head request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// One content entry of a listing page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListRequest {
    pub prefix: String,
    pub delimiter: Option<String>,
    pub max_keys: i32,
    pub continuation_token: Option<String>,
}

impl ListRequest {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: None,
            max_keys: DEFAULT_MAX_KEYS,
            continuation_token: None,
        }
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn max_keys(mut self, max_keys: i32) -> Self {
        self.max_keys = max_keys;
        self
    }

    pub fn continuation_token(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }
}

/// One page of a prefix listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Prefixes ending in the delimiter, each standing for every key below it.
    pub common_prefixes: Vec<String>,
    /// Keys directly under the requested prefix.
    pub contents: Vec<ObjectInfo>,
    /// Present while more pages remain.
    pub next_continuation_token: Option<String>,
}

impl ListPage {
    pub fn is_empty(&self) -> bool {
        self.common_prefixes.is_empty() && self.contents.is_empty()
    }
}

/// The primitives an object store must offer to back a filesystem view.
///
/// A backend is bound to a single bucket. Implementations must be safe to
/// call concurrently.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Bucket this backend is bound to, for diagnostics.
    fn bucket(&self) -> &str;

    /// Fetch an object, or only `range` of it. A range running past the end
    /// of the object is clamped to the object size.
    async fn get_object(&self, key: &str, range: Option<ByteRange>)
    -> Result<Bytes, BackendError>;

    async fn head_object(&self, key: &str) -> Result<ObjectMeta, BackendError>;

    async fn put_object(
        &self,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), BackendError>;

    async fn delete_object(&self, key: &str) -> Result<(), BackendError>;

    async fn copy_object(&self, src_key: &str, dst_key: &str) -> Result<(), BackendError>;

    async fn list_objects(&self, req: &ListRequest) -> Result<ListPage, BackendError>;
}

/// Shared handle over a backend.
pub struct ObjectClient<B: ObjectBackend> {
    backend: Arc<B>,
}

impl<B: ObjectBackend> Clone for ObjectClient<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: ObjectBackend> ObjectClient<B> {
    pub fn new(backend: B) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    pub fn from_arc(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn bucket(&self) -> &str {
        self.backend.bucket()
    }

    pub async fn get_object(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> Result<Bytes, BackendError> {
        tracing::debug!(bucket = self.bucket(), key, range = ?range, "get object");
        self.backend.get_object(key, range).await
    }

    pub async fn head_object(&self, key: &str) -> Result<ObjectMeta, BackendError> {
        tracing::debug!(bucket = self.bucket(), key, "head object");
        self.backend.head_object(key).await
    }

    pub async fn put_object(
        &self,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), BackendError> {
        tracing::debug!(
            bucket = self.bucket(),
            key,
            len = data.len(),
            content_type,
            "put object"
        );
        self.backend.put_object(key, data, content_type).await
    }

    pub async fn delete_object(&self, key: &str) -> Result<(), BackendError> {
        tracing::debug!(bucket = self.bucket(), key, "delete object");
        self.backend.delete_object(key).await
    }

    pub async fn copy_object(&self, src_key: &str, dst_key: &str) -> Result<(), BackendError> {
        tracing::debug!(bucket = self.bucket(), src_key, dst_key, "copy object");
        self.backend.copy_object(src_key, dst_key).await
    }

    pub async fn list_objects(&self, req: &ListRequest) -> Result<ListPage, BackendError> {
        tracing::debug!(
            bucket = self.bucket(),
            prefix = %req.prefix,
            delimiter = ?req.delimiter,
            max_keys = req.max_keys,
            token = ?req.continuation_token,
            "list objects"
        );
        self.backend.list_objects(req).await
    }
}

/// Apply S3 listing semantics to `objects`, which must be sorted by key.
///
/// Keys outside `req.prefix` are ignored. With a delimiter, every key that
/// has the delimiter after the prefix is folded into one common prefix.
/// Common prefixes and contents both count towards `max_keys`. The
/// continuation token is the last key or common prefix handed out; the next
/// page starts strictly after it.
pub fn paginate<I>(objects: I, req: &ListRequest) -> ListPage
where
    I: IntoIterator<Item = ObjectInfo>,
{
    let limit = usize::try_from(req.max_keys)
        .ok()
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_MAX_KEYS as usize);
    let delimiter = req.delimiter.as_deref().filter(|d| !d.is_empty());
    let after = req.continuation_token.as_deref();
    // A token that is a common prefix also covers every key below it.
    let after_prefix = after.filter(|token| {
        token.len() > req.prefix.len() && delimiter.is_some_and(|d| token.ends_with(d))
    });

    let mut page = ListPage::default();
    let mut emitted = 0usize;
    let mut last: Option<String> = None;

    for object in objects {
        if !object.key.starts_with(&req.prefix) {
            continue;
        }
        if after.is_some_and(|token| object.key.as_str() <= token)
            || after_prefix.is_some_and(|token| object.key.starts_with(token))
        {
            continue;
        }

        let rest = &object.key[req.prefix.len()..];
        let common = delimiter.and_then(|d| {
            rest.find(d)
                .map(|idx| object.key[..req.prefix.len() + idx + d.len()].to_string())
        });

        match common {
            Some(common) => {
                if last.as_deref() == Some(common.as_str()) {
                    continue;
                }
                if emitted == limit {
                    page.next_continuation_token = last;
                    break;
                }
                last = Some(common.clone());
                page.common_prefixes.push(common);
            }
            None => {
                if emitted == limit {
                    page.next_continuation_token = last;
                    break;
                }
                last = Some(object.key.clone());
                page.contents.push(object);
            }
        }
        emitted += 1;
    }

    page
}
