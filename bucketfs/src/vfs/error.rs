//! Error taxonomy of the filesystem view.
//!
//! Backend failures are classified into a small set of kinds so callers never
//! need to know which object store produced them. Every public operation
//! reports a `PathError` naming the operation and the path.

use crate::cadapter::BackendError;
use std::error::Error as StdError;
use std::{fmt, io};
use thiserror::Error;

/// Service codes that mean "no such key" for backends which do not report
/// the condition structurally (e.g. LocalStack answers `NotFound`).
pub const NOT_FOUND_CODES: &[&str] = &["NoSuchKey", "NotFound"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The path failed validation; nothing was sent to the backend.
    Invalid,
    /// Neither an object nor a directory prefix exists at the path.
    NotFound,
    /// A directory operation hit a file.
    NotADirectory,
    /// Any other backend or network failure.
    Other,
}

pub fn is_not_found_code(code: &str) -> bool {
    NOT_FOUND_CODES.contains(&code)
}

/// Classify a backend failure. Both the structured variant and the code
/// table are consulted.
pub fn classify(err: &BackendError) -> ErrorKind {
    match err {
        BackendError::NoSuchKey { .. } => ErrorKind::NotFound,
        BackendError::Service { code, .. } if is_not_found_code(code) => ErrorKind::NotFound,
        _ => ErrorKind::Other,
    }
}

#[derive(Debug, Error)]
pub enum FsError {
    #[error("invalid argument")]
    Invalid,

    #[error("file does not exist")]
    NotExist,

    #[error("not a directory")]
    NotADirectory,

    #[error("is a directory")]
    IsADirectory,

    #[error("object changed since open: now {size} bytes, position {position} is past the end")]
    Stale { size: u64, position: u64 },

    #[error("copied to {dest} but the source could not be deleted; both keys hold the data")]
    PartialRename {
        dest: String,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl FsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::Invalid | FsError::IsADirectory => ErrorKind::Invalid,
            FsError::NotExist => ErrorKind::NotFound,
            FsError::NotADirectory => ErrorKind::NotADirectory,
            FsError::Stale { .. } | FsError::PartialRename { .. } => ErrorKind::Other,
            FsError::Backend(err) => classify(err),
        }
    }

    /// Underlying backend failure, if this error came from the backend.
    pub fn backend(&self) -> Option<&BackendError> {
        match self {
            FsError::Backend(err) | FsError::PartialRename { source: err, .. } => Some(err),
            _ => None,
        }
    }
}

/// An `FsError` tagged with the operation and path that produced it.
///
/// The message already ends with the cause, so `source()` continues with
/// what the cause wraps and chain printers show each message once.
#[derive(Debug)]
pub struct PathError {
    pub op: &'static str,
    pub path: String,
    pub source: FsError,
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.op, self.path, self.source)
    }
}

impl StdError for PathError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.source()
    }
}

impl PathError {
    pub fn new(op: &'static str, path: impl Into<String>, source: FsError) -> Self {
        Self {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<PathError> for io::Error {
    fn from(err: PathError) -> Self {
        let kind = match err.kind() {
            ErrorKind::Invalid => io::ErrorKind::InvalidInput,
            ErrorKind::NotFound => io::ErrorKind::NotFound,
            ErrorKind::NotADirectory => io::ErrorKind::NotADirectory,
            ErrorKind::Other => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

pub type Result<T, E = PathError> = std::result::Result<T, E>;

/// Attach operation and path to an internal result.
pub(crate) trait PathContext<T> {
    fn with_path(self, op: &'static str, path: &str) -> Result<T>;
}

impl<T, E: Into<FsError>> PathContext<T> for std::result::Result<T, E> {
    fn with_path(self, op: &'static str, path: &str) -> Result<T> {
        self.map_err(|e| PathError::new(op, path, e.into()))
    }
}
