//! VFS layer (virtual filesystem)
//!
//! Maps the flat key space of a bucket onto a directory tree.
//!
//! Submodules:
//! - `path`: path validation and the root sentinel
//! - `error`: error kinds, backend error classification, `PathError`
//! - `stat`: resolving a path to a file, a synthetic directory, or nothing
//! - `dir`: paginated directory handles
//! - `file`: seekable file handles over ranged reads
//! - `sniff`: content type detection for writes
//! - `fs`: `BucketFs`, the entry point tying the above together
pub mod dir;
pub mod error;
pub mod file;
pub mod fs;
pub mod path;
pub mod sniff;
pub mod stat;

pub use dir::DirHandle;
pub use error::{ErrorKind, FsError, PathError, classify};
pub use file::{FileHandle, SeekMode};
pub use fs::{BucketFs, FsOptions, Node};
pub use path::ObjectKey;
pub use stat::{FileInfo, FileType};
