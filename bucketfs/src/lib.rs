//! A bucket in an object store, browsed and edited as a filesystem.
//!
//! ```no_run
//! use bucketfs::cadapter::localfs::LocalFsBackend;
//! use bucketfs::BucketFs;
//!
//! # async fn demo() -> Result<(), bucketfs::PathError> {
//! let fs = BucketFs::new(LocalFsBackend::new("/tmp/bucket"));
//! fs.write_file("notes/today.txt", b"hello").await?;
//! for entry in fs.read_dir("notes", None).await? {
//!     println!("{} {}", entry.name(), entry.size());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cadapter;
pub mod vfs;

pub use cadapter::{BackendError, ObjectBackend, ObjectClient};
pub use vfs::{
    BucketFs, DirHandle, ErrorKind, FileHandle, FileInfo, FileType, FsError, FsOptions, Node,
    PathError, SeekMode,
};
