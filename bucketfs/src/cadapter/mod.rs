//! Object store adapter (cAdapter)
//!
//! Submodules:
//! - `client`: the `ObjectBackend` contract and the `ObjectClient` wrapper used
//!   by the filesystem layer
//! - `s3`: S3-compatible adapter built on `aws-sdk-s3`
//! - `localfs`: local directory tree posing as a bucket
//! - `memory`: in-memory bucket with call accounting and fault injection
//!
//! The filesystem layer only depends on six primitives: ranged get, head,
//! put, delete, copy and paginated list-by-prefix-and-delimiter. Anything
//! that can serve those can back a `BucketFs`.
pub mod client;
pub mod localfs;
pub mod memory;
pub mod s3;

pub use client::{
    BackendError, BoxError, ByteRange, DEFAULT_MAX_KEYS, ListPage, ListRequest, ObjectBackend,
    ObjectClient, ObjectInfo, ObjectMeta,
};
