//! In-memory bucket: a sorted map behind the `ObjectBackend` contract.
//!
//! Counts every call per primitive and can be told to fail a primitive, so
//! tests can assert how many round trips an operation costs and how it
//! behaves when a step breaks half way.

use crate::cadapter::client::{
    BackendError, ByteRange, ListPage, ListRequest, ObjectBackend, ObjectInfo, ObjectMeta,
    paginate,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Backend primitive, used to count calls and target injected failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    Head,
    Put,
    Delete,
    Copy,
    List,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub last_modified: DateTime<Utc>,
}

pub struct InMemoryBackend {
    bucket: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    calls: Mutex<HashMap<Op, usize>>,
    failures: Mutex<HashMap<Op, String>>,
    not_found_code: Option<String>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new("memory")
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryBackend {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(BTreeMap::new()),
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            not_found_code: None,
        }
    }

    /// Report missing keys as a plain service error with `code` instead of
    /// the structured `NoSuchKey`, the way some S3 emulators do.
    pub fn with_not_found_code(mut self, code: impl Into<String>) -> Self {
        self.not_found_code = Some(code.into());
        self
    }

    /// Seed an object without going through (or counting) `put_object`.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        let object = StoredObject {
            data: data.into(),
            content_type: None,
            last_modified: Utc::now(),
        };
        self.write_objects().insert(key.into(), object);
    }

    /// Drop an object behind the filesystem's back, without counting a call.
    pub fn remove(&self, key: &str) -> Option<StoredObject> {
        self.write_objects().remove(key)
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.read_objects().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.read_objects().keys().cloned().collect()
    }

    pub fn calls(&self, op: Op) -> usize {
        lock(&self.calls).get(&op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }

    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Make every following call of `op` fail with service error `code`.
    pub fn fail(&self, op: Op, code: impl Into<String>) {
        lock(&self.failures).insert(op, code.into());
    }

    pub fn clear_failure(&self, op: Op) {
        lock(&self.failures).remove(&op);
    }

    fn record(&self, op: Op) -> Result<(), BackendError> {
        *lock(&self.calls).entry(op).or_insert(0) += 1;
        match lock(&self.failures).get(&op) {
            Some(code) => Err(BackendError::service(
                code.clone(),
                format!("injected {op:?} failure"),
            )),
            None => Ok(()),
        }
    }

    fn missing(&self, key: &str) -> BackendError {
        match &self.not_found_code {
            Some(code) => BackendError::service(code.clone(), format!("{key} not found")),
            None => BackendError::no_such_key(key),
        }
    }

    fn read_objects(&self) -> RwLockReadGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_objects(&self) -> RwLockWriteGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Slice `data` by an inclusive range, clamping the end like S3 does.
pub(crate) fn slice_range(data: &Bytes, range: ByteRange) -> Result<Bytes, BackendError> {
    let len = data.len() as u64;
    if range.start >= len {
        return Err(BackendError::service(
            "InvalidRange",
            format!("range {range} not satisfiable for object of {len} bytes"),
        ));
    }
    let end = range.end.min(len - 1);
    Ok(data.slice(range.start as usize..=end as usize))
}

#[async_trait]
impl ObjectBackend for InMemoryBackend {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get_object(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> Result<Bytes, BackendError> {
        self.record(Op::Get)?;
        let data = match self.read_objects().get(key) {
            Some(object) => object.data.clone(),
            None => return Err(self.missing(key)),
        };
        match range {
            Some(range) => slice_range(&data, range),
            None => Ok(data),
        }
    }

    async fn head_object(&self, key: &str) -> Result<ObjectMeta, BackendError> {
        self.record(Op::Head)?;
        self.read_objects()
            .get(key)
            .map(|object| ObjectMeta {
                size: object.data.len() as u64,
                last_modified: Some(object.last_modified),
                content_type: object.content_type.clone(),
                etag: None,
            })
            .ok_or_else(|| self.missing(key))
    }

    async fn put_object(
        &self,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), BackendError> {
        self.record(Op::Put)?;
        let object = StoredObject {
            data: Bytes::copy_from_slice(data),
            content_type: content_type.map(str::to_string),
            last_modified: Utc::now(),
        };
        self.write_objects().insert(key.to_string(), object);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), BackendError> {
        self.record(Op::Delete)?;
        self.write_objects().remove(key);
        Ok(())
    }

    async fn copy_object(&self, src_key: &str, dst_key: &str) -> Result<(), BackendError> {
        self.record(Op::Copy)?;
        let mut objects = self.write_objects();
        let mut object = match objects.get(src_key) {
            Some(object) => object.clone(),
            None => return Err(self.missing(src_key)),
        };
        object.last_modified = Utc::now();
        objects.insert(dst_key.to_string(), object);
        Ok(())
    }

    async fn list_objects(&self, req: &ListRequest) -> Result<ListPage, BackendError> {
        self.record(Op::List)?;
        let objects = self.read_objects();
        let listed = objects
            .range(req.prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&req.prefix))
            .map(|(key, object)| ObjectInfo {
                key: key.clone(),
                size: object.data.len() as u64,
                last_modified: Some(object.last_modified),
            });
        Ok(paginate(listed, req))
    }
}
