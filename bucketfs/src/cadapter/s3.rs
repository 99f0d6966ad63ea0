//! S3 适配器：基于 aws-sdk-s3 的 `ObjectBackend` 实现。
//!
//! 范围读取映射为带 `Range` 头的 `GetObject`，存在性检查映射为 `HeadObject`，
//! 列举映射为 `ListObjectsV2`。SDK 错误在本模块内转换为 `BackendError`，
//! 上层不接触 SDK 类型。

use crate::cadapter::client::{
    BackendError, ByteRange, ListPage, ListRequest, ObjectBackend, ObjectInfo, ObjectMeta,
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::copy_object::CopyObjectError;
use aws_sdk_s3::operation::delete_object::DeleteObjectError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Error;
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::primitives::{ByteStream, DateTime as S3DateTime};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::time::Duration;

/// Characters left as-is in a `CopySource` header.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// S3 后端配置选项
#[derive(Debug, Clone)]
pub struct S3Config {
    /// 区域；为空时使用环境/配置文件中的默认值
    pub region: Option<String>,
    /// 自定义 endpoint（MinIO、LocalStack 等兼容实现）
    pub endpoint: Option<String>,
    /// 使用 path-style 寻址（多数自建兼容实现需要）
    pub force_path_style: bool,
    /// SDK 层最大尝试次数（含首次请求）
    pub max_attempts: u32,
    /// 单次操作超时
    pub operation_timeout: Duration,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            force_path_style: false,
            max_attempts: 3,
            operation_timeout: Duration::from_secs(30),
        }
    }
}

pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    /// Bind an already configured client to `bucket`.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the default credential chain plus `config`.
    pub async fn from_config(bucket: impl Into<String>, config: &S3Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(RetryConfig::standard().with_max_attempts(config.max_attempts))
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(config.operation_timeout)
                    .build(),
            );
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;
        let conf = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.force_path_style)
            .build();
        Self::new(Client::from_conf(conf), bucket)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn md5_base64(data: &[u8]) -> String {
        let sum = md5::compute(data);
        B64.encode(sum.0)
    }

    fn copy_source(&self, key: &str) -> String {
        format!("{}/{}", self.bucket, utf8_percent_encode(key, COPY_SOURCE))
    }
}

/// Fold an SDK error into `BackendError`.
///
/// `missing` recognises the operation's typed "no such key" variant. When it
/// does not match, the service error code (if any) is kept so callers can
/// still recognise codes such as `NoSuchKey` or `NotFound`.
fn sdk_error<E, R>(
    err: SdkError<E, R>,
    key: &str,
    missing: impl FnOnce(&E) -> bool,
) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    if let Some(service) = err.as_service_error() {
        if missing(service) {
            return BackendError::no_such_key(key);
        }
        if let Some(code) = service.code() {
            let code = code.to_string();
            let message = service.message().unwrap_or_default().to_string();
            return BackendError::Service {
                code,
                message,
                source: Some(Box::new(err)),
            };
        }
    }
    BackendError::transport(err)
}

fn to_chrono(ts: &S3DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

fn to_size(len: Option<i64>) -> u64 {
    len.unwrap_or_default().max(0) as u64
}

#[async_trait]
impl ObjectBackend for S3Backend {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get_object(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> Result<Bytes, BackendError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_range(range.map(|r| r.to_header()))
            .send()
            .await
            .map_err(|e| sdk_error(e, key, GetObjectError::is_no_such_key))?;
        let body = resp
            .body
            .collect()
            .await
            .map_err(BackendError::transport)?;
        Ok(body.into_bytes())
    }

    async fn head_object(&self, key: &str) -> Result<ObjectMeta, BackendError> {
        let resp = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error(e, key, HeadObjectError::is_not_found))?;
        Ok(ObjectMeta {
            size: to_size(resp.content_length()),
            last_modified: resp.last_modified().and_then(to_chrono),
            content_type: resp.content_type().map(str::to_string),
            etag: resp.e_tag().map(str::to_string),
        })
    }

    async fn put_object(
        &self,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), BackendError> {
        let checksum = Self::md5_base64(data);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data.to_vec()))
            .content_md5(checksum)
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(|e| sdk_error(e, key, |_: &PutObjectError| false))?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), BackendError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error(e, key, |_: &DeleteObjectError| false))?;
        Ok(())
    }

    async fn copy_object(&self, src_key: &str, dst_key: &str) -> Result<(), BackendError> {
        // CopyObject has no typed "missing source" variant; the NoSuchKey
        // code survives in the service error.
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(dst_key)
            .copy_source(self.copy_source(src_key))
            .send()
            .await
            .map_err(|e| sdk_error(e, src_key, |_: &CopyObjectError| false))?;
        Ok(())
    }

    async fn list_objects(&self, req: &ListRequest) -> Result<ListPage, BackendError> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&req.prefix)
            .set_delimiter(req.delimiter.clone())
            .max_keys(req.max_keys)
            .set_continuation_token(req.continuation_token.clone())
            .send()
            .await
            .map_err(|e| sdk_error(e, &req.prefix, |_: &ListObjectsV2Error| false))?;

        let common_prefixes = resp
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();
        let contents = resp
            .contents()
            .iter()
            .filter_map(|o| {
                Some(ObjectInfo {
                    key: o.key()?.to_string(),
                    size: to_size(o.size()),
                    last_modified: o.last_modified().and_then(to_chrono),
                })
            })
            .collect();
        let next_continuation_token = if resp.is_truncated().unwrap_or(false) {
            resp.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            common_prefixes,
            contents,
            next_continuation_token,
        })
    }
}
