use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::upload::cos_auth::{sign_request, CosCredentials};
use crate::upload::cos_client::{
    encode_key, BucketSummary, CosClient, DeleteError, DeleteObjectsOutput, ListObjectsPage,
    ListObjectsRequest, ObjectSummary, Owner,
};
use crate::upload::{BodyReader, GetOptions, PutOptions, UploadError};

const PROVIDER: &str = "cos";

// ============================================================================
// XML 响应
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    contents: Vec<ObjectContent>,
    #[serde(default)]
    common_prefixes: Vec<CommonPrefix>,
    #[serde(default)]
    is_truncated: bool,
    next_marker: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectContent {
    key: String,
    last_modified: Option<String>,
    #[serde(rename = "ETag")]
    etag: Option<String>,
    #[serde(default)]
    size: u64,
    owner: Option<Owner>,
    storage_class: Option<String>,
    storage_tier: Option<String>,
    restore_status: Option<String>,
    version_id: Option<String>,
    part_number: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CommonPrefix {
    #[serde(default)]
    prefix: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListAllMyBucketsResult {
    buckets: Option<BucketList>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BucketList {
    #[serde(default)]
    bucket: Vec<BucketEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BucketEntry {
    name: String,
    location: Option<String>,
    creation_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteResult {
    #[serde(default)]
    deleted: Vec<DeletedEntry>,
    #[serde(default)]
    error: Vec<DeleteErrorEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeletedEntry {
    key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteErrorEntry {
    key: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    request_id: Option<String>,
}

fn parse_time(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))
}

impl From<ObjectContent> for ObjectSummary {
    fn from(content: ObjectContent) -> Self {
        ObjectSummary {
            last_modified: parse_time(content.last_modified),
            etag: content.etag.map(|e| e.trim_matches('"').to_string()),
            key: content.key,
            size: content.size,
            owner: content.owner,
            storage_class: content.storage_class,
            storage_tier: content.storage_tier,
            restore_status: content.restore_status,
            version_id: content.version_id,
            part_number: content.part_number,
        }
    }
}

fn delete_request_body(keys: &[String]) -> String {
    let mut body = String::from("<Delete><Quiet>false</Quiet>");
    for key in keys {
        body.push_str("<Object><Key>");
        body.push_str(&quick_xml::escape::escape(key.as_str()));
        body.push_str("</Key></Object>");
    }
    body.push_str("</Delete>");
    body
}

// ============================================================================
// HTTP 客户端
// ============================================================================

/// 基于 XML API 的 COS 客户端
///
/// 每个请求先构建出 `reqwest::Request`，签名后再发送，签名覆盖最终的 URL 和头部。
pub struct CosHttpClient {
    http: reqwest::Client,
    bucket_url: String,
    service_url: String,
    credentials: CosCredentials,
    sign_expire_secs: u64,
}

impl CosHttpClient {
    /// `bucket_url` 形如 `https://<bucket>.cos.<region>.myqcloud.com`，
    /// `service_url` 形如 `https://cos.<region>.myqcloud.com`
    pub fn new(
        bucket_url: impl Into<String>,
        service_url: impl Into<String>,
        credentials: CosCredentials,
        sign_expire_secs: u64,
    ) -> Result<Self, UploadError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| UploadError::Configuration(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            http,
            bucket_url: bucket_url.into().trim_end_matches('/').to_string(),
            service_url: service_url.into().trim_end_matches('/').to_string(),
            credentials,
            sign_expire_secs,
        })
    }

    pub fn bucket_url(&self) -> &str {
        &self.bucket_url
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.bucket_url, encode_key(key))
    }

    /// 签名并发送，非 2xx 响应转换为错误
    async fn execute(
        &self,
        builder: RequestBuilder,
        op: &str,
        key: &str,
    ) -> Result<Response, UploadError> {
        let resp = self.send(builder, op).await?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        Err(service_error(resp, key).await)
    }

    async fn send(&self, builder: RequestBuilder, op: &str) -> Result<Response, UploadError> {
        let mut request = builder
            .build()
            .map_err(|e| UploadError::from_provider(e, PROVIDER, op))?;
        sign_request(&self.credentials, &mut request, self.sign_expire_secs)?;
        self.http
            .execute(request)
            .await
            .map_err(|e| UploadError::from_provider(e, PROVIDER, op))
    }

    fn apply_put_options(builder: RequestBuilder, options: &PutOptions) -> RequestBuilder {
        let mut builder = builder;
        if let Some(ref content_type) = options.content_type {
            builder = builder.header("content-type", content_type);
        }
        if let Some(ref storage_class) = options.storage_class {
            builder = builder.header("x-cos-storage-class", storage_class);
        }
        if let Some(ref metadata) = options.metadata {
            for (k, v) in metadata {
                builder = builder.header(format!("x-cos-meta-{}", k), v);
            }
        }
        builder
    }

    /// 流式请求体，`sent` 累计已读出的字节数
    fn stream_body(
        builder: RequestBuilder,
        body: BodyReader,
        options: &PutOptions,
        sent: Arc<AtomicU64>,
    ) -> RequestBuilder {
        let stream = ReaderStream::new(body).inspect_ok(move |chunk| {
            sent.fetch_add(chunk.len() as u64, Ordering::Relaxed);
        });
        let builder = match options.content_length {
            Some(length) => builder.header("content-length", length),
            None => builder,
        };
        builder.body(reqwest::Body::wrap_stream(stream))
    }

    fn get_request(&self, key: &str, options: &GetOptions) -> Result<RequestBuilder, UploadError> {
        let mut builder = self.http.request(Method::GET, &self.object_url(key));
        if let Some(ref version_id) = options.version_id {
            builder = builder.query(&[("versionId", version_id)]);
        }
        if let Some(ref range) = options.range {
            if range.end <= range.start {
                return Err(UploadError::InvalidInput(format!(
                    "无效的范围: {}..{}",
                    range.start, range.end
                )));
            }
            builder = builder.header("range", format!("bytes={}-{}", range.start, range.end - 1));
        }
        Ok(builder)
    }
}

async fn service_error(resp: Response, key: &str) -> UploadError {
    let status = resp.status();
    let header_request_id = resp
        .headers()
        .get("x-cos-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = resp.text().await.unwrap_or_default();
    let parsed: ErrorResponse = quick_xml::de::from_str(&body).unwrap_or_default();

    if status == StatusCode::NOT_FOUND && (parsed.code.is_empty() || parsed.code == "NoSuchKey") {
        return UploadError::NotFound {
            key: key.to_string(),
        };
    }

    UploadError::Service {
        status: status.as_u16(),
        code: if parsed.code.is_empty() {
            status.canonical_reason().unwrap_or("Unknown").to_string()
        } else {
            parsed.code
        },
        message: parsed.message,
        request_id: parsed.request_id.or(header_request_id),
    }
}

#[async_trait]
impl CosClient for CosHttpClient {
    async fn list_buckets(&self) -> Result<Vec<BucketSummary>, UploadError> {
        let url = format!("{}/", self.service_url);
        let resp = self.execute(self.http.request(Method::GET, &url), "list_buckets", "").await?;
        let body = resp
            .text()
            .await
            .map_err(|e| UploadError::from_provider(e, PROVIDER, "list_buckets"))?;
        let result: ListAllMyBucketsResult = quick_xml::de::from_str(&body)
            .map_err(|e| UploadError::from_provider(e, PROVIDER, "list_buckets"))?;

        Ok(result
            .buckets
            .unwrap_or_default()
            .bucket
            .into_iter()
            .map(|b| BucketSummary {
                name: b.name,
                location: b.location,
                creation_date: b.creation_date,
            })
            .collect())
    }

    async fn list_objects(&self, request: &ListObjectsRequest) -> Result<ListObjectsPage, UploadError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if !request.prefix.is_empty() {
            query.push(("prefix", request.prefix.clone()));
        }
        if let Some(ref delimiter) = request.delimiter {
            query.push(("delimiter", delimiter.clone()));
        }
        if !request.marker.is_empty() {
            query.push(("marker", request.marker.clone()));
        }
        if request.max_keys > 0 {
            query.push(("max-keys", request.max_keys.to_string()));
        }

        let url = format!("{}/", self.bucket_url);
        let builder = self.http.request(Method::GET, &url).query(&query);
        let resp = self.execute(builder, "list_objects", &request.prefix).await?;
        let body = resp
            .text()
            .await
            .map_err(|e| UploadError::from_provider(e, PROVIDER, "list_objects"))?;
        let result: ListBucketResult = quick_xml::de::from_str(&body)
            .map_err(|e| UploadError::from_provider(e, PROVIDER, "list_objects"))?;

        Ok(ListObjectsPage {
            contents: result.contents.into_iter().map(ObjectSummary::from).collect(),
            common_prefixes: result.common_prefixes.into_iter().map(|p| p.prefix).collect(),
            is_truncated: result.is_truncated,
            next_marker: result.next_marker.filter(|m| !m.is_empty()),
        })
    }

    async fn get_object(&self, key: &str, options: &GetOptions) -> Result<Bytes, UploadError> {
        let builder = self.get_request(key, options)?;
        let resp = self.execute(builder, "get_object", key).await?;
        resp.bytes()
            .await
            .map_err(|e| UploadError::from_provider(e, PROVIDER, "get_object"))
    }

    async fn get_stream(
        &self,
        key: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
        options: &GetOptions,
    ) -> Result<u64, UploadError> {
        let builder = self.get_request(key, options)?;
        let mut resp = self.execute(builder, "get_stream", key).await?;

        let mut written = 0u64;
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| UploadError::from_provider(e, PROVIDER, "get_stream"))?
        {
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        writer.flush().await?;
        Ok(written)
    }

    async fn put_object(&self, key: &str, body: BodyReader, options: &PutOptions) -> Result<(), UploadError> {
        let builder = self.http.request(Method::PUT, &self.object_url(key));
        let builder = Self::apply_put_options(builder, options);
        let builder = Self::stream_body(builder, body, options, Arc::new(AtomicU64::new(0)));
        self.execute(builder, "put_object", key).await?;
        Ok(())
    }

    async fn append_object(
        &self,
        key: &str,
        position: u64,
        body: BodyReader,
        options: &PutOptions,
    ) -> Result<u64, UploadError> {
        let url = format!("{}?append&position={}", self.object_url(key), position);
        let sent = Arc::new(AtomicU64::new(0));
        let builder = Self::apply_put_options(self.http.request(Method::POST, &url), options);
        let builder = Self::stream_body(builder, body, options, sent.clone());
        let resp = self.execute(builder, "append_object", key).await?;

        let next = resp
            .headers()
            .get("x-cos-next-append-position")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or_else(|| position + sent.load(Ordering::Relaxed));
        Ok(next)
    }

    async fn delete_object(&self, key: &str, version_id: Option<&str>) -> Result<(), UploadError> {
        let mut builder = self.http.request(Method::DELETE, &self.object_url(key));
        if let Some(version_id) = version_id {
            builder = builder.query(&[("versionId", version_id)]);
        }
        self.execute(builder, "delete_object", key).await?;
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<DeleteObjectsOutput, UploadError> {
        if keys.is_empty() {
            return Ok(DeleteObjectsOutput::default());
        }

        let body = delete_request_body(keys);
        let md5 = STANDARD.encode(md5::compute(body.as_bytes()).0);
        let url = format!("{}/?delete", self.bucket_url);
        let builder = self
            .http
            .request(Method::POST, &url)
            .header("content-type", "application/xml")
            .header("content-md5", md5)
            .body(body);
        let resp = self.execute(builder, "delete_objects", "").await?;
        let text = resp
            .text()
            .await
            .map_err(|e| UploadError::from_provider(e, PROVIDER, "delete_objects"))?;
        let result: DeleteResult = quick_xml::de::from_str(&text)
            .map_err(|e| UploadError::from_provider(e, PROVIDER, "delete_objects"))?;

        Ok(DeleteObjectsOutput {
            deleted: result.deleted.into_iter().map(|d| d.key).collect(),
            errors: result
                .error
                .into_iter()
                .map(|e| DeleteError {
                    key: e.key,
                    code: e.code,
                    message: e.message,
                })
                .collect(),
        })
    }

    async fn head_object(&self, key: &str, version_id: Option<&str>) -> Result<bool, UploadError> {
        let mut builder = self.http.request(Method::HEAD, &self.object_url(key));
        if let Some(version_id) = version_id {
            builder = builder.query(&[("versionId", version_id)]);
        }
        let resp = self.send(builder, "head_object").await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if resp.status().is_success() {
            return Ok(true);
        }
        Err(service_error(resp, key).await)
    }

    async fn copy_object(&self, dest: &str, source_url: &str) -> Result<(), UploadError> {
        let builder = self
            .http
            .request(Method::PUT, &self.object_url(dest))
            .header("x-cos-copy-source", source_url);
        let resp = self.execute(builder, "copy_object", dest).await?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| UploadError::from_provider(e, PROVIDER, "copy_object"))?;

        // 复制可能返回 200 但响应体是错误
        if body.contains("<Error>") {
            let parsed: ErrorResponse = quick_xml::de::from_str(&body).unwrap_or_default();
            return Err(UploadError::Service {
                status: status.as_u16(),
                code: parsed.code,
                message: parsed.message,
                request_id: parsed.request_id,
            });
        }
        Ok(())
    }
}
