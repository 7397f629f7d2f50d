use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;

use crate::upload::{BodyReader, GetOptions, PutOptions, UploadError};

/// 单次列举请求返回的最大条目数上限
pub const MAX_LIST_KEYS: usize = 1000;

/// 对象 key 按路径片段做 URL 编码，保留 `/`
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// 存储桶摘要（GET Service）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSummary {
    pub name: String,
    pub location: Option<String>,
    pub creation_date: Option<String>,
}

/// 对象拥有者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "DisplayName", default)]
    pub display_name: String,
}

/// 列举结果中的单个对象
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub owner: Option<Owner>,
    pub storage_class: Option<String>,
    pub storage_tier: Option<String>,
    pub restore_status: Option<String>,
    pub version_id: Option<String>,
    pub part_number: Option<u32>,
}

/// 列举请求（GET Bucket）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsRequest {
    pub prefix: String,
    pub delimiter: Option<String>,
    /// 从大于该 key 的位置开始列举
    pub marker: String,
    /// 0 表示使用服务端默认值 1000
    pub max_keys: usize,
}

/// 列举结果的一页
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsPage {
    pub contents: Vec<ObjectSummary>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_marker: Option<String>,
}

impl ListObjectsPage {
    /// 本页最后一个条目（对象或公共前缀）的 key，用于缺少 NextMarker 时续列
    pub fn last_key(&self) -> Option<&str> {
        let last_content = self.contents.last().map(|c| c.key.as_str());
        let last_prefix = self.common_prefixes.last().map(String::as_str);
        match (last_content, last_prefix) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// 续列所用的 marker
    pub fn resume_marker(&self) -> Option<String> {
        self.next_marker
            .clone()
            .filter(|m| !m.is_empty())
            .or_else(|| self.last_key().map(str::to_string))
    }
}

/// 批量删除结果中的失败项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteError {
    pub key: String,
    pub code: String,
    pub message: String,
}

/// 批量删除结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteObjectsOutput {
    pub deleted: Vec<String>,
    pub errors: Vec<DeleteError>,
}

/// 绑定到单个存储桶的 COS 客户端
///
/// 负责鉴权、签名和传输；上层的分页、树形和递归逻辑都在 `CosUploader` 中。
#[async_trait]
pub trait CosClient: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<BucketSummary>, UploadError>;

    async fn list_objects(&self, request: &ListObjectsRequest) -> Result<ListObjectsPage, UploadError>;

    async fn get_object(&self, key: &str, options: &GetOptions) -> Result<Bytes, UploadError>;

    /// 将对象内容写入 writer，返回写入的字节数
    async fn get_stream(
        &self,
        key: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
        options: &GetOptions,
    ) -> Result<u64, UploadError>;

    /// 流式上传，`options.content_length` 已知时作为请求长度
    async fn put_object(&self, key: &str, body: BodyReader, options: &PutOptions) -> Result<(), UploadError>;

    /// 追加上传，返回下一次追加的位置
    async fn append_object(
        &self,
        key: &str,
        position: u64,
        body: BodyReader,
        options: &PutOptions,
    ) -> Result<u64, UploadError>;

    async fn delete_object(&self, key: &str, version_id: Option<&str>) -> Result<(), UploadError>;

    /// 批量删除，单次最多 1000 个 key
    async fn delete_objects(&self, keys: &[String]) -> Result<DeleteObjectsOutput, UploadError>;

    async fn head_object(&self, key: &str, version_id: Option<&str>) -> Result<bool, UploadError>;

    /// 服务端复制，`source_url` 形如 `<bucket>.cos.<region>.myqcloud.com/<key>`
    async fn copy_object(&self, dest: &str, source_url: &str) -> Result<(), UploadError>;
}
