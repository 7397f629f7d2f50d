use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smart_default::SmartDefault;
use std::collections::HashMap;
use tokio::io::AsyncRead;

/// 参数包，承载各厂商特有的字段（owner、storageClass、etag ...）
pub type Params = HashMap<String, Value>;

/// 上传内容，按流读取，不会一次性载入内存
pub type BodyReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// 存储桶
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub driver: String,
    #[serde(default)]
    pub params: Params,
}

/// 条目类型：真实对象或由公共前缀合成的目录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Dir,
}

/// 列举得到的单个条目
///
/// `File` 条目带有 size / last_modified / file_ext，`Dir` 条目三者均为 `None`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketObject {
    pub id: String,
    pub path: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
    pub file_type: FileType,
    pub file_ext: Option<String>,
    #[serde(default)]
    pub params: Params,
}

impl BucketObject {
    /// 由公共前缀构造目录条目
    pub fn dir(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let mut params = Params::new();
        params.insert("filename".to_string(), Value::String(base_name(&prefix)));
        Self {
            id: prefix.clone(),
            path: prefix,
            last_modified: None,
            size: None,
            file_type: FileType::Dir,
            file_ext: None,
            params,
        }
    }

    /// 构造文件条目，`filename` 参数自动补齐
    pub fn file(
        key: impl Into<String>,
        size: u64,
        last_modified: Option<DateTime<Utc>>,
        mut params: Params,
    ) -> Self {
        let key = key.into();
        params.insert("filename".to_string(), Value::String(base_name(&key)));
        Self {
            id: key.clone(),
            file_ext: extension(&key),
            path: key,
            last_modified,
            size: Some(size),
            file_type: FileType::File,
            params,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Dir
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    pub fn filename(&self) -> Option<&str> {
        self.params.get("filename").and_then(Value::as_str)
    }
}

/// 树形列举的节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketTreeObject {
    #[serde(flatten)]
    pub object: BucketObject,
    #[serde(default)]
    pub children: Vec<BucketTreeObject>,
}

impl BucketTreeObject {
    pub fn leaf(object: BucketObject) -> Self {
        Self {
            object,
            children: Vec::new(),
        }
    }

    /// 子节点数量，未开启计数时为 0
    pub fn count(&self) -> u64 {
        self.object
            .params
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }
}

/// 单页列举结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPage {
    pub objects: Vec<BucketObject>,
    /// 续列游标，`None` 表示没有更多数据
    pub next_cursor: Option<String>,
    /// 列举途中请求失败，`objects` 只包含失败前的部分
    pub interrupted: bool,
}

/// 删除失败的对象或前缀
#[derive(Debug, Clone, PartialEq)]
pub struct FailedObject {
    pub key: String,
    pub error: String,
}

/// 批量/递归删除的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteReport {
    pub deleted: usize,
    pub failed: Vec<FailedObject>,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn record_failure(&mut self, key: impl Into<String>, error: impl ToString) {
        self.failed.push(FailedObject {
            key: key.into(),
            error: error.to_string(),
        });
    }

    pub fn merge(&mut self, other: DeleteReport) {
        self.deleted += other.deleted;
        self.failed.extend(other.failed);
    }
}

/// 下载选项
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// 字节范围，左闭右开
    pub range: Option<std::ops::Range<u64>>,
    pub version_id: Option<String>,
}

/// 上传选项
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
    /// 自定义元数据，以 `x-cos-meta-` 头发送
    pub metadata: Option<HashMap<String, String>>,
    /// 存储类型，如 STANDARD、STANDARD_IA、ARCHIVE
    pub storage_class: Option<String>,
    /// 内容长度，已知时以 `Content-Length` 发送，否则分块上传
    pub content_length: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    pub version_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ExistsOptions {
    pub version_id: Option<String>,
}

/// 单层列举选项
#[derive(Debug, Clone, SmartDefault)]
pub struct ListOptions {
    /// 上一次返回的游标，空字符串表示从头开始
    pub cursor: String,
    /// 最多返回的条目数，0 表示不限制
    #[default = 1000]
    pub limit: usize,
    /// 只返回目录
    pub exclude_files: bool,
}

/// 树形列举选项
#[derive(Debug, Clone, SmartDefault)]
pub struct TreeOptions {
    /// 只对最顶层生效
    pub cursor: String,
    /// 每次列举请求的页大小，0 按 1000 处理
    #[default = 1000]
    pub limit: usize,
    /// 当前深度，顶层调用一般为 0
    pub depth: usize,
    #[default = 1]
    pub max_depth: usize,
    /// 不输出文件节点，只保留目录结构
    pub exclude_leaves: bool,
    /// 为每个目录统计直接子条目数量
    pub count_children: bool,
}

/// 路径最后一个非空片段，与 `path.Base` 语义一致
pub fn base_name(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { ".".to_string() } else { "/".to_string() };
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed).to_string()
}

/// 最后一个片段中从最后一个 `.` 开始的后缀
pub fn extension(path: &str) -> Option<String> {
    let last = path.rsplit('/').next().unwrap_or(path);
    last.rfind('.').map(|idx| last[idx..].to_string())
}
