use async_trait::async_trait;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smart_default::SmartDefault;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::log::{Logger, LoggerConfig, MetadataValue};
use crate::upload::cos_auth::CosCredentials;
use crate::upload::cos_client::{
    encode_key, CosClient, ListObjectsRequest, ObjectSummary, MAX_LIST_KEYS,
};
use crate::upload::cos_http_client::CosHttpClient;
use crate::upload::{
    BodyReader, Bucket, BucketObject, BucketTreeObject, DeleteOptions, DeleteReport, ExistsOptions,
    GetOptions, ListOptions, ListPage, Params, PutOptions, TreeOptions, UploadError, Uploader,
};

const DRIVER: &str = "cos";
const DELIMITER: &str = "/";

/// COS 上传器配置
///
/// 密钥获取顺序：
/// 1. `secret_id` + `secret_key`
/// 2. 环境变量 `TENCENTCLOUD_SECRET_ID` / `TENCENTCLOUD_SECRET_KEY`
/// 3. 环境变量 `COS_SECRET_ID` / `COS_SECRET_KEY`
#[derive(Deserialize, Serialize, SmartDefault, Clone, Validate)]
#[serde(default)]
pub struct CosUploaderConfig {
    /// 存储桶名称，形如 `examplebucket-1250000000`
    #[garde(length(min = 1))]
    pub bucket: String,

    #[garde(length(min = 1))]
    #[default = "ap-guangzhou"]
    pub region: String,

    #[garde(skip)]
    pub secret_id: Option<String>,

    #[garde(skip)]
    pub secret_key: Option<String>,

    #[garde(length(min = 1))]
    #[default = "myqcloud.com"]
    pub domain: String,

    /// 覆盖默认的存储桶地址 `https://<bucket>.cos.<region>.<domain>`
    #[garde(skip)]
    pub bucket_url: Option<String>,

    /// 覆盖默认的服务地址 `https://cos.<region>.<domain>`
    #[garde(skip)]
    pub service_url: Option<String>,

    /// 签名有效期（秒）
    #[garde(range(min = 1))]
    #[default = 3600]
    pub sign_expire_secs: u64,

    #[garde(skip)]
    pub logger: LoggerConfig,
}

impl CosUploaderConfig {
    fn credentials(&self) -> Result<CosCredentials, UploadError> {
        let configured = self
            .secret_id
            .clone()
            .zip(self.secret_key.clone())
            .filter(|(id, key)| !id.is_empty() && !key.is_empty());
        if let Some((id, key)) = configured {
            return Ok(CosCredentials::new(id, key));
        }

        let id_from_env = std::env::var("TENCENTCLOUD_SECRET_ID")
            .or_else(|_| std::env::var("COS_SECRET_ID"))
            .ok();
        let key_from_env = std::env::var("TENCENTCLOUD_SECRET_KEY")
            .or_else(|_| std::env::var("COS_SECRET_KEY"))
            .ok();
        if let (Some(id), Some(key)) = (id_from_env, key_from_env) {
            return Ok(CosCredentials::new(id, key));
        }

        Err(UploadError::Configuration(
            "未配置 COS 密钥，请设置 secret_id/secret_key 或 TENCENTCLOUD_SECRET_ID/TENCENTCLOUD_SECRET_KEY".to_string(),
        ))
    }

    fn bucket_url(&self) -> String {
        self.bucket_url.clone().unwrap_or_else(|| {
            format!("https://{}.cos.{}.{}", self.bucket, self.region, self.domain)
        })
    }

    fn service_url(&self) -> String {
        self.service_url
            .clone()
            .unwrap_or_else(|| format!("https://cos.{}.{}", self.region, self.domain))
    }
}

/// 腾讯云 COS 上传器
///
/// 通过 `CosClient` 访问存储桶，默认使用 `CosHttpClient`；测试中可以注入 `MemoryCosClient`。
pub struct CosUploader<C: CosClient = CosHttpClient> {
    bucket_name: String,
    region: String,
    domain: String,
    client: C,
    logger: Arc<Logger>,
}

impl CosUploader<CosHttpClient> {
    pub fn new(config: CosUploaderConfig) -> Result<Self, UploadError> {
        if let Err(errors) = config.validate() {
            return Err(UploadError::Configuration(format!("{}", errors)));
        }

        let credentials = config.credentials()?;
        let client = CosHttpClient::new(
            config.bucket_url(),
            config.service_url(),
            credentials,
            config.sign_expire_secs,
        )?;
        let logger = Logger::new(config.logger.clone())
            .map_err(|e| UploadError::Configuration(format!("创建 logger 失败: {}", e)))?;

        Ok(Self {
            bucket_name: config.bucket,
            region: config.region,
            domain: config.domain,
            client,
            logger: Arc::new(logger),
        })
    }
}

impl<C: CosClient> CosUploader<C> {
    pub fn with_client(
        bucket: impl Into<String>,
        region: impl Into<String>,
        client: C,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            bucket_name: bucket.into(),
            region: region.into(),
            domain: "myqcloud.com".to_string(),
            client,
            logger,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// 复制源地址，如 `examplebucket-1250000000.cos.ap-guangzhou.myqcloud.com/docs/a.txt`
    pub fn source_url(&self, source: &str) -> String {
        format!(
            "{}.cos.{}.{}/{}",
            self.bucket_name,
            self.region,
            self.domain,
            encode_key(source.trim_start_matches('/'))
        )
    }

    async fn warn(&self, message: &str, fields: Vec<(&str, MetadataValue)>) {
        let mut metadata: Vec<(&str, MetadataValue)> = vec![
            ("driver", DRIVER.into()),
            ("bucket", self.bucket_name.as_str().into()),
        ];
        metadata.extend(fields);
        let _ = self.logger.warnm(message, metadata).await;
    }

    fn delimited(prefix: &str, marker: String, max_keys: usize) -> ListObjectsRequest {
        ListObjectsRequest {
            prefix: prefix.to_string(),
            delimiter: Some(DELIMITER.to_string()),
            marker,
            max_keys,
        }
    }

    fn page_size(limit: usize) -> usize {
        match limit {
            0 => MAX_LIST_KEYS,
            n => n.min(MAX_LIST_KEYS),
        }
    }

    fn file_object(summary: ObjectSummary) -> BucketObject {
        let mut params = Params::new();
        params.insert(
            "owner".to_string(),
            serde_json::to_value(&summary.owner).unwrap_or_default(),
        );
        params.insert("restoreStatus".to_string(), Value::from(summary.restore_status));
        params.insert("versionId".to_string(), Value::from(summary.version_id));
        params.insert("storageTier".to_string(), Value::from(summary.storage_tier));
        params.insert("storageClass".to_string(), Value::from(summary.storage_class));
        params.insert("partNumber".to_string(), Value::from(summary.part_number));
        params.insert("etag".to_string(), Value::from(summary.etag));

        BucketObject::file(summary.key, summary.size, summary.last_modified, params)
    }

    fn delete_all_inner<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, DeleteReport> {
        async move {
            let mut report = DeleteReport::default();
            let mut marker = String::new();

            loop {
                let request = Self::delimited(prefix, marker.clone(), MAX_LIST_KEYS);
                let page = match self.client.list_objects(&request).await {
                    Ok(page) => page,
                    Err(e) => {
                        self.warn(
                            "list objects for delete failed",
                            vec![("prefix", prefix.into()), ("error", e.to_string().into())],
                        )
                        .await;
                        report.record_failure(prefix, &e);
                        break;
                    }
                };

                for content in &page.contents {
                    match self.client.delete_object(&content.key, None).await {
                        Ok(()) => report.deleted += 1,
                        Err(e) => {
                            self.warn(
                                "delete object failed",
                                vec![
                                    ("key", content.key.as_str().into()),
                                    ("error", e.to_string().into()),
                                ],
                            )
                            .await;
                            report.record_failure(content.key.as_str(), &e);
                        }
                    }
                }

                for common_prefix in &page.common_prefixes {
                    let child = self.delete_all_inner(common_prefix).await;
                    report.merge(child);
                }

                if !page.is_truncated {
                    break;
                }
                match page.resume_marker() {
                    Some(next) => marker = next,
                    None => break,
                }
            }

            report
        }
        .boxed()
    }

    fn tree_inner<'a>(
        &'a self,
        prefix: &'a str,
        options: TreeOptions,
    ) -> BoxFuture<'a, Vec<BucketTreeObject>> {
        async move {
            if options.depth > options.max_depth {
                return Vec::new();
            }

            let page_size = Self::page_size(options.limit);
            let mut marker = options.cursor.clone();
            let mut nodes = Vec::new();

            loop {
                let request = Self::delimited(prefix, marker.clone(), page_size);
                let page = match self.client.list_objects(&request).await {
                    Ok(page) => page,
                    Err(e) => {
                        self.warn(
                            "list objects for tree failed",
                            vec![
                                ("prefix", prefix.into()),
                                ("depth", MetadataValue::from(options.depth)),
                                ("error", e.to_string().into()),
                            ],
                        )
                        .await;
                        break;
                    }
                };

                if !options.exclude_leaves {
                    for content in &page.contents {
                        if content.key == prefix {
                            continue;
                        }
                        nodes.push(BucketTreeObject::leaf(Self::file_object(content.clone())));
                    }
                }

                for common_prefix in &page.common_prefixes {
                    let count = if options.count_children {
                        self.count(common_prefix, false).await
                    } else {
                        0
                    };
                    let children = self
                        .tree_inner(
                            common_prefix,
                            TreeOptions {
                                cursor: String::new(),
                                depth: options.depth + 1,
                                ..options.clone()
                            },
                        )
                        .await;

                    let mut dir = BucketObject::dir(common_prefix.as_str());
                    dir.params.insert("count".to_string(), Value::from(count));
                    nodes.push(BucketTreeObject {
                        object: dir,
                        children,
                    });
                }

                if !page.is_truncated {
                    break;
                }
                match page.resume_marker() {
                    Some(next) => marker = next,
                    None => break,
                }
            }

            nodes
        }
        .boxed()
    }
}

/// 统计用前缀：去掉首尾 `/` 后补一个 `/`，空前缀保持为空
fn count_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// 下载时的临时文件，与目标文件同目录
fn partial_path(local_path: &Path) -> Result<PathBuf, UploadError> {
    let mut name: OsString = local_path
        .file_name()
        .ok_or_else(|| {
            UploadError::InvalidInput(format!("无效的本地文件路径: {}", local_path.display()))
        })?
        .to_os_string();
    name.push(".part");
    Ok(local_path.with_file_name(name))
}

enum ListEntry {
    File(ObjectSummary),
    Dir(String),
}

impl ListEntry {
    fn key(&self) -> &str {
        match self {
            ListEntry::File(summary) => &summary.key,
            ListEntry::Dir(prefix) => prefix,
        }
    }
}

#[async_trait]
impl<C: CosClient> Uploader for CosUploader<C> {
    fn name(&self) -> &str {
        &self.bucket_name
    }

    fn driver(&self) -> &str {
        DRIVER
    }

    async fn list_buckets(&self) -> Vec<Bucket> {
        match self.client.list_buckets().await {
            Ok(buckets) => buckets
                .into_iter()
                .map(|b| {
                    let mut params = Params::new();
                    if let Some(location) = b.location {
                        params.insert("region".to_string(), Value::String(location));
                    }
                    if let Some(creation_date) = b.creation_date {
                        params.insert("creationDate".to_string(), Value::String(creation_date));
                    }
                    Bucket {
                        name: b.name,
                        driver: DRIVER.to_string(),
                        params,
                    }
                })
                .collect(),
            Err(e) => {
                self.warn("list buckets failed", vec![("error", e.to_string().into())])
                    .await;
                Vec::new()
            }
        }
    }

    async fn get(&self, key: &str, options: GetOptions) -> Result<Bytes, UploadError> {
        self.client.get_object(key, &options).await
    }

    async fn get_to_file(
        &self,
        key: &str,
        local_path: &Path,
        options: GetOptions,
    ) -> Result<(), UploadError> {
        if let Some(parent) = local_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let partial = partial_path(local_path)?;
        let mut file = tokio::fs::File::create(&partial).await?;
        let result = self.client.get_stream(key, &mut file, &options).await;
        drop(file);

        match result {
            Ok(_) => {
                if let Err(e) = tokio::fs::rename(&partial, local_path).await {
                    let _ = tokio::fs::remove_file(&partial).await;
                    return Err(e.into());
                }
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }

    async fn put(
        &self,
        key: &str,
        reader: BodyReader,
        options: PutOptions,
    ) -> Result<(), UploadError> {
        self.client.put_object(key, reader, &options).await
    }

    async fn list(&self, prefix: &str, options: ListOptions) -> ListPage {
        let limit = options.limit;
        // 文件同样占用服务端的 max-keys，只要目录时按最大页拉取
        let page_size = if options.exclude_files {
            MAX_LIST_KEYS
        } else {
            Self::page_size(limit)
        };
        let mut marker = options.cursor;
        let mut result = ListPage::default();

        loop {
            let request = Self::delimited(prefix, marker.clone(), page_size);
            let page = match self.client.list_objects(&request).await {
                Ok(page) => page,
                Err(e) => {
                    self.warn(
                        "list objects failed",
                        vec![
                            ("prefix", prefix.into()),
                            ("marker", marker.as_str().into()),
                            ("error", e.to_string().into()),
                        ],
                    )
                    .await;
                    result.interrupted = true;
                    result.next_cursor = Some(marker).filter(|m| !m.is_empty());
                    return result;
                }
            };

            let resume = page.resume_marker();
            let is_truncated = page.is_truncated;
            let files = if options.exclude_files {
                Vec::new()
            } else {
                page.contents
            };
            let mut entries: Vec<ListEntry> = files
                .into_iter()
                .map(ListEntry::File)
                .chain(page.common_prefixes.into_iter().map(ListEntry::Dir))
                .collect();
            entries.sort_by(|a, b| a.key().cmp(b.key()));

            let total = entries.len();
            for (idx, entry) in entries.into_iter().enumerate() {
                let key = entry.key().to_string();
                match entry {
                    ListEntry::File(summary) => result.objects.push(Self::file_object(summary)),
                    ListEntry::Dir(dir) => result.objects.push(BucketObject::dir(dir)),
                }

                if limit > 0 && result.objects.len() >= limit {
                    let exhausted = idx + 1 == total && !is_truncated;
                    result.next_cursor = if exhausted { None } else { Some(key) };
                    return result;
                }
            }

            if !is_truncated {
                return result;
            }
            match resume {
                Some(next) => marker = next,
                None => return result,
            }
        }
    }

    async fn count(&self, prefix: &str, files_only: bool) -> usize {
        let prefix = count_prefix(prefix);
        let mut marker = String::new();
        let mut total = 0usize;

        loop {
            let request = Self::delimited(&prefix, marker.clone(), MAX_LIST_KEYS);
            let page = match self.client.list_objects(&request).await {
                Ok(page) => page,
                Err(e) => {
                    self.warn(
                        "count objects failed",
                        vec![("prefix", prefix.as_str().into()), ("error", e.to_string().into())],
                    )
                    .await;
                    break;
                }
            };

            total += page.contents.iter().filter(|c| c.key != prefix).count();
            if !files_only {
                total += page.common_prefixes.len();
            }

            if !page.is_truncated {
                break;
            }
            match page.resume_marker() {
                Some(next) => marker = next,
                None => break,
            }
        }

        total
    }

    async fn delete(&self, key: &str, options: DeleteOptions) -> Result<(), UploadError> {
        self.client
            .delete_object(key, options.version_id.as_deref())
            .await
    }

    async fn delete_all(&self, prefix: &str) -> DeleteReport {
        self.delete_all_inner(prefix).await
    }

    async fn delete_multiple(&self, objects: &[BucketObject]) -> Result<DeleteReport, UploadError> {
        let mut report = DeleteReport::default();

        for dir in objects.iter().filter(|o| o.is_dir()) {
            let child = self.delete_all(&dir.path).await;
            report.merge(child);
        }

        let keys: Vec<String> = objects
            .iter()
            .filter(|o| o.is_file())
            .map(|o| o.path.clone())
            .collect();
        for batch in keys.chunks(MAX_LIST_KEYS) {
            let output = self.client.delete_objects(batch).await?;
            report.deleted += output.deleted.len();
            for failure in output.errors {
                self.warn(
                    "delete object in batch failed",
                    vec![
                        ("key", failure.key.as_str().into()),
                        ("code", failure.code.as_str().into()),
                    ],
                )
                .await;
                report.record_failure(failure.key, format!("{}: {}", failure.code, failure.message));
            }
        }

        Ok(report)
    }

    async fn exists(&self, key: &str, options: ExistsOptions) -> Result<bool, UploadError> {
        self.client
            .head_object(key, options.version_id.as_deref())
            .await
    }

    async fn copy(&self, dest: &str, source: &str) -> Result<(), UploadError> {
        let source_url = self.source_url(source);
        self.client.copy_object(dest, &source_url).await
    }

    async fn move_object(&self, dest: &str, source: &str) -> Result<(), UploadError> {
        self.copy(dest, source).await?;
        if let Err(e) = self.client.delete_object(source, None).await {
            self.warn(
                "delete source after copy failed",
                vec![
                    ("source", source.into()),
                    ("dest", dest.into()),
                    ("error", e.to_string().into()),
                ],
            )
            .await;
        }
        Ok(())
    }

    async fn tree(&self, prefix: &str, options: TreeOptions) -> Vec<BucketTreeObject> {
        self.tree_inner(prefix, options).await
    }

    async fn append(
        &self,
        key: &str,
        position: u64,
        reader: BodyReader,
        options: PutOptions,
    ) -> Result<u64, UploadError> {
        self.client
            .append_object(key, position, reader, &options)
            .await
    }
}

crate::impl_from!(CosUploaderConfig => CosUploader, expect: "Failed to create CosUploader");
crate::impl_box_from!(CosUploader => dyn Uploader);
