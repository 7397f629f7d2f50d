use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::upload::cos_client::{
    BucketSummary, CosClient, DeleteObjectsOutput, ListObjectsPage, ListObjectsRequest,
    ObjectSummary, Owner, MAX_LIST_KEYS,
};
use crate::upload::{BodyReader, GetOptions, PutOptions, UploadError};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
    etag: String,
    version_id: String,
    storage_class: String,
    appendable: bool,
}

/// 内存实现的 COS 客户端
///
/// 列举语义与服务端一致：按 key 字典序、marker 之后开始、按分隔符合并公共前缀、
/// 对象与公共前缀一起计入 max_keys。仅保留每个 key 的最新版本。
pub struct MemoryCosClient {
    bucket: String,
    region: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    next_version: AtomicU64,
}

impl MemoryCosClient {
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            objects: RwLock::new(BTreeMap::new()),
            next_version: AtomicU64::new(1),
        }
    }

    /// 直接写入对象，便于准备测试数据
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        let object = self.stored(data.into(), &PutOptions::default(), false);
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(key.into(), object);
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stored(&self, data: Bytes, options: &PutOptions, appendable: bool) -> StoredObject {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        StoredObject {
            etag: format!("{:x}", md5::compute(&data)),
            data,
            last_modified: Utc::now(),
            version_id: format!("v{}", version),
            storage_class: options
                .storage_class
                .clone()
                .unwrap_or_else(|| "STANDARD".to_string()),
            appendable,
        }
    }

    fn poisoned() -> UploadError {
        UploadError::Provider {
            provider: "memory".to_string(),
            message: "对象表锁已损坏".to_string(),
            source: None,
        }
    }

    fn lookup(&self, key: &str, version_id: Option<&str>) -> Result<Option<StoredObject>, UploadError> {
        let objects = self.objects.read().map_err(|_| Self::poisoned())?;
        Ok(objects
            .get(key)
            .filter(|o| version_id.map_or(true, |v| v == o.version_id))
            .cloned())
    }

    async fn collect(body: BodyReader) -> Result<Bytes, UploadError> {
        let mut body = body;
        let mut buf = Vec::new();
        body.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    fn summary(key: &str, object: &StoredObject) -> ObjectSummary {
        ObjectSummary {
            key: key.to_string(),
            size: object.data.len() as u64,
            last_modified: Some(object.last_modified),
            etag: Some(object.etag.clone()),
            owner: Some(Owner {
                id: "memory".to_string(),
                display_name: "memory".to_string(),
            }),
            storage_class: Some(object.storage_class.clone()),
            version_id: Some(object.version_id.clone()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl CosClient for MemoryCosClient {
    async fn list_buckets(&self) -> Result<Vec<BucketSummary>, UploadError> {
        Ok(vec![BucketSummary {
            name: self.bucket.clone(),
            location: Some(self.region.clone()),
            creation_date: None,
        }])
    }

    async fn list_objects(&self, request: &ListObjectsRequest) -> Result<ListObjectsPage, UploadError> {
        let max_keys = match request.max_keys {
            0 => MAX_LIST_KEYS,
            n => n.min(MAX_LIST_KEYS),
        };
        let delimiter = request.delimiter.as_deref().filter(|d| !d.is_empty());
        let start = if request.marker.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(request.marker.as_str())
        };

        let objects = self.objects.read().map_err(|_| Self::poisoned())?;
        let mut page = ListObjectsPage::default();
        let mut emitted = 0usize;
        let mut last_entry: Option<String> = None;

        for (key, object) in objects.range::<str, _>((start, Bound::Unbounded)) {
            if !key.starts_with(&request.prefix) {
                continue;
            }

            let rest = &key[request.prefix.len()..];
            let common_prefix = delimiter.and_then(|d| {
                rest.find(d)
                    .map(|idx| key[..request.prefix.len() + idx + d.len()].to_string())
            });

            if let Some(ref cp) = common_prefix {
                if cp.as_str() <= request.marker.as_str()
                    || page.common_prefixes.last() == Some(cp)
                {
                    continue;
                }
            }

            if emitted == max_keys {
                page.is_truncated = true;
                break;
            }
            emitted += 1;

            match common_prefix {
                Some(cp) => {
                    last_entry = Some(cp.clone());
                    page.common_prefixes.push(cp);
                }
                None => {
                    last_entry = Some(key.clone());
                    page.contents.push(Self::summary(key, object));
                }
            }
        }

        if page.is_truncated {
            page.next_marker = last_entry;
        }
        Ok(page)
    }

    async fn get_object(&self, key: &str, options: &GetOptions) -> Result<Bytes, UploadError> {
        let object = self
            .lookup(key, options.version_id.as_deref())?
            .ok_or_else(|| UploadError::NotFound {
                key: key.to_string(),
            })?;

        match options.range {
            None => Ok(object.data),
            Some(ref range) => {
                let len = object.data.len() as u64;
                if range.start >= len || range.end <= range.start {
                    return Err(UploadError::Service {
                        status: 416,
                        code: "InvalidRange".to_string(),
                        message: format!("范围 {}..{} 超出对象长度 {}", range.start, range.end, len),
                        request_id: None,
                    });
                }
                let end = range.end.min(len);
                Ok(object.data.slice(range.start as usize..end as usize))
            }
        }
    }

    async fn get_stream(
        &self,
        key: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
        options: &GetOptions,
    ) -> Result<u64, UploadError> {
        let data = self.get_object(key, options).await?;
        writer.write_all(&data).await?;
        writer.flush().await?;
        Ok(data.len() as u64)
    }

    async fn put_object(&self, key: &str, body: BodyReader, options: &PutOptions) -> Result<(), UploadError> {
        let body = Self::collect(body).await?;
        let object = self.stored(body, options, false);
        let mut objects = self.objects.write().map_err(|_| Self::poisoned())?;
        objects.insert(key.to_string(), object);
        Ok(())
    }

    async fn append_object(
        &self,
        key: &str,
        position: u64,
        body: BodyReader,
        options: &PutOptions,
    ) -> Result<u64, UploadError> {
        let body = Self::collect(body).await?;
        let mut objects = self.objects.write().map_err(|_| Self::poisoned())?;

        let mut data = Vec::new();
        if let Some(existing) = objects.get(key) {
            if !existing.appendable {
                return Err(UploadError::Service {
                    status: 409,
                    code: "ObjectNotAppendable".to_string(),
                    message: format!("{} 不是可追加对象", key),
                    request_id: None,
                });
            }
            data.extend_from_slice(&existing.data);
        }

        if position != data.len() as u64 {
            return Err(UploadError::Service {
                status: 409,
                code: "PositionNotEqualToLength".to_string(),
                message: format!("追加位置 {} 与对象长度 {} 不一致", position, data.len()),
                request_id: None,
            });
        }

        data.extend_from_slice(&body);
        let next = data.len() as u64;
        let object = self.stored(Bytes::from(data), options, true);
        objects.insert(key.to_string(), object);
        Ok(next)
    }

    async fn delete_object(&self, key: &str, version_id: Option<&str>) -> Result<(), UploadError> {
        let mut objects = self.objects.write().map_err(|_| Self::poisoned())?;
        let matches = objects
            .get(key)
            .map_or(false, |o| version_id.map_or(true, |v| v == o.version_id));
        if matches {
            objects.remove(key);
        }
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<DeleteObjectsOutput, UploadError> {
        if keys.len() > MAX_LIST_KEYS {
            return Err(UploadError::InvalidInput(format!(
                "单次批量删除最多 {} 个对象，实际 {}",
                MAX_LIST_KEYS,
                keys.len()
            )));
        }

        let mut objects = self.objects.write().map_err(|_| Self::poisoned())?;
        let mut output = DeleteObjectsOutput::default();
        for key in keys {
            objects.remove(key);
            output.deleted.push(key.clone());
        }
        Ok(output)
    }

    async fn head_object(&self, key: &str, version_id: Option<&str>) -> Result<bool, UploadError> {
        Ok(self.lookup(key, version_id)?.is_some())
    }

    async fn copy_object(&self, dest: &str, source_url: &str) -> Result<(), UploadError> {
        let encoded = source_url
            .split_once('/')
            .map(|(_, key)| key)
            .ok_or_else(|| UploadError::InvalidInput(format!("无效的复制源: {}", source_url)))?;
        let source = urlencoding::decode(encoded)
            .map_err(|e| UploadError::InvalidInput(format!("无效的复制源 {}: {}", source_url, e)))?
            .into_owned();

        let mut objects = self.objects.write().map_err(|_| Self::poisoned())?;
        let object = objects
            .get(&source)
            .cloned()
            .ok_or_else(|| UploadError::NotFound { key: source.clone() })?;

        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        objects.insert(
            dest.to_string(),
            StoredObject {
                last_modified: Utc::now(),
                version_id: format!("v{}", version),
                appendable: false,
                ..object
            },
        );
        Ok(())
    }
}
