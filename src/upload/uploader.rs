use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::upload::{
    BodyReader, Bucket, BucketObject, BucketTreeObject, DeleteOptions, DeleteReport,
    ExistsOptions, GetOptions, ListOptions, ListPage, PutOptions, TreeOptions, UploadError,
};

/// 统一的上传器接口
///
/// 单对象操作直接返回错误；分页/递归操作（list、count、delete_all、tree）
/// 在中途出错时记录日志并结束遍历，返回已经得到的部分结果。
#[async_trait]
pub trait Uploader: Send + Sync {
    /// 实例名称，通常是存储桶名
    fn name(&self) -> &str;

    /// 驱动标识，如 `cos`
    fn driver(&self) -> &str;

    /// 列出账号下的存储桶，出错时返回空列表
    async fn list_buckets(&self) -> Vec<Bucket>;

    async fn get(&self, key: &str, options: GetOptions) -> Result<Bytes, UploadError>;

    /// 下载到本地文件
    ///
    /// 内容先写入同目录下的 `.part` 临时文件，下载成功后再替换目标文件；
    /// 下载失败时已有的本地文件保持不变。
    async fn get_to_file(
        &self,
        key: &str,
        local_path: &Path,
        options: GetOptions,
    ) -> Result<(), UploadError>;

    async fn put(
        &self,
        key: &str,
        reader: BodyReader,
        options: PutOptions,
    ) -> Result<(), UploadError>;

    /// 以字符串内容上传，例如 base64 文本
    async fn put_string(
        &self,
        key: &str,
        content: &str,
        options: PutOptions,
    ) -> Result<(), UploadError> {
        let mut options = options;
        options.content_length.get_or_insert(content.len() as u64);
        let reader = std::io::Cursor::new(content.as_bytes().to_vec());
        self.put(key, Box::new(reader), options).await
    }

    /// 以文件流上传，长度取自文件元数据
    async fn put_from_file(
        &self,
        key: &str,
        local_path: &Path,
        options: PutOptions,
    ) -> Result<(), UploadError> {
        let file = tokio::fs::File::open(local_path).await?;
        let mut options = options;
        if options.content_length.is_none() {
            options.content_length = Some(file.metadata().await?.len());
        }
        self.put(key, Box::new(file), options).await
    }

    /// 按 `/` 分隔列举一层
    async fn list(&self, prefix: &str, options: ListOptions) -> ListPage;

    /// 统计前缀下一层的条目数，`files_only` 时不计目录
    async fn count(&self, prefix: &str, files_only: bool) -> usize;

    async fn delete(&self, key: &str, options: DeleteOptions) -> Result<(), UploadError>;

    /// 尽力递归删除前缀下的所有对象
    async fn delete_all(&self, prefix: &str) -> DeleteReport;

    /// 文件条目批量删除，目录条目递归删除
    async fn delete_multiple(&self, objects: &[BucketObject]) -> Result<DeleteReport, UploadError>;

    async fn exists(&self, key: &str, options: ExistsOptions) -> Result<bool, UploadError>;

    async fn copy(&self, dest: &str, source: &str) -> Result<(), UploadError>;

    /// 复制后删除源对象；复制失败时源对象保持不变
    async fn move_object(&self, dest: &str, source: &str) -> Result<(), UploadError>;

    async fn rename(&self, dest: &str, source: &str) -> Result<(), UploadError> {
        self.move_object(dest, source).await
    }

    async fn tree(&self, prefix: &str, options: TreeOptions) -> Vec<BucketTreeObject>;

    /// 追加上传，返回下一次追加的起始位置
    async fn append(
        &self,
        key: &str,
        position: u64,
        reader: BodyReader,
        options: PutOptions,
    ) -> Result<u64, UploadError>;

    async fn append_string(
        &self,
        key: &str,
        position: u64,
        content: &str,
        options: PutOptions,
    ) -> Result<u64, UploadError> {
        let mut options = options;
        options.content_length.get_or_insert(content.len() as u64);
        let reader = std::io::Cursor::new(content.as_bytes().to_vec());
        self.append(key, position, Box::new(reader), options).await
    }
}
