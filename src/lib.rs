//! rustx-cos - 腾讯云 COS 上传器
//!
//! 将 COS 的对象操作适配到统一的 `Uploader` 接口，上层代码可以用同一套 API
//! 访问不同的云存储。
//!
//! ## 模块
//!
//! - **cfg**: 基于 `TypeOptions` 的组件配置与创建
//! - **log**: 可注入的日志器（支持文本/JSON 格式，控制台/文件输出）
//! - **upload**: `Uploader` 接口、COS 签名与 HTTP 客户端、内存客户端、`CosUploader`

pub mod cfg;
pub mod log;
pub mod upload;

// 重新导出主要的公共 API
pub use cfg::{create_trait_from_type_options, register_trait, TypeOptions};

pub use log::{LogAppender, LogFormatter, LogLevel, LogRecord, Logger, LoggerConfig};

pub use upload::{
    register_uploaders, Bucket, BucketObject, BucketTreeObject, CosClient, CosHttpClient,
    CosUploader, CosUploaderConfig, DeleteReport, FileType, ListPage, MemoryCosClient,
    UploadError, Uploader,
};
