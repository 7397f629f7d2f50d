//! upload 模块 - 统一的对象上传接口与腾讯云 COS 实现
//!
//! ```rust,no_run
//! use rustx_cos::cfg::{create_trait_from_type_options, TypeOptions};
//! use rustx_cos::upload::{register_uploaders, ListOptions, Uploader};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! register_uploaders()?;
//!
//! let options = TypeOptions::from_json(r#"{
//!     type: "CosUploader",
//!     options: { bucket: "examplebucket-1250000000", region: "ap-guangzhou" },
//! }"#)?;
//! let uploader: Box<dyn Uploader> = create_trait_from_type_options(&options)?;
//!
//! let page = uploader.list("images/", ListOptions::default()).await;
//! for object in page.objects {
//!     println!("{} {:?}", object.path, object.file_type);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cos_auth;
pub mod cos_client;
pub mod cos_http_client;
pub mod cos_uploader;
pub mod error;
pub mod memory_cos_client;
pub mod uploader;
pub mod uploader_types;

pub use cos_auth::CosCredentials;
pub use cos_client::{
    BucketSummary, CosClient, DeleteError, DeleteObjectsOutput, ListObjectsPage,
    ListObjectsRequest, ObjectSummary, Owner, MAX_LIST_KEYS,
};
pub use cos_http_client::CosHttpClient;
pub use cos_uploader::{CosUploader, CosUploaderConfig};
pub use error::UploadError;
pub use memory_cos_client::MemoryCosClient;
pub use uploader::Uploader;
pub use uploader_types::{
    base_name, extension, BodyReader, Bucket, BucketObject, BucketTreeObject, DeleteOptions,
    DeleteReport, ExistsOptions, FailedObject, FileType, GetOptions, ListOptions, ListPage, Params,
    PutOptions, TreeOptions,
};

/// 注册所有上传器实现
pub fn register_uploaders() -> anyhow::Result<()> {
    crate::cfg::register_trait::<CosUploader, dyn Uploader, CosUploaderConfig>("CosUploader")?;
    Ok(())
}
