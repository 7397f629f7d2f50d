use thiserror::Error;

/// 上传器统一错误类型
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("对象不存在: {key}")]
    NotFound { key: String },

    #[error("服务端错误 [HTTP {status}] {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
    },

    #[error("厂商错误 [{provider}]: {message}")]
    Provider {
        provider: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("无效参数: {0}")]
    InvalidInput(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// 包装传输层或解码错误
    pub fn from_provider<E>(err: E, provider: &str, context: &str) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        UploadError::Provider {
            provider: provider.to_string(),
            message: format!("{}: {}", context, err),
            source: Some(Box::new(err)),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            UploadError::NotFound { .. } => true,
            UploadError::Service { status, .. } => *status == 404,
            _ => false,
        }
    }
}
