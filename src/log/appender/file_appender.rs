use anyhow::Result;
use serde::Deserialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::log::appender::LogAppender;

#[derive(Debug, Clone, Deserialize)]
pub struct FileAppenderConfig {
    /// 日志文件路径，父目录不存在时自动创建
    pub file_path: String,
}

/// 文件输出器，以追加方式写入
pub struct FileAppender {
    file: Mutex<tokio::fs::File>,
    config: FileAppenderConfig,
}

impl FileAppender {
    pub fn new(config: FileAppenderConfig) -> Result<Self> {
        let path = Path::new(&config.file_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        Ok(Self {
            file: Mutex::new(tokio::fs::File::from_std(file)),
            config,
        })
    }

    pub fn path(&self) -> &str {
        &self.config.file_path
    }
}

#[async_trait::async_trait]
impl LogAppender for FileAppender {
    async fn append(&self, formatted_message: &str) -> Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(formatted_message.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.file.lock().await.flush().await?;
        Ok(())
    }
}

crate::impl_from!(FileAppenderConfig => FileAppender, expect: "Failed to open log file");
crate::impl_box_from!(FileAppender => dyn LogAppender);
