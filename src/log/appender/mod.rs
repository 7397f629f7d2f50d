mod console_appender;
mod file_appender;

use anyhow::Result;

use crate::cfg::register_trait;

pub use console_appender::{ConsoleAppender, ConsoleAppenderConfig, Target};
pub use file_appender::{FileAppender, FileAppenderConfig};

/// 日志输出器，负责把格式化后的日志写到目标介质
#[async_trait::async_trait]
pub trait LogAppender: Send + Sync {
    async fn append(&self, formatted_message: &str) -> Result<()>;

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// 注册内置 Appender
pub fn register_appenders() -> Result<()> {
    register_trait::<ConsoleAppender, dyn LogAppender, ConsoleAppenderConfig>("ConsoleAppender")?;
    register_trait::<FileAppender, dyn LogAppender, FileAppenderConfig>("FileAppender")?;
    Ok(())
}
