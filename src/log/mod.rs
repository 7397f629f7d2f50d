//! 日志模块
//!
//! 日志器以实例形式注入到使用方，级别、格式化器和输出器都可以通过配置创建：
//!
//! ```rust,no_run
//! use rustx_cos::log::{Logger, LoggerConfig};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config: LoggerConfig = json5::from_str(r#"
//!     {
//!         level: "info",
//!         formatter: { type: "JsonFormatter", options: {} },
//!         appender: { type: "FileAppender", options: { file_path: "/tmp/cos.log" } },
//!     }
//! "#)?;
//!
//! let logger = Logger::new(config)?;
//! logger.info("uploader ready").await?;
//! # Ok(())
//! # }
//! ```

pub mod appender;
pub mod formatter;
pub mod log_record;
pub mod logger;

pub use appender::{
    register_appenders, ConsoleAppender, ConsoleAppenderConfig, FileAppender, FileAppenderConfig,
    LogAppender, Target,
};
pub use formatter::{
    register_formatters, JsonFormatter, JsonFormatterConfig, LogFormatter, TextFormatter,
    TextFormatterConfig,
};
pub use log_record::{LogLevel, LogRecord, MetadataValue};
pub use logger::{Logger, LoggerConfig};
