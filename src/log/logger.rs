use anyhow::Result;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use std::sync::{Arc, Once, RwLock};

use crate::cfg::{create_trait_from_type_options, TypeOptions};
use crate::log::appender::{ConsoleAppender, ConsoleAppenderConfig, LogAppender};
use crate::log::formatter::{LogFormatter, TextFormatter, TextFormatterConfig};
use crate::log::log_record::{LogLevel, LogRecord, MetadataValue};

/// Logger 配置
#[derive(Debug, Clone, Serialize, Deserialize, SmartDefault, PartialEq)]
#[serde(default)]
pub struct LoggerConfig {
    #[default = "info"]
    pub level: String,

    #[default(TypeOptions::new("TextFormatter", serde_json::json!({})))]
    pub formatter: TypeOptions,

    #[default(TypeOptions::new("ConsoleAppender", serde_json::json!({})))]
    pub appender: TypeOptions,
}

static REGISTER_ONCE: Once = Once::new();

/// 日志器
///
/// 由调用方创建后以 `Arc<Logger>` 注入到各组件，组件内部不依赖任何全局 logger。
pub struct Logger {
    level: RwLock<LogLevel>,
    formatter: Arc<dyn LogFormatter>,
    appender: Arc<dyn LogAppender>,
}

impl Logger {
    pub fn new(config: LoggerConfig) -> Result<Self> {
        REGISTER_ONCE.call_once(|| {
            let _ = crate::log::register_formatters();
            let _ = crate::log::register_appenders();
        });

        let level = config.level.parse::<LogLevel>().unwrap_or(LogLevel::Info);
        let formatter: Box<dyn LogFormatter> = create_trait_from_type_options(&config.formatter)?;
        let appender: Box<dyn LogAppender> = create_trait_from_type_options(&config.appender)?;

        Ok(Self::with_parts(level, Arc::from(formatter), Arc::from(appender)))
    }

    /// 直接由组件构造，不经过注册表
    pub fn with_parts(
        level: LogLevel,
        formatter: Arc<dyn LogFormatter>,
        appender: Arc<dyn LogAppender>,
    ) -> Self {
        Self {
            level: RwLock::new(level),
            formatter,
            appender,
        }
    }

    /// 文本格式输出到标准输出的默认 logger
    pub fn console(level: LogLevel) -> Self {
        Self::with_parts(
            level,
            Arc::new(TextFormatter::new(TextFormatterConfig::default())),
            Arc::new(ConsoleAppender::new(ConsoleAppenderConfig::default())),
        )
    }

    pub fn set_level(&self, level: LogLevel) {
        if let Ok(mut current) = self.level.write() {
            *current = level;
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level.read().map(|l| *l).unwrap_or(LogLevel::Info)
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level()
    }

    pub async fn log(&self, record: LogRecord) -> Result<()> {
        if !self.enabled(record.level) {
            return Ok(());
        }

        let formatted = self.formatter.format(&record)?;
        self.appender.append(&formatted).await
    }

    /// 记录带 metadata 的日志
    ///
    /// ```ignore
    /// logger.logm(LogLevel::Warn, "list objects failed", vec![
    ///     ("bucket", "examplebucket-1250000000".into()),
    ///     ("prefix", "images/".into()),
    /// ]).await?;
    /// ```
    pub async fn logm(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        metadata: impl IntoIterator<Item = (impl Into<String>, MetadataValue)>,
    ) -> Result<()> {
        if !self.enabled(level) {
            return Ok(());
        }

        let mut record = LogRecord::new(level, message);
        for (key, value) in metadata {
            record.metadata.push((key.into(), value));
        }
        self.log(record).await
    }

    pub async fn debug(&self, message: impl Into<String>) -> Result<()> {
        self.log(LogRecord::new(LogLevel::Debug, message)).await
    }

    pub async fn info(&self, message: impl Into<String>) -> Result<()> {
        self.log(LogRecord::new(LogLevel::Info, message)).await
    }

    pub async fn warn(&self, message: impl Into<String>) -> Result<()> {
        self.log(LogRecord::new(LogLevel::Warn, message)).await
    }

    pub async fn error(&self, message: impl Into<String>) -> Result<()> {
        self.log(LogRecord::new(LogLevel::Error, message)).await
    }

    pub async fn debugm(
        &self,
        message: impl Into<String>,
        metadata: impl IntoIterator<Item = (impl Into<String>, MetadataValue)>,
    ) -> Result<()> {
        self.logm(LogLevel::Debug, message, metadata).await
    }

    pub async fn infom(
        &self,
        message: impl Into<String>,
        metadata: impl IntoIterator<Item = (impl Into<String>, MetadataValue)>,
    ) -> Result<()> {
        self.logm(LogLevel::Info, message, metadata).await
    }

    pub async fn warnm(
        &self,
        message: impl Into<String>,
        metadata: impl IntoIterator<Item = (impl Into<String>, MetadataValue)>,
    ) -> Result<()> {
        self.logm(LogLevel::Warn, message, metadata).await
    }

    pub async fn errorm(
        &self,
        message: impl Into<String>,
        metadata: impl IntoIterator<Item = (impl Into<String>, MetadataValue)>,
    ) -> Result<()> {
        self.logm(LogLevel::Error, message, metadata).await
    }
}

crate::impl_from!(LoggerConfig => Logger, expect: "Failed to create Logger");
