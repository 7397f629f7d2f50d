use anyhow::Result;
use serde::Deserialize;
use smart_default::SmartDefault;
use std::io::Write;

use crate::log::appender::LogAppender;

/// 输出目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, SmartDefault)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Deserialize, SmartDefault)]
#[serde(default)]
pub struct ConsoleAppenderConfig {
    pub target: Target,
}

/// 终端输出器
pub struct ConsoleAppender {
    config: ConsoleAppenderConfig,
}

impl ConsoleAppender {
    pub fn new(config: ConsoleAppenderConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl LogAppender for ConsoleAppender {
    async fn append(&self, formatted_message: &str) -> Result<()> {
        match self.config.target {
            Target::Stdout => {
                let mut out = std::io::stdout().lock();
                writeln!(out, "{}", formatted_message)?;
                out.flush()?;
            }
            Target::Stderr => {
                let mut out = std::io::stderr().lock();
                writeln!(out, "{}", formatted_message)?;
            }
        }
        Ok(())
    }
}

crate::impl_from!(ConsoleAppenderConfig => ConsoleAppender);
crate::impl_box_from!(ConsoleAppender => dyn LogAppender);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_appender_config() {
        assert_eq!(ConsoleAppenderConfig::default().target, Target::Stdout);

        let config: ConsoleAppenderConfig = serde_json::from_str(r#"{"target":"stderr"}"#).unwrap();
        assert_eq!(config.target, Target::Stderr);
    }

    #[tokio::test]
    async fn test_console_appender_append() {
        let appender = ConsoleAppender::from(ConsoleAppenderConfig::default());
        assert!(appender.append("hello console").await.is_ok());
        assert!(appender.flush().await.is_ok());
    }
}
