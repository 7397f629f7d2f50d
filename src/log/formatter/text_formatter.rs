use anyhow::Result;
use serde::Deserialize;
use smart_default::SmartDefault;
use std::fmt::Write;

use crate::log::formatter::LogFormatter;
use crate::log::log_record::{LogLevel, LogRecord};

/// TextFormatter 配置
#[derive(Debug, Clone, Deserialize, SmartDefault)]
#[serde(default)]
pub struct TextFormatterConfig {
    /// 是否输出 ANSI 颜色
    #[default = false]
    pub colored: bool,
}

/// 文本格式化器
///
/// 输出格式：`2025-01-19T12:34:56.789Z WARN  [cos] message | key=value ...`
pub struct TextFormatter {
    config: TextFormatterConfig,
}

impl TextFormatter {
    pub fn new(config: TextFormatterConfig) -> Self {
        Self { config }
    }

    fn paint(&self, out: &mut String, color: &str, text: &str) {
        if self.config.colored {
            out.push_str(color);
            out.push_str(text);
            out.push_str("\x1b[0m");
        } else {
            out.push_str(text);
        }
    }
}

fn level_color(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "\x1b[31m",
        LogLevel::Warn => "\x1b[33m",
        LogLevel::Info => "\x1b[32m",
        LogLevel::Debug => "\x1b[36m",
        LogLevel::Trace => "\x1b[37;2m",
    }
}

impl LogFormatter for TextFormatter {
    fn format(&self, record: &LogRecord) -> Result<String> {
        let mut out = String::with_capacity(64 + record.message.len());

        let timestamp = record.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        self.paint(&mut out, "\x1b[2m", &timestamp);
        out.push(' ');

        self.paint(&mut out, level_color(record.level), &format!("{:<5}", record.level));
        out.push(' ');

        if let Some(target) = &record.target {
            write!(out, "[{}] ", target)?;
        }

        out.push_str(&record.message);

        if !record.metadata.is_empty() {
            out.push_str(" |");
            for (key, value) in &record.metadata {
                out.push(' ');
                self.paint(&mut out, "\x1b[36m", key);
                write!(out, "={}", value)?;
            }
        }

        Ok(out)
    }
}

crate::impl_from!(TextFormatterConfig => TextFormatter);
crate::impl_box_from!(TextFormatter => dyn LogFormatter);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_formatter_plain() -> Result<()> {
        let formatter = TextFormatter::new(TextFormatterConfig::default());
        let record = LogRecord::new(LogLevel::Warn, "delete object failed")
            .with_target("cos")
            .with_metadata("key", "a/b.txt")
            .with_metadata("retry", false);

        let line = formatter.format(&record)?;

        assert!(line.contains("WARN  [cos] delete object failed"));
        assert!(line.ends_with("| key=a/b.txt retry=false"));
        assert!(!line.contains("\x1b["));
        Ok(())
    }

    #[test]
    fn test_text_formatter_timestamp_prefix() -> Result<()> {
        let formatter = TextFormatter::new(TextFormatterConfig::default());
        let line = formatter.format(&LogRecord::new(LogLevel::Info, "hello"))?;

        // 2025-01-19T12:34:56.789Z
        let timestamp = line.split(' ').next().unwrap();
        assert_eq!(timestamp.len(), 24);
        assert!(timestamp.ends_with('Z'));
        Ok(())
    }

    #[test]
    fn test_text_formatter_colored() -> Result<()> {
        let formatter = TextFormatter::new(TextFormatterConfig { colored: true });
        let line = formatter.format(&LogRecord::new(LogLevel::Error, "boom"))?;

        assert!(line.contains("\x1b[31mERROR\x1b[0m"));
        assert!(line.contains("boom"));
        Ok(())
    }
}
