mod json_formatter;
mod text_formatter;

use anyhow::Result;

use crate::cfg::register_trait;
use crate::log::log_record::LogRecord;

pub use json_formatter::{JsonFormatter, JsonFormatterConfig};
pub use text_formatter::{TextFormatter, TextFormatterConfig};

/// 日志格式化器
pub trait LogFormatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> Result<String>;
}

/// 注册内置 Formatter
pub fn register_formatters() -> Result<()> {
    register_trait::<TextFormatter, dyn LogFormatter, TextFormatterConfig>("TextFormatter")?;
    register_trait::<JsonFormatter, dyn LogFormatter, JsonFormatterConfig>("JsonFormatter")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{create_trait_from_type_options, TypeOptions};
    use crate::log::LogLevel;

    #[test]
    fn test_create_registered_formatters() -> Result<()> {
        register_formatters()?;

        for type_name in ["TextFormatter", "JsonFormatter"] {
            let opts = TypeOptions::new(type_name, serde_json::json!({}));
            let formatter: Box<dyn LogFormatter> = create_trait_from_type_options(&opts)?;
            let line = formatter.format(&LogRecord::new(LogLevel::Info, "msg"))?;
            assert!(line.contains("msg"));
        }

        Ok(())
    }
}
