use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::BoxError;

/// 日志环境配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingEnvironment {
    /// 开发环境
    Development,
    /// 测试环境
    Testing,
    /// 生产环境
    Production,
}

/// 日志格式配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 人类可读格式
    Pretty,
    /// 紧凑格式
    Compact,
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub environment: LoggingEnvironment,
    /// 默认级别，`RUST_LOG` 存在时以它为准
    pub level: Level,
    pub format: LogFormat,
    pub show_target: bool,
    pub show_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            environment: LoggingEnvironment::Development,
            level: Level::INFO,
            format: LogFormat::Pretty,
            show_target: true,
            show_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    /// 开发环境：内核的每次注册和解析都可见
    pub fn development() -> Self {
        Self {
            environment: LoggingEnvironment::Development,
            level: Level::DEBUG,
            format: LogFormat::Pretty,
            show_target: true,
            show_thread_ids: true,
        }
    }

    pub fn production() -> Self {
        Self {
            environment: LoggingEnvironment::Production,
            level: Level::INFO,
            format: LogFormat::Compact,
            show_target: false,
            show_thread_ids: false,
        }
    }

    pub fn testing() -> Self {
        Self {
            environment: LoggingEnvironment::Testing,
            level: Level::ERROR,
            format: LogFormat::Compact,
            show_target: false,
            show_thread_ids: false,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.to_string().to_lowercase()))
    }
}

/// 初始化日志系统
///
/// 已经安装过全局订阅者时返回错误，而不是 panic。
pub fn init_logging(config: LoggingConfig) -> Result<(), BoxError> {
    let ansi = config.environment != LoggingEnvironment::Production;
    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(ansi);

            tracing_subscriber::registry()
                .with(config.env_filter())
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(ansi);

            tracing_subscriber::registry()
                .with(config.env_filter())
                .with(fmt_layer)
                .try_init()?;
        }
    }

    tracing::info!(
        environment = ?config.environment,
        level = ?config.level,
        format = ?config.format,
        "Logging system initialized"
    );

    Ok(())
}

/// 操作计时器，结束或丢弃时记录耗时
pub struct OperationTimer {
    start: Instant,
    operation: String,
    metadata: HashMap<String, String>,
    finished: bool,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
            finished: false,
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// 完成计时并记录日志
    pub fn finish(mut self) -> Duration {
        self.finished = true;
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = %self.operation,
            duration_us = duration.as_micros() as u64,
            metadata = ?self.metadata,
            "Operation completed"
        );
        duration
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // 提前返回（通常是出错）时走到这里
        tracing::debug!(
            operation = %self.operation,
            duration_us = self.start.elapsed().as_micros() as u64,
            metadata = ?self.metadata,
            "Operation abandoned"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_presets() {
        let dev_config = LoggingConfig::development();
        assert_eq!(dev_config.environment, LoggingEnvironment::Development);
        assert_eq!(dev_config.level, Level::DEBUG);
        assert_eq!(dev_config.format, LogFormat::Pretty);

        let prod_config = LoggingConfig::production();
        assert_eq!(prod_config.environment, LoggingEnvironment::Production);
        assert_eq!(prod_config.level, Level::INFO);

        let test_config = LoggingConfig::testing();
        assert_eq!(test_config.level, Level::ERROR);
        assert_eq!(test_config.format, LogFormat::Compact);
    }

    #[test]
    fn test_second_init_returns_error() {
        let _ = init_logging(LoggingConfig::testing());
        assert!(init_logging(LoggingConfig::testing()).is_err());
    }

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("kernel.dispose")
            .with_metadata("singletons", 3)
            .with_metadata("kernel", "root");

        assert_eq!(timer.operation, "kernel.dispose");
        assert_eq!(timer.metadata.get("singletons"), Some(&"3".to_string()));

        std::thread::sleep(Duration::from_millis(1));
        assert!(timer.elapsed() >= Duration::from_millis(1));
        assert!(timer.finish() >= Duration::from_millis(1));
    }
}
