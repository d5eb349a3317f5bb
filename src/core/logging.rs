//! 日志初始化

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// 初始化日志系统
///
/// 配置tracing日志框架。`RUST_LOG` 环境变量优先于配置中的日志级别。
/// 重复调用是安全的，已安装的订阅者不会被替换。
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.show_targets)
        .try_init();
    tracing::debug!(target: "bridge", level = config.level.as_filter(), "Logging initialized");
}
