/// 统一配置系统
///
/// 提供TOML/JSON配置文件、环境变量和运行时调整。
/// 宿主传入的不透明句柄（视觉父节点、网络访问管理器等）不属于文件配置，
/// 见 [`crate::bridge::HostHandles`]。
use crate::bridge::source::parse_bundle_url;
use crate::impl_default_and_new;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 桥接主配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// 脚本包地址（`file://` URL 或本地路径）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_url: Option<String>,

    /// 模块清单搜索路径
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugins_path: Option<PathBuf>,

    /// 脚本执行器名称，见 [`crate::scripting::ExecutorFactory`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor_name: Option<String>,

    /// 进入就绪状态后要启动的应用名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    /// 传给应用启动调用的初始属性
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_properties: Option<serde_json::Value>,

    /// 脚本包文件变化时自动重载
    pub watch_bundle: bool,

    /// 日志配置
    pub logging: LoggingConfig,
}

impl_default_and_new!(BridgeConfig {
    bundle_url: None,
    plugins_path: None,
    executor_name: None,
    app_name: None,
    initial_properties: None,
    watch_bundle: false,
    logging: LoggingConfig::default(),
});

impl BridgeConfig {
    /// 按扩展名加载配置文件（`.json` 按JSON解析，其余按TOML解析）
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON文件
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("BRIDGE_BUNDLE_URL") {
            self.bundle_url = Some(val);
        }
        if let Ok(val) = env::var("BRIDGE_PLUGINS_PATH") {
            self.plugins_path = Some(PathBuf::from(val));
        }
        if let Ok(val) = env::var("BRIDGE_EXECUTOR") {
            self.executor_name = Some(val);
        }
        if let Ok(val) = env::var("BRIDGE_APP_NAME") {
            self.app_name = Some(val);
        }
        if let Ok(val) = env::var("BRIDGE_WATCH_BUNDLE") {
            self.watch_bundle = val.parse().unwrap_or(self.watch_bundle);
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(url) = &self.bundle_url {
            parse_bundle_url(url).map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        }
        if let Some(name) = &self.executor_name {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "executor_name must not be empty".to_string(),
                ));
            }
        }
        if let Some(name) = &self.app_name {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "app_name must not be empty".to_string(),
                ));
            }
        }
        if let Some(path) = &self.plugins_path {
            if path.exists() && !path.is_dir() {
                return Err(ConfigError::ValidationError(format!(
                    "plugins_path {} is not a directory",
                    path.display()
                )));
            }
        }
        if let Some(props) = &self.initial_properties {
            if !props.is_object() {
                return Err(ConfigError::ValidationError(
                    "initial_properties must be a table".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./bridge.toml
    /// 2. ./bridge.json
    /// 3. <用户配置目录>/script_bridge/bridge.toml
    /// 4. 使用默认配置
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::from_toml_file("bridge.toml") {
            tracing::info!(target: "config", "Loaded config from bridge.toml");
            return config;
        }

        if let Ok(config) = Self::from_json_file("bridge.json") {
            tracing::info!(target: "config", "Loaded config from bridge.json");
            return config;
        }

        if let Some(dir) = dirs::config_dir() {
            let config_path = dir.join("script_bridge").join("bridge.toml");
            if let Ok(config) = Self::from_toml_file(&config_path) {
                tracing::info!(target: "config", "Loaded config from {:?}", config_path);
                return config;
            }
        }

        tracing::info!(target: "config", "Using default configuration");
        Self::default()
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,

    /// 是否输出日志target
    pub show_targets: bool,
}

impl_default_and_new!(LoggingConfig {
    level: LogLevel::Info,
    show_targets: true,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl LogLevel {
    /// `EnvFilter` 指令
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.bundle_url.is_none());
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_toml_parsing() {
        let config = BridgeConfig::from_toml_str(
            r#"
            bundle_url = "file:///tmp/index.bundle.js"
            executor_name = "quickjs"
            app_name = "Demo"
            watch_bundle = true

            [initial_properties]
            theme = "dark"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.executor_name.as_deref(), Some("quickjs"));
        assert_eq!(config.app_name.as_deref(), Some("Demo"));
        assert!(config.watch_bundle);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.show_targets);
        assert_eq!(
            config.initial_properties,
            Some(serde_json::json!({ "theme": "dark" }))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_serialization() {
        let mut config = BridgeConfig::default();
        config.bundle_url = Some("file:///tmp/index.bundle.js".to_string());
        config.plugins_path = Some(PathBuf::from("/opt/plugins"));
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: BridgeConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_json_serialization() {
        let mut config = BridgeConfig::default();
        config.executor_name = Some("quickjs-worker".to_string());
        let json_str = serde_json::to_string(&config).unwrap();
        let parsed = BridgeConfig::from_json_str(&json_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BridgeConfig::default();
        config.app_name = Some("Demo".to_string());

        let toml_path = dir.path().join("bridge.toml");
        config.save_toml(&toml_path).unwrap();
        assert_eq!(BridgeConfig::from_file(&toml_path).unwrap(), config);

        let json_path = dir.path().join("bridge.json");
        config.save_json(&json_path).unwrap();
        assert_eq!(BridgeConfig::from_file(&json_path).unwrap(), config);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = BridgeConfig::default();
        config.executor_name = Some("  ".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = BridgeConfig::default();
        config.initial_properties = Some(serde_json::json!([1, 2]));
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.bundle_url = Some("http://[::1".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("BRIDGE_EXECUTOR", "quickjs-worker");
        env::set_var("BRIDGE_WATCH_BUNDLE", "true");
        let mut config = BridgeConfig::default();
        config.apply_env_overrides();
        env::remove_var("BRIDGE_EXECUTOR");
        env::remove_var("BRIDGE_WATCH_BUNDLE");

        assert_eq!(config.executor_name.as_deref(), Some("quickjs-worker"));
        assert!(config.watch_bundle);
    }
}
