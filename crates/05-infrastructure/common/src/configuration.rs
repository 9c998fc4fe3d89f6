//! 引擎配置
//!
//! 配置来源按优先级从低到高：内置默认值、TOML 配置文件、`LORN_DI__` 前缀的环境变量。

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "LORN_DI";

/// 常量区默认容量上限
pub const DEFAULT_MAX_ARENA_CAPACITY: usize = 65_536;

/// 依赖注入引擎配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 是否默认允许绑定静态成员
    pub allow_static_field_binding: bool,
    /// 常量区容量上限
    pub max_arena_capacity: usize,
    /// 日志设置
    pub logging: LoggingSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allow_static_field_binding: false,
            max_arena_capacity: DEFAULT_MAX_ARENA_CAPACITY,
            logging: LoggingSettings::default(),
        }
    }
}

/// 日志设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// 日志级别（trace/debug/info/warn/error）
    pub level: String,
    /// 是否使用 JSON 格式
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// 加载配置
    ///
    /// `path` 指向可选的 TOML 文件；文件不存在时忽略。
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!("添加配置文件: {}", path.display());
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        info!(
            max_arena_capacity = config.max_arena_capacity,
            allow_static_field_binding = config.allow_static_field_binding,
            "引擎配置加载完成"
        );
        Ok(config)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_arena_capacity == 0 {
            return Err(ConfigError::ValidationError {
                message: "max_arena_capacity 必须大于 0".to_string(),
            });
        }
        match self.logging.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(ConfigError::ValidationError {
                message: format!("未知的日志级别: {other}"),
            }),
        }
    }
}
