use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path};

use crate::errors::ConfigError;

// 环境变量覆盖
const ENV_IMPLICIT_REGISTRATION: &str = "KERNEL_DI_IMPLICIT_REGISTRATION";
const ENV_MAX_RESOLUTION_DEPTH: &str = "KERNEL_DI_MAX_RESOLUTION_DEPTH";
const ENV_TRACE_RESOLUTIONS: &str = "KERNEL_DI_TRACE_RESOLUTIONS";

/// 内核配置
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// 没有提供者时，首次解析可构造的令牌会自动注册
    #[serde(default = "default_implicit_registration")]
    pub implicit_registration: bool,

    /// 解析路径的最大长度
    #[serde(default = "default_max_resolution_depth")]
    pub max_resolution_depth: usize,

    /// 每次解析都输出一条调试事件
    #[serde(default)]
    pub trace_resolutions: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            implicit_registration: default_implicit_registration(),
            max_resolution_depth: default_max_resolution_depth(),
            trace_resolutions: false,
        }
    }
}

fn default_implicit_registration() -> bool {
    true
}

fn default_max_resolution_depth() -> usize {
    512
}

impl KernelConfig {
    /// 从 TOML 文本解析，缺失的键使用默认值
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)
            .map_err(|e| ConfigError::TomlParse("<inline>".to_string(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::info!("正在读取内核配置文件: {:?}", path);

        let content = match std::fs::read_to_string(path) {
            Ok(content) => {
                tracing::debug!("配置文件读取成功，大小: {} 字节", content.len());
                content
            }
            Err(e) => {
                tracing::error!("读取配置文件失败 {:?}: {}", path, e);
                return Err(ConfigError::FileRead(path.to_string_lossy().to_string(), e));
            }
        };

        let config: Self = match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("解析配置文件失败 {:?}: {}", path, e);
                return Err(ConfigError::TomlParse(path.to_string_lossy().to_string(), e));
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// 用预先取得的环境变量表应用 `KERNEL_DI_*` 覆盖
    pub fn with_env_overrides(mut self, env_map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        if let Some(value) = env_map.get(ENV_IMPLICIT_REGISTRATION) {
            self.implicit_registration = parse_bool(ENV_IMPLICIT_REGISTRATION, value)?;
        }
        if let Some(value) = env_map.get(ENV_MAX_RESOLUTION_DEPTH) {
            self.max_resolution_depth =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        field: ENV_MAX_RESOLUTION_DEPTH.to_string(),
                        reason: format!("'{}' is not a positive integer", value),
                    })?;
        }
        if let Some(value) = env_map.get(ENV_TRACE_RESOLUTIONS) {
            self.trace_resolutions = parse_bool(ENV_TRACE_RESOLUTIONS, value)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// 同 [`with_env_overrides`](Self::with_env_overrides)，读取进程环境变量
    pub fn from_env(self) -> Result<Self, ConfigError> {
        let env_map: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with("KERNEL_DI_"))
            .collect();
        self.with_env_overrides(&env_map)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_resolution_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_resolution_depth".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{}' is not a boolean", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_env_map(vars: &[(&str, &str)]) -> HashMap<String, String> {
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = KernelConfig::default();
        assert!(config.implicit_registration);
        assert_eq!(config.max_resolution_depth, 512);
        assert!(!config.trace_resolutions);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = KernelConfig::from_toml_str("trace_resolutions = true").unwrap();
        assert!(config.trace_resolutions);
        assert!(config.implicit_registration);
        assert_eq!(config.max_resolution_depth, 512);
    }

    #[test]
    fn test_zero_depth_is_rejected() {
        let result = KernelConfig::from_toml_str("max_resolution_depth = 0");
        assert!(matches!(result, Err(ConfigError::InvalidValue { field, .. }) if field == "max_resolution_depth"));
    }

    #[test]
    fn test_from_file() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "implicit_registration = false")?;
        writeln!(file, "max_resolution_depth = 64")?;

        let config = KernelConfig::from_file(file.path())?;
        assert!(!config.implicit_registration);
        assert_eq!(config.max_resolution_depth, 64);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let result = KernelConfig::from_file("/definitely/not/here/kernel.toml");
        assert!(matches!(result, Err(ConfigError::FileRead(..))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = KernelConfig::from_toml_str("max_resolution_depth = \"deep\"");
        assert!(matches!(result, Err(ConfigError::TomlParse(..))));
    }

    #[test]
    fn test_env_overrides() {
        let env = make_env_map(&[
            (ENV_IMPLICIT_REGISTRATION, "off"),
            (ENV_MAX_RESOLUTION_DEPTH, "32"),
            (ENV_TRACE_RESOLUTIONS, "TRUE"),
        ]);
        let config = KernelConfig::default().with_env_overrides(&env).unwrap();
        assert!(!config.implicit_registration);
        assert_eq!(config.max_resolution_depth, 32);
        assert!(config.trace_resolutions);

        let env = make_env_map(&[(ENV_TRACE_RESOLUTIONS, "maybe")]);
        assert!(KernelConfig::default().with_env_overrides(&env).is_err());
    }
}
