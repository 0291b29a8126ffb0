//! 配置管理
//!
//! 默认值、TOML 配置文件与 `MATERNAL_` 环境变量分层加载，支持验证与写回

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use maternal_workflow::{ProgressConfig, VitalThresholds};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 系统完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaternalConfig {
    /// 存储配置
    pub storage: StorageConfig,
    /// 产程图配置
    pub partograph: PartographConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 数据目录
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

/// 产程图配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartographConfig {
    /// 警戒线与处理线
    pub progress: ProgressConfig,
    /// 生命体征阈值
    pub vitals: VitalThresholds,
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Plain,
    Json,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或过滤指令
    pub level: String,
    /// 日志格式
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
        }
    }
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置数据
    config: Arc<RwLock<MaternalConfig>>,
    /// 配置文件路径
    config_path: Option<PathBuf>,
    /// 配置验证器
    validator: ConfigValidator,
}

impl ConfigManager {
    /// 加载配置；未指定文件时仅使用默认值与环境变量
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let validator = ConfigValidator::new();
        let config = Self::load_config(config_path)?;
        validator.validate(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path: config_path.map(Path::to_path_buf),
            validator,
        })
    }

    /// 从默认值、文件和环境变量加载配置
    pub fn load_config(config_path: Option<&Path>) -> Result<MaternalConfig> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&MaternalConfig::default()).context("Failed to build default configuration")?,
        );

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("MATERNAL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration sources")?;

        let config: MaternalConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        match config_path {
            Some(path) => info!("Configuration loaded successfully from: {}", path.display()),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    /// 获取配置
    pub async fn get_config(&self) -> MaternalConfig {
        let config = self.config.read().await;
        config.clone()
    }

    /// 更新配置并写回文件
    pub async fn update_config(&self, new_config: MaternalConfig) -> Result<()> {
        self.validator.validate(&new_config)?;

        {
            let mut config = self.config.write().await;
            *config = new_config;
        }

        self.save_config().await?;

        info!("Configuration updated successfully");
        Ok(())
    }

    /// 保存配置到文件
    pub async fn save_config(&self) -> Result<()> {
        let path = self
            .config_path
            .as_ref()
            .context("No configuration file path to save to")?;

        let config = self.config.read().await;
        let config_str = toml::to_string_pretty(&*config).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create configuration directory")?;
        }
        tokio::fs::write(path, config_str)
            .await
            .context("Failed to write configuration file")?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// 重新加载配置
    pub async fn reload_config(&self) -> Result<()> {
        let new_config = Self::load_config(self.config_path.as_deref())?;
        self.validator.validate(&new_config)?;

        let mut config = self.config.write().await;
        *config = new_config;
        info!("Configuration reloaded");
        Ok(())
    }

    /// 按点分路径读取配置值，例如 `partograph.progress.stall_threshold_hours`
    pub async fn get_value<T>(&self, path: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let config = self.config.read().await;
        let value = extract_nested_value(&config, path)
            .with_context(|| format!("Configuration path not found: {}", path))?;

        serde_json::from_value(value).context("Failed to deserialize configuration value")
    }

    /// 验证配置
    pub async fn validate_config(&self) -> Result<()> {
        let config = self.config.read().await;
        self.validator.validate(&config)
    }
}

fn extract_nested_value(config: &MaternalConfig, path: &str) -> Result<serde_json::Value> {
    let config_json = serde_json::to_value(config).context("Failed to serialize config to JSON")?;

    let mut current = &config_json;
    for part in path.split('.') {
        match current {
            serde_json::Value::Object(map) => {
                current = map
                    .get(part)
                    .ok_or_else(|| anyhow::anyhow!("Path segment not found: {}", part))?;
            }
            _ => return Err(anyhow::anyhow!("Invalid path at segment: {}", part)),
        }
    }

    Ok(current.clone())
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    /// 验证规则
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    /// 字段路径
    field_path: &'static str,
    /// 验证函数
    validator: fn(&MaternalConfig) -> Result<()>,
}

impl ConfigValidator {
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "storage.data_dir",
                validator: |config| {
                    if config.storage.data_dir.trim().is_empty() {
                        Err(anyhow::anyhow!("数据目录不能为空"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "partograph.progress",
                validator: |config| {
                    config
                        .partograph
                        .progress
                        .validate()
                        .map_err(|e| anyhow::anyhow!("{}", e))
                },
            },
            ValidationRule {
                field_path: "partograph.vitals",
                validator: |config| {
                    let vitals = &config.partograph.vitals;
                    if vitals.fetal_heart_rate_min >= vitals.fetal_heart_rate_max {
                        Err(anyhow::anyhow!("胎心率下限必须低于上限"))
                    } else if !vitals.fever_temperature.is_finite() || vitals.fever_temperature <= 0.0 {
                        Err(anyhow::anyhow!("发热阈值必须为正数"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "logging.level",
                validator: |config| {
                    EnvFilter::try_new(&config.logging.level)
                        .map(|_| ())
                        .map_err(|e| anyhow::anyhow!("日志级别无效: {}", e))
                },
            },
        ];

        Self { validation_rules }
    }

    pub fn validate(&self, config: &MaternalConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(e.context(format!("Invalid configuration at {}", rule.field_path)));
            }
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("maternal-config-{}", uuid::Uuid::new_v4()))
            .join("maternalcare.toml")
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = MaternalConfig::default();
        assert!(ConfigValidator::new().validate(&config).is_ok());
        assert_eq!(config.partograph.progress.stall_threshold_hours, 4.0);
        assert_eq!(config.logging.format, LogFormat::Plain);
    }

    #[test]
    fn test_validator_rejects_bad_values() {
        let validator = ConfigValidator::new();

        let mut config = MaternalConfig::default();
        config.storage.data_dir = "  ".to_string();
        assert!(validator.validate(&config).is_err());

        let mut config = MaternalConfig::default();
        config.partograph.progress.dilation_rate_cm_per_hour = 0.0;
        assert!(validator.validate(&config).is_err());

        let mut config = MaternalConfig::default();
        config.partograph.vitals.fetal_heart_rate_min = 170;
        assert!(validator.validate(&config).is_err());

        let mut config = MaternalConfig::default();
        config.logging.level = "maternal=notalevel".to_string();
        assert!(validator.validate(&config).is_err());
    }

    #[tokio::test]
    async fn test_load_partial_file_over_defaults() {
        let path = temp_config_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"
[storage]
data_dir = "/var/lib/maternalcare"

[partograph.progress]
stall_threshold_hours = 3.0

[logging]
format = "json"
"#,
        )
        .unwrap();

        let manager = ConfigManager::new(Some(&path)).unwrap();
        let config = manager.get_config().await;
        assert_eq!(config.storage.data_dir, "/var/lib/maternalcare");
        assert_eq!(config.partograph.progress.stall_threshold_hours, 3.0);
        assert_eq!(config.partograph.progress.action_offset_hours, 4.0);
        assert_eq!(config.partograph.vitals.fetal_heart_rate_max, 160);
        assert_eq!(config.logging.format, LogFormat::Json);

        let threshold: f64 = manager.get_value("partograph.progress.stall_threshold_hours").await.unwrap();
        assert_eq!(threshold, 3.0);
        assert!(manager.get_value::<f64>("partograph.nope").await.is_err());

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_update_writes_back_to_file() {
        let path = temp_config_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "").unwrap();

        let manager = ConfigManager::new(Some(&path)).unwrap();
        let mut config = manager.get_config().await;
        config.storage.data_dir = "/srv/maternal".to_string();
        manager.update_config(config.clone()).await.unwrap();

        let reloaded = ConfigManager::load_config(Some(&path)).unwrap();
        assert_eq!(reloaded, config);

        let mut invalid = config;
        invalid.storage.data_dir = String::new();
        assert!(manager.update_config(invalid).await.is_err());

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_reload_picks_up_file_changes() {
        let path = temp_config_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

        let manager = ConfigManager::new(Some(&path)).unwrap();
        assert_eq!(manager.get_config().await.logging.level, "warn");

        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();
        manager.reload_config().await.unwrap();
        assert_eq!(manager.get_config().await.logging.level, "debug");
        assert!(manager.validate_config().await.is_ok());

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_save_without_path_fails() {
        let manager = ConfigManager::new(None).unwrap();
        assert!(manager.save_config().await.is_err());
    }
}
