//! # 孕产妇保健管理模块
//!
//! 提供配置管理与日志初始化等运维功能

pub mod config;
pub mod logging;

pub use config::{
    ConfigManager, ConfigValidator, LogFormat, LoggingConfig, MaternalConfig, PartographConfig,
    StorageConfig,
};
pub use logging::init_tracing;
