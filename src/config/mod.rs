// 配置管理模块

mod validator;

pub use validator::ConfigValidator;

use crate::account::AccountCredential;
use crate::worker::RetryPolicy;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "PULSE_TUNNEL_";

/// 远端服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// 服务器主机名（同时用作 TLS SNI）
    #[serde(default = "default_host")]
    pub host: String,
    /// 服务器端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// WebSocket 路径
    #[serde(default = "default_path")]
    pub path: String,
    /// 协议版本（作为 `version` 查询参数发送）
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_host() -> String {
    "secure.ws.teneo.pro".to_string()
}

fn default_port() -> u16 {
    443
}

fn default_path() -> String {
    "/websocket".to_string()
}

fn default_version() -> String {
    "v0.2".to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
            version: default_version(),
        }
    }
}

/// 重试与心跳策略（秒）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_close_grace_secs")]
    pub close_grace_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_secs() -> u64 {
    5
}

fn default_heartbeat_secs() -> u64 {
    10
}

fn default_close_grace_secs() -> u64 {
    2
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_secs: default_backoff_secs(),
            heartbeat_secs: default_heartbeat_secs(),
            close_grace_secs: default_close_grace_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl PolicyConfig {
    /// 转换为 worker 使用的策略
    pub fn to_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: Duration::from_secs(self.backoff_secs),
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs),
            close_grace: Duration::from_secs(self.close_grace_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    /// 使用 `PULSE_TUNNEL_*` 环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_value("MAX_RETRIES") {
            self.max_retries = v;
        }
        if let Some(v) = env_value("BACKOFF_SECS") {
            self.backoff_secs = v;
        }
        if let Some(v) = env_value("HEARTBEAT_SECS") {
            self.heartbeat_secs = v;
        }
    }
}

fn env_value<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(format!("{}{}", ENV_PREFIX, name))
        .ok()
        .and_then(|v| v.parse().ok())
}

/// TLS 配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    /// CA 证书路径（可选，默认使用系统证书）
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,
    /// 是否跳过证书验证（仅用于测试）
    #[serde(default)]
    pub skip_verify: bool,
}

/// 流量统计配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeteringConfig {
    /// 是否统计直连账号的流量（默认只统计走代理的账号）
    #[serde(default)]
    pub meter_direct: bool,
}

/// 完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FarmConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub metering: MeteringConfig,
}

impl FarmConfig {
    /// 验证配置
    pub fn validate(&self) -> anyhow::Result<()> {
        ConfigValidator::validate_farm_config(self)
    }
}

/// 应用配置加载入口
pub struct AppConfig;

impl AppConfig {
    /// 从 TOML 文件加载配置并应用环境变量覆盖
    pub fn load_farm_config(path: &str) -> anyhow::Result<FarmConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path))?;
        let mut config = Self::parse_farm_config(&content)?;
        config.policy.apply_env_overrides();
        config
            .validate()
            .context("Configuration validation failed")?;
        Ok(config)
    }

    /// 解析 TOML 配置内容
    pub fn parse_farm_config(content: &str) -> anyhow::Result<FarmConfig> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    /// 加载并验证账号列表
    pub fn load_accounts(path: &str) -> anyhow::Result<Vec<AccountCredential>> {
        let accounts = crate::account::load_accounts(path)?;
        ConfigValidator::validate_accounts(&accounts).context("Account list validation failed")?;
        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_fixed_constants() {
        let config = AppConfig::parse_farm_config("").unwrap();
        assert_eq!(config.endpoint.host, "secure.ws.teneo.pro");
        assert_eq!(config.endpoint.port, 443);
        assert_eq!(config.endpoint.path, "/websocket");
        assert_eq!(config.endpoint.version, "v0.2");

        let policy = config.policy.to_retry_policy();
        assert_eq!(policy, RetryPolicy::default());
        assert!(!config.metering.meter_direct);
        assert!(!config.tls.skip_verify);
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::parse_farm_config(
            r#"
            [endpoint]
            host = "127.0.0.1"
            port = 9443

            [policy]
            backoff_secs = 1

            [metering]
            meter_direct = true
            "#,
        )
        .unwrap();

        assert_eq!(config.endpoint.host, "127.0.0.1");
        assert_eq!(config.endpoint.port, 9443);
        assert_eq!(config.endpoint.path, "/websocket");
        assert_eq!(config.policy.backoff_secs, 1);
        assert_eq!(config.policy.max_retries, 5);
        assert!(config.metering.meter_direct);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(AppConfig::parse_farm_config("[endpoint\nhost=").is_err());
    }

    #[test]
    fn test_template_parses() {
        let config =
            AppConfig::parse_farm_config(include_str!("../../templates/config-template.toml"))
                .unwrap();
        assert!(config.validate().is_ok());
    }
}
