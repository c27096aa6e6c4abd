use anyhow::{bail, Result};
use std::collections::HashSet;
use tracing::warn;

use super::FarmConfig;
use crate::account::AccountCredential;

/// 配置验证器 - 负责所有配置验证逻辑
pub struct ConfigValidator;

impl ConfigValidator {
    /// 验证端口号
    pub fn validate_port(port: u16, context: &str) -> Result<()> {
        if port == 0 {
            bail!("{}: port cannot be 0", context);
        }
        Ok(())
    }

    /// 验证地址不为空
    pub fn validate_address(addr: &str, context: &str) -> Result<()> {
        if addr.trim().is_empty() {
            bail!("{}: address cannot be empty", context);
        }
        Ok(())
    }

    /// 验证完整配置
    pub fn validate_farm_config(config: &FarmConfig) -> Result<()> {
        Self::validate_address(&config.endpoint.host, "Endpoint host")?;
        Self::validate_port(config.endpoint.port, "Endpoint")?;

        if !config.endpoint.path.starts_with('/') {
            bail!(
                "Endpoint path must start with '/' (got '{}')",
                config.endpoint.path
            );
        }

        let policy = &config.policy;
        if policy.max_retries == 0 {
            bail!("policy.max_retries must be at least 1");
        }
        if policy.heartbeat_secs == 0 {
            bail!("policy.heartbeat_secs must be greater than 0");
        }
        if policy.connect_timeout_secs == 0 {
            bail!("policy.connect_timeout_secs must be greater than 0");
        }

        if config.tls.skip_verify {
            warn!("TLS certificate verification is disabled (tls.skip_verify = true)");
        }

        Ok(())
    }

    /// 验证账号列表
    ///
    /// 代理描述串错误只会让对应账号启动失败，这里仅给出警告。
    pub fn validate_accounts(accounts: &[AccountCredential]) -> Result<()> {
        if accounts.is_empty() {
            bail!("No accounts defined");
        }

        let mut seen_ids = HashSet::new();
        for (index, account) in accounts.iter().enumerate() {
            if account.account_id.trim().is_empty() {
                bail!("Account #{}: account_id cannot be empty", index + 1);
            }
            if !seen_ids.insert(account.account_id.as_str()) {
                bail!(
                    "Duplicate account_id '{}': each account must be unique",
                    account.account_id
                );
            }
            if account.access_token.trim().is_empty() {
                bail!(
                    "Account '{}': access_token cannot be empty",
                    account.account_id
                );
            }
            if let Err(e) = account.proxy_spec() {
                warn!("Account '{}' will not start: {}", account.account_id, e);
            }
        }

        Ok(())
    }

    /// 返回代理描述串无效的账号及原因
    pub fn invalid_proxies(accounts: &[AccountCredential]) -> Vec<(String, String)> {
        accounts
            .iter()
            .filter_map(|account| {
                account
                    .proxy_spec()
                    .err()
                    .map(|e| (account.account_id.clone(), e.to_string()))
            })
            .collect()
    }
}
