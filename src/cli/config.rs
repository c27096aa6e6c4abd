use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{AppConfig, ConfigValidator};

/// 检查文件权限（仅Unix系统）
#[cfg(unix)]
pub fn check_config_file_permissions(config_path: &str) -> Result<()> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tracing::warn;

    let metadata = fs::metadata(config_path)
        .with_context(|| format!("Failed to read metadata for file: {}", config_path))?;
    let mode = metadata.permissions().mode();

    // 检查是否组用户或其他用户可读（g+r / o+r）
    if mode & 0o044 != 0 {
        warn!(
            "⚠️  SECURITY WARNING: '{}' is readable by group or others (permissions: {:o})\n\
             This file may contain access tokens.\n\
             RECOMMENDATION: chmod 600 {}",
            config_path,
            mode & 0o777,
            config_path
        );
    }

    Ok(())
}

/// Windows系统不进行权限检查
#[cfg(not(unix))]
pub fn check_config_file_permissions(_config_path: &str) -> Result<()> {
    Ok(())
}

/// Expand path with tilde (~) and make it absolute
pub fn expand_path(path: &str) -> Result<String> {
    let expanded = shellexpand::tilde(path);
    let path_buf = PathBuf::from(expanded.as_ref());

    if path_buf.is_absolute() {
        Ok(expanded.into_owned())
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&path_buf)
            .to_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid path: {}", path))
    }
}

#[derive(Serialize)]
struct CheckResult {
    valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    details: serde_json::Value,
}

impl CheckResult {
    fn print(&self) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(self)?);
        Ok(())
    }
}

/// Check configuration file and (optionally) the account list
pub fn check_config(config_path: &str, accounts_path: Option<&str>, format: &str) -> Result<()> {
    let json = format == "json";

    if !Path::new(config_path).exists() {
        let message = format!("Configuration file not found: {}", config_path);
        if json {
            CheckResult {
                valid: false,
                warnings: vec![],
                error: Some(message.clone()),
                details: serde_json::json!({}),
            }
            .print()?;
        } else {
            println!("✗ {}", message);
        }
        anyhow::bail!(message);
    }

    if !json {
        println!("Checking configuration file: {}\n", config_path);
    }

    let config = match AppConfig::load_farm_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            if json {
                CheckResult {
                    valid: false,
                    warnings: vec![],
                    error: Some(format!("{:#}", e)),
                    details: serde_json::json!({}),
                }
                .print()?;
            } else {
                println!("✗ Configuration validation failed!");
                println!("\nError details:");
                println!("{:#}", e);
            }
            return Err(e);
        }
    };

    let mut warnings = Vec::new();
    let mut details = serde_json::json!({
        "endpoint": format!("{}:{}{}", config.endpoint.host, config.endpoint.port, config.endpoint.path),
        "version": config.endpoint.version,
        "max_retries": config.policy.max_retries,
        "backoff_secs": config.policy.backoff_secs,
        "heartbeat_secs": config.policy.heartbeat_secs,
        "meter_direct": config.metering.meter_direct,
    });

    if let Some(ref ca_path) = config.tls.ca_cert_path {
        details["ca_cert_path"] = serde_json::json!(ca_path);
        if !ca_path.exists() {
            warnings.push(format!("CA certificate file not found: {:?}", ca_path));
        }
    }
    if config.tls.skip_verify {
        warnings.push("TLS certificate verification is disabled".to_string());
    }

    let accounts = match accounts_path {
        Some(path) => match AppConfig::load_accounts(path) {
            Ok(accounts) => Some(accounts),
            Err(e) => {
                if json {
                    CheckResult {
                        valid: false,
                        warnings,
                        error: Some(format!("{:#}", e)),
                        details,
                    }
                    .print()?;
                } else {
                    println!("✗ Account list validation failed!");
                    println!("\nError details:");
                    println!("{:#}", e);
                }
                return Err(e);
            }
        },
        None => None,
    };

    if let Some(ref accounts) = accounts {
        let proxied = accounts.iter().filter(|a| a.proxy.is_some()).count();
        let invalid = ConfigValidator::invalid_proxies(accounts);
        for (id, reason) in &invalid {
            warnings.push(format!("Account '{}' will not start: {}", id, reason));
        }
        details["accounts"] = serde_json::json!(accounts.len());
        details["proxied_accounts"] = serde_json::json!(proxied);
        details["invalid_proxies"] = serde_json::json!(invalid.len());
    }

    if json {
        CheckResult {
            valid: true,
            warnings,
            error: None,
            details,
        }
        .print()?;
        return Ok(());
    }

    println!(
        "✓ Endpoint: wss://{}:{}{} (version {})",
        config.endpoint.host, config.endpoint.port, config.endpoint.path, config.endpoint.version
    );
    println!(
        "✓ Retry policy: {} retries, {}s backoff, {}s heartbeat",
        config.policy.max_retries, config.policy.backoff_secs, config.policy.heartbeat_secs
    );
    println!("✓ Meter direct connections: {}", config.metering.meter_direct);
    if let Some(ref accounts) = accounts {
        println!("✓ Number of accounts: {}", accounts.len());
        for (idx, account) in accounts.iter().enumerate() {
            let route = match account.proxy_spec() {
                Ok(Some(proxy)) => format!("via {}", proxy),
                Ok(None) => "direct".to_string(),
                Err(_) => "invalid proxy".to_string(),
            };
            println!("  Account #{}: '{}' ({})", idx + 1, account.account_id, route);
        }
    }
    for warning in &warnings {
        println!("⚠ Warning: {}", warning);
    }
    println!("\n✓ Configuration is valid!");

    Ok(())
}
