/// 账号凭据
use crate::error::Result;
use crate::proxy_spec::ProxySpec;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// 单个账号：标识、访问令牌、可选的代理描述串
#[derive(Clone, Serialize, Deserialize)]
pub struct AccountCredential {
    #[serde(deserialize_with = "string_or_number")]
    pub account_id: String,
    pub access_token: String,
    #[serde(default)]
    pub proxy: Option<String>,
}

impl AccountCredential {
    pub fn new(
        account_id: impl Into<String>,
        access_token: impl Into<String>,
        proxy: Option<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            access_token: access_token.into(),
            proxy,
        }
    }

    /// 解析代理描述串；未配置（或为空串）时返回 `None`
    pub fn proxy_spec(&self) -> Result<Option<ProxySpec>> {
        match self.proxy.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(descriptor) => ProxySpec::parse(descriptor).map(Some),
        }
    }
}

impl fmt::Debug for AccountCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredential")
            .field("account_id", &self.account_id)
            .field("access_token", &"***")
            .field("proxy", &self.proxy.as_ref().map(|_| "<set>"))
            .finish()
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// 从 JSON 文件加载账号列表（保持文件中的顺序）
pub fn load_accounts(path: impl AsRef<Path>) -> anyhow::Result<Vec<AccountCredential>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read accounts file: {}", path.display()))?;
    parse_accounts(&content)
        .with_context(|| format!("Failed to parse accounts file: {}", path.display()))
}

/// 解析 JSON 账号列表
pub fn parse_accounts(content: &str) -> anyhow::Result<Vec<AccountCredential>> {
    let accounts: Vec<AccountCredential> = serde_json::from_str(content)?;
    Ok(accounts)
}
