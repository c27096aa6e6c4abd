/// 代理描述串解析
///
/// 格式：`[user:pass@]host:port`，IPv6 主机需要使用方括号：`[::1]:1080`。
use crate::error::{FarmError, Result};
use std::fmt;
use std::str::FromStr;

/// SOCKS5 隧道目标
#[derive(Clone, PartialEq, Eq)]
pub struct ProxySpec {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxySpec {
    /// 解析代理描述串
    pub fn parse(descriptor: &str) -> Result<Self> {
        let descriptor = descriptor.trim();
        if descriptor.is_empty() {
            return Err(FarmError::proxy_format("empty descriptor"));
        }

        let (auth, host_port) = match descriptor.split_once('@') {
            Some((auth, rest)) => (Some(auth), rest),
            None => (None, descriptor),
        };

        if host_port.contains('@') {
            return Err(FarmError::proxy_format(format!(
                "unexpected '@' in '{}'",
                descriptor
            )));
        }

        let (username, password) = match auth {
            Some(auth) => {
                let (user, pass) = parse_auth(auth)?;
                (Some(user), Some(pass))
            }
            None => (None, None),
        };

        let (host, port) = parse_host_port(host_port)?;

        Ok(Self {
            host,
            port,
            username,
            password,
        })
    }

    /// 是否携带用户名密码
    pub fn has_auth(&self) -> bool {
        self.username.is_some()
    }

    /// 返回 (username, password)
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

fn parse_auth(auth: &str) -> Result<(String, String)> {
    let mut parts = auth.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(user), Some(pass), None) if !user.is_empty() && !pass.is_empty() => {
            Ok((user.to_string(), pass.to_string()))
        }
        _ => Err(FarmError::proxy_format(
            "auth segment must be exactly 'user:pass'",
        )),
    }
}

fn parse_host_port(host_port: &str) -> Result<(String, u16)> {
    let (host, port) = host_port
        .rsplit_once(':')
        .ok_or_else(|| FarmError::proxy_format(format!("missing port in '{}'", host_port)))?;

    let host = if let Some(inner) = host.strip_prefix('[') {
        inner
            .strip_suffix(']')
            .ok_or_else(|| FarmError::proxy_format(format!("unclosed '[' in '{}'", host_port)))?
    } else if host.contains(':') {
        return Err(FarmError::proxy_format(format!(
            "malformed host:port '{}'",
            host_port
        )));
    } else {
        host
    };

    if host.is_empty() {
        return Err(FarmError::proxy_format(format!("missing host in '{}'", host_port)));
    }

    let port: u16 = port
        .parse()
        .map_err(|_| FarmError::proxy_format(format!("invalid port '{}'", port)))?;
    if port == 0 {
        return Err(FarmError::proxy_format("port cannot be 0"));
    }

    Ok((host.to_string(), port))
}

impl FromStr for ProxySpec {
    type Err = FarmError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ProxySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

// 不输出密码
impl fmt::Debug for ProxySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySpec")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}
