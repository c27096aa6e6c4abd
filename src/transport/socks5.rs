use super::{Transport, TransportDialer, TransportType};
use crate::error::{FarmError, Result};
use crate::proxy_spec::ProxySpec;
use async_trait::async_trait;
use std::pin::Pin;
use tokio_socks::tcp::Socks5Stream;
use tracing::debug;

/// SOCKS5 隧道拨号器
#[derive(Debug, Clone)]
pub struct Socks5Dialer {
    proxy: ProxySpec,
}

impl Socks5Dialer {
    pub fn new(proxy: ProxySpec) -> Self {
        Self { proxy }
    }
}

/// 代理库的各类错误统一为带原因文本的连接失败
///
/// 连不上代理本身（拒绝 / 不可达 / I/O）与代理握手阶段的失败分开标注。
fn normalize(err: tokio_socks::Error) -> FarmError {
    match err {
        tokio_socks::Error::Io(e) => {
            FarmError::connection_failure(format!("Proxy connection error: {}", e))
        }
        unreachable @ tokio_socks::Error::ProxyServerUnreachable => {
            FarmError::connection_failure(format!("Proxy connection error: {}", unreachable))
        }
        other => FarmError::connection_failure(format!("Proxy error: {}", other)),
    }
}

#[async_trait]
impl TransportDialer for Socks5Dialer {
    async fn dial(&self, host: &str, port: u16) -> Result<Pin<Box<dyn Transport>>> {
        let proxy_addr = (self.proxy.host.as_str(), self.proxy.port);
        debug!("Opening SOCKS5 tunnel via {} to {}:{}", self.proxy, host, port);

        let stream = match self.proxy.credentials() {
            Some((username, password)) => {
                Socks5Stream::connect_with_password(proxy_addr, (host, port), username, password)
                    .await
            }
            None => Socks5Stream::connect(proxy_addr, (host, port)).await,
        }
        .map_err(normalize)?;

        Ok(Box::pin(stream))
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Socks5
    }
}
