mod direct;
mod factory;
mod socks5;

pub use direct::DirectDialer;
pub use factory::create_dialer;
pub use socks5::Socks5Dialer;

use crate::error::Result;
use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};

/// 传输层类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    /// 直连 TCP
    Direct,
    /// 经 SOCKS5 代理的隧道
    Socks5,
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportType::Direct => write!(f, "direct"),
            TransportType::Socks5 => write!(f, "socks5"),
        }
    }
}

/// 传输层连接抽象（TLS 握手之前的字节流）
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

// 为所有满足条件的类型自动实现 Transport
impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// 传输层拨号接口
///
/// 失败统一归一为 `FarmError::ConnectionFailure`，只保留原因文本。
#[async_trait]
pub trait TransportDialer: Send + Sync {
    /// 建立到 `host:port` 的字节流
    async fn dial(&self, host: &str, port: u16) -> Result<Pin<Box<dyn Transport>>>;

    /// 获取传输类型
    fn transport_type(&self) -> TransportType;
}
