/// 错误类型
///
/// 所有会话相关的失败都归一为少数几种可判定的错误，
/// 由 worker 的重试状态机按类型分支，而不是依赖底层库的具体错误。
use thiserror::Error;

/// pulse-tunnel 的主要错误类型
#[derive(Error, Debug)]
pub enum FarmError {
    /// 代理描述串格式错误（不可重试，仅影响该账号）
    #[error("Invalid proxy format: {0}")]
    ProxyFormat(String),

    /// 拨号 / 隧道 / TLS / 升级握手失败，或发送心跳失败
    #[error("{0}")]
    ConnectionFailure(String),

    /// 会话被远端关闭或接收失败
    #[error("Session closed: {0}")]
    SessionClosed(String),

    /// 入站消息无法识别（本地恢复，不会升级为会话失败）
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 操作员取消（不是错误，不消耗重试预算）
    #[error("Cancelled by operator")]
    Cancelled,

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, FarmError>;

impl FarmError {
    /// 创建代理格式错误
    pub fn proxy_format(msg: impl Into<String>) -> Self {
        Self::ProxyFormat(msg.into())
    }

    /// 创建连接失败错误
    pub fn connection_failure(msg: impl Into<String>) -> Self {
        Self::ConnectionFailure(msg.into())
    }

    /// 创建会话关闭错误
    pub fn session_closed(msg: impl Into<String>) -> Self {
        Self::SessionClosed(msg.into())
    }

    /// 创建协议错误
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// 创建配置错误
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// 是否应进入重试流程
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailure(_) | Self::SessionClosed(_)
        )
    }

    /// 检查是否为操作员取消
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// 检查是否为代理格式错误
    pub fn is_proxy_format(&self) -> bool {
        matches!(self, Self::ProxyFormat(_))
    }
}
