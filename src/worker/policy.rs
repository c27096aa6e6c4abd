use std::time::Duration;

/// 重试上限
pub const MAX_RETRIES: u32 = 5;
/// 失败后的等待时间
pub const BACKOFF_DELAY: Duration = Duration::from_secs(5);
/// 心跳间隔
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
/// 正常关闭时等待对端确认的时间
pub const CLOSE_GRACE: Duration = Duration::from_secs(2);
/// 单次连接尝试的超时
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Worker 的重试 / 心跳策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 连续失败多少次后退役（每次成功建立会话后重置）
    pub max_retries: u32,
    pub backoff: Duration,
    pub heartbeat_interval: Duration,
    pub close_grace: Duration,
    pub connect_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            backoff: BACKOFF_DELAY,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            close_grace: CLOSE_GRACE,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}
