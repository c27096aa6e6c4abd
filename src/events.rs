/// 事件日志
///
/// 两个独立的环形缓冲区（连接日志 / 服务器响应），每个只保留最近
/// `capacity` 条事件，供仪表盘读取。每条事件同时写入 tracing。
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 每个通道默认保留的事件数
pub const DEFAULT_LOG_CAPACITY: usize = 30;

/// 事件通道
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// 连接生命周期
    Connection,
    /// 服务器响应
    Response,
}

/// 事件颜色 / 严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Muted,
    Cyan,
    Magenta,
    Green,
    Yellow,
    Red,
}

/// 单条日志事件
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub channel: Channel,
    pub tone: Tone,
    pub account_id: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(
        channel: Channel,
        tone: Tone,
        account_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            channel,
            tone,
            account_id: account_id.into(),
            message: message.into(),
        }
    }

    /// `[Acc. id] message`
    pub fn text(&self) -> String {
        format!("[Acc. {}] {}", self.account_id, self.message)
    }

    fn trace(&self) {
        let channel = match self.channel {
            Channel::Connection => "connection",
            Channel::Response => "response",
        };
        match self.tone {
            Tone::Red => error!(account = %self.account_id, channel, "{}", self.message),
            Tone::Yellow => warn!(account = %self.account_id, channel, "{}", self.message),
            Tone::Muted => debug!(account = %self.account_id, channel, "{}", self.message),
            _ => info!(account = %self.account_id, channel, "{}", self.message),
        }
    }
}

#[derive(Debug)]
struct RingLog {
    entries: VecDeque<LogEvent>,
    capacity: usize,
}

impl RingLog {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, event: LogEvent) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(event);
    }
}

/// 线程安全的事件汇聚点（克隆后共享同一份缓冲区）
#[derive(Debug, Clone)]
pub struct EventSink {
    connection: Arc<Mutex<RingLog>>,
    response: Arc<Mutex<RingLog>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            connection: Arc::new(Mutex::new(RingLog::new(capacity))),
            response: Arc::new(Mutex::new(RingLog::new(capacity))),
        }
    }

    /// 写入一条事件，超出容量时淘汰最旧的
    pub fn push(&self, event: LogEvent) {
        event.trace();
        self.ring(event.channel).lock().push(event);
    }

    /// 记录连接生命周期事件
    pub fn connection(&self, account_id: &str, tone: Tone, message: impl Into<String>) {
        self.push(LogEvent::new(Channel::Connection, tone, account_id, message));
    }

    /// 记录服务器响应事件
    pub fn response(&self, account_id: &str, tone: Tone, message: impl Into<String>) {
        self.push(LogEvent::new(Channel::Response, tone, account_id, message));
    }

    /// 获取通道快照（从旧到新）
    pub fn snapshot(&self, channel: Channel) -> Vec<LogEvent> {
        self.ring(channel).lock().entries.iter().cloned().collect()
    }

    pub fn len(&self, channel: Channel) -> usize {
        self.ring(channel).lock().entries.len()
    }

    pub fn is_empty(&self, channel: Channel) -> bool {
        self.len(channel) == 0
    }

    fn ring(&self, channel: Channel) -> &Mutex<RingLog> {
        match channel {
            Channel::Connection => &self.connection,
            Channel::Response => &self.response,
        }
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}
