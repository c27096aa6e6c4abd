/// Active 状态下的两个并发任务：心跳与监听
///
/// 两者在同一个 `select!` 中轮询，任何一方结束（只会以失败结束）时
/// 另一方立即被丢弃；取消信号同样会同时终止两者。
use crate::error::FarmError;
use crate::events::{EventSink, Tone};
use crate::inbound::Inbound;
use crate::session::{MessageSink, MessageStream, Session};
use crate::traffic::TrafficAccountant;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;

/// 对端未给出关闭码时使用的 1006（异常关闭）
const ABNORMAL_CLOSURE: u16 = 1006;

/// 心跳负载 `{"type":"PING"}`
pub fn ping_payload() -> String {
    serde_json::json!({ "type": "PING" }).to_string()
}

/// 单个会话的收发字节数
#[derive(Debug, Default)]
pub struct SessionCounters {
    sent: AtomicU64,
    received: AtomicU64,
}

impl SessionCounters {
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

/// 两个任务共享的只读上下文
pub struct DutyContext<'a> {
    pub account_id: &'a str,
    pub events: &'a EventSink,
    pub traffic: &'a TrafficAccountant,
    pub heartbeat_interval: Duration,
    /// 是否把字节数计入全局流量
    pub meter: bool,
    pub counters: &'a SessionCounters,
}

impl DutyContext<'_> {
    fn record_sent(&self, bytes: usize) {
        self.counters.sent.fetch_add(bytes as u64, Ordering::Relaxed);
        if self.meter {
            self.traffic.add(bytes as u64);
        }
    }

    fn record_received(&self, bytes: usize) {
        self.counters
            .received
            .fetch_add(bytes as u64, Ordering::Relaxed);
        if self.meter {
            self.traffic.add(bytes as u64);
        }
    }

    fn report_inbound(&self, payload: &str) {
        let inbound = Inbound::classify(payload);
        self.events
            .response(self.account_id, inbound.tone(), inbound.describe());
    }
}

/// 运行心跳与监听直到其中之一失败或收到取消信号
///
/// 返回值只可能是 `ConnectionFailure`（心跳发送失败）、
/// `SessionClosed`（远端关闭 / 接收失败）或 `Cancelled`。
pub async fn drive_session(
    session: &mut Session,
    ctx: &DutyContext<'_>,
    cancel: &CancellationToken,
) -> FarmError {
    let Session { sink, stream } = session;

    tokio::select! {
        biased;
        _ = cancel.cancelled() => FarmError::Cancelled,
        err = heartbeat(sink, ctx) => err,
        err = listen(stream, ctx) => err,
    }
}

async fn heartbeat(sink: &mut MessageSink, ctx: &DutyContext<'_>) -> FarmError {
    loop {
        let payload = ping_payload();
        let bytes = payload.len();

        if let Err(e) = sink.send(Message::text(payload)).await {
            ctx.events
                .connection(ctx.account_id, Tone::Red, format!("Ping error: {}", e));
            return FarmError::connection_failure(format!("Ping error: {}", e));
        }
        ctx.record_sent(bytes);
        ctx.events.connection(ctx.account_id, Tone::Muted, "Ping");

        tokio::time::sleep(ctx.heartbeat_interval).await;
    }
}

async fn listen(stream: &mut MessageStream, ctx: &DutyContext<'_>) -> FarmError {
    loop {
        let code = match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                ctx.record_received(text.len());
                ctx.report_inbound(text.as_str());
                continue;
            }
            Some(Ok(Message::Binary(data))) => {
                ctx.record_received(data.len());
                ctx.report_inbound(&String::from_utf8_lossy(&data));
                continue;
            }
            // Ping 由协议层自动回复
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
            Some(Ok(Message::Close(frame))) => frame
                .map(|f| u16::from(f.code))
                .unwrap_or(ABNORMAL_CLOSURE),
            Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                ABNORMAL_CLOSURE
            }
            Some(Err(e)) => {
                ctx.events
                    .connection(ctx.account_id, Tone::Red, format!("Receive error: {}", e));
                return FarmError::session_closed(format!("Receive error: {}", e));
            }
        };

        ctx.events.connection(
            ctx.account_id,
            Tone::Yellow,
            format!("Connection closed (code: {})", code),
        );
        return FarmError::session_closed(format!("remote closed (code: {})", code));
    }
}
