//! 单个账号的连接生命周期
//!
//! ```text
//! Disconnected → Connecting → Active → Failed → Connecting (重试)
//!                                            ↘ Terminated (预算耗尽)
//!                     Active / Connecting / 退避中 → Terminated (操作员取消)
//! ```
//!
//! 重试预算在每次成功建立会话时重置为上限，每次连接或会话失败减一，
//! 归零时发出一条终止事件并退役。操作员取消不消耗预算。

mod duties;
mod policy;

pub use duties::{drive_session, ping_payload, DutyContext, SessionCounters};
pub use policy::{
    RetryPolicy, BACKOFF_DELAY, CLOSE_GRACE, CONNECT_TIMEOUT, HEARTBEAT_INTERVAL, MAX_RETRIES,
};

use crate::account::AccountCredential;
use crate::connector::{Connect, ConnectRequest};
use crate::error::FarmError;
use crate::events::{EventSink, Tone};
use crate::proxy_spec::ProxySpec;
use crate::session::Session;
use crate::traffic::TrafficAccountant;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Worker 所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connecting,
    Active,
    Failed,
    Terminated,
}

/// Worker 自身的可变状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerState {
    pub account_id: String,
    pub retries_left: u32,
    pub phase: Phase,
    /// 当前（或最近一次）会话发送的字节数
    pub bytes_sent: u64,
    /// 当前（或最近一次）会话接收的字节数
    pub bytes_received: u64,
}

/// Worker 退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// 连续失败耗尽重试预算
    RetriesExhausted,
    /// 操作员取消
    Cancelled,
    /// 代理描述串无效，未能启动
    InvalidProxy,
}

/// Worker 结束时的汇总
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub account_id: String,
    pub exit: ExitReason,
    pub connect_attempts: u32,
    pub sessions_established: u32,
    pub state: WorkerState,
}

/// 失败发生的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// 拨号 / TLS / 升级
    Connect,
    /// Active 会话期间（心跳或监听）
    Session,
}

/// 所有 worker 共享的依赖
#[derive(Clone)]
pub struct WorkerContext {
    pub connector: Arc<dyn Connect>,
    pub events: EventSink,
    pub traffic: TrafficAccountant,
    pub policy: RetryPolicy,
    /// 直连账号是否也计入全局流量
    pub meter_direct: bool,
}

pub struct ConnectionWorker {
    account: AccountCredential,
    ctx: WorkerContext,
    cancel: CancellationToken,
    state: WorkerState,
    connect_attempts: u32,
    sessions_established: u32,
}

impl ConnectionWorker {
    pub fn new(account: AccountCredential, ctx: WorkerContext, cancel: CancellationToken) -> Self {
        let state = WorkerState {
            account_id: account.account_id.clone(),
            retries_left: ctx.policy.max_retries,
            phase: Phase::Disconnected,
            bytes_sent: 0,
            bytes_received: 0,
        };
        Self {
            account,
            ctx,
            cancel,
            state,
            connect_attempts: 0,
            sessions_established: 0,
        }
    }

    /// 运行直到退役或被取消
    pub async fn run(mut self) -> WorkerReport {
        let proxy = match self.account.proxy_spec() {
            Ok(proxy) => proxy,
            Err(e) => {
                self.log(Tone::Red, e.to_string());
                return self.finish(ExitReason::InvalidProxy);
            }
        };

        loop {
            let (failure, stage) = match self.attempt(proxy.as_ref()).await {
                (FarmError::Cancelled, _) => {
                    self.log(Tone::Yellow, "Graceful shutdown");
                    return self.finish(ExitReason::Cancelled);
                }
                outcome => outcome,
            };

            if self.register_failure(&failure, stage, proxy.is_some()) {
                return self.finish(ExitReason::RetriesExhausted);
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.log(Tone::Yellow, "Graceful shutdown");
                    return self.finish(ExitReason::Cancelled);
                }
                _ = tokio::time::sleep(self.ctx.policy.backoff) => {}
            }
        }
    }

    /// 一次 Connecting → Active 周期，返回结束原因及其所在阶段
    async fn attempt(&mut self, proxy: Option<&ProxySpec>) -> (FarmError, Stage) {
        self.enter(Phase::Connecting);
        self.connect_attempts += 1;

        let request = ConnectRequest {
            account: &self.account,
            proxy,
            events: &self.ctx.events,
        };
        let connected = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return (FarmError::Cancelled, Stage::Connect),
            result = self.ctx.connector.connect(request) => result,
        };

        match connected {
            Ok(session) => (
                self.run_active(session, proxy.is_some()).await,
                Stage::Session,
            ),
            Err(e) => (e, Stage::Connect),
        }
    }

    async fn run_active(&mut self, mut session: Session, proxied: bool) -> FarmError {
        self.sessions_established += 1;
        self.state.retries_left = self.ctx.policy.max_retries;
        self.enter(Phase::Active);

        let counters = SessionCounters::default();
        let duty_ctx = DutyContext {
            account_id: &self.account.account_id,
            events: &self.ctx.events,
            traffic: &self.ctx.traffic,
            heartbeat_interval: self.ctx.policy.heartbeat_interval,
            meter: proxied || self.ctx.meter_direct,
            counters: &counters,
        };

        let outcome = drive_session(&mut session, &duty_ctx, &self.cancel).await;

        self.state.bytes_sent = counters.sent();
        self.state.bytes_received = counters.received();
        debug!(
            account = %self.account.account_id,
            sent = self.state.bytes_sent,
            received = self.state.bytes_received,
            "Session ended: {}",
            outcome
        );

        if outcome.is_cancelled() {
            let acknowledged = session.close(self.ctx.policy.close_grace).await;
            debug!(
                account = %self.account.account_id,
                "Session closed with code 1000 (acknowledged: {})",
                acknowledged
            );
        }
        outcome
    }

    /// 记录一次失败；返回预算是否已经耗尽
    fn register_failure(&mut self, failure: &FarmError, stage: Stage, proxied: bool) -> bool {
        self.enter(Phase::Failed);
        self.state.retries_left = self.state.retries_left.saturating_sub(1);

        let used = self.ctx.policy.max_retries - self.state.retries_left;
        let label = match (stage, failure) {
            (Stage::Connect, FarmError::ConnectionFailure(_)) if proxied => "Proxy error",
            (Stage::Connect, FarmError::ConnectionFailure(_)) => "Connect error",
            _ => "Error",
        };
        self.log(
            Tone::Red,
            format!(
                "{} ({}/{}): {}",
                label, used, self.ctx.policy.max_retries, failure
            ),
        );

        if self.state.retries_left == 0 {
            self.log(Tone::Red, "Retries exhausted, worker retired");
            return true;
        }
        false
    }

    fn enter(&mut self, phase: Phase) {
        debug!(
            account = %self.account.account_id,
            "{:?} -> {:?} (retries left: {})",
            self.state.phase,
            phase,
            self.state.retries_left
        );
        self.state.phase = phase;
    }

    fn log(&self, tone: Tone, message: impl Into<String>) {
        self.ctx
            .events
            .connection(&self.account.account_id, tone, message);
    }

    fn finish(mut self, exit: ExitReason) -> WorkerReport {
        self.enter(Phase::Terminated);
        info!(
            account = %self.account.account_id,
            "Worker finished: {:?} after {} attempts",
            exit,
            self.connect_attempts
        );
        WorkerReport {
            account_id: self.account.account_id,
            exit,
            connect_attempts: self.connect_attempts,
            sessions_established: self.sessions_established,
            state: self.state,
        }
    }
}
