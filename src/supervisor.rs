/// Supervisor：每个账号一个独立的 worker
///
/// worker 之间除了共享的 `EventSink` 与 `TrafficAccountant` 外没有任何协调。
/// 退役的 worker 不会被重启。
use crate::account::AccountCredential;
use crate::worker::{ConnectionWorker, WorkerContext, WorkerReport};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct Supervisor {
    ctx: WorkerContext,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(ctx: WorkerContext) -> Self {
        Self {
            ctx,
            shutdown: CancellationToken::new(),
        }
    }

    /// 取消令牌，可交给信号处理或仪表盘
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 通知所有 worker 关闭（重复调用无额外效果）
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Shutdown requested, closing all sessions...");
        }
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// 为每个账号启动 worker，等待全部结束
    ///
    /// 返回的报告按账号在列表中的顺序排列；崩溃的 worker 只记录日志。
    pub async fn run(&self, accounts: Vec<AccountCredential>) -> Vec<WorkerReport> {
        info!("Starting {} workers", accounts.len());

        let mut workers = JoinSet::new();
        for (index, account) in accounts.into_iter().enumerate() {
            let worker =
                ConnectionWorker::new(account, self.ctx.clone(), self.shutdown.child_token());
            workers.spawn(async move { (index, worker.run().await) });
        }

        let mut reports = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, report)) => {
                    info!(
                        account = %report.account_id,
                        "Worker exited: {:?} ({} sessions)",
                        report.exit,
                        report.sessions_established
                    );
                    reports.push((index, report));
                }
                Err(e) => error!("Worker task failed: {}", e),
            }
        }

        reports.sort_by_key(|(index, _)| *index);
        reports.into_iter().map(|(_, report)| report).collect()
    }
}
