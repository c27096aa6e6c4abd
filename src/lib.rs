/// Pulse Tunnel 库入口
///
/// 将核心模块导出为库，方便测试和复用
pub mod account;
pub mod cli;
pub mod config;
pub mod connector;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod inbound;
pub mod proxy_spec;
pub mod session;
pub mod supervisor;
pub mod tls;
pub mod traffic;
pub mod transport;
pub mod worker;

// 重新导出常用类型
pub use account::AccountCredential;
pub use config::{AppConfig, FarmConfig};
pub use connector::{Connect, ConnectRequest, TunnelConnector};
pub use error::{FarmError, Result};
pub use events::{Channel, EventSink, LogEvent, Tone};
pub use proxy_spec::ProxySpec;
pub use session::Session;
pub use supervisor::Supervisor;
pub use traffic::TrafficAccountant;
pub use worker::{ConnectionWorker, ExitReason, Phase, RetryPolicy, WorkerContext, WorkerReport};
