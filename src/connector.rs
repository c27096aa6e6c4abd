/// 隧道连接器
///
/// 每次连接尝试：选择拨号器（直连 / SOCKS5）→ TLS 握手 → WebSocket 升级。
/// 任何一步失败都归一为 `FarmError::ConnectionFailure`。
use crate::account::AccountCredential;
use crate::config::EndpointConfig;
use crate::error::{FarmError, Result};
use crate::events::{EventSink, Tone};
use crate::proxy_spec::ProxySpec;
use crate::session::Session;
use crate::transport::{create_dialer, TransportType};
use async_trait::async_trait;
use rustls::pki_types::ServerName;
use std::time::Duration;
use tokio_rustls::TlsConnector;
use tokio_tungstenite::client_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tracing::debug;
use url::Url;

/// 一次连接尝试所需的全部输入
pub struct ConnectRequest<'a> {
    pub account: &'a AccountCredential,
    pub proxy: Option<&'a ProxySpec>,
    pub events: &'a EventSink,
}

/// 建立会话的接口（worker 通过它连接，测试可替换）
#[async_trait]
pub trait Connect: Send + Sync {
    async fn connect(&self, request: ConnectRequest<'_>) -> Result<Session>;
}

/// 远端服务的 WebSocket 地址，访问令牌作为查询参数
pub fn websocket_url(endpoint: &EndpointConfig, access_token: &str) -> Result<Url> {
    let base = if endpoint.host.contains(':') {
        format!("wss://[{}]:{}{}", endpoint.host, endpoint.port, endpoint.path)
    } else {
        format!("wss://{}:{}{}", endpoint.host, endpoint.port, endpoint.path)
    };
    let mut url = Url::parse(&base)
        .map_err(|e| FarmError::config_error(format!("Invalid endpoint URL '{}': {}", base, e)))?;
    url.query_pairs_mut()
        .append_pair("accessToken", access_token)
        .append_pair("version", &endpoint.version);
    Ok(url)
}

/// 真实连接器：TCP / SOCKS5 → TLS → WebSocket
#[derive(Clone)]
pub struct TunnelConnector {
    endpoint: EndpointConfig,
    tls: TlsConnector,
    connect_timeout: Duration,
}

impl TunnelConnector {
    pub fn new(endpoint: EndpointConfig, tls: TlsConnector, connect_timeout: Duration) -> Self {
        Self {
            endpoint,
            tls,
            connect_timeout,
        }
    }

    async fn establish(&self, request: &ConnectRequest<'_>) -> Result<Session> {
        let host = self.endpoint.host.as_str();
        let port = self.endpoint.port;

        let dialer = create_dialer(request.proxy);
        let transport = dialer.dial(host, port).await?;

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| FarmError::connection_failure(format!("Invalid server name: {}", e)))?;
        let tls_stream = self.tls.connect(server_name, transport).await.map_err(|e| {
            FarmError::connection_failure(format!("TLS handshake failed: {}", e))
        })?;

        let url = websocket_url(&self.endpoint, &request.account.access_token)?;
        let ws_request = url.as_str().into_client_request().map_err(|e| {
            FarmError::connection_failure(format!("Invalid upgrade request: {}", e))
        })?;
        let (ws, response) = client_async(ws_request, tls_stream).await.map_err(|e| {
            FarmError::connection_failure(format!("WebSocket upgrade failed: {}", e))
        })?;
        debug!(
            account = %request.account.account_id,
            "Upgrade completed with status {}",
            response.status()
        );

        Ok(Session::from_websocket(ws))
    }
}

#[async_trait]
impl Connect for TunnelConnector {
    async fn connect(&self, request: ConnectRequest<'_>) -> Result<Session> {
        let account_id = request.account.account_id.as_str();
        let transport_type = match request.proxy {
            Some(proxy) => {
                request.events.connection(
                    account_id,
                    Tone::Magenta,
                    format!("Connecting via proxy {}", proxy),
                );
                TransportType::Socks5
            }
            None => {
                request
                    .events
                    .connection(account_id, Tone::Cyan, "Direct connection");
                TransportType::Direct
            }
        };

        let session = tokio::time::timeout(self.connect_timeout, self.establish(&request))
            .await
            .map_err(|_| {
                let what = match transport_type {
                    TransportType::Socks5 => "Proxy timeout",
                    TransportType::Direct => "Connection timeout",
                };
                FarmError::connection_failure(format!(
                    "{}: no session after {:?}",
                    what, self.connect_timeout
                ))
            })??;

        request
            .events
            .connection(account_id, Tone::Green, "Connection established");
        Ok(session)
    }
}
