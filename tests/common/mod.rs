//! Common utilities for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use pulse_tunnel::events::{Channel, EventSink};
use pulse_tunnel::tls;
use pulse_tunnel::{Connect, ConnectRequest, FarmError, Session};
use std::collections::{HashMap, VecDeque};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener as TokioTcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Find an available port
pub fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to random port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Generate temporary certificate files for testing
pub fn generate_test_certs() -> (PathBuf, PathBuf) {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let temp_dir = std::env::temp_dir();
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64;
    let counter = COUNTER.fetch_add(1, Ordering::SeqCst);
    let unique_id = format!("{}-{}-{}", timestamp, counter, std::process::id());

    let cert_path = temp_dir.join(format!("pulse-test-cert-{}.pem", unique_id));
    let key_path = temp_dir.join(format!("pulse-test-key-{}.pem", unique_id));

    tls::generate_self_signed_cert(
        "localhost",
        &["127.0.0.1".to_string(), "localhost".to_string()],
        &cert_path,
        &key_path,
    )
    .expect("Failed to generate test certificates");

    (cert_path, key_path)
}

/// Removes the generated certificate files on drop
pub struct TestCleanup {
    cert_path: PathBuf,
    key_path: PathBuf,
}

impl TestCleanup {
    pub fn new(cert_path: PathBuf, key_path: PathBuf) -> Self {
        Self {
            cert_path,
            key_path,
        }
    }
}

impl Drop for TestCleanup {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.cert_path);
        let _ = std::fs::remove_file(&self.key_path);
    }
}

pub const CONNECTED_JSON: &str =
    r#"{"message":"Connected successfully","pointsToday":5,"pointsTotal":100}"#;

pub fn pulse_json(heartbeats: u32) -> String {
    format!(
        r#"{{"message":"Pulse from server","pointsToday":5,"pointsTotal":100,"heartbeats":{}}}"#,
        heartbeats
    )
}

/// What a local WebSocket server observed
#[derive(Default)]
pub struct ServerLog {
    pub request_uris: Mutex<Vec<String>>,
    pub close_codes: Mutex<Vec<u16>>,
    pub pings: AtomicUsize,
}

/// Start a TLS WebSocket server that greets with "Connected successfully"
/// and answers each PING with a pulse
pub async fn start_wss_server(cert: &PathBuf, key: &PathBuf) -> (u16, Arc<ServerLog>) {
    let config = tls::load_server_config(cert, key).expect("Failed to load server TLS config");
    let acceptor = TlsAcceptor::from(config);
    let listener = TokioTcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind wss server");
    let port = listener.local_addr().unwrap().port();
    let log = Arc::new(ServerLog::default());

    let server_log = log.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            let log = server_log.clone();
            tokio::spawn(async move {
                let Ok(tls_stream) = acceptor.accept(socket).await else {
                    return;
                };
                let uri_log = log.clone();
                let callback = move |req: &Request, resp: Response| {
                    uri_log
                        .request_uris
                        .lock()
                        .unwrap()
                        .push(req.uri().to_string());
                    Ok::<_, ErrorResponse>(resp)
                };
                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(tls_stream, callback).await
                else {
                    return;
                };

                if ws.send(Message::text(CONNECTED_JSON)).await.is_err() {
                    return;
                }
                let mut heartbeats = 0;
                // 收到 Close 后继续读取，让协议层把关闭确认发出去
                while let Some(message) = ws.next().await {
                    match message {
                        Ok(Message::Text(text)) if text.contains("PING") => {
                            heartbeats += 1;
                            log.pings.fetch_add(1, Ordering::SeqCst);
                            if ws.send(Message::text(pulse_json(heartbeats))).await.is_err() {
                                break;
                            }
                        }
                        Ok(Message::Close(frame)) => {
                            let code = frame.map(|f| u16::from(f.code)).unwrap_or(1005);
                            log.close_codes.lock().unwrap().push(code);
                        }
                        Ok(_) => {}
                        Err(_) => break,
                    }
                }
            });
        }
    });

    (port, log)
}

/// Start a minimal SOCKS5 server (CONNECT only), optionally requiring user/pass
pub async fn start_socks5_server(auth: Option<(&str, &str)>) -> (u16, Arc<AtomicUsize>) {
    let listener = TokioTcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind socks5 server");
    let port = listener.local_addr().unwrap().port();
    let tunnels = Arc::new(AtomicUsize::new(0));
    let auth = auth.map(|(u, p)| (u.to_string(), p.to_string()));

    let counter = tunnels.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let auth = auth.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                if let Ok(mut upstream) = socks5_handshake(socket, auth).await {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let _ = tokio::io::copy_bidirectional(&mut upstream.0, &mut upstream.1).await;
                }
            });
        }
    });

    (port, tunnels)
}

async fn socks5_handshake(
    mut client: TcpStream,
    auth: Option<(String, String)>,
) -> std::io::Result<(TcpStream, TcpStream)> {
    let invalid = || std::io::Error::new(std::io::ErrorKind::InvalidData, "bad socks5 request");

    let mut head = [0u8; 2];
    client.read_exact(&mut head).await?;
    if head[0] != 5 {
        return Err(invalid());
    }
    let mut methods = vec![0u8; head[1] as usize];
    client.read_exact(&mut methods).await?;

    match &auth {
        Some((user, pass)) => {
            if !methods.contains(&2) {
                client.write_all(&[5, 0xff]).await?;
                return Err(invalid());
            }
            client.write_all(&[5, 2]).await?;

            let mut ver_len = [0u8; 2];
            client.read_exact(&mut ver_len).await?;
            let mut username = vec![0u8; ver_len[1] as usize];
            client.read_exact(&mut username).await?;
            let mut plen = [0u8; 1];
            client.read_exact(&mut plen).await?;
            let mut password = vec![0u8; plen[0] as usize];
            client.read_exact(&mut password).await?;

            if username != user.as_bytes() || password != pass.as_bytes() {
                client.write_all(&[1, 1]).await?;
                return Err(invalid());
            }
            client.write_all(&[1, 0]).await?;
        }
        None => {
            if !methods.contains(&0) {
                client.write_all(&[5, 0xff]).await?;
                return Err(invalid());
            }
            client.write_all(&[5, 0]).await?;
        }
    }

    let mut request = [0u8; 4];
    client.read_exact(&mut request).await?;
    if request[1] != 1 {
        return Err(invalid());
    }
    let host = match request[3] {
        1 => {
            let mut ip = [0u8; 4];
            client.read_exact(&mut ip).await?;
            std::net::Ipv4Addr::from(ip).to_string()
        }
        3 => {
            let mut len = [0u8; 1];
            client.read_exact(&mut len).await?;
            let mut name = vec![0u8; len[0] as usize];
            client.read_exact(&mut name).await?;
            String::from_utf8(name).map_err(|_| invalid())?
        }
        4 => {
            let mut ip = [0u8; 16];
            client.read_exact(&mut ip).await?;
            std::net::Ipv6Addr::from(ip).to_string()
        }
        _ => return Err(invalid()),
    };
    let mut port = [0u8; 2];
    client.read_exact(&mut port).await?;
    let port = u16::from_be_bytes(port);

    let upstream = match TcpStream::connect((host.as_str(), port)).await {
        Ok(stream) => stream,
        Err(e) => {
            client.write_all(&[5, 5, 0, 1, 0, 0, 0, 0, 0, 0]).await?;
            return Err(e);
        }
    };
    client.write_all(&[5, 0, 0, 1, 0, 0, 0, 0, 0, 0]).await?;

    Ok((client, upstream))
}

/// Test-side handles of one fake session
pub struct FakeSessionHandle {
    /// Everything the worker sent
    pub sent: mpsc::UnboundedReceiver<Message>,
    /// Feed inbound messages to the worker
    pub inbound: mpsc::UnboundedSender<Result<Message, WsError>>,
}

/// Create a session backed by in-memory channels
pub fn fake_session() -> (Session, FakeSessionHandle) {
    let (sink_tx, sink_rx) = mpsc::unbounded::<Message>();
    let (stream_tx, stream_rx) = mpsc::unbounded::<Result<Message, WsError>>();
    let session = Session::from_parts(
        sink_tx.sink_map_err(|_| WsError::ConnectionClosed),
        stream_rx,
    );
    (
        session,
        FakeSessionHandle {
            sent: sink_rx,
            inbound: stream_tx,
        },
    )
}

/// One scripted connect outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Connect fails
    Fail,
    /// Connect succeeds, the remote closes right away
    Flap,
    /// Connect succeeds, the session stays open until the test acts
    Hold,
}

/// Connector that replays per-account scripts; exhausted scripts fail
#[derive(Default)]
pub struct ScriptedConnector {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    attempts: AtomicU32,
    held: Mutex<Vec<(String, FakeSessionHandle)>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, account_id: &str, steps: &[Step]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(account_id.to_string(), steps.iter().copied().collect());
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn held_sessions(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    /// Take the handles of every session opened with `Step::Hold`
    pub fn take_held(&self) -> Vec<(String, FakeSessionHandle)> {
        std::mem::take(&mut *self.held.lock().unwrap())
    }
}

#[async_trait]
impl Connect for ScriptedConnector {
    async fn connect(&self, request: ConnectRequest<'_>) -> pulse_tunnel::Result<Session> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let account_id = request.account.account_id.clone();
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&account_id)
            .and_then(|steps| steps.pop_front())
            .unwrap_or(Step::Fail);

        match step {
            Step::Fail => Err(FarmError::connection_failure("Connection error: refused")),
            Step::Flap => {
                let (session, handle) = fake_session();
                handle
                    .inbound
                    .unbounded_send(Ok(Message::Close(None)))
                    .unwrap();
                Ok(session)
            }
            Step::Hold => {
                let (session, handle) = fake_session();
                self.held.lock().unwrap().push((account_id, handle));
                Ok(session)
            }
        }
    }
}

/// Connection-log messages for one account, oldest first
pub fn connection_messages(events: &EventSink, account_id: &str) -> Vec<String> {
    events
        .snapshot(Channel::Connection)
        .into_iter()
        .filter(|e| e.account_id == account_id)
        .map(|e| e.message)
        .collect()
}

/// Wait (in virtual or real time) until `check` holds
pub async fn wait_until(mut check: impl FnMut() -> bool, limit: Duration) -> bool {
    let step = Duration::from_millis(50);
    let mut waited = Duration::ZERO;
    while !check() {
        if waited >= limit {
            return false;
        }
        tokio::time::sleep(step).await;
        waited += step;
    }
    true
}
