/// 会话：一次连接尝试得到的 WebSocket 句柄
///
/// 拆分为发送端与接收端，心跳与监听两个任务各自持有一半。
/// 会话只属于创建它的 worker，离开 Active 状态时关闭。
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message, Utf8Bytes};
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

/// 正常关闭时发送的原因
pub const SHUTDOWN_REASON: &str = "Operator shutdown";

pub type MessageSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<Message, WsError>> + Send>>;

pub struct Session {
    pub(crate) sink: MessageSink,
    pub(crate) stream: MessageStream,
}

impl Session {
    /// 从已完成升级握手的 WebSocket 流创建会话
    pub fn from_websocket<S>(ws: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws.split();
        Self::from_parts(sink, stream)
    }

    /// 从任意发送端 / 接收端组合创建会话
    pub fn from_parts<K, R>(sink: K, stream: R) -> Self
    where
        K: Sink<Message, Error = WsError> + Send + 'static,
        R: Stream<Item = Result<Message, WsError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }

    /// 以 1000（正常关闭）结束会话，并在 `grace` 内等待对端确认
    ///
    /// 返回是否收到了对端的关闭确认。
    pub async fn close(mut self, grace: Duration) -> bool {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: Utf8Bytes::from_static(SHUTDOWN_REASON),
        };

        let handshake = async {
            if let Err(e) = self.sink.send(Message::Close(Some(frame))).await {
                debug!("Failed to send close frame: {}", e);
                return false;
            }
            while let Some(message) = self.stream.next().await {
                match message {
                    Ok(Message::Close(_)) => return true,
                    Ok(_) => continue,
                    Err(WsError::ConnectionClosed) => return true,
                    Err(_) => return false,
                }
            }
            true
        };

        let acknowledged = tokio::time::timeout(grace, handshake)
            .await
            .unwrap_or(false);
        let _ = self.sink.close().await;
        acknowledged
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}
