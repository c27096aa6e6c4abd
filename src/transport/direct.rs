use super::{Transport, TransportDialer, TransportType};
use crate::error::{FarmError, Result};
use async_trait::async_trait;
use std::pin::Pin;
use tokio::net::TcpStream;
use tracing::debug;

/// 直连拨号器
#[derive(Debug, Default, Clone)]
pub struct DirectDialer;

#[async_trait]
impl TransportDialer for DirectDialer {
    async fn dial(&self, host: &str, port: u16) -> Result<Pin<Box<dyn Transport>>> {
        debug!("Dialing {}:{} directly", host, port);

        let stream = TcpStream::connect((host, port)).await.map_err(|e| {
            FarmError::connection_failure(format!(
                "Connection error: failed to connect to {}:{}: {}",
                host, port, e
            ))
        })?;
        stream.set_nodelay(true).ok();

        Ok(Box::pin(stream))
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Direct
    }
}
