// 传输层工厂 - 根据账号的代理配置选择拨号器

use crate::proxy_spec::ProxySpec;
use crate::transport::{DirectDialer, Socks5Dialer, TransportDialer};
use std::sync::Arc;

/// 创建拨号器：有代理时走 SOCKS5 隧道，否则直连
pub fn create_dialer(proxy: Option<&ProxySpec>) -> Arc<dyn TransportDialer> {
    match proxy {
        Some(proxy) => Arc::new(Socks5Dialer::new(proxy.clone())),
        None => Arc::new(DirectDialer),
    }
}
