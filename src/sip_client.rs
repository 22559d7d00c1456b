/// SIP 端点
///
/// 绑定本地 UDP 传输并运行 rsipstack 端点，注册客户端在其上收发事务
use crate::config::Config;
use crate::error::SipError;
use rsipstack::{
    transaction::endpoint::EndpointInnerRef,
    transport::{udp::UdpConnection, TransportLayer},
    EndpointBuilder,
};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct SipEndpoint {
    inner: EndpointInnerRef,
    cancel_token: CancellationToken,
}

impl SipEndpoint {
    /// 在第一个非回环地址的随机端口上创建端点并启动服务
    pub async fn bind(config: &Config) -> Result<Self, SipError> {
        let cancel_token = CancellationToken::new();

        let local_ip = crate::utils::get_first_non_loopback_interface()?;
        info!(
            "检测到本地出口IP: {} ({})",
            local_ip,
            if local_ip.is_ipv6() { "IPv6" } else { "IPv4" }
        );

        let transport_layer = TransportLayer::new(cancel_token.clone());
        let connection = UdpConnection::create_connection(
            SocketAddr::new(local_ip, 0),
            None,
            Some(cancel_token.child_token()),
        )
        .await
        .map_err(|e| SipError::Transport(format!("创建 UDP 连接失败: {}", e)))?;
        transport_layer.add_transport(connection.into());

        let mut endpoint_builder = EndpointBuilder::new();
        endpoint_builder
            .with_cancel_token(cancel_token.clone())
            .with_transport_layer(transport_layer)
            .with_user_agent(&config.user_agent);
        let endpoint = endpoint_builder.build();

        let inner = endpoint.inner.clone();
        tokio::spawn(async move {
            if let Err(e) = endpoint.inner.serve().await {
                warn!("SIP 端点退出: {}", e);
            }
        });

        info!("SIP 端点已启动: {}", local_ip);
        Ok(Self {
            inner,
            cancel_token,
        })
    }

    pub fn inner(&self) -> EndpointInnerRef {
        self.inner.clone()
    }

    /// 停止端点和传输层
    pub fn shutdown(&self) {
        info!("关闭 SIP 端点");
        self.cancel_token.cancel();
    }
}

impl Drop for SipEndpoint {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
