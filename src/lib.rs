// 声明所有模块
pub mod config;
pub mod error;
pub mod message;
pub mod recording;
pub mod registration;
pub mod sdp;
pub mod services;
pub mod session;
pub mod sip_client;
pub mod utils;

#[cfg(test)]
mod testing;

/// 重新导出thiserror错误类型
pub use crate::error::{
    ConfigError, DialogError, MediaError, SessionError, SessionResult, SipError,
};

/// 主要API重新导出，简化使用
pub use crate::config::{Config as SoftphoneConfig, RecordingPolicy, VoipMode};
pub use crate::message::SipResponse;
pub use crate::recording::HttpRecordingUploader;
pub use crate::registration::{Registerer, RegistererState, StandardRegistrationClient};
pub use crate::services::{ErrorReporter, ErrorSeverity, TracingErrorReporter};
pub use crate::session::{Call, CallDirection, Session, SessionContext, SessionRegistry};
pub use crate::sip_client::SipEndpoint;

use std::sync::Arc;

/// 软电话库的版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 便捷函数：绑定端点并创建注册器
///
/// 返回的端点需要由调用方持有，释放后注册事务随之停止
pub async fn create_registerer(
    server: &str,
    user: &str,
    password: &str,
    errors: Arc<dyn ErrorReporter>,
) -> Result<(SipEndpoint, Arc<Registerer>), SipError> {
    let config = SoftphoneConfig::new(server, user, password)?;
    let endpoint = SipEndpoint::bind(&config).await?;
    let client = Arc::new(StandardRegistrationClient::new(endpoint.inner(), &config)?);
    Ok((endpoint, Registerer::new(client, errors)))
}
