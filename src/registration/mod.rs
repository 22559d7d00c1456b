/// Registration 模块
///
/// 提供 SIP 注册状态管理
///
/// ## 设计
///
/// - `RegistrationClient` trait: 注册引擎，负责实际的 REGISTER 事务
/// - `StandardRegistrationClient`: 基于 rsipstack 的注册引擎
/// - `Registerer`: 响应注册状态变化，保证已注册时不重复发送 REGISTER
///
/// ## 使用示例
///
/// ```rust,no_run
/// use sip_softphone::registration::*;
/// use sip_softphone::services::TracingErrorReporter;
/// use std::sync::Arc;
///
/// # async fn example(endpoint: rsipstack::transaction::endpoint::EndpointInnerRef,
/// #                  config: sip_softphone::SoftphoneConfig) -> Result<(), sip_softphone::SipError> {
/// let client = Arc::new(StandardRegistrationClient::new(endpoint, &config)?);
/// let registerer = Registerer::new(client, Arc::new(TracingErrorReporter));
/// registerer.register().await;
/// # Ok(())
/// # }
/// ```

mod registerer;
mod standard;
mod traits;

// 导出公共接口
pub use registerer::{registration_rejected_message, Registerer};
pub use standard::{registration_uri, StandardRegistrationClient};
pub use traits::{RegistererState, RegistrationClient, RegistrationObserver};
