/// Registration traits 定义
///
/// 注册引擎（发送 REGISTER 的一方）和注册器（响应状态变化的一方）之间的接口
use crate::error::SipError;
use crate::message::SipResponse;
use async_trait::async_trait;
use std::sync::Weak;

/// 注册状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistererState {
    #[default]
    Initial,
    Registering,
    Registered,
    Unregistered,
    Terminated,
}

/// 注册状态变化的观察者
pub trait RegistrationObserver: Send + Sync {
    fn on_state_changed(&self, state: RegistererState);
}

/// 注册引擎
///
/// 负责实际的 REGISTER 事务，并把状态变化通知给观察者
#[async_trait]
pub trait RegistrationClient: Send + Sync {
    /// 设置状态观察者
    fn set_observer(&self, observer: Weak<dyn RegistrationObserver>);

    /// 发送 REGISTER
    ///
    /// # 返回
    /// - `Ok(SipResponse)`: 最终响应（包括拒绝）
    /// - `Err`: 请求没能发出或事务异常结束
    async fn register(&self, expires: u32) -> Result<SipResponse, SipError>;

    /// 发送 expires=0 的 REGISTER
    async fn unregister(&self) -> Result<SipResponse, SipError>;
}
