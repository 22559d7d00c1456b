/// 注册器
///
/// 保持本地 SIP 身份在注册服务器上的注册状态。状态完全由注册引擎驱动，
/// 注册器只负责发起 REGISTER 和把拒绝响应翻译成用户能看懂的提示
use super::traits::{RegistererState, RegistrationClient, RegistrationObserver};
use crate::message::SipResponse;
use crate::services::{ErrorReporter, ErrorSeverity};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, error, info, warn};

pub struct Registerer {
    state: Mutex<RegistererState>,
    /// 正在等待 REGISTER 响应
    in_flight: AtomicBool,
    client: Arc<dyn RegistrationClient>,
    errors: Arc<dyn ErrorReporter>,
}

impl Registerer {
    /// 注册过期时间（秒）
    pub const EXPIRATION_INTERVAL: u32 = 3600;

    /// 创建注册器并订阅注册引擎的状态变化
    pub fn new(client: Arc<dyn RegistrationClient>, errors: Arc<dyn ErrorReporter>) -> Arc<Self> {
        let registerer = Arc::new(Self {
            state: Mutex::new(RegistererState::Initial),
            in_flight: AtomicBool::new(false),
            client: client.clone(),
            errors,
        });
        let weak = Arc::downgrade(&registerer);
        let observer: Weak<dyn RegistrationObserver> = weak;
        client.set_observer(observer);
        registerer
    }

    pub fn state(&self) -> RegistererState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 向注册服务器发送 REGISTER
    ///
    /// 已注册时不再发送；发送失败只记录日志，重试交给上层的重连策略
    pub async fn register(&self) {
        if self.state() == RegistererState::Registered {
            debug!("已注册，跳过 REGISTER");
            return;
        }
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("REGISTER 正在进行中，跳过");
            return;
        }

        let in_flight = InFlight(&self.in_flight);

        info!("发送 REGISTER, expires={}", Self::EXPIRATION_INTERVAL);
        let result = self.client.register(Self::EXPIRATION_INTERVAL).await;
        drop(in_flight);

        match result {
            Ok(response) if response.is_rejection() => self.on_registration_rejected(&response),
            Ok(response) => debug!("REGISTER 响应: {}", response.status_code),
            Err(e) => error!("REGISTER error: {}", e),
        }
    }

    /// 注销（expires=0），仅在已注册时发送
    pub async fn unregister(&self) {
        if self.state() != RegistererState::Registered {
            debug!("未注册，跳过注销");
            return;
        }
        match self.client.unregister().await {
            Ok(response) => info!("注销响应: {}", response.status_code),
            Err(e) => warn!("注销失败: {}", e),
        }
    }

    fn on_registration_rejected(&self, response: &SipResponse) {
        warn!(
            "注册被拒绝: {} {}",
            response.status_code, response.reason_phrase
        );
        let message = registration_rejected_message(response);
        self.errors.trigger_error(&message, ErrorSeverity::Blocking);
    }
}

/// REGISTER 进行中的标记，释放时清除，请求被取消也不会一直占用
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RegistrationObserver for Registerer {
    fn on_state_changed(&self, state: RegistererState) {
        debug!("注册状态变化: {:?}", state);
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
        if state == RegistererState::Registered {
            self.errors.resolve_error();
        }
    }
}

/// 构造注册被拒绝时的提示：状态行 + 按状态码选择的处理建议
pub fn registration_rejected_message(response: &SipResponse) -> String {
    let status = format!(
        "Registration rejected: {} {}.",
        response.status_code, response.reason_phrase
    );
    let help = match response.status_code {
        401 => "Authentication failed. Please verify PBX host and credentials.",
        503 => "WebSocket transport error. Verify WSS endpoint and TLS.",
        _ => "Please try again later or contact your administrator.",
    };
    format!("{}\n\n{}", status, help)
}
