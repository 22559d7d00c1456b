/// 标准注册实现
///
/// 使用 rsipstack 内置的 Registration 类
use super::traits::{RegistererState, RegistrationClient, RegistrationObserver};
use crate::config::Config;
use crate::error::SipError;
use crate::message::SipResponse;
use async_trait::async_trait;
use rsip::Uri;
use rsipstack::{
    dialog::{authenticate::Credential, registration::Registration},
    transaction::endpoint::EndpointInnerRef,
};
use std::sync::{Mutex, Weak};
use tracing::{debug, info, warn};

/// 标准注册引擎
///
/// 适用于直接连接到 SIP 服务器的场景
pub struct StandardRegistrationClient {
    /// rsipstack 的 Registration 实例，同一时间只允许一个事务
    registration: tokio::sync::Mutex<Registration>,

    /// 注册 URI（已去掉 transport 参数）
    server_uri: Uri,

    username: String,

    observer: Mutex<Option<Weak<dyn RegistrationObserver>>>,
}

impl StandardRegistrationClient {
    /// 创建新的标准注册引擎
    pub fn new(endpoint: EndpointInnerRef, config: &Config) -> Result<Self, SipError> {
        info!("创建标准注册引擎: 用户 {}", config.username);

        let server_uri = registration_uri(&config.server)?;

        // realm 从 401 响应自动提取
        let credential = Credential {
            username: config.username.clone(),
            password: config.password.clone(),
            realm: None,
        };

        let mut registration = Registration::new(endpoint, Some(credential));
        registration.call_id = crate::utils::make_call_id(Some(&config.domain));

        Ok(Self {
            registration: tokio::sync::Mutex::new(registration),
            server_uri,
            username: config.username.clone(),
            observer: Mutex::new(None),
        })
    }

    fn notify(&self, state: RegistererState) {
        let observer = self
            .observer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(observer) = observer.and_then(|weak| weak.upgrade()) {
            observer.on_state_changed(state);
        }
    }

    async fn send(&self, expires: u32) -> Result<SipResponse, SipError> {
        let mut registration = self.registration.lock().await;
        debug!(
            "REGISTER {} 用户: {}, expires={}",
            self.server_uri, self.username, expires
        );
        let response = registration
            .register(self.server_uri.clone(), Some(expires))
            .await?;
        Ok(SipResponse::from(&response))
    }
}

#[async_trait]
impl RegistrationClient for StandardRegistrationClient {
    fn set_observer(&self, observer: Weak<dyn RegistrationObserver>) {
        *self.observer.lock().unwrap_or_else(|e| e.into_inner()) = Some(observer);
    }

    async fn register(&self, expires: u32) -> Result<SipResponse, SipError> {
        info!("执行标准注册: server={}, expires={}", self.server_uri, expires);
        self.notify(RegistererState::Registering);

        match self.send(expires).await {
            Ok(response) => {
                if response.is_success() {
                    info!("✓ 标准注册成功: {}", response.status_code);
                    self.notify(RegistererState::Registered);
                } else {
                    warn!(
                        "标准注册响应: {} {}",
                        response.status_code, response.reason_phrase
                    );
                    self.notify(RegistererState::Unregistered);
                }
                Ok(response)
            }
            Err(e) => {
                self.notify(RegistererState::Unregistered);
                Err(e)
            }
        }
    }

    async fn unregister(&self) -> Result<SipResponse, SipError> {
        info!("执行标准注销");
        let result = self.send(0).await;
        self.notify(RegistererState::Unregistered);
        result
    }
}

/// 构造注册 URI，registrar 不需要 transport 参数
pub fn registration_uri(server: &str) -> Result<Uri, SipError> {
    let server = server.trim();
    let uri = if server.starts_with("sip:") || server.starts_with("sips:") {
        server.to_string()
    } else {
        format!("sip:{}", server)
    };
    let mut uri = Uri::try_from(uri)
        .map_err(|e| SipError::InvalidUri(format!("Invalid server URI: {}", e)))?;
    uri.params
        .retain(|p| !matches!(p, rsip::Param::Transport(_)));
    Ok(uri)
}
