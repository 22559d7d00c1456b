/// 信令对话接口
///
/// 外部信令引擎提供 `SipDialog`，会话实现 `DialogObserver` 接收对话事件
use super::media::MediaConnection;
use crate::error::{DialogError, SessionError};
use crate::message::SipResponse;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};

/// 对话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Initial,
    Establishing,
    Established,
    Terminating,
    Terminated,
}

impl FromStr for DialogState {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Initial" => Ok(DialogState::Initial),
            "Establishing" => Ok(DialogState::Establishing),
            "Established" => Ok(DialogState::Established),
            "Terminating" => Ok(DialogState::Terminating),
            "Terminated" => Ok(DialogState::Terminated),
            other => Err(SessionError::UnknownDialogState(other.to_string())),
        }
    }
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DialogState::Initial => "Initial",
            DialogState::Establishing => "Establishing",
            DialogState::Established => "Established",
            DialogState::Terminating => "Terminating",
            DialogState::Terminated => "Terminated",
        };
        f.write_str(label)
    }
}

/// re-INVITE 的媒体选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReinviteOptions {
    pub hold: bool,
}

/// 一个通话的信令对话
#[async_trait]
pub trait SipDialog: Send + Sync {
    /// 设置对话事件的观察者，每个对话只绑定一个会话
    fn set_observer(&self, observer: Weak<dyn DialogObserver>);

    /// 发送 re-INVITE，对端接受时返回 `Ok`
    async fn reinvite(&self, options: ReinviteOptions) -> Result<(), DialogError>;

    /// 发送 REFER，返回最终响应
    async fn refer(&self, target: rsip::Uri) -> Result<SipResponse, DialogError>;

    /// 以指定状态码拒绝来电
    async fn reject(&self, status_code: u16) -> Result<(), DialogError>;

    /// 媒体连接，建立前为 `None`
    fn media(&self) -> Option<Arc<dyn MediaConnection>>;
}

/// 对话事件观察者，每种状态转换一个方法
#[async_trait]
pub trait DialogObserver: Send + Sync {
    /// 对端发送 BYE
    fn on_bye(&self);

    fn on_state_change(&self, state: DialogState);

    /// 远端媒体流新增了轨道
    fn on_remote_track_added(&self);

    /// 呼出 INVITE 收到 2xx
    async fn on_invite_accepted(&self, response: &SipResponse);

    /// 呼出 INVITE 收到 1xx
    fn on_invite_progress(&self, response: &SipResponse);

    /// 呼出 INVITE 被拒绝
    fn on_invite_rejected(&self, response: &SipResponse);

    /// 来电在应答前被主叫取消
    async fn on_invite_canceled(&self);
}
