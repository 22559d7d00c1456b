use std::fmt;
use uuid::Uuid;

/// 会话标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 呼叫方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    Incoming,
    Outgoing,
}

/// 通话记录，由宿主的通话管理服务持有
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// 宿主记录 ID，录音上传路径使用
    pub id: u64,
    pub direction: CallDirection,
    pub phone_number: String,
}

impl Call {
    pub fn outgoing(id: u64, phone_number: impl Into<String>) -> Self {
        Self {
            id,
            direction: CallDirection::Outgoing,
            phone_number: phone_number.into(),
        }
    }

    pub fn incoming(id: u64, phone_number: impl Into<String>) -> Self {
        Self {
            id,
            direction: CallDirection::Incoming,
            phone_number: phone_number.into(),
        }
    }
}

/// 呼出 INVITE 的进度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteState {
    Trying,
    Ringing,
    Ok,
}
