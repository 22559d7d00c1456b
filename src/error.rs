use thiserror::Error;

#[derive(Error, Debug)]
pub enum SipError {
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Stack error: {0}")]
    Stack(#[from] rsipstack::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    Missing(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// 媒体层错误（采集、换轨、录音）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("无法获取采集设备: {0}")]
    Capture(String),

    #[error("采集流中没有音频轨道")]
    NoAudioTrack,

    #[error("替换发送轨道失败: {0}")]
    ReplaceTrack(String),

    #[error("录音失败: {0}")]
    Recording(String),

    #[error("录音上传失败: {0}")]
    Upload(String),
}

/// 信令对话操作（re-INVITE、REFER、拒绝）失败，内容是引擎给出的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DialogError(pub String);

impl DialogError {
    pub fn new(reason: impl Into<String>) -> Self {
        DialogError(reason.into())
    }
}

/// 会话操作的Result类型别名
pub type SessionResult<T> = Result<T, SessionError>;

/// 会话相关错误类型
#[derive(Error, Debug)]
pub enum SessionError {
    /// 构造会话时缺少通话记录
    #[error("Required argument 'call' is missing.")]
    MissingCall,

    /// 信令引擎上报了未知的对话状态
    #[error("Unknown session state: \"{0}\".")]
    UnknownDialogState(String),

    /// 上一个 hold/resume 请求尚未完成
    #[error("保持/恢复请求正在进行中")]
    HoldInProgress,

    /// re-INVITE 失败，`action` 与提示用户的文本一致
    #[error("Error {action}: {reason}")]
    HoldFailed { action: &'static str, reason: String },

    /// 信令对话返回的错误
    #[error("对话错误: {0}")]
    Dialog(#[from] DialogError),

    #[error("URI解析错误: {0}")]
    InvalidTarget(String),

    #[error("媒体错误: {0}")]
    Media(#[from] MediaError),
}

impl SessionError {
    /// 判断错误是否可恢复（可用于重试逻辑）
    pub fn is_recoverable(&self) -> bool {
        match self {
            SessionError::MissingCall => false,
            SessionError::UnknownDialogState(_) => false,
            SessionError::HoldInProgress => true,
            SessionError::HoldFailed { .. } => true,
            SessionError::Dialog(_) => true,
            SessionError::InvalidTarget(_) => false,
            SessionError::Media(_) => true,
        }
    }

    /// 获取标准错误代码，用于日志分析和监控
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::MissingCall => "MISSING_CALL",
            SessionError::UnknownDialogState(_) => "UNKNOWN_DIALOG_STATE",
            SessionError::HoldInProgress => "HOLD_IN_PROGRESS",
            SessionError::HoldFailed { .. } => "HOLD_FAILED",
            SessionError::Dialog(_) => "DIALOG_ERROR",
            SessionError::InvalidTarget(_) => "INVALID_TARGET",
            SessionError::Media(_) => "MEDIA_ERROR",
        }
    }
}
