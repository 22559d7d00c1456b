/// 软电话配置模块
///
/// 汇总注册、呼叫和录音需要的运行参数
use crate::error::ConfigError;
use std::str::FromStr;

/// 默认 User-Agent 字符串
pub const DEFAULT_USER_AGENT: &str = concat!("sip-softphone/", env!("CARGO_PKG_VERSION"));

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoipMode {
    /// 演示模式：没有真实的信令对话
    Demo,
    /// 生产模式
    #[default]
    Prod,
}

impl FromStr for VoipMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "demo" => Ok(VoipMode::Demo),
            "prod" => Ok(VoipMode::Prod),
            other => Err(ConfigError::Parse(format!("unknown mode: {}", other))),
        }
    }
}

/// 录音策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingPolicy {
    /// 不录音
    #[default]
    Disabled,
    /// 每个通话建立后自动录音
    Always,
    /// 由用户手动开始
    User,
}

impl FromStr for RecordingPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(RecordingPolicy::Disabled),
            "always" => Ok(RecordingPolicy::Always),
            "user" => Ok(RecordingPolicy::User),
            other => Err(ConfigError::Parse(format!(
                "unknown recording policy: {}",
                other
            ))),
        }
    }
}

/// 软电话配置
#[derive(Debug, Clone)]
pub struct Config {
    /// 注册服务器地址 (host[:port])
    pub server: String,

    /// SIP 用户名（不含域名）
    pub username: String,

    /// SIP 密码
    pub password: String,

    /// SIP 域名，用于拼接呼叫/转接目标 URI
    pub domain: String,

    /// User-Agent字符串
    pub user_agent: String,

    pub mode: VoipMode,

    pub recording_policy: RecordingPolicy,

    /// 应答后立即盲转到另一台设备
    pub will_call_from_another_device: bool,

    /// 录音上传服务的基础 URL
    pub upload_base_url: Option<String>,
}

impl Config {
    /// 创建配置
    ///
    /// `user` 可以是 `alice` 或 `alice@example.com`，
    /// 后者的域名部分会作为 SIP 域名，否则使用服务器主机名
    pub fn new(server: &str, user: &str, password: &str) -> Result<Self, ConfigError> {
        let server = server.trim();
        if server.is_empty() {
            return Err(ConfigError::Missing("server".into()));
        }
        let user = user.trim();
        if user.is_empty() {
            return Err(ConfigError::Missing("user".into()));
        }

        let (username, domain) = match user.split_once('@') {
            Some((name, domain)) => {
                if name.is_empty() || domain.is_empty() {
                    return Err(ConfigError::Invalid(format!("malformed user: {}", user)));
                }
                (name.to_string(), domain.to_string())
            }
            None => (user.to_string(), host_of(server).to_string()),
        };

        Ok(Self {
            server: server.to_string(),
            username,
            password: password.to_string(),
            domain,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            mode: VoipMode::default(),
            recording_policy: RecordingPolicy::default(),
            will_call_from_another_device: false,
            upload_base_url: None,
        })
    }

    /// 演示模式配置，不需要服务器
    pub fn demo() -> Self {
        Self {
            server: "localhost".into(),
            username: "demo".into(),
            password: String::new(),
            domain: "localhost".into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            mode: VoipMode::Demo,
            recording_policy: RecordingPolicy::default(),
            will_call_from_another_device: false,
            upload_base_url: None,
        }
    }

    pub fn with_mode(mut self, mode: VoipMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_recording_policy(mut self, policy: RecordingPolicy) -> Self {
        self.recording_policy = policy;
        self
    }

    pub fn with_transfer_on_accept(mut self, enabled: bool) -> Self {
        self.will_call_from_another_device = enabled;
        self
    }

    pub fn with_upload_base_url(mut self, url: impl Into<String>) -> Self {
        self.upload_base_url = Some(url.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// 去掉端口和参数，只保留主机部分
fn host_of(server: &str) -> &str {
    let without_scheme = server.strip_prefix("sip:").unwrap_or(server);
    let without_params = without_scheme.split(';').next().unwrap_or(without_scheme);
    // IPv6 字面量保持原样
    if without_params.starts_with('[') {
        return without_params
            .split_once(']')
            .map(|(host, _)| host.trim_start_matches('['))
            .unwrap_or(without_params);
    }
    without_params.split(':').next().unwrap_or(without_params)
}
