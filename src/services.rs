/// 宿主应用提供的服务接口
///
/// 注册器和会话只通过这些 trait 产生副作用（错误提示、通话记录、铃声、界面），
/// 宿主注入具体实现，测试注入替身
use crate::session::{Call, SessionId};
use tracing::{error, info, warn};

/// 错误提示的严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// 阻断式错误，需要用户处理
    Blocking,
    /// 非阻断提示，不影响后续操作
    NonBlocking,
}

/// 错误上报
pub trait ErrorReporter: Send + Sync {
    fn trigger_error(&self, message: &str, severity: ErrorSeverity);

    /// 清除之前上报的错误
    fn resolve_error(&self);
}

/// 通话记录管理
pub trait CallService: Send + Sync {
    fn start(&self, call: &Call);
    fn reject(&self, call: &Call);
    fn miss(&self, call: &Call);
    fn end(&self, call: &Call);
}

/// 铃声播放
pub trait Ringtones: Send + Sync {
    fn play_ringback(&self);
    fn stop_playing(&self);
}

/// 用户代理
pub trait UserAgent: Send + Sync {
    /// 当前处于前台的会话
    fn active_session(&self) -> Option<SessionId>;

    /// 挂断会话（BYE 或 CANCEL 由实现决定）
    fn hangup(&self, session: &SessionId);
}

/// 软电话界面页签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftphoneTab {
    /// 最近通话
    Recent,
}

/// 软电话界面
pub trait SoftphoneView: Send + Sync {
    fn clear_address_book_search(&self);
    fn show_tab(&self, tab: SoftphoneTab);
}

/// 把错误写入日志的上报器，用于命令行等无界面场景
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn trigger_error(&self, message: &str, severity: ErrorSeverity) {
        match severity {
            ErrorSeverity::Blocking => error!("{}", message),
            ErrorSeverity::NonBlocking => warn!("{}", message),
        }
    }

    fn resolve_error(&self) {
        info!("错误已清除");
    }
}
