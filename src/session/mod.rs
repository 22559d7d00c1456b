/// 通话会话模块
///
/// 一个 `Session` 对应一次呼叫尝试及其信令对话：
///
/// - 校验对端应答 SDP 的 DTLS-SRTP 要求，不满足时直接挂断
/// - 把对话事件翻译成铃声、通话记录、远端音频和录音等副作用
/// - 提供保持、静音、盲转和录音操作
///
/// 保持在 re-INVITE 被接受后才生效，静音立即生效。
mod dialog;
pub mod media;
mod registry;
mod types;

pub use dialog::{DialogObserver, DialogState, ReinviteOptions, SipDialog};
pub use registry::SessionRegistry;
pub use types::{Call, CallDirection, InviteState, SessionId};

use crate::config::{Config, RecordingPolicy, VoipMode};
use crate::error::{SessionError, SessionResult};
use crate::message::SipResponse;
use crate::recording::{upload_path, RecorderFactory, RecordingUploader, SessionRecorder};
use crate::sdp;
use crate::services::{
    CallService, ErrorReporter, ErrorSeverity, Ringtones, SoftphoneTab, SoftphoneView, UserAgent,
};
use async_trait::async_trait;
use media::{AudioOutput, AudioSink, MediaConnection, MediaStream};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, error, info, warn};

const CALL_SETUP_FAILED: &str = "An error occurred while attempting to establish the call.";

/// 会话依赖的宿主服务
#[derive(Clone)]
pub struct SessionContext {
    pub config: Arc<Config>,
    pub call_service: Arc<dyn CallService>,
    pub errors: Arc<dyn ErrorReporter>,
    pub ringtones: Arc<dyn Ringtones>,
    pub user_agent: Arc<dyn UserAgent>,
    pub view: Arc<dyn SoftphoneView>,
    pub audio_output: Arc<dyn AudioOutput>,
    pub recorders: Arc<dyn RecorderFactory>,
    pub uploader: Arc<dyn RecordingUploader>,
    pub registry: Arc<SessionRegistry>,
}

#[derive(Default)]
struct SessionState {
    invite_state: Option<InviteState>,
    is_on_hold: bool,
    is_muted: bool,
    /// re-INVITE 等待响应中
    hold_pending: bool,
    recorder: Option<Arc<dyn SessionRecorder>>,
    remote_audio: Option<Box<dyn AudioSink>>,
    transfer_target: Option<String>,
    /// 通话建立后，远端新增轨道需要重建音频
    track_hook_armed: bool,
}

pub struct Session {
    id: SessionId,
    call: Call,
    dialog: Option<Arc<dyn SipDialog>>,
    ctx: SessionContext,
    state: Mutex<SessionState>,
}

impl Session {
    /// 创建会话
    ///
    /// 缺少通话记录时返回 `MissingCall`。有对话时把会话注册为对话的观察者
    pub fn new(
        call: Option<Call>,
        dialog: Option<Arc<dyn SipDialog>>,
        ctx: SessionContext,
    ) -> SessionResult<Arc<Self>> {
        let call = call.ok_or(SessionError::MissingCall)?;
        let invite_state =
            (call.direction == CallDirection::Outgoing).then_some(InviteState::Trying);

        let session = Arc::new(Self {
            id: SessionId::new(),
            call,
            dialog,
            ctx,
            state: Mutex::new(SessionState {
                invite_state,
                ..Default::default()
            }),
        });
        session.ctx.registry.add(&session);

        if let Some(dialog) = &session.dialog {
            let weak = Arc::downgrade(&session);
            let observer: Weak<dyn DialogObserver> = weak;
            dialog.set_observer(observer);
        }

        info!(
            "创建会话 {}: call={} {:?} {}",
            session.id, session.call.id, session.call.direction, session.call.phone_number
        );
        Ok(session)
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn call(&self) -> &Call {
        &self.call
    }

    pub fn dialog(&self) -> Option<&Arc<dyn SipDialog>> {
        self.dialog.as_ref()
    }

    pub fn invite_state(&self) -> Option<InviteState> {
        self.lock().invite_state
    }

    pub fn is_on_hold(&self) -> bool {
        self.lock().is_on_hold
    }

    pub fn is_muted(&self) -> bool {
        self.lock().is_muted
    }

    pub fn has_recorder(&self) -> bool {
        self.lock().recorder.is_some()
    }

    pub fn has_remote_audio(&self) -> bool {
        self.lock().remote_audio.is_some()
    }

    pub fn transfer_target(&self) -> Option<String> {
        self.lock().transfer_target.clone()
    }

    /// 应答后盲转的目标，配合 `will_call_from_another_device` 使用
    pub fn set_transfer_target(&self, target: impl Into<String>) {
        self.lock().transfer_target = Some(target.into());
    }

    pub fn is_active_session(&self) -> bool {
        self.ctx.user_agent.active_session() == Some(self.id)
    }

    pub fn status_text(&self) -> &'static str {
        if self.is_on_hold() {
            return "On hold";
        }
        if self.ctx.config.mode == VoipMode::Demo {
            return "Demo call";
        }
        "In call"
    }

    pub(crate) fn media(&self) -> Option<Arc<dyn MediaConnection>> {
        self.dialog.as_ref().and_then(|dialog| dialog.media())
    }

    /// 保持/恢复
    ///
    /// 有对话时发送带 hold 选项的 re-INVITE，被接受后才更新状态和轨道；
    /// 失败时提示用户，状态不变。上一个请求未完成时直接拒绝
    pub async fn set_on_hold(&self, on_hold: bool) -> SessionResult<()> {
        let Some(dialog) = self.dialog.clone() else {
            self.lock().is_on_hold = on_hold;
            return Ok(());
        };

        {
            let mut state = self.lock();
            if state.hold_pending {
                warn!("会话 {} 的保持/恢复请求尚未完成", self.id);
                return Err(SessionError::HoldInProgress);
            }
            state.hold_pending = true;
        }
        // 调用方放弃等待时也要释放
        let pending = HoldPending(self);

        debug!("会话 {} re-INVITE hold={}", self.id, on_hold);
        let result = dialog.reinvite(ReinviteOptions { hold: on_hold }).await;
        if result.is_ok() {
            self.lock().is_on_hold = on_hold;
        }
        drop(pending);

        match result {
            Ok(()) => {
                info!("会话 {} {}", self.id, if on_hold { "已保持" } else { "已恢复" });
                self.update_tracks();
                Ok(())
            }
            Err(e) => {
                error!("re-INVITE 失败: {}", e);
                let action = if on_hold {
                    "putting the call on hold"
                } else {
                    "resuming the call"
                };
                let message = format!("Error {}:\n\n{}", action, e);
                self.ctx
                    .errors
                    .trigger_error(&message, ErrorSeverity::NonBlocking);
                Err(SessionError::HoldFailed {
                    action,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// 静音，立即生效
    pub fn set_muted(&self, muted: bool) {
        self.lock().is_muted = muted;
        self.update_tracks();
    }

    /// 按保持/静音状态设置轨道开关
    ///
    /// 接收端：未保持时开启；发送端：未保持且未静音时开启
    pub fn update_tracks(&self) {
        let Some(media) = self.media() else {
            return;
        };
        let (on_hold, muted) = {
            let state = self.lock();
            (state.is_on_hold, state.is_muted)
        };
        media.enable_receiver_tracks(!on_hold);
        media.enable_sender_tracks(!on_hold && !muted);
    }

    /// 盲转
    ///
    /// 没有对话（演示模式）时直接挂断；否则发送 REFER，被接受后挂断本地会话
    pub async fn blind_transfer(&self, target: &str) -> SessionResult<()> {
        self.ctx.view.clear_address_book_search();

        let Some(dialog) = &self.dialog else {
            self.ctx.user_agent.hangup(&self.id);
            return Ok(());
        };

        let uri = crate::utils::make_uri(target, &self.ctx.config.domain)
            .map_err(|e| SessionError::InvalidTarget(format!("{}: {}", target, e)))?;
        info!("会话 {} 盲转到 {}", self.id, uri);

        let response = dialog.refer(uri).await?;
        if response.is_success() {
            self.ctx.user_agent.hangup(&self.id);
        } else {
            warn!(
                "REFER 被拒绝: {} {}",
                response.status_code, response.reason_phrase
            );
        }
        Ok(())
    }

    /// 开始录音
    ///
    /// 每个会话只创建一个录音器；演示模式下不录音。录音结束后异步上传
    pub fn record(&self) {
        let recorder = {
            let mut state = self.lock();
            if state.recorder.is_some() {
                warn!("Session.record() called on a session that already had a recorder.");
                return;
            }
            let Some(dialog) = &self.dialog else {
                return;
            };
            let recorder = self.ctx.recorders.create(dialog.clone());
            state.recorder = Some(recorder.clone());
            recorder
        };

        recorder.start();
        info!("会话 {} 开始录音", self.id);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("没有运行中的 tokio runtime，录音不会上传");
            return;
        };
        let uploader = self.ctx.uploader.clone();
        let path = upload_path(self.call.id);
        runtime.spawn(async move {
            match recorder.finish().await {
                Ok(recording) => {
                    if let Err(e) = uploader.upload(&path, recording).await {
                        error!("录音上传失败 {}: {}", path, e);
                    }
                }
                Err(e) => error!("录音失败: {}", e),
            }
        });
    }

    /// 呼出 INVITE 收到 2xx
    pub async fn on_outgoing_invite_accepted(&self, response: &SipResponse) {
        if let Some(sdp) = response.sdp() {
            if let Err(cause) = sdp::validate_secure_media(sdp) {
                warn!("会话 {} 的应答 SDP 不满足 DTLS-SRTP: {:?}", self.id, cause);
                if self.is_active_session() {
                    self.ctx.ringtones.stop_playing();
                }
                let message = format!("{}\n\n{}", CALL_SETUP_FAILED, cause);
                self.ctx
                    .errors
                    .trigger_error(&message, ErrorSeverity::NonBlocking);
                self.ctx.user_agent.hangup(&self.id);
                return;
            }
        }

        self.lock().invite_state = Some(InviteState::Ok);
        if self.is_active_session() {
            self.ctx.ringtones.stop_playing();
        }

        if self.ctx.config.will_call_from_another_device {
            match self.transfer_target() {
                Some(target) => {
                    if let Err(e) = self.blind_transfer(&target).await {
                        error!("转接到 {} 失败: {}", target, e);
                    }
                    return;
                }
                None => warn!("未设置转接目标，按普通呼叫处理"),
            }
        }
        self.ctx.call_service.start(&self.call);
    }

    /// 呼出 INVITE 收到 1xx，只处理 180/183
    pub fn on_outgoing_invite_progress(&self, response: &SipResponse) {
        match response.status_code {
            180 | 183 => {
                if self.is_active_session() {
                    self.ctx.ringtones.play_ringback();
                }
                self.lock().invite_state = Some(InviteState::Ringing);
            }
            code => debug!("忽略临时响应: {}", code),
        }
    }

    /// 呼出 INVITE 被拒绝
    ///
    /// 487 是主叫自己取消，不提示也不记为拒绝
    pub fn on_outgoing_invite_rejected(&self, response: &SipResponse) {
        if self.is_active_session() {
            self.ctx.ringtones.stop_playing();
        }
        if response.status_code == 487 {
            return;
        }
        let message = outgoing_rejected_message(response);
        self.ctx
            .errors
            .trigger_error(&message, ErrorSeverity::NonBlocking);
        self.ctx.call_service.reject(&self.call);
    }

    /// 来电在应答前被取消
    pub async fn on_incoming_invite_canceled(&self) {
        if self.is_active_session() {
            self.ctx.ringtones.stop_playing();
            self.ctx.view.show_tab(SoftphoneTab::Recent);
        }
        if let Some(dialog) = &self.dialog {
            if let Err(e) = dialog.reject(487).await {
                warn!("拒绝已取消的来电失败: {}", e);
            }
        }
        self.ctx.call_service.miss(&self.call);
    }

    pub fn on_session_state_change(&self, state: DialogState) {
        debug!("会话 {} 状态: {}", self.id, state);
        match state {
            DialogState::Initial => {}
            DialogState::Establishing => {}
            DialogState::Established => self.on_session_established(),
            DialogState::Terminating => {}
            DialogState::Terminated => self.on_session_terminated(),
        }
    }

    /// 引擎以字符串上报状态时使用，未知状态返回错误
    pub fn on_session_state_label(&self, label: &str) -> SessionResult<()> {
        let state = label.parse::<DialogState>()?;
        self.on_session_state_change(state);
        Ok(())
    }

    fn on_session_established(&self) {
        self.set_up_remote_audio();
        self.lock().track_hook_armed = true;
        if self.ctx.config.recording_policy == RecordingPolicy::Always {
            self.record();
        }
    }

    fn on_session_terminated(&self) {
        let recorder = {
            let mut state = self.lock();
            state.track_hook_armed = false;
            state.recorder.clone()
        };
        self.clean_up_remote_audio();
        if let Some(recorder) = recorder {
            recorder.stop();
        }
        self.ctx.registry.remove(&self.id);
    }

    /// 用所有接收端轨道重建远端音频，旧的输出先拆除
    ///
    /// 新流继续使用的轨道不会被停止
    fn set_up_remote_audio(&self) {
        let Some(media) = self.media() else {
            return;
        };
        let stream = MediaStream::new(media.receiver_tracks());
        self.update_tracks();
        let sink = self.ctx.audio_output.create_sink(stream);

        let previous = self.lock().remote_audio.take();
        if let Some(previous) = previous {
            let kept: Vec<String> = sink.stream().tracks().iter().map(|t| t.id()).collect();
            previous.pause();
            for track in previous.stream().tracks() {
                if !kept.contains(&track.id()) {
                    track.stop();
                }
            }
            previous.detach();
        }

        let mut state = self.lock();
        let sink = state.remote_audio.insert(sink);
        sink.play();
    }

    fn clean_up_remote_audio(&self) {
        let Some(sink) = self.lock().remote_audio.take() else {
            return;
        };
        sink.pause();
        sink.stream().stop_all();
        sink.detach();
    }
}

/// 保持/恢复请求进行中的标记，释放时清除
struct HoldPending<'a>(&'a Session);

impl Drop for HoldPending<'_> {
    fn drop(&mut self) {
        self.0.lock().hold_pending = false;
    }
}

#[async_trait]
impl DialogObserver for Session {
    fn on_bye(&self) {
        info!("会话 {} 对端挂断", self.id);
        self.ctx.call_service.end(&self.call);
    }

    fn on_state_change(&self, state: DialogState) {
        self.on_session_state_change(state);
    }

    fn on_remote_track_added(&self) {
        if self.lock().track_hook_armed {
            self.set_up_remote_audio();
        }
    }

    async fn on_invite_accepted(&self, response: &SipResponse) {
        self.on_outgoing_invite_accepted(response).await;
    }

    fn on_invite_progress(&self, response: &SipResponse) {
        self.on_outgoing_invite_progress(response);
    }

    fn on_invite_rejected(&self, response: &SipResponse) {
        self.on_outgoing_invite_rejected(response);
    }

    async fn on_invite_canceled(&self) {
        self.on_incoming_invite_canceled().await;
    }
}

/// 呼出被拒绝时给用户的提示
pub fn outgoing_rejected_message(response: &SipResponse) -> String {
    match response.status_code {
        404 | 488 | 603 => format!(
            "The number is incorrect, the user credentials could be wrong or the connection cannot be made. Please check your configuration.\n(Reason received: {})",
            response.reason_phrase
        ),
        486 | 600 => "The person you try to contact is currently unavailable.".to_string(),
        _ => format!("Call rejected (reason: “{}”)", response.reason_phrase),
    }
}
