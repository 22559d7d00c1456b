//! 测试替身：信令引擎、媒体层和宿主服务的内存实现

use crate::config::Config;
use crate::error::{DialogError, MediaError, SipError};
use crate::message::SipResponse;
use crate::recording::{RecorderFactory, Recording, RecordingUploader, SessionRecorder};
use crate::registration::{RegistererState, RegistrationClient, RegistrationObserver};
use crate::services::{
    CallService, ErrorReporter, ErrorSeverity, Ringtones, SoftphoneTab, SoftphoneView, UserAgent,
};
use crate::session::media::{
    AudioConstraint, AudioOutput, AudioSink, MediaConnection, MediaConstraints, MediaDevices,
    MediaStream, MediaTrack, RtpSender, TrackKind,
};
use crate::session::{
    Call, CallDirection, DialogObserver, ReinviteOptions, Session, SessionContext, SessionId,
    SessionRegistry, SipDialog,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{mpsc, oneshot, Notify};

// ---------- 注册 ----------

pub struct FakeRegistrationClient {
    responses: Mutex<VecDeque<Result<SipResponse, SipError>>>,
    observer: Mutex<Option<Weak<dyn RegistrationObserver>>>,
    register_count: AtomicUsize,
    unregister_count: AtomicUsize,
    last_expires: Mutex<Option<u32>>,
    register_gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeRegistrationClient {
    pub fn new(responses: Vec<Result<SipResponse, SipError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            observer: Mutex::new(None),
            register_count: AtomicUsize::new(0),
            unregister_count: AtomicUsize::new(0),
            last_expires: Mutex::new(None),
            register_gate: Mutex::new(None),
        }
    }

    /// 下一个 REGISTER 等到返回的 sender 触发后才完成
    pub fn gate_register(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.register_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn register_count(&self) -> usize {
        self.register_count.load(Ordering::SeqCst)
    }

    pub fn unregister_count(&self) -> usize {
        self.unregister_count.load(Ordering::SeqCst)
    }

    pub fn last_expires(&self) -> Option<u32> {
        *self.last_expires.lock().unwrap()
    }

    fn notify(&self, state: RegistererState) {
        let observer = self.observer.lock().unwrap().clone();
        if let Some(observer) = observer.and_then(|weak| weak.upgrade()) {
            observer.on_state_changed(state);
        }
    }
}

#[async_trait]
impl RegistrationClient for FakeRegistrationClient {
    fn set_observer(&self, observer: Weak<dyn RegistrationObserver>) {
        *self.observer.lock().unwrap() = Some(observer);
    }

    async fn register(&self, expires: u32) -> Result<SipResponse, SipError> {
        self.register_count.fetch_add(1, Ordering::SeqCst);
        *self.last_expires.lock().unwrap() = Some(expires);
        let gate = self.register_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SipResponse::new(200, "OK")));
        if let Ok(r) = &response {
            self.notify(RegistererState::Registering);
            if r.is_success() {
                self.notify(RegistererState::Registered);
            } else {
                self.notify(RegistererState::Unregistered);
            }
        }
        response
    }

    async fn unregister(&self) -> Result<SipResponse, SipError> {
        self.unregister_count.fetch_add(1, Ordering::SeqCst);
        self.notify(RegistererState::Unregistered);
        Ok(SipResponse::new(200, "OK"))
    }
}

// ---------- 宿主服务 ----------

#[derive(Default)]
pub struct RecordingErrorReporter {
    messages: Mutex<Vec<(String, ErrorSeverity)>>,
    resolved: AtomicUsize,
}

impl RecordingErrorReporter {
    pub fn messages(&self) -> Vec<(String, ErrorSeverity)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn resolved(&self) -> usize {
        self.resolved.load(Ordering::SeqCst)
    }
}

impl ErrorReporter for RecordingErrorReporter {
    fn trigger_error(&self, message: &str, severity: ErrorSeverity) {
        self.messages
            .lock()
            .unwrap()
            .push((message.to_string(), severity));
    }

    fn resolve_error(&self) {
        self.resolved.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    Start,
    Reject,
    Miss,
    End,
}

#[derive(Default)]
pub struct FakeCallService {
    events: Mutex<Vec<(CallEvent, u64)>>,
}

impl FakeCallService {
    pub fn events(&self) -> Vec<(CallEvent, u64)> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: CallEvent) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| *e == event)
            .count()
    }

    fn push(&self, event: CallEvent, call: &Call) {
        self.events.lock().unwrap().push((event, call.id));
    }
}

impl CallService for FakeCallService {
    fn start(&self, call: &Call) {
        self.push(CallEvent::Start, call);
    }

    fn reject(&self, call: &Call) {
        self.push(CallEvent::Reject, call);
    }

    fn miss(&self, call: &Call) {
        self.push(CallEvent::Miss, call);
    }

    fn end(&self, call: &Call) {
        self.push(CallEvent::End, call);
    }
}

#[derive(Default)]
pub struct FakeRingtones {
    ringback: AtomicUsize,
    stopped: AtomicUsize,
}

impl FakeRingtones {
    pub fn ringback_count(&self) -> usize {
        self.ringback.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Ringtones for FakeRingtones {
    fn play_ringback(&self) {
        self.ringback.fetch_add(1, Ordering::SeqCst);
    }

    fn stop_playing(&self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeUserAgent {
    active: Mutex<Option<SessionId>>,
    hangups: Mutex<Vec<SessionId>>,
}

impl FakeUserAgent {
    pub fn set_active(&self, id: Option<SessionId>) {
        *self.active.lock().unwrap() = id;
    }

    pub fn hangups(&self) -> Vec<SessionId> {
        self.hangups.lock().unwrap().clone()
    }
}

impl UserAgent for FakeUserAgent {
    fn active_session(&self) -> Option<SessionId> {
        *self.active.lock().unwrap()
    }

    fn hangup(&self, session: &SessionId) {
        self.hangups.lock().unwrap().push(*session);
    }
}

#[derive(Default)]
pub struct FakeView {
    cleared: AtomicUsize,
    tabs: Mutex<Vec<SoftphoneTab>>,
}

impl FakeView {
    pub fn cleared(&self) -> usize {
        self.cleared.load(Ordering::SeqCst)
    }

    pub fn tabs(&self) -> Vec<SoftphoneTab> {
        self.tabs.lock().unwrap().clone()
    }
}

impl SoftphoneView for FakeView {
    fn clear_address_book_search(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }

    fn show_tab(&self, tab: SoftphoneTab) {
        self.tabs.lock().unwrap().push(tab);
    }
}

// ---------- 媒体 ----------

pub struct FakeTrack {
    id: String,
    kind: TrackKind,
    stopped: AtomicBool,
}

impl FakeTrack {
    pub fn audio(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            kind: TrackKind::Audio,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

pub struct FakeSender {
    track: Mutex<Option<Arc<dyn MediaTrack>>>,
    replaced: AtomicUsize,
}

impl FakeSender {
    pub fn current_track_id(&self) -> Option<String> {
        self.track.lock().unwrap().as_ref().map(|track| track.id())
    }

    pub fn replace_count(&self) -> usize {
        self.replaced.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RtpSender for FakeSender {
    fn track(&self) -> Option<Arc<dyn MediaTrack>> {
        self.track.lock().unwrap().clone()
    }

    async fn replace_track(&self, track: Arc<dyn MediaTrack>) -> Result<(), MediaError> {
        self.replaced.fetch_add(1, Ordering::SeqCst);
        *self.track.lock().unwrap() = Some(track);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMediaConnection {
    senders: Mutex<Vec<Arc<FakeSender>>>,
    receivers: Mutex<Vec<Arc<FakeTrack>>>,
    receiver_enabled: Mutex<Option<bool>>,
    sender_enabled: Mutex<Option<bool>>,
}

impl FakeMediaConnection {
    pub fn add_sender(&self, track: Option<Arc<FakeTrack>>) -> Arc<FakeSender> {
        let sender = Arc::new(FakeSender {
            track: Mutex::new(track.map(|t| t as Arc<dyn MediaTrack>)),
            replaced: AtomicUsize::new(0),
        });
        self.senders.lock().unwrap().push(sender.clone());
        sender
    }

    pub fn add_receiver(&self, track: Arc<FakeTrack>) {
        self.receivers.lock().unwrap().push(track);
    }

    pub fn receivers(&self) -> Vec<Arc<FakeTrack>> {
        self.receivers.lock().unwrap().clone()
    }

    /// 当前有轨道的发送端
    pub fn active_senders(&self) -> Vec<Arc<FakeSender>> {
        self.senders
            .lock()
            .unwrap()
            .iter()
            .filter(|sender| sender.current_track_id().is_some())
            .cloned()
            .collect()
    }

    pub fn receiver_enabled(&self) -> Option<bool> {
        *self.receiver_enabled.lock().unwrap()
    }

    pub fn sender_enabled(&self) -> Option<bool> {
        *self.sender_enabled.lock().unwrap()
    }
}

impl MediaConnection for FakeMediaConnection {
    fn senders(&self) -> Vec<Arc<dyn RtpSender>> {
        self.senders
            .lock()
            .unwrap()
            .iter()
            .map(|sender| sender.clone() as Arc<dyn RtpSender>)
            .collect()
    }

    fn receiver_tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.receivers
            .lock()
            .unwrap()
            .iter()
            .map(|track| track.clone() as Arc<dyn MediaTrack>)
            .collect()
    }

    fn enable_receiver_tracks(&self, enabled: bool) {
        *self.receiver_enabled.lock().unwrap() = Some(enabled);
    }

    fn enable_sender_tracks(&self, enabled: bool) {
        *self.sender_enabled.lock().unwrap() = Some(enabled);
    }
}

#[derive(Default)]
pub struct FakeMediaDevices {
    constraints: Mutex<Vec<MediaConstraints>>,
    empty: AtomicBool,
}

impl FakeMediaDevices {
    pub fn last_constraints(&self) -> Option<MediaConstraints> {
        self.constraints.lock().unwrap().last().cloned()
    }

    pub fn return_empty_stream(&self) {
        self.empty.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaDevices for FakeMediaDevices {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, MediaError> {
        self.constraints.lock().unwrap().push(constraints.clone());
        if self.empty.load(Ordering::SeqCst) {
            return Ok(MediaStream::default());
        }
        let id = match &constraints.audio {
            AudioConstraint::Any => "capture-default".to_string(),
            AudioConstraint::Device(id) => format!("capture-{}", id),
        };
        let track: Arc<dyn MediaTrack> = FakeTrack::audio(&id);
        Ok(MediaStream::new(vec![track]))
    }
}

#[derive(Default)]
pub struct SinkLog {
    pub track_ids: Vec<String>,
    pub played: AtomicBool,
    pub paused: AtomicBool,
    pub detached: AtomicBool,
}

struct FakeSink {
    stream: MediaStream,
    log: Arc<SinkLog>,
}

impl AudioSink for FakeSink {
    fn stream(&self) -> &MediaStream {
        &self.stream
    }

    fn play(&self) {
        self.log.played.store(true, Ordering::SeqCst);
    }

    fn pause(&self) {
        self.log.paused.store(true, Ordering::SeqCst);
    }

    fn detach(&self) {
        self.log.detached.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeAudioOutput {
    sinks: Mutex<Vec<Arc<SinkLog>>>,
}

impl FakeAudioOutput {
    pub fn sinks(&self) -> Vec<Arc<SinkLog>> {
        self.sinks.lock().unwrap().clone()
    }
}

impl AudioOutput for FakeAudioOutput {
    fn create_sink(&self, stream: MediaStream) -> Box<dyn AudioSink> {
        let log = Arc::new(SinkLog {
            track_ids: stream.tracks().iter().map(|track| track.id()).collect(),
            ..Default::default()
        });
        self.sinks.lock().unwrap().push(log.clone());
        Box::new(FakeSink { stream, log })
    }
}

// ---------- 录音 ----------

#[derive(Default)]
pub struct FakeRecorder {
    started: AtomicBool,
    stopped: Notify,
}

impl FakeRecorder {
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionRecorder for FakeRecorder {
    fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stopped.notify_one();
    }

    async fn finish(&self) -> Result<Recording, MediaError> {
        self.stopped.notified().await;
        Ok(Recording {
            data: b"OggS".to_vec(),
            mime_type: "audio/ogg".into(),
        })
    }
}

#[derive(Default)]
pub struct FakeRecorderFactory {
    created: Mutex<Vec<Arc<FakeRecorder>>>,
}

impl FakeRecorderFactory {
    pub fn created(&self) -> Vec<Arc<FakeRecorder>> {
        self.created.lock().unwrap().clone()
    }
}

impl RecorderFactory for FakeRecorderFactory {
    fn create(&self, _dialog: Arc<dyn SipDialog>) -> Arc<dyn SessionRecorder> {
        let recorder = Arc::new(FakeRecorder::default());
        self.created.lock().unwrap().push(recorder.clone());
        recorder
    }
}

pub struct FakeUploader {
    tx: mpsc::UnboundedSender<(String, Recording)>,
}

#[async_trait]
impl RecordingUploader for FakeUploader {
    async fn upload(&self, path: &str, recording: Recording) -> Result<(), MediaError> {
        let _ = self.tx.send((path.to_string(), recording));
        Ok(())
    }
}

// ---------- 信令对话 ----------

#[derive(Default)]
pub struct FakeDialog {
    observer: Mutex<Option<Weak<dyn DialogObserver>>>,
    media: Mutex<Option<Arc<FakeMediaConnection>>>,
    reinvite_results: Mutex<VecDeque<Result<(), DialogError>>>,
    reinvites: Mutex<Vec<bool>>,
    reinvite_gate: Mutex<Option<oneshot::Receiver<()>>>,
    refer_response: Mutex<Option<SipResponse>>,
    refers: Mutex<Vec<String>>,
    rejects: Mutex<Vec<u16>>,
}

impl FakeDialog {
    pub fn observer(&self) -> Option<Arc<dyn DialogObserver>> {
        self.observer
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|weak| weak.upgrade())
    }

    /// 建立媒体连接：一个带麦克风轨道的发送端和一个远端接收轨道
    pub fn connect_media(&self) -> Arc<FakeMediaConnection> {
        let media = Arc::new(FakeMediaConnection::default());
        media.add_sender(Some(FakeTrack::audio("mic-default")));
        media.add_receiver(FakeTrack::audio("remote-1"));
        *self.media.lock().unwrap() = Some(media.clone());
        media
    }

    pub fn push_reinvite_result(&self, result: Result<(), DialogError>) {
        self.reinvite_results.lock().unwrap().push_back(result);
    }

    /// 下一个 re-INVITE 等到返回的 sender 触发后才完成
    pub fn gate_reinvite(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.reinvite_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn reinvites(&self) -> Vec<bool> {
        self.reinvites.lock().unwrap().clone()
    }

    pub fn set_refer_response(&self, response: SipResponse) {
        *self.refer_response.lock().unwrap() = Some(response);
    }

    pub fn refers(&self) -> Vec<String> {
        self.refers.lock().unwrap().clone()
    }

    pub fn rejects(&self) -> Vec<u16> {
        self.rejects.lock().unwrap().clone()
    }
}

#[async_trait]
impl SipDialog for FakeDialog {
    fn set_observer(&self, observer: Weak<dyn DialogObserver>) {
        *self.observer.lock().unwrap() = Some(observer);
    }

    async fn reinvite(&self, options: ReinviteOptions) -> Result<(), DialogError> {
        self.reinvites.lock().unwrap().push(options.hold);
        let gate = self.reinvite_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.reinvite_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn refer(&self, target: rsip::Uri) -> Result<SipResponse, DialogError> {
        self.refers.lock().unwrap().push(target.to_string());
        Ok(self
            .refer_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| SipResponse::new(202, "Accepted")))
    }

    async fn reject(&self, status_code: u16) -> Result<(), DialogError> {
        self.rejects.lock().unwrap().push(status_code);
        Ok(())
    }

    fn media(&self) -> Option<Arc<dyn MediaConnection>> {
        self.media
            .lock()
            .unwrap()
            .clone()
            .map(|media| media as Arc<dyn MediaConnection>)
    }
}

// ---------- 组装 ----------

pub struct Harness {
    pub config: Config,
    pub call_service: Arc<FakeCallService>,
    pub errors: Arc<RecordingErrorReporter>,
    pub ringtones: Arc<FakeRingtones>,
    pub user_agent: Arc<FakeUserAgent>,
    pub view: Arc<FakeView>,
    pub audio_output: Arc<FakeAudioOutput>,
    pub recorders: Arc<FakeRecorderFactory>,
    pub devices: Arc<FakeMediaDevices>,
    pub registry: Arc<SessionRegistry>,
    uploader: Arc<FakeUploader>,
    uploads: tokio::sync::Mutex<mpsc::UnboundedReceiver<(String, Recording)>>,
    next_call_id: AtomicUsize,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::new("pbx.example.com", "1001", "secret").unwrap())
    }

    pub fn with_config(config: Config) -> Self {
        let devices = Arc::new(FakeMediaDevices::default());
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            config,
            call_service: Arc::default(),
            errors: Arc::default(),
            ringtones: Arc::default(),
            user_agent: Arc::default(),
            view: Arc::default(),
            audio_output: Arc::default(),
            recorders: Arc::default(),
            registry: Arc::new(SessionRegistry::new(devices.clone())),
            devices,
            uploader: Arc::new(FakeUploader { tx }),
            uploads: tokio::sync::Mutex::new(rx),
            next_call_id: AtomicUsize::new(1),
        }
    }

    pub fn context(&self) -> SessionContext {
        SessionContext {
            config: Arc::new(self.config.clone()),
            call_service: self.call_service.clone(),
            errors: self.errors.clone(),
            ringtones: self.ringtones.clone(),
            user_agent: self.user_agent.clone(),
            view: self.view.clone(),
            audio_output: self.audio_output.clone(),
            recorders: self.recorders.clone(),
            uploader: self.uploader.clone(),
            registry: self.registry.clone(),
        }
    }

    /// 创建会话；`with_dialog` 为 false 时模拟演示模式，返回的对话不与会话绑定
    pub fn session(
        &self,
        direction: CallDirection,
        with_dialog: bool,
    ) -> (Arc<Session>, Arc<FakeDialog>) {
        let id = self.next_call_id.fetch_add(1, Ordering::SeqCst) as u64;
        let call = match direction {
            CallDirection::Outgoing => Call::outgoing(id, "1002"),
            CallDirection::Incoming => Call::incoming(id, "1003"),
        };
        let dialog = Arc::new(FakeDialog::default());
        let bound = with_dialog.then(|| dialog.clone() as Arc<dyn SipDialog>);
        let session = Session::new(Some(call), bound, self.context()).unwrap();
        (session, dialog)
    }

    /// 当前会话设为前台会话
    pub fn activate(&self, session: &Session) {
        self.user_agent.set_active(Some(session.id()));
    }

    pub async fn next_upload(&self) -> Option<(String, Recording)> {
        let mut rx = self.uploads.lock().await;
        tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .ok()
            .flatten()
    }
}
