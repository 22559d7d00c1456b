/// 媒体接口
///
/// 采集设备、发送/接收轨道和远端音频输出，由宿主的媒体层实现
use crate::error::MediaError;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// 媒体轨道
pub trait MediaTrack: Send + Sync {
    fn id(&self) -> String;
    fn kind(&self) -> TrackKind;
    fn stop(&self);
}

/// 媒体流：一组轨道
#[derive(Clone, Default)]
pub struct MediaStream {
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStream {
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self { tracks }
    }

    pub fn add_track(&mut self, track: Arc<dyn MediaTrack>) {
        self.tracks.push(track);
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks
            .iter()
            .filter(|track| track.kind() == TrackKind::Audio)
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self.tracks.iter().map(|track| track.id()).collect();
        f.debug_struct("MediaStream").field("tracks", &ids).finish()
    }
}

/// RTP 发送端
#[async_trait]
pub trait RtpSender: Send + Sync {
    fn track(&self) -> Option<Arc<dyn MediaTrack>>;

    /// 不重新协商直接替换发送轨道
    async fn replace_track(&self, track: Arc<dyn MediaTrack>) -> Result<(), MediaError>;
}

/// 对话的媒体连接
pub trait MediaConnection: Send + Sync {
    fn senders(&self) -> Vec<Arc<dyn RtpSender>>;

    /// 所有接收端当前的轨道
    fn receiver_tracks(&self) -> Vec<Arc<dyn MediaTrack>>;

    fn enable_receiver_tracks(&self, enabled: bool);

    fn enable_sender_tracks(&self, enabled: bool);
}

/// 音频采集约束
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioConstraint {
    /// 系统默认设备
    Any,
    /// 指定设备
    Device(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: AudioConstraint,
    pub video: bool,
}

impl MediaConstraints {
    /// 按首选输入设备构造约束，空字符串表示默认设备
    pub fn for_input_device(device_id: &str) -> Self {
        let audio = if device_id.is_empty() {
            AudioConstraint::Any
        } else {
            AudioConstraint::Device(device_id.to_string())
        };
        Self {
            audio,
            video: false,
        }
    }
}

/// 采集设备
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(&self, constraints: &MediaConstraints)
        -> Result<MediaStream, MediaError>;
}

/// 远端音频播放
pub trait AudioSink: Send + Sync {
    fn stream(&self) -> &MediaStream;
    fn play(&self);
    fn pause(&self);
    /// 解除与媒体流的绑定
    fn detach(&self);
}

pub trait AudioOutput: Send + Sync {
    fn create_sink(&self, stream: MediaStream) -> Box<dyn AudioSink>;
}
