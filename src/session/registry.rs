/// 会话注册表
///
/// 持有所有存活的会话和首选输入设备，负责切换麦克风时给每个通话换轨
use super::media::{MediaConstraints, MediaDevices};
use super::{Session, SessionId};
use crate::error::MediaError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info};

pub struct SessionRegistry {
    devices: Arc<dyn MediaDevices>,
    preferred_input_device: Mutex<String>,
    sessions: Mutex<HashMap<SessionId, Weak<Session>>>,
    /// 串行化设备切换
    switch_lock: tokio::sync::Mutex<()>,
}

impl SessionRegistry {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            preferred_input_device: Mutex::new(String::new()),
            sessions: Mutex::new(HashMap::new()),
            switch_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn add(&self, session: &Arc<Session>) {
        debug!("登记会话: {}", session.id());
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session.id(), Arc::downgrade(session));
    }

    pub fn remove(&self, id: &SessionId) {
        if self
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .is_some()
        {
            debug!("移除会话: {}", id);
        }
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// 存活的会话，顺带清理已释放的条目
    pub fn live_sessions(&self) -> Vec<Arc<Session>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, weak| weak.strong_count() > 0);
        sessions.values().filter_map(Weak::upgrade).collect()
    }

    pub fn preferred_input_device(&self) -> String {
        self.preferred_input_device
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 新采集请求使用的约束
    pub fn media_constraints(&self) -> MediaConstraints {
        MediaConstraints::for_input_device(&self.preferred_input_device())
    }

    /// 切换输入设备
    ///
    /// 用新设备采集一路音频，替换每个存活通话中所有已有轨道的发送端，
    /// 然后按保持/静音状态重新设置轨道开关，不需要重新协商
    pub async fn switch_input_device(&self, device_id: &str) -> Result<(), MediaError> {
        let _guard = self.switch_lock.lock().await;

        info!("切换输入设备: {}", device_id);
        *self
            .preferred_input_device
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = device_id.to_string();

        let stream = self
            .devices
            .get_user_media(&self.media_constraints())
            .await?;
        let track = stream
            .audio_tracks()
            .next()
            .cloned()
            .ok_or(MediaError::NoAudioTrack)?;

        for session in self.live_sessions() {
            let Some(media) = session.media() else {
                continue;
            };
            for sender in media.senders() {
                if sender.track().is_some() {
                    sender.replace_track(track.clone()).await?;
                }
            }
            session.update_tracks();
            debug!("会话 {} 已切换到设备 {}", session.id(), device_id);
        }
        Ok(())
    }
}
