/// 通话录音
///
/// 录音器由宿主的媒体层实现；录音结束后把文件上传到
/// `/voip/upload_recording/{call_id}`
use crate::config::Config;
use crate::error::{ConfigError, MediaError};
use crate::session::SipDialog;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// 录音文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// 一个会话的录音器
#[async_trait]
pub trait SessionRecorder: Send + Sync {
    fn start(&self);

    fn stop(&self);

    /// 等待录音结束并返回文件
    async fn finish(&self) -> Result<Recording, MediaError>;
}

/// 为对话创建录音器
pub trait RecorderFactory: Send + Sync {
    fn create(&self, dialog: Arc<dyn SipDialog>) -> Arc<dyn SessionRecorder>;
}

/// 录音上传
#[async_trait]
pub trait RecordingUploader: Send + Sync {
    async fn upload(&self, path: &str, recording: Recording) -> Result<(), MediaError>;
}

/// 通话录音的上传路径
pub fn upload_path(call_id: u64) -> String {
    format!("/voip/upload_recording/{}", call_id)
}

/// 通过 HTTP POST 上传录音
pub struct HttpRecordingUploader {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRecordingUploader {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let base_url = config
            .upload_base_url
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("upload_base_url".into()))?;
        Ok(Self::new(base_url))
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl RecordingUploader for HttpRecordingUploader {
    async fn upload(&self, path: &str, recording: Recording) -> Result<(), MediaError> {
        let url = self.url_for(path);
        debug!("上传录音: {} ({} 字节)", url, recording.data.len());

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, recording.mime_type)
            .body(recording.data)
            .send()
            .await
            .map_err(|e| MediaError::Upload(e.to_string()))?;

        response
            .error_for_status()
            .map_err(|e| MediaError::Upload(e.to_string()))?;

        info!("录音上传完成: {}", url);
        Ok(())
    }
}
