//! Contract for the remote capture/indexing backend.
//!
//! The backend is an external service; this crate only coordinates it. All
//! calls may fail with a transport or backend error, and callers treat
//! failure as non-fatal: log and continue, or return a structured error to
//! the immediate API caller.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request to create a capture session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub end_user_id: String,
    pub metadata: Value,
    /// Lifecycle notifications are POSTed here when set; otherwise the
    /// event stream is the only notification path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedSession {
    pub id: String,
}

/// A channel the backend can capture, as reported by `list_channels`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel_id: String,
    pub media_type: String,
}

/// A channel selected for recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSelection {
    pub channel_id: String,
    pub media_type: String,
    pub record: bool,
    pub store: bool,
}

impl ChannelSelection {
    pub fn record_and_store(channel: &ChannelInfo) -> Self {
        Self {
            channel_id: channel.channel_id.clone(),
            media_type: channel.media_type.clone(),
            record: true,
            store: true,
        }
    }
}

/// A stream reported by a `capture_session.active` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RtStreamInfo {
    pub rtstream_id: String,
    pub name: String,
    #[serde(default)]
    pub media_types: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualIndexOptions {
    pub prompt: Option<String>,
    pub batch_time: Option<f64>,
    pub frame_count: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioIndexOptions {
    pub prompt: Option<String>,
    pub batch_type: Option<String>,
    pub batch_value: Option<f64>,
}

/// Handle to a backend-side index created for one stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamIndex {
    pub index_id: String,
}

/// One record from the content-event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentEvent {
    /// Channel discriminator: `transcript`, `visual_index` or `audio_index`.
    pub channel: String,
    #[serde(default)]
    pub rtstream_name: Option<String>,
    #[serde(default)]
    pub data: ContentData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentData {
    #[serde(default)]
    pub text: Option<String>,
    /// Either a bool or the string "true"/"false"; upstream is not
    /// consistent about the type.
    #[serde(default)]
    pub is_final: Option<Value>,
    #[serde(default)]
    pub start: Option<f64>,
}

/// Async sequence of content events; closable.
#[async_trait]
pub trait ContentEventStream: Send {
    async fn next_event(&mut self) -> Option<ContentEvent>;
    async fn close(&mut self);
}

/// The remote capture/indexing service.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    async fn create_session(&self, request: SessionRequest) -> Result<CreatedSession>;
    async fn list_channels(&self) -> Result<Vec<ChannelInfo>>;
    async fn start_session(&self, session_id: &str, channels: Vec<ChannelSelection>)
        -> Result<()>;
    async fn stop_session(&self) -> Result<()>;
    async fn shutdown(&self) -> Result<()>;
    async fn index_visuals(&self, rtstream_id: &str, options: VisualIndexOptions)
        -> Result<StreamIndex>;
    async fn index_audio(&self, rtstream_id: &str, options: AudioIndexOptions)
        -> Result<StreamIndex>;
    async fn search(&self, rtstream_id: &str, query: &str) -> Result<Value>;
    async fn update_index_prompt(&self, rtstream_id: &str, index_id: &str, prompt: &str)
        -> Result<()>;
    async fn open_event_stream(&self) -> Result<Box<dyn ContentEventStream>>;
}

/// Placeholder used when no backend client is configured. Every call fails
/// with the same error; the process stays up in degraded mode and local
/// functionality (overlay, hook routing) keeps working.
pub struct UnconfiguredBackend;

#[async_trait]
impl CaptureBackend for UnconfiguredBackend {
    async fn create_session(&self, _request: SessionRequest) -> Result<CreatedSession> {
        bail!("capture backend not configured")
    }

    async fn list_channels(&self) -> Result<Vec<ChannelInfo>> {
        bail!("capture backend not configured")
    }

    async fn start_session(
        &self,
        _session_id: &str,
        _channels: Vec<ChannelSelection>,
    ) -> Result<()> {
        bail!("capture backend not configured")
    }

    async fn stop_session(&self) -> Result<()> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn index_visuals(
        &self,
        _rtstream_id: &str,
        _options: VisualIndexOptions,
    ) -> Result<StreamIndex> {
        bail!("capture backend not configured")
    }

    async fn index_audio(
        &self,
        _rtstream_id: &str,
        _options: AudioIndexOptions,
    ) -> Result<StreamIndex> {
        bail!("capture backend not configured")
    }

    async fn search(&self, _rtstream_id: &str, _query: &str) -> Result<Value> {
        bail!("capture backend not configured")
    }

    async fn update_index_prompt(
        &self,
        _rtstream_id: &str,
        _index_id: &str,
        _prompt: &str,
    ) -> Result<()> {
        bail!("capture backend not configured")
    }

    async fn open_event_stream(&self) -> Result<Box<dyn ContentEventStream>> {
        bail!("capture backend not configured")
    }
}
