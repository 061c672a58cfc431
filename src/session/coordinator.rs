//! Session lifecycle coordination: applies inbound lifecycle notifications
//! to the recording state machine, ingests content events into the context
//! buffer, and starts indexing exactly once per session.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::event::{
    audio_modality, normalize_finality, rtstream_display_name, start_to_millis, LifecycleEvent,
    LifecycleNotification,
};
use crate::backend::{
    AudioIndexOptions, CaptureBackend, ChannelSelection, ContentEvent, ContentEventStream,
    RtStreamInfo, SessionRequest, VisualIndexOptions,
};
use crate::buffer::{ContextBuffer, ContextEntry, Modality};
use crate::config::{IndexingConfig, IndexingOverrides};
use crate::state::{RecordingState, RtStreamEntry};
use crate::ui::Notifier;

const STREAM_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct SessionCoordinator {
    state: Arc<RecordingState>,
    buffer: Arc<ContextBuffer>,
    backend: Arc<dyn CaptureBackend>,
    notifier: Arc<dyn Notifier>,
    indexing_defaults: IndexingConfig,
    run_id: uuid::Uuid,
    callback_url: Mutex<Option<String>>,
    /// Id of the session this process created; lifecycle notifications for
    /// any other session are not ours and are ignored entirely.
    local_session: Mutex<Option<String>>,
    runtime_overrides: Mutex<Option<IndexingOverrides>>,
    /// Session for which indexing has already been started.
    indexed_session: Mutex<Option<String>>,
    stream_stop: Mutex<Option<oneshot::Sender<()>>>,
    stream_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionCoordinator {
    pub fn new(
        state: Arc<RecordingState>,
        buffer: Arc<ContextBuffer>,
        backend: Arc<dyn CaptureBackend>,
        notifier: Arc<dyn Notifier>,
        indexing_defaults: IndexingConfig,
        run_id: uuid::Uuid,
    ) -> Arc<Self> {
        Arc::new(Self {
            state,
            buffer,
            backend,
            notifier,
            indexing_defaults,
            run_id,
            callback_url: Mutex::new(None),
            local_session: Mutex::new(None),
            runtime_overrides: Mutex::new(None),
            indexed_session: Mutex::new(None),
            stream_stop: Mutex::new(None),
            stream_task: Mutex::new(None),
        })
    }

    pub async fn set_callback_url(&self, url: Option<String>) {
        *self.callback_url.lock().await = url;
    }

    pub async fn local_session(&self) -> Option<String> {
        self.local_session.lock().await.clone()
    }

    // ------------------------------------------------------------------
    // Recording control
    // ------------------------------------------------------------------

    /// Create the backend session on first use; subsequent calls return
    /// the existing id.
    pub async fn ensure_session(&self) -> Result<String> {
        let mut local = self.local_session.lock().await;
        if let Some(id) = local.as_ref() {
            return Ok(id.clone());
        }

        let request = SessionRequest {
            end_user_id: "local_user".to_string(),
            metadata: json!({ "app": "pair-recorder", "run_id": self.run_id.to_string() }),
            callback_url: self.callback_url.lock().await.clone(),
        };
        let created = self
            .backend
            .create_session(request)
            .await
            .context("creating capture session")?;
        info!("capture session created: {}", created.id);
        *local = Some(created.id.clone());
        Ok(created.id)
    }

    pub async fn start_recording(
        &self,
        channels: Option<Vec<ChannelSelection>>,
        overrides: Option<IndexingOverrides>,
    ) -> Result<String> {
        if self.state.is_active().await {
            bail!("Already recording");
        }

        if overrides.is_some() {
            info!("recording started with runtime indexing overrides");
        }
        *self.runtime_overrides.lock().await = overrides;

        let session_id = self.ensure_session().await?;
        let channels = match channels {
            Some(channels) if !channels.is_empty() => channels,
            _ => self.default_channels().await?,
        };

        info!(
            "starting capture for session {} with {} channel(s)",
            session_id,
            channels.len()
        );
        self.backend
            .start_session(&session_id, channels)
            .await
            .context("starting capture")?;

        Ok(session_id)
    }

    pub async fn stop_recording(&self) -> Result<Option<f64>> {
        if !self.state.is_active().await {
            bail!("Not recording");
        }

        self.backend
            .stop_session()
            .await
            .context("stopping capture")?;

        let duration = self.state.duration_secs().await;
        *self.runtime_overrides.lock().await = None;
        Ok(duration)
    }

    /// Default channel set: the default mic, the default system audio and
    /// the first video channel the backend reports.
    async fn default_channels(&self) -> Result<Vec<ChannelSelection>> {
        let available = self
            .backend
            .list_channels()
            .await
            .context("listing channels")?;

        let mic = available.iter().find(|c| c.channel_id == "mic:default");
        let system_audio = available
            .iter()
            .find(|c| c.channel_id == "system_audio:default");
        let display = available.iter().find(|c| c.media_type == "video");

        let picked: Vec<ChannelSelection> = [mic, system_audio, display]
            .into_iter()
            .flatten()
            .map(ChannelSelection::record_and_store)
            .collect();

        if picked.is_empty() {
            bail!("no capture channels available");
        }
        Ok(picked)
    }

    // ------------------------------------------------------------------
    // Lifecycle notifications
    // ------------------------------------------------------------------

    pub async fn handle_lifecycle(&self, notification: LifecycleNotification) {
        let session = notification.session_id.clone();
        match notification.event {
            LifecycleEvent::Created => {
                info!(session = session.as_deref(), "session created");
            }
            LifecycleEvent::Starting => self.state.mark_starting().await,
            LifecycleEvent::Active { rtstreams } => {
                self.handle_active(session, rtstreams).await;
            }
            LifecycleEvent::Stopping => self.state.mark_stopping().await,
            LifecycleEvent::Stopped => {
                self.state.mark_stopped().await;
                self.close_stream().await;
            }
            LifecycleEvent::Exported {
                video_id,
                player_url,
            } => {
                info!(
                    video_id = video_id.as_deref(),
                    "session exported"
                );
                self.state.mark_exported(video_id, player_url).await;
            }
            LifecycleEvent::Failed { code, message } => {
                warn!("session failed: {} ({})", message, code);
                self.state.mark_failed(code, message.clone()).await;
                self.notifier.notify(
                    "Recording failed",
                    &format!("{}. Start a new recording to continue.", message),
                );
                self.close_stream().await;
            }
            LifecycleEvent::Unrecognized(kind) => {
                info!("unhandled lifecycle event type: {}", kind);
            }
        }
    }

    async fn handle_active(&self, session_id: Option<String>, rtstreams: Vec<RtStreamInfo>) {
        let Some(session_id) = session_id else {
            debug!("active notification without session id, ignoring");
            return;
        };

        // Multiple recordings may share the same backend; a notification
        // for a session this process did not create is not ours.
        let local = self.local_session.lock().await.clone();
        if local.as_deref() != Some(session_id.as_str()) {
            debug!(
                expected = local.as_deref(),
                got = %session_id,
                "active notification for foreign session, ignoring"
            );
            return;
        }

        let entries: Vec<RtStreamEntry> = rtstreams
            .iter()
            .map(|r| RtStreamEntry::new(&r.rtstream_id, &r.name))
            .collect();

        if !self.state.is_active().await {
            let mut names: Vec<String> = Vec::new();
            for stream in &rtstreams {
                let name = rtstream_display_name(&stream.name);
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            self.state.mark_active(session_id.clone(), names, entries).await;
        } else {
            self.state.set_rtstreams(entries).await;
        }

        self.start_indexing_once(&session_id, &rtstreams).await;
    }

    // ------------------------------------------------------------------
    // Indexing
    // ------------------------------------------------------------------

    /// Start indexing for the session's streams, once. A second `active`
    /// notification for the same session must not restart indexing.
    async fn start_indexing_once(&self, session_id: &str, streams: &[RtStreamInfo]) {
        {
            let mut indexed = self.indexed_session.lock().await;
            if indexed.as_deref() == Some(session_id) {
                debug!("indexing already started for {}, streams stored for status", session_id);
                return;
            }
            *indexed = Some(session_id.to_string());
        }

        if streams.is_empty() {
            warn!("no streams reported for {}, nothing to index", session_id);
            return;
        }

        match self.backend.open_event_stream().await {
            Ok(stream) => self.attach_stream(stream).await,
            Err(e) => warn!("failed to open content event stream: {:#}", e),
        }

        let overrides = self.runtime_overrides.lock().await.clone();
        let effective = self.indexing_defaults.merged(overrides.as_ref());

        for stream in streams {
            if let Err(e) = self.index_stream(stream, &effective).await {
                warn!("indexing failed for {}: {:#}", stream.rtstream_id, e);
            }
        }
    }

    async fn index_stream(&self, stream: &RtStreamInfo, config: &IndexingConfig) -> Result<()> {
        if stream.media_types.iter().any(|t| t == "video") {
            if !config.visual.enabled {
                info!("visual indexing disabled, skipping {}", stream.name);
                return Ok(());
            }
            let options = VisualIndexOptions {
                prompt: config.visual.prompt.clone(),
                batch_time: config.visual.batch_value,
                frame_count: config.visual.frame_count,
            };
            let index = self
                .backend
                .index_visuals(&stream.rtstream_id, options)
                .await?;
            self.state
                .set_stream_index(&stream.rtstream_id, &index.index_id, "screen")
                .await;
            info!("visual index created for {} ({})", stream.name, index.index_id);
        } else if stream.media_types.iter().any(|t| t == "audio") {
            let (category, kind) = match audio_modality(&stream.name) {
                Modality::SystemAudio => (&config.system_audio, "system_audio"),
                _ => (&config.mic, "mic"),
            };
            if !category.enabled {
                info!("{} indexing disabled, skipping {}", kind, stream.name);
                return Ok(());
            }
            let options = AudioIndexOptions {
                prompt: category.prompt.clone(),
                batch_type: category.batch_type.clone(),
                batch_value: category.batch_value,
            };
            let index = self
                .backend
                .index_audio(&stream.rtstream_id, options)
                .await?;
            self.state
                .set_stream_index(&stream.rtstream_id, &index.index_id, kind)
                .await;
            info!("{} index created for {} ({})", kind, stream.name, index.index_id);
        } else {
            debug!(
                "unknown media types for {}: {:?}",
                stream.name, stream.media_types
            );
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Content-event ingestion
    // ------------------------------------------------------------------

    /// Consume a content-event stream in the background until it ends or
    /// the coordinator closes it. Replaces any previously attached stream.
    pub async fn attach_stream(&self, mut stream: Box<dyn ContentEventStream>) {
        self.close_stream().await;

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let state = Arc::clone(&self.state);
        let buffer = Arc::clone(&self.buffer);
        let task = tokio::spawn(async move {
            let mut stopped = false;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        stopped = true;
                        break;
                    }
                    event = stream.next_event() => match event {
                        Some(event) => ingest(&state, &buffer, event).await,
                        None => break,
                    }
                }
            }
            if stopped {
                stream.close().await;
            }
            debug!("content event stream ended");
        });

        *self.stream_stop.lock().await = Some(stop_tx);
        *self.stream_task.lock().await = Some(task);
    }

    pub async fn close_stream(&self) {
        if let Some(stop) = self.stream_stop.lock().await.take() {
            let _ = stop.send(());
        }
        if let Some(mut task) = self.stream_task.lock().await.take() {
            if tokio::time::timeout(STREAM_CLOSE_TIMEOUT, &mut task)
                .await
                .is_err()
            {
                warn!("content event stream did not close in time, aborting");
                task.abort();
            }
        }
    }

    // ------------------------------------------------------------------
    // Backend passthroughs for the API layer
    // ------------------------------------------------------------------

    pub async fn search(&self, rtstream_id: &str, query: &str) -> Result<Value> {
        self.backend.search(rtstream_id, query).await
    }

    /// Update an index prompt and return the index kind of the matching
    /// local stream entry, when known.
    pub async fn update_prompt(
        &self,
        rtstream_id: &str,
        index_id: &str,
        prompt: &str,
    ) -> Result<Option<String>> {
        self.backend
            .update_index_prompt(rtstream_id, index_id, prompt)
            .await?;

        let snapshot = self.state.snapshot().await;
        Ok(snapshot
            .rtstreams
            .iter()
            .find(|e| e.rtstream_id == rtstream_id && e.index_id.as_deref() == Some(index_id))
            .and_then(|e| e.index_kind.clone()))
    }
}

/// Classify one content event and store it. Failures here are per-event;
/// the stream keeps going.
async fn ingest(state: &RecordingState, buffer: &ContextBuffer, event: ContentEvent) {
    let stream_name = event.rtstream_name.as_deref().unwrap_or("");
    let text = event.data.text.clone().unwrap_or_default();

    match event.channel.as_str() {
        "transcript" => {
            let entry =
                ContextEntry::new(text).with_final(normalize_finality(event.data.is_final.as_ref()));
            buffer.add(audio_modality(stream_name), entry);
        }
        "visual_index" => {
            let mut entry = ContextEntry::new(text);
            if let Some(start) = event.data.start {
                entry = entry.with_start(start);
                let latency =
                    (Utc::now().timestamp_millis() - start_to_millis(start)).max(0) as u64;
                state.set_visual_latency(latency).await;
            }
            buffer.add(Modality::Screen, entry);
        }
        "audio_index" => {
            let mut entry = ContextEntry::new(text);
            if let Some(start) = event.data.start {
                entry = entry.with_start(start);
            }
            buffer.add(audio_modality(stream_name), entry);
        }
        other => debug!("unknown content event channel: {}", other),
    }
}
