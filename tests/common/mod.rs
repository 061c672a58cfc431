// Shared test doubles for the coordination engine: an in-memory capture
// backend, a recording overlay sink, and scripted content-event streams.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use pair_recorder::backend::{
    AudioIndexOptions, CaptureBackend, ChannelInfo, ChannelSelection, ContentEvent,
    ContentEventStream, CreatedSession, SessionRequest, StreamIndex, VisualIndexOptions,
};
use pair_recorder::hooks::{HookUiEvent, SessionGate};
use pair_recorder::ui::{Notifier, OverlaySink, PermissionDecision, TrayHandle};

/// Overlay sink that records every pushed hook event.
#[derive(Default)]
pub struct RecordingOverlay {
    pub events: Mutex<Vec<HookUiEvent>>,
    pub destroy_calls: AtomicUsize,
}

impl RecordingOverlay {
    pub fn events(&self) -> Vec<HookUiEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Poll until `n` events arrived or the deadline passes.
    pub async fn wait_for_events(&self, n: usize) -> Vec<HookUiEvent> {
        for _ in 0..200 {
            let events = self.events();
            if events.len() >= n {
                return events;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        self.events()
    }
}

#[async_trait]
impl OverlaySink for RecordingOverlay {
    async fn show(&self, _text: &str, _loading: bool) {}

    async fn hide(&self) {}

    async fn push_hook_event(&self, event: HookUiEvent) {
        self.events.lock().unwrap().push(event);
    }

    async fn show_permission_prompt(
        &self,
        _tool_name: &str,
        _tool_input: &Value,
    ) -> PermissionDecision {
        PermissionDecision::Allow
    }

    async fn destroy(&self) {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Gate with a settable session identity.
#[derive(Default)]
pub struct StaticGate {
    pub session: Mutex<Option<String>>,
}

impl StaticGate {
    pub fn with_session(session: &str) -> Self {
        Self {
            session: Mutex::new(Some(session.to_string())),
        }
    }
}

impl SessionGate for StaticGate {
    fn current_session(&self) -> Option<String> {
        self.session.lock().unwrap().clone()
    }
}

/// Notifier that records every notification.
#[derive(Default)]
pub struct CountingNotifier {
    pub notes: Mutex<Vec<(String, String)>>,
}

impl CountingNotifier {
    pub fn notes(&self) -> Vec<(String, String)> {
        self.notes.lock().unwrap().clone()
    }
}

impl Notifier for CountingNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.notes
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
    }
}

#[derive(Default)]
pub struct CountingTray {
    pub destroy_calls: AtomicUsize,
}

impl TrayHandle for CountingTray {
    fn destroy(&self) {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Content-event stream fed from an mpsc channel.
pub struct ScriptedStream {
    rx: mpsc::Receiver<ContentEvent>,
    pub closed: Arc<AtomicBool>,
}

impl ScriptedStream {
    pub fn new() -> (mpsc::Sender<ContentEvent>, Arc<AtomicBool>, Box<dyn ContentEventStream>) {
        let (tx, rx) = mpsc::channel(32);
        let closed = Arc::new(AtomicBool::new(false));
        let stream: Box<dyn ContentEventStream> = Box::new(ScriptedStream {
            rx,
            closed: Arc::clone(&closed),
        });
        (tx, closed, stream)
    }
}

#[async_trait]
impl ContentEventStream for ScriptedStream {
    async fn next_event(&mut self) -> Option<ContentEvent> {
        self.rx.recv().await
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.rx.close();
    }
}

/// In-memory capture backend recording every call.
pub struct MockBackend {
    pub session_id: String,
    pub channels: Vec<ChannelInfo>,
    pub fail_stop: bool,
    pub create_calls: AtomicUsize,
    pub start_calls: Mutex<Vec<Vec<ChannelSelection>>>,
    pub stop_calls: AtomicUsize,
    pub shutdown_calls: AtomicUsize,
    pub visual_indexed: Mutex<Vec<String>>,
    pub audio_indexed: Mutex<Vec<String>>,
    pub stream_opens: AtomicUsize,
}

impl MockBackend {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            channels: vec![
                ChannelInfo {
                    channel_id: "mic:default".to_string(),
                    media_type: "audio".to_string(),
                },
                ChannelInfo {
                    channel_id: "system_audio:default".to_string(),
                    media_type: "audio".to_string(),
                },
                ChannelInfo {
                    channel_id: "display:1".to_string(),
                    media_type: "video".to_string(),
                },
            ],
            fail_stop: false,
            create_calls: AtomicUsize::new(0),
            start_calls: Mutex::new(Vec::new()),
            stop_calls: AtomicUsize::new(0),
            shutdown_calls: AtomicUsize::new(0),
            visual_indexed: Mutex::new(Vec::new()),
            audio_indexed: Mutex::new(Vec::new()),
            stream_opens: AtomicUsize::new(0),
        }
    }

    pub fn indexing_calls(&self) -> usize {
        self.visual_indexed.lock().unwrap().len() + self.audio_indexed.lock().unwrap().len()
    }
}

#[async_trait]
impl CaptureBackend for MockBackend {
    async fn create_session(&self, _request: SessionRequest) -> Result<CreatedSession> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok(CreatedSession {
            id: self.session_id.clone(),
        })
    }

    async fn list_channels(&self) -> Result<Vec<ChannelInfo>> {
        Ok(self.channels.clone())
    }

    async fn start_session(
        &self,
        _session_id: &str,
        channels: Vec<ChannelSelection>,
    ) -> Result<()> {
        self.start_calls.lock().unwrap().push(channels);
        Ok(())
    }

    async fn stop_session(&self) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            bail!("backend unreachable");
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn index_visuals(
        &self,
        rtstream_id: &str,
        _options: VisualIndexOptions,
    ) -> Result<StreamIndex> {
        self.visual_indexed
            .lock()
            .unwrap()
            .push(rtstream_id.to_string());
        Ok(StreamIndex {
            index_id: format!("vidx-{}", rtstream_id),
        })
    }

    async fn index_audio(
        &self,
        rtstream_id: &str,
        _options: AudioIndexOptions,
    ) -> Result<StreamIndex> {
        self.audio_indexed
            .lock()
            .unwrap()
            .push(rtstream_id.to_string());
        Ok(StreamIndex {
            index_id: format!("aidx-{}", rtstream_id),
        })
    }

    async fn search(&self, _rtstream_id: &str, _query: &str) -> Result<Value> {
        Ok(serde_json::json!({ "shots": [] }))
    }

    async fn update_index_prompt(
        &self,
        _rtstream_id: &str,
        _index_id: &str,
        _prompt: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn open_event_stream(&self) -> Result<Box<dyn ContentEventStream>> {
        self.stream_opens.fetch_add(1, Ordering::SeqCst);
        bail!("no scripted stream attached")
    }
}
