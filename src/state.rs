use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

/// Recording lifecycle phase. Exactly one phase is current at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Starting,
    Active,
    Stopping,
    Stopped,
    Exported,
    Failed,
}

/// One media stream within the capture session, enriched with its index
/// identifier once indexing has started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RtStreamEntry {
    pub rtstream_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_kind: Option<String>,
}

impl RtStreamEntry {
    pub fn new(rtstream_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            rtstream_id: rtstream_id.into(),
            name: name.into(),
            index_id: None,
            index_kind: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedVideo {
    pub video_id: Option<String>,
    pub player_url: Option<String>,
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    session_id: Option<String>,
    channels: Vec<String>,
    rtstreams: Vec<RtStreamEntry>,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    visual_latency_ms: Option<u64>,
    failure: Option<Failure>,
    exported: Option<ExportedVideo>,
}

/// Immutable view of the recording state for external consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSnapshot {
    pub phase: Phase,
    pub active: bool,
    pub session_id: Option<String>,
    pub channels: Vec<String>,
    pub rtstreams: Vec<RtStreamEntry>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
    pub visual_latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exported: Option<ExportedVideo>,
}

/// The authoritative state machine for the current capture session.
///
/// Two logically concurrent sources (local start/stop calls and inbound
/// lifecycle notifications) each attempt transitions independently; every
/// transition is a total function over the current phase and silently
/// no-ops when its precondition phase does not hold, so races degrade to
/// "last valid transition wins".
pub struct RecordingState {
    inner: RwLock<Inner>,
}

impl RecordingState {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                phase: Phase::Idle,
                session_id: None,
                channels: Vec::new(),
                rtstreams: Vec::new(),
                started_at: None,
                stopped_at: None,
                visual_latency_ms: None,
                failure: None,
                exported: None,
            }),
        }
    }

    /// Idle -> Starting.
    pub async fn mark_starting(&self) {
        let mut inner = self.inner.write().await;
        if inner.phase != Phase::Idle {
            debug!(phase = ?inner.phase, "mark_starting ignored");
            return;
        }
        inner.phase = Phase::Starting;
    }

    /// {Idle, Starting} -> Active. Already-active calls merge stream data
    /// only; phase, start time and channel list are left untouched.
    pub async fn mark_active(
        &self,
        session_id: impl Into<String>,
        channels: Vec<String>,
        rtstreams: Vec<RtStreamEntry>,
    ) {
        let mut inner = self.inner.write().await;
        match inner.phase {
            Phase::Idle | Phase::Starting => {
                inner.phase = Phase::Active;
                inner.session_id = Some(session_id.into());
                inner.channels = channels;
                inner.rtstreams = rtstreams;
                inner.started_at = Some(Utc::now());
                inner.stopped_at = None;
                inner.failure = None;
            }
            Phase::Active => merge_rtstreams(&mut inner.rtstreams, rtstreams),
            _ => debug!(phase = ?inner.phase, "mark_active ignored"),
        }
    }

    /// Replace stream data during an active session, keeping any index
    /// enrichment already recorded for streams the update does not carry.
    pub async fn set_rtstreams(&self, rtstreams: Vec<RtStreamEntry>) {
        let mut inner = self.inner.write().await;
        merge_rtstreams(&mut inner.rtstreams, rtstreams);
    }

    /// Record the index created for one stream.
    pub async fn set_stream_index(
        &self,
        rtstream_id: &str,
        index_id: impl Into<String>,
        index_kind: impl Into<String>,
    ) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner
            .rtstreams
            .iter_mut()
            .find(|e| e.rtstream_id == rtstream_id)
        {
            entry.index_id = Some(index_id.into());
            entry.index_kind = Some(index_kind.into());
        }
    }

    /// Latest observed screen-index pipeline delay.
    pub async fn set_visual_latency(&self, ms: u64) {
        self.inner.write().await.visual_latency_ms = Some(ms);
    }

    /// Active -> Stopping.
    pub async fn mark_stopping(&self) {
        let mut inner = self.inner.write().await;
        if inner.phase != Phase::Active {
            debug!(phase = ?inner.phase, "mark_stopping ignored");
            return;
        }
        inner.phase = Phase::Stopping;
    }

    /// {Active, Stopping} -> Stopped; session identity is released.
    pub async fn mark_stopped(&self) {
        let mut inner = self.inner.write().await;
        match inner.phase {
            Phase::Active | Phase::Stopping => {
                inner.phase = Phase::Stopped;
                inner.stopped_at = Some(Utc::now());
                inner.session_id = None;
            }
            _ => debug!(phase = ?inner.phase, "mark_stopped ignored"),
        }
    }

    /// Attach exported artifact info. The phase is left unchanged; the
    /// export notification may arrive after the session already stopped.
    pub async fn mark_exported(&self, video_id: Option<String>, player_url: Option<String>) {
        self.inner.write().await.exported = Some(ExportedVideo {
            video_id,
            player_url,
        });
    }

    /// Any phase -> Failed; session identity is released.
    pub async fn mark_failed(&self, code: impl Into<String>, message: impl Into<String>) {
        let mut inner = self.inner.write().await;
        inner.phase = Phase::Failed;
        inner.session_id = None;
        inner.failure = Some(Failure {
            code: code.into(),
            message: message.into(),
        });
    }

    /// Whether a recording is in flight: phase in {Starting, Active, Stopping}.
    pub async fn is_active(&self) -> bool {
        matches!(
            self.inner.read().await.phase,
            Phase::Starting | Phase::Active | Phase::Stopping
        )
    }

    pub async fn phase(&self) -> Phase {
        self.inner.read().await.phase
    }

    pub async fn current_session(&self) -> Option<String> {
        self.inner.read().await.session_id.clone()
    }

    /// Recording duration: stopped − started when both are set, elapsed so
    /// far while active, None otherwise.
    pub async fn duration_secs(&self) -> Option<f64> {
        self.inner.read().await.duration_secs()
    }

    /// Owned, consistent snapshot; no internal references leak.
    pub async fn snapshot(&self) -> RecordingSnapshot {
        let inner = self.inner.read().await;
        RecordingSnapshot {
            phase: inner.phase,
            active: matches!(
                inner.phase,
                Phase::Starting | Phase::Active | Phase::Stopping
            ),
            session_id: inner.session_id.clone(),
            channels: inner.channels.clone(),
            rtstreams: inner.rtstreams.clone(),
            started_at: inner.started_at,
            stopped_at: inner.stopped_at,
            duration_secs: inner.duration_secs(),
            visual_latency_ms: inner.visual_latency_ms,
            failure: inner.failure.clone(),
            exported: inner.exported.clone(),
        }
    }
}

impl Inner {
    fn duration_secs(&self) -> Option<f64> {
        let started = self.started_at?;
        let end = match self.stopped_at {
            Some(stopped) => stopped,
            None if matches!(self.phase, Phase::Active | Phase::Stopping) => Utc::now(),
            None => return None,
        };
        Some(end.signed_duration_since(started).num_milliseconds() as f64 / 1000.0)
    }
}

impl Default for RecordingState {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace the stream list with newer data, carrying over index enrichment
/// for entries the update repeats without it.
fn merge_rtstreams(current: &mut Vec<RtStreamEntry>, incoming: Vec<RtStreamEntry>) {
    let merged = incoming
        .into_iter()
        .map(|mut entry| {
            if entry.index_id.is_none() {
                if let Some(existing) = current.iter().find(|e| e.rtstream_id == entry.rtstream_id)
                {
                    entry.index_id = existing.index_id.clone();
                    entry.index_kind = existing.index_kind.clone();
                }
            }
            entry
        })
        .collect();
    *current = merged;
}
