// Coordinator behavior against a scripted backend: identity-checked
// activation, exactly-once indexing, content ingestion, and failure
// surfacing.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{CountingNotifier, MockBackend, ScriptedStream};
use pair_recorder::backend::{ContentData, ContentEvent, RtStreamInfo};
use pair_recorder::buffer::{ContextBuffer, Modality};
use pair_recorder::config::{
    BufferConfig, IndexCategory, IndexCategoryPatch, IndexingConfig, IndexingOverrides,
};
use pair_recorder::session::{LifecycleNotification, SessionCoordinator};
use pair_recorder::state::{Phase, RecordingState};

struct Fixture {
    state: Arc<RecordingState>,
    buffer: Arc<ContextBuffer>,
    backend: Arc<MockBackend>,
    notifier: Arc<CountingNotifier>,
    coordinator: Arc<SessionCoordinator>,
}

fn fixture_with_indexing(indexing: IndexingConfig) -> Fixture {
    let state = Arc::new(RecordingState::new());
    let buffer = Arc::new(ContextBuffer::new(&BufferConfig {
        screen: 10,
        mic: 10,
        system_audio: 10,
    }));
    let backend = Arc::new(MockBackend::new("sess-1"));
    let notifier = Arc::new(CountingNotifier::default());
    let coordinator = SessionCoordinator::new(
        Arc::clone(&state),
        Arc::clone(&buffer),
        Arc::clone(&backend) as Arc<dyn pair_recorder::backend::CaptureBackend>,
        Arc::clone(&notifier) as Arc<dyn pair_recorder::ui::Notifier>,
        indexing,
        uuid::Uuid::new_v4(),
    );
    Fixture {
        state,
        buffer,
        backend,
        notifier,
        coordinator,
    }
}

fn fixture() -> Fixture {
    fixture_with_indexing(IndexingConfig {
        visual: IndexCategory {
            enabled: true,
            ..Default::default()
        },
        mic: IndexCategory {
            enabled: true,
            ..Default::default()
        },
        system_audio: IndexCategory {
            enabled: true,
            ..Default::default()
        },
    })
}

fn two_streams() -> Vec<RtStreamInfo> {
    vec![
        RtStreamInfo {
            rtstream_id: "rts-video".to_string(),
            name: "main-display".to_string(),
            media_types: vec!["video".to_string()],
        },
        RtStreamInfo {
            rtstream_id: "rts-mic".to_string(),
            name: "builtin-mic".to_string(),
            media_types: vec!["audio".to_string()],
        },
    ]
}

fn active_notification(session: &str) -> LifecycleNotification {
    LifecycleNotification::from_value(&json!({
        "event": "capture_session.active",
        "capture_session_id": session,
        "data": { "rtstreams": [
            { "rtstream_id": "rts-video", "name": "main-display", "media_types": ["video"] },
            { "rtstream_id": "rts-mic", "name": "builtin-mic", "media_types": ["audio"] },
        ]}
    }))
    .unwrap()
}

fn plain_notification(event: &str, session: &str) -> LifecycleNotification {
    LifecycleNotification::from_value(&json!({ "event": event, "session_id": session })).unwrap()
}

#[tokio::test]
async fn start_to_active_scenario() {
    let f = fixture();

    let session = f.coordinator.start_recording(None, None).await.unwrap();
    assert_eq!(session, "sess-1");
    // Defaults: mic, system audio, first video channel.
    assert_eq!(f.backend.start_calls.lock().unwrap()[0].len(), 3);

    f.coordinator
        .handle_lifecycle(plain_notification("capture_session.starting", "sess-1"))
        .await;
    assert_eq!(f.state.phase().await, Phase::Starting);

    f.coordinator
        .handle_lifecycle(active_notification("sess-1"))
        .await;

    let snapshot = f.state.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Active);
    assert_eq!(
        snapshot.channels,
        vec!["Screen".to_string(), "Microphone".to_string()]
    );
    assert_eq!(snapshot.rtstreams.len(), 2);

    // Indexing ran once per stream and recorded the returned ids.
    assert_eq!(f.backend.visual_indexed.lock().unwrap().len(), 1);
    assert_eq!(f.backend.audio_indexed.lock().unwrap().len(), 1);
    let video = snapshot
        .rtstreams
        .iter()
        .find(|e| e.rtstream_id == "rts-video")
        .unwrap();
    assert_eq!(video.index_id.as_deref(), Some("vidx-rts-video"));
    assert_eq!(video.index_kind.as_deref(), Some("screen"));

    // Stop: phase stopped, session cleared, duration derived.
    f.coordinator
        .handle_lifecycle(plain_notification("capture_session.stopped", "sess-1"))
        .await;
    let snapshot = f.state.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Stopped);
    assert!(snapshot.session_id.is_none());
    assert!(snapshot.duration_secs.is_some());
}

#[tokio::test]
async fn second_active_notification_does_not_restart_indexing() {
    let f = fixture();
    f.coordinator.start_recording(None, None).await.unwrap();

    f.coordinator
        .handle_lifecycle(active_notification("sess-1"))
        .await;
    let calls_after_first = f.backend.indexing_calls();
    assert_eq!(calls_after_first, 2);

    f.coordinator
        .handle_lifecycle(active_notification("sess-1"))
        .await;
    assert_eq!(f.backend.indexing_calls(), calls_after_first);

    // started_at survives the duplicate notification.
    let snapshot = f.state.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Active);
}

#[tokio::test]
async fn foreign_session_notifications_are_ignored_entirely() {
    let f = fixture();
    f.coordinator.start_recording(None, None).await.unwrap();

    f.coordinator
        .handle_lifecycle(active_notification("someone-elses-session"))
        .await;

    assert_eq!(f.state.phase().await, Phase::Idle);
    assert_eq!(f.backend.indexing_calls(), 0);
}

#[tokio::test]
async fn disabled_categories_are_skipped() {
    let f = fixture_with_indexing(IndexingConfig {
        visual: IndexCategory {
            enabled: false,
            ..Default::default()
        },
        mic: IndexCategory {
            enabled: true,
            ..Default::default()
        },
        ..Default::default()
    });
    f.coordinator.start_recording(None, None).await.unwrap();

    f.coordinator
        .handle_lifecycle(active_notification("sess-1"))
        .await;

    assert!(f.backend.visual_indexed.lock().unwrap().is_empty());
    assert_eq!(f.backend.audio_indexed.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn runtime_overrides_enable_disabled_categories() {
    let f = fixture_with_indexing(IndexingConfig::default());

    let overrides = IndexingOverrides {
        visual: Some(IndexCategoryPatch {
            enabled: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };
    f.coordinator
        .start_recording(None, Some(overrides))
        .await
        .unwrap();

    f.coordinator
        .handle_lifecycle(active_notification("sess-1"))
        .await;

    assert_eq!(f.backend.visual_indexed.lock().unwrap().len(), 1);
    // Audio stayed disabled by default.
    assert!(f.backend.audio_indexed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failure_notification_clears_session_and_notifies_user() {
    let f = fixture();
    f.coordinator.start_recording(None, None).await.unwrap();
    f.coordinator
        .handle_lifecycle(active_notification("sess-1"))
        .await;

    f.coordinator
        .handle_lifecycle(
            LifecycleNotification::from_value(&json!({
                "event": "capture_session.failed",
                "session_id": "sess-1",
                "data": { "error": { "code": "X", "message": "boom" } }
            }))
            .unwrap(),
        )
        .await;

    let snapshot = f.state.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Failed);
    assert!(snapshot.session_id.is_none());
    let failure = snapshot.failure.unwrap();
    assert_eq!(failure.code, "X");
    assert_eq!(failure.message, "boom");

    let notes = f.notifier.notes();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].1.contains("boom"));
}

#[tokio::test]
async fn start_and_stop_reject_wrong_phase() {
    let f = fixture();

    assert!(f.coordinator.stop_recording().await.is_err());

    f.coordinator.start_recording(None, None).await.unwrap();
    f.coordinator
        .handle_lifecycle(active_notification("sess-1"))
        .await;

    let err = f
        .coordinator
        .start_recording(None, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Already recording"));

    let duration = f.coordinator.stop_recording().await.unwrap();
    assert!(duration.is_some());
    assert_eq!(f.backend.stop_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn content_events_are_classified_and_buffered() {
    let f = fixture();
    let (tx, closed, stream) = ScriptedStream::new();
    f.coordinator.attach_stream(stream).await;

    tx.send(ContentEvent {
        channel: "transcript".to_string(),
        rtstream_name: Some("builtin-mic".to_string()),
        data: ContentData {
            text: Some("hello".to_string()),
            is_final: Some(json!("true")),
            start: None,
        },
    })
    .await
    .unwrap();
    tx.send(ContentEvent {
        channel: "transcript".to_string(),
        rtstream_name: Some("system-audio-out".to_string()),
        data: ContentData {
            text: Some("background".to_string()),
            is_final: Some(json!(false)),
            start: None,
        },
    })
    .await
    .unwrap();
    // Seconds-resolution timestamp: auto-detected and converted.
    tx.send(ContentEvent {
        channel: "visual_index".to_string(),
        rtstream_name: Some("main-display".to_string()),
        data: ContentData {
            text: Some("editor on screen".to_string()),
            is_final: None,
            start: Some(1_700_000_000.0),
        },
    })
    .await
    .unwrap();
    tx.send(ContentEvent {
        channel: "audio_index".to_string(),
        rtstream_name: Some("system-audio-out".to_string()),
        data: ContentData {
            text: Some("music playing".to_string()),
            is_final: None,
            start: Some(12.5),
        },
    })
    .await
    .unwrap();

    // Ingestion runs in the background; poll for completion.
    for _ in 0..200 {
        let counts = f.buffer.counts();
        if counts.mic + counts.system_audio + counts.screen >= 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mic = f.buffer.recent(Modality::Mic, 10);
    assert_eq!(mic.len(), 1);
    assert_eq!(mic[0].text, "hello");
    assert_eq!(mic[0].is_final, Some(true));

    let system = f.buffer.recent(Modality::SystemAudio, 10);
    assert_eq!(system.len(), 2);
    assert_eq!(system[0].is_final, Some(false));
    assert_eq!(system[1].start_offset, Some(12.5));

    let screen = f.buffer.recent(Modality::Screen, 10);
    assert_eq!(screen.len(), 1);
    assert!(f.state.snapshot().await.visual_latency_ms.is_some());

    f.coordinator.close_stream().await;
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn stopped_notification_closes_the_stream() {
    let f = fixture();
    let (_tx, closed, stream) = ScriptedStream::new();
    f.coordinator.attach_stream(stream).await;

    f.coordinator.start_recording(None, None).await.unwrap();
    f.coordinator
        .handle_lifecycle(plain_notification("capture_session.stopped", "sess-1"))
        .await;

    assert!(closed.load(Ordering::SeqCst));
}
