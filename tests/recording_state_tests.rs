// The state machine reconciles transitions from two independent sources
// (local start/stop calls and lifecycle notifications); these tests pin
// down the invariants: one phase at a time, session id present exactly in
// the in-flight phases, and no-op transitions on precondition misses.

use pair_recorder::state::{Phase, RecordingState, RtStreamEntry};

fn streams(ids: &[&str]) -> Vec<RtStreamEntry> {
    ids.iter()
        .map(|id| RtStreamEntry::new(*id, format!("{}-name", id)))
        .collect()
}

async fn session_invariant_holds(state: &RecordingState) {
    let snapshot = state.snapshot().await;
    let in_flight = matches!(
        snapshot.phase,
        Phase::Starting | Phase::Active | Phase::Stopping
    );
    assert_eq!(
        snapshot.session_id.is_some(),
        in_flight,
        "session id must be present exactly in the in-flight phases, got {:?}",
        snapshot
    );
}

#[tokio::test]
async fn full_lifecycle_scenario() {
    let state = RecordingState::new();
    assert_eq!(state.phase().await, Phase::Idle);
    session_invariant_holds(&state).await;

    state.mark_starting().await;
    assert_eq!(state.phase().await, Phase::Starting);

    state
        .mark_active(
            "sess-1",
            vec!["Microphone".to_string(), "Screen".to_string()],
            streams(&["rts-1", "rts-2"]),
        )
        .await;
    session_invariant_holds(&state).await;

    let snapshot = state.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Active);
    assert!(snapshot.active);
    assert_eq!(snapshot.session_id.as_deref(), Some("sess-1"));
    assert_eq!(snapshot.channels.len(), 2);
    assert_eq!(snapshot.rtstreams.len(), 2);
    assert!(snapshot.started_at.is_some());

    state.mark_stopping().await;
    assert_eq!(state.phase().await, Phase::Stopping);
    session_invariant_holds(&state).await;

    state.mark_stopped().await;
    let snapshot = state.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Stopped);
    assert!(!snapshot.active);
    assert!(snapshot.session_id.is_none());
    assert!(snapshot.stopped_at.is_some());
    let duration = snapshot.duration_secs.unwrap();
    assert!(duration >= 0.0);
    session_invariant_holds(&state).await;
}

#[tokio::test]
async fn mark_active_twice_is_idempotent_for_start_and_channels() {
    let state = RecordingState::new();
    state
        .mark_active("sess-1", vec!["Microphone".to_string()], streams(&["rts-1"]))
        .await;

    let first = state.snapshot().await;

    state
        .mark_active(
            "sess-1",
            vec!["Microphone".to_string(), "Microphone".to_string()],
            streams(&["rts-1", "rts-2"]),
        )
        .await;

    let second = state.snapshot().await;
    assert_eq!(second.started_at, first.started_at);
    assert_eq!(second.channels, vec!["Microphone".to_string()]);
    // Stream data is merged.
    assert_eq!(second.rtstreams.len(), 2);
}

#[tokio::test]
async fn transitions_noop_when_precondition_does_not_hold() {
    let state = RecordingState::new();

    // Stopping from idle does nothing.
    state.mark_stopping().await;
    assert_eq!(state.phase().await, Phase::Idle);

    // Stopped from idle does nothing.
    state.mark_stopped().await;
    assert_eq!(state.phase().await, Phase::Idle);

    // Starting only applies from idle.
    state.mark_starting().await;
    state.mark_active("sess-1", vec![], vec![]).await;
    state.mark_starting().await;
    assert_eq!(state.phase().await, Phase::Active);
}

#[tokio::test]
async fn mark_failed_from_any_phase_clears_session() {
    let state = RecordingState::new();
    state.mark_starting().await;
    state.mark_active("sess-1", vec![], vec![]).await;

    state.mark_failed("X", "boom").await;

    let snapshot = state.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Failed);
    assert!(snapshot.session_id.is_none());
    let failure = snapshot.failure.unwrap();
    assert_eq!(failure.code, "X");
    assert_eq!(failure.message, "boom");
    session_invariant_holds(&state).await;
}

#[tokio::test]
async fn mark_exported_attaches_artifact_without_phase_change() {
    let state = RecordingState::new();
    state.mark_active("sess-1", vec![], vec![]).await;
    state.mark_stopped().await;

    state
        .mark_exported(
            Some("vid-1".to_string()),
            Some("https://player/vid-1".to_string()),
        )
        .await;

    let snapshot = state.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Stopped);
    let exported = snapshot.exported.unwrap();
    assert_eq!(exported.video_id.as_deref(), Some("vid-1"));
    assert_eq!(exported.player_url.as_deref(), Some("https://player/vid-1"));
}

#[tokio::test]
async fn duration_is_elapsed_while_active_and_none_when_idle() {
    let state = RecordingState::new();
    assert!(state.duration_secs().await.is_none());

    state.mark_active("sess-1", vec![], vec![]).await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let running = state.duration_secs().await.unwrap();
    assert!(running > 0.0);
}

#[tokio::test]
async fn set_rtstreams_preserves_index_enrichment() {
    let state = RecordingState::new();
    state
        .mark_active("sess-1", vec![], streams(&["rts-1", "rts-2"]))
        .await;
    state.set_stream_index("rts-1", "idx-1", "screen").await;

    // A later notification repeats the streams without index data.
    state.set_rtstreams(streams(&["rts-1", "rts-2"])).await;

    let snapshot = state.snapshot().await;
    let enriched = snapshot
        .rtstreams
        .iter()
        .find(|e| e.rtstream_id == "rts-1")
        .unwrap();
    assert_eq!(enriched.index_id.as_deref(), Some("idx-1"));
    assert_eq!(enriched.index_kind.as_deref(), Some("screen"));
}

#[tokio::test]
async fn visual_latency_is_recorded_without_phase_effect() {
    let state = RecordingState::new();
    state.set_visual_latency(1234).await;

    let snapshot = state.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.visual_latency_ms, Some(1234));
}

#[test]
fn phases_serialize_as_snake_case() {
    assert_eq!(serde_json::to_string(&Phase::Idle).unwrap(), "\"idle\"");
    assert_eq!(
        serde_json::to_string(&Phase::Stopping).unwrap(),
        "\"stopping\""
    );
    assert_eq!(
        serde_json::to_string(&Phase::Exported).unwrap(),
        "\"exported\""
    );
}
