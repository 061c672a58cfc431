//! Lifecycle notification parsing and content-event classification.
//!
//! Notification payloads come from an untrusted webhook or the fallback
//! event stream; parsing is lenient about field names and shapes, and an
//! unknown event type maps to an explicit `Unrecognized` variant instead
//! of silent fallthrough.

use serde_json::Value;

use crate::backend::RtStreamInfo;
use crate::buffer::Modality;

/// Closed set of lifecycle notifications for a capture session.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Created,
    Starting,
    Active { rtstreams: Vec<RtStreamInfo> },
    Stopping,
    Stopped,
    Exported {
        video_id: Option<String>,
        player_url: Option<String>,
    },
    Failed { code: String, message: String },
    Unrecognized(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleNotification {
    pub session_id: Option<String>,
    pub event: LifecycleEvent,
}

impl LifecycleNotification {
    /// None when no event-type field is present at all.
    pub fn from_value(body: &Value) -> Option<Self> {
        let event_type = body
            .get("event")
            .or_else(|| body.get("type"))
            .and_then(Value::as_str)?;

        let session_id = body
            .get("capture_session_id")
            .or_else(|| body.get("session_id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let data = body.get("data").cloned().unwrap_or(Value::Null);

        let event = match event_type {
            "capture_session.created" => LifecycleEvent::Created,
            "capture_session.starting" => LifecycleEvent::Starting,
            "capture_session.active" => LifecycleEvent::Active {
                rtstreams: parse_rtstreams(&data),
            },
            "capture_session.stopping" => LifecycleEvent::Stopping,
            "capture_session.stopped" => LifecycleEvent::Stopped,
            "capture_session.exported" => LifecycleEvent::Exported {
                video_id: string_field(&data, "exported_video_id"),
                player_url: string_field(&data, "player_url"),
            },
            "capture_session.failed" => {
                let err = data.get("error").unwrap_or(&data);
                LifecycleEvent::Failed {
                    code: string_field(err, "code")
                        .unwrap_or_else(|| "RECORDING_FAILED".to_string()),
                    message: string_field(err, "message")
                        .unwrap_or_else(|| "Recording failed".to_string()),
                }
            }
            other => LifecycleEvent::Unrecognized(other.to_string()),
        };

        Some(Self { session_id, event })
    }
}

/// Streams are reported under `rtstreams`, `streams` or `channels`
/// depending on the notifying side's version.
fn parse_rtstreams(data: &Value) -> Vec<RtStreamInfo> {
    let list = ["rtstreams", "streams", "channels"]
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_array));

    let Some(list) = list else { return Vec::new() };

    list.iter()
        .filter_map(|entry| {
            let rtstream_id = string_field(entry, "rtstream_id")
                .or_else(|| string_field(entry, "id"))?;
            let name = string_field(entry, "name")
                .or_else(|| string_field(entry, "channel_id"))
                .unwrap_or_default();
            let media_types = entry
                .get("media_types")
                .and_then(Value::as_array)
                .map(|types| {
                    types
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Some(RtStreamInfo {
                rtstream_id,
                name,
                media_types,
            })
        })
        .collect()
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Display name for a channel id selected for recording.
pub fn channel_display_name(channel_id: &str) -> String {
    let lower = channel_id.to_lowercase();
    if lower.starts_with("mic") {
        return "Microphone".to_string();
    }
    if lower.starts_with("system_audio") {
        return "System Audio".to_string();
    }
    match channel_id.split_once(':') {
        Some((_, suffix)) if suffix != "default" && !suffix.is_empty() => {
            format!("Screen {}", suffix)
        }
        _ => "Screen".to_string(),
    }
}

/// Display name for a stream as reported by the backend; stream names are
/// free-form, so this is a substring heuristic.
pub fn rtstream_display_name(name: &str) -> String {
    let lower = name.to_lowercase();
    if lower.contains("system") {
        "System Audio".to_string()
    } else if lower.contains("mic") {
        "Microphone".to_string()
    } else {
        "Screen".to_string()
    }
}

/// Audio events carry no modality of their own; classify by the stream's
/// declared name.
pub fn audio_modality(rtstream_name: &str) -> Modality {
    if rtstream_name.to_lowercase().contains("system") {
        Modality::SystemAudio
    } else {
        Modality::Mic
    }
}

/// Finality arrives as a bool or the string "true".
pub fn normalize_finality(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}

/// Event timestamps are milliseconds or seconds depending on the emitter;
/// detect by magnitude.
pub fn start_to_millis(start: f64) -> i64 {
    if start > 1e12 {
        start as i64
    } else {
        (start * 1000.0) as i64
    }
}
