use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BufferConfig;

/// One of the three recorded content channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Screen,
    Mic,
    SystemAudio,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Screen, Modality::Mic, Modality::SystemAudio];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Screen => "screen",
            Modality::Mic => "mic",
            Modality::SystemAudio => "system_audio",
        }
    }

    pub fn parse(s: &str) -> Option<Modality> {
        match s {
            "screen" => Some(Modality::Screen),
            "mic" => Some(Modality::Mic),
            "system_audio" => Some(Modality::SystemAudio),
            _ => None,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single transcript/index fragment. Empty text is stored as-is; partial
/// and non-final fragments are intentional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_offset: Option<f64>,
    pub received_at: DateTime<Utc>,
}

impl ContextEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: None,
            start_offset: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_final(mut self, is_final: bool) -> Self {
        self.is_final = Some(is_final);
        self
    }

    pub fn with_start(mut self, start: f64) -> Self {
        self.start_offset = Some(start);
        self
    }
}

/// Entry counts per modality, for liveness checks without exposing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextCounts {
    pub screen: usize,
    pub mic: usize,
    pub system_audio: usize,
}

/// Full buffer dump keyed by modality name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextDump {
    pub screen: Vec<ContextEntry>,
    pub mic: Vec<ContextEntry>,
    pub system_audio: Vec<ContextEntry>,
}

struct Lane {
    capacity: usize,
    entries: Mutex<VecDeque<ContextEntry>>,
}

impl Lane {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn push(&self, entry: ContextEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    fn recent(&self, n: usize) -> Vec<ContextEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    fn all(&self) -> Vec<ContextEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Bounded per-modality ring buffers of recent content events. Each
/// modality has an independent capacity and lock; insertion beyond
/// capacity evicts the oldest entry.
pub struct ContextBuffer {
    screen: Lane,
    mic: Lane,
    system_audio: Lane,
}

impl ContextBuffer {
    pub fn new(config: &BufferConfig) -> Self {
        Self {
            screen: Lane::new(config.screen),
            mic: Lane::new(config.mic),
            system_audio: Lane::new(config.system_audio),
        }
    }

    fn lane(&self, modality: Modality) -> &Lane {
        match modality {
            Modality::Screen => &self.screen,
            Modality::Mic => &self.mic,
            Modality::SystemAudio => &self.system_audio,
        }
    }

    pub fn add(&self, modality: Modality, entry: ContextEntry) {
        self.lane(modality).push(entry);
    }

    /// Last `n` entries in arrival order, oldest of the window first;
    /// fewer when the buffer holds fewer.
    pub fn recent(&self, modality: Modality, n: usize) -> Vec<ContextEntry> {
        self.lane(modality).recent(n)
    }

    pub fn all(&self) -> ContextDump {
        ContextDump {
            screen: self.screen.all(),
            mic: self.mic.all(),
            system_audio: self.system_audio.all(),
        }
    }

    pub fn counts(&self) -> ContextCounts {
        ContextCounts {
            screen: self.screen.len(),
            mic: self.mic.len(),
            system_audio: self.system_audio.len(),
        }
    }

    /// Empty all modalities; capacities are unchanged. Called at server
    /// start to discard stale data from a previous run and at shutdown.
    pub fn cleanup(&self) {
        for modality in Modality::ALL {
            self.lane(modality).clear();
        }
    }
}
