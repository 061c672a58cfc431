use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub buffers: BufferConfig,
    #[serde(default)]
    pub hooks: HooksConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BackendConfig {
    /// API key for the capture backend; absent means degraded mode.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Externally reachable URL for lifecycle callbacks. When unset, a
    /// tunnel is attempted, and failing that the event stream is used.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BufferConfig {
    #[serde(default = "default_buffer_size")]
    pub screen: usize,
    #[serde(default = "default_buffer_size")]
    pub mic: usize,
    #[serde(default = "default_buffer_size")]
    pub system_audio: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HooksConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
    #[serde(default = "default_hook_log_path")]
    pub log_path: String,
}

/// Per-category indexing settings. A category left unconfigured stays
/// disabled; runtime overrides supplied at recording start take precedence
/// over these file defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct IndexingConfig {
    #[serde(default)]
    pub visual: IndexCategory,
    #[serde(default)]
    pub mic: IndexCategory,
    #[serde(default)]
    pub system_audio: IndexCategory,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct IndexCategory {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub batch_type: Option<String>,
    #[serde(default)]
    pub batch_value: Option<f64>,
    /// Frames per batch, visual indexing only.
    #[serde(default)]
    pub frame_count: Option<u32>,
}

/// Runtime overrides for one indexing category. Only fields that are
/// present replace the file defaults.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct IndexCategoryPatch {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub batch_type: Option<String>,
    #[serde(default)]
    pub batch_value: Option<f64>,
    #[serde(default)]
    pub frame_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct IndexingOverrides {
    #[serde(default)]
    pub visual: Option<IndexCategoryPatch>,
    #[serde(default)]
    pub mic: Option<IndexCategoryPatch>,
    #[serde(default)]
    pub system_audio: Option<IndexCategoryPatch>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_command")]
    pub command: String,
    #[serde(default = "default_assistant_agent")]
    pub agent: String,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default = "default_allowed_tools")]
    pub allowed_tools: Vec<String>,
    #[serde(default = "default_true")]
    pub skip_permissions: bool,
}

impl Config {
    /// Load configuration from a file, layered over built-in defaults.
    /// A missing file is not an error; every field has a default.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl IndexingConfig {
    /// Effective configuration: file defaults with runtime overrides applied.
    pub fn merged(&self, overrides: Option<&IndexingOverrides>) -> IndexingConfig {
        let mut effective = self.clone();
        if let Some(ov) = overrides {
            apply_patch(&mut effective.visual, ov.visual.as_ref());
            apply_patch(&mut effective.mic, ov.mic.as_ref());
            apply_patch(&mut effective.system_audio, ov.system_audio.as_ref());
        }
        effective
    }
}

fn apply_patch(category: &mut IndexCategory, patch: Option<&IndexCategoryPatch>) {
    let Some(patch) = patch else { return };
    if let Some(enabled) = patch.enabled {
        category.enabled = enabled;
    }
    if patch.prompt.is_some() {
        category.prompt = patch.prompt.clone();
    }
    if patch.batch_type.is_some() {
        category.batch_type = patch.batch_type.clone();
    }
    if patch.batch_value.is_some() {
        category.batch_value = patch.batch_value;
    }
    if patch.frame_count.is_some() {
        category.frame_count = patch.frame_count;
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            screen: default_buffer_size(),
            mic: default_buffer_size(),
            system_audio: default_buffer_size(),
        }
    }
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            log_path: default_hook_log_path(),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            command: default_assistant_command(),
            agent: default_assistant_agent(),
            max_turns: default_max_turns(),
            allowed_tools: default_allowed_tools(),
            skip_permissions: true,
        }
    }
}

fn default_service_name() -> String {
    "pair-recorder".to_string()
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8899
}

fn default_base_url() -> String {
    "https://api.videodb.io".to_string()
}

fn default_buffer_size() -> usize {
    50
}

fn default_socket_path() -> String {
    "/tmp/pair-recorder-hook.sock".to_string()
}

fn default_hook_log_path() -> String {
    "/tmp/pair-recorder-hook.log".to_string()
}

fn default_assistant_command() -> String {
    "claude".to_string()
}

fn default_assistant_agent() -> String {
    "pair-programmer:cortex".to_string()
}

fn default_max_turns() -> u32 {
    50
}

fn default_allowed_tools() -> Vec<String> {
    vec!["Read".to_string(), "Write".to_string(), "Task".to_string()]
}

fn default_true() -> bool {
    true
}
