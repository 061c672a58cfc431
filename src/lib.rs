pub mod assistant;
pub mod backend;
pub mod buffer;
pub mod config;
pub mod hooks;
pub mod http;
pub mod session;
pub mod shutdown;
pub mod state;
pub mod tunnel;
pub mod ui;

pub use assistant::AssistantRunner;
pub use backend::{
    CaptureBackend, ChannelInfo, ChannelSelection, ContentEvent, ContentEventStream,
    CreatedSession, RtStreamInfo, SessionRequest, StreamIndex,
};
pub use buffer::{ContextBuffer, ContextCounts, ContextEntry, Modality};
pub use config::{Config, IndexingConfig, IndexingOverrides};
pub use hooks::{HookLog, HookRouter, HookUiEvent, SessionGate};
pub use http::{create_router, AppState};
pub use session::{LifecycleEvent, LifecycleNotification, SessionCoordinator};
pub use shutdown::ShutdownOrchestrator;
pub use state::{Phase, RecordingSnapshot, RecordingState, RtStreamEntry};
pub use tunnel::Tunnel;
pub use ui::{Notifier, OverlaySink, PermissionDecision, ShortcutRegistry, TrayHandle};
