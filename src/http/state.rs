use std::sync::Arc;

use crate::assistant::AssistantRunner;
use crate::buffer::ContextBuffer;
use crate::session::SessionCoordinator;
use crate::shutdown::ShutdownOrchestrator;
use crate::state::RecordingState;
use crate::ui::OverlaySink;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub recording: Arc<RecordingState>,
    pub buffer: Arc<ContextBuffer>,
    pub coordinator: Arc<SessionCoordinator>,
    pub overlay: Arc<dyn OverlaySink>,
    pub assistant: Arc<AssistantRunner>,
    pub shutdown: Arc<ShutdownOrchestrator>,
}
