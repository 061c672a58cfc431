//! Contracts for the GUI presentation layer (overlay, tray, notifications,
//! global shortcuts). Rendering is out of scope; the coordination engine
//! only pushes events through these narrow interfaces. The `Log*`/`Noop*`
//! implementations are what the binary wires up when no GUI is attached.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::hooks::HookUiEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDecision {
    Allow,
    Deny,
}

/// The floating overlay.
#[async_trait]
pub trait OverlaySink: Send + Sync {
    async fn show(&self, text: &str, loading: bool);
    async fn hide(&self);
    async fn push_hook_event(&self, event: HookUiEvent);
    async fn show_permission_prompt(&self, tool_name: &str, tool_input: &Value)
        -> PermissionDecision;
    async fn destroy(&self);
}

/// The tray icon; only its teardown matters to the core.
pub trait TrayHandle: Send + Sync {
    fn destroy(&self);
}

/// One-shot user-visible notifications (startup failures, recording failed).
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Registered global input shortcuts, released during shutdown.
pub trait ShortcutRegistry: Send + Sync {
    fn unregister_all(&self);
}

pub struct LogOverlay;

#[async_trait]
impl OverlaySink for LogOverlay {
    async fn show(&self, text: &str, loading: bool) {
        info!(loading, "overlay show: {}", text);
    }

    async fn hide(&self) {
        info!("overlay hide");
    }

    async fn push_hook_event(&self, event: HookUiEvent) {
        info!("overlay event: {}", event.log_line());
    }

    async fn show_permission_prompt(
        &self,
        tool_name: &str,
        _tool_input: &Value,
    ) -> PermissionDecision {
        info!("permission prompt for {} (no overlay, denying)", tool_name);
        PermissionDecision::Deny
    }

    async fn destroy(&self) {}
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        info!("notification: {}: {}", title, body);
    }
}

pub struct NoopTray;

impl TrayHandle for NoopTray {
    fn destroy(&self) {}
}

pub struct NoopShortcuts;

impl ShortcutRegistry for NoopShortcuts {
    fn unregister_all(&self) {}
}
