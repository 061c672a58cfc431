//! Session-scoped local socket server for hook telemetry.
//!
//! One connection per hook invocation; each connection delivers exactly one
//! JSON document terminated by connection close. Messages are parsed,
//! gated against the current session identity, translated into UI events
//! and forwarded to the overlay sink. Any failure on one message is logged
//! and does not affect subsequent connections.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::log::HookLog;
use super::translate::{self, RawHookEvent};
use crate::ui::OverlaySink;

/// Source of the current session identity used for gating. Hook telemetry
/// carries the assistant session id, so the assistant runner implements
/// this.
pub trait SessionGate: Send + Sync {
    fn current_session(&self) -> Option<String>;
}

pub struct HookRouter {
    socket_path: PathBuf,
    overlay: Arc<dyn OverlaySink>,
    gate: Arc<dyn SessionGate>,
    log: Arc<HookLog>,
}

/// Running listener; closing removes the socket artifact.
pub struct HookRouterHandle {
    socket_path: PathBuf,
    accept_task: JoinHandle<()>,
}

impl HookRouter {
    pub fn new(
        socket_path: impl AsRef<Path>,
        overlay: Arc<dyn OverlaySink>,
        gate: Arc<dyn SessionGate>,
        log: HookLog,
    ) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            overlay,
            gate,
            log: Arc::new(log),
        }
    }

    /// Bind the listener and start accepting. A stale socket file left by
    /// a previous crashed run is removed before binding; the diagnostic
    /// log is reset.
    pub async fn bind(self) -> Result<HookRouterHandle> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
                .with_context(|| format!("removing stale socket {}", self.socket_path.display()))?;
        }
        self.log.reset();

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("binding hook socket {}", self.socket_path.display()))?;
        info!("hook socket listening on {}", self.socket_path.display());

        let socket_path = self.socket_path.clone();
        let overlay = self.overlay;
        let gate = self.gate;
        let log = self.log;

        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        let overlay = Arc::clone(&overlay);
                        let gate = Arc::clone(&gate);
                        let log = Arc::clone(&log);
                        tokio::spawn(async move {
                            handle_connection(stream, overlay, gate, log).await;
                        });
                    }
                    Err(e) => {
                        warn!("hook socket accept failed: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(HookRouterHandle {
            socket_path,
            accept_task,
        })
    }
}

impl HookRouterHandle {
    /// Stop accepting and remove the socket artifact.
    pub async fn close(self) {
        self.accept_task.abort();
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!("hook socket cleanup failed: {}", e);
            }
        }
        info!("hook socket closed");
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

async fn handle_connection(
    mut stream: UnixStream,
    overlay: Arc<dyn OverlaySink>,
    gate: Arc<dyn SessionGate>,
    log: Arc<HookLog>,
) {
    let mut buf = Vec::new();
    if let Err(e) = stream.read_to_end(&mut buf).await {
        debug!("hook connection read failed: {}", e);
        return;
    }
    if buf.iter().all(|b| b.is_ascii_whitespace()) {
        return;
    }

    let value: serde_json::Value = match serde_json::from_slice(&buf) {
        Ok(v) => v,
        Err(e) => {
            log.append(&format!("ERROR {}", e));
            debug!("hook message parse failed: {}", e);
            return;
        }
    };

    let Some(raw) = RawHookEvent::from_value(&value) else {
        debug!("hook message without event name, discarding");
        return;
    };

    if !passes_gate(&raw, gate.as_ref(), &log) {
        return;
    }

    let event = translate::translate(&raw);
    let detail = match &event {
        translate::HookUiEvent::Tool { tool_name, .. } => {
            translate::tool_detail(tool_name, &raw.tool_input)
        }
        _ => String::new(),
    };
    log.append(&format!("{}{}", event.log_line(), detail));
    overlay.push_hook_event(event).await;
}

/// Telemetry from a stale or unrelated process must not corrupt the live
/// overlay: mismatched session ids are dropped, and so are messages with
/// no session id at all while a session is active.
fn passes_gate(raw: &RawHookEvent, gate: &dyn SessionGate, log: &HookLog) -> bool {
    let current = gate.current_session();
    match (&raw.session_id, &current) {
        (Some(theirs), _) if current.as_deref() != Some(theirs.as_str()) => {
            let prefix: String = theirs.chars().take(8).collect();
            log.append(&format!("DROP {} session={}", raw.event, prefix));
            debug!("dropping hook event {} from session {}", raw.event, prefix);
            false
        }
        (None, Some(_)) => {
            log.append(&format!("DROP {} (no session id)", raw.event));
            debug!("dropping hook event {} without session id", raw.event);
            false
        }
        _ => true,
    }
}
