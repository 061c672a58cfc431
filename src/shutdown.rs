//! Ordered, timeout-bounded teardown of every owned resource.
//!
//! Concurrent shutdown triggers (OS signal, API call, quit) converge on a
//! single teardown run; a failure or timeout in one step logs and proceeds
//! to the next. A global watchdog force-exits the process if the whole
//! sequence hangs on a misbehaving external resource.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OnceCell};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::assistant::AssistantRunner;
use crate::backend::CaptureBackend;
use crate::buffer::ContextBuffer;
use crate::hooks::HookRouterHandle;
use crate::http::HttpServerHandle;
use crate::session::SessionCoordinator;
use crate::tunnel::Tunnel;
use crate::ui::{OverlaySink, ShortcutRegistry, TrayHandle};

const OVERLAY_TIMEOUT: Duration = Duration::from_secs(1);
const HTTP_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);
const SESSION_STOP_TIMEOUT: Duration = Duration::from_secs(3);
const BACKEND_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);
const STREAM_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);
const TUNNEL_STOP_TIMEOUT: Duration = Duration::from_secs(2);
/// Longer than the sum of the step timeouts above.
const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(15);

pub struct ShutdownOrchestrator {
    assistant: Arc<AssistantRunner>,
    shortcuts: Arc<dyn ShortcutRegistry>,
    tray: Arc<dyn TrayHandle>,
    overlay: Arc<dyn OverlaySink>,
    backend: Arc<dyn CaptureBackend>,
    coordinator: Arc<SessionCoordinator>,
    tunnel: Arc<dyn Tunnel>,
    buffer: Arc<ContextBuffer>,
    hook_router: Mutex<Option<HookRouterHandle>>,
    http_server: Mutex<Option<HttpServerHandle>>,
    done: OnceCell<()>,
    exit_called: AtomicBool,
}

impl ShutdownOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        assistant: Arc<AssistantRunner>,
        shortcuts: Arc<dyn ShortcutRegistry>,
        tray: Arc<dyn TrayHandle>,
        overlay: Arc<dyn OverlaySink>,
        backend: Arc<dyn CaptureBackend>,
        coordinator: Arc<SessionCoordinator>,
        tunnel: Arc<dyn Tunnel>,
        buffer: Arc<ContextBuffer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            assistant,
            shortcuts,
            tray,
            overlay,
            backend,
            coordinator,
            tunnel,
            buffer,
            hook_router: Mutex::new(None),
            http_server: Mutex::new(None),
            done: OnceCell::new(),
            exit_called: AtomicBool::new(false),
        })
    }

    /// Listeners are registered after they start; a shutdown before
    /// registration simply has nothing to close for that step.
    pub async fn register_hook_router(&self, handle: HookRouterHandle) {
        *self.hook_router.lock().await = Some(handle);
    }

    pub async fn register_http_server(&self, handle: HttpServerHandle) {
        *self.http_server.lock().await = Some(handle);
    }

    /// Run the teardown sequence once; later and concurrent callers attach
    /// to the in-flight run and return when it completes.
    pub async fn shutdown(&self) {
        self.done
            .get_or_init(|| async {
                info!("shutdown: starting cleanup");
                let watchdog = tokio::spawn(async {
                    tokio::time::sleep(WATCHDOG_TIMEOUT).await;
                    error!("shutdown: watchdog fired, forcing exit");
                    std::process::exit(1);
                });
                self.run_teardown().await;
                watchdog.abort();
                info!("shutdown: cleanup complete");
            })
            .await;
    }

    /// Fire-and-forget trigger for callers that must respond before the
    /// process goes away (the shutdown API endpoint).
    pub fn trigger(self: Arc<Self>, source: &str) {
        info!("shutdown requested ({})", source);
        tokio::spawn(async move {
            self.exit_after_shutdown().await;
        });
    }

    /// Shut down, then exit the process. The exit call happens exactly
    /// once regardless of how many triggers raced.
    pub async fn exit_after_shutdown(&self) {
        self.shutdown().await;
        if !self.exit_called.swap(true, Ordering::SeqCst) {
            std::process::exit(0);
        }
    }

    async fn run_teardown(&self) {
        // 1. Assistant child: graceful signal, short grace, force-kill.
        self.assistant.kill("app shutdown");

        // 2. Global input shortcuts.
        self.shortcuts.unregister_all();

        // 3. UI collaborators, best-effort.
        step("destroy ui", OVERLAY_TIMEOUT, async {
            futures::future::join(async { self.tray.destroy() }, self.overlay.destroy()).await;
        })
        .await;

        // 4. Hook listener and its socket artifact.
        if let Some(handle) = self.hook_router.lock().await.take() {
            handle.close().await;
        }

        // 5. HTTP API listener.
        if let Some(handle) = self.http_server.lock().await.take() {
            handle.close(HTTP_CLOSE_TIMEOUT).await;
        }

        // 6. Remote capture session, then the client handle.
        step("stop capture session", SESSION_STOP_TIMEOUT, async {
            if let Err(e) = self.backend.stop_session().await {
                warn!("shutdown: stopping capture session failed: {:#}", e);
            }
        })
        .await;
        step("backend shutdown", BACKEND_SHUTDOWN_TIMEOUT, async {
            if let Err(e) = self.backend.shutdown().await {
                warn!("shutdown: backend shutdown failed: {:#}", e);
            }
        })
        .await;

        // 7. Content-event stream.
        step(
            "close content stream",
            STREAM_CLOSE_TIMEOUT,
            self.coordinator.close_stream(),
        )
        .await;

        // 8. Tunnel process.
        step("stop tunnel", TUNNEL_STOP_TIMEOUT, self.tunnel.stop()).await;

        // 9. Context buffer.
        self.buffer.cleanup();
    }
}

async fn step<F: Future<Output = ()>>(name: &str, limit: Duration, fut: F) {
    match timeout(limit, fut).await {
        Ok(()) => debug!("shutdown: {} done", name),
        Err(_) => warn!("shutdown: {} timed out", name),
    }
}
