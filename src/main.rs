use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use pair_recorder::assistant::AssistantRunner;
use pair_recorder::backend::{CaptureBackend, UnconfiguredBackend};
use pair_recorder::buffer::ContextBuffer;
use pair_recorder::config::Config;
use pair_recorder::hooks::{HookLog, HookRouter, SessionGate};
use pair_recorder::http::{self, AppState};
use pair_recorder::session::SessionCoordinator;
use pair_recorder::shutdown::ShutdownOrchestrator;
use pair_recorder::state::RecordingState;
use pair_recorder::tunnel::{DisabledTunnel, Tunnel};
use pair_recorder::ui::{LogNotifier, LogOverlay, NoopShortcuts, NoopTray, Notifier, OverlaySink};

#[derive(Debug, Parser)]
#[command(name = "pair-recorder", about = "Local recording session coordinator")]
struct Args {
    /// Configuration file (extension resolved by the config loader).
    #[arg(long, default_value = "config/pair-recorder")]
    config: String,

    /// Override the API server port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }

    let run_id = uuid::Uuid::new_v4();
    info!("{} starting (run {})", cfg.service.name, run_id);

    // Collaborators. The GUI layer and tunnel utility are external; the
    // logging/no-op stand-ins keep the coordination engine fully usable
    // headless.
    let overlay: Arc<dyn OverlaySink> = Arc::new(LogOverlay);
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let tunnel: Arc<dyn Tunnel> = Arc::new(DisabledTunnel);

    let backend: Arc<dyn CaptureBackend> = Arc::new(UnconfiguredBackend);
    let degraded = cfg.backend.api_key.is_none();

    let recording = Arc::new(RecordingState::new());
    let buffer = Arc::new(ContextBuffer::new(&cfg.buffers));
    let coordinator = SessionCoordinator::new(
        Arc::clone(&recording),
        Arc::clone(&buffer),
        Arc::clone(&backend),
        Arc::clone(&notifier),
        cfg.indexing.clone(),
        run_id,
    );

    let project_root = std::env::var("PROJECT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let assistant = AssistantRunner::new(
        cfg.assistant.clone(),
        project_root,
        Arc::clone(&notifier),
    );

    let orchestrator = ShutdownOrchestrator::new(
        Arc::clone(&assistant),
        Arc::new(NoopShortcuts),
        Arc::new(NoopTray),
        Arc::clone(&overlay),
        Arc::clone(&backend),
        Arc::clone(&coordinator),
        Arc::clone(&tunnel),
        Arc::clone(&buffer),
    );

    // Phase 1: local infrastructure, no external dependencies.
    buffer.cleanup();

    let app_state = AppState {
        recording: Arc::clone(&recording),
        buffer: Arc::clone(&buffer),
        coordinator: Arc::clone(&coordinator),
        overlay: Arc::clone(&overlay),
        assistant: Arc::clone(&assistant),
        shutdown: Arc::clone(&orchestrator),
    };
    let http_handle = http::serve(
        http::create_router(app_state),
        &cfg.service.http.bind,
        cfg.service.http.port,
    )
    .await?;
    let api_port = http_handle.local_addr().port();
    orchestrator.register_http_server(http_handle).await;

    let gate: Arc<dyn SessionGate> = Arc::clone(&assistant) as Arc<dyn SessionGate>;
    let hook_router = HookRouter::new(
        &cfg.hooks.socket_path,
        Arc::clone(&overlay),
        gate,
        HookLog::new(&cfg.hooks.log_path),
    );
    match hook_router.bind().await {
        Ok(handle) => orchestrator.register_hook_router(handle).await,
        Err(e) => warn!("hook socket unavailable: {:#}", e),
    }

    // Phase 2: assistant session and backend, independent of each other.
    assistant.init_session();
    if degraded {
        notifier.notify(
            "pair-recorder",
            "No backend API key configured; running in degraded mode",
        );
    }

    // Phase 3: webhook URL from config, else tunnel; without either the
    // content-event stream is the only lifecycle path.
    let webhook_url = match cfg.backend.webhook_url.clone() {
        Some(base) => Some(format!("{}/webhook", base.trim_end_matches('/'))),
        None => match tunnel.start(api_port).await {
            Ok(Some(base)) => Some(format!("{}/webhook", base.trim_end_matches('/'))),
            Ok(None) => {
                info!("no tunnel available, relying on the content-event stream");
                None
            }
            Err(e) => {
                warn!("tunnel start failed: {:#}", e);
                None
            }
        },
    };
    if let Some(url) = &webhook_url {
        info!("lifecycle callbacks via {}", url);
    }
    coordinator.set_callback_url(webhook_url).await;

    // Phase 4: pre-create the capture session so permissions can be
    // requested early. Failure is not fatal; recording start retries.
    if !degraded {
        if let Err(e) = coordinator.ensure_session().await {
            warn!("session pre-creation failed: {:#}", e);
        }
    }

    notifier.notify("pair-recorder", "Ready");

    wait_for_signal().await;
    orchestrator.exit_after_shutdown().await;
    Ok(())
}

async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!("failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            info!("received SIGINT");
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    }
}
