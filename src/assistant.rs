//! Management of the external assistant CLI process.
//!
//! At most one child is in flight. Its buffered stdout is parsed on exit
//! for a session identifier, which is retained across invocations (later
//! runs resume it) and doubles as the hook router's gate identity.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::AssistantConfig;
use crate::hooks::SessionGate;
use crate::ui::Notifier;

const KILL_GRACE: Duration = Duration::from_secs(2);

/// State shared with the per-child watcher task.
#[derive(Default)]
struct Shared {
    session_id: Mutex<Option<String>>,
    child_pid: Mutex<Option<i32>>,
}

pub struct AssistantRunner {
    config: AssistantConfig,
    project_root: PathBuf,
    notifier: Arc<dyn Notifier>,
    shared: Arc<Shared>,
}

impl AssistantRunner {
    pub fn new(
        config: AssistantConfig,
        project_root: PathBuf,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            project_root,
            notifier,
            shared: Arc::new(Shared::default()),
        })
    }

    pub fn session_id(&self) -> Option<String> {
        self.shared
            .session_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn child_pid(&self) -> Option<i32> {
        *self
            .shared
            .child_pid
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Create the assistant session at startup; the session id is parsed
    /// from the child's output once it exits.
    pub fn init_session(&self) {
        info!("creating assistant session");
        let args = self.build_args(None, "ok", false);
        if let Err(e) = self.spawn_and_watch(args) {
            error!("failed to create assistant session: {:#}", e);
        }
    }

    /// Run the assistant for one activation, resuming the retained session
    /// when present. Any child still in flight is killed first.
    pub fn trigger(&self, prompt: &str) {
        self.kill("new activation");
        let resume = self.session_id();
        let args = self.build_args(resume.as_deref(), prompt, true);
        if let Err(e) = self.spawn_and_watch(args) {
            error!("failed to run assistant: {:#}", e);
            self.notifier
                .notify("Assistant error", "Failed to run the assistant command");
        }
    }

    /// Graceful termination: SIGTERM now, SIGKILL after a short grace
    /// window. Returns false when no child is in flight.
    pub fn kill(&self, reason: &str) -> bool {
        let pid = self
            .shared
            .child_pid
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(pid) = pid else { return false };

        info!("killing assistant process {} ({})", pid, reason);
        unsafe {
            let _ = libc::kill(pid, libc::SIGTERM);
        }
        tokio::spawn(async move {
            tokio::time::sleep(KILL_GRACE).await;
            // Already-exited children are fine; the error is ignored.
            unsafe {
                let _ = libc::kill(pid, libc::SIGKILL);
            }
        });
        true
    }

    fn build_args(&self, resume: Option<&str>, prompt: &str, with_max_turns: bool) -> Vec<String> {
        let mut args = vec!["--agent".to_string(), self.config.agent.clone()];
        if self.config.skip_permissions {
            args.push("--dangerously-skip-permissions".to_string());
        }
        for tool in &self.config.allowed_tools {
            args.push("--allowedTools".to_string());
            args.push(tool.clone());
        }
        if with_max_turns {
            args.push("--max-turns".to_string());
            args.push(self.config.max_turns.to_string());
        }
        if let Some(session) = resume {
            args.push("-r".to_string());
            args.push(session.to_string());
        }
        args.push("-p".to_string());
        args.push(prompt.to_string());
        args.push("--output-format".to_string());
        args.push("json".to_string());
        args
    }

    fn spawn_and_watch(&self, args: Vec<String>) -> Result<()> {
        debug!("{} {}", self.config.command, args.join(" "));
        let mut child = Command::new(&self.config.command)
            .args(&args)
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .context("spawning assistant process")?;

        let pid = child.id().map(|p| p as i32);
        *self
            .shared
            .child_pid
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = pid;
        info!("assistant process started (pid {:?})", pid);

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let mut stdout = String::new();
            if let Some(mut out) = child.stdout.take() {
                let _ = out.read_to_string(&mut stdout).await;
            }

            match child.wait().await {
                Ok(status) => {
                    record_session_from_output(&shared, &stdout);
                    info!("assistant exited with {:?}", status.code());
                }
                Err(e) => error!("waiting on assistant failed: {}", e),
            }
            *shared.child_pid.lock().unwrap_or_else(|e| e.into_inner()) = None;
        });

        Ok(())
    }
}

fn record_session_from_output(shared: &Shared, stdout: &str) {
    let Ok(value) = serde_json::from_str::<Value>(stdout) else {
        debug!("assistant output carried no parsable session id");
        return;
    };
    let Some(session) = value.get("session_id").and_then(Value::as_str) else {
        return;
    };

    let mut current = shared.session_id.lock().unwrap_or_else(|e| e.into_inner());
    if current.as_deref() != Some(session) {
        *current = Some(session.to_string());
        info!("assistant session: {}", session);
    }
}

impl SessionGate for AssistantRunner {
    fn current_session(&self) -> Option<String> {
        self.session_id()
    }
}
