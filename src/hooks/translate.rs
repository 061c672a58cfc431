//! Translation of raw tool-use telemetry into the closed set of UI event
//! kinds the overlay understands.
//!
//! Agent detection is a documented heuristic, not a parser: upstream tool
//! payloads are not contractually structured, so explicit type fields are
//! checked first and free-text description/prompt fields are scanned for a
//! known identifier as a fallback.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

/// Sub-agents the overlay knows how to display.
pub const KNOWN_AGENTS: [&str; 4] = ["code-eye", "voice", "hearing", "narrator"];

const MAX_INPUT_CHARS: usize = 300;
const MAX_OUTPUT_CHARS: usize = 500;

static SEARCH_QUERY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""query"\s*:\s*"([^"]+)""#).expect("static pattern"));

/// A raw hook telemetry record, parsed leniently; field names vary between
/// emitters (`hook_event_name`/`event`, `session_id`/`sessionId`).
#[derive(Debug, Clone)]
pub struct RawHookEvent {
    pub event: String,
    pub session_id: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Value,
    pub tool_output: Option<Value>,
    pub stop_reason: Option<String>,
}

impl RawHookEvent {
    /// None when no event-name field is present; such messages are noise.
    pub fn from_value(value: &Value) -> Option<Self> {
        let event = value
            .get("hook_event_name")
            .or_else(|| value.get("event"))
            .and_then(Value::as_str)?
            .to_string();

        let session_id = value
            .get("session_id")
            .or_else(|| value.get("sessionId"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(Self {
            event,
            session_id,
            tool_name: value
                .get("tool_name")
                .and_then(Value::as_str)
                .map(str::to_string),
            tool_input: value.get("tool_input").cloned().unwrap_or(Value::Null),
            tool_output: value.get("tool_output").cloned(),
            stop_reason: value
                .get("stop_reason")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolPhase {
    Pre,
    Post,
    PostFailure,
}

impl ToolPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolPhase::Pre => "PreToolUse",
            ToolPhase::Post => "PostToolUse",
            ToolPhase::PostFailure => "PostToolUseFailure",
        }
    }

    fn parse(event: &str) -> Option<ToolPhase> {
        match event {
            "PreToolUse" => Some(ToolPhase::Pre),
            "PostToolUse" => Some(ToolPhase::Post),
            "PostToolUseFailure" => Some(ToolPhase::PostFailure),
            _ => None,
        }
    }
}

/// The closed set of UI-facing event kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum HookUiEvent {
    SubagentStart {
        agent: String,
    },
    SubagentStop {
        agent: String,
    },
    Tool {
        phase: ToolPhase,
        tool_name: String,
        /// Serialized tool input, truncated.
        tool_input: String,
        /// Serialized tool output, truncated.
        tool_output: String,
    },
    Stop {
        stop_reason: String,
    },
    /// Any other named event passes through unchanged.
    Passthrough {
        event: String,
    },
}

impl HookUiEvent {
    /// The JSON payload pushed to the overlay.
    pub fn to_payload(&self) -> Value {
        match self {
            HookUiEvent::SubagentStart { agent } => {
                json!({ "event": "SubagentStart", "agent_type": agent })
            }
            HookUiEvent::SubagentStop { agent } => {
                json!({ "event": "SubagentStop", "agent_type": agent })
            }
            HookUiEvent::Tool {
                phase,
                tool_name,
                tool_input,
                tool_output,
            } => json!({
                "event": phase.as_str(),
                "tool_name": tool_name,
                "tool_input": tool_input,
                "tool_output": tool_output,
            }),
            HookUiEvent::Stop { stop_reason } => {
                json!({ "event": "Stop", "stop_reason": stop_reason })
            }
            HookUiEvent::Passthrough { event } => json!({ "event": event }),
        }
    }

    /// Compact one-line description for the diagnostic log.
    pub fn log_line(&self) -> String {
        match self {
            HookUiEvent::SubagentStart { agent } => format!("SubagentStart {}", agent),
            HookUiEvent::SubagentStop { agent } => format!("SubagentStop {}", agent),
            HookUiEvent::Tool {
                phase, tool_name, ..
            } => format!("{} {}", phase.as_str(), tool_name),
            HookUiEvent::Stop { stop_reason } => format!("Stop ({})", stop_reason),
            HookUiEvent::Passthrough { event } => event.clone(),
        }
    }
}

/// Normalize one raw hook event into its UI event.
pub fn translate(raw: &RawHookEvent) -> HookUiEvent {
    if let Some(phase) = ToolPhase::parse(&raw.event) {
        return translate_tool_event(phase, raw);
    }

    if raw.event == "Stop" {
        return HookUiEvent::Stop {
            stop_reason: raw
                .stop_reason
                .clone()
                .unwrap_or_else(|| "end_turn".to_string()),
        };
    }

    HookUiEvent::Passthrough {
        event: raw.event.clone(),
    }
}

fn translate_tool_event(phase: ToolPhase, raw: &RawHookEvent) -> HookUiEvent {
    let mut tool_name = raw.tool_name.clone().unwrap_or_else(|| "unknown".to_string());
    let mut tool_input = raw.tool_input.clone();

    // Sub-task delegations for a known agent become subagent events.
    if tool_name == "Task" {
        if let Some(agent) = agent_kind(&raw.tool_input) {
            return match phase {
                ToolPhase::Pre => HookUiEvent::SubagentStart { agent },
                ToolPhase::Post | ToolPhase::PostFailure => HookUiEvent::SubagentStop { agent },
            };
        }
    }

    // Shell calls against the search endpoint are rewritten into a clean
    // Search event; the displayed input is just the query string.
    if tool_name == "Bash" {
        let search_query = tool_input
            .get("command")
            .and_then(Value::as_str)
            .filter(|command| command.contains("rtstream/search"))
            .map(extract_search_query);
        if let Some(query) = search_query {
            tool_input = match query {
                Some(query) => json!({ "query": query }),
                None => json!({}),
            };
            tool_name = "Search".to_string();
        }
    }

    let output = raw.tool_output.clone().unwrap_or(Value::String(String::new()));
    HookUiEvent::Tool {
        phase,
        tool_name,
        tool_input: truncate_chars(&tool_input.to_string(), MAX_INPUT_CHARS),
        tool_output: truncate_chars(&output.to_string(), MAX_OUTPUT_CHARS),
    }
}

/// Match a tool input against the known agent identifiers. Explicit type
/// fields win (last `:`-separated segment); otherwise description and
/// prompt text is scanned case-insensitively.
pub fn agent_kind(input: &Value) -> Option<String> {
    for key in ["subagent_type", "agent_type"] {
        if let Some(value) = input.get(key).and_then(Value::as_str) {
            let name = value.rsplit(':').next().unwrap_or(value);
            if KNOWN_AGENTS.contains(&name) {
                return Some(name.to_string());
            }
        }
    }

    let description = input.get("description").and_then(Value::as_str).unwrap_or("");
    let prompt = input.get("prompt").and_then(Value::as_str).unwrap_or("");
    let text = format!("{} {}", description, prompt).to_lowercase();
    KNOWN_AGENTS
        .iter()
        .find(|agent| text.contains(*agent))
        .map(|agent| agent.to_string())
}

/// Pull the query string out of a shell command hitting the search
/// endpoint, via a quoted-key pattern match on the command text.
pub fn extract_search_query(command: &str) -> Option<String> {
    SEARCH_QUERY
        .captures(command)
        .map(|caps| caps[1].to_string())
}

/// Truncate to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect()
}

/// Extra detail appended to the diagnostic log line for common tools.
pub fn tool_detail(tool_name: &str, input: &Value) -> String {
    match tool_name {
        "Task" => {
            let agent = input
                .get("subagent_type")
                .or_else(|| input.get("agent_type"))
                .and_then(Value::as_str)
                .map(|a| a.rsplit(':').next().unwrap_or(a))
                .unwrap_or("");
            if agent.is_empty() {
                return String::new();
            }
            match input.get("description").and_then(Value::as_str) {
                Some(desc) if !desc.is_empty() => {
                    format!(" -> {} ({})", agent, truncate_chars(desc, 40))
                }
                _ => format!(" -> {}", agent),
            }
        }
        "Bash" => match input.get("command").and_then(Value::as_str) {
            Some(cmd) if !cmd.is_empty() => {
                format!(" -> {}", truncate_chars(&cmd.replace('\n', " "), 60))
            }
            _ => String::new(),
        },
        "Read" | "Write" | "Edit" => match input.get("file_path").and_then(Value::as_str) {
            Some(path) => format!(" -> {}", path),
            None => String::new(),
        },
        "Grep" => match input.get("pattern").and_then(Value::as_str) {
            Some(pattern) => format!(" -> {}", pattern),
            None => String::new(),
        },
        "Search" => match input.get("query").and_then(Value::as_str) {
            Some(query) => format!(" -> \"{}\"", truncate_chars(query, 40)),
            None => String::new(),
        },
        _ => String::new(),
    }
}
