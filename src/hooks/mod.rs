pub mod log;
pub mod server;
pub mod translate;

pub use log::HookLog;
pub use server::{HookRouter, HookRouterHandle, SessionGate};
pub use translate::{HookUiEvent, RawHookEvent, ToolPhase, KNOWN_AGENTS};
