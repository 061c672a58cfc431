pub mod coordinator;
pub mod event;

pub use coordinator::SessionCoordinator;
pub use event::{
    audio_modality, channel_display_name, normalize_finality, rtstream_display_name,
    start_to_millis, LifecycleEvent, LifecycleNotification,
};
