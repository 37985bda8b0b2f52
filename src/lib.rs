pub mod bridge;
pub mod config;
pub mod error;
pub mod harness;
pub mod logs;
pub mod machine;
pub mod scheduler;
pub mod state;
pub mod time_util;

pub use bridge::{BridgeEvent, UpdaterBackend, UpdaterCommand};
pub use config::HarnessSettings;
pub use error::{Error, Result};
pub use harness::{launch, EventSink, Harness, HarnessHandle, HarnessNotice, HarnessSnapshot, UserAction};
pub use logs::{LogBuffer, LogEntry, LogLevel};
pub use machine::UpdateMachine;
pub use scheduler::{AutoCheckScheduler, TimerHandle};
pub use state::{
    derive_available_actions, derive_status_text, AvailableActions, DownloadProgress,
    StatusTone, UpdateAction, UpdateInfo, UpdateState,
};
