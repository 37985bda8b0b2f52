use tauri::Emitter;
use tokio::sync::broadcast::error::RecvError;
use updater_harness::config;
use updater_harness::{HarnessHandle, HarnessNotice, HarnessSnapshot, LogEntry, Result};

pub(crate) mod logs;
pub(crate) mod update;

pub const EVENT_STATE: &str = "updater:state";
pub const EVENT_LOG: &str = "updater:log";
pub const EVENT_LOGS_CLEARED: &str = "updater:logs-cleared";
pub const EVENT_VERSION: &str = "updater:version";
pub const EVENT_AUTO_CHECK: &str = "updater:auto-check";
pub const EVENT_RESYNC: &str = "updater:resync";

pub fn start_event_forwarding(app: tauri::AppHandle, handle: &HarnessHandle) {
    let mut notices = handle.subscribe();
    tauri::async_runtime::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => forward_notice(&app, notice),
                Err(RecvError::Lagged(skipped)) => {
                    // The webview missed notices; it refetches the snapshot on resync.
                    tracing::warn!("notices_lagged: {}", skipped);
                    let _ = app.emit(EVENT_RESYNC, ());
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn forward_notice(app: &tauri::AppHandle, notice: HarnessNotice) {
    let result = match notice {
        HarnessNotice::StateChanged(state) => app.emit(EVENT_STATE, state),
        HarnessNotice::LogAppended(entry) => app.emit(EVENT_LOG, entry),
        HarnessNotice::LogsCleared => app.emit(EVENT_LOGS_CLEARED, ()),
        HarnessNotice::AppVersion(version) => app.emit(EVENT_VERSION, version),
        HarnessNotice::AutoCheckChanged(enabled) => app.emit(EVENT_AUTO_CHECK, enabled),
    };
    if let Err(e) = result {
        tracing::warn!("failed_to_emit_notice: {}", e);
    }
}
