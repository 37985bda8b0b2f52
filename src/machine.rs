use crate::logs::{LogBuffer, LogEntry, LogLevel};
use crate::state::{format_percent, UpdateState};
use serde_json::json;

/// Every incoming state replaces the current one; no transition is rejected.
#[derive(Debug, Default)]
pub struct UpdateMachine {
    current: UpdateState,
}

impl UpdateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_state(&self) -> &UpdateState {
        &self.current
    }

    pub fn apply_event<'a>(
        &mut self,
        next: UpdateState,
        logs: &'a mut LogBuffer,
    ) -> Option<&'a LogEntry> {
        let entry = transition_entry(&next);
        tracing::debug!(from = self.current.label(), to = next.label(), "update_state_applied");
        self.current = next;
        entry.map(|entry| logs.append(entry))
    }
}

pub fn transition_entry(state: &UpdateState) -> Option<LogEntry> {
    let entry = match state {
        UpdateState::Idle => return None,
        UpdateState::Checking => LogEntry::new(LogLevel::Info, "Checking for updates..."),
        UpdateState::UpdateAvailable { info } => LogEntry::new(
            LogLevel::Success,
            format!("Update available: v{}", info.version),
        )
        .with_details(json!(info)),
        UpdateState::UpdateNotAvailable => LogEntry::new(LogLevel::Info, "No updates available"),
        UpdateState::Downloading { progress } => {
            let percent = progress.percent?;
            LogEntry::new(
                LogLevel::Info,
                format!("Downloading: {}", format_percent(percent)),
            )
            .with_details(json!(progress))
        }
        UpdateState::Downloaded { file_path } => {
            LogEntry::new(LogLevel::Success, "Update downloaded successfully")
                .with_details(json!({ "filePath": file_path }))
        }
        UpdateState::Installing => LogEntry::new(LogLevel::Info, "Installing update..."),
        UpdateState::Error { message } => {
            LogEntry::new(LogLevel::Error, format!("Update error: {message}"))
                .with_details(json!({ "error": message }))
        }
    };
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{derive_available_actions, DownloadProgress, UpdateInfo};

    fn tail(logs: &LogBuffer) -> (LogLevel, String) {
        let last = logs.last().expect("log entry");
        (last.level(), last.message().to_string())
    }

    #[test]
    fn available_update_flow() {
        let mut machine = UpdateMachine::new();
        let mut logs = LogBuffer::new();

        machine.apply_event(UpdateState::Checking, &mut logs);
        assert_eq!(tail(&logs), (LogLevel::Info, "Checking for updates...".into()));

        machine.apply_event(
            UpdateState::UpdateAvailable {
                info: UpdateInfo::new("2.0.0"),
            },
            &mut logs,
        );
        assert!(derive_available_actions(machine.current_state()).download);
        assert_eq!(
            tail(&logs),
            (LogLevel::Success, "Update available: v2.0.0".into())
        );
        assert_eq!(
            logs.last().and_then(|e| e.details()).and_then(|d| d.get("version")),
            Some(&json!("2.0.0"))
        );
    }

    #[test]
    fn downloading_without_percent_logs_nothing() {
        let mut machine = UpdateMachine::new();
        let mut logs = LogBuffer::new();

        let appended = machine.apply_event(
            UpdateState::Downloading {
                progress: DownloadProgress::with_percent(42.567),
            },
            &mut logs,
        );
        assert_eq!(appended.map(|e| e.message().to_string()), Some("Downloading: 42.6%".into()));

        let appended = machine.apply_event(
            UpdateState::Downloading {
                progress: DownloadProgress::default(),
            },
            &mut logs,
        );
        assert!(appended.is_none());
        assert_eq!(logs.len(), 1);
        assert_eq!(
            machine.current_state(),
            &UpdateState::Downloading {
                progress: DownloadProgress::default()
            }
        );
    }

    #[test]
    fn error_is_recorded_and_logged() {
        let mut machine = UpdateMachine::new();
        let mut logs = LogBuffer::new();
        machine.apply_event(
            UpdateState::Error {
                message: "network timeout".into(),
            },
            &mut logs,
        );
        assert_eq!(machine.current_state().label(), "error");
        assert_eq!(
            tail(&logs),
            (LogLevel::Error, "Update error: network timeout".into())
        );
    }

    #[test]
    fn any_state_may_follow_any_state() {
        let mut machine = UpdateMachine::new();
        let mut logs = LogBuffer::new();
        machine.apply_event(UpdateState::Installing, &mut logs);
        assert_eq!(machine.current_state(), &UpdateState::Installing);
        assert_eq!(tail(&logs), (LogLevel::Info, "Installing update...".into()));

        machine.apply_event(UpdateState::Idle, &mut logs);
        assert_eq!(machine.current_state(), &UpdateState::Idle);
        assert_eq!(logs.len(), 1);
    }

    #[test]
    fn remaining_transition_messages() {
        let cases = [
            (UpdateState::UpdateNotAvailable, LogLevel::Info, "No updates available"),
            (
                UpdateState::Downloaded {
                    file_path: "/tmp/x".into(),
                },
                LogLevel::Success,
                "Update downloaded successfully",
            ),
        ];
        for (state, level, message) in cases {
            let entry = transition_entry(&state).expect("entry");
            assert_eq!(entry.level(), level);
            assert_eq!(entry.message(), message);
        }
    }
}
