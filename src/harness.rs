//! The single mutation queue.
//!
//! Every change to the update state, the log history and the auto-check timer goes through one
//! [`HarnessInput`] queue drained by [`Harness::run`], one input at a time. Bridge events, user
//! actions and timer ticks therefore never interleave, and every log append sees the current
//! buffer.

use crate::bridge::{BridgeEvent, OfflineUpdater, ProcessUpdater, UpdaterBackend, UpdaterCommand};
use crate::config::HarnessSettings;
use crate::error::{Error, Result};
use crate::logs::{LogBuffer, LogEntry, LogLevel};
use crate::machine::UpdateMachine;
use crate::scheduler::{AutoCheckScheduler, TimerHandle};
use crate::state::{
    derive_available_actions, derive_status_text, status_tone, transfer_text, AvailableActions,
    StatusTone, UpdateAction, UpdateState,
};
use serde::Serialize;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

pub const UNKNOWN_VERSION: &str = "Unknown";

const NOTICE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    CheckForUpdates,
    DownloadUpdate,
    InstallUpdate,
    ToggleAutoCheck(bool),
    ClearLogs,
}

#[derive(Debug)]
pub enum HarnessInput {
    Event(BridgeEvent),
    Action(UserAction),
    AutoCheckTick(TimerHandle),
    Snapshot(oneshot::Sender<HarnessSnapshot>),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HarnessNotice {
    StateChanged(UpdateState),
    LogAppended(LogEntry),
    LogsCleared,
    AppVersion(String),
    AutoCheckChanged(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarnessSnapshot {
    pub state: UpdateState,
    pub status_text: String,
    pub tone: StatusTone,
    pub pulses: bool,
    pub actions: AvailableActions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_text: Option<String>,
    pub logs: Vec<LogEntry>,
    pub app_version: String,
    pub auto_check: bool,
}

#[derive(Debug, Clone)]
pub struct HarnessHandle {
    inbox: mpsc::UnboundedSender<HarnessInput>,
    notices: broadcast::Sender<HarnessNotice>,
}

impl HarnessHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HarnessInput>) {
        let (inbox, rx) = mpsc::unbounded_channel();
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        (Self { inbox, notices }, rx)
    }

    fn submit(&self, input: HarnessInput) -> Result<()> {
        self.inbox.send(input).map_err(|_| Error::HarnessClosed)
    }

    pub fn deliver(&self, event: BridgeEvent) -> Result<()> {
        self.submit(HarnessInput::Event(event))
    }

    pub fn check_for_updates(&self) -> Result<()> {
        self.submit(HarnessInput::Action(UserAction::CheckForUpdates))
    }

    pub fn download_update(&self) -> Result<()> {
        self.submit(HarnessInput::Action(UserAction::DownloadUpdate))
    }

    pub fn install_update(&self) -> Result<()> {
        self.submit(HarnessInput::Action(UserAction::InstallUpdate))
    }

    pub fn toggle_auto_check(&self, enabled: bool) -> Result<()> {
        self.submit(HarnessInput::Action(UserAction::ToggleAutoCheck(enabled)))
    }

    pub fn clear_logs(&self) -> Result<()> {
        self.submit(HarnessInput::Action(UserAction::ClearLogs))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.submit(HarnessInput::Shutdown)
    }

    pub async fn snapshot(&self) -> Result<HarnessSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.submit(HarnessInput::Snapshot(tx))?;
        rx.await.map_err(|_| Error::HarnessClosed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HarnessNotice> {
        self.notices.subscribe()
    }

    /// Sink for a bridge event pump. It does not count as a handle, so a pump blocked on a live
    /// updater never keeps the harness running.
    pub fn event_sink(&self) -> EventSink {
        EventSink {
            inbox: self.inbox.downgrade(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSink {
    inbox: mpsc::WeakUnboundedSender<HarnessInput>,
}

impl EventSink {
    pub fn deliver(&self, event: BridgeEvent) -> Result<()> {
        let inbox = self.inbox.upgrade().ok_or(Error::HarnessClosed)?;
        inbox
            .send(HarnessInput::Event(event))
            .map_err(|_| Error::HarnessClosed)
    }
}

pub struct Harness<B> {
    backend: B,
    machine: UpdateMachine,
    logs: LogBuffer,
    scheduler: AutoCheckScheduler,
    auto_check: bool,
    auto_check_on_start: bool,
    interval: Duration,
    app_version: String,
    inbox: mpsc::WeakUnboundedSender<HarnessInput>,
    notices: broadcast::Sender<HarnessNotice>,
}

impl<B: UpdaterBackend> Harness<B> {
    pub fn new(backend: B, settings: &HarnessSettings, handle: &HarnessHandle) -> Self {
        Self {
            backend,
            machine: UpdateMachine::new(),
            logs: LogBuffer::with_capacity(settings.log_capacity),
            scheduler: AutoCheckScheduler::new(),
            auto_check: false,
            auto_check_on_start: settings.auto_check,
            interval: settings.auto_check_interval,
            app_version: UNKNOWN_VERSION.to_string(),
            inbox: handle.inbox.downgrade(),
            notices: handle.notices.clone(),
        }
    }

    /// Drains the queue until shutdown or until every [`HarnessHandle`] is dropped.
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<HarnessInput>) {
        self.start();
        while let Some(input) = inbox.recv().await {
            if self.handle(input).is_break() {
                break;
            }
        }
        self.scheduler.disable_active();
        tracing::info!("harness_stopped");
    }

    /// Startup work: record the launch, ask for the version, arm auto-check if configured.
    /// Requires a tokio runtime when auto-check is enabled.
    pub fn start(&mut self) {
        self.log(LogLevel::Info, "Application started");
        self.send(UpdaterCommand::GetAppVersion);
        if self.auto_check_on_start {
            self.set_auto_check(true);
        }
    }

    pub fn handle(&mut self, input: HarnessInput) -> ControlFlow<()> {
        match input {
            HarnessInput::Event(event) => self.on_event(event),
            HarnessInput::Action(action) => self.on_action(action),
            HarnessInput::AutoCheckTick(timer) => self.on_tick(timer),
            HarnessInput::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            HarnessInput::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    pub fn current_state(&self) -> &UpdateState {
        self.machine.current_state()
    }

    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    pub fn snapshot(&self) -> HarnessSnapshot {
        let state = self.machine.current_state().clone();
        let tone = status_tone(&state);
        let transfer = match &state {
            UpdateState::Downloading { progress } => Some(transfer_text(progress)),
            _ => None,
        };
        HarnessSnapshot {
            status_text: derive_status_text(&state),
            tone,
            pulses: tone.pulses(),
            actions: derive_available_actions(&state),
            transfer_text: transfer,
            logs: self.logs.all(),
            app_version: self.app_version.clone(),
            auto_check: self.auto_check,
            state,
        }
    }

    fn on_event(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::UpdateState(next) => {
                let appended = self.machine.apply_event(next, &mut self.logs).cloned();
                self.publish(HarnessNotice::StateChanged(
                    self.machine.current_state().clone(),
                ));
                if let Some(entry) = appended {
                    self.publish(HarnessNotice::LogAppended(entry));
                }
            }
            BridgeEvent::Log(entry) => {
                let stored = self.logs.append(entry).clone();
                self.publish(HarnessNotice::LogAppended(stored));
            }
            BridgeEvent::AppVersion(version) => {
                let version = version.trim();
                if version.is_empty() {
                    tracing::warn!("empty_app_version_ignored");
                    return;
                }
                self.app_version = version.to_string();
                self.publish(HarnessNotice::AppVersion(self.app_version.clone()));
            }
        }
    }

    fn on_action(&mut self, action: UserAction) {
        match action {
            UserAction::CheckForUpdates => self.forward(
                UpdateAction::Check,
                "Manual update check initiated",
                UpdaterCommand::CheckForUpdates,
            ),
            UserAction::DownloadUpdate => self.forward(
                UpdateAction::Download,
                "Starting download...",
                UpdaterCommand::DownloadUpdate,
            ),
            UserAction::InstallUpdate => self.forward(
                UpdateAction::Install,
                "Installing update and restarting...",
                UpdaterCommand::InstallUpdate,
            ),
            UserAction::ToggleAutoCheck(enabled) => self.set_auto_check(enabled),
            UserAction::ClearLogs => {
                let entry = self.logs.clear().clone();
                self.publish(HarnessNotice::LogsCleared);
                self.publish(HarnessNotice::LogAppended(entry));
            }
        }
    }

    fn on_tick(&mut self, timer: TimerHandle) {
        // Ticks queued before the timer was disabled or replaced are dropped here.
        if !self.scheduler.is_active(timer) {
            tracing::debug!("stale_auto_check_tick_dropped");
            return;
        }
        self.log(LogLevel::Info, "Auto-checking for updates...");
        self.send(UpdaterCommand::CheckForUpdates);
    }

    fn forward(&mut self, action: UpdateAction, message: &str, command: UpdaterCommand) {
        let state = self.machine.current_state();
        if !derive_available_actions(state).contains(action) {
            let message = format!(
                "{} is not available while {}",
                action.label(),
                state.label()
            );
            self.log(LogLevel::Warn, message);
            return;
        }
        self.log(LogLevel::Info, message);
        self.send(command);
    }

    fn set_auto_check(&mut self, enabled: bool) {
        self.scheduler.disable_active();
        if enabled {
            let inbox = self.inbox.clone();
            self.scheduler.enable(self.interval, move |timer| match inbox.upgrade() {
                Some(tx) => tx.send(HarnessInput::AutoCheckTick(timer)).is_ok(),
                None => false,
            });
        }
        if self.auto_check != enabled {
            tracing::info!(enabled, "auto_check_toggled");
        }
        self.auto_check = enabled;
        self.publish(HarnessNotice::AutoCheckChanged(enabled));
    }

    fn send(&mut self, command: UpdaterCommand) {
        if let Err(e) = self.backend.send(command) {
            tracing::error!("updater_command_failed: {} ({})", command, e);
            self.log(LogLevel::Error, format!("Failed to send {command}: {e}"));
        }
    }

    fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let entry = self.logs.append_synthesized(level, message, None).clone();
        self.publish(HarnessNotice::LogAppended(entry));
    }

    fn publish(&self, notice: HarnessNotice) {
        // No subscribers is fine; the snapshot is always authoritative.
        let _ = self.notices.send(notice);
    }
}

/// Starts the harness with the configured updater process, or an offline backend when none is
/// configured or it fails to launch. Dropping every returned handle stops the harness and kills
/// the process. Must be called from within a tokio runtime.
pub fn launch(settings: &HarnessSettings) -> HarnessHandle {
    let (handle, inbox) = HarnessHandle::channel();

    let sink = handle.event_sink();
    let backend: Box<dyn UpdaterBackend> = match ProcessUpdater::spawn(
        &settings.updater_command,
        &settings.updater_args,
        move |event| sink.deliver(event),
    ) {
        Ok(updater) => Box::new(updater),
        Err(e) => {
            tracing::warn!("updater_offline: {}", e);
            Box::new(OfflineUpdater::new(e.to_string()))
        }
    };

    let harness = Harness::new(backend, settings, &handle);
    tokio::spawn(harness.run(inbox));
    handle
}
