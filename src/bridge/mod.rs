use crate::error::{Error, Result};
use crate::logs::LogEntry;
use crate::state::UpdateState;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;

pub(crate) mod process;
pub mod wire;

pub use process::ProcessUpdater;

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    UpdateState(UpdateState),
    Log(LogEntry),
    AppVersion(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdaterCommand {
    CheckForUpdates,
    DownloadUpdate,
    InstallUpdate,
    GetAppVersion,
}

impl UpdaterCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckForUpdates => "check-for-updates",
            Self::DownloadUpdate => "download-update",
            Self::InstallUpdate => "install-update",
            Self::GetAppVersion => "get-app-version",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "check-for-updates" => Ok(Self::CheckForUpdates),
            "download-update" => Ok(Self::DownloadUpdate),
            "install-update" => Ok(Self::InstallUpdate),
            "get-app-version" => Ok(Self::GetAppVersion),
            other => Err(Error::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for UpdaterCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command side of the bridge. Sending never blocks and never waits for a reply; outcomes are
/// observed only as later [`BridgeEvent`]s.
pub trait UpdaterBackend: Send + 'static {
    fn send(&self, command: UpdaterCommand) -> Result<()>;
}

impl UpdaterBackend for Box<dyn UpdaterBackend> {
    fn send(&self, command: UpdaterCommand) -> Result<()> {
        (**self).send(command)
    }
}

impl UpdaterBackend for mpsc::UnboundedSender<UpdaterCommand> {
    fn send(&self, command: UpdaterCommand) -> Result<()> {
        mpsc::UnboundedSender::send(self, command).map_err(|_| Error::BridgeClosed)
    }
}

#[derive(Debug, Clone)]
pub struct OfflineUpdater {
    reason: String,
}

impl OfflineUpdater {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl UpdaterBackend for OfflineUpdater {
    fn send(&self, _command: UpdaterCommand) -> Result<()> {
        Err(Error::UpdaterUnavailable(self.reason.clone()))
    }
}

#[derive(Debug, Clone)]
pub struct StreamUpdater {
    commands: mpsc::UnboundedSender<UpdaterCommand>,
}

impl StreamUpdater {
    pub fn attach<R, W, F>(reader: R, writer: W, on_event: F) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
        F: FnMut(BridgeEvent) -> Result<()> + Send + 'static,
    {
        let (commands, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            if let Err(e) = wire::pump_commands(writer, rx).await {
                tracing::warn!("updater_command_stream_closed: {}", e);
            }
        });

        tokio::spawn(async move {
            match wire::pump_events(BufReader::new(reader), on_event).await {
                Ok(()) => tracing::info!("updater_event_stream_ended"),
                Err(e) => tracing::warn!("updater_event_stream_failed: {}", e),
            }
        });

        Self { commands }
    }
}

impl UpdaterBackend for StreamUpdater {
    fn send(&self, command: UpdaterCommand) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::BridgeClosed)
    }
}
