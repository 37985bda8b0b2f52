use super::{BridgeEvent, StreamUpdater, UpdaterBackend, UpdaterCommand};
use crate::error::{Error, Result};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

#[derive(Debug)]
pub struct ProcessUpdater {
    stream: StreamUpdater,
    // Killed on drop.
    _child: Child,
}

impl ProcessUpdater {
    pub fn spawn<F>(program: &str, args: &[String], on_event: F) -> Result<Self>
    where
        F: FnMut(BridgeEvent) -> Result<()> + Send + 'static,
    {
        let program = program.trim();
        if program.is_empty() {
            return Err(Error::UpdaterUnavailable(
                "no updater_command configured".to_string(),
            ));
        }

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::UpdaterUnavailable(format!("failed to start {program}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::UpdaterUnavailable("updater stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::UpdaterUnavailable("updater stdout not captured".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!("updater_stderr: {}", line);
                }
            });
        }

        tracing::info!(pid = ?child.id(), "updater_process_started: {}", program);
        let stream = StreamUpdater::attach(stdout, stdin, on_event);
        Ok(Self {
            stream,
            _child: child,
        })
    }
}

impl UpdaterBackend for ProcessUpdater {
    fn send(&self, command: UpdaterCommand) -> Result<()> {
        self.stream.send(command)
    }
}
