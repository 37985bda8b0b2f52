//! Newline-delimited JSON spoken with the updater process.
//!
//! Commands: `{"command": "check-for-updates"}`.
//! Events: `{"channel": "update-state" | "log" | "app-version", "payload": ...}`.

use super::{BridgeEvent, UpdaterCommand};
use crate::error::{Error, Result};
use crate::logs::LogEntry;
use crate::state::UpdateState;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

pub const CHANNEL_UPDATE_STATE: &str = "update-state";
pub const CHANNEL_LOG: &str = "log";
pub const CHANNEL_APP_VERSION: &str = "app-version";

pub fn encode_command(command: UpdaterCommand) -> String {
    json!({ "command": command.as_str() }).to_string()
}

pub fn decode_command(line: &str) -> Result<UpdaterCommand> {
    let value: Value = serde_json::from_str(line.trim())?;
    let name = value
        .get("command")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::MalformedMessage("missing command".to_string()))?;
    UpdaterCommand::parse(name)
}

pub fn encode_event(event: &BridgeEvent) -> String {
    let (channel, payload) = match event {
        BridgeEvent::UpdateState(state) => (CHANNEL_UPDATE_STATE, json!(state)),
        BridgeEvent::Log(entry) => (CHANNEL_LOG, json!(entry)),
        BridgeEvent::AppVersion(version) => (CHANNEL_APP_VERSION, json!(version)),
    };
    json!({ "channel": channel, "payload": payload }).to_string()
}

pub fn decode_event(line: &str) -> Result<BridgeEvent> {
    let value: Value = serde_json::from_str(line.trim())?;
    let channel = value
        .get("channel")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::MalformedMessage("missing channel".to_string()))?;
    let payload = value.get("payload").unwrap_or(&Value::Null);
    match channel {
        CHANNEL_UPDATE_STATE => UpdateState::from_payload(payload)
            .map(BridgeEvent::UpdateState)
            .ok_or_else(|| Error::MalformedMessage(format!("unrecognized update state: {payload}"))),
        CHANNEL_LOG => LogEntry::from_payload(payload)
            .map(BridgeEvent::Log)
            .ok_or_else(|| Error::MalformedMessage("log entry without message".to_string())),
        CHANNEL_APP_VERSION => payload
            .as_str()
            .map(|v| BridgeEvent::AppVersion(v.trim().to_string()))
            .ok_or_else(|| Error::MalformedMessage("app version is not a string".to_string())),
        other => Err(Error::MalformedMessage(format!("unknown channel: {other}"))),
    }
}

/// Reads events until EOF or until the sink refuses one.
///
/// Lines that fail to decode are traced and skipped so one bad payload never stops delivery
/// of the ones after it.
pub async fn pump_events<R, F>(reader: R, mut on_event: F) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(BridgeEvent) -> Result<()>,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match decode_event(&line) {
            Ok(event) => on_event(event)?,
            Err(e) => tracing::warn!("malformed_bridge_line: {}", e),
        }
    }
    Ok(())
}

/// Writes queued commands, one per line, until every sender is dropped.
pub async fn pump_commands<W>(
    mut writer: W,
    mut commands: mpsc::UnboundedReceiver<UpdaterCommand>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = commands.recv().await {
        let mut line = encode_command(command);
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
