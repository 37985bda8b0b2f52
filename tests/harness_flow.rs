use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use updater_harness::bridge::{wire, StreamUpdater};
use updater_harness::{
    BridgeEvent, Harness, HarnessHandle, HarnessNotice, HarnessSettings, LogEntry, LogLevel,
    UpdateInfo, UpdateState, UpdaterCommand,
};

fn spawn_with_channel(
    settings: HarnessSettings,
) -> (HarnessHandle, mpsc::UnboundedReceiver<UpdaterCommand>) {
    let (handle, inbox) = HarnessHandle::channel();
    let (tx, commands) = mpsc::unbounded_channel();
    tokio::spawn(Harness::new(tx, &settings, &handle).run(inbox));
    (handle, commands)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<UpdaterCommand>) -> Vec<UpdaterCommand> {
    let mut out = vec![];
    while let Ok(c) = rx.try_recv() {
        out.push(c);
    }
    out
}

fn count(snapshot_logs: &[LogEntry], message: &str) -> usize {
    snapshot_logs
        .iter()
        .filter(|e| e.message() == message)
        .count()
}

async fn wait_for_state(notices: &mut broadcast::Receiver<HarnessNotice>, label: &str) {
    let wait = async {
        loop {
            match notices.recv().await {
                Ok(HarnessNotice::StateChanged(state)) if state.label() == label => return,
                Ok(_) => continue,
                Err(e) => panic!("notice stream ended: {e}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("state notice");
}

#[tokio::test]
async fn available_update_scenario() {
    let (handle, mut commands) = spawn_with_channel(HarnessSettings::default());

    handle
        .deliver(BridgeEvent::UpdateState(UpdateState::Checking))
        .unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(
        snapshot.logs.last().map(|e| e.message()),
        Some("Checking for updates...")
    );

    handle
        .deliver(BridgeEvent::UpdateState(UpdateState::UpdateAvailable {
            info: UpdateInfo::new("2.0.0"),
        }))
        .unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.actions.download);
    assert_eq!(
        snapshot.logs.last().map(|e| e.message()),
        Some("Update available: v2.0.0")
    );

    handle.download_update().unwrap();
    let _ = handle.snapshot().await.unwrap();
    assert_eq!(
        drain(&mut commands),
        vec![UpdaterCommand::GetAppVersion, UpdaterCommand::DownloadUpdate]
    );
}

#[tokio::test]
async fn error_surfaces_message_verbatim() {
    let (handle, _commands) = spawn_with_channel(HarnessSettings::default());
    handle
        .deliver(BridgeEvent::UpdateState(UpdateState::Error {
            message: "network timeout".to_string(),
        }))
        .unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state.label(), "error");
    assert!(snapshot.status_text.contains("network timeout"));
    assert_eq!(snapshot.logs.last().map(|e| e.level()), Some(LogLevel::Error));
    assert!(snapshot.actions.check);
}

#[tokio::test]
async fn external_logs_are_bounded_and_ordered() {
    let (handle, _commands) = spawn_with_channel(HarnessSettings::default());
    for i in 0..150 {
        let entry = LogEntry::new(LogLevel::Info, format!("external {i}")).with_id(format!("ext-{i}"));
        handle.deliver(BridgeEvent::Log(entry)).unwrap();
    }
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.logs.len(), 100);
    let messages: Vec<&str> = snapshot.logs.iter().map(|e| e.message()).collect();
    let expected: Vec<String> = (50..150).map(|i| format!("external {i}")).collect();
    assert_eq!(messages, expected);

    handle.clear_logs().unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.logs.len(), 1);
    assert_eq!(snapshot.logs[0].message(), "Logs cleared");
}

#[tokio::test(start_paused = true)]
async fn auto_check_runs_through_the_queue_and_stops_on_toggle() {
    let settings = HarnessSettings {
        auto_check: true,
        ..HarnessSettings::default()
    };
    let (handle, mut commands) = spawn_with_channel(settings);

    tokio::time::sleep(Duration::from_secs(61)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.auto_check);
    assert_eq!(count(&snapshot.logs, "Auto-checking for updates..."), 2);
    assert_eq!(
        drain(&mut commands),
        vec![
            UpdaterCommand::GetAppVersion,
            UpdaterCommand::CheckForUpdates,
            UpdaterCommand::CheckForUpdates,
        ]
    );

    handle.toggle_auto_check(false).unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert!(!snapshot.auto_check);
    assert_eq!(count(&snapshot.logs, "Auto-checking for updates..."), 2);
    assert!(drain(&mut commands).is_empty());
}

#[tokio::test(start_paused = true)]
async fn toggling_on_twice_does_not_double_ticks() {
    let (handle, mut commands) = spawn_with_channel(HarnessSettings::default());
    handle.toggle_auto_check(true).unwrap();
    handle.toggle_auto_check(true).unwrap();

    tokio::time::sleep(Duration::from_secs(31)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(count(&snapshot.logs, "Auto-checking for updates..."), 1);
    assert_eq!(
        drain(&mut commands),
        vec![UpdaterCommand::GetAppVersion, UpdaterCommand::CheckForUpdates]
    );
}

#[tokio::test]
async fn bridge_round_trip_over_a_stream() {
    let (harness_side, updater_side) = tokio::io::duplex(4096);
    let (harness_read, harness_write) = tokio::io::split(harness_side);

    let (handle, inbox) = HarnessHandle::channel();
    let mut notices = handle.subscribe();
    let sink = handle.event_sink();
    let backend = StreamUpdater::attach(harness_read, harness_write, move |e| sink.deliver(e));
    tokio::spawn(Harness::new(backend, &HarnessSettings::default(), &handle).run(inbox));

    // Fake updater: answers the version query, then reacts to a check.
    let (updater_read, mut updater_write) = tokio::io::split(updater_side);
    let fake = tokio::spawn(async move {
        let mut lines = BufReader::new(updater_read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let replies = match wire::decode_command(&line).unwrap() {
                UpdaterCommand::GetAppVersion => vec![
                    "garbage that must be skipped".to_string(),
                    wire::encode_event(&BridgeEvent::AppVersion("3.1.4".to_string())),
                ],
                UpdaterCommand::CheckForUpdates => vec![
                    wire::encode_event(&BridgeEvent::UpdateState(UpdateState::Checking)),
                    r#"{"channel":"log","payload":{"level":"warn","message":"mirror slow"}}"#
                        .to_string(),
                    r#"{"channel":"update-state","payload":{"type":"downloading"}}"#.to_string(),
                ],
                _ => vec![],
            };
            for reply in replies {
                updater_write.write_all(reply.as_bytes()).await.unwrap();
                updater_write.write_all(b"\n").await.unwrap();
            }
        }
    });

    handle.check_for_updates().unwrap();
    wait_for_state(&mut notices, "downloading").await;

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.app_version, "3.1.4");
    assert_eq!(snapshot.status_text, "Preparing download...");
    let messages: Vec<&str> = snapshot.logs.iter().map(|e| e.message()).collect();
    assert_eq!(
        messages,
        vec![
            "Application started",
            "Manual update check initiated",
            "Checking for updates...",
            "mirror slow",
        ]
    );

    handle.shutdown().unwrap();
    drop(handle);
    fake.abort();
}

#[tokio::test]
async fn dropping_every_handle_stops_the_harness() {
    // The updater side stays open, so the event pump is still waiting for input.
    let (harness_side, _updater_side) = tokio::io::duplex(4096);
    let (harness_read, harness_write) = tokio::io::split(harness_side);

    let (handle, inbox) = HarnessHandle::channel();
    let sink = handle.event_sink();
    let backend = StreamUpdater::attach(harness_read, harness_write, move |e| sink.deliver(e));
    let task = tokio::spawn(Harness::new(backend, &HarnessSettings::default(), &handle).run(inbox));

    drop(handle);
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("harness stopped")
        .unwrap();
}

#[test]
fn event_sink_rejects_events_after_harness_stops() {
    let (handle, inbox) = HarnessHandle::channel();
    let sink = handle.event_sink();
    drop(handle);
    drop(inbox);
    assert!(matches!(
        sink.deliver(BridgeEvent::UpdateState(UpdateState::Checking)),
        Err(updater_harness::Error::HarnessClosed)
    ));
}
