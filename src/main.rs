#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod commands;

use tauri::{Manager, WindowEvent};
use tracing_subscriber::EnvFilter;
use updater_harness::{config, HarnessHandle, HarnessSettings};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tauri::Builder::default()
        .on_window_event(|window, event| {
            if window.label() != "main" {
                return;
            }
            // Closing the main window tears the harness down, cancelling any auto-check timer.
            if let WindowEvent::Destroyed = event {
                if let Some(handle) = window.try_state::<HarnessHandle>() {
                    let _ = handle.shutdown();
                }
            }
        })
        .invoke_handler(tauri::generate_handler![
            commands::update::get_snapshot,
            commands::update::check_for_updates,
            commands::update::download_update,
            commands::update::install_update,
            commands::update::toggle_auto_check,
            commands::update::get_app_version,
            commands::logs::get_logs,
            commands::logs::clear_logs
        ])
        .setup(|app| {
            let cfg = config::load_config();
            let settings = HarnessSettings::from_config(&cfg);
            tracing::info!(
                auto_check = settings.auto_check,
                interval_secs = settings.auto_check_interval.as_secs(),
                "harness_settings_loaded"
            );

            let handle = tauri::async_runtime::block_on(async { updater_harness::launch(&settings) });
            commands::start_event_forwarding(app.handle().clone(), &handle);
            app.manage(handle);
            Ok(())
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
