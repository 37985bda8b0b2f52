use super::*;

#[tauri::command]
pub async fn get_snapshot(state: tauri::State<'_, HarnessHandle>) -> Result<HarnessSnapshot> {
    state.snapshot().await
}

#[tauri::command]
pub fn check_for_updates(state: tauri::State<'_, HarnessHandle>) -> Result<()> {
    state.check_for_updates()
}

#[tauri::command]
pub fn download_update(state: tauri::State<'_, HarnessHandle>) -> Result<()> {
    state.download_update()
}

#[tauri::command]
pub fn install_update(state: tauri::State<'_, HarnessHandle>) -> Result<()> {
    state.install_update()
}

#[tauri::command]
pub fn toggle_auto_check(enabled: bool, state: tauri::State<'_, HarnessHandle>) -> Result<()> {
    state.toggle_auto_check(enabled)?;
    if let Err(e) = persist_auto_check(enabled) {
        tracing::warn!("failed_to_persist_auto_check: {}", e);
    }
    Ok(())
}

#[tauri::command]
pub async fn get_app_version(state: tauri::State<'_, HarnessHandle>) -> Result<String> {
    Ok(state.snapshot().await?.app_version)
}

fn persist_auto_check(enabled: bool) -> Result<()> {
    let mut cfg = config::load_config();
    if config::get_bool(&cfg, "auto_check", !enabled) == enabled {
        return Ok(());
    }
    config::set_bool(&mut cfg, "auto_check", enabled)?;
    config::save_config(&cfg)
}
