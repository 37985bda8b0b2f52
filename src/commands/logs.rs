use super::*;

#[tauri::command]
pub async fn get_logs(state: tauri::State<'_, HarnessHandle>) -> Result<Vec<LogEntry>> {
    Ok(state.snapshot().await?.logs)
}

#[tauri::command]
pub fn clear_logs(state: tauri::State<'_, HarnessHandle>) -> Result<()> {
    state.clear_logs()
}
