use chrono::Local;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub fn now_display_time() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_millis() as i64
}
