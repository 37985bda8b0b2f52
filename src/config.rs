use crate::error::{Error, Result};
use crate::logs::LOG_CAPACITY;
use crate::scheduler::DEFAULT_AUTO_CHECK_INTERVAL;
use directories::ProjectDirs;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_LOG_CAPACITY: usize = 10_000;

fn exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
}

fn portable_data_dir() -> Option<PathBuf> {
    // Opt-in portable mode: a `user-data/` folder next to the executable, or forced via env var.
    if std::env::var("UPDATER_HARNESS_PORTABLE").ok().as_deref() == Some("1") {
        return exe_dir().map(|dir| dir.join("user-data"));
    }

    exe_dir()
        .map(|dir| dir.join("user-data"))
        .filter(|p| p.exists())
}

pub fn app_root_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var("UPDATER_HARNESS_DATA_DIR") {
        let trimmed = override_dir.trim().to_string();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    if let Some(dir) = portable_data_dir() {
        return dir;
    }

    // macOS: ~/Library/Application Support/<app>/
    // Linux: ~/.local/share/<app>/
    ProjectDirs::from("com", "updater-harness", "UpdaterHarness")
        .map(|p| p.data_local_dir().to_path_buf())
        .unwrap_or_else(|| {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("user-data")
        })
}

pub fn config_path() -> PathBuf {
    app_root_dir().join("config.json")
}

pub fn load_config() -> Value {
    load_config_at(&config_path())
}

/// Reads the config file merged over the defaults. A missing file is created with the defaults;
/// an unreadable one is ignored in favor of them.
pub fn load_config_at(path: &Path) -> Value {
    let text = fs::read_to_string(path).unwrap_or_default();
    let parsed: Value = serde_json::from_str(&text).unwrap_or_else(|_| json!({}));
    let merged = merge_objects(default_config(), parsed);

    if !path.exists() {
        if let Err(e) = save_config_at(path, &merged) {
            tracing::warn!("failed_to_write_default_config: {}", e);
        }
    }
    merged
}

pub fn save_config(value: &Value) -> Result<()> {
    save_config_at(&config_path(), value)
}

pub fn save_config_at(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension(format!("tmp-{}", std::process::id()));
    fs::write(&tmp, text)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn merge_objects(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut b), Value::Object(o)) => {
            for (k, v) in o {
                b.insert(k, v);
            }
            Value::Object(b)
        }
        (b, _) => b,
    }
}

pub fn get_str(cfg: &Value, key: &str) -> String {
    cfg.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string()
}

pub fn get_bool(cfg: &Value, key: &str, fallback: bool) -> bool {
    cfg.get(key).and_then(|v| v.as_bool()).unwrap_or(fallback)
}

pub fn get_u64(cfg: &Value, key: &str, fallback: u64) -> u64 {
    cfg.get(key).and_then(|v| v.as_u64()).unwrap_or(fallback)
}

pub fn get_str_list(cfg: &Value, key: &str) -> Vec<String> {
    cfg.get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn set_bool(cfg: &mut Value, key: &str, value: bool) -> Result<()> {
    let obj = cfg
        .as_object_mut()
        .ok_or_else(|| Error::Config("root is not an object".to_string()))?;
    obj.insert(key.to_string(), Value::Bool(value));
    Ok(())
}

fn default_config() -> Value {
    let mut base = Map::<String, Value>::new();
    base.insert("schema_version".to_string(), Value::Number(1.into()));
    base.insert("auto_check".to_string(), Value::Bool(false));
    base.insert(
        "auto_check_interval_secs".to_string(),
        Value::Number(DEFAULT_AUTO_CHECK_INTERVAL.as_secs().into()),
    );
    base.insert(
        "log_capacity".to_string(),
        Value::Number((LOG_CAPACITY as u64).into()),
    );
    // Program implementing the updater side of the bridge (NDJSON over stdin/stdout).
    base.insert("updater_command".to_string(), Value::String("".to_string()));
    base.insert("updater_args".to_string(), json!([]));
    Value::Object(base)
}

#[derive(Debug, Clone, PartialEq)]
pub struct HarnessSettings {
    pub auto_check: bool,
    pub auto_check_interval: Duration,
    pub log_capacity: usize,
    pub updater_command: String,
    pub updater_args: Vec<String>,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            auto_check: false,
            auto_check_interval: DEFAULT_AUTO_CHECK_INTERVAL,
            log_capacity: LOG_CAPACITY,
            updater_command: String::new(),
            updater_args: vec![],
        }
    }
}

impl HarnessSettings {
    pub fn from_config(cfg: &Value) -> Self {
        let defaults = Self::default();
        let interval_secs = get_u64(
            cfg,
            "auto_check_interval_secs",
            defaults.auto_check_interval.as_secs(),
        )
        .max(1);
        let log_capacity = get_u64(cfg, "log_capacity", defaults.log_capacity as u64)
            .clamp(1, MAX_LOG_CAPACITY as u64) as usize;
        Self {
            auto_check: get_bool(cfg, "auto_check", defaults.auto_check),
            auto_check_interval: Duration::from_secs(interval_secs),
            log_capacity,
            updater_command: get_str(cfg, "updater_command"),
            updater_args: get_str_list(cfg, "updater_args"),
        }
    }
}
