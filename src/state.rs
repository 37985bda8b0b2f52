use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
}

impl UpdateInfo {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            release_name: None,
            release_notes: None,
        }
    }

    fn from_payload(payload: Option<&Value>) -> Self {
        let Some(info) = payload.filter(|v| v.is_object()) else {
            return Self::new("unknown");
        };
        let version = non_empty_str(info, "version").unwrap_or_else(|| "unknown".to_string());
        let release_name = non_empty_str(info, "releaseName");
        let release_notes = match info.get("releaseNotes") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            // Multi-release notes arrive as [{version, note}, ...].
            Some(Value::Array(items)) => {
                let notes: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("note").and_then(|v| v.as_str()))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect();
                if notes.is_empty() {
                    None
                } else {
                    Some(notes.join("\n"))
                }
            }
            _ => None,
        };
        Self {
            version,
            release_name,
            release_notes,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub percent: Option<f64>,
    pub transferred: Option<u64>,
    pub total: Option<u64>,
}

impl DownloadProgress {
    pub fn with_percent(percent: f64) -> Self {
        Self {
            percent: Some(percent),
            ..Self::default()
        }
    }

    fn from_payload(payload: Option<&Value>) -> Self {
        let Some(progress) = payload else {
            return Self::default();
        };
        let percent = progress
            .get("percent")
            .and_then(|v| v.as_f64())
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 100.0));
        let total = progress.get("total").and_then(|v| v.as_u64());
        let transferred = progress
            .get("transferred")
            .and_then(|v| v.as_u64())
            .map(|t| match total {
                Some(total) => t.min(total),
                None => t,
            });
        Self {
            percent,
            transferred,
            total,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UpdateState {
    #[default]
    Idle,
    Checking,
    UpdateAvailable {
        info: UpdateInfo,
    },
    UpdateNotAvailable,
    Downloading {
        progress: DownloadProgress,
    },
    Downloaded {
        #[serde(rename = "filePath")]
        file_path: String,
    },
    Installing,
    Error {
        message: String,
    },
}

impl UpdateState {
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let kind = payload.get("type").and_then(|v| v.as_str())?.trim();
        let state = match kind {
            "idle" => Self::Idle,
            "checking" => Self::Checking,
            "update-available" => Self::UpdateAvailable {
                info: UpdateInfo::from_payload(payload.get("info")),
            },
            "update-not-available" => Self::UpdateNotAvailable,
            "downloading" => Self::Downloading {
                progress: DownloadProgress::from_payload(payload.get("progress")),
            },
            "downloaded" => Self::Downloaded {
                file_path: non_empty_str(payload, "filePath").unwrap_or_default(),
            },
            "installing" => Self::Installing,
            "error" => Self::Error {
                message: error_message(payload),
            },
            _ => return None,
        };
        Some(state)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::UpdateAvailable { .. } => "update-available",
            Self::UpdateNotAvailable => "update-not-available",
            Self::Downloading { .. } => "downloading",
            Self::Downloaded { .. } => "downloaded",
            Self::Installing => "installing",
            Self::Error { .. } => "error",
        }
    }
}

fn non_empty_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn error_message(payload: &Value) -> String {
    ["message", "error"]
        .iter()
        .filter_map(|key| match payload.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Object(obj)) => Some(
                obj.get("message")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| Value::Object(obj.clone()).to_string()),
            ),
            Some(Value::Null) | Some(Value::String(_)) | None => None,
            Some(other) => Some(other.to_string()),
        })
        .next()
        .unwrap_or_else(|| "Unknown error".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateAction {
    Check,
    Download,
    Install,
}

impl UpdateAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Check => "Check for updates",
            Self::Download => "Download",
            Self::Install => "Install",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AvailableActions {
    pub check: bool,
    pub download: bool,
    pub install: bool,
}

impl AvailableActions {
    pub fn contains(&self, action: UpdateAction) -> bool {
        match action {
            UpdateAction::Check => self.check,
            UpdateAction::Download => self.download,
            UpdateAction::Install => self.install,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = UpdateAction> + '_ {
        [
            UpdateAction::Check,
            UpdateAction::Download,
            UpdateAction::Install,
        ]
        .into_iter()
        .filter(move |a| self.contains(*a))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusTone {
    Neutral,
    Busy,
    Success,
    Warning,
    Error,
}

impl StatusTone {
    pub fn pulses(self) -> bool {
        matches!(self, Self::Busy | Self::Warning)
    }
}

pub const PREPARING_DOWNLOAD: &str = "Preparing download...";

pub fn derive_status_text(state: &UpdateState) -> String {
    match state {
        UpdateState::Idle => "Ready to check for updates".to_string(),
        UpdateState::Checking => "Checking for updates...".to_string(),
        UpdateState::UpdateAvailable { info } => match &info.release_name {
            Some(name) => format!("Update Available: v{} ({name})", info.version),
            None => format!("Update Available: v{}", info.version),
        },
        UpdateState::UpdateNotAvailable => "You have the latest version".to_string(),
        UpdateState::Downloading { progress } => match progress.percent {
            Some(percent) => format!("Downloading update... {}", format_percent(percent)),
            None => PREPARING_DOWNLOAD.to_string(),
        },
        UpdateState::Downloaded { .. } => "Update ready to install!".to_string(),
        UpdateState::Installing => "Installing update and restarting...".to_string(),
        UpdateState::Error { message } => format!("Update failed: {message}"),
    }
}

pub fn derive_available_actions(state: &UpdateState) -> AvailableActions {
    AvailableActions {
        check: !matches!(
            state,
            UpdateState::Checking | UpdateState::Downloading { .. }
        ),
        download: matches!(state, UpdateState::UpdateAvailable { .. }),
        install: matches!(state, UpdateState::Downloaded { .. }),
    }
}

pub fn status_tone(state: &UpdateState) -> StatusTone {
    match state {
        UpdateState::Idle | UpdateState::UpdateNotAvailable => StatusTone::Neutral,
        UpdateState::Checking | UpdateState::Downloading { .. } => StatusTone::Busy,
        UpdateState::UpdateAvailable { .. } | UpdateState::Downloaded { .. } => {
            StatusTone::Success
        }
        UpdateState::Installing => StatusTone::Warning,
        UpdateState::Error { .. } => StatusTone::Error,
    }
}

pub fn transfer_text(progress: &DownloadProgress) -> String {
    match (progress.transferred, progress.total) {
        (Some(transferred), Some(total)) if transferred > 0 && total > 0 => {
            format!("{:.1} MB / {:.1} MB", to_mb(transferred), to_mb(total))
        }
        _ => PREPARING_DOWNLOAD.to_string(),
    }
}

pub(crate) fn format_percent(percent: f64) -> String {
    format!("{percent:.1}%")
}

fn to_mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}
