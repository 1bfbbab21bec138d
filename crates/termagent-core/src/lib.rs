use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub type Result<T> = anyhow::Result<T>;

/// Marker that prefixes every event line in a `/api/stream` response body.
pub const STREAM_EVENT_MARKER: &str = "data:";

pub const DEFAULT_GREETING: &str = "Conversation history cleared. How can I help you today?";

pub fn runtime_dir(workspace: &Path) -> PathBuf {
    workspace.join(".termagent")
}

/// One event decoded from a `data: <json>` line of the stream body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// A chunk of AI output, appended to the open AI entry.
    Message {
        #[serde(default)]
        content: String,
    },
    /// A server-side failure reported inside an otherwise successful stream.
    Error {
        #[serde(default)]
        content: String,
    },
    /// Terminal marker. Carries no payload and has no visible effect.
    End,
}

/// Callback type for receiving decoded stream events in arrival order.
pub type StreamCallback = std::sync::Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// Body of `POST /api/stream` and `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

/// Decoded `/api/status` body. Every field is optional; any successful
/// response counts as "online".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerStatus {
    pub status: Option<String>,
    pub model: Option<String>,
    pub message: Option<String>,
}

/// Lifecycle of the single outstanding request a UI controller may own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    #[default]
    Idle,
    /// The request was issued and no event has arrived yet.
    Sending,
    /// At least one event of the response body has been received.
    Streaming,
}

impl RequestState {
    pub fn is_busy(self) -> bool {
        !matches!(self, Self::Idle)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::Streaming => "streaming",
        }
    }
}

pub fn is_valid_request_state_transition(from: RequestState, to: RequestState) -> bool {
    if from == to {
        return true;
    }
    match from {
        RequestState::Idle => matches!(to, RequestState::Sending),
        RequestState::Sending => matches!(to, RequestState::Streaming | RequestState::Idle),
        RequestState::Streaming => matches!(to, RequestState::Idle),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ui: UiConfig,
    pub theme: ThemeConfig,
}

impl AppConfig {
    pub fn user_settings_path() -> Option<PathBuf> {
        let home = std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())?;
        Some(Path::new(&home).join(".termagent/settings.json"))
    }

    pub fn project_settings_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("settings.json")
    }

    pub fn project_local_settings_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("settings.local.json")
    }

    pub fn keybindings_path() -> Option<PathBuf> {
        let home = std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())?;
        Some(Path::new(&home).join(".termagent/keybindings.json"))
    }

    pub fn legacy_toml_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("config.toml")
    }

    /// Merge defaults, the legacy TOML file, user settings, project settings
    /// and project-local settings, in that order. Later layers win per key.
    pub fn load(workspace: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        if let Some(user) = Self::user_settings_path() {
            paths.push(user);
        }
        paths.push(Self::project_settings_path(workspace));
        paths.push(Self::project_local_settings_path(workspace));
        Self::load_layers(workspace, &paths)
    }

    fn load_layers(workspace: &Path, paths: &[PathBuf]) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;

        let legacy = Self::legacy_toml_path(workspace);
        if legacy.exists() {
            let raw = fs::read_to_string(legacy)?;
            let legacy_cfg: AppConfig = toml::from_str(&raw)?;
            merge_json_value(&mut merged, &serde_json::to_value(legacy_cfg)?);
        }

        for path in paths {
            if !path.exists() {
                continue;
            }
            let raw = fs::read_to_string(path)?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            merge_json_value(&mut merged, &value);
        }

        Ok(serde_json::from_value(merged)?)
    }

    pub fn save(&self, workspace: &Path) -> Result<()> {
        let path = Self::project_settings_path(workspace);
        fs::create_dir_all(
            path.parent()
                .ok_or_else(|| anyhow::anyhow!("invalid config path"))?,
        )?;
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

fn merge_json_value(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_obj), serde_json::Value::Object(overlay_obj)) => {
            for (key, overlay_value) in overlay_obj {
                if let Some(base_value) = base_obj.get_mut(key) {
                    merge_json_value(base_value, overlay_value);
                } else {
                    base_obj.insert(key.clone(), overlay_value.clone());
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    /// Environment variable that overrides `base_url` when set and non-empty.
    pub base_url_env: String,
    pub timeout_seconds: u64,
    /// Longest message (in chars) the client will submit. The server rejects
    /// longer ones with HTTP 400.
    pub max_message_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            base_url_env: "TERMAGENT_URL".to_string(),
            timeout_seconds: 300,
            max_message_length: 1000,
        }
    }
}

impl ServerConfig {
    pub fn resolve_base_url(&self) -> String {
        std::env::var(&self.base_url_env)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.base_url.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub keybindings_path: String,
    /// Entry shown after history is cleared.
    pub greeting: String,
    pub reduced_motion: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            keybindings_path: "~/.termagent/keybindings.json".to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            reduced_motion: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub primary: String,
    pub secondary: String,
    pub error: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            primary: "Cyan".to_string(),
            secondary: "Green".to_string(),
            error: "Red".to_string(),
        }
    }
}
