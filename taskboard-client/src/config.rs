/// Configuration for the taskboard client.
/// Reads client.json from ~/.config/taskboard/client.json (or platform equivalent).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use taskboard_core::config::ReconcilePolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Actor whose boards are loaded and whose cards are shown.
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub reconcile: ReconcilePolicy,
}

fn default_base_url() -> String {
    "http://localhost:4000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            actor_id: None,
            request_timeout_secs: default_request_timeout_secs(),
            reconcile: ReconcilePolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Default config path: ~/.config/taskboard/client.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskboard")
        .join("client.json")
}

/// Load config from path. Returns default if the file doesn't exist or can't be parsed.
pub fn load_config(path: &Path) -> ClientConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("[taskboard.config] Failed to parse config {}: {}", path.display(), e);
            ClientConfig::default()
        }),
        Err(_) => {
            log::info!("[taskboard.config] No config at {}, using defaults", path.display());
            ClientConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard_core::config::ReconcileMode;
    use taskboard_core::intent::IntentKind;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("client.json"));
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        fs::write(
            &path,
            r#"{
                "actorId": "7",
                "requestTimeoutSecs": 3,
                "reconcile": {"modes": {"move_card": "patch-only"}}
            }"#,
        )
        .unwrap();

        let config = load_config(&path);
        assert_eq!(config.base_url, "http://localhost:4000");
        assert_eq!(config.actor_id.as_deref(), Some("7"));
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert_eq!(
            config.reconcile.mode_for(IntentKind::MoveCard),
            ReconcileMode::PatchOnly
        );
        assert_eq!(
            config.reconcile.mode_for(IntentKind::RenameColumn),
            ReconcileMode::PatchThenRefetch
        );
    }

    #[test]
    fn test_broken_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_config(&path), ClientConfig::default());
    }
}
