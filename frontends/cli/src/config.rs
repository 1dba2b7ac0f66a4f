use anyhow::Result;
use portal_navigation::TransitionTiming;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV_VAR: &str = "PORTAL_CONFIG";
pub const API_KEY_ENV_VAR: &str = "PORTAL_FIREBASE_API_KEY";

/// Portal configuration, loaded from YAML
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    pub firebase: FirebaseConfig,
    #[serde(default)]
    pub oauth: Option<OAuthConfig>,
    #[serde(default)]
    pub transition: TransitionConfig,
    /// Frames rendered per second by the host loop
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub project_id: String,
    #[serde(default = "default_database")]
    pub database: String,
    /// Overrides for emulators
    #[serde(default)]
    pub identity_endpoint: Option<String>,
    #[serde(default)]
    pub firestore_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TransitionConfig {
    #[serde(default = "default_fade_ms")]
    pub fade_ms: u64,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            fade_ms: default_fade_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl TransitionConfig {
    pub fn timing(&self) -> TransitionTiming {
        TransitionTiming {
            fade: Duration::from_millis(self.fade_ms),
            settle: Duration::from_millis(self.settle_ms),
        }
    }
}

fn default_frame_rate() -> u32 {
    30
}

fn default_database() -> String {
    portal_firestore::client::DEFAULT_DATABASE.to_string()
}

fn default_scopes() -> Vec<String> {
    vec![
        "openid".to_string(),
        "email".to_string(),
        "profile".to_string(),
    ]
}

fn default_fade_ms() -> u64 {
    500
}

fn default_settle_ms() -> u64 {
    1000
}

impl PortalConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        Self::from_yaml_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config YAML {}: {}", path.display(), e))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let mut config: PortalConfig = serde_yaml::from_str(content)?;
        if config.frame_rate == 0 {
            anyhow::bail!("frame_rate must be at least 1");
        }
        config.apply_env_overrides(std::env::var(API_KEY_ENV_VAR).ok());
        Ok(config)
    }

    /// Environment wins over the file for secrets
    pub fn apply_env_overrides(&mut self, api_key: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            self.firebase.api_key = key;
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate
    }

    pub fn firestore(&self) -> portal_firestore::FirestoreConfig {
        let mut config = portal_firestore::FirestoreConfig::new(self.firebase.project_id.as_str());
        config.database = self.firebase.database.clone();
        if let Some(endpoint) = &self.firebase.firestore_endpoint {
            config.endpoint = endpoint.clone();
        }
        config
    }

    pub fn auth(&self) -> portal_firestore::AuthConfig {
        let mut config = portal_firestore::AuthConfig::new(self.firebase.api_key.as_str());
        if let Some(endpoint) = &self.firebase.identity_endpoint {
            config.endpoint = endpoint.clone();
        }
        config
    }
}

/// `--config` path, then `$PORTAL_CONFIG`, then `~/.config/portal/config.yaml`
/// if it exists.
pub fn resolve_config_path(cli_path: Option<PathBuf>) -> Option<PathBuf> {
    if cli_path.is_some() {
        return cli_path;
    }
    if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(env_path));
    }
    let home = std::env::var_os("HOME")?;
    let mut default_path = PathBuf::from(home);
    default_path.push(".config");
    default_path.push("portal");
    default_path.push("config.yaml");
    default_path.exists().then_some(default_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
firebase:
  api_key: "key-from-file"
  project_id: "campus"
"#;

    #[test]
    fn test_defaults() {
        let config: PortalConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.firebase.database, "(default)");
        assert_eq!(config.frame_rate, 30);
        assert!(config.oauth.is_none());
        assert_eq!(config.transition.timing(), TransitionTiming::default());
    }

    #[test]
    fn test_full_config() {
        let config: PortalConfig = serde_yaml::from_str(
            r#"
firebase:
  api_key: "k"
  project_id: "campus"
  firestore_endpoint: "http://localhost:8080/v1"
oauth:
  client_id: "client-1"
  redirect_uri: "http://localhost:3000"
transition:
  fade_ms: 200
frame_rate: 60
"#,
        )
        .unwrap();
        assert_eq!(config.transition.fade_ms, 200);
        assert_eq!(config.transition.settle_ms, 1000);
        assert_eq!(config.oauth.as_ref().unwrap().scopes, vec!["openid", "email", "profile"]);
        assert_eq!(
            config.firestore().endpoint,
            "http://localhost:8080/v1".to_string()
        );
        assert_eq!(config.frame_rate, 60);
    }

    #[test]
    fn test_env_api_key_overrides_file() {
        let mut config: PortalConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.apply_env_overrides(Some("key-from-env".to_string()));
        assert_eq!(config.firebase.api_key, "key-from-env");
        config.apply_env_overrides(Some(String::new()));
        assert_eq!(config.firebase.api_key, "key-from-env");
    }

    #[test]
    fn test_zero_frame_rate_rejected() {
        let yaml = format!("{}frame_rate: 0\n", MINIMAL);
        assert!(PortalConfig::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_cli_path_wins() {
        let path = PathBuf::from("/tmp/portal.yaml");
        assert_eq!(resolve_config_path(Some(path.clone())), Some(path));
    }
}
