use directories::BaseDirs;
use serde::Deserialize;
use std::{env, fs, path::PathBuf, time::Duration};
use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BackendFileConfig {
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub default_model: Option<String>,
}

#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: String,
    /// None leaves timing to the transport.
    pub timeout: Option<Duration>,
    pub default_model: Option<String>,
    pub proxy: Option<String>,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
            default_model: None,
            proxy: None,
        }
    }

    pub fn from_env_and_file() -> anyhow::Result<Self> {
        let mut cfg = Self::new(DEFAULT_BASE_URL);

        if let Some(path) = Self::config_path() {
            if path.exists() {
                let text = fs::read_to_string(&path)?;
                match toml::from_str::<BackendFileConfig>(&text) {
                    Ok(file_cfg) => cfg.apply_file(file_cfg),
                    Err(e) => {
                        warn!(target: "providers::backend", "ignoring {}: {}", path.display(), e)
                    }
                }
            }
        }

        if let Ok(url) = env::var("GEMCHAT_BASE_URL") {
            if !url.trim().is_empty() {
                cfg.base_url = url.trim().to_string();
            }
        }
        cfg.proxy = env::var("HTTPS_PROXY")
            .ok()
            .or_else(|| env::var("HTTP_PROXY").ok());

        Ok(cfg)
    }

    pub fn apply_file(&mut self, file_cfg: BackendFileConfig) {
        if let Some(u) = file_cfg.base_url {
            self.base_url = u;
        }
        if let Some(t) = file_cfg.timeout_ms {
            self.timeout = Some(Duration::from_millis(t));
        }
        if let Some(m) = file_cfg.default_model {
            self.default_model = Some(m);
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        let p = if cfg!(target_os = "windows") {
            base.home_dir().join(".gemchat").join("config.toml")
        } else {
            base.config_dir().join("gemchat").join("config.toml")
        };
        Some(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let mut cfg = BackendConfig::new(DEFAULT_BASE_URL);
        let file: BackendFileConfig = toml::from_str(
            "base_url = \"http://chat.local:9000\"\ntimeout_ms = 1500\ndefault_model = \"gemini-pro\"\n",
        )
        .unwrap();
        cfg.apply_file(file);
        assert_eq!(cfg.base_url, "http://chat.local:9000");
        assert_eq!(cfg.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(cfg.default_model.as_deref(), Some("gemini-pro"));
    }

    #[test]
    fn missing_keys_keep_defaults() {
        let mut cfg = BackendConfig::new(DEFAULT_BASE_URL);
        cfg.apply_file(toml::from_str("").unwrap());
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.timeout, None);
    }
}
