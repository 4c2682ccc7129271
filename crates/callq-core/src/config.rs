use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// HTTP transport parameters (`[transport]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Base URL that relative call URLs (e.g. "/save") are joined onto.
    pub base_url: Option<String>,
    /// Seconds allowed for establishing a connection.
    pub connect_timeout_secs: u64,
    /// Seconds allowed for a whole transfer. Socket-level only; the scheduler
    /// itself never times calls out.
    pub timeout_secs: u64,
    /// Maximum redirects followed per call.
    pub max_redirections: u32,
    /// Optional User-Agent header.
    pub user_agent: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            connect_timeout_secs: 15,
            timeout_secs: 30,
            max_redirections: 10,
            user_agent: None,
        }
    }
}

/// Global configuration loaded from `~/.config/callq/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallqConfig {
    /// Start services with the read-only gate closed (only read-only calls run).
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub transport: TransportConfig,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("callq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<CallqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = CallqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}

/// Load configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<CallqConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: CallqConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = CallqConfig::default();
        assert!(!cfg.read_only);
        assert!(cfg.transport.base_url.is_none());
        assert_eq!(cfg.transport.connect_timeout_secs, 15);
        assert_eq!(cfg.transport.timeout_secs, 30);
        assert_eq!(cfg.transport.max_redirections, 10);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = CallqConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: CallqConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.read_only, cfg.read_only);
        assert_eq!(
            parsed.transport.connect_timeout_secs,
            cfg.transport.connect_timeout_secs
        );
        assert_eq!(parsed.transport.timeout_secs, cfg.transport.timeout_secs);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: CallqConfig = toml::from_str("").unwrap();
        assert!(!cfg.read_only);
        assert_eq!(cfg.transport.max_redirections, 10);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            read_only = true

            [transport]
            base_url = "http://127.0.0.1:8080/"
            timeout_secs = 5
            user_agent = "callq-test"
        "#;
        let cfg: CallqConfig = toml::from_str(toml).unwrap();
        assert!(cfg.read_only);
        assert_eq!(
            cfg.transport.base_url.as_deref(),
            Some("http://127.0.0.1:8080/")
        );
        assert_eq!(cfg.transport.timeout_secs, 5);
        assert_eq!(cfg.transport.connect_timeout_secs, 15);
        assert_eq!(cfg.transport.user_agent.as_deref(), Some("callq-test"));
    }

    #[test]
    fn load_from_path_reads_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        fs::write(f.path(), "read_only = true\n").unwrap();
        let cfg = load_from_path(f.path()).unwrap();
        assert!(cfg.read_only);
    }

    #[test]
    fn load_from_path_reports_parse_errors() {
        let f = tempfile::NamedTempFile::new().unwrap();
        fs::write(f.path(), "read_only = \"maybe\"\n").unwrap();
        let err = load_from_path(f.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parse config"));
    }
}
