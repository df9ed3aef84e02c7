//! Application configuration loading.
//!
//! Sources, highest priority first:
//! 1. command-line flags (applied by the caller)
//! 2. `config.json` in the config directory
//! 3. process environment
//! 4. `.env` in the config directory (never overrides the process environment)

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use url::Url;

/// Port used when neither the URL nor the config names one.
pub const DEFAULT_DEVICE_PORT: u16 = 8085;

const CONFIG_DIR_NAME: &str = "courier";
const CONFIG_FILE_NAME: &str = "config.json";
const ENV_FILE_NAME: &str = ".env";

/// Catalog credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// MangaDex API key; empty means anonymous.
    pub mangadex_api_key: String,
}

/// Resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Full device URL (takes precedence over `device_ip`).
    pub device_url: String,
    /// Bare device address.
    pub device_ip: String,
    /// Device port; `None` until resolved.
    pub device_port: Option<u16>,
    /// Enable debug logging.
    pub verbose: bool,
    /// Catalog credentials.
    pub providers: ProviderConfig,
}

impl AppConfig {
    /// Parses `config.json` contents.
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Invalid config JSON")
    }

    /// Fills empty fields from `lookup` (environment), then applies defaults.
    pub fn apply_env_defaults(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if self.device_url.is_empty()
            && let Some(value) = get("COURIER_DEVICE_URL")
        {
            self.device_url = value;
        }
        if self.device_ip.is_empty()
            && let Some(value) = get("COURIER_DEVICE_IP")
        {
            self.device_ip = value;
        }
        if self.device_port.is_none() {
            self.device_port = get("COURIER_DEVICE_PORT").and_then(|value| value.parse().ok());
        }
        if !self.verbose
            && let Some(value) = get("COURIER_VERBOSE")
        {
            self.verbose = value == "1" || value.eq_ignore_ascii_case("true");
        }
        if self.providers.mangadex_api_key.is_empty()
            && let Some(value) = get("COURIER_MANGADEX_API_KEY")
        {
            self.providers.mangadex_api_key = value;
        }
        self.device_port.get_or_insert(DEFAULT_DEVICE_PORT);
    }

    /// Returns the MangaDex API key, if any.
    #[must_use]
    pub fn mangadex_api_key(&self) -> Option<String> {
        let key = self.providers.mangadex_api_key.trim();
        (!key.is_empty()).then(|| key.to_string())
    }

    /// Returns the normalized device base URL.
    pub fn device_base_url(&self) -> Result<String> {
        let port = self.device_port.unwrap_or(DEFAULT_DEVICE_PORT);
        if !self.device_url.trim().is_empty() {
            return normalize_device_url(&self.device_url, port);
        }
        if !self.device_ip.trim().is_empty() {
            return normalize_device_url(&self.device_ip, port);
        }
        bail!(
            "Device address not configured: set `device_url` or `device_ip` in {CONFIG_FILE_NAME}, \
             COURIER_DEVICE_URL, or pass --device-url"
        )
    }
}

/// Normalizes a device address into `scheme://host:port[/path]`.
///
/// Adds `http://` when no scheme is given and `port` when the address has
/// none. Trailing slashes are removed.
pub fn normalize_device_url(raw: &str, port: u16) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("Device URL is empty");
    }
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let parsed =
        Url::parse(&with_scheme).with_context(|| format!("Invalid device URL '{trimmed}'"))?;
    let host = parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| anyhow!("Device URL '{trimmed}' has no host"))?;
    let port = parsed.port().unwrap_or(port);
    let path = parsed.path().trim_end_matches('/');

    Ok(format!("{}://{host}:{port}{path}", parsed.scheme()))
}

/// Resolves the config directory.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/courier`
/// 2. `$HOME/.config/courier`
#[must_use]
pub fn resolve_config_dir() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(CONFIG_DIR_NAME));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(PathBuf::from(home).join(".config").join(CONFIG_DIR_NAME))
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loaded configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Config file path, if a config directory is known.
    pub path: Option<PathBuf>,
    /// Effective configuration.
    pub config: AppConfig,
    /// Whether `config.json` existed.
    pub loaded_from_file: bool,
}

/// Loads configuration from the default directory and the process environment.
pub fn load_default_config() -> Result<LoadedConfig> {
    match resolve_config_dir() {
        Some(dir) => load_config_from_dir(&dir, |key| env::var(key).ok()),
        None => {
            let mut config = AppConfig::default();
            config.apply_env_defaults(|key| env::var(key).ok());
            Ok(LoadedConfig {
                path: None,
                config,
                loaded_from_file: false,
            })
        }
    }
}

/// Loads `config.json` and `.env` from `dir`, consulting `process_env` first
/// for environment values.
pub fn load_config_from_dir(
    dir: &Path,
    process_env: impl Fn(&str) -> Option<String>,
) -> Result<LoadedConfig> {
    let env_path = dir.join(ENV_FILE_NAME);
    let dotenv = if env_path.exists() {
        let raw = fs::read_to_string(&env_path)
            .with_context(|| format!("Failed to read env file '{}'", env_path.display()))?;
        parse_env_file(&raw)
    } else {
        HashMap::new()
    };

    let path = dir.join(CONFIG_FILE_NAME);
    let (mut config, loaded_from_file) = if path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config = AppConfig::parse(&raw)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
        (config, true)
    } else {
        (AppConfig::default(), false)
    };

    config.apply_env_defaults(|key| process_env(key).or_else(|| dotenv.get(key).cloned()));
    Ok(LoadedConfig {
        path: Some(path),
        config,
        loaded_from_file,
    })
}

/// Parses `.env` contents: `KEY=VALUE` lines, `#` comments, optional
/// `export ` prefix, surrounding quotes stripped.
#[must_use]
pub fn parse_env_file(raw: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for raw_line in raw.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        values
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }
    values
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = AppConfig::parse(r#"{"device_ip":"10.0.0.5","verbose":true}"#).unwrap();
        assert_eq!(cfg.device_ip, "10.0.0.5");
        assert!(cfg.verbose);
        assert!(cfg.device_port.is_none());
        assert!(cfg.providers.mangadex_api_key.is_empty());
    }

    #[test]
    fn test_parse_config_rejects_invalid_json() {
        let err = AppConfig::parse("{device_ip").unwrap_err();
        assert!(err.to_string().contains("Invalid config JSON"));
    }

    #[test]
    fn test_env_defaults_fill_only_empty_fields() {
        let mut cfg = AppConfig {
            device_ip: "10.0.0.5".to_string(),
            ..AppConfig::default()
        };
        cfg.apply_env_defaults(|key| match key {
            "COURIER_DEVICE_IP" => Some("192.168.1.9".to_string()),
            "COURIER_DEVICE_PORT" => Some("9000".to_string()),
            "COURIER_VERBOSE" => Some("TRUE".to_string()),
            "COURIER_MANGADEX_API_KEY" => Some(" key-1 ".to_string()),
            _ => None,
        });
        assert_eq!(cfg.device_ip, "10.0.0.5");
        assert_eq!(cfg.device_port, Some(9000));
        assert!(cfg.verbose);
        assert_eq!(cfg.mangadex_api_key().as_deref(), Some("key-1"));
    }

    #[test]
    fn test_env_defaults_apply_default_port() {
        let mut cfg = AppConfig::default();
        cfg.apply_env_defaults(no_env);
        assert_eq!(cfg.device_port, Some(DEFAULT_DEVICE_PORT));
        assert!(cfg.mangadex_api_key().is_none());
    }

    #[test]
    fn test_normalize_adds_scheme_and_port() {
        assert_eq!(
            normalize_device_url("10.0.0.5", 8085).unwrap(),
            "http://10.0.0.5:8085"
        );
        assert_eq!(
            normalize_device_url(" https://tablet.lan:9000/ ", 8085).unwrap(),
            "https://tablet.lan:9000"
        );
        assert_eq!(
            normalize_device_url("http://tablet.lan/base/", 8085).unwrap(),
            "http://tablet.lan:8085/base"
        );
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert!(normalize_device_url("   ", 8085).is_err());
    }

    #[test]
    fn test_device_base_url_prefers_url_over_ip() {
        let cfg = AppConfig {
            device_url: "tablet.lan".to_string(),
            device_ip: "10.0.0.5".to_string(),
            device_port: Some(8085),
            ..AppConfig::default()
        };
        assert_eq!(cfg.device_base_url().unwrap(), "http://tablet.lan:8085");
    }

    #[test]
    fn test_device_base_url_requires_an_address() {
        let err = AppConfig::default().device_base_url().unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn test_parse_env_file() {
        let values = parse_env_file(
            "# comment\nexport COURIER_DEVICE_IP=\"10.0.0.7\"\nCOURIER_VERBOSE='1'\nbroken line\n=novalue\n",
        );
        assert_eq!(values.get("COURIER_DEVICE_IP").unwrap(), "10.0.0.7");
        assert_eq!(values.get("COURIER_VERBOSE").unwrap(), "1");
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_load_config_from_dir_layers_sources() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"device_url":"tablet.lan"}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join(ENV_FILE_NAME),
            "COURIER_DEVICE_PORT=9001\nCOURIER_MANGADEX_API_KEY=from-dotenv\n",
        )
        .unwrap();

        let loaded = load_config_from_dir(dir.path(), |key| {
            (key == "COURIER_MANGADEX_API_KEY").then(|| "from-process".to_string())
        })
        .unwrap();

        assert!(loaded.loaded_from_file);
        assert_eq!(loaded.config.device_port, Some(9001));
        assert_eq!(
            loaded.config.mangadex_api_key().as_deref(),
            Some("from-process")
        );
        assert_eq!(
            loaded.config.device_base_url().unwrap(),
            "http://tablet.lan:9001"
        );
    }

    #[test]
    fn test_load_config_from_empty_dir_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config_from_dir(dir.path(), no_env).unwrap();
        assert!(!loaded.loaded_from_file);
        assert_eq!(loaded.config.device_port, Some(DEFAULT_DEVICE_PORT));
    }
}
