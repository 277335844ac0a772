use crate::client::DEFAULT_BASE_URL;
use crate::storage::StorageType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_ENV: &str = "TRTODO_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

pub const KEYS: &[&str] = &[
    "storage.type",
    "storage.path",
    "server.host",
    "server.port",
    "client.base-url",
];

const VALID_STORAGE_TYPES: &[&str] = &["json", "sqlite"];
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 1234;

fn validate_storage_path(path: &str) -> Result<PathBuf, ConfigError> {
    if path.contains('\0') {
        return Err(ConfigError::InvalidConfig(
            "Path contains invalid characters".to_string(),
        ));
    }

    let path = shellexpand::tilde(path);
    let path = PathBuf::from(path.as_ref());

    if path.as_os_str().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "Path cannot be empty".to_string(),
        ));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            return Err(ConfigError::InvalidConfig(format!(
                "Parent directory does not exist: {}",
                parent.display()
            )));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            if let Ok(metadata) = parent.metadata() {
                if metadata.mode() & 0o200 == 0 {
                    return Err(ConfigError::InvalidConfig(format!(
                        "Directory is not writable: {}",
                        parent.display()
                    )));
                }
            }
        }
    }

    Ok(path)
}

fn validate_storage_type(value: &str) -> Result<(), ConfigError> {
    if !VALID_STORAGE_TYPES.contains(&value) {
        return Err(ConfigError::InvalidConfig(format!(
            "storage.type must be one of: {}",
            VALID_STORAGE_TYPES.join(", ")
        )));
    }
    Ok(())
}

fn validate_host(value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() || value.contains(char::is_whitespace) {
        return Err(ConfigError::InvalidConfig(
            "server.host must be a host name or address".to_string(),
        ));
    }
    Ok(())
}

fn validate_port(value: &str) -> Result<u16, ConfigError> {
    value.parse().map_err(|_| {
        ConfigError::InvalidConfig("server.port must be an integer between 0 and 65535".to_string())
    })
}

fn validate_base_url(value: &str) -> Result<(), ConfigError> {
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(ConfigError::InvalidConfig(
            "client.base-url must start with http:// or https://".to_string(),
        ));
    }
    Ok(())
}

/// Values set in the config file. Unset keys fall back to [`Config::with_defaults`].
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub storage_type: Option<String>,
    #[serde(default)]
    pub storage_path: Option<String>,
    #[serde(default)]
    pub server_host: Option<String>,
    #[serde(default)]
    pub server_port: Option<u16>,
    #[serde(default)]
    pub client_base_url: Option<String>,
}

impl Config {
    pub fn with_defaults() -> Self {
        Self {
            storage_type: Some(StorageType::Json.as_str().to_string()),
            storage_path: Some(default_storage_path().to_string_lossy().to_string()),
            server_host: Some(DEFAULT_HOST.to_string()),
            server_port: Some(DEFAULT_PORT),
            client_base_url: Some(DEFAULT_BASE_URL.to_string()),
        }
    }

    fn value(&self, key: &str) -> Option<String> {
        match key {
            "storage.type" => self.storage_type.clone(),
            "storage.path" => self.storage_path.clone(),
            "server.host" => self.server_host.clone(),
            "server.port" => self.server_port.map(|p| p.to_string()),
            "client.base-url" => self.client_base_url.clone(),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref storage_type) = self.storage_type {
            validate_storage_type(storage_type)?;
        }
        if let Some(ref host) = self.server_host {
            validate_host(host)?;
        }
        if let Some(ref url) = self.client_base_url {
            validate_base_url(url)?;
        }
        Ok(())
    }
}

fn config_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("trtodo")
}

pub fn default_config_path() -> PathBuf {
    config_root().join("config.json")
}

pub fn default_storage_path() -> PathBuf {
    config_root().join("todos.json")
}

/// Reads and writes the JSON config file.
#[derive(Debug)]
pub struct ConfigManager {
    path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Opens the config at `config_path`, `$TRTODO_CONFIG`, or the default location.
    /// A missing file is not an error; it is created on the first `set`.
    pub fn new(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => std::env::var_os(CONFIG_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(default_config_path),
        };
        let path = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());

        let config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                Config::default()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            Config::default()
        };
        config.validate()?;

        tracing::debug!(path = %path.display(), "loaded config");
        Ok(Self { path, config })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.config)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Effective value of `key`: the configured one, else the default.
    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        if !KEYS.contains(&key) {
            return Err(ConfigError::InvalidKey(key.to_string()));
        }
        self.config
            .value(key)
            .or_else(|| Config::with_defaults().value(key))
            .ok_or_else(|| ConfigError::InvalidKey(key.to_string()))
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut config = self.config.clone();
        match key {
            "storage.type" => {
                validate_storage_type(value)?;
                if config.storage_type.as_deref() != Some(value) {
                    tracing::warn!("storage.type changed; run `migrate` to carry existing todos over");
                }
                config.storage_type = Some(value.to_string());
            }
            "storage.path" => {
                let path = validate_storage_path(value)?;
                config.storage_path = Some(path.to_string_lossy().to_string());
            }
            "server.host" => {
                validate_host(value)?;
                config.server_host = Some(value.to_string());
            }
            "server.port" => {
                config.server_port = Some(validate_port(value)?);
            }
            "client.base-url" => {
                validate_base_url(value)?;
                config.client_base_url = Some(value.trim_end_matches('/').to_string());
            }
            _ => return Err(ConfigError::InvalidKey(key.to_string())),
        }
        config.validate()?;
        self.config = config;
        self.save()
    }

    pub fn unset(&mut self, key: &str) -> Result<(), ConfigError> {
        match key {
            "storage.type" => self.config.storage_type = None,
            "storage.path" => self.config.storage_path = None,
            "server.host" => self.config.server_host = None,
            "server.port" => self.config.server_port = None,
            "client.base-url" => self.config.client_base_url = None,
            _ => return Err(ConfigError::InvalidKey(key.to_string())),
        }
        self.save()
    }

    /// `(key, effective value, is_default)` for every key.
    pub fn list(&self) -> Vec<(String, String, bool)> {
        let defaults = Config::with_defaults();
        KEYS.iter()
            .map(|key| match self.config.value(key) {
                Some(value) => (key.to_string(), value, false),
                None => (
                    key.to_string(),
                    defaults.value(key).unwrap_or_else(|| "null".to_string()),
                    true,
                ),
            })
            .collect()
    }

    pub fn storage_type(&self) -> StorageType {
        self.config
            .storage_type
            .as_deref()
            .and_then(StorageType::from_str)
            .unwrap_or(StorageType::Json)
    }

    pub fn storage_path(&self) -> PathBuf {
        self.config
            .storage_path
            .as_deref()
            .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
            .unwrap_or_else(default_storage_path)
    }

    pub fn server_host(&self) -> String {
        self.config
            .server_host
            .clone()
            .unwrap_or_else(|| DEFAULT_HOST.to_string())
    }

    pub fn server_port(&self) -> u16 {
        self.config.server_port.unwrap_or(DEFAULT_PORT)
    }

    /// `host:port` to bind, with command-line overrides taking precedence.
    pub fn server_addr(&self, host: Option<String>, port: Option<u16>) -> String {
        format!(
            "{}:{}",
            host.unwrap_or_else(|| self.server_host()),
            port.unwrap_or_else(|| self.server_port())
        )
    }

    pub fn base_url(&self) -> String {
        self.config
            .client_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_manager() -> (ConfigManager, TempDir) {
        let temp_dir = tempfile::Builder::new()
            .prefix("trtodo_test")
            .tempdir()
            .expect("Failed to create temporary directory");
        let manager = ConfigManager::new(Some(temp_dir.path().join("config.json").as_path()))
            .expect("Failed to open config");
        (manager, temp_dir)
    }

    #[test]
    fn test_defaults_without_file() {
        let (manager, _dir) = test_manager();
        assert_eq!(manager.storage_type(), StorageType::Json);
        assert_eq!(manager.server_addr(None, None), "127.0.0.1:1234");
        assert_eq!(manager.base_url(), DEFAULT_BASE_URL);
        assert_eq!(manager.get("server.port").unwrap(), "1234");
        assert!(!manager.path().exists());
    }

    #[test]
    fn test_set_persists() {
        let (mut manager, dir) = test_manager();
        let store = dir.path().join("store.db");
        manager.set("storage.type", "sqlite").unwrap();
        manager
            .set("storage.path", store.to_str().unwrap())
            .unwrap();
        manager.set("server.port", "8080").unwrap();

        let reopened = ConfigManager::new(Some(manager.path())).unwrap();
        assert_eq!(reopened.storage_type(), StorageType::Sqlite);
        assert_eq!(reopened.storage_path(), store);
        assert_eq!(reopened.server_addr(None, None), "127.0.0.1:8080");
        assert_eq!(
            reopened.server_addr(Some("0.0.0.0".to_string()), None),
            "0.0.0.0:8080"
        );
        assert_eq!(reopened.server_addr(None, Some(9000)), "127.0.0.1:9000");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let (mut manager, _dir) = test_manager();
        assert!(matches!(
            manager.set("storage.type", "csv"),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            manager.set("server.port", "70000"),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            manager.set("client.base-url", "localhost:1234"),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            manager.set("storage.path", "/definitely/not/here/todos.json"),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            manager.set("color", "blue"),
            Err(ConfigError::InvalidKey(_))
        ));
        assert_eq!(manager.config(), &Config::default());
    }

    #[test]
    fn test_unset_restores_default() {
        let (mut manager, _dir) = test_manager();
        manager.set("client.base-url", "http://example.test/api/v1/").unwrap();
        assert_eq!(manager.base_url(), "http://example.test/api/v1");

        manager.unset("client.base-url").unwrap();
        assert_eq!(manager.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_list_marks_defaults() {
        let (mut manager, _dir) = test_manager();
        manager.set("server.host", "0.0.0.0").unwrap();

        let list = manager.list();
        assert_eq!(list.len(), KEYS.len());
        let host = list.iter().find(|(k, _, _)| k == "server.host").unwrap();
        assert_eq!(host, &("server.host".to_string(), "0.0.0.0".to_string(), false));
        let port = list.iter().find(|(k, _, _)| k == "server.port").unwrap();
        assert!(port.2);
    }

    #[test]
    fn test_empty_file_is_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "  ").unwrap();
        let manager = ConfigManager::new(Some(path.as_path())).unwrap();
        assert_eq!(manager.config(), &Config::default());
    }
}
