//! Runtime configuration: built-in defaults, then an optional TOML file,
//! then `MEETCHAT_*` environment variables, then command-line flags.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8003/api";
pub const DEFAULT_CHAT_ID: i64 = 2;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub api_base_url: String,
    /// The one conversation this client shows.
    pub chat_id: i64,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub session_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            chat_id: DEFAULT_CHAT_ID,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            session_file: None,
            log_file: None,
        }
    }
}

impl Config {
    /// `<config_dir>/meetchat/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("meetchat").join("config.toml"))
    }

    /// Load from `path`, or from the default location when `path` is `None`.
    /// A missing default file yields the defaults; a missing explicit file
    /// is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content, &path),
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply `MEETCHAT_API_URL`, `MEETCHAT_CHAT_ID` and
    /// `MEETCHAT_REFRESH_SECS` from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(url) = lookup("MEETCHAT_API_URL") {
            self.api_base_url = url;
        }
        if let Some(raw) = lookup("MEETCHAT_CHAT_ID") {
            self.chat_id = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "MEETCHAT_CHAT_ID",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup("MEETCHAT_REFRESH_SECS") {
            self.refresh_interval_secs = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "MEETCHAT_REFRESH_SECS",
                value: raw.clone(),
            })?;
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn session_path(&self) -> PathBuf {
        self.session_file
            .clone()
            .unwrap_or_else(crate::session::FileSessionStore::default_path)
    }

    /// `<cache_dir>/meetchat/meetchat.log` unless configured.
    pub fn log_path(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(|| {
            let cache_dir = dirs::cache_dir()
                .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
                .unwrap_or_else(|| PathBuf::from(".cache"));
            cache_dir.join("meetchat").join("meetchat.log")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_backend_layout() {
        let cfg = Config::default();
        assert_eq!(cfg.api_base_url, "http://localhost:8003/api");
        assert_eq!(cfg.chat_id, 2);
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(5));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg = Config::parse("chat_id = 7\napi_base_url = \"https://chat.example/api\"\n", Path::new("x.toml")).unwrap();
        assert_eq!(cfg.chat_id, 7);
        assert_eq!(cfg.api_base_url, "https://chat.example/api");
        assert_eq!(cfg.refresh_interval_secs, DEFAULT_REFRESH_INTERVAL_SECS);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::parse("chat = 7\n", Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "refresh_interval_secs = 30\n").unwrap();

        let cfg = Config::load(Some(&path)).unwrap();
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(30));
    }

    #[test]
    fn env_overrides_file_values() {
        let vars: HashMap<&str, &str> =
            [("MEETCHAT_API_URL", "http://10.0.0.5:8003/api"), ("MEETCHAT_CHAT_ID", "11")].into();
        let mut cfg = Config::default();

        cfg.apply_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(cfg.api_base_url, "http://10.0.0.5:8003/api");
        assert_eq!(cfg.chat_id, 11);
    }

    #[test]
    fn bad_env_chat_id_is_rejected() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_vars(|k| (k == "MEETCHAT_CHAT_ID").then(|| "two".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: "MEETCHAT_CHAT_ID", .. }));
    }

    #[test]
    fn zero_refresh_is_clamped() {
        let cfg = Config { refresh_interval_secs: 0, ..Config::default() };
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(1));
    }
}
