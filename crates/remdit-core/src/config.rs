//! Application configuration
//!
//! Configuration is loaded from the first file found in:
//! 1. An explicit path (`--config` flag)
//! 2. `REMDIT_CONFIG`
//! 3. `./config.toml`
//! 4. `<config dir>/remdit/config.toml`
//! 5. `~/.remdit/config.toml`
//! 6. `/etc/remdit/config.toml`
//!
//! Environment variables (`REMDIT_*` prefix) are applied on top.
//!
//! The loaded [`Config`] is a plain value: build it once and hand it (or the
//! selected [`ServerDescriptor`]) to whoever needs it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::server::{ServerDescriptor, TransportKind};

/// Environment variable prefix
const ENV_PREFIX: &str = "REMDIT";

/// Config file name used in every search location
const CONFIG_FILE_NAME: &str = "config.toml";

/// Server address baked in at build time, used when no config file exists
const DEFAULT_SERVER: Option<&str> = option_env!("REMDIT_DEFAULT_SERVER");

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Candidate servers; one is picked per session
    #[serde(default)]
    pub servers: Vec<ServerDescriptor>,

    /// Write logs to this file instead of stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// File this config was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the search path
    ///
    /// `explicit` (the `--config` flag) wins over every other location and
    /// must exist when given.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        let candidates = Self::search_paths();
        if let Some(path) = candidates.iter().find(|p| p.is_file()) {
            return Self::load_from_path(path);
        }

        Self::fallback(candidates)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.source = Some(path.to_path_buf());
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self, ConfigError> {
        let mut config: Config =
            toml::from_str(toml_content).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// No config file: use the compiled-in default server or give up
    fn fallback(searched: Vec<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env_overrides();

        if config.servers.is_empty() {
            match DEFAULT_SERVER.filter(|s| !s.is_empty()) {
                Some(addr) => {
                    tracing::debug!("No config file found, using default server");
                    config.servers.push(ServerDescriptor::new(addr));
                }
                None => return Err(ConfigError::NotFound { searched }),
            }
        }

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // REMDIT_SERVER
        if let Ok(val) = std::env::var(format!("{}_SERVER", ENV_PREFIX)) {
            if !val.is_empty() {
                self.servers = vec![ServerDescriptor::new(val)];
            }
        }

        // REMDIT_KEY
        if let Ok(val) = std::env::var(format!("{}_KEY", ENV_PREFIX)) {
            if !val.is_empty() {
                for server in self.servers.iter_mut().filter(|s| s.key.is_none()) {
                    server.key = Some(val.clone());
                }
            }
        }

        // REMDIT_LOG_FILE
        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
    }

    /// Locations searched for a config file, in priority order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            paths.push(PathBuf::from(path));
        }
        paths.push(PathBuf::from(".").join(CONFIG_FILE_NAME));
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("remdit").join(CONFIG_FILE_NAME));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".remdit").join(CONFIG_FILE_NAME));
        }
        paths.push(PathBuf::from("/etc/remdit").join(CONFIG_FILE_NAME));

        paths
    }

    /// Pick one server at random among the valid ones speaking a supported transport
    pub fn select_server(
        &self,
        supported: &[TransportKind],
    ) -> Result<&ServerDescriptor, ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }

        let usable: Vec<&ServerDescriptor> = self
            .servers
            .iter()
            .filter(|s| s.is_valid() && supported.contains(&s.transport))
            .collect();

        if usable.is_empty() {
            return Err(ConfigError::NoUsableServers {
                configured: self.servers.len(),
            });
        }

        Ok(usable[fastrand::usize(..usable.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "REMDIT_SERVER",
        "REMDIT_KEY",
        "REMDIT_LOG_FILE",
        "REMDIT_CONFIG",
    ];

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            log_file = "/tmp/remdit.log"

            [[servers]]
            addr = "one.example.com"
            key = "secret"

            [[servers]]
            addr = "two.example.com:2222"
            transport = "ssh"
            password = "pw"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].key.as_deref(), Some("secret"));
        assert_eq!(config.servers[1].transport, TransportKind::Ssh);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/remdit.log")));
    }

    #[test]
    fn test_load_from_path() {
        let _guard = EnvGuard::new(ENV_VARS);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[[servers]]\naddr = \"example.com\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.servers[0].addr, "example.com");
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let _guard = EnvGuard::new(ENV_VARS);

        let err = Config::load(Some(Path::new("/nonexistent/config.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_parse_error() {
        let _guard = EnvGuard::new(ENV_VARS);

        let err = Config::load_from_str("servers = 12").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_override_server_and_key() {
        let _guard = EnvGuard::new(ENV_VARS);

        env::set_var("REMDIT_SERVER", "env.example.com");
        env::set_var("REMDIT_KEY", "env-key");

        let config = Config::load_from_str("[[servers]]\naddr = \"file.example.com\"\n").unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].addr, "env.example.com");
        assert_eq!(config.servers[0].key.as_deref(), Some("env-key"));
    }

    #[test]
    fn test_env_key_does_not_replace_configured_key() {
        let _guard = EnvGuard::new(ENV_VARS);

        env::set_var("REMDIT_KEY", "env-key");

        let config = Config::load_from_str(
            r#"
            [[servers]]
            addr = "a.example.com"
            key = "file-key"

            [[servers]]
            addr = "b.example.com"
        "#,
        )
        .unwrap();
        assert_eq!(config.servers[0].key.as_deref(), Some("file-key"));
        assert_eq!(config.servers[1].key.as_deref(), Some("env-key"));
    }

    #[test]
    fn test_search_paths_prefer_env() {
        let _guard = EnvGuard::new(ENV_VARS);

        env::set_var("REMDIT_CONFIG", "/custom/remdit.toml");
        let paths = Config::search_paths();
        assert_eq!(paths[0], PathBuf::from("/custom/remdit.toml"));
        assert!(paths.last().unwrap().ends_with("remdit/config.toml"));
    }

    #[test]
    fn test_select_server_skips_invalid_and_unsupported() {
        let config = Config {
            servers: vec![
                ServerDescriptor::new(""),
                ServerDescriptor::new("ssh.example.com").with_transport(TransportKind::Ssh),
                ServerDescriptor::new("ws.example.com"),
            ],
            ..Config::default()
        };

        for _ in 0..16 {
            let server = config.select_server(&[TransportKind::WebSocket]).unwrap();
            assert_eq!(server.addr, "ws.example.com");
        }
    }

    #[test]
    fn test_select_server_errors() {
        let empty = Config::default();
        assert!(matches!(
            empty.select_server(&[TransportKind::WebSocket]),
            Err(ConfigError::NoServers)
        ));

        let invalid = Config {
            servers: vec![ServerDescriptor::new("")],
            ..Config::default()
        };
        assert!(matches!(
            invalid.select_server(&[TransportKind::WebSocket]),
            Err(ConfigError::NoUsableServers { configured: 1 })
        ));
    }
}
