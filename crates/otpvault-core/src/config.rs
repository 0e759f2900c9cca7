//! Configuration management for otpvault.
//!
//! Loads configuration from ${OTPVAULT_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::scan::FacingMode;
use crate::ticker::TickerConfig;

/// Environment variable that overrides every other server URL source.
pub const SERVER_URL_ENV: &str = "OTPVAULT_SERVER_URL";

/// Code refresh schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerSection {
    /// Milliseconds between refresh passes.
    pub interval_ms: u64,
    /// Skip a tick while the previous pass is still fetching.
    pub skip_overlapping_passes: bool,
}

impl Default for TickerSection {
    fn default() -> Self {
        Self {
            interval_ms: Config::DEFAULT_INTERVAL_MS,
            skip_overlapping_passes: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerSection {
    pub facing: FacingMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Per-request timeout in seconds. 0 disables the timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub ticker: TickerSection,
    #[serde(default)]
    pub scanner: ScannerSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            request_timeout_secs: default_request_timeout_secs(),
            ticker: TickerSection::default(),
            scanner: ScannerSection::default(),
        }
    }
}

fn default_server_url() -> String {
    Config::DEFAULT_SERVER_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    Config::DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Returns the default config template with comments.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

impl Config {
    pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
    const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
    const DEFAULT_INTERVAL_MS: u64 = 1000;
    /// Lower bound for the refresh interval; a zero period cannot be scheduled.
    const MIN_INTERVAL_MS: u64 = 100;

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the commented default config to `path`.
    ///
    /// Fails if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            bail!("Config file already exists at {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }

    /// Returns `None` when the timeout is disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn ticker_config(&self) -> TickerConfig {
        TickerConfig {
            interval: Duration::from_millis(self.ticker.interval_ms.max(Self::MIN_INTERVAL_MS)),
            skip_overlapping_passes: self.ticker.skip_overlapping_passes,
        }
    }

    /// Picks the server URL: `OTPVAULT_SERVER_URL`, then `flag`, then the
    /// config file.
    pub fn resolve_server_url(&self, flag: Option<&str>) -> Result<String> {
        let env = std::env::var(SERVER_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty());
        self.resolve_server_url_from(env.as_deref(), flag)
    }

    fn resolve_server_url_from(&self, env: Option<&str>, flag: Option<&str>) -> Result<String> {
        let (raw, source) = match (env, flag) {
            (Some(url), _) => (url, SERVER_URL_ENV),
            (None, Some(url)) => (url, "--server"),
            (None, None) => (self.server_url.as_str(), "config"),
        };
        let raw = raw.trim();

        let parsed = Url::parse(raw).with_context(|| format!("Invalid server URL from {source}: {raw}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "Invalid server URL from {source}: unsupported scheme '{}'",
                parsed.scheme()
            );
        }
        Ok(raw.trim_end_matches('/').to_string())
    }
}

pub mod paths {
    //! Path resolution for otpvault configuration.
    //!
    //! OTPVAULT_HOME resolution order:
    //! 1. OTPVAULT_HOME environment variable (if set)
    //! 2. ~/.config/otpvault (default)
    //! 3. ./.otpvault when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the otpvault home directory.
    pub fn otpvault_home() -> PathBuf {
        if let Ok(home) = std::env::var("OTPVAULT_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".otpvault"),
            |h| h.join(".config").join("otpvault"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        otpvault_home().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server_url, "http://127.0.0.1:5000");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.ticker_config(), TickerConfig::default());
        assert_eq!(config.scanner.facing, FacingMode::Environment);
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(
            &config_path,
            "request_timeout_secs = 0\n[ticker]\nskip_overlapping_passes = true\n",
        )
        .unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.server_url, Config::DEFAULT_SERVER_URL);
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.ticker.interval_ms, 1000);
        assert!(config.ticker_config().skip_overlapping_passes);
    }

    #[test]
    fn test_load_invalid_toml_mentions_path() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "server_url = [").unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config"));
    }

    #[test]
    fn test_facing_parses_lowercase() {
        let config: Config = toml::from_str("[scanner]\nfacing = \"user\"\n").unwrap();
        assert_eq!(config.scanner.facing, FacingMode::User);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config: Config = toml::from_str("[ticker]\ninterval_ms = 0\n").unwrap();
        assert_eq!(
            config.ticker_config().interval,
            Duration::from_millis(Config::MIN_INTERVAL_MS)
        );
    }

    #[test]
    fn test_init_creates_config_with_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("subdir").join("config.toml");

        Config::init(&config_path).unwrap();

        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("http://127.0.0.1:5000"));
        assert!(contents.contains("# skip_overlapping_passes"));
        assert_eq!(Config::load_from(&config_path).unwrap(), Config::default());
    }

    #[test]
    fn test_init_fails_if_exists() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "").unwrap();

        assert!(Config::init(&config_path).is_err());
    }

    #[test]
    fn test_server_url_precedence() {
        let config = Config {
            server_url: "http://config:1".into(),
            ..Config::default()
        };

        let url = config
            .resolve_server_url_from(Some("http://env:1/"), Some("http://flag:1"))
            .unwrap();
        assert_eq!(url, "http://env:1");

        let url = config
            .resolve_server_url_from(None, Some("http://flag:1"))
            .unwrap();
        assert_eq!(url, "http://flag:1");

        let url = config.resolve_server_url_from(None, None).unwrap();
        assert_eq!(url, "http://config:1");
    }

    #[test]
    fn test_server_url_must_be_http() {
        let config = Config::default();
        let err = config
            .resolve_server_url_from(None, Some("ftp://vault"))
            .unwrap_err();
        assert!(err.to_string().contains("--server"));
        assert!(config.resolve_server_url_from(None, Some("not a url")).is_err());
    }
}
