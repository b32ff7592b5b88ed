//! Client configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

pub const DEFAULT_URL: &str = "ws://localhost:8080/browser";
pub const ENV_PREFIX: &str = "CEF_CLIENT_";

/// Which last-known state is re-sent after a reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub size: bool,
    pub navigation: bool,
    pub streaming: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            size: true,
            navigation: true,
            streaming: true,
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Browser control endpoint
    pub url: String,

    /// Per-call timeout
    pub request_timeout_ms: u64,

    /// How long `connect` waits for the first open connection
    pub connect_timeout_ms: u64,

    /// Liveness probe interval, 0 disables probing
    pub ping_interval_ms: u64,

    /// Time allowed for a probe acknowledgment
    pub ping_grace_ms: u64,

    pub auto_reconnect: bool,

    pub reconnect_delay_ms: u64,

    /// Consecutive failed attempts before giving up, 0 = unlimited
    pub max_reconnect_attempts: u32,

    pub replay: ReplayConfig,

    /// Page opened by `open_tab` when none is given
    pub default_url: String,

    pub default_width: u32,

    pub default_height: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            request_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            ping_interval_ms: 5_000,
            ping_grace_ms: 5_000,
            auto_reconnect: true,
            reconnect_delay_ms: 1_000,
            max_reconnect_attempts: 10,
            replay: ReplayConfig::default(),
            default_url: "about:blank".to_string(),
            default_width: 1280,
            default_height: 720,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Defaults, then a TOML file, then `CEF_CLIENT_*` environment variables.
    ///
    /// An explicit `path` must exist; otherwise the file in the user config
    /// directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ClientError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(default) = Self::default_path().filter(|p| p.exists()) {
                    tracing::debug!(path = %default.display(), "using config file");
                    figment = figment.merge(Toml::file(default));
                }
            }
        }

        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/cef-client/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cef-client").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ClientError::Config(format!(
                "url must use ws:// or wss://, got '{}'",
                self.url
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ClientError::Config(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.ping_interval_ms > 0 && self.ping_grace_ms == 0 {
            return Err(ClientError::Config(
                "ping_grace_ms must be greater than zero when probing is enabled".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ClientError::Config(e.to_string()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn ping_grace(&self) -> Duration {
        Duration::from_millis(self.ping_grace_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = duration_ms(timeout);
        self
    }

    /// `Duration::ZERO` disables probing
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.config.ping_interval_ms = duration_ms(interval);
        self
    }

    pub fn ping_grace(mut self, grace: Duration) -> Self {
        self.config.ping_grace_ms = duration_ms(grace);
        self
    }

    pub fn auto_reconnect(mut self, enable: bool) -> Self {
        self.config.auto_reconnect = enable;
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay_ms = duration_ms(delay);
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    pub fn replay(mut self, replay: ReplayConfig) -> Self {
        self.config.replay = replay;
        self
    }

    pub fn default_url(mut self, url: impl Into<String>) -> Self {
        self.config.default_url = url.into();
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.default_width = width;
        self.config.default_height = height;
        self
    }

    /// Build the config
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
