//! Centralized configuration for FLAPI sessions.
//!
//! Constants live on unit structs; per-session settings on [`SessionConfig`].

use crate::error::{FlapiError, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Connection-level constants.
pub struct ConnectionConfig;

impl ConnectionConfig {
    pub const DEFAULT_HOST: &'static str = "localhost";
    pub const DEFAULT_PORT: u16 = 1984;
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Session events buffered per subscriber before the slowest one lags.
    pub const EVENT_CHANNEL_CAPACITY: usize = 64;
}

/// Environment variables read by the client.
pub struct EnvConfig;

impl EnvConfig {
    pub const TOKEN: &'static str = "FLAPI_TOKEN";
    /// Set by the host application when it launches a script.
    pub const PORT: &'static str = "FLAPI_PORT";
    pub const DEBUG: &'static str = "FLAPI_DEBUG";
    #[cfg(windows)]
    pub const USER: &'static str = "USERNAME";
    #[cfg(not(windows))]
    pub const USER: &'static str = "USER";
}

/// Token file location relative to the home directory.
pub struct TokenConfig;

impl TokenConfig {
    #[cfg(target_os = "macos")]
    pub const DIR: &'static str = "Library/Preferences/FilmLight";
    #[cfg(not(target_os = "macos"))]
    pub const DIR: &'static str = ".filmlight";
    pub const FILE_NAME: &'static str = "flapi-token";
}

/// Settings for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    /// Overrides the per-user token file.
    pub token_file: Option<PathBuf>,
    /// Log every frame at info level instead of trace.
    pub debug: bool,
    /// Upper bound on [`Session::request`](crate::Session::request). `None` waits forever.
    pub call_timeout: Option<Duration>,
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: ConnectionConfig::DEFAULT_HOST.to_string(),
            port: ConnectionConfig::DEFAULT_PORT,
            username: None,
            password: None,
            token: None,
            token_file: None,
            debug: false,
            call_timeout: None,
            connect_timeout: ConnectionConfig::CONNECT_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Start a config for `host` on the default port.
    pub fn builder(host: impl Into<String>) -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: SessionConfig {
                host: host.into(),
                ..Default::default()
            },
        }
    }

    /// Config for a script launched by the host application.
    ///
    /// Returns a localhost config on `$FLAPI_PORT` when that variable is set,
    /// `None` otherwise. `$FLAPI_DEBUG=1` turns on frame logging.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// [`from_env`](Self::from_env) with an injectable variable lookup.
    pub fn from_env_with<F>(lookup: F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(port) = lookup(EnvConfig::PORT) else {
            return Ok(None);
        };
        let port = port.trim().parse::<u16>().map_err(|_| FlapiError::Config {
            message: format!("{} is not a valid port: '{}'", EnvConfig::PORT, port),
        })?;

        let debug = lookup(EnvConfig::DEBUG).is_some_and(|v| v.trim() == "1");
        Ok(Some(
            Self::builder(ConnectionConfig::DEFAULT_HOST)
                .port(port)
                .debug(debug)
                .build(),
        ))
    }

    /// WebSocket endpoint, `ws://<host>:<port>/`.
    pub fn url(&self) -> Result<Url> {
        let raw = format!("ws://{}:{}/", self.host, self.port);
        Url::parse(&raw).map_err(|e| FlapiError::Config {
            message: format!("Invalid server address '{}': {}", raw, e),
        })
    }
}

/// Builder for [`SessionConfig`].
///
/// # Example
///
/// ```
/// use flapi::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::builder("baselight-01")
///     .port(1985)
///     .username("colorist")
///     .call_timeout(Duration::from_secs(30))
///     .build();
///
/// assert_eq!(config.url().unwrap().as_str(), "ws://baselight-01:1985/");
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = Some(token.into());
        self
    }

    pub fn token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.token_file = Some(path.into());
        self
    }

    pub fn debug(mut self, enable: bool) -> Self {
        self.config.debug = enable;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn build(self) -> SessionConfig {
        self.config
    }
}
