//! Handshake credentials.
//!
//! Each field resolves independently, first match wins:
//!
//! | field      | explicit | environment     | fallback               |
//! |------------|----------|-----------------|------------------------|
//! | `username` | config   | `$USER`         |                        |
//! | `password` | config   |                 |                        |
//! | `token`    | config   | `$FLAPI_TOKEN`  | per-user token file    |
//!
//! A missing token file is created with a fresh random token so the local
//! server can authenticate the user on subsequent connections.

use crate::config::{EnvConfig, SessionConfig, TokenConfig};
use crate::error::{FlapiError, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Credentials sent in the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

impl Credentials {
    /// Resolve against the process environment and the user's token file.
    ///
    /// The local token is sent to whatever host the config names, remote
    /// ones included; set `token` explicitly when connecting elsewhere.
    pub fn resolve(config: &SessionConfig) -> Self {
        let token_file = config.token_file.clone().or_else(token_path);
        Self::resolve_with(config, |key| std::env::var(key).ok(), token_file.as_deref())
    }

    /// Resolve with an injectable environment and token file.
    pub fn resolve_with<F>(config: &SessionConfig, env: F, token_file: Option<&Path>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let username = config.username.clone().or_else(|| env(EnvConfig::USER));
        let password = config.password.clone();
        let token = config
            .token
            .clone()
            .or_else(|| env(EnvConfig::TOKEN))
            .or_else(|| token_file.and_then(load_or_create_token));

        Self {
            username,
            password,
            token,
        }
    }
}

/// Default per-user token file.
///
/// - **Linux**: `~/.filmlight/flapi-token`
/// - **macOS**: `~/Library/Preferences/FilmLight/flapi-token`
pub fn token_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(TokenConfig::DIR).join(TokenConfig::FILE_NAME))
}

fn load_or_create_token(path: &Path) -> Option<String> {
    let result = if path.exists() {
        read_token(path)
    } else {
        create_token(path)
    };

    match result {
        Ok(token) => token,
        Err(err) => {
            warn!("Failed to load FLAPI token: {}", err);
            None
        }
    }
}

/// First line of the token file, if non-empty.
pub fn read_token(path: &Path) -> Result<Option<String>> {
    let contents = fs::read_to_string(path).map_err(|e| FlapiError::io_with_path(e, path))?;
    let token = contents.lines().next().map(str::trim).unwrap_or_default();
    Ok((!token.is_empty()).then(|| token.to_string()))
}

/// Generate a random 128-bit token and store it at `path`.
pub fn create_token(path: &Path) -> Result<Option<String>> {
    let token = format!("{:032x}", rand::random::<u128>());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| FlapiError::io_with_path(e, parent))?;
    }
    fs::write(path, format!("{}\n", token)).map_err(|e| FlapiError::io_with_path(e, path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| FlapiError::io_with_path(e, path))?;
    }

    debug!("Created FLAPI token file {}", path.display());
    Ok(Some(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_explicit_values_win() {
        let config = SessionConfig::builder("localhost")
            .username("alice")
            .password("secret")
            .token("abc")
            .build();
        let creds = Credentials::resolve_with(
            &config,
            |k| Some(format!("env-{}", k)),
            None,
        );
        assert_eq!(creds.username.as_deref(), Some("alice"));
        assert_eq!(creds.password.as_deref(), Some("secret"));
        assert_eq!(creds.token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_environment_before_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("flapi-token");
        fs::write(&path, "from-file\n").unwrap();

        let config = SessionConfig::default();
        let creds = Credentials::resolve_with(
            &config,
            |k| match k {
                "FLAPI_TOKEN" => Some("from-env".to_string()),
                k if k == EnvConfig::USER => Some("bob".to_string()),
                _ => None,
            },
            Some(&path),
        );
        assert_eq!(creds.username.as_deref(), Some("bob"));
        assert_eq!(creds.password, None);
        assert_eq!(creds.token.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_token_file_first_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("flapi-token");
        fs::write(&path, "  tok123  \nignored\n").unwrap();

        let creds = Credentials::resolve_with(&SessionConfig::default(), no_env, Some(&path));
        assert_eq!(creds.token.as_deref(), Some("tok123"));
    }

    #[test]
    fn test_missing_token_file_is_created() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".filmlight").join("flapi-token");

        let creds = Credentials::resolve_with(&SessionConfig::default(), no_env, Some(&path));
        let token = creds.token.unwrap();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));

        // Second resolution reads the stored token back.
        let again = Credentials::resolve_with(&SessionConfig::default(), no_env, Some(&path));
        assert_eq!(again.token, Some(token));
    }

    #[test]
    fn test_empty_token_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("flapi-token");
        fs::write(&path, "\n").unwrap();

        assert_eq!(read_token(&path).unwrap(), None);
    }

    #[test]
    fn test_unwritable_token_file_leaves_token_unset() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();
        let path = blocker.join("flapi-token");

        let creds = Credentials::resolve_with(&SessionConfig::default(), no_env, Some(&path));
        assert_eq!(creds.token, None);
    }
}
