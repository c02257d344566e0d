//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::net::IpAddr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 3000)
    pub port: u16,
    /// Externally visible origin (e.g., "https://rows.example.com")
    pub public_url: String,
}

impl ServerConfig {
    /// Get the base URL for the instance, without a trailing slash
    pub fn base_url(&self) -> String {
        self.public_url.trim_end_matches('/').to_string()
    }

    /// OAuth redirect URI registered with the provider
    pub fn callback_url(&self) -> String {
        format!("{}/callback", self.base_url())
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL (e.g., "sqlite:data/rowboard.db")
    pub url: String,
}

/// Authentication configuration (Google OAuth)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 86400 = 24h)
    pub session_max_age: i64,
    pub google: GoogleOAuthConfig,
}

/// Google OAuth configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

/// Flat environment variables used by container and PaaS deployments.
///
/// These override every structured source when set and non-empty.
const FLAT_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("DATABASE_URL", "database.url"),
    ("GOOGLE_CLIENT_ID", "auth.google.client_id"),
    ("GOOGLE_CLIENT_SECRET", "auth.google.client_secret"),
    ("HOST", "server.public_url"),
    ("SESSION_SECRET", "auth.session_secret"),
];

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (ROWBOARD__*)
    /// 5. Flat variables (DATABASE_URL, GOOGLE_CLIENT_ID, ...)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.public_url", "http://localhost:3000")?
            .set_default("database.url", "sqlite:data/rowboard.db")?
            .set_default("auth.session_secret", "")?
            .set_default("auth.session_max_age", 86_400)?
            .set_default("auth.google.client_id", "")?
            .set_default("auth.google.client_secret", "")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (ROWBOARD__*)
            .add_source(
                Environment::with_prefix("ROWBOARD")
                    .separator("__")
                    .try_parsing(true),
            );

        let builder = apply_flat_overrides(builder, |var| std::env::var(var).ok())?;

        let config = builder
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        public_url_scheme(&self.server.public_url).eq_ignore_ascii_case("https")
            || !is_local_public_url(&self.server.public_url)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.as_bytes().len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if self.auth.google.client_id.is_empty() || self.auth.google.client_secret.is_empty() {
            return Err(crate::error::AppError::Config(
                "auth.google.client_id and auth.google.client_secret are required".to_string(),
            ));
        }

        if !self.should_use_secure_cookies() {
            tracing::warn!(
                public_url = %self.server.public_url,
                "Using insecure session cookies for local development"
            );
        } else if !public_url_scheme(&self.server.public_url).eq_ignore_ascii_case("https") {
            return Err(crate::error::AppError::Config(
                "server.public_url must be https for non-local hosts".to_string(),
            ));
        }

        Ok(())
    }
}

/// Apply the flat variable overrides on top of the structured sources.
///
/// Empty and whitespace-only values are ignored rather than overriding
/// with the empty string.
fn apply_flat_overrides(
    mut builder: config::builder::ConfigBuilder<config::builder::DefaultState>,
    mut lookup: impl FnMut(&str) -> Option<String>,
) -> Result<config::builder::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
    for (var, key) in FLAT_ENV_OVERRIDES {
        if let Some(value) = lookup(var) {
            if !value.trim().is_empty() {
                builder = builder.set_override(*key, value)?;
            }
        }
    }
    Ok(builder)
}

fn public_url_scheme(public_url: &str) -> String {
    url::Url::parse(public_url)
        .map(|url| url.scheme().to_string())
        .unwrap_or_else(|_| "http".to_string())
}

fn is_local_public_url(public_url: &str) -> bool {
    let host = url::Url::parse(public_url)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()))
        .unwrap_or_else(|| public_url.to_string());
    let host = host.trim_end_matches('.').to_ascii_lowercase();

    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                public_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
            },
            auth: AuthConfig {
                session_secret: "x".repeat(32),
                session_max_age: 86_400,
                google: GoogleOAuthConfig {
                    client_id: "google-client-id".to_string(),
                    client_secret: "google-client-secret".to_string(),
                },
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_http_on_localhost() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert!(!config.should_use_secure_cookies());
    }

    #[test]
    fn validate_rejects_short_session_secret() {
        let mut config = valid_config();
        config.auth.session_secret = "short-secret".to_string();

        let error = config
            .validate()
            .expect_err("session secret shorter than 32 bytes must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("auth.session_secret")
        ));
    }

    #[test]
    fn validate_rejects_nonpositive_session_max_age() {
        let mut config = valid_config();
        config.auth.session_max_age = 0;

        let error = config
            .validate()
            .expect_err("zero session max age must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("auth.session_max_age")
        ));
    }

    #[test]
    fn validate_rejects_missing_google_credentials() {
        let mut config = valid_config();
        config.auth.google.client_id = String::new();

        let error = config
            .validate()
            .expect_err("missing Google client id must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("auth.google.client_id")
        ));
    }

    #[test]
    fn validate_rejects_http_for_non_local_host() {
        let mut config = valid_config();
        config.server.public_url = "http://rows.example.com".to_string();

        let error = config
            .validate()
            .expect_err("public hosts must require https");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("server.public_url must be https")
        ));
    }

    #[test]
    fn flat_env_overrides_take_precedence() {
        let builder = config::Config::builder()
            .set_default("database.url", "sqlite:data/rowboard.db")
            .unwrap()
            .set_default("server.public_url", "http://localhost:3000")
            .unwrap()
            .set_default("auth.session_secret", "")
            .unwrap();

        let vars: std::collections::HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite::memory:"),
            ("HOST", "https://rows.example.com"),
            ("SESSION_SECRET", "env-session-secret"),
        ]
        .into_iter()
        .collect();

        let config = apply_flat_overrides(builder, |var| vars.get(var).map(|v| v.to_string()))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.get_string("database.url").unwrap(), "sqlite::memory:");
        assert_eq!(
            config.get_string("server.public_url").unwrap(),
            "https://rows.example.com"
        );
        assert_eq!(
            config.get_string("auth.session_secret").unwrap(),
            "env-session-secret"
        );
    }

    #[test]
    fn empty_flat_env_values_are_ignored() {
        let builder = config::Config::builder()
            .set_default("database.url", "sqlite:data/rowboard.db")
            .unwrap();

        let config = apply_flat_overrides(builder, |var| {
            (var == "DATABASE_URL").then(|| "   ".to_string())
        })
        .unwrap()
        .build()
        .unwrap();

        assert_eq!(
            config.get_string("database.url").unwrap(),
            "sqlite:data/rowboard.db"
        );
    }

    #[test]
    fn callback_url_appends_path_without_double_slash() {
        let mut config = valid_config();
        config.server.public_url = "http://localhost:3000/".to_string();
        assert_eq!(config.server.callback_url(), "http://localhost:3000/callback");
    }
}
