use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub site: SiteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub enabled: bool,
    /// Use local sendmail binary instead of an SMTP server
    #[serde(default)]
    pub use_sendmail: bool,
    /// SMTP server host (only used if use_sendmail is false)
    #[serde(default)]
    pub host: String,
    /// SMTP server port (only used if use_sendmail is false)
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// SMTP username (only used if use_sendmail is false)
    #[serde(default)]
    pub username: String,
    /// SMTP password (only used if use_sendmail is false)
    #[serde(default)]
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

/// Public-facing deployment settings. `public_url` is the base used for the
/// Inbox/Sent callback links embedded in notification emails; a `siteUrl`
/// field in the notify payload overrides it per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub public_url: String,
}

fn default_smtp_port() -> u16 {
    587
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            use_sendmail: false,
            host: "".to_string(),
            port: 587,
            username: "".to_string(),
            password: "".to_string(),
            from_email: "goodday@lettermeet.cafe".to_string(),
            from_name: "LetterMeet".to_string(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            public_url: "https://lettermeet.cafe".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                path: "./data/lettermeet.db".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                token_expiry_hours: 24,
            },
            smtp: SmtpConfig::default(),
            site: SiteConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Try to load from environment variable
        if let Ok(path) = std::env::var("LETTERMEET_CONFIG") {
            return Self::load_from_path(&PathBuf::from(path)).map(Self::apply_env);
        }

        // Try to load from default locations
        let default_paths = vec![
            PathBuf::from("lettermeet-server.toml"),
            PathBuf::from("config/lettermeet-server.toml"),
            PathBuf::from("/etc/lettermeet/server.toml"),
        ];

        for path in default_paths {
            if path.exists() {
                return Self::load_from_path(&path).map(Self::apply_env);
            }
        }

        // Return default config if no file found
        tracing::warn!("No config file found, using defaults");
        Ok(Self::apply_env(Self::default()))
    }

    fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Environment overrides for the deployment-specific bits.
    fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var("LETTERMEET_SITE_URL") {
            if !url.trim().is_empty() {
                self.site.public_url = url;
            }
        }
        if let Ok(secret) = std::env::var("LETTERMEET_JWT_SECRET") {
            if !secret.is_empty() {
                self.auth.jwt_secret = secret;
            }
        }
        if let Ok(password) = std::env::var("LETTERMEET_SMTP_PASSWORD") {
            self.smtp.password = password;
        }
        self
    }
}
