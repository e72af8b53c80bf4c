use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context};

use crate::auth::jwt::JwtConfig;

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => bail!("LOG_FORMAT must be 'pretty' or 'json', got '{other}'"),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// Every field except the JWT secret has a default suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins, from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// PostgreSQL URL. Without one the server runs on the in-memory store.
    pub database_url: Option<String>,
    /// Directory request photos are written under.
    pub media_root: PathBuf,
    /// External base URL; photo URLs are `{public_base_url}/media/...`.
    pub public_base_url: String,
    /// Upper bound on a request body, photo included.
    pub max_upload_bytes: usize,
    pub log_format: LogFormat,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `DATABASE_URL`         | unset (in-memory store)    |
    /// | `MEDIA_ROOT`           | `storage/media`            |
    /// | `PUBLIC_BASE_URL`      | `http://localhost:3000`    |
    /// | `MAX_UPLOAD_BYTES`     | `20971520`                 |
    /// | `LOG_FORMAT`           | `pretty`                   |
    pub fn from_env() -> anyhow::Result<Self> {
        let cors_origins = env_or("CORS_ORIGINS", "http://localhost:5173".to_string())?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Ok(Self {
            host: env_or("HOST", "0.0.0.0".to_string())?,
            port: env_or("PORT", 3000)?,
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30)?,
            database_url,
            media_root: env_or("MEDIA_ROOT", PathBuf::from("storage/media"))?,
            public_base_url: env_or("PUBLIC_BASE_URL", "http://localhost:3000".to_string())?,
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            log_format: env_or("LOG_FORMAT", LogFormat::Pretty)?,
            jwt: JwtConfig::from_env()?,
        })
    }
}

/// Parse `key` from the environment, or fall back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Invalid value for {key}: '{raw}'")),
        Err(_) => Ok(default),
    }
}
