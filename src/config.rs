//! Environment-driven configuration.
//!
//! - `CYBERLAB_URL` - Base URL of the progress service (default: `http://localhost:5000`)
//! - `CYBERLAB_DATA_DIR` - Data directory override for the local cache and service db
//! - `CYBERLAB_CORS_ORIGINS` - Comma-separated allowed origins for `serve` (permissive if unset)
//! - `CYBERLAB_AUTH_RATE_LIMIT` - Auth requests per client IP per minute (default: 20)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

pub const DEFAULT_URL: &str = "http://localhost:5000";
pub const DEFAULT_AUTH_RATE_LIMIT: u32 = 20;

/// Remote reads give up after this long.
pub const READ_TIMEOUT: Duration = Duration::from_secs(4);
/// Remote writes give up after this long.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub service_url: String,
    pub data_dir: Option<PathBuf>,
    pub cors_origins: Option<Vec<String>>,
    pub auth_rate_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_URL.to_string(),
            data_dir: None,
            cors_origins: None,
            auth_rate_limit: DEFAULT_AUTH_RATE_LIMIT,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let service_url = lookup("CYBERLAB_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_URL.to_string());

        let data_dir = lookup("CYBERLAB_DATA_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let cors_origins = lookup("CYBERLAB_CORS_ORIGINS").map(|s| {
            s.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        });

        let auth_rate_limit = lookup("CYBERLAB_AUTH_RATE_LIMIT")
            .and_then(|s| s.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_AUTH_RATE_LIMIT);

        Self {
            service_url,
            data_dir,
            cors_origins,
            auth_rate_limit,
        }
    }

    /// Where the local cache and the service database live.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let dirs = directories::ProjectDirs::from("", "", "cyberlab")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().to_path_buf())
    }

    pub fn local_cache_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("local.db"))
    }

    pub fn service_db_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("service.db"))
    }
}
