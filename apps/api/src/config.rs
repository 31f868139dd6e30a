use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => bail!("STORAGE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,
    /// Only required for the postgres backend.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_expire_hours: i64,
    pub bcrypt_cost: u32,
    pub client_url: String,
    pub upload_dir: PathBuf,
    pub max_file_size: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage_backend: StorageBackend = env_or("STORAGE_BACKEND", "postgres").parse()?;
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            bail!("Required environment variable 'DATABASE_URL' is not set");
        }

        Ok(Config {
            storage_backend,
            database_url,
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10")?,
            jwt_secret: require_env("JWT_SECRET")?,
            jwt_expire_hours: parse_env("JWT_EXPIRE_HOURS", "168")?,
            bcrypt_cost: parse_env("BCRYPT_COST", "12")?,
            client_url: env_or("CLIENT_URL", "http://localhost:3000"),
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads")),
            max_file_size: parse_env("MAX_FILE_SIZE", "5242880")?,
            port: parse_env("PORT", "5000")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }

    #[cfg(test)]
    pub fn for_tests(upload_dir: &std::path::Path) -> Self {
        Config {
            storage_backend: StorageBackend::Memory,
            database_url: None,
            database_max_connections: 1,
            jwt_secret: "test-secret".to_string(),
            jwt_expire_hours: 1,
            bcrypt_cost: 4,
            client_url: "http://localhost:3000".to_string(),
            upload_dir: upload_dir.to_path_buf(),
            max_file_size: 64 * 1024,
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env_or(key, default);
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_parses_case_insensitively() {
        assert_eq!("Memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert_eq!("postgres".parse::<StorageBackend>().unwrap(), StorageBackend::Postgres);
        assert!("mongo".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let port: u16 = parse_env("JOBBOARD_TEST_UNSET_PORT", "5000").unwrap();
        assert_eq!(port, 5000);
        assert!(parse_env::<u16>("JOBBOARD_TEST_UNSET_PORT", "not-a-port").is_err());
    }
}
