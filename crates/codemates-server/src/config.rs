use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

pub const PLACEHOLDER_SECRET: &str = "dev-secret-change-me";
pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;

/// Server configuration loaded from environment variables.
///
/// | Env Var                    | Default                |
/// |----------------------------|------------------------|
/// | `CODEMATES_HOST`           | `0.0.0.0`              |
/// | `CODEMATES_PORT`           | `3000`                 |
/// | `CODEMATES_DB_PATH`        | `codemates.db`         |
/// | `CODEMATES_JWT_SECRET`     | `dev-secret-change-me` |
/// | `CODEMATES_TOKEN_TTL_DAYS` | `30` (at most 3650)    |
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = var("CODEMATES_PORT", "3000")
            .parse()
            .context("CODEMATES_PORT must be a valid port number")?;
        let token_ttl_days: i64 = var("CODEMATES_TOKEN_TTL_DAYS", "30")
            .parse()
            .context("CODEMATES_TOKEN_TTL_DAYS must be a whole number of days")?;
        if !(1..=MAX_TOKEN_TTL_DAYS).contains(&token_ttl_days) {
            anyhow::bail!("CODEMATES_TOKEN_TTL_DAYS must be between 1 and {}", MAX_TOKEN_TTL_DAYS);
        }

        Ok(Self {
            host: var("CODEMATES_HOST", "0.0.0.0"),
            port,
            db_path: PathBuf::from(var("CODEMATES_DB_PATH", "codemates.db")),
            jwt_secret: var("CODEMATES_JWT_SECRET", PLACEHOLDER_SECRET),
            token_ttl_days,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        self.jwt_secret == PLACEHOLDER_SECRET
    }
}
