use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, ensure};

/// Accepted range for `WARBLER_TOKEN_TTL_DAYS`.
const TOKEN_TTL_DAYS: std::ops::RangeInclusive<i64> = 1..=3650;

/// Server settings, read from `WARBLER_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = var("WARBLER_PORT", "5000");
        let ttl = var("WARBLER_TOKEN_TTL_DAYS", "30");
        let token_ttl_days: i64 = ttl
            .parse()
            .with_context(|| format!("invalid WARBLER_TOKEN_TTL_DAYS '{}'", ttl))?;
        ensure!(
            TOKEN_TTL_DAYS.contains(&token_ttl_days),
            "WARBLER_TOKEN_TTL_DAYS must be between {} and {}, got {}",
            TOKEN_TTL_DAYS.start(),
            TOKEN_TTL_DAYS.end(),
            token_ttl_days
        );

        Ok(Self {
            db_path: PathBuf::from(var("WARBLER_DB_PATH", "warbler.db")),
            host: var("WARBLER_HOST", "0.0.0.0"),
            port: port
                .parse()
                .with_context(|| format!("invalid WARBLER_PORT '{}'", port))?,
            jwt_secret: var("WARBLER_JWT_SECRET", "dev-secret-change-me"),
            token_ttl_days,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
