use std::path::PathBuf;

use anyhow::Context;
use tracing::warn;

pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", DEV_JWT_SECRET];

/// Server settings, read from `INK_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let port = var("INK_PORT", "3000");
        let port: u16 = port
            .parse()
            .with_context(|| format!("INK_PORT is not a valid port: {}", port))?;

        let jwt_secret = var("INK_JWT_SECRET", DEV_JWT_SECRET);
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            warn!("INK_JWT_SECRET is unset or a placeholder; sessions can be forged. Set it before deploying.");
        }

        Ok(Self {
            host: var("INK_HOST", "0.0.0.0"),
            port,
            db_path: var("INK_DB_PATH", "inkconnect.db").into(),
            jwt_secret,
            upload_dir: var("INK_UPLOAD_DIR", "./public/uploads").into(),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
