use std::path::PathBuf;

use anyhow::{Context, bail};

use agora_api::token::DEFAULT_TTL_HOURS;

/// Secrets that ship in sample `.env` files and must never sign real tokens.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me-to-a-random-string"];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub photo_dir: PathBuf,
    pub token_ttl_hours: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = get("AGORA_JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .context("AGORA_JWT_SECRET must be set")?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("AGORA_JWT_SECRET is still a placeholder value");
        }

        let port = match get("AGORA_PORT") {
            Some(p) => p.parse().with_context(|| format!("invalid AGORA_PORT {:?}", p))?,
            None => 8000,
        };

        let token_ttl_hours = match get("AGORA_TOKEN_TTL_HOURS") {
            Some(h) => h
                .parse()
                .with_context(|| format!("invalid AGORA_TOKEN_TTL_HOURS {:?}", h))?,
            None => DEFAULT_TTL_HOURS,
        };
        if token_ttl_hours <= 0 {
            bail!("AGORA_TOKEN_TTL_HOURS must be positive");
        }

        Ok(Self {
            jwt_secret,
            db_path: get("AGORA_DB_PATH").unwrap_or_else(|| "agora.db".into()).into(),
            host: get("AGORA_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            photo_dir: get("AGORA_PHOTO_DIR").unwrap_or_else(|| "./photos".into()).into(),
            token_ttl_hours,
        })
    }
}
