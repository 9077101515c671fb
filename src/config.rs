use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub oauth_secrets: PathBuf,
    pub media_dir: PathBuf,
    pub public_url: String,
    pub secure_cookies: bool,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self {
            port: try_load("PACK_PORT", "8080")?,
            database_url: try_load("DATABASE_URL", "sqlite://pack.db?mode=rwc")?,
            oauth_secrets: try_load("PACK_OAUTH_SECRETS", "client_secret.json")?,
            media_dir: try_load("PACK_MEDIA_DIR", "media")?,
            public_url: try_load::<String>("PACK_PUBLIC_URL", "http://localhost:8080")?
                .trim_end_matches('/')
                .to_owned(),
            secure_cookies: try_load("PACK_SECURE_COOKIES", "false")?,
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = match dotenv::var(key).or_else(|_| env::var(key)) {
        Ok(value) => value,
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default.to_owned()
        }
    };

    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow::anyhow!("environment misconfigured: {key}={raw}: {e}")
    })
}
