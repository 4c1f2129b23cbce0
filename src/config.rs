use std::{env, path::PathBuf, str::FromStr};

use derive_more::Display;
use log::warn;

use crate::service::crypto;

pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, Display)]
pub enum ConfigError {
    #[display(fmt = "invalid value '{}' for {}", value, key)]
    Invalid { key: &'static str, value: String },
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub admin_password: Option<String>,
    pub admin_token_secret: String,
    pub resend_api_key: Option<String>,
    pub mail_from: String,
    pub upload_dir: PathBuf,
    /// Adds the `Secure` attribute to cookies.
    pub secure_cookies: bool,
    pub bcrypt_cost: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: None,
            db_max_connections: 5,
            admin_password: None,
            admin_token_secret: crypto::generate_token(),
            resend_api_key: None,
            mail_from: "CampusHub <onboarding@resend.dev>".to_string(),
            upload_dir: PathBuf::from("public/uploads"),
            secure_cookies: false,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn check_bcrypt_cost(cost: u32) -> Result<u32, ConfigError> {
    if (MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        Ok(cost)
    } else {
        Err(ConfigError::Invalid {
            key: "BCRYPT_COST",
            value: cost.to_string(),
        })
    }
}

impl Config {
    /// Reads the process environment; call `dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let admin_token_secret = var("ADMIN_TOKEN_SECRET").unwrap_or_else(|| {
            warn!("ADMIN_TOKEN_SECRET is not set, admin sessions will not survive a restart");
            defaults.admin_token_secret.clone()
        });
        let bcrypt_cost = check_bcrypt_cost(parse_var("BCRYPT_COST", defaults.bcrypt_cost)?)?;

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
            database_url: var("DATABASE_URL"),
            db_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", defaults.db_max_connections)?,
            admin_password: var("ADMIN_PASSWORD"),
            admin_token_secret,
            resend_api_key: var("RESEND_API_KEY"),
            mail_from: var("MAIL_FROM").unwrap_or(defaults.mail_from),
            upload_dir: var("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            secure_cookies: var("APP_ENV").as_deref() == Some("production"),
            bcrypt_cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcrypt_cost_outside_supported_range_is_rejected() {
        assert_eq!(check_bcrypt_cost(MIN_BCRYPT_COST).unwrap(), MIN_BCRYPT_COST);
        assert_eq!(check_bcrypt_cost(12).unwrap(), 12);
        assert_eq!(check_bcrypt_cost(MAX_BCRYPT_COST).unwrap(), MAX_BCRYPT_COST);
        assert!(check_bcrypt_cost(3).is_err());
        assert!(check_bcrypt_cost(32).is_err());
        assert!((MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&Config::default().bcrypt_cost));
    }
}
