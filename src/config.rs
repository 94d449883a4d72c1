//! Application settings, read through Rocket's figment.
//!
//! Sources in increasing priority: `Rocket.toml` (profile aware), `ROCKET_*`
//! environment variables, then `RPRACTICE_*` environment variables.

use rocket::figment::providers::Env;
use rocket::figment::Figment;
use serde::{Deserialize, Serialize};

use std::path::PathBuf;

use crate::internal_error::{InternalError, InternalResult};

pub const ENV_PREFIX: &str = "RPRACTICE_";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub upload_dir: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub grammar_url: String,
    pub grammar_language: String,
    pub max_images: usize,
    pub max_audios: usize,
    pub max_upload_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> AppConfig {
        AppConfig {
            database_path: PathBuf::from("rpractice.db"),
            upload_dir: PathBuf::from("uploads"),
            jwt_secret: String::new(),
            token_ttl_secs: 3600,
            grammar_url: String::from("https://api.languagetool.org/v2/check"),
            grammar_language: String::from("fr"),
            max_images: 3,
            max_audios: 3,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Rocket's default figment with our own environment overrides merged on top.
pub fn figment() -> Figment {
    rocket::Config::figment().merge(Env::prefixed(ENV_PREFIX).global())
}

impl AppConfig {
    pub fn from_figment(figment: &Figment) -> InternalResult<AppConfig> {
        let config: AppConfig = figment
            .extract()
            .map_err(|e| InternalError::Config(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> InternalResult<()> {
        if self.jwt_secret.trim().is_empty() {
            return Err(InternalError::Config(format!(
                "jwt_secret must be set (Rocket.toml or {}JWT_SECRET)",
                ENV_PREFIX
            )));
        }

        if self.token_ttl_secs == 0 {
            return Err(InternalError::Config(String::from(
                "token_ttl_secs must be positive",
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::figment::providers::Serialized;

    #[test]
    fn defaults_need_a_secret() {
        let figment = Figment::from(Serialized::defaults(AppConfig::default()));
        assert!(matches!(
            AppConfig::from_figment(&figment),
            Err(InternalError::Config(_))
        ));
    }

    #[test]
    fn overrides_are_applied() {
        let figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(("jwt_secret", "s3cret"))
            .merge(("max_images", 5));

        let config = AppConfig::from_figment(&figment).unwrap();
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.max_images, 5);
        assert_eq!(config.max_audios, 3);
        assert_eq!(config.grammar_language, "fr");
    }
}
