//! Process configuration.
//!
//! Read once at startup from the environment (after an optional `.env` has
//! been loaded) and handed to [`crate::app::build_app`]. Keys are the upper
//! case field names, e.g. `JWT_SECRET`, `DATABASE_URL`.

use chrono::Duration;
use ::config::{Config, ConfigError, Environment};
use serde::Deserialize;

use lms_auth::HashCost;

const DEV_JWT_SECRET: &str = "dev-secret";
const DEV_WEBHOOK_SECRET: &str = "whsec_dev";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    #[default]
    Development,
    Production,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: String,
    pub app_env: AppEnv,
    pub jwt_secret: Option<String>,
    pub jwt_expires_in_minutes: i64,
    pub jwt_cookie_expires_in_days: i64,
    /// Unset means the in-memory store.
    pub database_url: Option<String>,
    /// Unset means the offline gateway.
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_api_base: String,
    pub public_base_url: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub password_hash_memory_kib: Option<u32>,
    pub password_hash_iterations: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            app_env: AppEnv::Development,
            jwt_secret: None,
            jwt_expires_in_minutes: 24 * 60,
            jwt_cookie_expires_in_days: 1,
            database_url: None,
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: lms_payments::stripe::DEFAULT_API_BASE.to_string(),
            public_base_url: "http://localhost:8080".to_string(),
            admin_email: None,
            admin_password: None,
            password_hash_memory_kib: None,
            password_hash_iterations: None,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        Config::builder()
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.app_env == AppEnv::Production
    }

    pub fn jwt_secret(&self) -> &str {
        match self.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET
            }
        }
    }

    pub fn webhook_secret(&self) -> &str {
        match self.stripe_webhook_secret.as_deref() {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("STRIPE_WEBHOOK_SECRET not set; using insecure dev default");
                DEV_WEBHOOK_SECRET
            }
        }
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::minutes(self.jwt_expires_in_minutes.max(1))
    }

    pub fn cookie_max_age_secs(&self) -> i64 {
        self.jwt_cookie_expires_in_days.max(0) * 24 * 60 * 60
    }

    pub fn hash_cost(&self) -> HashCost {
        let defaults = HashCost::default();
        HashCost {
            memory_kib: self.password_hash_memory_kib.unwrap_or(defaults.memory_kib),
            iterations: self.password_hash_iterations.unwrap_or(defaults.iterations),
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("bind_addr", &self.bind_addr)
            .field("app_env", &self.app_env)
            .field("jwt_expires_in_minutes", &self.jwt_expires_in_minutes)
            .field("database", &self.database_url.as_ref().map(|_| "<set>"))
            .field("stripe", &self.stripe_secret_key.as_ref().map(|_| "<set>"))
            .field("stripe_api_base", &self.stripe_api_base)
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_development_and_in_memory() {
        let s = Settings::default();
        assert_eq!(s.app_env, AppEnv::Development);
        assert!(!s.is_production());
        assert!(s.database_url.is_none());
        assert_eq!(s.token_ttl(), Duration::days(1));
        assert_eq!(s.cookie_max_age_secs(), 86_400);
    }

    #[test]
    fn missing_secrets_fall_back_to_dev_defaults() {
        let s = Settings {
            jwt_secret: Some(String::new()),
            ..Settings::default()
        };
        assert_eq!(s.jwt_secret(), DEV_JWT_SECRET);
        assert_eq!(s.webhook_secret(), DEV_WEBHOOK_SECRET);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let s = Settings {
            jwt_secret: Some("top-secret".into()),
            stripe_secret_key: Some("sk_live_abc".into()),
            ..Settings::default()
        };
        let rendered = format!("{s:?}");
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("sk_live_abc"));
    }
}
