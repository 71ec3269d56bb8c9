use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Secrets that ship in sample `.env` files. Refused so a deployment never
/// signs tokens with a publicly known key.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me", "secret", "changeme"];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub session_ttl_hours: i64,
    pub push_function_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("BUDDY_JWT_SECRET")
            .context("Required environment variable 'BUDDY_JWT_SECRET' is not set")?;
        if jwt_secret.len() < 16 || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("BUDDY_JWT_SECRET is a placeholder or shorter than 16 characters");
        }

        let port = get("BUDDY_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse::<u16>()
            .context("BUDDY_PORT must be a valid port number")?;

        let session_ttl_hours = get("BUDDY_SESSION_TTL_HOURS")
            .unwrap_or_else(|| "168".into())
            .parse::<i64>()
            .context("BUDDY_SESSION_TTL_HOURS must be a whole number of hours")?;
        if session_ttl_hours <= 0 {
            bail!("BUDDY_SESSION_TTL_HOURS must be positive");
        }

        let push_function_url = get("BUDDY_PUSH_FUNCTION_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        Ok(Config {
            jwt_secret,
            db_path: PathBuf::from(get("BUDDY_DB_PATH").unwrap_or_else(|| "buddy.db".into())),
            host: get("BUDDY_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            session_ttl_hours,
            push_function_url,
        })
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_secret_is_set() {
        let config = Config::from_lookup(lookup(&[("BUDDY_JWT_SECRET", "a-long-enough-secret")])).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.db_path, PathBuf::from("buddy.db"));
        assert_eq!(config.session_ttl(), chrono::Duration::hours(168));
        assert!(config.push_function_url.is_none());
    }

    #[test]
    fn missing_or_placeholder_secrets_are_refused() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("BUDDY_JWT_SECRET", "dev-secret-change-me")])).is_err());
        assert!(Config::from_lookup(lookup(&[("BUDDY_JWT_SECRET", "short")])).is_err());
    }

    #[test]
    fn malformed_numbers_are_errors() {
        let secret = ("BUDDY_JWT_SECRET", "a-long-enough-secret");
        assert!(Config::from_lookup(lookup(&[secret, ("BUDDY_PORT", "http")])).is_err());
        assert!(Config::from_lookup(lookup(&[secret, ("BUDDY_SESSION_TTL_HOURS", "0")])).is_err());
    }

    #[test]
    fn blank_push_url_disables_delivery() {
        let config = Config::from_lookup(lookup(&[
            ("BUDDY_JWT_SECRET", "a-long-enough-secret"),
            ("BUDDY_PUSH_FUNCTION_URL", "  "),
        ]))
        .unwrap();
        assert!(config.push_function_url.is_none());
    }
}
