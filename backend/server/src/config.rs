//! # Config
//!
//! Environment driven settings, loaded once at startup.
//!
//! Nothing here is fatal. Unset values fall back to defaults with an `info!`, unparsable values fall back
//! with a `warn!`. Credentials are read from the environment first, then from Docker secrets under
//! `/run/secrets/<NAME>`. A missing store credential leaves the server running with every store call failing,
//! a missing email key leaves it running without sending email.
use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::limiter::RateLimitConfig;

pub const DEFAULT_SITE_URL: &str = "https://accountabilitybet.ch";
pub const DEFAULT_EMAIL_FROM: &str = "Accountability Bet <noreply@accountabilitybet.ch>";

const SECRETS_DIR: &str = "/run/secrets";

// Ceilings keep `Instant + Duration` far from overflow.
const MAX_WINDOW_SECS: u64 = 30 * 24 * 60 * 60;
const MAX_TIMEOUT_MS: u64 = 10 * 60 * 1000;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store_url: String,
    pub store_key: String,
    pub resend_key: Option<String>,
    pub site_url: String,
    pub email_from: String,
    pub rate_limit: RateLimitConfig,
    pub rate_sweep_interval: Duration,
    pub count_cache_ttl: Duration,
    pub count_display_min: u64,
    pub store_timeout: Duration,
    pub email_timeout: Duration,
}

impl Config {
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok().or_else(|| read_secret(key)))
    }

    /// Builds a config from any key lookup. `load` plugs in the environment and secrets directory.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let store_url = var("SUPABASE_URL").unwrap_or_else(|| {
            warn!("SUPABASE_URL not set, store calls will fail");
            String::new()
        });

        let store_key = var("SUPABASE_SERVICE_ROLE_KEY").unwrap_or_else(|| {
            warn!("SUPABASE_SERVICE_ROLE_KEY not set, store calls will fail");
            String::new()
        });

        let resend_key = var("RESEND_API_KEY");
        if resend_key.is_none() {
            warn!("RESEND_API_KEY not set, waitlist emails will not be sent");
        }

        let site_url = try_load(&var, "SITE_URL", DEFAULT_SITE_URL.to_string());

        Self {
            port: try_load(&var, "RUST_PORT", 4321),
            store_url: store_url.trim_end_matches('/').to_string(),
            store_key,
            resend_key,
            site_url: site_url.trim_end_matches('/').to_string(),
            email_from: try_load(&var, "EMAIL_FROM", DEFAULT_EMAIL_FROM.to_string()),
            rate_limit: RateLimitConfig {
                limit: try_load(&var, "RATE_LIMIT", 5),
                window: Duration::from_secs(try_load_capped(
                    &var,
                    "RATE_WINDOW_SECS",
                    60 * 60,
                    MAX_WINDOW_SECS,
                )),
                max_keys: try_load(&var, "RATE_MAX_KEYS", 10_000),
            },
            rate_sweep_interval: Duration::from_secs(try_load_capped(
                &var,
                "RATE_SWEEP_SECS",
                5 * 60,
                MAX_WINDOW_SECS,
            )),
            count_cache_ttl: Duration::from_secs(try_load_capped(
                &var,
                "COUNT_CACHE_SECS",
                5 * 60,
                MAX_WINDOW_SECS,
            )),
            count_display_min: try_load(&var, "COUNT_DISPLAY_MIN", 100),
            store_timeout: Duration::from_millis(try_load_capped(
                &var,
                "STORE_TIMEOUT_MS",
                5_000,
                MAX_TIMEOUT_MS,
            )),
            email_timeout: Duration::from_millis(try_load_capped(
                &var,
                "EMAIL_TIMEOUT_MS",
                5_000,
                MAX_TIMEOUT_MS,
            )),
        }
    }
}

fn try_load<T, F>(var: &F, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };

    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value: {e}, using default: {default}");
        default
    })
}

fn try_load_capped<F>(var: &F, key: &str, default: u64, max: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    let value = try_load(var, key, default);

    if value > max {
        warn!("{key} value {value} too large, capping at {max}");
        return max;
    }

    value
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("{SECRETS_DIR}/{secret_name}");

    read_to_string(&path).map(|s| s.trim().to_string()).ok()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_empty() {
        let config = config_from(&[]);

        assert_eq!(config.port, 4321);
        assert_eq!(config.site_url, DEFAULT_SITE_URL);
        assert_eq!(config.email_from, DEFAULT_EMAIL_FROM);
        assert!(config.resend_key.is_none());
        assert!(config.store_url.is_empty());
        assert_eq!(config.rate_limit.limit, 5);
        assert_eq!(config.rate_limit.window, Duration::from_secs(3600));
        assert_eq!(config.count_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.count_display_min, 100);
    }

    #[test]
    fn reads_values_and_trims_urls() {
        let config = config_from(&[
            ("RUST_PORT", "8080"),
            ("SUPABASE_URL", "https://db.example.com/"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
            ("RESEND_API_KEY", "re_123"),
            ("SITE_URL", "https://example.com/"),
            ("RATE_LIMIT", "10"),
            ("STORE_TIMEOUT_MS", "250"),
        ]);

        assert_eq!(config.port, 8080);
        assert_eq!(config.store_url, "https://db.example.com");
        assert_eq!(config.store_key, "service");
        assert_eq!(config.resend_key.as_deref(), Some("re_123"));
        assert_eq!(config.site_url, "https://example.com");
        assert_eq!(config.rate_limit.limit, 10);
        assert_eq!(config.store_timeout, Duration::from_millis(250));
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = config_from(&[("RUST_PORT", "not-a-port"), ("RATE_LIMIT", "-3")]);

        assert_eq!(config.port, 4321);
        assert_eq!(config.rate_limit.limit, 5);
    }

    #[test]
    fn huge_durations_are_capped() {
        let huge = u64::MAX.to_string();
        let config = config_from(&[
            ("RATE_WINDOW_SECS", &huge),
            ("COUNT_CACHE_SECS", &huge),
            ("RATE_SWEEP_SECS", &huge),
            ("STORE_TIMEOUT_MS", &huge),
            ("EMAIL_TIMEOUT_MS", &huge),
        ]);

        assert_eq!(config.rate_limit.window, Duration::from_secs(MAX_WINDOW_SECS));
        assert_eq!(config.count_cache_ttl, Duration::from_secs(MAX_WINDOW_SECS));
        assert_eq!(config.rate_sweep_interval, Duration::from_secs(MAX_WINDOW_SECS));
        assert_eq!(config.store_timeout, Duration::from_millis(MAX_TIMEOUT_MS));
        assert_eq!(config.email_timeout, Duration::from_millis(MAX_TIMEOUT_MS));

        let now = std::time::Instant::now();
        let _ = now + config.rate_limit.window + config.count_cache_ttl;
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = config_from(&[("RESEND_API_KEY", "  ")]);

        assert!(config.resend_key.is_none());
    }
}
