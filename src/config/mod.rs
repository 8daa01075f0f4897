//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing or
//! malformed. Connection strings are wrapped in secrecy::SecretString so
//! credentials never reach the logs.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::broker::QueueNames;
use crate::engine::ConsumerConfig;
use crate::error::{Error, Result};
use secrecy::SecretString;

pub const DEFAULT_QUEUE_NAME: &str = "channel_crawler";

#[derive(Debug)]
pub struct Config {
    pub broker_url: SecretString,
    pub database_url: SecretString,
    pub queue_name: String,
    pub dead_letter_queue: String,
    pub workers: usize,
    pub rate_limit: Duration,
    pub scrape_timeout: Duration,
    pub shutdown_grace: Duration,
    /// Seconds a read message stays invisible to other consumers.
    pub visibility_timeout: i32,
    pub chrome_bin: Option<PathBuf>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let queue_name = vars
            .get("CRAWLER_QUEUE_NAME")
            .unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string());
        let dead_letter_queue = vars
            .get("CRAWLER_DEAD_LETTER_QUEUE")
            .unwrap_or_else(|| format!("{queue_name}_dead"));
        if dead_letter_queue == queue_name {
            return Err(Error::Config(
                "CRAWLER_DEAD_LETTER_QUEUE must differ from CRAWLER_QUEUE_NAME".to_string(),
            ));
        }

        let workers: usize = vars.parsed("CRAWLER_WORKERS_AMOUNT", 5)?;
        if workers == 0 {
            return Err(Error::Config(
                "CRAWLER_WORKERS_AMOUNT must be at least 1".to_string(),
            ));
        }
        let rate_limit_ms: u64 = vars.parsed("CRAWLER_RATE_LIMIT_MS", 200)?;
        if rate_limit_ms == 0 {
            return Err(Error::Config(
                "CRAWLER_RATE_LIMIT_MS must be at least 1".to_string(),
            ));
        }
        let rate_limit = Duration::from_millis(rate_limit_ms);
        let scrape_timeout = Duration::from_secs(vars.parsed("CRAWLER_SCRAPE_TIMEOUT_SECS", 20)?);
        let shutdown_grace = Duration::from_secs(vars.parsed("CRAWLER_SHUTDOWN_GRACE_SECS", 10)?);

        // A message must stay hidden for as long as a slot can hold it:
        // a full queue at the rate gate, the scrape deadline, then the drain.
        let visibility_timeout: i32 = vars.parsed("CRAWLER_VISIBILITY_TIMEOUT_SECS", 60)?;
        let gate_wait = rate_limit.saturating_mul(u32::try_from(workers).unwrap_or(u32::MAX));
        let held = scrape_timeout
            .saturating_add(shutdown_grace)
            .saturating_add(gate_wait);
        let held_secs = held.as_secs() + u64::from(held.subsec_nanos() > 0);
        if !u64::try_from(visibility_timeout).is_ok_and(|vt| vt >= held_secs) {
            return Err(Error::Config(format!(
                "CRAWLER_VISIBILITY_TIMEOUT_SECS={visibility_timeout} must be at least {held_secs} \
                 (scrape timeout + shutdown grace + workers x rate limit)"
            )));
        }

        Ok(Self {
            broker_url: SecretString::from(vars.required("BROKER_URL")?),
            database_url: SecretString::from(vars.required("DATABASE_URL")?),
            queue_name,
            dead_letter_queue,
            workers,
            rate_limit,
            scrape_timeout,
            shutdown_grace,
            visibility_timeout,
            chrome_bin: vars.get("CHROME_BIN").map(PathBuf::from),
            otel_endpoint: vars.get("OTEL_ENDPOINT"),
            log_level: vars.get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn queue_names(&self) -> QueueNames {
        QueueNames {
            queue: self.queue_name.clone(),
            dead_letter: self.dead_letter_queue.clone(),
        }
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            workers: self.workers,
            rate_limit: self.rate_limit,
            scrape_timeout: self.scrape_timeout,
            shutdown_grace: self.shutdown_grace,
            ..ConsumerConfig::default()
        }
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    /// Unset and blank are the same.
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<String> {
        self.get(name)
            .ok_or_else(|| Error::Config(format!("required environment variable {name} is not set")))
    }

    fn parsed<T>(&self, name: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|e| Error::Config(format!("{name}={raw:?} is invalid: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("BROKER_URL", "postgres://broker@localhost/queue"),
        ("DATABASE_URL", "postgres://store@localhost/records"),
    ];

    #[test]
    fn defaults_apply() {
        let config = load(&REQUIRED).unwrap();
        assert_eq!(config.queue_name, "channel_crawler");
        assert_eq!(config.dead_letter_queue, "channel_crawler_dead");
        assert_eq!(config.workers, 5);
        assert_eq!(config.rate_limit, Duration::from_millis(200));
        assert_eq!(config.scrape_timeout, Duration::from_secs(20));
        assert_eq!(config.shutdown_grace, Duration::from_secs(10));
        assert_eq!(config.visibility_timeout, 60);
        assert!(config.chrome_bin.is_none());
        assert_eq!(config.log_level, "info");
        assert_eq!(
            config.broker_url.expose_secret(),
            "postgres://broker@localhost/queue"
        );
    }

    #[test]
    fn dead_letter_follows_queue_name() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CRAWLER_QUEUE_NAME", "apps"));
        let config = load(&pairs).unwrap();
        assert_eq!(config.queue_names().dead_letter, "apps_dead");
    }

    #[test]
    fn missing_broker_url_fails() {
        let err = load(&[("DATABASE_URL", "postgres://x")]).unwrap_err();
        assert!(err.to_string().contains("BROKER_URL"));
    }

    #[test]
    fn blank_required_counts_as_missing() {
        let err = load(&[("BROKER_URL", "  "), ("DATABASE_URL", "postgres://x")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn invalid_number_is_config_error() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CRAWLER_WORKERS_AMOUNT", "lots"));
        let err = load(&pairs).unwrap_err();
        assert!(err.to_string().contains("CRAWLER_WORKERS_AMOUNT"));
    }

    #[test]
    fn zero_workers_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CRAWLER_WORKERS_AMOUNT", "0"));
        assert!(load(&pairs).is_err());
    }

    #[test]
    fn visibility_timeout_must_outlast_a_held_message() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CRAWLER_VISIBILITY_TIMEOUT_SECS", "10"));
        let err = load(&pairs).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("at least 31"), "{err}");
    }

    #[test]
    fn negative_visibility_timeout_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CRAWLER_VISIBILITY_TIMEOUT_SECS", "-5"));
        assert!(matches!(load(&pairs).unwrap_err(), Error::Config(_)));
    }

    #[test]
    fn visibility_timeout_bound_follows_timeouts() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CRAWLER_SCRAPE_TIMEOUT_SECS", "50"));
        assert!(load(&pairs).is_err());

        // 50 + 10 + 5 x 0.2 = 61
        pairs.push(("CRAWLER_VISIBILITY_TIMEOUT_SECS", "61"));
        assert_eq!(load(&pairs).unwrap().visibility_timeout, 61);
    }

    #[test]
    fn consumer_config_carries_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CRAWLER_WORKERS_AMOUNT", "8"));
        pairs.push(("CRAWLER_RATE_LIMIT_MS", "50"));
        let consumer = load(&pairs).unwrap().consumer_config();
        assert_eq!(consumer.workers, 8);
        assert_eq!(consumer.rate_limit, Duration::from_millis(50));
    }
}
