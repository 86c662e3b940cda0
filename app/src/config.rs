use crate::error::ConfigError;
use crate::flowerpower::FlowerPowerConfig;
use crate::indexer::IndexerConfig;
use crate::thingful::ThingfulConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const MAX_WINDOW_DAYS: i64 = 365;
const MAX_REINDEX_HOURS: i64 = 24 * 365;

pub struct Config {
    database_url: String,
    server_port: u16,
    thingful_url: String,
    thingful_key: String,
    parrot_url: String,
    client_timeout_secs: u64,
    indexer_delay_secs: u64,
    indexer_throttle_ms: u64,
    index_window_days: i64,
    reindex_interval_hours: i64,
    concurrency: usize,
    max_things: usize,
    no_indexer: bool,
    verbose: bool,
}

impl Config {
    /// Reads the process environment, after merging in an optional `.env` file
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));
        let config = Config {
            database_url: required("DATABASE_URL")?,
            thingful_key: required("THINGFUL_KEY")?,
            server_port: parse_or(&lookup, "SERVER_PORT", 3001)?,
            thingful_url: lookup("THINGFUL_URL")
                .unwrap_or_else(|| "https://api.thingful.net".to_owned()),
            parrot_url: lookup("PARROT_URL")
                .unwrap_or_else(|| "https://api-flower-power-pot.parrot.com".to_owned()),
            client_timeout_secs: parse_or(&lookup, "CLIENT_TIMEOUT_SECS", 10)?,
            indexer_delay_secs: parse_or(&lookup, "INDEXER_DELAY_SECS", 10)?,
            indexer_throttle_ms: parse_or(&lookup, "INDEXER_THROTTLE_MS", 10_000)?,
            index_window_days: parse_or(&lookup, "INDEX_WINDOW_DAYS", kudzu_core::DEFAULT_WINDOW_DAYS)?,
            reindex_interval_hours: parse_or(&lookup, "REINDEX_INTERVAL_HOURS", 24)?,
            concurrency: parse_or(&lookup, "CONCURRENCY", 3)?,
            max_things: parse_or(&lookup, "MAX_THINGS", 10)?,
            no_indexer: parse_or(&lookup, "NO_INDEXER", false)?,
            verbose: parse_or(&lookup, "VERBOSE", false)?,
        };

        if config.concurrency == 0 {
            return Err(ConfigError::Invalid("CONCURRENCY", "0".to_owned()));
        }
        if config.indexer_delay_secs == 0 {
            return Err(ConfigError::Invalid("INDEXER_DELAY_SECS", "0".to_owned()));
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&config.index_window_days) {
            return Err(ConfigError::Invalid(
                "INDEX_WINDOW_DAYS",
                config.index_window_days.to_string(),
            ));
        }
        if !(1..=MAX_REINDEX_HOURS).contains(&config.reindex_interval_hours) {
            return Err(ConfigError::Invalid(
                "REINDEX_INTERVAL_HOURS",
                config.reindex_interval_hours.to_string(),
            ));
        }
        Ok(config)
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    pub fn no_indexer(&self) -> bool {
        self.no_indexer
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn indexer(&self) -> IndexerConfig {
        IndexerConfig {
            delay: Duration::from_secs(self.indexer_delay_secs),
            throttle: Duration::from_millis(self.indexer_throttle_ms),
            window: chrono::Duration::days(self.index_window_days),
        }
    }

    pub fn reindex_interval(&self) -> chrono::Duration {
        chrono::Duration::hours(self.reindex_interval_hours)
    }

    pub fn flowerpower(&self) -> FlowerPowerConfig {
        FlowerPowerConfig {
            base_url: self.parrot_url.trim_end_matches('/').to_owned(),
        }
    }

    pub fn thingful(&self) -> ThingfulConfig {
        ThingfulConfig {
            base_url: self.thingful_url.trim_end_matches('/').to_owned(),
            api_key: self.thingful_key.clone(),
            concurrency: self.concurrency,
            max_things: self.max_things,
            data_base_url: self.parrot_url.trim_end_matches('/').to_owned(),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, raw.clone())),
    }
}

#[cfg(test)]
mod test {
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
    fn test_defaults() {
        let config =
            Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("THINGFUL_KEY", "k")]))
                .unwrap();
        let indexer = config.indexer();
        assert_eq!(Duration::from_secs(10), indexer.delay);
        assert_eq!(chrono::Duration::days(10), indexer.window);
        assert_eq!(chrono::Duration::hours(24), config.reindex_interval());
        assert_eq!(3, config.thingful().concurrency);
        assert_eq!(10, config.thingful().max_things);
        assert!(!config.no_indexer());
    }

    #[test]
    fn test_missing_required() {
        let res = Config::from_lookup(lookup(&[("THINGFUL_KEY", "k")]));
        assert!(matches!(res, Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn test_invalid_number() {
        let res = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("THINGFUL_KEY", "k"),
            ("INDEX_WINDOW_DAYS", "ten"),
        ]));
        assert!(matches!(res, Err(ConfigError::Invalid("INDEX_WINDOW_DAYS", _))));
    }

    #[test]
    fn test_zero_delay_rejected() {
        let res = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("THINGFUL_KEY", "k"),
            ("INDEXER_DELAY_SECS", "0"),
        ]));
        assert!(matches!(res, Err(ConfigError::Invalid("INDEXER_DELAY_SECS", _))));
    }

    #[test]
    fn test_out_of_range_intervals_rejected() {
        for (key, value) in [
            ("INDEX_WINDOW_DAYS", "0"),
            ("INDEX_WINDOW_DAYS", "999999999999"),
            ("REINDEX_INTERVAL_HOURS", "-1"),
        ] {
            let res = Config::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://x"),
                ("THINGFUL_KEY", "k"),
                (key, value),
            ]));
            assert!(
                matches!(res, Err(ConfigError::Invalid(k, _)) if k == key),
                "{}={} accepted",
                key,
                value
            );
        }
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("THINGFUL_KEY", "k"),
            ("THINGFUL_URL", "http://localhost:9000/"),
            ("INDEXER_THROTTLE_MS", "0"),
            ("NO_INDEXER", "true"),
        ]))
        .unwrap();
        assert_eq!("http://localhost:9000", config.thingful().base_url);
        assert_eq!(Duration::ZERO, config.indexer().throttle);
        assert!(config.no_indexer());
    }
}
