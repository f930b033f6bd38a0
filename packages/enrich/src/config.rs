//! Environment-derived pipeline configuration.
//!
//! Every knob is a simple scalar override with a default; there is no
//! config file. Unparseable values fall back to the default with a logged
//! warning rather than aborting the run.

use std::time::Duration;

/// Default Overpass interpreter endpoint.
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
/// Default global ceiling for in-flight Overpass queries.
pub const DEFAULT_CONCURRENCY: usize = 15;
/// Default number of positions per batch.
pub const DEFAULT_BATCH_SIZE: u64 = 45;
/// Default pacing delay between batches, in milliseconds.
pub const DEFAULT_BATCH_DELAY_MS: u64 = 200;
/// Default rate-limit retry ceiling per query.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Tunable parameters of one enrichment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichConfig {
    /// Overpass interpreter endpoint URL.
    pub overpass_url: String,
    /// Global ceiling for in-flight Overpass queries.
    pub concurrency: usize,
    /// Number of positions fetched per batch.
    pub batch_size: u64,
    /// Pacing delay between batches.
    pub batch_delay: Duration,
    /// Rate-limit retry ceiling per query.
    pub max_retries: u32,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl EnrichConfig {
    /// Reads the configuration from `SPEED_MAP_*` environment variables,
    /// falling back to the defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            overpass_url: std::env::var("SPEED_MAP_OVERPASS_URL")
                .unwrap_or_else(|_| DEFAULT_OVERPASS_URL.to_string()),
            concurrency: env_parse("SPEED_MAP_CONCURRENCY", DEFAULT_CONCURRENCY),
            batch_size: env_parse("SPEED_MAP_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            batch_delay: Duration::from_millis(env_parse(
                "SPEED_MAP_BATCH_DELAY_MS",
                DEFAULT_BATCH_DELAY_MS,
            )),
            max_retries: env_parse("SPEED_MAP_MAX_RETRIES", DEFAULT_MAX_RETRIES),
        }
    }
}

fn env_parse<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(name).map_or(default, |raw| parse_or(name, &raw, default))
}

fn parse_or<T>(name: &str, raw: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    raw.parse().unwrap_or_else(|_| {
        log::warn!("Ignoring unparseable {name}={raw}, using default");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let config = EnrichConfig::default();
        assert_eq!(config.overpass_url, DEFAULT_OVERPASS_URL);
        assert_eq!(config.concurrency, 15);
        assert_eq!(config.batch_size, 45);
        assert_eq!(config.batch_delay, Duration::from_millis(200));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn parse_or_accepts_valid_values() {
        assert_eq!(parse_or("SPEED_MAP_CONCURRENCY", "8", 15usize), 8);
        assert_eq!(parse_or("SPEED_MAP_BATCH_SIZE", "100", 45u64), 100);
    }

    #[test]
    fn parse_or_falls_back_on_garbage() {
        assert_eq!(parse_or("SPEED_MAP_CONCURRENCY", "many", 15usize), 15);
        assert_eq!(parse_or("SPEED_MAP_BATCH_SIZE", "-3", 45u64), 45);
    }
}
