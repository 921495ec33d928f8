use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};

use crate::page_retriever::RetryPolicy;
use crate::ratelimit::PageThrottle;
use crate::store::AttractionFilter;

/// The env vars needed for scraping. Everything but the database URL has a
/// default.
#[derive(Debug, Deserialize)]
pub struct ScrapingEnv {
    database_url: String,
    #[serde(default = "default_base_url")]
    base_url: String,
    #[serde(default = "default_search_type")]
    search_type: String,
    #[serde(default = "default_reviews_per_page")]
    reviews_per_page: usize,
    #[serde(default = "default_attr_types")]
    attr_types: String,
    #[serde(default = "default_page_delay_ms")]
    page_delay_ms: u64,
    #[serde(default = "default_page_jitter_ms")]
    page_jitter_ms: u64,
    #[serde(default = "default_retry_max_attempts")]
    retry_max_attempts: u32,
    #[serde(default = "default_retry_initial_ms")]
    retry_initial_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    retry_max_ms: u64,
    #[serde(default = "default_requests_per_second")]
    requests_per_second: u32,
}

fn default_base_url() -> String {
    "https://www.tripadvisor.com".to_string()
}

fn default_search_type() -> String {
    "Reviews".to_string()
}

fn default_reviews_per_page() -> usize {
    10
}

fn default_attr_types() -> String {
    "all".to_string()
}

fn default_page_delay_ms() -> u64 {
    1300
}

fn default_page_jitter_ms() -> u64 {
    1000
}

fn default_retry_max_attempts() -> u32 {
    8
}

fn default_retry_initial_ms() -> u64 {
    1000
}

fn default_retry_max_ms() -> u64 {
    60_000
}

fn default_requests_per_second() -> u32 {
    2
}

#[derive(Debug, Clone)]
pub struct ScrapingConfig {
    pub database_url: String,
    pub base_url: String,
    pub search_type: String,
    pub reviews_per_page: usize,
    pub attraction_filter: AttractionFilter,
    pub page_throttle: PageThrottle,
    pub retry: RetryPolicy,
    pub requests_per_second: u32,
}

impl ScrapingConfig {
    pub fn new() -> anyhow::Result<Self> {
        let scraping_env = ScrapingEnv::load_from_env()?;
        Ok(Self::from_env(scraping_env))
    }

    pub fn from_env(env: ScrapingEnv) -> Self {
        Self {
            database_url: env.database_url,
            base_url: env.base_url.trim_end_matches('/').to_string(),
            search_type: env.search_type,
            reviews_per_page: env.reviews_per_page,
            attraction_filter: AttractionFilter::parse(&env.attr_types),
            page_throttle: PageThrottle::new(
                Duration::from_millis(env.page_delay_ms),
                Duration::from_millis(env.page_jitter_ms),
            ),
            retry: RetryPolicy {
                max_attempts: env.retry_max_attempts,
                initial_delay: Duration::from_millis(env.retry_initial_ms),
                max_delay: Duration::from_millis(env.retry_max_ms),
            },
            requests_per_second: env.requests_per_second,
        }
    }

    /// Absolute URL of a site-relative attraction path.
    pub fn attraction_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }
}

// Extension trait.
pub trait LoadFromEnv: DeserializeOwned {
    fn load_from_env() -> anyhow::Result<Self> {
        // Don't throw an error if .env file doesn't exist.
        let _ = dotenv::dotenv();
        let config =
            envy::from_env::<Self>().context("failed to load env variables into config struct")?;
        Ok(config)
    }
}

impl<T: DeserializeOwned> LoadFromEnv for T {}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> ScrapingEnv {
        envy::from_iter(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .unwrap()
    }

    #[test]
    fn defaults_apply() {
        let config = ScrapingConfig::from_env(env(&[("DATABASE_URL", "postgres://localhost/ta")]));
        assert_eq!(config.base_url, "https://www.tripadvisor.com");
        assert_eq!(config.search_type, "Reviews");
        assert_eq!(config.reviews_per_page, 10);
        assert_eq!(config.attraction_filter, AttractionFilter::All);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.requests_per_second, 2);
    }

    #[test]
    fn overrides_are_read() {
        let config = ScrapingConfig::from_env(env(&[
            ("DATABASE_URL", "postgres://localhost/ta"),
            ("BASE_URL", "https://www.tripadvisor.co.uk/"),
            ("ATTR_TYPES", "Sights & Landmarks,Museums"),
            ("RETRY_MAX_ATTEMPTS", "3"),
        ]));
        assert_eq!(config.base_url, "https://www.tripadvisor.co.uk");
        assert_eq!(
            config.attraction_filter,
            AttractionFilter::Categories(vec!["Sights & Landmarks".into(), "Museums".into()])
        );
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let result: Result<ScrapingEnv, _> = envy::from_iter(Vec::<(String, String)>::new());
        assert!(result.is_err());
    }

    #[test]
    fn attraction_url_joins_paths() {
        let config = ScrapingConfig::from_env(env(&[("DATABASE_URL", "postgres://x")]));
        assert_eq!(
            config.attraction_url("/Attraction-42"),
            "https://www.tripadvisor.com/Attraction-42"
        );
        assert_eq!(
            config.attraction_url("https://other.example/A"),
            "https://other.example/A"
        );
    }
}
