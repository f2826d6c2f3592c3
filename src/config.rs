use crate::i18n::TargetLanguage;
use crate::populator::PopulatorSettings;
use crate::ratelimit::{RateLimitConfig, TierLimits};
use crate::retry::RetryConfig;
use crate::service::ServiceSettings;
use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // DeepL
    pub deepl_api_key: String,
    pub deepl_api_url: String,
    pub backend_timeout_secs: u64,

    // Storage
    pub database_url: String,
    pub cache_ttl_hours: i64,

    // Server
    pub port: u16,
    pub admin_api_key: Option<String>,
    pub trust_proxy_headers: bool,

    // Pipeline
    pub throughput_per_second: u32,
    pub sub_batch_size: usize,
    pub rate_limits: RateLimitConfig,

    // Priority cache population
    pub population_workers: usize,
    pub population_delay_ms: u64,
    pub readiness_threshold: usize,
    pub warm_languages: Vec<TargetLanguage>,
    pub warm_schedule_times: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // DeepL
            deepl_api_key: std::env::var("DEEPL_API_KEY").context("DEEPL_API_KEY not set")?,
            deepl_api_url: std::env::var("DEEPL_API_URL")
                .unwrap_or_else(|_| "https://api.deepl.com/v2/translate".to_string()),
            backend_timeout_secs: parse_var("BACKEND_TIMEOUT_SECS", 10)?,

            // Storage
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://translation_cache.db".to_string()),
            cache_ttl_hours: parse_var("CACHE_TTL_HOURS", 24)?,

            // Server
            port: parse_var("PORT", 8080)?,
            admin_api_key: std::env::var("ADMIN_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            trust_proxy_headers: parse_var("TRUST_PROXY_HEADERS", false)?,

            // Pipeline
            throughput_per_second: parse_var("THROUGHPUT_PER_SECOND", 10)?,
            sub_batch_size: parse_var("SUB_BATCH_SIZE", 5)?,
            rate_limits: RateLimitConfig {
                demo: tier_limits("DEMO", TierLimits::DEMO)?,
                paid: tier_limits("PAID", TierLimits::PAID)?,
            },

            // Priority cache population
            population_workers: parse_var("POPULATION_WORKERS", 3)?,
            population_delay_ms: parse_var("POPULATION_DELAY_MS", 100)?,
            readiness_threshold: parse_var("READINESS_THRESHOLD", 10)?,
            warm_languages: parse_languages(&std::env::var("WARM_LANGUAGES").unwrap_or_default())?,
            warm_schedule_times: std::env::var("WARM_SCHEDULE_TIMES")
                .unwrap_or_else(|_| "03:00".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cache_ttl_hours)
    }

    /// Pipeline settings derived from this configuration.
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            rate_limits: self.rate_limits,
            throughput_per_second: self.throughput_per_second,
            backend_timeout: self.backend_timeout(),
            sub_batch_size: self.sub_batch_size,
            population: PopulatorSettings {
                workers: self.population_workers,
                pacing_delay: Duration::from_millis(self.population_delay_ms),
                backend_timeout: self.backend_timeout(),
                readiness_threshold: self.readiness_threshold,
                retry: RetryConfig::population(),
            },
        }
    }
}

/// Read an optional variable, falling back to `default` when unset.
/// A set but unparseable value is an error rather than silently ignored.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

fn tier_limits(prefix: &str, defaults: TierLimits) -> Result<TierLimits> {
    Ok(TierLimits {
        per_minute: parse_var(&format!("{}_LIMIT_PER_MINUTE", prefix), defaults.per_minute)?,
        per_hour: parse_var(&format!("{}_LIMIT_PER_HOUR", prefix), defaults.per_hour)?,
        per_day: parse_var(&format!("{}_LIMIT_PER_DAY", prefix), defaults.per_day)?,
    })
}

fn parse_languages(raw: &str) -> Result<Vec<TargetLanguage>> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(|code| TargetLanguage::from_code(code).context("Invalid WARM_LANGUAGES entry"))
        .collect()
}
