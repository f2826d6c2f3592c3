//! Request orchestration.
//!
//! `TranslationService` owns every piece of shared pipeline state and is
//! constructed once at startup. A request walks:
//!
//! 1. catalog identification, then the priority cache
//! 2. the content cache
//! 3. the IP rate limiter (only now, since a paid call is about to happen)
//! 4. the throughput governor
//! 5. the backend call, followed by a content cache write
//!
//! Store failures never fail a request. They are logged, counted, and the
//! lookup is treated as a miss.

use crate::backend::{translate_within, TranslationBackend};
use crate::clock::Clock;
use crate::error::{StoreError, TranslateError};
use crate::i18n::{MessageCatalog, TargetLanguage};
use crate::metrics::{LatencyCategory, MetricsReport, PipelineMetrics};
use crate::populator::{CacheStatus, PopulateStatus, PopulatorSettings, PriorityPopulator};
use crate::ratelimit::{IpRateLimiter, RateDecision, RateLimitConfig, ServiceTier};
use crate::store::CacheStore;
use crate::throughput::ThroughputLimiter;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Largest number of texts accepted in one batch.
pub const MAX_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub rate_limits: RateLimitConfig,
    pub throughput_per_second: u32,
    pub backend_timeout: Duration,
    /// Batch members translated concurrently
    pub sub_batch_size: usize,
    pub population: PopulatorSettings,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            rate_limits: RateLimitConfig::default(),
            throughput_per_second: 10,
            backend_timeout: Duration::from_secs(10),
            sub_batch_size: 5,
            population: PopulatorSettings::default(),
        }
    }
}

/// Outcome of translating one text.
#[derive(Debug, Serialize)]
pub struct TranslationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    pub cached: bool,
    pub priority: bool,
    /// Seconds spent serving the request
    pub response_time: f64,
    /// A cache read or write failed and was treated as a miss
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cache_degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TranslateError>,
}

impl TranslationResponse {
    fn failure(error: TranslateError, started: Instant, cache_degraded: bool) -> Self {
        Self {
            success: false,
            translation: None,
            cached: false,
            priority: false,
            response_time: started.elapsed().as_secs_f64(),
            cache_degraded,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PopulateResponse {
    pub language: TargetLanguage,
    pub status: PopulateStatus,
}

/// A translation and the path that produced it.
struct Served {
    translation: String,
    path: LatencyCategory,
}

pub struct TranslationService {
    store: Arc<dyn CacheStore>,
    backend: Arc<dyn TranslationBackend>,
    rate_limiter: IpRateLimiter,
    throughput: ThroughputLimiter,
    populator: PriorityPopulator,
    metrics: PipelineMetrics,
    backend_timeout: Duration,
    sub_batch_size: usize,
}

impl TranslationService {
    pub fn new(
        store: Arc<dyn CacheStore>,
        backend: Arc<dyn TranslationBackend>,
        clock: Arc<dyn Clock>,
        settings: ServiceSettings,
    ) -> Self {
        let populator =
            PriorityPopulator::new(store.clone(), backend.clone(), settings.population);

        Self {
            store,
            backend,
            rate_limiter: IpRateLimiter::new(settings.rate_limits, clock),
            throughput: ThroughputLimiter::new(settings.throughput_per_second),
            populator,
            metrics: PipelineMetrics::new(),
            backend_timeout: settings.backend_timeout,
            sub_batch_size: settings.sub_batch_size.max(1),
        }
    }

    pub fn populator(&self) -> &PriorityPopulator {
        &self.populator
    }

    pub fn rate_limiter(&self) -> &IpRateLimiter {
        &self.rate_limiter
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Translate one text for a caller.
    ///
    /// `credential` only selects the service tier; it is assumed to have been
    /// authenticated upstream. Every failure is reported inside the response.
    pub async fn handle_translate(
        &self,
        text: &str,
        target: &str,
        credential: Option<&str>,
        source_ip: &str,
    ) -> TranslationResponse {
        let started = Instant::now();
        let lang = match TargetLanguage::from_code(target) {
            Ok(lang) => lang,
            Err(e) => return TranslationResponse::failure(e, started, false),
        };
        let tier = ServiceTier::from_credential(credential);

        self.translate_one(text, lang, tier, source_ip).await
    }

    /// Translate up to [`MAX_BATCH_SIZE`] texts.
    ///
    /// Oversized or empty batches and unknown languages are rejected before
    /// any cache lookup. Members run in sub-batches; within a sub-batch they
    /// run concurrently, and each one is rate limited on its own. A failing
    /// member does not affect the others.
    pub async fn handle_batch(
        &self,
        texts: &[String],
        target: &str,
        credential: Option<&str>,
        source_ip: &str,
    ) -> Result<Vec<TranslationResponse>, TranslateError> {
        if texts.len() > MAX_BATCH_SIZE {
            return Err(TranslateError::BatchTooLarge {
                size: texts.len(),
                max: MAX_BATCH_SIZE,
            });
        }
        if texts.is_empty() {
            return Err(TranslateError::NoTextProvided);
        }
        let lang = TargetLanguage::from_code(target)?;
        let tier = ServiceTier::from_credential(credential);

        debug!(
            "Batch of {} texts to {} in sub-batches of {}",
            texts.len(),
            lang,
            self.sub_batch_size
        );

        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.sub_batch_size) {
            let sub_batch = chunk
                .iter()
                .map(|text| self.translate_one(text, lang, tier, source_ip));
            results.extend(join_all(sub_batch).await);
        }

        Ok(results)
    }

    /// Start priority cache population for a language.
    pub fn handle_populate(&self, target: &str) -> Result<PopulateResponse, TranslateError> {
        let lang = TargetLanguage::from_code(target)?;
        Ok(PopulateResponse {
            language: lang,
            status: self.populator.populate(lang),
        })
    }

    /// Priority cache snapshot for a language. A store failure yields a
    /// zero-count status flagged `cache_degraded` instead of an error.
    pub async fn handle_cache_status(&self, target: &str) -> Result<CacheStatus, TranslateError> {
        let lang = TargetLanguage::from_code(target)?;
        match self.populator.cache_status(lang).await {
            Ok(status) => Ok(status),
            Err(e) => {
                self.note_store_error("cache status", &e);
                Ok(self.populator.degraded_status(lang))
            }
        }
    }

    /// Rate-limit standing of a source. Never charges a call.
    pub fn handle_rate_limit_status(&self, source_ip: &str, tier: ServiceTier) -> RateDecision {
        self.rate_limiter.status(source_ip, tier)
    }

    pub fn handle_metrics(&self) -> MetricsReport {
        self.metrics.report()
    }

    async fn translate_one(
        &self,
        text: &str,
        lang: TargetLanguage,
        tier: ServiceTier,
        source_ip: &str,
    ) -> TranslationResponse {
        let started = Instant::now();
        let mut cache_degraded = false;

        match self
            .serve(text.trim(), lang, tier, source_ip, &mut cache_degraded)
            .await
        {
            Ok(served) => {
                let elapsed = started.elapsed();
                self.metrics.record(served.path, elapsed);
                TranslationResponse {
                    success: true,
                    translation: Some(served.translation),
                    cached: served.path != LatencyCategory::BackendCall,
                    priority: served.path == LatencyCategory::PriorityCacheHit,
                    response_time: elapsed.as_secs_f64(),
                    cache_degraded,
                    error: None,
                }
            }
            Err(e) => TranslationResponse::failure(e, started, cache_degraded),
        }
    }

    async fn serve(
        &self,
        text: &str,
        lang: TargetLanguage,
        tier: ServiceTier,
        source_ip: &str,
        cache_degraded: &mut bool,
    ) -> Result<Served, TranslateError> {
        if text.is_empty() {
            return Err(TranslateError::NoTextProvided);
        }

        if let Some(key) = MessageCatalog::get().identify(text) {
            match self.store.get_priority(key, lang).await {
                Ok(Some(translation)) => {
                    debug!("Priority cache hit for '{}' ({})", key, lang);
                    return Ok(Served {
                        translation,
                        path: LatencyCategory::PriorityCacheHit,
                    });
                }
                Ok(None) => debug!("Priority cache miss for '{}' ({})", key, lang),
                Err(e) => {
                    self.note_store_error("priority read", &e);
                    *cache_degraded = true;
                }
            }
        }

        match self.store.get_content(text, lang).await {
            Ok(Some(translation)) => {
                return Ok(Served {
                    translation,
                    path: LatencyCategory::ContentCacheHit,
                });
            }
            Ok(None) => {}
            Err(e) => {
                self.note_store_error("content read", &e);
                *cache_degraded = true;
            }
        }

        let decision = self
            .rate_limiter
            .check_and_maybe_increment(source_ip, tier, true);
        if !decision.allowed {
            self.metrics.record_rate_limited();
            return Err(TranslateError::RateLimitExceeded(decision));
        }

        self.throughput.await_slot().await;

        let translation =
            match translate_within(self.backend.as_ref(), text, lang.code(), self.backend_timeout)
                .await
            {
                Ok(translation) => translation,
                Err(e) => {
                    warn!("Backend call to {} failed: {}", lang, e);
                    self.metrics.record_backend_failure();
                    return Err(e.into());
                }
            };

        if let Err(e) = self.store.put_content(text, lang, &translation).await {
            self.note_store_error("content write", &e);
            *cache_degraded = true;
        }

        Ok(Served {
            translation,
            path: LatencyCategory::BackendCall,
        })
    }

    fn note_store_error(&self, operation: &str, error: &StoreError) {
        warn!("Cache store {} failed, continuing without cache: {}", operation, error);
        self.metrics.record_store_error();
    }
}
