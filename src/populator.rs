//! Background pre-translation of the message catalog into the priority cache.
//!
//! One job per language at a time. Jobs run on spawned tasks that wait for a
//! permit from a fixed-size pool, so only a few languages are translated in
//! parallel. Callers observe progress by polling [`PriorityPopulator::status`].

use crate::backend::{translate_within, TranslationBackend};
use crate::error::{BackendError, StoreError};
use crate::i18n::{MessageCatalog, MessageKey, PriorityTier, TargetLanguage};
use crate::retry::{with_retry_if, RetryConfig};
use crate::store::CacheStore;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Lifecycle of a language's population job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulateStatus {
    NotStarted,
    Started,
    Completed,
    Failed(String),
}

impl PopulateStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, PopulateStatus::Started)
    }
}

impl fmt::Display for PopulateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PopulateStatus::NotStarted => f.write_str("not_started"),
            PopulateStatus::Started => f.write_str("started"),
            PopulateStatus::Completed => f.write_str("completed"),
            PopulateStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

impl Serialize for PopulateStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Snapshot of the priority cache for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub language: TargetLanguage,
    pub total_cached: usize,
    pub tier1_count: usize,
    pub tier2_count: usize,
    pub populate_status: PopulateStatus,
    pub ready: bool,
    /// Counts could not be read from the store and are reported as zero
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cache_degraded: bool,
}

#[derive(Debug, Clone)]
pub struct PopulatorSettings {
    /// Concurrent population jobs
    pub workers: usize,
    /// Pause between successive backend calls of one job
    pub pacing_delay: Duration,
    pub backend_timeout: Duration,
    /// Cached entries required before a language counts as ready
    pub readiness_threshold: usize,
    pub retry: RetryConfig,
}

impl Default for PopulatorSettings {
    fn default() -> Self {
        Self {
            workers: 3,
            pacing_delay: Duration::from_millis(100),
            backend_timeout: Duration::from_secs(10),
            readiness_threshold: 10,
            retry: RetryConfig::population(),
        }
    }
}

/// Why a job stopped before reaching the end of the catalog.
enum Abort {
    Backend(BackendError),
    Store(StoreError),
}

#[derive(Clone)]
pub struct PriorityPopulator {
    store: Arc<dyn CacheStore>,
    backend: Arc<dyn TranslationBackend>,
    settings: Arc<PopulatorSettings>,
    jobs: Arc<Mutex<HashMap<TargetLanguage, PopulateStatus>>>,
    workers: Arc<Semaphore>,
}

impl PriorityPopulator {
    pub fn new(
        store: Arc<dyn CacheStore>,
        backend: Arc<dyn TranslationBackend>,
        settings: PopulatorSettings,
    ) -> Self {
        let workers = Arc::new(Semaphore::new(settings.workers.max(1)));
        Self {
            store,
            backend,
            settings: Arc::new(settings),
            jobs: Arc::new(Mutex::new(HashMap::new())),
            workers,
        }
    }

    pub fn settings(&self) -> &PopulatorSettings {
        &self.settings
    }

    /// Start populating `lang` unless a job is running or has completed.
    ///
    /// Returns immediately with the status the caller should report: the
    /// existing one for a no-op, `Started` otherwise. A failed job may be
    /// started again.
    pub fn populate(&self, lang: TargetLanguage) -> PopulateStatus {
        self.admit(lang, false)
    }

    /// Like [`populate`](Self::populate), but also re-runs a completed job so
    /// entries are rewritten before they expire.
    pub fn refresh(&self, lang: TargetLanguage) -> PopulateStatus {
        self.admit(lang, true)
    }

    pub fn status(&self, lang: TargetLanguage) -> PopulateStatus {
        self.jobs
            .lock()
            .expect("population status mutex poisoned")
            .get(&lang)
            .cloned()
            .unwrap_or(PopulateStatus::NotStarted)
    }

    pub async fn cache_status(&self, lang: TargetLanguage) -> Result<CacheStatus, StoreError> {
        let counts = self.store.priority_counts(lang).await?;
        let total_cached = counts.total();

        Ok(CacheStatus {
            language: lang,
            total_cached,
            tier1_count: counts.tier1,
            tier2_count: counts.tier2,
            populate_status: self.status(lang),
            ready: total_cached >= self.settings.readiness_threshold,
            cache_degraded: false,
        })
    }

    /// Status to report when the store cannot be read: job state only.
    pub fn degraded_status(&self, lang: TargetLanguage) -> CacheStatus {
        CacheStatus {
            language: lang,
            total_cached: 0,
            tier1_count: 0,
            tier2_count: 0,
            populate_status: self.status(lang),
            ready: false,
            cache_degraded: true,
        }
    }

    fn admit(&self, lang: TargetLanguage, rerun_completed: bool) -> PopulateStatus {
        {
            let mut jobs = self.jobs.lock().expect("population status mutex poisoned");
            match jobs.get(&lang) {
                Some(PopulateStatus::Started) => {
                    debug!("Population for {} already running", lang);
                    return PopulateStatus::Started;
                }
                Some(PopulateStatus::Completed) if !rerun_completed => {
                    debug!("Population for {} already completed", lang);
                    return PopulateStatus::Completed;
                }
                _ => {}
            }
            jobs.insert(lang, PopulateStatus::Started);
        }

        let populator = self.clone();
        tokio::spawn(async move {
            // A panicking job surfaces here as a JoinError
            let job = tokio::spawn({
                let populator = populator.clone();
                async move { populator.run(lang).await }
            });
            let status = match job.await {
                Ok(status) => status,
                Err(e) => {
                    error!("Population task for {} died: {}", lang, e);
                    PopulateStatus::Failed(format!("population task panicked: {}", e))
                }
            };
            populator
                .jobs
                .lock()
                .expect("population status mutex poisoned")
                .insert(lang, status);
        });

        PopulateStatus::Started
    }

    async fn run(&self, lang: TargetLanguage) -> PopulateStatus {
        let _permit = match self.workers.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => return PopulateStatus::Failed(format!("worker pool closed: {}", e)),
        };

        info!("Populating priority cache for {}", lang);
        let catalog = MessageCatalog::get();
        let mut cached = 0usize;
        let mut skipped = 0usize;
        let mut first_call = true;

        for tier in PriorityTier::ALL {
            for entry in catalog.tier(tier) {
                if !first_call && !self.settings.pacing_delay.is_zero() {
                    sleep(self.settings.pacing_delay).await;
                }
                first_call = false;

                match self.cache_entry(lang, entry.text, entry.key, tier).await {
                    Ok(true) => cached += 1,
                    Ok(false) => skipped += 1,
                    Err(abort) => {
                        let reason = match abort {
                            Abort::Backend(e) => format!(
                                "backend rejected population after {} entries: {}",
                                cached, e
                            ),
                            Abort::Store(e) => {
                                format!("store failed after {} entries: {}", cached, e)
                            }
                        };
                        error!("Population for {} aborted: {}", lang, reason);
                        return PopulateStatus::Failed(reason);
                    }
                }
            }
        }

        if skipped > 0 {
            let reason = format!(
                "{} of {} entries could not be translated",
                skipped,
                catalog.len()
            );
            warn!("Population for {} incomplete: {}", lang, reason);
            return PopulateStatus::Failed(reason);
        }

        info!("Priority cache for {} populated ({} entries)", lang, cached);
        PopulateStatus::Completed
    }

    /// Translate and store one entry. `Ok(false)` means the backend kept
    /// failing transiently and the entry was skipped.
    async fn cache_entry(
        &self,
        lang: TargetLanguage,
        text: &str,
        key: MessageKey,
        tier: PriorityTier,
    ) -> Result<bool, Abort> {
        let operation = format!("populate {} '{}'", lang, key);
        let result = with_retry_if(
            &self.settings.retry,
            &operation,
            || {
                translate_within(
                    self.backend.as_ref(),
                    text,
                    lang.code(),
                    self.settings.backend_timeout,
                )
            },
            BackendError::is_transient,
        )
        .await;

        let translation = match result {
            Ok(translation) => translation,
            Err(e) if e.is_transient() => {
                warn!("Skipping '{}' for {}: {}", key, lang, e);
                return Ok(false);
            }
            Err(e) => return Err(Abort::Backend(e)),
        };

        self.store
            .put_priority(key, lang, &translation, tier)
            .await
            .map_err(Abort::Store)?;
        Ok(true)
    }
}
