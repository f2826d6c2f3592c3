//! Test doubles shared by the unit tests.

use crate::backend::TranslationBackend;
use crate::error::{BackendError, StoreError};
use crate::i18n::{MessageKey, PriorityTier, TargetLanguage};
use crate::store::{CacheStore, TierCounts};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Backend that answers `"[LANG] text"` and records every call.
#[derive(Default)]
pub struct MockBackend {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
    fail_all: Option<BackendError>,
    fail_on: Mutex<HashMap<String, BackendError>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self, error: BackendError) -> Self {
        self.fail_all = Some(error);
        self
    }

    pub fn failing_on(self, text: &str, error: BackendError) -> Self {
        self.fail_on
            .lock()
            .unwrap()
            .insert(text.to_string(), error);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// `(text, target_lang)` pairs in call order.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((text.to_string(), target_lang.to_string()));

        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(error) = &self.fail_all {
            return Err(error.clone());
        }
        if let Some(error) = self.fail_on.lock().unwrap().get(text) {
            return Err(error.clone());
        }
        Ok(format!("[{}] {}", target_lang, text))
    }
}

/// Store kept in plain maps, without expiry.
#[derive(Default)]
pub struct MemoryStore {
    content: Mutex<HashMap<(String, TargetLanguage), String>>,
    priority: Mutex<HashMap<(MessageKey, TargetLanguage), (String, PriorityTier)>>,
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get_content(
        &self,
        text: &str,
        lang: TargetLanguage,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .content
            .lock()
            .unwrap()
            .get(&(text.to_string(), lang))
            .cloned())
    }

    async fn put_content(
        &self,
        text: &str,
        lang: TargetLanguage,
        translation: &str,
    ) -> Result<(), StoreError> {
        self.content
            .lock()
            .unwrap()
            .insert((text.to_string(), lang), translation.to_string());
        Ok(())
    }

    async fn get_priority(
        &self,
        key: MessageKey,
        lang: TargetLanguage,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .priority
            .lock()
            .unwrap()
            .get(&(key, lang))
            .map(|(translation, _)| translation.clone()))
    }

    async fn put_priority(
        &self,
        key: MessageKey,
        lang: TargetLanguage,
        translation: &str,
        tier: PriorityTier,
    ) -> Result<(), StoreError> {
        self.priority
            .lock()
            .unwrap()
            .insert((key, lang), (translation.to_string(), tier));
        Ok(())
    }

    async fn priority_counts(&self, lang: TargetLanguage) -> Result<TierCounts, StoreError> {
        let mut counts = TierCounts::default();
        for ((_, entry_lang), (_, tier)) in self.priority.lock().unwrap().iter() {
            if *entry_lang != lang {
                continue;
            }
            match tier {
                PriorityTier::Critical => counts.tier1 += 1,
                PriorityTier::Common => counts.tier2 += 1,
            }
        }
        Ok(counts)
    }
}

/// Store whose every operation fails as if the database were gone.
#[derive(Default)]
pub struct FailingStore {
    attempts: AtomicUsize,
}

impl FailingStore {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }
}

#[async_trait]
impl CacheStore for FailingStore {
    async fn get_content(&self, _: &str, _: TargetLanguage) -> Result<Option<String>, StoreError> {
        self.fail()
    }

    async fn put_content(&self, _: &str, _: TargetLanguage, _: &str) -> Result<(), StoreError> {
        self.fail()
    }

    async fn get_priority(
        &self,
        _: MessageKey,
        _: TargetLanguage,
    ) -> Result<Option<String>, StoreError> {
        self.fail()
    }

    async fn put_priority(
        &self,
        _: MessageKey,
        _: TargetLanguage,
        _: &str,
        _: PriorityTier,
    ) -> Result<(), StoreError> {
        self.fail()
    }

    async fn priority_counts(&self, _: TargetLanguage) -> Result<TierCounts, StoreError> {
        self.fail()
    }
}
