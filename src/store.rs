//! Cache store: content cache and priority cache behind one trait.
//!
//! Both tables expire lazily. Rows past `expires_at` are filtered out at read
//! time and never deleted. A hit bumps the row's `use_count`, which is kept
//! for introspection only; nothing is evicted by usage.

use crate::clock::Clock;
use crate::error::StoreError;
use crate::i18n::{MessageKey, PriorityTier, TargetLanguage};
use async_trait::async_trait;
use chrono::Duration;
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Per-tier row counts of the priority cache for one language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierCounts {
    pub tier1: usize,
    pub tier2: usize,
    /// Sum of `use_count` over the counted rows.
    pub uses: u64,
}

impl TierCounts {
    pub fn total(&self) -> usize {
        self.tier1 + self.tier2
    }
}

/// Persistence contract for both cache tables.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Unexpired content translation for `text`, counting the hit.
    async fn get_content(
        &self,
        text: &str,
        lang: TargetLanguage,
    ) -> Result<Option<String>, StoreError>;

    /// Insert or replace the content translation for `text`.
    async fn put_content(
        &self,
        text: &str,
        lang: TargetLanguage,
        translation: &str,
    ) -> Result<(), StoreError>;

    /// Unexpired priority translation for a catalog message, counting the hit.
    async fn get_priority(
        &self,
        key: MessageKey,
        lang: TargetLanguage,
    ) -> Result<Option<String>, StoreError>;

    /// Insert or replace the priority translation for a catalog message.
    async fn put_priority(
        &self,
        key: MessageKey,
        lang: TargetLanguage,
        translation: &str,
        tier: PriorityTier,
    ) -> Result<(), StoreError>;

    /// Unexpired priority rows for `lang`, grouped by tier.
    async fn priority_counts(&self, lang: TargetLanguage) -> Result<TierCounts, StoreError>;
}

/// SHA-256 digest of the raw text, hex encoded.
pub fn text_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// SQLite-backed store using an `sqlx` connection pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    content_ttl: Duration,
    priority_ttl: Duration,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `database_url` and ensure the
    /// schema exists.
    pub async fn connect(
        database_url: &str,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self::with_pool(pool, clock, ttl);
        store.migrate().await?;
        info!("Cache store ready at {}", database_url);
        Ok(store)
    }

    /// Private in-memory database; lives as long as the store.
    pub async fn in_memory(clock: Arc<dyn Clock>, ttl: Duration) -> Result<Self, StoreError> {
        // Every SQLite in-memory connection is its own database, so the pool
        // is pinned to one connection that is never recycled.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self::with_pool(pool, clock, ttl);
        store.migrate().await?;
        Ok(store)
    }

    fn with_pool(pool: SqlitePool, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            pool,
            clock,
            content_ttl: ttl,
            priority_ttl: ttl,
        }
    }

    /// Override the expiry horizon of priority rows.
    pub fn with_priority_ttl(mut self, ttl: Duration) -> Self {
        self.priority_ttl = ttl;
        self
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS translation_cache (
                text_hash TEXT NOT NULL,
                source_text TEXT NOT NULL,
                target_lang TEXT NOT NULL,
                translation TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                use_count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (text_hash, target_lang)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS priority_cache (
                message_key TEXT NOT NULL,
                target_lang TEXT NOT NULL,
                translation TEXT NOT NULL,
                priority_tier INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                use_count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (message_key, target_lang)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_priority_cache_lang_tier
                ON priority_cache (target_lang, priority_tier)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn get_content(
        &self,
        text: &str,
        lang: TargetLanguage,
    ) -> Result<Option<String>, StoreError> {
        // source_text is compared too, so two texts can never share a row
        // even if their digests collided.
        let translation = sqlx::query_scalar::<_, String>(
            "UPDATE translation_cache SET use_count = use_count + 1
             WHERE text_hash = ?1 AND target_lang = ?2 AND source_text = ?3 AND expires_at > ?4
             RETURNING translation",
        )
        .bind(text_hash(text))
        .bind(lang.code())
        .bind(text)
        .bind(self.now_millis())
        .fetch_optional(&self.pool)
        .await?;

        Ok(translation)
    }

    async fn put_content(
        &self,
        text: &str,
        lang: TargetLanguage,
        translation: &str,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        sqlx::query(
            "INSERT OR REPLACE INTO translation_cache
                (text_hash, source_text, target_lang, translation, created_at, expires_at, use_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
        )
        .bind(text_hash(text))
        .bind(text)
        .bind(lang.code())
        .bind(translation)
        .bind(now.timestamp_millis())
        .bind((now + self.content_ttl).timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_priority(
        &self,
        key: MessageKey,
        lang: TargetLanguage,
    ) -> Result<Option<String>, StoreError> {
        let translation = sqlx::query_scalar::<_, String>(
            "UPDATE priority_cache SET use_count = use_count + 1
             WHERE message_key = ?1 AND target_lang = ?2 AND expires_at > ?3
             RETURNING translation",
        )
        .bind(key.as_str())
        .bind(lang.code())
        .bind(self.now_millis())
        .fetch_optional(&self.pool)
        .await?;

        Ok(translation)
    }

    async fn put_priority(
        &self,
        key: MessageKey,
        lang: TargetLanguage,
        translation: &str,
        tier: PriorityTier,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        sqlx::query(
            "INSERT OR REPLACE INTO priority_cache
                (message_key, target_lang, translation, priority_tier, created_at, expires_at, use_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
        )
        .bind(key.as_str())
        .bind(lang.code())
        .bind(translation)
        .bind(tier.as_i64())
        .bind(now.timestamp_millis())
        .bind((now + self.priority_ttl).timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn priority_counts(&self, lang: TargetLanguage) -> Result<TierCounts, StoreError> {
        let rows = sqlx::query(
            "SELECT priority_tier, COUNT(*) AS entries, COALESCE(SUM(use_count), 0) AS uses
             FROM priority_cache
             WHERE target_lang = ?1 AND expires_at > ?2
             GROUP BY priority_tier",
        )
        .bind(lang.code())
        .bind(self.now_millis())
        .fetch_all(&self.pool)
        .await?;

        let mut counts = TierCounts::default();
        for row in rows {
            let tier: i64 = row.try_get("priority_tier")?;
            let entries: i64 = row.try_get("entries")?;
            let uses: i64 = row.try_get("uses")?;
            match PriorityTier::from_i64(tier) {
                Some(PriorityTier::Critical) => counts.tier1 = entries as usize,
                Some(PriorityTier::Common) => counts.tier2 = entries as usize,
                None => {
                    return Err(StoreError::Corrupt(format!(
                        "unknown priority tier {} for {}",
                        tier, lang
                    )))
                }
            }
            counts.uses += uses as u64;
        }

        Ok(counts)
    }
}
