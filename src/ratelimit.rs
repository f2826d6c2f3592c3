//! Per-source, per-tier quota on backend calls.
//!
//! Three fixed windows (minute, hour, day) are tracked for every
//! (source identity, service tier) pair. Windows reset lazily: the first
//! check after a window has elapsed zeroes its counter and moves its reset
//! time to `now + window length`. There is no background timer.
//!
//! The limiter is consulted only right before a backend call. Cache hits never
//! reach it, because the resource being rationed is the paid call, not request
//! volume.

use crate::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Credential value that always maps to the demo tier.
pub const DEMO_CREDENTIAL: &str = "demo";

/// Caller classification controlling rate-limit ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceTier {
    Demo,
    Paid,
}

impl ServiceTier {
    /// Derive the tier from the credential the caller presented.
    ///
    /// No credential, a blank one, or the demo sentinel map to `Demo`; any
    /// other credential maps to `Paid`. Authenticating the credential is the
    /// caller's job.
    pub fn from_credential(credential: Option<&str>) -> ServiceTier {
        match credential.map(str::trim) {
            Some(c) if !c.is_empty() && c != DEMO_CREDENTIAL => ServiceTier::Paid,
            _ => ServiceTier::Demo,
        }
    }

    pub fn parse(value: &str) -> Option<ServiceTier> {
        match value.trim().to_ascii_lowercase().as_str() {
            "demo" => Some(ServiceTier::Demo),
            "paid" => Some(ServiceTier::Paid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceTier::Demo => "demo",
            ServiceTier::Paid => "paid",
        }
    }
}

/// Call ceilings for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    pub per_minute: u32,
    pub per_hour: u32,
    pub per_day: u32,
}

impl TierLimits {
    pub const DEMO: TierLimits = TierLimits {
        per_minute: 5,
        per_hour: 20,
        per_day: 100,
    };

    pub const PAID: TierLimits = TierLimits {
        per_minute: 30,
        per_hour: 200,
        per_day: 2000,
    };
}

/// Limits for every tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub demo: TierLimits,
    pub paid: TierLimits,
}

impl RateLimitConfig {
    pub fn limits_for(&self, tier: ServiceTier) -> TierLimits {
        match tier {
            ServiceTier::Demo => self.demo,
            ServiceTier::Paid => self.paid,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            demo: TierLimits::DEMO,
            paid: TierLimits::PAID,
        }
    }
}

/// A value per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowCounts {
    pub minute: u32,
    pub hour: u32,
    pub day: u32,
}

/// Reset timestamp per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowResets {
    pub minute: DateTime<Utc>,
    pub hour: DateTime<Utc>,
    pub day: DateTime<Utc>,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    pub tier: ServiceTier,
    /// Calls left in each window after this check.
    pub remaining: WindowCounts,
    pub reset_at: WindowResets,
    pub limits: TierLimits,
}

#[derive(Debug, Clone, Copy)]
struct RateWindowCounter {
    minute_count: u32,
    hour_count: u32,
    day_count: u32,
    minute_reset_at: DateTime<Utc>,
    hour_reset_at: DateTime<Utc>,
    day_reset_at: DateTime<Utc>,
}

impl RateWindowCounter {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            minute_count: 0,
            hour_count: 0,
            day_count: 0,
            minute_reset_at: now + Duration::minutes(1),
            hour_reset_at: now + Duration::hours(1),
            day_reset_at: now + Duration::days(1),
        }
    }

    /// Apply lazy resets for every window that has elapsed.
    fn roll(&mut self, now: DateTime<Utc>) {
        if now >= self.minute_reset_at {
            self.minute_count = 0;
            self.minute_reset_at = now + Duration::minutes(1);
        }
        if now >= self.hour_reset_at {
            self.hour_count = 0;
            self.hour_reset_at = now + Duration::hours(1);
        }
        if now >= self.day_reset_at {
            self.day_count = 0;
            self.day_reset_at = now + Duration::days(1);
        }
    }

    fn exhausted(&self, limits: &TierLimits) -> bool {
        self.minute_count >= limits.per_minute
            || self.hour_count >= limits.per_hour
            || self.day_count >= limits.per_day
    }

    fn decision(&self, allowed: bool, tier: ServiceTier, limits: TierLimits) -> RateDecision {
        RateDecision {
            allowed,
            tier,
            remaining: WindowCounts {
                minute: limits.per_minute.saturating_sub(self.minute_count),
                hour: limits.per_hour.saturating_sub(self.hour_count),
                day: limits.per_day.saturating_sub(self.day_count),
            },
            reset_at: WindowResets {
                minute: self.minute_reset_at,
                hour: self.hour_reset_at,
                day: self.day_reset_at,
            },
            limits,
        }
    }
}

type CounterKey = (String, ServiceTier);

/// Fixed-window limiter keyed by (source identity, tier).
///
/// Each key's read-modify-write runs under the map entry's write guard, so
/// concurrent checks for the same key cannot both observe headroom and
/// overshoot the ceiling.
pub struct IpRateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    counters: DashMap<CounterKey, RateWindowCounter>,
}

impl IpRateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            counters: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check admission for one backend call, optionally charging it.
    ///
    /// When `increment` is true and the call is admitted, the minute, hour and
    /// day counters all grow by one. A denied check never changes counts.
    /// With `increment` false the check is read-only.
    pub fn check_and_maybe_increment(
        &self,
        source: &str,
        tier: ServiceTier,
        increment: bool,
    ) -> RateDecision {
        let now = self.clock.now();
        let limits = self.config.limits_for(tier);

        if !increment {
            return self.peek(source, tier, now, limits);
        }

        let mut counter = self
            .counters
            .entry((source.to_string(), tier))
            .or_insert_with(|| RateWindowCounter::fresh(now));
        counter.roll(now);

        if counter.exhausted(&limits) {
            debug!(
                "Rate limit reached for {} ({}): {}/{}/{} calls",
                source,
                tier.as_str(),
                counter.minute_count,
                counter.hour_count,
                counter.day_count
            );
            return counter.decision(false, tier, limits);
        }

        counter.minute_count += 1;
        counter.hour_count += 1;
        counter.day_count += 1;
        counter.decision(true, tier, limits)
    }

    /// Current standing for a source without charging a call.
    pub fn status(&self, source: &str, tier: ServiceTier) -> RateDecision {
        self.check_and_maybe_increment(source, tier, false)
    }

    fn peek(
        &self,
        source: &str,
        tier: ServiceTier,
        now: DateTime<Utc>,
        limits: TierLimits,
    ) -> RateDecision {
        let mut counter = self
            .counters
            .get(&(source.to_string(), tier))
            .map(|entry| *entry)
            .unwrap_or_else(|| RateWindowCounter::fresh(now));
        counter.roll(now);
        counter.decision(!counter.exhausted(&limits), tier, limits)
    }

    /// Drop counters whose day window has elapsed.
    ///
    /// Such a counter is indistinguishable from a fresh one, so removing it
    /// only bounds memory. Returns the number of entries removed.
    pub fn purge_idle(&self) -> usize {
        let now = self.clock.now();
        let before = self.counters.len();
        self.counters.retain(|_, counter| now < counter.day_reset_at);
        before.saturating_sub(self.counters.len())
    }

    pub fn tracked_sources(&self) -> usize {
        self.counters.len()
    }
}
