//! Caching and rate-limiting gateway in front of a paid translation API.
//!
//! Requests are served from a priority cache of pre-translated catalog
//! messages, then from a content cache, and only then from the backend. Calls
//! that reach the backend are rationed per source IP and tier and smoothed by
//! a process-wide throughput governor.

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod i18n;
pub mod metrics;
pub mod populator;
pub mod ratelimit;
pub mod retry;
pub mod scheduler;
pub mod security;
pub mod server;
pub mod service;
pub mod store;
pub mod throughput;

#[cfg(test)]
mod testing;

pub use backend::{DeepLBackend, TranslationBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{BackendError, StoreError, TranslateError};
pub use server::{create_router, AppState};
pub use service::{ServiceSettings, TranslationResponse, TranslationService};
pub use store::{CacheStore, SqliteStore};
