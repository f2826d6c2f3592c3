//! Error types for the translation pipeline.

use crate::ratelimit::RateDecision;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Failure reported by a translation backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Credentials were rejected.
    #[error("backend rejected credentials (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// The account's quota or billing allowance is used up.
    #[error("backend quota exhausted (HTTP {status}): {message}")]
    Quota { status: u16, message: String },

    /// Network failure, timeout, 5xx or an unusable response.
    #[error("backend unavailable: {0}")]
    Transient(String),
}

impl BackendError {
    /// Transient failures may succeed on a later attempt; auth and quota
    /// failures will not until someone fixes the account.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

/// Failure of the cache store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cache store unavailable: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache store returned corrupt data: {0}")]
    Corrupt(String),
}

/// Caller-visible failure of a pipeline operation.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("No text provided")]
    NoTextProvided,

    #[error("Unsupported target language: '{0}'")]
    UnsupportedLanguage(String),

    #[error("Rate limit exceeded for backend calls from this address")]
    RateLimitExceeded(RateDecision),

    #[error("{0}")]
    BackendAuthOrQuota(BackendError),

    #[error("{0}")]
    BackendTransient(BackendError),

    /// Service operations degrade store failures instead of returning this.
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    #[error("Too many texts in batch: {size} (max {max})")]
    BatchTooLarge { size: usize, max: usize },
}

impl TranslateError {
    /// Stable error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoTextProvided => "no_text_provided",
            Self::UnsupportedLanguage(_) => "unsupported_language",
            Self::RateLimitExceeded(_) => "rate_limit_exceeded",
            Self::BackendAuthOrQuota(BackendError::Quota { .. }) => "backend_quota_exceeded",
            Self::BackendAuthOrQuota(_) => "backend_auth_error",
            Self::BackendTransient(_) => "backend_transient_error",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::BatchTooLarge { .. } => "batch_too_large",
        }
    }

    pub fn rate_limit(&self) -> Option<&RateDecision> {
        match self {
            Self::RateLimitExceeded(decision) => Some(decision),
            _ => None,
        }
    }
}

impl From<BackendError> for TranslateError {
    fn from(error: BackendError) -> Self {
        if error.is_transient() {
            TranslateError::BackendTransient(error)
        } else {
            TranslateError::BackendAuthOrQuota(error)
        }
    }
}

impl Serialize for TranslateError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let rate_limit = self.rate_limit();
        let fields = if rate_limit.is_some() { 3 } else { 2 };
        let mut state = serializer.serialize_struct("TranslateError", fields)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        if let Some(decision) = rate_limit {
            state.serialize_field("rate_limit", decision)?;
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_classification() {
        let auth = BackendError::Auth {
            status: 403,
            message: "Forbidden".to_string(),
        };
        let quota = BackendError::Quota {
            status: 456,
            message: "Quota exceeded".to_string(),
        };
        let transient = BackendError::Transient("timed out".to_string());

        assert!(matches!(
            TranslateError::from(auth),
            TranslateError::BackendAuthOrQuota(_)
        ));
        assert!(matches!(
            TranslateError::from(quota),
            TranslateError::BackendAuthOrQuota(_)
        ));
        assert!(matches!(
            TranslateError::from(transient),
            TranslateError::BackendTransient(_)
        ));
    }

    #[test]
    fn test_error_codes_distinguish_auth_from_quota() {
        let auth = TranslateError::from(BackendError::Auth {
            status: 401,
            message: String::new(),
        });
        let quota = TranslateError::from(BackendError::Quota {
            status: 456,
            message: String::new(),
        });
        assert_eq!(auth.code(), "backend_auth_error");
        assert_eq!(quota.code(), "backend_quota_exceeded");
    }

    #[test]
    fn test_error_serialization() {
        let error = TranslateError::BatchTooLarge { size: 51, max: 50 };
        let json = serde_json::to_value(&error).expect("Should serialize");
        assert_eq!(json["code"], "batch_too_large");
        assert_eq!(json["message"], "Too many texts in batch: 51 (max 50)");
        assert!(json.get("rate_limit").is_none());
    }

    #[test]
    fn test_store_error_converts_to_store_unavailable() {
        let error: TranslateError = StoreError::Database(sqlx::Error::PoolClosed).into();
        assert_eq!(error.code(), "store_unavailable");
        assert!(error.to_string().contains("cache store unavailable"));
    }
}
