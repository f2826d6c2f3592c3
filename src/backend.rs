use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// A paid, per-call translation service.
///
/// Implementations report failures through the three `BackendError` kinds so
/// callers can tell "fix your credentials" from "retry later".
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, BackendError>;
}

/// Call `backend`, treating no answer within `limit` as a transient failure.
pub async fn translate_within(
    backend: &dyn TranslationBackend,
    text: &str,
    target_lang: &str,
    limit: Duration,
) -> Result<String, BackendError> {
    match timeout(limit, backend.translate(text, target_lang)).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Transient(format!(
            "no response within {:?}",
            limit
        ))),
    }
}

/// DeepL translate response
#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

/// Client for the DeepL `/v2/translate` endpoint.
#[derive(Debug, Clone)]
pub struct DeepLBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl DeepLBackend {
    /// Build a backend whose requests give up after `timeout`.
    pub fn new(api_url: &str, api_key: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url, api_key))
    }

    pub fn with_client(client: reqwest::Client, api_url: &str, api_key: &str) -> Self {
        Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl TranslationBackend for DeepLBackend {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, BackendError> {
        debug!("Backend call: {} chars to {}", text.chars().count(), target_lang);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .form(&[("text", text), ("target_lang", target_lang)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Transient(format!("request timed out: {}", e))
                } else {
                    BackendError::Transient(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            let error = classify_status(status, body);
            warn!("Backend error for {}: {}", target_lang, error);
            return Err(error);
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Transient(format!("malformed response: {}", e)))?;

        parsed
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| BackendError::Transient("response contained no translations".into()))
    }
}

/// Map a non-success status to a backend error kind.
///
/// 401/403 mean the key is wrong or revoked, 456 is DeepL's "quota
/// exceeded". Everything else, including 429 throttling, is worth retrying
/// later.
fn classify_status(status: StatusCode, body: String) -> BackendError {
    match status.as_u16() {
        401 | 403 => BackendError::Auth {
            status: status.as_u16(),
            message: body,
        },
        456 => BackendError::Quota {
            status: status.as_u16(),
            message: body,
        },
        code => BackendError::Transient(format!("HTTP {}: {}", code, body)),
    }
}
