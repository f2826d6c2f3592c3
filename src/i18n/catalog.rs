//! Priority message catalog.
//!
//! A fixed, versioned set of canonical English messages eligible for priority
//! pre-caching. Tier 1 holds operationally critical strings (errors, system
//! status), tier 2 common UI phrases. Each message has a stable key that is
//! independent of its text, so the priority cache survives wording fixes as
//! long as the key stays the same.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Bump whenever a key is added, removed or re-worded.
pub const CATALOG_VERSION: u32 = 1;

/// Priority tier of a catalog message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Critical,
    Common,
}

impl PriorityTier {
    /// Population order: critical messages first.
    pub const ALL: [PriorityTier; 2] = [PriorityTier::Critical, PriorityTier::Common];

    /// Numeric tier as stored in the priority cache (1 or 2).
    pub fn as_i64(self) -> i64 {
        match self {
            PriorityTier::Critical => 1,
            PriorityTier::Common => 2,
        }
    }

    pub fn from_i64(value: i64) -> Option<PriorityTier> {
        match value {
            1 => Some(PriorityTier::Critical),
            2 => Some(PriorityTier::Common),
            _ => None,
        }
    }
}

/// Stable identifier of a catalog message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MessageKey(&'static str);

impl MessageKey {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// One catalog message.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub key: MessageKey,
    pub text: &'static str,
    pub tier: PriorityTier,
}

const CRITICAL_MESSAGES: &[(&str, &str)] = &[
    ("welcome", "Welcome to TranslateAll API!"),
    ("error_general", "An error occurred. Please try again."),
    ("success_general", "Translation completed successfully."),
    ("rate_limit", "Rate limit exceeded. Please try again later."),
    ("invalid_key", "Invalid API key provided."),
    ("quota_exceeded", "Translation quota exceeded."),
    ("network_error", "Network connection error."),
    ("processing", "Processing your translation..."),
    ("completed", "Translation completed!"),
    ("failed", "Translation failed. Please try again."),
    ("timeout", "Translation timeout. Please try again."),
    ("service_unavailable", "Service temporarily unavailable."),
    ("invalid_text", "Invalid text provided for translation."),
    ("language_not_supported", "Language not supported."),
    ("text_too_long", "Text too long for translation."),
];

const COMMON_MESSAGES: &[(&str, &str)] = &[
    ("hello", "Hello"),
    ("goodbye", "Goodbye"),
    ("thank_you", "Thank you"),
    ("please", "Please"),
    ("yes", "Yes"),
    ("no", "No"),
    ("help", "Help"),
    ("cancel", "Cancel"),
    ("confirm", "Confirm"),
    ("save", "Save"),
    ("delete", "Delete"),
    ("edit", "Edit"),
    ("search", "Search"),
    ("filter", "Filter"),
    ("sort", "Sort"),
    ("loading", "Loading..."),
    ("waiting", "Please wait..."),
    ("done", "Done"),
    ("continue", "Continue"),
    ("back", "Back"),
    ("next", "Next"),
    ("previous", "Previous"),
    ("home", "Home"),
    ("settings", "Settings"),
    ("profile", "Profile"),
    ("logout", "Logout"),
    ("login", "Login"),
    ("register", "Register"),
    ("forgot_password", "Forgot Password"),
    ("reset_password", "Reset Password"),
    ("change_password", "Change Password"),
];

/// Normalized form used for catalog matching: trimmed and lower-cased.
///
/// Interior whitespace and punctuation are left alone, so "Hello!" does not
/// match "Hello".
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// The compiled message catalog.
pub struct MessageCatalog {
    entries: Vec<CatalogEntry>,
    by_text: HashMap<String, usize>,
    by_key: HashMap<&'static str, usize>,
}

static CATALOG: OnceLock<MessageCatalog> = OnceLock::new();

impl MessageCatalog {
    /// Get the global catalog, compiling it on first use.
    pub fn get() -> &'static MessageCatalog {
        CATALOG.get_or_init(MessageCatalog::compile)
    }

    fn compile() -> MessageCatalog {
        let entries: Vec<CatalogEntry> = CRITICAL_MESSAGES
            .iter()
            .map(|&(key, text)| (key, text, PriorityTier::Critical))
            .chain(
                COMMON_MESSAGES
                    .iter()
                    .map(|&(key, text)| (key, text, PriorityTier::Common)),
            )
            .map(|(key, text, tier)| CatalogEntry {
                key: MessageKey(key),
                text,
                tier,
            })
            .collect();

        let by_text = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (normalize(entry.text), idx))
            .collect();
        let by_key = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (entry.key.as_str(), idx))
            .collect();

        MessageCatalog {
            entries,
            by_text,
            by_key,
        }
    }

    /// Match incoming text against the catalog.
    ///
    /// The match is exact after trimming and case folding. Returns the
    /// canonical key of the matched message.
    pub fn identify(&self, text: &str) -> Option<MessageKey> {
        self.by_text
            .get(&normalize(text))
            .map(|&idx| self.entries[idx].key)
    }

    pub fn entry(&self, key: &str) -> Option<&CatalogEntry> {
        self.by_key.get(key).map(|&idx| &self.entries[idx])
    }

    /// All messages of one tier, in catalog order.
    pub fn tier(&self, tier: PriorityTier) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(move |entry| entry.tier == tier)
    }

    /// All messages, tier 1 first.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn version(&self) -> u32 {
        CATALOG_VERSION
    }
}
