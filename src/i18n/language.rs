//! Validated target language.

use crate::error::TranslateError;
use crate::i18n::{LanguageConfig, LanguageRegistry};
use serde::{Serialize, Serializer};
use std::fmt;

/// A target language that has been validated against the registry.
///
/// Holds the registry's canonical (upper-case) code, so two values built from
/// "es" and "ES" compare equal and key the same cache rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetLanguage {
    code: &'static str,
}

impl TargetLanguage {
    pub const SPANISH: TargetLanguage = TargetLanguage { code: "ES" };
    pub const FRENCH: TargetLanguage = TargetLanguage { code: "FR" };
    pub const GERMAN: TargetLanguage = TargetLanguage { code: "DE" };

    /// Create a target language from a code string.
    ///
    /// # Returns
    /// * `Ok(TargetLanguage)` if the code is registered and enabled
    /// * `Err(TranslateError::UnsupportedLanguage)` otherwise
    pub fn from_code(code: &str) -> Result<TargetLanguage, TranslateError> {
        match LanguageRegistry::get().get_by_code(code) {
            Some(config) if config.enabled => Ok(TargetLanguage { code: config.code }),
            _ => Err(TranslateError::UnsupportedLanguage(code.trim().to_string())),
        }
    }

    /// The canonical target code (e.g., "ES").
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// # Panics
    /// Panics if the code is missing from the registry, which cannot happen for
    /// values built through `from_code` or the constants.
    pub fn config(&self) -> &'static LanguageConfig {
        LanguageRegistry::get()
            .get_by_code(self.code)
            .expect("Language code should always be valid")
    }

    pub fn name(&self) -> &'static str {
        self.config().name
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

impl Serialize for TargetLanguage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code)
    }
}
