//! Language registry: the set of target languages the backend accepts.
//!
//! The registry is built once on first access (`OnceLock`) and is immutable
//! afterwards. Codes follow the backend's target-language convention: upper
//! case ISO 639-1, with a region suffix for the variants that need one.

use std::sync::OnceLock;

/// Configuration for a supported target language.
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// Upper-case target code (e.g., "ES", "PT-BR")
    pub code: &'static str,

    /// English name of the language (e.g., "Spanish")
    pub name: &'static str,

    /// Whether requests may target this language
    pub enabled: bool,
}

/// Global language registry singleton.
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

/// Global registry instance (initialized lazily)
static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    /// Get the global language registry instance.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: default_languages(),
        })
    }

    /// Look up a language by code, ignoring case and surrounding whitespace.
    ///
    /// # Returns
    /// * `Some(&LanguageConfig)` if the language exists
    /// * `None` if the language is not found
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        let code = code.trim();
        self.languages
            .iter()
            .find(|lang| lang.code.eq_ignore_ascii_case(code))
    }

    /// Get all enabled languages.
    pub fn list_enabled(&self) -> Vec<&LanguageConfig> {
        self.languages.iter().filter(|lang| lang.enabled).collect()
    }

    /// Check if a language code is supported and enabled.
    pub fn is_enabled(&self, code: &str) -> bool {
        self.get_by_code(code)
            .map(|lang| lang.enabled)
            .unwrap_or(false)
    }
}

const fn lang(code: &'static str, name: &'static str) -> LanguageConfig {
    LanguageConfig {
        code,
        name,
        enabled: true,
    }
}

/// Target languages accepted by the translation backend.
fn default_languages() -> Vec<LanguageConfig> {
    vec![
        lang("BG", "Bulgarian"),
        lang("CS", "Czech"),
        lang("DA", "Danish"),
        lang("DE", "German"),
        lang("EL", "Greek"),
        lang("EN", "English"),
        lang("EN-GB", "English (British)"),
        lang("EN-US", "English (American)"),
        lang("ES", "Spanish"),
        lang("ET", "Estonian"),
        lang("FI", "Finnish"),
        lang("FR", "French"),
        lang("HU", "Hungarian"),
        lang("ID", "Indonesian"),
        lang("IT", "Italian"),
        lang("JA", "Japanese"),
        lang("KO", "Korean"),
        lang("LT", "Lithuanian"),
        lang("LV", "Latvian"),
        lang("NB", "Norwegian (Bokmål)"),
        lang("NL", "Dutch"),
        lang("PL", "Polish"),
        lang("PT", "Portuguese"),
        lang("PT-BR", "Portuguese (Brazilian)"),
        lang("PT-PT", "Portuguese (European)"),
        lang("RO", "Romanian"),
        lang("RU", "Russian"),
        lang("SK", "Slovak"),
        lang("SL", "Slovenian"),
        lang("SV", "Swedish"),
        lang("TR", "Turkish"),
        lang("UK", "Ukrainian"),
        lang("ZH", "Chinese"),
    ]
}
