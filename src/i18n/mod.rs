//! Language and message-catalog support.
//!
//! # Architecture
//!
//! - `registry`: Single source of truth for the target languages the backend accepts
//! - `language`: Validated `TargetLanguage` type built from the registry
//! - `catalog`: Versioned catalog of priority messages (tier 1 critical, tier 2 common)
//!
//! # Example
//!
//! ```rust,ignore
//! use translation_gateway::i18n::{MessageCatalog, TargetLanguage};
//!
//! let spanish = TargetLanguage::from_code("es")?;
//! let key = MessageCatalog::get().identify("  hello ");
//! ```

mod catalog;
mod language;
mod registry;

pub use catalog::{
    normalize, CatalogEntry, MessageCatalog, MessageKey, PriorityTier, CATALOG_VERSION,
};
pub use language::TargetLanguage;
pub use registry::{LanguageConfig, LanguageRegistry};
