//! Minimal locale catalog.
//!
//! Full localization is out of scope; this exists so language selection and
//! the forced-language override behave correctly. Translations are keyed by
//! the English source phrase and fall back to it.

use std::collections::HashMap;

/// Phrase used to probe whether a locale's catalog is actually usable.
const PROBE_KEY: &str = "Hello! Please enter a username for registration.";

#[derive(Debug, Clone)]
pub struct LocaleInfo {
    pub code: String,
    pub native_name: String,
}

#[derive(Debug, Clone, Default)]
struct Catalog {
    native_name: String,
    phrases: HashMap<String, String>,
}

/// Installed locale catalogs plus the bootstrap default.
#[derive(Debug, Clone)]
pub struct LocaleCatalog {
    bootstrap: String,
    catalogs: HashMap<String, Catalog>,
}

impl LocaleCatalog {
    /// A catalog with only the bootstrap locale (English, identity map).
    pub fn new() -> Self {
        let mut catalogs = HashMap::new();
        catalogs.insert(
            "en".to_string(),
            Catalog {
                native_name: "English".to_string(),
                phrases: HashMap::new(),
            },
        );
        Self {
            bootstrap: "en".to_string(),
            catalogs,
        }
    }

    pub fn bootstrap(&self) -> &str {
        &self.bootstrap
    }

    /// Install (or replace) a locale catalog.
    pub fn install(
        &mut self,
        code: impl Into<String>,
        native_name: impl Into<String>,
        phrases: HashMap<String, String>,
    ) {
        self.catalogs.insert(
            code.into(),
            Catalog {
                native_name: native_name.into(),
                phrases,
            },
        );
    }

    /// Locales offered for selection, bootstrap first.
    pub fn available(&self) -> Vec<LocaleInfo> {
        let mut infos: Vec<LocaleInfo> = self
            .catalogs
            .iter()
            .map(|(code, catalog)| LocaleInfo {
                code: code.clone(),
                native_name: if catalog.native_name.is_empty() {
                    code.to_uppercase()
                } else {
                    catalog.native_name.clone()
                },
            })
            .collect();
        infos.sort_by(|a, b| {
            (a.code != self.bootstrap)
                .cmp(&(b.code != self.bootstrap))
                .then_with(|| a.code.cmp(&b.code))
        });
        infos
    }

    /// Translate a phrase, falling back to the English key.
    pub fn tr(&self, locale: &str, key: &str) -> String {
        self.catalogs
            .get(locale)
            .and_then(|c| c.phrases.get(key))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// Is this locale usable?
    ///
    /// Same check for organic selection and the forced override: either the
    /// probe phrase actually translates to something different from its key,
    /// or the locale is the bootstrap default.
    pub fn is_usable(&self, code: &str) -> bool {
        if code == self.bootstrap {
            return true;
        }
        self.catalogs
            .get(code)
            .map(|c| c.phrases.get(PROBE_KEY).map(|t| t != PROBE_KEY).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Validate a configured forced-language override.
    pub fn resolve_forced(&self, forced: Option<&str>) -> Option<String> {
        let code = forced?.trim();
        if code.is_empty() {
            return None;
        }
        if self.is_usable(code) {
            Some(code.to_string())
        } else {
            tracing::warn!(
                "Forced language '{}' has no usable catalog, falling back to selection",
                code
            );
            None
        }
    }
}

impl Default for LocaleCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_with_russian() -> LocaleCatalog {
        let mut catalog = LocaleCatalog::new();
        let mut phrases = HashMap::new();
        phrases.insert(
            PROBE_KEY.to_string(),
            "Здравствуйте! Введите имя пользователя для регистрации.".to_string(),
        );
        catalog.install("ru", "Русский", phrases);
        catalog
    }

    #[test]
    fn test_bootstrap_is_always_usable() {
        let catalog = LocaleCatalog::new();
        assert!(catalog.is_usable("en"));
        assert!(!catalog.is_usable("ru"));
    }

    #[test]
    fn test_forced_locale_uses_same_check_as_selection() {
        let catalog = catalog_with_russian();
        assert_eq!(catalog.resolve_forced(Some("ru")).as_deref(), Some("ru"));
        assert_eq!(catalog.resolve_forced(Some("en")).as_deref(), Some("en"));
        assert_eq!(catalog.resolve_forced(Some("de")), None);
        assert_eq!(catalog.resolve_forced(Some("  ")), None);
        assert_eq!(catalog.resolve_forced(None), None);
    }

    #[test]
    fn test_incomplete_catalog_is_not_usable() {
        let mut catalog = LocaleCatalog::new();
        // Installed, but without the probe phrase: treated as unusable.
        catalog.install("de", "Deutsch", HashMap::new());
        assert!(!catalog.is_usable("de"));
    }

    #[test]
    fn test_translation_falls_back_to_key() {
        let catalog = catalog_with_russian();
        assert_ne!(catalog.tr("ru", PROBE_KEY), PROBE_KEY);
        assert_eq!(catalog.tr("ru", "Untranslated phrase."), "Untranslated phrase.");
        assert_eq!(catalog.tr("en", PROBE_KEY), PROBE_KEY);
    }

    #[test]
    fn test_available_lists_bootstrap_first() {
        let catalog = catalog_with_russian();
        let available = catalog.available();
        assert_eq!(available[0].code, "en");
        assert_eq!(available[1].code, "ru");
        assert_eq!(available[1].native_name, "Русский");
    }
}
