//! # Localization Module
//!
//! Prompt, outcome and error texts are Fluent messages embedded at compile
//! time from `locales/<lang>/main.ftl`. A message missing from the selected
//! language falls back to English.

use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use log::{debug, warn};
use std::collections::HashMap;
use unic_langid::LanguageIdentifier;

const FALLBACK_LANGUAGE: &str = "en";

const RESOURCES: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en/main.ftl")),
    ("fr", include_str!("../locales/fr/main.ftl")),
];

/// Localized message lookup for one selected language
pub struct LocalizationManager {
    bundles: HashMap<&'static str, FluentBundle<FluentResource>>,
    language: &'static str,
}

impl std::fmt::Debug for LocalizationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizationManager")
            .field("language", &self.language)
            .finish()
    }
}

impl LocalizationManager {
    /// Load every embedded language and select `language`
    ///
    /// Unsupported languages fall back to English.
    pub fn new(language: &str) -> Result<Self> {
        let mut bundles = HashMap::new();
        for (code, source) in RESOURCES {
            bundles.insert(*code, Self::create_bundle(code, source)?);
        }

        let requested = language.trim().to_lowercase();
        let selected = RESOURCES
            .iter()
            .map(|(code, _)| *code)
            .find(|code| requested == *code || requested.starts_with(&format!("{code}-")))
            .unwrap_or_else(|| {
                warn!("Unsupported language '{}', using {}", language, FALLBACK_LANGUAGE);
                FALLBACK_LANGUAGE
            });
        debug!("Localization ready for '{}'", selected);

        Ok(Self {
            bundles,
            language: selected,
        })
    }

    fn create_bundle(code: &str, source: &str) -> Result<FluentBundle<FluentResource>> {
        let locale: LanguageIdentifier = code.parse()?;
        let mut bundle = FluentBundle::new_concurrent(vec![locale]);
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Invalid {code} messages: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Duplicate {code} messages: {errors:?}"))?;
        Ok(bundle)
    }

    /// Codes of the embedded languages
    pub fn supported_languages() -> Vec<&'static str> {
        RESOURCES.iter().map(|(code, _)| *code).collect()
    }

    /// Selected language code
    pub fn language(&self) -> &str {
        self.language
    }

    /// Whether the selected language (or the fallback) defines `key`
    pub fn has_message(&self, key: &str) -> bool {
        [self.language, FALLBACK_LANGUAGE]
            .iter()
            .filter_map(|code| self.bundles.get(code))
            .any(|bundle| bundle.has_message(key))
    }

    /// Get a localized message
    pub fn get_message(&self, key: &str, args: Option<&FluentArgs>) -> String {
        for code in [self.language, FALLBACK_LANGUAGE] {
            let Some(bundle) = self.bundles.get(code) else {
                continue;
            };
            let Some(pattern) = bundle.get_message(key).and_then(|msg| msg.value()) else {
                continue;
            };
            let mut errors = vec![];
            let value = bundle.format_pattern(pattern, args, &mut errors);
            if !errors.is_empty() {
                debug!("Formatting '{}' in {} reported {:?}", key, code, errors);
            }
            return value.into_owned();
        }
        warn!("Missing translation: {}", key);
        format!("Missing translation: {}", key)
    }

    /// Message without arguments
    pub fn message(&self, key: &str) -> String {
        self.get_message(key, None)
    }

    /// Message with string arguments
    pub fn message_with_args<V: AsRef<str>>(&self, key: &str, args: &[(&str, V)]) -> String {
        let mut fluent_args = FluentArgs::new();
        for (name, value) in args {
            fluent_args.set(*name, FluentValue::from(value.as_ref()));
        }
        self.get_message(key, Some(&fluent_args))
    }
}
