//! Localized response catalogs
//!
//! Each catalog maps a primary language subtag to an ordered list of message
//! variants. Catalogs are loaded once at startup and shared read-only; lookups
//! are pure apart from the caller-supplied random source.

mod loader;

pub use loader::CatalogError;

use rand::Rng;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The catalogs the fulfillment core reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogName {
    Welcome,
    GeneralFallback,
    FinalFallback,
}

impl CatalogName {
    pub const ALL: [CatalogName; 3] = [
        CatalogName::Welcome,
        CatalogName::GeneralFallback,
        CatalogName::FinalFallback,
    ];

    /// File holding this catalog, in the bundled set or an override directory
    pub fn file_name(self) -> &'static str {
        match self {
            CatalogName::Welcome => "welcome.json",
            CatalogName::GeneralFallback => "general_fallback.json",
            CatalogName::FinalFallback => "final_fallback.json",
        }
    }
}

impl fmt::Display for CatalogName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CatalogName::Welcome => "WELCOME",
            CatalogName::GeneralFallback => "GENERAL_FALLBACK",
            CatalogName::FinalFallback => "FINAL_FALLBACK",
        };
        f.write_str(name)
    }
}

/// Which variant of a locale's message list to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantIndex {
    /// Uniformly random variant
    Random,
    /// Exactly this variant; out of bounds is a miss
    Exact(usize),
    /// This variant, wrapping around the variant count
    Cycle(usize),
}

impl fmt::Display for VariantIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantIndex::Random => f.write_str("random"),
            VariantIndex::Exact(n) | VariantIndex::Cycle(n) => write!(f, "{n}"),
        }
    }
}

/// Requested locale or variant is not present in a catalog
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Translation number {index} could not be found for locale {locale} in {catalog}")]
pub struct LocalizationMiss {
    pub catalog: CatalogName,
    pub locale: String,
    pub index: VariantIndex,
}

impl LocalizationMiss {
    /// Text delivered to the user in place of the missing message
    pub fn diagnostic(&self) -> String {
        format!(
            "Error: Translation number {} could not be found for locale {}",
            self.index, self.locale
        )
    }
}

/// Locale-keyed message variants for one catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseSet {
    variants: HashMap<String, Vec<String>>,
}

impl ResponseSet {
    /// Variants for a primary subtag (already truncated)
    pub fn variants(&self, primary: &str) -> Option<&[String]> {
        self.variants.get(primary).map(Vec::as_slice)
    }

    pub fn variant_count(&self, primary: &str) -> usize {
        self.variants(primary).map_or(0, <[String]>::len)
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }
}

/// The three catalogs used by the handlers
#[derive(Debug, Clone)]
pub struct ResponseCatalog {
    welcome: ResponseSet,
    general_fallback: ResponseSet,
    final_fallback: ResponseSet,
}

impl ResponseCatalog {
    pub fn new(
        welcome: ResponseSet,
        general_fallback: ResponseSet,
        final_fallback: ResponseSet,
    ) -> Self {
        Self {
            welcome,
            general_fallback,
            final_fallback,
        }
    }

    pub fn set(&self, name: CatalogName) -> &ResponseSet {
        match name {
            CatalogName::Welcome => &self.welcome,
            CatalogName::GeneralFallback => &self.general_fallback,
            CatalogName::FinalFallback => &self.final_fallback,
        }
    }

    /// Resolve a message for `locale`.
    ///
    /// The locale is truncated to its primary subtag and must match a catalog
    /// key exactly; there is no default-locale chain.
    ///
    /// # Errors
    ///
    /// Returns [`LocalizationMiss`] when the locale has no entry or an
    /// [`VariantIndex::Exact`] index is out of bounds.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        name: CatalogName,
        locale: &str,
        index: VariantIndex,
        rng: &mut R,
    ) -> Result<&str, LocalizationMiss> {
        let primary = primary_subtag(locale);
        let miss = || LocalizationMiss {
            catalog: name,
            locale: primary.clone(),
            index,
        };

        let variants = self
            .set(name)
            .variants(&primary)
            .filter(|variants| !variants.is_empty())
            .ok_or_else(miss)?;

        let position = match index {
            VariantIndex::Random => rng.gen_range(0..variants.len()),
            VariantIndex::Exact(n) => n,
            VariantIndex::Cycle(n) => n % variants.len(),
        };

        variants.get(position).map(String::as_str).ok_or_else(miss)
    }

    /// Like [`resolve`](Self::resolve), but a miss becomes diagnostic text so
    /// delivery never fails on a localization gap.
    pub fn resolve_or_diagnostic<R: Rng + ?Sized>(
        &self,
        name: CatalogName,
        locale: &str,
        index: VariantIndex,
        rng: &mut R,
    ) -> String {
        match self.resolve(name, locale, index, rng) {
            Ok(text) => text.to_string(),
            Err(miss) => {
                tracing::warn!(
                    catalog = %miss.catalog,
                    locale = %miss.locale,
                    index = %miss.index,
                    "Localization miss, sending diagnostic text"
                );
                miss.diagnostic()
            }
        }
    }
}

/// Primary language subtag used as the catalog key (`"en-US"` -> `"en"`)
pub fn primary_subtag(locale: &str) -> String {
    locale
        .trim()
        .chars()
        .take(2)
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn set(entries: &[(&str, &[&str])]) -> ResponseSet {
        ResponseSet::from_entries(
            CatalogName::Welcome,
            entries.iter().map(|(locale, msgs)| {
                (
                    (*locale).to_string(),
                    msgs.iter().map(|m| (*m).to_string()).collect(),
                )
            }),
        )
        .unwrap()
    }

    fn test_catalog() -> ResponseCatalog {
        ResponseCatalog::new(
            set(&[("en", &["hello", "hi", "hey"]), ("de", &["hallo"])]),
            set(&[("en", &["again?", "what?", "pardon?"])]),
            set(&[("en", &["bye"])]),
        )
    }

    #[test]
    fn test_primary_subtag() {
        assert_eq!(primary_subtag("en-US"), "en");
        assert_eq!(primary_subtag("de"), "de");
        assert_eq!(primary_subtag("FR-ca"), "fr");
        assert_eq!(primary_subtag("pt_BR"), "pt");
        assert_eq!(primary_subtag(""), "");
    }

    #[test]
    fn test_exact_index_is_stable() {
        let catalog = test_catalog();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..5 {
            let text = catalog
                .resolve(CatalogName::Welcome, "en-US", VariantIndex::Exact(0), &mut rng)
                .unwrap();
            assert_eq!(text, "hello");
        }
    }

    #[test]
    fn test_random_index_stays_in_bounds() {
        let catalog = test_catalog();
        let mut rng = StdRng::seed_from_u64(42);
        for locale in ["en", "de"] {
            let variants = catalog.set(CatalogName::Welcome).variants(locale).unwrap();
            for _ in 0..50 {
                let text = catalog
                    .resolve(CatalogName::Welcome, locale, VariantIndex::Random, &mut rng)
                    .unwrap();
                assert!(variants.iter().any(|v| v == text));
            }
        }
    }

    #[test]
    fn test_random_is_deterministic_for_same_seed() {
        let catalog = test_catalog();
        let picks = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..10)
                .map(|_| {
                    catalog
                        .resolve(CatalogName::Welcome, "en", VariantIndex::Random, &mut rng)
                        .unwrap()
                        .to_string()
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(picks(7), picks(7));
    }

    #[test]
    fn test_cycle_wraps_past_variant_count() {
        let catalog = test_catalog();
        let mut rng = StdRng::seed_from_u64(0);
        let text = catalog
            .resolve(CatalogName::GeneralFallback, "en", VariantIndex::Cycle(4), &mut rng)
            .unwrap();
        assert_eq!(text, "what?");
    }

    #[test]
    fn test_missing_locale_is_a_miss() {
        let catalog = test_catalog();
        let mut rng = StdRng::seed_from_u64(0);
        let miss = catalog
            .resolve(CatalogName::FinalFallback, "ja-JP", VariantIndex::Random, &mut rng)
            .unwrap_err();
        assert_eq!(miss.locale, "ja");
        assert_eq!(miss.catalog, CatalogName::FinalFallback);
    }

    #[test]
    fn test_out_of_bounds_exact_index_degrades_to_diagnostic() {
        let catalog = test_catalog();
        let mut rng = StdRng::seed_from_u64(0);
        let text = catalog.resolve_or_diagnostic(
            CatalogName::Welcome,
            "de-DE",
            VariantIndex::Exact(3),
            &mut rng,
        );
        assert_eq!(
            text,
            "Error: Translation number 3 could not be found for locale de"
        );
    }
}
