//! Catalog loading
//!
//! The JSON files under `responses/` are embedded into the binary; a
//! directory holding files of the same names can replace them at startup.

use super::{primary_subtag, CatalogName, ResponseCatalog, ResponseSet};
use rust_embed::Embed;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Embed)]
#[folder = "responses"]
struct BundledResponses;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog file not found: {0}")]
    Missing(String),
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid catalog {name}: {source}")]
    Parse {
        name: CatalogName,
        #[source]
        source: serde_json::Error,
    },
    #[error("Catalog {0} has no locales")]
    Empty(CatalogName),
    #[error("Catalog {name} has no variants for locale {locale}")]
    EmptyLocale { name: CatalogName, locale: String },
    #[error("Catalog {name} lists locale {locale} more than once")]
    DuplicateLocale { name: CatalogName, locale: String },
}

/// One element of a catalog file: `{ "locale": "en", "msg": [...] }`
#[derive(Debug, Deserialize)]
struct LocaleEntry {
    locale: String,
    msg: Vec<String>,
}

impl ResponseSet {
    /// Build a set, keying each entry by its primary subtag.
    ///
    /// # Errors
    ///
    /// Fails when there are no entries, a locale has no variants, or two
    /// entries collapse onto the same primary subtag.
    pub fn from_entries(
        name: CatalogName,
        entries: impl IntoIterator<Item = (String, Vec<String>)>,
    ) -> Result<Self, CatalogError> {
        let mut variants = HashMap::new();
        for (locale, msgs) in entries {
            let key = primary_subtag(&locale);
            if msgs.is_empty() {
                return Err(CatalogError::EmptyLocale { name, locale });
            }
            if variants.insert(key, msgs).is_some() {
                return Err(CatalogError::DuplicateLocale { name, locale });
            }
        }
        if variants.is_empty() {
            return Err(CatalogError::Empty(name));
        }
        Ok(Self { variants })
    }

    /// Parse a catalog file.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON or any [`from_entries`](Self::from_entries)
    /// validation error.
    pub fn from_json(name: CatalogName, bytes: &[u8]) -> Result<Self, CatalogError> {
        let entries: Vec<LocaleEntry> =
            serde_json::from_slice(bytes).map_err(|source| CatalogError::Parse { name, source })?;
        Self::from_entries(name, entries.into_iter().map(|e| (e.locale, e.msg)))
    }
}

impl ResponseCatalog {
    /// Load from `dir` when given, otherwise from the embedded files.
    ///
    /// # Errors
    ///
    /// Propagates the first [`CatalogError`] hit while loading.
    pub fn load(dir: Option<&Path>) -> Result<Self, CatalogError> {
        match dir {
            Some(dir) => Self::from_dir(dir),
            None => Self::bundled(),
        }
    }

    /// Catalogs compiled into the binary.
    ///
    /// # Errors
    ///
    /// Fails if a bundled file is missing or invalid.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_source(|name| {
            BundledResponses::get(name.file_name())
                .map(|file| file.data.to_vec())
                .ok_or_else(|| CatalogError::Missing(name.file_name().to_string()))
        })
    }

    /// Catalogs read from `dir/<catalog>.json`.
    ///
    /// # Errors
    ///
    /// Fails if a file is unreadable or invalid.
    pub fn from_dir(dir: &Path) -> Result<Self, CatalogError> {
        Self::from_source(|name| {
            let path = dir.join(name.file_name());
            std::fs::read(&path).map_err(|source| CatalogError::Io { path, source })
        })
    }

    fn from_source(
        read: impl Fn(CatalogName) -> Result<Vec<u8>, CatalogError>,
    ) -> Result<Self, CatalogError> {
        let load = |name| -> Result<ResponseSet, CatalogError> {
            let set = ResponseSet::from_json(name, &read(name)?)?;
            tracing::debug!(catalog = %name, locales = ?set.locales().collect::<Vec<_>>(), "Catalog loaded");
            Ok(set)
        };
        Ok(Self::new(
            load(CatalogName::Welcome)?,
            load(CatalogName::GeneralFallback)?,
            load(CatalogName::FinalFallback)?,
        ))
    }
}
