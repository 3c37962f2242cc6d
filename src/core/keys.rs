//! Translation key allocation.
//!
//! The table is the only shared mutable state of a run. Every operation
//! takes the lock for its whole insert-if-absent step, so concurrent
//! allocations of the same text collapse into one entry.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::utils::collapse_whitespace;

const MAX_SLUG_WORDS: usize = 5;
const MAX_SLUG_LEN: usize = 40;
const FALLBACK_KEY: &str = "text";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationEntry {
    pub key: String,
    /// Normalized text, with the casing of its first occurrence.
    pub source_text: String,
    /// Locale -> localized text.
    pub translations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub key: String,
    /// False when the text already had an entry.
    pub created: bool,
}

#[derive(Default)]
struct Inner {
    /// Case-folded normalized text -> key.
    by_text: HashMap<String, String>,
    entries: BTreeMap<String, TranslationEntry>,
}

#[derive(Default)]
pub struct KeyTable {
    inner: Mutex<Inner>,
}

/// Trim and collapse inner whitespace.
pub fn normalize_text(text: &str) -> String {
    collapse_whitespace(text)
}

/// Lowercased `_`-joined slug of the first five alphanumeric words, at most
/// 40 characters, `text` when nothing is left.
///
/// ```
/// use lingofit::core::keys::slugify;
///
/// assert_eq!(slugify("Sign in to your account now, please"), "sign_in_to_your_account");
/// assert_eq!(slugify("Don't panic!"), "don_t_panic");
/// assert_eq!(slugify("!!!"), "text");
/// ```
pub fn slugify(text: &str) -> String {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .take(MAX_SLUG_WORDS)
        .map(|w| w.to_lowercase())
        .collect();

    let mut slug = String::new();
    for word in words {
        let separator = usize::from(!slug.is_empty());
        let room = MAX_SLUG_LEN.saturating_sub(slug.chars().count() + separator);
        if room == 0 {
            break;
        }
        if separator == 1 {
            slug.push('_');
        }
        slug.extend(word.chars().take(room));
    }

    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        FALLBACK_KEY.to_string()
    } else {
        slug.to_string()
    }
}

fn text_digest(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest
        .iter()
        .take(3)
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn fold(text: &str) -> String {
    text.to_lowercase()
}

impl KeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table with entries from an existing source-locale dictionary
    /// so repeated runs reuse keys.
    pub fn with_existing(existing: impl IntoIterator<Item = (String, String)>) -> Self {
        let table = Self::new();
        {
            let mut inner = table.inner.lock();
            for (key, text) in existing {
                let text = normalize_text(&text);
                inner
                    .by_text
                    .entry(fold(&text))
                    .or_insert_with(|| key.clone());
                inner.entries.entry(key.clone()).or_insert(TranslationEntry {
                    key,
                    source_text: text,
                    translations: BTreeMap::new(),
                });
            }
        }
        table
    }

    /// Key for `text`, creating an entry if the normalized text is new.
    pub fn allocate(&self, text: &str) -> Allocation {
        let normalized = normalize_text(text);
        let folded = fold(&normalized);

        let mut inner = self.inner.lock();
        if let Some(key) = inner.by_text.get(&folded) {
            return Allocation {
                key: key.clone(),
                created: false,
            };
        }

        let slug = slugify(&normalized);
        let key = if !inner.entries.contains_key(&slug) {
            slug
        } else {
            let hashed = format!("{}_{}", slug, text_digest(&folded));
            if !inner.entries.contains_key(&hashed) {
                hashed
            } else {
                (2..)
                    .map(|n| format!("{}_{}", hashed, n))
                    .find(|candidate| !inner.entries.contains_key(candidate))
                    .unwrap_or(hashed)
            }
        };

        tracing::debug!(%key, text = %normalized, "allocated key");
        inner.by_text.insert(folded, key.clone());
        inner.entries.insert(
            key.clone(),
            TranslationEntry {
                key: key.clone(),
                source_text: normalized,
                translations: BTreeMap::new(),
            },
        );
        Allocation { key, created: true }
    }

    /// Record a localized text. Existing translations are kept.
    pub fn set_translation(&self, key: &str, locale: &str, text: &str) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get_mut(key) {
            entry
                .translations
                .entry(locale.to_string())
                .or_insert_with(|| text.to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<TranslationEntry> {
        self.inner.lock().entries.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, sorted by key.
    pub fn entries(&self) -> Vec<TranslationEntry> {
        self.inner.lock().entries.values().cloned().collect()
    }
}
