//! Locale dictionaries: `<localesDir>/<locale>/common.json`.
//!
//! New keys are merged into whatever the file already holds. Existing
//! values are never overwritten, and keys are written sorted.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::keys::TranslationEntry;
use crate::utils::write_atomic;

pub const DICTIONARY_FILE: &str = "common.json";

/// Action taken on a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Added,
    /// The key already had a value, which is kept.
    Kept,
}

/// Result of writing one locale's dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryUpdate {
    pub locale: String,
    pub path: PathBuf,
    pub added: usize,
    pub kept: usize,
}

pub fn dictionary_path(root: &Path, locales_dir: &str, locale: &str) -> PathBuf {
    root.join(locales_dir).join(locale).join(DICTIONARY_FILE)
}

/// JSON writer for one locale file
#[derive(Debug)]
pub struct DictionaryWriter {
    file_path: PathBuf,
    data: Map<String, Value>,
}

impl DictionaryWriter {
    /// Open an existing JSON file or create a new empty one
    pub fn open_or_create(path: &Path) -> Result<Self> {
        let data = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
            let value: Value = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON: {}", path.display()))?;
            match value {
                Value::Object(map) => map,
                _ => bail!("Root of JSON file must be an object: {}", path.display()),
            }
        } else {
            Map::new()
        };

        Ok(Self {
            file_path: path.to_path_buf(),
            data,
        })
    }

    /// Add `key` unless it already has a value. Dotted keys address nested
    /// objects, the way i18next resolves them.
    pub fn add(&mut self, key: &str, text: &str) -> KeyAction {
        let parts: Vec<&str> = key.split('.').collect();
        insert_nested(&mut self.data, &parts, Value::String(text.to_string()))
    }

    /// Every string value, keyed by its dotted path.
    pub fn flatten(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        flatten_into(&self.data, "", &mut out);
        out
    }

    /// Save with sorted keys, 2-space indentation and a trailing newline.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(&sorted(&Value::Object(self.data.clone())))
            .context("Failed to serialize JSON")?;

        write_atomic(&self.file_path, &format!("{}\n", content))
    }
}

/// Existing source-locale entries, used to seed the key table.
pub fn load_existing_entries(root: &Path, locales_dir: &str, locale: &str) -> Result<Vec<(String, String)>> {
    let path = dictionary_path(root, locales_dir, locale);
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(DictionaryWriter::open_or_create(&path)?.flatten())
}

/// Open every locale's dictionary up front, so a malformed file stops the
/// run before any source is rewritten.
pub fn open_dictionaries(
    root: &Path,
    locales_dir: &str,
    locales: &[String],
) -> Result<Vec<(String, DictionaryWriter)>> {
    locales
        .iter()
        .map(|locale| {
            let path = dictionary_path(root, locales_dir, locale);
            Ok((locale.clone(), DictionaryWriter::open_or_create(&path)?))
        })
        .collect()
}

/// A dictionary that could not be saved.
#[derive(Debug)]
pub struct DictionaryFailure {
    pub locale: String,
    pub path: PathBuf,
    pub error: anyhow::Error,
}

/// Merge `entries` into every opened dictionary.
///
/// The source locale gets each entry's source text; other locales get the
/// entry's translation for that locale, when there is one. A failed save
/// does not stop the remaining locales.
pub fn write_dictionaries(
    writers: Vec<(String, DictionaryWriter)>,
    source_locale: &str,
    entries: &[TranslationEntry],
) -> (Vec<DictionaryUpdate>, Vec<DictionaryFailure>) {
    let mut updates = Vec::with_capacity(writers.len());
    let mut failures = Vec::new();
    for (locale, mut writer) in writers {
        let (mut added, mut kept) = (0, 0);

        for entry in entries {
            let text = if locale == source_locale {
                Some(entry.source_text.as_str())
            } else {
                entry.translations.get(&locale).map(String::as_str)
            };
            let Some(text) = text else {
                tracing::debug!(key = %entry.key, %locale, "no translation");
                continue;
            };
            match writer.add(&entry.key, text) {
                KeyAction::Added => added += 1,
                KeyAction::Kept => kept += 1,
            }
        }

        let path = writer.file_path.clone();
        if let Err(error) = writer.save() {
            tracing::error!(%locale, path = %path.display(), "{:#}", error);
            failures.push(DictionaryFailure {
                locale,
                path,
                error,
            });
            continue;
        }
        tracing::info!(%locale, path = %path.display(), added, "dictionary written");
        updates.push(DictionaryUpdate {
            locale,
            path,
            added,
            kept,
        });
    }
    (updates, failures)
}

/// Insert a value at a nested path, creating intermediate objects as needed
fn insert_nested(root: &mut Map<String, Value>, path: &[&str], value: Value) -> KeyAction {
    let Some((first, rest)) = path.split_first() else {
        return KeyAction::Kept;
    };

    if rest.is_empty() {
        if root.contains_key(*first) {
            return KeyAction::Kept;
        }
        root.insert(first.to_string(), value);
        return KeyAction::Added;
    }

    let next_level = root
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    match next_level.as_object_mut() {
        Some(inner) => insert_nested(inner, rest, value),
        // A string already sits where an object is needed.
        None => KeyAction::Kept,
    }
}

fn flatten_into(map: &Map<String, Value>, prefix: &str, out: &mut Vec<(String, String)>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::String(s) => out.push((path, s.clone())),
            Value::Object(inner) => flatten_into(inner, &path, out),
            _ => {}
        }
    }
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), sorted(&map[key]));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}
