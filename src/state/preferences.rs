use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use super::data::{Category, Manifest};
use crate::error::Result;

/// Key of the date stamp of the last successful manifest refresh
pub const LAST_ASSETS_UPDATE_KEY: &str = "LastAssetsUpdate";

/// Face pack used when the user never picked one
pub const DEFAULT_CARD_FACES: &str = "deck1";

/// Simple key/value store for user preferences.
///
/// Owned by the host application; the asset core only reads selections and
/// records the manifest refresh stamp through it.
pub trait Preferences: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;
    fn set_string(&self, key: &str, value: &str) -> Result<()>;
    fn get_int(&self, key: &str) -> Option<i64>;
    fn set_int(&self, key: &str, value: i64) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Preferences kept in memory only
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Preferences for MemoryPreferences {
    fn get_string(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).and_then(Value::as_str).map(str::to_string)
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.values).insert(key.to_string(), Value::from(value));
        Ok(())
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        lock(&self.values).get(key).and_then(Value::as_i64)
    }

    fn set_int(&self, key: &str, value: i64) -> Result<()> {
        lock(&self.values).insert(key.to_string(), Value::from(value));
        Ok(())
    }
}

/// Preferences persisted as a flat JSON object, rewritten on every change
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl FilePreferences {
    /// Open the preference file, starting empty if it is missing or corrupt
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "discarding unreadable preferences");
                Map::new()
            }),
            Err(_) => Map::new(),
        };

        Self {
            path,
            values: Mutex::new(values),
        }
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut values = lock(&self.values);
        values.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&*values)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl Preferences for FilePreferences {
    fn get_string(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).and_then(Value::as_str).map(str::to_string)
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.set(key, Value::from(value))
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        lock(&self.values).get(key).and_then(Value::as_i64)
    }

    fn set_int(&self, key: &str, value: i64) -> Result<()> {
        self.set(key, Value::from(value))
    }
}

/// Bundle identifiers the user picked for each category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selections {
    pub card_faces: Option<String>,
    pub card_back: Option<String>,
    pub background: Option<String>,
}

impl Selections {
    /// Read all three selections. Categories without a stored value fall back
    /// to `deck1` for faces and to the first manifest entry otherwise.
    pub fn from_preferences(prefs: &dyn Preferences, manifest: &Manifest) -> Self {
        let read = |category: Category| {
            prefs
                .get_string(category.preference_key())
                .or_else(|| match category {
                    Category::CardFaces => Some(DEFAULT_CARD_FACES.to_string()),
                    _ => manifest.bundles(category).first().cloned(),
                })
        };

        Self {
            card_faces: read(Category::CardFaces),
            card_back: read(Category::CardBack),
            background: read(Category::Background),
        }
    }

    pub fn get(&self, category: Category) -> Option<&str> {
        match category {
            Category::CardFaces => self.card_faces.as_deref(),
            Category::CardBack => self.card_back.as_deref(),
            Category::Background => self.background.as_deref(),
        }
    }
}
