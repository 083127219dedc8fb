use super::db::Database;
use crate::error::{TrackerError, TrackerResult};
use std::sync::Arc;
use tracing::debug;

/// Key/value preferences, last write wins
#[derive(Clone)]
pub struct SettingsStore {
    db: Arc<Database>,
}

impl SettingsStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.db.read(|tables| tables.settings.get(key).cloned())
    }

    pub fn set(&self, key: &str, value: &str) -> TrackerResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(TrackerError::Validation("setting key must not be empty".to_string()));
        }
        self.db.write(|tables| {
            tables.settings.insert(key.to_string(), value.to_string());
            Ok(())
        })?;
        debug!(key, value, "saved setting");
        Ok(())
    }

    /// All settings sorted by key
    pub fn all(&self) -> Vec<(String, String)> {
        self.db.read(|tables| {
            tables
                .settings
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }
}
