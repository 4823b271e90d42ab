use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// File name of the catalog inside the data directory
pub const CATALOG_FILE: &str = "catalog.json";

/// Descriptive collection metadata kept next to the tables
///
/// Counts are never stored here; they are derived from the tables on demand.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Catalog {
    /// Map of collection name -> entry
    pub collections: BTreeMap<String, CatalogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: String,
    pub last_updated: String,
}

/// Timestamp format used for catalog entries and chunk metadata
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

impl Catalog {
    /// Load catalog from disk
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Catalog file not found, starting with empty catalog");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read catalog file")?;

        let catalog: Catalog =
            serde_json::from_str(&content).context("Failed to parse catalog file")?;

        tracing::info!("Loaded catalog with {} collections", catalog.collections.len());
        Ok(catalog)
    }

    /// Save catalog to disk, replacing the previous file in one rename
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create catalog directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize catalog")?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).context("Failed to write catalog file")?;
        fs::rename(&tmp, path).context("Failed to replace catalog file")?;

        tracing::debug!("Saved catalog to {:?}", path);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.collections.get(name)
    }

    /// Record a new collection; keeps an existing entry untouched
    pub fn register(&mut self, name: &str, description: Option<&str>) {
        let now = timestamp_now();
        self.collections
            .entry(name.to_string())
            .or_insert_with(|| CatalogEntry {
                description: description.map(str::to_string),
                created_at: now.clone(),
                last_updated: now,
            });
    }

    /// Mark a collection as written now, registering it if needed
    pub fn touch(&mut self, name: &str) {
        let now = timestamp_now();
        match self.collections.get_mut(name) {
            Some(entry) => entry.last_updated = now,
            None => self.register(name, None),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<CatalogEntry> {
        self.collections.remove(name)
    }
}
