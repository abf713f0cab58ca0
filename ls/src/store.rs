//! Core Store implementation
//!
//! One JSONL file per collection under the base path. The whole collection is
//! rewritten on each mutation; collections are small (interactive-app scale)
//! and this keeps the on-disk format trivially inspectable.

use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::{Filter, Record};

/// The main document store
pub struct Store {
    /// Base path for storage
    base_path: PathBuf,
    /// In-memory collections: collection name -> (id -> raw record)
    collections: HashMap<String, HashMap<String, Value>>,
}

impl Store {
    /// Open or create a store at the given path and load existing collections
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create store directory")?;

        let mut store = Self {
            base_path,
            collections: HashMap::new(),
        };
        store.sync()?;

        debug!(base_path = %store.base_path.display(), "Opened store");
        Ok(store)
    }

    /// Create a new record, returning its id
    ///
    /// Fails if a record with the same id already exists in the collection.
    pub fn create<R: Record>(&mut self, record: R) -> Result<String> {
        let collection = R::collection_name();
        let id = record.id().to_string();

        let records = self.collections.entry(collection.to_string()).or_default();
        if records.contains_key(&id) {
            return Err(eyre::eyre!("Duplicate id '{}' in collection '{}'", id, collection));
        }

        let value = serde_json::to_value(&record).context("Failed to serialize record")?;
        records.insert(id.clone(), value);
        self.persist_collection(collection)?;

        debug!(%id, collection, "Created record");
        Ok(id)
    }

    /// Get a record by id
    pub fn get<R: Record>(&self, id: &str) -> Result<Option<R>> {
        let Some(records) = self.collections.get(R::collection_name()) else {
            return Ok(None);
        };

        match records.get(id) {
            Some(value) => {
                let record = serde_json::from_value(value.clone()).context("Failed to deserialize record")?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Get all records in a collection
    pub fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        self.list(&[])
    }

    /// List records matching all given filters, newest-updated first
    pub fn list<R: Record>(&self, filters: &[Filter]) -> Result<Vec<R>> {
        let Some(records) = self.collections.get(R::collection_name()) else {
            return Ok(Vec::new());
        };

        let mut result = Vec::new();
        for value in records.values() {
            let record: R = serde_json::from_value(value.clone()).context("Failed to deserialize record")?;
            let fields = record.indexed_fields();
            if filters.iter().all(|f| f.matches(&fields)) {
                result.push(record);
            }
        }

        result.sort_by_key(|r| std::cmp::Reverse(r.updated_at()));
        Ok(result)
    }

    /// Update an existing record
    ///
    /// Fails if the record does not exist. Last-writer-wins by id.
    pub fn update<R: Record>(&mut self, record: R) -> Result<()> {
        let collection = R::collection_name();
        let id = record.id().to_string();

        let records = self.collections.entry(collection.to_string()).or_default();
        if !records.contains_key(&id) {
            return Err(eyre::eyre!("No record '{}' in collection '{}'", id, collection));
        }

        let value = serde_json::to_value(&record).context("Failed to serialize record")?;
        records.insert(id.clone(), value);
        self.persist_collection(collection)?;

        debug!(%id, collection, "Updated record");
        Ok(())
    }

    /// Delete a record by id
    ///
    /// Deleting a missing record is a no-op.
    pub fn delete<R: Record>(&mut self, id: &str) -> Result<()> {
        let collection = R::collection_name();
        let Some(records) = self.collections.get_mut(collection) else {
            return Ok(());
        };

        if records.remove(id).is_some() {
            self.persist_collection(collection)?;
            info!(%id, collection, "Deleted record");
        } else {
            debug!(%id, collection, "Delete of missing record ignored");
        }
        Ok(())
    }

    /// Reload all collections from their JSONL files, discarding in-memory state
    pub fn sync(&mut self) -> Result<()> {
        self.collections.clear();

        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "jsonl").unwrap_or(false)
                && let Some(name) = path.file_stem().and_then(|s| s.to_str())
            {
                let records = Self::load_collection(&path)
                    .context(format!("Failed to load collection file {}", path.display()))?;
                debug!(collection = name, count = records.len(), "Loaded collection");
                self.collections.insert(name.to_string(), records);
            }
        }

        Ok(())
    }

    fn load_collection(path: &Path) -> Result<HashMap<String, Value>> {
        let file = fs::File::open(path)?;
        let reader = BufReader::new(file);

        let mut records = HashMap::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(&line)?;
            let id = value["id"]
                .as_str()
                .ok_or_else(|| eyre::eyre!("Record without string 'id' field"))?
                .to_string();
            records.insert(id, value);
        }

        Ok(records)
    }

    /// Rewrite a collection's JSONL file from memory
    fn persist_collection(&self, collection: &str) -> Result<()> {
        let path = self.base_path.join(format!("{}.jsonl", collection));
        let mut file = fs::File::create(&path).context(format!("Failed to write {}", path.display()))?;

        if let Some(records) = self.collections.get(collection) {
            for value in records.values() {
                writeln!(file, "{}", serde_json::to_string(value)?)?;
            }
        }

        Ok(())
    }
}
