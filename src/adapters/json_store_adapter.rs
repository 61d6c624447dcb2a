//! JSON file document store adapter.
//!
//! One `{key}.json` file per document under a base directory.

use crate::domain::error::ReplayError;
use crate::ports::store_port::DocumentStorePort;
use std::fs;
use std::path::PathBuf;

pub struct JsonStoreAdapter {
    base_path: PathBuf,
}

impl JsonStoreAdapter {
    /// Creates the directory if it does not exist yet.
    pub fn new(base_path: PathBuf) -> Result<Self, ReplayError> {
        fs::create_dir_all(&base_path).map_err(|e| ReplayError::Store {
            reason: format!("failed to create {}: {}", base_path.display(), e),
        })?;
        Ok(Self { base_path })
    }

    fn document_path(&self, key: &str) -> Result<PathBuf, ReplayError> {
        validate_key(key)?;
        Ok(self.base_path.join(format!("{key}.json")))
    }
}

/// Keys double as file names, so they are restricted to a safe alphabet.
fn validate_key(key: &str) -> Result<(), ReplayError> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if ok {
        Ok(())
    } else {
        Err(ReplayError::Store {
            reason: format!("invalid document key '{key}'"),
        })
    }
}

impl DocumentStorePort for JsonStoreAdapter {
    fn put(&self, key: &str, document: &serde_json::Value) -> Result<(), ReplayError> {
        let path = self.document_path(key)?;
        let content =
            serde_json::to_string_pretty(document).map_err(|e| ReplayError::Store {
                reason: format!("failed to serialize document '{key}': {e}"),
            })?;
        fs::write(&path, content).map_err(|e| ReplayError::Store {
            reason: format!("failed to write {}: {}", path.display(), e),
        })
    }

    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, ReplayError> {
        let path = self.document_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| ReplayError::Store {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| ReplayError::Store {
                reason: format!("malformed document '{key}': {e}"),
            })
    }

    fn delete(&self, key: &str) -> Result<bool, ReplayError> {
        let path = self.document_path(key)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| ReplayError::Store {
            reason: format!("failed to delete {}: {}", path.display(), e),
        })?;
        Ok(true)
    }

    fn list_keys(&self) -> Result<Vec<String>, ReplayError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| ReplayError::Store {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ReplayError::Store {
                reason: format!("directory entry error: {}", e),
            })?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(stem) = name_str.strip_suffix(".json") {
                keys.push(stem.to_string());
            }
        }

        keys.sort();
        Ok(keys)
    }
}
