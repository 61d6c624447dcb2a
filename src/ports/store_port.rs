//! Document store port trait.

use crate::domain::error::ReplayError;

/// Opaque key → JSON document store for templates and saved sessions.
/// Semantics are last-write-wins; no transactional guarantees are assumed.
pub trait DocumentStorePort {
    fn put(&self, key: &str, document: &serde_json::Value) -> Result<(), ReplayError>;

    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, ReplayError>;

    /// Returns whether the key existed.
    fn delete(&self, key: &str) -> Result<bool, ReplayError>;

    fn list_keys(&self) -> Result<Vec<String>, ReplayError>;
}
