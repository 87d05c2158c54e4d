//! In-memory object store used by tests and local development.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;

use super::{ObjectStoreGateway, StorageError, StorageResult};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// BTreeMap-backed store; keys list in lexicographic order like S3.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    /// Substrings of keys whose `put` should fail, for fault injection.
    fail_put_containing: Mutex<Vec<String>>,
    fail_exists: Mutex<bool>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, body: Vec<u8>, content_type: &str) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every `put` whose key contains `fragment` fail.
    pub fn fail_puts_containing(&self, fragment: &str) {
        self.fail_put_containing
            .lock()
            .unwrap()
            .push(fragment.to_string());
    }

    /// Make every `exists` call fail with a non-absence error.
    pub fn fail_existence_checks(&self, fail: bool) {
        *self.fail_exists.lock().unwrap() = fail;
    }
}

#[async_trait]
impl ObjectStoreGateway for MemoryObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> StorageResult<()> {
        let poisoned = self
            .fail_put_containing
            .lock()
            .unwrap()
            .iter()
            .any(|fragment| key.contains(fragment));
        if poisoned {
            return Err(StorageError::Upload {
                key: key.to_string(),
                source: anyhow!("injected upload failure"),
            });
        }

        self.insert(key, body, content_type);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        if *self.fail_exists.lock().unwrap() {
            return Err(StorageError::Request(anyhow!("injected existence failure")));
        }
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}
