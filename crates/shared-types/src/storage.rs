//! # Storage Collaborators
//!
//! The query and write contracts the landlord and renters need from the
//! persistent store, plus in-memory adapters used by tests and single-process
//! deployments.

use crate::entities::{Contact, MirrorRecord, NodeId, StorageItem};
use crate::errors::StoreError;
use crate::now_millis;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Farmer contacts and their reliability metrics.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn find_by_id(&self, node_id: &NodeId) -> Result<Option<Contact>, StoreError>;

    /// Up to `limit` contacts, most recently seen first.
    async fn find_recent(&self, limit: usize) -> Result<Vec<Contact>, StoreError>;

    /// Upsert a contact seen on the network, stamping `last_seen`.
    ///
    /// Existing reliability metrics are preserved.
    async fn record(&self, contact: &Contact) -> Result<(), StoreError>;

    /// Persist a contact as given, metrics included.
    async fn save(&self, contact: &Contact) -> Result<(), StoreError>;
}

/// Queued mirror candidates.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    async fn create(&self, record: MirrorRecord) -> Result<(), StoreError>;
}

/// Storage items keyed by shard hash.
#[async_trait]
pub trait StorageManager: Send + Sync {
    /// Returns [`StoreError::NotFound`] when no item exists for `hash`.
    async fn load(&self, hash: &str) -> Result<StorageItem, StoreError>;

    async fn save(&self, item: &StorageItem) -> Result<(), StoreError>;
}

fn check_available(fail: &AtomicBool) -> Result<(), StoreError> {
    if fail.load(Ordering::SeqCst) {
        return Err(StoreError::Backend("store unavailable".to_string()));
    }
    Ok(())
}

// =============================================================================
// IN-MEMORY ADAPTERS
// =============================================================================

#[derive(Default)]
pub struct InMemoryContactStore {
    contacts: RwLock<HashMap<NodeId, Contact>>,
    fail: AtomicBool,
}

impl InMemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contacts(contacts: impl IntoIterator<Item = Contact>) -> Self {
        let store = Self::new();
        store
            .contacts
            .write()
            .extend(contacts.into_iter().map(|c| (c.node_id, c)));
        store
    }

    /// Make every subsequent call fail with a backend error.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, node_id: &NodeId) -> Option<Contact> {
        self.contacts.read().get(node_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.contacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.read().is_empty()
    }
}

#[async_trait]
impl ContactStore for InMemoryContactStore {
    async fn find_by_id(&self, node_id: &NodeId) -> Result<Option<Contact>, StoreError> {
        check_available(&self.fail)?;
        Ok(self.get(node_id))
    }

    async fn find_recent(&self, limit: usize) -> Result<Vec<Contact>, StoreError> {
        check_available(&self.fail)?;
        let mut contacts: Vec<Contact> = self.contacts.read().values().cloned().collect();
        contacts.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        contacts.truncate(limit);
        Ok(contacts)
    }

    async fn record(&self, contact: &Contact) -> Result<(), StoreError> {
        check_available(&self.fail)?;
        let now = now_millis();
        let mut contacts = self.contacts.write();
        contacts
            .entry(contact.node_id)
            .and_modify(|existing| {
                existing.address = contact.address.clone();
                existing.port = contact.port;
                existing.last_seen = Some(now);
            })
            .or_insert_with(|| Contact {
                last_seen: Some(now),
                ..contact.clone()
            });
        Ok(())
    }

    async fn save(&self, contact: &Contact) -> Result<(), StoreError> {
        check_available(&self.fail)?;
        self.contacts.write().insert(contact.node_id, contact.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMirrorStore {
    records: RwLock<Vec<MirrorRecord>>,
    fail: AtomicBool,
}

impl InMemoryMirrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<MirrorRecord> {
        self.records.read().clone()
    }
}

#[async_trait]
impl MirrorStore for InMemoryMirrorStore {
    async fn create(&self, record: MirrorRecord) -> Result<(), StoreError> {
        check_available(&self.fail)?;
        self.records.write().push(record);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStorageManager {
    items: RwLock<HashMap<String, StorageItem>>,
    fail: AtomicBool,
}

impl InMemoryStorageManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, hash: &str) -> Option<StorageItem> {
        self.items.read().get(hash).cloned()
    }

    pub fn insert(&self, item: StorageItem) {
        self.items.write().insert(item.hash.clone(), item);
    }
}

#[async_trait]
impl StorageManager for InMemoryStorageManager {
    async fn load(&self, hash: &str) -> Result<StorageItem, StoreError> {
        check_available(&self.fail)?;
        self.get(hash)
            .ok_or_else(|| StoreError::NotFound(hash.to_string()))
    }

    async fn save(&self, item: &StorageItem) -> Result<(), StoreError> {
        check_available(&self.fail)?;
        self.insert(item.clone());
        Ok(())
    }
}
