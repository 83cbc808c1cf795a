// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory storage backed by moka.

use std::time::{Duration, Instant};

use bytes::Bytes;
use moka::{Expiry, future::Cache};
use recall_store::{Error, Storage};

use crate::builder::MemoryStorageBuilder;

#[derive(Debug, Clone)]
struct StoredValue {
    bytes: Bytes,
    ttl: Option<Duration>,
}

/// Applies the per-entry backend ttl on insert and on every overwrite.
struct PerEntryExpiry;

impl Expiry<String, StoredValue> for PerEntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &StoredValue, _created_at: Instant) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// An in-process [`Storage`] backend.
///
/// Cloning is cheap and every clone shares the same entries.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use recall_memory::MemoryStorage;
/// use recall_store::Storage;
/// # futures::executor::block_on(async {
///
/// let storage = MemoryStorage::new();
/// storage.set("key", Bytes::from_static(b"value"), None).await?;
/// assert_eq!(storage.get("key").await?, Some(Bytes::from_static(b"value")));
/// # Ok::<(), recall_store::Error>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    inner: Cache<String, StoredValue>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Creates a new unbounded in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new in-memory storage holding at most `max_capacity` entries.
    #[must_use]
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self::builder().max_capacity(max_capacity).build()
    }

    /// Creates a new builder for configuring an in-memory storage.
    #[must_use]
    pub fn builder() -> MemoryStorageBuilder {
        MemoryStorageBuilder::new()
    }

    pub(crate) fn from_builder(builder: &MemoryStorageBuilder) -> Self {
        let mut moka_builder = Cache::builder().expire_after(PerEntryExpiry);

        if let Some(capacity) = builder.max_capacity {
            moka_builder = moka_builder.max_capacity(capacity);
        }

        if let Some(capacity) = builder.initial_capacity {
            moka_builder = moka_builder.initial_capacity(capacity);
        }

        if let Some(name) = builder.name.as_deref() {
            moka_builder = moka_builder.name(name);
        }

        Self {
            inner: moka_builder.build(),
        }
    }

    /// Returns the approximate number of stored entries.
    ///
    /// moka updates this count lazily, so it may briefly lag behind recent writes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Returns `true` if the storage holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs moka's pending maintenance tasks so that `len` is up to date.
    pub async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }
}

impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, Error> {
        Ok(self.inner.get(key).await.map(|stored| stored.bytes))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), Error> {
        self.inner.insert(key.to_string(), StoredValue { bytes: value, ttl }).await;
        Ok(())
    }

    async fn exist(&self, key: &str) -> Result<bool, Error> {
        Ok(self.inner.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.inner.invalidate(key).await;
        Ok(())
    }
}
