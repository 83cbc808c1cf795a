// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock storage implementation for testing.
//!
//! This module provides `MockStorage`, an in-memory backend that records every
//! operation and supports failure injection for exercising error paths.

use std::{collections::HashMap, sync::Arc, time::Duration};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::{Error, Storage};

/// Recorded storage operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    /// A get operation was performed with the given key.
    Get(String),
    /// A set operation was performed.
    Set {
        /// The key that was written.
        key: String,
        /// The encoded value that was written.
        value: Bytes,
        /// The backend expiry that was requested.
        ttl: Option<Duration>,
    },
    /// An exist operation was performed with the given key.
    Exist(String),
    /// A delete operation was performed with the given key.
    Delete(String),
}

impl StorageOp {
    /// Returns the key this operation touched.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Get(key) | Self::Exist(key) | Self::Delete(key) | Self::Set { key, .. } => key,
        }
    }

    /// Returns `true` for operations that mutate the backend.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Set { .. } | Self::Delete(_))
    }
}

type FailPredicate = Box<dyn Fn(&StorageOp) -> bool + Send + Sync>;

/// A configurable mock storage backend for testing.
///
/// All clones share the same data, operation log and failure predicate.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use recall_store::{Storage, testing::{MockStorage, StorageOp}};
///
/// # futures::executor::block_on(async {
/// let storage = MockStorage::new();
///
/// storage.set("key", Bytes::from_static(b"v"), None).await.unwrap();
/// assert_eq!(storage.get("key").await.unwrap(), Some(Bytes::from_static(b"v")));
///
/// storage.fail_when(|op| matches!(op, StorageOp::Get(_)));
/// assert!(storage.get("key").await.is_err());
/// # });
/// ```
#[derive(Clone, Default)]
pub struct MockStorage {
    data: Arc<Mutex<HashMap<String, Bytes>>>,
    operations: Arc<Mutex<Vec<StorageOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
}

impl std::fmt::Debug for MockStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStorage")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl MockStorage {
    /// Creates a new empty mock storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a predicate that decides which operations fail.
    ///
    /// Failing operations are still recorded but do not touch the stored data.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StorageOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StorageOp> {
        self.operations.lock().clone()
    }

    /// Returns the recorded `set` and `delete` operations.
    #[must_use]
    pub fn writes(&self) -> Vec<StorageOp> {
        self.operations.lock().iter().filter(|op| op.is_write()).cloned().collect()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    /// Returns the raw value stored under `key` without recording an operation.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Bytes> {
        self.data.lock().get(key).cloned()
    }

    /// Returns the keys currently stored.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.lock().keys().cloned().collect()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    fn check(&self, op: StorageOp, name: &'static str) -> Result<(), Error> {
        let fail = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        self.operations.lock().push(op);
        if fail {
            return Err(Error::unavailable(name, format!("mock: {name} failed")));
        }
        Ok(())
    }
}

impl Storage for MockStorage {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, Error> {
        self.check(StorageOp::Get(key.to_string()), "get")?;
        Ok(self.data.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), Error> {
        self.check(
            StorageOp::Set {
                key: key.to_string(),
                value: value.clone(),
                ttl,
            },
            "set",
        )?;
        self.data.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn exist(&self, key: &str) -> Result<bool, Error> {
        self.check(StorageOp::Exist(key.to_string()), "exist")?;
        Ok(self.data.lock().contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.check(StorageOp::Delete(key.to_string()), "delete")?;
        self.data.lock().remove(key);
        Ok(())
    }
}
