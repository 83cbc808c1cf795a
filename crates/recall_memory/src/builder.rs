// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring in-memory storage.

use crate::storage::MemoryStorage;

/// Builder for configuring a [`MemoryStorage`].
///
/// # Examples
///
/// ```
/// use recall_memory::MemoryStorage;
///
/// let storage = MemoryStorage::builder()
///     .max_capacity(1000)
///     .initial_capacity(100)
///     .name("method-results")
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorageBuilder {
    pub(crate) max_capacity: Option<u64>,
    pub(crate) initial_capacity: Option<usize>,
    pub(crate) name: Option<String>,
}

impl MemoryStorageBuilder {
    /// Creates a new builder for an unbounded storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of entries.
    ///
    /// Once reached, entries are evicted using moka's `TinyLFU` policy. Evicted
    /// results are simply recomputed by the next caller.
    #[must_use]
    pub fn max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }

    /// Sets the initial capacity (pre-allocation hint).
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = Some(capacity);
        self
    }

    /// Sets a name that may appear in moka's debugging output.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the configured [`MemoryStorage`].
    #[must_use]
    pub fn build(self) -> MemoryStorage {
        MemoryStorage::from_builder(&self)
    }
}
