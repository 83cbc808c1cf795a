// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for key-value storage backends.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;

use crate::Error;

/// Trait for key-value storage backends.
///
/// Values are opaque, already-encoded bytes, so one backend instance can serve cached
/// methods of any return type. Writes always replace the stored value wholesale.
///
/// The `ttl` passed to [`set`](Storage::set) is a hint for backend-managed expiry.
/// `None` means the backend must keep the value until it is overwritten, deleted or
/// evicted under memory pressure; the cache core always writes result entries this way
/// and tracks freshness inside the value itself.
pub trait Storage: Send + Sync {
    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Bytes>, Error>> + Send;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Returns `true` if the backend holds a value for `key`.
    fn exist(&self, key: &str) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Removes the value stored under `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), Error>> + Send;
}

impl<S> Storage for Arc<S>
where
    S: Storage,
{
    async fn get(&self, key: &str) -> Result<Option<Bytes>, Error> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), Error> {
        (**self).set(key, value, ttl).await
    }

    async fn exist(&self, key: &str) -> Result<bool, Error> {
        (**self).exist(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        (**self).delete(key).await
    }
}
