// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, SystemTime};

use bytes::Bytes;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{CacheKey, Error};

/// Upper bound applied to ttls so that `now + ttl` never overflows `SystemTime`.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// A cached value together with the time it stops being fresh.
///
/// The value is wrapped rather than stored bare so that any `V` can be cached, including
/// values that themselves mean "nothing" such as `None` or an empty default. An entry past
/// its expiry is stale but is still served as a best-effort value while a refresh runs.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, SystemTime};
///
/// use recall::CacheEntry;
///
/// let now = SystemTime::UNIX_EPOCH;
/// let entry = CacheEntry::expiring_in(Some(42), now, Duration::from_secs(60));
///
/// assert!(entry.is_fresh(now));
/// assert!(!entry.is_fresh(now + Duration::from_secs(60)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    value: V,
    expires_at: SystemTime,
}

impl<V> CacheEntry<V> {
    /// Creates an entry that expires at `expires_at`.
    pub fn new(value: V, expires_at: SystemTime) -> Self {
        Self { value, expires_at }
    }

    /// Creates an entry that expires `ttl` after `now`.
    pub fn expiring_in(value: V, now: SystemTime, ttl: Duration) -> Self {
        Self::new(value, expires_after(now, ttl))
    }

    /// Returns a reference to the cached value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the entry and returns the cached value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }

    /// Returns the time at which the entry becomes stale.
    #[must_use]
    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// Returns `true` while `now` is strictly before the expiry.
    #[must_use]
    pub fn is_fresh(&self, now: SystemTime) -> bool {
        self.expires_at > now
    }

    /// Returns the same value with a new expiry.
    #[must_use]
    pub fn with_expiry(self, expires_at: SystemTime) -> Self {
        Self::new(self.value, expires_at)
    }
}

impl<V> CacheEntry<V>
where
    V: Serialize,
{
    /// Encodes the entry in the format written to storage.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if the value cannot be serialized.
    pub fn encode(&self) -> Result<Bytes, Error> {
        postcard::to_allocvec(self).map(Bytes::from).map_err(Error::Encode)
    }
}

impl<V> CacheEntry<V>
where
    V: DeserializeOwned,
{
    /// Decodes an entry read from storage under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] naming `key` if the bytes are not a valid entry.
    pub fn decode(key: &CacheKey, bytes: &[u8]) -> Result<Self, Error> {
        postcard::from_bytes(bytes).map_err(|source| Error::Decode {
            key: key.to_string(),
            source,
        })
    }
}

pub(crate) fn expires_after(now: SystemTime, ttl: Duration) -> SystemTime {
    now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now)
}
