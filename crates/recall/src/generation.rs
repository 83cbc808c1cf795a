// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Generational invalidation.
//!
//! Every (owner, method) pair has a generation token that is folded into its cache keys.
//! Advancing the token makes every previously written key unreachable without enumerating
//! or deleting anything; the storage backend reclaims the orphaned entries on its own.

use std::fmt::{self, Debug};

use futures::future::BoxFuture;
use recall_store::Storage;

use crate::key::{JOINER, NAMESPACE};
use crate::{Error, MethodId, Owner};

/// An opaque generation token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct GenerationToken(String);

impl GenerationToken {
    /// Wraps an existing token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Creates a random 64-bit token rendered as hex.
    #[must_use]
    pub fn random() -> Self {
        Self(format!("{:016x}", fastrand::u64(..)))
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GenerationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of generation tokens.
///
/// `current` is called once per fetch when the cache is generational, so implementations
/// should cost no more than a single backend read.
pub trait GenerationStore: Send + Sync + Debug {
    /// Returns the current token for `method` on `owner`, creating one if none exists.
    fn current<'a>(&'a self, owner: &'a Owner, method: MethodId) -> BoxFuture<'a, Result<GenerationToken, Error>>;

    /// Replaces the token for `method` on `owner` and returns the new one.
    fn advance<'a>(&'a self, owner: &'a Owner, method: MethodId) -> BoxFuture<'a, Result<GenerationToken, Error>>;
}

/// A [`GenerationStore`] that keeps tokens in a [`Storage`] backend.
///
/// Tokens are stored without backend expiry under
/// `recall,Generation,<signature>[,<identity digest>]`.
#[derive(Clone)]
pub struct StorageGenerations<S> {
    storage: S,
}

impl<S> StorageGenerations<S> {
    /// Creates a generation store over `storage`.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub(crate) fn key(owner: &Owner, method: MethodId) -> String {
        let mut parts = vec![NAMESPACE.to_string(), "Generation".to_string(), owner.signature(method)];
        if let Some(identity) = owner.identity() {
            parts.push(identity.to_string());
        }
        parts.join(JOINER)
    }
}

impl<S> StorageGenerations<S>
where
    S: Storage,
{
    async fn write(&self, key: &str) -> Result<GenerationToken, Error> {
        let token = GenerationToken::random();
        let bytes = postcard::to_allocvec(&token).map_err(Error::Encode)?;
        self.storage.set(key, bytes.into(), None).await?;
        Ok(token)
    }
}

impl<S> Debug for StorageGenerations<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageGenerations").finish_non_exhaustive()
    }
}

impl<S> GenerationStore for StorageGenerations<S>
where
    S: Storage,
{
    fn current<'a>(&'a self, owner: &'a Owner, method: MethodId) -> BoxFuture<'a, Result<GenerationToken, Error>> {
        Box::pin(async move {
            let key = Self::key(owner, method);
            match self.storage.get(&key).await? {
                Some(bytes) => postcard::from_bytes(&bytes).map_err(|source| Error::Decode { key, source }),
                None => self.write(&key).await,
            }
        })
    }

    fn advance<'a>(&'a self, owner: &'a Owner, method: MethodId) -> BoxFuture<'a, Result<GenerationToken, Error>> {
        Box::pin(async move { self.write(&Self::key(owner, method)).await })
    }
}
