// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use serde::Serialize;

use crate::{ArgsDigest, Error, GenerationToken, digest};

pub(crate) const NAMESPACE: &str = "recall";
pub(crate) const JOINER: &str = ",";

/// The receiver a cached method is called on.
///
/// Type-level owners are identified by their type name alone, so every call to the same
/// type-level method shares cache entries. Instance owners additionally carry a digest of
/// their identity, so two distinct instances never share an entry.
///
/// # Examples
///
/// ```
/// use recall::Owner;
///
/// let catalog = Owner::of_type("Catalog");
/// assert!(catalog.is_type_level());
///
/// let user = Owner::instance("User", &42_u64).unwrap();
/// assert_eq!(user.type_name(), "User");
/// assert!(user.identity().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Owner {
    type_name: &'static str,
    identity: Option<String>,
}

impl Owner {
    /// Creates a type-level owner.
    #[must_use]
    pub const fn of_type(type_name: &'static str) -> Self {
        Self {
            type_name,
            identity: None,
        }
    }

    /// Creates an instance owner whose identity is the digest of `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if `identity` cannot be serialized.
    pub fn instance<T>(type_name: &'static str, identity: &T) -> Result<Self, Error>
    where
        T: Serialize + ?Sized,
    {
        Ok(Self::with_identity_digest(type_name, digest(identity)?))
    }

    /// Creates an instance owner from an identity digest computed elsewhere.
    #[must_use]
    pub fn with_identity_digest(type_name: &'static str, identity: impl Into<String>) -> Self {
        Self {
            type_name,
            identity: Some(identity.into()),
        }
    }

    /// Returns the owner's type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the identity digest of an instance owner.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Returns `true` for type-level owners.
    #[must_use]
    pub fn is_type_level(&self) -> bool {
        self.identity.is_none()
    }

    /// Returns the stable signature of `method` on this owner: `Type.method` for
    /// type-level owners and `Type#method` for instances.
    #[must_use]
    pub fn signature(&self, method: MethodId) -> String {
        let delimiter = if self.is_type_level() { '.' } else { '#' };
        format!("{}{delimiter}{}", self.type_name, method.name())
    }
}

/// The name of a cached method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(&'static str);

impl MethodId {
    /// Creates a method identifier.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the method name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// The storage key of one cached result.
///
/// Keys are comma-joined: a namespace tag, `CachedResult`, the method signature, the
/// owner's identity digest (instances only), the generation token (generational caches
/// only), and the argument digest.
///
/// # Examples
///
/// ```
/// use recall::{ArgsDigest, CacheKey, MethodId, Owner};
///
/// let key = CacheKey::build(
///     &Owner::of_type("Catalog"),
///     MethodId::new("top_sellers"),
///     None,
///     &ArgsDigest::empty(),
/// );
///
/// assert_eq!(key.as_str(), "recall,CachedResult,Catalog.top_sellers,empty");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Builds the key for a call.
    #[must_use]
    pub fn build(owner: &Owner, method: MethodId, generation: Option<&GenerationToken>, args: &ArgsDigest) -> Self {
        let mut parts = vec![NAMESPACE.to_string(), "CachedResult".to_string(), owner.signature(method)];
        if let Some(identity) = owner.identity() {
            parts.push(identity.to_string());
        }
        if let Some(generation) = generation {
            parts.push(generation.as_str().to_string());
        }
        parts.push(args.as_str().to_string());

        Self(parts.join(JOINER))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
