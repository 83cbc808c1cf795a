// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cached method calls.

/// Error produced by a wrapped computation.
pub type ComputeError = Box<dyn std::error::Error + Send + Sync>;

/// An error from a cache operation.
///
/// Storage failures and failures of the wrapped computation are never swallowed: the
/// cache has no fallback value that is safer than reporting the failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] recall_store::Error),

    /// The wrapped computation failed during a blocking refresh.
    #[error("cached computation failed")]
    Computation(#[source] ComputeError),

    /// A value could not be encoded for storage or digesting.
    #[error("failed to encode cache value")]
    Encode(#[source] postcard::Error),

    /// A stored entry could not be decoded.
    #[error("failed to decode cache entry stored under {key}")]
    Decode {
        /// The storage key holding the undecodable entry.
        key: String,
        /// The underlying decode failure.
        #[source]
        source: postcard::Error,
    },

    /// A deferred refresh was requested but the configuration has no job dispatcher.
    #[error("deferred refresh requested but no job dispatcher is configured")]
    NoDispatcher,

    /// Whole-method invalidation was requested while generational keys are disabled.
    #[error("invalidating every result of a method requires generational keys")]
    GenerationalDisabled,
}

impl Error {
    /// Returns the computation failure as `E`, if this error wraps one of that type.
    ///
    /// # Examples
    ///
    /// ```
    /// use recall::Error;
    ///
    /// let error = Error::Computation(Box::new(std::io::Error::other("disk on fire")));
    /// let io = error.computation_as::<std::io::Error>().unwrap();
    /// assert_eq!(io.to_string(), "disk on fire");
    /// ```
    #[must_use]
    pub fn computation_as<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Computation(source) => source.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Returns `true` if the storage backend failed.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Formats this error followed by each of its sources, separated by `": "`.
    pub(crate) fn chain(&self) -> String {
        let mut text = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            text.push_str(": ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        text
    }
}

/// A specialized [`Result`] type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;
