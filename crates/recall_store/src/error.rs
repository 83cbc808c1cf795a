// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for storage operations.

/// Boxed cause of a backend failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error from a storage backend.
///
/// The cache core never recovers from these: a backend that cannot be read or written
/// surfaces the failure to the caller of `fetch`.
///
/// # Example
///
/// ```
/// use recall_store::Error;
///
/// let error = Error::unavailable("get", "connection refused");
/// assert!(error.to_string().contains("get"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backend could not complete the operation.
    #[error("storage backend unavailable during {operation}")]
    Unavailable {
        /// Name of the failed operation (`get`, `set`, `exist`, `delete`).
        operation: &'static str,
        /// The underlying cause.
        #[source]
        source: BoxError,
    },

    /// A backend-specific failure described by a message.
    #[error("{0}")]
    Message(String),
}

impl Error {
    /// Creates an error for a failed backend operation.
    pub fn unavailable(operation: &'static str, cause: impl Into<BoxError>) -> Self {
        Self::Unavailable {
            operation,
            source: cause.into(),
        }
    }

    /// Creates an error from a plain message.
    ///
    /// # Examples
    ///
    /// ```
    /// use recall_store::Error;
    ///
    /// let error = Error::from_message("quota exceeded");
    /// assert_eq!(error.to_string(), "quota exceeded");
    /// ```
    pub fn from_message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// A specialized [`Result`] type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;
