// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Storage backend abstraction for the `recall` method-result cache.
//!
//! This crate defines the [`Storage`] trait that every key-value backend must satisfy,
//! along with the [`Error`] type for failed backend operations.
//!
//! # Overview
//!
//! The cache core never interprets what a backend does with its data: it writes opaque,
//! already-encoded entries under string keys and reads them back. Eviction, replication and
//! persistence are entirely the backend's business. The only contract is:
//!
//! - `get` returns the last value written under a key, or `None` if the backend no longer
//!   holds it;
//! - `set` replaces the value wholesale, never partially;
//! - a `ttl` of `None` means the backend must not expire the entry on its own. The cache
//!   tracks freshness inside the stored value.
//!
//! # Implementing a Storage Backend
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::RwLock;
//! use std::time::Duration;
//!
//! use bytes::Bytes;
//! use recall_store::{Error, Storage};
//!
//! struct SimpleStorage(RwLock<HashMap<String, Bytes>>);
//!
//! impl Storage for SimpleStorage {
//!     async fn get(&self, key: &str) -> Result<Option<Bytes>, Error> {
//!         Ok(self.0.read().unwrap().get(key).cloned())
//!     }
//!
//!     async fn set(&self, key: &str, value: Bytes, _ttl: Option<Duration>) -> Result<(), Error> {
//!         self.0.write().unwrap().insert(key.to_string(), value);
//!         Ok(())
//!     }
//!
//!     async fn exist(&self, key: &str) -> Result<bool, Error> {
//!         Ok(self.0.read().unwrap().contains_key(key))
//!     }
//!
//!     async fn delete(&self, key: &str) -> Result<(), Error> {
//!         self.0.write().unwrap().remove(key);
//!         Ok(())
//!     }
//! }
//! ```

pub mod error;
mod storage;
#[cfg(any(feature = "test-util", test))]
pub mod testing;

#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use storage::Storage;
