// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! In-process storage backend for `recall`, backed by moka.
//!
//! [`MemoryStorage`] keeps encoded cache entries in a concurrent moka cache. Eviction under
//! capacity pressure is moka's `TinyLFU` policy; per-entry backend expiry honors the `ttl`
//! passed to [`Storage::set`](recall_store::Storage::set). Use [`MemoryStorageBuilder`] to
//! configure it without exposing moka types.
//!
//! # Quick Start
//!
//! ```
//! use bytes::Bytes;
//! use recall_memory::MemoryStorage;
//! use recall_store::Storage;
//!
//! # futures::executor::block_on(async {
//! let storage = MemoryStorage::builder().max_capacity(10_000).build();
//!
//! storage.set("answer", Bytes::from_static(b"42"), None).await?;
//! assert!(storage.exist("answer").await?);
//! # Ok::<(), recall_store::Error>(())
//! # });
//! ```

pub mod builder;
pub mod storage;

#[doc(inline)]
pub use builder::MemoryStorageBuilder;
#[doc(inline)]
pub use storage::MemoryStorage;
