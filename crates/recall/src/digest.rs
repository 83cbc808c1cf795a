// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Stable digests of owners and arguments.
//!
//! A digest is the xxh3-128 hash of the value's postcard encoding, rendered as 32 lowercase
//! hex characters. Postcard output is deterministic for a given value and type, so the same
//! inputs always produce the same digest across processes built from the same code.

use std::fmt;

use serde::Serialize;
use xxhash_rust::xxh3::xxh3_128;

use crate::Error;

const EMPTY_ARGS: &str = "empty";

/// Computes the digest of any serializable value.
///
/// # Errors
///
/// Returns [`Error::Encode`] if the value cannot be serialized.
///
/// # Examples
///
/// ```
/// let a = recall::digest(&("alice", 7_u32)).unwrap();
/// let b = recall::digest(&("alice", 7_u32)).unwrap();
///
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 32);
/// ```
pub fn digest<T>(value: &T) -> Result<String, Error>
where
    T: Serialize + ?Sized,
{
    let bytes = postcard::to_allocvec(value).map_err(Error::Encode)?;
    Ok(format!("{:032x}", xxh3_128(&bytes)))
}

/// The digest of a call's argument list.
///
/// An argument list that encodes to nothing (such as `()`) is represented by the literal
/// `empty` rather than a hash, which keeps keys for argument-less methods readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArgsDigest(String);

impl ArgsDigest {
    /// Digests an argument list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if the arguments cannot be serialized.
    pub fn of<A>(args: &A) -> Result<Self, Error>
    where
        A: Serialize + ?Sized,
    {
        let bytes = postcard::to_allocvec(args).map_err(Error::Encode)?;
        if bytes.is_empty() {
            return Ok(Self::empty());
        }
        Ok(Self(format!("{:032x}", xxh3_128(&bytes))))
    }

    /// The digest of an empty argument list.
    #[must_use]
    pub fn empty() -> Self {
        Self(EMPTY_ARGS.to_string())
    }

    /// Returns the digest as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArgsDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_hex_and_deterministic() {
        let first = digest(&vec![1_u64, 2, 3]).unwrap();
        assert_eq!(first, digest(&vec![1_u64, 2, 3]).unwrap());
        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn different_values_differ() {
        assert_ne!(digest("a").unwrap(), digest("b").unwrap());
        assert_ne!(ArgsDigest::of(&(1_u8,)).unwrap(), ArgsDigest::of(&(2_u8,)).unwrap());
    }

    #[test]
    fn unit_args_are_empty() {
        assert_eq!(ArgsDigest::of(&()).unwrap(), ArgsDigest::empty());
        assert_eq!(ArgsDigest::empty().as_str(), "empty");
    }

    #[test]
    fn empty_string_argument_is_not_empty_args() {
        // A zero-length string still encodes its length prefix.
        assert_ne!(ArgsDigest::of(&("",)).unwrap(), ArgsDigest::empty());
    }
}
