#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod primes;

/// The policy-driven table engine: probing, entries, traversal.
pub mod hash_table;

/// A hash set over the table engine for `Hash + Eq` elements.
///
/// This module provides a `HashSet` that wraps the `HashTable` so plain
/// element types need no hand-written policy; members are hashed with
/// foldhash.
#[cfg(feature = "foldhash")]
pub mod hash_set;

#[cfg(feature = "foldhash")]
pub use hash_set::HashSet;
pub use hash_table::Entry;
pub use hash_table::HashTable;
pub use hash_table::Hashval;
pub use hash_table::Policy;
