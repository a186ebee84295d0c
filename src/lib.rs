//! Memtree - A Sorted, Byte-Accounted In-Memory Map
//!
//! This crate provides [`LlrbMap`], an ordered key-value map backed by a
//! left-leaning red-black tree, and [`ConcurrentLlrbMap`], the same map behind
//! a reader-writer lock so that many readers and writers can share it.
//!
//! The map is intended as the core of a larger storage engine - the structure
//! you would use as a memtable. Besides point lookup and upsert it supports
//! lazy, in-order range scans over arbitrary half-open/half-closed intervals,
//! expressed with [`std::ops::Bound`] exactly as `BTreeMap::range` takes them.
//! It also tracks the aggregate byte size of its contents incrementally, so a
//! flush policy can ask "how big is this table?" in O(1).
//!
//! Two properties set it apart from `BTreeMap`:
//!
//! * Entries are pluggable. The map is generic over an [`entry::Entry`]
//!   implementation which owns the key, the value, the byte accounting and
//!   the policy applied when a key is inserted twice. The default
//!   [`entry::ValueEntry`] overwrites.
//! * There is no remove. The map is insert/update only, which is the common
//!   memtable contract - a deletion is an insert of a tombstone value at a
//!   higher layer.
//!
//! # Examples
//! ```
//! use memtree::LlrbMap;
//!
//! let mut map: LlrbMap<String, u64> = LlrbMap::new();
//! map.insert("cherry".to_string(), 3);
//! map.insert("blueberry".to_string(), 7);
//! map.insert("orange".to_string(), 9);
//!
//! assert_eq!(map.get("cherry"), Some(&3));
//! assert_eq!(map.len(), 3);
//!
//! // In-order range scan over ["blueberry", "orange")
//! let keys: Vec<&String> = map
//!     .range("blueberry".to_string().."orange".to_string())
//!     .map(|(k, _)| k)
//!     .collect();
//! assert_eq!(keys, ["blueberry", "cherry"]);
//! ```
//!
//! For shared use, [`ConcurrentLlrbMap`] takes the lock for you:
//! ```
//! use memtree::ConcurrentLlrbMap;
//!
//! let map: ConcurrentLlrbMap<u64, u64> = ConcurrentLlrbMap::new();
//! map.insert(1, 10);
//! map.insert(2, 20);
//! assert_eq!(map.get(&2), Some(20));
//!
//! // The scan holds a read lock until the iterator is dropped.
//! let pairs: Vec<(u64, u64)> = map.iter().collect();
//! assert_eq!(pairs, [(1, 10), (2, 20)]);
//! ```

#![deny(warnings)]
#![warn(unused_extern_crates)]
#![warn(missing_docs)]

pub mod concurrent;
pub mod entry;
pub mod llrb;
#[cfg(feature = "serde")]
mod utils;

pub use crate::concurrent::ConcurrentLlrbMap;
pub use crate::llrb::LlrbMap;
