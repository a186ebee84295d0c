//! A sorted map shared between threads behind a reader-writer lock.
//!
//! [`ConcurrentLlrbMap`] composes an [`LlrbMap`] with a
//! [`parking_lot::RwLock`]. `get` and `insert` take the lock for the single
//! call only. A range scan takes the read lock when it is created and **holds
//! it for the whole lifetime of the iterator** - the lock is released exactly
//! once, when the iterator is dropped, whether the scan was drained or
//! abandoned halfway.
//!
//! That rule is the whole concurrency design: a scan can never observe the
//! tree mid-rotation, because no writer can run while any scan exists. The
//! cost is write availability - an iterator someone keeps alive starves every
//! writer for exactly that long. Readers are never blocked by an open scan.
//! Drop scans promptly.

use std::borrow::Borrow;
use std::fmt;
use std::ops::RangeBounds;

use parking_lot::{RwLock, RwLockReadGuard};

#[cfg(feature = "serde")]
use serde::{
    de::{Deserialize, Deserializer},
    ser::{Serialize, Serializer},
};

use crate::entry::{Entry, ValueEntry};
use crate::llrb::{LlrbMap, RangeIter};

/// A sorted, byte-accounted map safe for concurrent readers and writers.
///
/// All the semantics of [`LlrbMap`] apply - pluggable entries, in-place
/// replacement on duplicate keys, incremental length and byte accounting, no
/// remove. Lookups clone the value out so that nothing borrowed escapes the
/// lock.
///
/// # Examples
/// ```
/// use memtree::ConcurrentLlrbMap;
///
/// let map: ConcurrentLlrbMap<u64, String> = ConcurrentLlrbMap::new();
/// map.insert(2, "two".to_string());
/// map.insert(1, "one".to_string());
///
/// // The scan holds a read lock until `pairs` has been collected and the
/// // iterator dropped. Writers wait; readers do not.
/// let pairs: Vec<(u64, String)> = map.range(1..=2).collect();
/// assert_eq!(pairs.len(), 2);
/// ```
pub struct ConcurrentLlrbMap<K, V, E = ValueEntry<K, V>> {
    inner: RwLock<LlrbMap<K, V, E>>,
}

impl<K, V, E> ConcurrentLlrbMap<K, V, E>
where
    K: Clone + Ord,
    V: Clone,
    E: Entry<K, V>,
{
    /// Create a new, empty map.
    pub fn new() -> Self {
        ConcurrentLlrbMap {
            inner: RwLock::new(LlrbMap::new()),
        }
    }

    /// The number of entries. Takes the read lock for this call only.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// True if the map holds no entries. Takes the read lock for this call
    /// only.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// The aggregate byte size of all entries. Takes the read lock for this
    /// call only.
    pub fn size(&self) -> usize {
        self.inner.read().size()
    }

    /// Insert `value` under `key`, blocking until no reader (including any
    /// open range scan) holds the lock. The write lock is held for this call
    /// only.
    pub fn insert(&self, key: K, value: V) {
        self.inner.write().insert(key, value);
    }

    /// Look up `key` and clone its value out. The read lock is held for this
    /// call only, so the result shares nothing with the map.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.inner.read().get(key).cloned()
    }

    /// True if `key` is present. Takes the read lock for this call only.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.inner.read().contains_key(key)
    }

    /// Scan the entries whose keys fall within `range`, in ascending key
    /// order, cloning each pair out as it is yielded.
    ///
    /// The returned iterator owns a read lock on the map. Writers block until
    /// it is dropped; an abandoned iterator therefore starves writers for as
    /// long as it lives. This is the documented trade for scans that never
    /// observe a partial rebalance. Readers and other scans proceed freely
    /// alongside it.
    pub fn range<T, R>(&self, range: R) -> LockedRangeIter<'_, K, V, E>
    where
        T: Ord + ?Sized,
        K: Borrow<T>,
        R: RangeBounds<T>,
    {
        let guard = self.inner.read();
        tracing::trace!(length = guard.len(), "seeding range scan under read lock");
        // SAFETY: `iter` borrows the tree behind `guard`. Both move into the
        // returned struct together, where the iterator is dropped before the
        // guard, and the read lock keeps every writer out for as long as the
        // guard is alive - the borrowed nodes cannot move or be freed.
        let map: &LlrbMap<K, V, E> = unsafe { &*(&*guard as *const LlrbMap<K, V, E>) };
        LockedRangeIter {
            iter: map.range(range),
            _guard: guard,
        }
    }

    /// Scan every entry in ascending key order. Same locking contract as
    /// [`range`](ConcurrentLlrbMap::range).
    pub fn iter(&self) -> LockedRangeIter<'_, K, V, E> {
        self.range::<K, _>(..)
    }
}

impl<K, V, E> Default for ConcurrentLlrbMap<K, V, E>
where
    K: Clone + Ord,
    V: Clone,
    E: Entry<K, V>,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap an already populated map. The tree is taken as-is; only the lock is
/// added.
impl<K, V, E> From<LlrbMap<K, V, E>> for ConcurrentLlrbMap<K, V, E>
where
    K: Clone + Ord,
    V: Clone,
    E: Entry<K, V>,
{
    fn from(map: LlrbMap<K, V, E>) -> Self {
        ConcurrentLlrbMap {
            inner: RwLock::new(map),
        }
    }
}

impl<K, V, E> FromIterator<(K, V)> for ConcurrentLlrbMap<K, V, E>
where
    K: Clone + Ord,
    V: Clone,
    E: Entry<K, V>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        LlrbMap::from_iter(iter).into()
    }
}

impl<K, V, E> fmt::Debug for ConcurrentLlrbMap<K, V, E>
where
    K: Clone + Ord + fmt::Debug,
    V: Clone + fmt::Debug,
    E: Entry<K, V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.read().fmt(f)
    }
}

#[cfg(feature = "serde")]
impl<K, V, E> Serialize for ConcurrentLlrbMap<K, V, E>
where
    K: Serialize + Clone + Ord,
    V: Serialize + Clone,
    E: Entry<K, V>,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.inner.read().serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V, E> Deserialize<'de> for ConcurrentLlrbMap<K, V, E>
where
    K: Deserialize<'de> + Clone + Ord,
    V: Deserialize<'de> + Clone,
    E: Entry<K, V>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        LlrbMap::deserialize(deserializer).map(Self::from)
    }
}

/// A range scan that owns a read lock on its [`ConcurrentLlrbMap`].
///
/// The lock is released exactly once, when this iterator is dropped -
/// exhausting it does not release early, and dropping it half-way is the way
/// to cancel a scan. Items are cloned out under the lock, so they remain
/// valid indefinitely. Once `next` has returned `None` it always returns
/// `None`.
///
/// Writers block for as long as this iterator exists. Do not hold one across
/// slow work.
pub struct LockedRangeIter<'a, K, V, E = ValueEntry<K, V>> {
    iter: RangeIter<'a, K, V, E>,
    _guard: RwLockReadGuard<'a, LlrbMap<K, V, E>>,
}

impl<K, V, E> Iterator for LockedRangeIter<'_, K, V, E>
where
    K: Clone + Ord,
    V: Clone,
    E: Entry<K, V>,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|(k, v)| (k.clone(), v.clone()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}
