//! The sorted map engine.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::ops::RangeBounds;

#[cfg(feature = "serde")]
use serde::{
    de::{Deserialize, Deserializer},
    ser::{Serialize, SerializeMap, Serializer},
};

#[cfg(feature = "serde")]
use crate::utils::MapCollector;

use super::iter::{Iter, KeyIter, RangeIter, ValueIter};
use super::node::{is_red, Color, Node};
use crate::entry::{Entry, ValueEntry};

/// A sorted map backed by a left-leaning red-black tree.
///
/// Keys are ordered by their `Ord` impl. Inserting an existing key hands the
/// new value to the occupied entry's [`replace`](Entry::replace) policy
/// instead of touching the tree shape. The node count and the aggregate
/// entry byte size are maintained incrementally, so [`len`](LlrbMap::len) and
/// [`size`](LlrbMap::size) are O(1).
///
/// There is no remove - the map is insert/update only - and no `get_mut`,
/// because mutating a value in place would bypass the byte accounting.
///
/// This type is the bare engine: not internally synchronised, single borrow
/// rules apply. Wrap it in
/// [`ConcurrentLlrbMap`](crate::ConcurrentLlrbMap) to share it between
/// threads.
pub struct LlrbMap<K, V, E = ValueEntry<K, V>> {
    root: Option<Box<Node<E>>>,
    length: usize,
    bytes: usize,
    phantom: PhantomData<(K, V)>,
}

impl<K, V, E> LlrbMap<K, V, E>
where
    K: Ord,
    E: Entry<K, V>,
{
    /// Create a new, empty map.
    pub fn new() -> Self {
        LlrbMap {
            root: None,
            length: 0,
            bytes: 0,
            phantom: PhantomData,
        }
    }

    /// The number of entries in the map. O(1).
    pub fn len(&self) -> usize {
        self.length
    }

    /// True if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The aggregate byte size of all entries, per
    /// [`Entry::byte_size`]. O(1) - maintained on every insert and replace,
    /// never recomputed by traversal.
    pub fn size(&self) -> usize {
        self.bytes
    }

    /// Insert `value` under `key`. A fresh key creates a new entry; an
    /// occupied key is handed to the entry's replacement policy in place,
    /// leaving the tree shape untouched. Never fails.
    pub fn insert(&mut self, key: K, value: V) {
        let root = self.root.take();
        let mut root = self.insert_at(root, key, value);
        // The root is always black.
        root.color = Color::Black;
        self.root = Some(root);
    }

    fn insert_at(&mut self, node: Option<Box<Node<E>>>, key: K, value: V) -> Box<Node<E>> {
        let mut node = match node {
            Some(node) => node,
            None => {
                let entry = E::new(key, value);
                self.length += 1;
                self.bytes += entry.byte_size();
                return Node::new(entry);
            }
        };

        // Split temporary 4-nodes on the way down.
        if is_red(node.left.as_deref()) && is_red(node.right.as_deref()) {
            node.color_flip();
        }

        match key.cmp(node.entry.key()) {
            Ordering::Equal => {
                // In-place update: position is unchanged, so no rebalancing.
                // The entry may grow or shrink, so account around the policy.
                self.bytes -= node.entry.byte_size();
                node.entry.replace(value);
                self.bytes += node.entry.byte_size();
            }
            Ordering::Less => {
                let left = node.left.take();
                node.left = Some(self.insert_at(left, key, value));
            }
            Ordering::Greater => {
                let right = node.right.take();
                node.right = Some(self.insert_at(right, key, value));
            }
        }

        // Re-establish the lean on the way back up.
        if is_red(node.right.as_deref()) && !is_red(node.left.as_deref()) {
            node = node.rotate_left();
        }
        if is_red(node.left.as_deref())
            && is_red(node.left.as_deref().and_then(|l| l.left.as_deref()))
        {
            node = node.rotate_right();
        }
        node
    }

    /// Look up the value stored under `key`. O(log n).
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut cursor = self.root.as_deref();
        while let Some(node) = cursor {
            cursor = match key.cmp(node.entry.key().borrow()) {
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
                Ordering::Equal => return Some(node.entry.value()),
            };
        }
        None
    }

    /// True if `key` is present.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Iterate the entries whose keys fall within `range`, in ascending key
    /// order. Bounds are expressed exactly as for `BTreeMap::range`:
    /// `Included`/`Excluded` edges, `..` for unbounded. An inverted range
    /// yields nothing.
    ///
    /// The scan is lazy, non-recursive and uses O(log n) auxiliary memory.
    pub fn range<T, R>(&self, range: R) -> RangeIter<'_, K, V, E>
    where
        T: Ord + ?Sized,
        K: Borrow<T>,
        R: RangeBounds<T>,
    {
        RangeIter::new(self.root.as_deref(), self.length, range)
    }

    /// Iterate all entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V, E> {
        Iter::new(self.root.as_deref(), self.length)
    }

    /// Iterate all keys in ascending order.
    pub fn keys(&self) -> KeyIter<'_, K, V, E> {
        KeyIter::new(self.root.as_deref(), self.length)
    }

    /// Iterate all values in ascending key order.
    pub fn values(&self) -> ValueIter<'_, K, V, E> {
        ValueIter::new(self.root.as_deref(), self.length)
    }

    /// Check every structural invariant of the tree: the root is black, red
    /// links lean left and never stack, black height is uniform, the in-order
    /// key sequence is strictly increasing, and the O(1) length/size counters
    /// match a full recount. Intended for tests.
    pub fn verify(&self) -> bool {
        if is_red(self.root.as_deref()) {
            return false;
        }
        if verify_colors(self.root.as_deref()).is_none() {
            return false;
        }
        // In-order recount of order, length and bytes.
        let mut count = 0;
        let mut bytes = 0;
        let mut last: Option<&K> = None;
        let mut stack: Vec<&Node<E>> = Vec::new();
        let mut cursor = self.root.as_deref();
        loop {
            while let Some(node) = cursor {
                stack.push(node);
                cursor = node.left.as_deref();
            }
            let Some(node) = stack.pop() else {
                break;
            };
            if let Some(last) = last {
                if last >= node.entry.key() {
                    return false;
                }
            }
            last = Some(node.entry.key());
            count += 1;
            bytes += node.entry.byte_size();
            cursor = node.right.as_deref();
        }
        count == self.length && bytes == self.bytes
    }
}

/// Black height of the subtree, or `None` if a colour invariant is broken.
fn verify_colors<E>(node: Option<&Node<E>>) -> Option<usize> {
    let Some(node) = node else {
        // Nil children are black.
        return Some(1);
    };
    if is_red(Some(node)) && (is_red(node.left.as_deref()) || is_red(node.right.as_deref())) {
        return None;
    }
    if is_red(node.right.as_deref()) {
        // Right-leaning red link.
        return None;
    }
    let left = verify_colors(node.left.as_deref())?;
    let right = verify_colors(node.right.as_deref())?;
    if left != right {
        return None;
    }
    Some(left + usize::from(node.color == Color::Black))
}

impl<K, V, E> Default for LlrbMap<K, V, E>
where
    K: Ord,
    E: Entry<K, V>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, E> FromIterator<(K, V)> for LlrbMap<K, V, E>
where
    K: Ord,
    E: Entry<K, V>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K, V, E> Extend<(K, V)> for LlrbMap<K, V, E>
where
    K: Ord,
    E: Entry<K, V>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, E> fmt::Debug for LlrbMap<K, V, E>
where
    K: Ord + fmt::Debug,
    V: fmt::Debug,
    E: Entry<K, V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(feature = "serde")]
impl<K, V, E> Serialize for LlrbMap<K, V, E>
where
    K: Serialize + Ord,
    V: Serialize,
    E: Entry<K, V>,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_map(Some(self.len()))?;
        for (key, val) in self.iter() {
            state.serialize_entry(key, val)?;
        }
        state.end()
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V, E> Deserialize<'de> for LlrbMap<K, V, E>
where
    K: Deserialize<'de> + Ord,
    V: Deserialize<'de>,
    E: Entry<K, V>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(MapCollector::new())
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Bound;

    use super::LlrbMap;
    use crate::entry::{ByteSize, Entry};

    fn word_map(words: &[&str]) -> LlrbMap<String, String> {
        words
            .iter()
            .map(|w| (w.to_string(), w.to_string()))
            .collect()
    }

    const SHORT_WORDS: [&str; 4] = ["blueberry", "cherry", "lemon", "orange"];

    #[test]
    fn test_llrb_map_basic_write() {
        let mut map: LlrbMap<usize, usize> = LlrbMap::new();
        assert!(map.is_empty());
        map.insert(0, 0);
        map.insert(1, 1);
        assert!(map.get(&0) == Some(&0));
        assert!(map.get(&1) == Some(&1));
        assert!(map.get(&2).is_none());
        map.insert(2, 2);
        assert_eq!(map.len(), 3);
        assert!(map.contains_key(&2));
        assert!(map.verify());
    }

    #[test]
    fn test_llrb_map_update_in_place() {
        let mut map: LlrbMap<String, String> = LlrbMap::new();
        map.insert("k".to_string(), "first".to_string());
        let size_first = map.size();
        assert_eq!(size_first, 6);
        map.insert("k".to_string(), "second-longer".to_string());
        // Same key: length unchanged, last write wins, size re-accounted.
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("k").map(String::as_str), Some("second-longer"));
        assert_eq!(map.size(), 14);
        map.insert("k".to_string(), "s".to_string());
        assert_eq!(map.size(), 2);
        assert!(map.verify());
    }

    #[test]
    fn test_llrb_map_invariants_sequential() {
        let mut map: LlrbMap<usize, usize> = LlrbMap::new();
        for i in 0..1024 {
            map.insert(i, i);
            assert!(map.verify());
        }
        assert_eq!(map.len(), 1024);
    }

    #[test]
    fn test_llrb_map_invariants_reversed() {
        let mut map: LlrbMap<usize, usize> = LlrbMap::new();
        for i in (0..1024).rev() {
            map.insert(i, i);
        }
        assert!(map.verify());
        assert_eq!(map.len(), 1024);
        for i in 0..1024 {
            assert_eq!(map.get(&i), Some(&i));
        }
    }

    #[test]
    fn test_llrb_map_size_accounting() {
        let mut map: LlrbMap<u64, String> = LlrbMap::new();
        map.insert(1, "aa".to_string());
        map.insert(2, "bbbb".to_string());
        assert_eq!(map.size(), 8 + 2 + 8 + 4);
        map.insert(1, "".to_string());
        assert_eq!(map.size(), 8 + 8 + 4);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_llrb_map_full_scan_in_order() {
        let mut map: LlrbMap<usize, usize> = LlrbMap::new();
        for i in [5, 3, 8, 1, 4, 7, 9, 0, 2, 6] {
            map.insert(i, i * 10);
        }
        let seen: Vec<(usize, usize)> = map.iter().map(|(k, v)| (*k, *v)).collect();
        let expect: Vec<(usize, usize)> = (0..10).map(|i| (i, i * 10)).collect();
        assert_eq!(seen, expect);
        // Exhausted scans stay exhausted.
        let mut iter = map.iter();
        assert_eq!(iter.size_hint(), (10, Some(10)));
        for _ in 0..10 {
            assert!(iter.next().is_some());
        }
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_llrb_map_empty_full_scan() {
        let map: LlrbMap<usize, usize> = LlrbMap::new();
        assert!(map.iter().next().is_none());
        assert!(map.range::<usize, _>(..).next().is_none());
    }

    #[test]
    fn test_llrb_map_keys_values() {
        let map = word_map(&SHORT_WORDS);
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, SHORT_WORDS.to_vec());
        let values: Vec<&String> = map.values().collect();
        assert_eq!(values, SHORT_WORDS.to_vec());
    }

    #[test]
    fn test_llrb_map_range_outside_left() {
        let map = word_map(&SHORT_WORDS);
        // Entirely in the gap before the first key.
        let mut scan = map.range("apple".to_string()..="banana".to_string());
        assert!(scan.next().is_none());
    }

    #[test]
    fn test_llrb_map_range_outside_right() {
        let map = word_map(&SHORT_WORDS);
        let mut scan = map.range("pear".to_string()..="tangerine".to_string());
        assert!(scan.next().is_none());
    }

    #[test]
    fn test_llrb_map_range_lesser_to_value() {
        let map = word_map(&SHORT_WORDS);
        let seen: Vec<&String> = map
            .range("apple".to_string()..="cherry".to_string())
            .map(|(k, _)| k)
            .collect();
        assert_eq!(seen, ["blueberry", "cherry"]);
    }

    #[test]
    fn test_llrb_map_range_value_to_greater() {
        let map = word_map(&SHORT_WORDS);
        let seen: Vec<&String> = map
            .range("lemon".to_string()..="pear".to_string())
            .map(|(k, _)| k)
            .collect();
        assert_eq!(seen, ["lemon", "orange"]);
    }

    #[test]
    fn test_llrb_map_range_lesser_to_greater() {
        let map = word_map(&SHORT_WORDS);
        let seen: Vec<&String> = map
            .range("apple".to_string()..="pear".to_string())
            .map(|(k, _)| k)
            .collect();
        assert_eq!(seen, SHORT_WORDS.to_vec());
    }

    #[test]
    fn test_llrb_map_open_interval() {
        let map = word_map(&SHORT_WORDS);
        // (cherry, orange) excludes both edges.
        let seen: Vec<&String> = map
            .range((
                Bound::Excluded("cherry".to_string()),
                Bound::Excluded("orange".to_string()),
            ))
            .map(|(k, _)| k)
            .collect();
        assert_eq!(seen, ["lemon"]);
    }

    #[test]
    fn test_llrb_map_empty_open_intervals() {
        let map = word_map(&SHORT_WORDS);
        for word in ["cherry", "apple", "pear"] {
            let mut scan = map.range((
                Bound::Excluded(word.to_string()),
                Bound::Excluded(word.to_string()),
            ));
            assert!(scan.next().is_none());
        }
    }

    #[test]
    fn test_llrb_map_inverted_interval() {
        let map = word_map(&SHORT_WORDS);
        let from = "orange".to_string();
        let to = "cherry".to_string();
        let edges = [
            (Bound::Excluded(from.clone()), Bound::Excluded(to.clone())),
            (Bound::Excluded(from.clone()), Bound::Included(to.clone())),
            (Bound::Included(from.clone()), Bound::Excluded(to.clone())),
            (Bound::Included(from), Bound::Included(to)),
        ];
        for interval in edges {
            assert!(map.range(interval).next().is_none());
        }
    }

    #[test]
    fn test_llrb_map_range_between_neighbours() {
        let mut map: LlrbMap<u64, u64> = LlrbMap::new();
        map.insert(10, 10);
        map.insert(20, 20);
        map.insert(30, 30);
        // The whole interval sits in the gap between 10 and 20.
        assert!(map.range(12..=18).next().is_none());
        assert!(map.range(12..18).next().is_none());
        // Closed singletons on present and absent keys.
        let seen: Vec<&u64> = map.range(20..=20).map(|(k, _)| k).collect();
        assert_eq!(seen, [&20]);
        assert!(map.range(21..=21).next().is_none());
    }

    #[test]
    fn test_llrb_map_range_half_open_combinations() {
        let mut map: LlrbMap<u64, u64> = LlrbMap::new();
        for i in 0..100 {
            map.insert(i, i);
        }
        let collect = |iter: super::RangeIter<'_, u64, u64>| -> Vec<u64> {
            iter.map(|(k, _)| *k).collect()
        };
        assert_eq!(collect(map.range(..3)), [0, 1, 2]);
        assert_eq!(collect(map.range(97..)), [97, 98, 99]);
        assert_eq!(collect(map.range(40..43)), [40, 41, 42]);
        assert_eq!(collect(map.range(40..=43)), [40, 41, 42, 43]);
        assert_eq!(
            collect(map.range((Bound::Excluded(40), Bound::Included(43)))),
            [41, 42, 43]
        );
        assert_eq!(collect(map.range::<u64, _>(..)).len(), 100);
    }

    #[test]
    fn test_llrb_map_range_borrowed_bounds() {
        let map = word_map(&SHORT_WORDS);
        // Bounds may be any borrowed form of the key.
        let seen: Vec<&String> = map.range::<str, _>("cherry".."orange").map(|(k, _)| k).collect();
        assert_eq!(seen, ["cherry", "lemon"]);
    }

    #[test]
    fn test_llrb_map_debug_format() {
        let mut map: LlrbMap<u64, u64> = LlrbMap::new();
        map.insert(2, 20);
        map.insert(1, 10);
        assert_eq!(format!("{:?}", map), "{1: 10, 2: 20}");
    }

    /// An entry that folds repeated inserts into a vector, proving the
    /// replacement policy seam. Deletion semantics for such entries are
    /// deliberately undefined, which is one reason the map has no remove.
    struct AppendEntry {
        key: u64,
        values: Vec<u64>,
    }

    impl Entry<u64, u64> for AppendEntry {
        fn new(key: u64, value: u64) -> Self {
            AppendEntry {
                key,
                values: vec![value],
            }
        }

        fn key(&self) -> &u64 {
            &self.key
        }

        fn value(&self) -> &u64 {
            &self.values[0]
        }

        fn replace(&mut self, value: u64) {
            self.values.push(value);
        }

        fn byte_size(&self) -> usize {
            self.key.byte_size() + self.values.byte_size()
        }
    }

    #[test]
    fn test_llrb_map_pluggable_entry_policy() {
        let mut map: LlrbMap<u64, u64, AppendEntry> = LlrbMap::new();
        map.insert(7, 1);
        map.insert(7, 2);
        map.insert(7, 3);
        // The policy kept every value; the map still sees one entry, and the
        // accounting followed the growth.
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&7), Some(&1));
        assert_eq!(map.size(), 8 + 24);
        assert!(map.verify());
    }
}
