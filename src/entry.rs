//! The entry contract - what a map slot owns and how it behaves.
//!
//! [`LlrbMap`](crate::LlrbMap) never stores keys and values directly. Each
//! occupied node holds one [`Entry`], which owns the key, the value, the byte
//! accounting for the pair, and the policy applied when the same key is
//! inserted again. The map only ever talks to its entries through this trait,
//! so replacing [`ValueEntry`] swaps the accounting and replacement behaviour
//! without touching the tree.

use std::borrow::Cow;
use std::sync::Arc;

/// Byte accounting for keys and values stored in a map.
///
/// The map sums entry sizes incrementally on every insert and replace, so
/// implementations should be cheap - a stored length, not a traversal.
pub trait ByteSize {
    /// The number of bytes this value accounts for.
    fn byte_size(&self) -> usize;
}

macro_rules! byte_size_of {
    ($($t:ty),* $(,)?) => {
        $(
            impl ByteSize for $t {
                fn byte_size(&self) -> usize {
                    std::mem::size_of::<$t>()
                }
            }
        )*
    };
}

byte_size_of!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, bool, char, ()
);

impl ByteSize for str {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

impl ByteSize for String {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

impl<T: ByteSize> ByteSize for [T] {
    fn byte_size(&self) -> usize {
        self.iter().map(ByteSize::byte_size).sum()
    }
}

impl<T: ByteSize> ByteSize for Vec<T> {
    fn byte_size(&self) -> usize {
        self.as_slice().byte_size()
    }
}

impl<T: ByteSize + ?Sized> ByteSize for &T {
    fn byte_size(&self) -> usize {
        (**self).byte_size()
    }
}

impl<T: ByteSize + ?Sized> ByteSize for Box<T> {
    fn byte_size(&self) -> usize {
        (**self).byte_size()
    }
}

impl<T: ByteSize + ?Sized> ByteSize for Arc<T> {
    fn byte_size(&self) -> usize {
        (**self).byte_size()
    }
}

impl<T: ByteSize + ToOwned + ?Sized> ByteSize for Cow<'_, T> {
    fn byte_size(&self) -> usize {
        self.as_ref().byte_size()
    }
}

/// One occupied slot of the map.
///
/// `new` is the entry factory: the map calls it exactly once per fresh key.
/// When a key that already exists is inserted again the map calls
/// [`replace`](Entry::replace) on the existing entry instead - the entry
/// decides what that means. [`ValueEntry`] overwrites; an entry could just as
/// well fold the new value into a collection. The map re-reads
/// [`byte_size`](Entry::byte_size) around every replace, so a policy that
/// grows or shrinks the entry keeps the aggregate accounting exact.
///
/// The key returned by [`key`](Entry::key) must never change for the lifetime
/// of the entry - it is the node's position in the tree.
pub trait Entry<K, V> {
    /// Build a fresh entry owning `key` and `value`.
    fn new(key: K, value: V) -> Self;

    /// The key this entry is stored under.
    fn key(&self) -> &K;

    /// The current value.
    fn value(&self) -> &V;

    /// Apply the same-key insert policy with the newly inserted value.
    fn replace(&mut self, value: V);

    /// The number of bytes this entry accounts for in
    /// [`LlrbMap::size`](crate::LlrbMap::size).
    fn byte_size(&self) -> usize;
}

/// The default entry: one key, one value, replace overwrites.
///
/// Byte size is the sum of the key's and value's [`ByteSize`].
#[derive(Clone, Debug)]
pub struct ValueEntry<K, V> {
    key: K,
    value: V,
}

impl<K, V> Entry<K, V> for ValueEntry<K, V>
where
    K: ByteSize,
    V: ByteSize,
{
    fn new(key: K, value: V) -> Self {
        ValueEntry { key, value }
    }

    fn key(&self) -> &K {
        &self.key
    }

    fn value(&self) -> &V {
        &self.value
    }

    fn replace(&mut self, value: V) {
        self.value = value;
    }

    fn byte_size(&self) -> usize {
        self.key.byte_size() + self.value.byte_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_size_impls() {
        assert_eq!(4_u32.byte_size(), 4);
        assert_eq!(true.byte_size(), 1);
        assert_eq!("lemon".byte_size(), 5);
        assert_eq!(String::from("or").byte_size(), 2);
        assert_eq!(vec![1_u64, 2, 3].byte_size(), 24);
        assert_eq!((&"lemon").byte_size(), 5);
        assert_eq!(Arc::new(7_u16).byte_size(), 2);
    }

    #[test]
    fn test_value_entry_replace() {
        let mut e: ValueEntry<String, String> =
            ValueEntry::new("k".to_string(), "value".to_string());
        assert_eq!(e.byte_size(), 6);
        e.replace("v".to_string());
        assert_eq!(e.key(), "k");
        assert_eq!(e.value(), "v");
        assert_eq!(e.byte_size(), 2);
    }
}
