//! See the documentation for [`LlrbMap`].

mod iter;
mod map;
mod node;

pub use self::iter::{Iter, KeyIter, RangeIter, ValueIter};
pub use self::map::LlrbMap;
