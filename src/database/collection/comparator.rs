use std::cmp::Ordering;

/// Total order used by the persistent collections.
///
/// The order is a value rather than a type parameter bound on `K: Ord` so that
/// runtime-selected orderings (such as a query index) can drive a collection.
pub trait Comparator<K: ?Sized>: Clone {
    fn compare(&self, left: &K, right: &K) -> Ordering;
}

/// Orders keys by their [`Ord`] implementation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NaturalOrder;

impl<K: Ord + ?Sized> Comparator<K> for NaturalOrder {
    fn compare(&self, left: &K, right: &K) -> Ordering {
        left.cmp(right)
    }
}
