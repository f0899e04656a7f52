use std::fmt;
use std::sync::Arc;

use super::comparator::{Comparator, NaturalOrder};
use super::llrb::{self, Color, Iter, Link};

/// Immutable ordered map backed by a left-leaning red-black tree.
///
/// Updates return a new map sharing every untouched subtree with the receiver.
/// Cloning is O(1).
pub struct ImmutableSortedMap<K, V, C = NaturalOrder> {
    root: Link<K, V>,
    comparator: C,
}

impl<K, V, C: Clone> Clone for ImmutableSortedMap<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            comparator: self.comparator.clone(),
        }
    }
}

impl<K, V> ImmutableSortedMap<K, V, NaturalOrder>
where
    K: Clone + Ord,
    V: Clone,
{
    pub fn new() -> Self {
        Self::with_comparator(NaturalOrder)
    }
}

impl<K, V> Default for ImmutableSortedMap<K, V, NaturalOrder>
where
    K: Clone + Ord,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> ImmutableSortedMap<K, V, C>
where
    K: Clone,
    V: Clone,
    C: Comparator<K>,
{
    pub fn with_comparator(comparator: C) -> Self {
        Self {
            root: None,
            comparator,
        }
    }

    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    pub fn len(&self) -> usize {
        llrb::size(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns a map with `key` bound to `value`, replacing any previous binding.
    pub fn insert(&self, key: K, value: V) -> Self {
        let mut root = llrb::insert(&self.root, key, value, &self.comparator);
        root.color = Color::Black;
        Self {
            root: Some(Arc::new(root)),
            comparator: self.comparator.clone(),
        }
    }

    /// Returns a map without `key`. When the key is absent the result shares the
    /// receiver's root, which [`ImmutableSortedMap::ptr_eq`] detects.
    pub fn remove(&self, key: &K) -> Self {
        let Some(root) = self.root.as_ref() else {
            return self.clone();
        };
        if !self.contains_key(key) {
            return self.clone();
        }
        let root = llrb::remove(root, key, &self.comparator)
            .map(|node| Arc::new(node.with_color(Color::Black)));
        Self {
            root,
            comparator: self.comparator.clone(),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        llrb::find(&self.root, key, &self.comparator).map(|node| &node.value)
    }

    pub fn get_entry(&self, key: &K) -> Option<(&K, &V)> {
        llrb::find(&self.root, key, &self.comparator).map(|node| (&node.key, &node.value))
    }

    pub fn contains_key(&self, key: &K) -> bool {
        llrb::find(&self.root, key, &self.comparator).is_some()
    }

    pub fn min_key(&self) -> Option<&K> {
        self.root.as_ref().map(|root| &llrb::min_node(root).key)
    }

    pub fn max_key(&self) -> Option<&K> {
        self.root.as_ref().map(|root| &llrb::max_node(root).key)
    }

    pub fn min_entry(&self) -> Option<(&K, &V)> {
        self.root.as_ref().map(|root| {
            let node = llrb::min_node(root);
            (&node.key, &node.value)
        })
    }

    pub fn max_entry(&self) -> Option<(&K, &V)> {
        self.root.as_ref().map(|root| {
            let node = llrb::max_node(root);
            (&node.key, &node.value)
        })
    }

    /// Key ordered immediately before `key`. `None` when `key` is the first key
    /// or is not in the map.
    pub fn predecessor_key(&self, key: &K) -> Option<&K> {
        llrb::predecessor(&self.root, key, &self.comparator)
    }

    /// Key ordered immediately after `key`. `None` when `key` is the last key or
    /// is not in the map.
    pub fn successor_key(&self, key: &K) -> Option<&K> {
        llrb::successor(&self.root, key, &self.comparator)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.root, false)
    }

    pub fn reverse_iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.root, true)
    }

    /// Iterates ascending, starting at the first key that is not before `key`.
    pub fn iter_from(&self, key: &K) -> Iter<'_, K, V> {
        Iter::starting_at(&self.root, key, &self.comparator, false)
    }

    /// Iterates descending, starting at the last key that is not after `key`.
    pub fn reverse_iter_from(&self, key: &K) -> Iter<'_, K, V> {
        Iter::starting_at(&self.root, key, &self.comparator, true)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Index of `key` in iteration order.
    pub fn index_of(&self, key: &K) -> Option<usize> {
        let mut current = self.root.as_deref();
        let mut preceding = 0;
        while let Some(node) = current {
            match self.comparator.compare(key, &node.key) {
                std::cmp::Ordering::Equal => return Some(preceding + llrb::size(&node.left)),
                std::cmp::Ordering::Less => current = node.left.as_deref(),
                std::cmp::Ordering::Greater => {
                    preceding += llrb::size(&node.left) + 1;
                    current = node.right.as_deref();
                }
            }
        }
        None
    }

    /// `true` when both maps share the same root node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(left), Some(right)) => Arc::ptr_eq(left, right),
            (None, None) => true,
            _ => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        assert!(!llrb::is_red(&self.root), "root must be black");
        llrb::black_height(&self.root);
    }
}

impl<K, V, C> PartialEq for ImmutableSortedMap<K, V, C>
where
    K: Clone + PartialEq,
    V: Clone + PartialEq,
    C: Comparator<K>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K, V, C> Eq for ImmutableSortedMap<K, V, C>
where
    K: Clone + Eq,
    V: Clone + Eq,
    C: Comparator<K>,
{
}

impl<K, V, C> fmt::Debug for ImmutableSortedMap<K, V, C>
where
    K: Clone + fmt::Debug,
    V: Clone + fmt::Debug,
    C: Comparator<K>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for ImmutableSortedMap<K, V, NaturalOrder>
where
    K: Clone + Ord,
    V: Clone,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |map, (key, value)| map.insert(key, value))
    }
}

impl<'a, K, V, C> IntoIterator for &'a ImmutableSortedMap<K, V, C>
where
    K: Clone,
    V: Clone,
    C: Comparator<K>,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeMap;

    #[test]
    fn insert_keeps_keys_sorted() {
        let map: ImmutableSortedMap<i32, &str> =
            [(5, "five"), (1, "one"), (3, "three"), (4, "four"), (2, "two")]
                .into_iter()
                .collect();
        map.assert_invariants();
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert_eq!(map.get(&3), Some(&"three"));
        assert_eq!(map.len(), 5);
        assert_eq!(map.min_key(), Some(&1));
        assert_eq!(map.max_key(), Some(&5));
    }

    #[test]
    fn insert_replaces_duplicate_key() {
        let map = ImmutableSortedMap::new().insert("a", 1).insert("a", 2);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&"a"), Some(&2));
    }

    #[test]
    fn updates_leave_original_untouched() {
        let original: ImmutableSortedMap<i32, i32> = (0..10).map(|i| (i, i * 10)).collect();
        let inserted = original.insert(42, 420);
        let removed = original.remove(&3);
        assert_eq!(original.len(), 10);
        assert!(original.contains_key(&3));
        assert!(!original.contains_key(&42));
        assert_eq!(inserted.len(), 11);
        assert_eq!(removed.len(), 9);
        assert!(!removed.contains_key(&3));
    }

    #[test]
    fn removing_absent_key_returns_same_root() {
        let map: ImmutableSortedMap<i32, ()> = (0..5).map(|i| (i, ())).collect();
        let same = map.remove(&99);
        assert!(same.ptr_eq(&map));
        assert!(!map.remove(&2).ptr_eq(&map));
    }

    #[test]
    fn predecessor_and_successor() {
        let map: ImmutableSortedMap<i32, ()> = [10, 20, 30, 40].iter().map(|k| (*k, ())).collect();
        assert_eq!(map.predecessor_key(&10), None);
        assert_eq!(map.predecessor_key(&30), Some(&20));
        assert_eq!(map.successor_key(&30), Some(&40));
        assert_eq!(map.successor_key(&40), None);
        assert_eq!(map.predecessor_key(&25), None);
        assert_eq!(map.index_of(&30), Some(2));
        assert_eq!(map.index_of(&31), None);
    }

    #[test]
    fn iterates_from_arbitrary_key() {
        let map: ImmutableSortedMap<i32, ()> = (0..20).step_by(2).map(|k| (k, ())).collect();
        let forward: Vec<_> = map.iter_from(&7).map(|(k, _)| *k).collect();
        assert_eq!(forward, vec![8, 10, 12, 14, 16, 18]);
        let exact: Vec<_> = map.iter_from(&8).map(|(k, _)| *k).take(2).collect();
        assert_eq!(exact, vec![8, 10]);
        let backward: Vec<_> = map.reverse_iter_from(&7).map(|(k, _)| *k).collect();
        assert_eq!(backward, vec![6, 4, 2, 0]);
        let all_reverse: Vec<_> = map.reverse_iter().map(|(k, _)| *k).take(3).collect();
        assert_eq!(all_reverse, vec![18, 16, 14]);
        assert_eq!(map.iter_from(&100).count(), 0);
    }

    #[test]
    fn equality_is_structural() {
        let ascending: ImmutableSortedMap<i32, i32> = (0..50).map(|i| (i, i)).collect();
        let descending: ImmutableSortedMap<i32, i32> = (0..50).rev().map(|i| (i, i)).collect();
        assert!(!ascending.ptr_eq(&descending));
        assert_eq!(ascending, descending);
        assert_ne!(ascending, descending.insert(3, 4));
    }

    #[test]
    fn custom_comparator_orders_entries() {
        let reversed = |a: &i32, b: &i32| b.cmp(a);
        let map = ImmutableSortedMap::with_comparator(ReverseOrder(reversed))
            .insert(1, ())
            .insert(3, ())
            .insert(2, ());
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![3, 2, 1]);
    }

    #[derive(Clone)]
    struct ReverseOrder<F>(F);

    impl<F> Comparator<i32> for ReverseOrder<F>
    where
        F: Fn(&i32, &i32) -> std::cmp::Ordering + Clone,
    {
        fn compare(&self, left: &i32, right: &i32) -> std::cmp::Ordering {
            (self.0)(left, right)
        }
    }

    #[test]
    fn random_operations_match_btree_map() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..20 {
            let mut model = BTreeMap::new();
            let mut map = ImmutableSortedMap::new();
            for _ in 0..400 {
                let key: u16 = rng.gen_range(0..200);
                if rng.gen_bool(0.6) {
                    model.insert(key, key as u32 * 3);
                    map = map.insert(key, key as u32 * 3);
                } else {
                    model.remove(&key);
                    map = map.remove(&key);
                }
                map.assert_invariants();
            }
            assert_eq!(map.len(), model.len());
            assert!(map.iter().map(|(k, v)| (*k, *v)).eq(model.iter().map(|(k, v)| (*k, *v))));
        }
    }

    #[test]
    fn removing_every_key_yields_empty_map() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut keys: Vec<u32> = (0..500).collect();
        keys.shuffle(&mut rng);
        let mut map = keys.iter().fold(ImmutableSortedMap::new(), |map, key| map.insert(*key, ()));
        map.assert_invariants();
        keys.shuffle(&mut rng);
        for key in &keys {
            map = map.remove(key);
            map.assert_invariants();
        }
        assert!(map.is_empty());
        assert_eq!(map, ImmutableSortedMap::new());
    }
}
