use std::fmt;

use super::comparator::{Comparator, NaturalOrder};
use super::llrb::Iter;
use super::sorted_map::ImmutableSortedMap;

/// Immutable ordered set; a thin wrapper over [`ImmutableSortedMap`] with unit values.
pub struct ImmutableSortedSet<T, C = NaturalOrder> {
    map: ImmutableSortedMap<T, (), C>,
}

impl<T, C: Clone> Clone for ImmutableSortedSet<T, C> {
    fn clone(&self) -> Self {
        Self {
            map: self.map.clone(),
        }
    }
}

impl<T: Clone + Ord> ImmutableSortedSet<T, NaturalOrder> {
    pub fn new() -> Self {
        Self::with_comparator(NaturalOrder)
    }
}

impl<T: Clone + Ord> Default for ImmutableSortedSet<T, NaturalOrder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C> ImmutableSortedSet<T, C>
where
    T: Clone,
    C: Comparator<T>,
{
    pub fn with_comparator(comparator: C) -> Self {
        Self {
            map: ImmutableSortedMap::with_comparator(comparator),
        }
    }

    pub fn from_entries<I>(entries: I, comparator: C) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        entries
            .into_iter()
            .fold(Self::with_comparator(comparator), |set, entry| {
                set.insert(entry)
            })
    }

    pub fn comparator(&self) -> &C {
        self.map.comparator()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn insert(&self, entry: T) -> Self {
        Self {
            map: self.map.insert(entry, ()),
        }
    }

    pub fn remove(&self, entry: &T) -> Self {
        Self {
            map: self.map.remove(entry),
        }
    }

    pub fn contains(&self, entry: &T) -> bool {
        self.map.contains_key(entry)
    }

    pub fn min_entry(&self) -> Option<&T> {
        self.map.min_key()
    }

    pub fn max_entry(&self) -> Option<&T> {
        self.map.max_key()
    }

    pub fn predecessor_entry(&self, entry: &T) -> Option<&T> {
        self.map.predecessor_key(entry)
    }

    pub fn successor_entry(&self, entry: &T) -> Option<&T> {
        self.map.successor_key(entry)
    }

    pub fn index_of(&self, entry: &T) -> Option<usize> {
        self.map.index_of(entry)
    }

    pub fn iter(&self) -> SetIter<'_, T> {
        SetIter(self.map.iter())
    }

    pub fn reverse_iter(&self) -> SetIter<'_, T> {
        SetIter(self.map.reverse_iter())
    }

    pub fn iter_from(&self, entry: &T) -> SetIter<'_, T> {
        SetIter(self.map.iter_from(entry))
    }

    pub fn reverse_iter_from(&self, entry: &T) -> SetIter<'_, T> {
        SetIter(self.map.reverse_iter_from(entry))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.map.ptr_eq(&other.map)
    }
}

/// Iterator over the entries of an [`ImmutableSortedSet`].
pub struct SetIter<'a, T>(Iter<'a, T, ()>);

impl<'a, T> Iterator for SetIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(entry, _)| entry)
    }
}

impl<T, C> PartialEq for ImmutableSortedSet<T, C>
where
    T: Clone + PartialEq,
    C: Comparator<T>,
{
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<T, C> fmt::Debug for ImmutableSortedSet<T, C>
where
    T: Clone + fmt::Debug,
    C: Comparator<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: Clone + Ord> FromIterator<T> for ImmutableSortedSet<T, NaturalOrder> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_entries(iter, NaturalOrder)
    }
}
