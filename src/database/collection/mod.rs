//! Persistent ordered collections backing the node model.
//!
//! Both collections are left-leaning red-black trees with structurally shared,
//! reference-counted nodes. Every update returns a new collection and leaves the
//! receiver untouched, so snapshots can be handed across threads freely.

mod comparator;
mod llrb;
mod sorted_map;
mod sorted_set;

pub use comparator::{Comparator, NaturalOrder};
pub use llrb::Iter;
pub use sorted_map::ImmutableSortedMap;
pub use sorted_set::{ImmutableSortedSet, SetIter};
