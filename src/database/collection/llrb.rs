use std::cmp::Ordering;
use std::iter::FusedIterator;
use std::sync::Arc;

use super::comparator::Comparator;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Color {
    Red,
    Black,
}

impl Color {
    fn flip(self) -> Self {
        match self {
            Color::Red => Color::Black,
            Color::Black => Color::Red,
        }
    }
}

pub(crate) type Link<K, V> = Option<Arc<LlrbNode<K, V>>>;

/// Tree node. Nodes are never mutated once shared; every rebalancing step builds
/// new nodes and reuses the untouched subtrees.
#[derive(Debug)]
pub(crate) struct LlrbNode<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) color: Color,
    pub(crate) left: Link<K, V>,
    pub(crate) right: Link<K, V>,
    size: usize,
}

pub(crate) fn is_red<K, V>(link: &Link<K, V>) -> bool {
    link.as_ref().is_some_and(|node| node.color == Color::Red)
}

pub(crate) fn size<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |node| node.size)
}

fn left_child_is_red<K, V>(link: &Link<K, V>) -> bool {
    link.as_ref().is_some_and(|node| is_red(&node.left))
}

impl<K: Clone, V: Clone> LlrbNode<K, V> {
    fn new(key: K, value: V, color: Color, left: Link<K, V>, right: Link<K, V>) -> Self {
        let size = 1 + size(&left) + size(&right);
        Self {
            key,
            value,
            color,
            left,
            right,
            size,
        }
    }

    fn shallow_copy(&self) -> Self {
        Self::new(
            self.key.clone(),
            self.value.clone(),
            self.color,
            self.left.clone(),
            self.right.clone(),
        )
    }

    pub(crate) fn with_color(&self, color: Color) -> Self {
        let mut node = self.shallow_copy();
        node.color = color;
        node
    }

    fn with_left(self, left: Link<K, V>) -> Self {
        Self::new(self.key, self.value, self.color, left, self.right)
    }

    fn with_right(self, right: Link<K, V>) -> Self {
        Self::new(self.key, self.value, self.color, self.left, right)
    }
}

pub(crate) fn insert<K, V, C>(link: &Link<K, V>, key: K, value: V, comparator: &C) -> LlrbNode<K, V>
where
    K: Clone,
    V: Clone,
    C: Comparator<K>,
{
    let Some(node) = link else {
        return LlrbNode::new(key, value, Color::Red, None, None);
    };
    let updated = match comparator.compare(&key, &node.key) {
        Ordering::Less => {
            let left = insert(&node.left, key, value, comparator);
            node.shallow_copy().with_left(Some(Arc::new(left)))
        }
        Ordering::Equal => {
            LlrbNode::new(key, value, node.color, node.left.clone(), node.right.clone())
        }
        Ordering::Greater => {
            let right = insert(&node.right, key, value, comparator);
            node.shallow_copy().with_right(Some(Arc::new(right)))
        }
    };
    fix_up(updated)
}

/// Removes `key`, which must be present in the subtree.
pub(crate) fn remove<K, V, C>(node: &Arc<LlrbNode<K, V>>, key: &K, comparator: &C) -> Link<K, V>
where
    K: Clone,
    V: Clone,
    C: Comparator<K>,
{
    let mut n = node.shallow_copy();
    if comparator.compare(key, &n.key) == Ordering::Less {
        if n.left.is_some() && !is_red(&n.left) && !left_child_is_red(&n.left) {
            n = move_red_left(n);
        }
        let left = n
            .left
            .as_ref()
            .and_then(|left| remove(left, key, comparator));
        n = n.with_left(left);
    } else {
        if is_red(&n.left) {
            n = rotate_right(n);
        }
        if n.right.is_some() && !is_red(&n.right) && !left_child_is_red(&n.right) {
            n = move_red_right(n);
        }
        if comparator.compare(key, &n.key) == Ordering::Equal {
            let Some(right) = n.right.clone() else {
                return None;
            };
            let smallest = min_node(&right);
            let (min_key, min_value) = (smallest.key.clone(), smallest.value.clone());
            n = LlrbNode::new(min_key, min_value, n.color, n.left, remove_min(&right));
        } else {
            let right = n
                .right
                .as_ref()
                .and_then(|right| remove(right, key, comparator));
            n = n.with_right(right);
        }
    }
    Some(Arc::new(fix_up(n)))
}

fn remove_min<K: Clone, V: Clone>(node: &Arc<LlrbNode<K, V>>) -> Link<K, V> {
    if node.left.is_none() {
        return None;
    }
    let mut n = node.shallow_copy();
    if !is_red(&n.left) && !left_child_is_red(&n.left) {
        n = move_red_left(n);
    }
    let left = n.left.as_ref().and_then(remove_min);
    Some(Arc::new(fix_up(n.with_left(left))))
}

fn move_red_left<K: Clone, V: Clone>(node: LlrbNode<K, V>) -> LlrbNode<K, V> {
    let mut n = color_flip(node);
    if left_child_is_red(&n.right) {
        let right = n
            .right
            .as_ref()
            .map(|right| Arc::new(rotate_right(right.shallow_copy())));
        n = rotate_left(n.with_right(right));
        n = color_flip(n);
    }
    n
}

fn move_red_right<K: Clone, V: Clone>(node: LlrbNode<K, V>) -> LlrbNode<K, V> {
    let mut n = color_flip(node);
    if left_child_is_red(&n.left) {
        n = color_flip(rotate_right(n));
    }
    n
}

fn fix_up<K: Clone, V: Clone>(node: LlrbNode<K, V>) -> LlrbNode<K, V> {
    let mut n = node;
    if is_red(&n.right) && !is_red(&n.left) {
        n = rotate_left(n);
    }
    if is_red(&n.left) && left_child_is_red(&n.left) {
        n = rotate_right(n);
    }
    if is_red(&n.left) && is_red(&n.right) {
        n = color_flip(n);
    }
    n
}

fn rotate_left<K: Clone, V: Clone>(node: LlrbNode<K, V>) -> LlrbNode<K, V> {
    let LlrbNode {
        key,
        value,
        color,
        left,
        right,
        ..
    } = node;
    let Some(right) = right else {
        return LlrbNode::new(key, value, color, left, None);
    };
    let new_left = LlrbNode::new(key, value, Color::Red, left, right.left.clone());
    LlrbNode::new(
        right.key.clone(),
        right.value.clone(),
        color,
        Some(Arc::new(new_left)),
        right.right.clone(),
    )
}

fn rotate_right<K: Clone, V: Clone>(node: LlrbNode<K, V>) -> LlrbNode<K, V> {
    let LlrbNode {
        key,
        value,
        color,
        left,
        right,
        ..
    } = node;
    let Some(left) = left else {
        return LlrbNode::new(key, value, color, None, right);
    };
    let new_right = LlrbNode::new(key, value, Color::Red, left.right.clone(), right);
    LlrbNode::new(
        left.key.clone(),
        left.value.clone(),
        color,
        left.left.clone(),
        Some(Arc::new(new_right)),
    )
}

fn color_flip<K: Clone, V: Clone>(node: LlrbNode<K, V>) -> LlrbNode<K, V> {
    fn flipped<K: Clone, V: Clone>(link: &Link<K, V>) -> Link<K, V> {
        link.as_ref()
            .map(|child| Arc::new(child.with_color(child.color.flip())))
    }
    let left = flipped(&node.left);
    let right = flipped(&node.right);
    LlrbNode::new(node.key, node.value, node.color.flip(), left, right)
}

pub(crate) fn min_node<K, V>(node: &Arc<LlrbNode<K, V>>) -> &LlrbNode<K, V> {
    let mut current: &LlrbNode<K, V> = node;
    while let Some(left) = current.left.as_deref() {
        current = left;
    }
    current
}

pub(crate) fn max_node<K, V>(node: &Arc<LlrbNode<K, V>>) -> &LlrbNode<K, V> {
    let mut current: &LlrbNode<K, V> = node;
    while let Some(right) = current.right.as_deref() {
        current = right;
    }
    current
}

pub(crate) fn find<'a, K, V, C>(
    link: &'a Link<K, V>,
    key: &K,
    comparator: &C,
) -> Option<&'a LlrbNode<K, V>>
where
    C: Comparator<K>,
{
    let mut current = link.as_deref();
    while let Some(node) = current {
        current = match comparator.compare(key, &node.key) {
            Ordering::Less => node.left.as_deref(),
            Ordering::Equal => return Some(node),
            Ordering::Greater => node.right.as_deref(),
        };
    }
    None
}

/// Key immediately before `key`; `None` when `key` is the minimum or absent.
pub(crate) fn predecessor<'a, K, V, C>(
    link: &'a Link<K, V>,
    key: &K,
    comparator: &C,
) -> Option<&'a K>
where
    C: Comparator<K>,
{
    let mut current = link.as_deref();
    let mut right_parent: Option<&LlrbNode<K, V>> = None;
    while let Some(node) = current {
        match comparator.compare(key, &node.key) {
            Ordering::Equal => {
                return match node.left.as_ref() {
                    Some(left) => Some(&max_node(left).key),
                    None => right_parent.map(|parent| &parent.key),
                };
            }
            Ordering::Less => current = node.left.as_deref(),
            Ordering::Greater => {
                right_parent = Some(node);
                current = node.right.as_deref();
            }
        }
    }
    None
}

/// Key immediately after `key`; `None` when `key` is the maximum or absent.
pub(crate) fn successor<'a, K, V, C>(link: &'a Link<K, V>, key: &K, comparator: &C) -> Option<&'a K>
where
    C: Comparator<K>,
{
    let mut current = link.as_deref();
    let mut left_parent: Option<&LlrbNode<K, V>> = None;
    while let Some(node) = current {
        match comparator.compare(key, &node.key) {
            Ordering::Equal => {
                return match node.right.as_ref() {
                    Some(right) => Some(&min_node(right).key),
                    None => left_parent.map(|parent| &parent.key),
                };
            }
            Ordering::Less => {
                left_parent = Some(node);
                current = node.left.as_deref();
            }
            Ordering::Greater => current = node.right.as_deref(),
        }
    }
    None
}

/// In-order iterator over a persistent tree, ascending or descending.
pub struct Iter<'a, K, V> {
    stack: Vec<&'a LlrbNode<K, V>>,
    reverse: bool,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(root: &'a Link<K, V>, reverse: bool) -> Self {
        let mut iter = Self {
            stack: Vec::new(),
            reverse,
        };
        iter.push_path(root.as_deref());
        iter
    }

    /// Positions the iterator at the first entry not before `key` (or, in
    /// reverse, the first entry not after it).
    pub(crate) fn starting_at<C>(
        root: &'a Link<K, V>,
        key: &K,
        comparator: &C,
        reverse: bool,
    ) -> Self
    where
        C: Comparator<K>,
    {
        let mut stack = Vec::new();
        let mut current = root.as_deref();
        while let Some(node) = current {
            let cmp = comparator.compare(&node.key, key);
            let include = if reverse {
                cmp != Ordering::Greater
            } else {
                cmp != Ordering::Less
            };
            if include {
                stack.push(node);
                current = if reverse {
                    node.right.as_deref()
                } else {
                    node.left.as_deref()
                };
            } else {
                current = if reverse {
                    node.left.as_deref()
                } else {
                    node.right.as_deref()
                };
            }
        }
        Self { stack, reverse }
    }

    fn push_path(&mut self, mut node: Option<&'a LlrbNode<K, V>>) {
        while let Some(current) = node {
            self.stack.push(current);
            node = if self.reverse {
                current.right.as_deref()
            } else {
                current.left.as_deref()
            };
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        let next = if self.reverse {
            node.left.as_deref()
        } else {
            node.right.as_deref()
        };
        self.push_path(next);
        Some((&node.key, &node.value))
    }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Checks the red-black invariants, returning the black height.
#[cfg(test)]
pub(crate) fn black_height<K, V>(link: &Link<K, V>) -> usize {
    let Some(node) = link else {
        return 1;
    };
    assert!(!is_red(&node.right), "right-leaning red link");
    if node.color == Color::Red {
        assert!(!is_red(&node.left), "two consecutive red links");
    }
    let left = black_height(&node.left);
    let right = black_height(&node.right);
    assert_eq!(left, right, "black height mismatch");
    assert_eq!(node.size, 1 + size(&node.left) + size(&node.right));
    left + usize::from(node.color == Color::Black)
}
