//! Reversible weighted union-find
//!
//! Each node keeps its parent link, the cached size of its subtree and the
//! set of its direct children. Merges attach the smaller tree under the
//! larger one. There is no path compression, so every structural change has
//! an exact inverse (`UfUndo`).

use crate::error::{EditorError, Result};
use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

#[derive(Clone, Debug, PartialEq)]
struct UfNode<K: Ord, V> {
    value: V,
    parent: Option<K>,
    size: usize,
    children: BTreeSet<K>,
}

/// Inverse of one union-find mutation
#[derive(Clone, Debug, PartialEq)]
pub enum UfUndo<K, V> {
    Noop,
    /// Detach `K` from its parent
    Unmerge(K),
    /// Re-attach `node` under `parent`
    Attach { node: K, parent: K },
    /// Restore a node's own value
    SetValue { node: K, value: V },
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnionFind<K: Ord + Hash, V> {
    nodes: HashMap<K, UfNode<K, V>>,
}

impl<K, V> Default for UnionFind<K, V>
where
    K: Clone + Eq + Hash + Ord + Debug,
    V: Clone,
{
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }
}

impl<K, V> UnionFind<K, V>
where
    K: Clone + Eq + Hash + Ord + Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `key` as a singleton group (replaces the value if it already exists)
    pub fn insert(&mut self, key: K, value: V) {
        match self.nodes.get_mut(&key) {
            Some(node) => node.value = value,
            None => {
                self.nodes.insert(
                    key,
                    UfNode {
                        value,
                        parent: None,
                        size: 1,
                        children: BTreeSet::new(),
                    },
                );
            }
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Drop a singleton node. Grouped nodes are refused.
    pub fn remove(&mut self, key: &K) -> Result<Option<V>> {
        let grouped = match self.nodes.get(key) {
            None => return Ok(None),
            Some(node) => node.parent.is_some() || !node.children.is_empty(),
        };
        if grouped {
            return Err(EditorError::invalid_state(format!(
                "Group node {:?} is still grouped",
                key
            )));
        }
        Ok(self.nodes.remove(key).map(|n| n.value))
    }

    fn node(&self, key: &K) -> Result<&UfNode<K, V>> {
        self.nodes
            .get(key)
            .ok_or_else(|| EditorError::invalid_state(format!("Unknown group node {:?}", key)))
    }

    fn node_mut(&mut self, key: &K) -> Result<&mut UfNode<K, V>> {
        self.nodes
            .get_mut(key)
            .ok_or_else(|| EditorError::invalid_state(format!("Unknown group node {:?}", key)))
    }

    /// Root of the group containing `key` (`key` itself when unknown)
    pub fn find(&self, key: &K) -> K {
        let mut current = key.clone();
        while let Some(parent) = self.nodes.get(&current).and_then(|n| n.parent.clone()) {
            current = parent;
        }
        current
    }

    pub fn parent(&self, key: &K) -> Option<&K> {
        self.nodes.get(key).and_then(|n| n.parent.as_ref())
    }

    pub fn is_root(&self, key: &K) -> bool {
        self.parent(key).is_none()
    }

    /// Number of members in the group containing `key`
    pub fn group_size(&self, key: &K) -> usize {
        self.nodes.get(&self.find(key)).map(|n| n.size).unwrap_or(1)
    }

    /// Cached size of the subtree rooted at `key`
    pub fn subtree_size(&self, key: &K) -> usize {
        self.nodes.get(key).map(|n| n.size).unwrap_or(1)
    }

    pub fn children(&self, key: &K) -> Vec<K> {
        self.nodes
            .get(key)
            .map(|n| n.children.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All members of `key`'s group in depth-first order from the root
    pub fn members(&self, key: &K) -> Vec<K> {
        let root = self.find(key);
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(k) = stack.pop() {
            if let Some(node) = self.nodes.get(&k) {
                stack.extend(node.children.iter().rev().cloned());
            }
            out.push(k);
        }
        out
    }

    /// Value resolved through the group root
    pub fn value(&self, key: &K) -> Option<&V> {
        self.nodes.get(&self.find(key)).map(|n| &n.value)
    }

    /// The node's own value regardless of grouping
    pub fn own_value(&self, key: &K) -> Option<&V> {
        self.nodes.get(key).map(|n| &n.value)
    }

    /// Set a node's own value, returning its inverse
    pub fn set_own_value(&mut self, key: &K, value: V) -> Result<UfUndo<K, V>> {
        let node = self.node_mut(key)?;
        let previous = std::mem::replace(&mut node.value, value);
        Ok(UfUndo::SetValue {
            node: key.clone(),
            value: previous,
        })
    }

    /// Union by weight; the smaller tree's root goes under the larger root
    pub fn merge(&mut self, lhs: &K, rhs: &K) -> Result<UfUndo<K, V>> {
        let lroot = self.find(lhs);
        let rroot = self.find(rhs);
        if lroot == rroot {
            return Ok(UfUndo::Noop);
        }
        let (big, small) = if self.node(&lroot)?.size >= self.node(&rroot)?.size {
            (lroot, rroot)
        } else {
            (rroot, lroot)
        };
        self.attach(&small, &big)
    }

    /// Attach the root `node` directly under `parent`
    pub fn attach(&mut self, node: &K, parent: &K) -> Result<UfUndo<K, V>> {
        if !self.is_root(node) {
            return Err(EditorError::invalid_state(format!(
                "Cannot attach non-root group node {:?}",
                node
            )));
        }
        if self.find(parent) == *node {
            return Err(EditorError::invalid_state(format!(
                "Attaching {:?} under {:?} would create a cycle",
                node, parent
            )));
        }
        let size = self.node(node)?.size;
        self.node_mut(parent)?.children.insert(node.clone());
        self.node_mut(node)?.parent = Some(parent.clone());

        let mut current = Some(parent.clone());
        while let Some(k) = current {
            let n = self.node_mut(&k)?;
            n.size += size;
            current = n.parent.clone();
        }
        Ok(UfUndo::Unmerge(node.clone()))
    }

    /// Detach a non-root node (with its subtree) from its parent
    pub fn unmerge(&mut self, node: &K) -> Result<UfUndo<K, V>> {
        let parent = match self.node(node)?.parent.clone() {
            Some(p) => p,
            None => {
                return Err(EditorError::invalid_state(format!(
                    "Cannot unmerge group root {:?}",
                    node
                )))
            }
        };
        let size = self.node(node)?.size;
        self.node_mut(&parent)?.children.remove(node);
        self.node_mut(node)?.parent = None;

        let mut current = Some(parent.clone());
        while let Some(k) = current {
            let n = self.node_mut(&k)?;
            n.size -= size;
            current = n.parent.clone();
        }
        Ok(UfUndo::Attach {
            node: node.clone(),
            parent,
        })
    }

    /// Apply an inverse, returning the inverse of that (i.e. the redo step)
    pub fn apply(&mut self, undo: &UfUndo<K, V>) -> Result<UfUndo<K, V>> {
        match undo {
            UfUndo::Noop => Ok(UfUndo::Noop),
            UfUndo::Unmerge(node) => self.unmerge(node),
            UfUndo::Attach { node, parent } => self.attach(node, parent),
            UfUndo::SetValue { node, value } => self.set_own_value(node, value.clone()),
        }
    }

    /// Take `key` out of its group, keeping every other member grouped.
    ///
    /// Returns the inverses in application order; undo applies them reversed.
    pub fn isolate(&mut self, key: &K) -> Result<Vec<UfUndo<K, V>>> {
        let mut log = Vec::new();
        let children = self.children(key);
        let parent = self.parent(key).cloned();
        if children.is_empty() && parent.is_none() {
            return Ok(log);
        }
        let was_root = parent.is_none();

        for child in &children {
            log.push(self.unmerge(child)?);
        }
        if parent.is_some() {
            log.push(self.unmerge(key)?);
        }

        let mut anchor = parent.map(|p| self.find(&p));
        for child in &children {
            match &anchor {
                Some(a) => log.push(self.merge(a, child)?),
                None => anchor = Some(child.clone()),
            }
        }

        // A removed root hands its value to the new root so the group keeps its text
        if was_root {
            if let Some(a) = anchor {
                let new_root = self.find(&a);
                let value = self.node(key)?.value.clone();
                log.push(self.set_own_value(&new_root, value)?);
            }
        }
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uf(keys: &[&str]) -> UnionFind<String, String> {
        let mut uf = UnionFind::new();
        for k in keys {
            uf.insert(k.to_string(), format!("text-{}", k));
        }
        uf
    }

    fn s(k: &str) -> String {
        k.to_string()
    }

    #[test]
    fn test_merge_and_undo_restores_singletons() {
        let mut uf = uf(&["a", "b"]);
        let undo = uf.merge(&s("a"), &s("b")).unwrap();
        assert_eq!(uf.find(&s("b")), s("a"));
        assert_eq!(uf.group_size(&s("a")), 2);
        assert_eq!(uf.value(&s("b")), Some(&s("text-a")));

        uf.apply(&undo).unwrap();
        assert_eq!(uf.group_size(&s("a")), 1);
        assert_eq!(uf.group_size(&s("b")), 1);
        assert!(uf.is_root(&s("a")) && uf.is_root(&s("b")));
        assert_eq!(uf.members(&s("a")), vec![s("a")]);
        assert_eq!(uf.members(&s("b")), vec![s("b")]);
    }

    #[test]
    fn test_smaller_tree_goes_under_larger() {
        let mut uf = uf(&["a", "b", "c"]);
        uf.merge(&s("b"), &s("c")).unwrap();
        uf.merge(&s("a"), &s("c")).unwrap();
        assert_eq!(uf.find(&s("a")), s("b"));
        assert_eq!(uf.group_size(&s("a")), 3);
    }

    #[test]
    fn test_merge_same_group_is_noop() {
        let mut uf = uf(&["a", "b"]);
        uf.merge(&s("a"), &s("b")).unwrap();
        assert_eq!(uf.merge(&s("b"), &s("a")).unwrap(), UfUndo::Noop);
    }

    #[test]
    fn test_unmerge_root_is_invalid_state() {
        let mut uf = uf(&["a"]);
        assert!(matches!(
            uf.unmerge(&s("a")),
            Err(EditorError::InvalidState(_))
        ));
    }

    #[test]
    fn test_nested_sizes_follow_unmerge() {
        let mut uf = uf(&["a", "b", "c", "d"]);
        uf.merge(&s("a"), &s("b")).unwrap();
        uf.merge(&s("c"), &s("d")).unwrap();
        let outer = uf.merge(&s("a"), &s("c")).unwrap();
        assert_eq!(uf.group_size(&s("d")), 4);

        let inner_undo = uf.unmerge(&s("b")).unwrap();
        assert_eq!(uf.group_size(&s("d")), 3);
        uf.apply(&inner_undo).unwrap();
        assert_eq!(uf.group_size(&s("d")), 4);

        uf.apply(&outer).unwrap();
        assert_eq!(uf.group_size(&s("a")), 2);
        assert_eq!(uf.group_size(&s("c")), 2);
    }

    #[test]
    fn test_remove_only_drops_singletons() {
        let mut uf = uf(&["a", "b", "c"]);
        uf.merge(&s("a"), &s("b")).unwrap();
        assert!(matches!(uf.remove(&s("b")), Err(EditorError::InvalidState(_))));
        assert!(matches!(uf.remove(&s("a")), Err(EditorError::InvalidState(_))));
        assert_eq!(uf.remove(&s("c")).unwrap(), Some(s("text-c")));
        assert!(!uf.contains(&s("c")));
        assert_eq!(uf.remove(&s("c")).unwrap(), None);
    }

    #[test]
    fn test_equality_tracks_structure() {
        let mut uf = uf(&["a", "b"]);
        let copy = uf.clone();
        assert_eq!(uf, copy);
        let undo = uf.merge(&s("a"), &s("b")).unwrap();
        assert_ne!(uf, copy);
        uf.apply(&undo).unwrap();
        assert_eq!(uf, copy);
    }

    #[test]
    fn test_isolate_root_keeps_rest_grouped() {
        let mut uf = uf(&["a", "b", "c"]);
        uf.merge(&s("a"), &s("b")).unwrap();
        uf.merge(&s("a"), &s("c")).unwrap();
        let before = uf.clone();

        let log = uf.isolate(&s("a")).unwrap();
        assert_eq!(uf.group_size(&s("a")), 1);
        assert_eq!(uf.group_size(&s("b")), 2);
        assert_eq!(uf.find(&s("b")), uf.find(&s("c")));
        assert_eq!(uf.value(&s("c")), Some(&s("text-a")));

        for undo in log.iter().rev() {
            uf.apply(undo).unwrap();
        }
        assert_eq!(uf, before);
    }
}
