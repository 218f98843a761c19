//! Single-target back-references
//!
//! A `BackRef` is a non-owning pointer from a container block to a target
//! block. Every live reference is registered under its target id so that
//! deleting the target can ask each container for a compensating command.

use crate::models::block::{BlockId, BlockKind};
use crate::structure::document::Document;
use crate::undo::{Command, DeferredAction};
use std::collections::HashMap;

/// Non-owning reference slot; only the document rewrites it so the registry
/// stays in sync
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackRef {
    target: Option<BlockId>,
}

impl BackRef {
    pub fn get(&self) -> Option<&BlockId> {
        self.target.as_ref()
    }

    pub(crate) fn replace(&mut self, target: Option<BlockId>) -> Option<BlockId> {
        std::mem::replace(&mut self.target, target)
    }
}

/// Maps a target id to the containers currently referencing it
#[derive(Clone, Debug, Default)]
pub struct RefRegistry {
    refs: HashMap<BlockId, Vec<BlockId>>,
}

impl RefRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, target: &BlockId, container: &BlockId) {
        self.refs
            .entry(target.clone())
            .or_default()
            .push(container.clone());
    }

    pub fn unregister(&mut self, target: &BlockId, container: &BlockId) {
        if let Some(containers) = self.refs.get_mut(target) {
            if let Some(pos) = containers.iter().position(|c| c == container) {
                containers.remove(pos);
            }
            if containers.is_empty() {
                self.refs.remove(target);
            }
        }
    }

    /// Containers referencing `target`, in registration order
    pub fn get(&self, target: &BlockId) -> &[BlockId] {
        self.refs.get(target).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn clear(&mut self) {
        self.refs.clear();
    }
}

/// The command a container issues when the block it references goes away
pub fn removal_cmd(doc: &Document, container: &BlockId) -> Command {
    match doc.block(container) {
        Some(block) if block.kind() == BlockKind::SingAlong => match block.parent() {
            Some(parent) => Command::remove_block(parent.clone(), container.clone()),
            None => Command::Noop,
        },
        _ => Command::Noop,
    }
}

/// Cascade for deleting `target`: every referencing container removes itself,
/// then all references to `target` are nulled (restored in reverse on undo).
pub fn delete_target_cmd(doc: &Document, target: &BlockId) -> Command {
    let containers = doc.refs().get(target);
    if containers.is_empty() {
        return Command::Noop;
    }
    let mut cmds: Vec<Command> = containers.iter().map(|c| removal_cmd(doc, c)).collect();
    cmds.push(Command::deferred(DeferredAction::NullRefs {
        target: target.clone(),
    }));
    Command::batch(cmds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_register_unregister() {
        let mut registry = RefRegistry::new();
        let target = BlockId::new("bl-1");
        let a = BlockId::new("bl-2");
        let b = BlockId::new("bl-3");

        registry.register(&target, &a);
        registry.register(&target, &b);
        assert_eq!(registry.get(&target), &[a.clone(), b.clone()]);

        registry.unregister(&target, &a);
        assert_eq!(registry.get(&target), &[b.clone()]);

        registry.unregister(&target, &b);
        assert!(registry.get(&target).is_empty());
    }

    #[test]
    fn test_back_ref_replace_returns_previous() {
        let mut r = BackRef::default();
        assert_eq!(r.replace(Some(BlockId::new("bl-1"))), None);
        assert_eq!(r.replace(None), Some(BlockId::new("bl-1")));
        assert!(r.get().is_none());
    }
}
