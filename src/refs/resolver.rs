//! Deferred resolution of forward references during load
//!
//! Phase 1 registers every constructed id with `provide` and queues
//! "run once X exists" requests with `defer`. Phase 2 drains the ready queue
//! with `take_ready`. `finish` rejects anything still waiting.

use crate::error::{EditorError, Result};
use crate::models::block::BlockId;
use std::collections::{HashMap, HashSet, VecDeque};

/// Queue of pending resolutions of type `T` (the "callback" payload)
#[derive(Debug)]
pub struct ForwardResolver<T> {
    known: HashSet<BlockId>,
    pending: HashMap<BlockId, Vec<T>>,
    ready: VecDeque<(BlockId, T)>,
}

impl<T> Default for ForwardResolver<T> {
    fn default() -> Self {
        Self {
            known: HashSet::new(),
            pending: HashMap::new(),
            ready: VecDeque::new(),
        }
    }
}

impl<T> ForwardResolver<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `id` now exists. Returns false if it was already known.
    pub fn provide(&mut self, id: &BlockId) -> bool {
        if !self.known.insert(id.clone()) {
            return false;
        }
        if let Some(waiting) = self.pending.remove(id) {
            self.ready
                .extend(waiting.into_iter().map(|item| (id.clone(), item)));
        }
        true
    }

    pub fn is_known(&self, id: &BlockId) -> bool {
        self.known.contains(id)
    }

    /// Queue `item` to run once `id` exists (immediately ready if it already does)
    pub fn defer(&mut self, id: BlockId, item: T) {
        if self.known.contains(&id) {
            self.ready.push_back((id, item));
        } else {
            self.pending.entry(id).or_default().push(item);
        }
    }

    /// Drain every request whose target exists
    pub fn take_ready(&mut self) -> Vec<(BlockId, T)> {
        self.ready.drain(..).collect()
    }

    pub fn unresolved_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Fail with a DataError naming the missing ids if anything is still waiting
    pub fn finish(self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut missing: Vec<&str> = self.pending.keys().map(|id| id.as_str()).collect();
        missing.sort_unstable();
        Err(EditorError::data(format!(
            "Unresolved references: {}",
            missing.join(", ")
        )))
    }
}
