//! Document arena
//!
//! Owns every block by id. Parents hold the ordered ids of their children;
//! the parent back-link of a block is only rewritten here, when a splice
//! moves it in or out of a child list. Detached blocks stay in the arena so
//! undo can re-attach them.

use crate::config::{LYRICS_SEP, SMALL_DS_THRESHOLD};
use crate::error::{EditorError, Result};
use crate::models::block::{Block, BlockData, BlockId, BlockKind};
use crate::models::metadata::Metadata;
use crate::models::tags::{LyricTag, TagsStore};
use crate::models::tempo::TempoMap;
use crate::models::timing::{Timing, MAX_BAR};
use crate::refs::{RefRegistry, UnionFind};
use std::collections::HashMap;
use std::fmt;

/// Fixed id of the root `Tracks` block
pub const ROOT_ID: &str = "main-tracks";

/// Called with the new revision whenever an outermost transaction closes
pub type ChangeListener = Box<dyn FnMut(u64) + Send>;

pub struct Document {
    blocks: HashMap<BlockId, Block>,
    root: BlockId,
    next_id: u64,
    refs: RefRegistry,
    /// Repeat groups of call blocks; node values are the call texts
    call_groups: UnionFind<BlockId, String>,
    tags: TagsStore,
    meta: Metadata,
    tempo: TempoMap,
    max_end: Timing,
    revision: u64,
    txn_depth: usize,
    listeners: Vec<ChangeListener>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.root)
            .field("blocks", &self.blocks.len())
            .field("next_id", &self.next_id)
            .field("revision", &self.revision)
            .finish()
    }
}

impl Document {
    /// Empty document: a root with no tracks
    pub fn new() -> Self {
        let root = BlockId::new(ROOT_ID);
        let mut blocks = HashMap::new();
        blocks.insert(
            root.clone(),
            Block::new(root.clone(), BlockData::Tracks { children: Vec::new() }),
        );
        Self {
            blocks,
            root,
            next_id: 0,
            refs: RefRegistry::new(),
            call_groups: UnionFind::new(),
            tags: TagsStore::new(),
            meta: Metadata::default(),
            tempo: TempoMap::default(),
            max_end: Timing::new(MAX_BAR, 0, 1),
            revision: 0,
            txn_depth: 0,
            listeners: Vec::new(),
        }
    }

    //#region Ids and arena

    /// Allocate the next `bl-<n>` id
    pub fn alloc_id(&mut self) -> BlockId {
        let id = BlockId::new(format!("bl-{}", self.next_id));
        self.next_id += 1;
        id
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Never moves the counter backwards
    pub fn bump_next_id(&mut self, at_least: u64) {
        self.next_id = self.next_id.max(at_least);
    }

    pub fn root_id(&self) -> &BlockId {
        &self.root
    }

    /// Track containers in display order
    pub fn tracks(&self) -> &[BlockId] {
        self.children_of(&self.root)
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.blocks.contains_key(id)
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn expect_block(&self, id: &BlockId) -> Result<&Block> {
        self.blocks
            .get(id)
            .ok_or_else(|| EditorError::invalid_state(format!("Unknown block {}", id)))
    }

    pub(crate) fn block_mut(&mut self, id: &BlockId) -> Result<&mut Block> {
        self.blocks
            .get_mut(id)
            .ok_or_else(|| EditorError::invalid_state(format!("Unknown block {}", id)))
    }

    pub(crate) fn insert_block(&mut self, block: Block) -> Result<BlockId> {
        let id = block.id().clone();
        if self.blocks.contains_key(&id) {
            return Err(EditorError::data(format!("Duplicate block id {}", id)));
        }
        self.blocks.insert(id.clone(), block);
        Ok(id)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Drop blocks built for an edit that never attached them, along with
    /// their subtrees, references and group nodes. Attached ids are skipped.
    pub(crate) fn discard_detached(&mut self, ids: &[BlockId]) {
        for id in ids {
            if self.parent_of(id).is_some() || *id == self.root {
                continue;
            }
            for block_id in self.subtree(id) {
                if let Some(target) = self.sing_along_lyric(&block_id).cloned() {
                    self.refs.unregister(&target, &block_id);
                }
                if let Err(e) = self.call_groups.remove(&block_id) {
                    log::warn!("Discarded call {} kept its group node: {}", block_id, e);
                }
                self.blocks.remove(&block_id);
            }
        }
    }

    pub fn kind(&self, id: &BlockId) -> Option<BlockKind> {
        self.blocks.get(id).map(Block::kind)
    }

    pub fn children_of(&self, id: &BlockId) -> &[BlockId] {
        self.blocks.get(id).map(Block::children).unwrap_or(&[])
    }

    pub fn parent_of(&self, id: &BlockId) -> Option<&BlockId> {
        self.blocks.get(id).and_then(Block::parent)
    }

    /// Parent chain from the direct parent up to the root
    pub fn ancestors(&self, id: &BlockId) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(p) = current {
            out.push(p.clone());
            current = self.parent_of(p);
        }
        out
    }

    /// Whether the block is reachable from the root
    pub fn is_attached(&self, id: &BlockId) -> bool {
        *id == self.root || self.ancestors(id).last() == Some(&self.root)
    }

    /// Track container holding `id` (itself if it is one)
    pub fn track_of(&self, id: &BlockId) -> Option<BlockId> {
        if self.kind(id).map_or(false, |k| k.is_track()) {
            return Some(id.clone());
        }
        self.ancestors(id)
            .into_iter()
            .find(|a| self.kind(a).map_or(false, |k| k.is_track()))
    }

    /// `id` and all its descendants, pre-order
    pub fn subtree(&self, id: &BlockId) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            stack.extend(self.children_of(&current).iter().rev().cloned());
            out.push(current);
        }
        out
    }

    //#endregion Ids and arena

    //#region Ranges and text

    pub fn start(&self, id: &BlockId) -> Timing {
        let Some(block) = self.blocks.get(id) else {
            return Timing::INVALID;
        };
        match &block.data {
            BlockData::Annotation(r) | BlockData::Comment(r) => r.start,
            BlockData::Call(c) => c.start,
            BlockData::Lyrics(l) => match l.children.first() {
                Some(first) => self.start(first),
                None => {
                    log::warn!("No children for lyrics block {}", id);
                    Timing::INVALID
                }
            },
            BlockData::SingAlong(s) => s.lyric.get().map_or(Timing::INVALID, |l| self.start(l)),
            BlockData::LyricsTrack(_) | BlockData::CallsTrack(_) | BlockData::CommentTrack(_) => {
                Timing::ZERO
            }
            BlockData::Tracks { .. } => Timing::INVALID,
        }
    }

    pub fn end(&self, id: &BlockId) -> Timing {
        let Some(block) = self.blocks.get(id) else {
            return Timing::INVALID;
        };
        match &block.data {
            BlockData::Annotation(r) | BlockData::Comment(r) => r.end,
            BlockData::Call(c) => c.end,
            BlockData::Lyrics(l) => match l.children.last() {
                Some(last) => self.end(last),
                None => {
                    log::warn!("No children for lyrics block {}", id);
                    Timing::INVALID
                }
            },
            BlockData::SingAlong(s) => s.lyric.get().map_or(Timing::INVALID, |l| self.end(l)),
            BlockData::LyricsTrack(_) | BlockData::CallsTrack(_) | BlockData::CommentTrack(_) => {
                Timing::INFINITY
            }
            BlockData::Tracks { .. } => Timing::INVALID,
        }
    }

    pub fn range(&self, id: &BlockId) -> (Timing, Timing) {
        (self.start(id), self.end(id))
    }

    /// Primary text of a block: the stored text for leaves, the reading for
    /// lyrics, the group text for calls, the effective text for sing-alongs
    pub fn text(&self, id: &BlockId) -> String {
        let Some(block) = self.blocks.get(id) else {
            return String::new();
        };
        match &block.data {
            BlockData::Annotation(r) | BlockData::Comment(r) => r.text.clone(),
            BlockData::Lyrics(l) => l.text.clone(),
            BlockData::Call(_) => self.call_text(id),
            BlockData::SingAlong(s) => {
                if s.text.is_empty() {
                    s.lyric.get().map(|l| self.bottom_text(l)).unwrap_or_default()
                } else {
                    s.text.clone()
                }
            }
            BlockData::LyricsTrack(t) | BlockData::CallsTrack(t) | BlockData::CommentTrack(t) => {
                t.name.clone()
            }
            BlockData::Tracks { .. } => String::new(),
        }
    }

    /// A lyric is simple when it has no reading and exactly one annotation
    pub fn is_simple(&self, id: &BlockId) -> bool {
        self.blocks
            .get(id)
            .and_then(Block::lyrics)
            .map_or(false, |l| l.text.is_empty() && l.children.len() == 1)
    }

    /// Main line text: the lone annotation of a simple lyric, else `text`
    pub fn bottom_text(&self, id: &BlockId) -> String {
        if self.is_simple(id) {
            return self
                .children_of(id)
                .first()
                .map(|a| self.text(a))
                .unwrap_or_default();
        }
        self.text(id)
    }

    /// Furigana line: annotation texts joined by the separator
    pub fn top_text(&self, id: &BlockId) -> String {
        if self.kind(id) != Some(BlockKind::Lyrics) || self.is_simple(id) {
            return String::new();
        }
        self.children_of(id)
            .iter()
            .map(|a| self.text(a))
            .collect::<Vec<_>>()
            .join(&LYRICS_SEP.to_string())
    }

    /// Sing-along text that shadows its lyric (empty when following it)
    pub fn sing_along_override(&self, id: &BlockId) -> Option<&str> {
        self.blocks
            .get(id)
            .and_then(Block::sing_along)
            .map(|s| s.text.as_str())
    }

    //#endregion Ranges and text

    //#region Child lists

    /// Position of `child` in `parent`: linear scan for small parents,
    /// bisection by start otherwise
    pub fn index_of(&self, parent: &BlockId, child: &BlockId) -> Option<usize> {
        let children = self.children_of(parent);
        let time_ordered = self.kind(parent).map_or(false, |k| k.is_time_ordered());
        if children.len() <= SMALL_DS_THRESHOLD || !time_ordered {
            return children.iter().position(|c| c == child);
        }
        let start = self.start(child);
        let idx = children.partition_point(|c| self.start(c) < start);
        if children.get(idx) == Some(child) {
            return Some(idx);
        }
        // Zero-length or unresolved neighbours can share a start
        children.iter().position(|c| c == child)
    }

    /// Remove `delete` children at `index` and insert `insert` in their place.
    /// Returns the removed ids, now detached.
    pub(crate) fn splice(
        &mut self,
        parent: &BlockId,
        index: usize,
        delete: usize,
        insert: Vec<BlockId>,
    ) -> Result<Vec<BlockId>> {
        let parent_kind = self.expect_block(parent)?.kind();
        for id in &insert {
            let kind = self.expect_block(id)?.kind();
            if !parent_kind.accepts_child(kind) {
                return Err(EditorError::invalid_state(format!(
                    "{:?} {} cannot own {:?} {}",
                    parent_kind, parent, kind, id
                )));
            }
        }

        let children = self
            .block_mut(parent)?
            .children_mut()
            .ok_or_else(|| EditorError::invalid_state(format!("Block {} has no children", parent)))?;
        if index > children.len() || index + delete > children.len() {
            return Err(EditorError::invalid_state(format!(
                "Splice {}+{} out of bounds for {} ({} children)",
                index,
                delete,
                parent,
                children.len()
            )));
        }
        let removed: Vec<BlockId> = children
            .splice(index..index + delete, insert.iter().cloned())
            .collect();

        for id in &removed {
            self.block_mut(id)?.set_parent(None);
        }
        for id in &insert {
            self.block_mut(id)?.set_parent(Some(parent.clone()));
        }
        Ok(removed)
    }

    /// Swap the whole child list, returning the previous one
    pub(crate) fn replace_children(
        &mut self,
        parent: &BlockId,
        children: Vec<BlockId>,
    ) -> Result<Vec<BlockId>> {
        let len = self.children_of(parent).len();
        self.splice(parent, 0, len, children)
    }

    //#endregion Child lists

    //#region References and groups

    pub fn refs(&self) -> &RefRegistry {
        &self.refs
    }

    /// Lyric a sing-along follows
    pub fn sing_along_lyric(&self, id: &BlockId) -> Option<&BlockId> {
        self.blocks
            .get(id)
            .and_then(Block::sing_along)
            .and_then(|s| s.lyric.get())
    }

    /// Point `container`'s back-reference at `target`, keeping the registry
    /// in sync. Returns the previous target.
    pub fn set_back_ref(
        &mut self,
        container: &BlockId,
        target: Option<BlockId>,
    ) -> Result<Option<BlockId>> {
        let sing_along = self
            .block_mut(container)?
            .sing_along_mut()
            .ok_or_else(|| {
                EditorError::invalid_state(format!("Block {} holds no reference", container))
            })?;
        let previous = sing_along.lyric.replace(target.clone());
        if let Some(old) = &previous {
            self.refs.unregister(old, container);
        }
        if let Some(new) = &target {
            if self.refs.get(new).contains(container) {
                log::warn!("Duplicate reference {} -> {}", container, new);
            } else {
                self.refs.register(new, container);
            }
        }
        Ok(previous)
    }

    pub fn call_groups(&self) -> &UnionFind<BlockId, String> {
        &self.call_groups
    }

    pub(crate) fn call_groups_mut(&mut self) -> &mut UnionFind<BlockId, String> {
        &mut self.call_groups
    }

    /// Canonical text of a call's repeat group
    pub fn call_text(&self, id: &BlockId) -> String {
        self.call_groups.value(id).cloned().unwrap_or_default()
    }

    pub fn repeat_count(&self, id: &BlockId) -> usize {
        self.call_groups.group_size(id)
    }

    pub fn is_repeated(&self, id: &BlockId) -> bool {
        self.repeat_count(id) > 1
    }

    /// Members of a call's repeat group, sorted by start
    pub fn group_members(&self, id: &BlockId) -> Vec<BlockId> {
        let mut members = self.call_groups.members(id);
        members.sort_by(|a, b| self.start(a).cmp(&self.start(b)));
        members
    }

    //#endregion References and groups

    //#region Document stores

    pub fn tags(&self) -> &TagsStore {
        &self.tags
    }

    pub(crate) fn replace_tag_list(&mut self, tags: Vec<LyricTag>) -> Vec<LyricTag> {
        self.tags.replace(tags)
    }

    /// Tags of a lyric resolved against the store; unknown ids are skipped
    pub fn tags_of(&self, id: &BlockId) -> Vec<&LyricTag> {
        self.blocks
            .get(id)
            .and_then(Block::lyrics)
            .map(|l| l.tags.iter().filter_map(|t| self.tags.get(t)).collect())
            .unwrap_or_default()
    }

    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    pub fn set_meta(&mut self, meta: Metadata) {
        self.meta = meta;
    }

    pub fn tempo(&self) -> &TempoMap {
        &self.tempo
    }

    pub fn set_tempo(&mut self, tempo: TempoMap) {
        self.tempo = tempo;
    }

    /// Latest end any resize may produce
    pub fn max_end(&self) -> Timing {
        self.max_end
    }

    pub fn set_max_end(&mut self, max_end: Timing) {
        self.max_end = max_end;
    }

    //#endregion Document stores

    //#region Transactions

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn in_transaction(&self) -> bool {
        self.txn_depth > 0
    }

    pub fn add_listener(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }

    /// Run `f` as one mutation scope. Nested scopes join the outermost one;
    /// the revision moves and listeners fire once, when it closes.
    pub fn transaction<R>(&mut self, f: impl FnOnce(&mut Document) -> R) -> R {
        self.txn_depth += 1;
        let result = f(self);
        self.txn_depth -= 1;
        if self.txn_depth == 0 {
            self.revision += 1;
            let revision = self.revision;
            for listener in self.listeners.iter_mut() {
                listener(revision);
            }
        }
        result
    }

    //#endregion Transactions
}
