//! Cross-parent block cursor
//!
//! A cursor is a (parent, index) slot. Stepping past either end of a parent
//! continues into the neighbouring parent at the same depth, so the cursor
//! walks the leaves of a track in time order. It never leaves the track it
//! started in: ascending stops at the track container.

use crate::error::{EditorError, Result};
use crate::models::block::{BlockId, BlockKind};
use crate::models::timing::Timing;
use crate::structure::document::Document;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockCursor {
    parent: BlockId,
    idx: isize,
}

/// Blocks above which the cursor does not climb
fn is_boundary(doc: &Document, id: &BlockId) -> bool {
    match doc.kind(id) {
        Some(kind) => kind.is_track() || kind == BlockKind::Tracks,
        None => true,
    }
}

fn is_parent(doc: &Document, id: &BlockId) -> bool {
    doc.kind(id).map_or(false, |k| k.is_parent())
}

impl BlockCursor {
    pub fn new(parent: BlockId, idx: isize) -> Self {
        Self { parent, idx }
    }

    /// Cursor positioned on `block`
    pub fn from_block(doc: &Document, block: &BlockId) -> Result<Self> {
        let parent = doc
            .parent_of(block)
            .ok_or_else(|| EditorError::value(format!("Block {} has no parent", block)))?;
        let idx = doc.index_of(parent, block).ok_or_else(|| {
            EditorError::invalid_state(format!("Block {} is missing from parent {}", block, parent))
        })?;
        Ok(Self::new(parent.clone(), idx as isize))
    }

    /// Follow child indices down from `parent`. A negative index yields the
    /// before-begin cursor, an index past the end the after-end cursor.
    pub fn from_locator(doc: &Document, parent: &BlockId, loc: &[isize]) -> Result<Self> {
        if loc.is_empty() {
            return Err(EditorError::value("No locator provided"));
        }
        let mut current = parent.clone();
        for &idx in loc {
            if !is_parent(doc, &current) {
                return Err(EditorError::value(format!("Invalid parent block: {}", current)));
            }
            let children = doc.children_of(&current);
            if idx < 0 {
                return Ok(Self::rend(doc, parent));
            }
            match children.get(idx as usize) {
                Some(child) => current = child.clone(),
                None => return Ok(Self::end(doc, parent)),
            }
        }
        Self::from_block(doc, &current)
    }

    /// Before-begin slot of the first leaf parent under the boundary of `parent`
    pub fn rend(doc: &Document, parent: &BlockId) -> Self {
        let mut current = Self::scope_top(doc, parent);
        while let Some(first) = doc.children_of(&current).first() {
            if !is_parent(doc, first) {
                break;
            }
            current = first.clone();
        }
        Self::new(current, -1)
    }

    /// After-end slot of the last leaf parent under the boundary of `parent`
    pub fn end(doc: &Document, parent: &BlockId) -> Self {
        let mut current = Self::scope_top(doc, parent);
        while let Some(last) = doc.children_of(&current).last() {
            if !is_parent(doc, last) {
                break;
            }
            current = last.clone();
        }
        let len = doc.children_of(&current).len() as isize;
        Self::new(current, len)
    }

    fn scope_top(doc: &Document, parent: &BlockId) -> BlockId {
        let mut current = parent.clone();
        while !is_boundary(doc, &current) {
            match doc.parent_of(&current) {
                Some(p) => current = p.clone(),
                None => break,
            }
        }
        current
    }

    pub fn parent(&self) -> &BlockId {
        &self.parent
    }

    pub fn idx(&self) -> isize {
        self.idx
    }

    pub fn is_rend(&self) -> bool {
        self.idx < 0
    }

    pub fn is_end(&self, doc: &Document) -> bool {
        self.idx >= doc.children_of(&self.parent).len() as isize
    }

    pub fn block<'a>(&self, doc: &'a Document) -> Option<&'a BlockId> {
        if self.idx < 0 {
            return None;
        }
        doc.children_of(&self.parent).get(self.idx as usize)
    }

    /// Index path from the root down to the current slot
    pub fn locator(&self, doc: &Document) -> Result<Vec<isize>> {
        let mut path = vec![self.idx];
        let mut current = self.parent.clone();
        while let Some(parent) = doc.parent_of(&current) {
            let idx = doc.index_of(parent, &current).ok_or_else(|| {
                EditorError::invalid_state(format!("Invalid block: {}. Is it already removed?", current))
            })?;
            path.push(idx as isize);
            current = parent.clone();
        }
        path.reverse();
        Ok(path)
    }

    pub fn move_next(&mut self, doc: &Document) -> Result<&mut Self> {
        if self.is_end(doc) {
            return Ok(self);
        }
        self.idx += 1;
        if !self.is_end(doc) {
            return Ok(self);
        }

        // Climb while we are the last child
        let mut current = self.parent.clone();
        let owner = loop {
            if is_boundary(doc, &current) {
                return Ok(self);
            }
            let Some(owner) = doc.parent_of(&current).cloned() else {
                return Ok(self);
            };
            if doc.children_of(&owner).last() == Some(&current) {
                current = owner;
                continue;
            }
            break owner;
        };

        let idx = doc.index_of(&owner, &current).ok_or_else(|| {
            EditorError::invalid_state(format!("Invalid block: {}. Is it already removed?", current))
        })?;
        let Some(next) = doc.children_of(&owner).get(idx + 1).cloned() else {
            return Ok(self);
        };
        if !is_parent(doc, &next) {
            self.parent = owner;
            self.idx = idx as isize + 1;
            return Ok(self);
        }
        let mut descend = next;
        while let Some(first) = doc.children_of(&descend).first() {
            if !is_parent(doc, first) {
                break;
            }
            descend = first.clone();
        }
        self.parent = descend;
        self.idx = 0;
        Ok(self)
    }

    pub fn move_prev(&mut self, doc: &Document) -> Result<&mut Self> {
        if self.is_rend() {
            return Ok(self);
        }
        self.idx -= 1;
        if self.idx >= 0 {
            return Ok(self);
        }

        let mut current = self.parent.clone();
        let owner = loop {
            if is_boundary(doc, &current) {
                return Ok(self);
            }
            let Some(owner) = doc.parent_of(&current).cloned() else {
                return Ok(self);
            };
            if doc.children_of(&owner).first() == Some(&current) {
                current = owner;
                continue;
            }
            break owner;
        };

        let idx = doc.index_of(&owner, &current).ok_or_else(|| {
            EditorError::invalid_state(format!("Invalid block: {}. Is it already removed?", current))
        })?;
        let Some(prev) = idx.checked_sub(1).and_then(|i| doc.children_of(&owner).get(i)).cloned() else {
            return Ok(self);
        };
        if !is_parent(doc, &prev) {
            self.parent = owner;
            self.idx = idx as isize - 1;
            return Ok(self);
        }
        let mut descend = prev;
        while let Some(last) = doc.children_of(&descend).last() {
            if !is_parent(doc, last) {
                break;
            }
            descend = last.clone();
        }
        self.idx = doc.children_of(&descend).len() as isize - 1;
        self.parent = descend;
        Ok(self)
    }

    /// Iterate from the current slot (inclusive) in `direction`
    pub fn iter(self, doc: &Document, direction: Direction) -> BlockIter<'_> {
        BlockIter {
            doc,
            cursor: self,
            direction,
            first: true,
        }
    }
}

pub struct BlockIter<'a> {
    doc: &'a Document,
    cursor: BlockCursor,
    direction: Direction,
    first: bool,
}

impl<'a> Iterator for BlockIter<'a> {
    type Item = BlockId;

    fn next(&mut self) -> Option<BlockId> {
        if self.first {
            self.first = false;
        } else {
            let moved = match self.direction {
                Direction::Left => self.cursor.move_prev(self.doc).map(|_| ()),
                Direction::Right => self.cursor.move_next(self.doc).map(|_| ()),
            };
            if let Err(e) = moved {
                log::warn!("Cursor iteration stopped: {}", e);
                return None;
            }
        }
        if self.cursor.is_rend() || self.cursor.is_end(self.doc) {
            return None;
        }
        self.cursor.block(self.doc).cloned()
    }
}

/// Whether a sing-along spanning `[new_start, new_end)` would still only
/// touch sing-alongs of its own lyrics track on either side
pub fn is_sing_along_valid(
    doc: &Document,
    sing_along: &BlockId,
    new_start: Timing,
    new_end: Timing,
) -> Result<bool> {
    let own_track = doc
        .sing_along_lyric(sing_along)
        .and_then(|lyric| doc.track_of(lyric));
    let same_source = |other: &BlockId| {
        doc.kind(other) == Some(BlockKind::SingAlong)
            && doc
                .sing_along_lyric(other)
                .and_then(|lyric| doc.track_of(lyric))
                == own_track
    };

    let cursor = BlockCursor::from_block(doc, sing_along)?;
    let mut left = cursor.clone();
    if let Some(prev) = left.move_prev(doc)?.block(doc) {
        if doc.end(prev) > new_start && !same_source(prev) {
            return Ok(false);
        }
    }
    let mut right = cursor;
    if let Some(next) = right.move_next(doc)?.block(doc) {
        if doc.start(next) < new_end && !same_source(next) {
            return Ok(false);
        }
    }
    Ok(true)
}
