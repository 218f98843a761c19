//! Resize engine
//!
//! Builds (never executes) the command that moves a block boundary while
//! keeping siblings and ancestors consistent:
//!
//! - dense parents (lyrics) keep their annotations contiguous, so a moved
//!   boundary always drags the neighbouring annotation with it
//! - sparse parents (tracks) only touch neighbours that would overlap, and
//!   only when the caller allows expansion
//!
//! Every function reads the current, unmodified document. Derived blocks
//! that become invalid (sing-alongs) are left to the command layer.

use crate::error::{EditorError, Result};
use crate::models::block::{BlockId, BlockKind};
use crate::models::timing::Timing;
use crate::structure::document::Document;
use crate::undo::Command;

/// Achieved range of a resize plus the command that performs it
#[derive(Clone, Debug, PartialEq)]
pub struct ResizeAction {
    pub start: Timing,
    pub end: Timing,
    pub cmd: Command,
}

impl ResizeAction {
    pub fn noop(start: Timing, end: Timing) -> Self {
        Self {
            start,
            end,
            cmd: Command::Noop,
        }
    }
}

/// Resize `id` to `[start, end)`; `None` keeps the current boundary.
///
/// `allow_expand` lets the engine grow the block (or push neighbours) beyond
/// what was requested. With `notify_parent` the enclosing parent is asked
/// to make room first.
pub fn resize_cmd(
    doc: &Document,
    id: &BlockId,
    align_div: i64,
    allow_expand: bool,
    start: Option<Timing>,
    end: Option<Timing>,
    notify_parent: bool,
) -> Result<ResizeAction> {
    let kind = doc.expect_block(id)?.kind();
    match kind {
        BlockKind::Annotation | BlockKind::Call | BlockKind::Comment => {
            resize_leaf(doc, id, align_div, allow_expand, start, end, notify_parent)
        }
        BlockKind::Lyrics => resize_lyric(doc, id, align_div, allow_expand, start, end, notify_parent),
        BlockKind::SingAlong => Err(EditorError::user(format!(
            "Cannot resize sing-along block {}",
            id
        ))),
        BlockKind::LyricsTrack | BlockKind::CallsTrack | BlockKind::CommentTrack => {
            Ok(ResizeAction::noop(doc.start(id), doc.end(id)))
        }
        BlockKind::Tracks => Err(EditorError::user("Cannot resize the track list")),
    }
}

fn resize_leaf(
    doc: &Document,
    id: &BlockId,
    align_div: i64,
    allow_expand: bool,
    start: Option<Timing>,
    end: Option<Timing>,
    notify_parent: bool,
) -> Result<ResizeAction> {
    let (current_start, current_end) = doc.range(id);
    let start = start.unwrap_or(current_start);
    let mut end = end.unwrap_or(current_end);
    if !start.is_valid() || !end.is_valid() {
        return Err(EditorError::value(format!("Invalid range for block {}", id)));
    }

    let min_end = start.lower_bound(align_div).next();
    if end < min_end {
        if !allow_expand {
            return Err(EditorError::user(format!(
                "Block {} too short after resize: {} to {}",
                id, start, end
            )));
        }
        end = min_end;
    }
    if end > doc.max_end() {
        return Err(EditorError::user(format!(
            "Block {} would end after the document end ({})",
            id,
            doc.max_end()
        )));
    }
    if start == current_start && end == current_end {
        return Ok(ResizeAction::noop(start, end));
    }

    let mut cmd = Command::Noop;
    if notify_parent {
        if let Some(parent) = doc.parent_of(id) {
            cmd.add(resize_child_cmd(doc, parent, id, align_div, allow_expand, start, end, true)?);
        }
    }
    if start != current_start {
        cmd.add(Command::set_start(id.clone(), start));
    }
    if end != current_end {
        cmd.add(Command::set_end(id.clone(), end));
    }
    Ok(ResizeAction { start, end, cmd })
}

fn resize_lyric(
    doc: &Document,
    id: &BlockId,
    align_div: i64,
    allow_expand: bool,
    start: Option<Timing>,
    end: Option<Timing>,
    notify_parent: bool,
) -> Result<ResizeAction> {
    let children = doc.children_of(id);
    let (Some(first), Some(last)) = (children.first(), children.last()) else {
        return Err(EditorError::invalid_state(format!("Lyrics block {} has no annotations", id)));
    };
    let (current_start, current_end) = doc.range(id);
    let start = start.unwrap_or(current_start);
    let mut end = end.unwrap_or(current_end);

    let mut cmd = Command::Noop;
    let mut last_done = false;
    if start != current_start {
        // The first annotation takes the new start; later ones follow it
        let info = check_next(doc, id, -1, align_div, start, true)?;
        if info.end > end {
            if !allow_expand {
                return Err(EditorError::user(format!(
                    "Block {} is not allowed to expand after resize: {} to {}",
                    id, start, end
                )));
            }
            end = info.end;
            last_done = true;
        }
        cmd.add(info.cmd);
    }
    if end != current_end && !last_done {
        let last_start = if first == last { start } else { doc.start(last) };
        let info = resize_cmd(doc, last, align_div, allow_expand, Some(last_start), Some(end), false)?;
        end = info.end;
        cmd.add(info.cmd);
    }

    if cmd.is_noop() {
        return Ok(ResizeAction::noop(start, end));
    }
    if notify_parent {
        if let Some(parent) = doc.parent_of(id) {
            let room = resize_child_cmd(doc, parent, id, align_div, allow_expand, start, end, true)?;
            cmd = Command::batch([room, cmd]);
        }
    }
    Ok(ResizeAction { start, end, cmd })
}

/// React to `child` of `parent` moving to `[start, end)`: fit the
/// neighbours around it and, when the parent has to grow, ask the
/// grandparent for room.
#[allow(clippy::too_many_arguments)]
pub fn resize_child_cmd(
    doc: &Document,
    parent: &BlockId,
    child: &BlockId,
    align_div: i64,
    allow_expand: bool,
    start: Timing,
    end: Timing,
    notify_parent: bool,
) -> Result<Command> {
    if doc.kind(parent) == Some(BlockKind::Tracks) {
        return Ok(Command::Noop);
    }
    let idx = doc.index_of(parent, child).ok_or_else(|| {
        EditorError::invalid_state(format!("Block {} is not a child of {}", child, parent))
    })?;

    let left = check_prev(doc, parent, idx, align_div, allow_expand, start)?;
    let right = check_next(doc, parent, idx as isize, align_div, end, allow_expand)?;

    let (current_start, current_end) = doc.range(parent);
    let new_start = left.start.min(current_start);
    let new_end = right.end.max(current_end);

    let mut cmd = Command::Noop;
    if notify_parent && (new_start != current_start || new_end != current_end) {
        if let Some(grandparent) = doc.parent_of(parent) {
            cmd.add(resize_child_cmd(
                doc,
                grandparent,
                parent,
                align_div,
                allow_expand,
                new_start,
                new_end,
                true,
            )?);
        }
    }
    cmd.add(left.cmd);
    cmd.add(right.cmd);
    Ok(cmd)
}

/// Fit the child before `idx` to end at `next_start`
fn check_prev(
    doc: &Document,
    parent: &BlockId,
    idx: usize,
    align_div: i64,
    allow_expand: bool,
    next_start: Timing,
) -> Result<ResizeAction> {
    if idx == 0 {
        return Ok(ResizeAction::noop(next_start, Timing::INVALID));
    }
    let dense = is_dense(doc, parent);
    let prev = &doc.children_of(parent)[idx - 1];
    let (prev_start, prev_end) = doc.range(prev);
    if dense {
        if prev_end == next_start {
            return Ok(ResizeAction::noop(prev_start, prev_end));
        }
    } else {
        if prev_end <= next_start {
            return Ok(ResizeAction::noop(prev_start, prev_end));
        }
        if !allow_expand {
            return Err(EditorError::user(format!(
                "Resized block would overlap {} ({} to {})",
                prev, prev_start, prev_end
            )));
        }
    }
    resize_cmd(doc, prev, align_div, false, Some(prev_start), Some(next_start), false)
}

/// Push the children after `idx` so none starts before `prev_end` (for
/// dense parents: so the next one starts exactly there). Returns the end of
/// the last child touched.
fn check_next(
    doc: &Document,
    parent: &BlockId,
    idx: isize,
    align_div: i64,
    mut prev_end: Timing,
    allow_expand: bool,
) -> Result<ResizeAction> {
    let dense = is_dense(doc, parent);
    let mut cmd = Command::Noop;
    let skip = usize::try_from(idx + 1).unwrap_or(0);
    for child in doc.children_of(parent).iter().skip(skip) {
        let (child_start, child_end) = doc.range(child);
        if dense {
            if child_start == prev_end {
                break;
            }
        } else {
            if child_start >= prev_end {
                break;
            }
            if !allow_expand {
                return Err(EditorError::user(format!(
                    "Resized block would overlap {} ({} to {})",
                    child, child_start, child_end
                )));
            }
        }
        let info = resize_cmd(doc, child, align_div, true, Some(prev_end), Some(child_end), false)?;
        cmd.add(info.cmd);
        prev_end = info.end;
    }
    Ok(ResizeAction {
        start: Timing::INVALID,
        end: prev_end,
        cmd,
    })
}

/// Attach the detached, contiguous `items` to `parent` at their time
/// position, pushing later children out of the way
pub fn insert_cmd(doc: &Document, parent: &BlockId, align_div: i64, items: &[BlockId]) -> Result<Command> {
    let (Some(first), Some(last)) = (items.first(), items.last()) else {
        return Err(EditorError::user("No blocks to insert"));
    };
    let start = doc.start(first);
    let end = doc.end(last);
    let (parent_start, parent_end) = doc.range(parent);
    if start < parent_start {
        return Err(EditorError::value(format!(
            "Inserted blocks ({}) start before {} ({})",
            start, parent, parent_start
        )));
    }

    let children = doc.children_of(parent);
    let idx = children.partition_point(|c| doc.end(c) <= start);
    if let Some(child) = children.get(idx) {
        if doc.start(child) < start {
            return Err(EditorError::user(format!("Inserted blocks overlap with {}", child)));
        }
    }

    let right = check_next(doc, parent, idx as isize - 1, align_div, end, true)?;
    let new_end = right.end.max(parent_end);
    let mut cmd = Command::Noop;
    if new_end != parent_end {
        if let Some(grandparent) = doc.parent_of(parent) {
            cmd.add(resize_child_cmd(doc, grandparent, parent, align_div, true, parent_start, new_end, true)?);
        }
    }
    cmd.add(right.cmd);
    cmd.add(Command::add_children(parent.clone(), idx, items.to_vec()));
    log::debug!("Insert {} block(s) into {} at {}", items.len(), parent, idx);
    Ok(cmd)
}

fn is_dense(doc: &Document, parent: &BlockId) -> bool {
    doc.kind(parent).map_or(false, |k| k.is_dense())
}
