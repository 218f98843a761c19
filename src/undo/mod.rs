//! Reversible editing commands
//!
//! A `Command` is built against the current document state and then
//! executed and undone in place. Commands that can only learn their inverse
//! by running (union-find merges, reference nulling, cascades) store it on
//! execute and consume it on undo, so `execute(); undo(); execute()` always
//! reproduces the same state.

pub mod live_edit;
pub mod manager;

pub use live_edit::{LiveEdit, LiveEditState};
pub use manager::{CommandManager, LockToken};

use crate::error::{EditorError, Result};
use crate::models::block::{BlockData, BlockId, BlockKind};
use crate::models::tags::LyricTag;
use crate::models::timing::Timing;
use crate::navigation::is_sing_along_valid;
use crate::refs::back_ref::{delete_target_cmd, removal_cmd};
use crate::refs::UfUndo;
use crate::structure::document::Document;

/// Scalar field written by `Command::SetField`
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Start(Timing),
    End(Timing),
    Newline(bool),
    Space(bool),
    Muted(bool),
    SeVolume(f64),
}

/// Which children a `RemoveChildren` takes out
#[derive(Clone, Debug, PartialEq)]
pub enum RemoveTarget {
    Index { index: usize, count: usize },
    /// Looked up when executed; missing blocks make the command a no-op
    Block(BlockId),
}

#[derive(Clone, Debug, PartialEq)]
pub enum TagEdit {
    Add(Vec<String>),
    Remove(Vec<String>),
    Replace(Vec<String>),
}

/// Mutations whose inverse is only known after running them
#[derive(Clone, Debug, PartialEq)]
pub enum DeferredAction {
    /// Join the repeat groups of two calls
    MergeGroups { lhs: BlockId, rhs: BlockId },
    /// Take a call out of its repeat group
    IsolateCall(BlockId),
    /// Null every reference to `target`
    NullRefs { target: BlockId },
    SetRef {
        container: BlockId,
        target: Option<BlockId>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeferredUndo {
    Group(UfUndo<BlockId, String>),
    Ref {
        container: BlockId,
        target: Option<BlockId>,
    },
}

/// Represents a reversible edit command
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Noop,
    /// Executed in order, undone in reverse
    Batch { commands: Vec<Command> },
    AddChildren {
        parent: BlockId,
        index: usize,
        blocks: Vec<BlockId>,
    },
    RemoveChildren {
        parent: BlockId,
        target: RemoveTarget,
        /// Filled on execute
        removed: Vec<BlockId>,
        index: Option<usize>,
        cascade: Box<Command>,
    },
    /// Replace `count` siblings with one block merged from copies of them
    MergeChildren {
        parent: BlockId,
        index: usize,
        count: usize,
        /// Built on first execute and reused on redo
        merged: Option<BlockId>,
        previous: Vec<BlockId>,
        cascade: Box<Command>,
    },
    ReplaceChildren {
        parent: BlockId,
        children: Vec<BlockId>,
        previous: Vec<BlockId>,
        /// Resize of `parent` within its own parent, run first
        resize: Box<Command>,
        /// Sing-alongs that no longer fit the new range
        cascade: Box<Command>,
    },
    SetField {
        block: BlockId,
        value: FieldValue,
        previous: Option<FieldValue>,
        cascade: Box<Command>,
    },
    SetTags {
        block: BlockId,
        edit: TagEdit,
        previous: Option<Vec<String>>,
    },
    ReplaceTagsStore {
        tags: Vec<LyricTag>,
        previous: Option<Vec<LyricTag>>,
    },
    Deferred {
        action: DeferredAction,
        inverse: Vec<DeferredUndo>,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Noop
    }
}

impl Command {
    //#region Constructors

    /// Composite command; nested batches are flattened and no-ops dropped
    pub fn batch(commands: impl IntoIterator<Item = Command>) -> Command {
        let mut out = Vec::new();
        for command in commands {
            push_flat(&mut out, command);
        }
        Command::Batch { commands: out }
    }

    /// Append to this command, turning it into a batch if needed
    pub fn add(&mut self, command: Command) {
        if command.is_noop() {
            return;
        }
        match self {
            Command::Batch { commands } => push_flat(commands, command),
            Command::Noop => *self = Command::batch([command]),
            _ => {
                let first = std::mem::take(self);
                *self = Command::batch([first, command]);
            }
        }
    }

    pub fn add_children(parent: BlockId, index: usize, blocks: Vec<BlockId>) -> Command {
        if blocks.is_empty() {
            return Command::Noop;
        }
        Command::AddChildren {
            parent,
            index,
            blocks,
        }
    }

    pub fn remove_block(parent: BlockId, block: BlockId) -> Command {
        Command::RemoveChildren {
            parent,
            target: RemoveTarget::Block(block),
            removed: Vec::new(),
            index: None,
            cascade: Box::default(),
        }
    }

    pub fn remove_children(parent: BlockId, index: usize, count: usize) -> Command {
        if count == 0 {
            return Command::Noop;
        }
        Command::RemoveChildren {
            parent,
            target: RemoveTarget::Index { index, count },
            removed: Vec::new(),
            index: None,
            cascade: Box::default(),
        }
    }

    pub fn merge_children(parent: BlockId, index: usize, count: usize) -> Command {
        if count < 2 {
            return Command::Noop;
        }
        Command::MergeChildren {
            parent,
            index,
            count,
            merged: None,
            previous: Vec::new(),
            cascade: Box::default(),
        }
    }

    pub fn replace_children(parent: BlockId, children: Vec<BlockId>, resize: Command) -> Command {
        Command::ReplaceChildren {
            parent,
            children,
            previous: Vec::new(),
            resize: Box::new(resize),
            cascade: Box::default(),
        }
    }

    pub fn set_field(block: BlockId, value: FieldValue) -> Command {
        Command::SetField {
            block,
            value,
            previous: None,
            cascade: Box::default(),
        }
    }

    pub fn set_start(block: BlockId, start: Timing) -> Command {
        Command::set_field(block, FieldValue::Start(start))
    }

    pub fn set_end(block: BlockId, end: Timing) -> Command {
        Command::set_field(block, FieldValue::End(end))
    }

    pub fn set_text(block: BlockId, text: impl Into<String>) -> Command {
        Command::set_field(block, FieldValue::Text(text.into()))
    }

    pub fn set_tags(block: BlockId, edit: TagEdit) -> Command {
        Command::SetTags {
            block,
            edit,
            previous: None,
        }
    }

    pub fn replace_tags_store(tags: Vec<LyricTag>) -> Command {
        Command::ReplaceTagsStore {
            tags,
            previous: None,
        }
    }

    pub fn deferred(action: DeferredAction) -> Command {
        Command::Deferred {
            action,
            inverse: Vec::new(),
        }
    }

    //#endregion Constructors

    pub fn is_noop(&self) -> bool {
        match self {
            Command::Noop => true,
            Command::Batch { commands } => commands.is_empty(),
            _ => false,
        }
    }

    /// Number of primitive commands (batches counted by their contents)
    pub fn len(&self) -> usize {
        match self {
            Command::Noop => 0,
            Command::Batch { commands } => commands.iter().map(Command::len).sum(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Execute this command on the document.
    ///
    /// A failing batch undoes the sub-commands it already applied before
    /// returning the error.
    pub fn execute(&mut self, doc: &mut Document) -> Result<()> {
        match self {
            Command::Noop => Ok(()),
            Command::Batch { commands } => {
                for i in 0..commands.len() {
                    if let Err(e) = commands[i].execute(doc) {
                        for applied in commands[..i].iter_mut().rev() {
                            if let Err(undo_err) = applied.undo(doc) {
                                log::error!("Rollback failed after '{}': {}", e, undo_err);
                            }
                        }
                        return Err(e);
                    }
                }
                Ok(())
            }
            Command::AddChildren {
                parent,
                index,
                blocks,
            } => {
                doc.splice(parent, *index, 0, blocks.clone())?;
                Ok(())
            }
            Command::RemoveChildren {
                parent,
                target,
                removed,
                index,
                cascade,
            } => {
                let (at, count) = match target {
                    RemoveTarget::Index { index, count } => (*index, *count),
                    RemoveTarget::Block(id) => match doc.index_of(parent, id) {
                        Some(i) => (i, 1),
                        None => {
                            log::warn!("Block {} is not a child of {}", id, parent);
                            *index = None;
                            return Ok(());
                        }
                    },
                };
                let out = doc.splice(parent, at, count, Vec::new())?;
                let mut follow_up = removal_cascade(doc, &out);
                if let Err(e) = follow_up.execute(doc) {
                    doc.splice(parent, at, 0, out)?;
                    return Err(e);
                }
                *removed = out;
                *index = Some(at);
                **cascade = follow_up;
                Ok(())
            }
            Command::MergeChildren {
                parent,
                index,
                count,
                merged,
                previous,
                cascade,
            } => {
                let siblings = doc
                    .children_of(parent)
                    .get(*index..*index + *count)
                    .map(<[BlockId]>::to_vec)
                    .ok_or_else(|| {
                        EditorError::invalid_state(format!(
                            "Merge range {}+{} out of bounds for {}",
                            index, count, parent
                        ))
                    })?;
                let fresh = merged.is_none();
                let block = match merged {
                    Some(block) => block.clone(),
                    None => {
                        let block = merge_copies(doc, &siblings)?;
                        *merged = Some(block.clone());
                        block
                    }
                };
                let out = match doc.splice(parent, *index, *count, vec![block.clone()]) {
                    Ok(out) => out,
                    Err(e) => {
                        if fresh {
                            doc.discard_detached(&[block]);
                            *merged = None;
                        }
                        return Err(e);
                    }
                };
                let mut follow_up = removal_cascade(doc, &out);
                if let Err(e) = follow_up.execute(doc) {
                    doc.splice(parent, *index, 1, out)?;
                    if fresh {
                        doc.discard_detached(&[block]);
                        *merged = None;
                    }
                    return Err(e);
                }
                *previous = out;
                **cascade = follow_up;
                Ok(())
            }
            Command::ReplaceChildren {
                parent,
                children,
                previous,
                resize,
                cascade,
            } => {
                resize.execute(doc)?;
                let old = match doc.replace_children(parent, children.clone()) {
                    Ok(old) => old,
                    Err(e) => {
                        resize.undo(doc)?;
                        return Err(e);
                    }
                };
                let mut follow_up = match invalid_dependents_cmd(doc, parent) {
                    Ok(cmd) => cmd,
                    Err(e) => {
                        doc.replace_children(parent, old)?;
                        resize.undo(doc)?;
                        return Err(e);
                    }
                };
                if let Err(e) = follow_up.execute(doc) {
                    doc.replace_children(parent, old)?;
                    resize.undo(doc)?;
                    return Err(e);
                }
                *previous = old;
                **cascade = follow_up;
                Ok(())
            }
            Command::SetField {
                block,
                value,
                previous,
                cascade,
            } => {
                let old = write_field(doc, block, value)?;
                if matches!(value, FieldValue::Start(_) | FieldValue::End(_)) {
                    let mut follow_up = invalid_dependents_cmd(doc, block)?;
                    if let Err(e) = follow_up.execute(doc) {
                        write_field(doc, block, &old)?;
                        return Err(e);
                    }
                    **cascade = follow_up;
                }
                *previous = Some(old);
                Ok(())
            }
            Command::SetTags {
                block,
                edit,
                previous,
            } => {
                let current = lyric_tags(doc, block)?;
                let next = match edit {
                    TagEdit::Add(ids) => {
                        let mut next = current.clone();
                        for id in doc.tags().filter_known(ids) {
                            if !next.contains(&id) {
                                next.push(id);
                            }
                        }
                        next
                    }
                    TagEdit::Remove(ids) => current.iter().filter(|t| !ids.contains(t)).cloned().collect(),
                    TagEdit::Replace(ids) => doc.tags().filter_known(ids),
                };
                write_lyric_tags(doc, block, next)?;
                *previous = Some(current);
                Ok(())
            }
            Command::ReplaceTagsStore { tags, previous } => {
                *previous = Some(doc.replace_tag_list(tags.clone()));
                Ok(())
            }
            Command::Deferred { action, inverse } => {
                *inverse = run_deferred(doc, action)?;
                Ok(())
            }
        }
    }

    /// Undo this command (reverse the operation)
    pub fn undo(&mut self, doc: &mut Document) -> Result<()> {
        match self {
            Command::Noop => Ok(()),
            Command::Batch { commands } => {
                for command in commands.iter_mut().rev() {
                    command.undo(doc)?;
                }
                Ok(())
            }
            Command::AddChildren {
                parent,
                index,
                blocks,
            } => {
                doc.splice(parent, *index, blocks.len(), Vec::new())?;
                Ok(())
            }
            Command::RemoveChildren {
                parent,
                removed,
                index,
                cascade,
                ..
            } => {
                let Some(at) = index.take() else {
                    return Ok(());
                };
                cascade.undo(doc)?;
                doc.splice(parent, at, 0, removed.clone())?;
                Ok(())
            }
            Command::MergeChildren {
                parent,
                index,
                previous,
                cascade,
                ..
            } => {
                cascade.undo(doc)?;
                doc.splice(parent, *index, 1, previous.clone())?;
                Ok(())
            }
            Command::ReplaceChildren {
                parent,
                previous,
                resize,
                cascade,
                ..
            } => {
                cascade.undo(doc)?;
                **cascade = Command::Noop;
                doc.replace_children(parent, previous.clone())?;
                resize.undo(doc)
            }
            Command::SetField {
                block,
                previous,
                cascade,
                ..
            } => {
                cascade.undo(doc)?;
                **cascade = Command::Noop;
                match previous.take() {
                    Some(old) => write_field(doc, block, &old).map(|_| ()),
                    None => Ok(()),
                }
            }
            Command::SetTags {
                block, previous, ..
            } => match previous.take() {
                Some(old) => write_lyric_tags(doc, block, old),
                None => Ok(()),
            },
            Command::ReplaceTagsStore { previous, .. } => {
                if let Some(old) = previous.take() {
                    doc.replace_tag_list(old);
                }
                Ok(())
            }
            Command::Deferred { inverse, .. } => {
                for step in inverse.drain(..).rev() {
                    match step {
                        DeferredUndo::Group(undo) => {
                            doc.call_groups_mut().apply(&undo)?;
                        }
                        DeferredUndo::Ref { container, target } => {
                            doc.set_back_ref(&container, target)?;
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

fn push_flat(out: &mut Vec<Command>, command: Command) {
    match command {
        Command::Noop => {}
        Command::Batch { commands } => {
            for c in commands {
                push_flat(out, c);
            }
        }
        other => out.push(other),
    }
}

/// Follow-up for blocks leaving the tree: every reference into the removed
/// subtrees is deleted and removed calls leave their repeat groups
fn removal_cascade(doc: &Document, removed: &[BlockId]) -> Command {
    let mut cascade = Command::Noop;
    for root in removed {
        for id in doc.subtree(root) {
            cascade.add(delete_target_cmd(doc, &id));
            if doc.kind(&id) == Some(BlockKind::Call) && doc.is_repeated(&id) {
                cascade.add(Command::deferred(DeferredAction::IsolateCall(id)));
            }
        }
    }
    cascade
}

/// Removal commands for sing-alongs that follow `block` (or one of its
/// ancestors) and would now overlap a foreign block
fn invalid_dependents_cmd(doc: &Document, block: &BlockId) -> Result<Command> {
    let mut cascade = Command::Noop;
    let mut targets = vec![block.clone()];
    targets.extend(doc.ancestors(block));
    for target in &targets {
        for container in doc.refs().get(target) {
            if doc.kind(container) != Some(BlockKind::SingAlong) || doc.parent_of(container).is_none() {
                continue;
            }
            let (start, end) = doc.range(container);
            if !is_sing_along_valid(doc, container, start, end)? {
                log::debug!("Sing-along {} no longer fits after resizing {}", container, block);
                cascade.add(removal_cmd(doc, container));
            }
        }
    }
    Ok(cascade)
}

/// Write one field, returning the value it replaced
fn write_field(doc: &mut Document, id: &BlockId, value: &FieldValue) -> Result<FieldValue> {
    let kind = doc.expect_block(id)?.kind();
    let unsupported = || {
        EditorError::invalid_state(format!("{:?} block {} has no field {:?}", kind, id, value))
    };

    match value {
        FieldValue::Text(text) => match kind {
            BlockKind::Call => {
                let root = doc.call_groups().find(id);
                match doc.call_groups_mut().set_own_value(&root, text.clone())? {
                    UfUndo::SetValue { value, .. } => Ok(FieldValue::Text(value)),
                    _ => Err(unsupported()),
                }
            }
            BlockKind::SingAlong => {
                let follows = doc
                    .sing_along_lyric(id)
                    .map(|lyric| doc.bottom_text(lyric))
                    .map_or(false, |lyric_text| lyric_text == *text);
                let stored = if follows { String::new() } else { text.clone() };
                let sing_along = doc.block_mut(id)?.sing_along_mut().ok_or_else(unsupported)?;
                Ok(FieldValue::Text(std::mem::replace(&mut sing_along.text, stored)))
            }
            _ => {
                let block = doc.block_mut(id)?;
                let slot = match &mut block.data {
                    BlockData::Annotation(r) | BlockData::Comment(r) => &mut r.text,
                    BlockData::Lyrics(l) => &mut l.text,
                    BlockData::LyricsTrack(t) | BlockData::CallsTrack(t) | BlockData::CommentTrack(t) => {
                        &mut t.name
                    }
                    _ => return Err(unsupported()),
                };
                Ok(FieldValue::Text(std::mem::replace(slot, text.clone())))
            }
        },
        FieldValue::Start(start) => {
            let (old, _) = doc.expect_block(id)?.own_range().ok_or_else(unsupported)?;
            doc.block_mut(id)?.set_own_start(*start);
            Ok(FieldValue::Start(old))
        }
        FieldValue::End(end) => {
            let (_, old) = doc.expect_block(id)?.own_range().ok_or_else(unsupported)?;
            doc.block_mut(id)?.set_own_end(*end);
            Ok(FieldValue::End(old))
        }
        FieldValue::Newline(flag) => {
            let (newline, _) = doc.block_mut(id)?.spacing_mut().ok_or_else(unsupported)?;
            Ok(FieldValue::Newline(std::mem::replace(newline, *flag)))
        }
        FieldValue::Space(flag) => {
            let (_, space) = doc.block_mut(id)?.spacing_mut().ok_or_else(unsupported)?;
            Ok(FieldValue::Space(std::mem::replace(space, *flag)))
        }
        FieldValue::Muted(flag) => {
            let track = doc.block_mut(id)?.track_mut().ok_or_else(unsupported)?;
            Ok(FieldValue::Muted(std::mem::replace(&mut track.muted, *flag)))
        }
        FieldValue::SeVolume(volume) => {
            let track = doc.block_mut(id)?.track_mut().ok_or_else(unsupported)?;
            Ok(FieldValue::SeVolume(std::mem::replace(&mut track.se_volume, *volume)))
        }
    }
}

fn lyric_tags(doc: &Document, id: &BlockId) -> Result<Vec<String>> {
    doc.expect_block(id)?
        .lyrics()
        .map(|l| l.tags.clone())
        .ok_or_else(|| EditorError::invalid_state(format!("Block {} has no tags", id)))
}

fn write_lyric_tags(doc: &mut Document, id: &BlockId, tags: Vec<String>) -> Result<()> {
    let lyrics = doc
        .block_mut(id)?
        .lyrics_mut()
        .ok_or_else(|| EditorError::invalid_state(format!("Block {} has no tags", id)))?;
    lyrics.tags = tags;
    Ok(())
}

fn run_deferred(doc: &mut Document, action: &DeferredAction) -> Result<Vec<DeferredUndo>> {
    match action {
        DeferredAction::MergeGroups { lhs, rhs } => {
            let undo = doc.call_groups_mut().merge(lhs, rhs)?;
            Ok(vec![DeferredUndo::Group(undo)])
        }
        DeferredAction::IsolateCall(id) => Ok(doc
            .call_groups_mut()
            .isolate(id)?
            .into_iter()
            .map(DeferredUndo::Group)
            .collect()),
        DeferredAction::NullRefs { target } => {
            let containers = doc.refs().get(target).to_vec();
            let mut inverse = Vec::with_capacity(containers.len());
            for container in containers {
                let previous = doc.set_back_ref(&container, None)?;
                inverse.push(DeferredUndo::Ref {
                    container,
                    target: previous,
                });
            }
            Ok(inverse)
        }
        DeferredAction::SetRef { container, target } => {
            let previous = doc.set_back_ref(container, target.clone())?;
            Ok(vec![DeferredUndo::Ref {
                container: container.clone(),
                target: previous,
            }])
        }
    }
}

/// Build the merged block from copies of `siblings`, left to right
fn merge_copies(doc: &mut Document, siblings: &[BlockId]) -> Result<BlockId> {
    let kind = doc.expect_block(&siblings[0])?.kind();
    if !kind.is_mergeable() || siblings.iter().any(|s| doc.kind(s) != Some(kind)) {
        return Err(EditorError::user(format!("Cannot merge {:?} blocks", kind)));
    }
    let merged = doc.deep_copy(&siblings[0])?;
    if let Err(e) = merge_rest(doc, kind, &merged, &siblings[1..]) {
        doc.discard_detached(&[merged]);
        return Err(e);
    }
    Ok(merged)
}

/// Fold copies of `rest` into `merged`; each consumed copy is dropped
fn merge_rest(doc: &mut Document, kind: BlockKind, merged: &BlockId, rest: &[BlockId]) -> Result<()> {
    for sibling in rest {
        let right = doc.deep_copy(sibling)?;
        let folded = match kind {
            BlockKind::Annotation => merge_annotation_right(doc, merged, &right),
            _ => merge_lyric_right(doc, merged, &right),
        };
        doc.discard_detached(&[right]);
        folded?;
    }
    Ok(())
}

fn merge_annotation_right(doc: &mut Document, left: &BlockId, right: &BlockId) -> Result<()> {
    let text = doc.text(right);
    let end = doc.end(right);
    let block = doc.block_mut(left)?;
    if let BlockData::Annotation(r) = &mut block.data {
        r.text.push_str(&text);
        r.end = end;
    }
    Ok(())
}

/// Append `right` (a detached copy) onto `left`, closing any gap between them
fn merge_lyric_right(doc: &mut Document, left: &BlockId, right: &BlockId) -> Result<()> {
    let gap_start = doc.end(left);
    let right_start = doc.start(right);
    if let Some(last) = doc.children_of(left).last().cloned() {
        if gap_start < right_start {
            doc.block_mut(&last)?.set_own_end(right_start);
        }
    }

    let (right_newline, right_space) = doc.expect_block(right)?.spacing().unwrap_or_default();
    let right_tags = lyric_tags(doc, right)?;

    if doc.is_simple(left) && doc.is_simple(right) {
        let into = doc.children_of(left)[0].clone();
        let from = doc.children_of(right)[0].clone();
        merge_annotation_right(doc, &into, &from)?;
    } else {
        let text = doc.bottom_text(left) + &doc.bottom_text(right);
        let moved = doc.replace_children(right, Vec::new())?;
        let at = doc.children_of(left).len();
        doc.splice(left, at, 0, moved)?;
        if let Some(lyrics) = doc.block_mut(left)?.lyrics_mut() {
            lyrics.text = text;
        }
    }

    if let Some(lyrics) = doc.block_mut(left)?.lyrics_mut() {
        lyrics.newline = right_newline;
        lyrics.space = right_space;
        for tag in right_tags {
            if !lyrics.tags.contains(&tag) {
                lyrics.tags.push(tag);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lyrics track holding simple lyrics "a" [0:0/4,0:1/4) and "b" [0:1/4,0:2/4)
    fn lyrics_doc() -> (Document, BlockId, Vec<BlockId>) {
        let mut doc = Document::with_default_tracks();
        let track = doc.tracks()[0].clone();
        let a = doc.create_simple_lyric("a", Timing::new(0, 0, 4), Timing::new(0, 1, 4)).unwrap();
        let b = doc.create_simple_lyric("b", Timing::new(0, 1, 4), Timing::new(0, 2, 4)).unwrap();
        let mut add = Command::add_children(track.clone(), 0, vec![a.clone(), b.clone()]);
        add.execute(&mut doc).unwrap();
        (doc, track, vec![a, b])
    }

    #[test]
    fn test_batch_flattens_and_drops_noops() {
        let id = BlockId::new("bl-0");
        let inner = Command::batch([Command::Noop, Command::set_text(id.clone(), "x")]);
        let cmd = Command::batch([inner, Command::Noop, Command::batch([]), Command::set_text(id, "y")]);
        match &cmd {
            Command::Batch { commands } => {
                assert_eq!(commands.len(), 2);
                assert!(commands.iter().all(|c| matches!(c, Command::SetField { .. })));
            }
            other => panic!("expected batch, got {:?}", other),
        }
        assert!(Command::batch([Command::Noop]).is_noop());
    }

    #[test]
    fn test_add_turns_single_command_into_batch() {
        let mut cmd = Command::set_text(BlockId::new("bl-0"), "x");
        cmd.add(Command::Noop);
        assert!(matches!(cmd, Command::SetField { .. }));
        cmd.add(Command::set_text(BlockId::new("bl-1"), "y"));
        assert_eq!(cmd.len(), 2);
    }

    #[test]
    fn test_set_text_execute_undo() {
        let (mut doc, _, lyrics) = lyrics_doc();
        let annotation = doc.children_of(&lyrics[0])[0].clone();
        let mut cmd = Command::set_text(annotation.clone(), "z");
        cmd.execute(&mut doc).unwrap();
        assert_eq!(doc.text(&annotation), "z");
        cmd.undo(&mut doc).unwrap();
        assert_eq!(doc.text(&annotation), "a");
        cmd.execute(&mut doc).unwrap();
        assert_eq!(doc.text(&annotation), "z");
    }

    #[test]
    fn test_failed_batch_rolls_back_applied_commands() {
        let (mut doc, track, lyrics) = lyrics_doc();
        let annotation = doc.children_of(&lyrics[0])[0].clone();
        let mut cmd = Command::batch([
            Command::set_text(annotation.clone(), "changed"),
            Command::remove_children(track, 5, 1),
        ]);
        assert!(matches!(cmd.execute(&mut doc), Err(EditorError::InvalidState(_))));
        assert_eq!(doc.text(&annotation), "a");
    }

    #[test]
    fn test_remove_missing_block_is_noop() {
        let (mut doc, track, _) = lyrics_doc();
        let stray = doc.create_simple_lyric("s", Timing::ZERO, Timing::new(0, 1, 4)).unwrap();
        let mut cmd = Command::remove_block(track.clone(), stray);
        cmd.execute(&mut doc).unwrap();
        cmd.undo(&mut doc).unwrap();
        assert_eq!(doc.children_of(&track).len(), 2);
    }

    #[test]
    fn test_merge_simple_lyrics_and_undo() {
        let (mut doc, track, lyrics) = lyrics_doc();
        let mut cmd = Command::merge_children(track.clone(), 0, 2);
        cmd.execute(&mut doc).unwrap();
        let merged = doc.children_of(&track)[0].clone();
        assert_eq!(doc.children_of(&track).len(), 1);
        assert!(doc.is_simple(&merged));
        assert_eq!(doc.bottom_text(&merged), "ab");
        assert_eq!(doc.range(&merged), (Timing::new(0, 0, 4), Timing::new(0, 2, 4)));

        cmd.undo(&mut doc).unwrap();
        assert_eq!(doc.children_of(&track), lyrics.as_slice());

        cmd.execute(&mut doc).unwrap();
        assert_eq!(doc.children_of(&track), &[merged]);
    }

    #[test]
    fn test_merge_keeps_only_the_merged_copy() {
        let (mut doc, track, _) = lyrics_doc();
        let before = doc.block_count();
        let mut cmd = Command::merge_children(track.clone(), 0, 2);
        cmd.execute(&mut doc).unwrap();
        // merged lyric plus its single annotation
        assert_eq!(doc.block_count(), before + 2);
        cmd.undo(&mut doc).unwrap();
        cmd.execute(&mut doc).unwrap();
        assert_eq!(doc.block_count(), before + 2);
    }

    #[test]
    fn test_merge_closes_gap_between_lyrics() {
        let mut doc = Document::with_default_tracks();
        let track = doc.tracks()[0].clone();
        let a = doc.create_simple_lyric("a", Timing::new(0, 0, 4), Timing::new(0, 1, 4)).unwrap();
        let ann1 = doc.create_annotation("き", Timing::new(0, 2, 4), Timing::new(0, 3, 4));
        let ann2 = doc.create_annotation("み", Timing::new(0, 3, 4), Timing::new(1, 0, 4));
        let b = doc.create_lyric("君", vec![ann1, ann2]).unwrap();
        Command::add_children(track.clone(), 0, vec![a, b]).execute(&mut doc).unwrap();

        let mut cmd = Command::merge_children(track.clone(), 0, 2);
        cmd.execute(&mut doc).unwrap();
        let merged = doc.children_of(&track)[0].clone();
        assert_eq!(doc.text(&merged), "a君");
        let children = doc.children_of(&merged).to_vec();
        assert_eq!(children.len(), 3);
        for pair in children.windows(2) {
            assert_eq!(doc.end(&pair[0]), doc.start(&pair[1]));
        }
    }

    #[test]
    fn test_merge_rejects_mixed_kinds() {
        let mut doc = Document::with_default_tracks();
        let calls = doc.tracks()[1].clone();
        let c1 = doc.create_call("Hi", Timing::ZERO, Timing::new(0, 1, 4));
        let c2 = doc.create_call("Hi", Timing::new(0, 1, 4), Timing::new(0, 2, 4));
        Command::add_children(calls.clone(), 0, vec![c1, c2]).execute(&mut doc).unwrap();
        let mut cmd = Command::merge_children(calls, 0, 2);
        assert!(matches!(cmd.execute(&mut doc), Err(EditorError::User(_))));
    }

    #[test]
    fn test_tags_filter_unknown_and_duplicates() {
        let (mut doc, _, lyrics) = lyrics_doc();
        let mut store = Command::replace_tags_store(vec![
            LyricTag::new("tag-1", "Ruri", Default::default()),
            LyricTag::new("tag-2", "Megu", Default::default()),
        ]);
        store.execute(&mut doc).unwrap();

        let mut add = Command::set_tags(
            lyrics[0].clone(),
            TagEdit::Add(vec!["tag-1".into(), "tag-1".into(), "tag-9".into()]),
        );
        add.execute(&mut doc).unwrap();
        let names: Vec<&str> = doc.tags_of(&lyrics[0]).iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Ruri"]);

        let mut remove = Command::set_tags(lyrics[0].clone(), TagEdit::Remove(vec!["tag-1".into()]));
        remove.execute(&mut doc).unwrap();
        assert!(doc.tags_of(&lyrics[0]).is_empty());
        remove.undo(&mut doc).unwrap();
        add.undo(&mut doc).unwrap();
        assert!(doc.tags_of(&lyrics[0]).is_empty());

        store.undo(&mut doc).unwrap();
        assert!(doc.tags().tags().is_empty());
    }

    #[test]
    fn test_deferred_group_merge_undo() {
        let mut doc = Document::new();
        let a = doc.create_call("Hi", Timing::ZERO, Timing::new(0, 1, 4));
        let b = doc.create_call("Fu", Timing::new(1, 0, 4), Timing::new(1, 1, 4));
        let mut cmd = Command::deferred(DeferredAction::MergeGroups {
            lhs: a.clone(),
            rhs: b.clone(),
        });
        cmd.execute(&mut doc).unwrap();
        assert!(doc.is_repeated(&a));
        assert_eq!(doc.call_text(&b), "Hi");
        cmd.undo(&mut doc).unwrap();
        assert!(!doc.is_repeated(&a) && !doc.is_repeated(&b));
        assert_eq!(doc.call_text(&b), "Fu");
    }

    #[test]
    fn test_call_text_writes_group_value() {
        let mut doc = Document::new();
        let a = doc.create_call("Hi", Timing::ZERO, Timing::new(0, 1, 4));
        let b = doc.create_call("Hi", Timing::new(1, 0, 4), Timing::new(1, 1, 4));
        doc.call_groups_mut().merge(&a, &b).unwrap();
        let mut cmd = Command::set_text(b.clone(), "Oi");
        cmd.execute(&mut doc).unwrap();
        assert_eq!(doc.call_text(&a), "Oi");
        cmd.undo(&mut doc).unwrap();
        assert_eq!(doc.call_text(&a), "Hi");
    }
}
