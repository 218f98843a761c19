//! Editing operations
//!
//! Each function inspects the current document and returns the `Command`
//! performing one user-level edit. Nothing here mutates the tree; new blocks
//! are created detached and only attached when the command runs.

use std::collections::BTreeMap;

use crate::error::{EditorError, Result};
use crate::models::block::{BlockId, BlockKind};
use crate::models::tags::LyricTag;
use crate::models::timing::Timing;
use crate::structure::document::Document;
use crate::structure::resize::{insert_cmd, resize_child_cmd, resize_cmd};
use crate::undo::{Command, DeferredAction, FieldValue, TagEdit};

//#region Ranges

/// Move one or both boundaries of a block
pub fn resize_block_cmd(
    doc: &Document,
    block: &BlockId,
    align_div: i64,
    allow_expand: bool,
    start: Option<Timing>,
    end: Option<Timing>,
) -> Result<Command> {
    Ok(resize_cmd(doc, block, align_div, allow_expand, start, end, true)?.cmd)
}

//#endregion Ranges

//#region Insertion

/// Attach freshly created blocks that must not overlap existing ones
fn insert_sparse_cmd(doc: &Document, parent: &BlockId, items: &[BlockId]) -> Result<Command> {
    let (Some(first), Some(last)) = (items.first(), items.last()) else {
        return Err(EditorError::user("No blocks to insert"));
    };
    let (start, end) = (doc.start(first), doc.end(last));
    if end > doc.max_end() {
        return Err(EditorError::user(format!(
            "Inserted blocks would end after the document end ({})",
            doc.max_end()
        )));
    }
    let children = doc.children_of(parent);
    let idx = children.partition_point(|c| doc.end(c) <= start);
    if let Some(next) = children.get(idx) {
        if doc.start(next) < end {
            return Err(EditorError::user(format!("Inserted blocks overlap with {}", next)));
        }
    }
    Ok(Command::add_children(parent.clone(), idx, items.to_vec()))
}

/// Drop `created` again when the edit that would attach them is refused
fn discard_on_err(doc: &mut Document, created: &[BlockId], cmd: Result<Command>) -> Result<Command> {
    if cmd.is_err() {
        doc.discard_detached(created);
    }
    cmd
}

fn expect_track(doc: &Document, track: &BlockId, kind: BlockKind) -> Result<()> {
    match doc.kind(track) {
        Some(k) if k == kind => Ok(()),
        other => Err(EditorError::value(format!(
            "Block {} is {:?}, expected {:?}",
            track, other, kind
        ))),
    }
}

/// Insert lyrics parsed from editor text at `start`
pub fn insert_lyrics_cmd(
    doc: &mut Document,
    track: &BlockId,
    text: &str,
    start: Timing,
    align_div: i64,
    separator: char,
) -> Result<Command> {
    expect_track(doc, track, BlockKind::LyricsTrack)?;
    let lyrics = doc.lyrics_from_text(text, start, align_div, separator)?;
    if lyrics.is_empty() {
        return Ok(Command::Noop);
    }
    let cmd = insert_cmd(doc, track, align_div, &lyrics);
    discard_on_err(doc, &lyrics, cmd)
}

/// Insert one call per text, one grid unit each
pub fn insert_calls_cmd(
    doc: &mut Document,
    track: &BlockId,
    texts: &[&str],
    start: Timing,
    align_div: i64,
) -> Result<Command> {
    expect_track(doc, track, BlockKind::CallsTrack)?;
    let mut at = start.lower_bound(align_div);
    let mut calls = Vec::with_capacity(texts.len());
    for text in texts {
        let next = at.upper_bound(align_div);
        calls.push(doc.create_call(text, at, next));
        at = next;
    }
    if calls.is_empty() {
        return Ok(Command::Noop);
    }
    let cmd = insert_cmd(doc, track, align_div, &calls);
    discard_on_err(doc, &calls, cmd)
}

/// Copy of `call` at `start`, joined to its repeat group
pub fn replicate_call_cmd(doc: &mut Document, call: &BlockId, start: Timing) -> Result<Command> {
    let track = doc
        .parent_of(call)
        .cloned()
        .ok_or_else(|| EditorError::value(format!("Call {} is not attached", call)))?;
    let replica = doc.call_replica(call, start)?;
    let cmd = insert_sparse_cmd(doc, &track, &[replica.clone()]);
    let insert = discard_on_err(doc, &[replica.clone()], cmd)?;
    Ok(Command::batch([
        insert,
        Command::deferred(DeferredAction::MergeGroups {
            lhs: call.clone(),
            rhs: replica,
        }),
    ]))
}

/// Sing-along cue following `lyric`, placed on a calls track
pub fn add_sing_along_cmd(doc: &mut Document, track: &BlockId, lyric: &BlockId) -> Result<Command> {
    expect_track(doc, track, BlockKind::CallsTrack)?;
    if !doc.is_attached(lyric) {
        return Err(EditorError::value(format!("Lyric {} is not attached", lyric)));
    }
    let sing_along = doc.create_sing_along(Some(lyric.clone()), "")?;
    let cmd = insert_sparse_cmd(doc, track, &[sing_along.clone()]);
    discard_on_err(doc, &[sing_along], cmd)
}

pub fn insert_comment_cmd(
    doc: &mut Document,
    track: &BlockId,
    text: &str,
    start: Timing,
    end: Timing,
) -> Result<Command> {
    expect_track(doc, track, BlockKind::CommentTrack)?;
    if end <= start {
        return Err(EditorError::value(format!("Empty comment range {} to {}", start, end)));
    }
    let comment = doc.create_comment(text, start, end);
    let cmd = insert_sparse_cmd(doc, track, &[comment.clone()]);
    discard_on_err(doc, &[comment], cmd)
}

/// Append a new empty track of `kind` to the track list
pub fn add_track_cmd(doc: &mut Document, kind: BlockKind, name: &str) -> Result<Command> {
    let track = match kind {
        BlockKind::LyricsTrack => doc.create_lyrics_track(name),
        BlockKind::CallsTrack => doc.create_calls_track(name),
        BlockKind::CommentTrack => doc.create_comment_track(name),
        other => return Err(EditorError::value(format!("{:?} is not a track kind", other))),
    };
    let root = doc.root_id().clone();
    let at = doc.tracks().len();
    Ok(Command::add_children(root, at, vec![track]))
}

//#endregion Insertion

//#region Removal and merging

/// Remove `blocks` from wherever they sit.
///
/// Inside a lyric the remaining annotations stay contiguous: the annotation
/// left of an interior gap is extended over it. Removing every annotation of
/// a lyric is refused; remove the lyric instead.
pub fn remove_blocks_cmd(doc: &Document, blocks: &[BlockId]) -> Result<Command> {
    let mut by_parent: BTreeMap<BlockId, Vec<usize>> = BTreeMap::new();
    for block in blocks {
        let parent = doc
            .parent_of(block)
            .ok_or_else(|| EditorError::value(format!("Block {} is not attached", block)))?;
        let idx = doc.index_of(parent, block).ok_or_else(|| {
            EditorError::invalid_state(format!("Block {} missing from parent {}", block, parent))
        })?;
        by_parent.entry(parent.clone()).or_default().push(idx);
    }

    let mut cmd = Command::Noop;
    for (parent, mut indices) in by_parent {
        indices.sort_unstable();
        indices.dedup();
        let children = doc.children_of(&parent);
        if doc.kind(&parent) == Some(BlockKind::Lyrics) {
            if indices.len() == children.len() {
                return Err(EditorError::user(format!(
                    "Cannot remove every annotation of {}",
                    parent
                )));
            }
            for run in runs(&indices) {
                let (first, last) = (run[0], run[run.len() - 1]);
                if first > 0 && last + 1 < children.len() {
                    cmd.add(Command::set_end(children[first - 1].clone(), doc.end(&children[last])));
                }
            }
        }
        for idx in indices {
            cmd.add(Command::remove_block(parent.clone(), children[idx].clone()));
        }
    }
    Ok(cmd)
}

/// Consecutive runs of sorted indices
fn runs(indices: &[usize]) -> Vec<&[usize]> {
    let mut out = Vec::new();
    let mut begin = 0;
    for i in 1..=indices.len() {
        if i == indices.len() || indices[i] != indices[i - 1] + 1 {
            out.push(&indices[begin..i]);
            begin = i;
        }
    }
    out
}

/// Merge consecutive siblings into one block
pub fn merge_blocks_cmd(doc: &Document, blocks: &[BlockId]) -> Result<Command> {
    if blocks.len() < 2 {
        return Err(EditorError::user("Select at least two blocks to merge"));
    }
    let parent = doc
        .parent_of(&blocks[0])
        .cloned()
        .ok_or_else(|| EditorError::value(format!("Block {} is not attached", blocks[0])))?;
    let mut indices = Vec::with_capacity(blocks.len());
    for block in blocks {
        if doc.parent_of(block) != Some(&parent) {
            return Err(EditorError::user("Merged blocks must share a parent"));
        }
        indices.push(doc.index_of(&parent, block).ok_or_else(|| {
            EditorError::invalid_state(format!("Block {} missing from parent {}", block, parent))
        })?);
    }
    indices.sort_unstable();
    indices.dedup();
    if runs(&indices).len() != 1 {
        return Err(EditorError::user("Merged blocks must be adjacent"));
    }
    Ok(Command::merge_children(parent, indices[0], indices.len()))
}

//#endregion Removal and merging

//#region Text and layout

/// Set the primary text; for a simple lyric that is its lone annotation
pub fn set_text_cmd(doc: &Document, block: &BlockId, text: &str) -> Result<Command> {
    let kind = doc.expect_block(block)?.kind();
    let target = if kind == BlockKind::Lyrics && doc.is_simple(block) {
        doc.children_of(block)[0].clone()
    } else {
        block.clone()
    };
    match kind {
        BlockKind::Tracks => Err(EditorError::value("The track list has no text")),
        BlockKind::SingAlong => Ok(Command::set_text(target, text)),
        _ if doc.text(&target) == text => Ok(Command::Noop),
        _ => Ok(Command::set_text(target, text)),
    }
}

/// Give a lyric a reading and re-split its annotations from `top_text`
/// (annotation texts joined by `separator`)
pub fn set_lyric_reading_cmd(
    doc: &mut Document,
    lyric: &BlockId,
    reading: &str,
    top_text: &str,
    align_div: i64,
    separator: char,
) -> Result<Command> {
    if doc.kind(lyric) != Some(BlockKind::Lyrics) {
        return Err(EditorError::value(format!("{} is not a lyrics block", lyric)));
    }
    let start = doc.start(lyric);
    let annotations = doc.annotations_from_separated_text(top_text, start, align_div, separator);
    if annotations.is_empty() {
        return Err(EditorError::user(format!("No annotations in '{}'", top_text)));
    }
    let cmd = replace_children_cmd(doc, lyric, annotations.clone(), align_div);
    let replace = discard_on_err(doc, &annotations, cmd)?;
    Ok(Command::batch([Command::set_text(lyric.clone(), reading), replace]))
}

/// Turn a lyric into a simple one: no reading, one annotation spanning it
pub fn set_simple_lyric_cmd(doc: &mut Document, lyric: &BlockId, align_div: i64) -> Result<Command> {
    if doc.kind(lyric) != Some(BlockKind::Lyrics) {
        return Err(EditorError::value(format!("{} is not a lyrics block", lyric)));
    }
    if doc.is_simple(lyric) {
        return Ok(Command::Noop);
    }
    let text = doc.bottom_text(lyric);
    let (start, end) = doc.range(lyric);
    let annotation = doc.create_annotation(&text, start, end);
    let cmd = replace_children_cmd(doc, lyric, vec![annotation.clone()], align_div);
    let replace = discard_on_err(doc, &[annotation], cmd)?;
    Ok(Command::batch([Command::set_text(lyric.clone(), ""), replace]))
}

/// Swap a parent's children, resizing the parent within its own parent to
/// the span of the new children
pub fn replace_children_cmd(
    doc: &Document,
    parent: &BlockId,
    children: Vec<BlockId>,
    align_div: i64,
) -> Result<Command> {
    let (Some(first), Some(last)) = (children.first(), children.last()) else {
        return Err(EditorError::user(format!("Block {} needs at least one child", parent)));
    };
    let (start, end) = (doc.start(first), doc.end(last));
    let resize = match doc.parent_of(parent) {
        Some(grandparent) if doc.range(parent) != (start, end) => {
            resize_child_cmd(doc, grandparent, parent, align_div, true, start, end, true)?
        }
        _ => Command::Noop,
    };
    Ok(Command::replace_children(parent.clone(), children, resize))
}

fn spacing_target(doc: &Document, block: &BlockId) -> Result<BlockId> {
    match doc.kind(block) {
        Some(BlockKind::SingAlong) => doc
            .sing_along_lyric(block)
            .cloned()
            .ok_or_else(|| EditorError::user(format!("Sing-along {} follows no lyric", block))),
        Some(BlockKind::Lyrics | BlockKind::Call) => Ok(block.clone()),
        other => Err(EditorError::value(format!("{:?} block {} has no layout flags", other, block))),
    }
}

/// Sing-alongs forward to the lyric they follow
pub fn set_newline_cmd(doc: &Document, block: &BlockId, newline: bool) -> Result<Command> {
    let target = spacing_target(doc, block)?;
    match doc.expect_block(&target)?.spacing() {
        Some((current, _)) if current == newline => Ok(Command::Noop),
        _ => Ok(Command::set_field(target, FieldValue::Newline(newline))),
    }
}

pub fn set_space_cmd(doc: &Document, block: &BlockId, space: bool) -> Result<Command> {
    let target = spacing_target(doc, block)?;
    match doc.expect_block(&target)?.spacing() {
        Some((_, current)) if current == space => Ok(Command::Noop),
        _ => Ok(Command::set_field(target, FieldValue::Space(space))),
    }
}

//#endregion Text and layout

//#region Calls and references

fn expect_calls(doc: &Document, calls: &[BlockId]) -> Result<()> {
    match calls.iter().find(|c| doc.kind(c) != Some(BlockKind::Call)) {
        Some(other) => Err(EditorError::value(format!("{} is not a call block", other))),
        None => Ok(()),
    }
}

/// Put all `calls` into one repeat group. The largest group's text wins;
/// between equal sizes the earlier call's group does.
pub fn group_calls_cmd(doc: &Document, calls: &[BlockId]) -> Result<Command> {
    expect_calls(doc, calls)?;
    let Some((first, rest)) = calls.split_first() else {
        return Ok(Command::Noop);
    };
    let groups = doc.call_groups();
    let mut cmd = Command::Noop;
    for call in rest {
        if groups.find(call) != groups.find(first) {
            cmd.add(Command::deferred(DeferredAction::MergeGroups {
                lhs: first.clone(),
                rhs: call.clone(),
            }));
        }
    }
    Ok(cmd)
}

/// Take each call out of its repeat group
pub fn ungroup_calls_cmd(doc: &Document, calls: &[BlockId]) -> Result<Command> {
    expect_calls(doc, calls)?;
    Ok(Command::batch(
        calls
            .iter()
            .filter(|c| doc.is_repeated(c))
            .map(|c| Command::deferred(DeferredAction::IsolateCall(c.clone()))),
    ))
}

/// Point a sing-along at another lyric (or at nothing)
pub fn set_sing_along_ref_cmd(doc: &Document, sing_along: &BlockId, lyric: Option<BlockId>) -> Result<Command> {
    if doc.kind(sing_along) != Some(BlockKind::SingAlong) {
        return Err(EditorError::value(format!("{} is not a sing-along block", sing_along)));
    }
    if let Some(target) = &lyric {
        if doc.kind(target) != Some(BlockKind::Lyrics) {
            return Err(EditorError::value(format!("{} is not a lyrics block", target)));
        }
    }
    if doc.sing_along_lyric(sing_along) == lyric.as_ref() {
        return Ok(Command::Noop);
    }
    Ok(Command::deferred(DeferredAction::SetRef {
        container: sing_along.clone(),
        target: lyric,
    }))
}

//#endregion Calls and references

//#region Tags and tracks

fn tag_cmd(doc: &Document, lyrics: &[BlockId], edit: impl Fn() -> TagEdit) -> Result<Command> {
    if let Some(other) = lyrics.iter().find(|b| doc.kind(b) != Some(BlockKind::Lyrics)) {
        return Err(EditorError::value(format!("{} is not a lyrics block", other)));
    }
    Ok(Command::batch(lyrics.iter().map(|b| Command::set_tags(b.clone(), edit()))))
}

pub fn add_tags_cmd(doc: &Document, lyrics: &[BlockId], tags: &[String]) -> Result<Command> {
    tag_cmd(doc, lyrics, || TagEdit::Add(tags.to_vec()))
}

pub fn remove_tags_cmd(doc: &Document, lyrics: &[BlockId], tags: &[String]) -> Result<Command> {
    tag_cmd(doc, lyrics, || TagEdit::Remove(tags.to_vec()))
}

pub fn replace_tags_cmd(doc: &Document, lyrics: &[BlockId], tags: &[String]) -> Result<Command> {
    tag_cmd(doc, lyrics, || TagEdit::Replace(tags.to_vec()))
}

/// Replace the document tag list. Lyric tag ids no longer in the list are
/// ignored when resolving, so they come back if the tag is restored.
pub fn replace_tags_store_cmd(tags: Vec<LyricTag>) -> Command {
    Command::replace_tags_store(tags)
}

fn expect_any_track(doc: &Document, track: &BlockId) -> Result<()> {
    match doc.kind(track) {
        Some(k) if k.is_track() => Ok(()),
        _ => Err(EditorError::value(format!("{} is not a track", track))),
    }
}

pub fn set_track_name_cmd(doc: &Document, track: &BlockId, name: &str) -> Result<Command> {
    expect_any_track(doc, track)?;
    Ok(Command::set_text(track.clone(), name))
}

pub fn set_track_muted_cmd(doc: &Document, track: &BlockId, muted: bool) -> Result<Command> {
    expect_any_track(doc, track)?;
    Ok(Command::set_field(track.clone(), FieldValue::Muted(muted)))
}

pub fn set_track_volume_cmd(doc: &Document, track: &BlockId, volume: f64) -> Result<Command> {
    expect_any_track(doc, track)?;
    if !volume.is_finite() || volume < 0.0 {
        return Err(EditorError::value(format!("Invalid volume {}", volume)));
    }
    Ok(Command::set_field(track.clone(), FieldValue::SeVolume(volume)))
}

//#endregion Tags and tracks

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LYRICS_SEP;

    fn t(beat: i64) -> Timing {
        Timing::new(0, beat, 4)
    }

    fn run(doc: &mut Document, mut cmd: Command) -> Command {
        cmd.execute(doc).unwrap();
        cmd
    }

    fn lyric_with(doc: &mut Document, texts: &[&str]) -> (BlockId, Vec<BlockId>) {
        let track = doc.tracks()[0].clone();
        let annotations: Vec<BlockId> = texts
            .iter()
            .enumerate()
            .map(|(i, s)| doc.create_annotation(s, t(i as i64), t(i as i64 + 1)))
            .collect();
        let lyric = doc.create_lyric("x", annotations.clone()).unwrap();
        let cmd = insert_cmd(doc, &track, 4, &[lyric.clone()]).unwrap();
        run(doc, cmd);
        (lyric, annotations)
    }

    #[test]
    fn test_remove_interior_annotation_extends_left() {
        let mut doc = Document::with_default_tracks();
        let (lyric, anns) = lyric_with(&mut doc, &["a", "b", "c"]);
        let cmd = remove_blocks_cmd(&doc, &[anns[1].clone()]).unwrap();
        let mut cmd = run(&mut doc, cmd);
        assert_eq!(doc.children_of(&lyric), &[anns[0].clone(), anns[2].clone()]);
        assert_eq!(doc.end(&anns[0]), doc.start(&anns[2]));

        cmd.undo(&mut doc).unwrap();
        assert_eq!(doc.children_of(&lyric).len(), 3);
        assert_eq!(doc.end(&anns[0]), t(1));
    }

    #[test]
    fn test_remove_all_annotations_is_refused() {
        let mut doc = Document::with_default_tracks();
        let (_, anns) = lyric_with(&mut doc, &["a", "b"]);
        assert!(matches!(remove_blocks_cmd(&doc, &anns), Err(EditorError::User(_))));
    }

    #[test]
    fn test_runs() {
        assert_eq!(runs(&[0, 1, 3, 5, 6]), vec![&[0, 1][..], &[3][..], &[5, 6][..]]);
        assert!(runs(&[]).is_empty());
    }

    #[test]
    fn test_merge_requires_adjacent_siblings() {
        let mut doc = Document::with_default_tracks();
        let (_, anns) = lyric_with(&mut doc, &["a", "b", "c"]);
        assert!(matches!(
            merge_blocks_cmd(&doc, &[anns[0].clone(), anns[2].clone()]),
            Err(EditorError::User(_))
        ));
        let cmd = merge_blocks_cmd(&doc, &[anns[1].clone(), anns[0].clone()]).unwrap();
        assert!(matches!(cmd, Command::MergeChildren { index: 0, count: 2, .. }));
    }

    #[test]
    fn test_insert_lyrics_from_text() {
        let mut doc = Document::with_default_tracks();
        let track = doc.tracks()[0].clone();
        let cmd = insert_lyrics_cmd(&mut doc, &track, "君:きみ|が", t(0), 4, LYRICS_SEP).unwrap();
        run(&mut doc, cmd);
        let lyrics = doc.children_of(&track).to_vec();
        assert_eq!(lyrics.len(), 2);
        assert_eq!(doc.text(&lyrics[0]), "君");
        assert_eq!(doc.top_text(&lyrics[0]), "き|み");
        assert_eq!(doc.bottom_text(&lyrics[1]), "が");
    }

    #[test]
    fn test_set_simple_lyric() {
        let mut doc = Document::with_default_tracks();
        let (lyric, _) = lyric_with(&mut doc, &["き", "み"]);
        let cmd = set_simple_lyric_cmd(&mut doc, &lyric, 4).unwrap();
        let mut cmd = run(&mut doc, cmd);
        assert!(doc.is_simple(&lyric));
        assert_eq!(doc.bottom_text(&lyric), "x");
        assert_eq!(doc.range(&lyric), (t(0), t(2)));
        cmd.undo(&mut doc).unwrap();
        assert_eq!(doc.children_of(&lyric).len(), 2);
        assert_eq!(doc.text(&lyric), "x");
    }

    #[test]
    fn test_set_text_on_simple_lyric_edits_annotation() {
        let mut doc = Document::with_default_tracks();
        let track = doc.tracks()[0].clone();
        let lyric = doc.create_simple_lyric("a", t(0), t(1)).unwrap();
        let built = insert_cmd(&doc, &track, 4, &[lyric.clone()]).unwrap();
        run(&mut doc, built);
        let built = set_text_cmd(&doc, &lyric, "b").unwrap();
        run(&mut doc, built);
        assert!(doc.is_simple(&lyric));
        assert_eq!(doc.bottom_text(&lyric), "b");
        assert!(set_text_cmd(&doc, &lyric, "b").unwrap().is_noop());
    }

    #[test]
    fn test_sing_along_newline_forwards_to_lyric() {
        let mut doc = Document::with_default_tracks();
        let calls = doc.tracks()[1].clone();
        let (lyric, _) = lyric_with(&mut doc, &["a"]);
        let cmd = add_sing_along_cmd(&mut doc, &calls, &lyric).unwrap();
        run(&mut doc, cmd);
        let sing_along = doc.children_of(&calls)[0].clone();
        let built = set_newline_cmd(&doc, &sing_along, true).unwrap();
        run(&mut doc, built);
        assert_eq!(doc.expect_block(&lyric).unwrap().spacing(), Some((true, false)));
    }

    #[test]
    fn test_group_and_ungroup_calls() {
        let mut doc = Document::with_default_tracks();
        let calls_track = doc.tracks()[1].clone();
        let cmd = insert_calls_cmd(&mut doc, &calls_track, &["Hi", "Fu", "Oi"], t(0), 4).unwrap();
        run(&mut doc, cmd);
        let calls = doc.children_of(&calls_track).to_vec();

        let built = group_calls_cmd(&doc, &calls).unwrap();
        let mut group = run(&mut doc, built);
        assert_eq!(doc.repeat_count(&calls[2]), 3);
        assert_eq!(doc.call_text(&calls[1]), "Hi");
        assert!(group_calls_cmd(&doc, &calls).unwrap().is_noop());

        let built = ungroup_calls_cmd(&doc, &calls[1..2]).unwrap();
        let mut ungroup = run(&mut doc, built);
        assert_eq!(doc.repeat_count(&calls[0]), 2);
        assert!(!doc.is_repeated(&calls[1]));

        ungroup.undo(&mut doc).unwrap();
        group.undo(&mut doc).unwrap();
        assert!(calls.iter().all(|c| !doc.is_repeated(c)));
        assert_eq!(doc.call_text(&calls[2]), "Oi");
    }

    #[test]
    fn test_replicate_call_joins_group() {
        let mut doc = Document::with_default_tracks();
        let calls_track = doc.tracks()[1].clone();
        let built = insert_calls_cmd(&mut doc, &calls_track, &["Hi"], t(0), 4).unwrap();
        run(&mut doc, built);
        let call = doc.children_of(&calls_track)[0].clone();
        let cmd = replicate_call_cmd(&mut doc, &call, t(8)).unwrap();
        run(&mut doc, cmd);
        let replica = doc.children_of(&calls_track)[1].clone();
        assert_eq!(doc.range(&replica), (t(8), t(9)));
        assert_eq!(doc.group_members(&call), vec![call.clone(), replica]);
    }

    #[test]
    fn test_comment_overlap_is_user_error() {
        let mut doc = Document::with_default_tracks();
        let comments = doc.tracks()[2].clone();
        let built = insert_comment_cmd(&mut doc, &comments, "intro", t(0), t(4)).unwrap();
        run(&mut doc, built);
        assert!(matches!(
            insert_comment_cmd(&mut doc, &comments, "x", t(2), t(6)),
            Err(EditorError::User(_))
        ));
        assert!(insert_comment_cmd(&mut doc, &comments, "y", t(4), t(6)).is_ok());
    }

    #[test]
    fn test_track_settings() {
        let mut doc = Document::with_default_tracks();
        let track = doc.tracks()[1].clone();
        let built = Command::batch([
            set_track_muted_cmd(&doc, &track, true).unwrap(),
            set_track_volume_cmd(&doc, &track, 0.5).unwrap(),
            set_track_name_cmd(&doc, &track, "Audience").unwrap(),
        ]);
        let mut cmd = run(&mut doc, built);
        let data = doc.expect_block(&track).unwrap().track().unwrap().clone();
        assert!(data.muted);
        assert_eq!(data.se_volume, 0.5);
        assert_eq!(data.name, "Audience");
        cmd.undo(&mut doc).unwrap();
        assert!(!doc.expect_block(&track).unwrap().track().unwrap().muted);
        assert!(set_track_volume_cmd(&doc, &track, f64::NAN).is_err());
    }

    #[test]
    fn test_add_track() {
        let mut doc = Document::with_default_tracks();
        let cmd = add_track_cmd(&mut doc, BlockKind::CommentTrack, "Notes").unwrap();
        run(&mut doc, cmd);
        assert_eq!(doc.tracks().len(), 4);
        assert!(add_track_cmd(&mut doc, BlockKind::Call, "x").is_err());
    }
}
