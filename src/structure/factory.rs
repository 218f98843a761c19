//! Block factories
//!
//! Every factory inserts a detached block into the arena and returns its id.
//! Nothing is attached to the tree here; that is the job of commands.

use crate::config::ANNO_INDIC;
use crate::error::{EditorError, Result};
use crate::models::block::{
    Block, BlockData, BlockId, BlockKind, CallData, LyricsData, RangeData, SingAlongData,
    TrackData,
};
use crate::models::timing::Timing;
use crate::structure::document::Document;
use crate::utils::text::split_words;

/// Preset call texts
pub const CALL_PRESETS: &[&str] = &["Hi", "Fu", "Fuwa", "👏", "U-", "O-"];

impl Document {
    fn add_detached(&mut self, data: BlockData) -> BlockId {
        let id = self.alloc_id();
        // The loader moves the counter past every persisted id
        if let Err(e) = self.insert_block(Block::new(id.clone(), data)) {
            log::error!("Id allocator produced a duplicate: {}", e);
        }
        id
    }

    //#region Tracks

    pub fn create_lyrics_track(&mut self, name: &str) -> BlockId {
        self.add_detached(BlockData::LyricsTrack(TrackData::new(name, true)))
    }

    pub fn create_calls_track(&mut self, name: &str) -> BlockId {
        self.add_detached(BlockData::CallsTrack(TrackData::new(name, false)))
    }

    pub fn create_comment_track(&mut self, name: &str) -> BlockId {
        self.add_detached(BlockData::CommentTrack(TrackData::new(name, true)))
    }

    /// Document with one track of each kind, attached directly (no history)
    pub fn with_default_tracks() -> Self {
        let mut doc = Document::new();
        let tracks = vec![
            doc.create_lyrics_track("Lyrics"),
            doc.create_calls_track("Calls"),
            doc.create_comment_track("Comments"),
        ];
        let root = doc.root_id().clone();
        if let Err(e) = doc.splice(&root, 0, 0, tracks) {
            log::error!("Failed to attach default tracks: {}", e);
        }
        doc
    }

    //#endregion Tracks

    //#region Lyrics

    pub fn create_annotation(&mut self, text: &str, start: Timing, end: Timing) -> BlockId {
        self.add_detached(BlockData::Annotation(RangeData {
            text: text.to_string(),
            start,
            end,
        }))
    }

    /// Lyric over `annotations` (which must be detached and contiguous)
    pub fn create_lyric(&mut self, text: &str, annotations: Vec<BlockId>) -> Result<BlockId> {
        if annotations.is_empty() {
            return Err(EditorError::data(format!(
                "Cannot create block {} with no annotations",
                text
            )));
        }
        let id = self.add_detached(BlockData::Lyrics(LyricsData {
            text: text.to_string(),
            ..LyricsData::default()
        }));
        self.replace_children(&id, annotations)?;
        Ok(id)
    }

    /// Lyric with no reading and a single annotation carrying `text`
    pub fn create_simple_lyric(&mut self, text: &str, start: Timing, end: Timing) -> Result<BlockId> {
        let annotation = self.create_annotation(text, start, end);
        self.create_lyric("", vec![annotation])
    }

    /// One annotation per word, one grid unit each; a `" "` word skips a unit.
    /// Line breaks count as a skipped unit.
    pub fn annotations_from_words(
        &mut self,
        words: &[String],
        start: Timing,
        align_div: i64,
    ) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut at = start.lower_bound(align_div);
        for word in words {
            if word == " " {
                at = at.upper_bound(align_div);
                continue;
            }
            let next = at.upper_bound(align_div);
            out.push(self.create_annotation(word, at, next));
            at = next;
        }
        out
    }

    pub fn annotations_from_separated_text(
        &mut self,
        text: &str,
        start: Timing,
        align_div: i64,
        separator: char,
    ) -> Vec<BlockId> {
        let sep = separator.to_string();
        let normalized = text
            .split(['\r', '\n'])
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(&format!("{} {}", sep, sep));
        let words: Vec<String> = normalized
            .split(separator)
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        self.annotations_from_words(&words, start, align_div)
    }

    pub fn annotations_auto_split(&mut self, text: &str, start: Timing, align_div: i64) -> Vec<BlockId> {
        let words = split_words(text);
        self.annotations_from_words(&words, start, align_div)
    }

    /// Wrap each annotation in its own simple lyric
    pub fn lyrics_from_annotations(&mut self, annotations: Vec<BlockId>) -> Result<Vec<BlockId>> {
        annotations
            .into_iter()
            .map(|a| self.create_lyric("", vec![a]))
            .collect()
    }

    pub fn lyrics_auto_split(&mut self, text: &str, start: Timing, align_div: i64) -> Result<Vec<BlockId>> {
        let annotations = self.annotations_auto_split(text, start, align_div);
        self.lyrics_from_annotations(annotations)
    }

    /// Build lyrics from editor text.
    ///
    /// Lines are separated by newlines and words by `separator`. A word
    /// `reading:annotation` becomes a lyric with that reading whose
    /// annotations come from splitting the part after the colon; other words
    /// are split into simple lyrics. A `" "` word marks a space and skips a
    /// unit; each line end marks a newline and skips a unit.
    pub fn lyrics_from_text(
        &mut self,
        text: &str,
        start: Timing,
        align_div: i64,
        separator: char,
    ) -> Result<Vec<BlockId>> {
        let mut blocks: Vec<BlockId> = Vec::new();
        let mut at = start.lower_bound(align_div);

        for line in text.split(['\r', '\n']).filter(|l| !l.trim().is_empty()) {
            for word in line.split(separator).filter(|w| !w.is_empty()) {
                if word.trim().is_empty() {
                    if let Some(last) = blocks.last() {
                        self.set_spacing_flags(last, None, Some(true));
                        at = at.upper_bound(align_div);
                    }
                    continue;
                }
                if let Some((reading, annotation_text)) = word.split_once(ANNO_INDIC) {
                    let annotations = self.annotations_auto_split(annotation_text, at, align_div);
                    if annotations.is_empty() {
                        continue;
                    }
                    let block = self.create_lyric(reading, annotations)?;
                    at = self.end(&block);
                    blocks.push(block);
                    continue;
                }
                for piece in split_words(word) {
                    if piece == " " {
                        if let Some(last) = blocks.last() {
                            self.set_spacing_flags(last, None, Some(true));
                        }
                        at = at.upper_bound(align_div);
                        continue;
                    }
                    let next = at.upper_bound(align_div);
                    blocks.push(self.create_simple_lyric(&piece, at, next)?);
                    at = next;
                }
            }
            if let Some(last) = blocks.last() {
                self.set_spacing_flags(last, Some(true), None);
                at = at.upper_bound(align_div);
            }
        }
        Ok(blocks)
    }

    /// Direct flag write for blocks that are not attached yet
    fn set_spacing_flags(&mut self, id: &BlockId, newline: Option<bool>, space: Option<bool>) {
        if let Some((nl, sp)) = self.block_mut(id).ok().and_then(|b| b.spacing_mut()) {
            if let Some(v) = newline {
                *nl = v;
            }
            if let Some(v) = space {
                *sp = v;
            }
        }
    }

    //#endregion Lyrics

    //#region Calls and comments

    pub fn create_call(&mut self, text: &str, start: Timing, end: Timing) -> BlockId {
        let id = self.add_detached(BlockData::Call(CallData {
            start,
            end,
            newline: false,
            space: false,
        }));
        self.call_groups_mut().insert(id.clone(), text.to_string());
        id
    }

    /// Copy of a call at another start, same length and text, ungrouped
    pub fn call_replica(&mut self, call: &BlockId, start: Timing) -> Result<BlockId> {
        if self.kind(call) != Some(BlockKind::Call) {
            return Err(EditorError::value(format!("{} is not a call block", call)));
        }
        let (from, to) = self.range(call);
        let text = self.call_text(call);
        Ok(self.create_call(&text, start, start.add(to.sub(from))))
    }

    pub fn is_preset(&self, call: &BlockId) -> bool {
        self.kind(call) == Some(BlockKind::Call) && CALL_PRESETS.contains(&self.call_text(call).as_str())
    }

    pub fn create_sing_along(&mut self, lyric: Option<BlockId>, text: &str) -> Result<BlockId> {
        if let Some(target) = &lyric {
            if self.kind(target) != Some(BlockKind::Lyrics) {
                return Err(EditorError::value(format!("{} is not a lyrics block", target)));
            }
        }
        let id = self.add_detached(BlockData::SingAlong(SingAlongData::default()));
        self.set_back_ref(&id, lyric)?;
        if !text.is_empty() && text != self.text(&id) {
            if let Some(sing_along) = self.block_mut(&id)?.sing_along_mut() {
                sing_along.text = text.to_string();
            }
        }
        Ok(id)
    }

    pub fn create_comment(&mut self, text: &str, start: Timing, end: Timing) -> BlockId {
        self.add_detached(BlockData::Comment(RangeData {
            text: text.to_string(),
            start,
            end,
        }))
    }

    //#endregion Calls and comments

    /// Fresh-id copy of an annotation or lyric (with its annotations)
    pub fn deep_copy(&mut self, id: &BlockId) -> Result<BlockId> {
        let block = self.expect_block(id)?.clone();
        match block.data {
            BlockData::Annotation(r) => Ok(self.create_annotation(&r.text, r.start, r.end)),
            BlockData::Lyrics(l) => {
                let children = l
                    .children
                    .iter()
                    .map(|c| self.deep_copy(c))
                    .collect::<Result<Vec<_>>>()?;
                let copy = self.create_lyric(&l.text, children)?;
                if let Some(data) = self.block_mut(&copy)?.lyrics_mut() {
                    data.tags = l.tags;
                    data.newline = l.newline;
                    data.space = l.space;
                }
                Ok(copy)
            }
            other => Err(EditorError::invalid_state(format!(
                "Cannot copy {:?} block {}",
                other.kind(),
                id
            ))),
        }
    }
}

/// A selection contains every member of each repeat group it touches
pub fn check_full_call_group(doc: &Document, blocks: &[BlockId]) -> bool {
    blocks
        .iter()
        .filter(|b| doc.kind(b) == Some(BlockKind::Call))
        .all(|call| {
            doc.call_groups()
                .members(call)
                .iter()
                .all(|member| blocks.contains(member))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lyric_without_annotations_is_data_error() {
        let mut doc = Document::new();
        assert!(matches!(
            doc.create_lyric("x", vec![]),
            Err(EditorError::Data(_))
        ));
    }

    #[test]
    fn test_separated_text_one_unit_per_word() {
        let mut doc = Document::new();
        let anns = doc.annotations_from_separated_text("か|ん| |じ", Timing::new(0, 1, 8), 4, '|');
        let texts: Vec<String> = anns.iter().map(|a| doc.text(a)).collect();
        assert_eq!(texts, vec!["か", "ん", "じ"]);
        // Start snaps up to the grid, the space skips one unit
        assert_eq!(doc.range(&anns[0]), (Timing::new(0, 1, 4), Timing::new(0, 2, 4)));
        assert_eq!(doc.range(&anns[1]), (Timing::new(0, 2, 4), Timing::new(0, 3, 4)));
        assert_eq!(doc.range(&anns[2]), (Timing::new(1, 0, 4), Timing::new(1, 1, 4)));
    }

    #[test]
    fn test_lyrics_from_text_flags_and_readings() {
        let mut doc = Document::new();
        let blocks = doc
            .lyrics_from_text("歌詞:かし|を\nla", Timing::ZERO, 4, '|')
            .unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(doc.text(&blocks[0]), "歌詞");
        assert_eq!(doc.top_text(&blocks[0]), "か|し");
        assert_eq!(doc.bottom_text(&blocks[1]), "を");
        assert_eq!(doc.block(&blocks[1]).and_then(|b| b.spacing()), Some((true, false)));
        // newline skips one unit
        assert_eq!(doc.start(&blocks[2]), Timing::new(1, 0, 4));
        assert_eq!(doc.block(&blocks[2]).and_then(|b| b.spacing()), Some((true, false)));
    }

    #[test]
    fn test_call_replica_and_presets() {
        let mut doc = Document::new();
        let call = doc.create_call("Hi", Timing::new(1, 0, 4), Timing::new(1, 2, 4));
        let copy = doc.call_replica(&call, Timing::new(3, 1, 4)).unwrap();
        assert_eq!(doc.range(&copy), (Timing::new(3, 1, 4), Timing::new(3, 3, 4)));
        assert_eq!(doc.call_text(&copy), "Hi");
        assert!(doc.is_preset(&copy));
        assert!(!doc.is_repeated(&copy));

        let custom = doc.create_call("Say yeah", Timing::ZERO, Timing::new(0, 1, 4));
        assert!(!doc.is_preset(&custom));
    }

    #[test]
    fn test_check_full_call_group() {
        let mut doc = Document::new();
        let a = doc.create_call("Hi", Timing::ZERO, Timing::new(0, 1, 4));
        let b = doc.create_call("Hi", Timing::new(1, 0, 4), Timing::new(1, 1, 4));
        doc.call_groups_mut().merge(&a, &b).unwrap();
        assert!(!check_full_call_group(&doc, &[a.clone()]));
        assert!(check_full_call_group(&doc, &[a, b]));
    }

    #[test]
    fn test_sing_along_follows_lyric() {
        let mut doc = Document::new();
        let lyric = doc.create_simple_lyric("夢", Timing::ZERO, Timing::new(0, 2, 4)).unwrap();
        let sa = doc.create_sing_along(Some(lyric.clone()), "夢").unwrap();
        assert_eq!(doc.sing_along_override(&sa), Some(""));
        assert_eq!(doc.text(&sa), "夢");
        assert_eq!(doc.range(&sa), doc.range(&lyric));
        assert_eq!(doc.refs().get(&lyric), &[sa]);
    }
}
