//! Read-only snapshot of the tree for the render pipeline

use serde::Serialize;

use crate::models::block::{BlockId, BlockKind};
use crate::models::serde_helpers::{is_empty_str, is_false};
use crate::models::timing::Timing;
use crate::structure::document::Document;

/// One block as the renderer sees it: resolved range, texts and tags
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockView {
    pub id: BlockId,
    pub kind: BlockKind,
    /// `bar:beat/div`, empty when the range is unresolved
    pub start: String,
    pub end: String,
    pub text: String,
    #[serde(skip_serializing_if = "is_empty_str")]
    pub bottom_text: String,
    #[serde(skip_serializing_if = "is_empty_str")]
    pub top_text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub newline: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub space: bool,
    /// Size of the repeat group, calls only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_count: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BlockView>,
}

impl Document {
    pub fn view(&self, id: &BlockId) -> Option<BlockView> {
        let block = self.block(id)?;
        let kind = block.kind();
        let (start, end) = self.range(id);
        let show = |t: Timing| if t.is_valid() { t.serialize() } else { String::new() };

        let (newline, space) = match kind {
            BlockKind::SingAlong => self
                .sing_along_lyric(id)
                .and_then(|l| self.block(l))
                .and_then(|b| b.spacing())
                .unwrap_or_default(),
            _ => block.spacing().unwrap_or_default(),
        };
        let (bottom_text, top_text) = match kind {
            BlockKind::Lyrics => (self.bottom_text(id), self.top_text(id)),
            _ => (String::new(), String::new()),
        };

        Some(BlockView {
            id: id.clone(),
            kind,
            start: if kind.is_track() { String::new() } else { show(start) },
            end: if kind.is_track() { String::new() } else { show(end) },
            text: self.text(id),
            bottom_text,
            top_text,
            tags: self.tags_of(id).into_iter().map(|t| t.name.clone()).collect(),
            newline,
            space,
            repeat_count: (kind == BlockKind::Call).then(|| self.repeat_count(id)),
            children: self
                .children_of(id)
                .iter()
                .filter_map(|c| self.view(c))
                .collect(),
        })
    }

    /// Every track with its blocks, in track order
    pub fn track_views(&self) -> Vec<BlockView> {
        self.tracks().iter().filter_map(|t| self.view(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_resolves_sing_along() {
        let mut doc = Document::with_default_tracks();
        let lyrics_track = doc.tracks()[0].clone();
        let calls_track = doc.tracks()[1].clone();
        let ann = doc.create_annotation("き", Timing::new(0, 0, 4), Timing::new(0, 1, 4));
        let lyric = doc.create_lyric("君", vec![ann]).unwrap();
        doc.splice(&lyrics_track, 0, 0, vec![lyric.clone()]).unwrap();
        let sing_along = doc.create_sing_along(Some(lyric), "").unwrap();
        doc.splice(&calls_track, 0, 0, vec![sing_along]).unwrap();

        let views = doc.track_views();
        assert_eq!(views.len(), 3);
        let lyric_view = &views[0].children[0];
        assert_eq!(lyric_view.text, "君");
        assert_eq!(lyric_view.top_text, "き");
        assert_eq!(lyric_view.start, "0:0/4");

        let sing_along_view = &views[1].children[0];
        assert_eq!(sing_along_view.kind, BlockKind::SingAlong);
        assert_eq!(sing_along_view.text, "君");
        assert_eq!(sing_along_view.end, "0:1/4");
        assert!(views[0].start.is_empty());
    }
}
