//! Block data model
//!
//! Every element of a lyrics document is a `Block`: an id, an optional owner
//! and a kind-specific payload. Blocks live in the document arena and refer to
//! each other only by `BlockId`; a parent owns the ordered list of its
//! children's ids.

use crate::models::timing::Timing;
use crate::refs::back_ref::BackRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable block identifier (`bl-<n>` for allocated ids)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        BlockId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        BlockId(s.to_string())
    }
}

/// Kind tag of a block
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    Tracks,
    LyricsTrack,
    CallsTrack,
    CommentTrack,
    Lyrics,
    Annotation,
    Call,
    SingAlong,
    Comment,
}

impl BlockKind {
    /// Ordered parents own a child sequence
    pub fn is_parent(&self) -> bool {
        matches!(
            self,
            BlockKind::Tracks
                | BlockKind::LyricsTrack
                | BlockKind::CallsTrack
                | BlockKind::CommentTrack
                | BlockKind::Lyrics
        )
    }

    pub fn is_track(&self) -> bool {
        matches!(
            self,
            BlockKind::LyricsTrack | BlockKind::CallsTrack | BlockKind::CommentTrack
        )
    }

    /// Dense parents keep their children time-contiguous
    pub fn is_dense(&self) -> bool {
        matches!(self, BlockKind::Lyrics)
    }

    /// Children sorted by start time (the root keeps insertion order)
    pub fn is_time_ordered(&self) -> bool {
        self.is_parent() && *self != BlockKind::Tracks
    }

    /// Leaves that store their own start/end
    pub fn has_own_range(&self) -> bool {
        matches!(self, BlockKind::Annotation | BlockKind::Call | BlockKind::Comment)
    }

    pub fn is_mergeable(&self) -> bool {
        matches!(self, BlockKind::Annotation | BlockKind::Lyrics)
    }

    /// Whether a block of kind `child` may be owned by this kind
    pub fn accepts_child(&self, child: BlockKind) -> bool {
        match self {
            BlockKind::Tracks => child.is_track(),
            BlockKind::LyricsTrack => child == BlockKind::Lyrics,
            BlockKind::CallsTrack => matches!(child, BlockKind::Call | BlockKind::SingAlong),
            BlockKind::CommentTrack => child == BlockKind::Comment,
            BlockKind::Lyrics => child == BlockKind::Annotation,
            _ => false,
        }
    }
}

/// Track container settings shared by the three lane kinds
#[derive(Clone, Debug, PartialEq)]
pub struct TrackData {
    pub name: String,
    pub muted: bool,
    pub se_volume: f64,
    pub children: Vec<BlockId>,
}

impl TrackData {
    pub fn new(name: impl Into<String>, muted: bool) -> Self {
        Self {
            name: name.into(),
            muted,
            se_volume: 1.0,
            children: Vec::new(),
        }
    }
}

/// A lyric syllable group: reading text over a dense run of annotations
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LyricsData {
    /// Top-level reading (furigana target); empty for simple blocks
    pub text: String,
    /// Tag ids, resolved against the document tag store
    pub tags: Vec<String>,
    /// Layout hints for the render pipeline
    pub newline: bool,
    pub space: bool,
    pub children: Vec<BlockId>,
}

/// Leaf with its own text and range (annotations and comments)
#[derive(Clone, Debug, PartialEq)]
pub struct RangeData {
    pub text: String,
    pub start: Timing,
    pub end: Timing,
}

/// Independent call; its text lives in the document's call groups
#[derive(Clone, Debug, PartialEq)]
pub struct CallData {
    pub start: Timing,
    pub end: Timing,
    pub newline: bool,
    pub space: bool,
}

/// Sing-along cue whose range follows a lyric block
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SingAlongData {
    /// Override text; empty means "use the lyric's text"
    pub text: String,
    pub lyric: BackRef,
}

/// Kind-specific payload
#[derive(Clone, Debug, PartialEq)]
pub enum BlockData {
    Tracks { children: Vec<BlockId> },
    LyricsTrack(TrackData),
    CallsTrack(TrackData),
    CommentTrack(TrackData),
    Lyrics(LyricsData),
    Annotation(RangeData),
    Call(CallData),
    SingAlong(SingAlongData),
    Comment(RangeData),
}

impl BlockData {
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockData::Tracks { .. } => BlockKind::Tracks,
            BlockData::LyricsTrack(_) => BlockKind::LyricsTrack,
            BlockData::CallsTrack(_) => BlockKind::CallsTrack,
            BlockData::CommentTrack(_) => BlockKind::CommentTrack,
            BlockData::Lyrics(_) => BlockKind::Lyrics,
            BlockData::Annotation(_) => BlockKind::Annotation,
            BlockData::Call(_) => BlockKind::Call,
            BlockData::SingAlong(_) => BlockKind::SingAlong,
            BlockData::Comment(_) => BlockKind::Comment,
        }
    }
}

/// A node of the document tree
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    id: BlockId,
    parent: Option<BlockId>,
    pub(crate) data: BlockData,
}

impl Block {
    pub(crate) fn new(id: BlockId, data: BlockData) -> Self {
        Self {
            id,
            parent: None,
            data,
        }
    }

    pub fn id(&self) -> &BlockId {
        &self.id
    }

    pub fn kind(&self) -> BlockKind {
        self.data.kind()
    }

    pub fn parent(&self) -> Option<&BlockId> {
        self.parent.as_ref()
    }

    /// Only the owning parent (through the document) rewrites this link
    pub(crate) fn set_parent(&mut self, parent: Option<BlockId>) {
        self.parent = parent;
    }

    pub fn data(&self) -> &BlockData {
        &self.data
    }

    pub fn children(&self) -> &[BlockId] {
        match &self.data {
            BlockData::Tracks { children } => children,
            BlockData::LyricsTrack(t) | BlockData::CallsTrack(t) | BlockData::CommentTrack(t) => {
                &t.children
            }
            BlockData::Lyrics(l) => &l.children,
            _ => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<BlockId>> {
        match &mut self.data {
            BlockData::Tracks { children } => Some(children),
            BlockData::LyricsTrack(t) | BlockData::CallsTrack(t) | BlockData::CommentTrack(t) => {
                Some(&mut t.children)
            }
            BlockData::Lyrics(l) => Some(&mut l.children),
            _ => None,
        }
    }

    pub fn track(&self) -> Option<&TrackData> {
        match &self.data {
            BlockData::LyricsTrack(t) | BlockData::CallsTrack(t) | BlockData::CommentTrack(t) => {
                Some(t)
            }
            _ => None,
        }
    }

    pub(crate) fn track_mut(&mut self) -> Option<&mut TrackData> {
        match &mut self.data {
            BlockData::LyricsTrack(t) | BlockData::CallsTrack(t) | BlockData::CommentTrack(t) => {
                Some(t)
            }
            _ => None,
        }
    }

    pub fn lyrics(&self) -> Option<&LyricsData> {
        match &self.data {
            BlockData::Lyrics(l) => Some(l),
            _ => None,
        }
    }

    pub(crate) fn lyrics_mut(&mut self) -> Option<&mut LyricsData> {
        match &mut self.data {
            BlockData::Lyrics(l) => Some(l),
            _ => None,
        }
    }

    pub fn sing_along(&self) -> Option<&SingAlongData> {
        match &self.data {
            BlockData::SingAlong(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn sing_along_mut(&mut self) -> Option<&mut SingAlongData> {
        match &mut self.data {
            BlockData::SingAlong(s) => Some(s),
            _ => None,
        }
    }

    /// Stored range of leaves that own one
    pub fn own_range(&self) -> Option<(Timing, Timing)> {
        match &self.data {
            BlockData::Annotation(r) | BlockData::Comment(r) => Some((r.start, r.end)),
            BlockData::Call(c) => Some((c.start, c.end)),
            _ => None,
        }
    }

    pub(crate) fn set_own_start(&mut self, start: Timing) -> bool {
        match &mut self.data {
            BlockData::Annotation(r) | BlockData::Comment(r) => r.start = start,
            BlockData::Call(c) => c.start = start,
            _ => return false,
        }
        true
    }

    pub(crate) fn set_own_end(&mut self, end: Timing) -> bool {
        match &mut self.data {
            BlockData::Annotation(r) | BlockData::Comment(r) => r.end = end,
            BlockData::Call(c) => c.end = end,
            _ => return false,
        }
        true
    }

    /// Newline/space layout flags of blocks that own them
    pub fn spacing(&self) -> Option<(bool, bool)> {
        match &self.data {
            BlockData::Lyrics(l) => Some((l.newline, l.space)),
            BlockData::Call(c) => Some((c.newline, c.space)),
            _ => None,
        }
    }

    pub(crate) fn spacing_mut(&mut self) -> Option<(&mut bool, &mut bool)> {
        match &mut self.data {
            BlockData::Lyrics(l) => Some((&mut l.newline, &mut l.space)),
            BlockData::Call(c) => Some((&mut c.newline, &mut c.space)),
            _ => None,
        }
    }
}
