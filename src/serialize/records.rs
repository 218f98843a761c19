//! Persisted record shapes
//!
//! Block timings stay strings here; the loader parses them strictly so a
//! malformed position surfaces as a value error naming the block.

use serde::{Deserialize, Serialize};

use crate::config::DOCUMENT_VERSION;
use crate::models::block::BlockId;
use crate::models::metadata::Metadata;
use crate::models::serde_helpers::{default_se_volume, is_empty_str, is_false, timing_str};
use crate::models::tags::LyricTag;
use crate::models::tempo::DEFAULT_BPM_DIV;
use crate::models::timing::Timing;

/// Whole-document envelope
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub version: u32,
    pub tracks: Vec<BlockRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<LyricTag>,
    #[serde(default)]
    pub persist: PersistRecord,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub meta: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<TempoRecord>,
}

impl Default for DocumentRecord {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            tracks: Vec::new(),
            tags: Vec::new(),
            persist: PersistRecord::default(),
            meta: Metadata::default(),
            bpm: None,
        }
    }
}

/// Editor state that must survive a reload
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistRecord {
    #[serde(default)]
    pub next_id: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempoRecord {
    pub bpms: Vec<BpmRecord>,
    /// Milliseconds
    #[serde(default)]
    pub offset: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BpmRecord {
    pub id: String,
    #[serde(with = "timing_str")]
    pub time: Timing,
    pub bpm: f64,
    #[serde(default = "default_bpm_div")]
    pub div: i64,
}

fn default_bpm_div() -> i64 {
    DEFAULT_BPM_DIV
}

/// One block, tagged by `kind`; parents nest their children
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BlockRecord {
    LyricsTrack(TrackRecord),
    CallsTrack(TrackRecord),
    CommentTrack(TrackRecord),
    Lyrics(LyricsRecord),
    Annotation(RangeRecord),
    Call(CallRecord),
    SingAlong(SingAlongRecord),
    Comment(RangeRecord),
}

impl BlockRecord {
    pub fn id(&self) -> &BlockId {
        match self {
            BlockRecord::LyricsTrack(r) | BlockRecord::CallsTrack(r) | BlockRecord::CommentTrack(r) => &r.id,
            BlockRecord::Lyrics(r) => &r.id,
            BlockRecord::Annotation(r) | BlockRecord::Comment(r) => &r.id,
            BlockRecord::Call(r) => &r.id,
            BlockRecord::SingAlong(r) => &r.id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    pub id: BlockId,
    /// Track name
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "default_se_volume")]
    pub se_volume: f64,
    #[serde(default)]
    pub children: Vec<BlockRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricsRecord {
    pub id: BlockId,
    #[serde(default, skip_serializing_if = "is_empty_str")]
    pub text: String,
    /// Tag ids
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub newline: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub space: bool,
    #[serde(default)]
    pub children: Vec<BlockRecord>,
}

/// Annotations and comments
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeRecord {
    pub id: BlockId,
    #[serde(default)]
    pub text: String,
    pub start: String,
    pub end: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub id: BlockId,
    /// The call's own text (the group root's text wins when grouped)
    #[serde(default)]
    pub text: String,
    pub start: String,
    pub end: String,
    /// Parent node in the repeat-group tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<BlockId>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub newline: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub space: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingAlongRecord {
    pub id: BlockId,
    /// Override text; empty follows the lyric
    #[serde(default, skip_serializing_if = "is_empty_str")]
    pub text: String,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub lyric: Option<BlockId>,
}
