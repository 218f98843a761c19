//! Two-phase document loader
//!
//! Blocks are built depth-first in record order. Call-group links and
//! sing-along references may point forward, so they go through a
//! `ForwardResolver` and are applied as soon as their target exists.
//! Anything still waiting when the tree is complete is a data error.

use crate::config::DOCUMENT_VERSION;
use crate::error::{EditorError, Result};
use crate::models::block::{
    Block, BlockData, BlockId, BlockKind, CallData, LyricsData, RangeData, SingAlongData, TrackData,
};
use crate::models::tempo::{BpmPoint, TempoMap};
use crate::models::timing::Timing;
use crate::refs::resolver::ForwardResolver;
use crate::serialize::records::{BlockRecord, DocumentRecord, RangeRecord, TempoRecord, TrackRecord};
use crate::structure::document::Document;

/// Link waiting for its target block
#[derive(Debug)]
enum Pending {
    /// Attach `call` under the target in the repeat-group tree
    Group { call: BlockId },
    /// Point `sing_along` at the target lyric
    Ref { sing_along: BlockId },
}

pub fn load_json(json: &str) -> Result<Document> {
    let record: DocumentRecord = serde_json::from_str(json)?;
    load_record(record)
}

pub fn load_yaml(yaml: &str) -> Result<Document> {
    let record: DocumentRecord = serde_yaml::from_str(yaml)?;
    load_record(record)
}

pub fn load_record(record: DocumentRecord) -> Result<Document> {
    if record.version > DOCUMENT_VERSION {
        return Err(EditorError::data(format!(
            "Document version {} is newer than supported version {}",
            record.version, DOCUMENT_VERSION
        )));
    }

    let mut loader = Loader {
        doc: Document::new(),
        resolver: ForwardResolver::new(),
    };
    loader.doc.replace_tag_list(record.tags);

    let mut tracks = Vec::with_capacity(record.tracks.len());
    for track in record.tracks {
        let kind = kind_of(&track);
        if !kind.is_track() {
            return Err(EditorError::data(format!(
                "{:?} {} cannot be a top-level track",
                kind,
                track.id()
            )));
        }
        tracks.push(loader.build(track)?);
    }
    let root = loader.doc.root_id().clone();
    loader.doc.splice(&root, 0, 0, tracks)?;

    let Loader { mut doc, resolver } = loader;
    resolver.finish()?;
    check_track_order(&doc)?;

    doc.bump_next_id(record.persist.next_id);
    if let Some(tempo) = record.bpm {
        doc.set_tempo(load_tempo(tempo)?);
    }
    doc.set_meta(record.meta);
    log::info!(
        "Loaded document with {} tracks (next id {})",
        doc.tracks().len(),
        doc.next_id()
    );
    Ok(doc)
}

struct Loader {
    doc: Document,
    resolver: ForwardResolver<Pending>,
}

impl Loader {
    /// Build `record` and its subtree; returns the detached block id
    fn build(&mut self, record: BlockRecord) -> Result<BlockId> {
        let kind = kind_of(&record);
        let id = record.id().clone();
        let (data, children) = match record {
            BlockRecord::LyricsTrack(r) => {
                let (data, children) = track_data(r);
                (BlockData::LyricsTrack(data), children)
            }
            BlockRecord::CallsTrack(r) => {
                let (data, children) = track_data(r);
                (BlockData::CallsTrack(data), children)
            }
            BlockRecord::CommentTrack(r) => {
                let (data, children) = track_data(r);
                (BlockData::CommentTrack(data), children)
            }
            BlockRecord::Lyrics(r) => {
                if r.children.is_empty() {
                    return Err(EditorError::data(format!("Lyric {} has no annotations", id)));
                }
                let tags = self.known_tags(&id, r.tags);
                let data = LyricsData {
                    text: r.text,
                    tags,
                    newline: r.newline,
                    space: r.space,
                    children: Vec::new(),
                };
                (BlockData::Lyrics(data), r.children)
            }
            BlockRecord::Annotation(r) => (BlockData::Annotation(range_data(&r)?), Vec::new()),
            BlockRecord::Comment(r) => (BlockData::Comment(range_data(&r)?), Vec::new()),
            BlockRecord::Call(r) => {
                let (start, end) = parse_range(&r.id, &r.start, &r.end)?;
                self.doc.call_groups_mut().insert(id.clone(), r.text);
                if let Some(group) = r.group {
                    self.resolver.defer(group, Pending::Group { call: id.clone() });
                }
                let data = CallData {
                    start,
                    end,
                    newline: r.newline,
                    space: r.space,
                };
                (BlockData::Call(data), Vec::new())
            }
            BlockRecord::SingAlong(r) => {
                if let Some(lyric) = r.lyric {
                    self.resolver.defer(lyric, Pending::Ref { sing_along: id.clone() });
                }
                let data = SingAlongData {
                    text: r.text,
                    ..SingAlongData::default()
                };
                (BlockData::SingAlong(data), Vec::new())
            }
        };

        self.doc.insert_block(Block::new(id.clone(), data))?;
        if let Some(n) = counter_of(&id) {
            self.doc.bump_next_id(n + 1);
        }
        self.resolver.provide(&id);
        self.resolve_ready()?;

        let mut child_ids = Vec::with_capacity(children.len());
        for child in children {
            let child_kind = kind_of(&child);
            if !kind.accepts_child(child_kind) {
                return Err(EditorError::data(format!(
                    "{:?} {} cannot contain {:?} {}",
                    kind,
                    id,
                    child_kind,
                    child.id()
                )));
            }
            child_ids.push(self.build(child)?);
        }
        if kind == BlockKind::Lyrics {
            self.check_dense(&id, &child_ids)?;
        }
        if !child_ids.is_empty() {
            self.doc.splice(&id, 0, 0, child_ids)?;
        }
        Ok(id)
    }

    fn resolve_ready(&mut self) -> Result<()> {
        for (target, pending) in self.resolver.take_ready() {
            match pending {
                Pending::Group { call } => {
                    if self.doc.kind(&target) != Some(BlockKind::Call) {
                        return Err(EditorError::data(format!(
                            "Call {} is grouped with non-call {}",
                            call, target
                        )));
                    }
                    self.doc
                        .call_groups_mut()
                        .attach(&call, &target)
                        .map_err(|e| EditorError::data(format!("Call {} group: {}", call, e)))?;
                }
                Pending::Ref { sing_along } => {
                    if self.doc.kind(&target) != Some(BlockKind::Lyrics) {
                        return Err(EditorError::data(format!(
                            "Sing-along {} refers to non-lyric {}",
                            sing_along, target
                        )));
                    }
                    self.doc.set_back_ref(&sing_along, Some(target))?;
                }
            }
        }
        Ok(())
    }

    fn known_tags(&self, lyric: &BlockId, ids: Vec<String>) -> Vec<String> {
        let mut tags = Vec::with_capacity(ids.len());
        for tag in ids {
            if !self.doc.tags().contains(&tag) {
                log::warn!("Lyric {} refers to unknown tag {}", lyric, tag);
            } else if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }

    /// Annotations of a lyric must tile its range without gaps
    fn check_dense(&self, lyric: &BlockId, annotations: &[BlockId]) -> Result<()> {
        for pair in annotations.windows(2) {
            if self.doc.end(&pair[0]) != self.doc.start(&pair[1]) {
                return Err(EditorError::data(format!(
                    "Annotations {} and {} of lyric {} are not contiguous",
                    pair[0], pair[1], lyric
                )));
            }
        }
        Ok(())
    }
}

fn kind_of(record: &BlockRecord) -> BlockKind {
    match record {
        BlockRecord::LyricsTrack(_) => BlockKind::LyricsTrack,
        BlockRecord::CallsTrack(_) => BlockKind::CallsTrack,
        BlockRecord::CommentTrack(_) => BlockKind::CommentTrack,
        BlockRecord::Lyrics(_) => BlockKind::Lyrics,
        BlockRecord::Annotation(_) => BlockKind::Annotation,
        BlockRecord::Call(_) => BlockKind::Call,
        BlockRecord::SingAlong(_) => BlockKind::SingAlong,
        BlockRecord::Comment(_) => BlockKind::Comment,
    }
}

fn track_data(record: TrackRecord) -> (TrackData, Vec<BlockRecord>) {
    let mut data = TrackData::new(record.text, record.muted);
    data.se_volume = record.se_volume;
    (data, record.children)
}

fn range_data(record: &RangeRecord) -> Result<RangeData> {
    let (start, end) = parse_range(&record.id, &record.start, &record.end)?;
    Ok(RangeData {
        text: record.text.clone(),
        start,
        end,
    })
}

fn parse_range(id: &BlockId, start: &str, end: &str) -> Result<(Timing, Timing)> {
    let parse = |s: &str| {
        Timing::deserialize(s).map_err(|e| EditorError::value(format!("Block {}: {}", id, e)))
    };
    let (start, end) = (parse(start)?, parse(end)?);
    if end < start {
        return Err(EditorError::data(format!(
            "Block {} ends at {} before its start {}",
            id, end, start
        )));
    }
    Ok((start, end))
}

/// Counter value of a `bl-<n>` id
fn counter_of(id: &BlockId) -> Option<u64> {
    id.as_str().strip_prefix("bl-")?.parse().ok()
}

/// Track lanes never hold overlapping blocks
fn check_track_order(doc: &Document) -> Result<()> {
    for track in doc.tracks() {
        for pair in doc.children_of(track).windows(2) {
            let (prev_end, next_start) = (doc.end(&pair[0]), doc.start(&pair[1]));
            if prev_end.is_valid() && next_start.is_valid() && prev_end > next_start {
                return Err(EditorError::data(format!(
                    "Blocks {} and {} overlap in track {}",
                    pair[0], pair[1], track
                )));
            }
        }
    }
    Ok(())
}

fn load_tempo(record: TempoRecord) -> Result<TempoMap> {
    let to_data = |e: EditorError| EditorError::data(format!("Tempo: {}", e));
    let points = record
        .bpms
        .into_iter()
        .map(|p| BpmPoint::new(p.id, p.time, p.bpm, p.div))
        .collect::<Result<Vec<_>>>()
        .map_err(to_data)?;
    TempoMap::new(points, record.offset).map_err(to_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"{
        "version": 1,
        "tags": [{"id": "t0", "name": "Solo", "color": "#FF0000"}],
        "persist": {"nextId": 20},
        "meta": {"title": "Song"},
        "bpm": {"bpms": [{"id": "bpm-0", "time": "0:0/1", "bpm": 180, "div": 4}], "offset": 250},
        "tracks": [
            {"kind": "LyricsTrack", "id": "bl-0", "text": "Lyrics", "children": [
                {"kind": "Lyrics", "id": "bl-3", "text": "君", "tags": ["t0", "t9"], "children": [
                    {"kind": "Annotation", "id": "bl-4", "text": "き", "start": "0:0/4", "end": "0:1/4"},
                    {"kind": "Annotation", "id": "bl-5", "text": "み", "start": "0:1/4", "end": "0:2/4"}
                ]}
            ]},
            {"kind": "CallsTrack", "id": "bl-1", "text": "Calls", "children": [
                {"kind": "SingAlong", "id": "bl-6", "ref": "bl-3"},
                {"kind": "Call", "id": "bl-7", "text": "", "start": "1:0/4", "end": "1:1/4", "group": "bl-8"},
                {"kind": "Call", "id": "bl-8", "text": "Hi", "start": "2:0/4", "end": "2:1/4"}
            ]},
            {"kind": "CommentTrack", "id": "bl-2", "text": "Comments", "muted": true, "children": []}
        ]
    }"##;

    #[test]
    fn test_load_sample() {
        let doc = load_json(SAMPLE).unwrap();
        assert_eq!(doc.tracks().len(), 3);
        assert_eq!(doc.next_id(), 20);
        assert_eq!(doc.meta().title, "Song");
        assert_eq!(doc.tempo().offset_ms(), 250.0);

        let lyric = BlockId::new("bl-3");
        assert_eq!(doc.top_text(&lyric), "き|み");
        assert_eq!(doc.tags_of(&lyric).len(), 1);

        let sing_along = BlockId::new("bl-6");
        assert_eq!(doc.sing_along_lyric(&sing_along), Some(&lyric));
        assert_eq!(doc.end(&sing_along), Timing::new(0, 2, 4));

        let call = BlockId::new("bl-7");
        assert_eq!(doc.call_text(&call), "Hi");
        assert_eq!(doc.repeat_count(&call), 2);
    }

    #[test]
    fn test_ids_bump_counter() {
        let json = r#"{"version": 1, "tracks": [
            {"kind": "CommentTrack", "id": "bl-41", "children": []}
        ]}"#;
        let doc = load_json(json).unwrap();
        assert_eq!(doc.next_id(), 42);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let json = r#"{"version": 2, "tracks": []}"#;
        assert!(matches!(load_json(json), Err(EditorError::Data(_))));
    }

    #[test]
    fn test_duplicate_id_is_data_error() {
        let json = r#"{"version": 1, "tracks": [
            {"kind": "CommentTrack", "id": "bl-1", "children": [
                {"kind": "Comment", "id": "bl-1", "text": "x", "start": "0:0/1", "end": "1:0/1"}
            ]}
        ]}"#;
        assert!(matches!(load_json(json), Err(EditorError::Data(_))));
    }

    #[test]
    fn test_unresolved_ref_is_data_error() {
        let json = r#"{"version": 1, "tracks": [
            {"kind": "CallsTrack", "id": "bl-1", "children": [
                {"kind": "SingAlong", "id": "bl-2", "ref": "bl-99"}
            ]}
        ]}"#;
        match load_json(json) {
            Err(EditorError::Data(msg)) => assert!(msg.contains("bl-99")),
            other => panic!("expected data error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_timing_is_value_error() {
        let json = r#"{"version": 1, "tracks": [
            {"kind": "CommentTrack", "id": "bl-1", "children": [
                {"kind": "Comment", "id": "bl-2", "text": "x", "start": "0:0/0", "end": "1:0/1"}
            ]}
        ]}"#;
        assert!(matches!(load_json(json), Err(EditorError::Value(_))));
    }

    #[test]
    fn test_misplaced_kind_is_data_error() {
        let json = r#"{"version": 1, "tracks": [
            {"kind": "CommentTrack", "id": "bl-1", "children": [
                {"kind": "Call", "id": "bl-2", "start": "0:0/1", "end": "1:0/1"}
            ]}
        ]}"#;
        assert!(matches!(load_json(json), Err(EditorError::Data(_))));
    }

    #[test]
    fn test_gap_between_annotations_is_data_error() {
        let json = r#"{"version": 1, "tracks": [
            {"kind": "LyricsTrack", "id": "bl-1", "children": [
                {"kind": "Lyrics", "id": "bl-2", "children": [
                    {"kind": "Annotation", "id": "bl-3", "text": "a", "start": "0:0/4", "end": "0:1/4"},
                    {"kind": "Annotation", "id": "bl-4", "text": "b", "start": "0:2/4", "end": "0:3/4"}
                ]}
            ]}
        ]}"#;
        assert!(matches!(load_json(json), Err(EditorError::Data(_))));
    }

    #[test]
    fn test_bad_tempo_is_data_error() {
        let json = r#"{"version": 1, "tracks": [],
            "bpm": {"bpms": [{"id": "b", "time": "0:0/1", "bpm": 0.5, "div": 4}]}}"#;
        assert!(matches!(load_json(json), Err(EditorError::Data(_))));
    }
}
