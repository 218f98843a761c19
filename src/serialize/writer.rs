//! Document to records

use crate::config::DOCUMENT_VERSION;
use crate::error::{EditorError, Result};
use crate::models::block::{BlockData, BlockId, TrackData};
use crate::serialize::records::{
    BlockRecord, BpmRecord, CallRecord, DocumentRecord, LyricsRecord, PersistRecord, RangeRecord,
    SingAlongRecord, TempoRecord, TrackRecord,
};
use crate::structure::document::Document;

pub fn to_record(doc: &Document) -> Result<DocumentRecord> {
    let tracks = doc
        .tracks()
        .iter()
        .map(|t| block_record(doc, t))
        .collect::<Result<Vec<_>>>()?;
    let tempo = doc.tempo();
    Ok(DocumentRecord {
        version: DOCUMENT_VERSION,
        tracks,
        tags: doc.tags().tags().to_vec(),
        persist: PersistRecord {
            next_id: doc.next_id(),
        },
        meta: doc.meta().clone(),
        bpm: Some(TempoRecord {
            bpms: tempo
                .points()
                .iter()
                .map(|p| BpmRecord {
                    id: p.id.clone(),
                    time: p.time,
                    bpm: p.bpm,
                    div: p.div,
                })
                .collect(),
            offset: tempo.offset_ms(),
        }),
    })
}

pub fn to_json(doc: &Document) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_record(doc)?)?)
}

pub fn to_yaml(doc: &Document) -> Result<String> {
    Ok(serde_yaml::to_string(&to_record(doc)?)?)
}

fn children(doc: &Document, id: &BlockId) -> Result<Vec<BlockRecord>> {
    doc.children_of(id).iter().map(|c| block_record(doc, c)).collect()
}

fn track_record(doc: &Document, id: &BlockId, track: &TrackData) -> Result<TrackRecord> {
    Ok(TrackRecord {
        id: id.clone(),
        text: track.name.clone(),
        muted: track.muted,
        se_volume: track.se_volume,
        children: children(doc, id)?,
    })
}

fn block_record(doc: &Document, id: &BlockId) -> Result<BlockRecord> {
    let block = doc.expect_block(id)?;
    let record = match &block.data {
        BlockData::Tracks { .. } => {
            return Err(EditorError::invalid_state("The root is not a block record"));
        }
        BlockData::LyricsTrack(t) => BlockRecord::LyricsTrack(track_record(doc, id, t)?),
        BlockData::CallsTrack(t) => BlockRecord::CallsTrack(track_record(doc, id, t)?),
        BlockData::CommentTrack(t) => BlockRecord::CommentTrack(track_record(doc, id, t)?),
        BlockData::Lyrics(l) => BlockRecord::Lyrics(LyricsRecord {
            id: id.clone(),
            text: l.text.clone(),
            tags: l.tags.clone(),
            newline: l.newline,
            space: l.space,
            children: children(doc, id)?,
        }),
        BlockData::Annotation(r) | BlockData::Comment(r) => {
            let range = RangeRecord {
                id: id.clone(),
                text: r.text.clone(),
                start: r.start.serialize(),
                end: r.end.serialize(),
            };
            if matches!(block.data, BlockData::Annotation(_)) {
                BlockRecord::Annotation(range)
            } else {
                BlockRecord::Comment(range)
            }
        }
        BlockData::Call(c) => {
            let groups = doc.call_groups();
            BlockRecord::Call(CallRecord {
                id: id.clone(),
                text: groups.own_value(id).cloned().unwrap_or_default(),
                start: c.start.serialize(),
                end: c.end.serialize(),
                group: groups.parent(id).cloned(),
                newline: c.newline,
                space: c.space,
            })
        }
        BlockData::SingAlong(s) => BlockRecord::SingAlong(SingAlongRecord {
            id: id.clone(),
            text: s.text.clone(),
            lyric: s.lyric.get().cloned(),
        }),
    };
    Ok(record)
}
