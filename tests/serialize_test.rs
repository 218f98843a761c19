// Loading and exporting persisted documents

use lyrics_editor_wasm::serialize::{load_json, load_yaml, to_json, to_yaml};
use lyrics_editor_wasm::{BlockId, EditorError, Timing};

const SONG: &str = include_str!("fixtures/song.json");

#[test]
fn test_fixture_roundtrips_through_json() {
    let doc = load_json(SONG).unwrap();
    let json = to_json(&doc).unwrap();
    let reloaded = load_json(&json).unwrap();
    assert_eq!(to_json(&reloaded).unwrap(), json);
    assert_eq!(reloaded.next_id(), 11);
    assert_eq!(
        reloaded.sing_along_lyric(&BlockId::new("bl-8")),
        Some(&BlockId::new("bl-3"))
    );
}

#[test]
fn test_fixture_roundtrips_through_yaml() {
    let doc = load_json(SONG).unwrap();
    let yaml = to_yaml(&doc).unwrap();
    let reloaded = load_yaml(&yaml).unwrap();
    assert_eq!(to_json(&reloaded).unwrap(), to_json(&doc).unwrap());
}

#[test]
fn test_timings_are_normalized_on_export() {
    let doc = load_json(SONG).unwrap();
    assert_eq!(doc.start(&BlockId::new("bl-7")), Timing::new(1, 0, 4));
    let json = to_json(&doc).unwrap();
    assert!(json.contains(&format!("\"{}\"", Timing::new(1, 0, 4).serialize())));
}

#[test]
fn test_forward_group_reference() {
    let json = r#"{"version": 1, "tracks": [
        {"kind": "CallsTrack", "id": "bl-0", "children": [
            {"kind": "Call", "id": "bl-1", "start": "0:0/4", "end": "0:1/4", "group": "bl-2"},
            {"kind": "Call", "id": "bl-2", "text": "Hi", "start": "0:2/4", "end": "0:3/4"}
        ]}
    ]}"#;
    let doc = load_json(json).unwrap();
    assert_eq!(doc.call_text(&BlockId::new("bl-1")), "Hi");
    assert!(doc.is_repeated(&BlockId::new("bl-2")));
}

#[test]
fn test_overlapping_track_blocks_are_rejected() {
    let json = r#"{"version": 1, "tracks": [
        {"kind": "CommentTrack", "id": "bl-0", "children": [
            {"kind": "Comment", "id": "bl-1", "text": "a", "start": "0:0/4", "end": "0:3/4"},
            {"kind": "Comment", "id": "bl-2", "text": "b", "start": "0:2/4", "end": "0:4/4"}
        ]}
    ]}"#;
    assert!(matches!(load_json(json), Err(EditorError::Data(_))));
}

#[test]
fn test_grouping_with_a_lyric_is_rejected() {
    let json = r#"{"version": 1, "tracks": [
        {"kind": "LyricsTrack", "id": "bl-0", "children": [
            {"kind": "Lyrics", "id": "bl-1", "children": [
                {"kind": "Annotation", "id": "bl-2", "text": "a", "start": "0:0/4", "end": "0:1/4"}
            ]}
        ]},
        {"kind": "CallsTrack", "id": "bl-3", "children": [
            {"kind": "Call", "id": "bl-4", "start": "0:0/4", "end": "0:1/4", "group": "bl-1"}
        ]}
    ]}"#;
    assert!(matches!(load_json(json), Err(EditorError::Data(_))));
}
