// Undo/redo properties over whole documents

use lyrics_editor_wasm::serialize::{to_record, DocumentRecord};
use lyrics_editor_wasm::{BlockId, Document, EditorConfig, Session, Timing};

const SONG: &str = include_str!("fixtures/song.json");

/// Record without the id counter, which never moves back on undo
fn snapshot(doc: &Document) -> DocumentRecord {
    let mut record = to_record(doc).unwrap();
    record.persist.next_id = 0;
    record
}

fn assert_dense(doc: &Document, lyric: &BlockId) {
    let children = doc.children_of(lyric);
    for pair in children.windows(2) {
        assert_eq!(doc.end(&pair[0]), doc.start(&pair[1]), "gap inside {}", lyric);
    }
}

#[test]
fn test_merge_execute_undo_redo() {
    let mut session = Session::from_json(SONG, EditorConfig::default()).unwrap();
    let original = snapshot(session.document());

    assert!(session.merge(&[BlockId::new("bl-3"), BlockId::new("bl-6")]).unwrap());
    let merged = snapshot(session.document());
    assert_ne!(merged, original);
    let track = BlockId::new("bl-0");
    assert_eq!(session.document().children_of(&track).len(), 1);

    session.undo().unwrap();
    assert_eq!(snapshot(session.document()), original);
    session.redo().unwrap();
    assert_eq!(snapshot(session.document()), merged);
}

#[test]
fn test_insert_and_remove_roundtrip() {
    let mut session = Session::from_json(SONG, EditorConfig::default()).unwrap();
    let original = snapshot(session.document());
    let track = BlockId::new("bl-0");

    session.insert_lyrics(&track, "あ|い", Timing::new(3, 0, 4)).unwrap();
    assert_eq!(session.document().children_of(&track).len(), 4);
    let inserted = session.document().children_of(&track)[2..].to_vec();
    session.remove(&inserted).unwrap();
    assert_eq!(snapshot(session.document()), original);

    session.undo().unwrap();
    session.undo().unwrap();
    assert_eq!(snapshot(session.document()), original);
}

#[test]
fn test_annotations_stay_contiguous() {
    let mut session = Session::from_json(SONG, EditorConfig::default()).unwrap();
    let lyric = BlockId::new("bl-3");
    let original = snapshot(session.document());

    session
        .resize(&BlockId::new("bl-4"), None, Some(Timing::new(0, 2, 4)), Some(true))
        .unwrap();
    assert_dense(session.document(), &lyric);

    session.remove(&[BlockId::new("bl-5")]).unwrap();
    assert_dense(session.document(), &lyric);
    assert_eq!(session.document().children_of(&lyric).len(), 1);

    while session.undo().unwrap() {}
    assert_dense(session.document(), &lyric);
    assert_eq!(snapshot(session.document()), original);
}

#[test]
fn test_history_depth_evicts_oldest() {
    let mut config = EditorConfig::default();
    config.history_depth = 3;
    let mut session = Session::from_json(SONG, config).unwrap();
    let annotation = BlockId::new("bl-7");

    for i in 0..5 {
        session.set_text(&annotation, &format!("t{}", i)).unwrap();
    }
    assert_eq!(session.manager().history_len(), 3);

    let mut undone = 0;
    while session.undo().unwrap() {
        undone += 1;
    }
    assert_eq!(undone, 3);
    assert_eq!(session.document().text(&annotation), "t1");
}

#[test]
fn test_drag_leaves_single_history_entry() {
    let mut session = Session::from_json(SONG, EditorConfig::default()).unwrap();
    let lyric = BlockId::new("bl-6");

    session.begin_drag().unwrap();
    for beat in [6, 7, 8] {
        session
            .update_drag(&lyric, None, Some(Timing::new(0, beat, 4)), None)
            .unwrap();
    }
    // Locked while dragging
    assert!(!session.undo().unwrap());
    session.commit_drag().unwrap();

    assert_eq!(session.document().end(&lyric), Timing::new(0, 8, 4));
    assert_eq!(session.manager().history_len(), 1);
    session.undo().unwrap();
    assert_eq!(session.document().end(&lyric), Timing::new(0, 5, 4));
}
