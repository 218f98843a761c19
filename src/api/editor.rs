//! JavaScript-facing editing functions
//!
//! A single session lives in WASM memory; every function locks it, runs one
//! operation and reports the outcome. Errors come back as strings after
//! being logged to the console.

use std::sync::{Mutex, MutexGuard};

use lazy_static::lazy_static;
use wasm_bindgen::prelude::*;

use crate::api::helpers::{deserialize, editor_error, parse_timing, serialize, validation_error};
use crate::config::EditorConfig;
use crate::models::block::BlockId;
use crate::models::timing::Timing;
use crate::session::Session;
use crate::{wasm_info, wasm_log};

// WASM-owned session (canonical source of truth)
lazy_static! {
    static ref SESSION: Mutex<Option<Session>> = Mutex::new(None);
}

fn lock_session() -> Result<MutexGuard<'static, Option<Session>>, JsValue> {
    SESSION
        .lock()
        .map_err(|_| validation_error("Session lock poisoned"))
}

/// Run `f` on the open session
fn with_session<R>(f: impl FnOnce(&mut Session) -> Result<R, JsValue>) -> Result<R, JsValue> {
    let mut guard = lock_session()?;
    let session = guard
        .as_mut()
        .ok_or_else(|| validation_error("No document loaded"))?;
    f(session)
}

fn parse_config(config: JsValue) -> Result<EditorConfig, JsValue> {
    if config.is_undefined() || config.is_null() {
        return Ok(EditorConfig::default());
    }
    let config: EditorConfig = deserialize(config, "Invalid editor config")?;
    config.validate().map_err(editor_error)?;
    Ok(config)
}

fn block_ids(ids: JsValue) -> Result<Vec<BlockId>, JsValue> {
    deserialize(ids, "Expected an array of block ids")
}

// ============================================================================
// Document lifecycle
// ============================================================================

/// Open an empty document with the default tracks
#[wasm_bindgen(js_name = newDocument)]
pub fn new_document(config: JsValue) -> Result<(), JsValue> {
    let session = Session::new(parse_config(config)?).map_err(editor_error)?;
    *lock_session()? = Some(session);
    wasm_info!("New document created");
    Ok(())
}

#[wasm_bindgen(js_name = loadDocument)]
pub fn load_document(json: &str, config: JsValue) -> Result<(), JsValue> {
    let session = Session::from_json(json, parse_config(config)?).map_err(editor_error)?;
    wasm_info!(
        "Loaded document with {} tracks",
        session.document().tracks().len()
    );
    *lock_session()? = Some(session);
    Ok(())
}

#[wasm_bindgen(js_name = exportDocument)]
pub fn export_document() -> Result<String, JsValue> {
    with_session(|s| s.export_json().map_err(editor_error))
}

#[wasm_bindgen(js_name = setEditorConfig)]
pub fn set_editor_config(config: JsValue) -> Result<(), JsValue> {
    let config = parse_config(config)?;
    with_session(|s| s.set_config(config).map_err(editor_error))
}

/// Every track with its blocks, for rendering
#[wasm_bindgen(js_name = listTracks)]
pub fn list_tracks() -> Result<JsValue, JsValue> {
    with_session(|s| serialize(&s.track_views(), "Failed to serialize tracks"))
}

// ============================================================================
// Editing
// ============================================================================

/// Move one or both boundaries of a block; timings are `bar:beat/div`
#[wasm_bindgen(js_name = resizeBlock)]
pub fn resize_block(
    id: &str,
    start: Option<String>,
    end: Option<String>,
    allow_expand: Option<bool>,
) -> Result<bool, JsValue> {
    let start = parse_timing(start, "start")?;
    let end = parse_timing(end, "end")?;
    wasm_log!("resizeBlock {} {:?} {:?}", id, start, end);
    with_session(|s| {
        s.resize(&BlockId::new(id), start, end, allow_expand)
            .map_err(editor_error)
    })
}

#[wasm_bindgen(js_name = insertLyrics)]
pub fn insert_lyrics(track: &str, text: &str, start: &str) -> Result<bool, JsValue> {
    let start = parse_timing(Some(start.to_string()), "start")?.unwrap_or(Timing::ZERO);
    with_session(|s| {
        s.insert_lyrics(&BlockId::new(track), text, start)
            .map_err(editor_error)
    })
}

#[wasm_bindgen(js_name = removeBlocks)]
pub fn remove_blocks(ids: JsValue) -> Result<bool, JsValue> {
    let ids = block_ids(ids)?;
    with_session(|s| s.remove(&ids).map_err(editor_error))
}

#[wasm_bindgen(js_name = mergeBlocks)]
pub fn merge_blocks(ids: JsValue) -> Result<bool, JsValue> {
    let ids = block_ids(ids)?;
    with_session(|s| s.merge(&ids).map_err(editor_error))
}

#[wasm_bindgen(js_name = setBlockText)]
pub fn set_block_text(id: &str, text: &str) -> Result<bool, JsValue> {
    with_session(|s| s.set_text(&BlockId::new(id), text).map_err(editor_error))
}

#[wasm_bindgen(js_name = setLyricReading)]
pub fn set_lyric_reading(id: &str, reading: &str, top_text: &str) -> Result<bool, JsValue> {
    with_session(|s| {
        s.set_lyric_reading(&BlockId::new(id), reading, top_text)
            .map_err(editor_error)
    })
}

#[wasm_bindgen(js_name = groupCalls)]
pub fn group_calls(ids: JsValue) -> Result<bool, JsValue> {
    let ids = block_ids(ids)?;
    with_session(|s| s.group_calls(&ids).map_err(editor_error))
}

#[wasm_bindgen(js_name = ungroupCalls)]
pub fn ungroup_calls(ids: JsValue) -> Result<bool, JsValue> {
    let ids = block_ids(ids)?;
    with_session(|s| s.ungroup_calls(&ids).map_err(editor_error))
}

/// Ids of every call in `id`'s repeat group, by start
#[wasm_bindgen(js_name = groupMembers)]
pub fn group_members(id: &str) -> Result<js_sys::Array, JsValue> {
    with_session(|s| {
        Ok(s.document()
            .group_members(&BlockId::new(id))
            .iter()
            .map(|m| JsValue::from_str(m.as_str()))
            .collect())
    })
}

// ============================================================================
// History
// ============================================================================

#[wasm_bindgen]
pub fn undo() -> Result<bool, JsValue> {
    with_session(|s| s.undo().map_err(editor_error))
}

#[wasm_bindgen]
pub fn redo() -> Result<bool, JsValue> {
    with_session(|s| s.redo().map_err(editor_error))
}

#[wasm_bindgen(js_name = canUndo)]
pub fn can_undo() -> Result<bool, JsValue> {
    with_session(|s| Ok(s.manager().can_undo()))
}

#[wasm_bindgen(js_name = canRedo)]
pub fn can_redo() -> Result<bool, JsValue> {
    with_session(|s| Ok(s.manager().can_redo()))
}

// ============================================================================
// Live drag
// ============================================================================

#[wasm_bindgen(js_name = beginDrag)]
pub fn begin_drag() -> Result<(), JsValue> {
    with_session(|s| s.begin_drag().map_err(editor_error))
}

/// Replace the drag's current variant with a resize of `id`
#[wasm_bindgen(js_name = updateDrag)]
pub fn update_drag(
    id: &str,
    start: Option<String>,
    end: Option<String>,
    allow_expand: Option<bool>,
) -> Result<bool, JsValue> {
    let start = parse_timing(start, "start")?;
    let end = parse_timing(end, "end")?;
    with_session(|s| {
        s.update_drag(&BlockId::new(id), start, end, allow_expand)
            .map_err(editor_error)
    })
}

#[wasm_bindgen(js_name = commitDrag)]
pub fn commit_drag() -> Result<bool, JsValue> {
    with_session(|s| s.commit_drag().map_err(editor_error))
}

#[wasm_bindgen(js_name = cancelDrag)]
pub fn cancel_drag() -> Result<(), JsValue> {
    with_session(|s| s.cancel_drag().map_err(editor_error))
}
