//! One open document with its history and configuration
//!
//! `Session` is what the wasm API keeps alive between calls. It applies the
//! configured defaults (grid, expand policy, separator) so callers only pass
//! what the gesture actually decides.

use crate::config::EditorConfig;
use crate::error::{EditorError, Result};
use crate::models::block::BlockId;
use crate::models::timing::Timing;
use crate::serialize;
use crate::structure::document::Document;
use crate::structure::operations;
use crate::structure::view::BlockView;
use crate::undo::{Command, CommandManager, LiveEdit};

pub struct Session {
    doc: Document,
    manager: CommandManager,
    config: EditorConfig,
    /// In-progress drag, if any
    live: Option<LiveEdit>,
}

impl Session {
    /// A document with the three default tracks
    pub fn new(config: EditorConfig) -> Result<Self> {
        Self::with_document(Document::with_default_tracks(), config)
    }

    pub fn with_document(mut doc: Document, config: EditorConfig) -> Result<Self> {
        config.validate()?;
        doc.set_max_end(config.max_end());
        Ok(Self {
            doc,
            manager: CommandManager::new(config.history_depth),
            config,
            live: None,
        })
    }

    pub fn from_json(json: &str, config: EditorConfig) -> Result<Self> {
        Self::with_document(serialize::load_json(json)?, config)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn manager(&self) -> &CommandManager {
        &self.manager
    }

    /// Swap in a new configuration; history depth and document end follow it
    pub fn set_config(&mut self, config: EditorConfig) -> Result<()> {
        config.validate()?;
        self.manager.set_max_size(config.history_depth);
        self.doc.set_max_end(config.max_end());
        self.config = config;
        Ok(())
    }

    pub fn export_json(&self) -> Result<String> {
        serialize::to_json(&self.doc)
    }

    pub fn export_yaml(&self) -> Result<String> {
        serialize::to_yaml(&self.doc)
    }

    pub fn track_views(&self) -> Vec<BlockView> {
        self.doc.track_views()
    }

    //#region Commands

    /// Run a command through the history
    pub fn execute(&mut self, command: Command) -> Result<bool> {
        self.manager.execute(&mut self.doc, command)
    }

    pub fn undo(&mut self) -> Result<bool> {
        self.manager.undo(&mut self.doc)
    }

    pub fn redo(&mut self) -> Result<bool> {
        self.manager.redo(&mut self.doc)
    }

    /// Resize with the configured grid; `allow_expand` falls back to the config
    pub fn resize(
        &mut self,
        block: &BlockId,
        start: Option<Timing>,
        end: Option<Timing>,
        allow_expand: Option<bool>,
    ) -> Result<bool> {
        let cmd = self.resize_command(block, start, end, allow_expand)?;
        self.execute(cmd)
    }

    fn resize_command(
        &self,
        block: &BlockId,
        start: Option<Timing>,
        end: Option<Timing>,
        allow_expand: Option<bool>,
    ) -> Result<Command> {
        operations::resize_block_cmd(
            &self.doc,
            block,
            self.config.default_align_div,
            allow_expand.unwrap_or(self.config.allow_expand),
            start,
            end,
        )
    }

    pub fn insert_lyrics(&mut self, track: &BlockId, text: &str, start: Timing) -> Result<bool> {
        let cmd = operations::insert_lyrics_cmd(
            &mut self.doc,
            track,
            text,
            start,
            self.config.default_align_div,
            self.config.separator,
        )?;
        self.execute(cmd)
    }

    pub fn remove(&mut self, blocks: &[BlockId]) -> Result<bool> {
        let cmd = operations::remove_blocks_cmd(&self.doc, blocks)?;
        self.execute(cmd)
    }

    pub fn merge(&mut self, blocks: &[BlockId]) -> Result<bool> {
        let cmd = operations::merge_blocks_cmd(&self.doc, blocks)?;
        self.execute(cmd)
    }

    pub fn set_text(&mut self, block: &BlockId, text: &str) -> Result<bool> {
        let cmd = operations::set_text_cmd(&self.doc, block, text)?;
        self.execute(cmd)
    }

    /// Give a lyric a reading, laid out from separator-delimited `top_text`
    pub fn set_lyric_reading(&mut self, lyric: &BlockId, reading: &str, top_text: &str) -> Result<bool> {
        let cmd = operations::set_lyric_reading_cmd(
            &mut self.doc,
            lyric,
            reading,
            top_text,
            self.config.default_align_div,
            self.config.separator,
        )?;
        self.execute(cmd)
    }

    pub fn group_calls(&mut self, calls: &[BlockId]) -> Result<bool> {
        let cmd = operations::group_calls_cmd(&self.doc, calls)?;
        self.execute(cmd)
    }

    pub fn ungroup_calls(&mut self, calls: &[BlockId]) -> Result<bool> {
        let cmd = operations::ungroup_calls_cmd(&self.doc, calls)?;
        self.execute(cmd)
    }

    //#endregion Commands

    //#region Live drag

    pub fn is_dragging(&self) -> bool {
        self.live.is_some()
    }

    /// Start a drag; fails while another drag is open
    pub fn begin_drag(&mut self) -> Result<()> {
        if self.live.is_some() {
            return Err(EditorError::user("A drag is already in progress"));
        }
        self.live = Some(LiveEdit::new(&mut self.manager));
        Ok(())
    }

    /// Replace the current drag variant with a resize of `block`.
    ///
    /// A rejected variant (e.g. an overlap without expansion) leaves the drag
    /// open with nothing applied.
    pub fn update_drag(
        &mut self,
        block: &BlockId,
        start: Option<Timing>,
        end: Option<Timing>,
        allow_expand: Option<bool>,
    ) -> Result<bool> {
        let mut edit = self
            .live
            .take()
            .ok_or_else(|| EditorError::user("No drag in progress"))?;
        let result = self.apply_drag(&mut edit, block, start, end, allow_expand);
        self.live = Some(edit);
        result
    }

    fn apply_drag(
        &mut self,
        edit: &mut LiveEdit,
        block: &BlockId,
        start: Option<Timing>,
        end: Option<Timing>,
        allow_expand: Option<bool>,
    ) -> Result<bool> {
        edit.clear(&mut self.manager, &mut self.doc)?;
        let cmd = self.resize_command(block, start, end, allow_expand)?;
        edit.apply(&mut self.manager, &mut self.doc, Some(cmd))
    }

    /// Keep the last variant as one history entry
    pub fn commit_drag(&mut self) -> Result<bool> {
        match self.live.take() {
            Some(mut edit) => edit.commit(&mut self.manager, &mut self.doc),
            None => Ok(false),
        }
    }

    pub fn cancel_drag(&mut self) -> Result<()> {
        match self.live.take() {
            Some(mut edit) => edit.cancel(&mut self.manager, &mut self.doc),
            None => Ok(()),
        }
    }

    //#endregion Live drag
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_lyrics() -> (Session, BlockId) {
        let mut session = Session::new(EditorConfig::default()).unwrap();
        let track = session.document().tracks()[0].clone();
        session.insert_lyrics(&track, "a|b", Timing::ZERO).unwrap();
        (session, track)
    }

    #[test]
    fn test_insert_and_undo() {
        let (mut session, track) = session_with_lyrics();
        assert_eq!(session.document().children_of(&track).len(), 2);
        assert!(session.undo().unwrap());
        assert!(session.document().children_of(&track).is_empty());
        assert!(session.redo().unwrap());
        assert_eq!(session.document().children_of(&track).len(), 2);
    }

    #[test]
    fn test_drag_commits_one_entry() {
        let (mut session, track) = session_with_lyrics();
        let last = session.document().children_of(&track)[1].clone();
        let before = session.manager().history_len();

        session.begin_drag().unwrap();
        assert!(session.begin_drag().is_err());
        for beat in 3..6 {
            session
                .update_drag(&last, None, Some(Timing::new(0, beat, 4)), None)
                .unwrap();
        }
        assert!(session.commit_drag().unwrap());
        assert!(!session.is_dragging());
        assert_eq!(session.document().end(&last), Timing::new(0, 5, 4));
        assert_eq!(session.manager().history_len(), before + 1);

        session.undo().unwrap();
        assert_eq!(session.document().end(&last), Timing::new(0, 2, 4));
    }

    #[test]
    fn test_rejected_variant_keeps_drag_open() {
        let (mut session, track) = session_with_lyrics();
        let first = session.document().children_of(&track)[0].clone();
        session.begin_drag().unwrap();
        session
            .update_drag(&first, None, Some(Timing::new(0, 3, 4)), Some(false))
            .unwrap_err();
        assert!(session.is_dragging());
        session.cancel_drag().unwrap();
        assert_eq!(session.document().end(&first), Timing::new(0, 1, 4));
        assert!(!session.manager().is_locked());
    }

    #[test]
    fn test_cancelled_drag_cannot_be_redone() {
        let (mut session, track) = session_with_lyrics();
        let last = session.document().children_of(&track)[1].clone();
        let before = session.manager().history_len();
        session.begin_drag().unwrap();
        session
            .update_drag(&last, None, Some(Timing::new(0, 4, 4)), None)
            .unwrap();
        session.cancel_drag().unwrap();

        assert!(!session.redo().unwrap());
        assert_eq!(session.document().end(&last), Timing::new(0, 2, 4));
        assert_eq!(session.manager().history_len(), before);
    }

    #[test]
    fn test_config_applies_history_depth() {
        let (mut session, _) = session_with_lyrics();
        let mut config = EditorConfig::default();
        config.history_depth = 1;
        session.set_config(config).unwrap();
        assert_eq!(session.manager().max_size(), 1);
    }
}
