//! Live edits (drags and other gestures that update one command repeatedly)
//!
//! While a gesture is in progress each new variant replaces the previous one
//! in history, and the manager lock keeps everything else out of the history
//! until the gesture is committed or cancelled.

use crate::error::Result;
use crate::structure::document::Document;
use crate::undo::manager::{CommandManager, LockToken};
use crate::undo::Command;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiveEditState {
    /// No command
    Idle,
    /// Command stored but not applied; the lock is free
    Pending,
    /// Command applied and the lock held by this edit
    Executed,
}

#[derive(Debug)]
pub struct LiveEdit {
    token: LockToken,
    command: Option<Command>,
}

impl LiveEdit {
    pub fn new(manager: &mut CommandManager) -> Self {
        Self {
            token: manager.issue_token(),
            command: None,
        }
    }

    pub fn token(&self) -> LockToken {
        self.token
    }

    pub fn command(&self) -> Option<&Command> {
        self.command.as_ref()
    }

    pub fn is_executed(&self, manager: &CommandManager) -> bool {
        manager.lock_owner() == Some(self.token)
    }

    pub fn state(&self, manager: &CommandManager) -> LiveEditState {
        if self.is_executed(manager) {
            LiveEditState::Executed
        } else if self.command.is_some() {
            LiveEditState::Pending
        } else {
            LiveEditState::Idle
        }
    }

    /// Replace the applied variant with `command` (`None` just withdraws it).
    ///
    /// Returns false without touching anything when another holder has the
    /// lock.
    pub fn apply(
        &mut self,
        manager: &mut CommandManager,
        doc: &mut Document,
        command: Option<Command>,
    ) -> Result<bool> {
        if self.is_executed(manager) {
            self.undo(manager, doc)?;
        } else if manager.is_locked() {
            log::debug!("Live edit {} rejected: manager locked", self.token);
            return Ok(false);
        }
        self.command = None;
        let Some(command) = command.filter(|c| !c.is_noop()) else {
            return Ok(true);
        };
        if manager.execute(doc, command.clone())? {
            manager.lock(self.token);
        }
        self.command = Some(command);
        Ok(true)
    }

    /// Withdraw the applied variant
    pub fn clear(&mut self, manager: &mut CommandManager, doc: &mut Document) -> Result<bool> {
        self.apply(manager, doc, None)
    }

    /// Re-apply a pending command
    pub fn redo(&mut self, manager: &mut CommandManager, doc: &mut Document) -> Result<()> {
        let Some(command) = &self.command else {
            return Ok(());
        };
        if self.is_executed(manager) {
            return Ok(());
        }
        if manager.execute(doc, command.clone())? {
            manager.lock(self.token);
        }
        Ok(())
    }

    /// Undo the applied variant, keeping it pending
    pub fn undo(&mut self, manager: &mut CommandManager, doc: &mut Document) -> Result<()> {
        if !self.is_executed(manager) {
            return Ok(());
        }
        manager.unlock(self.token)?;
        manager.undo(doc)?;
        // a later redo executes the stored command afresh
        manager.discard_redo();
        Ok(())
    }

    /// Undo and forget the command
    pub fn cancel(&mut self, manager: &mut CommandManager, doc: &mut Document) -> Result<()> {
        self.undo(manager, doc)?;
        self.command = None;
        Ok(())
    }

    /// Turn the command into an ordinary history entry
    pub fn commit(&mut self, manager: &mut CommandManager, doc: &mut Document) -> Result<bool> {
        if self.command.is_none() {
            return Ok(false);
        }
        if manager.is_locked() && !self.is_executed(manager) {
            return Ok(false);
        }
        self.redo(manager, doc)?;
        if self.is_executed(manager) {
            manager.unlock(self.token)?;
        }
        self.command = None;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::block::BlockId;
    use crate::models::timing::Timing;

    fn setup() -> (Document, CommandManager, BlockId) {
        let mut doc = Document::with_default_tracks();
        let track = doc.tracks()[1].clone();
        let call = doc.create_call("Hi", Timing::ZERO, Timing::new(0, 1, 4));
        doc.splice(&track, 0, 0, vec![call.clone()]).unwrap();
        (doc, CommandManager::default(), call)
    }

    #[test]
    fn test_variants_replace_each_other() {
        let (mut doc, mut manager, call) = setup();
        let mut edit = LiveEdit::new(&mut manager);
        assert_eq!(edit.state(&manager), LiveEditState::Idle);

        for beat in 2..5 {
            let cmd = Command::set_end(call.clone(), Timing::new(0, beat, 4));
            assert!(edit.apply(&mut manager, &mut doc, Some(cmd)).unwrap());
        }
        assert_eq!(edit.state(&manager), LiveEditState::Executed);
        assert_eq!(manager.history_len(), 1);
        assert_eq!(doc.end(&call), Timing::new(0, 4, 4));

        assert!(edit.commit(&mut manager, &mut doc).unwrap());
        assert_eq!(edit.state(&manager), LiveEditState::Idle);
        assert!(!manager.is_locked());

        manager.undo(&mut doc).unwrap();
        assert_eq!(doc.end(&call), Timing::new(0, 1, 4));
    }

    #[test]
    fn test_cancel_leaves_no_history() {
        let (mut doc, mut manager, call) = setup();
        let mut edit = LiveEdit::new(&mut manager);
        let cmd = Command::set_end(call.clone(), Timing::new(0, 3, 4));
        edit.apply(&mut manager, &mut doc, Some(cmd)).unwrap();
        edit.cancel(&mut manager, &mut doc).unwrap();
        assert_eq!(doc.end(&call), Timing::new(0, 1, 4));
        assert_eq!(edit.state(&manager), LiveEditState::Idle);
        assert!(!manager.can_undo());
        assert!(!manager.can_redo());
        assert_eq!(manager.history_len(), 0);
    }

    #[test]
    fn test_second_edit_is_rejected_while_locked() {
        let (mut doc, mut manager, call) = setup();
        let mut first = LiveEdit::new(&mut manager);
        let mut second = LiveEdit::new(&mut manager);
        let cmd = Command::set_end(call.clone(), Timing::new(0, 3, 4));
        first.apply(&mut manager, &mut doc, Some(cmd)).unwrap();

        let other = Command::set_end(call.clone(), Timing::new(0, 2, 4));
        assert!(!second.apply(&mut manager, &mut doc, Some(other)).unwrap());
        assert_eq!(second.state(&manager), LiveEditState::Idle);
        assert!(!second.commit(&mut manager, &mut doc).unwrap());
        assert_eq!(doc.end(&call), Timing::new(0, 3, 4));
    }

    #[test]
    fn test_undo_keeps_command_pending() {
        let (mut doc, mut manager, call) = setup();
        let mut edit = LiveEdit::new(&mut manager);
        let cmd = Command::set_end(call.clone(), Timing::new(0, 3, 4));
        edit.apply(&mut manager, &mut doc, Some(cmd)).unwrap();
        edit.undo(&mut manager, &mut doc).unwrap();
        assert_eq!(edit.state(&manager), LiveEditState::Pending);

        assert!(edit.commit(&mut manager, &mut doc).unwrap());
        assert_eq!(doc.end(&call), Timing::new(0, 3, 4));
        assert!(manager.can_undo());
    }
}
