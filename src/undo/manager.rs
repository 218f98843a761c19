//! Command history

use std::collections::VecDeque;

use crate::config::DEFAULT_HISTORY_DEPTH;
use crate::error::{EditorError, Result};
use crate::structure::document::Document;
use crate::undo::Command;

/// Identifies the holder of the manager lock
pub type LockToken = u64;

/// Executes commands inside one document transaction each and keeps them
/// for undo/redo.
///
/// While a live edit holds the lock, `execute`, `undo` and `redo` are
/// no-ops so history entries of two edits never interleave.
#[derive(Debug)]
pub struct CommandManager {
    /// Executed commands; those at `current_index..` can be redone
    commands: VecDeque<Command>,
    current_index: usize,
    /// Maximum number of commands to keep in history
    max_size: usize,
    lock_owner: Option<LockToken>,
    next_token: LockToken,
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl CommandManager {
    pub fn new(max_size: usize) -> Self {
        Self {
            commands: VecDeque::new(),
            current_index: 0,
            max_size: max_size.max(1),
            lock_owner: None,
            next_token: 1,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Change the depth, dropping the oldest entries if needed
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size.max(1);
        self.enforce_max_size();
    }

    //#region Lock

    /// A fresh token for a new lock holder
    pub fn issue_token(&mut self) -> LockToken {
        let token = self.next_token;
        self.next_token += 1;
        token
    }

    pub fn is_locked(&self) -> bool {
        self.lock_owner.is_some()
    }

    pub fn lock_owner(&self) -> Option<LockToken> {
        self.lock_owner
    }

    /// Take the lock; false if someone already holds it
    pub fn lock(&mut self, token: LockToken) -> bool {
        if self.lock_owner.is_some() {
            return false;
        }
        self.lock_owner = Some(token);
        true
    }

    pub fn unlock(&mut self, token: LockToken) -> Result<()> {
        if self.lock_owner != Some(token) {
            return Err(EditorError::value(format!(
                "Unlocking with token {} that does not hold the lock",
                token
            )));
        }
        self.lock_owner = None;
        Ok(())
    }

    //#endregion Lock

    /// Execute and record `command`. Returns whether it was applied; no-op
    /// commands are dropped and a locked manager refuses with a warning.
    pub fn execute(&mut self, doc: &mut Document, mut command: Command) -> Result<bool> {
        if self.is_locked() {
            log::warn!("CommandManager is locked");
            return Ok(false);
        }
        if command.is_noop() {
            return Ok(false);
        }
        doc.transaction(|d| command.execute(d))?;
        self.push(command);
        Ok(true)
    }

    /// Record an already executed command
    pub fn push(&mut self, command: Command) {
        self.commands.truncate(self.current_index);
        self.commands.push_back(command);
        self.current_index = self.commands.len();
        self.enforce_max_size();
    }

    fn enforce_max_size(&mut self) {
        while self.commands.len() > self.max_size {
            self.commands.pop_front();
            self.current_index = self.current_index.saturating_sub(1);
        }
    }

    /// Undo the last command
    pub fn undo(&mut self, doc: &mut Document) -> Result<bool> {
        if self.is_locked() {
            log::warn!("CommandManager is locked");
            return Ok(false);
        }
        if !self.can_undo() {
            return Ok(false);
        }
        let command = &mut self.commands[self.current_index - 1];
        doc.transaction(|d| command.undo(d))?;
        self.current_index -= 1;
        Ok(true)
    }

    /// Redo the last undone command
    pub fn redo(&mut self, doc: &mut Document) -> Result<bool> {
        if self.is_locked() {
            log::warn!("CommandManager is locked");
            return Ok(false);
        }
        if !self.can_redo() {
            return Ok(false);
        }
        let command = &mut self.commands[self.current_index];
        doc.transaction(|d| command.execute(d))?;
        self.current_index += 1;
        Ok(true)
    }

    /// Drop the entries that could be redone
    pub fn discard_redo(&mut self) {
        self.commands.truncate(self.current_index);
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        self.current_index > 0
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        self.current_index < self.commands.len()
    }

    /// Number of entries kept, including redoable ones
    pub fn history_len(&self) -> usize {
        self.commands.len()
    }

    /// Forget all history (the lock is kept)
    pub fn clear(&mut self) {
        self.commands.clear();
        self.current_index = 0;
    }
}
