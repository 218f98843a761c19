//! Lyrics Editor WASM Module
//!
//! Editing core for karaoke lyrics timing: a tree of time-ranged blocks,
//! cascading resize under an expand-or-reject policy, and undoable commands.

pub mod config;
pub mod error;
pub mod models;
pub mod refs;
pub mod structure;
pub mod navigation;
pub mod undo;
pub mod serialize;
pub mod session;
pub mod utils;
pub mod api;

// Re-export commonly used types
pub use config::EditorConfig;
pub use error::{EditorError, Result};
pub use models::{BlockId, BlockKind, Timing};
pub use session::Session;
pub use structure::{BlockView, Document};
pub use undo::{Command, CommandManager, LiveEdit};

use wasm_bindgen::prelude::*;

// This is like the `main` function, but for WASM modules.
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    #[cfg(feature = "console_log")]
    init_logger();

    log::info!("Lyrics editor WASM module initialized");
}

#[cfg(feature = "console_log")]
fn init_logger() {
    if let Err(e) = console_log::init_with_level(log::Level::Debug) {
        crate::wasm_warn!("Logger already initialized: {}", e);
    }
}
