//! Lyrics editor WASM API
//!
//! - `helpers`: console logging, JS value conversion, error mapping
//! - `editor`: the session-backed editing functions

pub mod helpers;
pub mod editor;

pub use editor::*;
