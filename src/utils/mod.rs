//! Utility helpers shared by the editing core

pub mod text;

pub use text::{split_lyrics, split_words};
