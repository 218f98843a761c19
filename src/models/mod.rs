//! Data models for the lyrics document
//!
//! Exact musical time, the block payloads, and the document-level stores
//! (tags, metadata, tempo) that blocks refer to.

pub mod block;
pub mod metadata;
pub mod serde_helpers;
pub mod tags;
pub mod tempo;
pub mod timing;

// Re-export commonly used types
pub use block::{Block, BlockData, BlockId, BlockKind};
pub use metadata::Metadata;
pub use tags::{Color, LyricTag, TagsStore};
pub use tempo::{BpmPoint, TempoMap, TimeService};
pub use timing::{Fraction, Timing, MAX_BAR, MAX_DIV};
