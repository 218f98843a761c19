//! Persisted document format
//!
//! `records` defines the serde shapes, `loader` rebuilds a `Document` from
//! them and `writer` produces them. JSON is the interchange format; YAML is
//! accepted for hand-written fixtures.

pub mod loader;
pub mod records;
pub mod writer;

pub use loader::{load_json, load_record, load_yaml};
pub use records::{BlockRecord, DocumentRecord};
pub use writer::{to_json, to_record, to_yaml};
