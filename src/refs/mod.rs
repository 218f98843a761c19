//! Cross-block reference primitives
//!
//! - `back_ref`: single-target references with a registry keyed by target id
//! - `union_find`: reversible weighted union-find used for repeat groups
//! - `resolver`: forward-reference queue for graph deserialization

pub mod back_ref;
pub mod resolver;
pub mod union_find;

pub use back_ref::{BackRef, RefRegistry};
pub use resolver::ForwardResolver;
pub use union_find::{UfUndo, UnionFind};
