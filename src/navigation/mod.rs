//! Navigation over the block tree

pub mod cursor;

pub use cursor::{is_sing_along_valid, BlockCursor, BlockIter, Direction};
