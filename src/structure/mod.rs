//! Document structure: the block arena, factories, the resize engine and
//! the editing operations built on top of them

pub mod document;
pub mod factory;
pub mod operations;
pub mod resize;
pub mod view;

pub use document::{ChangeListener, Document, ROOT_ID};
pub use factory::{check_full_call_group, CALL_PRESETS};
pub use resize::{insert_cmd, resize_child_cmd, resize_cmd, ResizeAction};
pub use view::BlockView;
