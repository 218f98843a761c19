//! Song metadata carried alongside the block tree

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    pub title: String,
    pub artist: String,
    pub series: String,
    pub lyricist: String,
    pub composer: String,
    pub cover_image_path: String,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        *self == Metadata::default()
    }
}
