//! Lyric tags (singer/part labels) and the document tag store

use crate::error::{EditorError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// RGB color, serialized as `#RRGGBB`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 0xff,
        g: 0xff,
        b: 0xff,
    };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex
            .strip_prefix('#')
            .filter(|d| d.len() == 6 && d.is_ascii())
            .ok_or_else(|| EditorError::value(format!("Invalid color: {}", hex)))?;
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| EditorError::value(format!("Invalid color: {}", hex)))
        };
        Ok(Color {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self> {
        Color::from_hex(s)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A named, colored label attached to lyric blocks
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricTag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Color,
}

impl LyricTag {
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: Color) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color,
        }
    }
}

/// Ordered collection of the tags a document defines
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagsStore {
    tags: Vec<LyricTag>,
}

impl TagsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tags(&self) -> &[LyricTag] {
        &self.tags
    }

    pub fn tag_ids(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&LyricTag> {
        self.tags.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Add or replace a tag (replacing keeps its position)
    pub fn add(&mut self, tag: LyricTag) {
        match self.tags.iter_mut().find(|t| t.id == tag.id) {
            Some(existing) => *existing = tag,
            None => self.tags.push(tag),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<LyricTag> {
        let pos = self.tags.iter().position(|t| t.id == id)?;
        Some(self.tags.remove(pos))
    }

    /// Swap in a whole new tag list, returning the old one
    pub fn replace(&mut self, tags: Vec<LyricTag>) -> Vec<LyricTag> {
        let mut deduped: Vec<LyricTag> = Vec::with_capacity(tags.len());
        for tag in tags {
            if deduped.iter().any(|t| t.id == tag.id) {
                log::warn!("Duplicate tag id {} dropped", tag.id);
                continue;
            }
            deduped.push(tag);
        }
        std::mem::replace(&mut self.tags, deduped)
    }

    /// Next unused `tag-<n>` id
    pub fn next_tag_id(&self) -> String {
        let max = self
            .tags
            .iter()
            .filter_map(|t| t.id.strip_prefix("tag-"))
            .filter_map(|n| n.parse::<u64>().ok())
            .max();
        format!("tag-{}", max.map(|m| m + 1).unwrap_or(1))
    }

    /// Keep only ids the store knows about, dropping duplicates
    pub fn filter_known(&self, ids: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for id in ids {
            if self.contains(id) && !out.contains(id) {
                out.push(id.clone());
            }
        }
        out
    }
}
