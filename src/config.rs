//! Editor configuration

use crate::error::{EditorError, Result};
use crate::models::timing::{Timing, MAX_BAR, MAX_DIV};
use serde::{Deserialize, Serialize};

/// Version written into (and accepted from) the document envelope
pub const DOCUMENT_VERSION: u32 = 1;

/// Parent size at which child lookup switches from linear scan to bisection
pub const SMALL_DS_THRESHOLD: usize = 16;

pub const DEFAULT_HISTORY_DEPTH: usize = 100;
pub const DEFAULT_ALIGN_DIV: i64 = 4;
pub const LYRICS_SEP: char = '|';
/// Splits a lyric word into its reading and annotation text
pub const ANNO_INDIC: char = ':';

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    /// Undo entries kept before the oldest is evicted
    pub history_depth: usize,
    /// Grid resolution used when a caller does not give one
    pub default_align_div: i64,
    /// Expand-vs-reject policy used when a caller does not give one
    pub allow_expand: bool,
    /// No resize may push a block end past this bar
    pub max_document_bar: i64,
    pub separator: char,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_depth: DEFAULT_HISTORY_DEPTH,
            default_align_div: DEFAULT_ALIGN_DIV,
            allow_expand: false,
            max_document_bar: MAX_BAR,
            separator: LYRICS_SEP,
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EditorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_depth == 0 {
            return Err(EditorError::value("historyDepth must be at least 1"));
        }
        if self.default_align_div < 1 || self.default_align_div > MAX_DIV {
            return Err(EditorError::value(format!(
                "defaultAlignDiv out of range: {}",
                self.default_align_div
            )));
        }
        if self.max_document_bar < 1 || self.max_document_bar > MAX_BAR {
            return Err(EditorError::value(format!(
                "maxDocumentBar out of range: {}",
                self.max_document_bar
            )));
        }
        Ok(())
    }

    /// Latest position a block end may reach
    pub fn max_end(&self) -> Timing {
        Timing::new(self.max_document_bar, 0, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.history_depth, 100);
        assert_eq!(config.default_align_div, 4);
        assert_eq!(config.separator, '|');
        assert_eq!(config.max_end(), Timing::new(MAX_BAR, 0, 1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EditorConfig::from_json(r#"{"historyDepth": 5, "allowExpand": true}"#).unwrap();
        assert_eq!(config.history_depth, 5);
        assert!(config.allow_expand);
        assert_eq!(config.default_align_div, 4);
    }

    #[test]
    fn test_invalid_json_values() {
        assert!(EditorConfig::from_json(r#"{"historyDepth": 0}"#).is_err());
        assert!(EditorConfig::from_json(r#"{"defaultAlignDiv": 121}"#).is_err());
        assert!(matches!(
            EditorConfig::from_json("not json"),
            Err(EditorError::Data(_))
        ));
    }
}
